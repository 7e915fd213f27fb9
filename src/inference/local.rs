use crate::config::Config;
use crate::error::{DeltaError, InferenceError, Result};
use crate::inference::{ChatBackend, ChatMessage};
use async_trait::async_trait;
use std::path::PathBuf;
use std::process::Stdio;
use tokio::process::Command;

/// Local in-process-loader binding, driving a `llama-cli` executable
///
/// Messages are rendered with the llama-3 chat template and handed to the
/// binary in a single-shot invocation against the registry-resolved GGUF
/// file. One subprocess per turn keeps the binding stateless.
#[derive(Debug)]
pub struct LocalBackend {
    bin: PathBuf,
    model_path: PathBuf,
    ctx_size: u32,
    max_tokens: u32,
    temperature: f32,
    top_p: f32,
}

impl LocalBackend {
    /// Create new local backend from config and a resolved model path
    ///
    /// # Errors
    /// - Returns error if the llama-cli binary is not found in PATH
    /// - Returns error if the model file does not exist
    pub fn new(config: &Config, model_path: PathBuf) -> Result<Self> {
        let bin = which::which(&config.backend.llama_bin).map_err(|_| {
            DeltaError::Inference(InferenceError::Runner(format!(
                "'{}' not found in PATH. Install llama.cpp or set backend.llama_bin in config",
                config.backend.llama_bin
            )))
        })?;

        if !model_path.exists() {
            return Err(DeltaError::Inference(InferenceError::Runner(format!(
                "Model file missing at {}. Re-pull the model",
                model_path.display()
            ))));
        }

        Ok(Self {
            bin,
            model_path,
            ctx_size: config.chat.ctx_size,
            max_tokens: config.chat.max_tokens,
            temperature: config.chat.temperature,
            top_p: config.chat.top_p,
        })
    }
}

#[async_trait]
impl ChatBackend for LocalBackend {
    async fn chat(&self, messages: &[ChatMessage]) -> Result<String> {
        let prompt = format_llama3_prompt(messages);

        let output = Command::new(&self.bin)
            .arg("-m")
            .arg(&self.model_path)
            .arg("-p")
            .arg(&prompt)
            .arg("-n")
            .arg(self.max_tokens.to_string())
            .arg("-c")
            .arg(self.ctx_size.to_string())
            .arg("--temp")
            .arg(self.temperature.to_string())
            .arg("--top-p")
            .arg(self.top_p.to_string())
            .arg("--no-display-prompt")
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await
            .map_err(|e| {
                DeltaError::Inference(InferenceError::Runner(format!(
                    "Failed to spawn {}: {e}",
                    self.bin.display()
                )))
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(DeltaError::Inference(InferenceError::Runner(format!(
                "{} exited with {}: {}",
                self.bin.display(),
                output.status,
                stderr.trim()
            ))));
        }

        let reply = String::from_utf8_lossy(&output.stdout);
        Ok(strip_stop_tokens(reply.trim()).to_string())
    }

    fn backend_name(&self) -> &'static str {
        "local"
    }
}

/// Render messages with the llama-3 chat template, ending with an open
/// assistant header so the model continues as the assistant
#[must_use]
pub fn format_llama3_prompt(messages: &[ChatMessage]) -> String {
    let mut prompt = String::from("<|begin_of_text|>");

    for message in messages {
        prompt.push_str("<|start_header_id|>");
        prompt.push_str(message.role.as_str());
        prompt.push_str("<|end_header_id|>\n\n");
        prompt.push_str(&message.content);
        prompt.push_str("<|eot_id|>");
    }

    prompt.push_str("<|start_header_id|>assistant<|end_header_id|>\n\n");
    prompt
}

/// Drop a trailing end-of-turn marker the runner may echo
fn strip_stop_tokens(reply: &str) -> &str {
    reply
        .strip_suffix("<|eot_id|>")
        .unwrap_or(reply)
        .trim_end()
}
