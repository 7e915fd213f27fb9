use crate::config::Config;
use crate::error::{DeltaError, InferenceError, Result};
use crate::inference::{ChatBackend, ChatMessage};
use async_trait::async_trait;
use futures_util::StreamExt;
use reqwest::StatusCode;
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;

/// Ollama-compatible HTTP server backend
///
/// Speaks `POST /api/chat` with streamed NDJSON chunks. The server keeps
/// its own model catalog; `model` here is the name the server knows, not
/// a registry path.
pub struct ServerBackend {
    client: reqwest::Client,
    base_url: String,
    model: String,
    timeout: Duration,
    num_ctx: u32,
    num_predict: u32,
    temperature: f32,
    top_p: f32,
}

impl std::fmt::Debug for ServerBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServerBackend")
            .field("client", &"Client { ... }")
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .field("timeout", &self.timeout)
            .finish()
    }
}

/// One NDJSON chunk from the streaming chat endpoint
#[derive(Debug, Deserialize)]
struct ChatChunk {
    #[serde(default)]
    message: Option<ChunkMessage>,
    #[serde(default)]
    done: bool,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChunkMessage {
    #[serde(default)]
    content: String,
}

#[derive(Debug, Deserialize)]
struct TagsResponse {
    #[serde(default)]
    models: Vec<TagEntry>,
}

#[derive(Debug, Deserialize)]
struct TagEntry {
    name: String,
}

impl ServerBackend {
    /// Create new server backend from config
    pub fn new(config: &Config, model: &str) -> Result<Self> {
        let base_url = config.backend.server_url.trim_end_matches('/').to_string();

        Ok(Self {
            client: reqwest::Client::new(),
            base_url,
            model: model.to_string(),
            timeout: Duration::from_secs(config.backend.timeout_secs),
            num_ctx: config.chat.ctx_size,
            num_predict: config.chat.max_tokens,
            temperature: config.chat.temperature,
            top_p: config.chat.top_p,
        })
    }

    /// Accumulate the assistant reply from a stream of NDJSON chunk lines
    fn collect_stream_lines(lines: &[&str]) -> Result<String> {
        let mut reply = String::new();

        for line in lines {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }

            let chunk: ChatChunk = serde_json::from_str(line).map_err(|e| {
                DeltaError::Inference(InferenceError::Server(format!(
                    "Malformed stream chunk: {e}"
                )))
            })?;

            if let Some(err) = chunk.error {
                return Err(DeltaError::Inference(InferenceError::Server(err)));
            }

            if let Some(message) = chunk.message {
                reply.push_str(&message.content);
            }

            if chunk.done {
                break;
            }
        }

        Ok(reply)
    }
}

#[async_trait]
impl ChatBackend for ServerBackend {
    async fn chat(&self, messages: &[ChatMessage]) -> Result<String> {
        let body = json!({
            "model": self.model,
            "messages": messages,
            "stream": true,
            "options": {
                "num_ctx": self.num_ctx,
                "num_predict": self.num_predict,
                "temperature": self.temperature,
                "top_p": self.top_p,
            },
        });

        let response = self
            .client
            .post(format!("{}/api/chat", self.base_url))
            .json(&body)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| DeltaError::Inference(InferenceError::Network(e.to_string())))?;

        let status = response.status();

        match status {
            StatusCode::OK => {
                // NDJSON stream; chunks may split across network reads, so
                // buffer and only parse completed lines.
                let mut stream = response.bytes_stream();
                let mut buffer = String::new();

                while let Some(bytes) = stream.next().await {
                    let bytes = bytes.map_err(|e| {
                        DeltaError::Inference(InferenceError::Network(e.to_string()))
                    })?;
                    buffer.push_str(&String::from_utf8_lossy(&bytes));
                }

                let lines: Vec<&str> = buffer.lines().collect();
                Self::collect_stream_lines(&lines)
            }
            StatusCode::NOT_FOUND => {
                let body = response.text().await.unwrap_or_default();
                Err(DeltaError::Inference(InferenceError::Server(format!(
                    "Model '{}' not known to the server: {body}",
                    self.model
                ))))
            }
            _ => {
                let body = response.text().await.unwrap_or_default();
                Err(DeltaError::Inference(InferenceError::Server(format!(
                    "Chat request failed ({status}): {body}"
                ))))
            }
        }
    }

    fn backend_name(&self) -> &'static str {
        "server"
    }
}

/// List model names known to the configured server (`GET /api/tags`)
pub async fn list_models(config: &Config) -> Result<Vec<String>> {
    let base_url = config.backend.server_url.trim_end_matches('/');
    let client = reqwest::Client::new();

    let response = client
        .get(format!("{base_url}/api/tags"))
        .timeout(Duration::from_secs(config.backend.timeout_secs))
        .send()
        .await
        .map_err(|e| DeltaError::Inference(InferenceError::Network(e.to_string())))?;

    if response.status() != StatusCode::OK {
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        return Err(DeltaError::Inference(InferenceError::Server(format!(
            "Listing models failed ({status}): {body}"
        ))));
    }

    let tags: TagsResponse = response.json().await.map_err(|e| {
        DeltaError::Inference(InferenceError::Server(format!(
            "Failed to parse /api/tags response: {e}"
        )))
    })?;

    Ok(tags.models.into_iter().map(|m| m.name).collect())
}
