use crate::error::{DeltaError, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;

/// Main configuration structure
#[derive(Deserialize, Serialize, Clone, Debug)]
pub struct Config {
    #[serde(default)]
    pub backend: BackendConfig,
    #[serde(default)]
    pub chat: ChatConfig,
    #[serde(default)]
    pub search: SearchConfig,
}

#[derive(Deserialize, Serialize, Clone, Debug)]
pub struct BackendConfig {
    /// "local" (llama-cli subprocess) or "server" (Ollama-compatible HTTP API)
    #[serde(default = "default_backend_kind")]
    pub kind: String,
    #[serde(default = "default_server_url")]
    pub server_url: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_llama_bin")]
    pub llama_bin: String,
}

#[derive(Deserialize, Serialize, Clone, Debug)]
pub struct ChatConfig {
    #[serde(default = "default_system_prompt")]
    pub system_prompt: String,
    #[serde(default = "default_ctx_size")]
    pub ctx_size: u32,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default = "default_top_p")]
    pub top_p: f32,
}

#[derive(Deserialize, Serialize, Clone, Debug)]
pub struct SearchConfig {
    #[serde(default = "default_cache_capacity")]
    pub cache_capacity: usize,
    #[serde(default = "default_snippet_chars")]
    pub snippet_chars: usize,
    #[serde(default = "default_max_results")]
    pub max_results: usize,
}

// Default value functions
fn default_backend_kind() -> String {
    "local".to_string()
}
fn default_server_url() -> String {
    "http://127.0.0.1:11434".to_string()
}
fn default_timeout_secs() -> u64 {
    120
}
fn default_llama_bin() -> String {
    "llama-cli".to_string()
}
fn default_system_prompt() -> String {
    "You are a helpful assistant.".to_string()
}
fn default_ctx_size() -> u32 {
    4096
}
fn default_max_tokens() -> u32 {
    1024
}
fn default_temperature() -> f32 {
    0.7
}
fn default_top_p() -> f32 {
    0.9
}
fn default_cache_capacity() -> usize {
    128
}
fn default_snippet_chars() -> usize {
    300
}
fn default_max_results() -> usize {
    2
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            kind: default_backend_kind(),
            server_url: default_server_url(),
            timeout_secs: default_timeout_secs(),
            llama_bin: default_llama_bin(),
        }
    }
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            system_prompt: default_system_prompt(),
            ctx_size: default_ctx_size(),
            max_tokens: default_max_tokens(),
            temperature: default_temperature(),
            top_p: default_top_p(),
        }
    }
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            cache_capacity: default_cache_capacity(),
            snippet_chars: default_snippet_chars(),
            max_results: default_max_results(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            backend: BackendConfig::default(),
            chat: ChatConfig::default(),
            search: SearchConfig::default(),
        }
    }
}

impl Config {
    /// Load config from disk, falling back to defaults if the file is absent
    pub fn load() -> Result<Self> {
        let path = Self::config_path()?;

        if !path.exists() {
            return Ok(Self::default());
        }

        let content = fs::read_to_string(&path)?;
        toml::from_str(&content)
            .map_err(|e| DeltaError::Config(format!("Failed to parse {}: {e}", path.display())))
    }

    /// Config file path, honoring `XDG_CONFIG_HOME`
    pub fn config_path() -> Result<PathBuf> {
        let config_dir = if let Ok(xdg_config) = std::env::var("XDG_CONFIG_HOME") {
            PathBuf::from(xdg_config)
        } else {
            let home = std::env::var("HOME")
                .map_err(|_| DeltaError::Config("HOME env var not set".to_string()))?;
            PathBuf::from(home).join(".config")
        };

        Ok(config_dir.join("delta").join("config.toml"))
    }
}
