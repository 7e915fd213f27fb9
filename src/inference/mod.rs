pub mod local;
pub mod server;

use crate::config::Config;
use crate::error::Result;
use crate::models::ModelRegistry;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

pub use local::LocalBackend;
pub use server::ServerBackend;

/// Message role in a chat transcript
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

impl Role {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::System => "system",
            Self::User => "user",
            Self::Assistant => "assistant",
        }
    }
}

/// A single role-tagged message
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// Unified interface for inference backends
#[async_trait]
pub trait ChatBackend: Send + Sync {
    /// Generate the assistant reply for a transcript of role-tagged messages
    async fn chat(&self, messages: &[ChatMessage]) -> Result<String>;

    /// Get backend name for logging/debugging
    fn backend_name(&self) -> &str;
}

/// Backend enum wrapper for dynamic dispatch
///
/// The two bindings diverge in how they see models: the local binding
/// needs the registry-resolved GGUF path, the server binding only the
/// alias the server knows the model by. Both sit behind the same chat
/// contract.
#[derive(Debug)]
pub enum Backend {
    Local(LocalBackend),
    Server(ServerBackend),
}

impl Backend {
    /// Create a backend for `alias` from config, overriding the configured
    /// kind with `kind_override` when given (the `--backend` flag)
    pub fn from_config(
        config: &Config,
        registry: &ModelRegistry,
        alias: &str,
        kind_override: Option<&str>,
    ) -> Result<Self> {
        let kind = kind_override.unwrap_or(config.backend.kind.as_str());

        match kind {
            "local" => {
                let model_path = registry.resolve(alias)?;
                Ok(Self::Local(LocalBackend::new(config, model_path)?))
            }
            "server" => Ok(Self::Server(ServerBackend::new(config, alias)?)),
            _ => Err(crate::error::DeltaError::Config(format!(
                "Unknown backend: {kind}. Must be 'local' or 'server'"
            ))),
        }
    }

    /// Generate a reply using the configured backend
    pub async fn chat(&self, messages: &[ChatMessage]) -> Result<String> {
        match self {
            Self::Local(b) => b.chat(messages).await,
            Self::Server(b) => b.chat(messages).await,
        }
    }

    /// Get backend name
    #[must_use]
    pub fn backend_name(&self) -> &str {
        match self {
            Self::Local(b) => b.backend_name(),
            Self::Server(b) => b.backend_name(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::DeltaError;
    use tempfile::TempDir;

    #[test]
    fn test_role_serializes_lowercase() {
        let msg = ChatMessage::user("hi");
        let json = serde_json::to_value(&msg).unwrap();
        assert_eq!(json["role"], "user");
        assert_eq!(json["content"], "hi");
    }

    #[test]
    fn test_backend_selection_invalid() {
        let dir = TempDir::new().unwrap();
        let registry = ModelRegistry::load(dir.path().join("models.json")).unwrap();
        let config = Config::default();

        let result = Backend::from_config(&config, &registry, "llama3", Some("remote"));
        assert!(matches!(result, Err(DeltaError::Config(_))));
    }

    #[test]
    fn test_local_backend_requires_registered_alias() {
        let dir = TempDir::new().unwrap();
        let registry = ModelRegistry::load(dir.path().join("models.json")).unwrap();
        let config = Config::default();

        let result = Backend::from_config(&config, &registry, "llama3", Some("local"));
        assert!(matches!(result, Err(DeltaError::NotFound(_))));
    }
}
