use thiserror::Error;

/// Main error type for Delta
#[derive(Error, Debug)]
pub enum DeltaError {
    #[error("Model '{0}' is not registered\n\nTroubleshooting:\n- List installed models: delta list\n- Pull it first: delta pull {0} --repo <hf-repo> --file <gguf-file>")]
    NotFound(String),

    #[error("Model registry at {path} is corrupt: {reason}\n\nTroubleshooting:\n- Inspect the file by hand; it should be a flat JSON object of alias -> path\n- Move it aside and re-pull your models if it cannot be repaired")]
    StoreCorrupt { path: String, reason: String },

    #[error("Registry I/O error: {0}")]
    StoreIo(std::io::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Download error: {0}\n\nTroubleshooting:\n- Check internet connectivity\n- Verify the repo id and filename on huggingface.co\n- Ensure enough free space under ~/.delta/models")]
    Download(String),

    #[error("Inference error: {0}")]
    Inference(#[from] InferenceError),

    #[error("Search error: {0}\n\nTroubleshooting:\n- Check internet connectivity\n- Try a different source (--wiki, --arxiv, --ddg)\n- Rephrase the query")]
    Search(String),

    #[error("Config error: {0}\n\nTroubleshooting:\n- Check config file: ~/.config/delta/config.toml\n- Run with RUST_LOG=debug for more details")]
    Config(String),
}

/// Inference-specific errors, shared by both backend bindings
#[derive(Error, Debug)]
pub enum InferenceError {
    #[error("Server error: {0}\n\nTroubleshooting:\n- Is the model server running? Check server_url in config\n- Verify the model name is known to the server: delta list")]
    Server(String),

    #[error("Network error: {0}\n\nTroubleshooting:\n- Check that the server is reachable\n- Try increasing timeout_secs in config")]
    Network(String),

    #[error("Local runner error: {0}\n\nTroubleshooting:\n- Is llama-cli installed and in PATH?\n- Verify the model file exists and is a valid GGUF")]
    Runner(String),
}

pub type Result<T> = std::result::Result<T, DeltaError>;
