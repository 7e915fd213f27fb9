//! Configuration module for delta
//!
//! Loads config from `$XDG_CONFIG_HOME/delta/config.toml` or `~/.config/delta/config.toml`.
//! Falls back to embedded defaults if file doesn't exist.
//! Partial configs are merged with defaults using serde's default attributes.
//!
//! # Example
//!
//! ```no_run
//! use delta::config::Config;
//!
//! let config = Config::load().expect("Failed to load config");
//! println!("Backend: {}", config.backend.kind);
//! println!("Server: {}", config.backend.server_url);
//! ```

pub mod schema;

pub use schema::Config;
