#![allow(clippy::multiple_crate_versions)]

pub mod chat;
pub mod config;
pub mod error;
pub mod inference;
pub mod models;
pub mod search;

pub use error::{DeltaError, Result};
