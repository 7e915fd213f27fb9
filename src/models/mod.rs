pub mod download;
pub mod registry;

pub use download::ModelDownloader;
pub use registry::ModelRegistry;
