pub mod loader;
pub mod resolver;

use std::path::PathBuf;
use thiserror::Error;

pub use loader::{discover_manifest, load_manifest, locate_and_load, parse_manifest, ManifestFormat};
pub use resolver::{resolve, resolve_from_cwd};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("No deployment manifest found in {dir}")]
    NotFound { dir: PathBuf },

    #[error("Failed to read manifest {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid JSON manifest: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid YAML manifest: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("No remote host configured")]
    MissingRemote,
}

pub type Result<T> = std::result::Result<T, ConfigError>;
