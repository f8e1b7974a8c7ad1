//! Error types for asset identity and metadata

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Identity and metadata errors
#[derive(Debug, Error)]
pub enum AssetError {
    /// Filesystem failure on a sidecar or artifact
    #[error("I/O error on {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Sidecar exists but cannot be parsed
    #[error("Malformed metadata file {path:?}: {source}")]
    MetaParse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// GUID string could not be parsed
    #[error("Invalid GUID: {0}")]
    InvalidGuid(String),

    /// Extension does not belong to any asset kind
    #[error("Unsupported asset extension: {0:?}")]
    UnsupportedExtension(PathBuf),
}

impl AssetError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Io { path: path.into(), source }
    }
}

/// Result type for identity and metadata operations
pub type Result<T> = std::result::Result<T, AssetError>;
