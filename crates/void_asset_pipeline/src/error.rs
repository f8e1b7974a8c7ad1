//! Error types for the asset pipeline

use std::io;
use std::path::PathBuf;

use thiserror::Error;
use void_asset::AssetError;

/// Asset pipeline errors
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Extension maps to no asset kind
    #[error("Unsupported asset extension: {0:?}")]
    UnsupportedExtension(PathBuf),

    /// Source decodes but uses a layout the compiler rejects
    #[error("Unsupported format in {path:?}: {reason}")]
    UnsupportedFormat { path: PathBuf, reason: String },

    /// Source could not be decoded
    #[error("Failed to decode {path:?}: {reason}")]
    Decode { path: PathBuf, reason: String },

    /// Shader source failed to parse
    #[error("Shader parse error in {path:?}: {reason}")]
    ShaderParse { path: PathBuf, reason: String },

    /// Shader parsed but failed validation
    #[error("Shader validation failed for {path:?}: {reason}")]
    ShaderValidation { path: PathBuf, reason: String },

    /// Another source in the same directory already builds this artifact
    #[error("{path:?} would overwrite the compiled artifact of {owner:?}")]
    ArtifactCollision { path: PathBuf, owner: PathBuf },

    #[error("Source asset not found: {0:?}")]
    SourceMissing(PathBuf),

    #[error("I/O error on {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Compiler reported success without producing an artifact
    #[error("Compiler produced no output for {0:?}")]
    EmptyOutput(PathBuf),

    /// Identity or metadata failure
    #[error(transparent)]
    Asset(#[from] AssetError),

    #[error("Asset pipeline is not initialized")]
    NotInitialized,

    #[error("A bulk compile is already running")]
    BulkCompileInProgress,

    #[error("Invalid pipeline configuration: {0}")]
    Config(String),

    #[cfg(feature = "file-watcher")]
    #[error("File watcher error: {0}")]
    Watch(#[from] notify::Error),
}

impl PipelineError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Io { path: path.into(), source }
    }

    pub(crate) fn decode(path: impl Into<PathBuf>, reason: impl ToString) -> Self {
        Self::Decode { path: path.into(), reason: reason.to_string() }
    }

    pub(crate) fn unsupported(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self::UnsupportedFormat { path: path.into(), reason: reason.into() }
    }
}

/// Result type for pipeline operations
pub type Result<T> = std::result::Result<T, PipelineError>;
