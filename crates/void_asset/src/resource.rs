//! Loadable resources
//!
//! A resource type knows how to turn a compiled artifact into its runtime
//! form. Loading is blocking and happens on the caller's thread.

use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::kind::AssetKind;

/// Error during resource loading
#[derive(Debug, Clone, Error)]
pub enum LoadError {
    /// Compiled artifact does not exist
    #[error("Compiled resource not found: {0:?}")]
    NotFound(PathBuf),

    #[error("I/O error reading {path:?}: {message}")]
    Io { path: PathBuf, message: String },

    /// Artifact exists but its contents are unusable; recompiling may help
    #[error("Corrupt resource {path:?}: {reason}")]
    Corrupt { path: PathBuf, reason: String },

    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),

    /// Identity resolved to an asset of another kind
    #[error("Expected a {expected} resource, found {found}")]
    KindMismatch { expected: AssetKind, found: AssetKind },
}

impl LoadError {
    pub fn from_io(path: &Path, err: io::Error) -> Self {
        if err.kind() == io::ErrorKind::NotFound {
            Self::NotFound(path.to_path_buf())
        } else {
            Self::Io {
                path: path.to_path_buf(),
                message: err.to_string(),
            }
        }
    }

    pub fn corrupt(path: &Path, reason: impl Into<String>) -> Self {
        Self::Corrupt {
            path: path.to_path_buf(),
            reason: reason.into(),
        }
    }

    /// True when a recompile from source could fix the failure
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::NotFound(_) | Self::Corrupt { .. })
    }
}

/// Result type for resource loading
pub type LoadResult<T> = Result<T, LoadError>;

/// A resource loaded from one compiled artifact
pub trait Loadable: Sized + Send + Sync + 'static {
    /// Kind of asset this resource is compiled from
    const KIND: AssetKind;

    /// Load from the compiled artifact. `source` is the canonical source
    /// path, for resources that keep it for diagnostics.
    fn load_resource(compiled: &Path, source: &Path) -> LoadResult<Self>;
}

/// A resource that is instantiated per size (fonts)
pub trait SizedLoadable: Sized + Send + Sync + 'static {
    const KIND: AssetKind;

    fn load_sized(compiled: &Path, source: &Path, size: u32) -> LoadResult<Self>;
}
