//! Asset metadata records
//!
//! One `AssetMeta` exists per source asset. It pairs the asset's GUID with
//! its source and compiled paths and records what the last compile saw.
//! On disk it is stored as `<source>.meta`, a JSON object wrapped in an
//! `AssetMetaData` key.

use std::path::{Path, PathBuf};
use std::time::SystemTime;

use serde::{Deserialize, Serialize};

use crate::guid::Guid;
use crate::kind::{AssetKind, BuildTarget};

/// Schema version written by this build. Older records are stale.
pub const CURRENT_METADATA_VERSION: u32 = 7;

/// Texture import parameters
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextureImport {
    /// Material slot semantic ("diffuse", "normal", "specular", ...)
    pub texture_type: String,
    /// Texture unit the renderer binds to
    pub slot: u32,
    /// Flip rows so UV (0,0) is bottom-left
    pub flip_uvs: bool,
    pub generate_mipmaps: bool,
}

impl Default for TextureImport {
    fn default() -> Self {
        Self {
            texture_type: "diffuse".to_string(),
            slot: 0,
            flip_uvs: true,
            generate_mipmaps: true,
        }
    }
}

/// Model import parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelImport {
    /// Merge bit-identical vertices
    pub optimize_vertices: bool,
    /// Generate flat normals when the source has none
    pub generate_normals: bool,
}

impl Default for ModelImport {
    fn default() -> Self {
        Self {
            optimize_vertices: true,
            generate_normals: true,
        }
    }
}

/// Type-specific extension of a metadata record
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImportSettings {
    #[default]
    Base,
    Texture(TextureImport),
    Model(ModelImport),
}

impl ImportSettings {
    /// Default settings for a kind
    pub fn default_for(kind: AssetKind) -> Self {
        match kind {
            AssetKind::Texture => ImportSettings::Texture(TextureImport::default()),
            AssetKind::Model => ImportSettings::Model(ModelImport::default()),
            _ => ImportSettings::Base,
        }
    }

    pub fn texture(&self) -> Option<&TextureImport> {
        match self {
            ImportSettings::Texture(t) => Some(t),
            _ => None,
        }
    }

    pub fn model(&self) -> Option<&ModelImport> {
        match self {
            ImportSettings::Model(m) => Some(m),
            _ => None,
        }
    }
}

/// Persistent descriptor of one source asset
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssetMeta {
    pub version: u32,
    pub guid: Guid,
    pub kind: AssetKind,
    /// Canonical source path
    pub source: PathBuf,
    /// Desktop artifact
    pub compiled: Option<PathBuf>,
    /// Android artifact, tracked independently of the desktop one
    #[serde(default)]
    pub android_compiled: Option<PathBuf>,
    /// Bumped on every successful compile
    #[serde(default)]
    pub revision: u32,
    /// Source modification time seen by the last desktop compile
    pub source_modified: SystemTime,
    /// Source modification time seen by the last Android compile
    #[serde(default)]
    pub android_source_modified: Option<SystemTime>,
    pub compiled_at: SystemTime,
    #[serde(default)]
    pub import: ImportSettings,
}

impl AssetMeta {
    /// Fresh record for a source that has never been compiled
    pub fn new(guid: Guid, kind: AssetKind, source: impl Into<PathBuf>) -> Self {
        Self {
            version: CURRENT_METADATA_VERSION,
            guid,
            kind,
            source: source.into(),
            compiled: None,
            android_compiled: None,
            revision: 0,
            source_modified: SystemTime::UNIX_EPOCH,
            android_source_modified: None,
            compiled_at: SystemTime::UNIX_EPOCH,
            import: ImportSettings::default_for(kind),
        }
    }

    /// Artifact for a build target
    pub fn compiled_for(&self, target: BuildTarget) -> Option<&Path> {
        match target {
            BuildTarget::Desktop => self.compiled.as_deref(),
            BuildTarget::Android => self.android_compiled.as_deref(),
        }
    }

    pub fn set_compiled_for(&mut self, target: BuildTarget, path: PathBuf) {
        match target {
            BuildTarget::Desktop => self.compiled = Some(path),
            BuildTarget::Android => self.android_compiled = Some(path),
        }
    }

    /// Source modification time the `target` artifact was built from.
    /// A desktop record that was never compiled reports the epoch.
    pub fn source_modified_for(&self, target: BuildTarget) -> Option<SystemTime> {
        match target {
            BuildTarget::Desktop => Some(self.source_modified),
            BuildTarget::Android => self.android_source_modified,
        }
    }

    /// Record a finished compile for one target, leaving the other untouched
    pub fn record_compile(&mut self, target: BuildTarget, compiled: PathBuf, source_modified: SystemTime) {
        self.set_compiled_for(target, compiled);
        match target {
            BuildTarget::Desktop => self.source_modified = source_modified,
            BuildTarget::Android => self.android_source_modified = Some(source_modified),
        }
    }

    /// Forget the Android artifact and its fingerprint
    pub fn clear_android(&mut self) {
        self.android_compiled = None;
        self.android_source_modified = None;
    }

    /// True when the artifact for `target` is recorded and present on disk
    pub fn has_artifact(&self, target: BuildTarget) -> bool {
        self.compiled_for(target).map(Path::exists).unwrap_or(false)
    }

    pub fn is_current_version(&self) -> bool {
        self.version >= CURRENT_METADATA_VERSION
    }
}

/// On-disk envelope of a sidecar
#[derive(Debug, Serialize, Deserialize)]
pub(crate) struct MetaFile {
    #[serde(rename = "AssetMetaData")]
    pub meta: AssetMeta,
}
