//! Identity & metadata layer
//!
//! `MetaFiles` maps canonical source paths to GUIDs and owns the sidecar
//! files that make those GUIDs durable. It answers three questions for the
//! compiler: what is this asset's GUID, does it need compiling, and where is
//! its record on disk.
//!
//! GUIDs are only minted for source paths that have never been seen. A stale
//! record keeps its GUID; the compiler recompiles and rewrites it in place.

use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use crate::error::{AssetError, Result};
use crate::files::{collect_files, remove_file_if_exists, source_modified_time};
use crate::guid::Guid;
use crate::kind::{append_extension, is_meta_file, source_exists, BuildTarget, META_EXTENSION};
use crate::meta::{AssetMeta, MetaFile};

/// Freshness of an asset's identity
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdentityStatus {
    /// No durable record yet; needs compile
    New,
    /// Record exists but predates the source or the schema; needs compile
    Stale,
    /// Record is valid
    Current,
}

impl IdentityStatus {
    pub fn needs_compile(self) -> bool {
        self != IdentityStatus::Current
    }
}

/// Result of resolving a source path to its identity
#[derive(Debug, Clone)]
pub struct GuidLookup {
    pub guid: Guid,
    pub status: IdentityStatus,
    /// The persisted record, when one could be read
    pub meta: Option<AssetMeta>,
}

/// Sidecar store and path/GUID mapping
#[derive(Debug, Default)]
pub struct MetaFiles {
    path_to_guid: HashMap<PathBuf, Guid>,
    guid_to_path: HashMap<Guid, PathBuf>,
}

impl MetaFiles {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sidecar path for a canonical source: `<source>.meta`
    pub fn meta_path(source: &Path) -> PathBuf {
        append_extension(source, META_EXTENSION)
    }

    /// Canonical source a sidecar belongs to
    pub fn source_for_meta(meta_path: &Path) -> PathBuf {
        meta_path.with_extension("")
    }

    pub fn exists(&self, source: &Path) -> bool {
        Self::meta_path(source).is_file()
    }

    /// Read the persisted record, if any
    pub fn read(&self, source: &Path) -> Result<Option<AssetMeta>> {
        let path = Self::meta_path(source);
        let text = match fs::read_to_string(&path) {
            Ok(text) => text,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(AssetError::io(path, e)),
        };

        let file: MetaFile = serde_json::from_str(&text)
            .map_err(|source| AssetError::MetaParse { path, source })?;
        Ok(Some(file.meta))
    }

    /// Resolve the GUID for a canonical source path.
    ///
    /// A GUID already claimed by another live source is not reused; the
    /// copied sidecar gets a fresh identity.
    pub fn guid_for(&mut self, source: &Path) -> Result<GuidLookup> {
        let meta = match self.read(source) {
            Ok(meta) => meta,
            Err(AssetError::MetaParse { path, source: err }) => {
                log::warn!("Ignoring malformed metadata {:?}: {}", path, err);
                None
            }
            Err(e) => return Err(e),
        };

        let Some(meta) = meta else {
            let guid = match self.path_to_guid.get(source) {
                Some(guid) => *guid,
                None => {
                    let guid = Guid::generate();
                    self.register(source, guid);
                    log::debug!("Minted {} for {:?}", guid, source);
                    guid
                }
            };
            return Ok(GuidLookup { guid, status: IdentityStatus::New, meta: None });
        };

        if let Some(owner) = self.guid_to_path.get(&meta.guid) {
            if owner != source && source_exists(owner) {
                let guid = Guid::generate();
                log::warn!(
                    "{:?} carries GUID {} already owned by {:?}; assigning {}",
                    source, meta.guid, owner, guid
                );
                self.register(source, guid);
                return Ok(GuidLookup { guid, status: IdentityStatus::New, meta: None });
            }
        }

        self.register(source, meta.guid);
        let status = if Self::is_record_stale(&meta, source) {
            IdentityStatus::Stale
        } else {
            IdentityStatus::Current
        };

        Ok(GuidLookup { guid: meta.guid, status, meta: Some(meta) })
    }

    /// True when the sidecar is missing, unreadable, from an older schema, or
    /// older than the source file.
    pub fn is_stale(&self, source: &Path) -> bool {
        match self.read(source) {
            Ok(Some(meta)) => Self::is_record_stale(&meta, source),
            _ => true,
        }
    }

    /// Staleness of an in-memory record's desktop artifact against the
    /// source on disk
    pub fn is_record_stale(meta: &AssetMeta, source: &Path) -> bool {
        Self::is_record_stale_for(meta, source, BuildTarget::Desktop)
    }

    /// Staleness of one target's artifact. Each target keeps its own
    /// fingerprint, so building one never makes the other look fresh.
    pub fn is_record_stale_for(meta: &AssetMeta, source: &Path, target: BuildTarget) -> bool {
        if !meta.is_current_version() {
            return true;
        }
        let Some(built_from) = meta.source_modified_for(target) else {
            return true;
        };
        match source_modified_time(source) {
            Ok(modified) => built_from < modified,
            Err(_) => true,
        }
    }

    /// Write the record durably (temp file, then rename)
    pub fn persist(&mut self, meta: &AssetMeta) -> Result<()> {
        #[derive(serde::Serialize)]
        struct MetaFileRef<'a> {
            #[serde(rename = "AssetMetaData")]
            meta: &'a AssetMeta,
        }

        let path = Self::meta_path(&meta.source);
        let json = serde_json::to_string_pretty(&MetaFileRef { meta })
            .map_err(|source| AssetError::MetaParse { path: path.clone(), source })?;

        let tmp = append_extension(&path, "tmp");
        fs::write(&tmp, json).map_err(|e| AssetError::io(&tmp, e))?;
        if let Err(e) = fs::rename(&tmp, &path) {
            let _ = fs::remove_file(&tmp);
            return Err(AssetError::io(path, e));
        }

        self.register(&meta.source, meta.guid);
        Ok(())
    }

    /// Remove the sidecar and forget the mapping.
    ///
    /// Returns `Ok(false)` when there was no sidecar to remove.
    pub fn delete(&mut self, source: &Path) -> Result<bool> {
        let path = Self::meta_path(source);
        self.forget(source);
        remove_file_if_exists(&path).map_err(|e| AssetError::io(path, e))
    }

    /// Delete sidecars under `root` whose source no longer exists, along with
    /// the artifacts they record. Returns the removed sidecar paths.
    pub fn cleanup_orphans(&mut self, root: &Path) -> Result<Vec<PathBuf>> {
        let files = collect_files(root).map_err(|e| AssetError::io(root, e))?;
        let mut removed = Vec::new();

        for meta_path in files.into_iter().filter(|p| is_meta_file(p)) {
            let source = Self::source_for_meta(&meta_path);
            if source_exists(&source) {
                continue;
            }

            if let Ok(Some(meta)) = self.read(&source) {
                for artifact in [meta.compiled.as_deref(), meta.android_compiled.as_deref()]
                    .into_iter()
                    .flatten()
                {
                    if let Err(e) = remove_file_if_exists(artifact) {
                        log::warn!("Failed to remove orphaned artifact {:?}: {}", artifact, e);
                    }
                }
            }

            if self.delete(&source)? {
                log::info!("Removed orphaned metadata {:?}", meta_path);
                removed.push(meta_path);
            }
        }

        Ok(removed)
    }

    /// Record a path/GUID pair in memory
    pub fn register(&mut self, source: &Path, guid: Guid) {
        if let Some(previous) = self.path_to_guid.insert(source.to_path_buf(), guid) {
            if previous != guid {
                self.guid_to_path.remove(&previous);
            }
        }
        self.guid_to_path.insert(guid, source.to_path_buf());
    }

    /// Drop the in-memory mapping for a source
    pub fn forget(&mut self, source: &Path) -> Option<Guid> {
        let guid = self.path_to_guid.remove(source)?;
        if self.guid_to_path.get(&guid).map(PathBuf::as_path) == Some(source) {
            self.guid_to_path.remove(&guid);
        }
        Some(guid)
    }

    pub fn guid_of(&self, source: &Path) -> Option<Guid> {
        self.path_to_guid.get(source).copied()
    }

    pub fn source_of(&self, guid: Guid) -> Option<&Path> {
        self.guid_to_path.get(&guid).map(PathBuf::as_path)
    }

    pub fn len(&self) -> usize {
        self.path_to_guid.len()
    }

    pub fn is_empty(&self) -> bool {
        self.path_to_guid.is_empty()
    }
}
