//! Compiled artifact container
//!
//! Every non-texture artifact is a small fixed header followed by a bincode
//! payload:
//!
//! | offset | size | field                |
//! |--------|------|----------------------|
//! | 0      | 4    | magic `VOID`         |
//! | 4      | 1    | asset kind tag       |
//! | 5      | 2    | format version (LE)  |
//! | 7      | ..   | bincode payload      |

use std::fs;
use std::path::Path;

use void_asset::kind::append_extension;

use serde::de::DeserializeOwned;
use serde::Serialize;
use void_asset::{AssetKind, LoadError, LoadResult};

use crate::error::{PipelineError, Result};

pub const ARTIFACT_MAGIC: [u8; 4] = *b"VOID";
pub const ARTIFACT_VERSION: u16 = 1;
const HEADER_LEN: usize = 7;

/// Serialize `payload` into an artifact file, creating parent directories
pub fn write_artifact<T: Serialize>(path: &Path, kind: AssetKind, payload: &T) -> Result<()> {
    let body = bincode::serialize(payload).map_err(|e| PipelineError::decode(path, e))?;

    let mut bytes = Vec::with_capacity(HEADER_LEN + body.len());
    bytes.extend_from_slice(&ARTIFACT_MAGIC);
    bytes.push(kind.tag());
    bytes.extend_from_slice(&ARTIFACT_VERSION.to_le_bytes());
    bytes.extend_from_slice(&body);

    write_bytes(path, &bytes)
}

/// Write raw artifact bytes, creating parent directories.
///
/// The bytes go to a sibling `.tmp` first and are renamed into place, so a
/// reader never sees a half-written artifact.
pub fn write_bytes(path: &Path, bytes: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|e| PipelineError::io(parent, e))?;
    }

    let tmp = append_extension(path, "tmp");
    fs::write(&tmp, bytes).map_err(|e| PipelineError::io(&tmp, e))?;
    if let Err(e) = fs::rename(&tmp, path) {
        let _ = fs::remove_file(&tmp);
        return Err(PipelineError::io(path, e));
    }
    Ok(())
}

/// Read and validate an artifact written by [`write_artifact`]
pub fn read_artifact<T: DeserializeOwned>(path: &Path, kind: AssetKind) -> LoadResult<T> {
    let bytes = fs::read(path).map_err(|e| LoadError::from_io(path, e))?;

    if bytes.len() < HEADER_LEN || bytes[..4] != ARTIFACT_MAGIC {
        return Err(LoadError::corrupt(path, "missing artifact header"));
    }
    if bytes[4] != kind.tag() {
        return Err(LoadError::corrupt(
            path,
            format!("artifact holds kind tag {}, expected {}", bytes[4], kind.tag()),
        ));
    }
    let version = u16::from_le_bytes([bytes[5], bytes[6]]);
    if version != ARTIFACT_VERSION {
        return Err(LoadError::corrupt(path, format!("artifact format version {}", version)));
    }

    bincode::deserialize(&bytes[HEADER_LEN..]).map_err(|e| LoadError::corrupt(path, e.to_string()))
}
