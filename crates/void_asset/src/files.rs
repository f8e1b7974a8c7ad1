//! Filesystem helpers shared by the identity layer and the cache

use std::collections::BTreeSet;
use std::fs;
use std::io;
use std::path::{Component, Path, PathBuf};
use std::time::SystemTime;

use crate::kind::{canonical_asset_path, desktop_compiled_path, shader_stage_sources, AssetKind};

/// Absolute, lexically normalized form of `path`.
///
/// Relative paths are joined onto the working directory. `.` and `..` are
/// folded without touching the filesystem, so paths that no longer exist
/// normalize the same way as live ones.
pub fn absolute_path(path: &Path) -> PathBuf {
    let joined = if path.is_absolute() {
        path.to_path_buf()
    } else {
        match std::env::current_dir() {
            Ok(cwd) => cwd.join(path),
            Err(e) => {
                log::warn!("No working directory to resolve {:?} against: {}", path, e);
                path.to_path_buf()
            }
        }
    };

    let mut normalized = PathBuf::new();
    for component in joined.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                normalized.pop();
            }
            other => normalized.push(other.as_os_str()),
        }
    }
    normalized
}

/// Canonical sources beside `canonical` that build the same desktop
/// artifact, sorted. `tex.png` and `tex.bmp` both claim `tex.dds`;
/// `sky.wgsl` and the `sky.vert`/`sky.frag` pair both claim `sky.shader`.
pub fn artifact_claimants(canonical: &Path, kind: AssetKind) -> io::Result<Vec<PathBuf>> {
    let (Some(artifact), Some(dir)) = (desktop_compiled_path(canonical, kind), canonical.parent()) else {
        return Ok(Vec::new());
    };

    let mut claimants = BTreeSet::new();
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        if !path.is_file() {
            continue;
        }
        let Some(other_kind) = AssetKind::from_source_path(&path) else {
            continue;
        };
        let other = canonical_asset_path(&path, other_kind);
        if desktop_compiled_path(&other, other_kind).as_deref() == Some(artifact.as_path()) {
            claimants.insert(other);
        }
    }
    Ok(claimants.into_iter().collect())
}

/// Remove a file, treating "already gone" as success.
///
/// Returns `Ok(true)` when a file was deleted and `Ok(false)` when there was
/// nothing to delete.
pub fn remove_file_if_exists(path: &Path) -> io::Result<bool> {
    match fs::remove_file(path) {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            log::warn!("Tried to remove missing file {:?}", path);
            Ok(false)
        }
        Err(e) => Err(e),
    }
}

/// Modification time of a canonical source.
///
/// For a shader program addressed by its stem this is the newest stage file.
pub fn source_modified_time(canonical: &Path) -> io::Result<SystemTime> {
    if canonical.is_file() {
        return fs::metadata(canonical)?.modified();
    }

    let mut newest: Option<SystemTime> = None;
    for stage in shader_stage_sources(canonical) {
        let modified = fs::metadata(&stage)?.modified()?;
        newest = Some(newest.map_or(modified, |n| n.max(modified)));
    }

    newest.ok_or_else(|| {
        io::Error::new(
            io::ErrorKind::NotFound,
            format!("source {:?} does not exist", canonical),
        )
    })
}

/// Every regular file under `root`, recursively, in sorted order
pub fn collect_files(root: &Path) -> io::Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    collect_into(root, &mut files)?;
    files.sort();
    Ok(files)
}

fn collect_into(dir: &Path, files: &mut Vec<PathBuf>) -> io::Result<()> {
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_dir() {
            if let Err(e) = collect_into(&path, files) {
                log::warn!("Failed to scan {:?}: {}", path, e);
            }
        } else if path.is_file() {
            files.push(path);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_remove_missing_is_success() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("gone.dds");
        assert!(!remove_file_if_exists(&path).unwrap());

        fs::write(&path, b"x").unwrap();
        assert!(remove_file_if_exists(&path).unwrap());
        assert!(!path.exists());
    }

    #[test]
    fn test_shader_stem_modified_time() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("basic.vert"), "void main() {}").unwrap();
        fs::write(dir.path().join("basic.frag"), "void main() {}").unwrap();

        assert!(source_modified_time(&dir.path().join("basic")).is_ok());
        assert!(source_modified_time(&dir.path().join("missing")).is_err());
    }

    #[test]
    fn test_absolute_path_folds_dots() {
        let cwd = std::env::current_dir().unwrap();
        assert_eq!(absolute_path(Path::new("Resources/./tex.png")), cwd.join("Resources/tex.png"));
        assert_eq!(absolute_path(Path::new("/assets/sub/../tex.png")), PathBuf::from("/assets/tex.png"));
        assert_eq!(absolute_path(Path::new("/assets/tex.png")), PathBuf::from("/assets/tex.png"));
    }

    #[test]
    fn test_artifact_claimants_share_stem() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["tex.png", "tex.bmp", "tex.obj", "sky.wgsl", "sky.vert", "sky.frag", "other.png"] {
            fs::write(dir.path().join(name), b"").unwrap();
        }

        let textures = artifact_claimants(&dir.path().join("tex.png"), AssetKind::Texture).unwrap();
        assert_eq!(textures, vec![dir.path().join("tex.bmp"), dir.path().join("tex.png")]);

        let shaders = artifact_claimants(&dir.path().join("sky.wgsl"), AssetKind::Shader).unwrap();
        assert_eq!(shaders, vec![dir.path().join("sky"), dir.path().join("sky.wgsl")]);

        let alone = artifact_claimants(&dir.path().join("other.png"), AssetKind::Texture).unwrap();
        assert_eq!(alone, vec![dir.path().join("other.png")]);
    }

    #[test]
    fn test_collect_files_recursive() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("a/b")).unwrap();
        fs::write(dir.path().join("top.png"), b"").unwrap();
        fs::write(dir.path().join("a/b/deep.obj"), b"").unwrap();

        let files = collect_files(dir.path()).unwrap();
        assert_eq!(files.len(), 2);
        assert!(files.iter().any(|p| p.ends_with("a/b/deep.obj")));
    }
}
