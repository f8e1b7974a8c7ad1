//! Build target output paths
//!
//! Desktop artifacts sit beside their sources. Android artifacts mirror the
//! asset tree under the Android asset root, with every path component made
//! safe for the packager: non-ASCII characters become `_` and leading
//! underscores are dropped (the packager skips names starting with `_`).

use std::path::{Component, Path, PathBuf};

use void_asset::kind::desktop_compiled_path;
use void_asset::{AssetKind, BuildTarget};

/// Where the artifact of `canonical` goes for `target`
pub fn compiled_path_for(
    target: BuildTarget,
    asset_root: &Path,
    android_root: &Path,
    canonical: &Path,
    kind: AssetKind,
) -> Option<PathBuf> {
    match target {
        BuildTarget::Desktop => desktop_compiled_path(canonical, kind),
        BuildTarget::Android => android_compiled_path(asset_root, android_root, canonical, kind),
    }
}

/// Mirrored, sanitized artifact path under the Android root
pub fn android_compiled_path(
    asset_root: &Path,
    android_root: &Path,
    canonical: &Path,
    kind: AssetKind,
) -> Option<PathBuf> {
    let desktop = desktop_compiled_path(canonical, kind)?;
    let relative = match desktop.strip_prefix(asset_root) {
        Ok(relative) => relative.to_path_buf(),
        Err(_) => PathBuf::from(desktop.file_name()?),
    };
    Some(android_root.join(sanitize_relative(&relative)))
}

/// Path of an Android artifact relative to the Android root
pub fn extract_relative_android_path(android_root: &Path, full: &Path) -> Option<PathBuf> {
    full.strip_prefix(android_root).ok().map(Path::to_path_buf)
}

/// Sanitize each normal component of a relative path
pub fn sanitize_relative(relative: &Path) -> PathBuf {
    relative
        .components()
        .filter_map(|component| match component {
            Component::Normal(name) => Some(sanitize_component(&name.to_string_lossy())),
            _ => None,
        })
        .collect()
}

/// Replace non-ASCII characters with `_`, then strip leading underscores
pub fn sanitize_component(name: &str) -> String {
    let replaced: String = name
        .chars()
        .map(|c| if c.is_ascii() { c } else { '_' })
        .collect();
    let trimmed = replaced.trim_start_matches('_');
    if trimmed.is_empty() {
        "asset".to_string()
    } else {
        trimmed.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_component() {
        assert_eq!(sanitize_component("tex.png"), "tex.png");
        assert_eq!(sanitize_component("_hidden.dds"), "hidden.dds");
        assert_eq!(sanitize_component("héllo.dds"), "h_llo.dds");
        assert_eq!(sanitize_component("ébène.dds"), "b_ne.dds");
        assert_eq!(sanitize_component("___"), "asset");
    }

    #[test]
    fn test_android_mirror_path() {
        let path = android_compiled_path(
            Path::new("Resources"),
            Path::new("android/assets"),
            Path::new("Resources/Textures/_ui/bouton_vérifié.png"),
            AssetKind::Texture,
        )
        .unwrap();
        assert_eq!(path, PathBuf::from("android/assets/Textures/ui/bouton_v_rifi_.dds"));

        let relative = extract_relative_android_path(Path::new("android/assets"), &path).unwrap();
        assert_eq!(relative, PathBuf::from("Textures/ui/bouton_v_rifi_.dds"));
    }

    #[test]
    fn test_outside_root_uses_file_name() {
        let path = android_compiled_path(
            Path::new("Resources"),
            Path::new("android"),
            Path::new("elsewhere/model.obj"),
            AssetKind::Model,
        )
        .unwrap();
        assert_eq!(path, PathBuf::from("android/model.mesh"));
    }

    #[test]
    fn test_desktop_beside_source() {
        let path = compiled_path_for(
            BuildTarget::Desktop,
            Path::new("Resources"),
            Path::new("android"),
            Path::new("Resources/shaders/basic"),
            AssetKind::Shader,
        );
        assert_eq!(path, Some(PathBuf::from("Resources/shaders/basic.shader")));
    }
}
