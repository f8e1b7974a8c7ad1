//! Asset kinds and build targets

use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// Extension of metadata sidecar files
pub const META_EXTENSION: &str = "meta";

/// Type tag of a source asset
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AssetKind {
    /// Record with no type-specific data
    Base,
    Texture,
    Model,
    Shader,
    Font,
    Audio,
    Material,
}

impl AssetKind {
    /// Kinds that have a compiler and a resource type
    pub const COMPILABLE: [AssetKind; 6] = [
        AssetKind::Texture,
        AssetKind::Model,
        AssetKind::Shader,
        AssetKind::Font,
        AssetKind::Audio,
        AssetKind::Material,
    ];

    /// Source file extensions, lowercase
    pub fn source_extensions(self) -> &'static [&'static str] {
        match self {
            AssetKind::Base => &[],
            AssetKind::Texture => &["png", "jpg", "jpeg", "bmp"],
            AssetKind::Model => &["obj", "gltf", "glb"],
            AssetKind::Shader => &["vert", "frag", "wgsl"],
            AssetKind::Font => &["ttf", "otf"],
            AssetKind::Audio => &["wav", "ogg", "mp3", "flac"],
            AssetKind::Material => &["mat"],
        }
    }

    /// Extension of the compiled artifact
    pub fn compiled_extension(self) -> Option<&'static str> {
        match self {
            AssetKind::Base => None,
            AssetKind::Texture => Some("dds"),
            AssetKind::Model => Some("mesh"),
            AssetKind::Shader => Some("shader"),
            AssetKind::Font => Some("font"),
            AssetKind::Audio => Some("audio"),
            AssetKind::Material => Some("material"),
        }
    }

    /// Classify a source file by extension (case-insensitive)
    pub fn from_source_path(path: &Path) -> Option<Self> {
        let ext = lowercase_extension(path)?;
        Self::COMPILABLE
            .into_iter()
            .find(|kind| kind.source_extensions().contains(&ext.as_str()))
    }

    /// Classify a compiled artifact by extension (case-insensitive)
    pub fn from_compiled_path(path: &Path) -> Option<Self> {
        let ext = lowercase_extension(path)?;
        Self::COMPILABLE
            .into_iter()
            .find(|kind| kind.compiled_extension() == Some(ext.as_str()))
    }

    /// Stable one-byte tag used in artifact headers
    pub fn tag(self) -> u8 {
        match self {
            AssetKind::Base => 0,
            AssetKind::Texture => 1,
            AssetKind::Model => 2,
            AssetKind::Shader => 3,
            AssetKind::Font => 4,
            AssetKind::Audio => 5,
            AssetKind::Material => 6,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            AssetKind::Base => "base",
            AssetKind::Texture => "texture",
            AssetKind::Model => "model",
            AssetKind::Shader => "shader",
            AssetKind::Font => "font",
            AssetKind::Audio => "audio",
            AssetKind::Material => "material",
        }
    }
}

impl fmt::Display for AssetKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Platform an artifact is compiled for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BuildTarget {
    #[default]
    Desktop,
    Android,
}

impl fmt::Display for BuildTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BuildTarget::Desktop => f.write_str("desktop"),
            BuildTarget::Android => f.write_str("android"),
        }
    }
}

/// Lowercased file extension, if any
pub fn lowercase_extension(path: &Path) -> Option<String> {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
}

/// True for `*.meta` sidecars
pub fn is_meta_file(path: &Path) -> bool {
    lowercase_extension(path).as_deref() == Some(META_EXTENSION)
}

/// Path under which an asset is identified.
///
/// Shader programs are the union of `stem.vert` and `stem.frag`, so they are
/// addressed by `dir/stem` with no extension. Every other kind is addressed
/// by its source path.
pub fn canonical_asset_path(source: &Path, kind: AssetKind) -> PathBuf {
    match kind {
        AssetKind::Shader => match lowercase_extension(source).as_deref() {
            Some("vert") | Some("frag") => source.with_extension(""),
            _ => source.to_path_buf(),
        },
        _ => source.to_path_buf(),
    }
}

/// Desktop artifact path: beside the source, with the compiled extension
pub fn desktop_compiled_path(canonical: &Path, kind: AssetKind) -> Option<PathBuf> {
    let ext = kind.compiled_extension()?;
    if is_shader_program_path(canonical, kind) {
        Some(append_extension(canonical, ext))
    } else {
        Some(canonical.with_extension(ext))
    }
}

/// Stage sources of a `.vert`/`.frag` shader program that exist on disk
pub fn shader_stage_sources(canonical: &Path) -> Vec<PathBuf> {
    ["vert", "frag"]
        .iter()
        .map(|ext| append_extension(canonical, ext))
        .filter(|p| p.is_file())
        .collect()
}

/// True when a canonical path names a live source (a file, or shader stages)
pub fn source_exists(canonical: &Path) -> bool {
    canonical.is_file() || !shader_stage_sources(canonical).is_empty()
}

/// `path` + `.ext`, without replacing an existing extension
pub fn append_extension(path: &Path, ext: &str) -> PathBuf {
    let mut os = path.as_os_str().to_owned();
    os.push(".");
    os.push(ext);
    PathBuf::from(os)
}

fn is_shader_program_path(canonical: &Path, kind: AssetKind) -> bool {
    kind == AssetKind::Shader && lowercase_extension(canonical).as_deref() != Some("wgsl")
}
