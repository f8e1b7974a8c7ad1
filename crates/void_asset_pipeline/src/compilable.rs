//! Per-type compile contract
//!
//! Every asset kind has one compiler implementing [`Compilable`]. The
//! compiler reads the canonical source, writes the artifact to the output
//! path it is given and reports the path back. Compilers touch no shared
//! state, so bulk compiles run them on a worker thread.

use std::path::{Path, PathBuf};

use void_asset::{AssetKind, AssetMeta, BuildTarget, ImportSettings};

use crate::error::Result;
use crate::payloads::{
    AudioCompiler, FontCompiler, MaterialCompiler, ModelCompiler, ShaderCompiler, TextureCompiler,
};

/// Inputs of one compile
#[derive(Debug, Clone, Copy)]
pub struct CompileContext<'a> {
    /// Canonical source path
    pub source: &'a Path,
    /// Artifact path to write
    pub output: &'a Path,
    pub target: BuildTarget,
}

/// Compiles one kind of source asset into its runtime artifact
pub trait Compilable: Send {
    fn kind(&self) -> AssetKind;

    /// Compile and return the artifact path
    fn compile_to_resource(&self, ctx: &CompileContext<'_>) -> Result<PathBuf>;

    /// Record type-specific settings into the asset's metadata
    fn extend_meta(&self, meta: &mut AssetMeta) {
        let _ = meta;
    }
}

/// Compiler for a kind, configured from its import settings.
///
/// Settings of the wrong shape fall back to the kind's defaults.
pub fn compiler_for(kind: AssetKind, import: &ImportSettings) -> Option<Box<dyn Compilable>> {
    let compiler: Box<dyn Compilable> = match kind {
        AssetKind::Texture => Box::new(TextureCompiler::new(import.texture().cloned().unwrap_or_default())),
        AssetKind::Model => Box::new(ModelCompiler::new(import.model().copied().unwrap_or_default())),
        AssetKind::Shader => Box::new(ShaderCompiler),
        AssetKind::Font => Box::new(FontCompiler),
        AssetKind::Audio => Box::new(AudioCompiler),
        AssetKind::Material => Box::new(MaterialCompiler),
        AssetKind::Base => return None,
    };
    Some(compiler)
}

#[cfg(test)]
mod tests {
    use super::*;
    use void_asset::{Guid, TextureImport};

    #[test]
    fn test_dispatch_covers_compilable_kinds() {
        for kind in AssetKind::COMPILABLE {
            let compiler = compiler_for(kind, &ImportSettings::default_for(kind)).unwrap();
            assert_eq!(compiler.kind(), kind);
        }
        assert!(compiler_for(AssetKind::Base, &ImportSettings::Base).is_none());
    }

    #[test]
    fn test_texture_settings_written_to_meta() {
        let import = TextureImport { slot: 3, flip_uvs: false, ..TextureImport::default() };
        let compiler = compiler_for(AssetKind::Texture, &ImportSettings::Texture(import.clone())).unwrap();

        let mut meta = AssetMeta::new(Guid::generate(), AssetKind::Texture, "t.png");
        compiler.extend_meta(&mut meta);
        assert_eq!(meta.import.texture(), Some(&import));
    }
}
