//! Materials: JSON descriptions compiled into `.material` artifacts

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use void_asset::{AssetKind, LoadResult, Loadable};

use crate::artifact::{read_artifact, write_artifact, write_bytes};
use crate::compilable::{Compilable, CompileContext};
use crate::error::{PipelineError, Result};
use crate::payloads::texture::read_source;

/// Editable material description, as stored in `.mat` files
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MaterialSource {
    pub name: String,
    /// Canonical shader path, relative to the asset root
    pub shader: String,
    pub base_color: [f32; 4],
    pub metallic: f32,
    pub roughness: f32,
    /// Texture slot name -> texture path
    pub textures: BTreeMap<String, String>,
}

impl Default for MaterialSource {
    fn default() -> Self {
        Self {
            name: String::new(),
            shader: String::new(),
            base_color: [1.0, 1.0, 1.0, 1.0],
            metallic: 0.0,
            roughness: 0.5,
            textures: BTreeMap::new(),
        }
    }
}

impl MaterialSource {
    /// Check value ranges; returns the first problem found
    pub fn validate(&self) -> std::result::Result<(), String> {
        if self.base_color.iter().any(|c| !(0.0..=1.0).contains(c)) {
            return Err(format!("base_color {:?} outside [0, 1]", self.base_color));
        }
        if !(0.0..=1.0).contains(&self.metallic) {
            return Err(format!("metallic {} outside [0, 1]", self.metallic));
        }
        if !(0.0..=1.0).contains(&self.roughness) {
            return Err(format!("roughness {} outside [0, 1]", self.roughness));
        }
        Ok(())
    }

    /// Write the source file that a `.mat` compile reads
    pub fn save(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_vec_pretty(self).map_err(|e| PipelineError::decode(path, e))?;
        write_bytes(path, &json)
    }
}

/// Compiled material resource
#[derive(Clone, Debug, PartialEq)]
pub struct Material {
    pub source: MaterialSource,
}

impl Material {
    pub fn texture(&self, slot: &str) -> Option<&str> {
        self.source.textures.get(slot).map(String::as_str)
    }
}

impl Loadable for Material {
    const KIND: AssetKind = AssetKind::Material;

    fn load_resource(compiled: &Path, _source: &Path) -> LoadResult<Self> {
        Ok(Self {
            source: read_artifact(compiled, AssetKind::Material)?,
        })
    }
}

/// Compiles `.mat` files into `.material` artifacts
pub struct MaterialCompiler;

impl MaterialCompiler {
    pub fn build(&self, source: &Path) -> Result<MaterialSource> {
        let bytes = read_source(source)?;
        let material: MaterialSource =
            serde_json::from_slice(&bytes).map_err(|e| PipelineError::decode(source, e))?;
        material
            .validate()
            .map_err(|reason| PipelineError::unsupported(source, reason))?;
        Ok(material)
    }
}

impl Compilable for MaterialCompiler {
    fn kind(&self) -> AssetKind {
        AssetKind::Material
    }

    fn compile_to_resource(&self, ctx: &CompileContext<'_>) -> Result<PathBuf> {
        let material = self.build(ctx.source)?;
        write_artifact(ctx.output, AssetKind::Material, &material)?;
        Ok(ctx.output.to_path_buf())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use void_asset::BuildTarget;

    #[test]
    fn test_partial_json_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("floor.mat");
        fs::write(&source, r#"{ "name": "floor", "textures": { "albedo": "floor.png" } }"#).unwrap();

        let material = MaterialCompiler.build(&source).unwrap();
        assert_eq!(material.name, "floor");
        assert_eq!(material.roughness, 0.5);
        assert_eq!(material.textures["albedo"], "floor.png");
    }

    #[test]
    fn test_save_then_compile() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("mats/metal.mat");
        let output = dir.path().join("mats/metal.material");
        let edited = MaterialSource {
            name: "metal".into(),
            metallic: 1.0,
            roughness: 0.2,
            ..MaterialSource::default()
        };
        edited.save(&source).unwrap();

        let ctx = CompileContext { source: &source, output: &output, target: BuildTarget::Desktop };
        MaterialCompiler.compile_to_resource(&ctx).unwrap();

        let material = Material::load_resource(&output, &source).unwrap();
        assert_eq!(material.source, edited);
        assert_eq!(material.texture("albedo"), None);
    }

    #[test]
    fn test_out_of_range_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("bad.mat");
        fs::write(&source, r#"{ "roughness": 3.0 }"#).unwrap();
        assert!(matches!(
            MaterialCompiler.build(&source),
            Err(PipelineError::UnsupportedFormat { .. })
        ));

        fs::write(&source, "{ not json").unwrap();
        assert!(matches!(MaterialCompiler.build(&source), Err(PipelineError::Decode { .. })));
    }
}
