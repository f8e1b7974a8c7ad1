//! Shaders: `.vert`/`.frag` GLSL pairs or single `.wgsl` modules
//!
//! Every module is parsed and validated with naga before an artifact is
//! written, so a program that would fail on the GPU side fails the compile.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::path::{Path, PathBuf};

use naga::front::{glsl, wgsl};
use naga::valid::{Capabilities, ValidationFlags, Validator};
use serde::{Deserialize, Serialize};
use void_asset::kind::{append_extension, lowercase_extension};
use void_asset::{AssetKind, LoadResult, Loadable};

use crate::artifact::{read_artifact, write_artifact};
use crate::compilable::{Compilable, CompileContext};
use crate::error::{PipelineError, Result};
use crate::payloads::texture::read_source;

/// Shader stage type
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ShaderStage {
    Vertex,
    Fragment,
    Compute,
}

impl ShaderStage {
    fn to_naga(self) -> naga::ShaderStage {
        match self {
            ShaderStage::Vertex => naga::ShaderStage::Vertex,
            ShaderStage::Fragment => naga::ShaderStage::Fragment,
            ShaderStage::Compute => naga::ShaderStage::Compute,
        }
    }

    fn from_naga(stage: naga::ShaderStage) -> Self {
        match stage {
            naga::ShaderStage::Vertex => ShaderStage::Vertex,
            naga::ShaderStage::Fragment => ShaderStage::Fragment,
            naga::ShaderStage::Compute => ShaderStage::Compute,
        }
    }
}

/// Source language of a program
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ShaderLanguage {
    Glsl,
    Wgsl,
}

/// Shader entry point info
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShaderEntryPoint {
    pub name: String,
    pub stage: ShaderStage,
}

/// One source module of a program
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShaderModule {
    pub source: String,
    pub entry_points: Vec<ShaderEntryPoint>,
}

/// Compiled shader program
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Shader {
    pub language: ShaderLanguage,
    pub modules: Vec<ShaderModule>,
    /// Hash of all sources, for change detection
    pub hash: u64,
}

impl Shader {
    pub fn entry_point(&self, stage: ShaderStage) -> Option<&ShaderEntryPoint> {
        self.modules
            .iter()
            .flat_map(|m| m.entry_points.iter())
            .find(|e| e.stage == stage)
    }
}

impl Loadable for Shader {
    const KIND: AssetKind = AssetKind::Shader;

    fn load_resource(compiled: &Path, _source: &Path) -> LoadResult<Self> {
        read_artifact(compiled, AssetKind::Shader)
    }
}

/// Compiles shader sources into `.shader` artifacts
pub struct ShaderCompiler;

impl ShaderCompiler {
    /// Build the program addressed by a canonical shader path
    pub fn build(&self, canonical: &Path) -> Result<Shader> {
        let (language, modules) = if lowercase_extension(canonical).as_deref() == Some("wgsl") {
            (ShaderLanguage::Wgsl, vec![Self::wgsl_module(canonical)?])
        } else {
            (ShaderLanguage::Glsl, Self::glsl_modules(canonical)?)
        };

        let mut hasher = DefaultHasher::new();
        for module in &modules {
            module.source.hash(&mut hasher);
        }

        Ok(Shader {
            language,
            modules,
            hash: hasher.finish(),
        })
    }

    fn wgsl_module(path: &Path) -> Result<ShaderModule> {
        let source = read_text(path)?;
        let module = wgsl::parse_str(&source).map_err(|e| PipelineError::ShaderParse {
            path: path.to_path_buf(),
            reason: e.emit_to_string(&source),
        })?;
        validate(path, &module)?;

        let entry_points = entry_points_of(&module);
        if entry_points.is_empty() {
            return Err(PipelineError::ShaderValidation {
                path: path.to_path_buf(),
                reason: "no @vertex, @fragment or @compute entry point".to_string(),
            });
        }
        Ok(ShaderModule { source, entry_points })
    }

    /// Both stages are required; a program with a missing stage cannot link
    fn glsl_modules(canonical: &Path) -> Result<Vec<ShaderModule>> {
        [("vert", ShaderStage::Vertex), ("frag", ShaderStage::Fragment)]
            .into_iter()
            .map(|(ext, stage)| {
                let path = append_extension(canonical, ext);
                let source = read_text(&path)?;
                let module = glsl::Frontend::default()
                    .parse(&glsl::Options::from(stage.to_naga()), &source)
                    .map_err(|e| PipelineError::ShaderParse {
                        path: path.clone(),
                        reason: format!("{:?}", e),
                    })?;
                validate(&path, &module)?;

                let entry_points = entry_points_of(&module);
                if !entry_points.iter().any(|e| e.stage == stage) {
                    return Err(PipelineError::ShaderValidation {
                        path,
                        reason: format!("no {:?} entry point", stage),
                    });
                }
                Ok(ShaderModule { source, entry_points })
            })
            .collect()
    }
}

impl Compilable for ShaderCompiler {
    fn kind(&self) -> AssetKind {
        AssetKind::Shader
    }

    fn compile_to_resource(&self, ctx: &CompileContext<'_>) -> Result<PathBuf> {
        let shader = self.build(ctx.source)?;
        write_artifact(ctx.output, AssetKind::Shader, &shader)?;
        log::debug!(
            "Shader {:?}: {} modules validated",
            ctx.source,
            shader.modules.len()
        );
        Ok(ctx.output.to_path_buf())
    }
}

fn read_text(path: &Path) -> Result<String> {
    let data = read_source(path)?;
    String::from_utf8(data).map_err(|e| PipelineError::decode(path, e))
}

fn validate(path: &Path, module: &naga::Module) -> Result<()> {
    let mut validator = Validator::new(ValidationFlags::all(), Capabilities::all());
    validator
        .validate(module)
        .map(|_| ())
        .map_err(|e| PipelineError::ShaderValidation {
            path: path.to_path_buf(),
            reason: format!("{:?}", e),
        })
}

fn entry_points_of(module: &naga::Module) -> Vec<ShaderEntryPoint> {
    module
        .entry_points
        .iter()
        .map(|ep| ShaderEntryPoint {
            name: ep.name.clone(),
            stage: ShaderStage::from_naga(ep.stage),
        })
        .collect()
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::fs;
    use void_asset::BuildTarget;

    pub(crate) const VERT: &str = "\
#version 450
layout(location = 0) in vec3 a_position;
layout(location = 0) out vec3 v_color;

void main() {
    v_color = a_position;
    gl_Position = vec4(a_position, 1.0);
}
";

    pub(crate) const FRAG: &str = "\
#version 450
layout(location = 0) in vec3 v_color;
layout(location = 0) out vec4 o_color;

void main() {
    o_color = vec4(v_color, 1.0);
}
";

    pub(crate) const WGSL: &str = r#"
@vertex
fn vs_main(@builtin(vertex_index) index: u32) -> @builtin(position) vec4<f32> {
    let x = f32(i32(index) - 1);
    return vec4<f32>(x, 0.0, 0.0, 1.0);
}

@fragment
fn fs_main() -> @location(0) vec4<f32> {
    return vec4<f32>(1.0, 0.0, 0.0, 1.0);
}

@compute
@workgroup_size(64)
fn cs_main() {}
"#;

    #[test]
    fn test_wgsl_entry_points() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sky.wgsl");
        fs::write(&path, WGSL).unwrap();

        let shader = ShaderCompiler.build(&path).unwrap();
        let entries = &shader.modules[0].entry_points;
        assert_eq!(entries.len(), 3);
        assert_eq!(shader.entry_point(ShaderStage::Vertex).unwrap().name, "vs_main");
        assert_eq!(shader.entry_point(ShaderStage::Fragment).unwrap().name, "fs_main");
        assert_eq!(shader.entry_point(ShaderStage::Compute).unwrap().name, "cs_main");
    }

    #[test]
    fn test_glsl_pair_compiles() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("basic.vert"), VERT).unwrap();
        fs::write(dir.path().join("basic.frag"), FRAG).unwrap();

        let canonical = dir.path().join("basic");
        let output = dir.path().join("basic.shader");
        let ctx = CompileContext { source: &canonical, output: &output, target: BuildTarget::Desktop };
        ShaderCompiler.compile_to_resource(&ctx).unwrap();

        let shader = Shader::load_resource(&output, &canonical).unwrap();
        assert_eq!(shader.language, ShaderLanguage::Glsl);
        assert_eq!(shader.modules.len(), 2);
        assert_eq!(shader.entry_point(ShaderStage::Fragment).unwrap().name, "main");
    }

    #[test]
    fn test_missing_stage_fails() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("half.vert"), VERT).unwrap();

        let err = ShaderCompiler.build(&dir.path().join("half")).unwrap_err();
        assert!(matches!(err, PipelineError::SourceMissing(_)));
    }

    #[test]
    fn test_malformed_wgsl_fails() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.wgsl");
        fs::write(&path, "@vertex fn main( { this is not wgsl !!!").unwrap();

        assert!(matches!(ShaderCompiler.build(&path), Err(PipelineError::ShaderParse { .. })));
    }

    #[test]
    fn test_invalid_wgsl_fails_validation() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("mismatch.wgsl");
        // Parses, but returns an i32 where a vec4<f32> position is declared
        fs::write(
            &path,
            "@vertex\nfn vs_main() -> @builtin(position) vec4<f32> {\n    return 1;\n}\n",
        )
        .unwrap();

        assert!(ShaderCompiler.build(&path).is_err());
    }

    #[test]
    fn test_glsl_without_main_fails() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("bad.vert"), "#version 450\n// void main() commented out\n").unwrap();
        fs::write(dir.path().join("bad.frag"), FRAG).unwrap();

        assert!(ShaderCompiler.build(&dir.path().join("bad")).is_err());
    }

    #[test]
    fn test_wgsl_hash_tracks_source() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sky.wgsl");
        fs::write(&path, WGSL).unwrap();
        let first = ShaderCompiler.build(&path).unwrap();

        fs::write(&path, format!("{}\n// edited", WGSL)).unwrap();
        let second = ShaderCompiler.build(&path).unwrap();
        assert_ne!(first.hash, second.hash);
        assert_eq!(second.language, ShaderLanguage::Wgsl);
    }
}
