//! Models: OBJ and glTF/GLB sources compiled to `.mesh` artifacts

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use void_asset::kind::lowercase_extension;
use void_asset::{AssetKind, AssetMeta, ImportSettings, LoadResult, Loadable, ModelImport};

use crate::artifact::{read_artifact, write_artifact};
use crate::compilable::{Compilable, CompileContext};
use crate::error::{PipelineError, Result};
use crate::payloads::texture::read_source;

/// Standard vertex format for all meshes
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, bytemuck::Pod, bytemuck::Zeroable, Serialize, Deserialize)]
pub struct Vertex {
    pub position: [f32; 3],
    /// Surface normal (normalized)
    pub normal: [f32; 3],
    /// Tangent with handedness in w component
    pub tangent: [f32; 4],
    pub uv0: [f32; 2],
    /// Secondary UV coordinates (lightmaps, detail)
    pub uv1: [f32; 2],
    pub color: [f32; 4],
}

impl Vertex {
    /// Create a vertex with position, normal and UV (other fields default)
    pub fn new(position: [f32; 3], normal: [f32; 3], uv: [f32; 2]) -> Self {
        Self {
            position,
            normal,
            tangent: [1.0, 0.0, 0.0, 1.0],
            uv0: uv,
            uv1: [0.0, 0.0],
            color: [1.0, 1.0, 1.0, 1.0],
        }
    }

    fn bit_key(&self) -> [u32; 18] {
        bytemuck::cast(*self)
    }
}

/// Axis-aligned bounding box
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Bounds {
    pub min: [f32; 3],
    pub max: [f32; 3],
}

impl Bounds {
    /// Calculate bounds from vertices
    pub fn from_vertices<'a>(vertices: impl IntoIterator<Item = &'a Vertex>) -> Self {
        let mut min = [f32::MAX; 3];
        let mut max = [f32::MIN; 3];
        let mut any = false;

        for v in vertices {
            any = true;
            for i in 0..3 {
                min[i] = min[i].min(v.position[i]);
                max[i] = max[i].max(v.position[i]);
            }
        }

        if any {
            Self { min, max }
        } else {
            Self::default()
        }
    }

    pub fn center(&self) -> [f32; 3] {
        [
            (self.min[0] + self.max[0]) * 0.5,
            (self.min[1] + self.max[1]) * 0.5,
            (self.min[2] + self.max[2]) * 0.5,
        ]
    }
}

/// One drawable part of a model, indexed triangle list
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct SubMesh {
    pub name: Option<String>,
    /// Material name referenced by the source
    pub material: Option<String>,
    pub vertices: Vec<Vertex>,
    pub indices: Vec<u32>,
}

impl SubMesh {
    /// Merge bit-identical vertices and remap indices
    pub fn optimize(&mut self) {
        let mut remap: HashMap<[u32; 18], u32> = HashMap::with_capacity(self.vertices.len());
        let mut vertices = Vec::with_capacity(self.vertices.len());
        let mut table = Vec::with_capacity(self.vertices.len());

        for v in &self.vertices {
            let index = *remap.entry(v.bit_key()).or_insert_with(|| {
                vertices.push(*v);
                (vertices.len() - 1) as u32
            });
            table.push(index);
        }

        for index in &mut self.indices {
            *index = table[*index as usize];
        }
        self.vertices = vertices;
    }

    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }
}

/// Compiled model
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Model {
    pub meshes: Vec<SubMesh>,
    pub bounds: Bounds,
}

impl Model {
    pub fn vertex_count(&self) -> usize {
        self.meshes.iter().map(|m| m.vertices.len()).sum()
    }

    pub fn index_count(&self) -> usize {
        self.meshes.iter().map(|m| m.indices.len()).sum()
    }
}

impl Loadable for Model {
    const KIND: AssetKind = AssetKind::Model;

    fn load_resource(compiled: &Path, _source: &Path) -> LoadResult<Self> {
        read_artifact(compiled, AssetKind::Model)
    }
}

/// Compiles OBJ and glTF sources into `.mesh` artifacts
pub struct ModelCompiler {
    import: ModelImport,
}

impl ModelCompiler {
    pub fn new(import: ModelImport) -> Self {
        Self { import }
    }

    /// Parse the source into a model
    pub fn build(&self, source: &Path) -> Result<Model> {
        let mut meshes = match lowercase_extension(source).as_deref() {
            Some("obj") => {
                let data = read_source(source)?;
                let text = std::str::from_utf8(&data).map_err(|e| PipelineError::decode(source, e))?;
                parse_obj(text, self.import.generate_normals).map_err(|e| PipelineError::decode(source, e))?
            }
            Some("gltf") | Some("glb") => load_gltf(source)?,
            _ => return Err(PipelineError::UnsupportedExtension(source.to_path_buf())),
        };

        meshes.retain(|m| !m.indices.is_empty());
        if meshes.is_empty() {
            return Err(PipelineError::decode(source, "model contains no triangles"));
        }

        if self.import.optimize_vertices {
            for mesh in &mut meshes {
                mesh.optimize();
            }
        }

        let bounds = Bounds::from_vertices(meshes.iter().flat_map(|m| m.vertices.iter()));
        Ok(Model { meshes, bounds })
    }
}

impl Compilable for ModelCompiler {
    fn kind(&self) -> AssetKind {
        AssetKind::Model
    }

    fn compile_to_resource(&self, ctx: &CompileContext<'_>) -> Result<PathBuf> {
        let model = self.build(ctx.source)?;
        write_artifact(ctx.output, AssetKind::Model, &model)?;
        log::debug!(
            "Model {:?}: {} meshes, {} vertices",
            ctx.source,
            model.meshes.len(),
            model.vertex_count()
        );
        Ok(ctx.output.to_path_buf())
    }

    fn extend_meta(&self, meta: &mut AssetMeta) {
        meta.import = ImportSettings::Model(self.import);
    }
}

/// Parse OBJ text. `o`/`g`/`usemtl` start a new sub-mesh; faces are fan
/// triangulated.
fn parse_obj(text: &str, generate_normals: bool) -> std::result::Result<Vec<SubMesh>, String> {
    let mut positions: Vec<[f32; 3]> = Vec::new();
    let mut normals: Vec<[f32; 3]> = Vec::new();
    let mut uvs: Vec<[f32; 2]> = Vec::new();
    let mut meshes = vec![SubMesh::default()];
    let mut has_normals = false;

    for (line_no, line) in text.lines().enumerate() {
        let parts: Vec<&str> = line.split_whitespace().collect();
        if parts.is_empty() || parts[0].starts_with('#') {
            continue;
        }

        let floats = |count: usize| -> std::result::Result<Vec<f32>, String> {
            parts[1..]
                .iter()
                .take(count)
                .map(|p| p.parse::<f32>().map_err(|_| format!("line {}: bad number {:?}", line_no + 1, p)))
                .collect()
        };

        match parts[0] {
            "v" if parts.len() >= 4 => {
                let v = floats(3)?;
                positions.push([v[0], v[1], v[2]]);
            }
            "vn" if parts.len() >= 4 => {
                let n = floats(3)?;
                normals.push([n[0], n[1], n[2]]);
            }
            "vt" if parts.len() >= 2 => {
                let t = floats(2)?;
                uvs.push([t[0], 1.0 - t.get(1).copied().unwrap_or(0.0)]);
            }
            "o" | "g" | "usemtl" => {
                let current = meshes.last().ok_or("no mesh")?;
                if !current.indices.is_empty() {
                    let next = SubMesh {
                        name: current.name.clone(),
                        material: current.material.clone(),
                        ..SubMesh::default()
                    };
                    meshes.push(next);
                }
                let value = parts.get(1..).map(|p| p.join(" ")).filter(|s| !s.is_empty());
                let current = meshes.last_mut().ok_or("no mesh")?;
                if parts[0] == "usemtl" {
                    current.material = value;
                } else {
                    current.name = value;
                }
            }
            "f" if parts.len() >= 4 => {
                let mut face = Vec::with_capacity(parts.len() - 1);
                for p in &parts[1..] {
                    let (vertex, normal_given) = parse_vertex_index(p, &positions, &normals, &uvs)
                        .ok_or_else(|| format!("line {}: bad face index {:?}", line_no + 1, p))?;
                    has_normals |= normal_given;
                    face.push(vertex);
                }

                let current = meshes.last_mut().ok_or("no mesh")?;
                for i in 1..face.len() - 1 {
                    let base = current.vertices.len() as u32;
                    current.vertices.extend_from_slice(&[face[0], face[i], face[i + 1]]);
                    current.indices.extend_from_slice(&[base, base + 1, base + 2]);
                }
            }
            _ => {}
        }
    }

    if !has_normals && generate_normals {
        for mesh in &mut meshes {
            generate_flat_normals(&mut mesh.vertices, &mesh.indices);
        }
    }

    Ok(meshes)
}

/// Resolve a 1-based (or negative, relative) OBJ index
fn resolve_index(raw: &str, len: usize) -> Option<usize> {
    let i: i64 = raw.parse().ok()?;
    let resolved = if i < 0 { len as i64 + i } else { i - 1 };
    (0..len as i64).contains(&resolved).then_some(resolved as usize)
}

/// Parse a vertex reference like "1/2/3", "1//3" or "1"
fn parse_vertex_index(
    s: &str,
    positions: &[[f32; 3]],
    normals: &[[f32; 3]],
    uvs: &[[f32; 2]],
) -> Option<(Vertex, bool)> {
    let parts: Vec<&str> = s.split('/').collect();

    let position = positions[resolve_index(parts.first()?, positions.len())?];

    let uv = match parts.get(1).filter(|p| !p.is_empty()) {
        Some(raw) => uvs[resolve_index(raw, uvs.len())?],
        None => [0.0, 0.0],
    };

    let (normal, given) = match parts.get(2).filter(|p| !p.is_empty()) {
        Some(raw) => (normals[resolve_index(raw, normals.len())?], true),
        None => ([0.0, 1.0, 0.0], false),
    };

    Some((Vertex::new(position, normal, uv), given))
}

/// Generate flat normals for a mesh without normals
fn generate_flat_normals(vertices: &mut [Vertex], indices: &[u32]) {
    for chunk in indices.chunks_exact(3) {
        let (i0, i1, i2) = (chunk[0] as usize, chunk[1] as usize, chunk[2] as usize);
        if i0 >= vertices.len() || i1 >= vertices.len() || i2 >= vertices.len() {
            continue;
        }

        let p0 = vertices[i0].position;
        let p1 = vertices[i1].position;
        let p2 = vertices[i2].position;

        let e1 = [p1[0] - p0[0], p1[1] - p0[1], p1[2] - p0[2]];
        let e2 = [p2[0] - p0[0], p2[1] - p0[1], p2[2] - p0[2]];

        let normal = [
            e1[1] * e2[2] - e1[2] * e2[1],
            e1[2] * e2[0] - e1[0] * e2[2],
            e1[0] * e2[1] - e1[1] * e2[0],
        ];

        let len = (normal[0] * normal[0] + normal[1] * normal[1] + normal[2] * normal[2]).sqrt();
        let normal = if len > 0.0001 {
            [normal[0] / len, normal[1] / len, normal[2] / len]
        } else {
            [0.0, 1.0, 0.0]
        };

        vertices[i0].normal = normal;
        vertices[i1].normal = normal;
        vertices[i2].normal = normal;
    }
}

/// Load every triangle primitive of a glTF/GLB file
fn load_gltf(source: &Path) -> Result<Vec<SubMesh>> {
    if !source.is_file() {
        return Err(PipelineError::SourceMissing(source.to_path_buf()));
    }
    let (document, buffers, _images) = gltf::import(source).map_err(|e| PipelineError::decode(source, e))?;

    let mut meshes = Vec::new();
    for mesh in document.meshes() {
        for primitive in mesh.primitives() {
            if primitive.mode() != gltf::mesh::Mode::Triangles {
                log::warn!("{:?}: skipping non-triangle primitive in mesh {:?}", source, mesh.name());
                continue;
            }

            let reader = primitive.reader(|buffer| buffers.get(buffer.index()).map(|data| &data[..]));
            let Some(positions) = reader.read_positions() else {
                continue;
            };

            let positions: Vec<[f32; 3]> = positions.collect();
            let normals: Option<Vec<[f32; 3]>> = reader.read_normals().map(|n| n.collect());
            let uvs: Option<Vec<[f32; 2]>> = reader.read_tex_coords(0).map(|t| t.into_f32().collect());

            let mut vertices: Vec<Vertex> = positions
                .iter()
                .enumerate()
                .map(|(i, p)| {
                    let normal = normals.as_ref().and_then(|n| n.get(i).copied()).unwrap_or([0.0, 1.0, 0.0]);
                    let uv = uvs.as_ref().and_then(|t| t.get(i).copied()).unwrap_or([0.0, 0.0]);
                    Vertex::new(*p, normal, uv)
                })
                .collect();

            let indices: Vec<u32> = match reader.read_indices() {
                Some(indices) => indices.into_u32().collect(),
                None => (0..vertices.len() as u32).collect(),
            };

            if normals.is_none() {
                generate_flat_normals(&mut vertices, &indices);
            }

            meshes.push(SubMesh {
                name: mesh.name().map(str::to_string),
                material: primitive.material().name().map(str::to_string),
                vertices,
                indices,
            });
        }
    }

    Ok(meshes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use void_asset::BuildTarget;

    const QUAD: &str = "\
# unit quad
o Quad
v 0 0 0
v 1 0 0
v 1 1 0
v 0 1 0
vt 0 0
vt 1 0
vt 1 1
vt 0 1
usemtl Wood
f 1/1 2/2 3/3 4/4
";

    #[test]
    fn test_obj_fan_triangulation() {
        let meshes = parse_obj(QUAD, true).unwrap();
        assert_eq!(meshes.len(), 1);
        let quad = &meshes[0];
        assert_eq!(quad.name.as_deref(), Some("Quad"));
        assert_eq!(quad.material.as_deref(), Some("Wood"));
        assert_eq!(quad.triangle_count(), 2);
        // Flat normal of a CCW quad in the XY plane faces +Z
        assert_eq!(quad.vertices[0].normal, [0.0, 0.0, 1.0]);
    }

    #[test]
    fn test_obj_groups_split_meshes() {
        let text = "\
v 0 0 0
v 1 0 0
v 0 1 0
v 1 1 0
o Crate
usemtl Wood
f 1 2 3
usemtl Metal
f 2 4 3
g Lid
f 1 2 4
";
        let meshes = parse_obj(text, true).unwrap();
        assert_eq!(meshes.len(), 3);

        assert_eq!(meshes[0].name.as_deref(), Some("Crate"));
        assert_eq!(meshes[0].material.as_deref(), Some("Wood"));
        assert_eq!(meshes[0].triangle_count(), 1);

        // A material switch keeps the object name
        assert_eq!(meshes[1].name.as_deref(), Some("Crate"));
        assert_eq!(meshes[1].material.as_deref(), Some("Metal"));
        assert_eq!(meshes[1].vertices[1].position, [1.0, 1.0, 0.0]);

        // A group keeps the active material
        assert_eq!(meshes[2].name.as_deref(), Some("Lid"));
        assert_eq!(meshes[2].material.as_deref(), Some("Metal"));
        assert_eq!(meshes[2].triangle_count(), 1);
    }

    #[test]
    fn test_negative_indices() {
        let text = "v 0 0 0\nv 1 0 0\nv 0 1 0\nf -3 -2 -1\n";
        let meshes = parse_obj(text, false).unwrap();
        assert_eq!(meshes[0].vertices[2].position, [0.0, 1.0, 0.0]);
    }

    #[test]
    fn test_out_of_range_index_is_error() {
        assert!(parse_obj("v 0 0 0\nf 1 2 3\n", true).is_err());
        assert!(parse_obj("v 0 x 0\n", true).is_err());
    }

    #[test]
    fn test_optimize_merges_shared_vertices() {
        let mut meshes = parse_obj(QUAD, true).unwrap();
        let quad = &mut meshes[0];
        assert_eq!(quad.vertices.len(), 6);

        quad.optimize();
        assert_eq!(quad.vertices.len(), 4);
        assert_eq!(quad.indices, vec![0, 1, 2, 0, 2, 3]);
    }

    #[test]
    fn test_compile_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("quad.obj");
        fs::write(&source, QUAD).unwrap();
        let output = dir.path().join("quad.mesh");

        let compiler = ModelCompiler::new(ModelImport::default());
        let ctx = CompileContext { source: &source, output: &output, target: BuildTarget::Desktop };
        let compiled = compiler.compile_to_resource(&ctx).unwrap();

        let model = Model::load_resource(&compiled, &source).unwrap();
        assert_eq!(model.meshes.len(), 1);
        assert_eq!(model.vertex_count(), 4);
        assert_eq!(model.bounds.max, [1.0, 1.0, 0.0]);
    }

    #[test]
    fn test_empty_model_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("empty.obj");
        fs::write(&source, "# nothing\n").unwrap();

        let err = ModelCompiler::new(ModelImport::default()).build(&source).unwrap_err();
        assert!(matches!(err, PipelineError::Decode { .. }));
    }
}
