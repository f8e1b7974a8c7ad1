//! Payload types: one compiler and one runtime resource per asset kind

pub mod audio;
pub mod font;
pub mod material;
pub mod model;
pub mod shader;
pub mod texture;

pub use audio::{AudioClip, AudioCompiler, AudioFormat};
pub use font::{Font, FontCompiler, FontData};
pub use material::{Material, MaterialCompiler, MaterialSource};
pub use model::{Bounds, Model, ModelCompiler, SubMesh, Vertex};
pub use shader::{Shader, ShaderCompiler, ShaderEntryPoint, ShaderLanguage, ShaderStage};
pub use texture::{Texture, TextureCompiler};
