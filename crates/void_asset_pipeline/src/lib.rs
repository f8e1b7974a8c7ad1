//! # Void Asset Pipeline
//!
//! Compiles source assets into runtime artifacts and keeps resident
//! resources in step with their sources.
//!
//! ## Features
//!
//! - **Compilation**: textures to DDS, OBJ/glTF models, GLSL/WGSL shaders,
//!   fonts, audio clips and materials
//! - **Durable identity**: every source gets a GUID persisted in a
//!   `<source>.meta` sidecar
//! - **Hot-reload**: recompiled assets are reloaded in place; handles stay valid
//! - **Change coalescing**: bursts of file events fold into one action
//! - **Bulk compiles**: whole-tree desktop or Android builds on a worker thread
//!
//! ## Example
//!
//! ```ignore
//! use void_asset_pipeline::{AssetPipeline, PipelineConfig};
//! use void_asset_pipeline::payloads::Texture;
//!
//! let mut pipeline = AssetPipeline::new(PipelineConfig::load());
//! pipeline.initialize()?;
//!
//! let texture = pipeline.get_resource::<Texture>("Resources/tex.png")?;
//!
//! // In your main loop:
//! pipeline.tick()?;
//! ```

pub mod artifact;
pub mod bulk;
pub mod compilable;
pub mod compiler;
pub mod config;
pub mod error;
pub mod paths;
pub mod payloads;
pub mod pipeline;
pub mod queue;
pub mod watcher;

pub use bulk::{BulkCompileTask, CompileJob, CompiledArtifact};
pub use compilable::{compiler_for, Compilable, CompileContext};
pub use compiler::{
    is_compiled_resource, is_supported_source, AssetCompiler, CompileOptions, CompileOutcome, ScanReport,
};
pub use config::PipelineConfig;
pub use error::{PipelineError, Result};
pub use pipeline::{AssetPipeline, TickReport};
pub use queue::{ChangeEvent, ChangeKind, ChangeQueue};
pub use watcher::FileWatcher;

pub use void_asset;
