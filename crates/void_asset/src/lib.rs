//! # void_asset - Asset Identity and Resource Cache
//!
//! The runtime half of the asset pipeline:
//! - Durable 128-bit GUIDs persisted in `<source>.meta` sidecars
//! - Staleness detection against source modification time and schema version
//! - Shared, hot-reloadable resource handles
//! - A GUID-keyed cache with at most one resident instance per identity
//!
//! Compilation lives in `void_asset_pipeline`, which plugs into the cache
//! through the [`ResourceLocator`] trait.
//!
//! ## Example
//!
//! ```ignore
//! use void_asset::prelude::*;
//!
//! let cache = ResourceCache::new();
//!
//! // `compiler` implements ResourceLocator and compiles on a miss
//! let texture: Handle<Texture> = cache.get_resource(&mut compiler, "textures/player.png")?;
//!
//! // Later, after the source was edited and recompiled, the same handle
//! // sees the new pixels
//! let width = texture.read().width;
//! ```

pub mod cache;
pub mod error;
pub mod files;
pub mod guid;
pub mod handle;
pub mod identity;
pub mod kind;
pub mod meta;
pub mod resource;
pub mod storage;

pub use cache::{ResourceCache, ResourceIdentity, ResourceLocation, ResourceLocator};
pub use error::{AssetError, Result};
pub use guid::Guid;
pub use handle::{Handle, WeakHandle};
pub use identity::{GuidLookup, IdentityStatus, MetaFiles};
pub use kind::{AssetKind, BuildTarget};
pub use meta::{AssetMeta, ImportSettings, ModelImport, TextureImport, CURRENT_METADATA_VERSION};
pub use resource::{LoadError, LoadResult, Loadable, SizedLoadable};
pub use storage::{ResourceStorage, SizedStorage, TypedStorage};

/// Prelude - commonly used types
pub mod prelude {
    pub use crate::cache::{ResourceCache, ResourceIdentity, ResourceLocator};
    pub use crate::guid::Guid;
    pub use crate::handle::Handle;
    pub use crate::kind::{AssetKind, BuildTarget};
    pub use crate::resource::{LoadError, LoadResult, Loadable, SizedLoadable};
}
