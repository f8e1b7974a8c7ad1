//! Resource cache
//!
//! The runtime read path. Holds at most one resident instance per GUID (per
//! GUID and size for sized resources) and hands out shared handles to it.
//! On a miss the cache asks its `ResourceLocator` where the compiled
//! artifact lives; the locator is free to compile the source first.
//!
//! All methods take `&self`; storages use interior locking so handles can be
//! read from other threads. Loads are blocking.

use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::RwLock;

use crate::files::remove_file_if_exists;
use crate::guid::Guid;
use crate::handle::Handle;
use crate::identity::MetaFiles;
use crate::kind::{AssetKind, BuildTarget};
use crate::resource::{LoadError, LoadResult, Loadable, SizedLoadable};
use crate::storage::{ResourceStorage, SizedStorage, TypedStorage};

/// How a caller names a resource
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ResourceIdentity {
    Guid(Guid),
    /// Source path (any stage file works for shader programs)
    Path(PathBuf),
}

impl fmt::Display for ResourceIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResourceIdentity::Guid(guid) => write!(f, "{}", guid),
            ResourceIdentity::Path(path) => write!(f, "{}", path.display()),
        }
    }
}

impl From<Guid> for ResourceIdentity {
    fn from(guid: Guid) -> Self {
        ResourceIdentity::Guid(guid)
    }
}

impl From<PathBuf> for ResourceIdentity {
    fn from(path: PathBuf) -> Self {
        ResourceIdentity::Path(path)
    }
}

impl From<&Path> for ResourceIdentity {
    fn from(path: &Path) -> Self {
        ResourceIdentity::Path(path.to_path_buf())
    }
}

impl From<&str> for ResourceIdentity {
    fn from(path: &str) -> Self {
        ResourceIdentity::Path(PathBuf::from(path))
    }
}

/// Where a compiled resource lives
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceLocation {
    pub guid: Guid,
    pub kind: AssetKind,
    pub compiled: PathBuf,
    /// Canonical source path
    pub source: PathBuf,
}

/// Resolves identities to compiled artifacts on behalf of the cache
pub trait ResourceLocator {
    /// GUID of an identity, if already known. Must not compile.
    fn resolve(&mut self, identity: &ResourceIdentity) -> Option<Guid>;

    /// Location of a loadable desktop artifact, compiling it first if needed
    fn locate(&mut self, identity: &ResourceIdentity) -> Option<ResourceLocation>;

    /// Force a recompile after the artifact failed to load
    fn recompile(&mut self, location: &ResourceLocation) -> Option<ResourceLocation>;
}

/// GUID-keyed cache of resident resources
pub struct ResourceCache {
    storages: RwLock<HashMap<AssetKind, Arc<dyn ResourceStorage>>>,
}

impl ResourceCache {
    pub fn new() -> Self {
        Self {
            storages: RwLock::new(HashMap::new()),
        }
    }

    fn storage(&self, kind: AssetKind) -> Option<Arc<dyn ResourceStorage>> {
        self.storages.read().get(&kind).cloned()
    }

    fn storage_or_insert(
        &self,
        kind: AssetKind,
        make: impl FnOnce() -> Arc<dyn ResourceStorage>,
    ) -> Arc<dyn ResourceStorage> {
        if let Some(storage) = self.storage(kind) {
            return storage;
        }
        self.storages.write().entry(kind).or_insert_with(make).clone()
    }

    fn with_typed<T: Loadable, R>(&self, f: impl FnOnce(&TypedStorage<T>) -> R) -> Option<R> {
        let storage = self.storage_or_insert(T::KIND, || Arc::new(TypedStorage::<T>::new()));
        match storage.as_any().downcast_ref::<TypedStorage<T>>() {
            Some(typed) => Some(f(typed)),
            None => {
                log::error!(
                    "{} storage holds another type than {}",
                    T::KIND,
                    std::any::type_name::<T>()
                );
                None
            }
        }
    }

    fn with_sized<T: SizedLoadable, R>(&self, f: impl FnOnce(&SizedStorage<T>) -> R) -> Option<R> {
        let storage = self.storage_or_insert(T::KIND, || Arc::new(SizedStorage::<T>::new()));
        match storage.as_any().downcast_ref::<SizedStorage<T>>() {
            Some(sized) => Some(f(sized)),
            None => {
                log::error!(
                    "{} storage holds another type than {}",
                    T::KIND,
                    std::any::type_name::<T>()
                );
                None
            }
        }
    }

    /// Resident handle for an identity, loading it on a miss.
    ///
    /// Returns `None` when the identity cannot be compiled or loaded; nothing
    /// is cached in that case.
    pub fn get_resource<T, L>(&self, locator: &mut L, identity: impl Into<ResourceIdentity>) -> Option<Handle<T>>
    where
        T: Loadable,
        L: ResourceLocator + ?Sized,
    {
        let identity = identity.into();
        if let Some(guid) = locator.resolve(&identity) {
            if let Some(handle) = self.with_typed::<T, _>(|s| s.get(guid)).flatten() {
                return Some(handle);
            }
        }

        let location = Self::locate_kind(locator, &identity, T::KIND)?;
        if let Some(handle) = self.with_typed::<T, _>(|s| s.get(location.guid)).flatten() {
            return Some(handle);
        }

        let (location, resource) =
            Self::load_with_fallback(locator, location, |compiled, source| T::load_resource(compiled, source))?;

        log::debug!("Loaded {} {:?}", T::KIND, location.source);
        self.with_typed::<T, _>(|s| s.insert(Handle::new(location.guid, resource)))
    }

    /// Reload a resident resource in place and return its handle.
    ///
    /// Not resident yet: behaves like `get_resource`. A failed reload keeps
    /// the previous contents.
    pub fn reload_resource<T, L>(&self, locator: &mut L, identity: impl Into<ResourceIdentity>) -> Option<Handle<T>>
    where
        T: Loadable,
        L: ResourceLocator + ?Sized,
    {
        let identity = identity.into();
        let resident = locator
            .resolve(&identity)
            .and_then(|guid| self.with_typed::<T, _>(|s| s.get(guid)).flatten());

        let Some(handle) = resident else {
            return self.get_resource(locator, identity);
        };

        let location = Self::locate_kind(locator, &identity, T::KIND)?;
        match T::load_resource(&location.compiled, &location.source) {
            Ok(value) => {
                let generation = handle.replace(value);
                log::info!("Reloaded {} {:?} (gen {})", T::KIND, location.source, generation);
            }
            Err(e) => log::error!("Failed to reload {} {}: {}", T::KIND, identity, e),
        }
        Some(handle)
    }

    /// Resident handle of a sized resource (fonts), keyed by GUID and size
    pub fn get_sized_resource<T, L>(
        &self,
        locator: &mut L,
        identity: impl Into<ResourceIdentity>,
        size: u32,
        reload: bool,
    ) -> Option<Handle<T>>
    where
        T: SizedLoadable,
        L: ResourceLocator + ?Sized,
    {
        let identity = identity.into();
        let resident = locator
            .resolve(&identity)
            .and_then(|guid| self.with_sized::<T, _>(|s| s.get(guid, size)).flatten());

        if let Some(handle) = resident {
            if reload {
                let location = Self::locate_kind(locator, &identity, T::KIND)?;
                match T::load_sized(&location.compiled, &location.source, size) {
                    Ok(value) => {
                        handle.replace(value);
                    }
                    Err(e) => log::error!("Failed to reload {} {} @{}: {}", T::KIND, identity, size, e),
                }
            }
            return Some(handle);
        }

        let location = Self::locate_kind(locator, &identity, T::KIND)?;
        if let Some(handle) = self.with_sized::<T, _>(|s| s.get(location.guid, size)).flatten() {
            return Some(handle);
        }

        let (location, resource) = Self::load_with_fallback(locator, location, |compiled, source| {
            T::load_sized(compiled, source, size)
        })?;

        log::debug!("Loaded {} {:?} @{}", T::KIND, location.source, size);
        self.with_sized::<T, _>(|s| s.insert(size, Handle::new(location.guid, resource)))
    }

    fn locate_kind<L: ResourceLocator + ?Sized>(
        locator: &mut L,
        identity: &ResourceIdentity,
        kind: AssetKind,
    ) -> Option<ResourceLocation> {
        let Some(location) = locator.locate(identity) else {
            log::error!("Unable to locate {} {}", kind, identity);
            return None;
        };

        if location.kind != kind {
            let err = LoadError::KindMismatch { expected: kind, found: location.kind };
            log::error!("{}: {}", identity, err);
            return None;
        }
        Some(location)
    }

    /// Load; on a recoverable failure recompile once from source and retry
    fn load_with_fallback<R, L: ResourceLocator + ?Sized>(
        locator: &mut L,
        location: ResourceLocation,
        load: impl Fn(&Path, &Path) -> LoadResult<R>,
    ) -> Option<(ResourceLocation, R)> {
        match load(&location.compiled, &location.source) {
            Ok(resource) => return Some((location, resource)),
            Err(e) if e.is_recoverable() => {
                log::warn!("{:?} failed to load ({}); recompiling from source", location.compiled, e);
            }
            Err(e) => {
                log::error!("Failed to load {:?}: {}", location.compiled, e);
                return None;
            }
        }

        let location = locator.recompile(&location)?;
        match load(&location.compiled, &location.source) {
            Ok(resource) => Some((location, resource)),
            Err(e) => {
                log::error!("Failed to load {:?} after recompile: {}", location.compiled, e);
                None
            }
        }
    }

    /// Unload a resource of a known type. See [`ResourceCache::unload_resource`].
    pub fn unload_resource_typed<T: Loadable>(
        &self,
        guid: Guid,
        source: &Path,
        compiled: &Path,
        metas: &mut MetaFiles,
        target: BuildTarget,
    ) -> bool {
        self.unload_kind(T::KIND, guid, source, compiled, metas, target)
    }

    /// Evict the resident entry, delete the compiled artifact and, for
    /// desktop builds, the sidecar. The kind is taken from the artifact's
    /// extension.
    pub fn unload_resource(
        &self,
        guid: Guid,
        source: &Path,
        compiled: &Path,
        metas: &mut MetaFiles,
        target: BuildTarget,
    ) -> bool {
        match AssetKind::from_compiled_path(compiled) {
            Some(kind) => self.unload_kind(kind, guid, source, compiled, metas, target),
            None => {
                log::warn!("Cannot unload {:?}: unknown resource type", compiled);
                false
            }
        }
    }

    fn unload_kind(
        &self,
        kind: AssetKind,
        guid: Guid,
        source: &Path,
        compiled: &Path,
        metas: &mut MetaFiles,
        target: BuildTarget,
    ) -> bool {
        let evicted = self.storage(kind).map(|s| s.remove(guid)).unwrap_or(false);
        let mut ok = true;

        if let Err(e) = remove_file_if_exists(compiled) {
            log::error!("Failed to delete {:?}: {}", compiled, e);
            ok = false;
        }

        if target == BuildTarget::Desktop {
            if let Err(e) = metas.delete(source) {
                log::error!("Failed to delete metadata for {:?}: {}", source, e);
                ok = false;
            }
        }

        log::info!("Unloaded {} {:?} (resident: {})", kind, source, evicted);
        ok
    }

    /// Hot-reload a resident resource after its artifact was rebuilt.
    ///
    /// Returns `Ok(false)` when nothing of that GUID is resident.
    pub fn hot_reload(&self, kind: AssetKind, guid: Guid, compiled: &Path, source: &Path) -> LoadResult<bool> {
        match self.storage(kind) {
            Some(storage) => storage.reload(guid, compiled, source),
            None => Ok(false),
        }
    }

    /// Drop any resident instance of `guid` without touching files
    pub fn evict(&self, guid: Guid) -> bool {
        self.storages
            .read()
            .values()
            .fold(false, |evicted, s| s.remove(guid) || evicted)
    }

    pub fn is_resource_loaded(&self, guid: Guid) -> bool {
        self.storages.read().values().any(|s| s.contains(guid))
    }

    pub fn unload_all_of_kind(&self, kind: AssetKind) {
        if let Some(storage) = self.storage(kind) {
            storage.clear();
        }
    }

    /// Number of resident entries across all kinds
    pub fn resident_count(&self) -> usize {
        self.storages.read().values().map(|s| s.len()).sum()
    }

    pub fn clear(&self) {
        for storage in self.storages.read().values() {
            storage.clear();
        }
    }
}

impl Default for ResourceCache {
    fn default() -> Self {
        Self::new()
    }
}
