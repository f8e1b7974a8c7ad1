//! Per-kind resource storage
//!
//! Each storage owns the resident handles of one resource type. The cache
//! keeps them behind the type-erased `ResourceStorage` trait so it can query
//! and reload by GUID without knowing the concrete type.

use std::any::Any;
use std::collections::HashMap;
use std::path::Path;

use parking_lot::RwLock;

use crate::guid::Guid;
use crate::handle::Handle;
use crate::kind::AssetKind;
use crate::resource::{LoadResult, Loadable, SizedLoadable};

/// Type-erased view of a storage
pub trait ResourceStorage: Send + Sync {
    fn kind(&self) -> AssetKind;

    /// Is any instance of `guid` resident
    fn contains(&self, guid: Guid) -> bool;

    /// Evict every instance of `guid`. Outstanding handles stay valid.
    fn remove(&self, guid: Guid) -> bool;

    /// Reload every resident instance of `guid` in place.
    ///
    /// Returns `Ok(false)` when nothing was resident.
    fn reload(&self, guid: Guid, compiled: &Path, source: &Path) -> LoadResult<bool>;

    fn len(&self) -> usize;

    fn clear(&self);

    fn as_any(&self) -> &dyn Any;
}

/// Storage for a `Loadable` resource type, keyed by GUID
pub struct TypedStorage<T: Loadable> {
    entries: RwLock<HashMap<Guid, Handle<T>>>,
}

impl<T: Loadable> TypedStorage<T> {
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
        }
    }

    pub fn get(&self, guid: Guid) -> Option<Handle<T>> {
        self.entries.read().get(&guid).cloned()
    }

    /// Insert a loaded resource. If another load won the race, the resident
    /// handle is kept and returned instead.
    pub fn insert(&self, handle: Handle<T>) -> Handle<T> {
        self.entries
            .write()
            .entry(handle.guid())
            .or_insert(handle)
            .clone()
    }

    pub fn guids(&self) -> Vec<Guid> {
        self.entries.read().keys().copied().collect()
    }
}

impl<T: Loadable> Default for TypedStorage<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Loadable> ResourceStorage for TypedStorage<T> {
    fn kind(&self) -> AssetKind {
        T::KIND
    }

    fn contains(&self, guid: Guid) -> bool {
        self.entries.read().contains_key(&guid)
    }

    fn remove(&self, guid: Guid) -> bool {
        self.entries.write().remove(&guid).is_some()
    }

    fn reload(&self, guid: Guid, compiled: &Path, source: &Path) -> LoadResult<bool> {
        let Some(handle) = self.get(guid) else {
            return Ok(false);
        };

        // Load outside the slot lock; readers keep the old value until the swap
        let value = T::load_resource(compiled, source)?;
        let generation = handle.replace(value);
        log::info!("Reloaded {} {:?} (gen {})", T::KIND, source, generation);
        Ok(true)
    }

    fn len(&self) -> usize {
        self.entries.read().len()
    }

    fn clear(&self) {
        self.entries.write().clear();
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Storage for a `SizedLoadable` resource type, keyed by GUID and size
pub struct SizedStorage<T: SizedLoadable> {
    entries: RwLock<HashMap<(Guid, u32), Handle<T>>>,
}

impl<T: SizedLoadable> SizedStorage<T> {
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
        }
    }

    pub fn get(&self, guid: Guid, size: u32) -> Option<Handle<T>> {
        self.entries.read().get(&(guid, size)).cloned()
    }

    pub fn insert(&self, size: u32, handle: Handle<T>) -> Handle<T> {
        self.entries
            .write()
            .entry((handle.guid(), size))
            .or_insert(handle)
            .clone()
    }

    /// Resident sizes of one GUID
    pub fn sizes(&self, guid: Guid) -> Vec<u32> {
        let mut sizes: Vec<u32> = self
            .entries
            .read()
            .keys()
            .filter(|(g, _)| *g == guid)
            .map(|(_, size)| *size)
            .collect();
        sizes.sort_unstable();
        sizes
    }
}

impl<T: SizedLoadable> Default for SizedStorage<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: SizedLoadable> ResourceStorage for SizedStorage<T> {
    fn kind(&self) -> AssetKind {
        T::KIND
    }

    fn contains(&self, guid: Guid) -> bool {
        self.entries.read().keys().any(|(g, _)| *g == guid)
    }

    fn remove(&self, guid: Guid) -> bool {
        let mut entries = self.entries.write();
        let before = entries.len();
        entries.retain(|(g, _), _| *g != guid);
        entries.len() != before
    }

    fn reload(&self, guid: Guid, compiled: &Path, source: &Path) -> LoadResult<bool> {
        let mut reloaded = false;
        let mut first_error = None;

        for size in self.sizes(guid) {
            let Some(handle) = self.get(guid, size) else {
                continue;
            };
            match T::load_sized(compiled, source, size) {
                Ok(value) => {
                    let generation = handle.replace(value);
                    log::info!("Reloaded {} {:?} @{} (gen {})", T::KIND, source, size, generation);
                    reloaded = true;
                }
                Err(e) => {
                    log::error!("Failed to reload {} {:?} @{}: {}", T::KIND, source, size, e);
                    first_error.get_or_insert(e);
                }
            }
        }

        match first_error {
            Some(e) => Err(e),
            None => Ok(reloaded),
        }
    }

    fn len(&self) -> usize {
        self.entries.read().len()
    }

    fn clear(&self) {
        self.entries.write().clear();
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
