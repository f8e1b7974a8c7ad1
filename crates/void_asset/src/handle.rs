//! Resource handles
//!
//! A `Handle<T>` is a shared reference to one resident resource. All handles
//! to the same GUID point at the same slot, so a hot-reload that swaps the
//! slot's contents is visible through every handle without re-fetching.

use std::fmt;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::{RwLock, RwLockReadGuard};

use crate::guid::Guid;

/// Shared storage behind every handle to one resource
pub struct ResourceSlot<T> {
    guid: Guid,
    /// Reload generation (incremented on each successful reload)
    generation: AtomicU32,
    value: RwLock<T>,
}

impl<T> ResourceSlot<T> {
    fn new(guid: Guid, value: T) -> Self {
        Self {
            guid,
            generation: AtomicU32::new(0),
            value: RwLock::new(value),
        }
    }
}

/// Strong handle to a resident resource
pub struct Handle<T> {
    slot: Arc<ResourceSlot<T>>,
}

impl<T> Handle<T> {
    /// Wrap a freshly loaded resource
    pub fn new(guid: Guid, value: T) -> Self {
        Self {
            slot: Arc::new(ResourceSlot::new(guid, value)),
        }
    }

    pub fn guid(&self) -> Guid {
        self.slot.guid
    }

    /// Number of successful reloads since first load
    pub fn generation(&self) -> u32 {
        self.slot.generation.load(Ordering::Acquire)
    }

    /// Borrow the resource
    pub fn read(&self) -> RwLockReadGuard<'_, T> {
        self.slot.value.read()
    }

    /// Replace the contents in place; every clone observes the new value.
    /// The value is built before the call, so readers only wait for the swap.
    pub fn replace(&self, value: T) -> u32 {
        *self.slot.value.write() = value;
        self.slot.generation.fetch_add(1, Ordering::AcqRel) + 1
    }

    #[cfg(test)]
    pub(crate) fn is_write_locked(&self) -> bool {
        self.slot.value.is_locked_exclusive()
    }

    /// True when both handles share the same slot
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.slot, &other.slot)
    }

    /// Number of strong handles, the cache's own included
    pub fn strong_count(&self) -> usize {
        Arc::strong_count(&self.slot)
    }

    pub fn downgrade(&self) -> WeakHandle<T> {
        WeakHandle {
            slot: Arc::downgrade(&self.slot),
        }
    }
}

impl<T> Clone for Handle<T> {
    fn clone(&self) -> Self {
        Self {
            slot: self.slot.clone(),
        }
    }
}

impl<T> PartialEq for Handle<T> {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other)
    }
}

impl<T> Eq for Handle<T> {}

impl<T> fmt::Debug for Handle<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Handle")
            .field("guid", &self.slot.guid)
            .field("generation", &self.generation())
            .finish()
    }
}

/// Weak handle to a resource
///
/// Does not keep the resource alive. Can be upgraded to a strong handle.
pub struct WeakHandle<T> {
    slot: Weak<ResourceSlot<T>>,
}

impl<T> WeakHandle<T> {
    pub fn upgrade(&self) -> Option<Handle<T>> {
        self.slot.upgrade().map(|slot| Handle { slot })
    }

    pub fn is_alive(&self) -> bool {
        self.slot.strong_count() > 0
    }
}

impl<T> Clone for WeakHandle<T> {
    fn clone(&self) -> Self {
        Self {
            slot: self.slot.clone(),
        }
    }
}

impl<T> Default for WeakHandle<T> {
    fn default() -> Self {
        Self { slot: Weak::new() }
    }
}
