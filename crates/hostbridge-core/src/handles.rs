//! Object handles held by native code
//!
//! A `GcHandle` is a generation-tagged slot index into a `HandleTable`:
//! - Strong handles keep their object alive (`Arc`)
//! - Weak handles observe it (`Weak`) and resolve to nothing once it is gone
//! - A freed slot bumps its generation, so stale handles never resolve to a
//!   reused slot
//!
//! Ownership direction is changed with `swap`, which upgrades the target
//! and reallocates under the table lock.

use std::fmt;
use std::num::NonZeroUsize;
use std::sync::{Arc, Weak};

use hostbridge_sdk::RawGcHandle;
use parking_lot::Mutex;

use crate::error::HandleError;
use crate::managed::ManagedObject;

const INDEX_BITS: u32 = usize::BITS / 2;
const INDEX_MASK: usize = (1 << INDEX_BITS) - 1;
const GENERATION_MASK: usize = usize::MAX >> INDEX_BITS;

/// Opaque handle to a managed object, never zero
#[repr(transparent)]
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct GcHandle(NonZeroUsize);

impl GcHandle {
    fn encode(index: usize, generation: usize) -> Option<Self> {
        if index >= INDEX_MASK {
            return None;
        }
        let raw = ((generation & GENERATION_MASK) << INDEX_BITS) | (index + 1);
        NonZeroUsize::new(raw).map(GcHandle)
    }

    fn index(self) -> usize {
        (self.0.get() & INDEX_MASK) - 1
    }

    fn generation(self) -> usize {
        self.0.get() >> INDEX_BITS
    }

    /// Rebuild a handle from its boundary form; zero is not a handle
    pub fn from_raw(raw: RawGcHandle) -> Option<Self> {
        NonZeroUsize::new(raw)
            .filter(|raw| raw.get() & INDEX_MASK != 0)
            .map(GcHandle)
    }

    /// Boundary form
    pub fn as_raw(self) -> RawGcHandle {
        self.0.get()
    }
}

impl fmt::Debug for GcHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "GcHandle({}@{})", self.index(), self.generation())
    }
}

/// Ownership strength of a handle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandleStrength {
    /// Keeps the object alive
    Strong,
    /// Observes the object
    Weak,
}

enum Entry {
    Free,
    Strong(Arc<ManagedObject>),
    Weak(Weak<ManagedObject>),
}

struct Slot {
    generation: usize,
    entry: Entry,
}

#[derive(Default)]
struct Slots {
    slots: Vec<Slot>,
    free: Vec<usize>,
    live: usize,
}

impl Slots {
    fn alloc(&mut self, entry: Entry) -> Result<GcHandle, HandleError> {
        let index = match self.free.pop() {
            Some(index) => index,
            None => {
                self.slots.push(Slot {
                    generation: 0,
                    entry: Entry::Free,
                });
                self.slots.len() - 1
            }
        };
        let slot = &mut self.slots[index];
        let handle = match GcHandle::encode(index, slot.generation) {
            Some(handle) => handle,
            None => {
                self.free.push(index);
                return Err(HandleError::Exhausted);
            }
        };
        slot.entry = entry;
        self.live += 1;
        Ok(handle)
    }

    fn resolve(&self, handle: GcHandle) -> Option<&Slot> {
        self.slots
            .get(handle.index())
            .filter(|slot| slot.generation & GENERATION_MASK == handle.generation())
            .filter(|slot| !matches!(slot.entry, Entry::Free))
    }

    fn release(&mut self, handle: GcHandle) -> Option<Entry> {
        self.resolve(handle)?;
        let index = handle.index();
        let slot = &mut self.slots[index];
        slot.generation = slot.generation.wrapping_add(1) & GENERATION_MASK;
        self.free.push(index);
        self.live -= 1;
        Some(std::mem::replace(&mut slot.entry, Entry::Free))
    }
}

/// Table of native-held object handles
pub struct HandleTable {
    slots: Mutex<Slots>,
}

impl Default for HandleTable {
    fn default() -> Self {
        Self::new()
    }
}

impl HandleTable {
    /// Create an empty table
    pub fn new() -> Self {
        Self {
            slots: Mutex::new(Slots::default()),
        }
    }

    /// Allocate a strong handle, keeping `object` alive
    pub fn alloc_strong(&self, object: Arc<ManagedObject>) -> Result<GcHandle, HandleError> {
        self.slots.lock().alloc(Entry::Strong(object))
    }

    /// Allocate a weak handle to `object`
    pub fn alloc_weak(&self, object: &Arc<ManagedObject>) -> Result<GcHandle, HandleError> {
        self.slots.lock().alloc(Entry::Weak(Arc::downgrade(object)))
    }

    /// Resolve a handle to its object.
    ///
    /// Returns `None` for freed or unknown handles and for weak handles
    /// whose object is gone.
    pub fn target(&self, handle: GcHandle) -> Option<Arc<ManagedObject>> {
        let slots = self.slots.lock();
        match &slots.resolve(handle)?.entry {
            Entry::Strong(object) => Some(object.clone()),
            Entry::Weak(object) => object.upgrade(),
            Entry::Free => None,
        }
    }

    /// Strength of a live handle
    pub fn strength(&self, handle: GcHandle) -> Option<HandleStrength> {
        let slots = self.slots.lock();
        match slots.resolve(handle)?.entry {
            Entry::Strong(_) => Some(HandleStrength::Strong),
            Entry::Weak(_) => Some(HandleStrength::Weak),
            Entry::Free => None,
        }
    }

    /// Release a handle. Returns `false` if it was not live.
    pub fn free(&self, handle: GcHandle) -> bool {
        // Drop the entry after unlocking; the last strong reference may go here
        let released = self.slots.lock().release(handle);
        released.is_some()
    }

    /// Replace `old` with a new handle of the requested strength.
    ///
    /// # Arguments
    /// * `old` - Handle currently referencing the object
    /// * `create_weak` - Whether the new handle is weak
    ///
    /// # Returns
    /// * `Ok(GcHandle)` - The new handle; `old` has been released
    /// * `Err(HandleError::AlreadyCollected)` - The object is gone; nothing
    ///   was allocated and `old` is left for the caller to free
    /// * `Err(HandleError::InvalidHandle)` - `old` is not live
    pub fn swap(&self, old: GcHandle, create_weak: bool) -> Result<GcHandle, HandleError> {
        let mut slots = self.slots.lock();
        let target = match &slots.resolve(old).ok_or(HandleError::InvalidHandle(old.as_raw()))?.entry {
            Entry::Strong(object) => object.clone(),
            Entry::Weak(object) => object.upgrade().ok_or(HandleError::AlreadyCollected)?,
            Entry::Free => return Err(HandleError::InvalidHandle(old.as_raw())),
        };

        let entry = if create_weak {
            Entry::Weak(Arc::downgrade(&target))
        } else {
            Entry::Strong(target.clone())
        };
        let new = slots.alloc(entry)?;
        let released = slots.release(old);
        drop(slots);
        drop(released);
        Ok(new)
    }

    /// Number of live handles
    pub fn len(&self) -> usize {
        self.slots.lock().live
    }

    /// Check for an empty table
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl fmt::Debug for HandleTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HandleTable").field("live", &self.len()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::managed::TypeBuilder;
    use hostbridge_sdk::NativeObjectPtr;

    fn object() -> Arc<ManagedObject> {
        Arc::new(ManagedObject::new(
            TypeBuilder::script("Player").build(),
            NativeObjectPtr::from_raw(0x40),
        ))
    }

    #[test]
    fn test_strong_handle_keeps_alive() {
        let table = HandleTable::new();
        let obj = object();
        let weak = Arc::downgrade(&obj);
        let handle = table.alloc_strong(obj).unwrap();

        assert!(weak.upgrade().is_some());
        assert_eq!(table.strength(handle), Some(HandleStrength::Strong));
        assert!(table.free(handle));
        assert!(weak.upgrade().is_none());
        assert!(table.is_empty());
    }

    #[test]
    fn test_weak_handle_observes() {
        let table = HandleTable::new();
        let obj = object();
        let handle = table.alloc_weak(&obj).unwrap();
        assert!(table.target(handle).is_some());
        drop(obj);
        assert!(table.target(handle).is_none());
        assert_eq!(table.strength(handle), Some(HandleStrength::Weak));
    }

    #[test]
    fn test_stale_handle_does_not_resolve() {
        let table = HandleTable::new();
        let first = table.alloc_strong(object()).unwrap();
        table.free(first);
        let second = table.alloc_strong(object()).unwrap();

        assert_eq!(first.index(), second.index());
        assert_ne!(first, second);
        assert!(table.target(first).is_none());
        assert!(!table.free(first));
        assert!(table.target(second).is_some());
    }

    #[test]
    fn test_swap_strong_to_weak() {
        let table = HandleTable::new();
        let obj = object();
        let strong = table.alloc_strong(obj.clone()).unwrap();

        let weak = table.swap(strong, true).unwrap();
        assert_eq!(table.strength(weak), Some(HandleStrength::Weak));
        assert!(table.target(strong).is_none());
        assert_eq!(table.len(), 1);

        let probe = Arc::downgrade(&obj);
        drop(obj);
        assert!(probe.upgrade().is_none());
        assert!(table.target(weak).is_none());
    }

    #[test]
    fn test_swap_collected_target_fails() {
        let table = HandleTable::new();
        let obj = object();
        let weak = table.alloc_weak(&obj).unwrap();
        drop(obj);

        match table.swap(weak, false) {
            Err(HandleError::AlreadyCollected) => {}
            other => panic!("unexpected: {:?}", other),
        }
        assert_eq!(table.len(), 1);
        assert!(table.free(weak));
    }

    #[test]
    fn test_swap_invalid_handle() {
        let table = HandleTable::new();
        let handle = table.alloc_strong(object()).unwrap();
        table.free(handle);
        assert!(matches!(
            table.swap(handle, true),
            Err(HandleError::InvalidHandle(_))
        ));
    }

    #[test]
    fn test_raw_roundtrip() {
        let table = HandleTable::new();
        let handle = table.alloc_strong(object()).unwrap();
        assert_eq!(GcHandle::from_raw(handle.as_raw()), Some(handle));
        assert!(GcHandle::from_raw(0).is_none());
    }
}
