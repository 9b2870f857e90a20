//! Identity registry
//!
//! Two bidirectional maps behind one lock:
//! - script handle <-> managed type (a bijection)
//! - stable path <-> managed type
//!
//! Compound sequences (lookup then create, evict on unload) take the lock
//! once through `IdentityRegistry::lock` and run every step on the guard.

use hostbridge_sdk::ScriptHandle;
use parking_lot::{Mutex, MutexGuard};
use rustc_hash::FxHashMap;

use crate::error::RegistryError;
use crate::managed::ManagedType;

#[derive(Default)]
struct RegistryMaps {
    script_to_type: FxHashMap<ScriptHandle, ManagedType>,
    type_to_script: FxHashMap<ManagedType, ScriptHandle>,
    path_to_type: FxHashMap<String, ManagedType>,
    type_to_path: FxHashMap<ManagedType, String>,
}

/// Entries removed for one type
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Eviction {
    /// Handle that was bound to the type
    pub handle: Option<ScriptHandle>,
    /// Stable path that was bound to the type
    pub path: Option<String>,
}

/// Handle <-> type and path <-> type maps under a single lock
#[derive(Default)]
pub struct IdentityRegistry {
    maps: Mutex<RegistryMaps>,
}

/// Exclusive access to the registry for a compound sequence
pub struct RegistryGuard<'a> {
    maps: MutexGuard<'a, RegistryMaps>,
}

impl IdentityRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Take the registry lock
    pub fn lock(&self) -> RegistryGuard<'_> {
        RegistryGuard {
            maps: self.maps.lock(),
        }
    }

    /// Bind a handle to a type
    pub fn add_by_handle(&self, handle: ScriptHandle, ty: ManagedType) -> Result<(), RegistryError> {
        self.lock().add_by_handle(handle, ty)
    }

    /// Unbind a handle
    pub fn remove_by_handle(&self, handle: ScriptHandle) -> Option<ManagedType> {
        self.lock().remove_by_handle(handle)
    }

    /// Unbind a type from its handle
    pub fn remove_by_type(&self, ty: &ManagedType) -> Option<ScriptHandle> {
        self.lock().remove_by_type(ty)
    }

    /// Type bound to a handle
    pub fn try_get_type(&self, handle: ScriptHandle) -> Option<ManagedType> {
        self.lock().try_get_type(handle)
    }

    /// Handle bound to a type
    pub fn try_get_handle(&self, ty: &ManagedType) -> Option<ScriptHandle> {
        self.lock().try_get_handle(ty)
    }

    /// Bind a stable path to a type
    pub fn add_path(&self, path: &str, ty: ManagedType) -> Result<(), RegistryError> {
        self.lock().add_path(path, ty)
    }

    /// Stable path of a type
    pub fn try_get_path(&self, ty: &ManagedType) -> Option<String> {
        self.lock().try_get_path(ty)
    }

    /// Type bound to a stable path
    pub fn try_get_type_by_path(&self, path: &str) -> Option<ManagedType> {
        self.lock().try_get_type_by_path(path)
    }

    /// Unbind a type from its path
    pub fn remove_path(&self, ty: &ManagedType) -> Option<String> {
        self.lock().remove_path(ty)
    }

    /// Check whether a handle is bound
    pub fn is_registered(&self, handle: ScriptHandle) -> bool {
        self.lock().is_registered(handle)
    }

    /// Number of bound handles
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// Check for an empty handle map
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl RegistryGuard<'_> {
    /// Bind a handle to a type.
    ///
    /// Fails without mutating when either side is already bound.
    pub fn add_by_handle(&mut self, handle: ScriptHandle, ty: ManagedType) -> Result<(), RegistryError> {
        if self.maps.script_to_type.contains_key(&handle) {
            return Err(RegistryError::HandleAlreadyRegistered(handle));
        }
        if let Some(existing) = self.maps.type_to_script.get(&ty) {
            return Err(RegistryError::TypeAlreadyRegistered {
                type_name: ty.full_name(),
                existing: *existing,
            });
        }
        tracing::trace!(script = %handle, class = %ty.full_name(), "Script registered");
        self.maps.type_to_script.insert(ty.clone(), handle);
        self.maps.script_to_type.insert(handle, ty);
        Ok(())
    }

    /// Unbind a handle, returning its type
    pub fn remove_by_handle(&mut self, handle: ScriptHandle) -> Option<ManagedType> {
        let ty = self.maps.script_to_type.remove(&handle)?;
        self.maps.type_to_script.remove(&ty);
        Some(ty)
    }

    /// Unbind a type, returning its handle
    pub fn remove_by_type(&mut self, ty: &ManagedType) -> Option<ScriptHandle> {
        let handle = self.maps.type_to_script.remove(ty)?;
        self.maps.script_to_type.remove(&handle);
        Some(handle)
    }

    /// Type bound to a handle
    pub fn try_get_type(&self, handle: ScriptHandle) -> Option<ManagedType> {
        self.maps.script_to_type.get(&handle).cloned()
    }

    /// Handle bound to a type
    pub fn try_get_handle(&self, ty: &ManagedType) -> Option<ScriptHandle> {
        self.maps.type_to_script.get(ty).copied()
    }

    /// Bind a stable path to a type.
    ///
    /// Re-adding an identical pair is a no-op. Fails without mutating when
    /// the path or the type is bound to something else.
    pub fn add_path(&mut self, path: &str, ty: ManagedType) -> Result<(), RegistryError> {
        if let Some(existing) = self.maps.path_to_type.get(path) {
            if *existing == ty {
                return Ok(());
            }
            return Err(RegistryError::PathAlreadyRegistered {
                path: path.to_string(),
                existing: existing.full_name(),
            });
        }
        if let Some(existing) = self.maps.type_to_path.get(&ty) {
            return Err(RegistryError::TypePathAlreadyRegistered {
                type_name: ty.full_name(),
                existing: existing.clone(),
            });
        }
        self.maps.type_to_path.insert(ty.clone(), path.to_string());
        self.maps.path_to_type.insert(path.to_string(), ty);
        Ok(())
    }

    /// Stable path of a type
    pub fn try_get_path(&self, ty: &ManagedType) -> Option<String> {
        self.maps.type_to_path.get(ty).cloned()
    }

    /// Type bound to a stable path
    pub fn try_get_type_by_path(&self, path: &str) -> Option<ManagedType> {
        self.maps.path_to_type.get(path).cloned()
    }

    /// Unbind a type from its path, returning the path
    pub fn remove_path(&mut self, ty: &ManagedType) -> Option<String> {
        let path = self.maps.type_to_path.remove(ty)?;
        self.maps.path_to_type.remove(&path);
        Some(path)
    }

    /// Remove a type from both maps
    pub fn evict_type(&mut self, ty: &ManagedType) -> Eviction {
        Eviction {
            handle: self.remove_by_type(ty),
            path: self.remove_path(ty),
        }
    }

    /// Check whether a handle is bound
    pub fn is_registered(&self, handle: ScriptHandle) -> bool {
        self.maps.script_to_type.contains_key(&handle)
    }

    /// Number of bound handles
    pub fn len(&self) -> usize {
        self.maps.script_to_type.len()
    }

    /// Check for an empty handle map
    pub fn is_empty(&self) -> bool {
        self.maps.script_to_type.is_empty()
    }
}
