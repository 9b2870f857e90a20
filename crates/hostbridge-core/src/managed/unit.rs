//! Load units
//!
//! A load unit is an independently unloadable container of managed types.
//! Subscribers register an unloading handler; `unload` fires every handler
//! exactly once, then the unit is gone.

use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use dashmap::DashMap;
use parking_lot::{Mutex, RwLock};

use super::ManagedType;
use crate::error::panic_message;

/// Unique identifier for a load unit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct LoadUnitId(u64);

impl LoadUnitId {
    /// Create a new unique unit id
    pub fn new() -> Self {
        static NEXT_ID: AtomicU64 = AtomicU64::new(1);
        LoadUnitId(NEXT_ID.fetch_add(1, Ordering::Relaxed))
    }

    /// Get the raw id value
    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl Default for LoadUnitId {
    fn default() -> Self {
        Self::new()
    }
}

/// Unit state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnitState {
    /// Loaded, types are usable
    Loaded,
    /// Unloading handlers are running
    Unloading,
    /// Unloaded; terminal
    Gone,
}

type UnloadingHandler = Box<dyn FnOnce(&LoadUnit) + Send>;

struct UnitInner {
    state: UnitState,
    handlers: Vec<UnloadingHandler>,
}

/// Container of managed types that can be unloaded as a whole
pub struct LoadUnit {
    id: LoadUnitId,
    name: String,
    inner: Mutex<UnitInner>,
    types: RwLock<Vec<ManagedType>>,
}

impl LoadUnit {
    /// Create a loaded, empty unit
    pub fn new(name: &str) -> Arc<Self> {
        Arc::new(Self {
            id: LoadUnitId::new(),
            name: name.to_string(),
            inner: Mutex::new(UnitInner {
                state: UnitState::Loaded,
                handlers: Vec::new(),
            }),
            types: RwLock::new(Vec::new()),
        })
    }

    /// Unit id
    pub fn id(&self) -> LoadUnitId {
        self.id
    }

    /// Unit name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Current state
    pub fn state(&self) -> UnitState {
        self.inner.lock().state
    }

    /// Check whether the unit is still loaded
    pub fn is_loaded(&self) -> bool {
        self.state() == UnitState::Loaded
    }

    /// Snapshot of the unit's types
    pub fn types(&self) -> Vec<ManagedType> {
        self.types.read().clone()
    }

    /// Find a type by qualified name
    pub fn find_type(&self, full_name: &str) -> Option<ManagedType> {
        self.types
            .read()
            .iter()
            .find(|ty| ty.full_name() == full_name)
            .cloned()
    }

    pub(super) fn add_type(&self, ty: ManagedType) {
        self.types.write().push(ty);
    }

    /// Subscribe to the unloading notification.
    ///
    /// Returns `false` without storing the handler when the unit is no
    /// longer loaded.
    pub fn subscribe_unloading<F>(&self, handler: F) -> bool
    where
        F: FnOnce(&LoadUnit) + Send + 'static,
    {
        let mut inner = self.inner.lock();
        if inner.state != UnitState::Loaded {
            return false;
        }
        inner.handlers.push(Box::new(handler));
        true
    }

    /// Unload the unit, firing every unloading handler once.
    ///
    /// Returns `false` if the unit was already unloading or gone.
    pub fn unload(&self) -> bool {
        let handlers = {
            let mut inner = self.inner.lock();
            if inner.state != UnitState::Loaded {
                return false;
            }
            inner.state = UnitState::Unloading;
            std::mem::take(&mut inner.handlers)
        };

        tracing::debug!(unit = %self.name, handlers = handlers.len(), "Unloading load unit");

        for handler in handlers {
            if let Err(payload) = catch_unwind(AssertUnwindSafe(|| handler(self))) {
                tracing::warn!(
                    unit = %self.name,
                    "Unloading handler panicked: {}",
                    panic_message(payload)
                );
            }
        }

        self.inner.lock().state = UnitState::Gone;
        self.types.write().clear();
        true
    }
}

impl fmt::Debug for LoadUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoadUnit")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("state", &self.state())
            .finish()
    }
}

/// Currently loaded units
#[derive(Debug, Default)]
pub struct UnitCatalog {
    units: DashMap<LoadUnitId, Arc<LoadUnit>>,
}

impl UnitCatalog {
    /// Create an empty catalog
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a loaded unit
    pub fn load(&self, unit: Arc<LoadUnit>) {
        tracing::debug!(unit = %unit.name(), "Load unit added");
        self.units.insert(unit.id(), unit);
    }

    /// Remove a unit from the catalog and unload it
    pub fn unload(&self, id: LoadUnitId) -> bool {
        match self.units.remove(&id) {
            Some((_, unit)) => unit.unload(),
            None => false,
        }
    }

    /// Get a unit by id
    pub fn get(&self, id: LoadUnitId) -> Option<Arc<LoadUnit>> {
        self.units.get(&id).map(|entry| entry.value().clone())
    }

    /// Find a type by unit name and qualified name among loaded units
    pub fn find_type(&self, unit_name: &str, full_name: &str) -> Option<ManagedType> {
        self.units
            .iter()
            .filter(|entry| entry.name() == unit_name && entry.is_loaded())
            .find_map(|entry| entry.find_type(full_name))
    }

    /// Number of loaded units
    pub fn len(&self) -> usize {
        self.units.len()
    }

    /// Check for an empty catalog
    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }
}
