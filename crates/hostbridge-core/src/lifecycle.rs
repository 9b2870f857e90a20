//! Load-unit lifecycle
//!
//! The manager tracks every unit whose types were registered for reloading.
//! It subscribes once per unit; when the unit unloads, each tracked type is
//! evicted from the identity registry under its lock:
//! - a type with a stable path leaves nothing behind (the host reloads it
//!   by path)
//! - a path-less type whose handle was removed leaves a `ReloadRecord` so
//!   the handle can be re-resolved by name later

use std::sync::{Arc, Weak};

use dashmap::DashMap;
use hostbridge_sdk::ScriptHandle;

use crate::error::{BridgeError, BridgeResult};
use crate::managed::{LoadUnit, LoadUnitId, ManagedType, TypeId, UnitCatalog};
use crate::registry::IdentityRegistry;

/// What is needed to re-resolve a handle after its unit unloaded
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReloadRecord {
    /// Name of the unit the type came from
    pub unit_name: Option<String>,
    /// Qualified type name
    pub class_name: String,
}

/// Successful reload result
#[derive(Debug, Clone)]
pub enum ReloadOutcome {
    /// The handle was still registered; nothing was re-resolved
    Existing(ManagedType),
    /// The handle was re-bound to a type from a loaded unit
    Reresolved(ManagedType),
}

impl ReloadOutcome {
    /// Type the handle is bound to after the reload
    pub fn managed_type(&self) -> &ManagedType {
        match self {
            ReloadOutcome::Existing(ty) | ReloadOutcome::Reresolved(ty) => ty,
        }
    }
}

struct UnitTracking {
    name: String,
    types: DashMap<TypeId, ManagedType>,
}

struct LifecycleInner {
    registry: Arc<IdentityRegistry>,
    units: DashMap<LoadUnitId, UnitTracking>,
    records: DashMap<ScriptHandle, ReloadRecord>,
}

/// Tracks load units and reload records
#[derive(Clone)]
pub struct LifecycleManager {
    inner: Arc<LifecycleInner>,
}

impl LifecycleManager {
    /// Create a manager evicting from `registry`
    pub fn new(registry: Arc<IdentityRegistry>) -> Self {
        Self {
            inner: Arc::new(LifecycleInner {
                registry,
                units: DashMap::new(),
                records: DashMap::new(),
            }),
        }
    }

    /// Start tracking a unit.
    ///
    /// Subscribes to its unloading notification the first time only.
    /// Returns `false` when the unit is no longer loaded.
    pub fn track_unit(&self, unit: &LoadUnit) -> bool {
        match self.inner.units.entry(unit.id()) {
            dashmap::mapref::entry::Entry::Occupied(_) => true,
            dashmap::mapref::entry::Entry::Vacant(vacant) => {
                let weak: Weak<LifecycleInner> = Arc::downgrade(&self.inner);
                let subscribed = unit.subscribe_unloading(move |unit| {
                    if let Some(inner) = weak.upgrade() {
                        inner.on_unit_unloading(unit);
                    }
                });
                if !subscribed {
                    return false;
                }
                tracing::debug!(unit = %unit.name(), "Tracking load unit for unloading");
                vacant.insert(UnitTracking {
                    name: unit.name().to_string(),
                    types: DashMap::new(),
                });
                true
            }
        }
    }

    /// Track a type so it is evicted when its unit unloads.
    ///
    /// Types without a live unit are not tracked.
    pub fn add_type_for_reloading(&self, ty: &ManagedType) -> bool {
        let Some(unit) = ty.unit() else {
            return false;
        };
        if !self.track_unit(&unit) {
            return false;
        }
        match self.inner.units.get(&unit.id()) {
            Some(tracking) => {
                tracking.types.insert(ty.id(), ty.clone());
                true
            }
            None => false,
        }
    }

    /// Check whether a unit is tracked
    pub fn is_tracked(&self, unit: LoadUnitId) -> bool {
        self.inner.units.contains_key(&unit)
    }

    /// Number of types tracked for a unit
    pub fn tracked_type_count(&self, unit: LoadUnitId) -> usize {
        self.inner
            .units
            .get(&unit)
            .map(|tracking| tracking.types.len())
            .unwrap_or(0)
    }

    /// Reload record kept for a handle
    pub fn reload_record(&self, handle: ScriptHandle) -> Option<ReloadRecord> {
        self.inner.records.get(&handle).map(|record| record.clone())
    }

    /// Number of reload records
    pub fn reload_record_count(&self) -> usize {
        self.inner.records.len()
    }

    /// Drop the reload record of a handle
    pub fn discard_reload_record(&self, handle: ScriptHandle) -> Option<ReloadRecord> {
        self.inner.records.remove(&handle).map(|(_, record)| record)
    }

    /// Re-resolve a handle.
    ///
    /// # Arguments
    /// * `handle` - Script handle to reload
    /// * `catalog` - Currently loaded units to search
    ///
    /// # Returns
    /// * `Ok(ReloadOutcome::Existing)` - Still registered; records untouched
    /// * `Ok(ReloadOutcome::Reresolved)` - Re-bound from its reload record and
    ///   tracked in its new unit
    /// * `Err(BridgeError)` - Resolution failed; the record, if any, is consumed
    pub fn try_reload(&self, handle: ScriptHandle, catalog: &UnitCatalog) -> BridgeResult<ReloadOutcome> {
        let mut registry = self.inner.registry.lock();

        if let Some(ty) = registry.try_get_type(handle) {
            return Ok(ReloadOutcome::Existing(ty));
        }

        let (_, record) = self
            .inner
            .records
            .remove(&handle)
            .ok_or(BridgeError::MissingReloadRecord(handle))?;

        let unit_name = record
            .unit_name
            .ok_or_else(|| BridgeError::MissingUnitName(record.class_name.clone()))?;

        let ty = catalog
            .find_type(&unit_name, &record.class_name)
            .ok_or_else(|| BridgeError::TypeNotFound {
                unit_name: unit_name.clone(),
                class_name: record.class_name.clone(),
            })?;

        if !ty.derives_from_native_object() {
            return Err(BridgeError::NotAnObjectType(record.class_name));
        }

        registry.add_by_handle(handle, ty.clone())?;
        self.add_type_for_reloading(&ty);
        tracing::debug!(script = %handle, class = %record.class_name, unit = %unit_name, "Script re-resolved");
        Ok(ReloadOutcome::Reresolved(ty))
    }
}

impl LifecycleInner {
    fn on_unit_unloading(&self, unit: &LoadUnit) {
        let Some((_, tracking)) = self.units.remove(&unit.id()) else {
            return;
        };

        let mut registry = self.registry.lock();
        let mut evicted = 0usize;
        let mut recorded = 0usize;

        for entry in tracking.types.iter() {
            let ty = entry.value();
            let eviction = registry.evict_type(ty);
            let Some(handle) = eviction.handle else {
                continue;
            };
            evicted += 1;
            if eviction.path.is_none() {
                self.records.insert(
                    handle,
                    ReloadRecord {
                        unit_name: Some(tracking.name.clone()),
                        class_name: ty.full_name(),
                    },
                );
                recorded += 1;
            }
        }

        tracing::debug!(
            unit = %tracking.name,
            evicted,
            recorded,
            "Evicted script types of unloading unit"
        );
    }
}
