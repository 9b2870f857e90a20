//! Managed objects referenced from native code

use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use hostbridge_sdk::{InteropResult, NativeObjectPtr, StringName, Variant};
use parking_lot::Mutex;
use rustc_hash::FxHashMap;

use super::ManagedType;

/// Callback connected to a signal
pub type SignalCallback = Arc<dyn Fn(&ManagedObject, &[Variant]) -> InteropResult<()> + Send + Sync>;

/// Instance of a managed type, optionally bound to a native object
pub struct ManagedObject {
    ty: ManagedType,
    native: AtomicUsize,
    fields: Mutex<FxHashMap<StringName, Variant>>,
    signals: Mutex<FxHashMap<StringName, Vec<SignalCallback>>>,
}

impl ManagedObject {
    /// Create an object of `ty` bound to `native`
    pub fn new(ty: ManagedType, native: NativeObjectPtr) -> Self {
        Self {
            ty,
            native: AtomicUsize::new(native.as_raw()),
            fields: Mutex::new(FxHashMap::default()),
            signals: Mutex::new(FxHashMap::default()),
        }
    }

    /// Runtime type
    pub fn managed_type(&self) -> &ManagedType {
        &self.ty
    }

    /// Bound native object
    pub fn native_ptr(&self) -> NativeObjectPtr {
        NativeObjectPtr::from_raw(self.native.load(Ordering::Acquire))
    }

    /// Rebind to another native object
    pub fn set_native_ptr(&self, native: NativeObjectPtr) {
        self.native.store(native.as_raw(), Ordering::Release);
    }

    /// Read a field
    pub fn get(&self, name: &str) -> Option<Variant> {
        self.fields.lock().get(&StringName::new(name)).cloned()
    }

    /// Write a field
    pub fn set(&self, name: &str, value: impl Into<Variant>) {
        self.fields.lock().insert(StringName::new(name), value.into());
    }

    /// Connect a callback to a signal
    pub fn connect<F>(&self, signal: &str, callback: F)
    where
        F: Fn(&ManagedObject, &[Variant]) -> InteropResult<()> + Send + Sync + 'static,
    {
        self.signals
            .lock()
            .entry(StringName::new(signal))
            .or_default()
            .push(Arc::new(callback));
    }

    /// Invoke every callback connected to `signal`.
    ///
    /// Returns the number of callbacks run. The first error stops delivery.
    pub fn emit(&self, signal: &str, args: &[Variant]) -> InteropResult<usize> {
        // Snapshot so callbacks may connect or emit without deadlocking
        let callbacks = match self.signals.lock().get(&StringName::new(signal)) {
            Some(callbacks) => callbacks.clone(),
            None => return Ok(0),
        };
        for callback in &callbacks {
            callback(self, args)?;
        }
        Ok(callbacks.len())
    }
}

impl fmt::Debug for ManagedObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ManagedObject")
            .field("type", &self.ty.full_name())
            .field("native", &self.native_ptr())
            .finish()
    }
}
