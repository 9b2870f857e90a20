//! Script bridge
//!
//! `ScriptBridge` is the explicit context the native side calls into. It
//! owns the identity registry, lifecycle manager, handle table, loaded-unit
//! catalog and native wrapper catalog, and talks back to the host only
//! through `NativeHost`, `ErrorSink` and caller-provided consumers.
//!
//! Boundary methods never propagate errors: they report them through the
//! error sink and return a status value.

use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

use hostbridge_sdk::{
    BoxedVariantCodec, InteropResult, NativeObjectPtr, NativeVariant, ScriptHandle, Variant,
    VariantCodec,
};
use parking_lot::{Mutex, RwLock};
use rustc_hash::FxHashMap;

use crate::error::{catch_managed, panic_message, BridgeError, BridgeResult, HandleError};
use crate::handles::{GcHandle, HandleTable};
use crate::host::{ErrorSink, NativeHost, TracingErrorSink};
use crate::lifecycle::{LifecycleManager, ReloadOutcome};
use crate::managed::{LoadUnit, LoadUnitId, ManagedObject, ManagedType, UnitCatalog};
use crate::marshal::{self, InteropPropertyDefaultValue, InteropPropertyInfo, ScriptClassInfo};
use crate::options::BridgeOptions;
use crate::registry::{IdentityRegistry, RegistryGuard};

type FrameTask = Box<dyn FnOnce() + Send>;

/// Result of raising a signal on a managed object
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignalDispatch {
    /// Delivered to this many callbacks
    Delivered(usize),
    /// The owner object is gone
    OwnerCollected,
    /// Delivery failed; the error was reported
    Failed,
}

/// Builder for `ScriptBridge`
pub struct BridgeBuilder {
    options: BridgeOptions,
    host: Arc<dyn NativeHost>,
    sink: Arc<dyn ErrorSink>,
    codec: Arc<dyn VariantCodec>,
}

impl BridgeBuilder {
    /// Set options
    pub fn options(mut self, options: BridgeOptions) -> Self {
        self.options = options;
        self
    }

    /// Set the error sink
    pub fn error_sink(mut self, sink: Arc<dyn ErrorSink>) -> Self {
        self.sink = sink;
        self
    }

    /// Set the variant codec
    pub fn codec(mut self, codec: Arc<dyn VariantCodec>) -> Self {
        self.codec = codec;
        self
    }

    /// Create the bridge
    pub fn build(self) -> ScriptBridge {
        let registry = Arc::new(IdentityRegistry::new());
        let lifecycle = LifecycleManager::new(registry.clone());
        ScriptBridge {
            inner: Arc::new(BridgeInner {
                options: self.options,
                host: self.host,
                sink: self.sink,
                codec: self.codec,
                registry,
                lifecycle,
                units: UnitCatalog::new(),
                handles: HandleTable::new(),
                native_types: RwLock::new(FxHashMap::default()),
                frame_tasks: Mutex::new(Vec::new()),
            }),
        }
    }
}

struct BridgeInner {
    options: BridgeOptions,
    host: Arc<dyn NativeHost>,
    sink: Arc<dyn ErrorSink>,
    codec: Arc<dyn VariantCodec>,
    registry: Arc<IdentityRegistry>,
    lifecycle: LifecycleManager,
    units: UnitCatalog,
    handles: HandleTable,
    native_types: RwLock<FxHashMap<String, ManagedType>>,
    frame_tasks: Mutex<Vec<FrameTask>>,
}

/// Bridge context between the native host and managed scripts
#[derive(Clone)]
pub struct ScriptBridge {
    inner: Arc<BridgeInner>,
}

impl ScriptBridge {
    /// Create a bridge with the tracing error sink and the boxed codec
    pub fn new(options: BridgeOptions, host: Arc<dyn NativeHost>) -> Self {
        Self::builder(host).options(options).build()
    }

    /// Start a builder
    pub fn builder(host: Arc<dyn NativeHost>) -> BridgeBuilder {
        BridgeBuilder {
            options: BridgeOptions::default(),
            host,
            sink: Arc::new(TracingErrorSink),
            codec: Arc::new(BoxedVariantCodec),
        }
    }

    // ========================================================================
    // Accessors
    // ========================================================================

    /// Options
    pub fn options(&self) -> &BridgeOptions {
        &self.inner.options
    }

    /// Identity registry
    pub fn registry(&self) -> &IdentityRegistry {
        &self.inner.registry
    }

    /// Lifecycle manager
    pub fn lifecycle(&self) -> &LifecycleManager {
        &self.inner.lifecycle
    }

    /// Loaded units
    pub fn units(&self) -> &UnitCatalog {
        &self.inner.units
    }

    /// Object handle table
    pub fn handles(&self) -> &HandleTable {
        &self.inner.handles
    }

    /// Variant codec
    pub fn codec(&self) -> &dyn VariantCodec {
        self.inner.codec.as_ref()
    }

    /// Report an error through the error sink
    pub fn report(&self, error: &BridgeError) {
        self.inner.sink.push_error(&error.to_string());
    }

    fn decode_args(&self, args: &[NativeVariant]) -> InteropResult<Vec<Variant>> {
        args.iter().map(|arg| self.inner.codec.decode(arg)).collect()
    }

    // ========================================================================
    // Units and native wrappers
    // ========================================================================

    /// Register a native wrapper type under its native class name.
    ///
    /// Returns `false` for script types.
    pub fn register_native_type(&self, ty: ManagedType) -> bool {
        let Some(native_name) = ty.native_name().map(str::to_string) else {
            return false;
        };
        self.inner.native_types.write().insert(native_name, ty);
        true
    }

    /// Native wrapper registered for a native class name
    pub fn native_type(&self, native_name: &str) -> Option<ManagedType> {
        self.inner.native_types.read().get(native_name).cloned()
    }

    fn resolve_native_proxy(&self, native_type_name: &str) -> BridgeResult<ManagedType> {
        let name = native_type_name.strip_prefix('_').unwrap_or(native_type_name);
        let ty = self
            .native_type(name)
            .ok_or_else(|| BridgeError::NativeTypeNotFound(native_type_name.to_string()))?;

        // Static wrappers are singletons; an instance uses the root type
        if ty.is_static() {
            let root = &self.inner.options.root_native_type;
            return self
                .native_type(root)
                .ok_or_else(|| BridgeError::NativeTypeNotFound(root.clone()));
        }
        Ok(ty)
    }

    /// Add a unit to the loaded catalog and register its scripts
    pub fn load_unit(&self, unit: Arc<LoadUnit>) -> usize {
        self.inner.units.load(unit.clone());
        self.lookup_scripts_in_unit(&unit)
    }

    /// Remove a unit from the catalog and unload it
    pub fn unload_unit(&self, id: LoadUnitId) -> bool {
        self.inner.units.unload(id)
    }

    /// Register the stable paths declared by a unit's top-level script
    /// types, tracking them for unloading when reload is enabled.
    ///
    /// Returns the number of types registered.
    pub fn lookup_scripts_in_unit(&self, unit: &LoadUnit) -> usize {
        let mut registered = 0;
        for ty in unit.types() {
            if ty.is_native() || ty.declaring_type().is_some() || !ty.derives_from_native_object() {
                continue;
            }
            let Some(path) = ty.script_path() else {
                continue;
            };
            if let Err(err) = self.inner.registry.add_path(path, ty.clone()) {
                self.report(&err.into());
                continue;
            }
            if self.inner.options.reload_enabled {
                self.inner.lifecycle.add_type_for_reloading(&ty);
            }
            registered += 1;
        }
        tracing::debug!(unit = %unit.name(), registered, "Looked up scripts in unit");
        registered
    }

    /// Track a unit so its registered types are evicted on unload
    pub fn track_unit_for_unloading(&self, unit: &LoadUnit) -> bool {
        self.inner.lifecycle.track_unit(unit)
    }

    // ========================================================================
    // Frame tasks
    // ========================================================================

    /// Queue a task for the next `frame_callback`
    pub fn add_frame_task<F>(&self, task: F)
    where
        F: FnOnce() + Send + 'static,
    {
        self.inner.frame_tasks.lock().push(Box::new(task));
    }

    /// Run the tasks queued so far. Tasks queued while running wait for the
    /// next frame. Returns the number of tasks run.
    pub fn frame_callback(&self) -> usize {
        let tasks = std::mem::take(&mut *self.inner.frame_tasks.lock());
        let count = tasks.len();
        for task in tasks {
            if let Err(payload) = catch_unwind(AssertUnwindSafe(task)) {
                self.report(&BridgeError::Panic(panic_message(payload)));
            }
        }
        count
    }

    // ========================================================================
    // Object instantiation
    // ========================================================================

    /// Create the managed wrapper for a native object of a native class.
    ///
    /// Returns a strong handle, or `None` after reporting the error.
    pub fn instantiate_for_native_object(
        &self,
        native_type_name: &str,
        native: NativeObjectPtr,
    ) -> Option<GcHandle> {
        match self.try_instantiate_for_native_object(native_type_name, native) {
            Ok(handle) => Some(handle),
            Err(err) => {
                self.report(&err);
                None
            }
        }
    }

    fn try_instantiate_for_native_object(
        &self,
        native_type_name: &str,
        native: NativeObjectPtr,
    ) -> BridgeResult<GcHandle> {
        let ty = self.resolve_native_proxy(native_type_name)?;
        let ctor = ty
            .find_constructor(0)
            .ok_or_else(|| BridgeError::MissingConstructor {
                class_name: ty.full_name(),
                arg_count: 0,
            })?;
        let object = Arc::new(ManagedObject::new(ty.clone(), native));
        catch_managed(|| ctor.invoke(&object, &[]))?;
        Ok(self.inner.handles.alloc_strong(object)?)
    }

    /// Create a script instance for a native object.
    ///
    /// Picks the constructor whose parameter count matches `args` and
    /// returns a strong handle to the new object.
    pub fn instantiate_script_instance(
        &self,
        script: ScriptHandle,
        native: NativeObjectPtr,
        args: &[NativeVariant],
    ) -> BridgeResult<GcHandle> {
        let ty = self
            .inner
            .registry
            .try_get_type(script)
            .ok_or(BridgeError::ScriptNotRegistered(script))?;
        let ctor = ty
            .find_constructor(args.len())
            .ok_or_else(|| BridgeError::MissingConstructor {
                class_name: ty.full_name(),
                arg_count: args.len(),
            })?;
        let args = self.decode_args(args)?;
        let object = Arc::new(ManagedObject::new(ty.clone(), native));
        catch_managed(|| ctor.invoke(&object, &args))?;
        tracing::trace!(script = %script, class = %ty.full_name(), "Script instance created");
        Ok(self.inner.handles.alloc_strong(object)?)
    }

    /// Native class name of the nearest native wrapper the script derives
    /// from. `None` for unregistered scripts.
    pub fn get_script_native_base_name(&self, script: ScriptHandle) -> Option<String> {
        let ty = self.inner.registry.try_get_type(script)?;
        ty.native_base()
            .and_then(|native| native.native_name())
            .map(str::to_string)
    }

    /// Rebind the object behind `handle` to another native object.
    ///
    /// Returns `false` when the object is gone.
    pub fn set_native_object_pointer(&self, handle: GcHandle, native: NativeObjectPtr) -> bool {
        match self.inner.handles.target(handle) {
            Some(object) => {
                object.set_native_ptr(native);
                true
            }
            None => false,
        }
    }

    /// Release an object handle
    pub fn free_handle(&self, handle: GcHandle) -> bool {
        self.inner.handles.free(handle)
    }

    /// Replace an object handle with one of the requested strength.
    ///
    /// Returns `None` when the object was already collected; the old handle
    /// is then left for the caller to free.
    pub fn swap_handle_ownership(&self, old: GcHandle, create_weak: bool) -> Option<GcHandle> {
        match self.inner.handles.swap(old, create_weak) {
            Ok(handle) => Some(handle),
            Err(HandleError::AlreadyCollected) => {
                tracing::trace!(handle = ?old, "Handle swap skipped, target collected");
                None
            }
            Err(err) => {
                self.report(&err.into());
                None
            }
        }
    }

    /// Raise a signal on the object behind `owner`
    pub fn raise_event_signal(&self, owner: GcHandle, signal: &str, args: &[NativeVariant]) -> SignalDispatch {
        let Some(object) = self.inner.handles.target(owner) else {
            return SignalDispatch::OwnerCollected;
        };
        let result = self
            .decode_args(args)
            .and_then(|args| catch_managed(|| object.emit(signal, &args)));
        match result {
            Ok(delivered) => SignalDispatch::Delivered(delivered),
            Err(err) => {
                self.report(&err.into());
                SignalDispatch::Failed
            }
        }
    }

    // ========================================================================
    // Script registration
    // ========================================================================

    /// Check whether `script`'s type is, or derives from, `maybe_base`'s
    pub fn script_is_or_inherits(&self, script: ScriptHandle, maybe_base: ScriptHandle) -> bool {
        let registry = self.inner.registry.lock();
        match (registry.try_get_type(script), registry.try_get_type(maybe_base)) {
            (Some(ty), Some(base)) => ty.is_assignable_to(&base),
            _ => false,
        }
    }

    /// Bind `script` to the type registered for `path`.
    ///
    /// Returns `true` if the script is (now) registered, `false` when no
    /// type has that path or the binding conflicts.
    pub fn add_script_bridge(&self, script: ScriptHandle, path: &str) -> bool {
        let mut registry = self.inner.registry.lock();
        if registry.is_registered(script) {
            return true;
        }
        let Some(ty) = registry.try_get_type_by_path(path) else {
            return false;
        };
        match registry.add_by_handle(script, ty) {
            Ok(()) => {
                self.inner.lifecycle.discard_reload_record(script);
                true
            }
            Err(err) => {
                drop(registry);
                self.report(&err.into());
                false
            }
        }
    }

    /// Script for the type registered at `path`, creating its bridge on
    /// first use. Paths with no registered type get a fresh untyped script.
    pub fn get_or_create_script_for_path(&self, path: &str) -> ScriptHandle {
        let Some(ty) = self.inner.registry.try_get_type_by_path(path) else {
            return self.inner.host.new_script();
        };
        self.get_or_create_script_for_type(&ty)
    }

    /// Script bound to `ty`, creating and registering one if needed.
    ///
    /// Returns `ScriptHandle::NULL` after reporting a registration failure.
    pub fn get_or_create_script_for_type(&self, ty: &ManagedType) -> ScriptHandle {
        let result = {
            let mut registry = self.inner.registry.lock();
            self.get_or_create_locked(&mut registry, ty)
        };
        self.finish_get_or_create(result)
    }

    /// Script bound to `ty`; otherwise load it from its stable path;
    /// otherwise create a fresh bridge.
    ///
    /// The load runs outside the registry lock because the host may call
    /// `add_script_bridge` while loading.
    pub fn get_or_load_or_create_script_for_type(&self, ty: &ManagedType) -> ScriptHandle {
        let path = {
            let mut registry = self.inner.registry.lock();
            match registry.try_get_path(ty) {
                Some(path) if registry.try_get_handle(ty).is_none() => path,
                _ => {
                    let result = self.get_or_create_locked(&mut registry, ty);
                    drop(registry);
                    return self.finish_get_or_create(result);
                }
            }
        };

        if let Some(script) = self.inner.host.load_script(&path) {
            return script;
        }

        self.inner.sink.push_error(&format!(
            "Cannot load script for type '{}'. Path: '{}'.",
            ty.full_name(),
            path
        ));
        // Fall back to a script with no path, as for types without a file
        self.get_or_create_script_for_type(ty)
    }

    fn get_or_create_locked(
        &self,
        registry: &mut RegistryGuard<'_>,
        ty: &ManagedType,
    ) -> BridgeResult<(ScriptHandle, bool)> {
        if let Some(script) = registry.try_get_handle(ty) {
            self.inner.host.reference_script(script);
            return Ok((script, false));
        }

        let script = self.inner.host.new_script();
        if script.is_null() || registry.is_registered(script) {
            return Err(BridgeError::UnusableHostScript(script, ty.full_name()));
        }
        registry.add_by_handle(script, ty.clone())?;
        self.inner.lifecycle.discard_reload_record(script);
        if self.inner.options.reload_enabled {
            self.inner.lifecycle.add_type_for_reloading(ty);
        }
        tracing::debug!(script = %script, class = %ty.full_name(), "Created script bridge");
        Ok((script, true))
    }

    fn finish_get_or_create(&self, result: BridgeResult<(ScriptHandle, bool)>) -> ScriptHandle {
        match result {
            Ok((script, created)) => {
                if created {
                    self.inner.host.reload_registered_script(script);
                }
                script
            }
            Err(err) => {
                self.report(&err);
                ScriptHandle::NULL
            }
        }
    }

    /// Unbind a script and forget any reload record it had
    pub fn remove_script_bridge(&self, script: ScriptHandle) {
        let removed = self.inner.registry.remove_by_handle(script);
        self.inner.lifecycle.discard_reload_record(script);
        if let Some(ty) = removed {
            tracing::debug!(script = %script, class = %ty.full_name(), "Removed script bridge");
        }
    }

    /// Reload a script after its unit was reloaded.
    ///
    /// Scripts that are still registered are reloaded as they are. Others
    /// are re-resolved by name from their reload record.
    pub fn try_reload_script(&self, script: ScriptHandle) -> bool {
        match self.inner.lifecycle.try_reload(script, &self.inner.units) {
            Ok(outcome) => {
                if let ReloadOutcome::Reresolved(ty) = &outcome {
                    tracing::debug!(script = %script, class = %ty.full_name(), "Reloading re-resolved script");
                }
                self.inner.host.reload_registered_script(script);
                true
            }
            Err(err @ (BridgeError::MissingReloadRecord(_) | BridgeError::MissingUnitName(_))) => {
                self.report(&err);
                false
            }
            Err(err) => {
                tracing::debug!(script = %script, "Script cannot be reloaded: {}", err);
                false
            }
        }
    }

    // ========================================================================
    // Metadata
    // ========================================================================

    /// Class information for a registered script.
    ///
    /// On failure the error is reported and defaults are returned.
    pub fn update_script_class_info(&self, script: ScriptHandle) -> ScriptClassInfo {
        match self.try_update_script_class_info(script) {
            Ok(info) => info,
            Err(err) => {
                self.report(&err);
                ScriptClassInfo::default()
            }
        }
    }

    fn try_update_script_class_info(&self, script: ScriptHandle) -> BridgeResult<ScriptClassInfo> {
        let ty = self
            .inner
            .registry
            .try_get_type(script)
            .ok_or(BridgeError::ScriptNotRegistered(script))?;

        let is_tool = marshal::is_tool(&ty, &self.inner.options);
        let rpc_functions = marshal::collect_rpc_table(&ty)?;
        let event_signals = marshal::collect_signals(&ty)?;

        let base_script = match ty.base() {
            Some(base) if !base.is_native() => {
                Some(self.get_or_load_or_create_script_for_type(base)).filter(|s| !s.is_null())
            }
            _ => None,
        };

        Ok(ScriptClassInfo {
            is_tool,
            rpc_functions,
            event_signals,
            base_script,
        })
    }

    /// Hand the merged property list of a script to `consumer`.
    ///
    /// The consumer runs at most once, and not at all when the list is
    /// empty or extraction fails.
    pub fn get_property_info_list<F>(&self, script: ScriptHandle, consumer: F)
    where
        F: FnOnce(ScriptHandle, &[InteropPropertyInfo<'_>]),
    {
        let result = self
            .inner
            .registry
            .try_get_type(script)
            .ok_or(BridgeError::ScriptNotRegistered(script))
            .and_then(|ty| marshal::marshal_property_list(script, &ty, consumer));
        if let Err(err) = result {
            self.report(&err);
        }
    }

    /// Hand the merged property default values of a script to `consumer`,
    /// encoded with the bridge codec. Same calling rules as
    /// `get_property_info_list`.
    pub fn get_property_default_values<F>(&self, script: ScriptHandle, consumer: F)
    where
        F: FnOnce(ScriptHandle, &[InteropPropertyDefaultValue<'_>]),
    {
        let result = self
            .inner
            .registry
            .try_get_type(script)
            .ok_or(BridgeError::ScriptNotRegistered(script))
            .and_then(|ty| {
                marshal::marshal_default_values(script, &ty, self.inner.codec.as_ref(), consumer)
            });
        if let Err(err) = result {
            self.report(&err);
        }
    }
}

impl fmt::Debug for ScriptBridge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScriptBridge")
            .field("options", &self.inner.options)
            .field("scripts", &self.inner.registry.len())
            .field("units", &self.inner.units.len())
            .field("handles", &self.inner.handles.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::managed::{TypeAttributes, TypeBuilder};
    use hostbridge_sdk::{GeneratedMetadata, MethodInfo, PropertyInfo, RpcMode, SignalInfo, VariantType};
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct MockHost {
        next: AtomicUsize,
        created: AtomicUsize,
        reloaded: Mutex<Vec<ScriptHandle>>,
        loadable: Mutex<FxHashMap<String, ScriptHandle>>,
    }

    impl NativeHost for MockHost {
        fn new_script(&self) -> ScriptHandle {
            self.created.fetch_add(1, Ordering::SeqCst);
            ScriptHandle::from_raw(0x1000 + self.next.fetch_add(1, Ordering::SeqCst) * 8)
        }

        fn load_script(&self, path: &str) -> Option<ScriptHandle> {
            self.loadable.lock().get(path).copied()
        }

        fn reload_registered_script(&self, script: ScriptHandle) {
            self.reloaded.lock().push(script);
        }
    }

    #[derive(Default)]
    struct CollectingSink(Mutex<Vec<String>>);

    impl ErrorSink for CollectingSink {
        fn push_error(&self, message: &str) {
            self.0.lock().push(message.to_string());
        }
    }

    struct PlayerMetadata;

    impl GeneratedMetadata for PlayerMetadata {
        fn property_list(&self) -> InteropResult<Vec<PropertyInfo>> {
            Ok(vec![PropertyInfo::exported("speed", VariantType::Float)])
        }

        fn signal_list(&self) -> InteropResult<Vec<SignalInfo>> {
            Ok(vec![SignalInfo::new("died")])
        }

        fn methods(&self) -> InteropResult<Vec<MethodInfo>> {
            Ok(vec![MethodInfo::new("sync").with_rpc(RpcMode::AnyPeer)])
        }
    }

    struct Fixture {
        bridge: ScriptBridge,
        host: Arc<MockHost>,
        sink: Arc<CollectingSink>,
        object: ManagedType,
        node: ManagedType,
    }

    fn fixture() -> Fixture {
        let host = Arc::new(MockHost::default());
        let sink = Arc::new(CollectingSink::default());
        let bridge = ScriptBridge::builder(host.clone())
            .error_sink(sink.clone())
            .build();
        let object = TypeBuilder::native("GodotObject", "Object")
            .namespace("Godot")
            .default_constructor()
            .build();
        let node = TypeBuilder::native("Node", "Node")
            .namespace("Godot")
            .base(&object)
            .default_constructor()
            .build();
        bridge.register_native_type(object.clone());
        bridge.register_native_type(node.clone());
        Fixture {
            bridge,
            host,
            sink,
            object,
            node,
        }
    }

    #[test]
    fn test_native_proxy_resolution() {
        let f = fixture();
        let singleton = TypeBuilder::native("Input", "Input")
            .attributes(TypeAttributes::STATIC)
            .build();
        f.bridge.register_native_type(singleton);

        let handle = f
            .bridge
            .instantiate_for_native_object("_Node", NativeObjectPtr::from_raw(0x10))
            .unwrap();
        let object = f.bridge.handles().target(handle).unwrap();
        assert_eq!(object.managed_type(), &f.node);

        let handle = f
            .bridge
            .instantiate_for_native_object("Input", NativeObjectPtr::from_raw(0x20))
            .unwrap();
        let object = f.bridge.handles().target(handle).unwrap();
        assert_eq!(object.managed_type(), &f.object);

        assert!(f
            .bridge
            .instantiate_for_native_object("Missing", NativeObjectPtr::NULL)
            .is_none());
        assert!(f.sink.0.lock()[0].contains("Wrapper class not found for type: Missing"));
    }

    #[test]
    fn test_get_or_create_reuses_handle() {
        let f = fixture();
        let player = TypeBuilder::script("Player").base(&f.node).build();

        let first = f.bridge.get_or_create_script_for_type(&player);
        let second = f.bridge.get_or_create_script_for_type(&player);
        assert_eq!(first, second);
        assert_eq!(f.host.created.load(Ordering::SeqCst), 1);
        assert_eq!(*f.host.reloaded.lock(), vec![first]);
    }

    #[test]
    fn test_path_lookup() {
        let f = fixture();
        let player = TypeBuilder::script("Player").base(&f.node).build();
        f.bridge.registry().add_path("res://a.script", player.clone()).unwrap();

        let first = f.bridge.get_or_create_script_for_path("res://a.script");
        let second = f.bridge.get_or_create_script_for_path("res://a.script");
        assert_eq!(first, second);
        assert_eq!(f.bridge.registry().try_get_type(first), Some(player));

        let untyped = f.bridge.get_or_create_script_for_path("res://unknown.script");
        assert!(!f.bridge.registry().is_registered(untyped));
    }

    #[test]
    fn test_add_script_bridge() {
        let f = fixture();
        let player = TypeBuilder::script("Player").base(&f.node).build();
        f.bridge.registry().add_path("res://player.cs", player.clone()).unwrap();
        let script = ScriptHandle::from_raw(0x77);

        assert!(!f.bridge.add_script_bridge(script, "res://missing.cs"));
        assert!(f.bridge.add_script_bridge(script, "res://player.cs"));
        assert!(f.bridge.add_script_bridge(script, "res://player.cs"));
        assert_eq!(f.bridge.registry().try_get_type(script), Some(player));

        assert!(!f.bridge.add_script_bridge(ScriptHandle::from_raw(0x78), "res://player.cs"));
        assert_eq!(f.sink.0.lock().len(), 1);
    }

    #[test]
    fn test_load_or_create_prefers_path_load() {
        let f = fixture();
        let player = TypeBuilder::script("Player").base(&f.node).build();
        f.bridge.registry().add_path("res://player.cs", player.clone()).unwrap();
        f.host
            .loadable
            .lock()
            .insert("res://player.cs".to_string(), ScriptHandle::from_raw(0x500));

        let script = f.bridge.get_or_load_or_create_script_for_type(&player);
        assert_eq!(script, ScriptHandle::from_raw(0x500));
        assert_eq!(f.host.created.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_load_failure_falls_back_to_create() {
        let f = fixture();
        let player = TypeBuilder::script("Game.Player").base(&f.node).build();
        f.bridge.registry().add_path("res://player.cs", player.clone()).unwrap();

        let script = f.bridge.get_or_load_or_create_script_for_type(&player);
        assert!(!script.is_null());
        assert_eq!(f.bridge.registry().try_get_type(script), Some(player));
        assert!(f.sink.0.lock()[0].starts_with("Cannot load script for type"));
    }

    #[test]
    fn test_instantiate_script_instance_by_arity() {
        let f = fixture();
        let player = TypeBuilder::script("Player")
            .namespace("Game")
            .base(&f.node)
            .constructor(1, |obj, args| {
                obj.set("hp", args[0].expect_int()?);
                Ok(())
            })
            .build();
        let script = f.bridge.get_or_create_script_for_type(&player);
        let codec = BoxedVariantCodec;

        let handle = f
            .bridge
            .instantiate_script_instance(script, NativeObjectPtr::from_raw(0x30), &[codec.encode(&Variant::Int(9))])
            .unwrap();
        let object = f.bridge.handles().target(handle).unwrap();
        assert_eq!(object.get("hp"), Some(Variant::Int(9)));
        assert_eq!(object.native_ptr().as_raw(), 0x30);

        let err = f
            .bridge
            .instantiate_script_instance(script, NativeObjectPtr::NULL, &[])
            .unwrap_err();
        assert!(err.to_string().contains("'Game.Player' does not define a parameterless constructor"));
    }

    #[test]
    fn test_class_info() {
        let f = fixture();
        let base = TypeBuilder::script("Actor").base(&f.node).build();
        let player = TypeBuilder::script("Player")
            .base(&base)
            .tool()
            .metadata(PlayerMetadata)
            .build();
        let script = f.bridge.get_or_create_script_for_type(&player);

        let info = f.bridge.update_script_class_info(script);
        assert!(info.is_tool);
        assert_eq!(info.rpc_functions.len(), 1);
        assert_eq!(info.event_signals[0].name, "died");
        let base_script = info.base_script.unwrap();
        assert_eq!(f.bridge.registry().try_get_type(base_script), Some(base.clone()));

        let base_info = f.bridge.update_script_class_info(base_script);
        assert!(base_info.base_script.is_none());
        assert!(!base_info.is_tool);

        let unknown = f.bridge.update_script_class_info(ScriptHandle::from_raw(0x9999));
        assert_eq!(unknown, ScriptClassInfo::default());
        assert_eq!(f.sink.0.lock().len(), 1);
    }

    #[test]
    fn test_script_is_or_inherits() {
        let f = fixture();
        let base = TypeBuilder::script("Actor").base(&f.node).build();
        let player = TypeBuilder::script("Player").base(&base).build();
        let base_script = f.bridge.get_or_create_script_for_type(&base);
        let player_script = f.bridge.get_or_create_script_for_type(&player);

        assert!(f.bridge.script_is_or_inherits(player_script, base_script));
        assert!(f.bridge.script_is_or_inherits(player_script, player_script));
        assert!(!f.bridge.script_is_or_inherits(base_script, player_script));
        assert!(!f.bridge.script_is_or_inherits(player_script, ScriptHandle::from_raw(1)));
    }

    #[test]
    fn test_native_base_name() {
        let f = fixture();
        let player = TypeBuilder::script("Player").base(&f.node).build();
        let script = f.bridge.get_or_create_script_for_type(&player);
        assert_eq!(f.bridge.get_script_native_base_name(script).as_deref(), Some("Node"));
        assert!(f.bridge.get_script_native_base_name(ScriptHandle::from_raw(3)).is_none());
    }

    #[test]
    fn test_raise_event_signal() {
        let f = fixture();
        let handle = f
            .bridge
            .instantiate_for_native_object("Node", NativeObjectPtr::from_raw(0x40))
            .unwrap();
        let object = f.bridge.handles().target(handle).unwrap();
        object.connect("hit", |obj, args| {
            obj.set("damage", args[0].clone());
            Ok(())
        });

        let args = [f.bridge.codec().encode(&Variant::Int(5))];
        assert_eq!(f.bridge.raise_event_signal(handle, "hit", &args), SignalDispatch::Delivered(1));
        assert_eq!(object.get("damage"), Some(Variant::Int(5)));

        let weak = f.bridge.swap_handle_ownership(handle, true).unwrap();
        drop(object);
        assert_eq!(f.bridge.raise_event_signal(weak, "hit", &args), SignalDispatch::OwnerCollected);
        assert!(f.bridge.swap_handle_ownership(weak, false).is_none());
        assert!(f.sink.0.lock().is_empty());
    }

    #[test]
    fn test_set_native_object_pointer() {
        let f = fixture();
        let handle = f
            .bridge
            .instantiate_for_native_object("Node", NativeObjectPtr::from_raw(0x40))
            .unwrap();
        assert!(f.bridge.set_native_object_pointer(handle, NativeObjectPtr::NULL));
        assert!(f.bridge.handles().target(handle).unwrap().native_ptr().is_null());
        assert!(f.bridge.free_handle(handle));
        assert!(!f.bridge.set_native_object_pointer(handle, NativeObjectPtr::NULL));
    }

    #[test]
    fn test_frame_callback() {
        let f = fixture();
        let ran = Arc::new(AtomicUsize::new(0));
        let ran_clone = ran.clone();
        let bridge = f.bridge.clone();
        f.bridge.add_frame_task(move || {
            ran_clone.fetch_add(1, Ordering::SeqCst);
            let ran_again = ran_clone.clone();
            bridge.add_frame_task(move || {
                ran_again.fetch_add(1, Ordering::SeqCst);
            });
        });
        f.bridge.add_frame_task(|| panic!("task failed"));

        assert_eq!(f.bridge.frame_callback(), 2);
        assert_eq!(ran.load(Ordering::SeqCst), 1);
        assert_eq!(f.bridge.frame_callback(), 1);
        assert_eq!(ran.load(Ordering::SeqCst), 2);
        assert_eq!(f.bridge.frame_callback(), 0);
        assert!(f.sink.0.lock()[0].contains("task failed"));
    }

    #[test]
    fn test_remove_script_bridge() {
        let f = fixture();
        let player = TypeBuilder::script("Player").base(&f.node).build();
        let script = f.bridge.get_or_create_script_for_type(&player);
        f.bridge.remove_script_bridge(script);
        assert!(!f.bridge.registry().is_registered(script));
        assert!(!f.bridge.try_reload_script(script));
        assert!(f.sink.0.lock()[0].contains("Missing class qualified name"));
    }

    #[test]
    fn test_native_wrapper_without_parameterless_constructor() {
        let f = fixture();
        let timer = TypeBuilder::native("Timer", "Timer")
            .base(&f.node)
            .constructor(1, |_, _| Ok(()))
            .build();
        f.bridge.register_native_type(timer);

        assert!(f
            .bridge
            .instantiate_for_native_object("Timer", NativeObjectPtr::from_raw(0x50))
            .is_none());
        assert!(f.bridge.handles().is_empty());
        let errors = f.sink.0.lock();
        assert_eq!(errors.len(), 1);
        assert!(errors[0].contains("'Timer' does not define a parameterless constructor"));
    }

    #[test]
    fn test_rebinding_by_path_drops_reload_record() {
        let f = fixture();
        let unit = LoadUnit::new("Game");
        let enemy = TypeBuilder::script("Enemy").base(&f.node).unit(&unit).build();
        f.bridge.load_unit(unit.clone());
        let script = f.bridge.get_or_create_script_for_type(&enemy);

        f.bridge.unload_unit(unit.id());
        assert!(f.bridge.lifecycle().reload_record(script).is_some());

        // The next build gives the class a file
        let reloaded = LoadUnit::new("Game");
        TypeBuilder::script("Enemy")
            .base(&f.node)
            .unit(&reloaded)
            .script_path("res://enemy.cs")
            .build();
        f.bridge.load_unit(reloaded);
        assert!(f.bridge.add_script_bridge(script, "res://enemy.cs"));
        assert!(f.bridge.lifecycle().reload_record(script).is_none());

        f.bridge.registry().remove_by_handle(script);
        assert!(!f.bridge.try_reload_script(script));
        assert!(f.sink.0.lock()[0].contains("Missing class qualified name"));
    }

    #[test]
    fn test_lookup_skips_nested_and_plain_types() {
        let f = fixture();
        let unit = LoadUnit::new("Game");
        let player = TypeBuilder::script("Player")
            .base(&f.node)
            .unit(&unit)
            .script_path("res://player.cs")
            .build();
        TypeBuilder::script("Inventory")
            .base(&f.node)
            .declaring(&player)
            .unit(&unit)
            .script_path("res://inventory.cs")
            .build();
        TypeBuilder::script("Settings")
            .unit(&unit)
            .script_path("res://settings.cs")
            .build();

        assert_eq!(f.bridge.load_unit(unit.clone()), 1);
        assert_eq!(f.bridge.registry().try_get_type_by_path("res://player.cs"), Some(player));
        assert!(f.bridge.registry().try_get_type_by_path("res://inventory.cs").is_none());
        assert!(f.bridge.registry().try_get_type_by_path("res://settings.cs").is_none());
        assert_eq!(f.bridge.lifecycle().tracked_type_count(unit.id()), 1);
    }

    struct FixedHost(ScriptHandle);

    impl NativeHost for FixedHost {
        fn new_script(&self) -> ScriptHandle {
            self.0
        }

        fn load_script(&self, _path: &str) -> Option<ScriptHandle> {
            None
        }

        fn reload_registered_script(&self, _script: ScriptHandle) {}
    }

    #[test]
    fn test_unusable_host_script_is_refused() {
        let sink = Arc::new(CollectingSink::default());
        let bridge = ScriptBridge::builder(Arc::new(FixedHost(ScriptHandle::from_raw(0x80))))
            .error_sink(sink.clone())
            .build();
        let object = TypeBuilder::native("GodotObject", "Object").build();
        let player = TypeBuilder::script("Player").base(&object).build();
        let enemy = TypeBuilder::script("Enemy").base(&object).build();

        let script = bridge.get_or_create_script_for_type(&player);
        assert_eq!(script, ScriptHandle::from_raw(0x80));
        assert!(bridge.get_or_create_script_for_type(&enemy).is_null());
        assert_eq!(bridge.registry().try_get_type(script), Some(player));
        assert!(bridge.registry().try_get_handle(&enemy).is_none());
        assert!(sink.0.lock()[0].contains("unusable script 0x80 for class 'Enemy'"));

        let sink = Arc::new(CollectingSink::default());
        let bridge = ScriptBridge::builder(Arc::new(FixedHost(ScriptHandle::NULL)))
            .error_sink(sink.clone())
            .build();
        assert!(bridge.get_or_create_script_for_type(&enemy).is_null());
        assert!(bridge.registry().is_empty());
        assert_eq!(sink.0.lock().len(), 1);
    }
}
