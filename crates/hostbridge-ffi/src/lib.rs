//! C ABI for the script bridge
//!
//! The native host drives the bridge through these entry points:
//! - ABI-stable (only C-compatible types cross the boundary)
//! - Thread-safe (a bridge can be called from several native threads)
//! - Errors reported through the host's error callback, or an out-parameter
//!   on construction
//! - Opaque pointers for the bridge, raw `usize` values for handles
//! - Panics never unwind across the boundary
//!
//! Script handles and object handles are passed as `usize`; zero means
//! "none".

use std::ffi::{c_char, c_void, CStr, CString};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::ptr;
use std::sync::Arc;

use hostbridge_core::{
    BridgeOptions, ErrorSink, GcHandle, InteropPropertyDefaultValue, InteropPropertyInfo,
    NativeHost, ScriptBridge, ScriptClassInfo, SignalDispatch, TracingErrorSink,
};
use hostbridge_sdk::{
    BoxedVariantCodec, InteropString, NativeObjectPtr, NativeVariant, PropertyUsageFlags,
    RawGcHandle, RpcMode, ScriptHandle, TransferMode, Variant, VariantCodec, VariantType,
};

// ============================================================================
// Errors
// ============================================================================

/// Failures detected at the C boundary itself
#[derive(Debug, thiserror::Error)]
pub enum FfiError {
    /// A required pointer argument was null
    #[error("Invalid argument: {0} is null")]
    NullArgument(&'static str),

    /// A string argument was not valid UTF-8
    #[error("Invalid UTF-8 in {0}")]
    InvalidUtf8(&'static str),

    /// A required host callback was not provided
    #[error("Missing host callback: {0}")]
    MissingCallback(&'static str),

    /// The configuration document could not be parsed
    #[error("Invalid bridge configuration: {0}")]
    Config(String),
}

// ============================================================================
// Opaque Types
// ============================================================================

/// Opaque handle to a script bridge
#[repr(C)]
pub struct HbrBridge {
    _private: [u8; 0],
}

/// Error information
#[repr(C)]
pub struct HbrError {
    message: *mut c_char,
}

// Internal representation of the bridge (not exposed to C)
struct BridgeHandle {
    bridge: ScriptBridge,
}

// ============================================================================
// Host callbacks
// ============================================================================

/// Native host callbacks. `user_data` is passed back on every call.
///
/// `new_script` and `reload_registered_script` are required.
#[repr(C)]
#[derive(Clone, Copy)]
pub struct HbrHostCallbacks {
    /// Opaque host pointer
    pub user_data: *mut c_void,
    /// Create a script with no path; returns its handle
    pub new_script: Option<unsafe extern "C" fn(user_data: *mut c_void) -> usize>,
    /// Take another reference on a script
    pub reference_script: Option<unsafe extern "C" fn(user_data: *mut c_void, script: usize)>,
    /// Load the script at `path`; writes its handle and returns true on success
    pub load_script: Option<
        unsafe extern "C" fn(user_data: *mut c_void, path: *const c_char, out_script: *mut usize) -> bool,
    >,
    /// Refresh a script after its type (re)registered
    pub reload_registered_script: Option<unsafe extern "C" fn(user_data: *mut c_void, script: usize)>,
    /// Report an error message
    pub push_error: Option<unsafe extern "C" fn(user_data: *mut c_void, message: *const c_char)>,
}

struct CallbackHost {
    callbacks: HbrHostCallbacks,
    new_script: unsafe extern "C" fn(*mut c_void) -> usize,
    reload_registered_script: unsafe extern "C" fn(*mut c_void, usize),
}

// SAFETY: the host promises its callbacks and user_data may be used from any
// thread that calls into the bridge
unsafe impl Send for CallbackHost {}
unsafe impl Sync for CallbackHost {}

impl CallbackHost {
    fn new(callbacks: HbrHostCallbacks) -> Result<Self, FfiError> {
        Ok(Self {
            new_script: callbacks
                .new_script
                .ok_or(FfiError::MissingCallback("new_script"))?,
            reload_registered_script: callbacks
                .reload_registered_script
                .ok_or(FfiError::MissingCallback("reload_registered_script"))?,
            callbacks,
        })
    }
}

impl NativeHost for CallbackHost {
    fn new_script(&self) -> ScriptHandle {
        ScriptHandle::from_raw(unsafe { (self.new_script)(self.callbacks.user_data) })
    }

    fn reference_script(&self, script: ScriptHandle) {
        if let Some(reference) = self.callbacks.reference_script {
            unsafe { reference(self.callbacks.user_data, script.as_raw()) };
        }
    }

    fn load_script(&self, path: &str) -> Option<ScriptHandle> {
        let load = self.callbacks.load_script?;
        let path = CString::new(path).ok()?;
        let mut script = 0usize;
        let loaded = unsafe { load(self.callbacks.user_data, path.as_ptr(), &mut script) };
        (loaded && script != 0).then(|| ScriptHandle::from_raw(script))
    }

    fn reload_registered_script(&self, script: ScriptHandle) {
        unsafe { (self.reload_registered_script)(self.callbacks.user_data, script.as_raw()) };
    }
}

impl ErrorSink for CallbackHost {
    fn push_error(&self, message: &str) {
        match (self.callbacks.push_error, CString::new(message.replace('\0', " "))) {
            (Some(push), Ok(message)) => unsafe { push(self.callbacks.user_data, message.as_ptr()) },
            _ => TracingErrorSink.push_error(message),
        }
    }
}

// ============================================================================
// Helper Functions
// ============================================================================

/// Convert Rust string to C string (caller must free)
fn rust_to_c_string(s: &str) -> *mut c_char {
    match CString::new(s) {
        Ok(c_str) => c_str.into_raw(),
        Err(_) => ptr::null_mut(),
    }
}

/// Set error out-parameter
unsafe fn set_error(error_out: *mut *mut HbrError, error: FfiError) {
    if !error_out.is_null() {
        let message = rust_to_c_string(&error.to_string());
        *error_out = Box::into_raw(Box::new(HbrError { message }));
    }
}

/// Borrow a C string argument
unsafe fn c_str_arg<'a>(s: *const c_char, name: &'static str) -> Result<&'a str, FfiError> {
    if s.is_null() {
        return Err(FfiError::NullArgument(name));
    }
    CStr::from_ptr(s).to_str().map_err(|_| FfiError::InvalidUtf8(name))
}

/// Borrow a variant array argument
unsafe fn variant_args<'a>(args: *const NativeVariant, count: i32) -> &'a [NativeVariant] {
    if args.is_null() || count <= 0 {
        return &[];
    }
    std::slice::from_raw_parts(args, count as usize)
}

/// Run a boundary body, turning a panic into `fallback`
fn guard<T>(fallback: T, body: impl FnOnce() -> T) -> T {
    match catch_unwind(AssertUnwindSafe(body)) {
        Ok(value) => value,
        Err(_) => {
            tracing::error!(target: "hostbridge::script", "Panic caught at the C boundary");
            fallback
        }
    }
}

/// Borrow the bridge behind an opaque pointer.
///
/// # Safety
/// `bridge` must be null or a pointer returned by `hbr_bridge_new` or
/// `into_raw` that has not been destroyed.
pub unsafe fn bridge_ref<'a>(bridge: *const HbrBridge) -> Option<&'a ScriptBridge> {
    (bridge as *const BridgeHandle).as_ref().map(|handle| &handle.bridge)
}

/// Hand a bridge built on the managed side to the native host.
///
/// The pointer must be released with `hbr_bridge_destroy`.
pub fn into_raw(bridge: ScriptBridge) -> *mut HbrBridge {
    Box::into_raw(Box::new(BridgeHandle { bridge })) as *mut HbrBridge
}

fn gc_handle(raw: RawGcHandle) -> Option<GcHandle> {
    GcHandle::from_raw(raw)
}

// ============================================================================
// Bridge Lifecycle Functions
// ============================================================================

/// Create a bridge driven by host callbacks
///
/// # Arguments
/// * `callbacks` - Host callbacks (must not be NULL)
/// * `options_toml` - Optional TOML document with a `[bridge]` table
/// * `error` - Optional pointer to receive error information
///
/// # Returns
/// * Non-null pointer to HbrBridge on success
/// * NULL on failure (check error parameter)
///
/// # Safety
/// The returned bridge must be freed with `hbr_bridge_destroy()`
///
/// # Example (C)
/// ```c
/// HbrError* error = NULL;
/// HbrBridge* bridge = hbr_bridge_new(&callbacks, NULL, &error);
/// if (bridge == NULL) {
///     fprintf(stderr, "Failed to create bridge: %s\n", hbr_error_message(error));
///     hbr_error_free(error);
///     return 1;
/// }
/// ```
#[no_mangle]
pub unsafe extern "C" fn hbr_bridge_new(
    callbacks: *const HbrHostCallbacks,
    options_toml: *const c_char,
    error: *mut *mut HbrError,
) -> *mut HbrBridge {
    let result = guard(Err(FfiError::Config("panic during construction".to_string())), || {
        let callbacks = callbacks
            .as_ref()
            .copied()
            .ok_or(FfiError::NullArgument("callbacks"))?;
        let options = if options_toml.is_null() {
            BridgeOptions::default()
        } else {
            let source = c_str_arg(options_toml, "options_toml")?;
            BridgeOptions::from_toml_str(source).map_err(|e| FfiError::Config(e.to_string()))?
        };
        let host = Arc::new(CallbackHost::new(callbacks)?);
        Ok(ScriptBridge::builder(host.clone())
            .options(options)
            .error_sink(host)
            .build())
    });

    match result {
        Ok(bridge) => into_raw(bridge),
        Err(e) => {
            set_error(error, e);
            ptr::null_mut()
        }
    }
}

/// Destroy a bridge
///
/// # Safety
/// - `bridge` must be NULL or a valid bridge pointer
/// - The bridge must not be used after this call
#[no_mangle]
pub unsafe extern "C" fn hbr_bridge_destroy(bridge: *mut HbrBridge) {
    if bridge.is_null() {
        return;
    }
    drop(Box::from_raw(bridge as *mut BridgeHandle));
}

/// Get the message of an error
///
/// # Safety
/// `error` must be NULL or a pointer returned through an error out-parameter
#[no_mangle]
pub unsafe extern "C" fn hbr_error_message(error: *const HbrError) -> *const c_char {
    match error.as_ref() {
        Some(error) => error.message,
        None => ptr::null(),
    }
}

/// Free an error
///
/// # Safety
/// `error` must be NULL or a pointer returned through an error out-parameter
#[no_mangle]
pub unsafe extern "C" fn hbr_error_free(error: *mut HbrError) {
    if error.is_null() {
        return;
    }
    let error = Box::from_raw(error);
    if !error.message.is_null() {
        drop(CString::from_raw(error.message));
    }
}

/// Free a string returned by the bridge
///
/// # Safety
/// `s` must be NULL or a string returned by this library
#[no_mangle]
pub unsafe extern "C" fn hbr_string_free(s: *mut c_char) {
    if !s.is_null() {
        drop(CString::from_raw(s));
    }
}

// ============================================================================
// Object Functions
// ============================================================================

/// Create the managed wrapper for a native object
///
/// # Returns
/// * Strong object handle, or 0 on failure
///
/// # Safety
/// - `bridge` must be a valid bridge pointer
/// - `native_type_name` must be a valid null-terminated string
#[no_mangle]
pub unsafe extern "C" fn hbr_instantiate_for_native_object(
    bridge: *const HbrBridge,
    native_type_name: *const c_char,
    native_object: usize,
) -> RawGcHandle {
    let Some(bridge) = bridge_ref(bridge) else {
        return 0;
    };
    guard(0, || {
        let name = match c_str_arg(native_type_name, "native_type_name") {
            Ok(name) => name,
            Err(e) => {
                bridge.report(&hostbridge_core::BridgeError::Interop(e.to_string().into()));
                return 0;
            }
        };
        bridge
            .instantiate_for_native_object(name, NativeObjectPtr::from_raw(native_object))
            .map_or(0, GcHandle::as_raw)
    })
}

/// Create a script instance for a native object
///
/// # Arguments
/// * `args` / `arg_count` - Constructor arguments, borrowed
/// * `out_handle` - Receives the strong object handle
///
/// # Returns
/// * true on success
///
/// # Safety
/// - `bridge` must be a valid bridge pointer
/// - `args` must point to `arg_count` variants, or be NULL when zero
/// - Each variant must be created by an `hbr_variant_*` function; any other
///   slot is rejected with a reported error
#[no_mangle]
pub unsafe extern "C" fn hbr_instantiate_script_instance(
    bridge: *const HbrBridge,
    script: usize,
    native_object: usize,
    args: *const NativeVariant,
    arg_count: i32,
    out_handle: *mut RawGcHandle,
) -> bool {
    let Some(bridge) = bridge_ref(bridge) else {
        return false;
    };
    guard(false, || {
        let args = variant_args(args, arg_count);
        match bridge.instantiate_script_instance(
            ScriptHandle::from_raw(script),
            NativeObjectPtr::from_raw(native_object),
            args,
        ) {
            Ok(handle) => {
                if !out_handle.is_null() {
                    *out_handle = handle.as_raw();
                }
                true
            }
            Err(e) => {
                bridge.report(&e);
                false
            }
        }
    })
}

/// Rebind an object handle to another native object
///
/// # Safety
/// `bridge` must be a valid bridge pointer
#[no_mangle]
pub unsafe extern "C" fn hbr_set_native_object_pointer(
    bridge: *const HbrBridge,
    handle: RawGcHandle,
    native_object: usize,
) {
    let (Some(bridge), Some(handle)) = (bridge_ref(bridge), gc_handle(handle)) else {
        return;
    };
    guard((), || {
        bridge.set_native_object_pointer(handle, NativeObjectPtr::from_raw(native_object));
    })
}

/// Replace an object handle with one of the requested strength
///
/// # Returns
/// * true and the new handle in `out_handle` on success
/// * false when the object was already collected; `old` is still live
///
/// # Safety
/// `bridge` must be a valid bridge pointer
#[no_mangle]
pub unsafe extern "C" fn hbr_swap_handle_ownership(
    bridge: *const HbrBridge,
    old: RawGcHandle,
    create_weak: bool,
    out_handle: *mut RawGcHandle,
) -> bool {
    let (Some(bridge), Some(old)) = (bridge_ref(bridge), gc_handle(old)) else {
        return false;
    };
    guard(false, || match bridge.swap_handle_ownership(old, create_weak) {
        Some(handle) => {
            if !out_handle.is_null() {
                *out_handle = handle.as_raw();
            }
            true
        }
        None => false,
    })
}

/// Release an object handle
///
/// # Safety
/// `bridge` must be a valid bridge pointer
#[no_mangle]
pub unsafe extern "C" fn hbr_free_handle(bridge: *const HbrBridge, handle: RawGcHandle) -> bool {
    let (Some(bridge), Some(handle)) = (bridge_ref(bridge), gc_handle(handle)) else {
        return false;
    };
    guard(false, || bridge.free_handle(handle))
}

/// Raise a signal on the object behind `owner`
///
/// # Arguments
/// * `out_owner_is_null` - Set to true when the owner is gone
///
/// # Safety
/// - `bridge` must be a valid bridge pointer
/// - `signal` must be a valid null-terminated string
/// - `args` must point to `arg_count` variants, or be NULL when zero
/// - Each variant must be created by an `hbr_variant_*` function; any other
///   slot is rejected with a reported error
#[no_mangle]
pub unsafe extern "C" fn hbr_raise_event_signal(
    bridge: *const HbrBridge,
    owner: RawGcHandle,
    signal: *const c_char,
    args: *const NativeVariant,
    arg_count: i32,
    out_owner_is_null: *mut bool,
) {
    let Some(bridge) = bridge_ref(bridge) else {
        return;
    };
    let dispatch = guard(SignalDispatch::Failed, || {
        let Some(owner) = gc_handle(owner) else {
            return SignalDispatch::OwnerCollected;
        };
        match c_str_arg(signal, "signal") {
            Ok(signal) => bridge.raise_event_signal(owner, signal, variant_args(args, arg_count)),
            Err(e) => {
                bridge.report(&hostbridge_core::BridgeError::Interop(e.to_string().into()));
                SignalDispatch::Failed
            }
        }
    });
    if !out_owner_is_null.is_null() {
        *out_owner_is_null = dispatch == SignalDispatch::OwnerCollected;
    }
}

/// Run queued frame tasks
///
/// # Safety
/// `bridge` must be a valid bridge pointer
#[no_mangle]
pub unsafe extern "C" fn hbr_frame_callback(bridge: *const HbrBridge) {
    if let Some(bridge) = bridge_ref(bridge) {
        guard(0, || bridge.frame_callback());
    }
}

// ============================================================================
// Script Functions
// ============================================================================

/// Native class name a script derives from
///
/// # Returns
/// * Newly allocated string (free with `hbr_string_free`), or NULL
///
/// # Safety
/// `bridge` must be a valid bridge pointer
#[no_mangle]
pub unsafe extern "C" fn hbr_get_script_native_base_name(
    bridge: *const HbrBridge,
    script: usize,
) -> *mut c_char {
    let Some(bridge) = bridge_ref(bridge) else {
        return ptr::null_mut();
    };
    guard(ptr::null_mut(), || {
        bridge
            .get_script_native_base_name(ScriptHandle::from_raw(script))
            .map_or(ptr::null_mut(), |name| rust_to_c_string(&name))
    })
}

/// Check whether a script is, or derives from, another
///
/// # Safety
/// `bridge` must be a valid bridge pointer
#[no_mangle]
pub unsafe extern "C" fn hbr_script_is_or_inherits(
    bridge: *const HbrBridge,
    script: usize,
    maybe_base: usize,
) -> bool {
    let Some(bridge) = bridge_ref(bridge) else {
        return false;
    };
    guard(false, || {
        bridge.script_is_or_inherits(ScriptHandle::from_raw(script), ScriptHandle::from_raw(maybe_base))
    })
}

/// Bind a script to the type registered for `path`
///
/// # Safety
/// - `bridge` must be a valid bridge pointer
/// - `path` must be a valid null-terminated string
#[no_mangle]
pub unsafe extern "C" fn hbr_add_script_bridge(
    bridge: *const HbrBridge,
    script: usize,
    path: *const c_char,
) -> bool {
    let Some(bridge) = bridge_ref(bridge) else {
        return false;
    };
    guard(false, || match c_str_arg(path, "path") {
        Ok(path) => bridge.add_script_bridge(ScriptHandle::from_raw(script), path),
        Err(_) => false,
    })
}

/// Script for the type registered at `path`, created on first use
///
/// # Returns
/// * Script handle, or 0 on failure
///
/// # Safety
/// - `bridge` must be a valid bridge pointer
/// - `path` must be a valid null-terminated string
#[no_mangle]
pub unsafe extern "C" fn hbr_get_or_create_script_for_path(
    bridge: *const HbrBridge,
    path: *const c_char,
) -> usize {
    let Some(bridge) = bridge_ref(bridge) else {
        return 0;
    };
    guard(0, || match c_str_arg(path, "path") {
        Ok(path) => bridge.get_or_create_script_for_path(path).as_raw(),
        Err(_) => 0,
    })
}

/// Unbind a script
///
/// # Safety
/// `bridge` must be a valid bridge pointer
#[no_mangle]
pub unsafe extern "C" fn hbr_remove_script_bridge(bridge: *const HbrBridge, script: usize) {
    if let Some(bridge) = bridge_ref(bridge) {
        guard((), || bridge.remove_script_bridge(ScriptHandle::from_raw(script)));
    }
}

/// Reload a script after its unit was reloaded
///
/// # Safety
/// `bridge` must be a valid bridge pointer
#[no_mangle]
pub unsafe extern "C" fn hbr_try_reload_script(bridge: *const HbrBridge, script: usize) -> bool {
    let Some(bridge) = bridge_ref(bridge) else {
        return false;
    };
    guard(false, || bridge.try_reload_script(ScriptHandle::from_raw(script)))
}

// ============================================================================
// Class Info
// ============================================================================

/// Remote-call configuration entry
#[repr(C)]
pub struct HbrRpcConfig {
    /// Method name
    pub method: InteropString,
    /// Remote-call mode
    pub mode: RpcMode,
    /// Transfer mode
    pub transfer_mode: TransferMode,
    /// Channel index
    pub channel: i32,
}

/// Signal parameter entry
#[repr(C)]
pub struct HbrSignalParam {
    /// Parameter name
    pub name: InteropString,
    /// Value-kind tag
    pub ty: VariantType,
    /// Usage bitmask
    pub usage: PropertyUsageFlags,
}

/// Signal entry
#[repr(C)]
pub struct HbrSignalInfo {
    /// Signal name
    pub name: InteropString,
    /// Parameters
    pub params: *mut HbrSignalParam,
    /// Number of parameters
    pub param_count: i32,
}

/// Class information filled by `hbr_update_script_class_info`
#[repr(C)]
pub struct HbrScriptClassInfo {
    /// Runs inside the editor
    pub is_tool: bool,
    /// Remote-call table
    pub rpc_functions: *mut HbrRpcConfig,
    /// Number of remote-call entries
    pub rpc_count: i32,
    /// Signal table
    pub event_signals: *mut HbrSignalInfo,
    /// Number of signals
    pub signal_count: i32,
    /// Base script handle, 0 when the base is native
    pub base_script: usize,
}

fn leak_slice<T>(items: Vec<T>) -> (*mut T, i32) {
    if items.is_empty() {
        return (ptr::null_mut(), 0);
    }
    let len = items.len() as i32;
    (Box::into_raw(items.into_boxed_slice()) as *mut T, len)
}

unsafe fn reclaim_slice<T>(items: *mut T, len: i32) {
    if !items.is_null() && len > 0 {
        drop(Box::from_raw(ptr::slice_from_raw_parts_mut(items, len as usize)));
    }
}

impl HbrScriptClassInfo {
    fn empty() -> Self {
        Self {
            is_tool: false,
            rpc_functions: ptr::null_mut(),
            rpc_count: 0,
            event_signals: ptr::null_mut(),
            signal_count: 0,
            base_script: 0,
        }
    }

    fn from_info(info: ScriptClassInfo) -> Self {
        let rpc: Vec<HbrRpcConfig> = info
            .rpc_functions
            .iter()
            .map(|config| HbrRpcConfig {
                method: InteropString::new(config.method.as_str()),
                mode: config.mode,
                transfer_mode: config.transfer_mode,
                channel: config.channel,
            })
            .collect();
        let signals: Vec<HbrSignalInfo> = info
            .event_signals
            .iter()
            .map(|signal| {
                let params: Vec<HbrSignalParam> = signal
                    .params
                    .iter()
                    .map(|param| HbrSignalParam {
                        name: InteropString::new(param.name.as_str()),
                        ty: param.ty,
                        usage: param.usage,
                    })
                    .collect();
                let (params, param_count) = leak_slice(params);
                HbrSignalInfo {
                    name: InteropString::new(signal.name.as_str()),
                    params,
                    param_count,
                }
            })
            .collect();
        let (rpc_functions, rpc_count) = leak_slice(rpc);
        let (event_signals, signal_count) = leak_slice(signals);
        Self {
            is_tool: info.is_tool,
            rpc_functions,
            rpc_count,
            event_signals,
            signal_count,
            base_script: info.base_script.map_or(0, ScriptHandle::as_raw),
        }
    }
}

/// Fill class information for a script
///
/// # Safety
/// - `bridge` must be a valid bridge pointer
/// - `out_info` must be valid for writes; release it with
///   `hbr_script_class_info_free`
#[no_mangle]
pub unsafe extern "C" fn hbr_update_script_class_info(
    bridge: *const HbrBridge,
    script: usize,
    out_info: *mut HbrScriptClassInfo,
) {
    if out_info.is_null() {
        return;
    }
    let info = match bridge_ref(bridge) {
        Some(bridge) => guard(HbrScriptClassInfo::empty(), || {
            HbrScriptClassInfo::from_info(bridge.update_script_class_info(ScriptHandle::from_raw(script)))
        }),
        None => HbrScriptClassInfo::empty(),
    };
    ptr::write(out_info, info);
}

/// Release the tables of a class info
///
/// # Safety
/// `info` must be NULL or filled by `hbr_update_script_class_info` and not
/// freed before
#[no_mangle]
pub unsafe extern "C" fn hbr_script_class_info_free(info: *mut HbrScriptClassInfo) {
    let Some(info) = info.as_mut() else {
        return;
    };
    reclaim_slice(info.rpc_functions, info.rpc_count);
    if !info.event_signals.is_null() && info.signal_count > 0 {
        let signals = std::slice::from_raw_parts(info.event_signals, info.signal_count as usize);
        for signal in signals {
            reclaim_slice(signal.params, signal.param_count);
        }
    }
    reclaim_slice(info.event_signals, info.signal_count);
    ptr::write(info, HbrScriptClassInfo::empty());
}

// ============================================================================
// Metadata
// ============================================================================

/// Receives the property list of a script; the array is only valid during
/// the call
pub type HbrPropertyInfoConsumer =
    unsafe extern "C" fn(user_data: *mut c_void, script: usize, items: *const InteropPropertyInfo<'_>, count: i32);

/// Receives the property default values of a script; the array is only
/// valid during the call
pub type HbrPropertyDefaultValueConsumer = unsafe extern "C" fn(
    user_data: *mut c_void,
    script: usize,
    items: *const InteropPropertyDefaultValue<'_>,
    count: i32,
);

/// Pass the merged property list of a script to `consumer`
///
/// The consumer is not called when the script declares no properties.
///
/// # Safety
/// - `bridge` must be a valid bridge pointer
/// - `consumer` must not retain `items` past its return
#[no_mangle]
pub unsafe extern "C" fn hbr_get_property_info_list(
    bridge: *const HbrBridge,
    script: usize,
    consumer: Option<HbrPropertyInfoConsumer>,
    user_data: *mut c_void,
) {
    let (Some(bridge), Some(consumer)) = (bridge_ref(bridge), consumer) else {
        return;
    };
    guard((), || {
        bridge.get_property_info_list(ScriptHandle::from_raw(script), |owner, items| unsafe {
            consumer(user_data, owner.as_raw(), items.as_ptr(), items.len() as i32)
        })
    })
}

/// Pass the merged property default values of a script to `consumer`
///
/// # Safety
/// - `bridge` must be a valid bridge pointer
/// - `consumer` must not retain `items` or their values past its return
#[no_mangle]
pub unsafe extern "C" fn hbr_get_property_default_values(
    bridge: *const HbrBridge,
    script: usize,
    consumer: Option<HbrPropertyDefaultValueConsumer>,
    user_data: *mut c_void,
) {
    let (Some(bridge), Some(consumer)) = (bridge_ref(bridge), consumer) else {
        return;
    };
    guard((), || {
        bridge.get_property_default_values(ScriptHandle::from_raw(script), |owner, items| unsafe {
            consumer(user_data, owner.as_raw(), items.as_ptr(), items.len() as i32)
        })
    })
}

// ============================================================================
// Variant Functions
// ============================================================================

/// Create an integer variant (free with `hbr_variant_destroy`)
#[no_mangle]
pub extern "C" fn hbr_variant_from_int(value: i64) -> NativeVariant {
    BoxedVariantCodec.encode(&Variant::Int(value))
}

/// Create a float variant (free with `hbr_variant_destroy`)
#[no_mangle]
pub extern "C" fn hbr_variant_from_float(value: f64) -> NativeVariant {
    BoxedVariantCodec.encode(&Variant::Float(value))
}

/// Create a boolean variant (free with `hbr_variant_destroy`)
#[no_mangle]
pub extern "C" fn hbr_variant_from_bool(value: bool) -> NativeVariant {
    BoxedVariantCodec.encode(&Variant::Bool(value))
}

/// Create a string variant (free with `hbr_variant_destroy`)
///
/// # Safety
/// `value` must be NULL or a valid null-terminated string
#[no_mangle]
pub unsafe extern "C" fn hbr_variant_from_string(value: *const c_char) -> NativeVariant {
    match c_str_arg(value, "value") {
        Ok(value) => BoxedVariantCodec.encode(&Variant::from(value)),
        Err(_) => NativeVariant::nil(),
    }
}

/// Read an integer variant
///
/// # Safety
/// `variant` must be NULL or a valid variant created by this library
#[no_mangle]
pub unsafe extern "C" fn hbr_variant_as_int(variant: *const NativeVariant, out_value: *mut i64) -> bool {
    let Some(variant) = variant.as_ref() else {
        return false;
    };
    match BoxedVariantCodec.decode(variant).ok().and_then(|v| v.as_int()) {
        Some(value) => {
            if !out_value.is_null() {
                *out_value = value;
            }
            true
        }
        None => false,
    }
}

/// Release a variant and reset it to nil
///
/// # Safety
/// `variant` must be NULL or a valid variant created by this library
#[no_mangle]
pub unsafe extern "C" fn hbr_variant_destroy(variant: *mut NativeVariant) {
    if let Some(variant) = variant.as_mut() {
        drop(variant.take());
    }
}
