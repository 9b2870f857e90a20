//! Native-side collaborators
//!
//! The bridge never reaches into the host directly. Script creation,
//! loading and reload requests go through `NativeHost`; error reports go
//! through `ErrorSink`.

use hostbridge_sdk::ScriptHandle;

/// Script operations provided by the native host.
///
/// `new_script` and `reference_script` are called while the identity
/// registry lock is held and must not call back into the bridge.
/// `load_script` and `reload_registered_script` run outside the lock and
/// may re-enter.
pub trait NativeHost: Send + Sync {
    /// Create a fresh script resource with no backing path.
    ///
    /// The returned handle carries one reference owned by the caller. It
    /// must be non-null and not already bound to a type; otherwise the
    /// bridge refuses it, reports the error and leaves releasing it to the
    /// host.
    fn new_script(&self) -> ScriptHandle;

    /// Take an additional reference on an existing script
    fn reference_script(&self, _script: ScriptHandle) {}

    /// Load the script resource at `path`, `None` on failure
    fn load_script(&self, path: &str) -> Option<ScriptHandle>;

    /// Ask the host to refresh the script after its type (re)registered
    fn reload_registered_script(&self, script: ScriptHandle);
}

/// Fire-and-forget error reporting
pub trait ErrorSink: Send + Sync {
    /// Report an error message
    fn push_error(&self, message: &str);
}

/// Error sink that logs through `tracing`
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingErrorSink;

impl ErrorSink for TracingErrorSink {
    fn push_error(&self, message: &str) {
        tracing::error!(target: "hostbridge::script", "{}", message);
    }
}
