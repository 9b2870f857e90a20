//! Error types for the bridge
//!
//! Boundary entry points never propagate these to the native side: they are
//! reported through the `ErrorSink` and turned into a status value.

use std::any::Any;
use std::panic::{catch_unwind, AssertUnwindSafe};

use hostbridge_sdk::{InteropError, RawGcHandle, ScriptHandle};
use thiserror::Error;

/// Identity registry conflicts. A failed operation never mutates state.
#[derive(Debug, Clone, Error)]
pub enum RegistryError {
    /// The script handle already maps to a type
    #[error("Script {0} is already registered")]
    HandleAlreadyRegistered(ScriptHandle),

    /// The type already maps to another script handle
    #[error("Type '{type_name}' is already bound to script {existing}")]
    TypeAlreadyRegistered {
        /// Qualified type name
        type_name: String,
        /// Handle the type is bound to
        existing: ScriptHandle,
    },

    /// The path already maps to another type
    #[error("Path '{path}' is already bound to type '{existing}'")]
    PathAlreadyRegistered {
        /// Stable path
        path: String,
        /// Qualified name of the bound type
        existing: String,
    },

    /// The type already has another path
    #[error("Type '{type_name}' already has path '{existing}'")]
    TypePathAlreadyRegistered {
        /// Qualified type name
        type_name: String,
        /// Path the type is bound to
        existing: String,
    },
}

/// Object handle failures
#[derive(Debug, Clone, Error)]
pub enum HandleError {
    /// The handle was never allocated or has been freed
    #[error("Invalid object handle: {0:#x}")]
    InvalidHandle(RawGcHandle),

    /// The referenced object has already been reclaimed
    #[error("Object was already collected")]
    AlreadyCollected,

    /// No slot index is left to encode
    #[error("Handle table exhausted")]
    Exhausted,
}

/// Errors raised by bridge operations
#[derive(Debug, Error)]
pub enum BridgeError {
    /// Registry conflict
    #[error(transparent)]
    Registry(#[from] RegistryError),

    /// Object handle failure
    #[error(transparent)]
    Handle(#[from] HandleError),

    /// Managed-side failure (accessor, constructor, conversion)
    #[error(transparent)]
    Interop(#[from] InteropError),

    /// No type is registered for the script
    #[error("Script {0} is not registered")]
    ScriptNotRegistered(ScriptHandle),

    /// The host handed out a null script, or one already bound to a type
    #[error("Host returned unusable script {0} for class '{1}'")]
    UnusableHostScript(ScriptHandle, String),

    /// The script has neither a type nor a reload record
    #[error("Missing class qualified name for reloading script {0}")]
    MissingReloadRecord(ScriptHandle),

    /// The reload record carries no unit name
    #[error("Missing unit name of class '{0}' for reloading script")]
    MissingUnitName(String),

    /// The class is not present in any loaded unit
    #[error("Class '{class_name}' not found in loaded unit '{unit_name}'")]
    TypeNotFound {
        /// Unit searched
        unit_name: String,
        /// Qualified class name
        class_name: String,
    },

    /// The class no longer derives from the host root object type
    #[error("Class '{0}' does not derive from a native object type")]
    NotAnObjectType(String),

    /// No wrapper type for a native class
    #[error("Wrapper class not found for type: {0}")]
    NativeTypeNotFound(String),

    /// No constructor with a matching argument count
    #[error("{}", missing_constructor_message(.class_name, *.arg_count))]
    MissingConstructor {
        /// Qualified class name
        class_name: String,
        /// Requested argument count
        arg_count: usize,
    },

    /// Managed code panicked
    #[error("Managed code panicked: {0}")]
    Panic(String),
}

fn missing_constructor_message(class_name: &str, arg_count: usize) -> String {
    if arg_count == 0 {
        format!(
            "Cannot create script instance. The class '{}' does not define a parameterless constructor.",
            class_name
        )
    } else {
        format!(
            "The class '{}' does not define a constructor that takes {} parameters.",
            class_name, arg_count
        )
    }
}

/// Bridge operation result
pub type BridgeResult<T> = Result<T, BridgeError>;

/// Extract a readable message from a panic payload
pub(crate) fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

/// Run managed code, turning a panic into `InteropError::Panic`
pub(crate) fn catch_managed<T>(f: impl FnOnce() -> Result<T, InteropError>) -> Result<T, InteropError> {
    match catch_unwind(AssertUnwindSafe(f)) {
        Ok(result) => result,
        Err(payload) => Err(InteropError::Panic(panic_message(payload))),
    }
}
