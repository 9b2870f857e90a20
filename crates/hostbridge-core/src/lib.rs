//! Hostbridge core runtime
//!
//! This crate keeps a native host and a managed script environment in
//! agreement about script identity:
//! - Identity registry (script handle <-> managed type, stable path <-> type)
//! - Load-unit lifecycle (unload eviction, reload records)
//! - Object handle ownership (strong/weak swap)
//! - Metadata marshaling into fixed-layout boundary buffers
//!
//! Everything hangs off an explicit `ScriptBridge` context; there is no
//! process-wide state.

#![warn(missing_docs)]
#![warn(rust_2018_idioms)]

pub mod bridge;
pub mod error;
pub mod handles;
pub mod host;
pub mod lifecycle;
pub mod managed;
pub mod marshal;
pub mod options;
pub mod registry;

pub use bridge::{ScriptBridge, SignalDispatch};
pub use error::{BridgeError, BridgeResult, HandleError, RegistryError};
pub use handles::{GcHandle, HandleStrength, HandleTable};
pub use host::{ErrorSink, NativeHost, TracingErrorSink};
pub use lifecycle::{LifecycleManager, ReloadOutcome, ReloadRecord};
pub use managed::{
    Constructor, LoadUnit, LoadUnitId, ManagedObject, ManagedType, TypeAttributes, TypeBuilder,
    TypeDescriptor, TypeId, TypeKind, UnitCatalog, UnitState,
};
pub use marshal::{
    InteropBuffer, InteropPropertyDefaultValue, InteropPropertyInfo, ScriptClassInfo,
    STACK_MAX_LENGTH,
};
pub use options::BridgeOptions;
pub use registry::{Eviction, IdentityRegistry, RegistryGuard};

pub use hostbridge_sdk as sdk;
