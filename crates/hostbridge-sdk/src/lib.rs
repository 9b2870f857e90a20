//! Hostbridge SDK - descriptor types shared across the script boundary
//!
//! This crate provides the minimal types that generated per-type metadata
//! compiles against, without depending on the bridge runtime:
//! - Opaque native handles (`ScriptHandle`, `NativeObjectPtr`, `RawGcHandle`)
//! - Property, signal and method descriptors
//! - `Variant` values and their fixed-layout boundary form
//! - The `GeneratedMetadata` accessor table implemented per script type
//!
//! # Example
//!
//! ```ignore
//! use hostbridge_sdk::*;
//!
//! struct PlayerMetadata;
//!
//! impl GeneratedMetadata for PlayerMetadata {
//!     fn property_list(&self) -> InteropResult<Vec<PropertyInfo>> {
//!         Ok(vec![PropertyInfo::exported("speed", VariantType::Float)])
//!     }
//! }
//! ```

#![warn(missing_docs)]

pub mod error;
pub mod handle;
pub mod metadata;
pub mod string;
pub mod types;
pub mod value;

pub use error::{InteropError, InteropResult};
pub use handle::{NativeObjectPtr, RawGcHandle, ScriptHandle};
pub use metadata::{GeneratedMetadata, NoMetadata};
pub use string::{InteropString, StringName};
pub use types::{
    MethodInfo, PropertyHint, PropertyInfo, PropertyUsageFlags, RpcConfig, RpcMode, SignalInfo,
    SignalParam, TransferMode, VariantType,
};
pub use value::{BoxedVariantCodec, NativeVariant, Variant, VariantCodec};
