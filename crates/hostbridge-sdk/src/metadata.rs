//! Generated per-type metadata accessors
//!
//! Each script type gets a static implementation of `GeneratedMetadata`,
//! produced ahead of time by the metadata generator. An accessor reports only
//! what its own type level declares; the bridge walks base types itself.

use crate::error::InteropResult;
use crate::string::StringName;
use crate::types::{MethodInfo, PropertyInfo, SignalInfo};
use crate::value::Variant;

/// Static accessor table for one script type level.
///
/// Every accessor defaults to "declares nothing". An `Err` models an
/// introspection failure; the bridge reports it and produces empty output.
pub trait GeneratedMetadata: Send + Sync {
    /// Properties declared by this level
    fn property_list(&self) -> InteropResult<Vec<PropertyInfo>> {
        Ok(Vec::new())
    }

    /// Default values of properties declared by this level
    fn property_default_values(&self) -> InteropResult<Vec<(StringName, Variant)>> {
        Ok(Vec::new())
    }

    /// Signals declared by this level
    fn signal_list(&self) -> InteropResult<Vec<SignalInfo>> {
        Ok(Vec::new())
    }

    /// Methods declared by this level, with their rpc annotations
    fn methods(&self) -> InteropResult<Vec<MethodInfo>> {
        Ok(Vec::new())
    }
}

/// Table for types that declare nothing
#[derive(Debug, Default, Clone, Copy)]
pub struct NoMetadata;

impl GeneratedMetadata for NoMetadata {}
