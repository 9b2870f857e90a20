//! Metadata marshaling
//!
//! For a script type, walk `type -> base -> ...` up to (excluding) the first
//! native wrapper, ask each level's generated table for what it declares,
//! and merge most-derived first. A name produced by a more-derived level
//! shadows the same name further up.
//!
//! Every accessor call is guarded; a failure or panic aborts the whole
//! extraction so callers never see a partial table.

mod buffer;

pub use buffer::{InteropBuffer, InteropPropertyDefaultValue, InteropPropertyInfo, STACK_MAX_LENGTH};

use hostbridge_sdk::{
    InteropResult, PropertyInfo, RpcConfig, ScriptHandle, SignalInfo, StringName, Variant,
    VariantCodec,
};
use rustc_hash::FxHashSet;

use crate::error::{catch_managed, BridgeResult};
use crate::managed::{ManagedType, TypeDescriptor};
use crate::options::BridgeOptions;

/// Class information reported when a script is (re)registered
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ScriptClassInfo {
    /// Runs inside the editor
    pub is_tool: bool,
    /// Remote-call configuration, derived first
    pub rpc_functions: Vec<RpcConfig>,
    /// Signals, derived first
    pub event_signals: Vec<SignalInfo>,
    /// Script of the direct base type, when it is a script type
    pub base_script: Option<ScriptHandle>,
}

/// Script levels of a type, most-derived first
pub fn script_levels(ty: &ManagedType) -> impl Iterator<Item = &TypeDescriptor> {
    std::iter::once(ty)
        .chain(ty.ancestors())
        .map(|level| level.as_ref())
        .take_while(|level| !level.is_native())
}

fn merge_levels<T, K, F>(ty: &ManagedType, accessor: F, key: K) -> InteropResult<Vec<T>>
where
    F: Fn(&TypeDescriptor) -> InteropResult<Vec<T>>,
    K: Fn(&T) -> &StringName,
{
    let mut seen = FxHashSet::default();
    let mut merged = Vec::new();
    for level in script_levels(ty) {
        let declared = catch_managed(|| accessor(level))?;
        for item in declared {
            if seen.insert(key(&item).clone()) {
                merged.push(item);
            }
        }
    }
    Ok(merged)
}

/// Merged property list
pub fn collect_properties(ty: &ManagedType) -> InteropResult<Vec<PropertyInfo>> {
    merge_levels(ty, |level| level.metadata().property_list(), |p| &p.name)
}

/// Merged property default values
pub fn collect_default_values(ty: &ManagedType) -> InteropResult<Vec<(StringName, Variant)>> {
    merge_levels(
        ty,
        |level| level.metadata().property_default_values(),
        |(name, _)| name,
    )
}

/// Merged signal table
pub fn collect_signals(ty: &ManagedType) -> InteropResult<Vec<SignalInfo>> {
    merge_levels(ty, |level| level.metadata().signal_list(), |s| &s.name)
}

/// Merged remote-call table. Static and rpc-disabled methods are skipped.
pub fn collect_rpc_table(ty: &ManagedType) -> InteropResult<Vec<RpcConfig>> {
    merge_levels(
        ty,
        |level| {
            let methods = level.metadata().methods()?;
            Ok(methods.iter().filter_map(RpcConfig::from_method).collect())
        },
        |config| &config.method,
    )
}

/// Tool status of a type
pub fn is_tool(ty: &TypeDescriptor, options: &BridgeOptions) -> bool {
    ty.has_tool_attribute()
        || ty
            .declaring_type()
            .is_some_and(|declaring| declaring.has_tool_attribute())
        || ty
            .unit_name()
            .is_some_and(|unit| options.is_editor_unit(unit))
}

/// Pack properties into a boundary buffer
pub fn property_buffer(properties: &[PropertyInfo]) -> InteropBuffer<InteropPropertyInfo<'_>> {
    properties.iter().map(InteropPropertyInfo::new).collect()
}

/// Encode default values into a boundary buffer
pub fn default_value_buffer<'a>(
    values: &'a [(StringName, Variant)],
    codec: &dyn VariantCodec,
) -> InteropBuffer<InteropPropertyDefaultValue<'a>> {
    values
        .iter()
        .map(|(name, value)| InteropPropertyDefaultValue::new(name, codec.encode(value)))
        .collect()
}

/// Marshal the merged property list of `ty` to `consumer`.
///
/// The consumer is called once with the whole list, and not at all when the
/// list is empty. Returns whether it was called.
pub fn marshal_property_list<F>(script: ScriptHandle, ty: &ManagedType, consumer: F) -> BridgeResult<bool>
where
    F: FnOnce(ScriptHandle, &[InteropPropertyInfo<'_>]),
{
    let properties = collect_properties(ty)?;
    if properties.is_empty() {
        return Ok(false);
    }
    let buffer = property_buffer(&properties);
    tracing::trace!(
        script = %script,
        count = buffer.len(),
        inline = buffer.is_inline(),
        "Marshaling property list"
    );
    catch_managed(|| {
        consumer(script, buffer.as_slice());
        Ok(())
    })?;
    Ok(true)
}

/// Marshal the merged default values of `ty` to `consumer`.
///
/// Same calling rules as `marshal_property_list`. Encoded values are
/// released after the consumer returns, or on the first failure.
pub fn marshal_default_values<F>(
    script: ScriptHandle,
    ty: &ManagedType,
    codec: &dyn VariantCodec,
    consumer: F,
) -> BridgeResult<bool>
where
    F: FnOnce(ScriptHandle, &[InteropPropertyDefaultValue<'_>]),
{
    let values = collect_default_values(ty)?;
    if values.is_empty() {
        return Ok(false);
    }
    let buffer = catch_managed(|| Ok(default_value_buffer(&values, codec)))?;
    tracing::trace!(
        script = %script,
        count = buffer.len(),
        inline = buffer.is_inline(),
        "Marshaling property default values"
    );
    catch_managed(|| {
        consumer(script, buffer.as_slice());
        Ok(())
    })?;
    Ok(true)
}
