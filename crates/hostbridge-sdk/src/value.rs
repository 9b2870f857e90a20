//! Variant values and their boundary form
//!
//! The scalar wire format belongs to the host. This module only defines the
//! managed-side `Variant`, the fixed-layout `NativeVariant` slot that owns an
//! encoded payload, and the `VariantCodec` seam between the two.

use std::ffi::c_void;
use std::fmt;

use crate::error::{InteropError, InteropResult};
use crate::types::VariantType;

/// Managed-side dynamic value
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Variant {
    /// No value
    #[default]
    Nil,
    /// Boolean
    Bool(bool),
    /// Integer
    Int(i64),
    /// Float
    Float(f64),
    /// String
    String(String),
    /// Array of values
    Array(Vec<Variant>),
}

impl Variant {
    /// Value-kind tag of this value
    pub fn variant_type(&self) -> VariantType {
        match self {
            Variant::Nil => VariantType::Nil,
            Variant::Bool(_) => VariantType::Bool,
            Variant::Int(_) => VariantType::Int,
            Variant::Float(_) => VariantType::Float,
            Variant::String(_) => VariantType::String,
            Variant::Array(_) => VariantType::Array,
        }
    }

    /// Check for nil
    pub fn is_nil(&self) -> bool {
        matches!(self, Variant::Nil)
    }

    /// Get as bool
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Variant::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Get as integer
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Variant::Int(i) => Some(*i),
            _ => None,
        }
    }

    /// Get as float; integers widen
    pub fn as_float(&self) -> Option<f64> {
        match self {
            Variant::Float(f) => Some(*f),
            Variant::Int(i) => Some(*i as f64),
            _ => None,
        }
    }

    /// Get as string slice
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Variant::String(s) => Some(s),
            _ => None,
        }
    }

    /// Typed accessor that reports a conversion error
    pub fn expect_int(&self) -> InteropResult<i64> {
        self.as_int().ok_or_else(|| InteropError::TypeMismatch {
            expected: VariantType::Int.name().to_string(),
            got: self.variant_type().name().to_string(),
        })
    }
}

impl From<bool> for Variant {
    fn from(b: bool) -> Self {
        Variant::Bool(b)
    }
}

impl From<i64> for Variant {
    fn from(i: i64) -> Self {
        Variant::Int(i)
    }
}

impl From<i32> for Variant {
    fn from(i: i32) -> Self {
        Variant::Int(i as i64)
    }
}

impl From<f64> for Variant {
    fn from(f: f64) -> Self {
        Variant::Float(f)
    }
}

impl From<&str> for Variant {
    fn from(s: &str) -> Self {
        Variant::String(s.to_string())
    }
}

impl From<String> for Variant {
    fn from(s: String) -> Self {
        Variant::String(s)
    }
}

// ============================================================================
// Boundary form
// ============================================================================

/// Release function for an encoded payload
pub type ReleaseFn = unsafe extern "C" fn(*mut c_void);

/// Fixed-layout variant slot handed to the native side.
///
/// The slot owns its payload: dropping it calls `release` exactly once.
#[repr(C)]
pub struct NativeVariant {
    /// Value-kind tag
    pub kind: VariantType,
    /// Encoded payload, codec-specific
    pub payload: *mut c_void,
    /// Releases `payload`; `None` when nothing is owned
    pub release: Option<ReleaseFn>,
}

impl NativeVariant {
    /// Empty slot owning nothing
    pub const fn nil() -> Self {
        Self {
            kind: VariantType::Nil,
            payload: std::ptr::null_mut(),
            release: None,
        }
    }

    /// Give up ownership of the payload, leaving a nil slot behind
    pub fn take(&mut self) -> NativeVariant {
        std::mem::replace(self, NativeVariant::nil())
    }
}

impl Default for NativeVariant {
    fn default() -> Self {
        Self::nil()
    }
}

impl Drop for NativeVariant {
    fn drop(&mut self) {
        if let Some(release) = self.release.take() {
            if !self.payload.is_null() {
                // SAFETY: the codec that filled this slot paired payload with release
                unsafe { release(self.payload) };
            }
        }
        self.payload = std::ptr::null_mut();
    }
}

impl fmt::Debug for NativeVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NativeVariant")
            .field("kind", &self.kind)
            .field("payload", &self.payload)
            .field("owned", &self.release.is_some())
            .finish()
    }
}

unsafe impl Send for NativeVariant {}

/// Converts between managed values and the host's boundary representation
pub trait VariantCodec: Send + Sync {
    /// Encode a value into an owning slot
    fn encode(&self, value: &Variant) -> NativeVariant;

    /// Decode a slot without taking ownership
    fn decode(&self, slot: &NativeVariant) -> InteropResult<Variant>;
}

/// Codec that boxes the managed value as the payload.
///
/// Used when the host treats variants opaquely and hands them back to the
/// bridge (constructor arguments, signal arguments). Only slots produced by
/// this codec decode; the release function doubles as the ownership tag,
/// so slots filled by any other encoder are rejected without touching
/// their payload.
#[derive(Debug, Default, Clone, Copy)]
pub struct BoxedVariantCodec;

unsafe extern "C" fn release_boxed_variant(payload: *mut c_void) {
    drop(Box::from_raw(payload as *mut Variant));
}

fn is_boxed_slot(slot: &NativeVariant) -> bool {
    slot.release.map(|release| release as usize) == Some(release_boxed_variant as usize)
}

impl VariantCodec for BoxedVariantCodec {
    fn encode(&self, value: &Variant) -> NativeVariant {
        if value.is_nil() {
            return NativeVariant::nil();
        }
        NativeVariant {
            kind: value.variant_type(),
            payload: Box::into_raw(Box::new(value.clone())) as *mut c_void,
            release: Some(release_boxed_variant),
        }
    }

    fn decode(&self, slot: &NativeVariant) -> InteropResult<Variant> {
        if slot.payload.is_null() {
            return match slot.kind {
                VariantType::Nil => Ok(Variant::Nil),
                other => Err(InteropError::InvalidValue(format!(
                    "{} slot without payload",
                    other.name()
                ))),
            };
        }
        if !is_boxed_slot(slot) {
            return Err(InteropError::InvalidValue(format!(
                "{} slot was not encoded by the boxed codec",
                slot.kind.name()
            )));
        }
        // SAFETY: the release tag shows the payload was produced by `encode`
        let value = unsafe { &*(slot.payload as *const Variant) };
        if value.variant_type() != slot.kind {
            return Err(InteropError::TypeMismatch {
                expected: slot.kind.name().to_string(),
                got: value.variant_type().name().to_string(),
            });
        }
        Ok(value.clone())
    }
}
