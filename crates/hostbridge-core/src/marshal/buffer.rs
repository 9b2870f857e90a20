//! Boundary buffers
//!
//! Elements are `#[repr(C)]` and own their sub-resources. Names are
//! borrowed from the merged descriptor list; the `'a` lifetime ties every
//! element to that list so it outlives the consumer call.

use std::ffi::{c_char, CStr};
use std::marker::PhantomData;

use hostbridge_sdk::{
    InteropString, NativeVariant, PropertyHint, PropertyInfo, PropertyUsageFlags, StringName,
    VariantType,
};
use smallvec::SmallVec;

/// Element counts below this use the inline region
pub const STACK_MAX_LENGTH: usize = 32;

/// Property descriptor in boundary layout
#[repr(C)]
pub struct InteropPropertyInfo<'a> {
    /// Borrowed NUL-terminated name
    pub name: *const c_char,
    /// Owned hint string, null when absent
    pub hint_string: InteropString,
    /// Value-kind tag
    pub ty: VariantType,
    /// Hint tag
    pub hint: PropertyHint,
    /// Usage bitmask
    pub usage: PropertyUsageFlags,
    /// Exported to the editor
    pub exported: bool,
    _name: PhantomData<&'a StringName>,
}

impl<'a> InteropPropertyInfo<'a> {
    /// Build from a descriptor, borrowing its name
    pub fn new(info: &'a PropertyInfo) -> Self {
        Self {
            name: info.name.as_ptr(),
            hint_string: InteropString::from_option(info.hint_string.as_deref()),
            ty: info.ty,
            hint: info.hint,
            usage: info.usage,
            exported: info.exported,
            _name: PhantomData,
        }
    }

    /// Name as a string slice
    pub fn name(&self) -> &str {
        // SAFETY: `name` points into a StringName borrowed for 'a
        unsafe { CStr::from_ptr(self.name) }.to_str().unwrap_or_default()
    }
}

/// Property default value in boundary layout
#[repr(C)]
pub struct InteropPropertyDefaultValue<'a> {
    /// Borrowed NUL-terminated name
    pub name: *const c_char,
    /// Owned encoded value
    pub value: NativeVariant,
    _name: PhantomData<&'a StringName>,
}

impl<'a> InteropPropertyDefaultValue<'a> {
    /// Pair a borrowed name with an encoded value
    pub fn new(name: &'a StringName, value: NativeVariant) -> Self {
        Self {
            name: name.as_ptr(),
            value,
            _name: PhantomData,
        }
    }

    /// Name as a string slice
    pub fn name(&self) -> &str {
        // SAFETY: `name` points into a StringName borrowed for 'a
        unsafe { CStr::from_ptr(self.name) }.to_str().unwrap_or_default()
    }
}

/// Contiguous element buffer passed to a consumer.
///
/// Fewer than `STACK_MAX_LENGTH` elements stay inline; larger counts are
/// allocated on the heap up front. Dropping the buffer releases every
/// element.
pub struct InteropBuffer<T> {
    items: SmallVec<[T; STACK_MAX_LENGTH - 1]>,
}

impl<T> InteropBuffer<T> {
    /// Buffer sized for `len` elements
    pub fn with_len(len: usize) -> Self {
        let items = if len < STACK_MAX_LENGTH {
            SmallVec::new()
        } else {
            SmallVec::with_capacity(len)
        };
        Self { items }
    }

    /// Append an element
    pub fn push(&mut self, item: T) {
        self.items.push(item);
    }

    /// Elements in order
    pub fn as_slice(&self) -> &[T] {
        &self.items
    }

    /// Number of elements
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Check for an empty buffer
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Whether the elements live in the inline region
    pub fn is_inline(&self) -> bool {
        !self.items.spilled()
    }
}

impl<T> FromIterator<T> for InteropBuffer<T> {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        let iter = iter.into_iter();
        let mut buffer = Self::with_len(iter.size_hint().0);
        for item in iter {
            buffer.push(item);
        }
        buffer
    }
}
