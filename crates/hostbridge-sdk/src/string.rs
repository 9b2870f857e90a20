//! Strings that cross the boundary
//!
//! - `StringName`: shared, immutable, NUL-terminated name. Boundary structs
//!   borrow its pointer without taking ownership.
//! - `InteropString`: an owned C string handed to the native side for the
//!   duration of a call and freed on drop.

use std::ffi::{c_char, CStr, CString};
use std::fmt;
use std::sync::Arc;

/// Interned-style name used for properties, signals and methods.
///
/// Cloning is cheap. The storage always ends in a NUL byte so `as_ptr`
/// can be borrowed by fixed-layout boundary structs.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StringName {
    // Includes the trailing NUL
    data: Arc<str>,
}

impl StringName {
    /// Create a name. Input is truncated at the first interior NUL.
    pub fn new(name: &str) -> Self {
        let name = match name.find('\0') {
            Some(end) => &name[..end],
            None => name,
        };
        let mut data = String::with_capacity(name.len() + 1);
        data.push_str(name);
        data.push('\0');
        Self { data: data.into() }
    }

    /// The name without its terminator
    pub fn as_str(&self) -> &str {
        &self.data[..self.data.len() - 1]
    }

    /// Borrowed NUL-terminated pointer, valid while any clone is alive
    pub fn as_ptr(&self) -> *const c_char {
        self.data.as_ptr() as *const c_char
    }

    /// Check for the empty name
    pub fn is_empty(&self) -> bool {
        self.data.len() == 1
    }

    /// Read a name back from a borrowed boundary pointer.
    ///
    /// # Safety
    ///
    /// `ptr` must be null or point to a valid NUL-terminated string.
    pub unsafe fn from_ptr(ptr: *const c_char) -> Option<Self> {
        if ptr.is_null() {
            return None;
        }
        Some(Self::new(&CStr::from_ptr(ptr).to_string_lossy()))
    }
}

impl From<&str> for StringName {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for StringName {
    fn from(s: String) -> Self {
        Self::new(&s)
    }
}

impl PartialEq<str> for StringName {
    fn eq(&self, other: &str) -> bool {
        self.as_str() == other
    }
}

impl PartialEq<&str> for StringName {
    fn eq(&self, other: &&str) -> bool {
        self.as_str() == *other
    }
}

impl fmt::Debug for StringName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "&{:?}", self.as_str())
    }
}

impl fmt::Display for StringName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Owned C string placed in a boundary struct.
///
/// A null pointer encodes "no string". Dropping releases the allocation.
#[repr(C)]
pub struct InteropString {
    ptr: *mut c_char,
}

impl InteropString {
    /// The absent string
    pub const fn null() -> Self {
        Self {
            ptr: std::ptr::null_mut(),
        }
    }

    /// Allocate a copy of `s`. Interior NULs truncate the copy.
    pub fn new(s: &str) -> Self {
        let s = match s.find('\0') {
            Some(end) => &s[..end],
            None => s,
        };
        match CString::new(s) {
            Ok(c_str) => Self {
                ptr: c_str.into_raw(),
            },
            Err(_) => Self::null(),
        }
    }

    /// Allocate from an optional string; `None` stays null
    pub fn from_option(s: Option<&str>) -> Self {
        s.map_or_else(Self::null, Self::new)
    }

    /// Borrowed pointer, null when absent
    pub fn as_ptr(&self) -> *const c_char {
        self.ptr
    }

    /// Check for the absent string
    pub fn is_null(&self) -> bool {
        self.ptr.is_null()
    }

    /// Copy the contents back out
    pub fn to_string_lossy(&self) -> Option<String> {
        if self.ptr.is_null() {
            return None;
        }
        // SAFETY: ptr came from CString::into_raw and is freed only in drop
        Some(unsafe { CStr::from_ptr(self.ptr) }.to_string_lossy().into_owned())
    }
}

impl Drop for InteropString {
    fn drop(&mut self) {
        if self.ptr.is_null() {
            return;
        }
        // SAFETY: ptr came from CString::into_raw and has not been freed
        drop(unsafe { CString::from_raw(self.ptr) });
        self.ptr = std::ptr::null_mut();
    }
}

impl fmt::Debug for InteropString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "InteropString({:?})", self.to_string_lossy())
    }
}

unsafe impl Send for InteropString {}
