//! Opaque pointer-sized handles exchanged with the native side

use std::fmt;

/// Native identifier of a script resource.
///
/// The native side owns the resource; the bridge only uses the value as a key.
#[repr(transparent)]
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct ScriptHandle(usize);

impl ScriptHandle {
    /// The null script handle
    pub const NULL: ScriptHandle = ScriptHandle(0);

    /// Wrap a raw native pointer value
    #[inline]
    pub const fn from_raw(raw: usize) -> Self {
        Self(raw)
    }

    /// Get the raw pointer value
    #[inline]
    pub const fn as_raw(self) -> usize {
        self.0
    }

    /// Check for the null handle
    #[inline]
    pub const fn is_null(self) -> bool {
        self.0 == 0
    }
}

impl fmt::Debug for ScriptHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ScriptHandle({:#x})", self.0)
    }
}

impl fmt::Display for ScriptHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#x}", self.0)
    }
}

/// Pointer to the native object a managed object is bound to
#[repr(transparent)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct NativeObjectPtr(usize);

impl NativeObjectPtr {
    /// The null object pointer
    pub const NULL: NativeObjectPtr = NativeObjectPtr(0);

    /// Wrap a raw native pointer value
    #[inline]
    pub const fn from_raw(raw: usize) -> Self {
        Self(raw)
    }

    /// Get the raw pointer value
    #[inline]
    pub const fn as_raw(self) -> usize {
        self.0
    }

    /// Check for the null pointer
    #[inline]
    pub const fn is_null(self) -> bool {
        self.0 == 0
    }
}

/// Boundary form of an object handle. Zero means "no handle".
pub type RawGcHandle = usize;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_script_handle_is_pointer_sized() {
        assert_eq!(
            std::mem::size_of::<ScriptHandle>(),
            std::mem::size_of::<*const u8>()
        );
    }

    #[test]
    fn test_null_handles() {
        assert!(ScriptHandle::NULL.is_null());
        assert!(!ScriptHandle::from_raw(0x10).is_null());
        assert!(NativeObjectPtr::default().is_null());
        assert_eq!(NativeObjectPtr::from_raw(7).as_raw(), 7);
    }

    #[test]
    fn test_script_handle_debug() {
        assert_eq!(format!("{:?}", ScriptHandle::from_raw(255)), "ScriptHandle(0xff)");
    }
}
