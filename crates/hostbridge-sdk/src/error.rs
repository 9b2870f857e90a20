//! Error types for generated metadata and value conversion

/// Result type for metadata accessors and value conversion
pub type InteropResult<T> = Result<T, InteropError>;

/// Errors raised on the managed side of the boundary
#[derive(Debug, Clone, thiserror::Error)]
pub enum InteropError {
    /// A generated accessor could not produce its table
    #[error("Metadata error: {0}")]
    Metadata(String),

    /// Type mismatch during conversion
    #[error("Type mismatch: expected {expected}, got {got}")]
    TypeMismatch {
        /// Expected type name
        expected: String,
        /// Actual type name
        got: String,
    },

    /// The boundary value could not be decoded
    #[error("Invalid value: {0}")]
    InvalidValue(String),

    /// Managed code panicked
    #[error("Managed code panicked: {0}")]
    Panic(String),
}

impl From<String> for InteropError {
    fn from(s: String) -> Self {
        InteropError::Metadata(s)
    }
}

impl From<&str> for InteropError {
    fn from(s: &str) -> Self {
        InteropError::Metadata(s.to_string())
    }
}
