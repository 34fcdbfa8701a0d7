// ============================================
// File: crates/otafleet-common/src/error.rs
// ============================================
//! # Common Error Types
//!
//! ## Creation Reason
//! Validation errors for the identifiers and ranges every other crate
//! builds on.
//!
//! ## ⚠️ Important Note for Next Developer
//! - Each crate defines its own error type that wraps `CommonError`
//! - Only validation lives here; I/O errors belong to the crate doing the I/O
//!
//! ## Last Modified
//! v0.1.0 - Initial error definitions

use thiserror::Error;

// ============================================
// Result Type Alias
// ============================================

/// Common result type for operations that may fail.
pub type Result<T> = std::result::Result<T, CommonError>;

// ============================================
// CommonError
// ============================================

/// Common error types shared across otafleet crates.
///
/// # Example
/// ```
/// use otafleet_common::error::{CommonError, Result};
///
/// fn validate_prefix(prefix: &str) -> Result<()> {
///     if prefix.contains(' ') {
///         return Err(CommonError::invalid_input("prefix", "cannot contain spaces"));
///     }
///     Ok(())
/// }
///
/// assert!(validate_prefix("a b").is_err());
/// ```
#[derive(Error, Debug)]
pub enum CommonError {
    /// Invalid input data provided.
    #[error("Invalid input for '{field}': {reason}")]
    InvalidInput {
        /// Name of the field or parameter
        field: String,
        /// Description of what's wrong
        reason: String,
    },

    /// Value is out of acceptable range.
    #[error("Value out of range: {value} not in [{min}, {max}]")]
    OutOfRange {
        /// The value that was out of range
        value: String,
        /// Minimum acceptable value
        min: String,
        /// Maximum acceptable value
        max: String,
    },
}

impl CommonError {
    /// Creates an `InvalidInput` error.
    pub fn invalid_input(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidInput {
            field: field.into(),
            reason: reason.into(),
        }
    }

    /// Creates an `OutOfRange` error.
    pub fn out_of_range(
        value: impl ToString,
        min: impl ToString,
        max: impl ToString,
    ) -> Self {
        Self::OutOfRange {
            value: value.to_string(),
            min: min.to_string(),
            max: max.to_string(),
        }
    }
}

// ============================================
// Tests
// ============================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = CommonError::invalid_input("node_id", "cannot be empty");
        assert!(err.to_string().contains("node_id"));
        assert!(err.to_string().contains("cannot be empty"));
    }

    #[test]
    fn test_out_of_range_display() {
        let err = CommonError::out_of_range(5, 0, 3);
        assert_eq!(err.to_string(), "Value out of range: 5 not in [0, 3]");
    }
}
