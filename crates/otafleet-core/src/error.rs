// ============================================
// File: crates/otafleet-core/src/error.rs
// ============================================
//! # Core Error Types
//!
//! ## Error Categories
//! 1. **Protocol Errors**: Well-formed reply that is missing a required
//!    field, or an explicit `{error}` / `{status: "error"}` body
//! 2. **Integrity Errors**: Malformed digests
//! 3. **I/O Errors**: Reading firmware images for hashing
//!
//! ## Last Modified
//! v0.1.0 - Initial error definitions

use thiserror::Error;

use otafleet_common::error::CommonError;

use crate::protocol::Endpoint;

// ============================================
// Result Type Alias
// ============================================

/// Result type for core operations.
pub type Result<T> = std::result::Result<T, CoreError>;

// ============================================
// CoreError
// ============================================

/// Core error types for protocol parsing and integrity checks.
#[derive(Error, Debug)]
pub enum CoreError {
    /// The server replied, but a required field is missing or has the wrong type.
    #[error("Malformed response from {endpoint}: {reason}")]
    MalformedResponse {
        /// Endpoint that produced the reply
        endpoint: Endpoint,
        /// What was wrong with it
        reason: String,
    },

    /// The server replied with an explicit error.
    #[error("{endpoint} rejected the request: {detail}")]
    Rejected {
        /// Endpoint that rejected the request
        endpoint: Endpoint,
        /// Server-provided detail
        detail: String,
    },

    /// A digest string is not valid hex of the expected length.
    #[error("Invalid digest: {reason}")]
    InvalidDigest {
        /// Why the digest is invalid
        reason: String,
    },

    /// I/O error while reading data to hash.
    #[error("I/O error: {context}")]
    Io {
        /// What was being read
        context: String,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },

    /// Error from the common crate.
    #[error(transparent)]
    Common(#[from] CommonError),
}

impl CoreError {
    /// Creates a `MalformedResponse` error.
    pub fn malformed(endpoint: Endpoint, reason: impl Into<String>) -> Self {
        Self::MalformedResponse {
            endpoint,
            reason: reason.into(),
        }
    }

    /// Creates a `Rejected` error.
    pub fn rejected(endpoint: Endpoint, detail: impl Into<String>) -> Self {
        Self::Rejected {
            endpoint,
            detail: detail.into(),
        }
    }

    /// Creates an `Io` error with context.
    pub fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }

    /// Returns `true` for errors produced by interpreting a server reply.
    #[must_use]
    pub const fn is_protocol_error(&self) -> bool {
        matches!(self, Self::MalformedResponse { .. } | Self::Rejected { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display_names_endpoint() {
        let err = CoreError::malformed(Endpoint::GetCurrentVersion, "missing currentVersion");
        assert!(err.to_string().contains("/getCurrentVersion"));
        assert!(err.is_protocol_error());
    }

    #[test]
    fn test_io_is_not_protocol_error() {
        let err = CoreError::io(
            "firmware.bin",
            std::io::Error::new(std::io::ErrorKind::NotFound, "gone"),
        );
        assert!(!err.is_protocol_error());
    }
}
