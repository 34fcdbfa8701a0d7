// ============================================
// File: crates/otafleet-transport/src/error.rs
// ============================================
//! # Transport Error Types
//!
//! ## Creation Reason
//! Separates "the request never completed" from "the server answered
//! with an error body". Only the former is a `TransportError`; error
//! bodies come back as a normal `ApiResponse`.
//!
//! ## Error Categories
//! 1. **Connection Errors**: DNS, TCP connect, TLS handshake
//! 2. **Exchange Errors**: Writing the request, reading the reply, timeouts
//! 3. **Download Errors**: Non-200 firmware fetch, local file I/O
//! 4. **Configuration Errors**: Bad base URL, unreadable CA certificate
//!
//! ## ⚠️ Important Note for Next Developer
//! - Nothing in this crate retries; `is_retryable` is advisory for callers
//!
//! ## Last Modified
//! v0.1.0 - Initial error definitions

use std::io;

use thiserror::Error;

use otafleet_common::error::CommonError;

// ============================================
// Result Type Alias
// ============================================

/// Result type for transport operations.
pub type Result<T> = std::result::Result<T, TransportError>;

// ============================================
// TransportError
// ============================================

/// Transport layer error types.
#[derive(Error, Debug)]
pub enum TransportError {
    // ========================================
    // Connection Errors
    // ========================================

    /// Could not establish the connection (DNS, TCP or TLS handshake).
    #[error("Failed to connect to {target}: {reason}")]
    Connect {
        /// URL or host being contacted
        target: String,
        /// Why it failed
        reason: String,
    },

    // ========================================
    // Exchange Errors
    // ========================================

    /// Connection was up but writing the request failed.
    #[error("Failed to send request to {target}: {reason}")]
    Send {
        /// URL being contacted
        target: String,
        /// Why it failed
        reason: String,
    },

    /// No complete reply within the request timeout.
    #[error("Request to {target} timed out")]
    Timeout {
        /// URL being contacted
        target: String,
    },

    /// Reading the reply body failed.
    #[error("Failed to receive reply from {target}: {reason}")]
    Receive {
        /// URL being contacted
        target: String,
        /// Why it failed
        reason: String,
    },

    // ========================================
    // Download Errors
    // ========================================

    /// Firmware fetch returned something other than 200.
    #[error("Unexpected HTTP status {status} from {target}")]
    HttpStatus {
        /// URL being fetched
        target: String,
        /// Status code received
        status: u16,
    },

    /// Local file I/O failed.
    #[error("I/O error: {context}")]
    Io {
        /// What was happening when the error occurred
        context: String,
        /// Underlying I/O error
        #[source]
        source: io::Error,
    },

    // ========================================
    // Configuration Errors
    // ========================================

    /// Invalid transport configuration.
    #[error("Invalid configuration: {field} - {reason}")]
    InvalidConfig {
        /// Configuration field name
        field: String,
        /// Why it's invalid
        reason: String,
    },

    /// Error from common crate.
    #[error(transparent)]
    Common(#[from] CommonError),
}

impl TransportError {
    // ========================================
    // Convenience Constructors
    // ========================================

    /// Creates an `Io` error with context.
    pub fn io(context: impl Into<String>, source: io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }

    /// Creates an `InvalidConfig` error.
    pub fn invalid_config(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidConfig {
            field: field.into(),
            reason: reason.into(),
        }
    }

    /// Maps a reqwest error raised while sending to the matching variant.
    pub(crate) fn from_send(target: &str, err: &reqwest::Error) -> Self {
        let target = target.to_string();
        if err.is_timeout() {
            Self::Timeout { target }
        } else if err.is_connect() {
            Self::Connect {
                target,
                reason: err.to_string(),
            }
        } else if err.is_builder() {
            Self::InvalidConfig {
                field: "url".into(),
                reason: err.to_string(),
            }
        } else {
            Self::Send {
                target,
                reason: err.to_string(),
            }
        }
    }

    /// Maps a reqwest error raised while reading the body.
    pub(crate) fn from_receive(target: &str, err: &reqwest::Error) -> Self {
        let target = target.to_string();
        if err.is_timeout() {
            Self::Timeout { target }
        } else {
            Self::Receive {
                target,
                reason: err.to_string(),
            }
        }
    }

    // ========================================
    // Error Classification
    // ========================================

    /// Returns `true` if this error is transient and a later attempt may succeed.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Connect { .. } | Self::Send { .. } | Self::Timeout { .. } | Self::Receive { .. } => {
                true
            }
            Self::HttpStatus { status, .. } => *status >= 500,
            Self::Io { source, .. } => matches!(
                source.kind(),
                io::ErrorKind::Interrupted | io::ErrorKind::TimedOut
            ),
            _ => false,
        }
    }

    /// Returns `true` if the request timed out.
    #[must_use]
    pub const fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }
}

// ============================================
// Error Conversions
// ============================================

impl From<io::Error> for TransportError {
    fn from(err: io::Error) -> Self {
        Self::Io {
            context: "unspecified I/O operation".into(),
            source: err,
        }
    }
}

// ============================================
// Tests
// ============================================
