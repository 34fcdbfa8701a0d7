// ============================================
// File: crates/otafleet-client/src/error.rs
// ============================================
//! # Client Error Types
//!
//! ## Error Categories
//! 1. **Configuration**: Unreadable, unparsable or invalid config
//! 2. **Fleet**: Overlapping sessions for one node
//! 3. **Outcome sink**: Writing the outcome log
//! 4. **Wrapped**: Common, core and transport errors
//!
//! ## ⚠️ Important Note for Next Developer
//! - A failed update is NOT a `ClientError`; sessions report failures as
//!   `SessionFailure` and the fleet keeps going
//!
//! ## Last Modified
//! v0.1.0 - Initial error definitions

use thiserror::Error;

use otafleet_common::error::CommonError;
use otafleet_core::error::CoreError;
use otafleet_transport::error::TransportError;

/// Result type for client operations.
pub type Result<T> = std::result::Result<T, ClientError>;

/// Client error types.
#[derive(Error, Debug)]
pub enum ClientError {
    #[error("Failed to load configuration from '{path}': {reason}")]
    ConfigLoad {
        path: String,
        reason: String,
    },

    #[error("Invalid configuration: {field} - {reason}")]
    ConfigInvalid {
        field: String,
        reason: String,
    },

    #[error("A session for node {node_id} is already running")]
    SessionInProgress {
        node_id: String,
    },

    #[error("Outcome sink error: {context}")]
    Sink {
        context: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Internal error: {message}")]
    Internal {
        message: String,
    },

    #[error(transparent)]
    Common(#[from] CommonError),

    #[error(transparent)]
    Core(#[from] CoreError),

    #[error(transparent)]
    Transport(#[from] TransportError),
}

impl ClientError {
    pub fn config_load(path: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::ConfigLoad {
            path: path.into(),
            reason: reason.into(),
        }
    }

    pub fn config_invalid(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::ConfigInvalid {
            field: field.into(),
            reason: reason.into(),
        }
    }

    pub fn sink(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::Sink {
            context: context.into(),
            source,
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    #[must_use]
    pub const fn is_config_error(&self) -> bool {
        matches!(self, Self::ConfigLoad { .. } | Self::ConfigInvalid { .. })
    }

    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Transport(e) => e.is_retryable(),
            Self::SessionInProgress { .. } => true,
            _ => false,
        }
    }
}
