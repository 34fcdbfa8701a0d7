// ============================================
// File: crates/otafleet-core/src/protocol/classify.rs
// ============================================
//! # Response Classification
//!
//! Turns each control-server reply into a structured result, so the
//! session state machine branches on variants instead of server text.
//!
//! | Endpoint | Result type |
//! |----------|-------------|
//! | `/registerNode` | [`Registration`] |
//! | `/getCurrentVersion` | `String` via [`parse_current_version`] |
//! | `/checkForUpdate` | [`UpdateCheck`] |
//! | `/verifyFirmware` | [`Acknowledgement`] via [`Acknowledgement::from_verify`] |
//! | `/submitUpdate` | [`Acknowledgement`] via [`Acknowledgement::from_submit`] |

use tracing::debug;

use super::messages::{ApiResponse, FirmwareDescriptor};
use super::{Endpoint, ALREADY_REGISTERED_MARKER, FIRMWARE_UPDATED_MESSAGE, REGISTERED_MESSAGE};
use crate::error::{CoreError, Result};

// ============================================
// Registration
// ============================================

/// Result of `/registerNode`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Registration {
    /// Node was registered by this call.
    Registered,
    /// Node was registered earlier. Not an error.
    AlreadyRegistered,
    /// Server refused the registration.
    Rejected(String),
}

impl Registration {
    /// Classifies a `/registerNode` reply.
    ///
    /// # Example
    /// ```
    /// use otafleet_core::protocol::{ApiResponse, Registration};
    /// use serde_json::json;
    ///
    /// let resp = ApiResponse::from_json(json!({
    ///     "error": "Failed to register node",
    ///     "details": "Edge node a7 is already registered",
    /// }));
    /// assert_eq!(Registration::classify(&resp), Registration::AlreadyRegistered);
    /// ```
    #[must_use]
    pub fn classify(resp: &ApiResponse) -> Self {
        if resp.message() == Some(REGISTERED_MESSAGE) {
            return Self::Registered;
        }
        if resp
            .details()
            .is_some_and(|d| d.contains(ALREADY_REGISTERED_MARKER))
        {
            return Self::AlreadyRegistered;
        }

        let detail = [resp.details(), resp.error(), resp.message()]
            .into_iter()
            .flatten()
            .find(|s| !s.is_empty())
            .unwrap_or("unknown")
            .to_string();
        Self::Rejected(detail)
    }

    /// `true` unless the server rejected the node.
    #[must_use]
    pub const fn is_registered(&self) -> bool {
        matches!(self, Self::Registered | Self::AlreadyRegistered)
    }
}

// ============================================
// Current Version
// ============================================

/// Extracts `currentVersion` from a `/getCurrentVersion` reply.
///
/// # Errors
/// Returns `CoreError::MalformedResponse` if the field is absent, `null`,
/// or not a string.
pub fn parse_current_version(resp: &ApiResponse) -> Result<String> {
    match resp.field("currentVersion") {
        Some(serde_json::Value::String(v)) => Ok(v.clone()),
        Some(serde_json::Value::Null) | None => Err(CoreError::malformed(
            Endpoint::GetCurrentVersion,
            format!("no currentVersion ({})", resp.detail()),
        )),
        Some(other) => Err(CoreError::malformed(
            Endpoint::GetCurrentVersion,
            format!("currentVersion is not a string: {other}"),
        )),
    }
}

// ============================================
// UpdateCheck
// ============================================

/// Result of `/checkForUpdate`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpdateCheck {
    /// No newer firmware.
    UpToDate,
    /// A newer firmware is available.
    Available(FirmwareDescriptor),
    /// `updateAvailable` was set but `firmwareInfo` was missing or incomplete.
    AnnouncedWithoutDescriptor,
}

impl UpdateCheck {
    /// Classifies a `/checkForUpdate` reply.
    ///
    /// # Errors
    /// Returns `CoreError::Rejected` if the body carries `error` or
    /// `status: "error"`, including the invalid-JSON sentinel.
    pub fn classify(resp: &ApiResponse) -> Result<Self> {
        if resp.is_error() {
            return Err(CoreError::rejected(Endpoint::CheckForUpdate, resp.detail()));
        }

        if resp.bool_field("updateAvailable") != Some(true) {
            return Ok(Self::UpToDate);
        }

        match resp.field("firmwareInfo").and_then(FirmwareDescriptor::from_value) {
            Some(descriptor) => Ok(Self::Available(descriptor)),
            None => {
                debug!("updateAvailable without usable firmwareInfo: {}", resp.body());
                Ok(Self::AnnouncedWithoutDescriptor)
            }
        }
    }
}

// ============================================
// Acknowledgement
// ============================================

/// Result of `/verifyFirmware` and `/submitUpdate`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Acknowledgement {
    /// Server accepted the request.
    Accepted,
    /// Server did not accept it.
    Rejected(String),
}

impl Acknowledgement {
    /// Classifies a `/verifyFirmware` reply.
    ///
    /// Accepted on `verified: true` or the firmware-updated message.
    #[must_use]
    pub fn from_verify(resp: &ApiResponse) -> Self {
        let accepted = resp.bool_field("verified") == Some(true)
            || resp.message() == Some(FIRMWARE_UPDATED_MESSAGE);
        Self::from_flag(accepted, resp)
    }

    /// Classifies a `/submitUpdate` reply.
    ///
    /// Accepted on `status: "success"` or the firmware-updated message.
    #[must_use]
    pub fn from_submit(resp: &ApiResponse) -> Self {
        let accepted =
            resp.status() == Some("success") || resp.message() == Some(FIRMWARE_UPDATED_MESSAGE);
        Self::from_flag(accepted, resp)
    }

    fn from_flag(accepted: bool, resp: &ApiResponse) -> Self {
        if accepted {
            Self::Accepted
        } else {
            Self::Rejected(resp.detail())
        }
    }

    /// `true` for `Accepted`.
    #[must_use]
    pub const fn is_accepted(&self) -> bool {
        matches!(self, Self::Accepted)
    }
}

// ============================================
// Tests
// ============================================
