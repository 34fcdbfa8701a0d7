// ============================================
// File: crates/otafleet-core/src/protocol/mod.rs
// ============================================
//! # Control-Server Protocol
//!
//! ## Creation Reason
//! Describes the JSON API the update client talks to: which endpoints
//! exist, what each request body contains, and how each reply is turned
//! into a structured result.
//!
//! ## Main Functionality
//! - `Endpoint`, `Method`: Request addressing
//! - [`messages`]: Request bodies, `ApiResponse`, `FirmwareDescriptor`
//! - [`classify`]: Reply classification (`Registration`, `UpdateCheck`,
//!   `Acknowledgement`)
//!
//! ## API Summary
//! ```text
//! POST /registerNode       {nodeId, deviceType}            → {message} | {error, details}
//! POST /getCurrentVersion  {nodeId}                        → {currentVersion}
//! POST /checkForUpdate     {nodeId, currentVersion}        → {updateAvailable, firmwareInfo?}
//! POST /verifyFirmware     {nodeId, firmwareVersion, firmwareHash} → {verified} | {message}
//! POST /submitUpdate       {nodeId, firmwareVersion}       → {status} | {message}
//!
//! Headers on every request:  nodeId: <id>   deviceType: <type>
//! ```
//!
//! ## ⚠️ Important Note for Next Developer
//! - Field names on the wire are camelCase; keep the serde renames
//! - Success for verify/submit is signalled two different ways by
//!   different server versions; both are accepted (see `classify`)
//!
//! ## Last Modified
//! v0.1.0 - Initial protocol definitions

pub mod classify;
pub mod messages;

use std::fmt;

use serde::{Deserialize, Serialize};

pub use classify::{parse_current_version, Acknowledgement, Registration, UpdateCheck};
pub use messages::{
    ApiResponse, CheckForUpdateRequest, CurrentVersionRequest, FirmwareDescriptor,
    RegisterNodeRequest, SubmitUpdateRequest, VerifyFirmwareRequest,
};

// ============================================
// Constants
// ============================================

/// Message the server returns on a fresh registration.
pub const REGISTERED_MESSAGE: &str = "Node registered successfully";

/// Marker in the `details` field of an "already registered" rejection.
pub const ALREADY_REGISTERED_MARKER: &str = "already registered";

/// Message some server versions return from `/verifyFirmware` and `/submitUpdate`.
pub const FIRMWARE_UPDATED_MESSAGE: &str = "Node firmware version updated successfully";

/// Message of the sentinel response for unparsable bodies.
pub const INVALID_JSON_MESSAGE: &str = "Invalid JSON response";

/// Header carrying the node id.
pub const HEADER_NODE_ID: &str = "nodeId";

/// Header carrying the device type.
pub const HEADER_DEVICE_TYPE: &str = "deviceType";

// ============================================
// Method
// ============================================

/// HTTP method of a control request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    /// HTTP GET
    Get,
    /// HTTP POST
    Post,
}

impl Method {
    /// Returns the method name as sent on the wire.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================
// Endpoint
// ============================================

/// Control-server endpoint, relative to the API base URL.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Endpoint {
    /// `/registerNode`
    RegisterNode,
    /// `/getCurrentVersion`
    GetCurrentVersion,
    /// `/checkForUpdate`
    CheckForUpdate,
    /// `/verifyFirmware`
    VerifyFirmware,
    /// `/submitUpdate`
    SubmitUpdate,
}

impl Endpoint {
    /// Path under the API base URL.
    #[must_use]
    pub const fn path(self) -> &'static str {
        match self {
            Self::RegisterNode => "/registerNode",
            Self::GetCurrentVersion => "/getCurrentVersion",
            Self::CheckForUpdate => "/checkForUpdate",
            Self::VerifyFirmware => "/verifyFirmware",
            Self::SubmitUpdate => "/submitUpdate",
        }
    }

    /// Method the server expects on this endpoint.
    #[must_use]
    pub const fn method(self) -> Method {
        Method::Post
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.path())
    }
}
