// ============================================
// File: crates/otafleet-transport/src/traits.rs
// ============================================
//! # Transport Traits
//!
//! ## Creation Reason
//! The update session talks to the network only through these two traits,
//! so the whole state machine can be driven by in-memory mocks in tests.
//!
//! ## Main Functionality
//! - `ControlPlane`: One authenticated JSON request to the control server
//! - `FirmwareSource`: Fetch a firmware image into a local file
//! - `Download`: Metadata about a completed fetch
//!
//! ## ⚠️ Important Note for Next Developer
//! - Implementations must be `Send + Sync`; one instance is shared by
//!   every concurrent session
//! - Neither trait retries. A single call is a single attempt.
//!
//! ## Last Modified
//! v0.1.0 - Initial trait definitions

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde_json::Value;

use otafleet_common::NodeIdentity;
use otafleet_core::{ApiResponse, Endpoint, Method};

use crate::error::Result;

// ============================================
// ControlPlane Trait
// ============================================

/// Abstract interface to the control server.
///
/// # Contract
/// - Sends `nodeId` and `deviceType` headers on every call
/// - Returns `Ok` for any reply that arrived, even `{status: "error"}`;
///   an unparsable body becomes the invalid-JSON sentinel
/// - Returns `Err` only if no reply arrived
///
/// # Example
/// ```ignore
/// let resp = control
///     .send(Method::Post, Endpoint::GetCurrentVersion, &node, Some(&body))
///     .await?;
/// ```
#[async_trait]
pub trait ControlPlane: Send + Sync {
    /// Sends one request and returns the parsed reply.
    ///
    /// # Errors
    /// Returns a `TransportError` on connect, send, receive or timeout failure.
    async fn send(
        &self,
        method: Method,
        endpoint: Endpoint,
        node: &NodeIdentity,
        body: Option<&Value>,
    ) -> Result<ApiResponse>;

    /// Sends a request using the endpoint's own method.
    ///
    /// # Errors
    /// Same as [`ControlPlane::send`].
    async fn call(
        &self,
        endpoint: Endpoint,
        node: &NodeIdentity,
        body: Option<&Value>,
    ) -> Result<ApiResponse> {
        self.send(endpoint.method(), endpoint, node, body).await
    }
}

// ============================================
// Download
// ============================================

/// Result of a completed firmware fetch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Download {
    /// Final location of the image
    pub path: PathBuf,
    /// Bytes written
    pub bytes: u64,
}

// ============================================
// FirmwareSource Trait
// ============================================

/// Abstract interface for fetching firmware images.
///
/// # Contract
/// - Any file already at `dest` is removed before the fetch starts
/// - Bytes go to a `.partial` sibling and are renamed to `dest` only
///   after the whole body was written
/// - On error, `dest` does not exist
#[async_trait]
pub trait FirmwareSource: Send + Sync {
    /// Fetches `url` into `dest`.
    ///
    /// # Errors
    /// Returns a `TransportError` on network failure, a non-200 status,
    /// or local I/O failure.
    async fn fetch(&self, url: &str, dest: &Path) -> Result<Download>;
}
