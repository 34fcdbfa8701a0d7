// ============================================
// File: crates/otafleet-transport/src/mock.rs
// ============================================
//! # Mock Transports
//!
//! ## Creation Reason
//! Drives the update session in tests without a control server or a
//! firmware host.
//!
//! ## Main Functionality
//! - `MockControlPlane`: Replies come from a handler closure; every call
//!   is recorded
//! - `MockFirmwareSource`: Serves images from an in-memory URL map using
//!   the same `.partial` + rename steps as the real downloader
//!
//! ## Usage in Tests
//! ```ignore
//! use otafleet_transport::mock::MockControlPlane;
//! use otafleet_core::{ApiResponse, Endpoint};
//! use serde_json::json;
//!
//! let control = MockControlPlane::new(|endpoint, _node, _body| {
//!     Ok(match endpoint {
//!         Endpoint::GetCurrentVersion => ApiResponse::from_json(json!({"currentVersion": "1.0"})),
//!         _ => ApiResponse::from_json(json!({"updateAvailable": false})),
//!     })
//! });
//! assert_eq!(control.call_count(), 0);
//! ```
//!
//! ## ⚠️ Important Note for Next Developer
//! - This is for testing only - do not use in production
//!
//! ## Last Modified
//! v0.1.0 - Initial mock implementation

use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::{json, Value};

use otafleet_common::{NodeId, NodeIdentity};
use otafleet_core::protocol::{FIRMWARE_UPDATED_MESSAGE, REGISTERED_MESSAGE};
use otafleet_core::{ApiResponse, Endpoint, FirmwareDescriptor, Method};

use crate::download::{begin_fetch, finish_fetch};
use crate::error::{Result, TransportError};
use crate::traits::{ControlPlane, Download, FirmwareSource};

// ============================================
// MockControlPlane
// ============================================

type Handler =
    dyn Fn(Endpoint, &NodeIdentity, Option<&Value>) -> Result<ApiResponse> + Send + Sync;

/// One recorded control-plane call.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedCall {
    /// Method used
    pub method: Method,
    /// Endpoint called
    pub endpoint: Endpoint,
    /// Node the call was made for
    pub node_id: NodeId,
    /// Request body
    pub body: Option<Value>,
}

/// Mock control server.
pub struct MockControlPlane {
    handler: Box<Handler>,
    calls: Mutex<Vec<RecordedCall>>,
}

impl MockControlPlane {
    /// Creates a mock that answers with `handler`.
    pub fn new<F>(handler: F) -> Self
    where
        F: Fn(Endpoint, &NodeIdentity, Option<&Value>) -> Result<ApiResponse>
            + Send
            + Sync
            + 'static,
    {
        Self {
            handler: Box::new(handler),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// A server on which every node is at `current` and `target` is available.
    ///
    /// Registration, verification and submission all succeed.
    #[must_use]
    pub fn happy_path(current: &str, target: FirmwareDescriptor) -> Self {
        let current = current.to_string();
        Self::new(move |endpoint, _node, _body| {
            Ok(ApiResponse::from_json(match endpoint {
                Endpoint::RegisterNode => json!({"message": REGISTERED_MESSAGE}),
                Endpoint::GetCurrentVersion => json!({"currentVersion": current}),
                Endpoint::CheckForUpdate => json!({
                    "updateAvailable": true,
                    "firmwareInfo": target,
                }),
                Endpoint::VerifyFirmware => json!({"verified": true}),
                Endpoint::SubmitUpdate => json!({"message": FIRMWARE_UPDATED_MESSAGE}),
            }))
        })
    }

    /// All calls so far, in order.
    #[must_use]
    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().clone()
    }

    /// Total number of calls.
    #[must_use]
    pub fn call_count(&self) -> usize {
        self.calls.lock().len()
    }

    /// Number of calls made to `endpoint`.
    #[must_use]
    pub fn count(&self, endpoint: Endpoint) -> usize {
        self.calls
            .lock()
            .iter()
            .filter(|c| c.endpoint == endpoint)
            .count()
    }

    /// Number of calls made to `endpoint` for `node_id`.
    #[must_use]
    pub fn count_for(&self, endpoint: Endpoint, node_id: &str) -> usize {
        self.calls
            .lock()
            .iter()
            .filter(|c| c.endpoint == endpoint && c.node_id.as_str() == node_id)
            .count()
    }
}

impl std::fmt::Debug for MockControlPlane {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockControlPlane")
            .field("calls", &self.call_count())
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl ControlPlane for MockControlPlane {
    async fn send(
        &self,
        method: Method,
        endpoint: Endpoint,
        node: &NodeIdentity,
        body: Option<&Value>,
    ) -> Result<ApiResponse> {
        self.calls.lock().push(RecordedCall {
            method,
            endpoint,
            node_id: node.node_id().clone(),
            body: body.cloned(),
        });
        (self.handler)(endpoint, node, body)
    }
}

// ============================================
// MockFirmwareSource
// ============================================

#[derive(Debug, Clone)]
enum Served {
    Image(Vec<u8>),
    Status(u16),
}

/// Mock firmware host.
#[derive(Debug, Default)]
pub struct MockFirmwareSource {
    served: Mutex<HashMap<String, Served>>,
    fetches: AtomicUsize,
}

impl MockFirmwareSource {
    /// Creates an empty host; every URL answers 404.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Serves `bytes` at `url`.
    #[must_use]
    pub fn with_image(self, url: impl Into<String>, bytes: impl Into<Vec<u8>>) -> Self {
        self.served
            .lock()
            .insert(url.into(), Served::Image(bytes.into()));
        self
    }

    /// Answers `url` with a non-200 status.
    #[must_use]
    pub fn with_status(self, url: impl Into<String>, status: u16) -> Self {
        self.served.lock().insert(url.into(), Served::Status(status));
        self
    }

    /// Number of fetches attempted.
    #[must_use]
    pub fn fetch_count(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl FirmwareSource for MockFirmwareSource {
    async fn fetch(&self, url: &str, dest: &Path) -> Result<Download> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        let served = self.served.lock().get(url).cloned();

        let partial = begin_fetch(dest).await?;
        match served {
            Some(Served::Image(bytes)) => {
                tokio::fs::write(&partial, &bytes)
                    .await
                    .map_err(|e| TransportError::io(partial.display().to_string(), e))?;
                finish_fetch(&partial, dest, bytes.len() as u64).await
            }
            Some(Served::Status(status)) => Err(TransportError::HttpStatus {
                target: url.to_string(),
                status,
            }),
            None => Err(TransportError::HttpStatus {
                target: url.to_string(),
                status: 404,
            }),
        }
    }
}

// ============================================
// Tests
// ============================================
