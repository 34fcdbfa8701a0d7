// ============================================
// File: crates/otafleet-client/src/control.rs
// ============================================
//! # Control API Client
//!
//! Typed wrapper over a `ControlPlane`: one method per endpoint, each
//! building the request body and classifying the reply.

use std::sync::Arc;

use serde::Serialize;
use serde_json::Value;

use otafleet_common::NodeIdentity;
use otafleet_core::protocol::{
    parse_current_version, Acknowledgement, CheckForUpdateRequest, CurrentVersionRequest,
    RegisterNodeRequest, Registration, SubmitUpdateRequest, UpdateCheck, VerifyFirmwareRequest,
};
use otafleet_core::{ApiResponse, Endpoint};
use otafleet_transport::ControlPlane;

use crate::error::{ClientError, Result};

/// Typed control-server API.
#[derive(Clone)]
pub struct ControlClient {
    plane: Arc<dyn ControlPlane>,
}

impl ControlClient {
    /// Wraps a control plane.
    pub fn new(plane: Arc<dyn ControlPlane>) -> Self {
        Self { plane }
    }

    async fn post<T: Serialize>(
        &self,
        endpoint: Endpoint,
        node: &NodeIdentity,
        body: &T,
    ) -> Result<ApiResponse> {
        let body: Value = serde_json::to_value(body)
            .map_err(|e| ClientError::internal(format!("encoding {endpoint} body: {e}")))?;
        Ok(self.plane.call(endpoint, node, Some(&body)).await?)
    }

    /// `POST /registerNode`.
    pub async fn register(&self, node: &NodeIdentity) -> Result<Registration> {
        let body = RegisterNodeRequest {
            node_id: node.node_id().to_string(),
            device_type: node.device_type().to_string(),
        };
        let resp = self.post(Endpoint::RegisterNode, node, &body).await?;
        Ok(Registration::classify(&resp))
    }

    /// `POST /getCurrentVersion`.
    pub async fn current_version(&self, node: &NodeIdentity) -> Result<String> {
        let body = CurrentVersionRequest {
            node_id: node.node_id().to_string(),
        };
        let resp = self.post(Endpoint::GetCurrentVersion, node, &body).await?;
        Ok(parse_current_version(&resp)?)
    }

    /// `POST /checkForUpdate`.
    pub async fn check_for_update(
        &self,
        node: &NodeIdentity,
        current_version: &str,
    ) -> Result<UpdateCheck> {
        let body = CheckForUpdateRequest {
            node_id: node.node_id().to_string(),
            current_version: current_version.to_string(),
        };
        let resp = self.post(Endpoint::CheckForUpdate, node, &body).await?;
        Ok(UpdateCheck::classify(&resp)?)
    }

    /// `POST /verifyFirmware`.
    pub async fn verify_firmware(
        &self,
        node: &NodeIdentity,
        version: &str,
        digest: &str,
    ) -> Result<Acknowledgement> {
        let body = VerifyFirmwareRequest {
            node_id: node.node_id().to_string(),
            firmware_version: version.to_string(),
            firmware_hash: digest.to_string(),
        };
        let resp = self.post(Endpoint::VerifyFirmware, node, &body).await?;
        Ok(Acknowledgement::from_verify(&resp))
    }

    /// `POST /submitUpdate`.
    pub async fn submit_update(&self, node: &NodeIdentity, version: &str) -> Result<Acknowledgement> {
        let body = SubmitUpdateRequest {
            node_id: node.node_id().to_string(),
            firmware_version: version.to_string(),
        };
        let resp = self.post(Endpoint::SubmitUpdate, node, &body).await?;
        Ok(Acknowledgement::from_submit(&resp))
    }
}

impl std::fmt::Debug for ControlClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ControlClient").finish_non_exhaustive()
    }
}
