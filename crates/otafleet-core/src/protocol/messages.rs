// ============================================
// File: crates/otafleet-core/src/protocol/messages.rs
// ============================================
//! # Protocol Messages
//!
//! ## Main Data Structures
//! - Request bodies: `RegisterNodeRequest`, `CurrentVersionRequest`,
//!   `CheckForUpdateRequest`, `VerifyFirmwareRequest`, `SubmitUpdateRequest`
//! - `ApiResponse`: Parsed reply body plus HTTP status
//! - `FirmwareDescriptor`: Server-issued update target
//!
//! ## ⚠️ Important Note for Next Developer
//! - `ApiResponse::parse` never fails; bodies that are not JSON become the
//!   `{status: "error", message: "Invalid JSON response"}` sentinel
//! - Accessors return `None` on a missing field OR a field of the wrong
//!   type; callers treat both the same way
//!
//! ## Last Modified
//! v0.1.0 - Initial message definitions

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use super::INVALID_JSON_MESSAGE;

// ============================================
// Request Bodies
// ============================================

/// Body of `POST /registerNode`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterNodeRequest {
    /// Node identifier
    pub node_id: String,
    /// Device type of the node
    pub device_type: String,
}

/// Body of `POST /getCurrentVersion`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CurrentVersionRequest {
    /// Node identifier
    pub node_id: String,
}

/// Body of `POST /checkForUpdate`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckForUpdateRequest {
    /// Node identifier
    pub node_id: String,
    /// Version currently recorded for the node
    pub current_version: String,
}

/// Body of `POST /verifyFirmware`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifyFirmwareRequest {
    /// Node identifier
    pub node_id: String,
    /// Version being verified
    pub firmware_version: String,
    /// Locally computed digest of the image
    pub firmware_hash: String,
}

/// Body of `POST /submitUpdate`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitUpdateRequest {
    /// Node identifier
    pub node_id: String,
    /// Version that was installed
    pub firmware_version: String,
}

// ============================================
// ApiResponse
// ============================================

/// A parsed control-server reply.
///
/// # Example
/// ```
/// use otafleet_core::ApiResponse;
///
/// let resp = ApiResponse::parse(Some(200), br#"{"currentVersion":"1.0"}"#);
/// assert_eq!(resp.str_field("currentVersion"), Some("1.0"));
///
/// let bad = ApiResponse::parse(Some(502), b"<html>Bad Gateway</html>");
/// assert_eq!(bad.status(), Some("error"));
/// assert_eq!(bad.message(), Some("Invalid JSON response"));
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct ApiResponse {
    http_status: Option<u16>,
    body: Value,
}

impl ApiResponse {
    /// Wraps an already-parsed JSON body.
    #[must_use]
    pub const fn from_json(body: Value) -> Self {
        Self {
            http_status: None,
            body,
        }
    }

    /// Parses a raw body, falling back to the invalid-JSON sentinel.
    #[must_use]
    pub fn parse(http_status: Option<u16>, raw: &[u8]) -> Self {
        match serde_json::from_slice::<Value>(raw) {
            Ok(body) => Self { http_status, body },
            Err(_) => Self::invalid_json().with_http_status(http_status),
        }
    }

    /// The sentinel returned when a body is not valid JSON.
    #[must_use]
    pub fn invalid_json() -> Self {
        Self::from_json(json!({
            "status": "error",
            "message": INVALID_JSON_MESSAGE,
        }))
    }

    /// Attaches an HTTP status code.
    #[must_use]
    pub fn with_http_status(mut self, status: Option<u16>) -> Self {
        self.http_status = status;
        self
    }

    /// HTTP status of the reply, if it came over HTTP.
    #[must_use]
    pub const fn http_status(&self) -> Option<u16> {
        self.http_status
    }

    /// Raw JSON body.
    #[must_use]
    pub const fn body(&self) -> &Value {
        &self.body
    }

    /// Returns a top-level field of an object body.
    #[must_use]
    pub fn field(&self, key: &str) -> Option<&Value> {
        self.body.as_object()?.get(key)
    }

    /// Returns a top-level string field.
    #[must_use]
    pub fn str_field(&self, key: &str) -> Option<&str> {
        self.field(key)?.as_str()
    }

    /// Returns a top-level boolean field.
    #[must_use]
    pub fn bool_field(&self, key: &str) -> Option<bool> {
        self.field(key)?.as_bool()
    }

    /// `status` field.
    #[must_use]
    pub fn status(&self) -> Option<&str> {
        self.str_field("status")
    }

    /// `message` field.
    #[must_use]
    pub fn message(&self) -> Option<&str> {
        self.str_field("message")
    }

    /// `details` field.
    #[must_use]
    pub fn details(&self) -> Option<&str> {
        self.str_field("details")
    }

    /// `error` field.
    #[must_use]
    pub fn error(&self) -> Option<&str> {
        self.str_field("error")
    }

    /// `true` if the body carries an explicit error signal.
    #[must_use]
    pub fn is_error(&self) -> bool {
        self.field("error").is_some() || self.status() == Some("error")
    }

    /// `true` if this is the invalid-JSON sentinel.
    #[must_use]
    pub fn is_invalid_json(&self) -> bool {
        self.status() == Some("error") && self.message() == Some(INVALID_JSON_MESSAGE)
    }

    /// Best human-readable description of the reply, for logs and outcomes.
    #[must_use]
    pub fn detail(&self) -> String {
        let text = [self.details(), self.error(), self.message(), self.status()]
            .into_iter()
            .flatten()
            .find(|s| !s.is_empty());

        match (text, self.http_status) {
            (Some(t), _) => t.to_string(),
            (None, Some(code)) => format!("HTTP {code}: {}", self.body),
            (None, None) => self.body.to_string(),
        }
    }
}

// ============================================
// FirmwareDescriptor
// ============================================

/// An update target issued by the control server.
///
/// Wire form: `{"version": .., "hash": .., "downloadUrl": ..}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FirmwareDescriptor {
    /// Target firmware version
    pub version: String,
    /// Server-declared hex digest of the image
    #[serde(rename = "hash")]
    pub expected_hash: String,
    /// Where to fetch the image from
    #[serde(rename = "downloadUrl")]
    pub download_url: String,
}

impl FirmwareDescriptor {
    /// Parses a `firmwareInfo` value.
    ///
    /// Returns `None` if it is not an object or any field is missing or empty.
    #[must_use]
    pub fn from_value(value: &Value) -> Option<Self> {
        let descriptor: Self = serde_json::from_value(value.clone()).ok()?;
        let complete = !descriptor.version.trim().is_empty()
            && !descriptor.expected_hash.trim().is_empty()
            && !descriptor.download_url.trim().is_empty();
        complete.then_some(descriptor)
    }
}

// ============================================
// Tests
// ============================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_bodies_are_camel_case() {
        let body = serde_json::to_value(VerifyFirmwareRequest {
            node_id: "a1".into(),
            firmware_version: "1.1".into(),
            firmware_hash: "ab".into(),
        })
        .unwrap();
        assert_eq!(
            body,
            json!({"nodeId": "a1", "firmwareVersion": "1.1", "firmwareHash": "ab"})
        );

        let body = serde_json::to_value(CheckForUpdateRequest {
            node_id: "a1".into(),
            current_version: "1.0".into(),
        })
        .unwrap();
        assert_eq!(body, json!({"nodeId": "a1", "currentVersion": "1.0"}));
    }

    #[test]
    fn test_invalid_json_sentinel() {
        for raw in [&b""[..], b"not json", b"{\"unterminated\": "] {
            let resp = ApiResponse::parse(Some(200), raw);
            assert!(resp.is_invalid_json());
            assert!(resp.is_error());
            assert_eq!(resp.http_status(), Some(200));
        }
    }

    #[test]
    fn test_non_object_body_has_no_fields() {
        let resp = ApiResponse::parse(Some(200), b"[1,2,3]");
        assert!(!resp.is_invalid_json());
        assert_eq!(resp.status(), None);
        assert_eq!(resp.field("anything"), None);
    }

    #[test]
    fn test_detail_prefers_details_field() {
        let resp = ApiResponse::from_json(json!({
            "error": "Failed to register node",
            "details": "Edge node a1 is already registered",
        }));
        assert_eq!(resp.detail(), "Edge node a1 is already registered");

        let resp = ApiResponse::parse(Some(500), b"{}");
        assert_eq!(resp.detail(), "HTTP 500: {}");
    }

    #[test]
    fn test_descriptor_parsing() {
        let value = json!({"version": "1.1", "hash": "abc", "downloadUrl": "https://x/fw.bin"});
        let d = FirmwareDescriptor::from_value(&value).unwrap();
        assert_eq!(d.version, "1.1");
        assert_eq!(d.expected_hash, "abc");
        assert_eq!(d.download_url, "https://x/fw.bin");

        assert!(FirmwareDescriptor::from_value(&json!({"version": "1.1"})).is_none());
        assert!(FirmwareDescriptor::from_value(
            &json!({"version": "", "hash": "abc", "downloadUrl": "u"})
        )
        .is_none());
        assert!(FirmwareDescriptor::from_value(&Value::Null).is_none());
    }
}
