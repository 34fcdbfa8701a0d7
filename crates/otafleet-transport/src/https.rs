// ============================================
// File: crates/otafleet-transport/src/https.rs
// ============================================
//! # HTTPS Control Plane
//!
//! ## Creation Reason
//! Production `ControlPlane`: one authenticated JSON request per call over
//! HTTPS, using reqwest with rustls.
//!
//! ## Main Logical Flow
//! 1. Build `{base_url}{endpoint.path()}`
//! 2. Attach `nodeId` / `deviceType` headers
//! 3. Serialize the body (if any) as `application/json`
//! 4. Send, read the full reply, parse it with `ApiResponse::parse`
//!
//! ## ⚠️ Important Note for Next Developer
//! - Idle connections are never pooled, so every call opens a fresh
//!   connection and does a fresh TLS handshake
//! - The HTTP status is recorded but never interpreted here; application
//!   meaning comes from the body
//! - `accept_invalid_certs` exists for lab servers with self-signed
//!   certificates; prefer `ca_cert_path` everywhere else
//!
//! ## Last Modified
//! v0.1.0 - Initial HTTPS transport

use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use reqwest::{Client, ClientBuilder};
use serde_json::Value;
use tracing::debug;

use otafleet_common::NodeIdentity;
use otafleet_core::protocol::{HEADER_DEVICE_TYPE, HEADER_NODE_ID};
use otafleet_core::{ApiResponse, Endpoint, Method};

use crate::error::{Result, TransportError};
use crate::traits::ControlPlane;

// ============================================
// TransportConfig
// ============================================

/// Settings for talking to the control server and fetching firmware.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportConfig {
    /// Control server host name or address
    pub host: String,
    /// Control server port
    pub port: u16,
    /// Path prefix of the API, e.g. `/api`
    pub api_base_path: String,
    /// `https` when true, `http` otherwise
    pub use_tls: bool,
    /// Skip certificate validation
    pub accept_invalid_certs: bool,
    /// Extra PEM root certificate to trust
    pub ca_cert_path: Option<PathBuf>,
    /// Bound on a whole control-plane call; for downloads, on a stalled read
    pub request_timeout: Duration,
}

impl TransportConfig {
    /// Returns `{scheme}://{host}:{port}{api_base_path}`.
    #[must_use]
    pub fn base_url(&self) -> String {
        let scheme = if self.use_tls { "https" } else { "http" };
        format!(
            "{scheme}://{}:{}{}",
            self.host,
            self.port,
            self.api_base_path.trim_end_matches('/')
        )
    }

    /// Builds the control-plane client: `request_timeout` bounds each whole
    /// call, body included.
    ///
    /// Connections are not kept alive between calls.
    ///
    /// # Errors
    /// Returns `TransportError::InvalidConfig` if the CA certificate cannot
    /// be read or parsed, or the client cannot be built.
    pub fn build_client(&self) -> Result<Client> {
        self.finish(self.builder().timeout(self.request_timeout))
    }

    /// Builds the firmware download client. `request_timeout` bounds the
    /// connect and each read, never the whole transfer, so images of any
    /// size come through as long as bytes keep arriving.
    ///
    /// # Errors
    /// Same as [`TransportConfig::build_client`].
    pub fn build_download_client(&self) -> Result<Client> {
        self.finish(
            self.builder()
                .connect_timeout(self.request_timeout)
                .read_timeout(self.request_timeout),
        )
    }

    fn builder(&self) -> ClientBuilder {
        Client::builder()
            .pool_max_idle_per_host(0)
            .danger_accept_invalid_certs(self.accept_invalid_certs)
    }

    fn finish(&self, mut builder: ClientBuilder) -> Result<Client> {

        if let Some(path) = &self.ca_cert_path {
            let pem = std::fs::read(path).map_err(|e| {
                TransportError::invalid_config("ca_cert_path", format!("{}: {e}", path.display()))
            })?;
            let cert = reqwest::Certificate::from_pem(&pem)
                .map_err(|e| TransportError::invalid_config("ca_cert_path", e.to_string()))?;
            builder = builder.add_root_certificate(cert);
        }

        builder
            .build()
            .map_err(|e| TransportError::invalid_config("http_client", e.to_string()))
    }
}

// ============================================
// HttpsControlPlane
// ============================================

/// reqwest-backed `ControlPlane`.
pub struct HttpsControlPlane {
    http: Client,
    base_url: String,
}

impl HttpsControlPlane {
    /// Creates a control plane client.
    ///
    /// # Errors
    /// See [`TransportConfig::build_client`].
    pub fn new(config: &TransportConfig) -> Result<Self> {
        Ok(Self {
            http: config.build_client()?,
            base_url: config.base_url(),
        })
    }

    /// Base URL every endpoint path is appended to.
    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

impl std::fmt::Debug for HttpsControlPlane {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpsControlPlane")
            .field("base_url", &self.base_url)
            .finish()
    }
}

#[async_trait]
impl ControlPlane for HttpsControlPlane {
    async fn send(
        &self,
        method: Method,
        endpoint: Endpoint,
        node: &NodeIdentity,
        body: Option<&Value>,
    ) -> Result<ApiResponse> {
        let url = format!("{}{}", self.base_url, endpoint.path());
        let method = match method {
            Method::Get => reqwest::Method::GET,
            Method::Post => reqwest::Method::POST,
        };

        let mut request = self
            .http
            .request(method, &url)
            .header(HEADER_NODE_ID, node.node_id().as_str())
            .header(HEADER_DEVICE_TYPE, node.device_type());

        if let Some(body) = body {
            let bytes = serde_json::to_vec(body).map_err(|e| TransportError::Send {
                target: url.clone(),
                reason: e.to_string(),
            })?;
            request = request.header(CONTENT_TYPE, "application/json").body(bytes);
        }

        debug!("[{}] → {}", node.node_id(), url);

        let response = request
            .send()
            .await
            .map_err(|e| TransportError::from_send(&url, &e))?;

        let status = response.status().as_u16();
        let raw = response
            .bytes()
            .await
            .map_err(|e| TransportError::from_receive(&url, &e))?;

        let parsed = ApiResponse::parse(Some(status), &raw);
        debug!("[{}] ← {} {}", node.node_id(), status, parsed.body());
        Ok(parsed)
    }
}

// ============================================
// Tests
// ============================================

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use otafleet_common::NodeId;
    use serde_json::json;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;
    use tokio::task::JoinHandle;

    /// Serves exactly one plain-HTTP response and returns the raw request.
    pub(crate) async fn serve_once(
        status_line: &'static str,
        body: Vec<u8>,
    ) -> (u16, JoinHandle<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();

        let handle = tokio::spawn(async move {
            let (mut stream, _) = listener.accept().await.unwrap();
            let request = read_request(&mut stream).await;

            let head = format!(
                "HTTP/1.1 {status_line}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
                body.len()
            );
            stream.write_all(head.as_bytes()).await.unwrap();
            stream.write_all(&body).await.unwrap();
            stream.shutdown().await.ok();
            request
        });

        (port, handle)
    }

    pub(crate) async fn read_request(stream: &mut tokio::net::TcpStream) -> String {
        let mut buf = Vec::new();
        let mut chunk = [0u8; 1024];
        loop {
            let n = stream.read(&mut chunk).await.unwrap();
            if n == 0 {
                break;
            }
            buf.extend_from_slice(&chunk[..n]);

            let text = String::from_utf8_lossy(&buf).to_string();
            if let Some(end) = text.find("\r\n\r\n") {
                let content_length = text[..end]
                    .lines()
                    .find_map(|l| {
                        let (k, v) = l.split_once(':')?;
                        k.eq_ignore_ascii_case("content-length")
                            .then(|| v.trim().parse::<usize>().ok())?
                    })
                    .unwrap_or(0);
                if buf.len() >= end + 4 + content_length {
                    break;
                }
            }
        }
        String::from_utf8_lossy(&buf).to_string()
    }

    pub(crate) fn plain_config(port: u16) -> TransportConfig {
        TransportConfig {
            host: "127.0.0.1".into(),
            port,
            api_base_path: "/api".into(),
            use_tls: false,
            accept_invalid_certs: false,
            ca_cert_path: None,
            request_timeout: Duration::from_secs(5),
        }
    }

    fn node() -> NodeIdentity {
        NodeIdentity::new(NodeId::new("a7").unwrap(), "n100").unwrap()
    }

    #[test]
    fn test_base_url() {
        let mut config = plain_config(3000);
        config.host = "192.168.0.105".into();
        assert_eq!(config.base_url(), "http://192.168.0.105:3000/api");

        config.use_tls = true;
        config.api_base_path = "/api/".into();
        assert_eq!(config.base_url(), "https://192.168.0.105:3000/api");
    }

    #[test]
    fn test_missing_ca_cert_is_config_error() {
        let mut config = plain_config(3000);
        config.ca_cert_path = Some("/nonexistent/otafleet/ca.pem".into());
        let err = HttpsControlPlane::new(&config).unwrap_err();
        assert!(matches!(err, TransportError::InvalidConfig { .. }));
    }

    #[tokio::test]
    async fn test_send_sets_auth_headers_and_json_body() {
        let (port, server) =
            serve_once("200 OK", br#"{"currentVersion":"1.0"}"#.to_vec()).await;
        let control = HttpsControlPlane::new(&plain_config(port)).unwrap();

        let body = json!({"nodeId": "a7"});
        let resp = control
            .send(Method::Post, Endpoint::GetCurrentVersion, &node(), Some(&body))
            .await
            .unwrap();

        assert_eq!(resp.http_status(), Some(200));
        assert_eq!(resp.str_field("currentVersion"), Some("1.0"));

        let request = server.await.unwrap();
        let lower = request.to_ascii_lowercase();
        assert!(request.starts_with("POST /api/getCurrentVersion HTTP/1.1"));
        assert!(lower.contains("nodeid: a7\r\n"));
        assert!(lower.contains("devicetype: n100\r\n"));
        assert!(lower.contains("content-type: application/json\r\n"));
        assert!(lower.contains("content-length: 14\r\n"));
        assert!(request.ends_with(r#"{"nodeId":"a7"}"#));
    }

    #[tokio::test]
    async fn test_non_json_reply_becomes_sentinel() {
        let (port, server) = serve_once("502 Bad Gateway", b"<html>oops</html>".to_vec()).await;
        let control = HttpsControlPlane::new(&plain_config(port)).unwrap();

        let resp = control
            .call(Endpoint::RegisterNode, &node(), None)
            .await
            .unwrap();
        assert!(resp.is_invalid_json());
        assert_eq!(resp.http_status(), Some(502));
        server.await.unwrap();
    }

    #[tokio::test]
    async fn test_error_body_is_not_transport_error() {
        let (port, server) =
            serve_once("500 Internal Server Error", br#"{"error":"db down"}"#.to_vec()).await;
        let control = HttpsControlPlane::new(&plain_config(port)).unwrap();

        let resp = control
            .call(Endpoint::CheckForUpdate, &node(), Some(&json!({})))
            .await
            .unwrap();
        assert_eq!(resp.error(), Some("db down"));
        server.await.unwrap();
    }

    #[tokio::test]
    async fn test_connection_refused() {
        let port = {
            let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
            listener.local_addr().unwrap().port()
        };
        let control = HttpsControlPlane::new(&plain_config(port)).unwrap();

        let err = control
            .call(Endpoint::RegisterNode, &node(), None)
            .await
            .unwrap_err();
        assert!(matches!(err, TransportError::Connect { .. }), "got {err:?}");
    }

    #[tokio::test]
    async fn test_silent_server_times_out() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let server = tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            tokio::time::sleep(Duration::from_secs(2)).await;
            drop(stream);
        });

        let mut config = plain_config(port);
        config.request_timeout = Duration::from_millis(200);
        let control = HttpsControlPlane::new(&config).unwrap();

        let err = control
            .call(Endpoint::SubmitUpdate, &node(), Some(&json!({})))
            .await
            .unwrap_err();
        assert!(err.is_timeout(), "got {err:?}");
        server.abort();
    }
}
