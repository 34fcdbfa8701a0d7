// ============================================
// File: crates/otafleet-client/src/config.rs
// ============================================
//! # Client Configuration
//!
//! ## Creation Reason
//! Provides configuration management for the update client, loaded from
//! a TOML file with defaults for every field.
//!
//! ## Configuration Sections
//! - `server`: Control server address, TLS, request timeout
//! - `fleet`: Device type, node prefix, concurrency, retry policy
//! - `storage`: Firmware, install and outcome-log locations
//! - `install`: Flasher behavior and post-install verification
//! - `logging`: Log level
//!
//! ## Example Configuration
//! ```toml
//! [server]
//! host = "192.168.0.105"
//! port = 3000
//! api_base_path = "/api"
//! accept_invalid_certs = true
//! request_timeout_secs = 30
//!
//! [fleet]
//! device_type = "n100"
//! node_prefix = "a"
//! max_concurrent_sessions = 4
//!
//! [storage]
//! firmware_dir = "/var/lib/otafleet/firmware"
//! outcome_csv = "/var/lib/otafleet/update_times.csv"
//!
//! [install]
//! simulated_duration_ms = 10000
//! ```
//!
//! ## ⚠️ Important Note for Next Developer
//! - A missing config file is not an error: defaults are used and the
//!   caller decides whether to warn. A file that exists but does not parse
//!   IS an error.
//! - Validate config before building any transport
//!
//! ## Last Modified
//! v0.1.0 - Initial configuration implementation

use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::info;

use otafleet_common::{NodeId, NodeRange};
use otafleet_transport::TransportConfig;

use crate::error::{ClientError, Result};

/// Upper bound for `fleet.max_concurrent_sessions`.
pub const MAX_CONCURRENT_SESSIONS: usize = 256;

// ============================================
// ClientConfig
// ============================================

/// Main client configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Control server configuration.
    #[serde(default)]
    pub server: ServerConfig,

    /// Fleet configuration.
    #[serde(default)]
    pub fleet: FleetConfig,

    /// Storage locations.
    #[serde(default)]
    pub storage: StorageConfig,

    /// Installer configuration.
    #[serde(default)]
    pub install: InstallConfig,

    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl ClientConfig {
    /// Loads configuration from a TOML file.
    ///
    /// Falls back to defaults if the file does not exist.
    ///
    /// # Errors
    /// Returns error if the file cannot be read or parsed, or fails validation.
    pub async fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let path_str = path.display().to_string();

        info!("Loading configuration from: {}", path_str);

        let content = match tokio::fs::read_to_string(path).await {
            Ok(content) => content,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                let config = Self::default();
                config.validate()?;
                return Ok(config);
            }
            Err(e) => return Err(ClientError::config_load(&path_str, e.to_string())),
        };

        let config: Self = toml::from_str(&content)
            .map_err(|e| ClientError::config_load(&path_str, e.to_string()))?;

        config.validate()?;

        info!("Configuration loaded successfully");
        Ok(config)
    }

    /// Loads configuration from a string (useful for testing).
    ///
    /// # Errors
    /// Returns error if the content cannot be parsed or fails validation.
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content)
            .map_err(|e| ClientError::config_load("<string>", e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Validates the configuration.
    ///
    /// # Errors
    /// Returns `ClientError::ConfigInvalid` naming the first bad field.
    pub fn validate(&self) -> Result<()> {
        self.server.validate()?;
        self.fleet.validate()?;
        Ok(())
    }

    /// Serializes configuration to TOML string.
    #[must_use]
    pub fn to_toml(&self) -> String {
        toml::to_string_pretty(self).unwrap_or_default()
    }

    // ========================================
    // Derived settings
    // ========================================

    /// Transport settings for the control plane and the downloader.
    #[must_use]
    pub fn transport(&self) -> TransportConfig {
        TransportConfig {
            host: self.server.host.clone(),
            port: self.server.port,
            api_base_path: self.server.api_base_path.clone(),
            use_tls: self.server.use_tls,
            accept_invalid_certs: self.server.accept_invalid_certs,
            ca_cert_path: self.server.ca_cert_path.clone(),
            request_timeout: self.request_timeout(),
        }
    }

    /// Timeout applied to every network call.
    #[must_use]
    pub const fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.server.request_timeout_secs)
    }

    /// Node range `[start, end)` under the configured prefix.
    ///
    /// # Errors
    /// Returns an error if the range is inverted.
    pub fn node_range(&self, start: u32, end: u32) -> Result<NodeRange> {
        Ok(NodeRange::new(&self.fleet.node_prefix, start, end)?)
    }
}

// ============================================
// ServerConfig
// ============================================

/// Control server section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Host name or address.
    #[serde(default = "default_host")]
    pub host: String,

    /// Port.
    #[serde(default = "default_port")]
    pub port: u16,

    /// API path prefix.
    #[serde(default = "default_api_base_path")]
    pub api_base_path: String,

    /// Use https.
    #[serde(default = "default_true")]
    pub use_tls: bool,

    /// Skip certificate validation (self-signed lab servers).
    #[serde(default)]
    pub accept_invalid_certs: bool,

    /// Extra trusted root certificate (PEM).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ca_cert_path: Option<PathBuf>,

    /// Per-request timeout in seconds.
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

fn default_host() -> String {
    "localhost".to_string()
}

fn default_port() -> u16 {
    3000
}

fn default_api_base_path() -> String {
    "/api".to_string()
}

fn default_true() -> bool {
    true
}

fn default_request_timeout() -> u64 {
    30
}

impl ServerConfig {
    fn validate(&self) -> Result<()> {
        if self.host.trim().is_empty() {
            return Err(ClientError::config_invalid("server.host", "cannot be empty"));
        }
        if self.port == 0 {
            return Err(ClientError::config_invalid("server.port", "cannot be 0"));
        }
        if !self.api_base_path.starts_with('/') {
            return Err(ClientError::config_invalid(
                "server.api_base_path",
                "must start with '/'",
            ));
        }
        if self.request_timeout_secs == 0 {
            return Err(ClientError::config_invalid(
                "server.request_timeout_secs",
                "must be greater than 0",
            ));
        }
        Ok(())
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            api_base_path: default_api_base_path(),
            use_tls: true,
            accept_invalid_certs: false,
            ca_cert_path: None,
            request_timeout_secs: default_request_timeout(),
        }
    }
}

// ============================================
// FleetConfig
// ============================================

/// Fleet section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FleetConfig {
    /// Device type sent in the `deviceType` header.
    #[serde(default = "default_device_type")]
    pub device_type: String,

    /// Prefix node ids are built from.
    #[serde(default = "default_node_prefix")]
    pub node_prefix: String,

    /// Sessions allowed to run at once.
    #[serde(default = "default_max_concurrent_sessions")]
    pub max_concurrent_sessions: usize,

    /// Attempts per node before its failure is recorded.
    #[serde(default = "default_max_session_attempts")]
    pub max_session_attempts: u32,

    /// Pause between attempts, in seconds.
    #[serde(default = "default_retry_delay")]
    pub retry_delay_secs: u64,
}

fn default_device_type() -> String {
    "n100".to_string()
}

fn default_node_prefix() -> String {
    "a".to_string()
}

fn default_max_concurrent_sessions() -> usize {
    4
}

fn default_max_session_attempts() -> u32 {
    1
}

fn default_retry_delay() -> u64 {
    5
}

impl FleetConfig {
    fn validate(&self) -> Result<()> {
        let device_type = self.device_type.trim();
        if device_type.is_empty() || !device_type.chars().all(|c| c.is_ascii_graphic()) {
            return Err(ClientError::config_invalid(
                "fleet.device_type",
                "must be non-empty printable ASCII",
            ));
        }
        if NodeId::new(format!("{}0", self.node_prefix)).is_err() {
            return Err(ClientError::config_invalid(
                "fleet.node_prefix",
                format!("'{}' does not form valid node ids", self.node_prefix),
            ));
        }
        if self.max_concurrent_sessions == 0 || self.max_concurrent_sessions > MAX_CONCURRENT_SESSIONS {
            return Err(ClientError::config_invalid(
                "fleet.max_concurrent_sessions",
                format!("must be between 1 and {MAX_CONCURRENT_SESSIONS}"),
            ));
        }
        if self.max_session_attempts == 0 {
            return Err(ClientError::config_invalid(
                "fleet.max_session_attempts",
                "must be at least 1",
            ));
        }
        Ok(())
    }

    /// Pause between attempts.
    #[must_use]
    pub const fn retry_delay(&self) -> Duration {
        Duration::from_secs(self.retry_delay_secs)
    }
}

impl Default for FleetConfig {
    fn default() -> Self {
        Self {
            device_type: default_device_type(),
            node_prefix: default_node_prefix(),
            max_concurrent_sessions: default_max_concurrent_sessions(),
            max_session_attempts: default_max_session_attempts(),
            retry_delay_secs: default_retry_delay(),
        }
    }
}

// ============================================
// StorageConfig
// ============================================

/// Storage section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Where downloaded images are written, one file per node.
    #[serde(default = "default_firmware_dir")]
    pub firmware_dir: PathBuf,

    /// Where the simulated flasher places installed images.
    #[serde(default = "default_install_dir")]
    pub install_dir: PathBuf,

    /// CSV outcome log.
    #[serde(default = "default_outcome_csv")]
    pub outcome_csv: PathBuf,

    /// Keep the downloaded image after a successful session.
    #[serde(default)]
    pub keep_firmware: bool,
}

fn default_firmware_dir() -> PathBuf {
    PathBuf::from("/var/lib/otafleet/firmware")
}

fn default_install_dir() -> PathBuf {
    PathBuf::from("/var/lib/otafleet/installed")
}

fn default_outcome_csv() -> PathBuf {
    PathBuf::from("/var/lib/otafleet/update_times.csv")
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            firmware_dir: default_firmware_dir(),
            install_dir: default_install_dir(),
            outcome_csv: default_outcome_csv(),
            keep_firmware: false,
        }
    }
}

// ============================================
// InstallConfig
// ============================================

/// Installer section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstallConfig {
    /// How long the simulated flash takes, in milliseconds.
    #[serde(default = "default_simulated_duration")]
    pub simulated_duration_ms: u64,

    /// Re-digest and re-verify the installed image.
    #[serde(default = "default_true")]
    pub post_verify: bool,
}

fn default_simulated_duration() -> u64 {
    10_000
}

impl InstallConfig {
    /// Simulated flash duration.
    #[must_use]
    pub const fn simulated_duration(&self) -> Duration {
        Duration::from_millis(self.simulated_duration_ms)
    }
}

impl Default for InstallConfig {
    fn default() -> Self {
        Self {
            simulated_duration_ms: default_simulated_duration(),
            post_verify: true,
        }
    }
}

// ============================================
// LoggingConfig
// ============================================

/// Logging configuration section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub level: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

// ============================================
// Tests
// ============================================
