// ============================================
// File: crates/otafleet-client/src/session/machine.rs
// ============================================
//! # Update Session
//!
//! ## Main Logical Flow
//! 1. Register the node (already-registered is fine)
//! 2. Query its current version; the stopwatch starts here
//! 3. Check for an update; stop here if there is none
//! 4. Download the image to the node's own file
//! 5. Digest it and compare against the declared digest
//! 6. Have the server confirm the digest
//! 7. Install, then re-digest and re-confirm the installed image
//! 8. Submit the new version
//!
//! ## ⚠️ Important Note for Next Developer
//! - Step 7's install is unreachable unless steps 5 AND 6 succeeded for
//!   the file produced by step 4 of this same session
//! - `run` never returns an error and never panics; every failure ends
//!   as `SessionEnd::Failed` with a `FailureReason`
//!
//! ## Last Modified
//! v0.1.0 - Initial session state machine

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, error, info, warn};

use otafleet_common::time::Stopwatch;
use otafleet_common::{NodeId, NodeIdentity};
use otafleet_core::integrity::{digest_file, verify};
use otafleet_core::protocol::{Acknowledgement, Registration, UpdateCheck};
use otafleet_core::FirmwareDescriptor;
use otafleet_transport::FirmwareSource;

use super::state::{FailureReason, SessionFailure, SessionState};
use crate::control::ControlClient;
use crate::installer::Flasher;

// ============================================
// Services & Settings
// ============================================

/// Collaborators a session uses. Shared by every session of a fleet.
#[derive(Clone)]
pub struct SessionServices {
    /// Control server API
    pub control: ControlClient,
    /// Firmware downloader
    pub firmware: Arc<dyn FirmwareSource>,
    /// Installer
    pub flasher: Arc<dyn Flasher>,
}

impl std::fmt::Debug for SessionServices {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionServices").finish_non_exhaustive()
    }
}

/// Per-session behavior switches.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionSettings {
    /// Directory holding `{node_id}.bin` downloads
    pub firmware_dir: PathBuf,
    /// Re-digest and re-confirm the installed image
    pub post_verify: bool,
    /// Leave the download on disk after the session
    pub keep_firmware: bool,
}

impl SessionSettings {
    /// `{firmware_dir}/{node_id}.bin`.
    #[must_use]
    pub fn firmware_path(&self, node_id: &NodeId) -> PathBuf {
        self.firmware_dir.join(format!("{node_id}.bin"))
    }
}

// ============================================
// SessionEnd / SessionReport
// ============================================

/// How a session ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEnd {
    /// New firmware installed and submitted.
    Updated,
    /// No update was needed.
    UpToDate,
    /// Session failed.
    Failed(SessionFailure),
}

/// Everything a finished session reports.
#[derive(Debug, Clone)]
pub struct SessionReport {
    /// Node the session ran for
    pub identity: NodeIdentity,
    /// How it ended
    pub end: SessionEnd,
    /// Target version on update paths, current version when up to date
    pub version: Option<String>,
    /// VersionQuery start to the terminal state
    pub duration: Duration,
    /// Every state the session went through, in order
    pub trace: Vec<SessionState>,
}

impl SessionReport {
    /// Final state.
    #[must_use]
    pub fn final_state(&self) -> SessionState {
        self.trace
            .last()
            .copied()
            .unwrap_or(SessionState::Registering)
    }
}

// ============================================
// UpdateSession
// ============================================

/// One node's pass through the update state machine.
pub struct UpdateSession {
    identity: NodeIdentity,
    services: SessionServices,
    settings: SessionSettings,
    state: SessionState,
    trace: Vec<SessionState>,
    stopwatch: Stopwatch,
    current_version: Option<String>,
    target_version: Option<String>,
    download: Option<PathBuf>,
}

type Step<T> = std::result::Result<T, SessionFailure>;

fn fail<E: ToString>(reason: FailureReason) -> impl FnOnce(E) -> SessionFailure {
    move |e| SessionFailure::new(reason, e)
}

impl UpdateSession {
    /// Creates a session in `Registering`.
    #[must_use]
    pub fn new(identity: NodeIdentity, services: SessionServices, settings: SessionSettings) -> Self {
        Self {
            identity,
            services,
            settings,
            state: SessionState::Registering,
            trace: vec![SessionState::Registering],
            stopwatch: Stopwatch::new(),
            current_version: None,
            target_version: None,
            download: None,
        }
    }

    /// Current state.
    #[must_use]
    pub const fn state(&self) -> SessionState {
        self.state
    }

    /// Runs the session to a terminal state.
    pub async fn run(mut self) -> SessionReport {
        let node = self.identity.node_id().clone();
        info!("[{}] Session started", node);

        let result = self.drive().await;
        let duration = self.stopwatch.elapsed();

        let end = match result {
            Ok(end) => end,
            Err(failure) => {
                self.advance(SessionState::Failed(failure.reason));
                error!("[{}] Session failed: {}", node, failure);
                SessionEnd::Failed(failure)
            }
        };

        self.cleanup().await;

        let version = match end {
            SessionEnd::UpToDate => self.current_version.take(),
            SessionEnd::Updated | SessionEnd::Failed(_) => self.target_version.take(),
        };

        info!(
            "[{}] Session finished in {} after {:.3}s",
            node,
            self.state,
            duration.as_secs_f64()
        );

        SessionReport {
            identity: self.identity,
            end,
            version,
            duration,
            trace: self.trace,
        }
    }

    fn advance(&mut self, next: SessionState) {
        debug_assert!(
            self.state.can_advance_to(&next),
            "illegal transition {} → {}",
            self.state,
            next
        );
        if !self.state.can_advance_to(&next) {
            error!(
                "[{}] Ignoring illegal transition {} → {}",
                self.identity.node_id(),
                self.state,
                next
            );
            return;
        }
        debug!("[{}] {} → {}", self.identity.node_id(), self.state, next);
        self.trace.push(next);
        self.state = next;
    }

    async fn drive(&mut self) -> Step<SessionEnd> {
        self.register().await?;

        self.advance(SessionState::VersionQuery);
        self.stopwatch.start();
        let current = self
            .services
            .control
            .current_version(&self.identity)
            .await
            .map_err(fail(FailureReason::VersionQueryError))?;
        info!("[{}] Current version {}", self.identity.node_id(), current);
        self.current_version = Some(current.clone());

        self.advance(SessionState::UpdateCheck);
        let check = self
            .services
            .control
            .check_for_update(&self.identity, &current)
            .await
            .map_err(fail(FailureReason::UpdateCheckError))?;

        let descriptor = match check {
            UpdateCheck::Available(descriptor) => descriptor,
            UpdateCheck::UpToDate => {
                info!("[{}] Up to date", self.identity.node_id());
                self.advance(SessionState::UpToDate);
                return Ok(SessionEnd::UpToDate);
            }
            UpdateCheck::AnnouncedWithoutDescriptor => {
                warn!(
                    "[{}] Update announced without firmware info; treating as up to date",
                    self.identity.node_id()
                );
                self.advance(SessionState::UpToDate);
                return Ok(SessionEnd::UpToDate);
            }
        };

        info!(
            "[{}] Update available: {} → {}",
            self.identity.node_id(),
            current,
            descriptor.version
        );
        self.target_version = Some(descriptor.version.clone());

        let image = self.download(&descriptor).await?;
        let digest = self.local_verify(&image, &descriptor.expected_hash).await?;
        self.remote_verify(&descriptor, &digest).await?;

        self.advance(SessionState::Installing);
        let installed = self
            .services
            .flasher
            .install(&image)
            .await
            .map_err(fail(FailureReason::InstallError))?;

        if self.settings.post_verify {
            self.advance(SessionState::PostVerify);
            let installed_digest = digest_file(&installed)
                .await
                .map_err(fail(FailureReason::HashMismatchPostInstall))?;
            if !verify(&installed_digest, &descriptor.expected_hash) {
                return Err(SessionFailure::new(
                    FailureReason::HashMismatchPostInstall,
                    format!(
                        "installed image digest {installed_digest} != expected {}",
                        descriptor.expected_hash
                    ),
                ));
            }
            self.confirm_digest(&descriptor, &installed_digest).await?;
        }

        self.submit(&descriptor.version).await?;
        self.advance(SessionState::Done);
        info!(
            "[{}] Updated to {}",
            self.identity.node_id(),
            descriptor.version
        );
        Ok(SessionEnd::Updated)
    }

    async fn register(&mut self) -> Step<()> {
        let registration = self
            .services
            .control
            .register(&self.identity)
            .await
            .map_err(fail(FailureReason::RegistrationError))?;

        match registration {
            Registration::Registered => {
                info!("[{}] Registered", self.identity.node_id());
                Ok(())
            }
            Registration::AlreadyRegistered => {
                info!("[{}] Already registered", self.identity.node_id());
                Ok(())
            }
            Registration::Rejected(detail) => Err(SessionFailure::new(
                FailureReason::RegistrationError,
                detail,
            )),
        }
    }

    async fn download(&mut self, descriptor: &FirmwareDescriptor) -> Step<PathBuf> {
        self.advance(SessionState::Downloading);
        let dest = self.settings.firmware_path(self.identity.node_id());
        self.download = Some(dest.clone());

        let download = self
            .services
            .firmware
            .fetch(&descriptor.download_url, &dest)
            .await
            .map_err(fail(FailureReason::DownloadError))?;
        debug!(
            "[{}] Downloaded {} bytes to {}",
            self.identity.node_id(),
            download.bytes,
            download.path.display()
        );
        Ok(download.path)
    }

    async fn local_verify(&mut self, image: &Path, expected: &str) -> Step<String> {
        self.advance(SessionState::LocalVerify);
        let digest = digest_file(image)
            .await
            .map_err(fail(FailureReason::HashMismatchLocal))?;
        if !verify(&digest, expected) {
            return Err(SessionFailure::new(
                FailureReason::HashMismatchLocal,
                format!("downloaded image digest {digest} != expected {expected}"),
            ));
        }
        debug!("[{}] Local digest ok: {}", self.identity.node_id(), digest);
        Ok(digest)
    }

    async fn remote_verify(&mut self, descriptor: &FirmwareDescriptor, digest: &str) -> Step<()> {
        self.advance(SessionState::RemoteVerify);
        self.confirm_digest(descriptor, digest).await
    }

    async fn confirm_digest(&self, descriptor: &FirmwareDescriptor, digest: &str) -> Step<()> {
        let ack = self
            .services
            .control
            .verify_firmware(&self.identity, &descriptor.version, digest)
            .await
            .map_err(fail(FailureReason::RemoteVerifyFailed))?;
        match ack {
            Acknowledgement::Accepted => Ok(()),
            Acknowledgement::Rejected(detail) => Err(SessionFailure::new(
                FailureReason::RemoteVerifyFailed,
                detail,
            )),
        }
    }

    async fn submit(&mut self, version: &str) -> Step<()> {
        self.advance(SessionState::Submitting);
        let ack = self
            .services
            .control
            .submit_update(&self.identity, version)
            .await
            .map_err(fail(FailureReason::SubmitError))?;
        match ack {
            Acknowledgement::Accepted => Ok(()),
            Acknowledgement::Rejected(detail) => {
                Err(SessionFailure::new(FailureReason::SubmitError, detail))
            }
        }
    }

    async fn cleanup(&mut self) {
        if self.settings.keep_firmware {
            return;
        }
        if let Some(path) = self.download.take() {
            match tokio::fs::remove_file(&path).await {
                Ok(()) => debug!("Removed {}", path.display()),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => warn!("Could not remove {}: {}", path.display(), e),
            }
        }
    }
}

impl std::fmt::Debug for UpdateSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UpdateSession")
            .field("identity", &self.identity)
            .field("state", &self.state)
            .finish_non_exhaustive()
    }
}

// ============================================
// Tests
// ============================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::installer::{InstallError, SimulatedFlasher};
    use async_trait::async_trait;
    use otafleet_core::protocol::{FIRMWARE_UPDATED_MESSAGE, REGISTERED_MESSAGE};
    use otafleet_core::{digest_bytes, ApiResponse, Endpoint};
    use otafleet_transport::mock::{MockControlPlane, MockFirmwareSource};
    use otafleet_transport::TransportError;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tempfile::TempDir;

    const IMAGE: &[u8] = b"otafleet firmware image 1.1";
    const URL: &str = "https://fw.lab/n100/1.1.bin";

    fn descriptor() -> FirmwareDescriptor {
        FirmwareDescriptor {
            version: "1.1".into(),
            expected_hash: digest_bytes(IMAGE),
            download_url: URL.into(),
        }
    }

    fn happy_reply(endpoint: Endpoint) -> ApiResponse {
        ApiResponse::from_json(match endpoint {
            Endpoint::RegisterNode => json!({"message": REGISTERED_MESSAGE}),
            Endpoint::GetCurrentVersion => json!({"currentVersion": "1.0"}),
            Endpoint::CheckForUpdate => json!({
                "updateAvailable": true,
                "firmwareInfo": descriptor(),
            }),
            Endpoint::VerifyFirmware => json!({"verified": true}),
            Endpoint::SubmitUpdate => json!({"message": FIRMWARE_UPDATED_MESSAGE}),
        })
    }

    /// Happy-path server except where `over` returns a reply.
    fn server_with<F>(over: F) -> MockControlPlane
    where
        F: Fn(Endpoint) -> Option<otafleet_transport::Result<ApiResponse>> + Send + Sync + 'static,
    {
        MockControlPlane::new(move |endpoint, _, _| {
            over(endpoint).unwrap_or_else(|| Ok(happy_reply(endpoint)))
        })
    }

    fn reply(endpoint: Endpoint, body: serde_json::Value) -> MockControlPlane {
        server_with(move |ep| (ep == endpoint).then(|| Ok(ApiResponse::from_json(body.clone()))))
    }

    /// Flasher that installs a different image than it was given.
    struct CorruptingFlasher {
        dir: PathBuf,
    }

    #[async_trait]
    impl Flasher for CorruptingFlasher {
        async fn install(&self, _image: &Path) -> Result<PathBuf, InstallError> {
            let target = self.dir.join("corrupt.installed");
            tokio::fs::write(&target, b"bit-flipped image")
                .await
                .map_err(|e| InstallError::io("corrupt.installed", e))?;
            Ok(target)
        }
    }

    struct Harness {
        dir: TempDir,
        control: Arc<MockControlPlane>,
        firmware: Arc<MockFirmwareSource>,
        flasher: Arc<SimulatedFlasher>,
        settings: SessionSettings,
    }

    impl Harness {
        fn new(control: MockControlPlane) -> Self {
            Self::with_source(
                control,
                MockFirmwareSource::new().with_image(URL, IMAGE.to_vec()),
            )
        }

        fn with_source(control: MockControlPlane, source: MockFirmwareSource) -> Self {
            let dir = TempDir::new().unwrap();
            let flasher =
                SimulatedFlasher::new(dir.path().join("installed"), Duration::from_millis(5));
            let settings = SessionSettings {
                firmware_dir: dir.path().join("fw"),
                post_verify: true,
                keep_firmware: false,
            };
            Self {
                control: Arc::new(control),
                firmware: Arc::new(source),
                flasher: Arc::new(flasher),
                settings,
                dir,
            }
        }

        fn services(&self) -> SessionServices {
            SessionServices {
                control: ControlClient::new(self.control.clone()),
                firmware: self.firmware.clone(),
                flasher: self.flasher.clone(),
            }
        }

        fn identity(node: &str) -> NodeIdentity {
            NodeIdentity::new(NodeId::new(node).unwrap(), "n100").unwrap()
        }

        async fn run(&self, node: &str) -> SessionReport {
            UpdateSession::new(Self::identity(node), self.services(), self.settings.clone())
                .run()
                .await
        }

        fn failure(report: &SessionReport) -> FailureReason {
            match &report.end {
                SessionEnd::Failed(f) => f.reason,
                other => panic!("expected failure, got {other:?}"),
            }
        }
    }

    #[tokio::test]
    async fn test_happy_path_reaches_done() {
        let h = Harness::new(server_with(|_| None));
        let report = h.run("a1").await;

        assert_eq!(report.end, SessionEnd::Updated);
        assert_eq!(report.final_state(), SessionState::Done);
        assert_eq!(report.version.as_deref(), Some("1.1"));
        assert!(report.duration > Duration::ZERO);
        assert_eq!(
            report.trace,
            vec![
                SessionState::Registering,
                SessionState::VersionQuery,
                SessionState::UpdateCheck,
                SessionState::Downloading,
                SessionState::LocalVerify,
                SessionState::RemoteVerify,
                SessionState::Installing,
                SessionState::PostVerify,
                SessionState::Submitting,
                SessionState::Done,
            ]
        );

        assert_eq!(h.flasher.install_count(), 1);
        assert_eq!(h.control.count(Endpoint::VerifyFirmware), 2);
        assert_eq!(h.control.count(Endpoint::SubmitUpdate), 1);
        assert!(h.dir.path().join("installed").join("a1.bin.installed").exists());
        assert!(!h.dir.path().join("fw").join("a1.bin").exists());

        let verify = &h.control.calls()[3];
        assert_eq!(verify.endpoint, Endpoint::VerifyFirmware);
        assert_eq!(
            verify.body,
            Some(json!({"nodeId": "a1", "firmwareVersion": "1.1", "firmwareHash": digest_bytes(IMAGE)}))
        );
    }

    #[tokio::test]
    async fn test_up_to_date_touches_nothing() {
        let h = Harness::new(reply(Endpoint::CheckForUpdate, json!({"updateAvailable": false})));
        let report = h.run("a1").await;

        assert_eq!(report.end, SessionEnd::UpToDate);
        assert_eq!(report.version.as_deref(), Some("1.0"));
        assert_eq!(h.firmware.fetch_count(), 0);
        assert_eq!(h.control.count(Endpoint::VerifyFirmware), 0);
        assert_eq!(h.control.count(Endpoint::SubmitUpdate), 0);
        assert_eq!(h.flasher.install_count(), 0);
    }

    #[tokio::test]
    async fn test_update_without_firmware_info_is_up_to_date() {
        let h = Harness::new(reply(Endpoint::CheckForUpdate, json!({"updateAvailable": true})));
        let report = h.run("a1").await;

        assert_eq!(report.end, SessionEnd::UpToDate);
        assert_eq!(h.firmware.fetch_count(), 0);
    }

    #[tokio::test]
    async fn test_local_hash_mismatch_never_installs() {
        let source = MockFirmwareSource::new().with_image(URL, b"tampered image".to_vec());
        let h = Harness::with_source(server_with(|_| None), source);
        let report = h.run("a1").await;

        assert_eq!(Harness::failure(&report), FailureReason::HashMismatchLocal);
        assert_eq!(
            report.final_state(),
            SessionState::Failed(FailureReason::HashMismatchLocal)
        );
        assert_eq!(report.version.as_deref(), Some("1.1"));
        assert_eq!(h.flasher.install_count(), 0);
        assert_eq!(h.control.count(Endpoint::VerifyFirmware), 0);
        assert_eq!(h.control.count(Endpoint::SubmitUpdate), 0);
    }

    #[tokio::test]
    async fn test_remote_verify_rejection_never_installs() {
        let h = Harness::new(reply(
            Endpoint::VerifyFirmware,
            json!({"verified": false, "message": "hash not on ledger"}),
        ));
        let report = h.run("a1").await;

        assert_eq!(Harness::failure(&report), FailureReason::RemoteVerifyFailed);
        assert_eq!(h.flasher.install_count(), 0);
        assert_eq!(h.control.count(Endpoint::SubmitUpdate), 0);
    }

    #[tokio::test]
    async fn test_remote_verify_transport_error() {
        let h = Harness::new(server_with(|ep| {
            (ep == Endpoint::VerifyFirmware).then(|| {
                Err(TransportError::Timeout {
                    target: "verifyFirmware".into(),
                })
            })
        }));
        let report = h.run("a1").await;
        assert_eq!(Harness::failure(&report), FailureReason::RemoteVerifyFailed);
        assert_eq!(h.flasher.install_count(), 0);
    }

    #[tokio::test]
    async fn test_already_registered_is_not_failure() {
        let h = Harness::new(reply(
            Endpoint::RegisterNode,
            json!({"error": "Failed to register node", "details": "Edge node a1 is already registered"}),
        ));
        let report = h.run("a1").await;
        assert_eq!(report.end, SessionEnd::Updated);
    }

    #[tokio::test]
    async fn test_registration_rejected() {
        let h = Harness::new(reply(Endpoint::RegisterNode, json!({"error": "unknown device type"})));
        let report = h.run("a1").await;

        assert_eq!(Harness::failure(&report), FailureReason::RegistrationError);
        assert_eq!(report.duration, Duration::ZERO);
        assert_eq!(report.version, None);
        assert_eq!(h.control.call_count(), 1);
    }

    #[tokio::test]
    async fn test_registration_transport_error() {
        let h = Harness::new(server_with(|ep| {
            (ep == Endpoint::RegisterNode).then(|| {
                Err(TransportError::Connect {
                    target: "registerNode".into(),
                    reason: "refused".into(),
                })
            })
        }));
        let report = h.run("a1").await;
        assert_eq!(Harness::failure(&report), FailureReason::RegistrationError);
    }

    #[tokio::test]
    async fn test_missing_current_version() {
        let h = Harness::new(reply(Endpoint::GetCurrentVersion, json!({"currentVersion": null})));
        let report = h.run("a1").await;

        assert_eq!(Harness::failure(&report), FailureReason::VersionQueryError);
        assert_eq!(h.control.count(Endpoint::CheckForUpdate), 0);
    }

    #[tokio::test]
    async fn test_update_check_error_body() {
        let h = Harness::new(reply(Endpoint::CheckForUpdate, json!({"status": "error", "message": "db down"})));
        let report = h.run("a1").await;

        assert_eq!(Harness::failure(&report), FailureReason::UpdateCheckError);
        assert_eq!(report.version, None);
        assert_eq!(h.firmware.fetch_count(), 0);
    }

    #[tokio::test]
    async fn test_download_failure() {
        let source = MockFirmwareSource::new().with_status(URL, 500);
        let h = Harness::with_source(server_with(|_| None), source);
        let report = h.run("a1").await;

        assert_eq!(Harness::failure(&report), FailureReason::DownloadError);
        assert_eq!(h.flasher.install_count(), 0);
    }

    #[tokio::test]
    async fn test_stale_image_is_never_verified() {
        let h = Harness::with_source(
            server_with(|_| None),
            MockFirmwareSource::new().with_status(URL, 404),
        );
        // A correct image left behind by an earlier run.
        let stale = h.dir.path().join("fw").join("a1.bin");
        tokio::fs::create_dir_all(stale.parent().unwrap()).await.unwrap();
        tokio::fs::write(&stale, IMAGE).await.unwrap();

        let report = h.run("a1").await;
        assert_eq!(Harness::failure(&report), FailureReason::DownloadError);
        assert_eq!(h.flasher.install_count(), 0);
        assert!(!stale.exists());
    }

    #[tokio::test]
    async fn test_install_failure() {
        let h = Harness::new(server_with(|_| None));
        h.flasher.set_failing(true);
        let report = h.run("a1").await;

        assert_eq!(Harness::failure(&report), FailureReason::InstallError);
        assert_eq!(h.control.count(Endpoint::SubmitUpdate), 0);
    }

    #[tokio::test]
    async fn test_post_install_mismatch() {
        let h = Harness::new(server_with(|_| None));
        let services = SessionServices {
            flasher: Arc::new(CorruptingFlasher {
                dir: h.dir.path().to_path_buf(),
            }),
            ..h.services()
        };
        let report = UpdateSession::new(Harness::identity("a1"), services, h.settings.clone())
            .run()
            .await;

        assert_eq!(Harness::failure(&report), FailureReason::HashMismatchPostInstall);
        assert_eq!(h.control.count(Endpoint::VerifyFirmware), 1);
        assert_eq!(h.control.count(Endpoint::SubmitUpdate), 0);
    }

    #[tokio::test]
    async fn test_installed_image_rejected_by_server() {
        let verifies = AtomicUsize::new(0);
        let h = Harness::new(server_with(move |ep| {
            (ep == Endpoint::VerifyFirmware && verifies.fetch_add(1, Ordering::SeqCst) == 1).then(
                || {
                    Ok(ApiResponse::from_json(
                        json!({"verified": false, "message": "installed hash unknown"}),
                    ))
                },
            )
        }));
        let report = h.run("a1").await;

        assert_eq!(Harness::failure(&report), FailureReason::RemoteVerifyFailed);
        assert_eq!(
            report.final_state(),
            SessionState::Failed(FailureReason::RemoteVerifyFailed)
        );
        assert!(report.trace.contains(&SessionState::PostVerify));
        assert_eq!(h.flasher.install_count(), 1);
        assert_eq!(h.control.count(Endpoint::VerifyFirmware), 2);
        assert_eq!(h.control.count(Endpoint::SubmitUpdate), 0);
        assert!(!h.dir.path().join("fw").join("a1.bin").exists());
    }

    #[tokio::test]
    async fn test_post_verify_disabled() {
        let mut h = Harness::new(server_with(|_| None));
        h.settings.post_verify = false;
        let report = h.run("a1").await;

        assert_eq!(report.end, SessionEnd::Updated);
        assert!(!report.trace.contains(&SessionState::PostVerify));
        assert_eq!(h.control.count(Endpoint::VerifyFirmware), 1);
    }

    #[tokio::test]
    async fn test_submit_rejected() {
        let h = Harness::new(reply(Endpoint::SubmitUpdate, json!({"status": "failed"})));
        let report = h.run("a1").await;

        assert_eq!(Harness::failure(&report), FailureReason::SubmitError);
        assert_eq!(h.flasher.install_count(), 1);
    }

    #[test]
    fn test_firmware_path_per_node() {
        let settings = SessionSettings {
            firmware_dir: PathBuf::from("/tmp/fw"),
            post_verify: true,
            keep_firmware: false,
        };
        let id = NodeId::new("a42").unwrap();
        assert_eq!(settings.firmware_path(&id), PathBuf::from("/tmp/fw/a42.bin"));
    }

    #[tokio::test]
    async fn test_keep_firmware() {
        let mut h = Harness::new(server_with(|_| None));
        h.settings.keep_firmware = true;
        h.run("a1").await;
        assert!(h.dir.path().join("fw").join("a1.bin").exists());
    }
}
