// ============================================
// File: crates/otafleet-client/src/session/state.rs
// ============================================
//! # Session State
//!
//! ## State Machine
//! ```text
//! Registering ─► VersionQuery ─► UpdateCheck ─┬─► UpToDate
//!                                             │
//!                                             └─► Downloading ─► LocalVerify ─► RemoteVerify
//!                                                                                   │
//!        Done ◄─ Submitting ◄─┬─ PostVerify ◄─┬─ Installing ◄────────────────────────┘
//!                             └───────────────┘ (post_verify off)
//!
//! Any non-terminal state ─► Failed(reason)
//! ```
//!
//! ## ⚠️ Important Note for Next Developer
//! - States only move forward; `can_advance_to` is the single source of
//!   truth for legal transitions
//! - `FailureReason` strings are written to the outcome log; changing
//!   them breaks downstream parsing
//!
//! ## Last Modified
//! v0.1.0 - Initial state definitions

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

// ============================================
// FailureReason
// ============================================

/// Why a session ended in `Failed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FailureReason {
    /// `/registerNode` failed or rejected the node.
    RegistrationError,
    /// `/getCurrentVersion` failed or had no version.
    VersionQueryError,
    /// `/checkForUpdate` failed or returned an error body.
    UpdateCheckError,
    /// Firmware fetch failed.
    DownloadError,
    /// Downloaded image does not match the declared digest.
    HashMismatchLocal,
    /// Installed image does not match the declared digest.
    HashMismatchPostInstall,
    /// Server did not acknowledge the digest.
    RemoteVerifyFailed,
    /// The flasher failed.
    InstallError,
    /// `/submitUpdate` failed or was not acknowledged.
    SubmitError,
}

impl FailureReason {
    /// Wire/log name, e.g. `hash-mismatch-local`.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::RegistrationError => "registration-error",
            Self::VersionQueryError => "version-query-error",
            Self::UpdateCheckError => "update-check-error",
            Self::DownloadError => "download-error",
            Self::HashMismatchLocal => "hash-mismatch-local",
            Self::HashMismatchPostInstall => "hash-mismatch-post-install",
            Self::RemoteVerifyFailed => "remote-verify-failed",
            Self::InstallError => "install-error",
            Self::SubmitError => "submit-error",
        }
    }
}

impl fmt::Display for FailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A failed session: the reason plus what actually went wrong.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{reason}: {detail}")]
pub struct SessionFailure {
    /// Failure category
    pub reason: FailureReason,
    /// Human-readable detail
    pub detail: String,
}

impl SessionFailure {
    /// Creates a failure.
    pub fn new(reason: FailureReason, detail: impl ToString) -> Self {
        Self {
            reason,
            detail: detail.to_string(),
        }
    }
}

// ============================================
// SessionState
// ============================================

/// State of one update session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SessionState {
    /// Registering the node.
    Registering,
    /// Asking for the node's current version.
    VersionQuery,
    /// Asking whether a newer version exists.
    UpdateCheck,
    /// Nothing to do. Terminal.
    UpToDate,
    /// Fetching the image.
    Downloading,
    /// Digesting the image locally.
    LocalVerify,
    /// Asking the server to confirm the digest.
    RemoteVerify,
    /// Flashing.
    Installing,
    /// Re-checking the installed image.
    PostVerify,
    /// Reporting the new version.
    Submitting,
    /// Update complete. Terminal.
    Done,
    /// Session failed. Terminal.
    Failed(FailureReason),
}

impl SessionState {
    /// `true` for `UpToDate`, `Done` and `Failed`.
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::UpToDate | Self::Done | Self::Failed(_))
    }

    /// Whether `next` is a legal successor of `self`.
    #[must_use]
    pub const fn can_advance_to(&self, next: &Self) -> bool {
        use SessionState::{
            Done, Downloading, Failed, Installing, LocalVerify, PostVerify, Registering,
            RemoteVerify, Submitting, UpToDate, UpdateCheck, VersionQuery,
        };

        if self.is_terminal() {
            return false;
        }
        matches!(
            (self, next),
            (_, Failed(_))
                | (Registering, VersionQuery)
                | (VersionQuery, UpdateCheck)
                | (UpdateCheck, UpToDate | Downloading)
                | (Downloading, LocalVerify)
                | (LocalVerify, RemoteVerify)
                | (RemoteVerify, Installing)
                | (Installing, PostVerify | Submitting)
                | (PostVerify, Submitting)
                | (Submitting, Done)
        )
    }

    /// Short name for logs.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Registering => "Registering",
            Self::VersionQuery => "VersionQuery",
            Self::UpdateCheck => "UpdateCheck",
            Self::UpToDate => "UpToDate",
            Self::Downloading => "Downloading",
            Self::LocalVerify => "LocalVerify",
            Self::RemoteVerify => "RemoteVerify",
            Self::Installing => "Installing",
            Self::PostVerify => "PostVerify",
            Self::Submitting => "Submitting",
            Self::Done => "Done",
            Self::Failed(_) => "Failed",
        }
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Failed(reason) => write!(f, "Failed({reason})"),
            other => f.write_str(other.name()),
        }
    }
}
