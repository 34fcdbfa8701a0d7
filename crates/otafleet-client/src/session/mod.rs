// ============================================
// File: crates/otafleet-client/src/session/mod.rs
// ============================================
//! # Update Sessions
//!
//! ## Creation Reason
//! One node's update is a strictly ordered sequence of control-server
//! calls with an integrity gate in the middle. This module owns that
//! sequence and nothing else.
//!
//! ## Main Functionality
//!
//! ### Submodules
//! - [`state`]: `SessionState`, legal transitions, `FailureReason`
//! - [`machine`]: `UpdateSession`, which drives one node to a terminal state
//!
//! ## Session Architecture
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │                     UpdateSession                        │
//! ├──────────────────────────────────────────────────────────┤
//! │  ControlClient ──► register / version / check / submit   │
//! │  FirmwareSource ─► download to {firmware_dir}/{node}.bin │
//! │  integrity ──────► local digest, post-install digest     │
//! │  Flasher ────────► install (awaited, no timeout)         │
//! └──────────────────────────────────────────────────────────┘
//! ```
//!
//! ## ⚠️ Important Note for Next Developer
//! - Sessions are never persisted; a crashed pass simply reruns
//! - One session per node at a time is enforced by the fleet driver,
//!   not here
//!
//! ## Last Modified
//! v0.1.0 - Initial session structure

pub mod machine;
pub mod state;

// Re-export primary types
pub use machine::{SessionEnd, SessionReport, SessionServices, SessionSettings, UpdateSession};
pub use state::{FailureReason, SessionFailure, SessionState};
