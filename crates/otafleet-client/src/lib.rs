// ============================================
// File: crates/otafleet-client/src/lib.rs
// ============================================
//! # otafleet Client Library
//!
//! ## Creation Reason
//! Drives over-the-air firmware updates across a fleet of nodes: for each
//! node it asks the control server whether newer firmware exists, fetches
//! and verifies it, installs it and reports back.
//!
//! ## Main Functionality
//!
//! ### Modules
//! - [`config`]: TOML client configuration
//! - [`control`]: Typed control-server API over a `ControlPlane`
//! - [`session`]: Per-node update state machine
//!   - [`session::state`]: States, transitions, failure reasons
//!   - [`session::machine`]: `UpdateSession`
//! - [`installer`]: `Flasher` seam and the simulated flasher
//! - [`outcome`]: Outcome records, sinks and the recorder task
//! - [`fleet`]: Bounded-concurrency fleet driver
//! - [`error`]: Client-specific error types
//!
//! ## Architecture Overview
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      otafleet client                        │
//! ├─────────────────────────────────────────────────────────────┤
//! │  ┌────────────┐    ┌─────────────┐    ┌──────────────────┐  │
//! │  │   Config   │───►│ FleetDriver │───►│ OutcomeRecorder  │  │
//! │  └────────────┘    └──────┬──────┘    └────────┬─────────┘  │
//! │                           │ one per node       ▼            │
//! │                    ┌──────▼──────┐      update_times.csv    │
//! │                    │UpdateSession│                          │
//! │                    └──┬───┬───┬──┘                          │
//! │          ┌────────────┘   │   └────────────┐                │
//! │          ▼                ▼                ▼                │
//! │   ┌─────────────┐  ┌─────────────┐  ┌─────────────┐         │
//! │   │ControlClient│  │  Integrity  │  │   Flasher   │         │
//! │   └──────┬──────┘  └─────────────┘  └─────────────┘         │
//! ├──────────┼──────────────────────────────────────────────────┤
//! │          ▼          Transport Layer                         │
//! │   HttpsControlPlane            HttpFirmwareSource           │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## ⚠️ Important Note for Next Developer
//! - No image is installed unless its local digest matched AND the server
//!   acknowledged it
//! - A failed node is an outcome, not an error; the fleet pass always
//!   completes
//!
//! ## Last Modified
//! v0.1.0 - Initial client library

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod config;
pub mod control;
pub mod error;
pub mod fleet;
pub mod installer;
pub mod outcome;
pub mod session;

// Re-export primary types
pub use config::ClientConfig;
pub use control::ControlClient;
pub use error::{ClientError, Result};
pub use fleet::{FleetDriver, FleetOptions, FleetReport};
pub use installer::{Flasher, InstallError, SimulatedFlasher};
pub use outcome::{
    CsvOutcomeSink, MemoryOutcomeSink, OutcomeRecorder, OutcomeResult, OutcomeSink, UpdateOutcome,
};
pub use session::{FailureReason, SessionEnd, SessionReport, SessionState, UpdateSession};
