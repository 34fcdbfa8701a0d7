// ============================================
// File: crates/otafleet-transport/src/lib.rs
// ============================================
//! # otafleet Transport - Network I/O Layer
//!
//! ## Creation Reason
//! Everything the update client sends or receives over the network goes
//! through this crate: authenticated JSON requests to the control server
//! and firmware image downloads.
//!
//! ## Main Functionality
//!
//! ### Modules
//! - [`traits`]: `ControlPlane` and `FirmwareSource` abstractions
//! - [`https`]: reqwest/rustls implementation of `ControlPlane`
//! - [`download`]: Streaming `FirmwareSource` with `.partial` + rename
//! - [`mock`]: In-memory implementations (`mock` feature)
//! - [`error`]: Transport-specific error types
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────┐
//! │              otafleet-client                        │
//! │                    │                                │
//! │         ┌──────────┴──────────┐                    │
//! │         ▼                     ▼                    │
//! │   otafleet-core        otafleet-transport          │
//! │                        You are here ◄──            │
//! │         │                     │                    │
//! │         └──────────┬──────────┘                    │
//! │                    ▼                               │
//! │             otafleet-common                        │
//! └─────────────────────────────────────────────────────┘
//! ```
//!
//! ## ⚠️ Important Note for Next Developer
//! - No retries anywhere in this crate
//! - Always use traits for testability
//! - Mock implementations available with `mock` feature
//!
//! ## Last Modified
//! v0.1.0 - Initial transport layer implementation

#![warn(missing_docs)]
#![warn(clippy::all)]
#![allow(clippy::module_name_repetitions)]

pub mod download;
pub mod error;
pub mod https;
pub mod traits;

#[cfg(any(test, feature = "mock"))]
pub mod mock;

// Re-export primary types
pub use download::HttpFirmwareSource;
pub use error::{Result, TransportError};
pub use https::{HttpsControlPlane, TransportConfig};
pub use traits::{ControlPlane, Download, FirmwareSource};
