// ============================================
// File: crates/otafleet-core/src/lib.rs
// ============================================
//! # otafleet Core - Integrity & Protocol Library
//!
//! ## Creation Reason
//! Holds the two pieces of the update client that carry security or
//! wire-format meaning: the firmware integrity verifier and the control
//! server's request/response models.
//!
//! ## Main Functionality
//!
//! ### Modules
//! - [`integrity`]: Streaming SHA-256 digest and digest comparison
//! - [`protocol`]: Endpoints, request bodies, response parsing and the
//!   structured classification of each control-server reply
//! - [`error`]: Core error types
//!
//! ## Verification Gate
//! ```text
//!   downloaded bytes ──► digest (4 KiB chunks) ──► verify(local, expected)
//!                                                     │ match
//!                                                     ▼
//!                                      POST /verifyFirmware ──► acknowledged?
//!                                                     │ yes
//!                                                     ▼
//!                                                  install
//! ```
//!
//! ## ⚠️ Important Note for Next Developer
//! - The digest algorithm is a fixed system parameter (`DIGEST_ALGORITHM`);
//!   it must match what the control server publishes in `hash`
//! - Response classification lives here so no caller ever does substring
//!   matching on server text
//!
//! ## Last Modified
//! v0.1.0 - Initial core implementation

#![warn(missing_docs)]
#![warn(clippy::all)]
#![allow(clippy::module_name_repetitions)]

pub mod error;
pub mod integrity;
pub mod protocol;

// Re-export primary types
pub use error::{CoreError, Result};
pub use integrity::{digest_bytes, digest_file, digest_reader, verify, Digester};
pub use protocol::{ApiResponse, Endpoint, FirmwareDescriptor, Method};
