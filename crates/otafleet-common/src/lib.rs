// ============================================
// File: crates/otafleet-common/src/lib.rs
// ============================================
//! # otafleet Common - Shared Types Library
//!
//! ## Creation Reason
//! Provides the identity and error types shared by every otafleet crate,
//! so that a node is described the same way from the CLI down to the wire.
//!
//! ## Main Functionality
//! - [`types`]: `NodeId`, `NodeIdentity`, `NodeRange`
//! - [`time`]: Unix timestamps and duration helpers for outcome records
//! - [`error`]: Common error types and result aliases
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────┐
//! │              otafleet-client                        │
//! │                    │                                │
//! │         ┌──────────┴──────────┐                    │
//! │         ▼                     ▼                    │
//! │   otafleet-core       otafleet-transport           │
//! │         │                     │                    │
//! │         └──────────┬──────────┘                    │
//! │                    ▼                               │
//! │             otafleet-common  ◄── You are here     │
//! └─────────────────────────────────────────────────────┘
//! ```
//!
//! ## ⚠️ Important Note for Next Developer
//! - This crate is the foundation - changes affect everything
//! - Keep dependencies minimal (serde + thiserror only)
//! - `NodeId` validation rules are part of the wire contract: node ids end
//!   up in HTTP headers and local file names
//!
//! ## Last Modified
//! v0.1.0 - Initial implementation

#![warn(missing_docs)]
#![warn(clippy::all)]
#![allow(clippy::module_name_repetitions)]

pub mod error;
pub mod time;
pub mod types;

// Re-export commonly used items at crate root
pub use error::{CommonError, Result};
pub use types::{NodeId, NodeIdentity, NodeRange};
