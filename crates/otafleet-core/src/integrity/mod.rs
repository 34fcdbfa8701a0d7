// ============================================
// File: crates/otafleet-core/src/integrity/mod.rs
// ============================================
//! # Integrity Verifier
//!
//! ## Creation Reason
//! Firmware must never be installed unless its content digest matches the
//! digest the control server published for it. This module is the only
//! place that computes or compares those digests.
//!
//! ## Main Functionality
//! - [`digest`]: `Digester` (incremental), `digest_reader`, `digest_file`,
//!   `digest_bytes`, `verify`
//!
//! ## Digest Parameters
//! | Parameter | Value |
//! |-----------|-------|
//! | Algorithm | SHA-256 |
//! | Output | 64 lowercase hex characters |
//! | Read chunk | 4096 bytes |
//!
//! ## ⚠️ Important Note for Next Developer
//! - Never buffer a whole image to hash it; always go through `Digester`
//! - `verify` is case-insensitive but rejects anything that is not a
//!   well-formed 256-bit hex digest, so an empty or truncated `hash` from
//!   the server can never match
//!
//! ## Last Modified
//! v0.1.0 - Initial integrity verifier

pub mod digest;

pub use digest::{digest_bytes, digest_file, digest_reader, verify, Digester};

// ============================================
// Constants
// ============================================

/// Digest algorithm the control server publishes `hash` values under.
pub const DIGEST_ALGORITHM: &str = "sha256";

/// Size of a digest in bytes.
pub const DIGEST_SIZE: usize = 32;

/// Length of a hex-encoded digest.
pub const DIGEST_HEX_LEN: usize = DIGEST_SIZE * 2;

/// Bytes read per step when hashing a stream.
pub const DIGEST_CHUNK_SIZE: usize = 4096;
