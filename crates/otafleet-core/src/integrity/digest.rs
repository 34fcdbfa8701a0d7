// ============================================
// File: crates/otafleet-core/src/integrity/digest.rs
// ============================================
//! # Streaming Digest
//!
//! ## Main Logical Flow
//! 1. Open the firmware image
//! 2. Feed it to a `Digester` one `DIGEST_CHUNK_SIZE` block at a time
//! 3. Hex-encode the final SHA-256 value
//! 4. Compare with `verify` against the server-declared digest
//!
//! ## Last Modified
//! v0.1.0 - Initial implementation

use std::io::Read;
use std::path::Path;

use sha2::{Digest, Sha256};
use tokio::io::AsyncReadExt;
use tracing::debug;

use super::{DIGEST_CHUNK_SIZE, DIGEST_HEX_LEN};
use crate::error::{CoreError, Result};

// ============================================
// Digester
// ============================================

/// Incremental SHA-256 digester.
///
/// # Example
/// ```
/// use otafleet_core::integrity::Digester;
///
/// let mut d = Digester::new();
/// d.update(b"hello ");
/// d.update(b"world");
/// assert_eq!(
///     d.finalize_hex(),
///     "b94d27b9934d3e08a52e52d7da7dabfac484efe37a5380ee9088f7ace2efcde9"
/// );
/// ```
#[derive(Clone, Default)]
pub struct Digester {
    hasher: Sha256,
    bytes: u64,
}

impl std::fmt::Debug for Digester {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Digester")
            .field("bytes", &self.bytes)
            .finish_non_exhaustive()
    }
}

impl Digester {
    /// Creates an empty digester.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Feeds a chunk of data.
    pub fn update(&mut self, chunk: &[u8]) {
        self.hasher.update(chunk);
        self.bytes += chunk.len() as u64;
    }

    /// Number of bytes fed so far.
    #[must_use]
    pub const fn bytes_processed(&self) -> u64 {
        self.bytes
    }

    /// Consumes the digester and returns the lowercase hex digest.
    #[must_use]
    pub fn finalize_hex(self) -> String {
        hex::encode(self.hasher.finalize())
    }
}

// ============================================
// Digest Functions
// ============================================

/// Digests an in-memory byte slice.
#[must_use]
pub fn digest_bytes(data: &[u8]) -> String {
    let mut d = Digester::new();
    for chunk in data.chunks(DIGEST_CHUNK_SIZE) {
        d.update(chunk);
    }
    d.finalize_hex()
}

/// Digests any blocking reader in `DIGEST_CHUNK_SIZE` blocks.
///
/// # Errors
/// Returns `CoreError::Io` if the reader fails.
pub fn digest_reader<R: Read>(mut reader: R) -> Result<String> {
    let mut d = Digester::new();
    let mut buf = [0u8; DIGEST_CHUNK_SIZE];
    loop {
        let n = reader
            .read(&mut buf)
            .map_err(|e| CoreError::io("reading digest input", e))?;
        if n == 0 {
            break;
        }
        d.update(&buf[..n]);
    }
    Ok(d.finalize_hex())
}

/// Digests a file asynchronously in `DIGEST_CHUNK_SIZE` blocks.
///
/// # Errors
/// Returns `CoreError::Io` if the file cannot be opened or read.
pub async fn digest_file(path: impl AsRef<Path>) -> Result<String> {
    let path = path.as_ref();
    let context = path.display().to_string();

    let mut file = tokio::fs::File::open(path)
        .await
        .map_err(|e| CoreError::io(&context, e))?;

    let mut d = Digester::new();
    let mut buf = vec![0u8; DIGEST_CHUNK_SIZE];
    loop {
        let n = file
            .read(&mut buf)
            .await
            .map_err(|e| CoreError::io(&context, e))?;
        if n == 0 {
            break;
        }
        d.update(&buf[..n]);
    }

    debug!("Digested {} bytes from {}", d.bytes_processed(), context);
    Ok(d.finalize_hex())
}

// ============================================
// Verification
// ============================================

/// Normalizes a hex digest, rejecting anything that is not 64 hex chars.
///
/// # Errors
/// Returns `CoreError::InvalidDigest` on malformed input.
pub fn normalize(digest: &str) -> Result<String> {
    let d = digest.trim();
    if d.len() != DIGEST_HEX_LEN {
        return Err(CoreError::InvalidDigest {
            reason: format!("expected {DIGEST_HEX_LEN} hex characters, got {}", d.len()),
        });
    }
    if !d.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(CoreError::InvalidDigest {
            reason: "contains non-hex characters".to_string(),
        });
    }
    Ok(d.to_ascii_lowercase())
}

/// Compares a computed digest with the expected one.
///
/// Equality is on lowercase hex. A malformed digest on either side never
/// verifies.
#[must_use]
pub fn verify(digest: &str, expected: &str) -> bool {
    match (normalize(digest), normalize(expected)) {
        (Ok(a), Ok(b)) => a == b,
        _ => false,
    }
}

// ============================================
// Tests
// ============================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    const HELLO_WORLD: &str = "b94d27b9934d3e08a52e52d7da7dabfac484efe37a5380ee9088f7ace2efcde9";

    #[test]
    fn test_known_vector() {
        assert_eq!(digest_bytes(b"hello world"), HELLO_WORLD);
        assert_eq!(
            digest_bytes(b""),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }

    #[test]
    fn test_digest_is_deterministic_and_self_verifies() {
        let data: Vec<u8> = (0..10_000u32).map(|i| (i % 251) as u8).collect();
        let a = digest_bytes(&data);
        let b = digest_reader(&data[..]).unwrap();
        assert_eq!(a, b);
        assert!(verify(&a, &b));
    }

    #[test]
    fn test_single_byte_mutation_fails_verification() {
        let data: Vec<u8> = (0..3 * DIGEST_CHUNK_SIZE as u32 + 7)
            .map(|i| (i % 256) as u8)
            .collect();
        let original = digest_bytes(&data);

        for pos in [0, DIGEST_CHUNK_SIZE - 1, DIGEST_CHUNK_SIZE, data.len() - 1] {
            let mut mutated = data.clone();
            mutated[pos] ^= 0x01;
            assert!(!verify(&digest_bytes(&mutated), &original), "mutation at {pos}");
        }
    }

    #[test]
    fn test_verify_is_case_insensitive() {
        assert!(verify(HELLO_WORLD, &HELLO_WORLD.to_uppercase()));
        assert!(verify(&format!("  {HELLO_WORLD}\n"), HELLO_WORLD));
    }

    #[test]
    fn test_verify_rejects_malformed() {
        assert!(!verify("", ""));
        assert!(!verify(&HELLO_WORLD[..63], &HELLO_WORLD[..63]));
        let not_hex = "z".repeat(DIGEST_HEX_LEN);
        assert!(!verify(&not_hex, &not_hex));
    }

    #[tokio::test]
    async fn test_digest_file_matches_bytes() {
        let mut file = NamedTempFile::new().unwrap();
        let data = vec![0xA5u8; DIGEST_CHUNK_SIZE * 5 + 123];
        file.write_all(&data).unwrap();
        file.flush().unwrap();

        let from_file = digest_file(file.path()).await.unwrap();
        assert_eq!(from_file, digest_bytes(&data));
    }

    #[tokio::test]
    async fn test_digest_missing_file() {
        let err = digest_file("/nonexistent/otafleet/firmware.bin").await.unwrap_err();
        assert!(matches!(err, CoreError::Io { .. }));
    }

    #[test]
    fn test_digester_counts_bytes() {
        let mut d = Digester::new();
        d.update(&[1, 2, 3]);
        d.update(&[4]);
        assert_eq!(d.bytes_processed(), 4);
    }
}
