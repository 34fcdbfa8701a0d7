// ============================================
// File: crates/otafleet-client/src/installer.rs
// ============================================
//! # Installer
//!
//! ## Creation Reason
//! The physical flashing mechanism sits outside this client. `Flasher` is
//! the seam it plugs into; `SimulatedFlasher` stands in for it on lab
//! fleets.
//!
//! ## Main Functionality
//! - `Flasher`: Install a verified image, return where it ended up
//! - `SimulatedFlasher`: Waits, then copies the image into `install_dir`
//!
//! ## ⚠️ Important Note for Next Developer
//! - `install` is awaited to completion by the session with no timeout;
//!   a flasher that hangs holds its session slot until it returns
//! - Only images that passed local AND remote verification reach here
//!
//! ## Last Modified
//! v0.1.0 - Initial installer

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use tracing::{debug, info};

// ============================================
// InstallError
// ============================================

/// Why an install failed.
#[derive(Error, Debug)]
pub enum InstallError {
    /// The flasher could not read or write an image.
    #[error("Install I/O error: {context}")]
    Io {
        /// What was being accessed
        context: String,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },

    /// The flasher refused or aborted the install.
    #[error("Install failed: {reason}")]
    Failed {
        /// Flasher-provided reason
        reason: String,
    },
}

impl InstallError {
    /// Creates an `Io` error with context.
    pub fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }
}

// ============================================
// Flasher Trait
// ============================================

/// Applies a firmware image to a node.
#[async_trait]
pub trait Flasher: Send + Sync {
    /// Installs `image` and returns the path of the installed image.
    ///
    /// # Errors
    /// Returns `InstallError` if the image could not be applied.
    async fn install(&self, image: &Path) -> Result<PathBuf, InstallError>;
}

// ============================================
// SimulatedFlasher
// ============================================

/// Flasher that sleeps for a fixed time and then copies the image to
/// `{install_dir}/{image file name}.installed`.
#[derive(Debug)]
pub struct SimulatedFlasher {
    install_dir: PathBuf,
    delay: Duration,
    installs: AtomicUsize,
    failing: AtomicBool,
}

impl SimulatedFlasher {
    /// Creates a simulated flasher.
    #[must_use]
    pub fn new(install_dir: impl Into<PathBuf>, delay: Duration) -> Self {
        Self {
            install_dir: install_dir.into(),
            delay,
            installs: AtomicUsize::new(0),
            failing: AtomicBool::new(false),
        }
    }

    /// Makes every later install fail (or succeed again).
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Number of install attempts so far.
    #[must_use]
    pub fn install_count(&self) -> usize {
        self.installs.load(Ordering::SeqCst)
    }

    /// Where installed images go.
    #[must_use]
    pub fn install_dir(&self) -> &Path {
        &self.install_dir
    }
}

#[async_trait]
impl Flasher for SimulatedFlasher {
    async fn install(&self, image: &Path) -> Result<PathBuf, InstallError> {
        self.installs.fetch_add(1, Ordering::SeqCst);
        info!("Flashing {} ({:?})", image.display(), self.delay);

        tokio::time::sleep(self.delay).await;

        if self.failing.load(Ordering::SeqCst) {
            return Err(InstallError::Failed {
                reason: "simulated flash failure".into(),
            });
        }

        let name = image
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .ok_or_else(|| InstallError::Failed {
                reason: format!("{} has no file name", image.display()),
            })?;
        let target = self.install_dir.join(format!("{name}.installed"));

        tokio::fs::create_dir_all(&self.install_dir)
            .await
            .map_err(|e| InstallError::io(self.install_dir.display().to_string(), e))?;
        tokio::fs::copy(image, &target)
            .await
            .map_err(|e| InstallError::io(image.display().to_string(), e))?;

        debug!("Installed image at {}", target.display());
        Ok(target)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_simulated_install_copies_image() {
        let dir = TempDir::new().unwrap();
        let image = dir.path().join("a1.bin");
        tokio::fs::write(&image, b"firmware").await.unwrap();

        let flasher = SimulatedFlasher::new(dir.path().join("installed"), Duration::ZERO);
        let installed = flasher.install(&image).await.unwrap();

        assert_eq!(installed, dir.path().join("installed").join("a1.bin.installed"));
        assert_eq!(tokio::fs::read(&installed).await.unwrap(), b"firmware");
        assert_eq!(flasher.install_count(), 1);
    }

    #[tokio::test]
    async fn test_failing_flasher() {
        let dir = TempDir::new().unwrap();
        let image = dir.path().join("a1.bin");
        tokio::fs::write(&image, b"firmware").await.unwrap();

        let flasher = SimulatedFlasher::new(dir.path(), Duration::ZERO);
        flasher.set_failing(true);
        let err = flasher.install(&image).await.unwrap_err();
        assert!(matches!(err, InstallError::Failed { .. }));
        assert_eq!(flasher.install_count(), 1);
    }

    #[tokio::test]
    async fn test_missing_image() {
        let dir = TempDir::new().unwrap();
        let flasher = SimulatedFlasher::new(dir.path(), Duration::ZERO);
        let err = flasher.install(&dir.path().join("nope.bin")).await.unwrap_err();
        assert!(matches!(err, InstallError::Io { .. }));
    }

    #[tokio::test]
    async fn test_install_waits_for_delay() {
        let dir = TempDir::new().unwrap();
        let image = dir.path().join("a1.bin");
        tokio::fs::write(&image, b"fw").await.unwrap();

        let flasher = SimulatedFlasher::new(dir.path().join("out"), Duration::from_millis(50));
        let started = std::time::Instant::now();
        flasher.install(&image).await.unwrap();
        assert!(started.elapsed() >= Duration::from_millis(50));
    }
}
