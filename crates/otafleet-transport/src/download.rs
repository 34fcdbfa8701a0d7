// ============================================
// File: crates/otafleet-transport/src/download.rs
// ============================================
//! # Firmware Downloader
//!
//! ## Main Logical Flow
//! 1. Remove any image (and leftover `.partial`) at the destination
//! 2. Plain GET of the download URL, no auth headers
//! 3. Anything but 200 is an error
//! 4. Stream the body chunk by chunk into `{dest}.partial`
//! 5. Rename `.partial` to `dest`
//!
//! ## ⚠️ Important Note for Next Developer
//! - Step 1 is what keeps a stale image from an earlier session from ever
//!   being verified in place of the current download
//! - No resume: a failed fetch deletes its `.partial` and the next session
//!   starts from zero
//!
//! ## Last Modified
//! v0.1.0 - Initial downloader

use std::ffi::OsString;
use std::io;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use reqwest::Client;
use tokio::io::AsyncWriteExt;
use tracing::debug;

use crate::error::{Result, TransportError};
use crate::https::TransportConfig;
use crate::traits::{Download, FirmwareSource};

// ============================================
// File Helpers
// ============================================

/// Returns `{dest}.partial`.
#[must_use]
pub fn partial_path(dest: &Path) -> PathBuf {
    let mut name = OsString::from(dest.as_os_str());
    name.push(".partial");
    PathBuf::from(name)
}

async fn remove_if_exists(path: &Path) -> Result<()> {
    match tokio::fs::remove_file(path).await {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(TransportError::io(format!("removing {}", path.display()), e)),
    }
}

/// Clears `dest` and its `.partial`, creates the parent directory, and
/// returns the `.partial` path to write into.
pub(crate) async fn begin_fetch(dest: &Path) -> Result<PathBuf> {
    let partial = partial_path(dest);
    remove_if_exists(dest).await?;
    remove_if_exists(&partial).await?;

    if let Some(parent) = dest.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|e| TransportError::io(format!("creating {}", parent.display()), e))?;
    }
    Ok(partial)
}

/// Moves a completed `.partial` into place.
pub(crate) async fn finish_fetch(partial: &Path, dest: &Path, bytes: u64) -> Result<Download> {
    tokio::fs::rename(partial, dest)
        .await
        .map_err(|e| TransportError::io(format!("renaming {}", partial.display()), e))?;
    Ok(Download {
        path: dest.to_path_buf(),
        bytes,
    })
}

// ============================================
// HttpFirmwareSource
// ============================================

/// reqwest-backed `FirmwareSource`.
pub struct HttpFirmwareSource {
    http: Client,
}

impl HttpFirmwareSource {
    /// Creates a downloader with the control plane's TLS settings and a
    /// stall timeout instead of a total one.
    ///
    /// # Errors
    /// See [`TransportConfig::build_download_client`].
    pub fn new(config: &TransportConfig) -> Result<Self> {
        Ok(Self {
            http: config.build_download_client()?,
        })
    }

    async fn stream_to(&self, url: &str, partial: &Path) -> Result<u64> {
        let mut response = self
            .http
            .get(url)
            .send()
            .await
            .map_err(|e| TransportError::from_send(url, &e))?;

        let status = response.status().as_u16();
        if status != 200 {
            return Err(TransportError::HttpStatus {
                target: url.to_string(),
                status,
            });
        }

        let context = partial.display().to_string();
        let mut file = tokio::fs::File::create(partial)
            .await
            .map_err(|e| TransportError::io(&context, e))?;

        let mut bytes = 0u64;
        while let Some(chunk) = response
            .chunk()
            .await
            .map_err(|e| TransportError::from_receive(url, &e))?
        {
            file.write_all(&chunk)
                .await
                .map_err(|e| TransportError::io(&context, e))?;
            bytes += chunk.len() as u64;
        }

        file.flush()
            .await
            .map_err(|e| TransportError::io(&context, e))?;
        Ok(bytes)
    }
}

impl std::fmt::Debug for HttpFirmwareSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpFirmwareSource").finish_non_exhaustive()
    }
}

#[async_trait]
impl FirmwareSource for HttpFirmwareSource {
    async fn fetch(&self, url: &str, dest: &Path) -> Result<Download> {
        let partial = begin_fetch(dest).await?;

        match self.stream_to(url, &partial).await {
            Ok(bytes) => {
                debug!("Fetched {} bytes from {}", bytes, url);
                finish_fetch(&partial, dest, bytes).await
            }
            Err(e) => {
                remove_if_exists(&partial).await.ok();
                Err(e)
            }
        }
    }
}

// ============================================
// Tests
// ============================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::https::tests::{plain_config, read_request, serve_once};
    use std::time::Duration;
    use tempfile::TempDir;
    use tokio::io::AsyncWriteExt;
    use tokio::net::TcpListener;
    use tokio::task::JoinHandle;

    /// Serves `chunks` of `chunk_len` bytes, sleeping `gap` before each one.
    async fn serve_trickle(chunks: usize, chunk_len: usize, gap: Duration) -> (u16, JoinHandle<()>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();

        let handle = tokio::spawn(async move {
            let (mut stream, _) = listener.accept().await.unwrap();
            read_request(&mut stream).await;

            let head = format!(
                "HTTP/1.1 200 OK\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
                chunks * chunk_len
            );
            stream.write_all(head.as_bytes()).await.unwrap();
            for i in 0..chunks {
                tokio::time::sleep(gap).await;
                if stream.write_all(&vec![i as u8; chunk_len]).await.is_err() {
                    return;
                }
                stream.flush().await.ok();
            }
            stream.shutdown().await.ok();
        });

        (port, handle)
    }

    #[test]
    fn test_partial_path() {
        assert_eq!(
            partial_path(Path::new("/var/fw/a1.bin")),
            PathBuf::from("/var/fw/a1.bin.partial")
        );
    }

    #[tokio::test]
    async fn test_fetch_writes_body_and_removes_partial() {
        let body: Vec<u8> = (0..20_000u32).map(|i| (i % 253) as u8).collect();
        let (port, server) = serve_once("200 OK", body.clone()).await;
        let source = HttpFirmwareSource::new(&plain_config(port)).unwrap();

        let dir = TempDir::new().unwrap();
        let dest = dir.path().join("fw").join("a1.bin");
        let url = format!("http://127.0.0.1:{port}/firmware/1.1.bin");

        let download = source.fetch(&url, &dest).await.unwrap();
        assert_eq!(download.bytes, body.len() as u64);
        assert_eq!(download.path, dest);
        assert_eq!(tokio::fs::read(&dest).await.unwrap(), body);
        assert!(!partial_path(&dest).exists());

        let request = server.await.unwrap();
        assert!(request.starts_with("GET /firmware/1.1.bin HTTP/1.1"));
        assert!(!request.to_ascii_lowercase().contains("nodeid:"));
    }

    #[tokio::test]
    async fn test_non_200_fails_and_clears_stale_image() {
        let (port, server) = serve_once("404 Not Found", b"missing".to_vec()).await;
        let source = HttpFirmwareSource::new(&plain_config(port)).unwrap();

        let dir = TempDir::new().unwrap();
        let dest = dir.path().join("a1.bin");
        tokio::fs::write(&dest, b"stale image from last run").await.unwrap();

        let url = format!("http://127.0.0.1:{port}/fw.bin");
        let err = source.fetch(&url, &dest).await.unwrap_err();
        assert!(matches!(err, TransportError::HttpStatus { status: 404, .. }));
        assert!(!dest.exists());
        assert!(!partial_path(&dest).exists());
        server.await.unwrap();
    }

    #[tokio::test]
    async fn test_slow_steady_download_outlives_request_timeout() {
        let (port, server) = serve_trickle(10, 1024, Duration::from_millis(100)).await;
        let mut config = plain_config(port);
        config.request_timeout = Duration::from_millis(300);
        let source = HttpFirmwareSource::new(&config).unwrap();

        let dir = TempDir::new().unwrap();
        let dest = dir.path().join("a1.bin");
        let url = format!("http://127.0.0.1:{port}/fw.bin");

        let started = std::time::Instant::now();
        let download = source.fetch(&url, &dest).await.unwrap();
        assert!(started.elapsed() > Duration::from_millis(300));
        assert_eq!(download.bytes, 10 * 1024);
        assert_eq!(tokio::fs::read(&dest).await.unwrap().len(), 10 * 1024);
        server.await.unwrap();
    }

    #[tokio::test]
    async fn test_stalled_download_times_out() {
        let (port, server) = serve_trickle(2, 1024, Duration::from_secs(2)).await;
        let mut config = plain_config(port);
        config.request_timeout = Duration::from_millis(200);
        let source = HttpFirmwareSource::new(&config).unwrap();

        let dir = TempDir::new().unwrap();
        let dest = dir.path().join("a1.bin");
        let url = format!("http://127.0.0.1:{port}/fw.bin");

        let err = source.fetch(&url, &dest).await.unwrap_err();
        assert!(
            err.is_timeout() || matches!(err, TransportError::Receive { .. }),
            "got {err:?}"
        );
        assert!(!dest.exists());
        assert!(!partial_path(&dest).exists());
        server.abort();
    }
}
