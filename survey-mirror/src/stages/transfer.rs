//! Transfer stage: fetch a source into the mirror.
//!
//! The [`Fetcher`] trait is the seam between the pipeline and the transport.
//! [`ArchiveFetcher`] handles the three source kinds found in recipes:
//! `http(s)://` URLs (streamed with reqwest), `file://` URLs and plain
//! filesystem paths (copied).
//!
//! The fetcher always writes to a temporary path; [`transfer`] owns the
//! commit and the cleanup.

use std::future::Future;
use std::path::Path;
use std::pin::Pin;
use std::time::Duration;

use tokio::io::AsyncWriteExt;
use tracing::debug;

use crate::error::{PipelineError, StageError};
use crate::fsutil;

/// Default HTTP read timeout in seconds.
pub const DEFAULT_TIMEOUT_SECS: u64 = 300;

/// Time allowed to establish a connection to the archive.
pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Boxed future type for dyn-compatible async methods.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Moves bytes from a source location to a local file.
pub trait Fetcher: Send + Sync {
    /// Writes the content at `source` into `dest`, creating or truncating it.
    ///
    /// Returns the number of bytes written. On error, `dest` may hold partial
    /// content; the caller removes it.
    fn fetch<'a>(&'a self, source: &'a str, dest: &'a Path) -> BoxFuture<'a, Result<u64, StageError>>;
}

/// Fetcher for the survey archive and local sources.
#[derive(Debug, Clone)]
pub struct ArchiveFetcher {
    client: reqwest::Client,
}

impl ArchiveFetcher {
    /// Creates a fetcher whose downloads fail after `timeout` without
    /// receiving data.
    ///
    /// The download as a whole is unbounded.
    pub fn new(timeout: Duration) -> Result<Self, PipelineError> {
        let client = reqwest::Client::builder()
            .connect_timeout(CONNECT_TIMEOUT.min(timeout))
            .read_timeout(timeout)
            .build()
            .map_err(|e| PipelineError::HttpClient(e.to_string()))?;
        Ok(Self { client })
    }

    async fn download(&self, url: &str, dest: &Path) -> Result<u64, StageError> {
        let mut response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| StageError::transport(url, e))?;

        if !response.status().is_success() {
            return Err(StageError::transport(url, format!("HTTP {}", response.status())));
        }

        let mut file = tokio::fs::File::create(dest)
            .await
            .map_err(|e| StageError::transport(url, e))?;
        let mut written = 0u64;

        while let Some(chunk) = response
            .chunk()
            .await
            .map_err(|e| StageError::transport(url, e))?
        {
            file.write_all(&chunk)
                .await
                .map_err(|e| StageError::transport(url, e))?;
            written += chunk.len() as u64;
        }

        file.flush().await.map_err(|e| StageError::transport(url, e))?;
        Ok(written)
    }

    async fn copy(&self, location: &str, from: &Path, dest: &Path) -> Result<u64, StageError> {
        tokio::fs::copy(from, dest)
            .await
            .map_err(|e| StageError::transport(location, e))
    }
}

impl Fetcher for ArchiveFetcher {
    fn fetch<'a>(&'a self, source: &'a str, dest: &'a Path) -> BoxFuture<'a, Result<u64, StageError>> {
        Box::pin(async move {
            match fsutil::local_path(source) {
                Some(from) => self.copy(source, &from, dest).await,
                None if source.starts_with("http://") || source.starts_with("https://") => {
                    self.download(source, dest).await
                }
                None => Err(StageError::transport(source, "unsupported scheme")),
            }
        })
    }
}

/// Fetches `source` to `drain` through a `.part` temporary.
///
/// On any failure the temporary is removed and nothing appears at `drain`.
pub async fn transfer(fetcher: &dyn Fetcher, source: &str, drain: &Path) -> Result<u64, StageError> {
    let temp = fsutil::temp_path(drain);

    let bytes = match fetcher.fetch(source, &temp).await {
        Ok(bytes) => bytes,
        Err(e) => {
            fsutil::remove_if_exists(&temp).await;
            return Err(e);
        }
    };

    if let Err(source) = fsutil::commit(&temp, drain).await {
        fsutil::remove_if_exists(&temp).await;
        return Err(StageError::Commit {
            path: drain.to_path_buf(),
            source,
        });
    }

    debug!(drain = %drain.display(), bytes, "Transfer complete");
    Ok(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    /// Writes some bytes, then fails.
    struct BrokenFetcher;

    impl Fetcher for BrokenFetcher {
        fn fetch<'a>(&'a self, source: &'a str, dest: &'a Path) -> BoxFuture<'a, Result<u64, StageError>> {
            Box::pin(async move {
                tokio::fs::write(dest, b"partial").await.unwrap();
                Err(StageError::transport(source, "connection reset"))
            })
        }
    }

    fn fetcher() -> ArchiveFetcher {
        ArchiveFetcher::new(Duration::from_secs(5)).unwrap()
    }

    #[test]
    fn test_fetcher_builds_with_long_read_timeout() {
        assert!(ArchiveFetcher::new(Duration::from_secs(DEFAULT_TIMEOUT_SECS)).is_ok());
        assert!(ArchiveFetcher::new(Duration::from_secs(1)).is_ok());
    }

    #[tokio::test]
    async fn test_transfer_copies_local_path() {
        let dir = TempDir::new().unwrap();
        let source = dir.path().join("remote.zlas");
        std::fs::write(&source, b"zlas bytes").unwrap();
        let drain = dir.path().join("mirror.zlas");

        let bytes = transfer(&fetcher(), source.to_str().unwrap(), &drain).await.unwrap();

        assert_eq!(bytes, 10);
        assert_eq!(std::fs::read(&drain).unwrap(), b"zlas bytes");
        assert!(!fsutil::temp_path(&drain).exists());
    }

    #[tokio::test]
    async fn test_transfer_copies_file_url() {
        let dir = TempDir::new().unwrap();
        let source = dir.path().join("remote.asc");
        std::fs::write(&source, b"1;2;3").unwrap();
        let drain = dir.path().join("mirror.asc");
        let url = format!("file://{}", source.display());

        transfer(&fetcher(), &url, &drain).await.unwrap();
        assert_eq!(std::fs::read(&drain).unwrap(), b"1;2;3");
    }

    #[tokio::test]
    async fn test_missing_source_leaves_nothing() {
        let dir = TempDir::new().unwrap();
        let drain = dir.path().join("mirror.zlas");

        let err = transfer(&fetcher(), "/nonexistent/remote.zlas", &drain)
            .await
            .unwrap_err();

        assert_eq!(err.kind(), "transport");
        assert!(!drain.exists());
        assert!(!fsutil::temp_path(&drain).exists());
    }

    #[tokio::test]
    async fn test_failed_fetch_removes_partial_temp() {
        let dir = TempDir::new().unwrap();
        let drain = dir.path().join("mirror.png");

        let err = transfer(&BrokenFetcher, "http://archive/x.png", &drain)
            .await
            .unwrap_err();

        assert!(err.to_string().contains("connection reset"));
        assert!(!drain.exists());
        assert!(!fsutil::temp_path(&drain).exists());
    }

    #[tokio::test]
    async fn test_unsupported_scheme() {
        let dir = TempDir::new().unwrap();
        let drain = dir.path().join("x");
        let err = transfer(&fetcher(), "ftp://archive/x", &drain).await.unwrap_err();
        assert!(err.to_string().contains("unsupported scheme"));
    }

    #[tokio::test]
    async fn test_unreachable_host_is_transport_error() {
        let dir = TempDir::new().unwrap();
        let drain = dir.path().join("TM_462_101.zlas");

        let err = transfer(&fetcher(), "http://127.0.0.1:9/TM_462_101.zlas", &drain)
            .await
            .unwrap_err();

        assert_eq!(err.kind(), "transport");
        assert!(!drain.exists());
    }
}
