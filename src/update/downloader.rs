//! Artifact downloader.
//!
//! Streams a release asset into a dedicated cache file. The SHA-256 digest is
//! computed while the bytes go past, so the artifact never has to be held in
//! memory. A failed download leaves whatever was written in the cache file;
//! the orchestrator discards it.

use futures_util::StreamExt;
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::io::AsyncWriteExt;

use super::logger::UpdateLogger;
use crate::traits::{Headers, HttpClient, HttpError};

/// Default timeout for a whole download.
pub const DOWNLOAD_TIMEOUT_SECS: u64 = 600;

/// Progress is logged every time this many more bytes have arrived.
const PROGRESS_LOG_INTERVAL: u64 = 1024 * 1024;

const USER_AGENT: &str = concat!("autopatch/", env!("CARGO_PKG_VERSION"));

/// Errors raised while downloading an artifact.
#[derive(Debug, Error)]
pub enum DownloadError {
    #[error("download from {url} failed: {source}")]
    Http {
        url: String,
        #[source]
        source: HttpError,
    },

    #[error("download from {url} timed out after {secs}s")]
    Timeout { url: String, secs: u64 },

    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("downloaded file is empty")]
    EmptyDownload,

    #[error("size mismatch: expected {expected} bytes, got {actual} bytes")]
    SizeMismatch { expected: u64, actual: u64 },
}

/// A release asset sitting in the cache file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadedArtifact {
    pub path: PathBuf,
    pub size: u64,
    /// Lowercase hex SHA-256 of the bytes written
    pub digest: String,
}

/// Streams release assets into a single cache file.
#[derive(Clone)]
pub struct ArtifactDownloader {
    http: Arc<dyn HttpClient>,
    cache_path: PathBuf,
    timeout: Duration,
}

impl std::fmt::Debug for ArtifactDownloader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ArtifactDownloader")
            .field("cache_path", &self.cache_path)
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

impl ArtifactDownloader {
    pub fn new(http: Arc<dyn HttpClient>, cache_path: impl Into<PathBuf>) -> Self {
        Self {
            http,
            cache_path: cache_path.into(),
            timeout: Duration::from_secs(DOWNLOAD_TIMEOUT_SECS),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn cache_path(&self) -> &Path {
        &self.cache_path
    }

    /// Whether a (possibly partial) artifact is sitting in the cache.
    pub fn has_cached_artifact(&self) -> bool {
        self.cache_path.exists()
    }

    /// Download `url` into the cache file, replacing any stale content.
    pub async fn download(
        &self,
        url: &str,
        version: &str,
    ) -> Result<DownloadedArtifact, DownloadError> {
        let mut logger = UpdateLogger::new();
        logger.log_download_started(version, url);

        let result = match tokio::time::timeout(
            self.timeout,
            self.stream_to_cache(url, version, &logger),
        )
        .await
        {
            Ok(result) => result,
            Err(_) => Err(DownloadError::Timeout {
                url: url.to_string(),
                secs: self.timeout.as_secs(),
            }),
        };

        match &result {
            Ok(artifact) => logger.log_download_completed(version, &artifact.path, artifact.size),
            Err(e) => logger.log_download_failed(version, e),
        }

        result
    }

    async fn stream_to_cache(
        &self,
        url: &str,
        version: &str,
        logger: &UpdateLogger,
    ) -> Result<DownloadedArtifact, DownloadError> {
        if let Some(parent) = self.cache_path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| self.io_error(e))?;
        }

        let mut headers = Headers::new();
        headers.insert("User-Agent".to_string(), USER_AGENT.to_string());
        headers.insert("Accept".to_string(), "application/octet-stream".to_string());

        let mut response = self
            .http
            .get_stream(url, &headers)
            .await
            .map_err(|source| self.http_error(url, source))?;
        let content_length = response.content_length;

        let mut hasher = Sha256::new();
        let mut written: u64 = 0;
        let mut next_progress = PROGRESS_LOG_INTERVAL;

        {
            // File::create truncates any stale partial download.
            let mut file = tokio::fs::File::create(&self.cache_path)
                .await
                .map_err(|e| self.io_error(e))?;

            while let Some(chunk) = response.body.next().await {
                let chunk = chunk.map_err(|source| self.http_error(url, source))?;
                file.write_all(&chunk)
                    .await
                    .map_err(|e| self.io_error(e))?;
                hasher.update(&chunk);
                written += chunk.len() as u64;

                if written >= next_progress {
                    logger.log_download_progress(version, written, content_length);
                    next_progress = written + PROGRESS_LOG_INTERVAL;
                }
            }

            file.flush().await.map_err(|e| self.io_error(e))?;
            file.sync_all().await.map_err(|e| self.io_error(e))?;
        }

        if written == 0 {
            return Err(DownloadError::EmptyDownload);
        }
        if let Some(expected) = content_length {
            if expected != written {
                return Err(DownloadError::SizeMismatch {
                    expected,
                    actual: written,
                });
            }
        }

        Ok(DownloadedArtifact {
            path: self.cache_path.clone(),
            size: written,
            digest: hex::encode(hasher.finalize()),
        })
    }

    /// Delete the cache file. Returns whether a file was removed.
    pub async fn discard(&self) -> Result<bool, DownloadError> {
        match tokio::fs::remove_file(&self.cache_path).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(self.io_error(e)),
        }
    }

    fn io_error(&self, source: std::io::Error) -> DownloadError {
        DownloadError::Io {
            path: self.cache_path.clone(),
            source,
        }
    }

    fn http_error(&self, url: &str, source: HttpError) -> DownloadError {
        match source {
            HttpError::Timeout(_) => DownloadError::Timeout {
                url: url.to_string(),
                secs: self.timeout.as_secs(),
            },
            source => DownloadError::Http {
                url: url.to_string(),
                source,
            },
        }
    }
}
