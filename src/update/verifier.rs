//! Integrity verification of downloaded artifacts.

use sha2::{Digest, Sha256};
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};
use thiserror::Error;

use super::downloader::DownloadedArtifact;

const HASH_CHUNK_SIZE: usize = 64 * 1024;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IntegrityError {
    #[error("digest mismatch: expected {expected}, got {actual}")]
    DigestMismatch { expected: String, actual: String },

    #[error("cannot hash {}: {message}", path.display())]
    Unreadable { path: PathBuf, message: String },
}

/// SHA-256 of a file as lowercase hex.
pub fn sha256_file(path: &Path) -> std::io::Result<String> {
    let mut file = File::open(path)?;
    let mut hasher = Sha256::new();
    let mut buffer = vec![0u8; HASH_CHUNK_SIZE];

    loop {
        let bytes_read = file.read(&mut buffer)?;
        if bytes_read == 0 {
            break;
        }
        hasher.update(&buffer[..bytes_read]);
    }

    Ok(hex::encode(hasher.finalize()))
}

/// Compares an artifact against the digest published with its release.
///
/// A release without a digest is accepted as-is.
#[derive(Debug, Clone, Copy, Default)]
pub struct IntegrityVerifier;

impl IntegrityVerifier {
    pub fn new() -> Self {
        Self
    }

    /// Whether `path` matches `expected`. An unreadable file never matches.
    pub async fn verify(&self, path: &Path, expected: Option<&str>) -> bool {
        self.check(path, expected).await.is_ok()
    }

    /// Like [`verify`](Self::verify), with the reason for a failure.
    ///
    /// Hashing runs on the blocking pool.
    pub async fn check(&self, path: &Path, expected: Option<&str>) -> Result<(), IntegrityError> {
        let Some(expected) = expected else {
            tracing::debug!(
                target: "autopatch::update",
                "No digest published for {}, skipping verification",
                path.display()
            );
            return Ok(());
        };

        let owned = path.to_path_buf();
        let actual = tokio::task::spawn_blocking(move || sha256_file(&owned))
            .await
            .map_err(|e| IntegrityError::Unreadable {
                path: path.to_path_buf(),
                message: e.to_string(),
            })?
            .map_err(|e| IntegrityError::Unreadable {
                path: path.to_path_buf(),
                message: e.to_string(),
            })?;

        if actual.eq_ignore_ascii_case(expected.trim()) {
            Ok(())
        } else {
            Err(IntegrityError::DigestMismatch {
                expected: expected.to_string(),
                actual,
            })
        }
    }

    /// Check a fresh download.
    ///
    /// The digest computed while streaming must match `expected`, and the
    /// cache file must still hash to it, so nothing rewrote the file between
    /// download and install.
    pub async fn check_download(
        &self,
        artifact: &DownloadedArtifact,
        expected: Option<&str>,
    ) -> Result<(), IntegrityError> {
        if let Some(expected) = expected {
            if !artifact.digest.eq_ignore_ascii_case(expected.trim()) {
                return Err(IntegrityError::DigestMismatch {
                    expected: expected.to_string(),
                    actual: artifact.digest.clone(),
                });
            }
        }
        self.check(&artifact.path, expected).await
    }
}
