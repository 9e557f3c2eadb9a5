//! Unified error handling for update operations.
//!
//! Each component reports its own error type at its boundary
//! ([`FetchError`], [`DownloadError`], [`IntegrityError`], [`BackupError`],
//! [`InstallError`], [`StateError`]). This module folds them into
//! [`UpdateError`] and provides:
//! - Error categorization for handling decisions
//! - Stable error codes for logs and the audit file
//! - User-friendly messages for notifications

use std::fmt;
use thiserror::Error;

pub use super::backup::BackupError;
pub use super::checker::FetchError;
pub use super::downloader::DownloadError;
pub use super::installer::InstallError;
pub use super::state::StateError;
pub use super::verifier::IntegrityError;

/// Category of an update error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UpdateErrorCategory {
    /// Release endpoint unreachable or returned something unusable
    Fetch,
    /// Artifact could not be downloaded
    Download,
    /// Artifact digest did not match
    Integrity,
    /// Installed artifact could not be snapshotted
    Backup,
    /// Installer failed or timed out
    Install,
    /// Post-install health check failed
    HealthCheck,
    /// Reinstalling the backup failed
    Rollback,
    /// Durable state could not be read or written
    State,
    /// A cycle was refused because another one is in flight
    Concurrency,
}

impl UpdateErrorCategory {
    /// Fetch and download failures are transient; the scheduler may retry them.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            UpdateErrorCategory::Fetch | UpdateErrorCategory::Download
        )
    }

    /// Returns a short label for the category.
    pub fn as_str(&self) -> &'static str {
        match self {
            UpdateErrorCategory::Fetch => "fetch",
            UpdateErrorCategory::Download => "download",
            UpdateErrorCategory::Integrity => "integrity",
            UpdateErrorCategory::Backup => "backup",
            UpdateErrorCategory::Install => "install",
            UpdateErrorCategory::HealthCheck => "health_check",
            UpdateErrorCategory::Rollback => "rollback",
            UpdateErrorCategory::State => "state",
            UpdateErrorCategory::Concurrency => "concurrency",
        }
    }
}

impl fmt::Display for UpdateErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Any failure the update agent can run into.
#[derive(Debug, Error)]
pub enum UpdateError {
    #[error("release check failed: {0}")]
    Fetch(#[from] FetchError),

    #[error("download failed: {0}")]
    Download(#[from] DownloadError),

    #[error("integrity check failed: {0}")]
    Integrity(#[from] IntegrityError),

    #[error("backup failed: {0}")]
    Backup(#[from] BackupError),

    #[error("install failed: {0}")]
    Install(#[from] InstallError),

    #[error("health check failed: {}", failed.join(", "))]
    HealthCheck { failed: Vec<String> },

    #[error("rollback failed: {0}")]
    Rollback(InstallError),

    #[error("state file error: {0}")]
    State(#[from] StateError),

    #[error("an update cycle is already in progress ({phase})")]
    CycleInProgress { phase: String },

    #[error("installation requires manual intervention: {reason}")]
    ManualInterventionRequired { reason: String },
}

impl UpdateError {
    /// Get the category of this error.
    pub fn category(&self) -> UpdateErrorCategory {
        match self {
            UpdateError::Fetch(_) => UpdateErrorCategory::Fetch,
            UpdateError::Download(_) => UpdateErrorCategory::Download,
            UpdateError::Integrity(_) => UpdateErrorCategory::Integrity,
            UpdateError::Backup(_) => UpdateErrorCategory::Backup,
            UpdateError::Install(_) => UpdateErrorCategory::Install,
            UpdateError::HealthCheck { .. } => UpdateErrorCategory::HealthCheck,
            UpdateError::Rollback(_) => UpdateErrorCategory::Rollback,
            UpdateError::State(_) => UpdateErrorCategory::State,
            UpdateError::CycleInProgress { .. }
            | UpdateError::ManualInterventionRequired { .. } => UpdateErrorCategory::Concurrency,
        }
    }

    /// Check if this error is likely transient and the operation can be retried.
    pub fn is_retryable(&self) -> bool {
        self.category().is_retryable()
    }

    /// Only a failed rollback leaves the installation in a state nobody can
    /// repair automatically.
    pub fn requires_manual_intervention(&self) -> bool {
        matches!(
            self,
            UpdateError::Rollback(_) | UpdateError::ManualInterventionRequired { .. }
        )
    }

    /// Get a short error code suitable for logging.
    pub fn error_code(&self) -> &'static str {
        match self {
            UpdateError::Fetch(e) => e.error_code(),
            UpdateError::Download(e) => e.error_code(),
            UpdateError::Integrity(e) => e.error_code(),
            UpdateError::Backup(e) => e.error_code(),
            UpdateError::Install(e) => e.error_code(),
            UpdateError::HealthCheck { .. } => "E_HEALTH_CHECK",
            UpdateError::Rollback(_) => "E_ROLLBACK_CRITICAL",
            UpdateError::State(_) => "E_STATE",
            UpdateError::CycleInProgress { .. } => "E_CYCLE_IN_PROGRESS",
            UpdateError::ManualInterventionRequired { .. } => "E_FLAGGED",
        }
    }

    /// Get a user-friendly error message suitable for a notification.
    pub fn user_message(&self) -> String {
        match self {
            UpdateError::Fetch(FetchError::RateLimited) => {
                "The release server is rate limiting update checks. The next scheduled check will try again.".to_string()
            }
            UpdateError::Fetch(FetchError::ServerError { status, .. }) => match *status {
                404 => "No published release was found on the update server.".to_string(),
                500..=599 => "The update server is experiencing issues. The next scheduled check will try again.".to_string(),
                _ => format!("The update server returned an error (HTTP {}).", status),
            },
            UpdateError::Fetch(_) => {
                "Unable to check for updates. Please check your internet connection.".to_string()
            }
            UpdateError::Download(DownloadError::Io { source, .. }) if is_disk_space_error(source) => {
                "Not enough disk space to download the update. Please free up some space.".to_string()
            }
            UpdateError::Download(_) => {
                "The update could not be downloaded. It will be retried later.".to_string()
            }
            UpdateError::Integrity(_) => {
                "The downloaded update failed integrity verification and was discarded.".to_string()
            }
            UpdateError::Backup(BackupError::Io { source, .. }) if is_disk_space_error(source) => {
                "Not enough disk space to back up the current version. The update was cancelled.".to_string()
            }
            UpdateError::Backup(_) => {
                "The current version could not be backed up. The update was cancelled.".to_string()
            }
            UpdateError::Install(InstallError::TimedOut { secs }) => format!(
                "The installer did not finish within {} seconds. Keeping the current version.",
                secs
            ),
            UpdateError::Install(_) => {
                "Installation failed. Keeping the current version.".to_string()
            }
            UpdateError::HealthCheck { failed } => format!(
                "The new version failed its health check ({}). Rolling back.",
                failed.join(", ")
            ),
            UpdateError::Rollback(e) => format!(
                "CRITICAL: restoring the previous version failed ({}). Manual intervention is required.",
                e
            ),
            UpdateError::State(_) => {
                "The update state file could not be accessed.".to_string()
            }
            UpdateError::CycleInProgress { phase } => {
                format!("An update is already in progress ({}).", phase)
            }
            UpdateError::ManualInterventionRequired { reason } => format!(
                "Updates are paused until the installation is repaired: {}",
                reason
            ),
        }
    }
}

/// Stable error code reported alongside an error in logs.
pub trait ErrorCode: fmt::Display {
    fn error_code(&self) -> &'static str;
}

impl ErrorCode for UpdateError {
    fn error_code(&self) -> &'static str {
        UpdateError::error_code(self)
    }
}

impl ErrorCode for FetchError {
    fn error_code(&self) -> &'static str {
        match self {
            FetchError::Http { .. } => "E_FETCH_HTTP",
            FetchError::Timeout { .. } => "E_FETCH_TIMEOUT",
            FetchError::ServerError { .. } => "E_FETCH_SERVER",
            FetchError::RateLimited => "E_FETCH_RATE_LIMITED",
            FetchError::InvalidResponse(_) => "E_FETCH_INVALID_RESPONSE",
            FetchError::MissingField(_) => "E_FETCH_MISSING_FIELD",
            FetchError::InvalidTimestamp(_) => "E_FETCH_TIMESTAMP",
        }
    }
}

impl ErrorCode for DownloadError {
    fn error_code(&self) -> &'static str {
        match self {
            DownloadError::Http { .. } => "E_DOWNLOAD_HTTP",
            DownloadError::Timeout { .. } => "E_DOWNLOAD_TIMEOUT",
            DownloadError::Io { source, .. } if is_disk_space_error(source) => "E_DISK_FULL",
            DownloadError::Io { .. } => "E_DOWNLOAD_IO",
            DownloadError::EmptyDownload => "E_EMPTY_DOWNLOAD",
            DownloadError::SizeMismatch { .. } => "E_SIZE_MISMATCH",
        }
    }
}

impl ErrorCode for IntegrityError {
    fn error_code(&self) -> &'static str {
        match self {
            IntegrityError::DigestMismatch { .. } => "E_CHECKSUM",
            IntegrityError::Unreadable { .. } => "E_CHECKSUM_IO",
        }
    }
}

impl ErrorCode for BackupError {
    fn error_code(&self) -> &'static str {
        match self {
            BackupError::SourceMissing(_) => "E_BACKUP_SOURCE_MISSING",
            BackupError::Io { source, .. } if is_disk_space_error(source) => "E_DISK_FULL",
            BackupError::Io { .. } => "E_BACKUP_IO",
            BackupError::SizeMismatch { .. } => "E_BACKUP_SIZE_MISMATCH",
            BackupError::TimedOut { .. } => "E_BACKUP_TIMEOUT",
        }
    }
}

impl ErrorCode for InstallError {
    fn error_code(&self) -> &'static str {
        match self {
            InstallError::TimedOut { .. } => "E_INSTALL_TIMEOUT",
            InstallError::Installer(_) => "E_INSTALL",
        }
    }
}

/// Check if an I/O error is a disk space error.
pub(crate) fn is_disk_space_error(err: &std::io::Error) -> bool {
    #[cfg(unix)]
    {
        // ENOSPC = 28, EDQUOT = 122 on Linux, 69 on macOS
        matches!(err.raw_os_error(), Some(28) | Some(122) | Some(69))
    }
    #[cfg(not(unix))]
    {
        let msg = err.to_string().to_lowercase();
        msg.contains("no space") || msg.contains("disk full") || msg.contains("quota")
    }
}
