//! Update event logging.
//!
//! This module provides structured logging for every step of an update
//! cycle: release checks, downloads, verification, backup, install, the
//! post-install health check and rollback. All events go through `tracing`
//! under the `autopatch::update` target.

use std::path::Path;
use std::time::{Duration, Instant};

use super::errors::ErrorCode;

/// Log level for update events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateLogLevel {
    /// Debug information (detailed progress)
    Debug,
    /// Informational messages (normal operations)
    Info,
    /// Warnings (recoverable issues)
    Warn,
    /// Errors (operation failures)
    Error,
}

/// Types of update events that can be logged.
#[derive(Debug, Clone)]
pub enum UpdateEvent {
    // ========== Check Events ==========
    /// Starting an update check
    CheckStarted { current_version: String },
    /// Update check completed successfully
    CheckCompleted {
        current_version: String,
        latest_version: String,
        update_available: bool,
        duration: Duration,
    },
    /// Update check failed
    CheckFailed {
        error: String,
        error_code: String,
        duration: Duration,
    },

    // ========== Download Events ==========
    /// Starting a download
    DownloadStarted { version: String, url: String },
    /// Download progress update
    DownloadProgress {
        version: String,
        bytes_downloaded: u64,
        total_bytes: Option<u64>,
        percent: Option<f32>,
    },
    /// Download completed successfully
    DownloadCompleted {
        version: String,
        file_path: String,
        file_size: u64,
        duration: Duration,
    },
    /// Download failed
    DownloadFailed {
        version: String,
        error: String,
        error_code: String,
        duration: Duration,
    },

    // ========== Verification Events ==========
    /// Digest matched, or no digest was published
    VerificationPassed { version: String, checked: bool },
    /// Digest mismatch or unreadable artifact
    VerificationFailed {
        version: String,
        error: String,
        error_code: String,
    },

    // ========== Backup Events ==========
    /// Backup created
    BackupCreated { backup_path: String, size: u64 },
    /// Backup failed
    BackupFailed { error: String, error_code: String },

    // ========== Installation Events ==========
    /// Starting installation
    InstallStarted { version: String, installer: String },
    /// Installation completed successfully
    InstallCompleted { version: String, duration: Duration },
    /// Installation failed
    InstallFailed {
        version: String,
        error: String,
        error_code: String,
        duration: Duration,
    },

    // ========== Health Check Events ==========
    /// Delayed health check registered
    HealthCheckScheduled { version: String, delay: Duration },
    /// Every probe passed
    HealthCheckPassed { version: String, probes: usize },
    /// At least one probe failed
    HealthCheckFailed { version: String, failures: Vec<String> },

    // ========== Rollback Events ==========
    /// Starting rollback
    RollbackStarted { backup_path: String },
    /// Rollback completed
    RollbackCompleted {
        backup_path: String,
        duration: Duration,
    },
    /// Rollback failed
    RollbackFailed { error: String, duration: Duration },

    // ========== Cycle Events ==========
    /// A cycle was refused
    CycleSkipped { reason: String },
    /// A cycle ended
    CycleFinished { outcome: String, failed: bool },

    // ========== Cleanup Events ==========
    /// A cache or backup file was removed
    FileDiscarded { path: String },
}

impl UpdateEvent {
    /// Get the log level for this event.
    pub fn level(&self) -> UpdateLogLevel {
        match self {
            UpdateEvent::CheckStarted { .. }
            | UpdateEvent::DownloadStarted { .. }
            | UpdateEvent::DownloadProgress { .. }
            | UpdateEvent::VerificationPassed { .. }
            | UpdateEvent::BackupCreated { .. }
            | UpdateEvent::InstallStarted { .. }
            | UpdateEvent::RollbackStarted { .. }
            | UpdateEvent::FileDiscarded { .. } => UpdateLogLevel::Debug,

            UpdateEvent::CheckCompleted { .. }
            | UpdateEvent::DownloadCompleted { .. }
            | UpdateEvent::InstallCompleted { .. }
            | UpdateEvent::HealthCheckScheduled { .. }
            | UpdateEvent::HealthCheckPassed { .. }
            | UpdateEvent::RollbackCompleted { .. }
            | UpdateEvent::CycleSkipped { .. }
            | UpdateEvent::CycleFinished { failed: false, .. } => UpdateLogLevel::Info,

            UpdateEvent::HealthCheckFailed { .. }
            | UpdateEvent::CycleFinished { failed: true, .. } => UpdateLogLevel::Warn,

            UpdateEvent::CheckFailed { .. }
            | UpdateEvent::DownloadFailed { .. }
            | UpdateEvent::VerificationFailed { .. }
            | UpdateEvent::BackupFailed { .. }
            | UpdateEvent::InstallFailed { .. }
            | UpdateEvent::RollbackFailed { .. } => UpdateLogLevel::Error,
        }
    }

    /// Get a human-readable message for this event.
    pub fn message(&self) -> String {
        match self {
            UpdateEvent::CheckStarted { current_version } => {
                format!("Checking for updates (current: v{})", current_version)
            }
            UpdateEvent::CheckCompleted {
                current_version,
                latest_version,
                update_available,
                duration,
            } => {
                if *update_available {
                    format!(
                        "Update available: v{} -> v{} (checked in {:.1}s)",
                        current_version,
                        latest_version,
                        duration.as_secs_f32()
                    )
                } else {
                    format!(
                        "Already up to date: v{} (latest v{}, checked in {:.1}s)",
                        current_version,
                        latest_version,
                        duration.as_secs_f32()
                    )
                }
            }
            UpdateEvent::CheckFailed {
                error,
                error_code,
                duration,
            } => {
                format!(
                    "Update check failed [{}]: {} (after {:.1}s)",
                    error_code,
                    error,
                    duration.as_secs_f32()
                )
            }
            UpdateEvent::DownloadStarted { version, url } => {
                format!("Starting download of v{} from {}", version, url)
            }
            UpdateEvent::DownloadProgress {
                version,
                bytes_downloaded,
                total_bytes,
                percent,
            } => {
                let bytes_str = format_bytes(*bytes_downloaded);
                match (total_bytes, percent) {
                    (Some(total), Some(pct)) => {
                        let total_str = format_bytes(*total);
                        format!(
                            "Downloading v{}: {} / {} ({:.1}%)",
                            version, bytes_str, total_str, pct
                        )
                    }
                    _ => format!("Downloading v{}: {}", version, bytes_str),
                }
            }
            UpdateEvent::DownloadCompleted {
                version,
                file_path,
                file_size,
                duration,
            } => {
                format!(
                    "Download complete: v{} ({}) saved to {} in {:.1}s",
                    version,
                    format_bytes(*file_size),
                    file_path,
                    duration.as_secs_f32()
                )
            }
            UpdateEvent::DownloadFailed {
                version,
                error,
                error_code,
                duration,
            } => {
                format!(
                    "Download of v{} failed [{}]: {} (after {:.1}s)",
                    version,
                    error_code,
                    error,
                    duration.as_secs_f32()
                )
            }
            UpdateEvent::VerificationPassed { version, checked } => {
                if *checked {
                    format!("Digest verified for v{}", version)
                } else {
                    format!("No digest published for v{}, accepting artifact", version)
                }
            }
            UpdateEvent::VerificationFailed {
                version,
                error,
                error_code,
            } => {
                format!("Verification of v{} failed [{}]: {}", version, error_code, error)
            }
            UpdateEvent::BackupCreated { backup_path, size } => {
                format!("Backup created at {} ({})", backup_path, format_bytes(*size))
            }
            UpdateEvent::BackupFailed { error, error_code } => {
                format!("Backup failed [{}]: {}", error_code, error)
            }
            UpdateEvent::InstallStarted { version, installer } => {
                format!("Installing v{} with {}", version, installer)
            }
            UpdateEvent::InstallCompleted { version, duration } => {
                format!(
                    "Successfully installed v{} in {:.1}s",
                    version,
                    duration.as_secs_f32()
                )
            }
            UpdateEvent::InstallFailed {
                version,
                error,
                error_code,
                duration,
            } => {
                format!(
                    "Installation of v{} failed [{}]: {} (after {:.1}s)",
                    version,
                    error_code,
                    error,
                    duration.as_secs_f32()
                )
            }
            UpdateEvent::HealthCheckScheduled { version, delay } => {
                format!(
                    "Health check for v{} scheduled in {}s",
                    version,
                    delay.as_secs()
                )
            }
            UpdateEvent::HealthCheckPassed { version, probes } => {
                format!("v{} passed its health check ({} probes)", version, probes)
            }
            UpdateEvent::HealthCheckFailed { version, failures } => {
                format!(
                    "v{} failed its health check: {}",
                    version,
                    failures.join("; ")
                )
            }
            UpdateEvent::RollbackStarted { backup_path } => {
                format!("Rolling back from backup: {}", backup_path)
            }
            UpdateEvent::RollbackCompleted {
                backup_path,
                duration,
            } => {
                format!(
                    "Rollback complete from {} in {:.1}s",
                    backup_path,
                    duration.as_secs_f32()
                )
            }
            UpdateEvent::RollbackFailed { error, duration } => {
                format!(
                    "Rollback failed: {} (after {:.1}s)",
                    error,
                    duration.as_secs_f32()
                )
            }
            UpdateEvent::CycleSkipped { reason } => format!("Update cycle skipped: {}", reason),
            UpdateEvent::CycleFinished { outcome, .. } => {
                format!("Update cycle finished: {}", outcome)
            }
            UpdateEvent::FileDiscarded { path } => format!("Removed {}", path),
        }
    }
}

/// Format bytes in a human-readable way.
pub fn format_bytes(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;

    if bytes >= GB {
        format!("{:.2} GB", bytes as f64 / GB as f64)
    } else if bytes >= MB {
        format!("{:.2} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.2} KB", bytes as f64 / KB as f64)
    } else {
        format!("{} bytes", bytes)
    }
}

/// Logger for update operations.
///
/// This struct provides methods to log update events using the tracing framework.
/// It also maintains timing information for operation duration tracking.
#[derive(Debug)]
pub struct UpdateLogger {
    /// Start time of the current operation
    operation_start: Option<Instant>,
    /// Name of the current operation
    operation_name: Option<String>,
}

impl Default for UpdateLogger {
    fn default() -> Self {
        Self::new()
    }
}

impl UpdateLogger {
    /// Create a new UpdateLogger.
    pub fn new() -> Self {
        Self {
            operation_start: None,
            operation_name: None,
        }
    }

    /// Start timing an operation.
    pub fn start_operation(&mut self, name: &str) {
        self.operation_start = Some(Instant::now());
        self.operation_name = Some(name.to_string());
    }

    /// Get the elapsed duration since the operation started.
    pub fn elapsed(&self) -> Duration {
        self.operation_start
            .map(|start| start.elapsed())
            .unwrap_or_default()
    }

    /// Log an update event.
    pub fn log(&self, event: &UpdateEvent) {
        let message = event.message();
        let operation = self.operation_name.as_deref().unwrap_or("-");

        match event.level() {
            UpdateLogLevel::Debug => {
                tracing::debug!(target: "autopatch::update", operation, "{}", message);
            }
            UpdateLogLevel::Info => {
                tracing::info!(target: "autopatch::update", operation, "{}", message);
            }
            UpdateLogLevel::Warn => {
                tracing::warn!(target: "autopatch::update", operation, "{}", message);
            }
            UpdateLogLevel::Error => {
                tracing::error!(target: "autopatch::update", operation, "{}", message);
            }
        }
    }

    // ========== Convenience methods for common events ==========

    /// Log the start of an update check.
    pub fn log_check_started(&mut self, current_version: &str) {
        self.start_operation("check");
        self.log(&UpdateEvent::CheckStarted {
            current_version: current_version.to_string(),
        });
    }

    /// Log a successful update check.
    pub fn log_check_completed(
        &self,
        current_version: &str,
        latest_version: &str,
        update_available: bool,
    ) {
        self.log(&UpdateEvent::CheckCompleted {
            current_version: current_version.to_string(),
            latest_version: latest_version.to_string(),
            update_available,
            duration: self.elapsed(),
        });
    }

    /// Log a failed update check.
    pub fn log_check_failed(&self, error: &dyn ErrorCode) {
        self.log(&UpdateEvent::CheckFailed {
            error: error.to_string(),
            error_code: error.error_code().to_string(),
            duration: self.elapsed(),
        });
    }

    /// Log the start of a download.
    pub fn log_download_started(&mut self, version: &str, url: &str) {
        self.start_operation("download");
        self.log(&UpdateEvent::DownloadStarted {
            version: version.to_string(),
            url: url.to_string(),
        });
    }

    /// Log download progress.
    pub fn log_download_progress(
        &self,
        version: &str,
        bytes_downloaded: u64,
        total_bytes: Option<u64>,
    ) {
        let percent = total_bytes
            .filter(|total| *total > 0)
            .map(|total| (bytes_downloaded as f32 / total as f32) * 100.0);
        self.log(&UpdateEvent::DownloadProgress {
            version: version.to_string(),
            bytes_downloaded,
            total_bytes,
            percent,
        });
    }

    /// Log a successful download.
    pub fn log_download_completed(&self, version: &str, file_path: &Path, file_size: u64) {
        self.log(&UpdateEvent::DownloadCompleted {
            version: version.to_string(),
            file_path: file_path.display().to_string(),
            file_size,
            duration: self.elapsed(),
        });
    }

    /// Log a failed download.
    pub fn log_download_failed(&self, version: &str, error: &dyn ErrorCode) {
        self.log(&UpdateEvent::DownloadFailed {
            version: version.to_string(),
            error: error.to_string(),
            error_code: error.error_code().to_string(),
            duration: self.elapsed(),
        });
    }

    pub fn log_verification_passed(&self, version: &str, checked: bool) {
        self.log(&UpdateEvent::VerificationPassed {
            version: version.to_string(),
            checked,
        });
    }

    pub fn log_verification_failed(&self, version: &str, error: &dyn ErrorCode) {
        self.log(&UpdateEvent::VerificationFailed {
            version: version.to_string(),
            error: error.to_string(),
            error_code: error.error_code().to_string(),
        });
    }

    /// Log backup creation.
    pub fn log_backup_created(&self, backup_path: &Path, size: u64) {
        self.log(&UpdateEvent::BackupCreated {
            backup_path: backup_path.display().to_string(),
            size,
        });
    }

    pub fn log_backup_failed(&self, error: &dyn ErrorCode) {
        self.log(&UpdateEvent::BackupFailed {
            error: error.to_string(),
            error_code: error.error_code().to_string(),
        });
    }

    /// Log the start of an installation.
    pub fn log_install_started(&mut self, version: &str, installer: &str) {
        self.start_operation("install");
        self.log(&UpdateEvent::InstallStarted {
            version: version.to_string(),
            installer: installer.to_string(),
        });
    }

    /// Log a successful installation.
    pub fn log_install_completed(&self, version: &str) {
        self.log(&UpdateEvent::InstallCompleted {
            version: version.to_string(),
            duration: self.elapsed(),
        });
    }

    /// Log a failed installation.
    pub fn log_install_failed(&self, version: &str, error: &dyn ErrorCode) {
        self.log(&UpdateEvent::InstallFailed {
            version: version.to_string(),
            error: error.to_string(),
            error_code: error.error_code().to_string(),
            duration: self.elapsed(),
        });
    }

    pub fn log_health_check_scheduled(&self, version: &str, delay: Duration) {
        self.log(&UpdateEvent::HealthCheckScheduled {
            version: version.to_string(),
            delay,
        });
    }

    pub fn log_health_check_passed(&self, version: &str, probes: usize) {
        self.log(&UpdateEvent::HealthCheckPassed {
            version: version.to_string(),
            probes,
        });
    }

    pub fn log_health_check_failed(&self, version: &str, failures: &[String]) {
        self.log(&UpdateEvent::HealthCheckFailed {
            version: version.to_string(),
            failures: failures.to_vec(),
        });
    }

    /// Log the start of a rollback.
    pub fn log_rollback_started(&mut self, backup_path: &Path) {
        self.start_operation("rollback");
        self.log(&UpdateEvent::RollbackStarted {
            backup_path: backup_path.display().to_string(),
        });
    }

    /// Log a successful rollback.
    pub fn log_rollback_completed(&self, backup_path: &Path) {
        self.log(&UpdateEvent::RollbackCompleted {
            backup_path: backup_path.display().to_string(),
            duration: self.elapsed(),
        });
    }

    /// Log a failed rollback.
    pub fn log_rollback_failed(&self, error: &dyn ErrorCode) {
        self.log(&UpdateEvent::RollbackFailed {
            error: error.to_string(),
            duration: self.elapsed(),
        });
    }

    pub fn log_cycle_skipped(&self, reason: &str) {
        self.log(&UpdateEvent::CycleSkipped {
            reason: reason.to_string(),
        });
    }

    pub fn log_cycle_finished(&self, outcome: &str, failed: bool) {
        self.log(&UpdateEvent::CycleFinished {
            outcome: outcome.to_string(),
            failed,
        });
    }

    pub fn log_file_discarded(&self, path: &Path) {
        self.log(&UpdateEvent::FileDiscarded {
            path: path.display().to_string(),
        });
    }
}

/// Global convenience function to log an update error.
pub fn log_update_error(error: &dyn ErrorCode, context: &str) {
    tracing::error!(
        target: "autopatch::update",
        error_code = %error.error_code(),
        context = %context,
        "Update error: {}",
        error
    );
}

/// Global convenience function to log an update info message.
pub fn log_update_info(message: &str) {
    tracing::info!(target: "autopatch::update", "{}", message);
}

/// Global convenience function to log an update debug message.
pub fn log_update_debug(message: &str) {
    tracing::debug!(target: "autopatch::update", "{}", message);
}

/// Global convenience function to log an update warning.
pub fn log_update_warn(message: &str) {
    tracing::warn!(target: "autopatch::update", "{}", message);
}
