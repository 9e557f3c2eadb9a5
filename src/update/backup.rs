//! Backup of the installed artifact.
//!
//! A snapshot is taken immediately before every install so a failed health
//! check can put the previous build back. There is a single backup slot; a
//! new snapshot overwrites the old one.
//!
//! The copy goes to a temporary file which is synced and then renamed over
//! the slot, so the slot holds either the previous complete backup or the
//! new complete one, never a torn file.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

use super::cancel::{copy_cancellable, CancelFlag};

/// Default upper bound for taking a snapshot.
pub const BACKUP_TIMEOUT_SECS: u64 = 300;

#[derive(Debug, Error)]
pub enum BackupError {
    #[error("installed artifact not found: {}", .0.display())]
    SourceMissing(PathBuf),

    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("backup size mismatch: expected {expected} bytes, got {actual} bytes")]
    SizeMismatch { expected: u64, actual: u64 },

    #[error("backup did not finish within {secs}s")]
    TimedOut { secs: u64 },
}

/// A saved copy of the pre-update artifact.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Backup {
    /// Where the copy lives
    pub path: PathBuf,
    /// The installed artifact it was taken from
    pub source_path: PathBuf,
    pub created_at: DateTime<Utc>,
    pub size: u64,
}

/// Owns the backup slot.
#[derive(Debug, Clone)]
pub struct BackupManager {
    backup_path: PathBuf,
    timeout: Duration,
}

impl BackupManager {
    pub fn new(backup_path: impl Into<PathBuf>) -> Self {
        Self {
            backup_path: backup_path.into(),
            timeout: Duration::from_secs(BACKUP_TIMEOUT_SECS),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn path(&self) -> &Path {
        &self.backup_path
    }

    /// Whether a backup file currently occupies the slot.
    pub fn exists(&self) -> bool {
        self.backup_path.is_file()
    }

    /// The backup in the slot, if any. `created_at` comes from the file's
    /// modification time.
    pub fn existing(&self, source_path: &Path) -> Option<Backup> {
        let metadata = fs::metadata(&self.backup_path).ok()?;
        if !metadata.is_file() {
            return None;
        }
        let created_at = metadata
            .modified()
            .map(DateTime::<Utc>::from)
            .unwrap_or_else(|_| Utc::now());
        Some(Backup {
            path: self.backup_path.clone(),
            source_path: source_path.to_path_buf(),
            created_at,
            size: metadata.len(),
        })
    }

    /// Copy `source` into the backup slot, replacing any previous backup.
    ///
    /// On timeout the copy is cancelled and awaited before `TimedOut` is
    /// returned, so nothing lands in the slot afterwards.
    pub async fn snapshot(&self, source: &Path) -> Result<Backup, BackupError> {
        let from = source.to_path_buf();
        let to = self.backup_path.clone();
        let cancel = CancelFlag::new();
        let _armed = cancel.cancel_on_drop();

        let worker_cancel = cancel.clone();
        let mut copy = tokio::task::spawn_blocking(move || copy_durably(&from, &to, &worker_cancel));
        let joined = match tokio::time::timeout(self.timeout, &mut copy).await {
            Ok(joined) => joined,
            Err(_) => {
                cancel.cancel();
                match copy.await {
                    // Renamed into place before it saw the flag.
                    Ok(Ok(size)) => Ok(Ok(size)),
                    _ => {
                        return Err(BackupError::TimedOut {
                            secs: self.timeout.as_secs(),
                        })
                    }
                }
            }
        };

        let size = joined.map_err(|join_error| BackupError::Io {
            path: self.backup_path.clone(),
            source: io::Error::new(io::ErrorKind::Other, join_error.to_string()),
        })??;

        Ok(Backup {
            path: self.backup_path.clone(),
            source_path: source.to_path_buf(),
            created_at: Utc::now(),
            size,
        })
    }

    /// Delete the backup. Returns whether a file was removed.
    pub async fn discard(&self) -> Result<bool, BackupError> {
        match tokio::fs::remove_file(&self.backup_path).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(source) => Err(BackupError::Io {
                path: self.backup_path.clone(),
                source,
            }),
        }
    }
}

/// Copy via a synced temp file and rename it into place. Returns the size.
fn copy_durably(source: &Path, dest: &Path, cancel: &CancelFlag) -> Result<u64, BackupError> {
    let metadata = match fs::metadata(source) {
        Ok(metadata) if metadata.is_file() => metadata,
        Ok(_) => return Err(BackupError::SourceMissing(source.to_path_buf())),
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            return Err(BackupError::SourceMissing(source.to_path_buf()))
        }
        Err(e) => {
            return Err(BackupError::Io {
                path: source.to_path_buf(),
                source: e,
            })
        }
    };

    let io_err = |path: &Path| {
        let path = path.to_path_buf();
        move |source: io::Error| BackupError::Io { path, source }
    };

    if let Some(parent) = dest.parent() {
        fs::create_dir_all(parent).map_err(io_err(parent))?;
    }

    let temp_path = dest.with_extension("tmp");
    let result = write_temp(source, &temp_path, cancel).and_then(|copied| {
        if copied != metadata.len() {
            return Err(BackupError::SizeMismatch {
                expected: metadata.len(),
                actual: copied,
            });
        }
        fs::set_permissions(&temp_path, metadata.permissions()).map_err(io_err(&temp_path))?;
        cancel.check().map_err(io_err(dest))?;
        fs::rename(&temp_path, dest).map_err(io_err(dest))?;
        Ok(copied)
    });

    if result.is_err() {
        let _ = fs::remove_file(&temp_path);
    }
    result
}

fn write_temp(source: &Path, temp_path: &Path, cancel: &CancelFlag) -> Result<u64, BackupError> {
    let io_err = |path: &Path| {
        let path = path.to_path_buf();
        move |source: io::Error| BackupError::Io { path, source }
    };

    let mut reader = File::open(source).map_err(io_err(source))?;
    let mut writer = File::create(temp_path).map_err(io_err(temp_path))?;
    let copied = copy_cancellable(&mut reader, &mut writer, cancel).map_err(io_err(temp_path))?;
    writer.sync_all().map_err(io_err(temp_path))?;
    Ok(copied)
}
