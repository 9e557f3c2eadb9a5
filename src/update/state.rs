//! Durable update state.
//!
//! The phase of the current cycle is written to `update_state.json` in the
//! data directory before every step that touches the installation, so a
//! restart can tell what was in flight (see `UpdateOrchestrator::recover`).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;

use super::backup::Backup;

/// The update state file name.
pub const UPDATE_STATE_FILE: &str = "update_state.json";

#[derive(Debug, Error)]
pub enum StateError {
    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to serialize update state: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Where the update cycle stands.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CyclePhase {
    #[default]
    Idle,
    Checking,
    Downloading,
    Verifying,
    BackingUp,
    Installing,
    /// Installed; the delayed health check decides commit or rollback.
    PendingHealthCheck,
    RollingBack,
    /// Rollback failed. Stays here until acknowledged.
    RollbackFailed,
}

impl CyclePhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            CyclePhase::Idle => "idle",
            CyclePhase::Checking => "checking",
            CyclePhase::Downloading => "downloading",
            CyclePhase::Verifying => "verifying",
            CyclePhase::BackingUp => "backing_up",
            CyclePhase::Installing => "installing",
            CyclePhase::PendingHealthCheck => "pending_health_check",
            CyclePhase::RollingBack => "rolling_back",
            CyclePhase::RollbackFailed => "rollback_failed",
        }
    }

    /// Phases in which the installation itself may be half-changed.
    pub fn touches_installation(&self) -> bool {
        matches!(
            self,
            CyclePhase::BackingUp | CyclePhase::Installing | CyclePhase::RollingBack
        )
    }

    /// Phases that only involve the cache file.
    pub fn is_pre_install(&self) -> bool {
        matches!(
            self,
            CyclePhase::Checking | CyclePhase::Downloading | CyclePhase::Verifying
        )
    }
}

impl fmt::Display for CyclePhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Persisted state of the update agent.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct UpdateState {
    pub phase: CyclePhase,
    /// Version being installed by the current cycle
    pub target_version: Option<String>,
    /// Version that was installed when the cycle started
    pub previous_version: Option<String>,
    /// Last version this agent committed after a passing health check
    pub committed_version: Option<String>,
    /// Backup held by the current cycle
    pub backup: Option<Backup>,
    /// When the post-install health check becomes due
    pub health_check_due_at: Option<DateTime<Utc>>,
    pub last_check: Option<DateTime<Utc>>,
    /// Short description of the last cycle outcome
    pub last_outcome: Option<String>,
    /// Set when the installation needs manual repair
    pub flagged_reason: Option<String>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl UpdateState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_flagged(&self) -> bool {
        self.flagged_reason.is_some() || self.phase == CyclePhase::RollbackFailed
    }

    pub fn has_pending_health_check(&self) -> bool {
        self.phase == CyclePhase::PendingHealthCheck
    }

    /// Whether the health check is due at `now`.
    pub fn health_check_due(&self, now: DateTime<Utc>) -> bool {
        self.has_pending_health_check()
            && self.health_check_due_at.map(|due| due <= now).unwrap_or(true)
    }

    /// Return to Idle, dropping everything tied to the finished cycle.
    pub fn finish_cycle(&mut self, outcome: impl Into<String>) {
        self.phase = CyclePhase::Idle;
        self.target_version = None;
        self.previous_version = None;
        self.backup = None;
        self.health_check_due_at = None;
        self.last_outcome = Some(outcome.into());
    }
}

/// Manages update state storage and retrieval.
#[derive(Debug, Clone)]
pub struct UpdateStateManager {
    state_path: PathBuf,
}

impl UpdateStateManager {
    pub fn new(state_path: impl Into<PathBuf>) -> Self {
        Self {
            state_path: state_path.into(),
        }
    }

    pub fn state_path(&self) -> &Path {
        &self.state_path
    }

    /// Load update state from the state file.
    ///
    /// Returns default state if the file doesn't exist or can't be read.
    pub fn load(&self) -> UpdateState {
        let file = match File::open(&self.state_path) {
            Ok(f) => f,
            Err(_) => return UpdateState::default(),
        };

        let reader = BufReader::new(file);
        match serde_json::from_reader(reader) {
            Ok(state) => state,
            Err(e) => {
                tracing::warn!(
                    target: "autopatch::update",
                    "Ignoring unreadable state file {}: {}",
                    self.state_path.display(),
                    e
                );
                UpdateState::default()
            }
        }
    }

    /// Save update state, replacing the file atomically.
    ///
    /// Creates the parent directory if it doesn't exist.
    pub fn save(&self, state: &UpdateState) -> Result<(), StateError> {
        if let Some(parent) = self.state_path.parent() {
            fs::create_dir_all(parent).map_err(|source| StateError::Io {
                path: parent.to_path_buf(),
                source,
            })?;
        }

        let mut state = state.clone();
        state.updated_at = Some(Utc::now());

        let temp_path = self.state_path.with_extension("json.tmp");
        let io_err = |source| StateError::Io {
            path: temp_path.clone(),
            source,
        };

        {
            let file = File::create(&temp_path).map_err(io_err)?;
            let mut writer = BufWriter::new(file);
            serde_json::to_writer_pretty(&mut writer, &state)?;
            writer.flush().map_err(io_err)?;
            writer.get_ref().sync_all().map_err(io_err)?;
        }

        fs::rename(&temp_path, &self.state_path).map_err(|source| StateError::Io {
            path: self.state_path.clone(),
            source,
        })
    }
}
