//! Agent configuration.
//!
//! Settings are layered: built-in defaults, then `config.json` in the data
//! directory (if present), then `AUTOPATCH_*` environment variables.
//!
//! # Example
//!
//! ```ignore
//! use autopatch::config::AgentConfig;
//!
//! let config = AgentConfig::default()
//!     .with_release_url("https://api.github.com/repos/acme/app/releases/latest")
//!     .with_installed_version("3.1.9")
//!     .with_health_check_delay_secs(60);
//! ```

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

use crate::update::{AUDIT_LOG_FILE, CURRENT_VERSION, DEFAULT_RELEASE_URL};

/// Data directory name under the home directory.
pub const DATA_DIR_NAME: &str = ".autopatch";

/// Config file name inside the data directory.
pub const CONFIG_FILE: &str = "config.json";

/// Prefix of every environment override.
pub const ENV_PREFIX: &str = "AUTOPATCH_";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config file {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("invalid value for {var}: {value:?}")]
    InvalidEnv { var: String, value: String },
}

/// Configuration of the update agent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentConfig {
    /// Release endpoint ("latest release" JSON)
    pub release_url: String,
    /// Version currently installed
    pub installed_version: String,
    /// The installed artifact that gets backed up and replaced
    pub artifact_path: PathBuf,
    /// Holds the cache, backup, state and audit files
    pub data_dir: PathBuf,
    pub check_timeout_secs: u64,
    pub download_timeout_secs: u64,
    pub install_timeout_secs: u64,
    /// Delay between install and health check
    pub health_check_delay_secs: u64,
    /// How long past its due time a pending health check may still run after a restart
    pub health_check_grace_secs: u64,
    pub probe_timeout_secs: u64,
    pub check_interval_secs: u64,
    pub backoff_initial_secs: u64,
    /// External installer; the artifact path is appended as the last argument.
    /// When unset the artifact is copied over `artifact_path`.
    pub installer_command: Option<String>,
    /// Extra health probe; must exit 0 when healthy
    pub health_command: Option<String>,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            release_url: DEFAULT_RELEASE_URL.to_string(),
            installed_version: CURRENT_VERSION.to_string(),
            artifact_path: std::env::current_exe().unwrap_or_else(|_| PathBuf::from("autopatch")),
            data_dir: default_data_dir(),
            check_timeout_secs: 30,
            download_timeout_secs: 600,
            install_timeout_secs: 300,
            health_check_delay_secs: 300,
            health_check_grace_secs: 3600,
            probe_timeout_secs: 30,
            check_interval_secs: 24 * 60 * 60,
            backoff_initial_secs: 60 * 60,
            installer_command: None,
            health_command: None,
        }
    }
}

/// `~/.autopatch`, or `.autopatch` in the working directory without a home.
pub fn default_data_dir() -> PathBuf {
    dirs::home_dir()
        .map(|home| home.join(DATA_DIR_NAME))
        .unwrap_or_else(|| PathBuf::from(DATA_DIR_NAME))
}

impl AgentConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Defaults, then the config file, then the environment.
    pub fn load() -> Result<Self, ConfigError> {
        let data_dir = std::env::var(format!("{}DATA_DIR", ENV_PREFIX))
            .map(PathBuf::from)
            .unwrap_or_else(|_| default_data_dir());

        let mut config = Self::load_file(&data_dir.join(CONFIG_FILE))?.unwrap_or_default();
        config.data_dir = data_dir;
        config.apply_env(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    /// Read a config file. `Ok(None)` when it doesn't exist.
    pub fn load_file(path: &Path) -> Result<Option<Self>, ConfigError> {
        let contents = match std::fs::read_to_string(path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(source) => {
                return Err(ConfigError::Io {
                    path: path.to_path_buf(),
                    source,
                })
            }
        };

        serde_json::from_str(&contents)
            .map(Some)
            .map_err(|source| ConfigError::Parse {
                path: path.to_path_buf(),
                source,
            })
    }

    /// Apply `AUTOPATCH_*` overrides read through `lookup`.
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |name: &str| lookup(&format!("{}{}", ENV_PREFIX, name));

        if let Some(value) = var("RELEASE_URL") {
            self.release_url = value;
        }
        if let Some(value) = var("INSTALLED_VERSION") {
            self.installed_version = value;
        }
        if let Some(value) = var("ARTIFACT_PATH") {
            self.artifact_path = PathBuf::from(value);
        }
        if let Some(value) = var("DATA_DIR") {
            self.data_dir = PathBuf::from(value);
        }
        if let Some(value) = var("INSTALLER_COMMAND") {
            self.installer_command = non_empty(value);
        }
        if let Some(value) = var("HEALTH_COMMAND") {
            self.health_command = non_empty(value);
        }

        let numeric: [(&str, &mut u64); 8] = [
            ("CHECK_TIMEOUT_SECS", &mut self.check_timeout_secs),
            ("DOWNLOAD_TIMEOUT_SECS", &mut self.download_timeout_secs),
            ("INSTALL_TIMEOUT_SECS", &mut self.install_timeout_secs),
            ("HEALTH_CHECK_DELAY_SECS", &mut self.health_check_delay_secs),
            ("HEALTH_CHECK_GRACE_SECS", &mut self.health_check_grace_secs),
            ("PROBE_TIMEOUT_SECS", &mut self.probe_timeout_secs),
            ("CHECK_INTERVAL_SECS", &mut self.check_interval_secs),
            ("BACKOFF_INITIAL_SECS", &mut self.backoff_initial_secs),
        ];
        for (name, slot) in numeric {
            if let Some(value) = var(name) {
                *slot = value.trim().parse().map_err(|_| ConfigError::InvalidEnv {
                    var: format!("{}{}", ENV_PREFIX, name),
                    value,
                })?;
            }
        }

        Ok(())
    }

    // ========== Builder ==========

    pub fn with_release_url(mut self, url: impl Into<String>) -> Self {
        self.release_url = url.into();
        self
    }

    pub fn with_installed_version(mut self, version: impl Into<String>) -> Self {
        self.installed_version = version.into();
        self
    }

    pub fn with_artifact_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.artifact_path = path.into();
        self
    }

    pub fn with_data_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.data_dir = dir.into();
        self
    }

    pub fn with_check_timeout_secs(mut self, secs: u64) -> Self {
        self.check_timeout_secs = secs;
        self
    }

    pub fn with_download_timeout_secs(mut self, secs: u64) -> Self {
        self.download_timeout_secs = secs;
        self
    }

    pub fn with_install_timeout_secs(mut self, secs: u64) -> Self {
        self.install_timeout_secs = secs;
        self
    }

    pub fn with_health_check_delay_secs(mut self, secs: u64) -> Self {
        self.health_check_delay_secs = secs;
        self
    }

    pub fn with_health_check_grace_secs(mut self, secs: u64) -> Self {
        self.health_check_grace_secs = secs;
        self
    }

    pub fn with_probe_timeout_secs(mut self, secs: u64) -> Self {
        self.probe_timeout_secs = secs;
        self
    }

    pub fn with_installer_command(mut self, command: impl Into<String>) -> Self {
        self.installer_command = Some(command.into());
        self
    }

    pub fn with_health_command(mut self, command: impl Into<String>) -> Self {
        self.health_command = Some(command.into());
        self
    }

    // ========== Derived values ==========

    pub fn cache_path(&self) -> PathBuf {
        self.data_dir.join("cache").join("update.artifact")
    }

    pub fn backup_path(&self) -> PathBuf {
        self.data_dir.join("backup").join("artifact.backup")
    }

    pub fn state_path(&self) -> PathBuf {
        self.data_dir.join(crate::update::state::UPDATE_STATE_FILE)
    }

    pub fn audit_path(&self) -> PathBuf {
        self.data_dir.join(AUDIT_LOG_FILE)
    }

    pub fn check_timeout(&self) -> Duration {
        Duration::from_secs(self.check_timeout_secs)
    }

    pub fn download_timeout(&self) -> Duration {
        Duration::from_secs(self.download_timeout_secs)
    }

    pub fn install_timeout(&self) -> Duration {
        Duration::from_secs(self.install_timeout_secs)
    }

    pub fn health_check_delay(&self) -> Duration {
        Duration::from_secs(self.health_check_delay_secs)
    }

    pub fn health_check_grace(&self) -> Duration {
        Duration::from_secs(self.health_check_grace_secs)
    }

    pub fn probe_timeout(&self) -> Duration {
        Duration::from_secs(self.probe_timeout_secs)
    }

    pub fn check_interval(&self) -> Duration {
        Duration::from_secs(self.check_interval_secs)
    }

    pub fn backoff_initial(&self) -> Duration {
        Duration::from_secs(self.backoff_initial_secs)
    }
}

fn non_empty(value: String) -> Option<String> {
    if value.trim().is_empty() {
        None
    } else {
        Some(value)
    }
}
