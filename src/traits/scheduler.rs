//! Job scheduler abstraction.
//!
//! The update agent never decides when it runs. It hands the scheduler two
//! kinds of work: the keyed periodic update check, and the one-shot delayed
//! health check that follows a successful install.

use std::path::PathBuf;
use std::time::Duration;

/// Unique key of the periodic update job.
pub const UPDATE_JOB_KEY: &str = "autopatch-update-check";

/// Unique key of the post-install health check job.
pub const HEALTH_CHECK_JOB_KEY: &str = "autopatch-health-check";

/// Conditions that must hold before a job may run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JobConstraints {
    pub requires_network: bool,
    pub requires_battery_not_low: bool,
}

impl Default for JobConstraints {
    fn default() -> Self {
        Self {
            requires_network: true,
            requires_battery_not_low: true,
        }
    }
}

/// Exponential backoff applied when a job asks to be retried.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExponentialBackoff {
    pub initial: Duration,
    pub max: Duration,
}

impl ExponentialBackoff {
    /// Delay before retry number `attempt` (0-based): `initial * 2^attempt`, capped at `max`.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let factor = 2u32.checked_pow(attempt).unwrap_or(u32::MAX);
        self.initial
            .checked_mul(factor)
            .map(|d| d.min(self.max))
            .unwrap_or(self.max)
    }
}

impl Default for ExponentialBackoff {
    fn default() -> Self {
        Self {
            initial: Duration::from_secs(60 * 60),
            max: Duration::from_secs(5 * 60 * 60),
        }
    }
}

/// A keyed, repeating job. Registering a key that already exists keeps the
/// existing registration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PeriodicJobSpec {
    pub key: String,
    pub interval: Duration,
    pub constraints: JobConstraints,
    pub backoff: ExponentialBackoff,
}

impl PeriodicJobSpec {
    /// The update check job with the given cadence and initial backoff.
    pub fn update_check(interval: Duration, backoff_initial: Duration) -> Self {
        Self {
            key: UPDATE_JOB_KEY.to_string(),
            interval,
            constraints: JobConstraints::default(),
            backoff: ExponentialBackoff {
                initial: backoff_initial,
                ..ExponentialBackoff::default()
            },
        }
    }
}

/// A one-shot job that runs once after `delay`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DelayedJobSpec {
    pub key: String,
    pub delay: Duration,
    /// Location of the backup the health check may roll back to.
    pub backup_path: PathBuf,
}

impl DelayedJobSpec {
    pub fn health_check(delay: Duration, backup_path: PathBuf) -> Self {
        Self {
            key: HEALTH_CHECK_JOB_KEY.to_string(),
            delay,
            backup_path,
        }
    }
}

/// What a job tells the scheduler when it finishes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobResult {
    Success,
    /// Run again after the backoff delay.
    Retry,
    Failure,
}

/// Scheduler errors.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SchedulerError {
    #[error("scheduler unavailable: {0}")]
    Unavailable(String),
}

/// Accepts job registrations.
pub trait JobScheduler: Send + Sync {
    fn schedule_periodic(&self, spec: PeriodicJobSpec) -> Result<(), SchedulerError>;
    fn schedule_delayed(&self, spec: DelayedJobSpec) -> Result<(), SchedulerError>;
}
