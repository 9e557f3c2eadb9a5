//! Update orchestrator.
//!
//! Drives one update cycle through
//! `Idle -> Checking -> Downloading -> Verifying -> BackingUp -> Installing -> PendingHealthCheck`
//! and, once the delayed health-check job fires, on to commit or rollback.
//!
//! The orchestrator never returns an error from a cycle. Every path ends in
//! an [`UpdateOutcome`], which is logged, persisted as the last outcome and,
//! at decision points, sent to the notifier. The current phase is written to
//! the state file before each step so [`UpdateOrchestrator::recover`] can
//! pick up after a crash.

use chrono::{DateTime, Utc};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;

use super::audit::AuditLog;
use super::backup::{Backup, BackupManager};
use super::checker::{FetchOutcome, ReleaseDescriptor, ReleaseFetcher};
use super::downloader::{ArtifactDownloader, DownloadedArtifact};
use super::errors::UpdateError;
use super::health::HealthVerifier;
use super::installer::{InstallError, InstallerAdapter};
use super::logger::{log_update_error, log_update_warn, UpdateLogger};
use super::state::{CyclePhase, UpdateState, UpdateStateManager};
use super::verifier::IntegrityVerifier;
use super::version::is_newer;
use crate::config::AgentConfig;
use crate::traits::{
    DelayedJobSpec, HealthProbe, HttpClient, JobResult, JobScheduler, Notification, Notifier,
    PackageInstaller, PeriodicJobSpec, SchedulerError,
};

/// `InstallFailed` reason when the artifact digest does not match.
pub const SIGNATURE_MISMATCH: &str = "signature mismatch";

/// `InstallFailed` reason when the installed artifact could not be backed up.
pub const BACKUP_FAILED: &str = "backup failed";

/// How a cycle, health check or recovery ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpdateOutcome {
    NoUpdateAvailable,
    /// The release endpoint could not be queried.
    CheckFailed(String),
    /// Installed; the delayed health check will commit or roll back.
    InstalledPendingHealthCheck(Backup),
    InstallFailed(String),
    /// The health check passed for this version.
    Committed(String),
    RolledBack(String),
    /// The backup could not be reinstalled. The installation is flagged.
    RollbackFailed(String),
    /// Refused: another cycle is in flight or the installation is flagged.
    Skipped(String),
}

impl UpdateOutcome {
    /// What the scheduler should do with the job that produced this outcome.
    pub fn job_result(&self) -> JobResult {
        match self {
            UpdateOutcome::CheckFailed(_) | UpdateOutcome::InstallFailed(_) => JobResult::Retry,
            UpdateOutcome::RolledBack(_) | UpdateOutcome::RollbackFailed(_) => JobResult::Failure,
            UpdateOutcome::NoUpdateAvailable
            | UpdateOutcome::InstalledPendingHealthCheck(_)
            | UpdateOutcome::Committed(_)
            | UpdateOutcome::Skipped(_) => JobResult::Success,
        }
    }

    pub fn is_failure(&self) -> bool {
        matches!(
            self,
            UpdateOutcome::CheckFailed(_)
                | UpdateOutcome::InstallFailed(_)
                | UpdateOutcome::RolledBack(_)
                | UpdateOutcome::RollbackFailed(_)
        )
    }
}

impl fmt::Display for UpdateOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UpdateOutcome::NoUpdateAvailable => write!(f, "no update available"),
            UpdateOutcome::CheckFailed(reason) => write!(f, "check failed: {}", reason),
            UpdateOutcome::InstalledPendingHealthCheck(backup) => write!(
                f,
                "installed, health check pending (backup at {})",
                backup.path.display()
            ),
            UpdateOutcome::InstallFailed(reason) => write!(f, "install failed: {}", reason),
            UpdateOutcome::Committed(version) => write!(f, "committed v{}", version),
            UpdateOutcome::RolledBack(reason) => write!(f, "rolled back: {}", reason),
            UpdateOutcome::RollbackFailed(reason) => write!(f, "rollback failed: {}", reason),
            UpdateOutcome::Skipped(reason) => write!(f, "skipped: {}", reason),
        }
    }
}

/// What [`UpdateOrchestrator::recover`] found and did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecoveryAction {
    /// Nothing was in flight.
    Clean,
    /// A cycle died before touching the installation; its artifact was discarded.
    DiscardedPartialCycle { phase: CyclePhase },
    /// The pending health check was registered again.
    HealthCheckRescheduled { delay: Duration },
    /// Durable state was resolved into a terminal outcome.
    Resolved(UpdateOutcome),
    /// A failed rollback is waiting for `acknowledge`.
    StillFlagged { reason: String },
}

/// External collaborators of the orchestrator.
#[derive(Clone)]
pub struct Collaborators {
    pub http: Arc<dyn HttpClient>,
    pub installer: Arc<dyn PackageInstaller>,
    pub notifier: Arc<dyn Notifier>,
    pub scheduler: Arc<dyn JobScheduler>,
    pub probes: Vec<Arc<dyn HealthProbe>>,
}

/// Runs update cycles for one installation.
pub struct UpdateOrchestrator {
    fetcher: ReleaseFetcher,
    downloader: ArtifactDownloader,
    verifier: IntegrityVerifier,
    backups: BackupManager,
    installer: InstallerAdapter,
    health: HealthVerifier,
    notifier: Arc<dyn Notifier>,
    scheduler: Arc<dyn JobScheduler>,
    state: UpdateStateManager,
    audit: AuditLog,
    installed_version: String,
    artifact_path: PathBuf,
    health_check_delay: Duration,
    health_check_grace: Duration,
    periodic: PeriodicJobSpec,
    cycle_lock: Mutex<()>,
}

impl fmt::Debug for UpdateOrchestrator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UpdateOrchestrator")
            .field("installed_version", &self.installed_version)
            .field("artifact_path", &self.artifact_path)
            .field("state_path", &self.state.state_path())
            .finish_non_exhaustive()
    }
}

/// `Err` ends the cycle and returns it to Idle. An `Ok` outcome leaves durable
/// state behind for a later job: the pending health check, or an install whose
/// outcome is unknown and which recovery rolls back.
type Step<T> = Result<T, UpdateOutcome>;

impl UpdateOrchestrator {
    pub fn new(config: &AgentConfig, collaborators: Collaborators) -> Self {
        let Collaborators {
            http,
            installer,
            notifier,
            scheduler,
            probes,
        } = collaborators;

        let health = probes.into_iter().fold(
            HealthVerifier::new().with_probe_timeout(config.probe_timeout()),
            |verifier, probe| verifier.with_probe(probe),
        );

        Self {
            fetcher: ReleaseFetcher::new(Arc::clone(&http), config.release_url.clone())
                .with_timeout(config.check_timeout()),
            downloader: ArtifactDownloader::new(http, config.cache_path())
                .with_timeout(config.download_timeout()),
            verifier: IntegrityVerifier::new(),
            backups: BackupManager::new(config.backup_path())
                .with_timeout(config.install_timeout()),
            installer: InstallerAdapter::new(installer).with_timeout(config.install_timeout()),
            health,
            notifier,
            scheduler,
            state: UpdateStateManager::new(config.state_path()),
            audit: AuditLog::new(config.audit_path()),
            installed_version: config.installed_version.clone(),
            artifact_path: config.artifact_path.clone(),
            health_check_delay: config.health_check_delay(),
            health_check_grace: config.health_check_grace(),
            periodic: PeriodicJobSpec::update_check(
                config.check_interval(),
                config.backoff_initial(),
            ),
            cycle_lock: Mutex::new(()),
        }
    }

    /// Current persisted state.
    pub fn status(&self) -> UpdateState {
        self.state.load()
    }

    pub fn audit_log(&self) -> &AuditLog {
        &self.audit
    }

    /// Register the periodic update check with the scheduler.
    pub fn register_periodic_check(&self) -> Result<(), SchedulerError> {
        self.scheduler.schedule_periodic(self.periodic.clone())
    }

    /// The installed version, taking a version committed by this agent into account.
    fn effective_installed_version(&self, state: &UpdateState) -> String {
        match &state.committed_version {
            Some(committed) if is_newer(committed, &self.installed_version) => committed.clone(),
            _ => self.installed_version.clone(),
        }
    }

    // ========== Update cycle ==========

    /// Run one update cycle.
    ///
    /// A concurrent call, a pending health check or a flagged installation
    /// yields [`UpdateOutcome::Skipped`]. A phase left in the state file by a
    /// run that died mid-cycle is settled through recovery first: with the
    /// cycle lock held, no live cycle of this agent can own it.
    pub async fn run_cycle(&self) -> UpdateOutcome {
        let Ok(_guard) = self.cycle_lock.try_lock() else {
            return self.skip(UpdateError::CycleInProgress {
                phase: "another cycle holds the lock".to_string(),
            });
        };

        let mut state = self.state.load();
        if let Some(reason) = flag_reason(&state) {
            return self.skip(UpdateError::ManualInterventionRequired { reason });
        }
        if state.phase.is_pre_install() || state.phase.touches_installation() {
            log_update_warn(&format!(
                "Found a cycle interrupted while {}, recovering first",
                state.phase
            ));
            if let RecoveryAction::Resolved(outcome) = self.recover_unlocked().await {
                return outcome;
            }
            state = self.state.load();
        }
        if state.phase != CyclePhase::Idle {
            return self.skip(UpdateError::CycleInProgress {
                phase: state.phase.to_string(),
            });
        }

        let outcome = match self.execute_cycle(state).await {
            Ok(outcome) => outcome,
            Err(outcome) => {
                self.finish_cycle(&outcome);
                outcome
            }
        };
        UpdateLogger::new().log_cycle_finished(&outcome.to_string(), outcome.is_failure());
        outcome
    }

    async fn execute_cycle(&self, mut state: UpdateState) -> Step<UpdateOutcome> {
        let installed = self.effective_installed_version(&state);

        state.last_check = Some(Utc::now());
        self.enter(&mut state, CyclePhase::Checking)
            .map_err(|e| UpdateOutcome::CheckFailed(e.to_string()))?;

        let release = match self.fetcher.fetch_latest(&installed).await {
            Ok(FetchOutcome::UpdateAvailable(release)) => release,
            Ok(FetchOutcome::NoUpdateAvailable { .. }) => {
                return Err(UpdateOutcome::NoUpdateAvailable)
            }
            Err(e) => {
                let err = UpdateError::from(e);
                self.report_error(&err, "Update check failed");
                return Err(UpdateOutcome::CheckFailed(err.to_string()));
            }
        };

        self.notify(Notification::normal(format!(
            "Update v{} available, downloading",
            release.version
        )));
        state.target_version = Some(release.version.clone());
        state.previous_version = Some(installed);

        let artifact = self.download(&mut state, &release).await?;
        self.verify(&mut state, &release, &artifact).await?;
        let backup = self.snapshot(&mut state).await?;
        self.install(&mut state, &release, &artifact.path, backup)
            .await
    }

    async fn download(
        &self,
        state: &mut UpdateState,
        release: &ReleaseDescriptor,
    ) -> Step<DownloadedArtifact> {
        self.enter(state, CyclePhase::Downloading)
            .map_err(|e| UpdateOutcome::InstallFailed(e.to_string()))?;

        match self
            .downloader
            .download(&release.download_url, &release.version)
            .await
        {
            Ok(artifact) => Ok(artifact),
            Err(e) => {
                self.discard_artifact().await;
                let err = UpdateError::from(e);
                self.report_error(&err, "Download failed");
                Err(UpdateOutcome::InstallFailed(err.to_string()))
            }
        }
    }

    async fn verify(
        &self,
        state: &mut UpdateState,
        release: &ReleaseDescriptor,
        artifact: &DownloadedArtifact,
    ) -> Step<()> {
        if let Err(e) = self.enter(state, CyclePhase::Verifying) {
            self.discard_artifact().await;
            return Err(UpdateOutcome::InstallFailed(e.to_string()));
        }

        let logger = UpdateLogger::new();
        match self
            .verifier
            .check_download(artifact, release.expected_digest.as_deref())
            .await
        {
            Ok(()) => {
                logger.log_verification_passed(&release.version, release.expected_digest.is_some());
                Ok(())
            }
            Err(e) => {
                logger.log_verification_failed(&release.version, &e);
                self.discard_artifact().await;
                self.report_error(&UpdateError::from(e), "Signature verification failed");
                Err(UpdateOutcome::InstallFailed(SIGNATURE_MISMATCH.to_string()))
            }
        }
    }

    async fn snapshot(&self, state: &mut UpdateState) -> Step<Backup> {
        if let Err(e) = self.enter(state, CyclePhase::BackingUp) {
            self.discard_artifact().await;
            return Err(UpdateOutcome::InstallFailed(e.to_string()));
        }

        match self.backups.snapshot(&self.artifact_path).await {
            Ok(backup) => {
                UpdateLogger::new().log_backup_created(&backup.path, backup.size);
                Ok(backup)
            }
            Err(e) => {
                UpdateLogger::new().log_backup_failed(&e);
                self.discard_artifact().await;
                self.discard_backup().await;
                self.report_error(&UpdateError::from(e), "Backup failed");
                Err(UpdateOutcome::InstallFailed(BACKUP_FAILED.to_string()))
            }
        }
    }

    async fn install(
        &self,
        state: &mut UpdateState,
        release: &ReleaseDescriptor,
        artifact: &Path,
        backup: Backup,
    ) -> Step<UpdateOutcome> {
        state.backup = Some(backup.clone());
        if let Err(e) = self.enter(state, CyclePhase::Installing) {
            self.discard_artifact().await;
            self.discard_backup().await;
            return Err(UpdateOutcome::InstallFailed(e.to_string()));
        }

        let mut logger = UpdateLogger::new();
        logger.log_install_started(&release.version, self.installer.installer_name());
        self.notify(Notification::normal(format!("Installing v{}", release.version)));

        match self.installer.install(artifact).await {
            Ok(()) => {}
            Err(e @ InstallError::TimedOut { .. }) => {
                // The installer may still be working. Keep the backup and the
                // Installing phase; recovery rolls back to the backup.
                logger.log_install_failed(&release.version, &e);
                self.discard_artifact().await;
                let err = UpdateError::from(e);
                self.report_error(&err, "Install timed out");
                let outcome = UpdateOutcome::InstallFailed(err.to_string());
                state.last_outcome = Some(format!("{}, outcome unknown", outcome));
                self.save_or_warn(state);
                return Ok(outcome);
            }
            Err(e) => {
                logger.log_install_failed(&release.version, &e);
                self.discard_artifact().await;
                self.discard_backup().await;
                let err = UpdateError::from(e);
                self.report_error(&err, "Install failed");
                return Err(UpdateOutcome::InstallFailed(err.to_string()));
            }
        }
        logger.log_install_completed(&release.version);

        self.discard_artifact().await;

        let due_at = Utc::now() + chrono_duration(self.health_check_delay);
        state.health_check_due_at = Some(due_at);
        state.phase = CyclePhase::PendingHealthCheck;
        if let Err(e) = self.state.save(state) {
            // The backup is on disk; recovery treats an unexplained backup as unhealthy.
            log_update_error(&UpdateError::from(e), "Persisting pending health check");
        }

        self.schedule_health_check(&backup.path, self.health_check_delay);
        logger.log_health_check_scheduled(&release.version, self.health_check_delay);
        self.notify(Notification::normal(format!(
            "Installed v{}. Health check in {} minutes",
            release.version,
            self.health_check_delay.as_secs() / 60
        )));

        Ok(UpdateOutcome::InstalledPendingHealthCheck(backup))
    }

    // ========== Health check ==========

    /// Run the pending health check if it is due.
    ///
    /// `force` is an operator override: it runs the check before the
    /// configured delay has passed.
    pub async fn run_pending_health_check(&self, force: bool) -> UpdateOutcome {
        let state = self.state.load();
        if !state.has_pending_health_check() {
            return UpdateOutcome::Skipped("no health check pending".to_string());
        }
        if !force && !state.health_check_due(Utc::now()) {
            let due = state
                .health_check_due_at
                .map(|d| d.to_rfc3339())
                .unwrap_or_default();
            return UpdateOutcome::Skipped(format!("health check not due until {}", due));
        }

        let backup_path = state
            .backup
            .as_ref()
            .map(|b| b.path.clone())
            .unwrap_or_else(|| self.backups.path().to_path_buf());
        self.run_health_check(&backup_path).await
    }

    /// Entry point of the delayed health-check job.
    ///
    /// Healthy: the backup is deleted and the update committed. Unhealthy:
    /// the backup at `backup_path` is reinstalled.
    pub async fn run_health_check(&self, backup_path: &Path) -> UpdateOutcome {
        let _guard = self.cycle_lock.lock().await;

        let state = self.state.load();
        if !state.has_pending_health_check() {
            return UpdateOutcome::Skipped("no health check pending".to_string());
        }

        let version = state
            .target_version
            .clone()
            .unwrap_or_else(|| "unknown".to_string());
        let backup = self.resolve_backup(&state, backup_path);

        let logger = UpdateLogger::new();
        let report = self.health.check_health().await;

        let outcome = if report.passed() {
            logger.log_health_check_passed(&version, report.passed_probes.len());
            self.commit(state, &version).await
        } else {
            logger.log_health_check_failed(&version, &report.failed);
            let err = UpdateError::HealthCheck {
                failed: report.failed.clone(),
            };
            self.report_error(&err, "Health check failed");
            self.rollback(state, backup, err.to_string()).await
        };

        logger.log_cycle_finished(&outcome.to_string(), outcome.is_failure());
        outcome
    }

    async fn commit(&self, mut state: UpdateState, version: &str) -> UpdateOutcome {
        // Backup goes first: a crash in between leaves a pending check with no
        // backup, which recovery commits.
        self.discard_backup().await;

        let outcome = UpdateOutcome::Committed(version.to_string());
        state.committed_version = Some(version.to_string());
        state.finish_cycle(outcome.to_string());
        self.save_or_warn(&state);

        self.notify(Notification::normal(format!(
            "Update v{} passed its health check",
            version
        )));
        outcome
    }

    async fn rollback(
        &self,
        mut state: UpdateState,
        backup: Option<Backup>,
        reason: String,
    ) -> UpdateOutcome {
        let Some(backup) = backup else {
            return self.rollback_failed(state, reason, "no backup available".to_string());
        };

        state.backup = Some(backup.clone());
        state.phase = CyclePhase::RollingBack;
        self.save_or_warn(&state);

        let mut logger = UpdateLogger::new();
        logger.log_rollback_started(&backup.path);

        match self.installer.install(&backup.path).await {
            Ok(()) => {
                logger.log_rollback_completed(&backup.path);
                self.discard_backup().await;

                let version = state
                    .target_version
                    .clone()
                    .unwrap_or_else(|| "unknown".to_string());
                let outcome = UpdateOutcome::RolledBack(reason);
                state.finish_cycle(outcome.to_string());
                self.save_or_warn(&state);

                self.notify(Notification::normal(format!(
                    "Update v{} was rolled back to the previous version",
                    version
                )));
                outcome
            }
            Err(e) => {
                let err = UpdateError::Rollback(e);
                logger.log_rollback_failed(&err);
                self.rollback_failed(state, reason, err.to_string())
            }
        }
    }

    fn rollback_failed(&self, mut state: UpdateState, reason: String, failure: String) -> UpdateOutcome {
        let detail = format!("{}; {}", reason, failure);
        self.audit.record("Rollback failed", &detail);
        tracing::error!(target: "autopatch::update", "CRITICAL: rollback failed: {}", detail);

        state.phase = CyclePhase::RollbackFailed;
        state.flagged_reason = Some(detail.clone());
        state.last_outcome = Some(format!("rollback failed: {}", detail));
        self.save_or_warn(&state);

        self.notify(Notification::urgent(format!(
            "CRITICAL: rollback failed ({}). Manual intervention is required.",
            failure
        )));
        UpdateOutcome::RollbackFailed(detail)
    }

    /// The backup to roll back to: the one recorded in state, or the slot on disk.
    fn resolve_backup(&self, state: &UpdateState, backup_path: &Path) -> Option<Backup> {
        let recorded = state.backup.clone().filter(|b| b.path.is_file());
        recorded.or_else(|| {
            if backup_path.is_file() && backup_path == self.backups.path() {
                self.backups.existing(&self.artifact_path)
            } else {
                None
            }
        })
    }

    // ========== Restart recovery ==========

    /// Inspect durable state after a restart and settle anything left in flight.
    pub async fn recover(&self) -> RecoveryAction {
        let _guard = self.cycle_lock.lock().await;
        self.recover_unlocked().await
    }

    async fn recover_unlocked(&self) -> RecoveryAction {
        let state = self.state.load();
        let backup_on_disk = self.backups.existing(&self.artifact_path);
        let now = Utc::now();

        match state.phase {
            CyclePhase::RollbackFailed => RecoveryAction::StillFlagged {
                reason: state
                    .flagged_reason
                    .clone()
                    .unwrap_or_else(|| "rollback failed".to_string()),
            },

            CyclePhase::PendingHealthCheck => {
                let recorded_backup = state.backup.as_ref().is_some_and(|b| b.path.is_file());
                if backup_on_disk.is_none() && !recorded_backup {
                    let version = state
                        .target_version
                        .clone()
                        .unwrap_or_else(|| "unknown".to_string());
                    return RecoveryAction::Resolved(self.commit(state, &version).await);
                }

                let due_at = state.health_check_due_at.unwrap_or(now);
                if now <= health_check_deadline(due_at, self.health_check_grace) {
                    let delay = (due_at - now).to_std().unwrap_or(Duration::ZERO);
                    let backup_path = state
                        .backup
                        .as_ref()
                        .map(|b| b.path.clone())
                        .unwrap_or_else(|| self.backups.path().to_path_buf());
                    self.schedule_health_check(&backup_path, delay);
                    RecoveryAction::HealthCheckRescheduled { delay }
                } else {
                    let reason = format!(
                        "health check overdue since {}, outcome unknown",
                        due_at.to_rfc3339()
                    );
                    RecoveryAction::Resolved(self.recover_by_rollback(state, reason).await)
                }
            }

            phase if phase.touches_installation() => {
                if backup_on_disk.is_some() || state.backup.is_some() {
                    let reason = format!("interrupted while {}, outcome unknown", phase);
                    RecoveryAction::Resolved(self.recover_by_rollback(state, reason).await)
                } else {
                    self.discard_artifact().await;
                    let mut state = state;
                    state.finish_cycle(format!("interrupted while {}", phase));
                    self.save_or_warn(&state);
                    RecoveryAction::DiscardedPartialCycle { phase }
                }
            }

            phase if phase.is_pre_install() => {
                self.discard_artifact().await;
                self.discard_backup().await;
                let mut state = state;
                state.finish_cycle(format!("interrupted while {}", phase));
                self.save_or_warn(&state);
                RecoveryAction::DiscardedPartialCycle { phase }
            }

            _ => {
                if let Some(backup) = backup_on_disk {
                    let reason = format!(
                        "orphan backup found at {}, outcome unknown",
                        backup.path.display()
                    );
                    let mut state = state;
                    state.backup = Some(backup);
                    RecoveryAction::Resolved(self.recover_by_rollback(state, reason).await)
                } else if self.downloader.has_cached_artifact() {
                    self.discard_artifact().await;
                    RecoveryAction::DiscardedPartialCycle {
                        phase: CyclePhase::Idle,
                    }
                } else {
                    RecoveryAction::Clean
                }
            }
        }
    }

    async fn recover_by_rollback(&self, mut state: UpdateState, reason: String) -> UpdateOutcome {
        self.discard_artifact().await;
        self.notify(Notification::normal(format!(
            "Rolling back to the previous version: {}",
            reason
        )));

        let backup = state
            .backup
            .clone()
            .filter(|b| b.path.is_file())
            .or_else(|| self.backups.existing(&self.artifact_path));
        state.backup = backup.clone();

        self.audit.record("Recovery rollback", &reason);
        let outcome = self.rollback(state, backup, reason).await;
        UpdateLogger::new().log_cycle_finished(&outcome.to_string(), outcome.is_failure());
        outcome
    }

    /// Clear a `RollbackFailed` flag after the installation was repaired by hand.
    ///
    /// Returns whether a flag was cleared.
    pub async fn acknowledge(&self) -> Result<bool, UpdateError> {
        let _guard = self.cycle_lock.lock().await;

        let mut state = self.state.load();
        if !state.is_flagged() {
            return Ok(false);
        }

        self.discard_backup().await;
        state.flagged_reason = None;
        state.finish_cycle("rollback failure acknowledged");
        self.state.save(&state)?;

        tracing::info!(target: "autopatch::update", "Rollback failure acknowledged, updates resumed");
        Ok(true)
    }

    // ========== Helpers ==========

    /// Persist `phase` before running it.
    fn enter(&self, state: &mut UpdateState, phase: CyclePhase) -> Result<(), UpdateError> {
        state.phase = phase;
        self.state.save(state).map_err(|e| {
            let err = UpdateError::from(e);
            self.report_error(&err, "Persisting update state");
            err
        })
    }

    fn finish_cycle(&self, outcome: &UpdateOutcome) {
        let mut state = self.state.load();
        if state.phase == CyclePhase::RollbackFailed {
            return;
        }
        state.finish_cycle(outcome.to_string());
        self.save_or_warn(&state);
    }

    fn save_or_warn(&self, state: &UpdateState) {
        if let Err(e) = self.state.save(state) {
            log_update_error(&UpdateError::from(e), "Persisting update state");
        }
    }

    fn schedule_health_check(&self, backup_path: &Path, delay: Duration) {
        let spec = DelayedJobSpec::health_check(delay, backup_path.to_path_buf());
        if let Err(e) = self.scheduler.schedule_delayed(spec) {
            // The due time is in the state file; `health-check` or `recover` picks it up.
            log_update_warn(&format!("Could not schedule health check: {}", e));
        }
    }

    async fn discard_artifact(&self) {
        match self.downloader.discard().await {
            Ok(true) => UpdateLogger::new().log_file_discarded(self.downloader.cache_path()),
            Ok(false) => {}
            Err(e) => log_update_error(&e, "Discarding cached artifact"),
        }
    }

    async fn discard_backup(&self) {
        match self.backups.discard().await {
            Ok(true) => UpdateLogger::new().log_file_discarded(self.backups.path()),
            Ok(false) => {}
            Err(e) => log_update_error(&e, "Discarding backup"),
        }
    }

    fn skip(&self, reason: UpdateError) -> UpdateOutcome {
        UpdateLogger::new().log_cycle_skipped(&reason.to_string());
        UpdateOutcome::Skipped(reason.to_string())
    }

    fn report_error(&self, error: &UpdateError, context: &str) {
        log_update_error(error, context);
        self.audit
            .record(context, &format!("[{}] {}", error.error_code(), error));

        let notification = if error.requires_manual_intervention() {
            Notification::urgent(error.user_message())
        } else {
            Notification::normal(error.user_message())
        };
        self.notify(notification);
    }

    fn notify(&self, notification: Notification) {
        self.notifier.notify(notification);
    }
}

fn flag_reason(state: &UpdateState) -> Option<String> {
    if !state.is_flagged() {
        return None;
    }
    Some(
        state
            .flagged_reason
            .clone()
            .unwrap_or_else(|| "rollback failed".to_string()),
    )
}

fn chrono_duration(duration: Duration) -> chrono::Duration {
    chrono::Duration::from_std(duration).unwrap_or_else(|_| chrono::Duration::weeks(52 * 100))
}

/// When a pending health check becomes overdue.
fn health_check_deadline(due_at: DateTime<Utc>, grace: Duration) -> DateTime<Utc> {
    due_at + chrono_duration(grace)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::mock::{
        MockHealthProbe, MockHttpClient, MockInstaller, MockNotifier, MockResponse, MockScheduler,
    };
    use crate::traits::{InstallerError, Response, HEALTH_CHECK_JOB_KEY, UPDATE_JOB_KEY};
    use bytes::Bytes;
    use sha2::{Digest, Sha256};
    use tempfile::TempDir;

    const RELEASE_URL: &str = "https://releases.test/latest";
    const ARTIFACT_URL: &str = "https://releases.test/download/app-2.0.0";
    const NEW_BINARY: &[u8] = b"app v2.0.0 binary";
    const OLD_BINARY: &[u8] = b"app v1.0.0 binary";

    struct Harness {
        _temp: TempDir,
        config: AgentConfig,
        http: MockHttpClient,
        installer: MockInstaller,
        notifier: MockNotifier,
        scheduler: MockScheduler,
        probe: MockHealthProbe,
        orchestrator: UpdateOrchestrator,
    }

    impl Harness {
        fn new() -> Self {
            Self::with(|config| config, |installer| installer)
        }

        fn with<C, I>(adjust_config: C, adjust_installer: I) -> Self
        where
            C: FnOnce(AgentConfig) -> AgentConfig,
            I: FnOnce(MockInstaller) -> MockInstaller,
        {
            let temp = TempDir::new().unwrap();
            let artifact_path = temp.path().join("app");
            std::fs::write(&artifact_path, OLD_BINARY).unwrap();

            let config = adjust_config(
                AgentConfig::default()
                    .with_release_url(RELEASE_URL)
                    .with_installed_version("1.0.0")
                    .with_artifact_path(&artifact_path)
                    .with_data_dir(temp.path().join("data")),
            );

            let http = MockHttpClient::new();
            let installer = adjust_installer(MockInstaller::new().with_target(&artifact_path));
            let notifier = MockNotifier::new();
            let scheduler = MockScheduler::new();
            let probe = MockHealthProbe::healthy("app");

            let orchestrator = UpdateOrchestrator::new(
                &config,
                Collaborators {
                    http: Arc::new(http.clone()),
                    installer: Arc::new(installer.clone()),
                    notifier: Arc::new(notifier.clone()),
                    scheduler: Arc::new(scheduler.clone()),
                    probes: vec![Arc::new(probe.clone())],
                },
            );

            Self {
                _temp: temp,
                config,
                http,
                installer,
                notifier,
                scheduler,
                probe,
                orchestrator,
            }
        }

        fn publish(&self, version: &str, digest: Option<String>) {
            let body = serde_json::json!({
                "tag_name": format!("v{}", version),
                "body": "Bug fixes",
                "published_at": "2026-09-01T12:00:00Z",
                "assets": [{
                    "browser_download_url": ARTIFACT_URL,
                    "digest": digest.map(|d| format!("sha256:{}", d)),
                }],
            });
            self.http.set_response(
                RELEASE_URL,
                MockResponse::Success(Response::new(200, Bytes::from(body.to_string()))),
            );
            self.http.set_response(
                ARTIFACT_URL,
                MockResponse::Stream(vec![Bytes::from_static(NEW_BINARY)]),
            );
        }

        fn publish_valid(&self) {
            self.publish("2.0.0", Some(hex::encode(Sha256::digest(NEW_BINARY))));
        }

        fn installed(&self) -> Vec<u8> {
            std::fs::read(&self.config.artifact_path).unwrap()
        }

        fn states(&self) -> UpdateStateManager {
            UpdateStateManager::new(self.config.state_path())
        }

        fn place_backup(&self) {
            let path = self.config.backup_path();
            std::fs::create_dir_all(path.parent().unwrap()).unwrap();
            std::fs::write(&path, OLD_BINARY).unwrap();
        }

        fn backup_for_state(&self) -> Backup {
            Backup {
                path: self.config.backup_path(),
                source_path: self.config.artifact_path.clone(),
                created_at: Utc::now(),
                size: OLD_BINARY.len() as u64,
            }
        }
    }

    async fn install_pending(h: &Harness) -> Backup {
        h.publish_valid();
        match h.orchestrator.run_cycle().await {
            UpdateOutcome::InstalledPendingHealthCheck(backup) => backup,
            other => panic!("expected pending health check, got {:?}", other),
        }
    }

    #[test]
    fn test_job_results() {
        assert_eq!(UpdateOutcome::CheckFailed("x".into()).job_result(), JobResult::Retry);
        assert_eq!(UpdateOutcome::InstallFailed("x".into()).job_result(), JobResult::Retry);
        assert_eq!(UpdateOutcome::RolledBack("x".into()).job_result(), JobResult::Failure);
        assert_eq!(UpdateOutcome::RollbackFailed("x".into()).job_result(), JobResult::Failure);
        assert_eq!(UpdateOutcome::NoUpdateAvailable.job_result(), JobResult::Success);
        assert_eq!(UpdateOutcome::Committed("2.0".into()).job_result(), JobResult::Success);
    }

    #[test]
    fn test_register_periodic_check() {
        let h = Harness::new();
        h.orchestrator.register_periodic_check().unwrap();
        h.orchestrator.register_periodic_check().unwrap();

        let jobs = h.scheduler.periodic_jobs();
        assert_eq!(jobs.len(), 1);
        assert_eq!(jobs[0].key, UPDATE_JOB_KEY);
        assert_eq!(jobs[0].interval, h.config.check_interval());
        assert_eq!(jobs[0].backoff.initial, h.config.backoff_initial());
    }

    #[tokio::test]
    async fn test_healthy_update_commits() {
        let h = Harness::new();
        let backup = install_pending(&h).await;

        assert_eq!(h.installed(), NEW_BINARY);
        assert_eq!(std::fs::read(&backup.path).unwrap(), OLD_BINARY);
        assert!(!h.config.cache_path().exists());

        let state = h.orchestrator.status();
        assert_eq!(state.phase, CyclePhase::PendingHealthCheck);
        assert_eq!(state.target_version.as_deref(), Some("2.0.0"));
        assert_eq!(state.previous_version.as_deref(), Some("1.0.0"));
        assert!(state.health_check_due_at.is_some());
        assert!(h.notifier.contains("Installing v2.0.0"));

        let delayed = h.scheduler.delayed_jobs();
        assert_eq!(delayed.len(), 1);
        assert_eq!(delayed[0].key, HEALTH_CHECK_JOB_KEY);
        assert_eq!(delayed[0].delay, Duration::from_secs(300));
        assert_eq!(delayed[0].backup_path, backup.path);

        let outcome = h.orchestrator.run_health_check(&backup.path).await;
        assert_eq!(outcome, UpdateOutcome::Committed("2.0.0".to_string()));
        assert!(!backup.path.exists());
        assert_eq!(h.installed(), NEW_BINARY);
        assert_eq!(h.probe.calls(), 1);

        let state = h.orchestrator.status();
        assert_eq!(state.phase, CyclePhase::Idle);
        assert_eq!(state.committed_version.as_deref(), Some("2.0.0"));
        assert!(state.backup.is_none());
        assert!(h.notifier.contains("passed its health check"));
    }

    #[tokio::test]
    async fn test_committed_version_is_not_reinstalled() {
        let h = Harness::new();
        let backup = install_pending(&h).await;
        h.orchestrator.run_health_check(&backup.path).await;

        assert_eq!(h.orchestrator.run_cycle().await, UpdateOutcome::NoUpdateAvailable);
        assert_eq!(h.installer.install_count(), 1);
    }

    #[tokio::test]
    async fn test_digest_mismatch_never_installs() {
        let h = Harness::new();
        h.publish("2.0.0", Some("00".repeat(32)));

        let outcome = h.orchestrator.run_cycle().await;

        assert_eq!(outcome, UpdateOutcome::InstallFailed(SIGNATURE_MISMATCH.to_string()));
        assert_eq!(h.installer.install_count(), 0);
        assert!(!h.config.cache_path().exists());
        assert!(!h.config.backup_path().exists());
        assert_eq!(h.installed(), OLD_BINARY);
        assert_eq!(h.orchestrator.status().phase, CyclePhase::Idle);
        assert!(h.orchestrator.audit_log().entries()[0].contains("E_CHECKSUM"));
    }

    #[tokio::test]
    async fn test_missing_digest_is_accepted() {
        let h = Harness::new();
        h.publish("2.0.0", None);

        let outcome = h.orchestrator.run_cycle().await;
        assert!(matches!(outcome, UpdateOutcome::InstalledPendingHealthCheck(_)));
    }

    #[tokio::test]
    async fn test_unhealthy_update_rolls_back() {
        let h = Harness::new();
        h.probe.set_unhealthy("crashed on start");
        let backup = install_pending(&h).await;

        let outcome = h.orchestrator.run_health_check(&backup.path).await;

        assert!(matches!(outcome, UpdateOutcome::RolledBack(ref reason) if reason.contains("crashed on start")));
        assert_eq!(h.installed(), OLD_BINARY);
        assert_eq!(
            h.installer.installed_paths(),
            vec![h.config.cache_path(), backup.path.clone()]
        );
        assert!(!backup.path.exists());
        assert!(!h.config.cache_path().exists());

        let state = h.orchestrator.status();
        assert_eq!(state.phase, CyclePhase::Idle);
        assert!(state.committed_version.is_none());
        assert!(h.notifier.contains("rolled back"));
    }

    #[tokio::test]
    async fn test_failed_rollback_flags_installation() {
        let h = Harness::new();
        h.probe.set_unhealthy("crashed on start");
        h.installer.succeed_next();
        h.installer
            .fail_next(InstallerError::Rejected("package database locked".to_string()));
        let backup = install_pending(&h).await;

        let outcome = h.orchestrator.run_health_check(&backup.path).await;

        assert!(matches!(outcome, UpdateOutcome::RollbackFailed(_)));
        assert_eq!(outcome.job_result(), JobResult::Failure);
        assert_eq!(h.notifier.urgent().len(), 1);
        assert!(h.orchestrator.status().is_flagged());
        assert!(backup.path.exists());
        assert!(h
            .orchestrator
            .audit_log()
            .entries()
            .iter()
            .any(|line| line.contains("Rollback failed")));

        // Flagged: further cycles are refused until acknowledged.
        assert!(matches!(h.orchestrator.run_cycle().await, UpdateOutcome::Skipped(_)));
        assert_eq!(
            h.orchestrator.recover().await,
            RecoveryAction::StillFlagged {
                reason: h.orchestrator.status().flagged_reason.unwrap()
            }
        );

        assert!(h.orchestrator.acknowledge().await.unwrap());
        assert!(!h.orchestrator.acknowledge().await.unwrap());
        assert!(!h.orchestrator.status().is_flagged());
        assert!(!backup.path.exists());
    }

    #[tokio::test]
    async fn test_no_update_available() {
        let h = Harness::new();
        h.publish("1.0.0", None);

        assert_eq!(h.orchestrator.run_cycle().await, UpdateOutcome::NoUpdateAvailable);
        assert_eq!(h.orchestrator.run_cycle().await, UpdateOutcome::NoUpdateAvailable);

        let requests = h.http.get_requests();
        assert!(requests.iter().all(|r| r.method == "GET"));
        assert_eq!(h.installer.install_count(), 0);
        assert!(h.notifier.notifications().is_empty());

        let state = h.orchestrator.status();
        assert_eq!(state.phase, CyclePhase::Idle);
        assert!(state.last_check.is_some());
    }

    #[tokio::test]
    async fn test_check_failure_is_retryable() {
        let h = Harness::new();
        h.http.set_response(
            RELEASE_URL,
            MockResponse::Success(Response::new(503, Bytes::from("maintenance"))),
        );

        let outcome = h.orchestrator.run_cycle().await;
        assert!(matches!(outcome, UpdateOutcome::CheckFailed(_)));
        assert_eq!(outcome.job_result(), JobResult::Retry);
        assert_eq!(h.orchestrator.status().phase, CyclePhase::Idle);
    }

    #[tokio::test]
    async fn test_backup_failure_aborts_before_install() {
        let h = Harness::new();
        std::fs::remove_file(&h.config.artifact_path).unwrap();
        h.publish_valid();

        let outcome = h.orchestrator.run_cycle().await;

        assert_eq!(outcome, UpdateOutcome::InstallFailed(BACKUP_FAILED.to_string()));
        assert_eq!(h.installer.install_count(), 0);
        assert!(!h.config.cache_path().exists());
        assert!(!h.config.backup_path().exists());
    }

    #[tokio::test]
    async fn test_install_failure_cleans_up() {
        let h = Harness::new();
        h.installer
            .fail_next(InstallerError::Rejected("user declined".to_string()));
        h.publish_valid();

        let outcome = h.orchestrator.run_cycle().await;

        assert!(matches!(outcome, UpdateOutcome::InstallFailed(ref reason) if reason.contains("user declined")));
        assert!(!h.config.cache_path().exists());
        assert!(!h.config.backup_path().exists());
        assert_eq!(h.installed(), OLD_BINARY);
        assert!(h.scheduler.delayed_jobs().is_empty());
    }

    #[tokio::test]
    async fn test_concurrent_cycles_run_once() {
        let h = Harness::with(
            |config| config,
            |installer| installer.with_delay(Duration::from_millis(300)),
        );
        h.publish_valid();

        let (first, second) = tokio::join!(h.orchestrator.run_cycle(), h.orchestrator.run_cycle());

        let outcomes = [first, second];
        let skipped: Vec<_> = outcomes
            .iter()
            .filter(|o| matches!(o, UpdateOutcome::Skipped(_)))
            .collect();
        assert_eq!(skipped.len(), 1);
        assert!(matches!(skipped[0], UpdateOutcome::Skipped(ref reason) if reason.contains("holds the lock")));
        assert!(outcomes
            .iter()
            .any(|o| matches!(o, UpdateOutcome::InstalledPendingHealthCheck(_))));
        assert_eq!(h.installer.install_count(), 1);
    }

    #[tokio::test]
    async fn test_pending_health_check_blocks_new_cycle() {
        let h = Harness::new();
        install_pending(&h).await;

        let outcome = h.orchestrator.run_cycle().await;

        assert!(matches!(outcome, UpdateOutcome::Skipped(ref reason) if reason.contains("pending_health_check")));
        assert_eq!(h.installer.install_count(), 1);
        assert_eq!(h.orchestrator.status().phase, CyclePhase::PendingHealthCheck);
    }

    #[tokio::test]
    async fn test_stale_download_phase_is_recovered_before_cycle() {
        let h = Harness::new();
        let cache = h.config.cache_path();
        std::fs::create_dir_all(cache.parent().unwrap()).unwrap();
        std::fs::write(&cache, b"partial").unwrap();
        h.states()
            .save(&UpdateState {
                phase: CyclePhase::Downloading,
                ..Default::default()
            })
            .unwrap();
        h.publish_valid();

        let outcome = h.orchestrator.run_cycle().await;

        assert!(matches!(outcome, UpdateOutcome::InstalledPendingHealthCheck(_)));
        assert_eq!(h.installed(), NEW_BINARY);
        assert_eq!(h.installer.install_count(), 1);
    }

    #[tokio::test]
    async fn test_stale_install_phase_rolls_back_before_cycle() {
        let h = Harness::new();
        std::fs::write(&h.config.artifact_path, b"half written").unwrap();
        h.place_backup();
        h.states()
            .save(&UpdateState {
                phase: CyclePhase::Installing,
                target_version: Some("2.0.0".to_string()),
                backup: Some(h.backup_for_state()),
                ..Default::default()
            })
            .unwrap();
        h.publish_valid();

        let outcome = h.orchestrator.run_cycle().await;

        assert!(matches!(outcome, UpdateOutcome::RolledBack(ref r) if r.contains("installing")));
        assert_eq!(h.installed(), OLD_BINARY);
        assert!(!h.config.backup_path().exists());
        assert!(h.http.get_requests().is_empty());
        assert_eq!(h.orchestrator.status().phase, CyclePhase::Idle);
    }

    #[tokio::test]
    async fn test_install_timeout_leaves_rollback_to_recovery() {
        let h = Harness::with(
            |config| config.with_install_timeout_secs(1),
            |installer| installer.with_delay(Duration::from_secs(5)),
        );
        h.publish_valid();

        let outcome = h.orchestrator.run_cycle().await;

        assert!(matches!(outcome, UpdateOutcome::InstallFailed(ref r) if r.contains("did not finish")));
        assert_eq!(outcome.job_result(), JobResult::Retry);
        assert!(h.config.backup_path().exists());
        assert!(!h.config.cache_path().exists());
        assert!(h.scheduler.delayed_jobs().is_empty());

        let state = h.orchestrator.status();
        assert_eq!(state.phase, CyclePhase::Installing);
        assert_eq!(state.backup.map(|b| b.path), Some(h.config.backup_path()));
    }

    #[tokio::test]
    async fn test_pending_health_check_waits_until_due() {
        let h = Harness::new();
        install_pending(&h).await;

        let outcome = h.orchestrator.run_pending_health_check(false).await;
        assert!(matches!(outcome, UpdateOutcome::Skipped(ref reason) if reason.contains("not due")));
        assert_eq!(h.probe.calls(), 0);

        let outcome = h.orchestrator.run_pending_health_check(true).await;
        assert_eq!(outcome, UpdateOutcome::Committed("2.0.0".to_string()));
    }

    #[tokio::test]
    async fn test_health_check_without_pending_install() {
        let h = Harness::new();
        let outcome = h.orchestrator.run_health_check(&h.config.backup_path()).await;
        assert!(matches!(outcome, UpdateOutcome::Skipped(_)));
    }

    #[tokio::test]
    async fn test_recover_clean() {
        let h = Harness::new();
        assert_eq!(h.orchestrator.recover().await, RecoveryAction::Clean);
    }

    #[tokio::test]
    async fn test_recover_reschedules_pending_health_check() {
        let h = Harness::new();
        h.place_backup();
        h.states()
            .save(&UpdateState {
                phase: CyclePhase::PendingHealthCheck,
                target_version: Some("2.0.0".to_string()),
                backup: Some(h.backup_for_state()),
                health_check_due_at: Some(Utc::now() + chrono::Duration::seconds(60)),
                ..Default::default()
            })
            .unwrap();

        match h.orchestrator.recover().await {
            RecoveryAction::HealthCheckRescheduled { delay } => {
                assert!(delay <= Duration::from_secs(60));
                assert!(delay > Duration::from_secs(50));
            }
            other => panic!("expected reschedule, got {:?}", other),
        }
        assert_eq!(h.scheduler.delayed_jobs().len(), 1);
        assert_eq!(h.orchestrator.status().phase, CyclePhase::PendingHealthCheck);
    }

    #[tokio::test]
    async fn test_recover_rolls_back_overdue_health_check() {
        let h = Harness::new();
        std::fs::write(&h.config.artifact_path, NEW_BINARY).unwrap();
        h.place_backup();
        h.states()
            .save(&UpdateState {
                phase: CyclePhase::PendingHealthCheck,
                target_version: Some("2.0.0".to_string()),
                backup: Some(h.backup_for_state()),
                health_check_due_at: Some(Utc::now() - chrono::Duration::hours(2)),
                ..Default::default()
            })
            .unwrap();

        let action = h.orchestrator.recover().await;

        assert!(matches!(action, RecoveryAction::Resolved(UpdateOutcome::RolledBack(_))));
        assert_eq!(h.installed(), OLD_BINARY);
        assert!(!h.config.backup_path().exists());
        assert_eq!(h.orchestrator.status().phase, CyclePhase::Idle);
        assert!(h.notifier.contains("Rolling back to the previous version"));
    }

    #[tokio::test]
    async fn test_recover_commits_when_backup_already_gone() {
        let h = Harness::new();
        h.states()
            .save(&UpdateState {
                phase: CyclePhase::PendingHealthCheck,
                target_version: Some("2.0.0".to_string()),
                health_check_due_at: Some(Utc::now()),
                ..Default::default()
            })
            .unwrap();

        assert_eq!(
            h.orchestrator.recover().await,
            RecoveryAction::Resolved(UpdateOutcome::Committed("2.0.0".to_string()))
        );
        assert_eq!(
            h.orchestrator.status().committed_version.as_deref(),
            Some("2.0.0")
        );
    }

    #[tokio::test]
    async fn test_recover_interrupted_install_rolls_back() {
        let h = Harness::new();
        std::fs::write(&h.config.artifact_path, b"half written").unwrap();
        h.place_backup();
        h.states()
            .save(&UpdateState {
                phase: CyclePhase::Installing,
                target_version: Some("2.0.0".to_string()),
                backup: Some(h.backup_for_state()),
                ..Default::default()
            })
            .unwrap();

        let action = h.orchestrator.recover().await;

        assert!(matches!(action, RecoveryAction::Resolved(UpdateOutcome::RolledBack(ref r)) if r.contains("installing")));
        assert_eq!(h.installed(), OLD_BINARY);
    }

    #[tokio::test]
    async fn test_recover_discards_pre_install_cycle() {
        let h = Harness::new();
        let cache = h.config.cache_path();
        std::fs::create_dir_all(cache.parent().unwrap()).unwrap();
        std::fs::write(&cache, b"partial").unwrap();
        h.states()
            .save(&UpdateState {
                phase: CyclePhase::Downloading,
                ..Default::default()
            })
            .unwrap();

        assert_eq!(
            h.orchestrator.recover().await,
            RecoveryAction::DiscardedPartialCycle {
                phase: CyclePhase::Downloading
            }
        );
        assert!(!cache.exists());
        assert_eq!(h.orchestrator.status().phase, CyclePhase::Idle);
        assert_eq!(h.installer.install_count(), 0);
    }

    #[tokio::test]
    async fn test_recover_orphan_backup_rolls_back() {
        let h = Harness::new();
        std::fs::write(&h.config.artifact_path, NEW_BINARY).unwrap();
        h.place_backup();

        let action = h.orchestrator.recover().await;

        assert!(matches!(action, RecoveryAction::Resolved(UpdateOutcome::RolledBack(_))));
        assert_eq!(h.installed(), OLD_BINARY);
        assert!(!h.config.backup_path().exists());
    }
}
