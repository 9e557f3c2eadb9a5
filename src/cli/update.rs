//! Update commands for the autopatch CLI.
//!
//! Wires the production adapters into an [`UpdateOrchestrator`] and maps
//! outcomes to exit codes.

use std::sync::Arc;

use crate::adapters::{CommandInstaller, OsNotifier, ReplaceInstaller, ReqwestHttpClient};
use crate::config::AgentConfig;
use crate::traits::{HealthProbe, JobScheduler, PackageInstaller};
use crate::update::{
    ArtifactPresentProbe, Collaborators, CommandProbe, RecoveryAction, UpdateOrchestrator,
    UpdateOutcome,
};

/// Exit code for success, including "nothing to do".
pub const EXIT_OK: i32 = 0;
/// Exit code for a failed check, install or rolled-back update.
pub const EXIT_FAILURE: i32 = 1;
/// Exit code when the installation needs manual repair.
pub const EXIT_MANUAL_INTERVENTION: i32 = 2;

/// Exit code for an outcome.
pub fn outcome_exit_code(outcome: &UpdateOutcome) -> i32 {
    match outcome {
        UpdateOutcome::RollbackFailed(_) => EXIT_MANUAL_INTERVENTION,
        outcome if outcome.is_failure() => EXIT_FAILURE,
        _ => EXIT_OK,
    }
}

/// The installer named by the config, or in-place replacement of the artifact.
pub fn build_installer(config: &AgentConfig) -> Arc<dyn PackageInstaller> {
    match config
        .installer_command
        .as_deref()
        .and_then(CommandInstaller::from_command_line)
    {
        Some(installer) => Arc::new(installer),
        None => Arc::new(ReplaceInstaller::new(&config.artifact_path)),
    }
}

/// The artifact must be present; `health_command`, if set, must exit 0.
pub fn default_probes(config: &AgentConfig) -> Vec<Arc<dyn HealthProbe>> {
    let mut probes: Vec<Arc<dyn HealthProbe>> =
        vec![Arc::new(ArtifactPresentProbe::new(&config.artifact_path))];
    if let Some(probe) = config
        .health_command
        .as_deref()
        .and_then(CommandProbe::from_command_line)
    {
        probes.push(Arc::new(probe));
    }
    probes
}

/// Build an orchestrator with the production adapters.
pub fn build_orchestrator(
    config: &AgentConfig,
    scheduler: Arc<dyn JobScheduler>,
) -> UpdateOrchestrator {
    let collaborators = Collaborators {
        http: Arc::new(ReqwestHttpClient::with_timeout(config.check_timeout())),
        installer: build_installer(config),
        notifier: Arc::new(OsNotifier::new()),
        scheduler,
        probes: default_probes(config),
    };
    UpdateOrchestrator::new(config, collaborators)
}

/// `autopatch check`: one update cycle.
pub async fn handle_check_command(orchestrator: &UpdateOrchestrator) -> i32 {
    println!("Checking for updates...");
    let outcome = orchestrator.run_cycle().await;

    match &outcome {
        UpdateOutcome::NoUpdateAvailable => {
            println!("You are already running the latest version.")
        }
        UpdateOutcome::InstalledPendingHealthCheck(backup) => {
            println!("Update installed. Previous version backed up to {}", backup.path.display());
            if let Some(due) = orchestrator.status().health_check_due_at {
                println!(
                    "Run `autopatch health-check` after {} to confirm it.",
                    due.to_rfc3339()
                );
            }
        }
        UpdateOutcome::Skipped(reason) => println!("Skipped: {}", reason),
        other => eprintln!("Update failed: {}", other),
    }
    outcome_exit_code(&outcome)
}

/// `autopatch health-check [--force]`.
pub async fn handle_health_check_command(orchestrator: &UpdateOrchestrator, force: bool) -> i32 {
    let outcome = orchestrator.run_pending_health_check(force).await;
    match &outcome {
        UpdateOutcome::Committed(version) => println!("Version {} is healthy and committed.", version),
        UpdateOutcome::Skipped(reason) => println!("Nothing to do: {}", reason),
        other => eprintln!("{}", other),
    }
    outcome_exit_code(&outcome)
}

/// `autopatch recover`.
pub async fn handle_recover_command(orchestrator: &UpdateOrchestrator) -> i32 {
    let action = orchestrator.recover().await;
    report_recovery(&action)
}

/// Print what recovery did and return the matching exit code.
pub fn report_recovery(action: &RecoveryAction) -> i32 {
    match action {
        RecoveryAction::Clean => {
            println!("Nothing to recover.");
            EXIT_OK
        }
        RecoveryAction::DiscardedPartialCycle { phase } => {
            println!("Discarded an update interrupted while {}.", phase);
            EXIT_OK
        }
        RecoveryAction::HealthCheckRescheduled { delay } => {
            println!("Health check rescheduled in {}s.", delay.as_secs());
            EXIT_OK
        }
        RecoveryAction::Resolved(outcome) => {
            println!("Recovered: {}", outcome);
            outcome_exit_code(outcome)
        }
        RecoveryAction::StillFlagged { reason } => {
            eprintln!("Manual intervention required: {}", reason);
            eprintln!("Repair the installation, then run `autopatch acknowledge`.");
            EXIT_MANUAL_INTERVENTION
        }
    }
}

/// `autopatch acknowledge`.
pub async fn handle_acknowledge_command(orchestrator: &UpdateOrchestrator) -> color_eyre::Result<i32> {
    if orchestrator.acknowledge().await? {
        println!("Rollback failure acknowledged. Updates resumed.");
    } else {
        println!("Nothing to acknowledge.");
    }
    Ok(EXIT_OK)
}
