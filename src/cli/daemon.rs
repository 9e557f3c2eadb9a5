//! Daemon mode: keep running and serve scheduled jobs.
//!
//! Startup runs recovery first, then registers the periodic update check.
//! Jobs are served one at a time until Ctrl-C.

use std::sync::Arc;

use crate::adapters::{ScheduledJob, TokioScheduler};
use crate::config::AgentConfig;
use crate::traits::JobResult;
use crate::update::{log_update_info, RecoveryAction, UpdateOrchestrator, UpdateOutcome};

use super::update::{build_orchestrator, EXIT_OK};

/// Run one fired job and return the result the scheduler should see.
pub async fn run_job(orchestrator: &UpdateOrchestrator, job: &ScheduledJob) -> JobResult {
    let outcome = match job {
        ScheduledJob::Periodic { .. } => orchestrator.run_cycle().await,
        ScheduledJob::Delayed { backup_path, .. } => {
            orchestrator.run_health_check(backup_path).await
        }
    };
    tracing::info!(target: "autopatch::update", job = job.key(), "Job finished: {}", outcome);
    outcome.job_result()
}

/// `autopatch daemon`.
pub async fn run_daemon(config: &AgentConfig) -> color_eyre::Result<i32> {
    let (scheduler, mut jobs) = TokioScheduler::new();
    let orchestrator = build_orchestrator(config, Arc::new(scheduler.clone()));

    match orchestrator.recover().await {
        RecoveryAction::Clean => {}
        RecoveryAction::Resolved(UpdateOutcome::RollbackFailed(reason))
        | RecoveryAction::StillFlagged { reason } => {
            tracing::error!(
                target: "autopatch::update",
                "Updates paused until `autopatch acknowledge`: {}",
                reason
            );
        }
        action => tracing::info!(target: "autopatch::update", "Startup recovery: {:?}", action),
    }

    orchestrator.register_periodic_check()?;
    tracing::info!(
        target: "autopatch::update",
        "Daemon started, checking every {}s",
        config.check_interval_secs
    );

    loop {
        tokio::select! {
            job = jobs.recv() => {
                let Some(job) = job else { break };
                let result = run_job(&orchestrator, &job).await;
                if matches!(job, ScheduledJob::Periodic { .. }) {
                    scheduler.report(job.key(), result);
                }
            }
            _ = tokio::signal::ctrl_c() => {
                log_update_info("Shutting down");
                break;
            }
        }
    }

    scheduler.shutdown();
    Ok(EXIT_OK)
}
