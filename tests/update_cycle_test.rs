//! End-to-end update cycles against a mock release server.
//!
//! These tests cover the four canonical runs:
//! - Healthy update: install, health check passes, backup deleted
//! - Digest mismatch: nothing is installed
//! - Unhealthy update: rolled back to the backup
//! - Failed rollback: installation flagged until acknowledged
//!
//! plus the cleanup guarantees around cached artifacts and backups.

mod common;

use std::time::Duration;

use autopatch::traits::{InstallerError, JobResult, HEALTH_CHECK_JOB_KEY};
use autopatch::update::{CyclePhase, UpdateOutcome, SIGNATURE_MISMATCH};
use common::{sha256_hex, TestEnv, NEW_PAYLOAD, OLD_PAYLOAD, RELEASE_PATH};
use wiremock::matchers::{method, path};
use wiremock::{Mock, ResponseTemplate};

/// After a cycle ends, the cache and the backup are never both on disk.
fn assert_single_copy(env: &TestEnv) {
    assert!(
        !(env.backup_exists() && env.cached_artifact_exists()),
        "backup and cached artifact both present"
    );
}

// ============================================================================
// Scenario A: healthy update
// ============================================================================

#[tokio::test]
async fn test_healthy_update_is_committed() {
    let env = TestEnv::start().await;
    env.publish_valid("2.0.0").await;
    let orchestrator = env.orchestrator();

    let outcome = orchestrator.run_cycle().await;
    let backup = match outcome {
        UpdateOutcome::InstalledPendingHealthCheck(backup) => backup,
        other => panic!("unexpected outcome: {:?}", other),
    };

    assert_eq!(env.installed(), NEW_PAYLOAD);
    assert_eq!(std::fs::read(&backup.path).unwrap(), OLD_PAYLOAD);
    assert!(!env.cached_artifact_exists());
    assert_single_copy(&env);

    let jobs = env.scheduler.delayed_jobs();
    assert_eq!(jobs.len(), 1);
    assert_eq!(jobs[0].key, HEALTH_CHECK_JOB_KEY);
    assert_eq!(jobs[0].delay, Duration::from_secs(300));

    // The delayed job fires.
    let outcome = orchestrator.run_health_check(&jobs[0].backup_path).await;
    assert_eq!(outcome, UpdateOutcome::Committed("2.0.0".to_string()));
    assert_eq!(outcome.job_result(), JobResult::Success);

    assert!(!env.backup_exists());
    assert!(!env.cached_artifact_exists());
    assert_eq!(env.installed(), NEW_PAYLOAD);
    assert_eq!(env.state().phase, CyclePhase::Idle);
    assert!(env.notifier.urgent().is_empty());
}

#[tokio::test]
async fn test_up_to_date_cycles_are_idempotent() {
    let env = TestEnv::start().await;
    env.publish_valid("1.0.0").await;
    let orchestrator = env.orchestrator();

    for _ in 0..3 {
        assert_eq!(orchestrator.run_cycle().await, UpdateOutcome::NoUpdateAvailable);
    }

    assert_eq!(env.installer.install_count(), 0);
    assert!(!env.backup_exists());
    assert!(!env.cached_artifact_exists());
    assert_eq!(env.installed(), OLD_PAYLOAD);

    let requests = env.server.received_requests().await.unwrap();
    assert_eq!(requests.len(), 3);
    assert!(requests.iter().all(|r| r.url.path() == RELEASE_PATH));
}

// ============================================================================
// Scenario B: digest mismatch
// ============================================================================

#[tokio::test]
async fn test_digest_mismatch_installs_nothing() {
    let env = TestEnv::start().await;
    env.publish("2.0.0", b"tampered payload", Some(sha256_hex(NEW_PAYLOAD)))
        .await;

    let outcome = env.orchestrator().run_cycle().await;

    assert_eq!(outcome, UpdateOutcome::InstallFailed(SIGNATURE_MISMATCH.to_string()));
    assert_eq!(outcome.job_result(), JobResult::Retry);
    assert_eq!(env.installer.install_count(), 0);
    assert!(!env.cached_artifact_exists());
    assert!(!env.backup_exists());
    assert_eq!(env.installed(), OLD_PAYLOAD);

    let audit = std::fs::read_to_string(env.audit_path()).unwrap();
    assert!(audit.contains("E_CHECKSUM"));
}

#[tokio::test]
async fn test_digest_comparison_ignores_case() {
    let env = TestEnv::start().await;
    env.publish(
        "2.0.0",
        NEW_PAYLOAD,
        Some(sha256_hex(NEW_PAYLOAD).to_ascii_uppercase()),
    )
    .await;

    let outcome = env.orchestrator().run_cycle().await;
    assert!(matches!(outcome, UpdateOutcome::InstalledPendingHealthCheck(_)));
}

// ============================================================================
// Scenario C: unhealthy update rolls back
// ============================================================================

#[tokio::test]
async fn test_unhealthy_update_is_rolled_back() {
    let env = TestEnv::start().await;
    env.probe.set_unhealthy("exit status 139");
    env.publish_valid("2.0.0").await;
    let orchestrator = env.orchestrator();

    assert!(matches!(
        orchestrator.run_cycle().await,
        UpdateOutcome::InstalledPendingHealthCheck(_)
    ));
    assert_eq!(env.installed(), NEW_PAYLOAD);

    let outcome = orchestrator.run_pending_health_check(true).await;

    assert!(matches!(outcome, UpdateOutcome::RolledBack(_)));
    assert_eq!(outcome.job_result(), JobResult::Failure);
    assert_eq!(env.installed(), OLD_PAYLOAD);
    assert!(!env.backup_exists());
    assert_single_copy(&env);
    assert_eq!(env.state().phase, CyclePhase::Idle);
    assert!(env.notifier.contains("rolled back"));
}

// ============================================================================
// Scenario D: rollback fails
// ============================================================================

#[tokio::test]
async fn test_failed_rollback_requires_acknowledgement() {
    let env = TestEnv::start().await;
    env.probe.set_unhealthy("exit status 139");
    env.installer.succeed_next();
    env.installer
        .fail_next(InstallerError::Rejected("package database locked".to_string()));
    env.publish_valid("2.0.0").await;
    let orchestrator = env.orchestrator();

    orchestrator.run_cycle().await;
    let outcome = orchestrator.run_pending_health_check(true).await;

    assert!(matches!(outcome, UpdateOutcome::RollbackFailed(_)));
    let urgent = env.notifier.urgent();
    assert_eq!(urgent.len(), 1);
    assert!(urgent[0].message.contains("Manual intervention"));

    let state = env.state();
    assert_eq!(state.phase, CyclePhase::RollbackFailed);
    assert!(state.flagged_reason.is_some());
    assert!(std::fs::read_to_string(env.audit_path())
        .unwrap()
        .contains("Rollback failed"));

    // A new process refuses to update until the flag is cleared.
    let restarted = env.orchestrator();
    env.publish_valid("2.1.0").await;
    assert!(matches!(restarted.run_cycle().await, UpdateOutcome::Skipped(_)));
    assert_eq!(env.installer.install_count(), 2);

    assert!(restarted.acknowledge().await.unwrap());
    assert!(matches!(
        restarted.run_cycle().await,
        UpdateOutcome::InstalledPendingHealthCheck(_)
    ));
}

// ============================================================================
// Download and install failures
// ============================================================================

#[tokio::test]
async fn test_missing_artifact_download_fails() {
    let env = TestEnv::start().await;
    env.publish_valid("2.0.0").await;
    env.server.reset().await;
    Mock::given(method("GET"))
        .and(path(RELEASE_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(common::release_json(
            "2.0.0",
            &env.download_url("2.0.0"),
            None,
        )))
        .mount(&env.server)
        .await;

    let outcome = env.orchestrator().run_cycle().await;

    assert!(matches!(outcome, UpdateOutcome::InstallFailed(_)));
    assert!(!env.cached_artifact_exists());
    assert!(!env.backup_exists());
    assert_eq!(env.state().phase, CyclePhase::Idle);
}

#[tokio::test]
async fn test_release_endpoint_down_is_retryable() {
    let env = TestEnv::start().await;
    Mock::given(method("GET"))
        .and(path(RELEASE_PATH))
        .respond_with(ResponseTemplate::new(502))
        .mount(&env.server)
        .await;

    let outcome = env.orchestrator().run_cycle().await;

    assert!(matches!(outcome, UpdateOutcome::CheckFailed(_)));
    assert_eq!(outcome.job_result(), JobResult::Retry);
}

#[tokio::test]
async fn test_declined_install_leaves_nothing_behind() {
    let env = TestEnv::start().await;
    env.installer
        .fail_next(InstallerError::Rejected("user cancelled".to_string()));
    env.publish_valid("2.0.0").await;

    let outcome = env.orchestrator().run_cycle().await;

    assert!(matches!(outcome, UpdateOutcome::InstallFailed(_)));
    assert!(!env.cached_artifact_exists());
    assert!(!env.backup_exists());
    assert_eq!(env.installed(), OLD_PAYLOAD);
    assert!(env.scheduler.delayed_jobs().is_empty());
}

#[tokio::test]
async fn test_installer_timeout_is_rolled_back_on_next_run() {
    let env = TestEnv::start_with(|config| config.with_install_timeout_secs(1)).await;
    let prompt_installer = env.installer.clone();
    let env = TestEnv {
        installer: prompt_installer.clone().with_delay(Duration::from_secs(30)),
        ..env
    };
    env.publish_valid("2.0.0").await;

    let started = std::time::Instant::now();
    let outcome = env.orchestrator().run_cycle().await;

    assert!(matches!(outcome, UpdateOutcome::InstallFailed(ref reason) if reason.contains("did not finish")));
    assert!(started.elapsed() < Duration::from_secs(10));
    // The installer may still be running, so the backup stays for recovery.
    assert!(env.backup_exists());
    assert!(!env.cached_artifact_exists());
    assert_eq!(env.state().phase, CyclePhase::Installing);

    // The next one-shot run settles it before checking again.
    let env = TestEnv {
        installer: prompt_installer,
        ..env
    };
    let outcome = env.orchestrator().run_cycle().await;

    assert!(matches!(outcome, UpdateOutcome::RolledBack(ref reason) if reason.contains("installing")));
    assert_eq!(env.installed(), OLD_PAYLOAD);
    assert!(!env.backup_exists());
    assert_eq!(env.state().phase, CyclePhase::Idle);
}
