//! In-process job scheduler built on tokio timers.
//!
//! Jobs are not run by the scheduler itself. When a job fires, a
//! [`ScheduledJob`] is sent on the channel returned by
//! [`TokioScheduler::new`], and the receiver (the daemon loop) runs it and
//! reports the [`JobResult`] back through [`TokioScheduler::report`].

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::traits::{
    DelayedJobSpec, JobResult, JobScheduler, PeriodicJobSpec, SchedulerError,
};

/// A job whose time has come.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScheduledJob {
    Periodic { key: String },
    Delayed { key: String, backup_path: PathBuf },
}

impl ScheduledJob {
    pub fn key(&self) -> &str {
        match self {
            ScheduledJob::Periodic { key } | ScheduledJob::Delayed { key, .. } => key,
        }
    }
}

#[derive(Debug)]
struct PeriodicEntry {
    spec: PeriodicJobSpec,
    /// Consecutive `Retry` results
    attempts: u32,
    ticker: JoinHandle<()>,
    retry: Option<JoinHandle<()>>,
}

#[derive(Debug, Default)]
struct Jobs {
    periodic: HashMap<String, PeriodicEntry>,
    delayed: HashMap<String, JoinHandle<()>>,
}

/// Scheduler for a long-running agent process.
#[derive(Debug, Clone)]
pub struct TokioScheduler {
    jobs: Arc<Mutex<Jobs>>,
    tx: mpsc::UnboundedSender<ScheduledJob>,
}

impl TokioScheduler {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<ScheduledJob>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let scheduler = Self {
            jobs: Arc::new(Mutex::new(Jobs::default())),
            tx,
        };
        (scheduler, rx)
    }

    /// Feed back the result of a periodic job.
    ///
    /// `Retry` schedules an extra run after the job's exponential backoff.
    /// `Success` and `Failure` reset the backoff.
    pub fn report(&self, key: &str, result: JobResult) -> Option<Duration> {
        let handle = tokio::runtime::Handle::try_current().ok()?;
        let mut jobs = self.jobs.lock().ok()?;
        let entry = jobs.periodic.get_mut(key)?;

        if let Some(previous) = entry.retry.take() {
            previous.abort();
        }

        if result != JobResult::Retry {
            entry.attempts = 0;
            return None;
        }

        let delay = entry.spec.backoff.delay_for(entry.attempts);
        entry.attempts = entry.attempts.saturating_add(1);
        let job = ScheduledJob::Periodic {
            key: key.to_string(),
        };
        entry.retry = Some(handle.spawn(fire_after(self.tx.clone(), delay, job)));

        tracing::info!(
            target: "autopatch::update",
            "Job {} will retry in {}s",
            key,
            delay.as_secs()
        );
        Some(delay)
    }

    /// Stop every timer.
    pub fn shutdown(&self) {
        if let Ok(mut jobs) = self.jobs.lock() {
            for (_, entry) in jobs.periodic.drain() {
                entry.ticker.abort();
                if let Some(retry) = entry.retry {
                    retry.abort();
                }
            }
            for (_, handle) in jobs.delayed.drain() {
                handle.abort();
            }
        }
    }

    pub fn has_job(&self, key: &str) -> bool {
        self.jobs
            .lock()
            .map(|jobs| jobs.periodic.contains_key(key) || jobs.delayed.contains_key(key))
            .unwrap_or(false)
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Jobs>, SchedulerError> {
        self.jobs
            .lock()
            .map_err(|_| SchedulerError::Unavailable("job table poisoned".to_string()))
    }
}

fn runtime() -> Result<tokio::runtime::Handle, SchedulerError> {
    tokio::runtime::Handle::try_current()
        .map_err(|e| SchedulerError::Unavailable(format!("no async runtime: {}", e)))
}

async fn fire_after(tx: mpsc::UnboundedSender<ScheduledJob>, delay: Duration, job: ScheduledJob) {
    tokio::time::sleep(delay).await;
    let _ = tx.send(job);
}

async fn fire_every(tx: mpsc::UnboundedSender<ScheduledJob>, interval: Duration, key: String) {
    // The first tick of `interval` completes immediately.
    let mut ticker = tokio::time::interval(interval.max(Duration::from_millis(1)));
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    loop {
        ticker.tick().await;
        if tx.send(ScheduledJob::Periodic { key: key.clone() }).is_err() {
            break;
        }
    }
}

impl JobScheduler for TokioScheduler {
    /// A key that is already registered keeps its existing registration.
    fn schedule_periodic(&self, spec: PeriodicJobSpec) -> Result<(), SchedulerError> {
        let handle = runtime()?;
        let mut jobs = self.lock()?;
        if jobs.periodic.contains_key(&spec.key) {
            tracing::debug!(target: "autopatch::update", "Job {} already registered", spec.key);
            return Ok(());
        }

        let ticker = handle.spawn(fire_every(self.tx.clone(), spec.interval, spec.key.clone()));
        tracing::info!(
            target: "autopatch::update",
            "Registered job {} every {}s",
            spec.key,
            spec.interval.as_secs()
        );
        jobs.periodic.insert(
            spec.key.clone(),
            PeriodicEntry {
                spec,
                attempts: 0,
                ticker,
                retry: None,
            },
        );
        Ok(())
    }

    /// Replaces a pending job with the same key.
    fn schedule_delayed(&self, spec: DelayedJobSpec) -> Result<(), SchedulerError> {
        let handle = runtime()?;
        let mut jobs = self.lock()?;

        let job = ScheduledJob::Delayed {
            key: spec.key.clone(),
            backup_path: spec.backup_path,
        };
        let task = handle.spawn(fire_after(self.tx.clone(), spec.delay, job));
        if let Some(previous) = jobs.delayed.insert(spec.key.clone(), task) {
            previous.abort();
        }

        tracing::info!(
            target: "autopatch::update",
            "Scheduled job {} in {}s",
            spec.key,
            spec.delay.as_secs()
        );
        Ok(())
    }
}

/// Scheduler for one-shot invocations.
///
/// Nothing stays alive to run a job, so registrations are only logged. The
/// pending health check is persisted in the state file and picked up by the
/// next `health-check` or `recover` run; the periodic check is expected to be
/// driven by an external timer (cron, systemd, launchd).
#[derive(Debug, Clone, Default)]
pub struct DeferredScheduler;

impl DeferredScheduler {
    pub fn new() -> Self {
        Self
    }
}

impl JobScheduler for DeferredScheduler {
    fn schedule_periodic(&self, spec: PeriodicJobSpec) -> Result<(), SchedulerError> {
        tracing::debug!(
            target: "autopatch::update",
            "Job {} left to the external timer",
            spec.key
        );
        Ok(())
    }

    fn schedule_delayed(&self, spec: DelayedJobSpec) -> Result<(), SchedulerError> {
        tracing::info!(
            target: "autopatch::update",
            "Job {} due in {}s; run `autopatch health-check` then",
            spec.key,
            spec.delay.as_secs()
        );
        Ok(())
    }
}
