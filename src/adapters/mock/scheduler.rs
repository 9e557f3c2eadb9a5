//! Recording job scheduler for testing.

use std::sync::{Arc, Mutex};

use crate::traits::{DelayedJobSpec, JobScheduler, PeriodicJobSpec, SchedulerError};

/// Scheduler that records registrations instead of running anything.
///
/// Periodic registrations keep the first spec per key, like a real
/// keyed scheduler.
#[derive(Debug, Clone, Default)]
pub struct MockScheduler {
    periodic: Arc<Mutex<Vec<PeriodicJobSpec>>>,
    delayed: Arc<Mutex<Vec<DelayedJobSpec>>>,
    failure: Arc<Mutex<Option<SchedulerError>>>,
}

impl MockScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every registration fail with `error`.
    pub fn fail_with(&self, error: SchedulerError) {
        *self.failure.lock().unwrap() = Some(error);
    }

    pub fn periodic_jobs(&self) -> Vec<PeriodicJobSpec> {
        self.periodic.lock().unwrap().clone()
    }

    /// Delayed jobs in registration order.
    pub fn delayed_jobs(&self) -> Vec<DelayedJobSpec> {
        self.delayed.lock().unwrap().clone()
    }

    fn check_failure(&self) -> Result<(), SchedulerError> {
        match self.failure.lock().unwrap().clone() {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }
}

impl JobScheduler for MockScheduler {
    fn schedule_periodic(&self, spec: PeriodicJobSpec) -> Result<(), SchedulerError> {
        self.check_failure()?;
        let mut periodic = self.periodic.lock().unwrap();
        if !periodic.iter().any(|existing| existing.key == spec.key) {
            periodic.push(spec);
        }
        Ok(())
    }

    fn schedule_delayed(&self, spec: DelayedJobSpec) -> Result<(), SchedulerError> {
        self.check_failure()?;
        self.delayed.lock().unwrap().push(spec);
        Ok(())
    }
}
