//! Mock health probe for testing.

use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::traits::HealthProbe;

/// Probe with a configurable verdict.
///
/// Clones share the verdict, so a test can flip a probe that was already
/// handed to the orchestrator.
#[derive(Debug, Clone)]
pub struct MockHealthProbe {
    name: String,
    verdict: Arc<Mutex<Result<(), String>>>,
    delay: Option<Duration>,
    calls: Arc<AtomicUsize>,
}

impl MockHealthProbe {
    pub fn healthy(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            verdict: Arc::new(Mutex::new(Ok(()))),
            delay: None,
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn unhealthy(name: impl Into<String>, reason: impl Into<String>) -> Self {
        let probe = Self::healthy(name);
        probe.set_unhealthy(reason);
        probe
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn set_healthy(&self) {
        *self.verdict.lock().unwrap() = Ok(());
    }

    pub fn set_unhealthy(&self, reason: impl Into<String>) {
        *self.verdict.lock().unwrap() = Err(reason.into());
    }

    /// How many times the probe ran.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl HealthProbe for MockHealthProbe {
    fn name(&self) -> &str {
        &self.name
    }

    async fn check(&self) -> Result<(), String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.verdict.lock().unwrap().clone()
    }
}
