//! Mock package installer for testing.

use async_trait::async_trait;
use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::traits::{InstallerError, PackageInstaller};

/// Mock installer that records every artifact it is asked to install.
///
/// Results are queued: each call pops the next queued result, and succeeds
/// once the queue is empty. With a target set, a successful install copies
/// the artifact over the target so tests can observe what is "installed".
///
/// # Example
///
/// ```ignore
/// use autopatch::adapters::mock::MockInstaller;
///
/// let installer = MockInstaller::new();
/// installer.succeed_next();
/// installer.fail_next(InstallerError::Rejected("disk full".to_string()));
/// // First install succeeds, the rollback that follows fails.
/// ```
#[derive(Debug, Clone, Default)]
pub struct MockInstaller {
    installed: Arc<Mutex<Vec<PathBuf>>>,
    results: Arc<Mutex<VecDeque<Option<InstallerError>>>>,
    delay: Option<Duration>,
    target: Option<PathBuf>,
}

impl MockInstaller {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait this long before answering.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Copy each successfully installed artifact over `target`.
    pub fn with_target(mut self, target: impl Into<PathBuf>) -> Self {
        self.target = Some(target.into());
        self
    }

    /// Queue a failure.
    pub fn fail_next(&self, error: InstallerError) {
        self.results.lock().unwrap().push_back(Some(error));
    }

    /// Queue a success, so a later queued failure hits a later call.
    pub fn succeed_next(&self) {
        self.results.lock().unwrap().push_back(None);
    }

    /// Artifacts passed to `install`, in call order, including failed calls.
    pub fn installed_paths(&self) -> Vec<PathBuf> {
        self.installed.lock().unwrap().clone()
    }

    pub fn install_count(&self) -> usize {
        self.installed.lock().unwrap().len()
    }
}

#[async_trait]
impl PackageInstaller for MockInstaller {
    fn name(&self) -> &str {
        "mock"
    }

    async fn install(&self, artifact: &Path) -> Result<(), InstallerError> {
        self.installed.lock().unwrap().push(artifact.to_path_buf());

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        let queued = self.results.lock().unwrap().pop_front().flatten();
        if let Some(error) = queued {
            return Err(error);
        }

        if let Some(target) = &self.target {
            std::fs::copy(artifact, target).map_err(|e| InstallerError::Io(e.to_string()))?;
        }
        Ok(())
    }
}
