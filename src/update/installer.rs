//! Installer adapter.
//!
//! Wraps the external [`PackageInstaller`] so every install and every
//! rollback resolves within a bounded wait. The installer future is dropped
//! when the wait expires; installers that spawn processes kill them on drop.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

use crate::traits::{InstallerError, PackageInstaller};

/// Default install timeout.
pub const INSTALL_TIMEOUT_SECS: u64 = 300;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum InstallError {
    #[error(transparent)]
    Installer(#[from] InstallerError),

    #[error("installer did not finish within {secs}s")]
    TimedOut { secs: u64 },
}

#[derive(Clone)]
pub struct InstallerAdapter {
    installer: Arc<dyn PackageInstaller>,
    timeout: Duration,
}

impl std::fmt::Debug for InstallerAdapter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InstallerAdapter")
            .field("installer", &self.installer.name())
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl InstallerAdapter {
    pub fn new(installer: Arc<dyn PackageInstaller>) -> Self {
        Self {
            installer,
            timeout: Duration::from_secs(INSTALL_TIMEOUT_SECS),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn installer_name(&self) -> &str {
        self.installer.name()
    }

    /// Install `artifact`, giving up after the configured timeout.
    pub async fn install(&self, artifact: &Path) -> Result<(), InstallError> {
        tracing::debug!(
            target: "autopatch::update",
            installer = self.installer.name(),
            "Handing {} to installer",
            artifact.display()
        );

        match tokio::time::timeout(self.timeout, self.installer.install(artifact)).await {
            Ok(result) => result.map_err(InstallError::from),
            Err(_) => Err(InstallError::TimedOut {
                secs: self.timeout.as_secs(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::mock::MockInstaller;
    use std::path::PathBuf;

    #[tokio::test]
    async fn test_install_success() {
        let installer = MockInstaller::new();
        let adapter = InstallerAdapter::new(Arc::new(installer.clone()));

        adapter.install(Path::new("/tmp/artifact")).await.unwrap();

        assert_eq!(
            installer.installed_paths(),
            vec![PathBuf::from("/tmp/artifact")]
        );
    }

    #[tokio::test]
    async fn test_install_failure_is_propagated() {
        let installer = MockInstaller::new();
        installer.fail_next(InstallerError::Rejected("exit status 1".to_string()));
        let adapter = InstallerAdapter::new(Arc::new(installer));

        let err = adapter.install(Path::new("/tmp/artifact")).await.unwrap_err();
        assert_eq!(
            err,
            InstallError::Installer(InstallerError::Rejected("exit status 1".to_string()))
        );
    }

    #[tokio::test]
    async fn test_install_times_out() {
        let installer = MockInstaller::new().with_delay(Duration::from_secs(30));
        let adapter =
            InstallerAdapter::new(Arc::new(installer)).with_timeout(Duration::from_millis(50));

        let err = adapter.install(Path::new("/tmp/artifact")).await.unwrap_err();
        assert!(matches!(err, InstallError::TimedOut { .. }));
    }
}
