//! Package installer trait abstraction.
//!
//! The OS-level installer is an external collaborator: it receives a path to
//! an artifact and either installs it or fails. Whether it needs the user to
//! confirm the install is its own business; the update agent only bounds how
//! long it waits (see `update::installer::InstallerAdapter`).

use async_trait::async_trait;
use std::path::Path;

/// Errors reported by an installer collaborator.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum InstallerError {
    /// The artifact to install does not exist.
    #[error("artifact not found: {0}")]
    ArtifactMissing(String),
    /// The installer could not be started.
    #[error("failed to launch installer: {0}")]
    LaunchFailed(String),
    /// The installer ran and reported failure.
    #[error("installer rejected the artifact: {0}")]
    Rejected(String),
    /// File system error while placing the artifact.
    #[error("I/O error during install: {0}")]
    Io(String),
}

/// Installs an artifact over the current installation.
#[async_trait]
pub trait PackageInstaller: Send + Sync {
    /// Short name used in logs.
    fn name(&self) -> &str;

    /// Install the artifact at `artifact`.
    ///
    /// The future may be dropped mid-flight when the caller's wait expires;
    /// implementations must release any child process on drop.
    async fn install(&self, artifact: &Path) -> Result<(), InstallerError>;
}
