//! Installer that hands the artifact to an external command.

use async_trait::async_trait;
use std::path::Path;
use std::process::Stdio;

use crate::traits::{InstallerError, PackageInstaller};

/// Runs `program args... <artifact>` and treats exit status 0 as installed.
///
/// The child is killed if the install future is dropped, which is what
/// happens when the caller's wait expires.
#[derive(Debug, Clone)]
pub struct CommandInstaller {
    program: String,
    args: Vec<String>,
}

impl CommandInstaller {
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
        }
    }

    /// Split a whitespace-separated command line. Returns `None` when empty.
    pub fn from_command_line(command: &str) -> Option<Self> {
        let mut parts = command.split_whitespace().map(String::from);
        let program = parts.next()?;
        Some(Self::new(program, parts.collect()))
    }

    pub fn program(&self) -> &str {
        &self.program
    }
}

#[async_trait]
impl PackageInstaller for CommandInstaller {
    fn name(&self) -> &str {
        &self.program
    }

    async fn install(&self, artifact: &Path) -> Result<(), InstallerError> {
        if !artifact.is_file() {
            return Err(InstallerError::ArtifactMissing(
                artifact.display().to_string(),
            ));
        }

        tracing::debug!(
            target: "autopatch::update",
            "Running installer: {} {:?} {}",
            self.program,
            self.args,
            artifact.display()
        );

        let output = tokio::process::Command::new(&self.program)
            .args(&self.args)
            .arg(artifact)
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| InstallerError::LaunchFailed(format!("{}: {}", self.program, e)))?;

        if output.status.success() {
            return Ok(());
        }

        let stderr = String::from_utf8_lossy(&output.stderr);
        let stderr = stderr.trim();
        Err(InstallerError::Rejected(if stderr.is_empty() {
            output.status.to_string()
        } else {
            format!("{}: {}", output.status, stderr)
        }))
    }
}
