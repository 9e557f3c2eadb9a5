//! Post-install health verification.
//!
//! The health check runs a battery of [`HealthProbe`]s once the delayed
//! health-check job fires. Every probe must pass; a probe that does not
//! answer within its timeout counts as failed. An empty battery passes.

use async_trait::async_trait;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use crate::traits::HealthProbe;

/// Default per-probe timeout.
pub const PROBE_TIMEOUT_SECS: u64 = 30;

/// Result of one run of the battery.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HealthReport {
    /// Probes that passed
    pub passed_probes: Vec<String>,
    /// `name: reason` for every probe that failed
    pub failed: Vec<String>,
}

impl HealthReport {
    pub fn passed(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Runs the configured probes.
#[derive(Clone)]
pub struct HealthVerifier {
    probes: Vec<Arc<dyn HealthProbe>>,
    probe_timeout: Duration,
}

impl std::fmt::Debug for HealthVerifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let names: Vec<&str> = self.probes.iter().map(|p| p.name()).collect();
        f.debug_struct("HealthVerifier")
            .field("probes", &names)
            .field("probe_timeout", &self.probe_timeout)
            .finish()
    }
}

impl Default for HealthVerifier {
    fn default() -> Self {
        Self::new()
    }
}

impl HealthVerifier {
    /// A verifier with no probes.
    pub fn new() -> Self {
        Self {
            probes: Vec::new(),
            probe_timeout: Duration::from_secs(PROBE_TIMEOUT_SECS),
        }
    }

    pub fn with_probe(mut self, probe: Arc<dyn HealthProbe>) -> Self {
        self.probes.push(probe);
        self
    }

    pub fn with_probe_timeout(mut self, timeout: Duration) -> Self {
        self.probe_timeout = timeout;
        self
    }

    pub fn probe_count(&self) -> usize {
        self.probes.len()
    }

    /// Run every probe in order.
    pub async fn check_health(&self) -> HealthReport {
        let mut report = HealthReport::default();

        for probe in &self.probes {
            let outcome = match tokio::time::timeout(self.probe_timeout, probe.check()).await {
                Ok(result) => result,
                Err(_) => Err(format!(
                    "no answer within {}s",
                    self.probe_timeout.as_secs()
                )),
            };

            match outcome {
                Ok(()) => {
                    tracing::debug!(target: "autopatch::update", probe = probe.name(), "Probe passed");
                    report.passed_probes.push(probe.name().to_string());
                }
                Err(reason) => {
                    tracing::warn!(
                        target: "autopatch::update",
                        probe = probe.name(),
                        "Probe failed: {}",
                        reason
                    );
                    report.failed.push(format!("{}: {}", probe.name(), reason));
                }
            }
        }

        report
    }
}

/// Passes when the installed artifact exists and is non-empty.
#[derive(Debug, Clone)]
pub struct ArtifactPresentProbe {
    path: PathBuf,
}

impl ArtifactPresentProbe {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl HealthProbe for ArtifactPresentProbe {
    fn name(&self) -> &str {
        "artifact-present"
    }

    async fn check(&self) -> Result<(), String> {
        match tokio::fs::metadata(&self.path).await {
            Ok(metadata) if metadata.is_file() && metadata.len() > 0 => Ok(()),
            Ok(metadata) if metadata.is_file() => Err(format!("{} is empty", self.path.display())),
            Ok(_) => Err(format!("{} is not a file", self.path.display())),
            Err(e) => Err(format!("{}: {}", self.path.display(), e)),
        }
    }
}

/// Runs a command and passes when it exits with status 0.
#[derive(Debug, Clone)]
pub struct CommandProbe {
    program: String,
    args: Vec<String>,
}

impl CommandProbe {
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
}

#[async_trait]
impl HealthProbe for CommandProbe {
    fn name(&self) -> &str {
        &self.program
    }

    async fn check(&self) -> Result<(), String> {
        let output = tokio::process::Command::new(&self.program)
            .args(&self.args)
            .stdin(std::process::Stdio::null())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| format!("failed to run: {}", e))?;

        if output.status.success() {
            Ok(())
        } else {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let stderr = stderr.trim();
            if stderr.is_empty() {
                Err(format!("exited with {}", output.status))
            } else {
                Err(format!("exited with {}: {}", output.status, stderr))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::mock::MockHealthProbe;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_empty_battery_passes() {
        let report = HealthVerifier::new().check_health().await;
        assert!(report.passed());
        assert!(report.passed_probes.is_empty());
    }

    #[tokio::test]
    async fn test_all_probes_must_pass() {
        let verifier = HealthVerifier::new()
            .with_probe(Arc::new(MockHealthProbe::healthy("db")))
            .with_probe(Arc::new(MockHealthProbe::unhealthy("api", "503")));

        let report = verifier.check_health().await;
        assert!(!report.passed());
        assert_eq!(report.passed_probes, vec!["db".to_string()]);
        assert_eq!(report.failed, vec!["api: 503".to_string()]);
    }

    #[tokio::test]
    async fn test_slow_probe_fails() {
        let verifier = HealthVerifier::new()
            .with_probe(Arc::new(
                MockHealthProbe::healthy("slow").with_delay(Duration::from_secs(30)),
            ))
            .with_probe_timeout(Duration::from_millis(50));

        let report = verifier.check_health().await;
        assert!(!report.passed());
        assert!(report.failed[0].starts_with("slow: no answer"));
    }

    #[tokio::test]
    async fn test_artifact_present_probe() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("app");

        let probe = ArtifactPresentProbe::new(&path);
        assert!(probe.check().await.is_err());

        std::fs::write(&path, b"").unwrap();
        assert!(probe.check().await.unwrap_err().contains("empty"));

        std::fs::write(&path, b"binary").unwrap();
        assert!(probe.check().await.is_ok());
    }

    #[test]
    fn test_command_probe_from_command_line() {
        let probe = CommandProbe::from_command_line("/opt/app/bin/app --version").unwrap();
        assert_eq!(probe.name(), "/opt/app/bin/app");
        assert_eq!(probe.args, vec!["--version".to_string()]);
        assert!(CommandProbe::from_command_line("   ").is_none());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_command_probe_exit_status() {
        assert!(CommandProbe::new("true", vec![]).check().await.is_ok());
        assert!(CommandProbe::new("false", vec![]).check().await.is_err());
        assert!(CommandProbe::new("/nonexistent/autopatch-probe", vec![])
            .check()
            .await
            .unwrap_err()
            .contains("failed to run"));
    }
}
