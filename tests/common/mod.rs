//! Common test utilities for integration tests.
//!
//! [`TestEnv`] runs a wiremock release server and owns a temporary
//! installation: an installed artifact plus a data directory. Every call to
//! [`TestEnv::orchestrator`] builds a fresh orchestrator over the same files,
//! which is how the tests simulate a process restart.
//!
//! # Example
//!
//! ```ignore
//! let env = TestEnv::start().await;
//! env.publish("2.0.0", NEW_PAYLOAD, Some(sha256_hex(NEW_PAYLOAD))).await;
//! let outcome = env.orchestrator().run_cycle().await;
//! ```

#![allow(dead_code)]

use std::path::PathBuf;
use std::sync::Arc;

use autopatch::adapters::mock::{MockHealthProbe, MockInstaller, MockNotifier, MockScheduler};
use autopatch::adapters::ReqwestHttpClient;
use autopatch::config::AgentConfig;
use autopatch::update::{Collaborators, UpdateOrchestrator, UpdateState, UpdateStateManager};
use sha2::{Digest, Sha256};
use tempfile::TempDir;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

pub const OLD_PAYLOAD: &[u8] = b"#!/bin/sh\necho app 1.0.0\n";
pub const NEW_PAYLOAD: &[u8] = b"#!/bin/sh\necho app 2.0.0\n";

pub const RELEASE_PATH: &str = "/repos/acme/app/releases/latest";

pub fn sha256_hex(bytes: &[u8]) -> String {
    hex::encode(Sha256::digest(bytes))
}

/// Release endpoint payload in the GitHub "latest release" shape.
pub fn release_json(version: &str, download_url: &str, digest: Option<String>) -> serde_json::Value {
    serde_json::json!({
        "tag_name": format!("v{}", version),
        "name": format!("App {}", version),
        "body": "Bug fixes and improvements",
        "published_at": "2026-09-01T12:00:00Z",
        "assets": [{
            "name": "app",
            "browser_download_url": download_url,
            "digest": digest.map(|d| format!("sha256:{}", d)),
        }],
    })
}

pub struct TestEnv {
    pub server: MockServer,
    pub temp: TempDir,
    pub config: AgentConfig,
    pub installer: MockInstaller,
    pub notifier: MockNotifier,
    pub scheduler: MockScheduler,
    pub probe: MockHealthProbe,
}

impl TestEnv {
    pub async fn start() -> Self {
        Self::start_with(|config| config).await
    }

    /// Start with extra config adjustments.
    pub async fn start_with<F>(adjust: F) -> Self
    where
        F: FnOnce(AgentConfig) -> AgentConfig,
    {
        let server = MockServer::start().await;
        let temp = TempDir::new().unwrap();
        let artifact_path = temp.path().join("bin").join("app");
        std::fs::create_dir_all(artifact_path.parent().unwrap()).unwrap();
        std::fs::write(&artifact_path, OLD_PAYLOAD).unwrap();

        let config = adjust(
            AgentConfig::default()
                .with_release_url(format!("{}{}", server.uri(), RELEASE_PATH))
                .with_installed_version("1.0.0")
                .with_artifact_path(&artifact_path)
                .with_data_dir(temp.path().join("data")),
        );

        Self {
            server,
            temp,
            installer: MockInstaller::new().with_target(&config.artifact_path),
            config,
            notifier: MockNotifier::new(),
            scheduler: MockScheduler::new(),
            probe: MockHealthProbe::healthy("app"),
        }
    }

    /// A fresh orchestrator over this environment's files.
    pub fn orchestrator(&self) -> UpdateOrchestrator {
        UpdateOrchestrator::new(
            &self.config,
            Collaborators {
                http: Arc::new(ReqwestHttpClient::new()),
                installer: Arc::new(self.installer.clone()),
                notifier: Arc::new(self.notifier.clone()),
                scheduler: Arc::new(self.scheduler.clone()),
                probes: vec![Arc::new(self.probe.clone())],
            },
        )
    }

    pub fn download_url(&self, version: &str) -> String {
        format!("{}/download/app-{}", self.server.uri(), version)
    }

    /// Serve `version` with `payload` as its artifact. Replaces earlier mocks.
    pub async fn publish(&self, version: &str, payload: &[u8], digest: Option<String>) {
        self.server.reset().await;

        Mock::given(method("GET"))
            .and(path(RELEASE_PATH))
            .respond_with(ResponseTemplate::new(200).set_body_json(release_json(
                version,
                &self.download_url(version),
                digest,
            )))
            .mount(&self.server)
            .await;

        Mock::given(method("GET"))
            .and(path(format!("/download/app-{}", version)))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(payload.to_vec()))
            .mount(&self.server)
            .await;
    }

    /// Publish `version` with the new payload and its correct digest.
    pub async fn publish_valid(&self, version: &str) {
        self.publish(version, NEW_PAYLOAD, Some(sha256_hex(NEW_PAYLOAD)))
            .await;
    }

    pub fn installed(&self) -> Vec<u8> {
        std::fs::read(&self.config.artifact_path).unwrap()
    }

    pub fn backup_exists(&self) -> bool {
        self.config.backup_path().exists()
    }

    pub fn cached_artifact_exists(&self) -> bool {
        self.config.cache_path().exists()
    }

    pub fn state(&self) -> UpdateState {
        UpdateStateManager::new(self.config.state_path()).load()
    }

    pub fn save_state(&self, state: &UpdateState) {
        UpdateStateManager::new(self.config.state_path())
            .save(state)
            .unwrap();
    }

    pub fn audit_path(&self) -> PathBuf {
        self.config.audit_path()
    }
}
