//! Release fetcher.
//!
//! Queries the release endpoint (GitHub's "latest release" API shape by
//! default), turns the JSON payload into a [`ReleaseDescriptor`] and decides
//! whether it is newer than the installed version.
//!
//! # Error Handling
//!
//! Every failure is converted into a [`FetchError`] at this boundary:
//! - Network failures (connection refused, DNS issues)
//! - The request exceeding its deadline
//! - Server errors and rate limiting
//! - Malformed JSON and missing required fields

use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

use super::logger::{log_update_debug, UpdateLogger};
use super::version::{is_newer, strip_version_prefix};
use crate::traits::{Headers, HttpClient, HttpError};

/// Default release endpoint.
pub const DEFAULT_RELEASE_URL: &str =
    "https://api.github.com/repos/autopatch-dev/autopatch/releases/latest";

/// Version of this build (from Cargo.toml).
pub const CURRENT_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Default timeout for release checks.
pub const CHECK_TIMEOUT_SECS: u64 = 30;

const USER_AGENT: &str = concat!("autopatch/", env!("CARGO_PKG_VERSION"));
const ACCEPT: &str = "application/vnd.github+json";

/// Errors raised while querying the release endpoint.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("request to {url} failed: {source}")]
    Http {
        url: String,
        #[source]
        source: HttpError,
    },

    #[error("request to {url} timed out after {secs}s")]
    Timeout { url: String, secs: u64 },

    #[error("server error ({status}): {message}")]
    ServerError { status: u16, message: String },

    #[error("release server rate limit exceeded")]
    RateLimited,

    #[error("invalid release response: {0}")]
    InvalidResponse(String),

    #[error("release response is missing `{0}`")]
    MissingField(&'static str),

    #[error("invalid published_at timestamp: {0}")]
    InvalidTimestamp(String),
}

/// Wire shape of the release endpoint response.
#[derive(Debug, Deserialize)]
struct ReleaseResponse {
    tag_name: Option<String>,
    #[serde(default)]
    assets: Vec<ReleaseAsset>,
    body: Option<String>,
    published_at: Option<String>,
    /// Non-GitHub endpoints may publish the digest at the top level.
    #[serde(default)]
    sha256: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ReleaseAsset {
    browser_download_url: Option<String>,
    /// `"sha256:<hex>"`
    #[serde(default)]
    digest: Option<String>,
}

/// A published release. Immutable once parsed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReleaseDescriptor {
    /// Version with any `v` prefix removed
    pub version: String,
    pub download_url: String,
    /// Release notes
    pub notes: String,
    pub published_at: DateTime<Utc>,
    /// Lowercase hex SHA-256, when the endpoint publishes one
    pub expected_digest: Option<String>,
}

/// Result of comparing the latest release against the installed version.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchOutcome {
    UpdateAvailable(ReleaseDescriptor),
    NoUpdateAvailable { latest_version: String },
}

impl FetchOutcome {
    pub fn is_update_available(&self) -> bool {
        matches!(self, FetchOutcome::UpdateAvailable(_))
    }
}

impl ReleaseResponse {
    fn into_descriptor(self) -> Result<ReleaseDescriptor, FetchError> {
        let tag = self.tag_name.ok_or(FetchError::MissingField("tag_name"))?;
        let asset = self
            .assets
            .into_iter()
            .next()
            .ok_or(FetchError::MissingField("assets[0]"))?;
        let download_url = asset
            .browser_download_url
            .ok_or(FetchError::MissingField("assets[0].browser_download_url"))?;
        let notes = self.body.ok_or(FetchError::MissingField("body"))?;
        let published_at = self
            .published_at
            .ok_or(FetchError::MissingField("published_at"))?;
        let published_at = DateTime::parse_from_rfc3339(&published_at)
            .map_err(|e| FetchError::InvalidTimestamp(format!("{}: {}", published_at, e)))?
            .with_timezone(&Utc);

        let expected_digest = asset
            .digest
            .as_deref()
            .and_then(parse_asset_digest)
            .or_else(|| self.sha256.as_deref().and_then(normalize_hex));

        Ok(ReleaseDescriptor {
            version: strip_version_prefix(&tag).to_string(),
            download_url,
            notes,
            published_at,
            expected_digest,
        })
    }
}

/// Extract the hex part of a `"sha256:<hex>"` asset digest. Other algorithms
/// are ignored.
fn parse_asset_digest(digest: &str) -> Option<String> {
    let (algorithm, hex) = digest.split_once(':')?;
    if !algorithm.eq_ignore_ascii_case("sha256") {
        return None;
    }
    normalize_hex(hex)
}

fn normalize_hex(hex: &str) -> Option<String> {
    let hex = hex.trim();
    if hex.is_empty() {
        None
    } else {
        Some(hex.to_ascii_lowercase())
    }
}

/// Parse a release endpoint payload.
pub fn parse_release(body: &[u8]) -> Result<ReleaseDescriptor, FetchError> {
    let response: ReleaseResponse = serde_json::from_slice(body)
        .map_err(|e| FetchError::InvalidResponse(format!("failed to parse release JSON: {}", e)))?;
    response.into_descriptor()
}

/// Queries the release endpoint.
#[derive(Clone)]
pub struct ReleaseFetcher {
    http: Arc<dyn HttpClient>,
    url: String,
    timeout: Duration,
}

impl std::fmt::Debug for ReleaseFetcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReleaseFetcher")
            .field("url", &self.url)
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

impl ReleaseFetcher {
    pub fn new(http: Arc<dyn HttpClient>, url: impl Into<String>) -> Self {
        Self {
            http,
            url: url.into(),
            timeout: Duration::from_secs(CHECK_TIMEOUT_SECS),
        }
    }

    /// Bound the whole request by `timeout`.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Fetch and parse the latest release without comparing versions.
    pub async fn fetch_release(&self) -> Result<ReleaseDescriptor, FetchError> {
        let mut headers = Headers::new();
        headers.insert("User-Agent".to_string(), USER_AGENT.to_string());
        headers.insert("Accept".to_string(), ACCEPT.to_string());

        log_update_debug(&format!("Querying release endpoint: {}", self.url));

        let response = tokio::time::timeout(self.timeout, self.http.get(&self.url, &headers))
            .await
            .map_err(|_| FetchError::Timeout {
                url: self.url.clone(),
                secs: self.timeout.as_secs(),
            })?
            .map_err(|source| match source {
                HttpError::Timeout(_) => FetchError::Timeout {
                    url: self.url.clone(),
                    secs: self.timeout.as_secs(),
                },
                source => FetchError::Http {
                    url: self.url.clone(),
                    source,
                },
            })?;

        if response.status == 429 {
            return Err(FetchError::RateLimited);
        }
        if !response.is_success() {
            return Err(FetchError::ServerError {
                status: response.status,
                message: response
                    .text()
                    .unwrap_or_else(|_| "Unknown error".to_string()),
            });
        }

        parse_release(&response.body)
    }

    /// Fetch the latest release and compare it against `installed`.
    pub async fn fetch_latest(&self, installed: &str) -> Result<FetchOutcome, FetchError> {
        let mut logger = UpdateLogger::new();
        logger.log_check_started(installed);

        let release = match self.fetch_release().await {
            Ok(release) => release,
            Err(e) => {
                logger.log_check_failed(&e);
                return Err(e);
            }
        };

        let update_available = is_newer(&release.version, installed);
        logger.log_check_completed(installed, &release.version, update_available);

        if update_available {
            Ok(FetchOutcome::UpdateAvailable(release))
        } else {
            Ok(FetchOutcome::NoUpdateAvailable {
                latest_version: release.version,
            })
        }
    }
}
