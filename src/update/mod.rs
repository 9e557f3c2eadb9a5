//! Self-update pipeline.
//!
//! This module provides everything one update cycle needs:
//! - Checking the release endpoint and comparing versions
//! - Streaming the release artifact to a cache file
//! - Verifying the artifact's SHA-256 digest
//! - Backing up the installed artifact before installing
//! - Installing through the external installer with a bounded wait
//! - A delayed post-install health check that commits or rolls back
//! - Durable cycle state, an audit file and structured logging
//!
//! # Example
//!
//! ```ignore
//! use autopatch::update::{Collaborators, UpdateOrchestrator, UpdateOutcome};
//!
//! let orchestrator = UpdateOrchestrator::new(&config, collaborators);
//! match orchestrator.run_cycle().await {
//!     UpdateOutcome::InstalledPendingHealthCheck(backup) => {
//!         println!("Installed; backup kept at {}", backup.path.display());
//!     }
//!     outcome => println!("{}", outcome),
//! }
//! ```
//!
//! # Error Handling
//!
//! Each stage reports its own error type. They are folded into
//! [`UpdateError`], which can be:
//! - Classified by category (fetch, download, integrity, rollback, etc.)
//! - Checked for retryability
//! - Converted to user-friendly messages
//!
//! The orchestrator itself never fails: every cycle ends in an
//! [`UpdateOutcome`].

pub mod audit;
pub mod backup;
pub mod cancel;
pub mod checker;
pub mod downloader;
pub mod errors;
pub mod health;
pub mod installer;
pub mod logger;
pub mod orchestrator;
pub mod state;
pub mod verifier;
pub mod version;

pub use audit::{AuditLog, AUDIT_LOG_FILE};
pub use backup::{Backup, BackupError, BackupManager};
pub use cancel::{copy_cancellable, CancelFlag, CancelOnDrop};
pub use checker::{
    parse_release, FetchError, FetchOutcome, ReleaseDescriptor, ReleaseFetcher, CURRENT_VERSION,
    DEFAULT_RELEASE_URL,
};
pub use downloader::{ArtifactDownloader, DownloadError, DownloadedArtifact};
pub use errors::{ErrorCode, UpdateError, UpdateErrorCategory};
pub use health::{ArtifactPresentProbe, CommandProbe, HealthReport, HealthVerifier};
pub use installer::{InstallError, InstallerAdapter};
pub use logger::{
    format_bytes, log_update_debug, log_update_error, log_update_info, log_update_warn,
    UpdateEvent, UpdateLogLevel, UpdateLogger,
};
pub use orchestrator::{
    Collaborators, RecoveryAction, UpdateOrchestrator, UpdateOutcome, BACKUP_FAILED,
    SIGNATURE_MISMATCH,
};
pub use state::{CyclePhase, StateError, UpdateState, UpdateStateManager};
pub use verifier::{sha256_file, IntegrityError, IntegrityVerifier};
pub use version::{compare_versions, is_newer, strip_version_prefix};
