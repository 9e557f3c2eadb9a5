//! Trait abstractions for the update agent's external collaborators.
//!
//! Every collaborator the update core talks to sits behind a trait so it can
//! be swapped for a mock in tests.
//!
//! # Traits
//!
//! - [`HttpClient`] - release endpoint queries and artifact streaming
//! - [`PackageInstaller`] - the OS-level installer
//! - [`Notifier`] - human-readable status channel
//! - [`HealthProbe`] - one post-install liveness check
//! - [`JobScheduler`] - periodic and delayed job registration

pub mod health;
pub mod http;
pub mod installer;
pub mod notifier;
pub mod scheduler;

pub use health::HealthProbe;
pub use http::{ByteStream, Headers, HttpClient, HttpError, Response, StreamingResponse};
pub use installer::{InstallerError, PackageInstaller};
pub use notifier::{Notification, NotificationPriority, Notifier};
pub use scheduler::{
    DelayedJobSpec, ExponentialBackoff, JobConstraints, JobResult, JobScheduler,
    PeriodicJobSpec, SchedulerError, HEALTH_CHECK_JOB_KEY, UPDATE_JOB_KEY,
};
