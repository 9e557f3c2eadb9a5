//! Mock implementations for testing.
//!
//! This module provides mock implementations of all trait abstractions,
//! enabling unit testing without network dependencies, real installers or
//! a running scheduler.
//!
//! # Available Mocks
//!
//! - [`MockHttpClient`] - HTTP client with configurable responses
//! - [`MockInstaller`] - Installer with queued results
//! - [`MockNotifier`] - Records notifications
//! - [`MockHealthProbe`] - Probe with a switchable verdict
//! - [`MockScheduler`] - Records job registrations

pub mod health;
pub mod http;
pub mod installer;
pub mod notifier;
pub mod scheduler;

pub use health::MockHealthProbe;
pub use http::{MockHttpClient, MockResponse, RecordedRequest};
pub use installer::MockInstaller;
pub use notifier::MockNotifier;
pub use scheduler::MockScheduler;
