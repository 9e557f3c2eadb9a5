//! Concrete implementations of trait abstractions.
//!
//! This module provides the production adapters behind the traits defined in
//! `crate::traits`.
//!
//! # Adapters
//!
//! - [`ReqwestHttpClient`] - HTTP client using reqwest
//! - [`ReplaceInstaller`] - Atomically replaces the installed file
//! - [`CommandInstaller`] - Delegates to an external installer command
//! - [`OsNotifier`] - Log output plus native OS banners
//! - [`TokioScheduler`] - In-process timers for the daemon
//! - [`DeferredScheduler`] - For one-shot runs driven by an external timer
//!
//! # Mock Implementations
//!
//! The [`mock`] submodule provides test doubles for every trait.

pub mod command_installer;
pub mod mock;
pub mod os_notifier;
pub mod replace_installer;
pub mod reqwest_http;
pub mod tokio_scheduler;

pub use command_installer::CommandInstaller;
pub use os_notifier::OsNotifier;
pub use replace_installer::ReplaceInstaller;
pub use reqwest_http::ReqwestHttpClient;
pub use tokio_scheduler::{DeferredScheduler, ScheduledJob, TokioScheduler};
