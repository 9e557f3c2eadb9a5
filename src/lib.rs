//! autopatch - a self-update agent with backup, delayed health check and rollback
//!
//! This library exposes modules for use in integration tests.

pub mod adapters;
pub mod cli;
pub mod config;
pub mod traits;
pub mod update;
