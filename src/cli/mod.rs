//! CLI module for autopatch.
//!
//! This module provides command-line interface functionality including:
//! - Argument parsing
//! - Version display
//! - One-shot update, health-check and recovery commands
//! - Daemon mode
//!
//! # Usage
//!
//! ```ignore
//! use autopatch::cli::{parse_args, run_cli_command};
//!
//! let command = parse_args(std::env::args());
//! let code = run_cli_command(command)?;
//! std::process::exit(code);
//! ```

pub mod args;
pub mod daemon;
pub mod status;
pub mod update;
pub mod version;

pub use args::{parse_args, CliCommand, USAGE};
pub use daemon::run_daemon;
pub use status::handle_status_command;
pub use update::{
    build_orchestrator, handle_acknowledge_command, handle_check_command,
    handle_health_check_command, handle_recover_command, outcome_exit_code,
};
pub use version::{handle_version_command, VERSION};

use std::sync::Arc;

use color_eyre::Result;

use crate::adapters::DeferredScheduler;
use crate::config::AgentConfig;

/// Run a CLI command and return the process exit code.
///
/// # Errors
///
/// Returns an error if the configuration cannot be loaded or the tokio
/// runtime cannot be created. Update failures are reported through the
/// exit code instead.
pub fn run_cli_command(command: CliCommand) -> Result<i32> {
    match &command {
        CliCommand::Version => {
            handle_version_command();
            return Ok(update::EXIT_OK);
        }
        CliCommand::Help => {
            println!("{}", USAGE);
            return Ok(update::EXIT_OK);
        }
        CliCommand::Invalid(arg) => {
            eprintln!("Unknown argument: {}\n\n{}", arg, USAGE);
            return Ok(update::EXIT_FAILURE);
        }
        _ => {}
    }

    let config = AgentConfig::load()?;
    let runtime = tokio::runtime::Runtime::new()?;

    runtime.block_on(async {
        if command == CliCommand::Daemon {
            return run_daemon(&config).await;
        }

        let orchestrator = build_orchestrator(&config, Arc::new(DeferredScheduler::new()));
        let code = match command {
            CliCommand::Check => handle_check_command(&orchestrator).await,
            CliCommand::HealthCheck { force } => {
                handle_health_check_command(&orchestrator, force).await
            }
            CliCommand::Recover => handle_recover_command(&orchestrator).await,
            CliCommand::Status => handle_status_command(&orchestrator),
            CliCommand::Acknowledge => handle_acknowledge_command(&orchestrator).await?,
            _ => update::EXIT_OK,
        };
        Ok(code)
    })
}
