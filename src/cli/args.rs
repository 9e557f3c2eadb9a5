//! Command-line argument parsing for the autopatch CLI.
//!
//! This module handles parsing command-line arguments and determining
//! which CLI command to execute.

/// Parsed CLI command to execute.
#[derive(Debug, Clone, PartialEq)]
pub enum CliCommand {
    /// Run one update cycle (default)
    Check,
    /// Run the pending post-install health check
    HealthCheck { force: bool },
    /// Settle state left behind by an interrupted run
    Recover,
    /// Print the persisted update state
    Status,
    /// Clear a rollback failure after manual repair
    Acknowledge,
    /// Keep running and serve scheduled jobs
    Daemon,
    /// Show version information
    Version,
    /// Show usage
    Help,
    /// Unrecognized argument
    Invalid(String),
}

/// Usage text printed by `help` and after an invalid argument.
pub const USAGE: &str = "\
Usage: autopatch [COMMAND]

Commands:
  check                 Check for an update and install it (default)
  health-check [--force]
                        Run the pending post-install health check once it
                        is due; --force is an operator override that runs
                        it before the configured delay
  recover               Settle an update interrupted by a crash or restart
  status                Show the current update state
  acknowledge           Resume updates after a failed rollback was repaired
  daemon                Run in the foreground and schedule checks
  help                  Show this message

Options:
  -V, --version         Print version";

/// Parse command-line arguments and return the appropriate command.
///
/// # Arguments
///
/// * `args` - Iterator of command-line arguments (typically `std::env::args()`)
///
/// # Examples
///
/// ```
/// use autopatch::cli::args::{parse_args, CliCommand};
///
/// let args = vec!["autopatch".to_string(), "--version".to_string()];
/// assert_eq!(parse_args(args.into_iter()), CliCommand::Version);
/// ```
pub fn parse_args<I>(args: I) -> CliCommand
where
    I: Iterator<Item = String>,
{
    // Skip the program name
    let mut args = args.skip(1);
    let Some(first) = args.next() else {
        return CliCommand::Check;
    };

    match first.as_str() {
        "--version" | "-V" => CliCommand::Version,
        "--help" | "-h" | "help" => CliCommand::Help,
        "check" => CliCommand::Check,
        "health-check" => match args.next().as_deref() {
            None => CliCommand::HealthCheck { force: false },
            Some("--force") => CliCommand::HealthCheck { force: true },
            Some(other) => CliCommand::Invalid(other.to_string()),
        },
        "recover" => CliCommand::Recover,
        "status" => CliCommand::Status,
        "acknowledge" => CliCommand::Acknowledge,
        "daemon" => CliCommand::Daemon,
        other => CliCommand::Invalid(other.to_string()),
    }
}
