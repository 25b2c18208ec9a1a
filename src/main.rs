//! promote: release promotion across staging and production GitOps trees.
//!
//! This is the main entry point for the `promote` CLI. It parses arguments,
//! installs logging, dispatches to the command runner, and maps errors to
//! exit codes.

mod cli;
mod commands;
pub mod config;
pub mod coordinator;
pub mod credentials;
pub mod descriptor;
pub mod error;
pub mod events;
pub mod exit_codes;
pub mod fs;
pub mod git;
pub mod host;
pub mod layout;
pub mod manifests;
pub mod propagate;
pub mod request;
pub mod session;

#[cfg(test)]
mod test_support;

use cli::Cli;
use std::process::ExitCode;
use tracing_subscriber::prelude::*;

fn main() -> ExitCode {
    let cli = Cli::parse_args();
    init_tracing(cli.verbose);

    match commands::dispatch(cli) {
        Ok(()) => ExitCode::from(exit_codes::SUCCESS as u8),
        Err(err) => {
            eprintln!("Error: {}", err);
            ExitCode::from(err.exit_code() as u8)
        }
    }
}

/// Logs go to stderr so stdout carries only the run summary.
fn init_tracing(verbosity: u8) {
    let filter = match verbosity {
        0 => "promote=info",
        1 => "promote=debug",
        _ => "promote=trace",
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| filter.into()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr),
        )
        .init();
}
