//! Command implementations for promote.
//!
//! Each command becomes a [`ReleaseRequest`]; the shared runner loads the
//! configuration, resolves host access from the environment, and hands the
//! request to the coordinator.

use crate::cli::{Cli, Command, ProdArgs, ReleaseArgs, StagingArgs};
use crate::config::Config;
use crate::coordinator::Coordinator;
use crate::credentials::ResolvedAccess;
use crate::error::{PromoteError, Result};
use crate::events::Journal;
use crate::host::HttpHost;
use crate::request::ReleaseRequest;
use std::path::PathBuf;

/// Dispatch the parsed command line.
pub fn dispatch(cli: Cli) -> Result<()> {
    let Cli {
        config,
        journal,
        command,
        ..
    } = cli;

    let request = match command {
        Command::Staging(args) => staging_request(args),
        Command::Prod(args) => production_request(args),
    };

    run(config, journal, &request)
}

fn staging_request(args: StagingArgs) -> ReleaseRequest {
    release_request(args.repo_slug, None, args.release)
}

fn production_request(args: ProdArgs) -> ReleaseRequest {
    release_request(args.staging_repo_slug, Some(args.prod_repo_slug), args.release)
}

fn release_request(
    staging_repo: String,
    production_repo: Option<String>,
    release: ReleaseArgs,
) -> ReleaseRequest {
    ReleaseRequest {
        staging_repo,
        production_repo,
        project: release.project,
        branch: release.source_branch,
        product: release.product,
        services: release
            .services
            .into_iter()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect(),
    }
}

fn run(
    config_path: Option<PathBuf>,
    journal_path: Option<PathBuf>,
    request: &ReleaseRequest,
) -> Result<()> {
    let cwd = std::env::current_dir()
        .map_err(|e| PromoteError::Io(format!("failed to read current directory: {}", e)))?;
    let config = Config::discover(config_path.as_deref(), &cwd)?;

    // Fail on bad input before reading credentials.
    request.validate()?;
    let access = ResolvedAccess::from_env(&config)?;
    let host = HttpHost::new(&access, &config);

    let journal = match journal_path.or_else(|| config.journal_path.clone()) {
        Some(path) => Journal::with_file(path),
        None => Journal::new(),
    };
    if let Some(path) = journal.path() {
        tracing::info!(path = %path.display(), "recording run journal");
    }

    let summary = Coordinator::new(&config, &host, &access, journal).run(request)?;
    println!("{}", summary);
    Ok(())
}
