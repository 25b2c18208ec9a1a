//! CLI argument parsing for promote.
//!
//! Uses clap derive macros for declarative argument definitions.
//! This module defines the command structure; actual implementations
//! are in the `commands` module.

use clap::{ArgAction, Args, Parser, Subcommand};
use std::path::PathBuf;

/// Promote a release across staging and production GitOps repositories.
///
/// Creates the release branch when needed, points each service's
/// application descriptor at the newest build, mirrors manifests between
/// environment trees, pushes, and opens a pull request into trunk.
#[derive(Parser, Debug)]
#[command(name = "promote")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Configuration file (default: ./promote.yaml when present).
    #[arg(long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Append run events to this NDJSON file.
    #[arg(long, global = true, value_name = "FILE")]
    pub journal: Option<PathBuf>,

    /// Increase log verbosity (-v debug, -vv trace). `RUST_LOG` wins when set.
    #[arg(short, long, global = true, action = ArgAction::Count)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

/// Available commands for promote.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Promote trunk of the staging tree into its staging environment.
    Staging(StagingArgs),

    /// Promote the staging environment into the production tree.
    #[command(alias = "production")]
    Prod(ProdArgs),
}

/// Arguments shared by both modes.
#[derive(Args, Debug)]
pub struct ReleaseArgs {
    /// Host project key holding the repositories.
    #[arg(long)]
    pub project: String,

    /// Release branch to create or reuse.
    #[arg(long)]
    pub source_branch: String,

    /// Product directory at the top of the GitOps tree.
    #[arg(long)]
    pub product: String,

    /// Services to promote, in order.
    #[arg(long, value_delimiter = ',', required = true)]
    pub services: Vec<String>,
}

#[derive(Args, Debug)]
pub struct StagingArgs {
    /// Slug of the staging GitOps repository.
    #[arg(long)]
    pub repo_slug: String,

    #[command(flatten)]
    pub release: ReleaseArgs,
}

#[derive(Args, Debug)]
pub struct ProdArgs {
    /// Slug of the staging GitOps repository (read only).
    #[arg(long)]
    pub staging_repo_slug: String,

    /// Slug of the production GitOps repository.
    #[arg(long)]
    pub prod_repo_slug: String,

    #[command(flatten)]
    pub release: ReleaseArgs,
}

impl Cli {
    /// Parse command-line arguments.
    pub fn parse_args() -> Self {
        Cli::parse()
    }
}
