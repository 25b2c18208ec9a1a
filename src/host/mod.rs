//! Host REST API: branch and pull request probes and creation.
//!
//! The coordinator talks to the host through [`HostApi`]; [`HttpHost`] is the
//! production implementation.

mod client;
mod probe;
mod types;

pub use client::HttpHost;
pub use types::{CreateBranchPayload, PullRequestPayload, RepoRef};

use crate::error::Result;

/// Operations the release flow needs from the host.
pub trait HostApi: Send + Sync {
    /// Whether `branch` exists in `repo`.
    fn branch_exists(&self, repo: &RepoRef, branch: &str) -> Result<bool>;

    /// Whether a pull request from `branch` exists in `repo`.
    fn pull_request_exists(&self, repo: &RepoRef, branch: &str) -> Result<bool>;

    fn create_branch(&self, repo: &RepoRef, payload: &CreateBranchPayload) -> Result<()>;

    fn open_pull_request(&self, repo: &RepoRef, payload: &PullRequestPayload) -> Result<()>;
}
