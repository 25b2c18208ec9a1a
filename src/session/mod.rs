//! Ephemeral repository sessions.
//!
//! A [`RepositorySession`] owns one shallow clone of one remote repository in
//! a temporary directory. The directory is removed when the session is closed
//! or dropped; nothing is reused across runs.
//!
//! Operations:
//!
//! - Cloning and fetching with depth escalation (transport failures map to
//!   `PromoteError::Transport`)
//! - Switching between branches present in the local reference set
//! - Status, cleanup of editor droppings, staging, committing, pushing
//!
//! Index-mutating calls are serialized internally so a background task can
//! stage files while the coordinating thread stages others.

mod fetch;
mod state;
mod status;


pub use fetch::escalate_depth;
pub use state::SessionState;
pub use status::{StatusEntry, parse_porcelain_v2};

use crate::config::{Config, FetchPolicy};
use crate::credentials::Credentials;
use crate::error::{PromoteError, Result};
use crate::git::{GitOptions, run_git_with};
use globset::GlobSet;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;
use tempfile::TempDir;

/// Settings shared by every session of a run.
#[derive(Debug, Clone)]
pub struct SessionSettings {
    pub remote: String,
    pub fetch: FetchPolicy,
    pub timeout: Duration,
    pub author_name: String,
    pub author_email: String,
}

impl SessionSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            remote: config.remote.clone(),
            fetch: config.fetch.clone(),
            timeout: config.git_timeout(),
            author_name: config.author_name.clone(),
            author_email: config.author_email.clone(),
        }
    }
}

/// Whether a session may stage, commit, and push.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    ReadWrite,
    /// Data source only; every index or remote mutation is refused.
    ReadOnly,
}

/// One ephemeral clone of one remote repository.
pub struct RepositorySession {
    label: String,
    dir: TempDir,
    root: PathBuf,
    settings: SessionSettings,
    git: GitOptions,
    access: Access,
    state: Mutex<SessionState>,
    index: Mutex<()>,
}

impl std::fmt::Debug for RepositorySession {
    // GitOptions carries the Authorization header and is left out.
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RepositorySession")
            .field("label", &self.label)
            .field("root", &self.root)
            .field("access", &self.access)
            .field("state", &self.state())
            .finish()
    }
}

impl RepositorySession {
    /// Shallow-clone `url` into a fresh temporary directory.
    ///
    /// The clone carries every branch at `settings.fetch.initial_depth`.
    /// Credentials are sent as an `Authorization` header through git's
    /// environment config and never written to disk.
    pub fn clone_remote(
        label: &str,
        url: &str,
        credentials: &Credentials,
        settings: &SessionSettings,
        access: Access,
    ) -> Result<Self> {
        let dir = tempfile::Builder::new()
            .prefix("promote-")
            .tempdir()
            .map_err(|e| PromoteError::Io(format!("failed to create clone directory: {}", e)))?;
        let root = dir.path().join("repo");

        let header = format!("Authorization: {}", credentials.authorization_header());
        let git = GitOptions::with_timeout(settings.timeout).config_entry("http.extraHeader", &header);

        tracing::info!(repo = label, depth = settings.fetch.initial_depth, "cloning");

        let depth = settings.fetch.initial_depth.to_string();
        run_git_with(
            dir.path(),
            &[
                "clone",
                "--quiet",
                "--no-single-branch",
                "--depth",
                &depth,
                "--origin",
                &settings.remote,
                url,
                "repo",
            ],
            &git,
        )
        .map_err(|e| PromoteError::Transport(format!("failed to clone {}: {}", label, e)))?;

        let session = Self {
            label: label.to_string(),
            dir,
            root,
            settings: settings.clone(),
            git,
            access,
            state: Mutex::new(SessionState::Cloned),
            index: Mutex::new(()),
        };

        session.git(&["config", "user.name", &settings.author_name])?;
        session.git(&["config", "user.email", &settings.author_email])?;

        Ok(session)
    }

    /// Fetch every reference, deepening the history on failure.
    ///
    /// Returns the depth that succeeded, or `FetchDepthExceeded`.
    pub fn fetch_all(&self) -> Result<u32> {
        let policy = &self.settings.fetch;
        tracing::info!(repo = %self.label, refspec = %policy.refspec, "fetching");

        let depth = escalate_depth(policy, |depth| self.fetch_at(depth))?;
        self.transition(SessionState::Fetched)?;
        Ok(depth)
    }

    fn fetch_at(&self, depth: u32) -> Result<()> {
        let depth = depth.to_string();
        self.git(&[
            "fetch",
            "--quiet",
            "--update-head-ok",
            "--depth",
            &depth,
            &self.settings.remote,
            &self.settings.fetch.refspec,
        ])
        .map(|_| ())
        .map_err(|e| PromoteError::Transport(format!("failed to fetch {}: {}", self.label, e)))
    }

    /// Check out `branch`, which must exist as `refs/heads/<branch>`.
    pub fn switch_branch(&self, branch: &str) -> Result<()> {
        if !self.has_local_branch(branch)? {
            return Err(PromoteError::Git(format!(
                "branch '{}' does not exist in {}.\n\n\
                 Create it on the host and fetch before switching to it.",
                branch, self.label
            )));
        }

        tracing::debug!(repo = %self.label, branch, "switching branch");
        self.git(&["checkout", "--quiet", branch])?;
        self.transition(SessionState::BranchSwitched)
    }

    /// Check if `refs/heads/<branch>` exists locally.
    pub fn has_local_branch(&self, branch: &str) -> Result<bool> {
        let reference = format!("refs/heads/{}", branch);
        Ok(self
            .git(&["rev-parse", "--verify", "--quiet", &reference])
            .is_ok())
    }

    /// Name of the checked-out branch.
    pub fn current_branch(&self) -> Result<String> {
        Ok(self.git(&["rev-parse", "--abbrev-ref", "HEAD"])?.stdout)
    }

    /// Changed, staged, and untracked paths.
    pub fn status(&self) -> Result<Vec<StatusEntry>> {
        let output = self.git(&["status", "--porcelain=v2", "--untracked-files=all"])?;
        Ok(parse_porcelain_v2(&output.stdout))
    }

    /// Remove status entries whose path matches `patterns`.
    ///
    /// Untracked files are deleted; tracked files are removed from the index
    /// and the worktree. Returns the removed paths.
    pub fn clean_worktree(&self, patterns: &GlobSet) -> Result<Vec<String>> {
        self.ensure_writable("clean the worktree")?;

        let mut removed = Vec::new();
        for entry in self.status()? {
            if !patterns.is_match(&entry.path) {
                continue;
            }

            if entry.is_untracked() {
                let path = self.path(&entry.path);
                std::fs::remove_file(&path).map_err(|e| {
                    PromoteError::Io(format!("failed to remove '{}': {}", path.display(), e))
                })?;
            } else {
                let _index = self.lock_index();
                self.git(&["rm", "-f", "--quiet", "--ignore-unmatch", "--", &entry.path])?;
            }

            tracing::debug!(repo = %self.label, path = %entry.path, "removed from worktree");
            removed.push(entry.path);
        }

        Ok(removed)
    }

    /// Stage additions and modifications of `paths`.
    pub fn stage(&self, paths: &[String]) -> Result<()> {
        self.ensure_writable("stage changes")?;
        if paths.is_empty() {
            return Ok(());
        }

        let mut args = vec!["add", "--all", "--"];
        args.extend(paths.iter().map(String::as_str));

        let _index = self.lock_index();
        self.git(&args).map(|_| ())
    }

    /// Stage deletions of `paths`. Paths git never tracked are ignored.
    pub fn stage_removals(&self, paths: &[String]) -> Result<()> {
        self.ensure_writable("stage deletions")?;
        if paths.is_empty() {
            return Ok(());
        }

        let mut args = vec!["rm", "--cached", "--quiet", "--ignore-unmatch", "--"];
        args.extend(paths.iter().map(String::as_str));

        let _index = self.lock_index();
        self.git(&args).map(|_| ())
    }

    /// Commit the index.
    ///
    /// Returns `None` without committing when nothing is staged.
    pub fn commit(&self, message: &str) -> Result<Option<String>> {
        self.ensure_writable("commit")?;

        let _index = self.lock_index();

        let staged = self.git(&["diff", "--cached", "--name-only"])?;
        if staged.is_empty() {
            tracing::info!(repo = %self.label, "nothing staged, skipping commit");
            return Ok(None);
        }

        self.git(&["commit", "--quiet", "-m", message]).map_err(|e| {
            PromoteError::Git(format!("failed to commit in {}: {}", self.label, e))
        })?;
        let sha = self.git(&["rev-parse", "HEAD"])?.stdout;

        self.transition(SessionState::Committed)?;
        Ok(Some(sha))
    }

    /// Push `branch` to the session's remote.
    pub fn push(&self, branch: &str) -> Result<()> {
        self.ensure_writable("push")?;

        let refspec = format!("refs/heads/{0}:refs/heads/{0}", branch);
        tracing::info!(repo = %self.label, branch, "pushing");

        self.git(&["push", "--quiet", &self.settings.remote, &refspec])
            .map_err(|e| {
                PromoteError::Transport(format!("failed to push {} to {}: {}", branch, self.label, e))
            })?;

        self.transition(SessionState::Pushed)
    }

    /// Close the session and remove its temporary directory.
    pub fn close(self) -> Result<()> {
        self.transition(SessionState::Closed)?;
        let label = self.label;
        self.dir.close().map_err(|e| {
            PromoteError::Io(format!("failed to remove clone of {}: {}", label, e))
        })
    }

    /// Worktree root.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Absolute path of a worktree-relative path.
    pub fn path(&self, relative: &str) -> PathBuf {
        self.root.join(relative)
    }

    /// Repository slug this session was cloned from.
    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn state(&self) -> SessionState {
        *self.state.lock().unwrap_or_else(|poison| poison.into_inner())
    }

    fn transition(&self, next: SessionState) -> Result<()> {
        let mut state = self.state.lock().unwrap_or_else(|poison| poison.into_inner());
        if !state.can_transition(next) {
            return Err(PromoteError::Git(format!(
                "{}: cannot move from {} to {}",
                self.label, *state, next
            )));
        }
        *state = next;
        Ok(())
    }

    /// Fail unless this session may be mutated.
    pub fn ensure_writable(&self, action: &str) -> Result<()> {
        match self.access {
            Access::ReadWrite => Ok(()),
            Access::ReadOnly => Err(PromoteError::Git(format!(
                "refusing to {} in read-only session {}",
                action, self.label
            ))),
        }
    }

    fn lock_index(&self) -> MutexGuard<'_, ()> {
        self.index.lock().unwrap_or_else(|poison| poison.into_inner())
    }

    fn git(&self, args: &[&str]) -> Result<crate::git::GitOutput> {
        run_git_with(&self.root, args, &self.git)
    }
}
