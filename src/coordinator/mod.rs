//! Release coordinator.
//!
//! Drives one release request end to end:
//!
//! ```text
//! Init → Probed → BranchReady → VersionsAndManifestsUpdated → Committed → Pushed → PrProbed → Done
//! ```
//!
//! - **Probed**: the target repository is asked whether the working branch exists.
//! - **BranchReady**: the branch is created from trunk when absent, the target
//!   repository is cloned and the branch checked out. Promotion to production
//!   also clones the staging repository, read-only.
//! - **VersionsAndManifestsUpdated**: services are processed in order. For each
//!   one, version propagation runs on this thread while manifest
//!   synchronization runs on a scoped background thread; both are joined
//!   before the service's commit.
//! - **Committed**: entered once per service, inside the service loop.
//! - **Pushed**: all commits go out in one push.
//! - **PrProbed / Done**: a pull request into trunk is opened unless one exists.
//!
//! Any failure ends the run and is wrapped with the stage it happened in.
//! Nothing is rolled back; running the same request again picks up where the
//! previous run stopped.

#[cfg(test)]
mod tests;

use crate::config::Config;
use crate::credentials::ResolvedAccess;
use crate::descriptor::VersionDescriptor;
use crate::error::{PromoteError, Result};
use crate::events::{Event, EventAction, Journal};
use crate::host::{CreateBranchPayload, HostApi, PullRequestPayload, RepoRef};
use crate::layout::ServiceLayout;
use crate::manifests::{SyncSummary, sync_manifests};
use crate::propagate::{VersionUpdate, propagate_version, read_version};
use crate::request::{Mode, ReleaseRequest};
use crate::session::{Access, RepositorySession, SessionSettings};
use globset::GlobSet;
use serde_json::json;
use std::any::Any;
use std::fmt;

/// Coordinator states. An error is tagged with the state being entered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Init,
    Probed,
    BranchReady,
    VersionsAndManifestsUpdated,
    Committed,
    Pushed,
    PrProbed,
    Done,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Init => "initialization",
            Stage::Probed => "branch probe",
            Stage::BranchReady => "branch checkout",
            Stage::VersionsAndManifestsUpdated => "service update",
            Stage::Committed => "commit",
            Stage::Pushed => "push",
            Stage::PrProbed => "pull request probe",
            Stage::Done => "pull request creation",
        };
        f.write_str(name)
    }
}

trait StageContext<T> {
    fn during(self, stage: Stage) -> Result<T>;
}

impl<T> StageContext<T> for Result<T> {
    fn during(self, stage: Stage) -> Result<T> {
        self.map_err(|e| e.at_stage(stage))
    }
}

/// What happened to one service.
#[derive(Debug, Clone)]
pub struct ServiceReport {
    pub service: String,
    pub version: VersionUpdate,
    pub manifests: SyncSummary,
    /// `None` when the service needed no change.
    pub commit: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PullRequestOutcome {
    Opened,
    AlreadyOpen,
}

/// Outcome of a successful run.
#[derive(Debug)]
pub struct RunSummary {
    pub mode: Mode,
    pub target: RepoRef,
    pub branch: String,
    pub created_branch: bool,
    pub services: Vec<ServiceReport>,
    pub pull_request: PullRequestOutcome,
    pub events: Vec<Event>,
}

impl RunSummary {
    pub fn commits(&self) -> usize {
        self.services.iter().filter(|s| s.commit.is_some()).count()
    }
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Promoted {} to {} ({})", self.branch, self.mode, self.target)?;
        writeln!(
            f,
            "  branch: {}",
            if self.created_branch { "created from trunk" } else { "already existed" }
        )?;
        for report in &self.services {
            let commit = match &report.commit {
                Some(sha) => sha.chars().take(12).collect::<String>(),
                None => "no changes".to_string(),
            };
            writeln!(
                f,
                "  {}: image_tag {}, {} manifest(s) synced, {}",
                report.service,
                report.version.image_tag,
                report.manifests.copied.len(),
                commit
            )?;
        }
        let pull_request = match self.pull_request {
            PullRequestOutcome::Opened => "opened",
            PullRequestOutcome::AlreadyOpen => "already open",
        };
        write!(f, "  pull request: {}", pull_request)
    }
}

/// Runs release requests against one host.
pub struct Coordinator<'a> {
    config: &'a Config,
    host: &'a dyn HostApi,
    access: &'a ResolvedAccess,
    journal: Journal,
}

impl<'a> Coordinator<'a> {
    pub fn new(
        config: &'a Config,
        host: &'a dyn HostApi,
        access: &'a ResolvedAccess,
        journal: Journal,
    ) -> Self {
        Self {
            config,
            host,
            access,
            journal,
        }
    }

    /// Run `request` to completion or to the first failure.
    pub fn run(mut self, request: &ReleaseRequest) -> Result<RunSummary> {
        // Init
        request.validate().during(Stage::Init)?;
        let patterns = self.config.clean_globset().during(Stage::Init)?;
        let mode = request.mode();
        let target = request.target_repo();
        let branch = request.branch.as_str();
        tracing::info!(%mode, repo = %target, branch, services = request.services.len(), "starting release");

        // Probed
        let exists = self.host.branch_exists(&target, branch).during(Stage::Probed)?;
        self.record(
            Event::new(EventAction::ProbeBranch)
                .with_details(json!({"repo": target.to_string(), "branch": branch, "exists": exists})),
        )
        .during(Stage::Probed)?;

        // BranchReady
        let (destination, staging) = self
            .prepare_sessions(request, &target, exists)
            .during(Stage::BranchReady)?;
        let authoritative = staging.as_ref().unwrap_or(&destination);

        // VersionsAndManifestsUpdated
        let mut services = Vec::with_capacity(request.services.len());
        for service in &request.services {
            let report = self
                .process_service(request, mode, authoritative, &destination, service, &patterns)
                .during(Stage::VersionsAndManifestsUpdated)?;
            services.push(report);
        }

        // Pushed
        destination.push(branch).during(Stage::Pushed)?;
        self.record(Event::new(EventAction::Push).with_details(json!({
            "repo": target.to_string(),
            "branch": branch,
            "commits": services.iter().filter(|s| s.commit.is_some()).count(),
        })))
        .during(Stage::Pushed)?;

        // PrProbed
        let pr_exists = self
            .host
            .pull_request_exists(&target, branch)
            .during(Stage::PrProbed)?;
        self.record(Event::new(EventAction::ProbePullRequest).with_details(json!({
            "repo": target.to_string(),
            "branch": branch,
            "exists": pr_exists,
        })))
        .during(Stage::PrProbed)?;

        // Done
        let pull_request = if pr_exists {
            tracing::info!(repo = %target, branch, "pull request already open");
            PullRequestOutcome::AlreadyOpen
        } else {
            let title = self
                .config
                .render_pull_request_title(&mode.to_string(), branch);
            let payload = PullRequestPayload::new(branch, &self.config.trunk_branch, title);
            self.host
                .open_pull_request(&target, &payload)
                .during(Stage::Done)?;
            self.record(Event::new(EventAction::OpenPullRequest).with_details(json!({
                "repo": target.to_string(),
                "from": payload.from_ref.id,
                "to": payload.to_ref.id,
                "title": payload.title,
            })))
            .during(Stage::Done)?;
            PullRequestOutcome::Opened
        };

        close(destination);
        if let Some(staging) = staging {
            close(staging);
        }

        Ok(RunSummary {
            mode,
            target,
            branch: branch.to_string(),
            created_branch: !exists,
            services,
            pull_request,
            events: self.journal.into_events(),
        })
    }

    /// Create the branch if needed, then clone and check out.
    ///
    /// Returns the destination session and, for promotion, the read-only
    /// staging session.
    fn prepare_sessions(
        &mut self,
        request: &ReleaseRequest,
        target: &RepoRef,
        branch_exists: bool,
    ) -> Result<(RepositorySession, Option<RepositorySession>)> {
        let branch = request.branch.as_str();

        if !branch_exists {
            let payload = CreateBranchPayload {
                message: self.config.branch_create_message.clone(),
                name: branch.to_string(),
                start_point: self.config.trunk_branch.clone(),
            };
            self.host.create_branch(target, &payload)?;
            self.record(Event::new(EventAction::CreateBranch).with_details(json!({
                "repo": target.to_string(),
                "branch": branch,
                "start_point": payload.start_point,
            })))?;
        }

        let destination = self.open_session(target, Access::ReadWrite)?;
        let staging = match request.mode() {
            Mode::Production => Some(self.open_session(&request.staging_repo_ref(), Access::ReadOnly)?),
            Mode::Staging => None,
        };

        destination.switch_branch(branch)?;
        self.record(Event::new(EventAction::SwitchBranch).with_details(json!({
            "repo": target.to_string(),
            "branch": branch,
        })))?;

        Ok((destination, staging))
    }

    fn open_session(&mut self, repo: &RepoRef, access: Access) -> Result<RepositorySession> {
        let settings = SessionSettings::from_config(self.config);
        let url = self.access.endpoints.clone_url(&repo.project, &repo.slug);

        let session = RepositorySession::clone_remote(
            &repo.slug,
            &url,
            &self.access.credentials,
            &settings,
            access,
        )?;
        self.record(Event::new(EventAction::Clone).with_details(json!({
            "repo": repo.to_string(),
            "read_only": access == Access::ReadOnly,
            "depth": settings.fetch.initial_depth,
        })))?;

        let depth = session.fetch_all()?;
        self.record(Event::new(EventAction::Fetch).with_details(json!({
            "repo": repo.to_string(),
            "depth": depth,
        })))?;

        Ok(session)
    }

    /// Propagate the version and synchronize manifests of one service, then commit.
    fn process_service(
        &mut self,
        request: &ReleaseRequest,
        mode: Mode,
        authoritative: &RepositorySession,
        destination: &RepositorySession,
        service: &str,
        patterns: &GlobSet,
    ) -> Result<ServiceReport> {
        let layout = ServiceLayout::new(mode, &request.product, service, &self.config.production_region);
        layout.check_disjoint(mode)?;

        tracing::info!(service, "updating service");
        let version = read_version(authoritative, &layout, &self.config.trunk_branch)?;

        let removed = destination.clean_worktree(patterns)?;
        if !removed.is_empty() {
            tracing::info!(service, removed = removed.len(), "cleaned worktree");
        }
        destination.switch_branch(&request.branch)?;

        let (manifests, version_update) = update_concurrently(authoritative, destination, &layout, &version)?;

        self.record(
            Event::new(EventAction::PropagateVersion)
                .with_service(service)
                .with_details(json!({
                    "path": version_update.config_path,
                    "previous_tag": version_update.previous_tag,
                    "image_tag": version_update.image_tag,
                })),
        )?;
        self.record(
            Event::new(EventAction::SyncManifests)
                .with_service(service)
                .with_details(json!({
                    "from": layout.source_manifests,
                    "to": layout.dest_manifests,
                    "removed": manifests.removed.len(),
                    "copied": manifests.copied.len(),
                })),
        )?;

        for entry in destination.status()? {
            tracing::debug!(service, code = %entry.code, path = %entry.path, "worktree status");
        }

        let commit = destination
            .commit(&self.config.commit_message)
            .during(Stage::Committed)?;
        self.record(
            Event::new(EventAction::Commit)
                .with_service(service)
                .with_details(json!({"sha": commit, "skipped": commit.is_none()})),
        )
        .during(Stage::Committed)?;

        Ok(ServiceReport {
            service: service.to_string(),
            version: version_update,
            manifests,
            commit,
        })
    }

    fn record(&mut self, event: Event) -> Result<()> {
        self.journal.record(event)
    }
}

/// Fork manifest synchronization, propagate the version here, join.
fn update_concurrently(
    authoritative: &RepositorySession,
    destination: &RepositorySession,
    layout: &ServiceLayout,
    version: &VersionDescriptor,
) -> Result<(SyncSummary, VersionUpdate)> {
    fork_join(
        &layout.service,
        || sync_manifests(authoritative, destination, layout),
        || propagate_version(destination, layout, version),
    )
}

/// Run `background` on a scoped thread and `foreground` on this one.
///
/// Both always run to completion. When both fail, the foreground error is
/// returned; a background panic becomes `Internal`.
fn fork_join<A, B, FA, FB>(service: &str, background: FA, foreground: FB) -> Result<(A, B)>
where
    A: Send,
    FA: FnOnce() -> Result<A> + Send,
    FB: FnOnce() -> Result<B>,
{
    let (joined, foreground) = std::thread::scope(|scope| {
        let handle = scope.spawn(background);
        let foreground = foreground();
        (handle.join(), foreground)
    });

    let background = joined.map_err(|payload| {
        PromoteError::Internal(format!(
            "manifest synchronization for {} panicked: {}",
            service,
            panic_message(payload.as_ref())
        ))
    });

    let foreground = foreground?;
    let background = background.and_then(|result| result)?;
    Ok((background, foreground))
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}

fn close(session: RepositorySession) {
    let label = session.label().to_string();
    if let Err(e) = session.close() {
        tracing::warn!(repo = %label, error = %e, "failed to remove clone");
    }
}
