use super::*;
use crate::credentials::{Credentials, Endpoints};
use crate::exit_codes;
use crate::test_support::{
    FakeHost, HostCall, RemoteFixture, app_config, git, open_session, production_tree, staging_tree,
};
use tempfile::TempDir;

const PROJECT: &str = "OPS";
const STAGING: &str = "gitops-staging";
const PROD: &str = "gitops-prod";
const BRANCH: &str = "release-1.2";

fn access(remotes: &RemoteFixture) -> ResolvedAccess {
    ResolvedAccess {
        credentials: Credentials::new("builder", "secret-token"),
        endpoints: Endpoints::new("http://host.invalid/rest/api/1.0", remotes.git_base_url()),
    }
}

fn remotes() -> RemoteFixture {
    let remotes = RemoteFixture::new();
    remotes.create_repo(
        PROJECT,
        STAGING,
        &staging_tree("shop", &[("api", "1.2.0", "abc123"), ("web", "2.0.1", "def456")]),
        3,
    );
    remotes.create_repo(PROJECT, PROD, &production_tree("shop", &["api", "web"]), 3);
    remotes
}

fn staging_request() -> ReleaseRequest {
    ReleaseRequest {
        staging_repo: STAGING.to_string(),
        production_repo: None,
        project: PROJECT.to_string(),
        branch: BRANCH.to_string(),
        product: "shop".to_string(),
        services: vec!["api".to_string(), "web".to_string()],
    }
}

fn production_request() -> ReleaseRequest {
    ReleaseRequest {
        production_repo: Some(PROD.to_string()),
        ..staging_request()
    }
}

fn run(remotes: &RemoteFixture, host: &FakeHost<'_>, request: &ReleaseRequest) -> Result<RunSummary> {
    let config = Config::default();
    let access = access(remotes);
    Coordinator::new(&config, host, &access, Journal::new()).run(request)
}

fn image_tag(remotes: &RemoteFixture, slug: &str, path: &str) -> Option<String> {
    let text = remotes.read_file(PROJECT, slug, BRANCH, path)?;
    crate::descriptor::parse_application_descriptor(&text, path)
        .unwrap()
        .app
        .image_tag
}

#[test]
fn staging_release_end_to_end() {
    let remotes = remotes();
    let host = FakeHost::new(&remotes);
    let trunk_commits = remotes.commit_count(PROJECT, STAGING, "main");

    let summary = run(&remotes, &host, &staging_request()).unwrap();

    assert_eq!(summary.mode, Mode::Staging);
    assert_eq!(summary.target, RepoRef::new(PROJECT, STAGING));
    assert!(summary.created_branch);
    assert_eq!(summary.commits(), 2);
    assert_eq!(summary.pull_request, PullRequestOutcome::Opened);

    let actions: Vec<EventAction> = summary.events.iter().map(|e| e.action).collect();
    assert_eq!(
        actions,
        vec![
            EventAction::ProbeBranch,
            EventAction::CreateBranch,
            EventAction::Clone,
            EventAction::Fetch,
            EventAction::SwitchBranch,
            EventAction::PropagateVersion,
            EventAction::SyncManifests,
            EventAction::Commit,
            EventAction::PropagateVersion,
            EventAction::SyncManifests,
            EventAction::Commit,
            EventAction::Push,
            EventAction::ProbePullRequest,
            EventAction::OpenPullRequest,
        ]
    );

    assert_eq!(
        host.calls(),
        vec![
            HostCall::BranchProbe {
                slug: STAGING.to_string(),
                branch: BRANCH.to_string()
            },
            HostCall::CreateBranch {
                slug: STAGING.to_string(),
                payload: CreateBranchPayload {
                    message: "Release Branch".to_string(),
                    name: BRANCH.to_string(),
                    start_point: "main".to_string(),
                },
            },
            HostCall::PullRequestProbe {
                slug: STAGING.to_string(),
                branch: BRANCH.to_string()
            },
            HostCall::OpenPullRequest {
                slug: STAGING.to_string(),
                payload: PullRequestPayload::new(
                    BRANCH,
                    "main",
                    "Candidate release to staging: release-1.2".to_string()
                ),
            },
        ]
    );

    assert_eq!(
        image_tag(&remotes, STAGING, "shop/.argocd/staging/api/config.yaml").as_deref(),
        Some("1.2.0-abc123")
    );
    assert_eq!(
        image_tag(&remotes, STAGING, "shop/.argocd/staging/web/config.yaml").as_deref(),
        Some("2.0.1-def456")
    );
    assert_eq!(
        remotes.list_dir(PROJECT, STAGING, BRANCH, "shop/services/api/manifests/base/staging"),
        vec!["deployment.yaml", "service.yaml"]
    );
    assert_eq!(
        remotes.read_file(PROJECT, STAGING, BRANCH, "shop/services/web/manifests/base/staging/deployment.yaml"),
        remotes.read_file(PROJECT, STAGING, "main", "shop/services/web/manifests/base/main/deployment.yaml"),
    );

    assert_eq!(remotes.commit_count(PROJECT, STAGING, BRANCH), trunk_commits + 2);
    assert_eq!(
        remotes.head_subject(PROJECT, STAGING, BRANCH),
        "Auto commit version update for release"
    );
    assert_eq!(remotes.commit_count(PROJECT, STAGING, "main"), trunk_commits);
}

#[test]
fn production_promotion_reads_staging_and_writes_production() {
    let remotes = remotes();
    let host = FakeHost::new(&remotes);
    let staging_commits = remotes.commit_count(PROJECT, STAGING, "main");

    let summary = run(&remotes, &host, &production_request()).unwrap();

    assert_eq!(summary.mode, Mode::Production);
    assert_eq!(summary.target, RepoRef::new(PROJECT, PROD));
    assert_eq!(
        image_tag(&remotes, PROD, "shop/.argocd/production/r2/api/config.yaml").as_deref(),
        Some("1.2.0-abc123")
    );
    assert_eq!(
        remotes.list_dir(PROJECT, PROD, BRANCH, "shop/services/api/manifests/base"),
        vec!["deployment.yaml", "kustomize", "legacy.yaml"]
    );
    assert_eq!(
        remotes.read_file(PROJECT, PROD, BRANCH, "shop/services/api/manifests/base/deployment.yaml"),
        remotes.read_file(PROJECT, STAGING, "main", "shop/services/api/manifests/base/staging/deployment.yaml"),
    );

    // The staging tree is a data source only.
    assert!(!remotes.has_branch(PROJECT, STAGING, BRANCH));
    assert_eq!(remotes.commit_count(PROJECT, STAGING, "main"), staging_commits);

    let opened = host.calls().into_iter().find_map(|call| match call {
        HostCall::OpenPullRequest { slug, payload } => Some((slug, payload)),
        _ => None,
    });
    let (slug, payload) = opened.unwrap();
    assert_eq!(slug, PROD);
    assert_eq!(payload.title, "Candidate release to production: release-1.2");

    let clones = summary
        .events
        .iter()
        .filter(|e| e.action == EventAction::Clone)
        .count();
    assert_eq!(clones, 2);
}

#[test]
fn existing_branch_and_pull_request_are_reused() {
    let remotes = remotes();
    remotes.create_branch(PROJECT, STAGING, BRANCH, "main");
    let host = FakeHost::new(&remotes).with_pull_request(STAGING, BRANCH);

    let summary = run(&remotes, &host, &staging_request()).unwrap();

    assert!(!summary.created_branch);
    assert_eq!(summary.pull_request, PullRequestOutcome::AlreadyOpen);
    assert!(host.calls().iter().all(|call| !matches!(
        call,
        HostCall::CreateBranch { .. } | HostCall::OpenPullRequest { .. }
    )));
    assert_eq!(
        image_tag(&remotes, STAGING, "shop/.argocd/staging/api/config.yaml").as_deref(),
        Some("1.2.0-abc123")
    );
}

#[test]
fn rerun_is_idempotent() {
    let remotes = remotes();
    let host = FakeHost::new(&remotes);
    run(&remotes, &host, &staging_request()).unwrap();
    let commits = remotes.commit_count(PROJECT, STAGING, BRANCH);

    let second = run(&remotes, &host, &staging_request()).unwrap();

    assert!(!second.created_branch);
    assert_eq!(second.commits(), 0);
    assert!(second.services.iter().all(|s| !s.version.changed()));
    assert_eq!(second.pull_request, PullRequestOutcome::AlreadyOpen);
    assert_eq!(remotes.commit_count(PROJECT, STAGING, BRANCH), commits);
}

#[test]
fn rejected_branch_creation_stops_before_cloning() {
    let remotes = remotes();
    let mut host = FakeHost::new(&remotes);
    host.reject_branch_creation = true;

    let err = run(&remotes, &host, &staging_request()).unwrap_err();

    match &err {
        PromoteError::Stage { stage, source } => {
            assert_eq!(*stage, Stage::BranchReady);
            assert!(matches!(**source, PromoteError::HostRejection { status: 409, .. }));
        }
        other => panic!("expected stage error, got {other:?}"),
    }
    assert_eq!(err.exit_code(), exit_codes::HOST_FAILURE);
    assert!(err.to_string().starts_with("branch checkout failed"));
    assert!(!remotes.has_branch(PROJECT, STAGING, BRANCH));
}

#[test]
fn missing_service_fails_without_pushing() {
    let remotes = remotes();
    let host = FakeHost::new(&remotes);
    let mut request = staging_request();
    request.services.push("billing".to_string());

    let err = run(&remotes, &host, &request).unwrap_err();

    assert!(matches!(
        err,
        PromoteError::Stage {
            stage: Stage::VersionsAndManifestsUpdated,
            ..
        }
    ));
    assert!(matches!(err.root(), PromoteError::Io(_)));
    // Branch was created on the host, but no commit reached it.
    assert_eq!(
        remotes.commit_count(PROJECT, STAGING, BRANCH),
        remotes.commit_count(PROJECT, STAGING, "main")
    );
    assert!(
        !host
            .calls()
            .iter()
            .any(|call| matches!(call, HostCall::PullRequestProbe { .. }))
    );
}

#[test]
fn invalid_request_fails_at_init_without_host_calls() {
    let remotes = remotes();
    let host = FakeHost::new(&remotes);
    let mut request = staging_request();
    request.services.clear();

    let err = run(&remotes, &host, &request).unwrap_err();

    assert!(matches!(err, PromoteError::Stage { stage: Stage::Init, .. }));
    assert_eq!(err.exit_code(), exit_codes::USER_ERROR);
    assert!(host.calls().is_empty());
}

#[test]
fn journal_file_receives_every_event() {
    let remotes = remotes();
    let host = FakeHost::new(&remotes);
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("promote.ndjson");
    let config = Config::default();
    let access = access(&remotes);

    let summary = Coordinator::new(&config, &host, &access, Journal::with_file(&path))
        .run(&staging_request())
        .unwrap();

    let lines = std::fs::read_to_string(&path).unwrap();
    assert_eq!(lines.lines().count(), summary.events.len());
    let first: serde_json::Value = serde_json::from_str(lines.lines().next().unwrap()).unwrap();
    assert_eq!(first["action"], "probe_branch");
    assert_eq!(first["details"]["exists"], false);
}

#[test]
fn summary_lists_each_service() {
    let remotes = remotes();
    let host = FakeHost::new(&remotes);

    let summary = run(&remotes, &host, &staging_request()).unwrap();
    let text = summary.to_string();

    assert!(text.starts_with("Promoted release-1.2 to staging (OPS/gitops-staging)"));
    assert!(text.contains("api: image_tag 1.2.0-abc123, 2 manifest(s) synced"));
    assert!(text.contains("web: image_tag 2.0.1-def456"));
    assert!(text.ends_with("pull request: opened"));
}

/// Staging tree with `api` plus a `search` service that has a version and a
/// config but no manifest directories.
fn remotes_with_manifestless_service(search_config: &str) -> RemoteFixture {
    let mut files = staging_tree("shop", &[("api", "1.2.0", "abc123")]);
    files.push((
        "shop/services/search/images/latest/.semver.yaml".to_string(),
        "commit-hash: 5ea2c1\nrelease: 3.0.0\n".to_string(),
    ));
    files.push((
        "shop/.argocd/staging/search/config.yaml".to_string(),
        search_config.to_string(),
    ));

    let remotes = RemoteFixture::new();
    remotes.create_repo(PROJECT, STAGING, &files, 1);
    remotes
}

fn search_layout() -> ServiceLayout {
    ServiceLayout::new(Mode::Staging, "shop", "search", "r2")
}

#[test]
fn sync_failure_surfaces_after_propagation_completes() {
    let remotes = remotes_with_manifestless_service(&app_config("shop", "search", "2.9.0-0ld0ld"));
    let session = open_session(&remotes, PROJECT, STAGING, Access::ReadWrite);
    let layout = search_layout();
    let version = read_version(&session, &layout, "main").unwrap();

    let err = update_concurrently(&session, &session, &layout, &version).unwrap_err();

    assert!(matches!(err, PromoteError::Io(_)), "got {err:?}");
    assert!(err.to_string().contains("manifests/base/main"));

    // Propagation ran to completion: rewritten and staged.
    let written = crate::descriptor::read_application_descriptor(&session.path(&layout.config)).unwrap();
    assert_eq!(written.app.image_tag.as_deref(), Some("3.0.0-5ea2c1"));
    let staged = git(session.root(), &["diff", "--cached", "--name-only"]);
    assert_eq!(staged.trim(), layout.config);
}

#[test]
fn propagation_error_wins_when_both_fail() {
    let remotes = remotes_with_manifestless_service("app: [not, a, mapping\n");
    let session = open_session(&remotes, PROJECT, STAGING, Access::ReadWrite);
    let layout = search_layout();
    let version = read_version(&session, &layout, "main").unwrap();

    let err = update_concurrently(&session, &session, &layout, &version).unwrap_err();

    assert!(matches!(err, PromoteError::DescriptorParse(_)), "got {err:?}");
    assert_eq!(err.exit_code(), exit_codes::DESCRIPTOR_FAILURE);
}

#[test]
fn manifestless_service_stops_the_run_before_push() {
    let remotes = remotes_with_manifestless_service(&app_config("shop", "search", "2.9.0-0ld0ld"));
    let host = FakeHost::new(&remotes);
    let mut request = staging_request();
    request.services = vec!["api".to_string(), "search".to_string()];

    let err = run(&remotes, &host, &request).unwrap_err();

    assert!(matches!(
        err,
        PromoteError::Stage {
            stage: Stage::VersionsAndManifestsUpdated,
            ..
        }
    ));
    assert!(matches!(err.root(), PromoteError::Io(_)));
    assert_eq!(err.exit_code(), exit_codes::GIT_FAILURE);
    // The commit for api stayed local.
    assert_eq!(
        remotes.commit_count(PROJECT, STAGING, BRANCH),
        remotes.commit_count(PROJECT, STAGING, "main")
    );
}

#[test]
fn background_panic_is_internal_error() {
    let err = fork_join(
        "api",
        || -> Result<SyncSummary> { panic!("sync exploded") },
        || Ok(7),
    )
    .unwrap_err();

    assert!(matches!(err, PromoteError::Internal(_)), "got {err:?}");
    assert!(err.to_string().contains("api"));
    assert!(err.to_string().contains("sync exploded"));
    assert_eq!(err.exit_code(), exit_codes::INTERNAL_FAILURE);
}

#[test]
fn foreground_still_runs_when_background_panics() {
    let ran = std::sync::atomic::AtomicBool::new(false);
    let result = fork_join(
        "api",
        || -> Result<()> { panic!("boom") },
        || {
            ran.store(true, std::sync::atomic::Ordering::SeqCst);
            Ok(())
        },
    );

    assert!(result.is_err());
    assert!(ran.load(std::sync::atomic::Ordering::SeqCst));
}

#[test]
fn fork_join_returns_both_results() {
    let (background, foreground) = fork_join("api", || Ok("synced"), || Ok(3)).unwrap();
    assert_eq!(background, "synced");
    assert_eq!(foreground, 3);
}

#[test]
fn failed_commit_is_tagged_with_commit_stage() {
    let remotes = remotes();
    let host = FakeHost::new(&remotes);
    // git refuses an empty commit message.
    let config = Config {
        commit_message: String::new(),
        ..Config::default()
    };
    let access = access(&remotes);

    let err = Coordinator::new(&config, &host, &access, Journal::new())
        .run(&staging_request())
        .unwrap_err();

    match &err {
        PromoteError::Stage { stage, source } => {
            assert_eq!(*stage, Stage::Committed);
            assert!(matches!(**source, PromoteError::Git(_)));
        }
        other => panic!("expected stage error, got {other:?}"),
    }
    assert!(err.to_string().starts_with("commit failed"));
}

#[test]
fn stage_names() {
    assert_eq!(Stage::Probed.to_string(), "branch probe");
    assert_eq!(Stage::VersionsAndManifestsUpdated.to_string(), "service update");
    assert_eq!(Stage::Committed.to_string(), "commit");
    assert_eq!(Stage::Done.to_string(), "pull request creation");
}

#[test]
fn panic_payloads_are_readable() {
    let text: Box<dyn Any + Send> = Box::new("boom");
    let owned: Box<dyn Any + Send> = Box::new(String::from("owned boom"));
    let other: Box<dyn Any + Send> = Box::new(7_u8);

    assert_eq!(panic_message(text.as_ref()), "boom");
    assert_eq!(panic_message(owned.as_ref()), "owned boom");
    assert_eq!(panic_message(other.as_ref()), "unknown panic");
}
