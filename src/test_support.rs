use crate::config::Config;
use crate::credentials::Credentials;
use crate::error::{PromoteError, Result};
use crate::host::{CreateBranchPayload, HostApi, PullRequestPayload, RepoRef};
use crate::session::{Access, RepositorySession, SessionSettings};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::Mutex;
use tempfile::TempDir;

pub(crate) fn create_test_repo() -> TempDir {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path();

    init_repo(path);
    std::fs::write(path.join("README.md"), "# Test\n").unwrap();
    git(path, &["add", "."]);
    git(path, &["commit", "-m", "Initial commit"]);

    temp_dir
}

fn init_repo(path: &Path) {
    git(path, &["init", "--quiet"]);
    // Deterministic default branch name across environments.
    git(path, &["symbolic-ref", "HEAD", "refs/heads/main"]);
    git(path, &["config", "user.email", "test@example.com"]);
    git(path, &["config", "user.name", "Test User"]);
}

/// Throwaway "host" directory holding bare repositories at
/// `<root>/<project>/<slug>.git`, reachable through `file://` URLs.
pub(crate) struct RemoteFixture {
    root: TempDir,
}

impl RemoteFixture {
    pub(crate) fn new() -> Self {
        Self {
            root: TempDir::new().unwrap(),
        }
    }

    /// Base URL to use as `git_base_url`.
    pub(crate) fn git_base_url(&self) -> String {
        format!("file://{}", self.root.path().display())
    }

    pub(crate) fn bare_path(&self, project: &str, slug: &str) -> PathBuf {
        self.root.path().join(project).join(format!("{}.git", slug))
    }

    pub(crate) fn clone_url(&self, project: &str, slug: &str) -> String {
        format!("file://{}", self.bare_path(project, slug).display())
    }

    /// Create a bare repository whose `main` holds `files` in one commit,
    /// preceded by `history` filler commits.
    pub(crate) fn create_repo<K: AsRef<str>, V: AsRef<str>>(
        &self,
        project: &str,
        slug: &str,
        files: &[(K, V)],
        history: usize,
    ) -> PathBuf {
        let work = TempDir::new().unwrap();
        let path = work.path();
        init_repo(path);

        for i in 0..history {
            std::fs::write(path.join("HISTORY"), format!("{}\n", i)).unwrap();
            git(path, &["add", "."]);
            git(path, &["commit", "--quiet", "-m", &format!("History {}", i)]);
        }

        for (relative, content) in files {
            let file = path.join(relative.as_ref());
            std::fs::create_dir_all(file.parent().unwrap()).unwrap();
            std::fs::write(file, content.as_ref()).unwrap();
        }
        git(path, &["add", "--all"]);
        git(path, &["commit", "--quiet", "--allow-empty", "-m", "Seed gitops tree"]);

        let bare = self.bare_path(project, slug);
        std::fs::create_dir_all(bare.parent().unwrap()).unwrap();
        let bare_str = bare.to_string_lossy().to_string();
        git(path, &["clone", "--quiet", "--bare", ".", &bare_str]);
        bare
    }

    /// Create `branch` at `start` inside a bare repository.
    pub(crate) fn create_branch(&self, project: &str, slug: &str, branch: &str, start: &str) {
        git(&self.bare_path(project, slug), &["branch", branch, start]);
    }

    pub(crate) fn has_branch(&self, project: &str, slug: &str, branch: &str) -> bool {
        Command::new("git")
            .current_dir(self.bare_path(project, slug))
            .args(["rev-parse", "--verify", "--quiet", &format!("refs/heads/{}", branch)])
            .output()
            .map(|o| o.status.success())
            .unwrap_or(false)
    }

    /// Content of `path` on `branch`, if present.
    pub(crate) fn read_file(&self, project: &str, slug: &str, branch: &str, path: &str) -> Option<String> {
        let output = Command::new("git")
            .current_dir(self.bare_path(project, slug))
            .args(["show", &format!("{}:{}", branch, path)])
            .output()
            .unwrap();
        output
            .status
            .success()
            .then(|| String::from_utf8_lossy(&output.stdout).to_string())
    }

    /// File names directly under `dir` on `branch`.
    pub(crate) fn list_dir(&self, project: &str, slug: &str, branch: &str, dir: &str) -> Vec<String> {
        let output = git(
            &self.bare_path(project, slug),
            &["ls-tree", "--name-only", &format!("{}:{}", branch, dir)],
        );
        output.lines().map(str::to_string).collect()
    }

    pub(crate) fn commit_count(&self, project: &str, slug: &str, branch: &str) -> usize {
        git(&self.bare_path(project, slug), &["rev-list", "--count", branch])
            .trim()
            .parse()
            .unwrap()
    }

    pub(crate) fn head_subject(&self, project: &str, slug: &str, branch: &str) -> String {
        git(
            &self.bare_path(project, slug),
            &["log", "-1", "--format=%s", branch],
        )
        .trim()
        .to_string()
    }
}

/// Clone `<project>/<slug>` from the fixture and fetch every branch.
pub(crate) fn open_session(
    remotes: &RemoteFixture,
    project: &str,
    slug: &str,
    access: Access,
) -> RepositorySession {
    let session = RepositorySession::clone_remote(
        slug,
        &remotes.clone_url(project, slug),
        &Credentials::new("builder", "secret-token"),
        &SessionSettings::from_config(&Config::default()),
        access,
    )
    .unwrap();
    session.fetch_all().unwrap();
    session
}

/// Application descriptor as the deployment tool expects it.
pub(crate) fn app_config(product: &str, service: &str, tag: &str) -> String {
    format!(
        "app:\n  source: https://git.example.com/scm/ops/charts.git\n  path: charts/{product}/{service}\n  revision: HEAD\n  image_name: registry.example.com/{product}/{service}\n  image_tag: {tag}\n  replicas: 2\nnotifications:\n  slack: releases\n"
    )
}

/// Staging tree for `product`. Each service is `(name, release, commit-hash)`.
///
/// Trunk manifests are `deployment.yaml` and `service.yaml`; the staging
/// manifest directory holds a stale `deployment.yaml` and a `legacy.yaml`.
pub(crate) fn staging_tree(product: &str, services: &[(&str, &str, &str)]) -> Vec<(String, String)> {
    let mut files = Vec::new();
    for (service, release, hash) in services {
        let root = format!("{product}/services/{service}");
        files.push((
            format!("{root}/images/latest/.semver.yaml"),
            format!("alpha: 0\nbeta: 0\ncommit-hash: {hash}\nrc: 0\nrelease: {release}\n"),
        ));
        files.push((
            format!("{root}/manifests/base/main/deployment.yaml"),
            format!("kind: Deployment\nname: {service}\nreplicas: 3\n"),
        ));
        files.push((
            format!("{root}/manifests/base/main/service.yaml"),
            format!("kind: Service\nname: {service}\n"),
        ));
        files.push((
            format!("{root}/manifests/base/staging/deployment.yaml"),
            format!("kind: Deployment\nname: {service}\nreplicas: 1\n"),
        ));
        files.push((
            format!("{root}/manifests/base/staging/legacy.yaml"),
            "kind: ConfigMap\n".to_string(),
        ));
        files.push((
            format!("{product}/.argocd/staging/{service}/config.yaml"),
            app_config(product, service, "1.1.0-0ld0ld"),
        ));
    }
    files
}

/// Production tree for `product` in region `r2`.
///
/// Each service has an `obsolete.yaml` manifest and a `kustomize/` subdirectory.
pub(crate) fn production_tree(product: &str, services: &[&str]) -> Vec<(String, String)> {
    let mut files = Vec::new();
    for service in services {
        let root = format!("{product}/services/{service}/manifests/base");
        files.push((format!("{root}/obsolete.yaml"), "kind: Job\n".to_string()));
        files.push((
            format!("{root}/kustomize/kustomization.yaml"),
            "resources: []\n".to_string(),
        ));
        files.push((
            format!("{product}/.argocd/production/r2/{service}/config.yaml"),
            app_config(product, service, "1.0.0-pr0d00"),
        ));
    }
    files
}

/// A host API call recorded by [`FakeHost`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum HostCall {
    BranchProbe { slug: String, branch: String },
    CreateBranch { slug: String, payload: CreateBranchPayload },
    PullRequestProbe { slug: String, branch: String },
    OpenPullRequest { slug: String, payload: PullRequestPayload },
}

/// In-process host backed by a [`RemoteFixture`].
///
/// Branches live in the fixture's bare repositories; pull requests are
/// remembered in memory.
pub(crate) struct FakeHost<'a> {
    remotes: &'a RemoteFixture,
    pull_requests: Mutex<HashSet<(String, String)>>,
    calls: Mutex<Vec<HostCall>>,
    pub(crate) reject_branch_creation: bool,
}

impl<'a> FakeHost<'a> {
    pub(crate) fn new(remotes: &'a RemoteFixture) -> Self {
        Self {
            remotes,
            pull_requests: Mutex::new(HashSet::new()),
            calls: Mutex::new(Vec::new()),
            reject_branch_creation: false,
        }
    }

    pub(crate) fn with_pull_request(self, slug: &str, branch: &str) -> Self {
        self.pull_requests
            .lock()
            .unwrap()
            .insert((slug.to_string(), branch.to_string()));
        self
    }

    pub(crate) fn calls(&self) -> Vec<HostCall> {
        self.calls.lock().unwrap().clone()
    }

    fn record(&self, call: HostCall) {
        self.calls.lock().unwrap().push(call);
    }
}

impl HostApi for FakeHost<'_> {
    fn branch_exists(&self, repo: &RepoRef, branch: &str) -> Result<bool> {
        self.record(HostCall::BranchProbe {
            slug: repo.slug.clone(),
            branch: branch.to_string(),
        });
        Ok(self.remotes.has_branch(&repo.project, &repo.slug, branch))
    }

    fn pull_request_exists(&self, repo: &RepoRef, branch: &str) -> Result<bool> {
        self.record(HostCall::PullRequestProbe {
            slug: repo.slug.clone(),
            branch: branch.to_string(),
        });
        Ok(self
            .pull_requests
            .lock()
            .unwrap()
            .contains(&(repo.slug.clone(), branch.to_string())))
    }

    fn create_branch(&self, repo: &RepoRef, payload: &CreateBranchPayload) -> Result<()> {
        self.record(HostCall::CreateBranch {
            slug: repo.slug.clone(),
            payload: payload.clone(),
        });
        if self.reject_branch_creation {
            return Err(PromoteError::HostRejection {
                action: "create branch".to_string(),
                status: 409,
                body: "branch creation disabled".to_string(),
            });
        }
        self.remotes
            .create_branch(&repo.project, &repo.slug, &payload.name, &payload.start_point);
        Ok(())
    }

    fn open_pull_request(&self, repo: &RepoRef, payload: &PullRequestPayload) -> Result<()> {
        self.record(HostCall::OpenPullRequest {
            slug: repo.slug.clone(),
            payload: payload.clone(),
        });
        let branch = payload
            .from_ref
            .id
            .trim_start_matches("refs/heads/")
            .to_string();
        self.pull_requests
            .lock()
            .unwrap()
            .insert((repo.slug.clone(), branch));
        Ok(())
    }
}

/// Run git in `repo_dir`, panicking with its output on failure; returns stdout.
pub(crate) fn git(repo_dir: &Path, args: &[&str]) -> String {
    let output = Command::new("git")
        .current_dir(repo_dir)
        .args(args)
        .output()
        .unwrap_or_else(|e| panic!("failed to execute git {}: {}", args.join(" "), e));

    if !output.status.success() {
        let stdout = String::from_utf8_lossy(&output.stdout);
        let stderr = String::from_utf8_lossy(&output.stderr);
        panic!(
            "git {} failed (exit code {:?})\nstdout:\n{}\nstderr:\n{}",
            args.join(" "),
            output.status.code(),
            stdout,
            stderr
        );
    }

    String::from_utf8_lossy(&output.stdout).to_string()
}
