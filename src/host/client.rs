//! Blocking HTTP implementation of [`HostApi`].

use super::probe::{PageVerdict, ProbeKind, classify};
use super::types::{CreateBranchPayload, PullRequestPayload, RepoRef};
use super::HostApi;
use crate::config::{Config, ProbeSettings};
use crate::credentials::{Credentials, Endpoints, ResolvedAccess};
use crate::error::{PromoteError, Result};
use serde::Serialize;

/// Upper bound on listing pages read by one probe.
const MAX_PROBE_PAGES: usize = 100;

/// Host client over `ureq`.
pub struct HttpHost {
    agent: ureq::Agent,
    endpoints: Endpoints,
    credentials: Credentials,
    probe: ProbeSettings,
}

impl HttpHost {
    pub fn new(access: &ResolvedAccess, config: &Config) -> Self {
        let agent = ureq::AgentBuilder::new()
            .timeout(config.http_timeout())
            .build();
        Self {
            agent,
            endpoints: access.endpoints.clone(),
            credentials: access.credentials.clone(),
            probe: config.probe.clone(),
        }
    }

    fn probe_url(&self, repo: &RepoRef, kind: ProbeKind, branch: &str, start: u64) -> String {
        let mut url = format!(
            "{}?filterText={}",
            self.endpoints
                .repo_api_url(&repo.project, &repo.slug, kind.resource()),
            urlencoding::encode(branch)
        );
        if start > 0 {
            url.push_str(&format!("&start={}", start));
        }
        url
    }

    fn probe(&self, repo: &RepoRef, kind: ProbeKind, branch: &str) -> Result<bool> {
        let action = format!("{} probe on {}", kind.describe(), repo);
        let mut start = 0;

        for _ in 0..MAX_PROBE_PAGES {
            let url = self.probe_url(repo, kind, branch, start);
            tracing::debug!(url = %url, "probing host");

            let request = self
                .agent
                .get(&url)
                .set("Authorization", &self.credentials.authorization_header())
                .set("X-Atlassian-Token", "no-check");
            let body = read(request.call(), &action)?;

            let found = match classify(kind, branch, &body, &self.probe)? {
                PageVerdict::Found => true,
                PageVerdict::Absent => false,
                PageVerdict::NextPage { start: next } if next > start => {
                    start = next;
                    continue;
                }
                PageVerdict::NextPage { start: next } => {
                    return Err(PromoteError::ProtocolMismatch(format!(
                        "{}: page cursor went from {} to {}",
                        action, start, next
                    )));
                }
            };
            tracing::info!(repo = %repo, branch, found, "{} probe", kind.describe());
            return Ok(found);
        }

        Err(PromoteError::ProtocolMismatch(format!(
            "{}: no answer within {} pages",
            action, MAX_PROBE_PAGES
        )))
    }

    fn post<T: Serialize>(&self, url: &str, action: &str, payload: &T) -> Result<String> {
        tracing::debug!(url = %url, "posting to host");
        let request = self
            .agent
            .post(url)
            .set("Authorization", &self.credentials.authorization_header())
            .set("X-Atlassian-Token", "no-check")
            .set("Content-Type", "application/json");
        read(request.send_json(payload), action)
    }
}

impl HostApi for HttpHost {
    fn branch_exists(&self, repo: &RepoRef, branch: &str) -> Result<bool> {
        self.probe(repo, ProbeKind::Branches, branch)
    }

    fn pull_request_exists(&self, repo: &RepoRef, branch: &str) -> Result<bool> {
        self.probe(repo, ProbeKind::PullRequests, branch)
    }

    fn create_branch(&self, repo: &RepoRef, payload: &CreateBranchPayload) -> Result<()> {
        let url = self
            .endpoints
            .repo_api_url(&repo.project, &repo.slug, ProbeKind::Branches.resource());
        self.post(&url, &format!("branch creation on {}", repo), payload)?;
        tracing::info!(repo = %repo, branch = %payload.name, from = %payload.start_point, "created branch");
        Ok(())
    }

    fn open_pull_request(&self, repo: &RepoRef, payload: &PullRequestPayload) -> Result<()> {
        let url = self
            .endpoints
            .repo_api_url(&repo.project, &repo.slug, ProbeKind::PullRequests.resource());
        self.post(&url, &format!("pull request creation on {}", repo), payload)?;
        tracing::info!(repo = %repo, from = %payload.from_ref.id, to = %payload.to_ref.id, "opened pull request");
        Ok(())
    }
}

/// Read a response body, mapping non-2xx statuses to `HostRejection`.
fn read(outcome: std::result::Result<ureq::Response, ureq::Error>, action: &str) -> Result<String> {
    let response = match outcome {
        Ok(response) => response,
        Err(ureq::Error::Status(status, response)) => {
            return Err(PromoteError::HostRejection {
                action: action.to_string(),
                status,
                body: response.into_string().unwrap_or_default(),
            });
        }
        Err(ureq::Error::Transport(e)) => {
            return Err(PromoteError::Transport(format!("{}: {}", action, e)));
        }
    };

    let status = response.status();
    let body = response
        .into_string()
        .map_err(|e| PromoteError::Transport(format!("{}: failed to read response: {}", action, e)))?;

    if !(200..300).contains(&status) {
        return Err(PromoteError::HostRejection {
            action: action.to_string(),
            status,
            body,
        });
    }
    Ok(body)
}
