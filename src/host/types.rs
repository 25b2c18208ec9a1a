//! Request payloads and identifiers for the host REST API.

use serde::Serialize;
use std::fmt;

/// A repository on the host: `<project>/<slug>`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepoRef {
    pub project: String,
    pub slug: String,
}

impl RepoRef {
    pub fn new(project: impl Into<String>, slug: impl Into<String>) -> Self {
        Self {
            project: project.into(),
            slug: slug.into(),
        }
    }
}

impl fmt::Display for RepoRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.project, self.slug)
    }
}

/// Body of `POST …/branches`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateBranchPayload {
    pub message: String,
    pub name: String,
    pub start_point: String,
}

/// A fully qualified reference in a pull request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RefId {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: String,
}

impl RefId {
    /// `refs/heads/<name>` of type `BRANCH`.
    pub fn branch(name: &str) -> Self {
        Self {
            id: format!("refs/heads/{}", name),
            kind: "BRANCH".to_string(),
        }
    }
}

/// Body of `POST …/pull-requests`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PullRequestPayload {
    pub from_ref: RefId,
    pub to_ref: RefId,
    pub title: String,
    pub description: String,
}

impl PullRequestPayload {
    /// Pull request from `branch` into `trunk`; the title doubles as description.
    pub fn new(branch: &str, trunk: &str, title: String) -> Self {
        Self {
            from_ref: RefId::branch(branch),
            to_ref: RefId::branch(trunk),
            description: title.clone(),
            title,
        }
    }
}
