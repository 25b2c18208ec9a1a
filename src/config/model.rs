//! Config struct definition and default implementation.

use super::types::*;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Configuration for a promote run.
///
/// This struct represents the contents of `promote.yaml`.
/// Unknown fields in the YAML are ignored for forward compatibility.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    // =========================================================================
    // Git settings
    // =========================================================================
    /// Branch holding authoritative version data and receiving pull requests.
    #[serde(default = "default_trunk_branch")]
    pub trunk_branch: String,

    /// Name of the remote in every clone (default: "origin").
    #[serde(default = "default_remote")]
    pub remote: String,

    /// Shallow fetch depth window.
    #[serde(default)]
    pub fetch: FetchPolicy,

    /// Message used for every per-service commit.
    #[serde(default = "default_commit_message")]
    pub commit_message: String,

    /// Commit author name set in each clone.
    #[serde(default = "default_author_name")]
    pub author_name: String,

    /// Commit author email set in each clone.
    #[serde(default = "default_author_email")]
    pub author_email: String,

    /// Glob patterns of worktree paths removed before each trunk read.
    #[serde(default = "default_clean_patterns")]
    pub clean_patterns: Vec<String>,

    /// Seconds before a git subprocess is killed.
    #[serde(default = "default_git_timeout_secs")]
    pub git_timeout_secs: u64,

    // =========================================================================
    // Host settings
    // =========================================================================
    /// REST API base URL, e.g. `https://git.example.com/rest/api/1.0`.
    /// When unset, read from the variable named by `api_url_env`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_base_url: Option<String>,

    /// Git base URL, clone URLs are `<git_base_url>/<project>/<slug>.git`.
    /// When unset, read from the variable named by `git_url_env`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub git_base_url: Option<String>,

    #[serde(default = "default_api_url_env")]
    pub api_url_env: String,

    #[serde(default = "default_git_url_env")]
    pub git_url_env: String,

    /// Environment variable holding the Basic-Auth username.
    #[serde(default = "default_username_env")]
    pub username_env: String,

    /// Environment variable holding the Basic-Auth password or token.
    #[serde(default = "default_password_env")]
    pub password_env: String,

    /// Message sent with branch creation requests.
    #[serde(default = "default_branch_create_message")]
    pub branch_create_message: String,

    /// Pull request title and description template.
    /// Supports `{environment}` and `{branch}` placeholders.
    #[serde(default = "default_pull_request_title")]
    pub pull_request_title: String,

    /// Existence probe settings.
    #[serde(default)]
    pub probe: ProbeSettings,

    /// Seconds before an HTTP request is abandoned.
    #[serde(default = "default_http_timeout_secs")]
    pub http_timeout_secs: u64,

    // =========================================================================
    // Layout settings
    // =========================================================================
    /// Region segment of production config paths
    /// (`<product>/.argocd/production/<region>/<service>/config.yaml`).
    #[serde(default = "default_production_region")]
    pub production_region: String,

    // =========================================================================
    // Journal settings
    // =========================================================================
    /// NDJSON file that run events are appended to (disabled when unset).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub journal_path: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            trunk_branch: default_trunk_branch(),
            remote: default_remote(),
            fetch: FetchPolicy::default(),
            commit_message: default_commit_message(),
            author_name: default_author_name(),
            author_email: default_author_email(),
            clean_patterns: default_clean_patterns(),
            git_timeout_secs: default_git_timeout_secs(),
            api_base_url: None,
            git_base_url: None,
            api_url_env: default_api_url_env(),
            git_url_env: default_git_url_env(),
            username_env: default_username_env(),
            password_env: default_password_env(),
            branch_create_message: default_branch_create_message(),
            pull_request_title: default_pull_request_title(),
            probe: ProbeSettings::default(),
            http_timeout_secs: default_http_timeout_secs(),
            production_region: default_production_region(),
            journal_path: None,
        }
    }
}
