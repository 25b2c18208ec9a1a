//! Configuration types and defaults for promote.
//!
//! This module defines enums, nested settings, and default value functions
//! used by the Config struct.

use serde::{Deserialize, Serialize};

/// How branch and pull request probe responses are classified.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ProbeStrategy {
    /// Parse the paged JSON envelope and look for an exact name match (default).
    #[default]
    Structural,
    /// Compare the raw body length with the canonical empty-envelope length.
    ///
    /// Kept for hosts whose responses cannot be parsed. Fragile: any change in
    /// the host's serialization of an empty page breaks it.
    ResponseLength,
}

/// Probe classification settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProbeSettings {
    /// Classification strategy.
    pub strategy: ProbeStrategy,

    /// Byte length of the host's empty paged response.
    ///
    /// `{"size":0,"limit":25,"isLastPage":true,"values":[],"start":0}` is 61 bytes.
    pub empty_response_len: usize,
}

impl Default for ProbeSettings {
    fn default() -> Self {
        Self {
            strategy: ProbeStrategy::default(),
            empty_response_len: default_empty_response_len(),
        }
    }
}

/// Shallow fetch settings and the depth escalation window.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FetchPolicy {
    /// Depth used for the initial clone and the first fetch attempt.
    pub initial_depth: u32,

    /// Depth added after each failed fetch attempt.
    pub depth_step: u32,

    /// Last depth attempted before giving up.
    pub max_depth: u32,

    /// Refspec fetched from the remote.
    pub refspec: String,
}

impl Default for FetchPolicy {
    fn default() -> Self {
        Self {
            initial_depth: default_initial_depth(),
            depth_step: default_depth_step(),
            max_depth: default_max_depth(),
            refspec: default_refspec(),
        }
    }
}

impl FetchPolicy {
    /// Every depth the escalation loop will try, in order.
    pub fn depths(&self) -> impl Iterator<Item = u32> + '_ {
        let step = self.depth_step.max(1) as usize;
        (self.initial_depth..=self.max_depth).step_by(step)
    }
}

/// Editor and IDE droppings removed from a worktree before switching branches.
pub fn default_clean_patterns() -> Vec<String> {
    vec!["**/.vscode/**".to_string(), "**/.idea/**".to_string()]
}

// Default value functions for serde
pub(crate) fn default_trunk_branch() -> String {
    "main".to_string()
}
pub(crate) fn default_remote() -> String {
    "origin".to_string()
}
pub(crate) fn default_api_url_env() -> String {
    "PROMOTE_API_URL".to_string()
}
pub(crate) fn default_git_url_env() -> String {
    "PROMOTE_GIT_URL".to_string()
}
pub(crate) fn default_username_env() -> String {
    "TEMPUSER".to_string()
}
pub(crate) fn default_password_env() -> String {
    "BBTOKEN".to_string()
}
pub(crate) fn default_commit_message() -> String {
    "Auto commit version update for release".to_string()
}
pub(crate) fn default_author_name() -> String {
    "promote".to_string()
}
pub(crate) fn default_author_email() -> String {
    "promote@localhost".to_string()
}
pub(crate) fn default_branch_create_message() -> String {
    "Release Branch".to_string()
}
pub(crate) fn default_pull_request_title() -> String {
    "Candidate release to {environment}: {branch}".to_string()
}
pub(crate) fn default_production_region() -> String {
    "r2".to_string()
}
pub(crate) fn default_http_timeout_secs() -> u64 {
    30
}
pub(crate) fn default_git_timeout_secs() -> u64 {
    300
}
fn default_empty_response_len() -> usize {
    61
}
fn default_initial_depth() -> u32 {
    10
}
fn default_depth_step() -> u32 {
    10
}
fn default_max_depth() -> u32 {
    200
}
fn default_refspec() -> String {
    "refs/*:refs/*".to_string()
}
