//! Credential and endpoint resolution.
//!
//! Basic-Auth material and host base URLs come from the process environment
//! (variable names are configurable). Resolution happens once at startup and
//! the resolved values are passed down explicitly.

use crate::config::Config;
use crate::error::{PromoteError, Result};
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use std::fmt;

/// Basic-Auth credentials for the host and its git remotes.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub username: String,
    password: String,
}

impl Credentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }

    /// `base64(user:pass)` as sent after `Basic `.
    pub fn basic_token(&self) -> String {
        STANDARD.encode(format!("{}:{}", self.username, self.password))
    }

    /// Full `Authorization` header value.
    pub fn authorization_header(&self) -> String {
        format!("Basic {}", self.basic_token())
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Base URLs of the host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoints {
    /// REST API root, e.g. `https://git.example.com/rest/api/1.0`.
    pub api_base_url: String,
    /// Git root, e.g. `https://git.example.com/scm`.
    pub git_base_url: String,
}

impl Endpoints {
    pub fn new(api_base_url: impl Into<String>, git_base_url: impl Into<String>) -> Self {
        Self {
            api_base_url: trim_base(api_base_url.into()),
            git_base_url: trim_base(git_base_url.into()),
        }
    }

    /// Clone URL of a repository.
    pub fn clone_url(&self, project: &str, slug: &str) -> String {
        format!("{}/{}/{}.git", self.git_base_url, project, slug)
    }

    /// REST URL of a repository resource (`branches`, `pull-requests`).
    pub fn repo_api_url(&self, project: &str, slug: &str, resource: &str) -> String {
        format!(
            "{}/projects/{}/repos/{}/{}",
            self.api_base_url, project, slug, resource
        )
    }
}

/// Everything resolved from the environment at startup.
#[derive(Debug, Clone)]
pub struct ResolvedAccess {
    pub credentials: Credentials,
    pub endpoints: Endpoints,
}

impl ResolvedAccess {
    /// Resolve from the process environment.
    pub fn from_env(config: &Config) -> Result<Self> {
        Self::resolve_with(config, |name| std::env::var(name).ok())
    }

    /// Resolve using `lookup` for variable values.
    ///
    /// Config-file base URLs take precedence over their variables. Empty
    /// values count as missing.
    pub fn resolve_with<F>(config: &Config, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let missing = |name: &str, what: &str| {
            PromoteError::UserError(format!(
                "{} is not set.\n\nExport {} before running promote.",
                what, name
            ))
        };
        let require = |name: &str, what: &str| -> Result<String> {
            lookup(name)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
                .ok_or_else(|| missing(name, what))
        };

        let username = require(&config.username_env, "host username")?;
        // The secret is passed through verbatim.
        let password = lookup(&config.password_env)
            .filter(|v| !v.trim().is_empty())
            .ok_or_else(|| missing(&config.password_env, "host password"))?;

        let api_base_url = match config.api_base_url.as_deref() {
            Some(url) if !url.trim().is_empty() => url.to_string(),
            _ => require(&config.api_url_env, "API base URL")?,
        };
        let git_base_url = match config.git_base_url.as_deref() {
            Some(url) if !url.trim().is_empty() => url.to_string(),
            _ => require(&config.git_url_env, "git base URL")?,
        };

        tracing::debug!(
            username = %username,
            api = %api_base_url,
            git = %git_base_url,
            "resolved host access"
        );

        Ok(Self {
            credentials: Credentials::new(username, password),
            endpoints: Endpoints::new(api_base_url, git_base_url),
        })
    }
}

fn trim_base(url: String) -> String {
    url.trim().trim_end_matches('/').to_string()
}
