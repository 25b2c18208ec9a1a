//! Release requests and their validation.

use crate::error::{PromoteError, Result};
use crate::host::RepoRef;
use regex::Regex;
use std::collections::HashSet;
use std::fmt;
use std::sync::LazyLock;

static NAME_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9][A-Za-z0-9._-]*$").expect("Invalid name regex"));

/// Which environment a request targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// Trunk of the staging tree into its staging environment.
    Staging,
    /// Staging environment of the staging tree into the production tree.
    Production,
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Mode::Staging => f.write_str("staging"),
            Mode::Production => f.write_str("production"),
        }
    }
}

/// One release to promote.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReleaseRequest {
    pub staging_repo: String,
    /// Present (and non-empty) for promotion to production.
    pub production_repo: Option<String>,
    pub project: String,
    /// Working branch, created from trunk when absent.
    pub branch: String,
    /// Top-level directory of the product in both trees.
    pub product: String,
    /// Processed in this order.
    pub services: Vec<String>,
}

impl ReleaseRequest {
    pub fn mode(&self) -> Mode {
        match self.production_repo.as_deref() {
            Some(slug) if !slug.trim().is_empty() => Mode::Production,
            _ => Mode::Staging,
        }
    }

    /// Repository that receives the branch, commits, and pull request.
    pub fn target_repo(&self) -> RepoRef {
        let slug = match self.mode() {
            Mode::Production => self.production_repo.as_deref().unwrap_or_default(),
            Mode::Staging => self.staging_repo.as_str(),
        };
        RepoRef::new(&self.project, slug)
    }

    /// Repository holding the authoritative tree.
    pub fn staging_repo_ref(&self) -> RepoRef {
        RepoRef::new(&self.project, &self.staging_repo)
    }

    /// Reject malformed names before anything touches the host.
    pub fn validate(&self) -> Result<()> {
        check_name("staging repository slug", &self.staging_repo)?;
        if self.mode() == Mode::Production {
            let production = self.production_repo.as_deref().unwrap_or_default();
            check_name("production repository slug", production)?;
            if production == self.staging_repo {
                return Err(invalid(format!(
                    "staging and production repository are both '{}'",
                    production
                )));
            }
        }
        check_name("project", &self.project)?;
        check_name("product", &self.product)?;
        check_branch(&self.branch)?;

        if self.services.is_empty() {
            return Err(invalid("at least one service is required".to_string()));
        }
        let mut seen = HashSet::new();
        for service in &self.services {
            check_name("service", service)?;
            if !seen.insert(service.as_str()) {
                return Err(invalid(format!("service '{}' is listed twice", service)));
            }
        }

        Ok(())
    }
}

fn check_name(what: &str, value: &str) -> Result<()> {
    if NAME_REGEX.is_match(value) {
        Ok(())
    } else {
        Err(invalid(format!(
            "{} '{}' must start with a letter or digit and contain only letters, digits, '.', '_' or '-'",
            what, value
        )))
    }
}

/// Subset of `git check-ref-format` rules for a branch name.
fn check_branch(branch: &str) -> Result<()> {
    let problem = if branch.is_empty() {
        Some("is empty")
    } else if branch.starts_with('-') {
        Some("starts with '-'")
    } else if branch.contains("..") {
        Some("contains '..'")
    } else if branch.contains("@{") {
        Some("contains '@{'")
    } else if branch.ends_with('/') || branch.starts_with('/') || branch.contains("//") {
        Some("has an empty path component")
    } else if branch.ends_with(".lock") || branch.ends_with('.') {
        Some("ends with '.lock' or '.'")
    } else if branch
        .chars()
        .any(|c| c.is_control() || c.is_whitespace() || matches!(c, '~' | '^' | ':' | '?' | '*' | '[' | '\\'))
    {
        Some("contains a space, control character, or one of ~^:?*[\\")
    } else if branch.split('/').any(|part| part.starts_with('.')) {
        Some("has a component starting with '.'")
    } else {
        None
    };

    match problem {
        Some(problem) => Err(invalid(format!("branch name '{}' {}", branch, problem))),
        None => Ok(()),
    }
}

fn invalid(message: String) -> PromoteError {
    PromoteError::UserError(format!("invalid release request: {}", message))
}
