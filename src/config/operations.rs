//! Config loading, validation, and utility operations.

use super::model::Config;
use crate::error::{PromoteError, Result};
use globset::{Glob, GlobSet, GlobSetBuilder};
use std::path::Path;
use std::time::Duration;

/// Config file picked up from the working directory when `--config` is absent.
pub const DEFAULT_CONFIG_FILE: &str = "promote.yaml";

impl Config {
    /// Load config from a YAML file.
    ///
    /// Unknown fields in the YAML are silently ignored for forward compatibility.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        let content = std::fs::read_to_string(path).map_err(|e| {
            PromoteError::UserError(format!(
                "failed to read config file '{}': {}",
                path.display(),
                e
            ))
        })?;

        Self::from_yaml(&content)
    }

    /// Load the explicit config file, or `promote.yaml` in `cwd` if present,
    /// or fall back to defaults.
    pub fn discover(explicit: Option<&Path>, cwd: &Path) -> Result<Self> {
        if let Some(path) = explicit {
            return Self::load(path);
        }

        let candidate = cwd.join(DEFAULT_CONFIG_FILE);
        if candidate.is_file() {
            tracing::debug!(path = %candidate.display(), "loading config");
            Self::load(candidate)
        } else {
            Ok(Self::default())
        }
    }

    /// Parse config from a YAML string.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        // An empty document deserializes to unit, not a map.
        let config: Config = if yaml.trim().is_empty() {
            Config::default()
        } else {
            serde_yaml::from_str(yaml).map_err(|e| {
                PromoteError::UserError(format!("failed to parse config YAML: {}", e))
            })?
        };

        config.validate()?;
        Ok(config)
    }

    /// Validate config values and return error on invalid values.
    ///
    /// Validation rules:
    /// - fetch depths and step must be positive, with `initial_depth <= max_depth`
    /// - `depth_step` must land exactly on `max_depth`
    /// - timeouts must be positive
    /// - `clean_patterns` must be valid globs
    /// - `pull_request_title` must mention `{branch}`
    /// - `commit_message` must be non-empty
    pub fn validate(&self) -> Result<()> {
        let fetch = &self.fetch;
        if fetch.initial_depth == 0 || fetch.depth_step == 0 {
            return Err(invalid("fetch.initial_depth and fetch.depth_step must be greater than 0"));
        }
        if fetch.initial_depth > fetch.max_depth {
            return Err(invalid(&format!(
                "fetch.initial_depth ({}) must not exceed fetch.max_depth ({})",
                fetch.initial_depth, fetch.max_depth
            )));
        }
        if (fetch.max_depth - fetch.initial_depth) % fetch.depth_step != 0 {
            return Err(invalid(&format!(
                "fetch.depth_step ({}) must step from {} exactly onto max_depth {}",
                fetch.depth_step, fetch.initial_depth, fetch.max_depth
            )));
        }
        if fetch.refspec.trim().is_empty() {
            return Err(invalid("fetch.refspec must be non-empty"));
        }

        if self.git_timeout_secs == 0 || self.http_timeout_secs == 0 {
            return Err(invalid("git_timeout_secs and http_timeout_secs must be greater than 0"));
        }

        if self.trunk_branch.trim().is_empty() || self.remote.trim().is_empty() {
            return Err(invalid("trunk_branch and remote must be non-empty"));
        }

        if self.commit_message.trim().is_empty() {
            return Err(invalid("commit_message must be non-empty"));
        }

        if !self.pull_request_title.contains("{branch}") {
            return Err(invalid("pull_request_title must contain the {branch} placeholder"));
        }

        if self.probe.empty_response_len == 0 {
            return Err(invalid("probe.empty_response_len must be greater than 0"));
        }

        self.clean_globset()?;

        Ok(())
    }

    /// Compile `clean_patterns` into a glob set.
    pub fn clean_globset(&self) -> Result<GlobSet> {
        let mut builder = GlobSetBuilder::new();

        for pattern in &self.clean_patterns {
            let normalized = pattern.trim().replace('\\', "/");
            if normalized.is_empty() {
                continue;
            }
            let glob = Glob::new(&normalized).map_err(|e| {
                invalid(&format!("invalid clean pattern '{}': {}", pattern, e))
            })?;
            builder.add(glob);
        }

        builder
            .build()
            .map_err(|e| invalid(&format!("invalid clean patterns: {}", e)))
    }

    /// Render the pull request title for an environment and branch.
    pub fn render_pull_request_title(&self, environment: &str, branch: &str) -> String {
        self.pull_request_title
            .replace("{environment}", environment)
            .replace("{branch}", branch)
    }

    pub fn git_timeout(&self) -> Duration {
        Duration::from_secs(self.git_timeout_secs)
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs)
    }
}

fn invalid(message: &str) -> PromoteError {
    PromoteError::UserError(format!("config validation failed: {}", message))
}
