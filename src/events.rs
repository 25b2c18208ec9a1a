//! Run journal.
//!
//! Every externally visible step of a run is recorded as an [`Event`]. The
//! journal keeps the events in memory for the run summary and, when a path
//! is configured, appends each one as a single JSON line (NDJSON) so that
//! repeated runs accumulate an audit trail.
//!
//! # Event Format
//!
//! - `ts`: RFC3339 timestamp
//! - `action`: what happened (`probe_branch`, `create_branch`, `clone`, ...)
//! - `actor`: `user@HOST`
//! - `service`: set for per-service events
//! - `details`: action-specific object

use crate::error::{PromoteError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

/// Actions recorded in the journal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventAction {
    ProbeBranch,
    CreateBranch,
    Clone,
    Fetch,
    SwitchBranch,
    PropagateVersion,
    SyncManifests,
    Commit,
    Push,
    ProbePullRequest,
    OpenPullRequest,
}

impl std::fmt::Display for EventAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            EventAction::ProbeBranch => "probe_branch",
            EventAction::CreateBranch => "create_branch",
            EventAction::Clone => "clone",
            EventAction::Fetch => "fetch",
            EventAction::SwitchBranch => "switch_branch",
            EventAction::PropagateVersion => "propagate_version",
            EventAction::SyncManifests => "sync_manifests",
            EventAction::Commit => "commit",
            EventAction::Push => "push",
            EventAction::ProbePullRequest => "probe_pull_request",
            EventAction::OpenPullRequest => "open_pull_request",
        };
        f.write_str(name)
    }
}

/// One journal record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    pub ts: DateTime<Utc>,
    pub action: EventAction,
    /// `user@HOST` of the process that ran the step.
    pub actor: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service: Option<String>,
    pub details: Value,
}

impl Event {
    /// Create an event stamped with the current time and actor.
    pub fn new(action: EventAction) -> Self {
        Self {
            ts: Utc::now(),
            action,
            actor: get_actor_string(),
            service: None,
            details: Value::Object(serde_json::Map::new()),
        }
    }

    pub fn with_service(mut self, service: impl Into<String>) -> Self {
        self.service = Some(service.into());
        self
    }

    pub fn with_details(mut self, details: Value) -> Self {
        self.details = details;
        self
    }

    /// Serialize the event to a single-line JSON string.
    pub fn to_ndjson_line(&self) -> Result<String> {
        serde_json::to_string(self)
            .map_err(|e| PromoteError::Internal(format!("failed to serialize event to JSON: {}", e)))
    }
}

fn get_actor_string() -> String {
    let user = std::env::var("USER")
        .or_else(|_| std::env::var("USERNAME"))
        .unwrap_or_else(|_| "unknown".to_string());

    let host = hostname::get()
        .map(|h| h.to_string_lossy().to_string())
        .unwrap_or_else(|_| "unknown".to_string());

    format!("{}@{}", user, host)
}

/// Events of one run, optionally mirrored to an NDJSON file.
#[derive(Debug, Default)]
pub struct Journal {
    path: Option<PathBuf>,
    events: Vec<Event>,
}

impl Journal {
    /// In-memory journal.
    pub fn new() -> Self {
        Self::default()
    }

    /// Journal that also appends each event to `path`.
    pub fn with_file(path: impl Into<PathBuf>) -> Self {
        Self {
            path: Some(path.into()),
            events: Vec::new(),
        }
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Record `event`, appending it to the journal file when configured.
    pub fn record(&mut self, event: Event) -> Result<()> {
        tracing::debug!(
            action = %event.action,
            service = event.service.as_deref().unwrap_or("-"),
            details = %event.details,
            "journal"
        );
        if let Some(path) = &self.path {
            append_event(path, &event)?;
        }
        self.events.push(event);
        Ok(())
    }

    /// Actions in recording order.
    pub fn actions(&self) -> Vec<EventAction> {
        self.events.iter().map(|e| e.action).collect()
    }

    pub fn into_events(self) -> Vec<Event> {
        self.events
    }
}

/// Append `event` as one line to `path`, creating the file and its parent.
pub fn append_event(path: &Path, event: &Event) -> Result<()> {
    let json_line = event.to_ndjson_line()?;

    if let Some(dir) = path.parent()
        && !dir.as_os_str().is_empty()
        && !dir.exists()
    {
        fs::create_dir_all(dir).map_err(|e| {
            PromoteError::Io(format!(
                "failed to create journal directory '{}': {}",
                dir.display(),
                e
            ))
        })?;
    }

    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(|e| {
            PromoteError::Io(format!(
                "failed to open journal '{}': {}",
                path.display(),
                e
            ))
        })?;

    writeln!(file, "{}", json_line).map_err(|e| {
        PromoteError::Io(format!(
            "failed to write event to '{}': {}",
            path.display(),
            e
        ))
    })?;

    file.sync_all().map_err(|e| {
        PromoteError::Io(format!(
            "failed to sync journal '{}': {}",
            path.display(),
            e
        ))
    })?;

    Ok(())
}
