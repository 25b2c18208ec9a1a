//! Classification of branch and pull request probe responses.
//!
//! Both probes hit a paged listing filtered by name. The structural strategy
//! parses the page and looks for an exact match; the response-length strategy
//! compares the raw body length with the length of an empty page.

use crate::config::{ProbeSettings, ProbeStrategy};
use crate::error::{PromoteError, Result};
use serde::Deserialize;
use serde_json::Value;

/// Which listing a probe queried.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProbeKind {
    Branches,
    PullRequests,
}

impl ProbeKind {
    /// REST resource name under `…/repos/<slug>/`.
    pub fn resource(self) -> &'static str {
        match self {
            ProbeKind::Branches => "branches",
            ProbeKind::PullRequests => "pull-requests",
        }
    }

    /// Human-readable name for logs and errors.
    pub fn describe(self) -> &'static str {
        match self {
            ProbeKind::Branches => "branch",
            ProbeKind::PullRequests => "pull request",
        }
    }

    /// Whether one listing entry refers to `branch` exactly.
    fn entry_matches(self, entry: &Value, branch: &str) -> bool {
        let qualified = format!("refs/heads/{}", branch);
        let (display_id, id) = match self {
            ProbeKind::Branches => (entry.pointer("/displayId"), entry.pointer("/id")),
            ProbeKind::PullRequests => (
                entry.pointer("/fromRef/displayId"),
                entry.pointer("/fromRef/id"),
            ),
        };

        display_id.and_then(Value::as_str) == Some(branch)
            || id.and_then(Value::as_str) == Some(qualified.as_str())
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PagedEnvelope {
    size: u64,
    values: Vec<Value>,
    #[serde(default = "default_last_page")]
    is_last_page: bool,
    #[serde(default)]
    next_page_start: Option<u64>,
}

fn default_last_page() -> bool {
    true
}

/// What one listing page says about the probed branch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageVerdict {
    Found,
    Absent,
    /// No match yet; the listing continues at `start`.
    NextPage { start: u64 },
}

/// Classify one listing page for `branch` (or a pull request from it).
pub fn classify(kind: ProbeKind, branch: &str, body: &str, settings: &ProbeSettings) -> Result<PageVerdict> {
    match settings.strategy {
        ProbeStrategy::Structural => classify_structural(kind, branch, body),
        ProbeStrategy::ResponseLength => Ok(if classify_by_length(body, settings.empty_response_len)? {
            PageVerdict::Found
        } else {
            PageVerdict::Absent
        }),
    }
}

/// Exact-match classification over the paged envelope.
///
/// The name filter matches substrings, so the exact entry may sit on a later
/// page; a page that is not the last one without a match yields `NextPage`.
pub fn classify_structural(kind: ProbeKind, branch: &str, body: &str) -> Result<PageVerdict> {
    let page: PagedEnvelope = serde_json::from_str(body).map_err(|e| {
        PromoteError::ProtocolMismatch(format!(
            "{} listing is not a paged response ({}): {}",
            kind.describe(),
            e,
            truncate(body)
        ))
    })?;

    if page.values.iter().any(|entry| kind.entry_matches(entry, branch)) {
        return Ok(PageVerdict::Found);
    }
    if page.is_last_page {
        return Ok(PageVerdict::Absent);
    }

    match page.next_page_start {
        Some(start) => {
            tracing::debug!(kind = kind.describe(), size = page.size, start, "no exact match yet, reading next page");
            Ok(PageVerdict::NextPage { start })
        }
        None => Err(PromoteError::ProtocolMismatch(format!(
            "{} listing has more pages but no nextPageStart: {}",
            kind.describe(),
            truncate(body)
        ))),
    }
}

/// Length comparison with the canonical empty page.
///
/// Equal means empty, longer means at least one match, shorter is a
/// `ProtocolMismatch`. Any entry whose name merely contains `branch` counts
/// as a match.
pub fn classify_by_length(body: &str, empty_len: usize) -> Result<bool> {
    let len = body.len();
    match len.cmp(&empty_len) {
        std::cmp::Ordering::Greater => Ok(true),
        std::cmp::Ordering::Equal => Ok(false),
        std::cmp::Ordering::Less => Err(PromoteError::ProtocolMismatch(format!(
            "response length {} is shorter than an empty page ({})",
            len, empty_len
        ))),
    }
}

fn truncate(body: &str) -> String {
    const LIMIT: usize = 200;
    match body.char_indices().nth(LIMIT) {
        Some((at, _)) => format!("{}…", &body[..at]),
        None => body.to_string(),
    }
}
