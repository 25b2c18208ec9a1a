//! Shallow fetch with bounded depth escalation.
//!
//! Some hosts reject a shallow fetch when a wanted reference is not reachable
//! within the requested depth. Each failed attempt retries with a deeper
//! history until the configured cap; failing at the cap is returned as
//! [`PromoteError::FetchDepthExceeded`].

use crate::config::FetchPolicy;
use crate::error::{PromoteError, Result};

/// Run `attempt` at each depth of `policy` until one succeeds.
///
/// Returns the depth that succeeded. The loop is bounded by
/// `policy.max_depth`; nothing is retried past it.
pub fn escalate_depth<F>(policy: &FetchPolicy, mut attempt: F) -> Result<u32>
where
    F: FnMut(u32) -> Result<()>,
{
    let mut last_error = String::from("no fetch attempted");
    let mut last_depth = policy.initial_depth;

    for depth in policy.depths() {
        last_depth = depth;
        match attempt(depth) {
            Ok(()) => {
                if depth > policy.initial_depth {
                    tracing::info!(depth, "fetch succeeded after increasing depth");
                }
                return Ok(depth);
            }
            Err(e) => {
                tracing::warn!(depth, error = %e, "fetch failed, increasing depth");
                last_error = e.to_string();
            }
        }
    }

    Err(PromoteError::FetchDepthExceeded {
        depth: last_depth,
        last_error,
    })
}
