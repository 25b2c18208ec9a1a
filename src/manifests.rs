//! Manifest synchronization.
//!
//! The destination manifest directory of a service is replaced wholesale by
//! the authoritative one: every destination file is deleted, then every
//! authoritative file is copied. Only regular files directly inside the
//! directories take part; subdirectories are left alone.

use crate::error::{PromoteError, Result};
use crate::fs::{copy_file, list_files};
use crate::layout::ServiceLayout;
use crate::session::RepositorySession;

/// What one synchronization did, as worktree-relative paths.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncSummary {
    pub removed: Vec<String>,
    pub copied: Vec<String>,
}

/// Mirror the service's authoritative manifests into `destination`.
///
/// `authoritative` and `destination` may be the same session.
pub fn sync_manifests(
    authoritative: &RepositorySession,
    destination: &RepositorySession,
    layout: &ServiceLayout,
) -> Result<SyncSummary> {
    destination.ensure_writable("synchronize manifests")?;

    let source_dir = authoritative.path(&layout.source_manifests);
    let dest_dir = destination.path(&layout.dest_manifests);

    let sources = list_files(&source_dir)?;

    let existing = if dest_dir.is_dir() {
        list_files(&dest_dir)?
    } else {
        tracing::debug!(path = %layout.dest_manifests, "creating manifest directory");
        std::fs::create_dir_all(&dest_dir).map_err(|e| {
            PromoteError::Io(format!(
                "failed to create '{}': {}",
                dest_dir.display(),
                e
            ))
        })?;
        Vec::new()
    };

    let mut summary = SyncSummary::default();

    for name in &existing {
        let path = dest_dir.join(name);
        std::fs::remove_file(&path).map_err(|e| {
            PromoteError::Io(format!("failed to remove '{}': {}", path.display(), e))
        })?;
        summary.removed.push(join(&layout.dest_manifests, name));
    }
    destination.stage_removals(&summary.removed)?;

    for name in &sources {
        copy_file(source_dir.join(name), dest_dir.join(name))?;
        summary.copied.push(join(&layout.dest_manifests, name));
    }
    destination.stage(&summary.copied)?;

    tracing::info!(
        repo = destination.label(),
        service = %layout.service,
        from = %layout.source_manifests,
        removed = summary.removed.len(),
        copied = summary.copied.len(),
        "synchronized manifests"
    );

    Ok(summary)
}

fn join(dir: &str, name: &str) -> String {
    format!("{}/{}", dir.trim_end_matches('/'), name)
}
