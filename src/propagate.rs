//! Version propagation.
//!
//! The authoritative session's trunk carries each service's version
//! descriptor. Its `release` and `commit-hash` become the `image_tag` of the
//! service's application descriptor in the destination session.

use crate::descriptor::{
    ApplicationDescriptor, VersionDescriptor, read_application_descriptor,
    read_version_descriptor, write_application_descriptor,
};
use crate::error::Result;
use crate::layout::ServiceLayout;
use crate::session::RepositorySession;

/// Outcome of propagating one service's version.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionUpdate {
    pub service: String,
    /// Worktree-relative path of the application descriptor.
    pub config_path: String,
    pub previous_tag: Option<String>,
    pub image_tag: String,
}

impl VersionUpdate {
    pub fn changed(&self) -> bool {
        self.previous_tag.as_deref() != Some(self.image_tag.as_str())
    }
}

/// Switch `authoritative` to `trunk` and read the service's version descriptor.
pub fn read_version(
    authoritative: &RepositorySession,
    layout: &ServiceLayout,
    trunk: &str,
) -> Result<VersionDescriptor> {
    authoritative.switch_branch(trunk)?;
    let version = read_version_descriptor(&authoritative.path(&layout.version))?;

    tracing::debug!(
        repo = authoritative.label(),
        service = %layout.service,
        release = %version.release,
        commit = %version.commit_hash,
        "read version descriptor"
    );
    Ok(version)
}

/// Point `descriptor` at the image built for `version`.
///
/// Returns the previous tag. Nothing but `app.image_tag` changes.
pub fn apply_version(
    descriptor: &mut ApplicationDescriptor,
    version: &VersionDescriptor,
) -> Option<String> {
    descriptor.app.image_tag.replace(version.image_tag())
}

/// Rewrite the service's application descriptor in `destination` and stage it.
///
/// `destination` must already be on the working branch. A descriptor that
/// already carries the tag is left byte-for-byte untouched.
pub fn propagate_version(
    destination: &RepositorySession,
    layout: &ServiceLayout,
    version: &VersionDescriptor,
) -> Result<VersionUpdate> {
    destination.ensure_writable("rewrite application descriptors")?;

    let path = destination.path(&layout.config);
    let mut descriptor = read_application_descriptor(&path)?;
    let previous_tag = apply_version(&mut descriptor, version);

    let update = VersionUpdate {
        service: layout.service.clone(),
        config_path: layout.config.clone(),
        previous_tag,
        image_tag: version.image_tag(),
    };

    if update.changed() {
        write_application_descriptor(&path, &descriptor)?;
        destination.stage(std::slice::from_ref(&layout.config))?;
        tracing::info!(
            repo = destination.label(),
            service = %layout.service,
            from = update.previous_tag.as_deref().unwrap_or("<none>"),
            to = %update.image_tag,
            "updated image tag"
        );
    } else {
        tracing::info!(
            repo = destination.label(),
            service = %layout.service,
            tag = %update.image_tag,
            "image tag already current"
        );
    }

    Ok(update)
}
