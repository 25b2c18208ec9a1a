//! Worktree-relative paths of one service in the GitOps trees.
//!
//! ```text
//! <product>/services/<service>/images/latest/.semver.yaml      version descriptor
//! <product>/services/<service>/manifests/base/main/            trunk manifests
//! <product>/services/<service>/manifests/base/staging/         staging manifests
//! <product>/services/<service>/manifests/base/                 production manifests
//! <product>/.argocd/staging/<service>/config.yaml              staging app descriptor
//! <product>/.argocd/production/<region>/<service>/config.yaml  production app descriptor
//! ```

use crate::error::{PromoteError, Result};
use crate::request::Mode;
use std::path::Path;

/// Paths read and written while promoting one service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceLayout {
    pub service: String,
    /// Version descriptor in the authoritative session.
    pub version: String,
    /// Application descriptor in the destination session.
    pub config: String,
    /// Manifest directory in the authoritative session.
    pub source_manifests: String,
    /// Manifest directory in the destination session.
    pub dest_manifests: String,
}

impl ServiceLayout {
    pub fn new(mode: Mode, product: &str, service: &str, region: &str) -> Self {
        let service_root = format!("{}/services/{}", product, service);
        let (config, source_manifests, dest_manifests) = match mode {
            Mode::Staging => (
                format!("{}/.argocd/staging/{}/config.yaml", product, service),
                format!("{}/manifests/base/main", service_root),
                format!("{}/manifests/base/staging", service_root),
            ),
            Mode::Production => (
                format!(
                    "{}/.argocd/production/{}/{}/config.yaml",
                    product, region, service
                ),
                format!("{}/manifests/base/staging", service_root),
                format!("{}/manifests/base", service_root),
            ),
        };

        Self {
            service: service.to_string(),
            version: format!("{}/images/latest/.semver.yaml", service_root),
            config,
            source_manifests,
            dest_manifests,
        }
    }

    /// Verify that version propagation and manifest sync write disjoint paths.
    ///
    /// In staging mode both sides live in one worktree, so the source
    /// manifest directory must also stay clear of the destination.
    pub fn check_disjoint(&self, mode: Mode) -> Result<()> {
        let dest = Path::new(&self.dest_manifests);
        let config = Path::new(&self.config);

        if config.parent() == Some(dest) {
            return Err(self.overlap(&self.config, &self.dest_manifests));
        }

        if mode == Mode::Staging {
            let source = Path::new(&self.source_manifests);
            if source == dest {
                return Err(self.overlap(&self.source_manifests, &self.dest_manifests));
            }
            if config.parent() == Some(source) {
                return Err(self.overlap(&self.config, &self.source_manifests));
            }
        }

        Ok(())
    }

    fn overlap(&self, a: &str, b: &str) -> PromoteError {
        PromoteError::UserError(format!(
            "service {}: layout paths share a directory ('{}' and '{}'); check the product, service, and production_region",
            self.service, a, b
        ))
    }
}
