//! Version and application descriptors.
//!
//! A service's *version descriptor* (`.semver.yaml`) is produced by its build
//! pipeline and only read here. The *application descriptor* (`config.yaml`)
//! is what the deployment tool watches; promotion rewrites its `image_tag`
//! and passes every other key through, unknown keys included.

use crate::error::{PromoteError, Result};
use crate::fs::atomic_write_file;
use serde::{Deserialize, Deserializer, Serialize};
use serde_yaml::{Mapping, Value};
use std::fmt;
use std::path::Path;

/// The descriptor kinds this tool reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DescriptorKind {
    Version,
    Application,
}

impl fmt::Display for DescriptorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DescriptorKind::Version => f.write_str("version descriptor"),
            DescriptorKind::Application => f.write_str("application descriptor"),
        }
    }
}

/// `<product>/services/<service>/images/latest/.semver.yaml`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionDescriptor {
    #[serde(default)]
    pub alpha: u64,
    #[serde(default)]
    pub beta: u64,
    #[serde(default)]
    pub rc: u64,
    #[serde(rename = "commit-hash", deserialize_with = "scalar_string")]
    pub commit_hash: String,
    #[serde(deserialize_with = "scalar_string")]
    pub release: String,
}

impl VersionDescriptor {
    /// `<release>-<commit-hash>`, the tag of the built image.
    pub fn image_tag(&self) -> String {
        format!("{}-{}", self.release, self.commit_hash)
    }
}

/// Environment-specific deployment descriptor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApplicationDescriptor {
    pub app: AppSection,
    #[serde(flatten)]
    pub extra: Mapping,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppSection {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub revision: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_tag: Option<String>,
    #[serde(flatten)]
    pub extra: Mapping,
}

/// Accept YAML strings and plain scalars (`release: 1.2`, `commit-hash: 1234567`).
fn scalar_string<'de, D>(deserializer: D) -> std::result::Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::String(s) => Ok(s),
        Value::Number(n) => Ok(n.to_string()),
        Value::Bool(b) => Ok(b.to_string()),
        other => Err(serde::de::Error::custom(format!(
            "expected a scalar, found {:?}",
            other
        ))),
    }
}

/// Parse version descriptor text. `origin` names the file in errors.
pub fn parse_version_descriptor(text: &str, origin: &str) -> Result<VersionDescriptor> {
    let descriptor: VersionDescriptor = parse(DescriptorKind::Version, text, origin)?;

    if descriptor.release.trim().is_empty() {
        return Err(PromoteError::DescriptorParse(format!(
            "{} '{}' has an empty release",
            DescriptorKind::Version,
            origin
        )));
    }
    if descriptor.commit_hash.trim().is_empty() {
        return Err(PromoteError::DescriptorParse(format!(
            "{} '{}' has an empty commit-hash",
            DescriptorKind::Version,
            origin
        )));
    }

    Ok(descriptor)
}

/// Parse application descriptor text. `origin` names the file in errors.
pub fn parse_application_descriptor(text: &str, origin: &str) -> Result<ApplicationDescriptor> {
    parse(DescriptorKind::Application, text, origin)
}

pub fn read_version_descriptor(path: &Path) -> Result<VersionDescriptor> {
    let text = read(DescriptorKind::Version, path)?;
    parse_version_descriptor(&text, &path.display().to_string())
}

pub fn read_application_descriptor(path: &Path) -> Result<ApplicationDescriptor> {
    let text = read(DescriptorKind::Application, path)?;
    parse_application_descriptor(&text, &path.display().to_string())
}

/// Serialize `descriptor` and atomically replace `path`.
pub fn write_application_descriptor(path: &Path, descriptor: &ApplicationDescriptor) -> Result<()> {
    let yaml = serde_yaml::to_string(descriptor).map_err(|e| {
        PromoteError::DescriptorParse(format!(
            "failed to serialize {} for '{}': {}",
            DescriptorKind::Application,
            path.display(),
            e
        ))
    })?;
    atomic_write_file(path, &yaml)
}

fn read(kind: DescriptorKind, path: &Path) -> Result<String> {
    std::fs::read_to_string(path).map_err(|e| {
        PromoteError::Io(format!("failed to read {} '{}': {}", kind, path.display(), e))
    })
}

fn parse<T: serde::de::DeserializeOwned>(kind: DescriptorKind, text: &str, origin: &str) -> Result<T> {
    serde_yaml::from_str(text)
        .map_err(|e| PromoteError::DescriptorParse(format!("malformed {} '{}': {}", kind, origin, e)))
}
