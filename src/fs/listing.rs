//! Flat directory listing and byte-for-byte copies.

use crate::error::{PromoteError, Result};
use std::fs;
use std::path::Path;

/// Names of the regular files directly inside `dir`, sorted.
///
/// Subdirectories are skipped. A missing directory is an error.
pub fn list_files<P: AsRef<Path>>(dir: P) -> Result<Vec<String>> {
    let dir = dir.as_ref();

    let entries = fs::read_dir(dir).map_err(|e| {
        PromoteError::Io(format!(
            "failed to read directory '{}': {}",
            dir.display(),
            e
        ))
    })?;

    let mut names = Vec::new();
    for entry in entries {
        let entry = entry
            .map_err(|e| PromoteError::Io(format!("failed to read directory entry: {}", e)))?;
        let file_type = entry.file_type().map_err(|e| {
            PromoteError::Io(format!(
                "failed to stat '{}': {}",
                entry.path().display(),
                e
            ))
        })?;
        if file_type.is_file() {
            names.push(entry.file_name().to_string_lossy().to_string());
        }
    }

    names.sort();
    Ok(names)
}

/// Copy `source` over `destination`, truncating any previous content.
pub fn copy_file<P: AsRef<Path>, Q: AsRef<Path>>(source: P, destination: Q) -> Result<u64> {
    let source = source.as_ref();
    let destination = destination.as_ref();

    fs::copy(source, destination).map_err(|e| {
        PromoteError::Io(format!(
            "failed to copy '{}' to '{}': {}",
            source.display(),
            destination.display(),
            e
        ))
    })
}
