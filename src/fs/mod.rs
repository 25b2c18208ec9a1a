//! Filesystem utilities for promote.
//!
//! Atomic replacement of rewritten descriptors and flat directory listing
//! for manifest synchronization.

pub mod atomic;
mod listing;

pub use atomic::{atomic_write, atomic_write_file};
pub use listing::{copy_file, list_files};
