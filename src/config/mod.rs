//! Configuration model for promote.
//!
//! This module defines the Config struct that represents `promote.yaml`.
//! It supports forward-compatible YAML parsing (unknown fields are ignored),
//! defaults for every field, and validation of config values.

mod model;
mod operations;
pub mod types;


// Re-export public API
pub use model::Config;
pub use types::{FetchPolicy, ProbeSettings, ProbeStrategy};
