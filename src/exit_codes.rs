//! Exit code constants for the promote CLI.
//!
//! - 0: Success
//! - 1: User error (bad args, config, missing environment)
//! - 2: Host error (rejected request, unexpected probe response)
//! - 3: Git or transport failure
//! - 4: Descriptor error (unreadable or malformed YAML)
//! - 5: Internal error (background task panicked)

/// Successful execution.
pub const SUCCESS: i32 = 0;

/// User error: bad arguments, invalid request, config, or environment.
pub const USER_ERROR: i32 = 1;

/// Host error: non-success status or a response the probe cannot classify.
pub const HOST_FAILURE: i32 = 2;

/// Git operation or transport failure: clone, fetch, checkout, commit, push.
pub const GIT_FAILURE: i32 = 3;

/// Version or application descriptor could not be read, parsed, or written.
pub const DESCRIPTOR_FAILURE: i32 = 4;

/// A background task panicked.
pub const INTERNAL_FAILURE: i32 = 5;
