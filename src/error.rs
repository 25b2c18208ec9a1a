//! Error types for the promote CLI.
//!
//! Uses thiserror for derive macros. Leaf operations return these as values;
//! only `main` turns them into a process exit code.

use crate::coordinator::Stage;
use crate::exit_codes;
use thiserror::Error;

/// Main error type for promote operations.
#[derive(Error, Debug)]
pub enum PromoteError {
    /// Invalid request, configuration, or environment.
    #[error("{0}")]
    UserError(String),

    /// Clone, fetch, push, or HTTP transport failure.
    #[error("transport failure: {0}")]
    Transport(String),

    /// A probe response matched neither the empty nor the non-empty shape.
    #[error("unexpected response from host: {0}")]
    ProtocolMismatch(String),

    /// The host answered with a non-success status.
    #[error("host rejected {action} (status {status}): {body}")]
    HostRejection {
        action: String,
        status: u16,
        body: String,
    },

    /// A version or application descriptor could not be parsed or written.
    #[error("descriptor error: {0}")]
    DescriptorParse(String),

    /// Fetch depth escalation reached its cap without a successful fetch.
    #[error("fetch failed at depth {depth}, which is the limit: {last_error}")]
    FetchDepthExceeded { depth: u32, last_error: String },

    /// Local git operation failed.
    #[error("git operation failed: {0}")]
    Git(String),

    /// Filesystem failure inside a working tree.
    #[error("I/O error: {0}")]
    Io(String),

    /// A background task panicked.
    #[error("internal error: {0}")]
    Internal(String),

    /// Failure annotated with the coordinator stage it happened in.
    #[error("{stage} failed: {source}")]
    Stage {
        stage: Stage,
        #[source]
        source: Box<PromoteError>,
    },
}

impl PromoteError {
    /// Returns the appropriate exit code for this error type.
    pub fn exit_code(&self) -> i32 {
        match self {
            PromoteError::UserError(_) => exit_codes::USER_ERROR,
            PromoteError::ProtocolMismatch(_) | PromoteError::HostRejection { .. } => {
                exit_codes::HOST_FAILURE
            }
            PromoteError::Transport(_)
            | PromoteError::FetchDepthExceeded { .. }
            | PromoteError::Git(_)
            | PromoteError::Io(_) => exit_codes::GIT_FAILURE,
            PromoteError::DescriptorParse(_) => exit_codes::DESCRIPTOR_FAILURE,
            PromoteError::Internal(_) => exit_codes::INTERNAL_FAILURE,
            PromoteError::Stage { source, .. } => source.exit_code(),
        }
    }

    /// Annotate this error with the stage it occurred in.
    ///
    /// Already-annotated errors keep their original (innermost) stage.
    pub fn at_stage(self, stage: Stage) -> Self {
        match self {
            PromoteError::Stage { .. } => self,
            other => PromoteError::Stage {
                stage,
                source: Box::new(other),
            },
        }
    }

    /// The error without any stage annotation.
    pub fn root(&self) -> &PromoteError {
        match self {
            PromoteError::Stage { source, .. } => source.root(),
            other => other,
        }
    }
}

/// Result type alias for promote operations.
pub type Result<T> = std::result::Result<T, PromoteError>;
