//! Error types for the Gleaner orchestrator.

use std::io;
use thiserror::Error;

/// Gleaner error type.
///
/// Fatal variants indicate misconfiguration or an unrecoverable compute
/// failure: the process must exit non-zero and a human (or an outer
/// scheduler) has to intervene. Everything else is infrastructure trouble
/// that the relevant call site retries.
#[derive(Error, Debug)]
pub enum GleanerError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Config error: {0}")]
    Config(String),

    #[error("Invalid {role} format: {message}")]
    InvalidFormat { role: &'static str, message: String },

    #[error("Input folder '{folder}' is not a {expected} date")]
    MalformedDateFolder { folder: String, expected: &'static str },

    #[error("Output partition count mismatch: want {expected}, got {actual:?}")]
    PartitionCountMismatch { expected: u64, actual: Vec<String> },

    #[error("Scheduler rejected creation of compute job '{0}'")]
    SchedulerCreateFailed(String),

    #[error("Compute job '{name}' failed: {message}")]
    ComputeJobFailed { name: String, message: String },

    #[error("Compute job '{name}' stayed in unknown state after {attempts} resubmissions")]
    UnknownStatusBudgetExhausted { name: String, attempts: usize },

    #[error("Scheduler error: {0}")]
    Scheduler(String),

    #[error("Metadata store error: {0}")]
    Kv(String),

    #[error("Storage error: {0}")]
    Storage(String),
}

impl GleanerError {
    /// Fatal errors exit the process; retryable ones loop at their call site.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            GleanerError::Config(_)
                | GleanerError::InvalidFormat { .. }
                | GleanerError::MalformedDateFolder { .. }
                | GleanerError::PartitionCountMismatch { .. }
                | GleanerError::SchedulerCreateFailed(_)
                | GleanerError::ComputeJobFailed { .. }
                | GleanerError::UnknownStatusBudgetExhausted { .. }
        )
    }
}

/// Result type alias.
pub type Result<T> = std::result::Result<T, GleanerError>;
