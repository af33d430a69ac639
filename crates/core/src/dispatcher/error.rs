//! Error types for the job dispatcher.

use thiserror::Error;

use super::types::ErrorBody;
use crate::store::StoreError;

/// `error` field of a failed-process response.
pub const PROCESSING_FAILED: &str = "Processing failed";
/// `error` field of a timed-out-process response.
pub const PROCESSING_TIMED_OUT: &str = "Processing timed out";

/// Why a submission did not produce a result.
#[derive(Debug, Error)]
pub enum DispatchError {
    /// The request itself is unacceptable; nothing was staged.
    #[error("Validation failed: {0}")]
    Validation(String),

    /// The client submitted again inside its cooldown window.
    #[error("Rate limited, retry after {retry_after_secs} seconds")]
    RateLimited { retry_after_secs: u64 },

    /// The transform executable is missing.
    #[error("Transform executable not found")]
    ExecutableNotFound,

    /// The service is misconfigured.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// The executable ran and failed, or produced no output.
    #[error("Transform process failed: {reason}{}", tail_suffix(.stderr_tail))]
    ProcessFailure {
        exit_code: Option<i32>,
        reason: String,
        stderr_tail: Option<String>,
    },

    /// The executable exceeded its time limit and was killed.
    #[error("Transform process timed out after {timeout_secs} seconds")]
    Timeout { timeout_secs: u64 },

    /// Staging or reading an artifact failed.
    #[error("Storage error: {0}")]
    Storage(#[from] StoreError),

    /// No execution slot became free in time.
    #[error("Server is busy, try again later")]
    Overloaded,
}

impl DispatchError {
    /// Creates a validation error.
    pub fn validation(reason: impl Into<String>) -> Self {
        Self::Validation(reason.into())
    }

    /// Label used for the `result` metric dimension.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Validation(_) => "validation",
            Self::RateLimited { .. } => "rate_limited",
            Self::ExecutableNotFound => "executable_not_found",
            Self::Configuration(_) => "configuration",
            Self::ProcessFailure { .. } => "process_failure",
            Self::Timeout { .. } => "timeout",
            Self::Storage(_) => "storage",
            Self::Overloaded => "overloaded",
        }
    }

    /// Short title for the `error` field of a response.
    pub fn title(&self) -> &'static str {
        match self {
            Self::Validation(_) => "Invalid request",
            Self::RateLimited { .. } => "Too many requests",
            Self::ExecutableNotFound => "Transform executable unavailable",
            Self::Configuration(_) => "Server misconfigured",
            Self::ProcessFailure { .. } => PROCESSING_FAILED,
            Self::Timeout { .. } => PROCESSING_TIMED_OUT,
            Self::Storage(_) => "Storage failure",
            Self::Overloaded => "Server busy",
        }
    }

    /// Response body for this error. Filesystem paths stay in the logs; the
    /// stderr tail is reported with staged paths already rewritten.
    pub fn to_body(&self) -> ErrorBody {
        let body = ErrorBody::new(self.title());
        match self {
            Self::Validation(reason) => body.with_details(reason.clone()),
            Self::RateLimited { retry_after_secs } => ErrorBody {
                retry_after_seconds: Some(*retry_after_secs),
                ..body.with_details(self.to_string())
            },
            Self::ProcessFailure {
                exit_code,
                reason,
                stderr_tail,
            } => ErrorBody {
                exit_code: *exit_code,
                stderr_tail: stderr_tail.clone(),
                ..body.with_details(reason.clone())
            },
            Self::Timeout { .. } | Self::Overloaded => body.with_details(self.to_string()),
            Self::ExecutableNotFound | Self::Configuration(_) | Self::Storage(_) => body,
        }
    }

    /// Exit code of the failed process, when there was one.
    pub fn exit_code(&self) -> Option<i32> {
        match self {
            Self::ProcessFailure { exit_code, .. } => *exit_code,
            _ => None,
        }
    }
}

fn tail_suffix(tail: &Option<String>) -> String {
    match tail {
        Some(tail) => format!(" ({})", tail.trim_end()),
        None => String::new(),
    }
}
