//! Errors surfaced to users of the client orchestrator.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Closed set of failures a submission can end in.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ClientError {
    /// The submission was rejected as malformed, locally or by the server.
    #[error("{message}")]
    Validation { message: String },

    /// Submitted too soon after the previous one.
    #[error("Please wait {retry_after_secs} seconds before submitting again")]
    RateLimited { retry_after_secs: u64 },

    /// No network route to the service.
    #[error("You appear to be offline")]
    NetworkOffline,

    /// Every transport strategy failed before getting a response.
    #[error("Upload failed: {message}")]
    Transport { message: String },

    /// No progress within the inactivity budget.
    #[error("The request timed out")]
    Timeout,

    /// The transform ran and failed.
    #[error("Processing failed: {message}")]
    ProcessFailure {
        exit_code: Option<i32>,
        message: String,
    },

    /// Any other error response from the service.
    #[error("Server error ({status}): {message}")]
    Server { status: u16, message: String },

    /// Superseded by a newer submission or cancelled by the caller.
    #[error("Cancelled")]
    Cancelled,
}

impl ClientError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    pub fn transport(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
        }
    }

    /// Whether resubmitting unchanged could succeed.
    pub fn is_retryable(&self) -> bool {
        !matches!(
            self,
            Self::Validation { .. } | Self::RateLimited { .. } | Self::Cancelled
        )
    }
}
