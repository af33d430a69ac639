//! Error types for the process invoker.

use std::path::PathBuf;
use thiserror::Error;

/// Errors that prevent the executable from running at all.
///
/// A process that ran and failed is an [`InvocationOutcome`](super::InvocationOutcome),
/// not an error.
#[derive(Debug, Error)]
pub enum InvokerError {
    /// The executable is absent or not a runnable regular file.
    #[error("Executable not found at path: {path}")]
    ExecutableNotFound { path: PathBuf },

    /// The process could not be started.
    #[error("Failed to spawn executable: {reason}")]
    SpawnFailed { reason: String },

    /// I/O error while supervising the process.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl InvokerError {
    /// Creates an executable not found error.
    pub fn not_found(path: impl Into<PathBuf>) -> Self {
        Self::ExecutableNotFound { path: path.into() }
    }
}
