//! Error types for the artifact store.

use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur while staging, reading or removing artifacts.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Writing an artifact failed (disk full, permission denied, ...).
    #[error("Failed to write artifact: {path}")]
    WriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Reading an artifact failed for a reason other than absence.
    #[error("Failed to read artifact: {path}")]
    ReadFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Removing an artifact failed for a reason other than absence.
    #[error("Failed to remove artifact: {path}")]
    RemoveFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// An artifact with this name already exists; artifacts are never overwritten.
    #[error("Artifact already exists: {path}")]
    AlreadyExists { path: PathBuf },

    /// The artifact name is not a safe single path component.
    #[error("Invalid artifact name: {0}")]
    InvalidName(String),

    /// Failed to create a storage directory.
    #[error("Failed to create directory: {path}")]
    DirectoryCreationFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl StoreError {
    /// Creates a write failed error.
    pub fn write_failed(path: PathBuf, source: std::io::Error) -> Self {
        Self::WriteFailed { path, source }
    }

    /// Whether this error came from the client's input rather than the disk.
    pub fn is_client_error(&self) -> bool {
        matches!(self, Self::InvalidName(_))
    }
}
