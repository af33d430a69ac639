//! Types for the job dispatcher.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::identity::ClientId;
use crate::store::{derive_input_name, Artifact};

/// Lifecycle of a job. Transitions only move forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Received,
    Validated,
    Admitted,
    Staged,
    Running,
    Completed,
    Failed,
}

impl JobStatus {
    fn rank(self) -> u8 {
        match self {
            Self::Received => 0,
            Self::Validated => 1,
            Self::Admitted => 2,
            Self::Staged => 3,
            Self::Running => 4,
            Self::Completed | Self::Failed => 5,
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }

    /// Whether `next` is a legal successor of this status.
    ///
    /// `Failed` is reachable from every non-terminal status; `Completed`
    /// only from `Running`.
    pub fn can_transition_to(self, next: JobStatus) -> bool {
        if self.is_terminal() {
            return false;
        }
        match next {
            Self::Failed => true,
            Self::Completed => self == Self::Running,
            _ => next.rank() > self.rank(),
        }
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Received => "received",
            Self::Validated => "validated",
            Self::Admitted => "admitted",
            Self::Staged => "staged",
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Failed => "failed",
        };
        f.write_str(s)
    }
}

/// Rejected status change.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Invalid job transition: {from} -> {to}")]
pub struct TransitionError {
    pub from: JobStatus,
    pub to: JobStatus,
}

/// One submission as it moves through the dispatcher.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    /// Also the input artifact name.
    pub id: String,
    pub transform: String,
    pub input: Option<Artifact>,
    pub output: Option<Artifact>,
    pub status: JobStatus,
    pub exit_code: Option<i32>,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub failure_reason: Option<String>,
}

impl Job {
    /// Creates a job in `Received` with an id derived from the upload name.
    pub fn new(transform: impl Into<String>, original_name: &str) -> Self {
        Self {
            id: derive_input_name(original_name),
            transform: transform.into(),
            input: None,
            output: None,
            status: JobStatus::Received,
            exit_code: None,
            created_at: Utc::now(),
            completed_at: None,
            failure_reason: None,
        }
    }

    /// Moves the job forward.
    pub fn advance(&mut self, next: JobStatus) -> Result<(), TransitionError> {
        if !self.status.can_transition_to(next) {
            return Err(TransitionError {
                from: self.status,
                to: next,
            });
        }
        self.status = next;
        if next.is_terminal() {
            self.completed_at = Some(Utc::now());
        }
        Ok(())
    }

    /// Artifacts staged for this job so far.
    pub fn artifacts(&self) -> impl Iterator<Item = &Artifact> {
        self.input.iter().chain(self.output.iter())
    }

    /// Stamps the expiry on every staged artifact. Only valid once the job is
    /// terminal.
    pub fn expire_artifacts(&mut self, expires_at: DateTime<Utc>) {
        if !self.status.is_terminal() {
            return;
        }
        for artifact in self.input.iter_mut().chain(self.output.iter_mut()) {
            artifact.expires_at = Some(expires_at);
        }
    }

    /// Moves the job to `Failed` with a reason. No-op on a terminal job.
    pub fn fail(&mut self, reason: impl Into<String>) {
        if self.advance(JobStatus::Failed).is_ok() {
            self.failure_reason = Some(reason.into());
        }
    }
}

/// A submission as handed to the dispatcher.
#[derive(Debug, Clone)]
pub struct SubmitRequest {
    pub client_id: ClientId,
    pub transform: String,
    pub image: Vec<u8>,
    pub original_name: String,
}

/// Returned to the client when a job completes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobReceipt {
    pub job_id: String,
    pub transform: String,
    pub input_artifact_name: String,
    pub output_artifact_name: String,
    pub created_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

/// Error payload returned by the HTTP surface.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorBody {
    pub error: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exit_code: Option<i32>,
    /// Truncated stderr of a failed transform process.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stderr_tail: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retry_after_seconds: Option<u64>,
}

impl ErrorBody {
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            details: None,
            exit_code: None,
            stderr_tail: None,
            retry_after_seconds: None,
        }
    }

    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }
}

/// Status of the execution pool.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PoolStatus {
    /// Number of transform processes running.
    pub active_jobs: usize,
    /// Maximum concurrent processes.
    pub max_concurrent: usize,
    /// Submissions waiting for a free slot.
    pub queued_jobs: usize,
    /// Jobs completed since startup.
    pub total_completed: u64,
    /// Jobs failed after reaching the pool since startup.
    pub total_failed: u64,
    /// Submissions turned away because no slot freed up in time.
    pub total_rejected: u64,
}
