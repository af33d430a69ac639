use serde::{Deserialize, Serialize};
use std::fmt;

use super::error::ClientError;

/// Where a submission currently is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubmissionState {
    #[default]
    Idle,
    Preparing,
    Uploading,
    AwaitingResult,
    PollingForVisibility,
    Complete,
    Error,
}

impl SubmissionState {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Complete | Self::Error)
    }
}

impl fmt::Display for SubmissionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Idle => "idle",
            Self::Preparing => "preparing",
            Self::Uploading => "uploading",
            Self::AwaitingResult => "awaiting_result",
            Self::PollingForVisibility => "polling_for_visibility",
            Self::Complete => "complete",
            Self::Error => "error",
        };
        f.write_str(s)
    }
}

/// Snapshot published to observers.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ClientStatus {
    pub state: SubmissionState,
    /// Projected completion, 0..=100.
    pub percent: u8,
    pub error: Option<ClientError>,
}

impl ClientStatus {
    pub fn new(state: SubmissionState, percent: u8) -> Self {
        Self {
            state,
            percent,
            error: None,
        }
    }

    pub fn failed(error: ClientError, percent: u8) -> Self {
        Self {
            state: SubmissionState::Error,
            percent,
            error: Some(error),
        }
    }
}
