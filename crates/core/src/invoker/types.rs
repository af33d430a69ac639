//! Types for the process invoker.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// One run of the transform executable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvocationRequest {
    /// Token passed as the first positional argument.
    pub argument: String,
    pub input_path: PathBuf,
    pub output_path: PathBuf,
}

impl InvocationRequest {
    pub fn new(
        argument: impl Into<String>,
        input_path: impl Into<PathBuf>,
        output_path: impl Into<PathBuf>,
    ) -> Self {
        Self {
            argument: argument.into(),
            input_path: input_path.into(),
            output_path: output_path.into(),
        }
    }
}

/// What happened when the executable ran.
///
/// A non-zero exit is reported here rather than as an error.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvocationOutcome {
    /// Exit code; `None` when the process was killed or ended by a signal.
    pub exit_code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
    pub timed_out: bool,
    pub duration_ms: u64,
}

impl InvocationOutcome {
    /// Exited on its own with status 0.
    pub fn success(&self) -> bool {
        !self.timed_out && self.exit_code == Some(0)
    }

    /// Last `max_chars` characters of stderr, trimmed.
    pub fn stderr_tail(&self, max_chars: usize) -> String {
        let trimmed = self.stderr.trim();
        let count = trimmed.chars().count();
        if count <= max_chars {
            return trimmed.to_string();
        }
        trimmed.chars().skip(count - max_chars).collect()
    }
}
