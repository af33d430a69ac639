//! Mock invoker for testing.

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;

use crate::invoker::{InvocationOutcome, InvocationRequest, Invoker, InvokerError};

/// Mock implementation of the Invoker trait.
///
/// By default it copies the input to the output (or writes a placeholder
/// when the input is missing) and exits 0. Builder methods switch it to
/// failing, timing out, or behaving as if the executable were gone.
#[derive(Debug, Clone)]
pub struct MockInvoker {
    calls: Arc<RwLock<Vec<InvocationRequest>>>,
    exit_code: i32,
    stderr: String,
    write_output: bool,
    timed_out: bool,
    missing_executable: bool,
    delay: Duration,
    timeout: Duration,
}

impl Default for MockInvoker {
    fn default() -> Self {
        Self::new()
    }
}

impl MockInvoker {
    /// Create a new mock invoker that succeeds.
    pub fn new() -> Self {
        Self {
            calls: Arc::new(RwLock::new(Vec::new())),
            exit_code: 0,
            stderr: String::new(),
            write_output: true,
            timed_out: false,
            missing_executable: false,
            delay: Duration::ZERO,
            timeout: Duration::from_secs(30),
        }
    }

    /// Exit with the given code. Non-zero codes write no output.
    pub fn with_exit_code(mut self, code: i32) -> Self {
        self.exit_code = code;
        if code != 0 {
            self.write_output = false;
        }
        self
    }

    pub fn with_stderr(mut self, stderr: impl Into<String>) -> Self {
        self.stderr = stderr.into();
        self
    }

    /// Exit 0 without producing an output file.
    pub fn without_output(mut self) -> Self {
        self.write_output = false;
        self
    }

    /// Report a timeout after the configured delay.
    pub fn timing_out(mut self) -> Self {
        self.timed_out = true;
        self.write_output = false;
        self
    }

    /// Fail every call with `ExecutableNotFound`.
    pub fn with_missing_executable(mut self) -> Self {
        self.missing_executable = true;
        self
    }

    /// Sleep before completing each call.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Get all recorded invocations.
    pub async fn calls(&self) -> Vec<InvocationRequest> {
        self.calls.read().await.clone()
    }

    /// Get the number of invocations.
    pub async fn call_count(&self) -> usize {
        self.calls.read().await.len()
    }
}

#[async_trait]
impl Invoker for MockInvoker {
    fn name(&self) -> &str {
        "mock"
    }

    fn timeout(&self) -> Duration {
        self.timeout
    }

    async fn execute(
        &self,
        request: &InvocationRequest,
    ) -> Result<InvocationOutcome, InvokerError> {
        self.calls.write().await.push(request.clone());

        if self.missing_executable {
            return Err(InvokerError::not_found("/mock/executable"));
        }

        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }

        if self.write_output {
            let bytes = tokio::fs::read(&request.input_path)
                .await
                .unwrap_or_else(|_| b"mock output".to_vec());
            tokio::fs::write(&request.output_path, bytes).await?;
        }

        Ok(InvocationOutcome {
            exit_code: if self.timed_out {
                None
            } else {
                Some(self.exit_code)
            },
            stdout: String::new(),
            stderr: self.stderr.clone(),
            timed_out: self.timed_out,
            duration_ms: self.delay.as_millis() as u64,
        })
    }
}
