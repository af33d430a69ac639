//! Invoker that runs a configured executable as a child process.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::{Arc, Mutex};
use std::time::Instant;
use tokio::process::Command;
use tokio::time::{timeout, Duration};
use tracing::{debug, warn};

use super::capture::{drain_into, render, CaptureBuffer, SharedCapture};
use super::error::InvokerError;
use super::traits::Invoker;
use super::types::{InvocationOutcome, InvocationRequest};
use crate::config::ExecutorConfig;

/// How long output readers may keep going after the process is gone.
const DRAIN_GRACE: Duration = Duration::from_millis(500);

/// Runs `<executable> <argument> <input> <output>` without a shell.
#[derive(Debug, Clone)]
pub struct ExternalInvoker {
    executable: PathBuf,
    timeout: Duration,
    output_limit: usize,
}

impl ExternalInvoker {
    /// Resolves the executable once.
    ///
    /// Fails with [`InvokerError::ExecutableNotFound`] when the path does not
    /// name a regular, executable file.
    pub fn new(config: &ExecutorConfig) -> Result<Self, InvokerError> {
        let executable = resolve_executable(&config.executable_path)?;
        Ok(Self {
            executable,
            timeout: Duration::from_secs(config.timeout_secs),
            output_limit: config.output_limit_bytes,
        })
    }

    pub fn executable(&self) -> &Path {
        &self.executable
    }
}

fn resolve_executable(path: &Path) -> Result<PathBuf, InvokerError> {
    let meta = std::fs::metadata(path).map_err(|_| InvokerError::not_found(path))?;
    if !meta.is_file() {
        return Err(InvokerError::not_found(path));
    }

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        if meta.permissions().mode() & 0o111 == 0 {
            return Err(InvokerError::not_found(path));
        }
    }

    Ok(path.to_path_buf())
}

/// Waits for an output reader, abandoning it after a short grace period.
async fn settle(reader: tokio::task::JoinHandle<()>) {
    let abort = reader.abort_handle();
    if timeout(DRAIN_GRACE, reader).await.is_err() {
        abort.abort();
    }
}

#[async_trait]
impl Invoker for ExternalInvoker {
    fn name(&self) -> &str {
        "external"
    }

    fn timeout(&self) -> Duration {
        self.timeout
    }

    async fn execute(
        &self,
        request: &InvocationRequest,
    ) -> Result<InvocationOutcome, InvokerError> {
        let start = Instant::now();

        let mut child = Command::new(&self.executable)
            .arg(&request.argument)
            .arg(&request.input_path)
            .arg(&request.output_path)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                if e.kind() == std::io::ErrorKind::NotFound {
                    InvokerError::not_found(&self.executable)
                } else {
                    InvokerError::SpawnFailed {
                        reason: e.to_string(),
                    }
                }
            })?;

        debug!(
            executable = %self.executable.display(),
            argument = %request.argument,
            pid = ?child.id(),
            "Spawned transform process"
        );

        let stdout_buf: SharedCapture = Arc::new(Mutex::new(CaptureBuffer::new(self.output_limit)));
        let stderr_buf: SharedCapture = Arc::new(Mutex::new(CaptureBuffer::new(self.output_limit)));

        let stdout_reader = child
            .stdout
            .take()
            .map(|out| tokio::spawn(drain_into(out, stdout_buf.clone())));
        let stderr_reader = child
            .stderr
            .take()
            .map(|err| tokio::spawn(drain_into(err, stderr_buf.clone())));

        let waited = timeout(self.timeout, child.wait()).await;
        let (exit_code, timed_out) = match waited {
            Ok(status) => (status?.code(), false),
            Err(_) => {
                warn!(
                    argument = %request.argument,
                    timeout_secs = self.timeout.as_secs(),
                    "Transform process timed out, killing"
                );
                let _ = child.kill().await;
                match tokio::fs::remove_file(&request.output_path).await {
                    Ok(()) => debug!(path = %request.output_path.display(), "Removed partial output"),
                    Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                    Err(e) => warn!(error = %e, "Failed to remove partial output"),
                }
                (None, true)
            }
        };

        if let Some(reader) = stdout_reader {
            settle(reader).await;
        }
        if let Some(reader) = stderr_reader {
            settle(reader).await;
        }

        let outcome = InvocationOutcome {
            exit_code,
            stdout: render(&stdout_buf),
            stderr: render(&stderr_buf),
            timed_out,
            duration_ms: start.elapsed().as_millis() as u64,
        };

        debug!(
            exit_code = ?outcome.exit_code,
            timed_out = outcome.timed_out,
            duration_ms = outcome.duration_ms,
            "Transform process finished"
        );

        Ok(outcome)
    }
}
