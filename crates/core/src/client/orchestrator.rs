//! Client-side submission driver.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::time::{sleep, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::config::ClientConfig;
use super::connectivity::{ConnectivityProbe, ResolverProbe};
use super::error::ClientError;
use super::normalize::{normalize, NormalizeOptions};
use super::pacing::LocalPacer;
use super::progress::{ProgressProjection, COMPLETE, PROCESSING_ESTIMATE};
use super::retry::retry;
use super::state::{ClientStatus, SubmissionState};
use super::transport::{
    BufferedTransport, HttpResultProbe, ResultProbe, StreamingTransport, Transport,
    TransportError, TransportResponse, UploadRequest,
};
use crate::dispatcher::{ErrorBody, JobReceipt, PROCESSING_FAILED, PROCESSING_TIMED_OUT};

/// Image chosen by the user.
#[derive(Debug, Clone)]
pub struct Submission {
    /// Selected transform; `None` means nothing was picked yet.
    pub transform: Option<String>,
    pub file_name: String,
    pub bytes: Vec<u8>,
}

impl Submission {
    pub fn new(transform: impl Into<String>, file_name: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            transform: Some(transform.into()),
            file_name: file_name.into(),
            bytes,
        }
    }
}

/// Finished submission.
#[derive(Debug, Clone)]
pub struct SubmissionResult {
    pub receipt: JobReceipt,
    /// Absolute URL of the output artifact.
    pub output_url: String,
    /// Whether the output answered the existence probe before we gave up.
    pub visible: bool,
    /// Transport that delivered the upload.
    pub transport: String,
}

/// Drives one submission at a time from selection to a visible result.
pub struct Orchestrator {
    config: ClientConfig,
    transports: Vec<Arc<dyn Transport>>,
    probe: Arc<dyn ResultProbe>,
    connectivity: Arc<dyn ConnectivityProbe>,
    pacer: LocalPacer,
    status_tx: watch::Sender<ClientStatus>,
    current: Mutex<Option<(u64, CancellationToken)>>,
    generation: AtomicU64,
}

impl Orchestrator {
    pub fn new(
        config: ClientConfig,
        transports: Vec<Arc<dyn Transport>>,
        probe: Arc<dyn ResultProbe>,
        connectivity: Arc<dyn ConnectivityProbe>,
    ) -> Self {
        let (status_tx, _) = watch::channel(ClientStatus::default());
        let pacer = LocalPacer::new(Duration::from_secs(config.pacing_window_secs));
        Self {
            config,
            transports,
            probe,
            connectivity,
            pacer,
            status_tx,
            current: Mutex::new(None),
            generation: AtomicU64::new(0),
        }
    }

    /// Orchestrator talking HTTP to `config.base_url` with the standard
    /// transport chain: streaming with credentials, streaming without, then
    /// the buffered path-form upload.
    pub fn http(config: ClientConfig) -> Result<Self, ClientError> {
        let base = config.base_url.clone();
        let chunk = config.upload_chunk_bytes;
        let to_client_error = |e: TransportError| ClientError::transport(e.to_string());

        let transports: Vec<Arc<dyn Transport>> = vec![
            Arc::new(
                StreamingTransport::new(&base, true, config.client_id.clone(), chunk)
                    .map_err(to_client_error)?,
            ),
            Arc::new(StreamingTransport::new(&base, false, None, chunk).map_err(to_client_error)?),
            Arc::new(BufferedTransport::new(&base).map_err(to_client_error)?),
        ];
        let probe = Arc::new(HttpResultProbe::new(&base).map_err(to_client_error)?);
        let timeout = Duration::from_secs(config.connectivity_timeout_secs);
        let connectivity = ResolverProbe::for_url(&base, timeout)
            .ok_or_else(|| ClientError::validation(format!("invalid base URL: {base}")))?;

        Ok(Self::new(config, transports, probe, Arc::new(connectivity)))
    }

    /// Observe state and progress.
    pub fn subscribe(&self) -> watch::Receiver<ClientStatus> {
        self.status_tx.subscribe()
    }

    /// Latest published status.
    pub fn status(&self) -> ClientStatus {
        self.status_tx.borrow().clone()
    }

    pub fn pacer(&self) -> &LocalPacer {
        &self.pacer
    }

    /// Cancels the in-flight submission, if any.
    pub fn cancel(&self) {
        if let Ok(mut current) = self.current.lock() {
            if let Some((_, token)) = current.take() {
                token.cancel();
                self.status_tx.send_replace(ClientStatus::default());
            }
        }
    }

    /// Runs a submission to completion.
    ///
    /// Starting a new submission cancels the previous one, which then
    /// resolves to [`ClientError::Cancelled`].
    pub async fn submit(&self, submission: Submission) -> Result<SubmissionResult, ClientError> {
        let token = CancellationToken::new();
        let generation = self.generation.fetch_add(1, Ordering::Relaxed) + 1;
        if let Ok(mut current) = self.current.lock() {
            if let Some((_, previous)) = current.replace((generation, token.clone())) {
                previous.cancel();
            }
        }

        let mut projection = ProgressProjection::new();
        let result = self.run(submission, &token, &mut projection).await;

        match &result {
            Ok(_) => self.publish(&token, ClientStatus::new(SubmissionState::Complete, COMPLETE)),
            Err(e) => self.publish(&token, ClientStatus::failed(e.clone(), projection.current())),
        }
        if let Ok(mut current) = self.current.lock() {
            if current.as_ref().is_some_and(|(g, _)| *g == generation) {
                current.take();
            }
        }

        match result {
            Err(_) if token.is_cancelled() => Err(ClientError::Cancelled),
            other => other,
        }
    }

    async fn run(
        &self,
        submission: Submission,
        token: &CancellationToken,
        projection: &mut ProgressProjection,
    ) -> Result<SubmissionResult, ClientError> {
        self.publish(token, ClientStatus::new(SubmissionState::Preparing, 0));

        let transform = submission
            .transform
            .as_deref()
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .ok_or_else(|| ClientError::validation("Select a transform first"))?
            .to_string();
        if submission.bytes.is_empty() {
            return Err(ClientError::validation("Select an image first"));
        }

        if !self.connectivity.is_online().await {
            return Err(ClientError::NetworkOffline);
        }

        if let Some(retry_after_secs) = self.pacer.check() {
            return Err(ClientError::RateLimited { retry_after_secs });
        }

        let options = NormalizeOptions {
            threshold_bytes: self.config.normalize_threshold_bytes,
            max_dimension: self.config.max_dimension,
            jpeg_quality: self.config.jpeg_quality,
        };
        let file_name = submission.file_name;
        let bytes = submission.bytes;
        let payload = if bytes.len() > options.threshold_bytes {
            let name = file_name.clone();
            tokio::task::spawn_blocking(move || normalize(bytes, &name, &options))
                .await
                .map_err(|e| ClientError::transport(format!("normalization aborted: {e}")))?
        } else {
            normalize(bytes, &file_name, &options)
        };

        let request = UploadRequest {
            transform,
            file_name: payload.file_name,
            content_type: payload.content_type,
            bytes: Arc::new(payload.bytes),
        };

        self.publish(token, ClientStatus::new(SubmissionState::Uploading, 0));
        let (response, transport) = self.upload(&request, token, projection).await?;

        let receipt = self.interpret(response)?;

        let output_path = format!("results/{}", receipt.output_artifact_name);
        self.publish(
            token,
            ClientStatus::new(SubmissionState::PollingForVisibility, projection.current()),
        );
        let visible = tokio::select! {
            _ = token.cancelled() => return Err(ClientError::Cancelled),
            visible = self.wait_visible(&output_path) => visible,
        };

        info!(
            job_id = %receipt.job_id,
            transport = %transport,
            visible,
            "Submission complete"
        );

        Ok(SubmissionResult {
            output_url: self.config.url(&output_path),
            receipt,
            visible,
            transport,
        })
    }

    /// Walks the transport chain under one inactivity budget.
    async fn upload(
        &self,
        request: &UploadRequest,
        token: &CancellationToken,
        projection: &mut ProgressProjection,
    ) -> Result<(TransportResponse, String), ClientError> {
        let inactivity = self.config.inactivity_timeout();
        let deadline = sleep(inactivity);
        tokio::pin!(deadline);

        let mut last_error = None;
        for transport in &self.transports {
            let (progress_tx, mut progress_rx) = mpsc::unbounded_channel();
            let send = transport.send(request, progress_tx);
            tokio::pin!(send);

            let outcome = loop {
                tokio::select! {
                    biased;
                    _ = token.cancelled() => return Err(ClientError::Cancelled),
                    result = &mut send => break result,
                    Some(progress) = progress_rx.recv() => {
                        deadline.as_mut().reset(Instant::now() + inactivity);
                        // A fully sent body can still fail, so stay in Uploading
                        // until a response arrives.
                        self.publish(
                            token,
                            ClientStatus::new(SubmissionState::Uploading, projection.on_upload(progress)),
                        );
                    }
                    _ = &mut deadline => {
                        warn!(transport = transport.name(), "Upload inactive too long");
                        return Err(ClientError::Timeout);
                    }
                }
            };

            match outcome {
                Ok(response) => {
                    debug!(transport = transport.name(), status = response.status, "Got response");
                    self.publish(
                        token,
                        ClientStatus::new(
                            SubmissionState::AwaitingResult,
                            projection.advance(PROCESSING_ESTIMATE),
                        ),
                    );
                    return Ok((response, transport.name().to_string()));
                }
                Err(e) => {
                    warn!(transport = transport.name(), error = %e, "Transport failed, trying next");
                    last_error = Some(e);
                }
            }
        }

        Err(ClientError::transport(
            last_error
                .map(|e| e.to_string())
                .unwrap_or_else(|| "no transport configured".to_string()),
        ))
    }

    /// Classifies a response. Also keeps the local pacer in step with the server.
    fn interpret(&self, response: TransportResponse) -> Result<JobReceipt, ClientError> {
        if response.is_success() {
            self.pacer.record();
            return serde_json::from_str::<JobReceipt>(&response.body).map_err(|e| {
                ClientError::Server {
                    status: response.status,
                    message: format!("unreadable response: {e}"),
                }
            });
        }

        let body: Option<ErrorBody> = serde_json::from_str(&response.body).ok();
        let message = body
            .as_ref()
            .map(|b| match &b.details {
                Some(details) => format!("{}: {}", b.error, details),
                None => b.error.clone(),
            })
            .unwrap_or_else(|| response.body.trim().to_string());

        match response.status {
            400 => Err(ClientError::Validation { message }),
            429 => {
                let retry_after_secs = body
                    .as_ref()
                    .and_then(|b| b.retry_after_seconds)
                    .or(response.retry_after)
                    .unwrap_or(self.config.pacing_window_secs)
                    .max(1);
                self.pacer.rearm(retry_after_secs);
                Err(ClientError::RateLimited { retry_after_secs })
            }
            status => {
                // the server admitted the job, so its window is running
                self.pacer.record();
                let process_failed = body.as_ref().is_some_and(|b| {
                    b.exit_code.is_some()
                        || b.error == PROCESSING_FAILED
                        || b.error == PROCESSING_TIMED_OUT
                });
                if process_failed {
                    Err(ClientError::ProcessFailure {
                        exit_code: body.as_ref().and_then(|b| b.exit_code),
                        message,
                    })
                } else {
                    Err(ClientError::Server { status, message })
                }
            }
        }
    }

    async fn wait_visible(&self, path: &str) -> bool {
        let policy = self.config.visibility_policy();
        let result = retry(&policy, |attempt| async move {
            match self.probe.is_visible(path).await {
                Ok(true) => Ok(()),
                Ok(false) => Err(format!("not visible on attempt {attempt}")),
                Err(e) => Err(e.to_string()),
            }
        })
        .await;
        if let Err(reason) = &result {
            debug!(path, reason = %reason, "Result not visible yet, settling");
        }
        result.is_ok()
    }

    fn publish(&self, token: &CancellationToken, status: ClientStatus) {
        if token.is_cancelled() {
            return;
        }
        self.status_tx.send_replace(status);
    }
}
