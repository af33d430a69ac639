//! Job dispatcher implementation.

use chrono::Utc;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tracing::{debug, info, warn};

use super::error::DispatchError;
use super::registry::TransformRegistry;
use super::types::{Job, JobReceipt, JobStatus, PoolStatus, SubmitRequest};
use crate::config::Config;
use crate::invoker::{InvocationOutcome, InvocationRequest, Invoker, InvokerError};
use crate::limiter::CooldownLimiter;
use crate::metrics;
use crate::store::{Artifact, ArtifactRef, ArtifactStore};

const STDERR_TAIL_CHARS: usize = 2048;

/// Dispatcher tunables.
#[derive(Debug, Clone)]
pub struct DispatcherConfig {
    /// Maximum concurrent transform processes.
    pub max_concurrent: usize,
    /// How long a submission may wait for an execution slot.
    pub queue_timeout: Duration,
    /// Artifact lifetime after a completed job.
    pub retention: Duration,
    /// Artifact lifetime after a failed job.
    pub failed_retention: Duration,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            max_concurrent: 4,
            queue_timeout: Duration::from_secs(30),
            retention: Duration::from_secs(60),
            failed_retention: Duration::ZERO,
        }
    }
}

impl From<&Config> for DispatcherConfig {
    fn from(config: &Config) -> Self {
        Self {
            max_concurrent: config.executor.max_concurrent,
            queue_timeout: Duration::from_secs(config.executor.queue_timeout_secs),
            retention: Duration::from_secs(config.storage.retention_secs),
            failed_retention: Duration::from_secs(config.storage.failed_retention_secs),
        }
    }
}

/// Tracks statistics for the execution pool.
#[derive(Default)]
struct PoolStats {
    active: AtomicU64,
    queued: AtomicU64,
    total_completed: AtomicU64,
    total_failed: AtomicU64,
    total_rejected: AtomicU64,
}

impl PoolStats {
    fn to_status(&self, max_concurrent: usize) -> PoolStatus {
        PoolStatus {
            active_jobs: self.active.load(Ordering::Relaxed) as usize,
            max_concurrent,
            queued_jobs: self.queued.load(Ordering::Relaxed) as usize,
            total_completed: self.total_completed.load(Ordering::Relaxed),
            total_failed: self.total_failed.load(Ordering::Relaxed),
            total_rejected: self.total_rejected.load(Ordering::Relaxed),
        }
    }
}

/// Decrements a counter when dropped.
struct CountGuard<'a>(&'a AtomicU64);

impl<'a> CountGuard<'a> {
    fn enter(counter: &'a AtomicU64) -> Self {
        counter.fetch_add(1, Ordering::Relaxed);
        Self(counter)
    }
}

impl Drop for CountGuard<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::Relaxed);
    }
}

/// Runs one submission end to end: validation, admission, staging,
/// invocation and finalization.
pub struct Dispatcher {
    config: DispatcherConfig,
    registry: TransformRegistry,
    limiter: Arc<CooldownLimiter>,
    store: Arc<dyn ArtifactStore>,
    invoker: Arc<dyn Invoker>,
    permits: Arc<Semaphore>,
    stats: PoolStats,
}

impl Dispatcher {
    /// Creates a new dispatcher.
    pub fn new(
        config: DispatcherConfig,
        registry: TransformRegistry,
        limiter: Arc<CooldownLimiter>,
        store: Arc<dyn ArtifactStore>,
        invoker: Arc<dyn Invoker>,
    ) -> Self {
        let permits = Arc::new(Semaphore::new(config.max_concurrent.max(1)));
        Self {
            config,
            registry,
            limiter,
            store,
            invoker,
            permits,
            stats: PoolStats::default(),
        }
    }

    pub fn registry(&self) -> &TransformRegistry {
        &self.registry
    }

    pub fn limiter(&self) -> &Arc<CooldownLimiter> {
        &self.limiter
    }

    pub fn store(&self) -> &Arc<dyn ArtifactStore> {
        &self.store
    }

    /// Returns the current pool status.
    pub fn status(&self) -> PoolStatus {
        self.stats.to_status(self.config.max_concurrent)
    }

    /// Dispatches one submission and records its result.
    pub async fn submit(&self, request: SubmitRequest) -> Result<JobReceipt, DispatchError> {
        let result = self.run(request).await;
        let label = match &result {
            Ok(_) => "completed",
            Err(e) => e.label(),
        };
        metrics::JOBS_TOTAL.with_label_values(&[label]).inc();
        result
    }

    async fn run(&self, request: SubmitRequest) -> Result<JobReceipt, DispatchError> {
        let SubmitRequest {
            client_id,
            transform,
            image,
            original_name,
        } = request;

        // Validate
        if image.is_empty() {
            return Err(DispatchError::validation("image is empty"));
        }
        let transform = transform.trim();
        if transform.is_empty() {
            return Err(DispatchError::validation("transform is required"));
        }
        let entry = self
            .registry
            .resolve(transform)
            .ok_or_else(|| DispatchError::validation(format!("unknown transform: {transform}")))?
            .clone();

        let mut job = Job::new(&entry.name, &original_name);
        self.transition(&mut job, JobStatus::Validated)?;

        // Admit
        let admission = self.limiter.admit(&client_id).await;
        if !admission.allowed {
            metrics::RATE_LIMITED_TOTAL.inc();
            debug!(
                client = %client_id,
                retry_after_secs = admission.retry_after_secs,
                "Submission rate limited"
            );
            return Err(DispatchError::RateLimited {
                retry_after_secs: admission.retry_after_secs,
            });
        }
        self.transition(&mut job, JobStatus::Admitted)?;

        // Wait for an execution slot
        let permit = {
            let _queued = CountGuard::enter(&self.stats.queued);
            tokio::time::timeout(self.config.queue_timeout, self.permits.clone().acquire_owned())
                .await
        };
        let _permit = match permit {
            Ok(Ok(permit)) => permit,
            _ => {
                self.stats.total_rejected.fetch_add(1, Ordering::Relaxed);
                warn!(job_id = %job.id, client = %client_id, "No execution slot available");
                return Err(DispatchError::Overloaded);
            }
        };
        let _active = CountGuard::enter(&self.stats.active);

        info!(
            job_id = %job.id,
            client = %client_id,
            transform = %entry.name,
            size = image.len(),
            "Dispatching job"
        );

        let result = self.execute(&mut job, entry.argument(), &image).await;

        match &result {
            Ok(_) => {
                self.stats.total_completed.fetch_add(1, Ordering::Relaxed);
            }
            Err(e) => {
                self.stats.total_failed.fetch_add(1, Ordering::Relaxed);
                job.fail(e.to_string());
                warn!(
                    job_id = %job.id,
                    error = %e,
                    exit_code = ?e.exit_code(),
                    "Job failed"
                );
                let expires_at = job.completed_at.unwrap_or_else(Utc::now)
                    + to_chrono(self.config.failed_retention);
                job.expire_artifacts(expires_at);
                let staged: Vec<ArtifactRef> = job
                    .artifacts()
                    .map(|artifact| artifact.reference.clone())
                    .collect();
                if !staged.is_empty() {
                    let _ = self
                        .store
                        .schedule_cleanup(staged, self.config.failed_retention);
                }
            }
        }

        result
    }

    /// Stage, invoke and finalize. The caller handles failure bookkeeping.
    async fn execute(
        &self,
        job: &mut Job,
        argument: &str,
        image: &[u8],
    ) -> Result<JobReceipt, DispatchError> {
        let input = self.store.write_input(&job.id, image).await?;
        let output = self.store.reserve_output(&input);
        job.input = Some(Artifact::new(input.clone(), &job.id));
        job.output = Some(Artifact::new(output.clone(), &job.id));
        self.transition(job, JobStatus::Staged)?;

        let invocation = InvocationRequest::new(
            argument,
            self.store.path_of(&input),
            self.store.path_of(&output),
        );
        let stderr_tail = |outcome: &InvocationOutcome| {
            let tail = outcome.stderr_tail(STDERR_TAIL_CHARS);
            non_empty(scrub_paths(
                &tail,
                &[(&invocation.input_path, &input), (&invocation.output_path, &output)],
            ))
        };
        self.transition(job, JobStatus::Running)?;

        let outcome = self
            .invoker
            .execute(&invocation)
            .await
            .map_err(|e| match e {
                InvokerError::ExecutableNotFound { .. } => DispatchError::ExecutableNotFound,
                other => DispatchError::ProcessFailure {
                    exit_code: None,
                    reason: other.to_string(),
                    stderr_tail: None,
                },
            })?;
        job.exit_code = outcome.exit_code;
        self.record_duration(&job.transform, &outcome);

        if outcome.timed_out {
            return Err(DispatchError::Timeout {
                timeout_secs: self.invoker.timeout().as_secs(),
            });
        }
        if !outcome.success() {
            return Err(DispatchError::ProcessFailure {
                exit_code: outcome.exit_code,
                reason: match outcome.exit_code {
                    Some(code) => format!("exited with code {code}"),
                    None => "terminated by signal".to_string(),
                },
                stderr_tail: stderr_tail(&outcome),
            });
        }
        if self.store.exists(&output).await?.is_none() {
            return Err(DispatchError::ProcessFailure {
                exit_code: outcome.exit_code,
                reason: "output missing".to_string(),
                stderr_tail: stderr_tail(&outcome),
            });
        }

        self.transition(job, JobStatus::Completed)?;
        let completed_at = job.completed_at.unwrap_or_else(Utc::now);
        let expires_at = completed_at + to_chrono(self.config.retention);
        job.expire_artifacts(expires_at);

        let _ = self
            .store
            .schedule_cleanup(vec![input.clone(), output.clone()], self.config.retention);

        info!(
            job_id = %job.id,
            duration_ms = outcome.duration_ms,
            output = %output,
            "Job completed"
        );

        Ok(JobReceipt {
            job_id: job.id.clone(),
            transform: job.transform.clone(),
            input_artifact_name: input.name,
            output_artifact_name: output.name,
            created_at: job.created_at,
            completed_at,
            expires_at,
        })
    }

    fn transition(&self, job: &mut Job, next: JobStatus) -> Result<(), DispatchError> {
        job.advance(next)
            .map_err(|e| DispatchError::Configuration(e.to_string()))
    }

    fn record_duration(&self, transform: &str, outcome: &InvocationOutcome) {
        let result = if outcome.timed_out {
            "timeout"
        } else if outcome.success() {
            "success"
        } else {
            "failure"
        };
        metrics::PROCESS_DURATION
            .with_label_values(&[transform, result])
            .observe(outcome.duration_ms as f64 / 1000.0);
    }
}

fn to_chrono(duration: Duration) -> chrono::Duration {
    chrono::Duration::from_std(duration).unwrap_or_else(|_| chrono::Duration::zero())
}

/// Rewrites staged file paths in process output to their retrieval paths.
fn scrub_paths(text: &str, staged: &[(&PathBuf, &ArtifactRef)]) -> String {
    staged.iter().fold(text.to_string(), |acc, (path, artifact)| {
        acc.replace(&*path.to_string_lossy(), &artifact.url_path())
    })
}

fn non_empty(s: String) -> Option<String> {
    if s.is_empty() {
        None
    } else {
        Some(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::ClientId;
    use crate::store::FsArtifactStore;
    use crate::testing::MockInvoker;
    use tempfile::TempDir;

    struct Fixture {
        _dir: TempDir,
        store: Arc<FsArtifactStore>,
        invoker: Arc<MockInvoker>,
        dispatcher: Dispatcher,
    }

    async fn fixture(config: DispatcherConfig, invoker: MockInvoker) -> Fixture {
        let dir = TempDir::new().unwrap();
        let store = Arc::new(FsArtifactStore::new(dir.path()));
        store.validate().await.unwrap();
        let invoker = Arc::new(invoker);
        let dispatcher = Dispatcher::new(
            config,
            TransformRegistry::default(),
            Arc::new(CooldownLimiter::from_secs(30)),
            store.clone(),
            invoker.clone(),
        );
        Fixture {
            _dir: dir,
            store,
            invoker,
            dispatcher,
        }
    }

    fn request(client: &str, transform: &str) -> SubmitRequest {
        SubmitRequest {
            client_id: ClientId::new(client),
            transform: transform.to_string(),
            image: vec![0xFF; 10 * 1024],
            original_name: "image.jpg".to_string(),
        }
    }

    fn count_files(store: &FsArtifactStore, namespace: &str) -> usize {
        std::fs::read_dir(store.root().join(namespace)).unwrap().count()
    }

    #[tokio::test]
    async fn test_successful_submission() {
        let f = fixture(DispatcherConfig::default(), MockInvoker::new()).await;

        let receipt = f.dispatcher.submit(request("A", "prewitt")).await.unwrap();

        assert!(receipt.input_artifact_name.ends_with("-image.jpg"));
        assert_eq!(receipt.job_id, receipt.input_artifact_name);
        assert_eq!(
            receipt.output_artifact_name,
            format!("output-{}", receipt.input_artifact_name)
        );
        assert_eq!(receipt.expires_at - receipt.completed_at, chrono::Duration::seconds(60));

        let output = ArtifactRef::output(&receipt.output_artifact_name);
        assert!(f.store.exists(&output).await.unwrap().is_some());

        let status = f.dispatcher.status();
        assert_eq!(status.total_completed, 1);
        assert_eq!(status.active_jobs, 0);
        assert_eq!(status.queued_jobs, 0);
    }

    #[tokio::test]
    async fn test_argument_passed_from_registry() {
        let f = fixture(DispatcherConfig::default(), MockInvoker::new()).await;
        f.dispatcher.submit(request("A", "roberts cross")).await.unwrap();
        let calls = f.invoker.calls().await;
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].argument, "roberts cross");
    }

    #[tokio::test]
    async fn test_unknown_transform_stages_nothing() {
        let f = fixture(DispatcherConfig::default(), MockInvoker::new()).await;

        let err = f
            .dispatcher
            .submit(request("A", "; rm -rf /"))
            .await
            .unwrap_err();

        assert!(matches!(err, DispatchError::Validation(_)));
        assert_eq!(count_files(&f.store, "uploads"), 0);
        assert!(f.invoker.calls().await.is_empty());
        // validation does not consume the client's window
        assert!(f.dispatcher.submit(request("A", "prewitt")).await.is_ok());
    }

    #[tokio::test]
    async fn test_empty_image_rejected() {
        let f = fixture(DispatcherConfig::default(), MockInvoker::new()).await;
        let mut req = request("A", "prewitt");
        req.image.clear();
        let err = f.dispatcher.submit(req).await.unwrap_err();
        assert!(matches!(err, DispatchError::Validation(_)));

        let err = f.dispatcher.submit(request("A", "  ")).await.unwrap_err();
        assert!(matches!(err, DispatchError::Validation(_)));
    }

    #[tokio::test]
    async fn test_rate_limit_per_client() {
        let f = fixture(DispatcherConfig::default(), MockInvoker::new()).await;

        f.dispatcher.submit(request("A", "prewitt")).await.unwrap();
        let err = f
            .dispatcher
            .submit(request("A", "prewitt"))
            .await
            .unwrap_err();
        match err {
            DispatchError::RateLimited { retry_after_secs } => {
                assert!(retry_after_secs > 0 && retry_after_secs <= 30)
            }
            other => panic!("expected rate limit, got {other:?}"),
        }

        assert!(f.dispatcher.submit(request("B", "prewitt")).await.is_ok());
        assert_eq!(count_files(&f.store, "uploads"), 2);
    }

    #[tokio::test]
    async fn test_non_zero_exit_fails_and_cleans_up() {
        let f = fixture(
            DispatcherConfig::default(),
            MockInvoker::new().with_exit_code(3).with_stderr("unsupported image"),
        )
        .await;

        let err = f
            .dispatcher
            .submit(request("A", "prewitt"))
            .await
            .unwrap_err();

        match &err {
            DispatchError::ProcessFailure {
                exit_code,
                stderr_tail,
                ..
            } => {
                assert_eq!(*exit_code, Some(3));
                assert_eq!(stderr_tail.as_deref(), Some("unsupported image"));
            }
            other => panic!("expected process failure, got {other:?}"),
        }
        assert_eq!(err.exit_code(), Some(3));
        assert_eq!(f.dispatcher.status().total_failed, 1);

        // failed_retention is zero: cleanup runs right away
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(count_files(&f.store, "uploads"), 0);
    }

    #[test]
    fn test_scrub_paths_rewrites_staged_locations() {
        let input = ArtifactRef::input("1-a.jpg");
        let output = ArtifactRef::output_for(&input);
        let input_path = PathBuf::from("/srv/data/uploads/1-a.jpg");
        let output_path = PathBuf::from("/srv/data/results/output-1-a.jpg");

        let scrubbed = scrub_paths(
            "cannot read /srv/data/uploads/1-a.jpg\nnot writing /srv/data/results/output-1-a.jpg",
            &[(&input_path, &input), (&output_path, &output)],
        );

        assert_eq!(
            scrubbed,
            "cannot read uploads/1-a.jpg\nnot writing results/output-1-a.jpg"
        );
    }

    #[tokio::test]
    async fn test_exit_zero_without_output_is_failure() {
        let f = fixture(
            DispatcherConfig::default(),
            MockInvoker::new().without_output(),
        )
        .await;

        let err = f
            .dispatcher
            .submit(request("A", "prewitt"))
            .await
            .unwrap_err();

        match err {
            DispatchError::ProcessFailure {
                exit_code, reason, ..
            } => {
                assert_eq!(exit_code, Some(0));
                assert_eq!(reason, "output missing");
            }
            other => panic!("expected process failure, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_timeout_reported() {
        let f = fixture(DispatcherConfig::default(), MockInvoker::new().timing_out()).await;
        let err = f
            .dispatcher
            .submit(request("A", "prewitt"))
            .await
            .unwrap_err();
        assert!(matches!(err, DispatchError::Timeout { .. }));
    }

    #[tokio::test]
    async fn test_missing_executable_reported() {
        let f = fixture(
            DispatcherConfig::default(),
            MockInvoker::new().with_missing_executable(),
        )
        .await;
        let err = f
            .dispatcher
            .submit(request("A", "prewitt"))
            .await
            .unwrap_err();
        assert!(matches!(err, DispatchError::ExecutableNotFound));
    }

    #[tokio::test]
    async fn test_overloaded_when_no_slot_frees_up() {
        let config = DispatcherConfig {
            max_concurrent: 1,
            queue_timeout: Duration::from_millis(50),
            ..Default::default()
        };
        let f = fixture(
            config,
            MockInvoker::new().with_delay(Duration::from_millis(500)),
        )
        .await;
        let dispatcher = Arc::new(f.dispatcher);

        let slow = {
            let dispatcher = dispatcher.clone();
            tokio::spawn(async move { dispatcher.submit(request("A", "prewitt")).await })
        };
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(dispatcher.status().active_jobs, 1);

        let err = dispatcher
            .submit(request("B", "prewitt"))
            .await
            .unwrap_err();
        assert!(matches!(err, DispatchError::Overloaded));
        assert_eq!(dispatcher.status().total_rejected, 1);

        assert!(slow.await.unwrap().is_ok());
        assert_eq!(dispatcher.status().active_jobs, 0);
    }

    #[tokio::test]
    async fn test_completed_artifacts_removed_after_retention() {
        let config = DispatcherConfig {
            retention: Duration::from_millis(100),
            ..Default::default()
        };
        let f = fixture(config, MockInvoker::new()).await;
        let receipt = f.dispatcher.submit(request("A", "prewitt")).await.unwrap();
        let output = ArtifactRef::output(&receipt.output_artifact_name);

        assert!(f.store.exists(&output).await.unwrap().is_some());
        tokio::time::sleep(Duration::from_millis(400)).await;
        assert!(f.store.exists(&output).await.unwrap().is_none());
        assert_eq!(count_files(&f.store, "uploads"), 0);
    }
}
