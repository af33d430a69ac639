use serde::{Deserialize, Serialize};
use std::net::IpAddr;
use std::path::PathBuf;
use std::time::Duration;

/// Root configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    pub executor: ExecutorConfig,
    #[serde(default)]
    pub rate_limit: RateLimitConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default = "default_transforms")]
    pub transforms: Vec<TransformEntry>,
}

impl Config {
    /// Interval between retention sweeps.
    pub fn sweep_period(&self) -> Duration {
        Duration::from_secs(self.storage.sweep_interval_secs.max(1))
    }

    /// Age past which the sweep removes an artifact.
    ///
    /// Artifact ages are measured from staging while retention runs from job
    /// completion, so the cutoff covers the longest possible run plus one
    /// sweep period.
    pub fn sweep_max_age(&self) -> Duration {
        Duration::from_secs(
            self.storage
                .retention_secs
                .max(self.storage.failed_retention_secs)
                .saturating_add(self.executor.timeout_secs),
        ) + self.sweep_period()
    }
}

/// Server configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: IpAddr,
    #[serde(default = "default_port")]
    pub port: u16,
    /// Maximum accepted request body (the multipart upload), in bytes.
    #[serde(default = "default_max_upload_bytes")]
    pub max_upload_bytes: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            max_upload_bytes: default_max_upload_bytes(),
        }
    }
}

fn default_host() -> IpAddr {
    IpAddr::from([0, 0, 0, 0])
}

fn default_port() -> u16 {
    3001
}

fn default_max_upload_bytes() -> usize {
    100 * 1024 * 1024
}

/// Artifact storage configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StorageConfig {
    /// Root directory; `uploads/` and `results/` are created beneath it.
    #[serde(default = "default_storage_root")]
    pub root: PathBuf,
    /// How long artifacts stay retrievable after a job completes.
    #[serde(default = "default_retention_secs")]
    pub retention_secs: u64,
    /// Delay before artifacts of a failed job are removed.
    #[serde(default)]
    pub failed_retention_secs: u64,
    /// Interval of the sweep that removes artifacts which escaped cleanup.
    #[serde(default = "default_sweep_interval_secs")]
    pub sweep_interval_secs: u64,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            root: default_storage_root(),
            retention_secs: default_retention_secs(),
            failed_retention_secs: 0,
            sweep_interval_secs: default_sweep_interval_secs(),
        }
    }
}

fn default_storage_root() -> PathBuf {
    PathBuf::from("data")
}

fn default_retention_secs() -> u64 {
    60
}

fn default_sweep_interval_secs() -> u64 {
    60
}

/// External executable configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ExecutorConfig {
    /// Path to the transform executable.
    pub executable_path: PathBuf,
    /// Wall-clock limit for a single invocation.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Maximum number of transform processes running at once.
    #[serde(default = "default_max_concurrent")]
    pub max_concurrent: usize,
    /// How long a submission may wait for a free execution slot.
    #[serde(default = "default_queue_timeout_secs")]
    pub queue_timeout_secs: u64,
    /// Ceiling for each captured output stream.
    #[serde(default = "default_output_limit_bytes")]
    pub output_limit_bytes: usize,
}

impl ExecutorConfig {
    pub fn new(executable_path: impl Into<PathBuf>) -> Self {
        Self {
            executable_path: executable_path.into(),
            timeout_secs: default_timeout_secs(),
            max_concurrent: default_max_concurrent(),
            queue_timeout_secs: default_queue_timeout_secs(),
            output_limit_bytes: default_output_limit_bytes(),
        }
    }

    /// Sets the timeout in seconds.
    pub fn with_timeout(mut self, timeout_secs: u64) -> Self {
        self.timeout_secs = timeout_secs;
        self
    }

    /// Sets the maximum number of concurrent processes.
    pub fn with_max_concurrent(mut self, max: usize) -> Self {
        self.max_concurrent = max;
        self
    }

    /// Sets the queue timeout in seconds.
    pub fn with_queue_timeout(mut self, queue_timeout_secs: u64) -> Self {
        self.queue_timeout_secs = queue_timeout_secs;
        self
    }
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_max_concurrent() -> usize {
    4
}

fn default_queue_timeout_secs() -> u64 {
    30
}

fn default_output_limit_bytes() -> usize {
    64 * 1024
}

/// Rate limiting configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RateLimitConfig {
    /// Cooldown between accepted submissions of one client.
    #[serde(default = "default_window_secs")]
    pub window_secs: u64,
    /// Identify clients by `X-Forwarded-For` (only behind a trusted proxy).
    #[serde(default)]
    pub trust_forwarded_for: bool,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            window_secs: default_window_secs(),
            trust_forwarded_for: false,
        }
    }
}

fn default_window_secs() -> u64 {
    30
}

/// Logging configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct LoggingConfig {
    #[serde(default)]
    pub format: LogFormat,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

/// A transform the executable knows how to run.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct TransformEntry {
    /// Name clients submit.
    pub name: String,
    /// Token passed to the executable; defaults to `name`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub argument: Option<String>,
}

impl TransformEntry {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            argument: None,
        }
    }

    /// The argv token handed to the executable.
    pub fn argument(&self) -> &str {
        self.argument.as_deref().unwrap_or(&self.name)
    }
}

pub fn default_transforms() -> Vec<TransformEntry> {
    [
        "opencv sobel",
        "alternative sobel",
        "openmp sobel",
        "prewitt",
        "roberts cross",
    ]
    .into_iter()
    .map(TransformEntry::new)
    .collect()
}

/// Sanitized config for API responses (filesystem layout hidden)
#[derive(Debug, Clone, Serialize)]
pub struct SanitizedConfig {
    pub server: ServerConfig,
    pub storage: SanitizedStorageConfig,
    pub executor: SanitizedExecutorConfig,
    pub rate_limit: RateLimitConfig,
    pub transforms: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SanitizedStorageConfig {
    pub retention_secs: u64,
    pub failed_retention_secs: u64,
}

/// Sanitized executor config (executable path hidden)
#[derive(Debug, Clone, Serialize)]
pub struct SanitizedExecutorConfig {
    pub executable_configured: bool,
    pub timeout_secs: u64,
    pub max_concurrent: usize,
    pub queue_timeout_secs: u64,
}

impl From<&Config> for SanitizedConfig {
    fn from(config: &Config) -> Self {
        Self {
            server: config.server.clone(),
            storage: SanitizedStorageConfig {
                retention_secs: config.storage.retention_secs,
                failed_retention_secs: config.storage.failed_retention_secs,
            },
            executor: SanitizedExecutorConfig {
                executable_configured: !config.executor.executable_path.as_os_str().is_empty(),
                timeout_secs: config.executor.timeout_secs,
                max_concurrent: config.executor.max_concurrent,
                queue_timeout_secs: config.executor.queue_timeout_secs,
            },
            rate_limit: config.rate_limit.clone(),
            transforms: config.transforms.iter().map(|t| t.name.clone()).collect(),
        }
    }
}
