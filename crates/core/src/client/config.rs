use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::retry::RetryPolicy;

/// Client orchestrator configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ClientConfig {
    /// Base URL of the dispatch service, e.g. `http://127.0.0.1:3001`.
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Optional identity sent with credentialed requests.
    #[serde(default)]
    pub client_id: Option<String>,
    /// Abort a submission after this long without progress.
    #[serde(default = "default_inactivity_timeout_secs")]
    pub inactivity_timeout_secs: u64,
    /// Local advisory cooldown between submissions.
    #[serde(default = "default_pacing_window_secs")]
    pub pacing_window_secs: u64,
    /// Payloads above this size are downscaled before upload.
    #[serde(default = "default_normalize_threshold_bytes")]
    pub normalize_threshold_bytes: usize,
    /// Longest side after downscaling.
    #[serde(default = "default_max_dimension")]
    pub max_dimension: u32,
    #[serde(default = "default_jpeg_quality")]
    pub jpeg_quality: u8,
    /// Size of the chunks a streaming upload is split into.
    #[serde(default = "default_upload_chunk_bytes")]
    pub upload_chunk_bytes: usize,
    #[serde(default = "default_visibility_attempts")]
    pub visibility_attempts: u32,
    #[serde(default = "default_visibility_delay_ms")]
    pub visibility_delay_ms: u64,
    #[serde(default = "default_visibility_multiplier")]
    pub visibility_multiplier: f64,
    /// Timeout for the pre-flight connectivity check.
    #[serde(default = "default_connectivity_timeout_secs")]
    pub connectivity_timeout_secs: u64,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            client_id: None,
            inactivity_timeout_secs: default_inactivity_timeout_secs(),
            pacing_window_secs: default_pacing_window_secs(),
            normalize_threshold_bytes: default_normalize_threshold_bytes(),
            max_dimension: default_max_dimension(),
            jpeg_quality: default_jpeg_quality(),
            upload_chunk_bytes: default_upload_chunk_bytes(),
            visibility_attempts: default_visibility_attempts(),
            visibility_delay_ms: default_visibility_delay_ms(),
            visibility_multiplier: default_visibility_multiplier(),
            connectivity_timeout_secs: default_connectivity_timeout_secs(),
        }
    }
}

impl ClientConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            ..Default::default()
        }
    }

    /// Sets the client identity.
    pub fn with_client_id(mut self, client_id: impl Into<String>) -> Self {
        self.client_id = Some(client_id.into());
        self
    }

    /// Sets the inactivity timeout in seconds.
    pub fn with_inactivity_timeout(mut self, secs: u64) -> Self {
        self.inactivity_timeout_secs = secs;
        self
    }

    /// Sets the local pacing window in seconds.
    pub fn with_pacing_window(mut self, secs: u64) -> Self {
        self.pacing_window_secs = secs;
        self
    }

    /// Sets the visibility retry delay in milliseconds.
    pub fn with_visibility_delay(mut self, delay_ms: u64) -> Self {
        self.visibility_delay_ms = delay_ms;
        self
    }

    pub fn inactivity_timeout(&self) -> Duration {
        Duration::from_secs(self.inactivity_timeout_secs)
    }

    pub fn visibility_policy(&self) -> RetryPolicy {
        RetryPolicy {
            attempts: self.visibility_attempts,
            delay: Duration::from_millis(self.visibility_delay_ms),
            multiplier: self.visibility_multiplier,
        }
    }

    /// Absolute URL for a path under the base URL.
    pub fn url(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.base_url.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }
}

fn default_base_url() -> String {
    "http://127.0.0.1:3001".to_string()
}

fn default_inactivity_timeout_secs() -> u64 {
    60
}

fn default_pacing_window_secs() -> u64 {
    30
}

fn default_normalize_threshold_bytes() -> usize {
    4 * 1024 * 1024
}

fn default_max_dimension() -> u32 {
    2048
}

fn default_jpeg_quality() -> u8 {
    85
}

fn default_upload_chunk_bytes() -> usize {
    64 * 1024
}

fn default_visibility_attempts() -> u32 {
    2
}

fn default_visibility_delay_ms() -> u64 {
    3000
}

fn default_visibility_multiplier() -> f64 {
    1.0
}

fn default_connectivity_timeout_secs() -> u64 {
    3
}
