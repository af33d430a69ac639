//! Prometheus metrics for observability.
//!
//! This module provides metrics for monitoring the detectr server:
//! - HTTP request metrics (latency, counts, in flight)
//! - Execution pool status (collected at scrape time)
//! - Rate limiter state (collected at scrape time)
//! - Core dispatch metrics registered from `detectr_core::metrics`

use once_cell::sync::Lazy;
use prometheus::{
    self, Encoder, HistogramOpts, HistogramVec, IntCounterVec, IntGauge, Opts, Registry,
    TextEncoder,
};
use regex_lite::Regex;

use crate::state::AppState;

/// Global metrics registry.
pub static REGISTRY: Lazy<Registry> = Lazy::new(|| {
    let registry = Registry::new();
    register_metrics(&registry);
    registry
});

// =============================================================================
// HTTP Request Metrics
// =============================================================================

/// HTTP request duration in seconds.
pub static HTTP_REQUEST_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    HistogramVec::new(
        HistogramOpts::new(
            "detectr_http_request_duration_seconds",
            "HTTP request duration in seconds",
        )
        .buckets(vec![
            0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0,
        ]),
        &["method", "path", "status"],
    )
    .unwrap()
});

/// HTTP requests total count.
pub static HTTP_REQUESTS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("detectr_http_requests_total", "Total HTTP requests"),
        &["method", "path", "status"],
    )
    .unwrap()
});

/// HTTP requests currently in flight.
pub static HTTP_REQUESTS_IN_FLIGHT: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::new(
        "detectr_http_requests_in_flight",
        "Number of HTTP requests currently being processed",
    )
    .unwrap()
});

// =============================================================================
// Execution Pool Metrics
// =============================================================================

/// Transform processes currently running.
pub static POOL_ACTIVE: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::new("detectr_pool_active", "Transform processes currently running").unwrap()
});

/// Submissions waiting for an execution slot.
pub static POOL_QUEUED: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::new(
        "detectr_pool_queued",
        "Submissions waiting for an execution slot",
    )
    .unwrap()
});

/// Clients with a live cooldown record.
pub static RATE_LIMIT_TRACKED_CLIENTS: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::new(
        "detectr_rate_limit_tracked_clients",
        "Clients with a cooldown record",
    )
    .unwrap()
});

fn register_metrics(registry: &Registry) {
    // HTTP
    registry
        .register(Box::new(HTTP_REQUEST_DURATION.clone()))
        .unwrap();
    registry
        .register(Box::new(HTTP_REQUESTS_TOTAL.clone()))
        .unwrap();
    registry
        .register(Box::new(HTTP_REQUESTS_IN_FLIGHT.clone()))
        .unwrap();

    // Pool
    registry.register(Box::new(POOL_ACTIVE.clone())).unwrap();
    registry.register(Box::new(POOL_QUEUED.clone())).unwrap();
    registry
        .register(Box::new(RATE_LIMIT_TRACKED_CLIENTS.clone()))
        .unwrap();

    // Core metrics (dispatch, process execution, retention)
    for metric in detectr_core::metrics::all_metrics() {
        registry.register(metric).unwrap();
    }
}

/// Encode all metrics in Prometheus text format.
pub fn encode_metrics() -> String {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();
    let mut buffer = Vec::new();
    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        tracing::warn!(error = %e, "Failed to encode metrics");
    }
    String::from_utf8_lossy(&buffer).into_owned()
}

/// Collect dynamic metrics from current application state.
///
/// Called before encoding so the pool gauges reflect the dispatcher at
/// scrape time.
pub async fn collect_dynamic_metrics(state: &AppState) {
    let pool = state.dispatcher().status();
    POOL_ACTIVE.set(pool.active_jobs as i64);
    POOL_QUEUED.set(pool.queued_jobs as i64);

    let limiter = state.dispatcher().limiter().status().await;
    RATE_LIMIT_TRACKED_CLIENTS.set(limiter.tracked_clients as i64);
}

static ARTIFACT_PATH: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^/(uploads|results)/[^/]+$").unwrap());
static NAMED_SUBMIT_PATH: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^/api/(transforms|operators)/[^/]+$").unwrap());

/// Normalize a path for metric labels (replace artifact and transform names
/// with placeholders).
pub fn normalize_path(path: &str) -> String {
    let result = ARTIFACT_PATH.replace(path, "/$1/{name}");
    let result = NAMED_SUBMIT_PATH.replace(&result, "/api/$1/{name}");
    result.into_owned()
}
