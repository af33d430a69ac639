//! Prometheus metrics for core components.
//!
//! This module provides metrics for:
//! - Dispatch (jobs by result, admission rejections)
//! - External process execution
//! - Artifact retention

use once_cell::sync::Lazy;
use prometheus::{HistogramOpts, HistogramVec, IntCounter, IntCounterVec, Opts};

// =============================================================================
// Dispatch Metrics
// =============================================================================

/// Submissions by final result.
pub static JOBS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("detectr_jobs_total", "Total submissions by result"),
        // "completed", "validation", "rate_limited", "overloaded",
        // "process_failure", "timeout", "storage", "executable_not_found"
        &["result"],
    )
    .unwrap()
});

/// Submissions rejected by the per-client cooldown.
pub static RATE_LIMITED_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new(
        "detectr_rate_limited_total",
        "Submissions rejected by the rate limiter",
    )
    .unwrap()
});

// =============================================================================
// Process Metrics
// =============================================================================

/// Wall-clock duration of transform processes.
pub static PROCESS_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    HistogramVec::new(
        HistogramOpts::new(
            "detectr_process_duration_seconds",
            "Duration of transform executable runs",
        )
        .buckets(vec![0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0, 60.0]),
        &["transform", "result"], // result: "success", "failure", "timeout"
    )
    .unwrap()
});

// =============================================================================
// Storage Metrics
// =============================================================================

/// Artifacts that could not be removed by cleanup or sweep.
pub static CLEANUP_FAILURES: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new(
        "detectr_cleanup_failures_total",
        "Artifact removals that failed",
    )
    .unwrap()
});

/// Artifacts removed by the periodic retention sweep.
pub static ARTIFACTS_SWEPT: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new(
        "detectr_artifacts_swept_total",
        "Artifacts removed by the retention sweep",
    )
    .unwrap()
});

// =============================================================================
// Helper functions
// =============================================================================

/// Get all core metrics for registration in a registry.
pub fn all_metrics() -> Vec<Box<dyn prometheus::core::Collector>> {
    vec![
        Box::new(JOBS_TOTAL.clone()),
        Box::new(RATE_LIMITED_TOTAL.clone()),
        Box::new(PROCESS_DURATION.clone()),
        Box::new(CLEANUP_FAILURES.clone()),
        Box::new(ARTIFACTS_SWEPT.clone()),
    ]
}
