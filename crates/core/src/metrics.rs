//! Prometheus metrics for core components.
//!
//! This module provides metrics for:
//! - Capture jobs (submitted, completed, failed, cancelled, refused)
//! - The active-job registry (gauge)
//! - Script execution dispatch

use once_cell::sync::Lazy;
use prometheus::{IntCounter, IntGauge};

/// Jobs currently admitted by the registry.
pub static ACTIVE_JOBS: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::new("platecap_active_jobs", "Capture jobs currently active").unwrap()
});

/// Jobs submitted total.
pub static JOBS_SUBMITTED: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new(
        "platecap_jobs_submitted_total",
        "Total capture jobs submitted",
    )
    .unwrap()
});

/// Jobs completed total.
pub static JOBS_COMPLETED: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new(
        "platecap_jobs_completed_total",
        "Total capture jobs completed successfully",
    )
    .unwrap()
});

/// Jobs failed total.
pub static JOBS_FAILED: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new(
        "platecap_jobs_failed_total",
        "Total capture jobs that failed",
    )
    .unwrap()
});

/// Jobs cancelled total.
pub static JOBS_CANCELLED: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new(
        "platecap_jobs_cancelled_total",
        "Total capture jobs cancelled",
    )
    .unwrap()
});

/// Jobs refused by the admission gate.
pub static JOBS_REFUSED: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new(
        "platecap_jobs_refused_total",
        "Total capture jobs refused at the active job limit",
    )
    .unwrap()
});

/// Script execution requests dispatched.
pub static SCRIPT_REQUESTS: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new(
        "platecap_script_requests_total",
        "Total script execution requests dispatched",
    )
    .unwrap()
});

/// Get all core metrics for registration in a registry.
pub fn all_metrics() -> Vec<Box<dyn prometheus::core::Collector>> {
    vec![
        Box::new(ACTIVE_JOBS.clone()),
        Box::new(JOBS_SUBMITTED.clone()),
        Box::new(JOBS_COMPLETED.clone()),
        Box::new(JOBS_FAILED.clone()),
        Box::new(JOBS_CANCELLED.clone()),
        Box::new(JOBS_REFUSED.clone()),
        Box::new(SCRIPT_REQUESTS.clone()),
    ]
}
