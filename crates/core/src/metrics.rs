//! Prometheus metrics for core components.
//!
//! This module provides metrics for:
//! - Requests (outcomes, duration)
//! - Fallback chains (attempts by chain and result)
//! - Post-processing (compressions, link fallbacks)
//! - Progress display (updates by result)

use once_cell::sync::Lazy;
use prometheus::{HistogramOpts, HistogramVec, IntCounter, IntCounterVec, Opts};

use crate::retry::AttemptStatus;

// =============================================================================
// Requests
// =============================================================================

/// Finished requests by kind and outcome.
pub static REQUESTS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("courier_requests_total", "Total finished requests"),
        &["kind", "outcome"], // outcome: "delivered", "delivered_as_link", "failed"
    )
    .unwrap()
});

/// End-to-end request duration in seconds.
pub static REQUEST_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    HistogramVec::new(
        HistogramOpts::new(
            "courier_request_duration_seconds",
            "Duration of a request from receipt to cleanup",
        )
        .buckets(vec![1.0, 5.0, 15.0, 30.0, 60.0, 120.0, 300.0, 600.0, 1800.0]),
        &["kind"],
    )
    .unwrap()
});

/// Failed requests by failure kind.
pub static REQUEST_FAILURES: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("courier_request_failures_total", "Failed requests by error kind"),
        &["kind"],
    )
    .unwrap()
});

// =============================================================================
// Fallback chains
// =============================================================================

/// Attempts by chain and result.
pub static ATTEMPTS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("courier_chain_attempts_total", "Fallback chain attempts"),
        &["chain", "result"], // result: "success", "transient", "fatal"
    )
    .unwrap()
});

/// Records one attempt outcome.
pub fn record_attempt(chain: &str, status: &AttemptStatus) {
    let result = match status {
        AttemptStatus::Succeeded => "success",
        AttemptStatus::Transient(_) => "transient",
        AttemptStatus::Fatal(_) => "fatal",
    };
    ATTEMPTS_TOTAL.with_label_values(&[chain, result]).inc();
}

// =============================================================================
// Post-processing
// =============================================================================

/// Compression passes by result.
pub static COMPRESSIONS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("courier_compressions_total", "Compression passes"),
        &["result"], // "fit", "oversize", "failed"
    )
    .unwrap()
});

/// Deliveries degraded to a link.
pub static LINK_FALLBACKS_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new(
        "courier_link_fallbacks_total",
        "Artifacts delivered as a link because they exceeded the ceiling",
    )
    .unwrap()
});

// =============================================================================
// Progress
// =============================================================================

/// Progress display updates by result.
pub static PROGRESS_UPDATES: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("courier_progress_updates_total", "Progress display updates"),
        &["result"], // "delivered", "detached", "rate_limited", "failed"
    )
    .unwrap()
});

// =============================================================================
// Helper functions
// =============================================================================

/// Get all core metrics for registration in a registry.
pub fn all_metrics() -> Vec<Box<dyn prometheus::core::Collector>> {
    vec![
        Box::new(REQUESTS_TOTAL.clone()),
        Box::new(REQUEST_DURATION.clone()),
        Box::new(REQUEST_FAILURES.clone()),
        Box::new(ATTEMPTS_TOTAL.clone()),
        Box::new(COMPRESSIONS_TOTAL.clone()),
        Box::new(LINK_FALLBACKS_TOTAL.clone()),
        Box::new(PROGRESS_UPDATES.clone()),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_attempt_increments_counter() {
        let before = ATTEMPTS_TOTAL
            .with_label_values(&["metrics-test", "transient"])
            .get();
        record_attempt("metrics-test", &AttemptStatus::Transient("429".to_string()));
        let after = ATTEMPTS_TOTAL
            .with_label_values(&["metrics-test", "transient"])
            .get();
        assert_eq!(after, before + 1);
    }

    #[test]
    fn test_all_metrics_register() {
        let registry = prometheus::Registry::new();
        for metric in all_metrics() {
            registry.register(metric).unwrap();
        }
    }
}
