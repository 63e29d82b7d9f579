//! Prometheus metrics for core components.
//!
//! This module provides metrics for:
//! - Poll scheduler (cycles started and skipped, fetch results and latency)
//! - Change detection (decisions per record kind)
//! - Event emission (publish outcomes per topic)

use once_cell::sync::Lazy;
use prometheus::{HistogramOpts, HistogramVec, IntCounterVec, Opts};

// =============================================================================
// Scheduler Metrics
// =============================================================================

/// Poll cycles started by source.
pub static CYCLES_STARTED: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("orbitwatch_cycles_started_total", "Total poll cycles started"),
        &["source"],
    )
    .unwrap()
});

/// Ticks suppressed because the previous cycle was still in flight.
pub static CYCLES_SKIPPED: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new(
            "orbitwatch_cycles_skipped_total",
            "Poll ticks skipped while a cycle was in flight",
        ),
        &["source"],
    )
    .unwrap()
});

/// Adapter fetches by source and result.
pub static FETCHES_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("orbitwatch_fetches_total", "Total adapter fetches"),
        &["source", "result"], // "ok", "not_found", "unauthenticated", "malformed", "transient"
    )
    .unwrap()
});

/// Adapter fetch latency in seconds.
pub static FETCH_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    HistogramVec::new(
        HistogramOpts::new(
            "orbitwatch_fetch_duration_seconds",
            "Duration of adapter fetches",
        )
        .buckets(vec![0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0]),
        &["source"],
    )
    .unwrap()
});

// =============================================================================
// Detection Metrics
// =============================================================================

/// Change decisions by record kind and outcome.
pub static DECISIONS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("orbitwatch_decisions_total", "Total change decisions"),
        &["kind", "decision"], // decision: "first_observation", "changed", "unchanged"
    )
    .unwrap()
});

// =============================================================================
// Emission Metrics
// =============================================================================

/// Publish outcomes by topic.
pub static EMISSIONS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("orbitwatch_emissions_total", "Total event publish outcomes"),
        &["topic", "result"], // "success", "failure"
    )
    .unwrap()
});

// =============================================================================
// Helper functions
// =============================================================================

/// Get all core metrics for registration in a registry.
pub fn all_metrics() -> Vec<Box<dyn prometheus::core::Collector>> {
    vec![
        // Scheduler
        Box::new(CYCLES_STARTED.clone()),
        Box::new(CYCLES_SKIPPED.clone()),
        Box::new(FETCHES_TOTAL.clone()),
        Box::new(FETCH_DURATION.clone()),
        // Detection
        Box::new(DECISIONS_TOTAL.clone()),
        // Emission
        Box::new(EMISSIONS_TOTAL.clone()),
    ]
}
