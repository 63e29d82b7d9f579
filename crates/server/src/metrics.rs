//! Prometheus metrics for observability.
//!
//! The server registry holds the core poll/emission collectors, HTTP request
//! metrics, and gauges refreshed from application state on every scrape.

use once_cell::sync::Lazy;
use prometheus::{
    self, Encoder, HistogramOpts, HistogramVec, IntCounterVec, IntGauge, IntGaugeVec, Opts,
    Registry, TextEncoder,
};

use orbitwatch_core::RecordKind;

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
            "orbitwatch_http_request_duration_seconds",
            "HTTP request duration in seconds",
        )
        .buckets(vec![
            0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0,
        ]),
        &["method", "path", "status"],
    )
    .unwrap()
});

/// HTTP requests total count.
pub static HTTP_REQUESTS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("orbitwatch_http_requests_total", "Total HTTP requests"),
        &["method", "path", "status"],
    )
    .unwrap()
});

/// HTTP requests currently in flight.
pub static HTTP_REQUESTS_IN_FLIGHT: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::new(
        "orbitwatch_http_requests_in_flight",
        "Number of HTTP requests currently being processed",
    )
    .unwrap()
});

// =============================================================================
// State Gauges (collected dynamically)
// =============================================================================

/// Keys held in last-known state by record kind.
pub static TRACKED_KEYS: Lazy<IntGaugeVec> = Lazy::new(|| {
    IntGaugeVec::new(
        Opts::new(
            "orbitwatch_tracked_keys",
            "Keys held in last-known state by record kind",
        ),
        &["kind"],
    )
    .unwrap()
});

/// Scheduler running state (1 = running, 0 = stopped).
pub static SCHEDULER_RUNNING: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::new(
        "orbitwatch_scheduler_running",
        "Whether the poll scheduler is running (1) or stopped (0)",
    )
    .unwrap()
});

/// Per-source enabled flag.
pub static SOURCE_ENABLED: Lazy<IntGaugeVec> = Lazy::new(|| {
    IntGaugeVec::new(
        Opts::new(
            "orbitwatch_source_enabled",
            "Whether a source is enabled (1) or disabled (0)",
        ),
        &["source"],
    )
    .unwrap()
});

/// Per-source in-flight flag.
pub static SOURCE_IN_FLIGHT: Lazy<IntGaugeVec> = Lazy::new(|| {
    IntGaugeVec::new(
        Opts::new(
            "orbitwatch_source_in_flight",
            "Whether a source has a poll cycle running (1) or not (0)",
        ),
        &["source"],
    )
    .unwrap()
});

// =============================================================================
// Registration
// =============================================================================

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

    // State
    registry.register(Box::new(TRACKED_KEYS.clone())).unwrap();
    registry
        .register(Box::new(SCHEDULER_RUNNING.clone()))
        .unwrap();
    registry.register(Box::new(SOURCE_ENABLED.clone())).unwrap();
    registry
        .register(Box::new(SOURCE_IN_FLIGHT.clone()))
        .unwrap();

    // Core metrics (poll cycles, fetches, decisions, emissions)
    for metric in orbitwatch_core::metrics::all_metrics() {
        registry.register(metric).unwrap();
    }
}

/// Encode all metrics as Prometheus text format.
pub fn encode_metrics() -> String {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();
    let mut buffer = Vec::new();
    encoder.encode(&metric_families, &mut buffer).unwrap();
    String::from_utf8(buffer).unwrap()
}

/// Collect dynamic metrics from current application state.
///
/// Called before encoding so gauges reflect the scheduler and cache at scrape time.
pub fn collect_dynamic_metrics(state: &AppState) {
    let status = state.scheduler().status();
    SCHEDULER_RUNNING.set(i64::from(status.running));
    for source in &status.sources {
        SOURCE_ENABLED
            .with_label_values(&[source.name.as_str()])
            .set(i64::from(source.enabled));
        SOURCE_IN_FLIGHT
            .with_label_values(&[source.name.as_str()])
            .set(i64::from(source.in_flight));
    }

    let detector = state.detector();
    for kind in RecordKind::ALL {
        TRACKED_KEYS
            .with_label_values(&[kind.as_str()])
            .set(detector.tracked_keys(kind) as i64);
    }
}
