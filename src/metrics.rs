// Prometheus metrics definitions for the territory backend.

use lazy_static::lazy_static;
use prometheus::{
    Encoder, HistogramOpts, HistogramVec, IntCounter, IntCounterVec, IntGauge, Opts, Registry,
    TextEncoder,
};

lazy_static! {
    pub static ref REGISTRY: Registry = Registry::new();

    // ── Gauges ───────────────────────────────────────────────────────

    /// Live WebSocket connections on the map event channel.
    pub static ref CONNECTED_WEBSOCKETS: IntGauge =
        IntGauge::new("territory_connected_websockets", "Live WebSocket connections").unwrap();

    /// Map rooms currently open in the hub.
    pub static ref ACTIVE_ROOMS: IntGauge =
        IntGauge::new("territory_active_rooms", "Map rooms with subscribers").unwrap();

    // ── Counters ─────────────────────────────────────────────────────

    /// Events published to map rooms, by event name.
    pub static ref EVENTS_PUBLISHED_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("territory_events_published_total", "Map events published"),
        &["event"],
    )
    .unwrap();

    /// Territory sets persisted.
    pub static ref TERRITORY_SETS_SAVED_TOTAL: IntCounter = IntCounter::new(
        "territory_sets_saved_total",
        "Territory sets saved",
    )
    .unwrap();

    /// Territory sets rejected by validation.
    pub static ref VALIDATION_FAILURES_TOTAL: IntCounter = IntCounter::new(
        "territory_validation_failures_total",
        "Territory sets rejected by validation",
    )
    .unwrap();

    /// Total API requests, by method/endpoint/status.
    pub static ref API_REQUESTS_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("territory_api_requests_total", "Total API requests"),
        &["method", "endpoint", "status"],
    )
    .unwrap();

    // ── Histograms ───────────────────────────────────────────────────

    /// API request duration in seconds, by endpoint.
    pub static ref API_REQUEST_DURATION_SECONDS: HistogramVec = HistogramVec::new(
        HistogramOpts::new(
            "territory_api_request_duration_seconds",
            "API request duration in seconds",
        )
        .buckets(vec![0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 5.0]),
        &["endpoint"],
    )
    .unwrap();
}

/// Register all metrics with the custom registry. Call once at startup.
pub fn register_metrics() {
    let collectors: Vec<Box<dyn prometheus::core::Collector>> = vec![
        Box::new(CONNECTED_WEBSOCKETS.clone()),
        Box::new(ACTIVE_ROOMS.clone()),
        Box::new(EVENTS_PUBLISHED_TOTAL.clone()),
        Box::new(TERRITORY_SETS_SAVED_TOTAL.clone()),
        Box::new(VALIDATION_FAILURES_TOTAL.clone()),
        Box::new(API_REQUESTS_TOTAL.clone()),
        Box::new(API_REQUEST_DURATION_SECONDS.clone()),
    ];

    for c in collectors {
        if let Err(e) = REGISTRY.register(c) {
            tracing::warn!("Metric registration skipped: {e}");
        }
    }
}

/// Serialize all registered metrics to the Prometheus text exposition format.
pub fn gather_metrics() -> String {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();
    let mut buffer = Vec::new();
    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        tracing::error!("Failed to encode metrics: {e}");
        return String::new();
    }
    String::from_utf8(buffer).unwrap_or_default()
}

/// Normalize a URL path for metric labels: map ids become `:id` so every
/// map shares one label.
pub fn normalize_path(path: &str) -> String {
    let segments: Vec<&str> = path.split('/').collect();
    segments
        .iter()
        .enumerate()
        .map(|(i, segment)| {
            let after_maps = i > 0 && segments[i - 1] == "maps";
            if after_maps || segment.parse::<i64>().is_ok() {
                ":id"
            } else {
                segment
            }
        })
        .collect::<Vec<_>>()
        .join("/")
}
