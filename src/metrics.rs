/// Metrics and telemetry for vidshare
///
/// Provides Prometheus-compatible metrics for monitoring:
/// - HTTP request counts and latencies
/// - Session lifecycle (issue, refresh, logout, rejected refresh)
/// - Relationship toggles and the uniqueness conflicts they resolve

use axum::{
    extract::{MatchedPath, Request},
    middleware::Next,
    response::Response,
};
use lazy_static::lazy_static;
use prometheus::{
    register_histogram_vec, register_int_counter_vec, register_int_gauge, Encoder,
    HistogramVec, IntCounterVec, IntGauge, TextEncoder,
};
use std::time::Instant;

lazy_static! {
    // ========== HTTP Metrics ==========

    /// Total HTTP requests by method, path, and status
    pub static ref HTTP_REQUESTS_TOTAL: IntCounterVec = register_int_counter_vec!(
        "http_requests_total",
        "Total number of HTTP requests",
        &["method", "path", "status"]
    )
    .unwrap();

    /// HTTP request duration in seconds
    pub static ref HTTP_REQUEST_DURATION_SECONDS: HistogramVec = register_histogram_vec!(
        "http_request_duration_seconds",
        "HTTP request latencies in seconds",
        &["method", "path"],
        vec![0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0]
    )
    .unwrap();

    /// Active HTTP requests
    pub static ref HTTP_REQUESTS_ACTIVE: IntGauge = register_int_gauge!(
        "http_requests_active",
        "Number of HTTP requests currently being processed"
    )
    .unwrap();

    // ========== Session Metrics ==========

    /// Session lifecycle events: issued, refreshed, invalidated, rejected
    pub static ref SESSION_EVENTS_TOTAL: IntCounterVec = register_int_counter_vec!(
        "session_events_total",
        "Total number of token lifecycle events",
        &["event"]
    )
    .unwrap();

    // ========== Relationship Metrics ==========

    /// Toggles by relationship kind and resulting state
    pub static ref RELATIONSHIP_TOGGLES_TOTAL: IntCounterVec = register_int_counter_vec!(
        "relationship_toggles_total",
        "Total number of relationship toggles",
        &["kind", "state"]
    )
    .unwrap();

    /// Concurrent creates that hit the uniqueness constraint and resolved to the existing edge
    pub static ref RELATIONSHIP_CONFLICTS_TOTAL: IntCounterVec = register_int_counter_vec!(
        "relationship_conflicts_total",
        "Total number of duplicate edge creates resolved as existing",
        &["kind"]
    )
    .unwrap();
}

/// Render metrics in Prometheus text format
pub fn render_metrics() -> String {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        tracing::warn!("Failed to encode metrics: {}", e);
    }
    String::from_utf8_lossy(&buffer).into_owned()
}

/// Record an HTTP request
pub fn record_http_request(method: &str, path: &str, status: u16, duration: f64) {
    HTTP_REQUESTS_TOTAL
        .with_label_values(&[method, path, &status.to_string()])
        .inc();
    HTTP_REQUEST_DURATION_SECONDS
        .with_label_values(&[method, path])
        .observe(duration);
}

/// Record a token lifecycle event
pub fn record_session_event(event: &str) {
    SESSION_EVENTS_TOTAL.with_label_values(&[event]).inc();
}

/// Record a relationship toggle
pub fn record_toggle(kind: &str, state: &str) {
    RELATIONSHIP_TOGGLES_TOTAL
        .with_label_values(&[kind, state])
        .inc();
}

/// Record a duplicate create resolved as existing
pub fn record_toggle_conflict(kind: &str) {
    RELATIONSHIP_CONFLICTS_TOTAL.with_label_values(&[kind]).inc();
}

/// Middleware recording request count and latency per matched route
pub async fn track_metrics(request: Request, next: Next) -> Response {
    let started = Instant::now();
    let method = request.method().to_string();
    // Route template keeps label cardinality bounded
    let path = request
        .extensions()
        .get::<MatchedPath>()
        .map(|p| p.as_str().to_string())
        .unwrap_or_else(|| "unmatched".to_string());

    HTTP_REQUESTS_ACTIVE.inc();
    let response = next.run(request).await;
    HTTP_REQUESTS_ACTIVE.dec();

    record_http_request(
        &method,
        &path,
        response.status().as_u16(),
        started.elapsed().as_secs_f64(),
    );

    response
}
