/// Metrics and telemetry for the binding service
///
/// Provides Prometheus-compatible metrics for monitoring:
/// - HTTP request counts and latencies
/// - Bind outcomes
/// - Resolution cache hits/misses and outcomes
/// - Topic scan page statuses and scan latency

use axum::{
    extract::{MatchedPath, Request},
    middleware::Next,
    response::Response,
};
use lazy_static::lazy_static;
use prometheus::{
    register_histogram, register_histogram_vec, register_int_counter_vec, Encoder, Histogram,
    HistogramVec, IntCounterVec, TextEncoder,
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

    // ========== Binding Metrics ==========

    /// Bind attempts by outcome
    pub static ref BIND_ATTEMPTS_TOTAL: IntCounterVec = register_int_counter_vec!(
        "bind_attempts_total",
        "Total number of bind attempts",
        &["proof_type", "outcome"]
    )
    .unwrap();

    // ========== Resolution Metrics ==========

    /// Resolution cache lookups
    pub static ref RESOLVE_CACHE_TOTAL: IntCounterVec = register_int_counter_vec!(
        "resolve_cache_total",
        "Resolution cache lookups by result",
        &["result"]
    )
    .unwrap();

    /// Completed resolutions by outcome
    pub static ref RESOLUTIONS_TOTAL: IntCounterVec = register_int_counter_vec!(
        "resolutions_total",
        "Total number of resolutions",
        &["outcome"]
    )
    .unwrap();

    /// Topic pages fetched by status
    pub static ref SCAN_PAGES_TOTAL: IntCounterVec = register_int_counter_vec!(
        "scan_pages_total",
        "Topic pages fetched during resolution scans",
        &["status"]
    )
    .unwrap();

    /// Duration of a full topic scan
    pub static ref SCAN_DURATION_SECONDS: Histogram = register_histogram!(
        "scan_duration_seconds",
        "Topic scan latencies in seconds",
        vec![0.01, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0]
    )
    .unwrap();
}

/// Render metrics in Prometheus text format
pub fn render_metrics() -> String {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        tracing::error!("Failed to encode metrics: {}", e);
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

/// Record a bind attempt
pub fn record_bind(proof_type: &str, outcome: &str) {
    BIND_ATTEMPTS_TOTAL
        .with_label_values(&[proof_type, outcome])
        .inc();
}

/// Record a resolution cache lookup
pub fn record_cache_access(hit: bool) {
    RESOLVE_CACHE_TOTAL
        .with_label_values(&[if hit { "hit" } else { "miss" }])
        .inc();
}

/// Record a completed resolution
pub fn record_resolution(found: bool) {
    RESOLUTIONS_TOTAL
        .with_label_values(&[if found { "found" } else { "not_found" }])
        .inc();
}

/// Record a fetched topic page
pub fn record_scan_page(status: &str) {
    SCAN_PAGES_TOTAL.with_label_values(&[status]).inc();
}

/// Record a finished scan
pub fn record_scan_duration(duration: f64) {
    SCAN_DURATION_SECONDS.observe(duration);
}

/// Middleware recording request counts and latencies per matched route
pub async fn track_http_metrics(request: Request, next: Next) -> Response {
    let start = Instant::now();
    let method = request.method().to_string();
    // Matched route keeps label cardinality bounded
    let path = request
        .extensions()
        .get::<MatchedPath>()
        .map(|p| p.as_str().to_string())
        .unwrap_or_else(|| "unmatched".to_string());

    let response = next.run(request).await;

    record_http_request(
        &method,
        &path,
        response.status().as_u16(),
        start.elapsed().as_secs_f64(),
    );

    response
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_http_request() {
        record_http_request("GET", "/v1/resolve", 200, 0.05);
        let metrics = render_metrics();
        assert!(metrics.contains("http_requests_total"));
        assert!(metrics.contains("http_request_duration_seconds"));
    }

    #[test]
    fn test_record_binding_and_resolution() {
        record_bind("signature", "accepted");
        record_cache_access(true);
        record_cache_access(false);
        record_resolution(false);
        record_scan_page("fetched");
        record_scan_duration(0.2);

        let metrics = render_metrics();
        assert!(metrics.contains("bind_attempts_total"));
        assert!(metrics.contains("resolve_cache_total"));
        assert!(metrics.contains("resolutions_total"));
        assert!(metrics.contains("scan_pages_total"));
        assert!(metrics.contains("scan_duration_seconds"));
    }
}
