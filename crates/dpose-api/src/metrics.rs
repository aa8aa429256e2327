//! Prometheus metrics for the API server.

use axum::body::Body;
use axum::http::{Request, Response};
use axum::middleware::Next;
use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder, PrometheusHandle};
use std::time::Instant;

use dpose_models::VideoSummary;

/// Initialize the Prometheus metrics recorder.
/// Returns a handle that can be used to render metrics.
pub fn init_metrics() -> Result<PrometheusHandle, BuildError> {
    PrometheusBuilder::new().install_recorder()
}

/// Metric names as constants for consistency.
pub mod names {
    // HTTP metrics
    pub const HTTP_REQUESTS_TOTAL: &str = "dpose_http_requests_total";
    pub const HTTP_REQUEST_DURATION_SECONDS: &str = "dpose_http_request_duration_seconds";
    pub const HTTP_REQUESTS_IN_FLIGHT: &str = "dpose_http_requests_in_flight";

    // Analysis metrics
    pub const ANALYSES_TOTAL: &str = "dpose_analyses_total";
    pub const ANALYSIS_DURATION_SECONDS: &str = "dpose_analysis_duration_seconds";
    pub const FRAMES_PROCESSED_TOTAL: &str = "dpose_frames_processed_total";
    pub const POSE_LABELS_TOTAL: &str = "dpose_pose_labels_total";

    // Rate limiting metrics
    pub const RATE_LIMIT_HITS_TOTAL: &str = "dpose_rate_limit_hits_total";
}

/// Routes reported by name; anything else is grouped as `other`.
const KNOWN_PATHS: &[&str] = &["/analyze", "/health", "/healthz", "/ready", "/metrics"];

/// Record an HTTP request.
pub fn record_http_request(method: &str, path: &str, status: u16, duration_secs: f64) {
    let labels = [
        ("method", method.to_string()),
        ("path", sanitize_path(path).to_string()),
        ("status", status.to_string()),
    ];

    counter!(names::HTTP_REQUESTS_TOTAL, &labels).increment(1);
    histogram!(names::HTTP_REQUEST_DURATION_SECONDS, &labels).record(duration_secs);
}

/// Record a finished analysis run.
pub fn record_analysis(outcome: &str, duration_secs: f64) {
    let labels = [("outcome", outcome.to_string())];
    counter!(names::ANALYSES_TOTAL, &labels).increment(1);
    histogram!(names::ANALYSIS_DURATION_SECONDS, &labels).record(duration_secs);
}

/// Record frames and labels from a completed summary.
pub fn record_summary(summary: &VideoSummary) {
    counter!(names::FRAMES_PROCESSED_TOTAL).increment(summary.total_frames as u64);
    for (label, count) in &summary.pose_counts {
        let labels = [("label", label.as_str().to_string())];
        counter!(names::POSE_LABELS_TOTAL, &labels).increment(*count as u64);
    }
}

/// Record rate limit hit.
pub fn record_rate_limit_hit(endpoint: &str) {
    let labels = [("endpoint", sanitize_path(endpoint).to_string())];
    counter!(names::RATE_LIMIT_HITS_TOTAL, &labels).increment(1);
}

/// Collapse arbitrary request paths to a bounded label set.
fn sanitize_path(path: &str) -> &str {
    KNOWN_PATHS
        .iter()
        .find(|known| **known == path)
        .copied()
        .unwrap_or("other")
}

/// Metrics middleware for HTTP requests.
pub async fn metrics_middleware(request: Request<Body>, next: Next) -> Response<Body> {
    let method = request.method().to_string();
    let path = request.uri().path().to_string();
    let start = Instant::now();

    gauge!(names::HTTP_REQUESTS_IN_FLIGHT).increment(1.0);

    let response = next.run(request).await;

    gauge!(names::HTTP_REQUESTS_IN_FLIGHT).decrement(1.0);

    let status = response.status().as_u16();
    let duration = start.elapsed().as_secs_f64();

    record_http_request(&method, &path, status, duration);

    response
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_path() {
        assert_eq!(sanitize_path("/analyze"), "/analyze");
        assert_eq!(sanitize_path("/healthz"), "/healthz");
        assert_eq!(sanitize_path("/wp-admin/setup.php"), "other");
    }
}
