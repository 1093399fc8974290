//! Prometheus metrics for the API server.

use axum::body::Body;
use axum::extract::MatchedPath;
use axum::http::{Request, Response};
use axum::middleware::Next;
use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder, PrometheusHandle};
use std::time::Instant;

/// Install the Prometheus recorder, returning the handle `/metrics` renders.
pub fn init_metrics() -> Result<PrometheusHandle, BuildError> {
    PrometheusBuilder::new().install_recorder()
}

/// Metric names as constants for consistency.
pub mod names {
    // HTTP metrics
    pub const HTTP_REQUESTS_TOTAL: &str = "vidiox_http_requests_total";
    pub const HTTP_REQUEST_DURATION_SECONDS: &str = "vidiox_http_request_duration_seconds";
    pub const HTTP_REQUESTS_IN_FLIGHT: &str = "vidiox_http_requests_in_flight";

    // Job submission
    pub const JOBS_ENQUEUED_TOTAL: &str = "vidiox_jobs_enqueued_total";
    pub const JOBS_REJECTED_TOTAL: &str = "vidiox_jobs_rejected_total";
    pub const UPLOAD_BYTES: &str = "vidiox_upload_bytes";
}

/// Record an HTTP request.
pub fn record_http_request(method: &str, path: &str, status: u16, duration_secs: f64) {
    let labels = [
        ("method", method.to_string()),
        ("path", path.to_string()),
        ("status", status.to_string()),
    ];

    counter!(names::HTTP_REQUESTS_TOTAL, &labels).increment(1);
    histogram!(names::HTTP_REQUEST_DURATION_SECONDS, &labels).record(duration_secs);
}

/// Record an accepted upload.
pub fn record_job_enqueued(upload_bytes: u64) {
    counter!(names::JOBS_ENQUEUED_TOTAL).increment(1);
    histogram!(names::UPLOAD_BYTES).record(upload_bytes as f64);
}

/// Record an upload refused after it was stored.
pub fn record_job_rejected(reason: &'static str) {
    counter!(names::JOBS_REJECTED_TOTAL, "reason" => reason).increment(1);
}

/// Metrics middleware for HTTP requests.
///
/// Requests are labelled by route template so IDs don't explode cardinality.
pub async fn metrics_middleware(request: Request<Body>, next: Next) -> Response<Body> {
    let method = request.method().to_string();
    let path = request
        .extensions()
        .get::<MatchedPath>()
        .map(|p| p.as_str().to_string())
        .unwrap_or_else(|| "unmatched".to_string());
    let start = Instant::now();

    gauge!(names::HTTP_REQUESTS_IN_FLIGHT).increment(1.0);
    let response = next.run(request).await;
    gauge!(names::HTTP_REQUESTS_IN_FLIGHT).decrement(1.0);

    record_http_request(
        &method,
        &path,
        response.status().as_u16(),
        start.elapsed().as_secs_f64(),
    );

    response
}
