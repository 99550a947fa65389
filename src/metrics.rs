//! Prometheus metrics for the discovery service itself.
//!
//! Installs a global Prometheus recorder using `metrics-exporter-prometheus`,
//! defines metric name constants, provides an axum middleware for HTTP RED
//! metrics, and exposes the `/metrics` endpoint handler.

use axum::http::{Request, StatusCode};
use axum::response::{IntoResponse, Response};
use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use std::sync::OnceLock;
use std::time::Instant;
use tracing::warn;

// -- Metric name constants ----------------------------------------------------

/// Total HTTP requests (counter). Labels: method, path, status.
pub const HTTP_REQUESTS_TOTAL: &str = "minio_sd_http_requests_total";

/// HTTP request duration in seconds (histogram). Labels: method, path.
pub const HTTP_REQUEST_DURATION_SECONDS: &str = "minio_sd_http_request_duration_seconds";

/// Service discovery requests (counter). Labels: job, outcome.
pub const DISCOVERY_REQUESTS_TOTAL: &str = "minio_sd_discovery_requests_total";

/// Failed bucket listings (counter).
pub const BUCKET_LISTING_FAILURES_TOTAL: &str = "minio_sd_bucket_listing_failures_total";

/// Buckets returned by the last successful listing (gauge).
pub const BUCKETS_LISTED: &str = "minio_sd_buckets_listed";

/// Buckets that passed the include/exclude filter on the last listing (gauge).
pub const BUCKETS_DISCOVERED: &str = "minio_sd_buckets_discovered";

// -- Global recorder installation ---------------------------------------------

static PROMETHEUS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

/// Install the global Prometheus metrics recorder. Idempotent, so tests may
/// call it repeatedly. Returns a reference to the global handle.
pub fn init_metrics() -> &'static PrometheusHandle {
    PROMETHEUS_HANDLE.get_or_init(|| {
        let recorder = PrometheusBuilder::new().build_recorder();
        let handle = recorder.handle();
        if let Err(e) = metrics::set_global_recorder(recorder) {
            warn!("Prometheus recorder not installed, another recorder is active: {e}");
        }
        handle
    })
}

/// Register metric descriptions with the global recorder. Call once after
/// `init_metrics()`.
pub fn describe_metrics() {
    describe_counter!(HTTP_REQUESTS_TOTAL, "Total HTTP requests");
    describe_histogram!(
        HTTP_REQUEST_DURATION_SECONDS,
        "HTTP request duration in seconds"
    );
    describe_counter!(
        DISCOVERY_REQUESTS_TOTAL,
        "Service discovery requests by job and outcome"
    );
    describe_counter!(
        BUCKET_LISTING_FAILURES_TOTAL,
        "Bucket listings that failed against the cluster"
    );
    describe_gauge!(BUCKETS_LISTED, "Buckets returned by the last listing");
    describe_gauge!(
        BUCKETS_DISCOVERED,
        "Buckets left after include/exclude filtering"
    );
}

// -- Recording helpers --------------------------------------------------------

/// Record the outcome of a `/sd` request.
pub fn record_discovery(job: &str, outcome: &'static str) {
    counter!(DISCOVERY_REQUESTS_TOTAL, "job" => job.to_string(), "outcome" => outcome)
        .increment(1);
}

/// Record the size of a bucket listing before and after filtering.
pub fn record_bucket_counts(listed: usize, discovered: usize) {
    gauge!(BUCKETS_LISTED).set(listed as f64);
    gauge!(BUCKETS_DISCOVERED).set(discovered as f64);
}

/// Record a failed bucket listing.
pub fn record_listing_failure() {
    counter!(BUCKET_LISTING_FAILURES_TOTAL).increment(1);
}

// -- Metrics middleware -------------------------------------------------------

/// Axum middleware that records HTTP RED metrics for every request.
///
/// Excludes `/metrics` from self-instrumentation.
pub async fn metrics_middleware(
    req: Request<axum::body::Body>,
    next: axum::middleware::Next,
) -> Response {
    if req.uri().path() == "/metrics" {
        return next.run(req).await;
    }

    let method = req.method().to_string();
    let path = normalize_path(req.uri().path());

    let start = Instant::now();
    let response = next.run(req).await;
    let duration = start.elapsed().as_secs_f64();
    let status = response.status().as_u16().to_string();

    counter!(HTTP_REQUESTS_TOTAL, "method" => method.clone(), "path" => path.clone(), "status" => status).increment(1);
    histogram!(HTTP_REQUEST_DURATION_SECONDS, "method" => method, "path" => path).record(duration);

    response
}

// -- Path normalization -------------------------------------------------------

/// Map a request path to a bounded label value.
///
/// Known routes keep their path; anything else collapses to `/{other}` so
/// scanners cannot blow up label cardinality.
fn normalize_path(path: &str) -> String {
    match path {
        "/" | "/sd" | "/scrape_configs" | "/health" | "/metrics" | "/openapi.json" => {
            path.to_string()
        }
        _ => "/{other}".to_string(),
    }
}

// -- Metrics endpoint handler -------------------------------------------------

/// `GET /metrics` -- Render Prometheus exposition format text.
pub async fn metrics_handler() -> Response {
    match PROMETHEUS_HANDLE.get() {
        Some(handle) => (
            StatusCode::OK,
            [("content-type", "text/plain; version=0.0.4")],
            handle.render(),
        )
            .into_response(),
        None => (
            StatusCode::SERVICE_UNAVAILABLE,
            "metrics recorder not initialized\n",
        )
            .into_response(),
    }
}

// -- Tests --------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_path_known_routes() {
        for path in ["/", "/sd", "/scrape_configs", "/health", "/metrics", "/openapi.json"] {
            assert_eq!(normalize_path(path), path);
        }
    }

    #[test]
    fn test_normalize_path_unknown() {
        assert_eq!(normalize_path("/wp-admin"), "/{other}");
        assert_eq!(normalize_path("/sd/extra"), "/{other}");
    }

    #[test]
    fn test_init_metrics_is_idempotent() {
        let a = init_metrics() as *const PrometheusHandle;
        let b = init_metrics() as *const PrometheusHandle;
        assert_eq!(a, b);
    }
}
