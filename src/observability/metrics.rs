//! Metrics collection and exposition.
//!
//! # Metrics
//! - `router_requests_total` (counter): requests by method, route, status
//! - `router_request_duration_seconds` (histogram): latency by method, route
//! - `router_errors_total` (counter): translated errors by class, kind
//! - `router_post_process_failures_total` (counter): failed post-process hooks by route
//!
//! # Design Decisions
//! - The route label is the registered pattern, never the raw path
//! - Recording without an installed exporter is a no-op

use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;
use std::time::Instant;

/// Install the Prometheus exporter with an HTTP scrape listener.
///
/// Must be called from within a Tokio runtime.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics exporter listening"),
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to install metrics exporter"),
    }
}

/// Record a completed request.
pub fn record_request(method: &str, route: &str, status: u16, start: Instant) {
    let method = method.to_string();
    let route = route.to_string();

    metrics::counter!(
        "router_requests_total",
        "method" => method.clone(),
        "route" => route.clone(),
        "status" => status.to_string()
    )
    .increment(1);

    metrics::histogram!(
        "router_request_duration_seconds",
        "method" => method,
        "route" => route
    )
    .record(start.elapsed().as_secs_f64());
}

/// Record a translated error.
pub fn record_error(class: &str, kind: &str) {
    metrics::counter!(
        "router_errors_total",
        "class" => class.to_string(),
        "kind" => kind.to_string()
    )
    .increment(1);
}

pub fn record_post_process_failure(route: &str) {
    metrics::counter!("router_post_process_failures_total", "route" => route.to_string()).increment(1);
}
