//! Metrics collection and exposition.
//!
//! # Metrics
//! - `web_guard_requests_total` (counter): requests by method, status, route
//! - `web_guard_request_duration_seconds` (histogram): latency by route
//! - `web_guard_guard_rejections_total` (counter): pipeline rejections by guard
//! - `web_guard_rate_limited_total` (counter): throttled requests by route

use std::net::SocketAddr;
use std::time::Instant;

use metrics::{counter, histogram};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};

/// Start the Prometheus scrape listener on `addr`.
pub fn init_metrics(addr: SocketAddr) -> Result<(), BuildError> {
    PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()?;
    tracing::info!(address = %addr, "Metrics exporter listening");
    Ok(())
}

pub fn record_request(method: &str, status: u16, route: &str, started: Instant) {
    counter!(
        "web_guard_requests_total",
        "method" => method.to_string(),
        "status" => status.to_string(),
        "route" => route.to_string()
    )
    .increment(1);
    histogram!("web_guard_request_duration_seconds", "route" => route.to_string())
        .record(started.elapsed().as_secs_f64());
}

/// `guard` is the rejecting stage, e.g. `csrf`, `auth`, `signed`.
pub fn record_guard_rejection(guard: &'static str) {
    counter!("web_guard_guard_rejections_total", "guard" => guard).increment(1);
}

pub fn record_rate_limited(route: &str) {
    counter!("web_guard_rate_limited_total", "route" => route.to_string()).increment(1);
}
