//! Metrics collection and exposition.
//!
//! # Metrics
//! - `gateway_requests_total` (counter): requests by method, route class, status
//! - `gateway_request_duration_seconds` (histogram): latency by route class
//! - `gateway_quota_rejections_total` (counter): 429s by route class
//! - `gateway_credential_failures_total` (counter): auth failures by kind
//! - `gateway_validation_failures_total` (counter): rejected payloads by route class
//! - `gateway_failures_total` (counter): normalized failures by kind, status
//!
//! # Design Decisions
//! - Recording goes through the `metrics` facade; without an installed
//!   recorder every call is a no-op, so tests need no setup
//! - Labels are bounded enums (class, kind), never raw paths

use std::net::SocketAddr;
use std::time::Instant;

use metrics::{counter, histogram};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};

/// Start the Prometheus scrape endpoint on `addr`.
pub fn init_metrics(addr: SocketAddr) -> Result<(), BuildError> {
    PrometheusBuilder::new().with_http_listener(addr).install()?;
    tracing::info!(address = %addr, "Metrics endpoint listening");
    Ok(())
}

pub fn record_request(method: &str, class: &'static str, status: u16, start: Instant) {
    counter!(
        "gateway_requests_total",
        "method" => method.to_string(),
        "class" => class,
        "status" => status.to_string()
    )
    .increment(1);
    histogram!("gateway_request_duration_seconds", "class" => class)
        .record(start.elapsed().as_secs_f64());
}

pub fn record_quota_rejection(class: &'static str) {
    counter!("gateway_quota_rejections_total", "class" => class).increment(1);
}

pub fn record_credential_failure(kind: &'static str) {
    counter!("gateway_credential_failures_total", "kind" => kind).increment(1);
}

pub fn record_validation_failure(class: &'static str, violations: usize) {
    counter!("gateway_validation_failures_total", "class" => class).increment(1);
    histogram!("gateway_validation_violations", "class" => class).record(violations as f64);
}

pub fn record_failure(kind: &'static str, status: u16) {
    counter!(
        "gateway_failures_total",
        "kind" => kind,
        "status" => status.to_string()
    )
    .increment(1);
}
