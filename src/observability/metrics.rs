//! Metrics collection and exposition.
//!
//! # Metrics
//! - `http_requests_total` (counter): request heads accepted and answered
//! - `http_requests_rejected_total` (counter): refused requests by `reason`
//! - `http_active_connections` (gauge): current connection count

use std::net::SocketAddr;

use metrics_exporter_prometheus::PrometheusBuilder;

/// Start the Prometheus scrape endpoint.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics endpoint started"),
        Err(e) => tracing::error!(error = %e, "Failed to install metrics exporter"),
    }
}

pub fn record_request() {
    metrics::counter!("http_requests_total").increment(1);
}

/// `reason` is the stable string of the refusal, e.g. `header_count_exceeded`.
pub fn record_rejection(reason: &'static str) {
    metrics::counter!("http_requests_rejected_total", "reason" => reason).increment(1);
}

pub fn set_active_connections(count: u64) {
    metrics::gauge!("http_active_connections").set(count as f64);
}
