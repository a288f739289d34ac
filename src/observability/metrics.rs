//! Metrics collection and exposition.
//!
//! # Metrics
//! - `session_handshakes_total` (counter): handshake calls by outcome
//! - `session_stops_total` (counter): stop calls received
//! - `session_stop_subscribers_released` (gauge): subscribers released by the stop that fired; repeats leave it unchanged
//! - `session_rpc_duration_seconds` (histogram): RPC latency by method
//! - `session_tasks_active` (gauge): session-scoped background tasks
//!
//! # Design Decisions
//! - Recording is a no-op until an exporter is installed
//! - Labels for method and outcome only

use std::net::SocketAddr;
use std::time::Instant;

use metrics_exporter_prometheus::PrometheusBuilder;

/// Install the Prometheus exporter on `addr`.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics exporter listening"),
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to install metrics exporter"),
    }
}

pub fn record_handshake(outcome: &'static str, start: Instant) {
    metrics::counter!("session_handshakes_total", "outcome" => outcome).increment(1);
    metrics::histogram!("session_rpc_duration_seconds", "method" => "handshake")
        .record(start.elapsed().as_secs_f64());
}

pub fn record_stop(released: usize, start: Instant) {
    metrics::counter!("session_stops_total").increment(1);
    if released > 0 {
        metrics::gauge!("session_stop_subscribers_released").set(released as f64);
    }
    metrics::histogram!("session_rpc_duration_seconds", "method" => "stop")
        .record(start.elapsed().as_secs_f64());
}

pub fn record_session_tasks(active: usize) {
    metrics::gauge!("session_tasks_active").set(active as f64);
}
