//! Metrics collection and exposition.
//!
//! # Metrics
//! - `distributor_requests_total` (counter): proxied requests by method, status, pod
//! - `distributor_request_duration_seconds` (histogram): proxied request latency
//! - `distributor_placements_total` (counter): placements by kind
//! - `distributor_tunnels_total` (counter): tunnels opened/closed/failed
//! - `distributor_active_tunnels` (gauge): tunnels relaying on this instance
//! - `distributor_tunnel_duration_seconds` (histogram): tunnel lifetime
//! - `distributor_store_errors_total` (counter): store failures by operation
//! - `pod_agent_heartbeats_total` (counter): heartbeat writes by result
//!
//! Without an installed recorder every call is a no-op.

use std::net::SocketAddr;
use std::time::{Duration, Instant};

use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;

/// Install the Prometheus recorder with its own HTTP listener.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics endpoint listening"),
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to install metrics exporter"),
    }
}

pub fn record_request(method: &str, status: u16, pod: &str, start: Instant) {
    counter!(
        "distributor_requests_total",
        "method" => method.to_string(),
        "status" => status.to_string(),
        "pod" => pod.to_string()
    )
    .increment(1);
    histogram!("distributor_request_duration_seconds", "method" => method.to_string())
        .record(start.elapsed().as_secs_f64());
}

pub fn record_placement(kind: &'static str) {
    counter!("distributor_placements_total", "kind" => kind).increment(1);
}

pub fn record_tunnel_opened() {
    counter!("distributor_tunnels_total", "event" => "opened").increment(1);
    gauge!("distributor_active_tunnels").increment(1.0);
}

pub fn record_tunnel_closed(lifetime: Duration) {
    counter!("distributor_tunnels_total", "event" => "closed").increment(1);
    gauge!("distributor_active_tunnels").decrement(1.0);
    histogram!("distributor_tunnel_duration_seconds").record(lifetime.as_secs_f64());
}

pub fn record_tunnel_failed() {
    counter!("distributor_tunnels_total", "event" => "failed").increment(1);
}

pub fn record_store_error(operation: &'static str) {
    counter!("distributor_store_errors_total", "operation" => operation).increment(1);
}

pub fn record_heartbeat(ok: bool) {
    let result = if ok { "ok" } else { "error" };
    counter!("pod_agent_heartbeats_total", "result" => result).increment(1);
}
