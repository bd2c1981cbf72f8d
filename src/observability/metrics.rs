//! Metrics collection and exposition.
//!
//! # Metrics
//! - `gateway_requests_total` (counter): requests by method, status, route
//! - `gateway_request_duration_seconds` (histogram): latency distribution
//! - `gateway_reconcile_total` (counter): reconciliation cycles by outcome
//! - `gateway_reconcile_duration_seconds` (histogram): cycle latency
//! - `gateway_registry_errors_total` (counter): failed registry queries
//! - `gateway_snapshot_generation` (gauge): last published generation
//! - `gateway_clusters` (gauge): clusters in the last published snapshot
//!
//! Without an installed recorder every call is a no-op.

use std::net::SocketAddr;
use std::time::{Duration, Instant};

use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;

use crate::controller::provider::UpdateOutcome;
use crate::controller::snapshot::ConfigSnapshot;

/// Install the Prometheus recorder and its scrape endpoint.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics endpoint listening"),
        Err(e) => tracing::error!(error = %e, "Failed to install metrics exporter"),
    }
}

pub fn record_request(method: &str, status: u16, route: &str, start: Instant) {
    let method = method.to_string();
    let status = status.to_string();
    let route = route.to_string();
    counter!(
        "gateway_requests_total",
        "method" => method.clone(),
        "status" => status.clone(),
        "route" => route.clone()
    )
    .increment(1);
    histogram!(
        "gateway_request_duration_seconds",
        "method" => method,
        "status" => status,
        "route" => route
    )
    .record(start.elapsed().as_secs_f64());
}

pub fn record_reconcile(outcome: &UpdateOutcome, elapsed: Duration) {
    let label = match outcome {
        UpdateOutcome::Published { degraded: false, .. } => "published",
        UpdateOutcome::Published { degraded: true, .. } => "degraded",
        UpdateOutcome::Skipped => "skipped",
        UpdateOutcome::Stopped => "stopped",
    };
    counter!("gateway_reconcile_total", "outcome" => label).increment(1);
    histogram!("gateway_reconcile_duration_seconds").record(elapsed.as_secs_f64());
}

pub fn record_registry_error() {
    counter!("gateway_registry_errors_total").increment(1);
}

pub fn record_snapshot(snapshot: &ConfigSnapshot) {
    gauge!("gateway_snapshot_generation").set(snapshot.generation() as f64);
    gauge!("gateway_clusters").set(snapshot.clusters().len() as f64);
}
