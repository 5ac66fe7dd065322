//! Metrics collection and exposition.
//!
//! # Metrics
//! - `stakeflow_retries_total` (counter): retries by operation and failure class
//! - `stakeflow_retries_exhausted_total` (counter): guarded calls that gave up
//! - `stakeflow_endpoint_probes_total` (counter): probes by endpoint and result
//! - `stakeflow_endpoint_health` (gauge): 1=healthy, 0=unhealthy
//! - `stakeflow_connectivity_online` (gauge): 1=online, 0=offline
//! - `stakeflow_confirmation_outcomes_total` (counter): terminal outcomes
//! - `stakeflow_operations_total` (counter): orchestrated operations by kind and result

use std::net::SocketAddr;

use metrics_exporter_prometheus::PrometheusBuilder;

use crate::resilience::retries::Retryability;

/// Install the Prometheus exporter and its HTTP listener.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics exporter listening"),
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to install metrics exporter"),
    }
}

pub fn record_retry(operation: &'static str, class: Retryability) {
    metrics::counter!("stakeflow_retries_total", "operation" => operation, "class" => class.as_str()).increment(1);
}

pub fn record_retry_exhausted(operation: &'static str) {
    metrics::counter!("stakeflow_retries_exhausted_total", "operation" => operation).increment(1);
}

pub fn record_probe(endpoint: &str, healthy: bool) {
    let result = if healthy { "ok" } else { "failed" };
    metrics::counter!("stakeflow_endpoint_probes_total", "endpoint" => endpoint.to_string(), "result" => result)
        .increment(1);
    metrics::gauge!("stakeflow_endpoint_health", "endpoint" => endpoint.to_string())
        .set(if healthy { 1.0 } else { 0.0 });
}

pub fn record_connectivity(online: bool) {
    metrics::gauge!("stakeflow_connectivity_online").set(if online { 1.0 } else { 0.0 });
}

pub fn record_confirmation_outcome(outcome: &'static str) {
    metrics::counter!("stakeflow_confirmation_outcomes_total", "outcome" => outcome).increment(1);
}

pub fn record_operation(kind: &'static str, result: &'static str) {
    metrics::counter!("stakeflow_operations_total", "kind" => kind, "result" => result).increment(1);
}
