//! Metrics collection and exposition.
//!
//! # Metrics
//! - `relay_requests_total` (counter): inbound requests by route, status
//! - `relay_request_duration_seconds` (histogram): inbound latency by route
//! - `relay_upstream_attempts_total` (counter): upstream calls by operation, outcome
//! - `relay_retries_total` (counter): backoff waits by operation
//! - `relay_circuit_transitions_total` (counter): breaker transitions by from, to
//! - `relay_circuit_state` (gauge): 0=closed, 1=open, 2=half-open
//! - `relay_fanout_tasks` (histogram): child fetches per read request
//!
//! # Design Decisions
//! - Recording goes through the `metrics` facade; without an installed
//!   recorder every call is a no-op, so tests need no setup
//! - Prometheus exporter runs its own listener, separate from the API port

use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};
use std::net::SocketAddr;
use std::time::Instant;

/// Install the Prometheus recorder and its scrape listener.
pub fn init_metrics(addr: SocketAddr) -> Result<(), BuildError> {
    PrometheusBuilder::new().with_http_listener(addr).install()?;

    describe_counter!("relay_requests_total", "Inbound requests by route and status");
    describe_histogram!("relay_request_duration_seconds", "Inbound request latency");
    describe_counter!("relay_upstream_attempts_total", "Upstream calls by operation and outcome");
    describe_counter!("relay_retries_total", "Backoff waits before a retried upstream call");
    describe_counter!("relay_circuit_transitions_total", "Circuit breaker state transitions");
    describe_gauge!("relay_circuit_state", "Circuit breaker state (0 closed, 1 open, 2 half-open)");
    describe_histogram!("relay_fanout_tasks", "Child fetches per read request");

    tracing::info!(address = %addr, "Metrics endpoint listening");
    Ok(())
}

/// Record a completed inbound request.
pub fn record_request(route: &'static str, status: u16, start: Instant) {
    counter!("relay_requests_total", "route" => route, "status" => status.to_string()).increment(1);
    histogram!("relay_request_duration_seconds", "route" => route).record(start.elapsed().as_secs_f64());
}

/// Record one upstream call.
pub fn record_upstream_attempt(operation: &'static str, outcome: &'static str) {
    counter!("relay_upstream_attempts_total", "operation" => operation, "outcome" => outcome).increment(1);
}

/// Record a backoff wait.
pub fn record_retry(operation: &'static str) {
    counter!("relay_retries_total", "operation" => operation).increment(1);
}

/// Record a breaker transition and publish the new state.
pub fn record_circuit_transition(from: &'static str, to: &'static str) {
    counter!("relay_circuit_transitions_total", "from" => from, "to" => to).increment(1);
    let value = match to {
        "open" => 1.0,
        "half_open" => 2.0,
        _ => 0.0,
    };
    gauge!("relay_circuit_state").set(value);
}

/// Record the size of a read fan-out.
pub fn record_fanout(tasks: usize) {
    histogram!("relay_fanout_tasks").record(tasks as f64);
}
