//! Metrics collection and exposition.
//!
//! # Metrics
//! - `rdap_fetch_total` (counter): fetch outcomes by `outcome`
//! - `rdap_fetch_duration_seconds` (histogram): end-to-end fetch latency
//! - `rdap_retries_total` (counter): retry attempts scheduled
//! - `rdap_cache_events_total` (counter): hits, misses, errors by `event`
//! - `rdap_rate_limited_total` (counter): admissions denied
//! - `rdap_circuit_state` (gauge): 0=closed, 1=half-open, 2=open
//! - `rdap_pool_connections` (gauge): tracked connections per `host`
//! - `rdap_bootstrap_fetch_total` (counter): dataset refreshes by `kind`

use std::net::SocketAddr;
use std::time::Instant;

use metrics_exporter_prometheus::PrometheusBuilder;

/// Install the Prometheus exporter on `addr`.
///
/// Must be called from within a Tokio runtime.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics exporter listening"),
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to install metrics exporter"),
    }
}

pub fn record_fetch(outcome: &'static str, start: Instant) {
    metrics::counter!("rdap_fetch_total", "outcome" => outcome).increment(1);
    metrics::histogram!("rdap_fetch_duration_seconds").record(start.elapsed().as_secs_f64());
}

pub fn record_retry() {
    metrics::counter!("rdap_retries_total").increment(1);
}

pub fn record_cache_event(event: &'static str) {
    metrics::counter!("rdap_cache_events_total", "event" => event).increment(1);
}

pub fn record_rate_limited() {
    metrics::counter!("rdap_rate_limited_total").increment(1);
}

pub fn record_circuit_state(state: u8) {
    metrics::gauge!("rdap_circuit_state").set(f64::from(state));
}

pub fn record_pool_size(host: &str, connections: usize) {
    metrics::gauge!("rdap_pool_connections", "host" => host.to_string()).set(connections as f64);
}

pub fn record_bootstrap_fetch(kind: &'static str) {
    metrics::counter!("rdap_bootstrap_fetch_total", "kind" => kind).increment(1);
}
