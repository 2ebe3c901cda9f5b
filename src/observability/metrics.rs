//! Metrics collection and exposition.
//!
//! # Metrics
//! - `config_client_fetch_total` (counter): fetch attempts by outcome
//! - `config_client_fetch_duration_seconds` (histogram): fetch latency
//! - `config_client_snapshot_swaps_total` (counter): snapshots installed
//! - `config_client_snapshot_keys` (gauge): keys in the current snapshot
//! - `config_client_consecutive_failures` (gauge): current failure streak
//! - `config_client_backoff_seconds` (gauge): delay before the next attempt
//! - `config_client_binding_errors_total` (counter): coercion failures by key
//!
//! Recording is a no-op until [`init_metrics`] installs a recorder.

use std::net::SocketAddr;
use std::time::{Duration, Instant};

use metrics_exporter_prometheus::PrometheusBuilder;

/// Install the Prometheus recorder and its scrape endpoint.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics endpoint listening"),
        Err(e) => tracing::error!(
            address = %addr,
            error = %e,
            "Failed to install metrics exporter"
        ),
    }
}

pub fn record_fetch(outcome: &'static str, start: Instant) {
    ::metrics::counter!("config_client_fetch_total", "outcome" => outcome).increment(1);
    ::metrics::histogram!("config_client_fetch_duration_seconds")
        .record(start.elapsed().as_secs_f64());
}

pub fn record_snapshot_swap(keys: usize) {
    ::metrics::counter!("config_client_snapshot_swaps_total").increment(1);
    ::metrics::gauge!("config_client_snapshot_keys").set(keys as f64);
}

pub fn record_backoff(consecutive_failures: u32, delay: Duration) {
    ::metrics::gauge!("config_client_consecutive_failures").set(consecutive_failures as f64);
    ::metrics::gauge!("config_client_backoff_seconds").set(delay.as_secs_f64());
}

pub fn record_recovered() {
    ::metrics::gauge!("config_client_consecutive_failures").set(0.0);
    ::metrics::gauge!("config_client_backoff_seconds").set(0.0);
}

pub fn record_binding_error(key: &str) {
    ::metrics::counter!("config_client_binding_errors_total", "key" => key.to_string())
        .increment(1);
}
