//! Metrics collection and exposition.
//!
//! # Metrics
//! - `gateway_rate_limited_total` (counter): denials by route group
//! - `gateway_auth_total` (counter): authentication outcomes by scheme
//! - `gateway_token_cache_total` (counter): cache lookups by result
//! - `gateway_token_cache_entries` (gauge): cached tokens
//! - `gateway_upstream_duration_seconds` (histogram): outbound call latency
//!
//! Recording goes through the `metrics` facade and is a no-op until
//! [`init_metrics`] installs the Prometheus recorder.

use std::net::SocketAddr;
use std::time::Instant;

use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;

/// Install the Prometheus recorder and its scrape listener.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics exporter listening"),
        Err(e) => tracing::error!(error = %e, "Failed to install metrics exporter"),
    }
}

pub fn record_rate_limited(group: &'static str) {
    counter!("gateway_rate_limited_total", "group" => group).increment(1);
}

pub fn record_auth(scheme: &'static str, outcome: &'static str) {
    counter!("gateway_auth_total", "scheme" => scheme, "outcome" => outcome).increment(1);
}

pub fn record_cache_lookup(result: &'static str) {
    counter!("gateway_token_cache_total", "result" => result).increment(1);
}

pub fn record_cache_size(entries: usize) {
    gauge!("gateway_token_cache_entries").set(entries as f64);
}

pub fn record_upstream(target: &'static str, started: Instant) {
    histogram!("gateway_upstream_duration_seconds", "target" => target)
        .record(started.elapsed().as_secs_f64());
}
