//! Metrics collection and exposition.
//!
//! # Metrics
//! - `live_config_loads_total` (counter): documents loaded, by kind
//! - `live_config_reloads_total` (counter): successful live reloads, by kind
//! - `live_config_saves_total` (counter): programmatic saves, by kind
//! - `live_config_failures_total` (counter): swallowed failures, by kind of failure
//! - `live_config_watched_paths` (gauge): paths registered with the watcher
//!
//! # Design Decisions
//! - Recording without an installed recorder is a no-op
//! - Labels are low-cardinality: document kind, never paths

use std::net::SocketAddr;

use metrics_exporter_prometheus::PrometheusBuilder;

use crate::report::FailureKind;

/// Install the Prometheus recorder and start its HTTP listener.
///
/// Must be called from within a tokio runtime.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics endpoint started"),
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to start metrics endpoint"),
    }
}

pub fn record_load(kind: &'static str) {
    ::metrics::counter!("live_config_loads_total", "kind" => kind).increment(1);
}

pub fn record_reload(kind: &'static str) {
    ::metrics::counter!("live_config_reloads_total", "kind" => kind).increment(1);
}

pub fn record_save(kind: &'static str) {
    ::metrics::counter!("live_config_saves_total", "kind" => kind).increment(1);
}

pub fn record_failure(kind: FailureKind) {
    ::metrics::counter!("live_config_failures_total", "kind" => kind.as_str()).increment(1);
}

pub fn record_watched_paths(count: usize) {
    ::metrics::gauge!("live_config_watched_paths").set(count as f64);
}
