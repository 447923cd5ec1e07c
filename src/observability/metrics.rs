//! Metrics collection and exposition.
//!
//! # Metrics
//! - `lb_tasks_total` (counter): pool task outcomes by pool, outcome
//! - `lb_selections_total` (counter): strategy picks by strategy, backend
//! - `lb_forwards_total` (counter): proxied requests by outcome
//! - `lb_direct_responses_total` (counter): direct-mode responses by port
//! - `lb_active_connections` (gauge): open connections by listener

use std::net::SocketAddr;

use metrics_exporter_prometheus::PrometheusBuilder;

use crate::load_balancer::BackendId;

/// Install the Prometheus recorder and its HTTP scrape listener.
///
/// Failure is logged; the balancer keeps running without metrics.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics endpoint listening"),
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to install metrics exporter"),
    }
}

pub fn record_task(pool: &str, outcome: &'static str) {
    ::metrics::counter!("lb_tasks_total", "pool" => pool.to_string(), "outcome" => outcome)
        .increment(1);
}

pub fn record_selection(strategy: &'static str, backend: &BackendId) {
    ::metrics::counter!(
        "lb_selections_total",
        "strategy" => strategy,
        "backend" => backend.to_string()
    )
    .increment(1);
}

pub fn record_forward(outcome: &'static str) {
    ::metrics::counter!("lb_forwards_total", "outcome" => outcome).increment(1);
}

pub fn record_direct_response(port: u16) {
    ::metrics::counter!("lb_direct_responses_total", "port" => port.to_string()).increment(1);
}

pub fn record_active_connections(listener: &str, active: u64) {
    ::metrics::gauge!("lb_active_connections", "listener" => listener.to_string())
        .set(active as f64);
}
