//! Metrics collection and exposition.
//!
//! # Metrics
//! - `txmanager_broadcasts_total` (counter): broadcasts by kind, result
//! - `txmanager_outcomes_total` (counter): terminal outcomes by kind
//! - `txmanager_nonce_resets_total` (counter): nonce cache invalidations
//! - `txmanager_gas_price_wei` (gauge): last rebroadcast gas price
//! - `txmanager_queue_sends_total` (counter): queue decisions by result

use std::net::SocketAddr;

use metrics_exporter_prometheus::PrometheusBuilder;

/// Install the Prometheus exporter listening on `addr`.
///
/// Must run inside a tokio runtime.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics exporter listening"),
        Err(e) => tracing::error!(error = %e, "Failed to install metrics exporter"),
    }
}

/// Record a broadcast attempt; `kind` is "initial" or "rebroadcast".
pub fn record_broadcast(kind: &'static str, ok: bool) {
    let result = if ok { "ok" } else { "error" };
    metrics::counter!("txmanager_broadcasts_total", "kind" => kind, "result" => result)
        .increment(1);
}

/// Record how a logical transaction ended.
pub fn record_outcome(outcome: &'static str) {
    metrics::counter!("txmanager_outcomes_total", "outcome" => outcome).increment(1);
}

pub fn record_nonce_reset() {
    metrics::counter!("txmanager_nonce_resets_total").increment(1);
}

pub fn record_gas_bump(gas_price: u128) {
    metrics::gauge!("txmanager_gas_price_wei").set(gas_price as f64);
}

/// Record what the queue did with a `send` call.
pub fn record_queue_send(result: &'static str) {
    metrics::counter!("txmanager_queue_sends_total", "result" => result).increment(1);
}
