//! Metrics collection and exposition.
//!
//! # Metrics
//! - `control_saves_total` (counter): saves by class, action, outcome
//! - `control_core_patch_failures_total` (counter): post-commit failures by op
//! - `control_clients_depleted_total` (counter): clients disabled by the sweep
//! - `control_watermark_ms` (gauge): current change watermark

use std::net::SocketAddr;

use metrics_exporter_prometheus::PrometheusBuilder;

/// Installs the Prometheus recorder with an HTTP listener on `addr`.
///
/// Must run inside a tokio runtime.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics exporter listening"),
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to install metrics exporter"),
    }
}

/// `outcome` is `committed`, `diverged`, or the error kind.
pub fn record_save(class: &'static str, action: &'static str, outcome: &'static str) {
    metrics::counter!(
        "control_saves_total",
        "class" => class,
        "action" => action,
        "outcome" => outcome
    )
    .increment(1);
}

pub fn record_patch_failure(op: &'static str) {
    metrics::counter!("control_core_patch_failures_total", "op" => op).increment(1);
}

pub fn record_depleted(count: usize) {
    metrics::counter!("control_clients_depleted_total").increment(count as u64);
}

pub fn set_watermark(ms: i64) {
    metrics::gauge!("control_watermark_ms").set(ms as f64);
}
