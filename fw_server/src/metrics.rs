//! Prometheus metrics for ingestion and OTA observability.

use metrics::counter;

/// Initialize metrics exporter (Prometheus).
pub fn init_metrics() {
    let builder = metrics_exporter_prometheus::PrometheusBuilder::new();
    if let Err(e) = builder.install() {
        tracing::warn!("Failed to install Prometheus exporter: {}", e);
    }
}

/// Record a webhook received event.
pub fn webhook_received(action: &str) {
    counter!("fw_webhooks_received_total", "action" => action.to_string()).increment(1);
}

/// Record an ingestion task outcome.
pub fn task_processed(outcome: &str) {
    counter!("fw_ingest_tasks_total", "outcome" => outcome.to_string()).increment(1);
}

/// Record an OTA check result.
pub fn ota_check(result: &str) {
    counter!("fw_ota_checks_total", "result" => result.to_string()).increment(1);
}

/// Record a coredump decode outcome.
pub fn coredump_decoded(outcome: &str) {
    counter!("fw_coredumps_total", "outcome" => outcome.to_string()).increment(1);
}
