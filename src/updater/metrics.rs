//! Prometheus metrics for the updater
//!
//! Process-wide counters complementing the per-cycle summary log line.

use super::stats::CycleReport;
use crate::{FreqSyncError, Result};
use lazy_static::lazy_static;
use prometheus::{
    register_counter, register_counter_vec, register_gauge, register_histogram, Counter,
    CounterVec, Encoder, Gauge, Histogram, TextEncoder,
};

lazy_static! {
    /// Counter: node outcomes by result (updated, would_update, skipped, error)
    pub static ref NODE_UPDATES: CounterVec = register_counter_vec!(
        "freqsync_node_updates_total",
        "Node reconciliation outcomes by result",
        &["result"]
    )
    .expect("Failed to create node_updates metric");

    /// Counter: node errors by kind (capability, patch, ...)
    pub static ref NODE_ERRORS: CounterVec = register_counter_vec!(
        "freqsync_node_errors_total",
        "Node reconciliation errors by kind",
        &["kind"]
    )
    .expect("Failed to create node_errors metric");

    /// Counter: completed cycles
    pub static ref CYCLES: Counter = register_counter!(
        "freqsync_cycles_total",
        "Total reconciliation cycles completed"
    )
    .expect("Failed to create cycles metric");

    /// Histogram: cycle duration (seconds)
    pub static ref CYCLE_DURATION: Histogram = register_histogram!(
        "freqsync_cycle_duration_seconds",
        "Duration of reconciliation cycles",
        vec![0.01, 0.05, 0.1, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0]
    )
    .expect("Failed to create cycle_duration metric");

    /// Gauge: size of the last required frequency set
    pub static ref REQUIRED_FREQUENCIES: Gauge = register_gauge!(
        "freqsync_required_frequencies",
        "Number of frequencies required in the last cycle"
    )
    .expect("Failed to create required_frequencies metric");

    /// Gauge: updater health status (1 = running, 0 = stopped)
    pub static ref HEALTH_STATUS: Gauge = register_gauge!(
        "freqsync_health_status",
        "Updater health status (1 = running, 0 = stopped)"
    )
    .expect("Failed to create health_status metric");
}

/// Record a finished cycle
///
/// Dry-run updates are counted as `would_update`, never as `updated`.
pub fn record_cycle(report: &CycleReport) {
    let updated = if report.dry_run { "would_update" } else { "updated" };
    NODE_UPDATES
        .with_label_values(&[updated])
        .inc_by(report.stats.updated as f64);
    NODE_UPDATES
        .with_label_values(&["skipped"])
        .inc_by(report.stats.skipped as f64);
    NODE_UPDATES
        .with_label_values(&["error"])
        .inc_by(report.stats.error as f64);

    CYCLES.inc();
    CYCLE_DURATION.observe(report.duration.as_secs_f64());
    REQUIRED_FREQUENCIES.set(report.required.len() as f64);
}

/// Record a failed node by error kind
pub fn record_node_error(kind: &str) {
    NODE_ERRORS.with_label_values(&[kind]).inc();
}

/// Set health status
pub fn set_health_status(healthy: bool) {
    HEALTH_STATUS.set(if healthy { 1.0 } else { 0.0 });
}

/// Encode all metrics as Prometheus text format
pub fn encode_metrics() -> Result<String> {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    encoder
        .encode(&metric_families, &mut buffer)
        .map_err(|e| FreqSyncError::Other(format!("Failed to encode metrics: {}", e)))?;
    String::from_utf8(buffer)
        .map_err(|e| FreqSyncError::Other(format!("Metrics are not valid UTF-8: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::updater::stats::CycleStats;
    use chrono::Utc;
    use std::time::Duration;

    #[test]
    fn test_metrics_creation() {
        let report = CycleReport {
            stats: CycleStats {
                updated: 2,
                skipped: 1,
                error: 1,
            },
            eligible: 4,
            required: vec![],
            started_at: Utc::now(),
            duration: Duration::from_millis(20),
            dry_run: false,
        };
        record_cycle(&report);
        record_cycle(&CycleReport {
            dry_run: true,
            ..report.clone()
        });
        record_node_error("patch");
        set_health_status(true);

        let output = encode_metrics().unwrap();
        assert!(output.contains("freqsync_node_updates_total"));
        assert!(output.contains("result=\"would_update\""));
        assert!(output.contains("freqsync_cycles_total"));
        assert!(output.contains("freqsync_node_errors_total"));
    }
}
