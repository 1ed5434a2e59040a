//! Metrics recorder for intake, relay and cleanup operations

use crate::storage::SweepMode;
use metrics::{counter, describe_counter, describe_gauge, gauge};
use std::sync::atomic::{AtomicBool, Ordering};

static METRICS_INITIALIZED: AtomicBool = AtomicBool::new(false);

/// Initialize metric descriptions (call once at startup)
pub fn init_metrics() {
    if METRICS_INITIALIZED.swap(true, Ordering::SeqCst) {
        return;
    }

    describe_counter!(
        "droplink_files_stored_total",
        "Total number of files written to the download area"
    );
    describe_counter!(
        "droplink_bytes_stored_total",
        "Total bytes written to the download area"
    );

    describe_counter!(
        "droplink_relay_started_total",
        "Large files handed to the relay process"
    );
    describe_counter!(
        "droplink_relay_resolved_total",
        "Relay handoffs completed successfully"
    );
    describe_counter!(
        "droplink_relay_failed_total",
        "Relay handoffs reported as failed"
    );
    describe_gauge!(
        "droplink_relay_pending",
        "Relay handoffs waiting for a completion or failure event"
    );

    describe_counter!(
        "droplink_sweep_deleted_total",
        "Files deleted by cleanup sweeps"
    );
    describe_counter!(
        "droplink_sweeps_skipped_total",
        "Cleanup sweeps skipped because another one was running"
    );
    describe_counter!(
        "droplink_log_alerts_total",
        "Alerts sent because the log file grew past its threshold"
    );
}

// ============== Storage ==============

pub fn record_file_stored(size_bytes: u64) {
    counter!("droplink_files_stored_total").increment(1);
    counter!("droplink_bytes_stored_total").increment(size_bytes);
}

pub fn record_sweep(mode: SweepMode, deleted: usize) {
    counter!("droplink_sweep_deleted_total", "mode" => mode.to_string()).increment(deleted as u64);
}

pub fn record_sweep_skipped() {
    counter!("droplink_sweeps_skipped_total").increment(1);
}

// ============== Relay ==============

pub fn record_relay_started() {
    counter!("droplink_relay_started_total").increment(1);
}

pub fn record_relay_resolved() {
    counter!("droplink_relay_resolved_total").increment(1);
}

pub fn record_relay_failed() {
    counter!("droplink_relay_failed_total").increment(1);
}

pub fn set_relay_pending(pending: usize) {
    gauge!("droplink_relay_pending").set(pending as f64);
}

// ============== Monitor ==============

pub fn record_log_alert() {
    counter!("droplink_log_alerts_total").increment(1);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recording_without_exporter_is_noop() {
        // No recorder installed: calls must not panic
        init_metrics();
        init_metrics();
        record_file_stored(1024);
        record_sweep(SweepMode::All, 3);
        record_sweep_skipped();
        record_relay_started();
        set_relay_pending(2);
        record_relay_resolved();
        record_relay_failed();
        record_log_alert();
    }
}
