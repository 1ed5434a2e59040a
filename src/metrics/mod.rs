//! Metrics and observability module
//!
//! Prometheus-compatible counters and gauges for the intake service:
//! - Files stored and bytes written
//! - Relay handoffs started, resolved and failed, plus pending entries
//! - Sweep deletions and skipped sweeps
//! - Log-growth alerts

pub mod exporter;
pub mod recorder;

pub use exporter::{render_metrics, start_metrics_server, MetricsConfig, MetricsError};
pub use recorder::{
    init_metrics, record_file_stored, record_log_alert, record_relay_failed,
    record_relay_resolved, record_relay_started, record_sweep, record_sweep_skipped,
    set_relay_pending,
};
