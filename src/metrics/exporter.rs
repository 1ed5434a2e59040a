//! Prometheus metrics exporter
//!
//! Exposes metrics via HTTP for Prometheus scraping.

use crate::metrics::recorder::init_metrics;
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use std::net::SocketAddr;
use std::sync::OnceLock;

static PROMETHEUS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

#[derive(Debug, Clone)]
pub struct MetricsConfig {
    /// Address to bind the metrics listener
    pub listen_addr: SocketAddr,
}

impl MetricsConfig {
    pub fn with_addr(addr: SocketAddr) -> Self {
        Self { listen_addr: addr }
    }

    /// Parse a `host:port` listener address
    pub fn parse(addr: &str) -> Result<Self, MetricsError> {
        addr.parse()
            .map(Self::with_addr)
            .map_err(|e| MetricsError::InvalidAddress(format!("{addr}: {e}")))
    }
}

/// Install the Prometheus recorder and start its HTTP listener
///
/// Must be called from within a tokio runtime. Subsequent calls return the handle installed by the first one.
pub fn start_metrics_server(
    config: MetricsConfig,
) -> Result<&'static PrometheusHandle, MetricsError> {
    if let Some(handle) = PROMETHEUS_HANDLE.get() {
        return Ok(handle);
    }

    let (recorder, exporter) = PrometheusBuilder::new()
        .with_http_listener(config.listen_addr)
        .build()
        .map_err(|e| MetricsError::SetupFailed(e.to_string()))?;
    let handle = recorder.handle();

    metrics::set_global_recorder(recorder)
        .map_err(|e| MetricsError::SetupFailed(e.to_string()))?;
    init_metrics();

    tokio::spawn(async move {
        if let Err(e) = exporter.await {
            tracing::error!(error = ?e, "Metrics exporter stopped");
        }
    });
    tracing::info!(addr = %config.listen_addr, "Metrics exporter listening");

    Ok(PROMETHEUS_HANDLE.get_or_init(|| handle))
}

/// Render metrics as text, if the exporter is running
pub fn render_metrics() -> Option<String> {
    PROMETHEUS_HANDLE.get().map(|h| h.render())
}

#[derive(Debug, thiserror::Error)]
pub enum MetricsError {
    #[error("Failed to setup metrics: {0}")]
    SetupFailed(String),

    #[error("Invalid metrics address: {0}")]
    InvalidAddress(String),
}
