//! Log-growth monitor
//!
//! Stats a single log file and alerts one recipient when it grows past a
//! threshold. Stat failures are logged and never raise an alert.

use crate::messages;
use crate::transport::{ChatId, ChatTransport};
use std::path::{Path, PathBuf};

const BYTES_PER_MB: u64 = 1024 * 1024;

#[derive(Debug, Clone)]
pub struct LogGrowthMonitor {
    path: PathBuf,
    threshold_mb: u64,
    recipient: ChatId,
    /// Prefix identifying which process raised the alert, e.g. `[Relay]`
    label: String,
}

impl LogGrowthMonitor {
    pub fn new(path: impl Into<PathBuf>, threshold_mb: u64, recipient: ChatId) -> Self {
        Self {
            path: path.into(),
            threshold_mb,
            recipient,
            label: String::new(),
        }
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns the file size if an alert was sent
    pub async fn check(&self, transport: &dyn ChatTransport) -> Option<u64> {
        let size = match tokio::fs::metadata(&self.path).await {
            Ok(metadata) => metadata.len(),
            Err(e) => {
                tracing::error!(path = %self.path.display(), error = %e, "Log monitor error");
                return None;
            }
        };

        if size <= self.threshold_mb.saturating_mul(BYTES_PER_MB) {
            return None;
        }

        let text = messages::log_alert(&self.label, self.threshold_mb, size);
        match transport.send_text(self.recipient, &text, None).await {
            Ok(_) => {
                crate::metrics::record_log_alert();
                tracing::warn!(
                    path = %self.path.display(),
                    bytes = size,
                    threshold_mb = self.threshold_mb,
                    "Log file over threshold"
                );
                Some(size)
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to send log alert");
                None
            }
        }
    }
}
