//! Background scheduler
//!
//! On a fixed interval: sweep expired files, then check log growth. A sweep
//! that finds another sweep running is skipped for that tick.

use crate::monitor::LogGrowthMonitor;
use crate::storage::{NoopObserver, StorageManager, SweepMode, SweepOutcome};
use crate::transport::ChatTransport;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};

/// What a single tick did
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TickReport {
    pub sweep: SweepOutcome,
    /// Log size when an alert was sent
    pub log_alert: Option<u64>,
}

pub struct BackgroundScheduler {
    storage: Arc<StorageManager>,
    monitor: Option<LogGrowthMonitor>,
    transport: Arc<dyn ChatTransport>,
    period: Duration,
}

impl BackgroundScheduler {
    pub fn new(
        storage: Arc<StorageManager>,
        transport: Arc<dyn ChatTransport>,
        period: Duration,
    ) -> Self {
        Self {
            storage,
            monitor: None,
            transport,
            period,
        }
    }

    pub fn with_monitor(mut self, monitor: LogGrowthMonitor) -> Self {
        self.monitor = Some(monitor);
        self
    }

    pub async fn tick(&self) -> TickReport {
        let sweep = self.storage.sweep(SweepMode::ExpiredOnly, &NoopObserver).await;
        if let SweepOutcome::Aborted { reason, .. } = &sweep {
            tracing::error!(%reason, "Scheduled cleanup aborted");
        }

        let log_alert = match &self.monitor {
            Some(monitor) => monitor.check(self.transport.as_ref()).await,
            None => None,
        };

        TickReport { sweep, log_alert }
    }

    /// Run ticks until the returned handle is shut down
    ///
    /// The first tick fires immediately. Ticks never overlap: a slow tick
    /// delays the next one instead of queueing a burst.
    pub fn spawn(self) -> SchedulerHandle {
        let (shutdown_tx, mut shutdown_rx) = watch::channel(false);
        let task = tokio::spawn(async move {
            let mut ticker = interval(self.period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            tracing::info!(period_secs = self.period.as_secs(), "Scheduler started");

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        let report = self.tick().await;
                        tracing::debug!(?report, "Scheduler tick");
                    }
                    changed = shutdown_rx.changed() => {
                        if changed.is_err() || *shutdown_rx.borrow() {
                            break;
                        }
                    }
                }
            }

            tracing::info!("Scheduler stopped");
        });

        SchedulerHandle { shutdown_tx, task }
    }
}

pub struct SchedulerHandle {
    shutdown_tx: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl SchedulerHandle {
    /// Stop after the tick in progress (if any) and wait for the task
    pub async fn shutdown(self) {
        let _ = self.shutdown_tx.send(true);
        if let Err(e) = self.task.await {
            tracing::error!(error = %e, "Scheduler task failed");
        }
    }
}
