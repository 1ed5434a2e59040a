//! Console runner
//!
//! Runs the intake bot, the relay agent and the background scheduler in one
//! process over the loopback transport. Standard input plays the operator:
//!
//! ```text
//! /start | /status | /cleanup   commands
//! send <path>                   upload a local file
//! metrics                       print the Prometheus snapshot
//! quit                          stop
//! ```
//!
//! Usage: `droplink [config.toml]`

use anyhow::{Context, Result};
use droplink::bot::IntakeBot;
use droplink::config::Settings;
use droplink::metrics::{render_metrics, start_metrics_server, MetricsConfig};
use droplink::monitor::LogGrowthMonitor;
use droplink::relay::RelayAgent;
use droplink::scheduler::BackgroundScheduler;
use droplink::storage::StorageManager;
use droplink::telemetry;
use droplink::transport::{ChatTransport, LoopbackHub};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::time::{interval, MissedTickBehavior};

#[tokio::main]
async fn main() -> Result<()> {
    let settings = match std::env::args().nth(1) {
        Some(path) => Settings::load_from(PathBuf::from(&path))
            .with_context(|| format!("Failed to load configuration from {path}"))?,
        None => Settings::load().context("Failed to load configuration")?,
    };

    telemetry::init(&settings.log_path)
        .with_context(|| format!("Failed to open log file {}", settings.log_path.display()))?;

    if let Some(addr) = &settings.metrics_addr {
        start_metrics_server(MetricsConfig::parse(addr)?)?;
    }

    let storage = Arc::new(
        StorageManager::open(&settings.storage_root, settings.ttl())
            .await
            .with_context(|| {
                format!("Failed to open storage root {}", settings.storage_root.display())
            })?,
    );

    let hub = LoopbackHub::new();
    let mut operator_inbox = hub.register(settings.operator_id);
    let mut bot_inbox = hub.register(settings.bot_id);
    let mut relay_inbox = hub.register(settings.relay_id);

    let bot_transport: Arc<dyn ChatTransport> = Arc::new(hub.transport(settings.bot_id));
    let relay_transport: Arc<dyn ChatTransport> = Arc::new(hub.transport(settings.relay_id));
    let operator = hub.transport(settings.operator_id);

    // Intake: one task per event so a long cleanup does not block uploads
    let bot = Arc::new(IntakeBot::from_settings(
        &settings,
        bot_transport.clone(),
        storage.clone(),
    ));
    tokio::spawn(async move {
        while let Some(event) = bot_inbox.recv().await {
            let bot = bot.clone();
            tokio::spawn(async move {
                if let Err(e) = bot.handle(event).await {
                    tracing::error!(error = %e, "Intake handler failed");
                }
            });
        }
    });

    // Relay: in order, so a request is always recorded before its payload
    let agent = RelayAgent::new(relay_transport.clone(), storage.clone(), settings.bot_id);
    tokio::spawn(async move {
        while let Some(event) = relay_inbox.recv().await {
            if let Err(e) = agent.handle(event).await {
                tracing::error!(error = %e, "Relay handler failed");
            }
        }
    });

    // The intake's own monitor already covers `log_path`
    if let Some(relay_log) = &settings.relay_log_path {
        let relay_monitor =
            LogGrowthMonitor::new(relay_log, settings.log_alert_mb, settings.bot_id)
                .with_label("[Relay]");
        let relay_period = settings.sweep_interval();
        tokio::spawn(async move {
            let mut ticker = interval(relay_period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                relay_monitor.check(relay_transport.as_ref()).await;
            }
        });
    }

    let scheduler = BackgroundScheduler::new(
        storage.clone(),
        bot_transport.clone(),
        settings.sweep_interval(),
    )
    .with_monitor(LogGrowthMonitor::new(
        &settings.log_path,
        settings.log_alert_mb,
        settings.operator_id,
    ))
    .spawn();

    tokio::spawn(async move {
        while let Some(event) = operator_inbox.recv().await {
            if let Some(text) = event.text() {
                println!("{text}\n");
            }
        }
    });

    tracing::info!(
        storage = %settings.storage_root.display(),
        base_url = %settings.base_url,
        "Droplink is up and running"
    );
    println!("Commands: /start, /status, /cleanup, send <path>, metrics, quit");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        let line = tokio::select! {
            line = lines.next_line() => line?,
            _ = tokio::signal::ctrl_c() => None,
        };
        let Some(line) = line else { break };
        let line = line.trim();

        if line.is_empty() {
            continue;
        }
        if line == "quit" {
            break;
        }
        if line == "metrics" {
            match render_metrics() {
                Some(snapshot) => println!("{snapshot}"),
                None => println!("Metrics are disabled (set metrics_addr)"),
            }
            continue;
        }

        let sent = match line.strip_prefix("send ") {
            Some(path) => hub.upload_path(settings.operator_id, settings.bot_id, path.trim()).await,
            None => operator.send_text(settings.bot_id, line, None).await,
        };
        if let Err(e) = sent {
            eprintln!("Could not send: {e}");
        }
    }

    scheduler.shutdown().await;
    tracing::info!("Droplink stopped");
    Ok(())
}
