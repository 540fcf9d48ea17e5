mod cli;
mod config;
mod dispatcher;
mod event;
mod logging;
mod monitor;
mod notification;
mod paths;
mod sink;
mod status;
mod test_file;
mod watcher;
mod webhook;

use std::time::Duration;

use anyhow::{bail, Result};
use clap::Parser;
use tokio::sync::mpsc;
use tokio::time::{interval, Interval, MissedTickBehavior};
use tracing::{error, info, warn};

use crate::config::{Config, TimingConfig};
use crate::dispatcher::Dispatcher;
use crate::event::MonitorEvent;
use crate::monitor::Monitor;
use crate::webhook::WebhookSink;

#[tokio::main]
async fn main() {
    let cli = cli::Cli::parse();

    // ── Logging ───────────────────────────────────────────────────────────────
    let log_dir = (!cli.no_file_log).then(paths::log_dir);
    let _log_guard = logging::init(log_dir.as_deref());

    // ── Configuration ─────────────────────────────────────────────────────────
    let config_path = cli.config.clone().unwrap_or_else(paths::config_file_path);
    if let Some(config_dir) = config_path.parent().filter(|d| !d.as_os_str().is_empty()) {
        if let Err(e) = std::fs::create_dir_all(config_dir) {
            error!("Failed to create config directory {}: {e}", config_dir.display());
        }
    }
    let config = config::load(&config_path).unwrap_or_else(|e| {
        warn!("Using default config: {e:#}");
        Config::default().with_env_overrides(|k| std::env::var(k).ok())
    });

    // ── Monitor ───────────────────────────────────────────────────────────────
    let sink = WebhookSink::new(config.webhook.url.clone(), config.webhook.timeout());
    if !sink.is_configured() {
        warn!(
            "No webhook URL configured (set webhook.url in {} or {}); notifications will only be logged",
            config_path.display(),
            config::WEBHOOK_URL_ENV
        );
    }
    let dispatcher = Dispatcher::new(sink, config.timing.rate_limit());
    let status_path = cli.status.clone().unwrap_or_else(paths::status_file_path);
    let mut monitor = Monitor::new(
        config.logs.threat_log_path(),
        config.logs.scan_log_path(),
        dispatcher,
    )
    .with_status_file(status_path);
    if cli.test {
        monitor = monitor.with_test_file(paths::test_file_path());
    }

    let (event_tx, event_rx) = mpsc::channel::<MonitorEvent>(16);

    // ── Background tasks ──────────────────────────────────────────────────────
    tokio::spawn(config::watch_config(config_path, event_tx.clone()));

    // Graceful shutdown on Ctrl+C.
    {
        let tx = event_tx.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                let _ = tx.send(MonitorEvent::Shutdown).await;
            }
        });
    }
    drop(event_tx);

    info!("eset-monitor v{} started", env!("CARGO_PKG_VERSION"));
    info!("Press Ctrl+C to stop");

    monitor.start().await;

    // ── Poll loop ─────────────────────────────────────────────────────────────
    let result = run(&mut monitor, event_rx, config.timing.clone()).await;
    match &result {
        Ok(()) => info!("Stopping monitor..."),
        Err(e) => error!("Error in main loop: {e:#}"),
    }

    monitor.shutdown(result.as_ref().err()).await;
    info!(
        "Total detections: {}, scans: {}",
        monitor.dispatcher().detection_count(),
        monitor.status().scan_count
    );
}

fn ticker(period: Duration) -> Interval {
    let mut ticker = interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    ticker
}

/// Polls until a shutdown event arrives. The only error is the event channel
/// closing underneath the loop.
async fn run(
    monitor: &mut Monitor<WebhookSink>,
    mut events: mpsc::Receiver<MonitorEvent>,
    mut timing: TimingConfig,
) -> Result<()> {
    let mut poll_ticker = ticker(timing.poll_interval());

    loop {
        tokio::select! {
            _ = poll_ticker.tick() => {
                if monitor.poll().await {
                    tokio::time::sleep(timing.change_cooldown()).await;
                }
            }
            evt = events.recv() => match evt {
                Some(MonitorEvent::ConfigReloaded(config)) => {
                    info!("Config reloaded");
                    apply_config(monitor, &config);
                    if config.timing.poll_interval() != timing.poll_interval() {
                        poll_ticker = ticker(config.timing.poll_interval());
                    }
                    timing = config.timing;
                }
                Some(MonitorEvent::Shutdown) => return Ok(()),
                None => bail!("event channel closed"),
            },
        }
    }
}

/// Applies a reloaded config to a running monitor.
fn apply_config(monitor: &mut Monitor<WebhookSink>, config: &Config) {
    let dispatcher = monitor.dispatcher_mut();
    dispatcher.set_rate_limit(config.timing.rate_limit());
    let sink = dispatcher.sink_mut();
    sink.set_url(config.webhook.url.clone());
    sink.set_timeout(config.webhook.timeout());
    if !sink.is_configured() {
        warn!("Reloaded config has no webhook URL; notifications will only be logged");
    }
    monitor.retarget(config.logs.threat_log_path(), config.logs.scan_log_path());
}
