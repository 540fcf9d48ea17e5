use anyhow::{Context, Result};
use notify::{Config as NotifyConfig, RecommendedWatcher, RecursiveMode, Watcher};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::sync::mpsc;

use crate::event::MonitorEvent;
use crate::paths::expand_env;

pub const MIN_POLL_INTERVAL_MS: u64 = 100;
pub const MAX_POLL_INTERVAL_MS: u64 = 60_000;
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 500;
pub const DEFAULT_CHANGE_COOLDOWN_MS: u64 = 1_000;
pub const DEFAULT_RATE_LIMIT_SECS: u64 = crate::dispatcher::DEFAULT_RATE_LIMIT.as_secs();
pub const DEFAULT_WEBHOOK_TIMEOUT_SECS: u64 = crate::webhook::DEFAULT_TIMEOUT_SECS;
/// Resolved at runtime by expanding %ProgramData%.
pub const DEFAULT_THREAT_LOG: &str = r"%ProgramData%\ESET\ESET Security\Logs\virlog.dat";
pub const DEFAULT_SCAN_LOG: &str = r"%ProgramData%\ESET\ESET Security\Logs\scan.dat";
/// Overrides `webhook.url` when set and non-empty.
pub const WEBHOOK_URL_ENV: &str = "ESET_MONITOR_WEBHOOK_URL";

/// Root configuration structure. Deserialized from %APPDATA%\EsetMonitor\config.toml.
#[derive(Debug, Default, Deserialize, Clone, PartialEq)]
pub struct Config {
    #[serde(default)]
    pub webhook: WebhookConfig,
    #[serde(default)]
    pub logs: LogsConfig,
    #[serde(default)]
    pub timing: TimingConfig,
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct WebhookConfig {
    /// Webhook endpoint. Empty disables delivery (notifications are logged only).
    #[serde(default)]
    pub url: String,
    #[serde(default = "default_webhook_timeout")]
    pub timeout_secs: u64,
}

impl Default for WebhookConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            timeout_secs: DEFAULT_WEBHOOK_TIMEOUT_SECS,
        }
    }
}

impl WebhookConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs.max(1))
    }
}

/// The two ESET log files whose sizes are polled.
/// %VAR% segments are expanded at runtime.
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct LogsConfig {
    #[serde(default = "default_threat_log")]
    pub threat_log: String,
    #[serde(default = "default_scan_log")]
    pub scan_log: String,
}

impl Default for LogsConfig {
    fn default() -> Self {
        Self {
            threat_log: DEFAULT_THREAT_LOG.to_string(),
            scan_log: DEFAULT_SCAN_LOG.to_string(),
        }
    }
}

impl LogsConfig {
    pub fn threat_log_path(&self) -> PathBuf {
        PathBuf::from(expand_env(&self.threat_log))
    }

    pub fn scan_log_path(&self) -> PathBuf {
        PathBuf::from(expand_env(&self.scan_log))
    }
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct TimingConfig {
    /// Delay between polls. Clamped to [100, 60000] ms.
    #[serde(default = "default_poll_interval")]
    pub poll_interval_ms: u64,
    /// Extra pause after a poll that detected a change.
    #[serde(default = "default_change_cooldown")]
    pub change_cooldown_ms: u64,
    /// Minimum spacing between non-alert notifications.
    #[serde(default = "default_rate_limit")]
    pub rate_limit_secs: u64,
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: DEFAULT_POLL_INTERVAL_MS,
            change_cooldown_ms: DEFAULT_CHANGE_COOLDOWN_MS,
            rate_limit_secs: DEFAULT_RATE_LIMIT_SECS,
        }
    }
}

impl TimingConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(
            self.poll_interval_ms
                .clamp(MIN_POLL_INTERVAL_MS, MAX_POLL_INTERVAL_MS),
        )
    }

    pub fn change_cooldown(&self) -> Duration {
        Duration::from_millis(self.change_cooldown_ms)
    }

    pub fn rate_limit(&self) -> Duration {
        Duration::from_secs(self.rate_limit_secs)
    }
}

impl Config {
    /// Applies environment overrides using `lookup` (normally `std::env::var`).
    pub fn with_env_overrides(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        if let Some(url) = lookup(WEBHOOK_URL_ENV).filter(|u| !u.trim().is_empty()) {
            self.webhook.url = url;
        }
        self
    }
}

/// Loads the config file at `path`, returning `Config::default()` if the file does not exist.
/// Returns an error if the file exists but cannot be read or parsed.
pub fn load_or_default(path: &Path) -> Result<Config> {
    if !path.exists() {
        return Ok(Config::default());
    }
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;
    toml::from_str(&content)
        .with_context(|| format!("Failed to parse config file: {}", path.display()))
}

/// [`load_or_default`] followed by process environment overrides.
pub fn load(path: &Path) -> Result<Config> {
    Ok(load_or_default(path)?.with_env_overrides(|k| std::env::var(k).ok()))
}

/// Spawns a file watcher on the parent directory of `path`.  Whenever the config
/// file is created or modified, reloads it and sends a `ConfigReloaded` event.
pub async fn watch_config(path: PathBuf, tx: mpsc::Sender<MonitorEvent>) {
    let (watch_tx, mut watch_rx) = mpsc::channel::<notify::Event>(16);

    let mut watcher = match RecommendedWatcher::new(
        move |res: notify::Result<notify::Event>| {
            if let Ok(event) = res {
                let _ = watch_tx.blocking_send(event);
            }
        },
        NotifyConfig::default(),
    ) {
        Ok(w) => w,
        Err(e) => {
            tracing::warn!("Config hot reload disabled, cannot create file watcher: {e}");
            return;
        }
    };

    // Watch the directory so editor-style atomic saves (write-new + rename) are seen.
    let watch_dir = match path.parent() {
        Some(d) if !d.as_os_str().is_empty() => d.to_path_buf(),
        _ => PathBuf::from("."),
    };
    // A directory that does not exist yet cannot be watched.
    if let Err(e) = std::fs::create_dir_all(&watch_dir) {
        tracing::warn!("Config hot reload disabled, cannot create {}: {e}", watch_dir.display());
        return;
    }

    if let Err(e) = watcher.watch(&watch_dir, RecursiveMode::NonRecursive) {
        tracing::warn!("Config hot reload disabled, cannot watch {}: {e}", watch_dir.display());
        return;
    }

    while let Some(event) = watch_rx.recv().await {
        // Only the config's own directory is watched, so the file name is enough.
        let affects_config = event.paths.iter().any(|p| p.file_name() == path.file_name());
        let is_write = matches!(
            event.kind,
            notify::EventKind::Create(_) | notify::EventKind::Modify(_)
        );

        if affects_config && is_write {
            match load(&path) {
                Ok(config) => {
                    if tx.send(MonitorEvent::ConfigReloaded(config)).await.is_err() {
                        break;
                    }
                }
                Err(e) => tracing::warn!("Keeping previous config, reload failed: {e:#}"),
            }
        }
    }
}

fn default_webhook_timeout() -> u64 {
    DEFAULT_WEBHOOK_TIMEOUT_SECS
}

fn default_threat_log() -> String {
    DEFAULT_THREAT_LOG.to_string()
}

fn default_scan_log() -> String {
    DEFAULT_SCAN_LOG.to_string()
}

fn default_poll_interval() -> u64 {
    DEFAULT_POLL_INTERVAL_MS
}

fn default_change_cooldown() -> u64 {
    DEFAULT_CHANGE_COOLDOWN_MS
}

fn default_rate_limit() -> u64 {
    DEFAULT_RATE_LIMIT_SECS
}
