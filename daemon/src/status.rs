use serde::{Deserialize, Serialize};
use std::path::Path;

/// Current operational state of the monitor.
#[derive(Debug, Serialize, Deserialize, PartialEq, Clone)]
#[serde(rename_all = "lowercase")]
pub enum MonitorState {
    /// The poll loop is running.
    Monitoring,
    /// The monitor has shut down (normally or after a loop error).
    Stopped,
}

/// Runtime status written to %APPDATA%\EsetMonitor\status.toml.
/// Purely informational; the monitor never reads it back.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct MonitorStatus {
    /// Binary version (set from Cargo.toml at compile time).
    pub version: String,
    pub state: MonitorState,
    /// RFC 3339 local start time.
    pub started_at: String,
    /// Threat-log changes seen since start.
    pub detection_count: u64,
    /// Scan-log changes seen since start.
    pub scan_count: u64,
    pub notifications_sent: u64,
    pub notifications_suppressed: u64,
    pub delivery_failures: u64,
    /// RFC 3339 timestamp of the most recent alert, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_alert_at: Option<String>,
    /// Most recent non-fatal error, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl MonitorStatus {
    pub fn new(started_at: String) -> Self {
        Self {
            version: env!("CARGO_PKG_VERSION").to_string(),
            state: MonitorState::Monitoring,
            started_at,
            detection_count: 0,
            scan_count: 0,
            notifications_sent: 0,
            notifications_suppressed: 0,
            delivery_failures: 0,
            last_alert_at: None,
            error: None,
        }
    }
}

/// Serializes `status` to TOML and writes it to `path`.
/// Creates the parent directory if it does not exist.
/// Failures are logged, never returned.
pub fn write_status(path: &Path, status: &MonitorStatus) {
    if let Some(parent) = path.parent() {
        if let Err(e) = std::fs::create_dir_all(parent) {
            tracing::warn!("Failed to create status directory {}: {e}", parent.display());
            return;
        }
    }
    match toml::to_string_pretty(status) {
        Ok(content) => {
            if let Err(e) = std::fs::write(path, content) {
                tracing::warn!("Failed to write status file {}: {e}", path.display());
            }
        }
        Err(e) => tracing::warn!("Failed to serialize status: {e}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn status() -> MonitorStatus {
        MonitorStatus::new("2024-12-28T09:30:00+01:00".to_string())
    }

    #[test]
    fn new_starts_monitoring_with_zero_counters() {
        let s = status();
        assert_eq!(s.state, MonitorState::Monitoring);
        assert_eq!(s.detection_count, 0);
        assert_eq!(s.scan_count, 0);
        assert_eq!(s.notifications_sent, 0);
        assert!(s.last_alert_at.is_none());
        assert!(s.error.is_none());
    }

    #[test]
    fn new_version_matches_cargo_pkg() {
        assert_eq!(status().version, env!("CARGO_PKG_VERSION"));
    }

    #[test]
    fn state_serializes_to_lowercase() {
        // TOML requires a root table, so verify the value via MonitorStatus.
        let mut s = status();
        assert!(toml::to_string_pretty(&s).unwrap().contains("state = \"monitoring\""));
        s.state = MonitorState::Stopped;
        assert!(toml::to_string_pretty(&s).unwrap().contains("state = \"stopped\""));
    }

    #[test]
    fn write_status_creates_parent_directory() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("status.toml");
        write_status(&path, &status());
        assert!(path.exists());
    }

    #[test]
    fn write_status_content_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("status.toml");

        let mut original = status();
        original.detection_count = 3;
        original.delivery_failures = 1;
        original.last_alert_at = Some("2024-12-28T10:00:00+00:00".to_string());
        write_status(&path, &original);

        let parsed: MonitorStatus =
            toml::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(parsed.detection_count, 3);
        assert_eq!(parsed.delivery_failures, 1);
        assert_eq!(parsed.last_alert_at, original.last_alert_at);
        assert_eq!(parsed.state, MonitorState::Monitoring);
    }

    #[test]
    fn write_status_omits_none_optional_fields() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("status.toml");
        write_status(&path, &status());

        let content = std::fs::read_to_string(&path).unwrap();
        assert!(!content.contains("last_alert_at"));
        assert!(!content.contains("error"));
    }
}
