/// Notification data model: what gets rendered and handed to a delivery sink.
///
/// Nothing in here performs I/O. The [`Dispatcher`](crate::dispatcher::Dispatcher)
/// decides *whether* to send; this module decides *what* a notification says.
use std::time::Duration;

use chrono::{DateTime, Local, Utc};

pub const MONITOR_NAME: &str = "ESET Security Monitor";

pub const ESET_LOGO: &str =
    "https://www.eset.com/fileadmin/ESET/INT/Images/Logo/eset-logo-1024x1024.png";
pub const THREAT_IMAGE: &str =
    "https://www.eset.com/fileadmin/ESET/INT/Images/Icons/threat-types/ransomware.png";
pub const SHIELD_IMAGE: &str =
    "https://www.eset.com/fileadmin/ESET/INT/Images/Icons/products/home-products/antivirus.png";

const COLOR_RED: u32 = 16_711_680;
const COLOR_BLUE: u32 = 5_814_783;
const COLOR_GRAY: u32 = 10_181_046;

/// How urgent a notification is. Only [`Severity::Alert`] bypasses throttling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// A threat or scan-activity event was detected.
    Alert,
    /// The monitor began watching.
    Start,
    /// The monitor is shutting down.
    Stop,
}

impl Severity {
    pub fn as_str(self) -> &'static str {
        match self {
            Severity::Alert => "alert",
            Severity::Start => "start",
            Severity::Stop => "stop",
        }
    }

    /// Color and thumbnail used when rendering this severity.
    pub fn theme(self) -> Theme {
        match self {
            Severity::Alert => Theme {
                color: COLOR_RED,
                thumbnail: THREAT_IMAGE,
            },
            Severity::Start => Theme {
                color: COLOR_BLUE,
                thumbnail: SHIELD_IMAGE,
            },
            Severity::Stop => Theme {
                color: COLOR_GRAY,
                thumbnail: ESET_LOGO,
            },
        }
    }
}

/// Cosmetic metadata for a rendered notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Theme {
    pub color: u32,
    pub thumbnail: &'static str,
}

/// Which log file produced a detection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DetectionKind {
    /// `virlog.dat` changed.
    Threat,
    /// `scan.dat` changed.
    ScanActivity,
}

/// Details of a detected change, as shown in an alert.
#[derive(Debug, Clone, PartialEq)]
pub struct DetectionInfo {
    pub kind: DetectionKind,
    pub detection_type: String,
    pub action: String,
    pub location: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

impl DetectionInfo {
    pub fn threat(occurred_at: DateTime<Utc>) -> Self {
        Self {
            kind: DetectionKind::Threat,
            detection_type: "Malware Detection".to_string(),
            action: "Threat Quarantined".to_string(),
            location: Some("See ESET Security interface for details".to_string()),
            occurred_at,
        }
    }

    pub fn scan_activity(occurred_at: DateTime<Utc>) -> Self {
        Self {
            kind: DetectionKind::ScanActivity,
            detection_type: "Scan Completion".to_string(),
            action: "Scan Finished".to_string(),
            location: Some("System Scan".to_string()),
            occurred_at,
        }
    }
}

/// A request to notify, before the dispatcher has rendered it.
#[derive(Debug, Clone)]
pub struct Notification {
    pub title: String,
    pub message: String,
    pub severity: Severity,
    pub detection: Option<DetectionInfo>,
}

impl Notification {
    /// The alert raised for a detected change of the given kind.
    pub fn alert(detection: DetectionInfo) -> Self {
        let (title, message) = match detection.kind {
            DetectionKind::Threat => ("⚠️ Threat Detected!", "ESET has detected a potential threat."),
            DetectionKind::ScanActivity => ("🔍 Scan Activity", "ESET has completed a scan operation."),
        };
        Self {
            title: title.to_string(),
            message: message.to_string(),
            severity: Severity::Alert,
            detection: Some(detection),
        }
    }

    pub fn started() -> Self {
        Self {
            title: "🚀 Monitor Started".to_string(),
            message: format!("{MONITOR_NAME} is now active and watching for threats."),
            severity: Severity::Start,
            detection: None,
        }
    }

    pub fn stopped() -> Self {
        Self {
            title: "🛑 Monitor Stopped".to_string(),
            message: format!("{MONITOR_NAME} has been stopped."),
            severity: Severity::Stop,
            detection: None,
        }
    }
}

/// One labelled value in a rendered notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Field {
    pub label: String,
    pub value: String,
    pub inline: bool,
}

impl Field {
    fn new(label: &str, value: impl Into<String>, inline: bool) -> Self {
        Self {
            label: label.to_string(),
            value: value.into(),
            inline,
        }
    }
}

/// A fully rendered notification, ready for a [`DeliverySink`](crate::sink::DeliverySink).
#[derive(Debug, Clone, PartialEq)]
pub struct NotificationContext {
    pub title: String,
    pub body: String,
    pub severity: Severity,
    pub fields: Vec<Field>,
    /// Threat detections at render time, for sinks that don't parse `fields`.
    pub detection_count: u64,
    pub uptime: Duration,
    pub timestamp: DateTime<Utc>,
}

impl NotificationContext {
    pub fn theme(&self) -> Theme {
        self.severity.theme()
    }

    /// `uptime` rendered with [`format_duration`].
    pub fn uptime_text(&self) -> String {
        format_duration(self.uptime)
    }
}

/// Process-wide values the field composition depends on.
#[derive(Debug, Clone, Copy)]
pub struct Counters {
    pub detection_count: u64,
    pub uptime: Duration,
    pub started_at: DateTime<Local>,
}

/// Builds the severity-specific field list.
pub fn compose_fields(
    severity: Severity,
    detection: Option<&DetectionInfo>,
    counters: &Counters,
) -> Vec<Field> {
    match severity {
        Severity::Alert => {
            let detection_type = detection
                .map(|d| d.detection_type.as_str())
                .unwrap_or("Unknown Threat");
            let action = detection
                .map(|d| d.action.as_str())
                .unwrap_or("Threat Removed");

            let mut fields = vec![
                Field::new("🔍 Detection Type", detection_type, true),
                Field::new("🛡️ Action Taken", action, true),
                Field::new("📊 Detection Count", counters.detection_count.to_string(), true),
            ];
            if let Some(location) = detection
                .and_then(|d| d.location.as_deref())
                .filter(|l| !l.is_empty())
            {
                fields.push(Field::new("📁 Location", format!("`{location}`"), false));
            }
            fields
        }
        Severity::Start => vec![
            Field::new("📊 Status", "Monitoring Active", true),
            Field::new(
                "🕒 Started At",
                counters.started_at.format("%Y-%m-%d %H:%M:%S").to_string(),
                true,
            ),
        ],
        Severity::Stop => vec![
            Field::new(
                "📊 Final Statistics",
                format!("Total Detections: {}", counters.detection_count),
                true,
            ),
            Field::new("⏱️ Total Runtime", format_duration(counters.uptime), true),
        ],
    }
}

/// Formats a duration as `"1h 2m 5s"`, `"2m 5s"` or `"45s"`, truncating
/// sub-second precision.
pub fn format_duration(duration: Duration) -> String {
    let total = duration.as_secs();
    let (hours, rem) = (total / 3600, total % 3600);
    let (minutes, seconds) = (rem / 60, rem % 60);
    if hours > 0 {
        format!("{hours}h {minutes}m {seconds}s")
    } else if minutes > 0 {
        format!("{minutes}m {seconds}s")
    } else {
        format!("{seconds}s")
    }
}
