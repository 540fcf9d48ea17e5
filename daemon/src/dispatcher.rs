/// Decides whether a notification goes out, renders it, and keeps the
/// process-wide counters.
///
/// Alerts are never throttled. Every other severity is dropped when the
/// previous dispatch happened less than `rate_limit` ago. The gate is
/// recomputed on every call; there is no other state machine.
use std::time::Duration;

use chrono::{DateTime, Local, Utc};
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::notification::{
    compose_fields, Counters, DetectionKind, Notification, NotificationContext, Severity,
};
use crate::sink::DeliverySink;

pub const DEFAULT_RATE_LIMIT: Duration = Duration::from_secs(5);

/// What happened to a single notify call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// The sink accepted the notification.
    Sent,
    /// Dropped by the rate limit; nothing reached the sink.
    Suppressed,
    /// Handed to the sink, which reported an error.
    Failed,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchStats {
    pub sent: u64,
    pub suppressed: u64,
    pub failed: u64,
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Gate {
    Throttled,
    Bypass,
}

pub struct Dispatcher<S> {
    sink: S,
    rate_limit: Duration,
    started_at: Instant,
    started_at_local: DateTime<Local>,
    last_sent_at: Option<Instant>,
    detection_count: u64,
    stats: DispatchStats,
}

impl<S: DeliverySink> Dispatcher<S> {
    pub fn new(sink: S, rate_limit: Duration) -> Self {
        Self {
            sink,
            rate_limit,
            started_at: Instant::now(),
            started_at_local: Local::now(),
            last_sent_at: None,
            detection_count: 0,
            stats: DispatchStats::default(),
        }
    }

    pub fn detection_count(&self) -> u64 {
        self.detection_count
    }

    pub fn stats(&self) -> DispatchStats {
        self.stats
    }

    pub fn started_at(&self) -> DateTime<Local> {
        self.started_at_local
    }

    pub fn set_rate_limit(&mut self, rate_limit: Duration) {
        self.rate_limit = rate_limit;
    }

    pub fn sink_mut(&mut self) -> &mut S {
        &mut self.sink
    }

    /// Renders and delivers `notification`, subject to the rate limit.
    ///
    /// Delivery errors are logged and counted, never returned.
    pub async fn notify(&mut self, notification: Notification) -> DispatchOutcome {
        self.dispatch(notification, Gate::Throttled).await
    }

    /// Like [`notify`](Self::notify) but skips the rate limit. Used once, for
    /// the stop notification sent on shutdown.
    pub async fn notify_final(&mut self, notification: Notification) -> DispatchOutcome {
        self.dispatch(notification, Gate::Bypass).await
    }

    async fn dispatch(&mut self, notification: Notification, gate: Gate) -> DispatchOutcome {
        let now = Instant::now();

        if gate == Gate::Throttled
            && notification.severity != Severity::Alert
            && self.is_throttled(now)
        {
            debug!(
                "Suppressed {} notification '{}' (rate limit {:?})",
                notification.severity.as_str(),
                notification.title,
                self.rate_limit
            );
            self.stats.suppressed += 1;
            return DispatchOutcome::Suppressed;
        }

        self.last_sent_at = Some(now);

        let is_threat = notification
            .detection
            .as_ref()
            .is_some_and(|d| d.kind == DetectionKind::Threat);
        if notification.severity == Severity::Alert && is_threat {
            self.detection_count += 1;
        }

        let context = self.render(notification, now);
        info!(
            "Sending {} notification: {} (detections: {})",
            context.severity.as_str(),
            context.title,
            context.detection_count
        );

        match self.sink.deliver(&context).await {
            Ok(()) => {
                self.stats.sent += 1;
                DispatchOutcome::Sent
            }
            Err(e) => {
                warn!("Failed to deliver '{}': {e}", context.title);
                self.stats.failed += 1;
                DispatchOutcome::Failed
            }
        }
    }

    fn is_throttled(&self, now: Instant) -> bool {
        self.last_sent_at
            .is_some_and(|last| now.duration_since(last) < self.rate_limit)
    }

    fn render(&self, notification: Notification, now: Instant) -> NotificationContext {
        let counters = Counters {
            detection_count: self.detection_count,
            uptime: now.duration_since(self.started_at),
            started_at: self.started_at_local,
        };
        let fields = compose_fields(
            notification.severity,
            notification.detection.as_ref(),
            &counters,
        );
        let timestamp: DateTime<Utc> = notification
            .detection
            .as_ref()
            .map(|d| d.occurred_at)
            .unwrap_or_else(Utc::now);

        NotificationContext {
            title: notification.title,
            body: notification.message,
            severity: notification.severity,
            fields,
            detection_count: counters.detection_count,
            uptime: counters.uptime,
            timestamp,
        }
    }
}
