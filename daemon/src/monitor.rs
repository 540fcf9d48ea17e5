/// The poll → detect → dispatch cycle for the two ESET log files.
///
/// A `Monitor` owns both targets, the dispatcher, and the status snapshot.
/// The event loop in `main` is its only caller, so none of this state is
/// shared.
use std::path::{Path, PathBuf};

use chrono::Utc;
use tracing::{error, info};

use crate::dispatcher::{DispatchOutcome, Dispatcher};
use crate::notification::{DetectionInfo, DetectionKind, Notification};
use crate::sink::DeliverySink;
use crate::status::{self, MonitorState, MonitorStatus};
use crate::test_file;
use crate::watcher::MonitoredTarget;

pub struct Monitor<S> {
    threat: MonitoredTarget,
    scan: MonitoredTarget,
    dispatcher: Dispatcher<S>,
    status: MonitorStatus,
    status_path: Option<PathBuf>,
    test_file: Option<PathBuf>,
}

impl<S: DeliverySink> Monitor<S> {
    /// Seeds both targets from the current file sizes.
    pub fn new(threat_log: PathBuf, scan_log: PathBuf, dispatcher: Dispatcher<S>) -> Self {
        let status = MonitorStatus::new(dispatcher.started_at().to_rfc3339());
        Self {
            threat: MonitoredTarget::new(threat_log),
            scan: MonitoredTarget::new(scan_log),
            dispatcher,
            status,
            status_path: None,
            test_file: None,
        }
    }

    /// Writes a status snapshot to `path` after every state change.
    pub fn with_status_file(mut self, path: PathBuf) -> Self {
        self.status_path = Some(path);
        self
    }

    /// Creates an EICAR test file at `path` on [`start`](Self::start) and
    /// removes it on [`shutdown`](Self::shutdown).
    pub fn with_test_file(mut self, path: PathBuf) -> Self {
        self.test_file = Some(path);
        self
    }

    pub fn dispatcher(&self) -> &Dispatcher<S> {
        &self.dispatcher
    }

    pub fn dispatcher_mut(&mut self) -> &mut Dispatcher<S> {
        &mut self.dispatcher
    }

    pub fn status(&self) -> &MonitorStatus {
        &self.status
    }

    pub fn threat_log(&self) -> &Path {
        self.threat.path()
    }

    pub fn scan_log(&self) -> &Path {
        self.scan.path()
    }

    /// Seeds the test artifact (if requested) and announces the start.
    pub async fn start(&mut self) {
        if let Some(path) = &self.test_file {
            if let Err(e) = test_file::create(path) {
                error!("{e:#}");
                self.status.error = Some(format!("{e:#}"));
            }
        }

        info!(
            "Watching {} and {}",
            self.threat_log().display(),
            self.scan_log().display()
        );
        self.dispatcher.notify(Notification::started()).await;
        self.publish_status();
    }

    /// Checks both logs once and alerts on each change.
    /// Returns `true` if either file changed.
    pub async fn poll(&mut self) -> bool {
        let threat_changed = self.check(DetectionKind::Threat).await;
        let scan_changed = self.check(DetectionKind::ScanActivity).await;
        let changed = threat_changed || scan_changed;
        if changed {
            self.publish_status();
        }
        changed
    }

    async fn check(&mut self, kind: DetectionKind) -> bool {
        let target = match kind {
            DetectionKind::Threat => &self.threat,
            DetectionKind::ScanActivity => &self.scan,
        };
        let check = target.check_size();
        if !check.changed {
            return false;
        }

        info!(
            "{} changed: {} -> {} bytes",
            target.path().display(),
            target.last_observed_size(),
            check.new_size
        );

        let now = Utc::now();
        let detection = match kind {
            DetectionKind::Threat => DetectionInfo::threat(now),
            DetectionKind::ScanActivity => {
                self.status.scan_count += 1;
                DetectionInfo::scan_activity(now)
            }
        };
        self.status.last_alert_at = Some(now.to_rfc3339());

        match self.dispatcher.notify(Notification::alert(detection)).await {
            DispatchOutcome::Sent => self.status.error = None,
            DispatchOutcome::Failed => {
                self.status.error = Some("Last alert could not be delivered".to_string());
            }
            DispatchOutcome::Suppressed => {}
        }

        match kind {
            DetectionKind::Threat => self.threat.commit(check.new_size),
            DetectionKind::ScanActivity => self.scan.commit(check.new_size),
        }
        true
    }

    /// Points the monitor at new log paths. A target whose path changed is
    /// re-seeded from the new file's current size, so switching does not alert.
    pub fn retarget(&mut self, threat_log: PathBuf, scan_log: PathBuf) {
        if self.threat.path() != threat_log {
            info!("Threat log is now {}", threat_log.display());
            self.threat = MonitoredTarget::new(threat_log);
        }
        if self.scan.path() != scan_log {
            info!("Scan log is now {}", scan_log.display());
            self.scan = MonitoredTarget::new(scan_log);
        }
    }

    /// Graceful stop: removes the test artifact, sends the final stop
    /// notification regardless of the rate limit, and records the final status.
    ///
    /// `loop_error` is the error that ended the poll loop, if any.
    pub async fn shutdown(&mut self, loop_error: Option<&anyhow::Error>) {
        if let Some(path) = &self.test_file {
            test_file::remove(path);
        }

        self.dispatcher.notify_final(Notification::stopped()).await;

        self.status.state = MonitorState::Stopped;
        if let Some(e) = loop_error {
            self.status.error = Some(format!("{e:#}"));
        }
        self.publish_status();
    }

    fn publish_status(&mut self) {
        let stats = self.dispatcher.stats();
        self.status.detection_count = self.dispatcher.detection_count();
        self.status.notifications_sent = stats.sent;
        self.status.notifications_suppressed = stats.suppressed;
        self.status.delivery_failures = stats.failed;
        if let Some(path) = &self.status_path {
            status::write_status(path, &self.status);
        }
    }
}
