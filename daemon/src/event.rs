use crate::config::Config;

pub enum MonitorEvent {
    /// The config file changed on disk and was successfully re-parsed.
    ConfigReloaded(Config),
    /// Ctrl+C received; send the stop notification and exit.
    Shutdown,
}
