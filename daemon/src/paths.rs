/// Canonical file paths for the monitor's own data files.
///
/// Everything lives under %APPDATA%\EsetMonitor\:
///   - config.toml   Read (and watched) by the monitor.
///   - status.toml   Written by the monitor for external readers.
///   - logs\         Daily rolling log files.
///   - test_folder\  EICAR test file created by `--test`.
use std::path::PathBuf;

const APP_DIR_NAME: &str = "EsetMonitor";
pub const CONFIG_FILE_NAME: &str = "config.toml";
pub const STATUS_FILE_NAME: &str = "status.toml";
pub const LOG_DIR_NAME: &str = "logs";
pub const TEST_DIR_NAME: &str = "test_folder";
pub const TEST_FILE_NAME: &str = "test_virus.txt";

const EXPANDED_VARS: &[&str] = &[
    "USERPROFILE",
    "APPDATA",
    "LOCALAPPDATA",
    "PROGRAMDATA",
    "TEMP",
    "TMP",
];

/// Expands %VAR%-style environment variables embedded in Windows paths.
/// Variable names match case-insensitively, as they do on Windows.
pub fn expand_env(s: &str) -> String {
    expand_with(s, |var| std::env::var(var).ok())
}

fn expand_with(s: &str, lookup: impl Fn(&str) -> Option<String>) -> String {
    let mut result = s.to_string();
    for var in EXPANDED_VARS {
        let Some(val) = lookup(var) else { continue };
        let needle = format!("%{var}%");
        let mut from = 0;
        while let Some(offset) = result[from..].to_ascii_uppercase().find(&needle) {
            let start = from + offset;
            result.replace_range(start..start + needle.len(), &val);
            from = start + val.len();
        }
    }
    result
}

/// Returns the monitor's application data directory: %APPDATA%\EsetMonitor\
///
/// Falls back to the working directory when %APPDATA% is not set (non-Windows).
pub fn app_data_dir() -> PathBuf {
    let base = std::env::var_os("APPDATA")
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("."));
    base.join(APP_DIR_NAME)
}

/// Returns the full path to the config file: %APPDATA%\EsetMonitor\config.toml
pub fn config_file_path() -> PathBuf {
    app_data_dir().join(CONFIG_FILE_NAME)
}

/// Returns the full path to the status file: %APPDATA%\EsetMonitor\status.toml
pub fn status_file_path() -> PathBuf {
    app_data_dir().join(STATUS_FILE_NAME)
}

pub fn log_dir() -> PathBuf {
    app_data_dir().join(LOG_DIR_NAME)
}

/// Returns the EICAR test file path: %APPDATA%\EsetMonitor\test_folder\test_virus.txt
pub fn test_file_path() -> PathBuf {
    app_data_dir().join(TEST_DIR_NAME).join(TEST_FILE_NAME)
}
