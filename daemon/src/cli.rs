use std::path::PathBuf;

use clap::Parser;

/// Watches the ESET Security logs and posts detections to a webhook.
#[derive(Debug, Parser)]
#[command(name = "eset-monitor", version)]
pub struct Cli {
    /// Write an EICAR test file for ESET to detect; removed again on exit.
    #[arg(long)]
    pub test: bool,

    /// Config file to use instead of %APPDATA%\EsetMonitor\config.toml.
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Status file to write instead of %APPDATA%\EsetMonitor\status.toml.
    #[arg(long, value_name = "PATH")]
    pub status: Option<PathBuf>,

    /// Log to stderr only.
    #[arg(long)]
    pub no_file_log: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_arguments_uses_defaults() {
        let cli = Cli::try_parse_from(["eset-monitor"]).unwrap();
        assert!(!cli.test);
        assert!(cli.config.is_none());
        assert!(cli.status.is_none());
        assert!(!cli.no_file_log);
    }

    #[test]
    fn parses_all_flags() {
        let cli = Cli::try_parse_from([
            "eset-monitor",
            "--test",
            "--config",
            "my.toml",
            "--status",
            "out.toml",
            "--no-file-log",
        ])
        .unwrap();
        assert!(cli.test);
        assert_eq!(cli.config, Some(PathBuf::from("my.toml")));
        assert_eq!(cli.status, Some(PathBuf::from("out.toml")));
        assert!(cli.no_file_log);
    }

    #[test]
    fn rejects_unknown_flag() {
        assert!(Cli::try_parse_from(["eset-monitor", "--bogus"]).is_err());
    }
}
