/// Byte-size polling for the ESET log files.
///
/// ESET appends a record to `virlog.dat` for every detection and to
/// `scan.dat` for every finished scan, so a change in either file's size is
/// used as a cheap proxy for "something happened". The watcher never looks
/// inside the files.
use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;

/// Why a file's size could not be read.
#[derive(Debug, Error)]
pub enum ProbeError {
    #[error("{} does not exist", .0.display())]
    Missing(PathBuf),
    #[error("cannot read metadata for {}: {}", .path.display(), .source)]
    Inaccessible {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Reads the current byte size of `path`.
pub fn probe_size(path: &Path) -> Result<u64, ProbeError> {
    match std::fs::metadata(path) {
        Ok(meta) => Ok(meta.len()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Err(ProbeError::Missing(path.to_path_buf())),
        Err(source) => Err(ProbeError::Inaccessible {
            path: path.to_path_buf(),
            source,
        }),
    }
}

/// Like [`probe_size`], but an unreadable file counts as empty.
///
/// Probe errors never leave this function: a log file that is missing or
/// locked is indistinguishable from an empty one as far as change detection
/// is concerned.
pub fn size_or_zero(path: &Path) -> u64 {
    match probe_size(path) {
        Ok(size) => size,
        Err(e) => {
            tracing::trace!("Treating as empty: {e}");
            0
        }
    }
}

/// Result of a single [`MonitoredTarget::check_size`] call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SizeCheck {
    /// `true` iff `new_size` differs from the last committed size.
    pub changed: bool,
    pub new_size: u64,
}

/// A polled file and the size it had at the most recent commit.
#[derive(Debug, Clone)]
pub struct MonitoredTarget {
    path: PathBuf,
    last_observed_size: u64,
}

impl MonitoredTarget {
    /// Creates a target seeded with the file's current size (0 if unreadable).
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let last_observed_size = size_or_zero(&path);
        Self {
            path,
            last_observed_size,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn last_observed_size(&self) -> u64 {
        self.last_observed_size
    }

    /// Compares the file's current size against the last committed size.
    ///
    /// Growth and shrinkage both count as a change. The target is not
    /// updated; call [`commit`](Self::commit) once the change is handled,
    /// otherwise the next check reports the same change again.
    pub fn check_size(&self) -> SizeCheck {
        let new_size = size_or_zero(&self.path);
        SizeCheck {
            changed: new_size != self.last_observed_size,
            new_size,
        }
    }

    pub fn commit(&mut self, new_size: u64) {
        self.last_observed_size = new_size;
    }
}
