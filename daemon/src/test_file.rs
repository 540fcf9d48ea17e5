/// EICAR test artifact used to check the monitor end to end.
///
/// Writing the standard EICAR string to disk makes ESET quarantine the file,
/// which appends to `virlog.dat` and should produce a threat alert.
use std::path::Path;

use anyhow::{Context, Result};
use tracing::{info, warn};

// Split so this binary does not carry the signature contiguously.
const EICAR_HEAD: &str = r"X5O!P%@AP[4\PZX54(P^)7CC)7}$";
const EICAR_TAIL: &str = "EICAR-STANDARD-ANTIVIRUS-TEST-FILE!$H+H*";

pub fn eicar_string() -> String {
    [EICAR_HEAD, EICAR_TAIL].concat()
}

/// Writes the EICAR string to `path`, creating parent directories.
pub fn create(path: &Path) -> Result<()> {
    if let Some(dir) = path.parent() {
        if !dir.exists() {
            std::fs::create_dir_all(dir)
                .with_context(|| format!("Failed to create test directory {}", dir.display()))?;
            info!("Created test directory: {}", dir.display());
        }
    }
    std::fs::write(path, eicar_string())
        .with_context(|| format!("Failed to write test file {}", path.display()))?;
    info!("Created test file: {}", path.display());
    Ok(())
}

/// Deletes the test file if it is still there. Errors are logged and swallowed;
/// ESET has usually removed it already.
pub fn remove(path: &Path) {
    if !path.exists() {
        return;
    }
    match std::fs::remove_file(path) {
        Ok(()) => info!("Cleaned up test file"),
        Err(e) => warn!("Could not remove test file {}: {e}", path.display()),
    }
}
