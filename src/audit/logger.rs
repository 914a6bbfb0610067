//! Append-only JSON lines audit file.

use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use tracing::{debug, warn};

use crate::error::DaemonError;

use super::entry::AuditEntry;

/// Writes [`AuditEntry`] values to a file, one per line.
pub struct AuditLogger {
    file: Mutex<File>,
    path: PathBuf,
}

impl AuditLogger {
    /// Open `path` for appending, creating it and its parent directory.
    pub fn open(path: &Path) -> Result<Self, DaemonError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let file = OpenOptions::new().create(true).append(true).open(path)?;

        debug!(path = %path.display(), "Audit log opened");

        Ok(Self {
            file: Mutex::new(file),
            path: path.to_path_buf(),
        })
    }

    /// Append one entry and sync it to disk.
    pub fn log(&self, entry: &AuditEntry) -> Result<(), DaemonError> {
        let mut line = serde_json::to_vec(entry)?;
        line.push(b'\n');

        // A writer that panicked mid-entry leaves at most a torn line; the
        // file handle itself is still usable.
        let mut file = self.file.lock().unwrap_or_else(|poisoned| poisoned.into_inner());

        // Single write so concurrent entries never interleave.
        file.write_all(&line)?;

        if let Err(e) = file.sync_data() {
            warn!(error = %e, "Failed to sync audit log");
        }

        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}
