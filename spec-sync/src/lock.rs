//! Exclusive lock for maintenance sweeps over the storage roots
//!
//! The duplicate resolver assumes nobody else mutates the increment roots
//! while it runs. The lock file lives at `<root>/.duplicate-resolver.lock`,
//! holds JSON [`LockMetadata`], and is released when [`SweepLock`] drops.

use chrono::{DateTime, Utc};
use fs2::FileExt;
use serde::{Deserialize, Serialize};
use std::fs::{File, OpenOptions};
use std::io::{Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use crate::clock::Clock;
use crate::error::{Result, SyncError};

/// Lock file name created under the increments root.
pub const SWEEP_LOCK_FILE: &str = ".duplicate-resolver.lock";

/// Metadata stored in the lock file for diagnostics.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LockMetadata {
    /// Process ID of the lock holder
    pub pid: u32,

    /// When the lock was acquired
    pub started_at: DateTime<Utc>,

    /// What the holder is doing
    pub operation: String,
}

impl LockMetadata {
    pub fn current(operation: &str, clock: &dyn Clock) -> Self {
        Self {
            pid: std::process::id(),
            started_at: clock.now(),
            operation: operation.to_string(),
        }
    }

    /// Format for display in error messages.
    pub fn display_summary(&self) -> String {
        format!(
            "PID {} ({}) since {}",
            self.pid,
            self.operation,
            self.started_at.to_rfc3339()
        )
    }
}

/// A held sweep lock. Released on drop.
#[derive(Debug)]
pub struct SweepLock {
    file: File,
    path: PathBuf,
    metadata: LockMetadata,
}

impl SweepLock {
    /// Try to take the lock for `root` without blocking.
    ///
    /// Fails with [`SyncError::Locked`] when another holder has it.
    pub fn acquire(root: &Path, metadata: LockMetadata) -> Result<Self> {
        std::fs::create_dir_all(root).map_err(|e| SyncError::DirectoryCreate {
            path: root.to_path_buf(),
            source: e,
        })?;
        let path = root.join(SWEEP_LOCK_FILE);

        let mut file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .read(true)
            .write(true)
            .open(&path)
            .map_err(|e| SyncError::FileWrite {
                path: path.clone(),
                source: e,
            })?;

        if file.try_lock_exclusive().is_err() {
            let holder = read_lock_metadata(&path)
                .map(|m| m.display_summary())
                .unwrap_or_else(|| "unknown holder".to_string());
            return Err(SyncError::Locked { path, holder });
        }

        let json = serde_json::to_string_pretty(&metadata).map_err(SyncError::JsonSerialize)?;
        let write_err = |e| SyncError::FileWrite {
            path: path.clone(),
            source: e,
        };
        file.set_len(0).map_err(write_err)?;
        file.seek(SeekFrom::Start(0)).map_err(write_err)?;
        file.write_all(json.as_bytes()).map_err(write_err)?;
        file.sync_all().map_err(write_err)?;

        tracing::debug!(path = %path.display(), pid = metadata.pid, "Sweep lock acquired");
        Ok(Self {
            file,
            path,
            metadata,
        })
    }

    pub fn metadata(&self) -> &LockMetadata {
        &self.metadata
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for SweepLock {
    fn drop(&mut self) {
        let _ = std::fs::remove_file(&self.path);
        let _ = FileExt::unlock(&self.file);
    }
}

/// Read lock metadata from an existing lock file.
pub fn read_lock_metadata(path: &Path) -> Option<LockMetadata> {
    let contents = std::fs::read_to_string(path).ok()?;
    serde_json::from_str(&contents).ok()
}
