//! File store abstraction
//!
//! Every engine component reads and writes through [`FileStore`], never
//! through `std::fs` directly. [`LocalFileStore`] is the production backend;
//! [`MemoryFileStore`] backs tests and supports failure injection.

mod local;
mod memory;

pub use local::LocalFileStore;
pub use memory::MemoryFileStore;

use chrono::{DateTime, Utc};
use std::path::{Path, PathBuf};

use crate::error::Result;

/// One entry returned by [`FileStore::list_dir`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirEntry {
    pub name: String,
    pub is_dir: bool,
}

/// Narrow filesystem contract used by the engine.
pub trait FileStore: Send + Sync {
    /// Read a UTF-8 text file. `Ok(None)` when the file does not exist.
    fn read_text(&self, path: &Path) -> Result<Option<String>>;

    /// Read raw bytes. `Ok(None)` when the file does not exist.
    fn read_bytes(&self, path: &Path) -> Result<Option<Vec<u8>>>;

    /// Replace `path` with `text` so readers see either the old or the new
    /// content, never a partial write. Parent directories are created.
    fn write_text_atomic(&self, path: &Path, text: &str) -> Result<()>;

    /// Entries directly under `path`, sorted by name. A missing directory
    /// lists as empty.
    fn list_dir(&self, path: &Path) -> Result<Vec<DirEntry>>;

    fn exists(&self, path: &Path) -> bool;

    fn is_dir(&self, path: &Path) -> bool;

    /// Last modification time, if known.
    fn modified(&self, path: &Path) -> Option<DateTime<Utc>>;

    fn create_dir_all(&self, path: &Path) -> Result<()>;

    /// Copy a single file, creating the destination's parent directories.
    fn copy_file(&self, from: &Path, to: &Path) -> Result<()>;

    fn rename(&self, from: &Path, to: &Path) -> Result<()>;

    fn remove_file(&self, path: &Path) -> Result<()>;

    /// Remove a directory and everything below it.
    fn remove_dir_all(&self, path: &Path) -> Result<()>;

    /// All files below `root`, as paths relative to `root`, sorted.
    fn list_files_recursive(&self, root: &Path) -> Result<Vec<PathBuf>> {
        let mut files = Vec::new();
        let mut pending = vec![PathBuf::new()];
        while let Some(rel) = pending.pop() {
            for entry in self.list_dir(&root.join(&rel))? {
                let child = rel.join(&entry.name);
                if entry.is_dir {
                    pending.push(child);
                } else {
                    files.push(child);
                }
            }
        }
        files.sort();
        Ok(files)
    }
}
