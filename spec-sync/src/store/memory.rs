//! In-memory store for tests, with failure injection.

use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Component, Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use super::{DirEntry, FileStore};
use crate::error::{Result, SyncError};

#[derive(Debug, Clone)]
struct MemFile {
    bytes: Vec<u8>,
    modified: Option<DateTime<Utc>>,
}

#[derive(Debug, Default)]
struct Inner {
    files: BTreeMap<PathBuf, MemFile>,
    dirs: BTreeSet<PathBuf>,
    fail_removals_under: Vec<PathBuf>,
    fail_writes_under: Vec<PathBuf>,
}

/// Ephemeral store keyed by normalized path.
#[derive(Debug, Default)]
pub struct MemoryFileStore {
    inner: Mutex<Inner>,
}

fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                out.pop();
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}

fn injected(path: &Path, what: &str) -> std::io::Error {
    std::io::Error::new(
        std::io::ErrorKind::PermissionDenied,
        format!("{what} failure injected for {}", path.display()),
    )
}

impl MemoryFileStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    /// Make every removal at or below `prefix` fail with `PermissionDenied`.
    pub fn fail_removals_under(&self, prefix: impl AsRef<Path>) {
        self.lock()
            .fail_removals_under
            .push(normalize(prefix.as_ref()));
    }

    /// Make every write or copy at or below `prefix` fail with `PermissionDenied`.
    pub fn fail_writes_under(&self, prefix: impl AsRef<Path>) {
        self.lock().fail_writes_under.push(normalize(prefix.as_ref()));
    }

    /// Seed a file with an explicit modification time.
    pub fn insert_file(
        &self,
        path: impl AsRef<Path>,
        text: &str,
        modified: Option<DateTime<Utc>>,
    ) {
        let path = normalize(path.as_ref());
        let mut inner = self.lock();
        add_parents(&mut inner.dirs, &path);
        inner.files.insert(
            path,
            MemFile {
                bytes: text.as_bytes().to_vec(),
                modified,
            },
        );
    }
}

fn add_parents(dirs: &mut BTreeSet<PathBuf>, path: &Path) {
    let mut current = path.parent();
    while let Some(dir) = current {
        if dir.as_os_str().is_empty() {
            break;
        }
        dirs.insert(dir.to_path_buf());
        current = dir.parent();
    }
}

impl Inner {
    fn removal_blocked(&self, path: &Path) -> bool {
        self.fail_removals_under.iter().any(|p| path.starts_with(p))
    }

    fn write_blocked(&self, path: &Path) -> bool {
        self.fail_writes_under.iter().any(|p| path.starts_with(p))
    }

    fn put(&mut self, path: PathBuf, bytes: Vec<u8>) {
        add_parents(&mut self.dirs, &path);
        self.files.insert(
            path,
            MemFile {
                bytes,
                modified: None,
            },
        );
    }
}

impl FileStore for MemoryFileStore {
    fn read_text(&self, path: &Path) -> Result<Option<String>> {
        let Some(bytes) = self.read_bytes(path)? else {
            return Ok(None);
        };
        String::from_utf8(bytes)
            .map(Some)
            .map_err(|e| SyncError::FileRead {
                path: path.to_path_buf(),
                source: std::io::Error::new(std::io::ErrorKind::InvalidData, e),
            })
    }

    fn read_bytes(&self, path: &Path) -> Result<Option<Vec<u8>>> {
        Ok(self
            .lock()
            .files
            .get(&normalize(path))
            .map(|f| f.bytes.clone()))
    }

    fn write_text_atomic(&self, path: &Path, text: &str) -> Result<()> {
        let path = normalize(path);
        let mut inner = self.lock();
        if inner.write_blocked(&path) {
            return Err(SyncError::FileWrite {
                source: injected(&path, "write"),
                path,
            });
        }
        inner.put(path, text.as_bytes().to_vec());
        Ok(())
    }

    fn list_dir(&self, path: &Path) -> Result<Vec<DirEntry>> {
        let dir = normalize(path);
        let inner = self.lock();
        let mut entries = BTreeMap::new();
        for file in inner.files.keys() {
            if file.parent() == Some(dir.as_path())
                && let Some(name) = file.file_name()
            {
                entries.insert(name.to_string_lossy().to_string(), false);
            }
        }
        for sub in &inner.dirs {
            if sub.parent() == Some(dir.as_path())
                && let Some(name) = sub.file_name()
            {
                entries.insert(name.to_string_lossy().to_string(), true);
            }
        }
        Ok(entries
            .into_iter()
            .map(|(name, is_dir)| DirEntry { name, is_dir })
            .collect())
    }

    fn exists(&self, path: &Path) -> bool {
        let path = normalize(path);
        let inner = self.lock();
        inner.files.contains_key(&path) || inner.dirs.contains(&path)
    }

    fn is_dir(&self, path: &Path) -> bool {
        self.lock().dirs.contains(&normalize(path))
    }

    fn modified(&self, path: &Path) -> Option<DateTime<Utc>> {
        self.lock()
            .files
            .get(&normalize(path))
            .and_then(|f| f.modified)
    }

    fn create_dir_all(&self, path: &Path) -> Result<()> {
        let path = normalize(path);
        let mut inner = self.lock();
        add_parents(&mut inner.dirs, &path);
        inner.dirs.insert(path);
        Ok(())
    }

    fn copy_file(&self, from: &Path, to: &Path) -> Result<()> {
        let from = normalize(from);
        let to = normalize(to);
        let mut inner = self.lock();
        if inner.write_blocked(&to) {
            return Err(SyncError::Copy {
                source: injected(&to, "copy"),
                from,
                to,
            });
        }
        let Some(file) = inner.files.get(&from).cloned() else {
            return Err(SyncError::Copy {
                source: std::io::Error::new(std::io::ErrorKind::NotFound, "source missing"),
                from,
                to,
            });
        };
        add_parents(&mut inner.dirs, &to);
        inner.files.insert(to, file);
        Ok(())
    }

    fn rename(&self, from: &Path, to: &Path) -> Result<()> {
        let from = normalize(from);
        let to = normalize(to);
        let mut inner = self.lock();
        let Some(file) = inner.files.remove(&from) else {
            return Err(SyncError::Rename {
                source: std::io::Error::new(std::io::ErrorKind::NotFound, "source missing"),
                from,
                to,
            });
        };
        add_parents(&mut inner.dirs, &to);
        inner.files.insert(to, file);
        Ok(())
    }

    fn remove_file(&self, path: &Path) -> Result<()> {
        let path = normalize(path);
        let mut inner = self.lock();
        if inner.removal_blocked(&path) {
            return Err(SyncError::Remove {
                source: injected(&path, "remove"),
                path,
            });
        }
        if inner.files.remove(&path).is_none() {
            return Err(SyncError::Remove {
                source: std::io::Error::new(std::io::ErrorKind::NotFound, "no such file"),
                path,
            });
        }
        Ok(())
    }

    fn remove_dir_all(&self, path: &Path) -> Result<()> {
        let path = normalize(path);
        let mut inner = self.lock();
        if inner.removal_blocked(&path) {
            return Err(SyncError::Remove {
                source: injected(&path, "remove"),
                path,
            });
        }
        inner.files.retain(|p, _| !p.starts_with(&path));
        inner.dirs.retain(|p| !p.starts_with(&path));
        Ok(())
    }
}
