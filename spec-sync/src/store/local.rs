//! `std::fs` backed store with temp-file + fsync + rename writes.

use chrono::{DateTime, Utc};
use std::io::Write;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use super::{DirEntry, FileStore};
use crate::error::{Result, SyncError};

/// Production file store on the local filesystem.
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalFileStore;

impl LocalFileStore {
    pub fn new() -> Self {
        Self
    }
}

fn temp_path_for(path: &Path) -> PathBuf {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| "file".to_string());
    path.with_file_name(format!(".{name}.tmp.{}", std::process::id()))
}

impl FileStore for LocalFileStore {
    fn read_text(&self, path: &Path) -> Result<Option<String>> {
        match std::fs::read_to_string(path) {
            Ok(text) => Ok(Some(text)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(SyncError::FileRead {
                path: path.to_path_buf(),
                source: e,
            }),
        }
    }

    fn read_bytes(&self, path: &Path) -> Result<Option<Vec<u8>>> {
        match std::fs::read(path) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(SyncError::FileRead {
                path: path.to_path_buf(),
                source: e,
            }),
        }
    }

    fn write_text_atomic(&self, path: &Path, text: &str) -> Result<()> {
        if let Some(parent) = path.parent() {
            self.create_dir_all(parent)?;
        }

        let temp_path = temp_path_for(path);
        let write_err = |e| SyncError::FileWrite {
            path: temp_path.clone(),
            source: e,
        };

        let mut file = std::fs::File::create(&temp_path).map_err(write_err)?;
        file.write_all(text.as_bytes()).map_err(write_err)?;
        file.sync_all().map_err(write_err)?;
        drop(file);

        std::fs::rename(&temp_path, path).map_err(|e| {
            let _ = std::fs::remove_file(&temp_path);
            SyncError::FileWrite {
                path: path.to_path_buf(),
                source: e,
            }
        })
    }

    fn list_dir(&self, path: &Path) -> Result<Vec<DirEntry>> {
        let read = match std::fs::read_dir(path) {
            Ok(read) => read,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => {
                return Err(SyncError::DirectoryRead {
                    path: path.to_path_buf(),
                    source: e,
                });
            }
        };

        let mut entries = Vec::new();
        for entry in read {
            let entry = entry.map_err(|e| SyncError::DirectoryRead {
                path: path.to_path_buf(),
                source: e,
            })?;
            let is_dir = entry.file_type().map(|t| t.is_dir()).unwrap_or(false);
            entries.push(DirEntry {
                name: entry.file_name().to_string_lossy().to_string(),
                is_dir,
            });
        }
        entries.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(entries)
    }

    fn exists(&self, path: &Path) -> bool {
        path.exists()
    }

    fn is_dir(&self, path: &Path) -> bool {
        path.is_dir()
    }

    fn modified(&self, path: &Path) -> Option<DateTime<Utc>> {
        std::fs::metadata(path)
            .and_then(|m| m.modified())
            .ok()
            .map(DateTime::<Utc>::from)
    }

    fn create_dir_all(&self, path: &Path) -> Result<()> {
        std::fs::create_dir_all(path).map_err(|e| SyncError::DirectoryCreate {
            path: path.to_path_buf(),
            source: e,
        })
    }

    fn copy_file(&self, from: &Path, to: &Path) -> Result<()> {
        if let Some(parent) = to.parent() {
            self.create_dir_all(parent)?;
        }
        std::fs::copy(from, to)
            .map(|_| ())
            .map_err(|e| SyncError::Copy {
                from: from.to_path_buf(),
                to: to.to_path_buf(),
                source: e,
            })
    }

    fn rename(&self, from: &Path, to: &Path) -> Result<()> {
        std::fs::rename(from, to).map_err(|e| SyncError::Rename {
            from: from.to_path_buf(),
            to: to.to_path_buf(),
            source: e,
        })
    }

    fn remove_file(&self, path: &Path) -> Result<()> {
        std::fs::remove_file(path).map_err(|e| SyncError::Remove {
            path: path.to_path_buf(),
            source: e,
        })
    }

    fn remove_dir_all(&self, path: &Path) -> Result<()> {
        std::fs::remove_dir_all(path).map_err(|e| SyncError::Remove {
            path: path.to_path_buf(),
            source: e,
        })
    }

    fn list_files_recursive(&self, root: &Path) -> Result<Vec<PathBuf>> {
        if !root.is_dir() {
            return Ok(Vec::new());
        }
        let mut files = Vec::new();
        for entry in WalkDir::new(root).follow_links(false) {
            let entry = entry.map_err(|e| SyncError::DirectoryRead {
                path: root.to_path_buf(),
                source: e.into(),
            })?;
            if !entry.file_type().is_file() {
                continue;
            }
            if let Ok(rel) = entry.path().strip_prefix(root) {
                files.push(rel.to_path_buf());
            }
        }
        files.sort();
        Ok(files)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_read_missing_is_none() {
        let temp = TempDir::new().expect("temp dir");
        let store = LocalFileStore::new();
        assert_eq!(store.read_text(&temp.path().join("nope.md")).unwrap(), None);
    }

    #[test]
    fn test_atomic_write_creates_parents_and_leaves_no_temp() {
        let temp = TempDir::new().expect("temp dir");
        let store = LocalFileStore::new();
        let target = temp.path().join("a/b/spec.md");

        store.write_text_atomic(&target, "first").unwrap();
        store.write_text_atomic(&target, "second").unwrap();

        assert_eq!(store.read_text(&target).unwrap().as_deref(), Some("second"));
        let names: Vec<String> = store
            .list_dir(&temp.path().join("a/b"))
            .unwrap()
            .into_iter()
            .map(|e| e.name)
            .collect();
        assert_eq!(names, vec!["spec.md".to_string()]);
    }

    #[test]
    fn test_list_files_recursive_relative_and_sorted() {
        let temp = TempDir::new().expect("temp dir");
        let store = LocalFileStore::new();
        store
            .write_text_atomic(&temp.path().join("z.md"), "z")
            .unwrap();
        store
            .write_text_atomic(&temp.path().join("reports/a.md"), "a")
            .unwrap();

        let files = store.list_files_recursive(temp.path()).unwrap();
        assert_eq!(
            files,
            vec![PathBuf::from("reports/a.md"), PathBuf::from("z.md")]
        );
    }

    #[test]
    fn test_list_missing_dir_is_empty() {
        let temp = TempDir::new().expect("temp dir");
        let store = LocalFileStore::new();
        assert!(store.list_dir(&temp.path().join("absent")).unwrap().is_empty());
        assert!(
            store
                .list_files_recursive(&temp.path().join("absent"))
                .unwrap()
                .is_empty()
        );
    }
}
