use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::config::ProjectPaths;
use crate::error::Result;
use crate::metadata::IncrementMetadata;
use crate::store::FileStore;
use crate::types::{IncrementStatus, StorageLocation};

/// One stored copy of an increment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IncrementCopy {
    /// Folder name, e.g. `0007-search`
    pub name: String,
    pub number: u32,
    pub path: PathBuf,
    pub location: StorageLocation,
    pub status: IncrementStatus,
    /// `lastActivity` from metadata, else the newest file modification
    pub last_activity: Option<DateTime<Utc>>,
    /// Files below the folder, recursively
    pub file_count: usize,
}

/// Two or more copies claiming the same increment number.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DuplicateGroup {
    pub number: u32,
    pub copies: Vec<IncrementCopy>,
}

impl DuplicateGroup {
    /// Zero-padded increment number, e.g. `0007`.
    pub fn key(&self) -> String {
        format!("{:04}", self.number)
    }
}

/// Leading number of an `NNNN-slug` folder name.
pub fn increment_number(name: &str) -> Option<u32> {
    let (digits, rest) = name.split_at_checked(4)?;
    if !digits.bytes().all(|b| b.is_ascii_digit()) || !rest.starts_with('-') {
        return None;
    }
    digits.parse().ok()
}

/// Scan the primary, archive and abandoned roots and return every number
/// held by more than one folder, in number order.
pub fn detect_duplicates(store: &dyn FileStore, paths: &ProjectPaths) -> Result<Vec<DuplicateGroup>> {
    let mut by_number: BTreeMap<u32, Vec<IncrementCopy>> = BTreeMap::new();
    for location in StorageLocation::all() {
        let root = paths.location_root(location);
        for entry in store.list_dir(root)? {
            if !entry.is_dir {
                continue;
            }
            let Some(number) = increment_number(&entry.name) else {
                continue;
            };
            let copy = inspect_copy(store, root.join(&entry.name), entry.name, number, location)?;
            by_number.entry(number).or_default().push(copy);
        }
    }

    let groups: Vec<DuplicateGroup> = by_number
        .into_iter()
        .filter(|(_, copies)| copies.len() > 1)
        .map(|(number, copies)| DuplicateGroup { number, copies })
        .collect();
    tracing::debug!(groups = groups.len(), "Duplicate scan finished");
    Ok(groups)
}

fn inspect_copy(
    store: &dyn FileStore,
    path: PathBuf,
    name: String,
    number: u32,
    location: StorageLocation,
) -> Result<IncrementCopy> {
    let metadata = match IncrementMetadata::load(store, &path) {
        Ok(metadata) => metadata,
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "Unreadable increment metadata");
            None
        }
    };
    let files = store.list_files_recursive(&path)?;
    let last_activity = metadata
        .as_ref()
        .and_then(IncrementMetadata::last_activity_at)
        .or_else(|| newest_modification(store, &path, &files));

    Ok(IncrementCopy {
        name,
        number,
        status: metadata
            .as_ref()
            .map_or(IncrementStatus::Unknown, IncrementMetadata::increment_status),
        last_activity,
        file_count: files.len(),
        path,
        location,
    })
}

fn newest_modification(store: &dyn FileStore, dir: &Path, files: &[PathBuf]) -> Option<DateTime<Utc>> {
    files.iter().filter_map(|rel| store.modified(&dir.join(rel))).max()
}
