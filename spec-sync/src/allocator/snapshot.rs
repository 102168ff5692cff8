//! Short-lived scan of the feature trees.
//!
//! A snapshot is built at the start of each allocation and dropped after it;
//! nothing is cached across calls.

use chrono::{DateTime, Utc};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use super::FeatureId;
use crate::clock::parse_timestamp;
use crate::config::ProjectPaths;
use crate::error::Result;
use crate::parser::parse_frontmatter;
use crate::store::FileStore;
use crate::types::Origin;

/// Files whose front-matter describes a feature, in lookup order.
pub const FEATURE_FILES: [&str; 4] = ["FEATURE.md", "README.md", "feature.md", "readme.md"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeatureRecord {
    pub id: FeatureId,
    /// Declared creation time, or the Unix epoch when undeclared
    pub created_at: DateTime<Utc>,
    pub origin: Origin,
    pub external_id: Option<String>,
    pub path: PathBuf,
    pub archived: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FeatureStats {
    pub total: usize,
    pub active: usize,
    pub archived: usize,
    pub internal: usize,
    pub external: usize,
    pub max_number: u32,
}

/// Every feature in the active and archive trees.
#[derive(Debug, Clone, Default)]
pub struct FeatureSnapshot {
    features: Vec<FeatureRecord>,
    numbers: BTreeSet<u32>,
}

impl FeatureSnapshot {
    pub fn scan(store: &dyn FileStore, paths: &ProjectPaths) -> Result<Self> {
        let mut features = Vec::new();
        scan_root(store, &paths.features, false, &mut features)?;
        scan_root(store, &paths.features_archive, true, &mut features)?;
        tracing::debug!(features = features.len(), "Feature trees scanned");
        Ok(Self::from_records(features))
    }

    pub fn from_records(mut features: Vec<FeatureRecord>) -> Self {
        // Creation order; number breaks ties so the order is total.
        features.sort_by(|a, b| {
            a.created_at
                .cmp(&b.created_at)
                .then(a.id.number.cmp(&b.id.number))
                .then(a.path.cmp(&b.path))
        });
        let numbers = features.iter().map(|f| f.id.number).collect();
        Self { features, numbers }
    }

    /// Features sorted by creation time, oldest first.
    pub fn features(&self) -> &[FeatureRecord] {
        &self.features
    }

    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }

    /// Whether no feature, active or archived, holds `id`'s number.
    /// `FS-011` and `FS-011E` share a number.
    pub fn is_available(&self, id: FeatureId) -> bool {
        !self.numbers.contains(&id.number)
    }

    pub(crate) fn holder_of(&self, number: u32) -> Option<&FeatureRecord> {
        self.features.iter().find(|f| f.id.number == number)
    }

    pub(crate) fn is_number_taken(&self, number: u32) -> bool {
        self.numbers.contains(&number)
    }

    pub fn max_number(&self) -> u32 {
        self.numbers.last().copied().unwrap_or(0)
    }

    pub fn find_external(&self, external_id: &str) -> Option<&FeatureRecord> {
        self.features
            .iter()
            .find(|f| f.external_id.as_deref() == Some(external_id))
    }

    pub fn stats(&self) -> FeatureStats {
        let archived = self.features.iter().filter(|f| f.archived).count();
        let external = self
            .features
            .iter()
            .filter(|f| f.origin == Origin::External)
            .count();
        FeatureStats {
            total: self.features.len(),
            active: self.features.len() - archived,
            archived,
            internal: self.features.len() - external,
            external,
            max_number: self.max_number(),
        }
    }
}

fn scan_root(
    store: &dyn FileStore,
    root: &Path,
    archived: bool,
    out: &mut Vec<FeatureRecord>,
) -> Result<()> {
    for entry in store.list_dir(root)? {
        if !entry.is_dir {
            continue;
        }
        let Some(id) = FeatureId::from_folder_name(&entry.name) else {
            continue;
        };
        let path = root.join(&entry.name);
        let (created_at, external_id) = read_feature_file(store, &path);
        out.push(FeatureRecord {
            origin: id.origin(),
            id,
            created_at: created_at.unwrap_or(DateTime::<Utc>::UNIX_EPOCH),
            external_id,
            path,
            archived,
        });
    }
    Ok(())
}

fn read_feature_file(
    store: &dyn FileStore,
    dir: &Path,
) -> (Option<DateTime<Utc>>, Option<String>) {
    for name in FEATURE_FILES {
        let file = dir.join(name);
        let text = match store.read_text(&file) {
            Ok(Some(text)) => text,
            Ok(None) => continue,
            Err(e) => {
                tracing::warn!(path = %file.display(), error = %e, "Skipping unreadable feature file");
                continue;
            }
        };
        let frontmatter = parse_frontmatter(&text);
        return (
            frontmatter
                .get_any(&["created", "createdAt"])
                .and_then(parse_timestamp),
            frontmatter
                .get_any(&["external_id", "externalId"])
                .map(str::to_string),
        );
    }
    (None, None)
}
