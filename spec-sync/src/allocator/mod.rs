//! Chronological feature identifier allocation
//!
//! Externally sourced work items get an `FS-<n>E` identifier that is unique
//! across the active and archived feature trees. When the item predates
//! existing features and the numbering leaves room, it is slotted into the
//! gap so that numbers keep following creation order; otherwise it is
//! appended after the highest number. Numbers are never reused, including
//! those of archived features.

mod snapshot;

pub use snapshot::{FEATURE_FILES, FeatureRecord, FeatureSnapshot, FeatureStats};

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use crate::clock::Clock;
use crate::config::ProjectPaths;
use crate::error::{Result, SyncError};
use crate::store::FileStore;
use crate::types::Origin;

/// `FS-<n>` or `FS-<n>E`. Displayed zero-padded to three digits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FeatureId {
    pub number: u32,
    pub external: bool,
}

impl FeatureId {
    pub fn external(number: u32) -> Self {
        Self {
            number,
            external: true,
        }
    }

    pub fn origin(self) -> Origin {
        if self.external {
            Origin::External
        } else {
            Origin::Internal
        }
    }

    /// Parse a feature folder name: the identifier, optionally followed by
    /// `-slug`.
    pub fn from_folder_name(name: &str) -> Option<Self> {
        let rest = name.strip_prefix("FS-")?;
        let head = rest.split('-').next().unwrap_or_default();
        format!("FS-{head}").parse().ok()
    }
}

impl FromStr for FeatureId {
    type Err = SyncError;

    fn from_str(s: &str) -> Result<Self> {
        let invalid = || SyncError::InvalidFeatureId(s.to_string());
        let rest = s.strip_prefix("FS-").ok_or_else(invalid)?;
        let (digits, external) = match rest.strip_suffix('E') {
            Some(digits) => (digits, true),
            None => (rest, false),
        };
        if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
            return Err(invalid());
        }
        let number = digits.parse().map_err(|_| invalid())?;
        Ok(Self { number, external })
    }
}

impl fmt::Display for FeatureId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "FS-{:03}", self.number)?;
        if self.external {
            f.write_str("E")?;
        }
        Ok(())
    }
}

/// An external work item awaiting an identifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExternalWorkItem {
    /// Tracker-side key, e.g. `GH-#638`
    pub external_id: String,
    pub title: String,
    pub created_at: DateTime<Utc>,
    pub external_url: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AllocationStrategy {
    First,
    ChronologicalInsert,
    Append,
    /// The external id already has a feature
    Existing,
}

impl AllocationStrategy {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::First => "first",
            Self::ChronologicalInsert => "chronological-insert",
            Self::Append => "append",
            Self::Existing => "existing",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AllocationResult {
    pub id: FeatureId,
    pub strategy: AllocationStrategy,
    pub reason: String,
}

impl FeatureSnapshot {
    /// Pick the identifier for `item` against this snapshot.
    pub fn allocate(&self, item: &ExternalWorkItem) -> Result<AllocationResult> {
        if !item.external_id.is_empty()
            && let Some(existing) = self.find_external(&item.external_id)
        {
            return Ok(AllocationResult {
                id: existing.id,
                strategy: AllocationStrategy::Existing,
                reason: format!("{} already imported as {}", item.external_id, existing.id),
            });
        }

        if self.is_empty() {
            return Ok(AllocationResult {
                id: FeatureId::external(1),
                strategy: AllocationStrategy::First,
                reason: "First external feature in project".to_string(),
            });
        }

        let at = item.created_at;
        for pair in self.features().windows(2) {
            let (before, after) = (&pair[0], &pair[1]);
            if !(before.created_at < at && at < after.created_at) {
                continue;
            }
            if after.id.number <= before.id.number.saturating_add(1) {
                continue;
            }
            let free = (before.id.number + 1..after.id.number).find(|n| !self.is_number_taken(*n));
            if let Some(number) = free {
                return Ok(AllocationResult {
                    id: FeatureId::external(number),
                    strategy: AllocationStrategy::ChronologicalInsert,
                    reason: format!(
                        "Inserted chronologically between {} ({}) and {} ({})",
                        before.id,
                        before.created_at.to_rfc3339(),
                        after.id,
                        after.created_at.to_rfc3339()
                    ),
                });
            }
        }

        let newest = self.features().last().map(|f| f.created_at);
        let number = self.max_number() + 1;
        if let Some(holder) = self.holder_of(number) {
            return Err(SyncError::FeatureIdCollision {
                number,
                existing: holder.id.to_string(),
            });
        }
        let reason = if newest.is_some_and(|newest| at > newest) {
            format!(
                "Work item created after all existing features ({})",
                at.to_rfc3339()
            )
        } else {
            "Gap insertion not possible, appended to end".to_string()
        };
        Ok(AllocationResult {
            id: FeatureId::external(number),
            strategy: AllocationStrategy::Append,
            reason,
        })
    }
}

/// Scan both feature trees and allocate an identifier for `item`.
pub fn allocate(
    store: &dyn FileStore,
    paths: &ProjectPaths,
    item: &ExternalWorkItem,
) -> Result<AllocationResult> {
    crate::measure_time!("allocate_feature_id", {
        let snapshot = FeatureSnapshot::scan(store, paths)?;
        let result = snapshot.allocate(item)?;
        tracing::info!(
            external_id = %item.external_id,
            id = %result.id,
            strategy = result.strategy.as_str(),
            "Feature id allocated"
        );
        Ok(result)
    })
}

#[derive(Serialize)]
struct FeatureFrontmatter<'a> {
    id: String,
    title: &'a str,
    created: String,
    origin: Origin,
    external_id: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    external_url: Option<&'a str>,
    imported_at: String,
}

/// Create `<features>/<id>/FEATURE.md` for an imported item and return the
/// folder.
pub fn create_feature_folder(
    store: &dyn FileStore,
    paths: &ProjectPaths,
    id: FeatureId,
    item: &ExternalWorkItem,
    clock: &dyn Clock,
) -> Result<PathBuf> {
    let dir = paths.features.join(id.to_string());
    let created = item.created_at.to_rfc3339();
    let imported = clock.now().to_rfc3339();
    let frontmatter = serde_yaml::to_string(&FeatureFrontmatter {
        id: id.to_string(),
        title: &item.title,
        created: created.clone(),
        origin: Origin::External,
        external_id: &item.external_id,
        external_url: item.external_url.as_deref(),
        imported_at: imported.clone(),
    })?;

    let content = format!(
        "---\n{frontmatter}---\n\n# {title}\n\n**Origin**: external ({external_id})\n\n## Description\n\nImported from external work item.\n\n## User Stories\n\n_User stories are added when the increment is planned._\n\n## Status\n\n- **Created**: {created}\n- **Imported**: {imported}\n",
        title = item.title,
        external_id = item.external_id,
    );
    store.write_text_atomic(&dir.join(FEATURE_FILES[0]), &content)?;
    tracing::info!(id = %id, path = %dir.display(), "Feature folder created");
    Ok(dir)
}
