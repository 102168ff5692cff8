//! Increment `metadata.json`
//!
//! Only the fields the engine reads or writes are typed; everything else is
//! carried through `extra` so a rewrite never drops keys owned by other tools.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::path::Path;

use crate::METADATA_FILE;
use crate::clock::parse_timestamp;
use crate::error::{Result, SyncError};
use crate::store::FileStore;
use crate::types::IncrementStatus;

/// Top-level keys holding external tracker links.
pub const EXTERNAL_LINK_KEYS: [&str; 3] = ["github", "jira", "ado"];

/// One entry of the bounded sync audit trail.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditRecord {
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub updated: Vec<String>,
    #[serde(default)]
    pub conflicts: Vec<String>,
    #[serde(default)]
    pub warnings: Vec<String>,
    #[serde(default)]
    pub changes_count: usize,
}

/// Opaque reference returned by an external tracker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExternalIssueRef {
    pub id: String,
    pub url: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IncrementMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_activity: Option<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub ac_sync_events: Vec<AuditRecord>,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub external_issues: BTreeMap<String, ExternalIssueRef>,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl IncrementMetadata {
    /// Load `<dir>/metadata.json`. `Ok(None)` when absent.
    pub fn load(store: &dyn FileStore, dir: &Path) -> Result<Option<Self>> {
        let path = dir.join(METADATA_FILE);
        let Some(text) = store.read_text(&path)? else {
            return Ok(None);
        };
        serde_json::from_str(&text)
            .map(Some)
            .map_err(|e| SyncError::Json { path, source: e })
    }

    /// Write `<dir>/metadata.json` atomically.
    pub fn save(&self, store: &dyn FileStore, dir: &Path) -> Result<()> {
        let mut json = serde_json::to_string_pretty(self).map_err(SyncError::JsonSerialize)?;
        json.push('\n');
        store.write_text_atomic(&dir.join(METADATA_FILE), &json)
    }

    pub fn increment_status(&self) -> IncrementStatus {
        self.status
            .as_deref()
            .map_or(IncrementStatus::Unknown, IncrementStatus::parse)
    }

    pub fn last_activity_at(&self) -> Option<DateTime<Utc>> {
        self.last_activity.as_deref().and_then(parse_timestamp)
    }

    /// Prepend `record` and keep at most `limit` records, newest first.
    pub fn push_audit(&mut self, record: AuditRecord, limit: usize) {
        self.ac_sync_events.insert(0, record);
        self.ac_sync_events.truncate(limit.max(1));
    }

    /// Copy external links the winner lacks from `other`. Returns the keys
    /// that were added.
    pub fn merge_external_links(&mut self, other: &IncrementMetadata) -> Vec<String> {
        let mut added = Vec::new();
        for key in EXTERNAL_LINK_KEYS {
            let Some(value) = other.extra.get(key) else {
                continue;
            };
            if value.is_null() || self.extra.get(key).is_some_and(|v| !v.is_null()) {
                continue;
            }
            self.extra.insert(key.to_string(), value.clone());
            added.push(key.to_string());
        }
        for (story, issue) in &other.external_issues {
            if !self.external_issues.contains_key(story) {
                self.external_issues.insert(story.clone(), issue.clone());
                added.push(format!("externalIssues.{story}"));
            }
        }
        added
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::{Clock, MockClock};
    use crate::store::MemoryFileStore;
    use serde_json::json;

    fn record(clock: &dyn Clock, n: usize) -> AuditRecord {
        AuditRecord {
            timestamp: clock.now(),
            updated: vec![format!("AC-US1-{n:02}")],
            conflicts: Vec::new(),
            warnings: Vec::new(),
            changes_count: 1,
        }
    }

    #[test]
    fn test_unknown_keys_survive_round_trip() {
        let store = MemoryFileStore::new();
        let dir = Path::new("increments/0001-auth");
        store.insert_file(
            dir.join(METADATA_FILE),
            r#"{"id":"0001-auth","status":"active","owner":"team-a","github":{"issue":12}}"#,
            None,
        );

        let mut meta = IncrementMetadata::load(&store, dir).unwrap().unwrap();
        assert_eq!(meta.increment_status(), IncrementStatus::Active);
        meta.push_audit(record(&MockClock::fixed(), 1), 20);
        meta.save(&store, dir).unwrap();

        let raw: Value =
            serde_json::from_str(&store.read_text(&dir.join(METADATA_FILE)).unwrap().unwrap())
                .unwrap();
        assert_eq!(raw["owner"], json!("team-a"));
        assert_eq!(raw["github"]["issue"], json!(12));
        assert_eq!(raw["acSyncEvents"][0]["changesCount"], json!(1));
    }

    #[test]
    fn test_audit_trail_is_bounded_newest_first() {
        let mut clock = MockClock::fixed();
        let mut meta = IncrementMetadata::default();
        for n in 0..25 {
            meta.push_audit(record(&clock, n), 20);
            clock.advance(chrono::Duration::minutes(1));
        }
        assert_eq!(meta.ac_sync_events.len(), 20);
        assert_eq!(meta.ac_sync_events[0].updated, vec!["AC-US1-24"]);
        assert_eq!(meta.ac_sync_events[19].updated, vec!["AC-US1-05"]);
    }

    #[test]
    fn test_missing_and_invalid_metadata() {
        let store = MemoryFileStore::new();
        let dir = Path::new("inc/0002-x");
        assert!(IncrementMetadata::load(&store, dir).unwrap().is_none());
        store.insert_file(dir.join(METADATA_FILE), "{not json", None);
        assert!(matches!(
            IncrementMetadata::load(&store, dir),
            Err(SyncError::Json { .. })
        ));
    }

    #[test]
    fn test_merge_external_links_keeps_winner_values() {
        let mut winner: IncrementMetadata =
            serde_json::from_value(json!({"github": {"issue": 1}})).unwrap();
        let loser: IncrementMetadata = serde_json::from_value(json!({
            "github": {"issue": 2},
            "jira": {"key": "PROJ-7"},
            "externalIssues": {"US-001": {"id": "9", "url": "https://example.test/9"}}
        }))
        .unwrap();

        let added = winner.merge_external_links(&loser);
        assert_eq!(added, vec!["jira", "externalIssues.US-001"]);
        assert_eq!(winner.extra["github"], json!({"issue": 1}));
        assert_eq!(winner.extra["jira"], json!({"key": "PROJ-7"}));
    }
}
