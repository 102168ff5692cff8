//! Bounded sync audit trail in `metadata.json`.

use std::path::Path;

use super::SyncResult;
use crate::clock::Clock;
use crate::error::{ErrorCategory, Result};
use crate::metadata::{AuditRecord, ExternalIssueRef, IncrementMetadata};
use crate::store::FileStore;

/// Record the pass in `<dir>/metadata.json`: newest record first, at most
/// `limit` kept, `lastActivity` bumped, tracker references stored under
/// `externalIssues`. Failures are logged and swallowed; the pass that
/// produced `result` has already succeeded.
pub fn append_audit_record(
    store: &dyn FileStore,
    clock: &dyn Clock,
    dir: &Path,
    result: &SyncResult,
    issues: &[(String, ExternalIssueRef)],
    limit: usize,
) {
    if let Err(e) = write_record(store, clock, dir, result, issues, limit) {
        tracing::warn!(
            category = ErrorCategory::AuditLog.as_str(),
            increment = %result.increment_id,
            error = %e,
            "Failed to append sync audit record"
        );
    }
}

fn write_record(
    store: &dyn FileStore,
    clock: &dyn Clock,
    dir: &Path,
    result: &SyncResult,
    issues: &[(String, ExternalIssueRef)],
    limit: usize,
) -> Result<()> {
    let mut metadata = IncrementMetadata::load(store, dir)?.unwrap_or_else(|| IncrementMetadata {
        id: Some(result.increment_id.clone()),
        ..IncrementMetadata::default()
    });

    for (story, issue) in issues {
        metadata.external_issues.insert(story.clone(), issue.clone());
    }

    let now = clock.now();
    if result.is_noteworthy() {
        metadata.push_audit(
            AuditRecord {
                timestamp: now,
                updated: result.updated.clone(),
                conflicts: result.conflicts.clone(),
                warnings: result.warnings.clone(),
                changes_count: result.changes.len(),
            },
            limit,
        );
    }
    metadata.last_activity = Some(now.to_rfc3339());
    metadata.save(store, dir)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::METADATA_FILE;
    use crate::clock::MockClock;
    use crate::store::MemoryFileStore;
    use pretty_assertions::assert_eq;
    use serde_json::Value;

    fn result_with_update(n: usize) -> SyncResult {
        SyncResult {
            increment_id: "0001-auth".to_string(),
            updated: vec![format!("AC-US1-{n:02}")],
            changes: vec![format!("AC-US1-{n:02}: [ ] → [x] (1/1 tasks complete)")],
            ..SyncResult::default()
        }
    }

    #[test]
    fn test_records_are_bounded_and_newest_first() {
        let store = MemoryFileStore::new();
        let mut clock = MockClock::fixed();
        let dir = Path::new("/p/increments/0001-auth");
        store.insert_file(
            dir.join(METADATA_FILE),
            "{\"id\": \"0001-auth\", \"status\": \"active\", \"owner\": \"team-a\"}\n",
            None,
        );

        for n in 1..=4 {
            append_audit_record(&store, &clock, dir, &result_with_update(n), &[], 3);
            clock.advance(chrono::Duration::minutes(1));
        }

        let metadata = IncrementMetadata::load(&store, dir).unwrap().unwrap();
        let updated: Vec<&str> = metadata
            .ac_sync_events
            .iter()
            .map(|r| r.updated[0].as_str())
            .collect();
        assert_eq!(updated, vec!["AC-US1-04", "AC-US1-03", "AC-US1-02"]);
        assert_eq!(metadata.ac_sync_events[0].changes_count, 1);
        assert_eq!(metadata.extra.get("owner"), Some(&Value::from("team-a")));
        assert_eq!(metadata.last_activity.as_deref(), Some("2026-01-15T12:03:00+00:00"));
    }

    #[test]
    fn test_write_failure_is_swallowed() {
        let store = MemoryFileStore::new();
        let clock = MockClock::fixed();
        let dir = Path::new("/p/increments/0001-auth");
        store.fail_writes_under(dir);

        append_audit_record(&store, &clock, dir, &result_with_update(1), &[], 20);
        assert!(!store.exists(&dir.join(METADATA_FILE)));
    }

    #[test]
    fn test_issue_references_persisted() {
        let store = MemoryFileStore::new();
        let clock = MockClock::fixed();
        let dir = Path::new("/p/increments/0001-auth");
        let issue = ExternalIssueRef {
            id: "42".to_string(),
            url: "https://tracker.example/42".to_string(),
        };
        let result = SyncResult {
            increment_id: "0001-auth".to_string(),
            ..SyncResult::default()
        };

        append_audit_record(&store, &clock, dir, &result, &[("US-001".to_string(), issue.clone())], 20);

        let metadata = IncrementMetadata::load(&store, dir).unwrap().unwrap();
        assert_eq!(metadata.external_issues.get("US-001"), Some(&issue));
        assert!(metadata.ac_sync_events.is_empty());
        assert_eq!(metadata.id.as_deref(), Some("0001-auth"));
    }
}
