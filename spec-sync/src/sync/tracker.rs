//! One-way mirror of user stories into an external issue tracker.
//!
//! The tracker is a projection like living docs: issue bodies are rebuilt
//! from the increment each pass, and tracker-side edits never flow back.

use crate::error::Result;
use crate::metadata::ExternalIssueRef;
use crate::parser::{SpecDocument, TasksDocument, UserStory};

/// Tracker integration seam. Implementations must be idempotent per title:
/// calling twice for the same story updates the same issue.
pub trait TrackerClient: Send + Sync {
    fn create_or_update_issue(
        &self,
        title: &str,
        body: &str,
        labels: &[String],
    ) -> Result<ExternalIssueRef>;
}

fn issue_title(increment_id: &str, story: &UserStory) -> String {
    format!("[{increment_id}] {}: {}", story.canonical_id(), story.title)
}

fn issue_body(story: &UserStory, tasks: &TasksDocument) -> String {
    let mut body = String::from("## Acceptance Criteria\n\n");
    for ac in &story.acceptance_criteria {
        let mark = if ac.completed { "x" } else { " " };
        body.push_str(&format!("- [{mark}] {}: {}\n", ac.id, ac.description));
    }

    let related: Vec<_> = tasks
        .tasks
        .iter()
        .filter(|t| {
            t.satisfies_acs
                .iter()
                .any(|id| story.acceptance_criteria.iter().any(|ac| &ac.id == id))
        })
        .collect();
    if !related.is_empty() {
        body.push_str("\n## Tasks\n\n");
        for task in related {
            let mark = if task.completed { "x" } else { " " };
            body.push_str(&format!("- [{mark}] {}: {}\n", task.id, task.title));
        }
    }
    body
}

/// Push every story to `tracker`. Returns the issue references keyed by
/// story id plus one warning per story the tracker rejected.
pub fn mirror_stories(
    tracker: &dyn TrackerClient,
    spec: &SpecDocument,
    tasks: &TasksDocument,
    increment_id: &str,
    labels: &[String],
) -> (Vec<(String, ExternalIssueRef)>, Vec<String>) {
    let mut issues = Vec::new();
    let mut warnings = Vec::new();

    for story in &spec.user_stories {
        let story_id = story.canonical_id();
        match tracker.create_or_update_issue(
            &issue_title(increment_id, story),
            &issue_body(story, tasks),
            labels,
        ) {
            Ok(issue) => {
                tracing::debug!(story = %story_id, issue = %issue.id, "Story mirrored to tracker");
                issues.push((story_id, issue));
            }
            Err(e) => {
                tracing::warn!(story = %story_id, error = %e, "Tracker mirror failed");
                warnings.push(format!("{story_id}: tracker mirror failed: {e}"));
            }
        }
    }
    (issues, warnings)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SyncError;
    use crate::parser::{parse_spec, parse_tasks};
    use pretty_assertions::assert_eq;
    use std::sync::Mutex;

    #[derive(Default)]
    struct FakeTracker {
        calls: Mutex<Vec<(String, String, Vec<String>)>>,
        reject: Option<&'static str>,
    }

    impl TrackerClient for FakeTracker {
        fn create_or_update_issue(
            &self,
            title: &str,
            body: &str,
            labels: &[String],
        ) -> Result<ExternalIssueRef> {
            if self.reject.is_some_and(|needle| title.contains(needle)) {
                return Err(SyncError::Tracker("rate limited".to_string()));
            }
            let mut calls = self.calls.lock().unwrap();
            calls.push((title.to_string(), body.to_string(), labels.to_vec()));
            let n = calls.len();
            Ok(ExternalIssueRef {
                id: n.to_string(),
                url: format!("https://tracker.example/{n}"),
            })
        }
    }

    const SPEC: &str = "\
### US-001: Log in
- [x] **AC-US1-01**: works
### US-002: Log out
- [ ] **AC-US2-01**: works
";

    #[test]
    fn test_mirror_builds_issue_per_story() {
        let tracker = FakeTracker::default();
        let spec = parse_spec(SPEC);
        let tasks = parse_tasks("### T-001: Form\n**AC**: AC-US1-01\n**Status**: [x] completed\n");
        let labels = vec!["spec-sync".to_string()];

        let (issues, warnings) = mirror_stories(&tracker, &spec, &tasks, "0001-auth", &labels);
        assert!(warnings.is_empty());
        let ids: Vec<&str> = issues.iter().map(|(story, _)| story.as_str()).collect();
        assert_eq!(ids, vec!["US-001", "US-002"]);

        let calls = tracker.calls.lock().unwrap();
        assert_eq!(calls[0].0, "[0001-auth] US-001: Log in");
        assert_eq!(
            calls[0].1,
            "## Acceptance Criteria\n\n- [x] AC-US1-01: works\n\n## Tasks\n\n- [x] T-001: Form\n"
        );
        assert_eq!(calls[1].1, "## Acceptance Criteria\n\n- [ ] AC-US2-01: works\n");
        assert_eq!(calls[1].2, labels);
    }

    #[test]
    fn test_tracker_failure_becomes_warning() {
        let tracker = FakeTracker {
            reject: Some("US-002"),
            ..FakeTracker::default()
        };
        let spec = parse_spec(SPEC);
        let (issues, warnings) = mirror_stories(&tracker, &spec, &parse_tasks(""), "0001-auth", &[]);
        assert_eq!(issues.len(), 1);
        assert_eq!(
            warnings,
            vec!["US-002: tracker mirror failed: Tracker request failed: rate limited"]
        );
    }
}
