//! Sync engine
//!
//! One pass re-derives the increment's state from its own `spec.md` and
//! `tasks.md`, then pushes it outward:
//!
//! 1. AC checkboxes in `spec.md` (increment → spec)
//! 2. Living-docs user story files (managed sections fully regenerated)
//! 3. `**User Story**:` reverse links in `tasks.md`
//! 4. Optional external tracker mirror
//! 5. Bounded audit record in `metadata.json`
//!
//! Projections never flow back: living-docs or tracker edits are overwritten
//! ("increment wins"). Missing inputs are warnings, not errors.

mod ac_status;
mod audit;
mod living_docs;
mod reverse_links;
mod tracker;

pub use ac_status::{AcStatusOutcome, propagate_ac_status};
pub use audit::append_audit_record;
pub use living_docs::{LivingDocUpdate, render_story_file, replace_section, story_file_path};
pub use reverse_links::{inject_reverse_links, primary_story};
pub use tracker::{TrackerClient, mirror_stories};

use std::path::{Path, PathBuf};

use crate::clock::Clock;
use crate::config::{ProjectPaths, SyncConfig};
use crate::coverage::{CoverageReport, build_report};
use crate::error::Result;
use crate::metadata::ExternalIssueRef;
use crate::parser::{Diagnostic, SpecDocument, TasksDocument, parse_spec, parse_tasks};
use crate::store::FileStore;
use crate::{SPEC_FILE, TASKS_FILE};

/// What caused a pass. Logged only: every trigger re-derives from the
/// increment's files, so a tracker webhook cannot push state inward.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncTrigger {
    TaskCompleted,
    ManualEdit,
    TrackerWebhook,
    PeriodicSweep,
}

impl SyncTrigger {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::TaskCompleted => "task_completed",
            Self::ManualEdit => "manual_edit",
            Self::TrackerWebhook => "tracker_webhook",
            Self::PeriodicSweep => "periodic_sweep",
        }
    }
}

/// Everything one pass did or noticed.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SyncResult {
    pub increment_id: String,
    /// AC ids whose spec checkbox was flipped to checked
    pub updated: Vec<String>,
    /// Human-readable change lines, one per updated AC
    pub changes: Vec<String>,
    pub conflicts: Vec<String>,
    pub warnings: Vec<String>,
    /// Living-docs edits that the increment overrode
    pub overridden: Vec<String>,
    pub living_docs: Vec<LivingDocUpdate>,
    /// Tasks that received a `**User Story**:` link
    pub reverse_links_added: Vec<String>,
    pub tracker_issues: Vec<(String, ExternalIssueRef)>,
    pub coverage: Option<CoverageReport>,
    pub diagnostics: Vec<Diagnostic>,
}

impl SyncResult {
    fn new(increment_id: &str) -> Self {
        Self {
            increment_id: increment_id.to_string(),
            ..Self::default()
        }
    }

    /// Whether the pass produced anything worth an audit record.
    pub fn is_noteworthy(&self) -> bool {
        !(self.updated.is_empty() && self.conflicts.is_empty() && self.warnings.is_empty())
    }
}

/// The increment's parsed source documents.
#[derive(Debug, Clone)]
pub struct IncrementDocs {
    pub dir: PathBuf,
    pub spec_text: String,
    pub tasks_text: String,
    pub spec: SpecDocument,
    pub tasks: TasksDocument,
}

/// Runs sync passes for increments under one project root.
pub struct SyncEngine<'a> {
    store: &'a dyn FileStore,
    clock: &'a dyn Clock,
    config: &'a SyncConfig,
    paths: ProjectPaths,
    tracker: Option<&'a dyn TrackerClient>,
}

impl<'a> SyncEngine<'a> {
    pub fn new(
        store: &'a dyn FileStore,
        clock: &'a dyn Clock,
        config: &'a SyncConfig,
        root: &Path,
    ) -> Self {
        Self {
            store,
            clock,
            config,
            paths: config.layout.resolve(root),
            tracker: None,
        }
    }

    /// Mirror user stories to an external tracker on every pass.
    pub fn with_tracker(mut self, tracker: &'a dyn TrackerClient) -> Self {
        self.tracker = Some(tracker);
        self
    }

    pub fn paths(&self) -> &ProjectPaths {
        &self.paths
    }

    /// Read and parse both source documents. Missing files become warnings
    /// in `result` and yield `None`.
    pub fn load_increment(
        &self,
        increment_id: &str,
        result: &mut SyncResult,
    ) -> Result<Option<IncrementDocs>> {
        let dir = self.paths.increment_dir(increment_id);
        let spec_text = self.store.read_text(&dir.join(SPEC_FILE))?;
        let tasks_text = self.store.read_text(&dir.join(TASKS_FILE))?;

        if spec_text.is_none() {
            result.warnings.push(format!("{SPEC_FILE} does not exist"));
        }
        if tasks_text.is_none() {
            result.warnings.push(format!("{TASKS_FILE} does not exist"));
        }
        let (Some(spec_text), Some(tasks_text)) = (spec_text, tasks_text) else {
            return Ok(None);
        };

        let spec = parse_spec(&spec_text);
        let tasks = parse_tasks(&tasks_text);
        result.diagnostics.extend(spec.diagnostics.iter().cloned());
        result.diagnostics.extend(tasks.diagnostics.iter().cloned());
        Ok(Some(IncrementDocs {
            dir,
            spec_text,
            tasks_text,
            spec,
            tasks,
        }))
    }

    /// Fresh coverage report, or `None` when either source file is missing.
    pub fn coverage(&self, increment_id: &str) -> Result<Option<CoverageReport>> {
        let mut scratch = SyncResult::new(increment_id);
        Ok(self.load_increment(increment_id, &mut scratch)?.map(|docs| {
            build_report(&docs.spec, &docs.tasks, self.config.coverage.mode, self.clock)
        }))
    }

    /// Run one full synchronization pass for `increment_id`.
    pub fn run_pass(&self, increment_id: &str, trigger: SyncTrigger) -> Result<SyncResult> {
        crate::measure_time!("sync_pass", {
            tracing::info!(increment = increment_id, trigger = trigger.as_str(), "Sync pass started");
            let mut result = SyncResult::new(increment_id);
            let dir = self.paths.increment_dir(increment_id);

            let Some(mut docs) = self.load_increment(increment_id, &mut result)? else {
                tracing::warn!(increment = increment_id, warnings = ?result.warnings, "Sync pass skipped");
                self.record_audit(&dir, &result, &[]);
                return Ok(result);
            };

            let outcome = propagate_ac_status(
                self.store,
                &docs.dir,
                &docs.spec_text,
                &docs.spec,
                &docs.tasks,
                self.config.coverage.mode,
            )?;
            result.updated = outcome.updated;
            result.changes = outcome.changes;
            result.conflicts = outcome.conflicts;
            result.warnings.extend(outcome.warnings);
            if let Some(new_text) = outcome.new_spec_text {
                docs.spec = parse_spec(&new_text);
                docs.spec_text = new_text;
            }

            let feature = feature_folder(&docs.spec, increment_id);
            if self.config.sync.living_docs {
                for story in &docs.spec.user_stories {
                    let update = living_docs::sync_story(
                        self.store,
                        self.clock,
                        &self.paths,
                        &feature,
                        increment_id,
                        story,
                        &docs.tasks,
                    )?;
                    result.overridden.extend(update.overridden.iter().cloned());
                    result.living_docs.push(update);
                }
            }

            if self.config.sync.reverse_links {
                result.reverse_links_added = inject_reverse_links(
                    self.store,
                    &self.paths,
                    &feature,
                    &docs.dir,
                    &docs.tasks_text,
                    &docs.spec,
                    &docs.tasks,
                )?;
            }

            if let Some(tracker) = self.tracker {
                let (issues, warnings) = mirror_stories(
                    tracker,
                    &docs.spec,
                    &docs.tasks,
                    increment_id,
                    &self.config.sync.tracker_labels,
                );
                result.tracker_issues = issues;
                result.warnings.extend(warnings);
            }

            result.coverage = Some(build_report(
                &docs.spec,
                &docs.tasks,
                self.config.coverage.mode,
                self.clock,
            ));

            self.record_audit(&docs.dir, &result, &result.tracker_issues);

            tracing::info!(
                increment = increment_id,
                updated = result.updated.len(),
                conflicts = result.conflicts.len(),
                warnings = result.warnings.len(),
                "Sync pass finished"
            );
            Ok(result)
        })
    }

    fn record_audit(&self, dir: &Path, result: &SyncResult, issues: &[(String, ExternalIssueRef)]) {
        if !self.store.is_dir(dir) {
            return;
        }
        if !result.is_noteworthy() && issues.is_empty() {
            return;
        }
        append_audit_record(
            self.store,
            self.clock,
            dir,
            result,
            issues,
            self.config.audit.limit,
        );
    }
}

/// Living-docs folder for an increment: the feature it declares in
/// front-matter, else the increment id itself.
pub fn feature_folder(spec: &SpecDocument, increment_id: &str) -> String {
    spec.frontmatter
        .get_any(&["feature_id", "feature", "epic"])
        .map(str::to_string)
        .unwrap_or_else(|| increment_id.to_string())
}
