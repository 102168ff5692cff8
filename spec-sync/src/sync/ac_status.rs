//! Increment → spec checkbox propagation.

use std::path::Path;

use crate::SPEC_FILE;
use crate::coverage::{CoverageMode, percent};
use crate::error::Result;
use crate::parser::{SpecDocument, TasksDocument, split_lines};
use crate::store::FileStore;

/// Outcome of rewriting AC checkboxes from task completion.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AcStatusOutcome {
    pub updated: Vec<String>,
    pub changes: Vec<String>,
    pub conflicts: Vec<String>,
    pub warnings: Vec<String>,
    /// Rewritten spec text, when anything changed
    pub new_spec_text: Option<String>,
}

/// Check every AC whose claiming tasks are complete; report checked ACs
/// that are not backed by completed tasks as conflicts (never unchecked).
///
/// The spec is rewritten atomically, and only when at least one checkbox
/// flips.
pub fn propagate_ac_status(
    store: &dyn FileStore,
    increment_dir: &Path,
    spec_text: &str,
    spec: &SpecDocument,
    tasks: &TasksDocument,
    mode: CoverageMode,
) -> Result<AcStatusOutcome> {
    let mut outcome = AcStatusOutcome::default();
    let mut lines: Vec<String> = split_lines(spec_text)
        .into_iter()
        .map(str::to_string)
        .collect();

    for ac in spec.all_acs() {
        let claimants: Vec<&crate::parser::Task> = tasks
            .tasks
            .iter()
            .filter(|t| t.satisfies_acs.contains(&ac.id))
            .collect();

        if claimants.is_empty() {
            outcome.warnings.push(if ac.completed {
                format!("{}: [x] but no tasks found (manual verification?)", ac.id)
            } else {
                format!("{}: has no tasks mapped", ac.id)
            });
            continue;
        }

        let total = claimants.len();
        let completed = claimants.iter().filter(|t| t.completed).count();
        let is_complete = match mode {
            CoverageMode::AllComplete => completed == total,
            CoverageMode::AnyComplete => completed > 0,
        };

        if is_complete && !ac.completed {
            if let Some(line) = lines.get_mut(ac.line)
                && let Some(pos) = line.find("[ ]")
            {
                line.replace_range(pos..pos + 3, "[x]");
                outcome.updated.push(ac.id.clone());
                outcome.changes.push(format!(
                    "{}: [ ] → [x] ({completed}/{total} tasks complete)",
                    ac.id
                ));
            }
        } else if !is_complete && ac.completed {
            outcome.conflicts.push(format!(
                "{}: [x] but only {completed}/{total} tasks complete ({}%)",
                ac.id,
                percent(completed, total)
            ));
        }
    }

    for id in invalid_references(spec, tasks) {
        outcome
            .warnings
            .push(format!("{id} referenced in tasks.md but not found in spec.md"));
    }

    if !outcome.updated.is_empty() {
        let new_text = lines.join("\n");
        store.write_text_atomic(&increment_dir.join(SPEC_FILE), &new_text)?;
        tracing::info!(
            dir = %increment_dir.display(),
            updated = ?outcome.updated,
            "Spec acceptance criteria updated"
        );
        outcome.new_spec_text = Some(new_text);
    }
    for conflict in &outcome.conflicts {
        tracing::warn!(dir = %increment_dir.display(), conflict = %conflict, "AC status conflict");
    }
    Ok(outcome)
}

fn invalid_references(spec: &SpecDocument, tasks: &TasksDocument) -> Vec<String> {
    let mut invalid: Vec<String> = Vec::new();
    for task in &tasks.tasks {
        for id in &task.satisfies_acs {
            if spec.find_ac(id).is_none() && !invalid.contains(id) {
                invalid.push(id.clone());
            }
        }
    }
    invalid
}
