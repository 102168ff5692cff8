//! `**User Story**:` back-references in `tasks.md`.

use std::path::Path;

use super::living_docs::{relative_link, story_file_path};
use crate::TASKS_FILE;
use crate::config::ProjectPaths;
use crate::error::Result;
use crate::parser::{SpecDocument, Task, TasksDocument, UserStory, split_lines, story_for_ac_id};
use crate::store::FileStore;

/// The story a task primarily serves: the owner of its first claimed AC that
/// resolves, falling back to the story number encoded in the AC ids.
pub fn primary_story<'s>(spec: &'s SpecDocument, task: &Task) -> Option<&'s UserStory> {
    task.satisfies_acs
        .iter()
        .find_map(|ac_id| spec.story_for_ac(ac_id))
        .or_else(|| {
            task.satisfies_acs
                .iter()
                .filter_map(|ac_id| story_for_ac_id(ac_id))
                .find_map(|story_id| spec.find_story(&story_id))
        })
}

/// Insert a `**User Story**:` link under every task heading that claims ACs
/// but has no link yet. Existing links are never rewritten. Returns the ids
/// of the tasks that gained a link, in document order.
pub fn inject_reverse_links(
    store: &dyn FileStore,
    paths: &ProjectPaths,
    feature: &str,
    increment_dir: &Path,
    tasks_text: &str,
    spec: &SpecDocument,
    tasks: &TasksDocument,
) -> Result<Vec<String>> {
    let mut inserts: Vec<(usize, String, String)> = Vec::new();
    for task in &tasks.tasks {
        if task.user_story_line.is_some() || task.is_orphan() {
            continue;
        }
        let Some(story) = primary_story(spec, task) else {
            tracing::debug!(task = %task.id, "No user story resolves for claimed ACs");
            continue;
        };
        let story_path = story_file_path(store, paths, feature, story)?;
        let link = relative_link(increment_dir, &story_path);
        inserts.push((
            task.line + 1,
            format!(
                "**User Story**: [{}: {}]({link})",
                story.canonical_id(),
                story.title
            ),
            task.id.clone(),
        ));
    }

    if inserts.is_empty() {
        return Ok(Vec::new());
    }

    let mut lines: Vec<String> = split_lines(tasks_text)
        .into_iter()
        .map(str::to_string)
        .collect();
    // Bottom-up so earlier line indexes stay valid.
    for (at, line, _) in inserts.iter().rev() {
        lines.insert((*at).min(lines.len()), line.clone());
    }
    store.write_text_atomic(&increment_dir.join(TASKS_FILE), &lines.join("\n"))?;

    let added: Vec<String> = inserts.into_iter().map(|(_, _, id)| id).collect();
    tracing::debug!(tasks = ?added, "Reverse links injected");
    Ok(added)
}
