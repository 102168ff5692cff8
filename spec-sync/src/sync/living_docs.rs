//! Living-docs user story files
//!
//! Each user story is republished as `<living_docs>/<feature>/us-NNN-slug.md`.
//! The `## Acceptance Criteria` and `## Tasks` sections are managed: they are
//! regenerated in full from the increment on every pass, so repeated passes
//! over unchanged sources leave the file byte-identical.

use serde::Serialize;
use std::path::{Path, PathBuf};

use crate::SPEC_FILE;
use crate::clock::Clock;
use crate::config::ProjectPaths;
use crate::error::Result;
use crate::parser::{TasksDocument, UserStory, create_slug, heading_level, parse_spec, split_lines};
use crate::store::FileStore;

pub const AC_SECTION: &str = "Acceptance Criteria";
pub const TASKS_SECTION: &str = "Tasks";
const IMPLEMENTATION_SECTION: &str = "Implementation";

/// What happened to one story file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LivingDocUpdate {
    pub story_id: String,
    pub path: PathBuf,
    pub created: bool,
    /// False when regeneration reproduced the existing bytes
    pub written: bool,
    /// Checkbox states in the file that the increment overrode
    pub overridden: Vec<String>,
}

#[derive(Serialize)]
struct StoryFrontmatter<'a> {
    id: &'a str,
    feature: &'a str,
    title: &'a str,
    status: &'a str,
    created: String,
}

/// Path of the story's living-docs file. An existing `us-NNN-*.md` is reused
/// whatever its slug; otherwise the name is derived from the story title.
pub fn story_file_path(
    store: &dyn FileStore,
    paths: &ProjectPaths,
    feature: &str,
    story: &UserStory,
) -> Result<PathBuf> {
    let dir = paths.living_docs.join(feature);
    let id = story.canonical_id().to_lowercase();
    let prefix = format!("{id}-");
    let exact = format!("{id}.md");

    for entry in store.list_dir(&dir)? {
        if !entry.is_dir
            && entry.name.ends_with(".md")
            && (entry.name.starts_with(&prefix) || entry.name == exact)
        {
            return Ok(dir.join(entry.name));
        }
    }

    let slug = create_slug(&story.title);
    if slug.is_empty() {
        Ok(dir.join(exact))
    } else {
        Ok(dir.join(format!("{id}-{slug}.md")))
    }
}

/// Relative markdown link target from `from_dir` to `target`.
pub(crate) fn relative_link(from_dir: &Path, target: &Path) -> String {
    pathdiff::diff_paths(target, from_dir)
        .unwrap_or_else(|| target.to_path_buf())
        .to_string_lossy()
        .replace('\\', "/")
}

fn story_status(story: &UserStory) -> &'static str {
    if !story.acceptance_criteria.is_empty()
        && story.acceptance_criteria.iter().all(|ac| ac.completed)
    {
        "complete"
    } else {
        "active"
    }
}

fn ac_section_body(story: &UserStory) -> Vec<String> {
    if story.acceptance_criteria.is_empty() {
        return vec!["_No acceptance criteria defined._".to_string()];
    }
    story
        .acceptance_criteria
        .iter()
        .map(|ac| {
            let mark = if ac.completed { "x" } else { " " };
            format!("- [{mark}] **{}**: {}", ac.id, ac.description)
        })
        .collect()
}

fn tasks_section_body(story: &UserStory, tasks: &TasksDocument) -> Vec<String> {
    let lines: Vec<String> = tasks
        .tasks
        .iter()
        .filter_map(|task| {
            let claimed: Vec<&str> = task
                .satisfies_acs
                .iter()
                .filter(|id| story.acceptance_criteria.iter().any(|ac| &ac.id == *id))
                .map(String::as_str)
                .collect();
            if claimed.is_empty() {
                return None;
            }
            let mark = if task.completed { "x" } else { " " };
            Some(format!(
                "- [{mark}] **{}**: {} ({})",
                task.id,
                task.title,
                claimed.join(", ")
            ))
        })
        .collect();
    if lines.is_empty() {
        vec!["_No tasks reference this story yet._".to_string()]
    } else {
        lines
    }
}

/// Replace the `## <heading>` section with `body`, or insert it before
/// `## Implementation` (else at the end) when absent. The section runs up
/// to the next heading of level 1 or 2.
pub fn replace_section(text: &str, heading: &str, body: &[String]) -> String {
    let mut lines: Vec<String> = split_lines(text).into_iter().map(str::to_string).collect();
    let marker = format!("## {heading}");

    let mut block = vec![marker.clone(), String::new()];
    block.extend(body.iter().cloned());
    block.push(String::new());

    if let Some(start) = lines.iter().position(|l| l.trim_end() == marker) {
        let end = lines
            .iter()
            .enumerate()
            .skip(start + 1)
            .find(|(_, l)| heading_level(l).is_some_and(|level| level <= 2))
            .map_or(lines.len(), |(i, _)| i);
        let trailing_newline = end == lines.len() && lines.last().is_some_and(String::is_empty);
        lines.splice(start..end, block);
        if trailing_newline && lines.last().is_some_and(|l| !l.is_empty()) {
            lines.push(String::new());
        }
        return lines.join("\n");
    }

    let implementation = format!("## {IMPLEMENTATION_SECTION}");
    match lines.iter().position(|l| l.trim_end() == implementation) {
        Some(at) => {
            if at > 0 && lines.get(at - 1).is_some_and(|l| !l.trim().is_empty()) {
                block.insert(0, String::new());
            }
            lines.splice(at..at, block);
        }
        None => {
            while lines.last().is_some_and(|l| l.trim().is_empty()) {
                lines.pop();
            }
            if !lines.is_empty() {
                block.insert(0, String::new());
            }
            lines.extend(block);
        }
    }
    lines.join("\n")
}

/// Set `key: value` inside existing front-matter. Text without front-matter
/// is returned unchanged.
fn set_frontmatter_field(text: &str, key: &str, value: &str) -> String {
    let mut lines: Vec<String> = split_lines(text).into_iter().map(str::to_string).collect();
    if lines.first().map(|l| l.trim_end()) != Some("---") {
        return text.to_string();
    }
    let Some(close) = lines.iter().skip(1).position(|l| l.trim_end() == "---").map(|p| p + 1)
    else {
        return text.to_string();
    };
    let prefix = format!("{key}:");
    let replacement = format!("{key}: {value}");
    match lines[1..close].iter().position(|l| l.starts_with(&prefix)) {
        Some(offset) => lines[1 + offset] = replacement,
        None => lines.insert(close, replacement),
    }
    lines.join("\n")
}

/// Initial content of a story file before the managed sections are filled.
pub fn render_story_file(
    paths: &ProjectPaths,
    file: &Path,
    feature: &str,
    increment_id: &str,
    story: &UserStory,
    clock: &dyn Clock,
) -> Result<String> {
    let id = story.canonical_id();
    let frontmatter = serde_yaml::to_string(&StoryFrontmatter {
        id: &id,
        feature,
        title: &story.title,
        status: story_status(story),
        created: clock.now().format("%Y-%m-%d").to_string(),
    })?;
    let file_dir = file.parent().unwrap_or(paths.living_docs.as_path());
    let feature_link = relative_link(file_dir, &paths.features.join(feature).join("FEATURE.md"));
    let increment_link =
        relative_link(file_dir, &paths.increment_dir(increment_id).join(SPEC_FILE));

    Ok(format!(
        "---\n{frontmatter}---\n\n# {id}: {title}\n\n**Feature**: [{feature}]({feature_link})\n\n## {AC_SECTION}\n\n## {TASKS_SECTION}\n\n## {IMPLEMENTATION_SECTION}\n\n- Increment: [{increment_id}]({increment_link})\n",
        title = story.title,
    ))
}

/// Regenerate (or create) one story's living-docs file.
pub(crate) fn sync_story(
    store: &dyn FileStore,
    clock: &dyn Clock,
    paths: &ProjectPaths,
    feature: &str,
    increment_id: &str,
    story: &UserStory,
    tasks: &TasksDocument,
) -> Result<LivingDocUpdate> {
    let path = story_file_path(store, paths, feature, story)?;
    let existing = store.read_text(&path)?;
    let created = existing.is_none();

    let mut overridden = Vec::new();
    let base = match &existing {
        Some(text) => {
            for doc_ac in parse_spec(text).all_acs() {
                let Some(source) = story.acceptance_criteria.iter().find(|ac| ac.id == doc_ac.id)
                else {
                    continue;
                };
                if source.completed != doc_ac.completed {
                    overridden.push(format!(
                        "{}: living docs {} overridden by increment {}",
                        doc_ac.id,
                        checkbox(doc_ac.completed),
                        checkbox(source.completed)
                    ));
                }
            }
            text.clone()
        }
        None => render_story_file(paths, &path, feature, increment_id, story, clock)?,
    };

    let text = replace_section(&base, AC_SECTION, &ac_section_body(story));
    let text = replace_section(&text, TASKS_SECTION, &tasks_section_body(story, tasks));
    let text = set_frontmatter_field(&text, "status", story_status(story));

    let written = existing.as_deref() != Some(text.as_str());
    if written {
        store.write_text_atomic(&path, &text)?;
        tracing::debug!(story = %story.id, path = %path.display(), created, "Living docs regenerated");
    }
    for line in &overridden {
        tracing::info!(story = %story.id, change = %line, "Increment overrides living docs");
    }

    Ok(LivingDocUpdate {
        story_id: story.id.clone(),
        path,
        created,
        written,
        overridden,
    })
}

fn checkbox(done: bool) -> &'static str {
    if done { "[x]" } else { "[ ]" }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::MockClock;
    use crate::config::LayoutConfig;
    use crate::parser::{parse_spec, parse_tasks};
    use crate::store::MemoryFileStore;
    use pretty_assertions::assert_eq;

    fn strings(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_replace_existing_section_is_stable() {
        let text = "# US\n\n## Acceptance Criteria\n\n- [ ] old\n- [ ] stale\n\n## Tasks\n\nkeep\n";
        let once = replace_section(text, "Acceptance Criteria", &strings(&["- [x] new"]));
        assert_eq!(once, "# US\n\n## Acceptance Criteria\n\n- [x] new\n\n## Tasks\n\nkeep\n");
        let twice = replace_section(&once, "Acceptance Criteria", &strings(&["- [x] new"]));
        assert_eq!(once, twice);
    }

    #[test]
    fn test_replace_section_at_end_of_file() {
        let text = "# US\n\n## Tasks\n\n- a\n- b\n";
        let out = replace_section(text, "Tasks", &strings(&["- c"]));
        assert_eq!(out, "# US\n\n## Tasks\n\n- c\n");
        assert_eq!(replace_section(&out, "Tasks", &strings(&["- c"])), out);
    }

    #[test]
    fn test_missing_section_inserted_before_implementation() {
        let text = "# US\n\nintro\n## Implementation\n\n- link\n";
        let out = replace_section(text, "Tasks", &strings(&["- t"]));
        assert_eq!(
            out,
            "# US\n\nintro\n\n## Tasks\n\n- t\n\n## Implementation\n\n- link\n"
        );
        assert_eq!(replace_section(&out, "Tasks", &strings(&["- t"])), out);
    }

    #[test]
    fn test_missing_section_appended() {
        let out = replace_section("# US\n", "Tasks", &strings(&["- t"]));
        assert_eq!(out, "# US\n\n## Tasks\n\n- t\n");
        assert_eq!(replace_section(&out, "Tasks", &strings(&["- t"])), out);
    }

    #[test]
    fn test_set_frontmatter_field() {
        let out = set_frontmatter_field("---\nid: US-001\nstatus: active\n---\n# x\n", "status", "complete");
        assert_eq!(out, "---\nid: US-001\nstatus: complete\n---\n# x\n");
        assert_eq!(set_frontmatter_field("# x\n", "status", "complete"), "# x\n");
    }

    #[test]
    fn test_sync_story_creates_then_reuses_file() {
        let store = MemoryFileStore::new();
        let clock = MockClock::fixed();
        let paths = LayoutConfig::default().resolve(Path::new("/p"));
        let spec = parse_spec("### US-001: Log in\n- [x] **AC-US1-01**: works\n- [ ] **AC-US1-02**: remembers\n");
        let tasks = parse_tasks("### T-001: Form\n**AC**: AC-US1-01\n**Status**: [x] completed\n### T-002: Other\n**AC**: AC-US2-01\n");
        let story = &spec.user_stories[0];

        let first = sync_story(&store, &clock, &paths, "FS-010", "0001-auth", story, &tasks).unwrap();
        assert!(first.created && first.written);
        assert_eq!(
            first.path,
            PathBuf::from("/p/docs/internal/specs/FS-010/us-001-log-in.md")
        );
        let text = store.read_text(&first.path).unwrap().unwrap();
        assert!(text.contains("- [x] **AC-US1-01**: works\n- [ ] **AC-US1-02**: remembers"));
        assert!(text.contains("- [x] **T-001**: Form (AC-US1-01)"));
        assert!(!text.contains("T-002"));
        assert!(text.contains("**Feature**: [FS-010](FEATURE.md)"));
        assert!(text.contains("](../../../../increments/0001-auth/spec.md)"));

        let second = sync_story(&store, &clock, &paths, "FS-010", "0001-auth", story, &tasks).unwrap();
        assert!(!second.created);
        assert!(!second.written);
        assert_eq!(store.read_text(&first.path).unwrap().unwrap(), text);
    }

    #[test]
    fn test_living_docs_edit_is_overridden() {
        let store = MemoryFileStore::new();
        let clock = MockClock::fixed();
        let paths = LayoutConfig::default().resolve(Path::new("/p"));
        store.insert_file(
            "/p/docs/internal/specs/0001-auth/us-001-renamed.md",
            "# US-001: Log in\n\n## Acceptance Criteria\n\n- [x] **AC-US1-01**: edited by hand\n\n## Notes\n\nmine\n",
            None,
        );
        let spec = parse_spec("### US-001: Log in\n- [ ] **AC-US1-01**: works\n");
        let tasks = parse_tasks("");

        let update = sync_story(
            &store,
            &clock,
            &paths,
            "0001-auth",
            "0001-auth",
            &spec.user_stories[0],
            &tasks,
        )
        .unwrap();
        assert_eq!(
            update.overridden,
            vec!["AC-US1-01: living docs [x] overridden by increment [ ]"]
        );
        let text = store.read_text(&update.path).unwrap().unwrap();
        assert!(text.contains("- [ ] **AC-US1-01**: works"));
        assert!(text.contains("## Notes\n\nmine"));
    }
}
