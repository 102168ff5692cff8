//! `tasks.md` parsing: task blocks, claimed ACs and completion.

use std::collections::HashSet;

use super::frontmatter::{Frontmatter, parse_frontmatter};
use super::patterns::{
    AC_ID, CHECKBOX, CLAIM_FIELD, COMPLETED_FIELD, STATUS_FIELD, STORY_ID, TASK_HEADING,
    USER_STORY_FIELD,
};
use super::{Diagnostic, heading_level, split_lines};

/// Task lifecycle as written in a `**Status**:` field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TaskStatus {
    #[default]
    Pending,
    InProgress,
    Completed,
    Transferred,
    Canceled,
}

impl TaskStatus {
    /// Interpret a status value such as `[x] completed` or `in_progress`.
    fn from_field(value: &str) -> Option<Self> {
        let lower = value.trim().to_ascii_lowercase();
        let (checkbox, rest) = match lower.strip_prefix('[') {
            Some(after) => match after.split_once(']') {
                Some((mark, rest)) => (Some(mark.trim() == "x"), rest.trim()),
                None => (None, lower.as_str()),
            },
            None => (None, lower.as_str()),
        };
        let word = rest
            .split(|c: char| c.is_whitespace() || c == ',' || c == '(')
            .next()
            .unwrap_or_default();
        let from_word = match word {
            "completed" | "complete" | "done" => Some(Self::Completed),
            "in_progress" | "in-progress" | "wip" => Some(Self::InProgress),
            "transferred" => Some(Self::Transferred),
            "canceled" | "cancelled" => Some(Self::Canceled),
            "pending" | "todo" | "not_started" => Some(Self::Pending),
            _ => None,
        };
        from_word.or(match checkbox {
            Some(true) => Some(Self::Completed),
            Some(false) => Some(Self::Pending),
            None => None,
        })
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::InProgress => "in_progress",
            Self::Completed => "completed",
            Self::Transferred => "transferred",
            Self::Canceled => "canceled",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Task {
    pub id: String,
    pub title: String,
    pub status: TaskStatus,
    pub completed: bool,
    /// Claimed AC ids, deduplicated, in listed order
    pub satisfies_acs: Vec<String>,
    /// Story named in a `**User Story**:` field
    pub user_story: Option<String>,
    /// Line index of that field, if present
    pub user_story_line: Option<usize>,
    /// Heading line index
    pub line: usize,
    /// One past the last line of the task block
    pub end_line: usize,
}

impl Task {
    pub fn is_orphan(&self) -> bool {
        self.satisfies_acs.is_empty()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TasksDocument {
    pub frontmatter: Frontmatter,
    pub tasks: Vec<Task>,
    pub diagnostics: Vec<Diagnostic>,
}

impl TasksDocument {
    pub fn find(&self, id: &str) -> Option<&Task> {
        self.tasks.iter().find(|t| t.id == id)
    }

    /// `total_tasks` counter from front-matter, when declared.
    pub fn declared_total(&self) -> Option<usize> {
        self.frontmatter.get("total_tasks")?.parse().ok()
    }

    /// `completed_tasks` counter from front-matter, when declared.
    pub fn declared_completed(&self) -> Option<usize> {
        self.frontmatter.get("completed_tasks")?.parse().ok()
    }
}

/// Parse task list text.
pub fn parse_tasks(text: &str) -> TasksDocument {
    let frontmatter = parse_frontmatter(text);
    let lines = split_lines(text);
    let body_start = frontmatter.body_start;

    // (line, level, heading checkbox, id, title)
    let mut headings = Vec::new();
    for (idx, line) in lines.iter().enumerate().skip(body_start) {
        if let Some(caps) = TASK_HEADING.captures(line) {
            let level = caps.get(1).map_or(0, |m| m.as_str().len());
            let checkbox = caps.get(2).map(|m| m.as_str().eq_ignore_ascii_case("x"));
            let id = caps.get(3).map(|m| m.as_str()).unwrap_or_default();
            let title = caps.get(4).map(|m| m.as_str()).unwrap_or_default();
            headings.push((idx, level, checkbox, id.to_string(), title.to_string()));
        }
    }

    let mut doc = TasksDocument {
        frontmatter,
        ..TasksDocument::default()
    };
    let mut seen: HashSet<String> = HashSet::new();

    for (line, level, heading_checkbox, id, title) in headings {
        let end_line = block_end(&lines, line, level);
        if !seen.insert(id.clone()) {
            doc.diagnostics.push(Diagnostic::at(
                line,
                format!("duplicate task {id}; first occurrence kept"),
            ));
            continue;
        }
        doc.tasks.push(parse_block(
            &lines,
            line,
            end_line,
            heading_checkbox,
            id,
            title,
            &mut doc.diagnostics,
        ));
    }
    doc
}

/// A task block ends at the next task heading, or the next heading of the
/// same or a higher level.
fn block_end(lines: &[&str], start: usize, level: usize) -> usize {
    lines
        .iter()
        .enumerate()
        .skip(start + 1)
        .find(|(_, l)| {
            TASK_HEADING.is_match(l) || heading_level(l).is_some_and(|h| h <= level)
        })
        .map_or(lines.len(), |(i, _)| i)
}

fn status_from_done(done: bool) -> TaskStatus {
    if done {
        TaskStatus::Completed
    } else {
        TaskStatus::Pending
    }
}

fn parse_block(
    lines: &[&str],
    start: usize,
    end: usize,
    heading_checkbox: Option<bool>,
    id: String,
    title: String,
    diagnostics: &mut Vec<Diagnostic>,
) -> Task {
    let mut status_field: Option<TaskStatus> = None;
    let mut completed_field: Option<bool> = None;
    let mut satisfies_acs: Vec<String> = Vec::new();
    let mut user_story = None;
    let mut user_story_line = None;
    let mut checked = 0usize;
    let mut unchecked = 0usize;

    for (idx, line) in lines.iter().enumerate().take(end).skip(start + 1) {
        if let Some(caps) = CLAIM_FIELD.captures(line) {
            let value = caps.get(1).map(|m| m.as_str()).unwrap_or_default();
            for m in AC_ID.find_iter(value) {
                let ac = m.as_str().to_string();
                if !satisfies_acs.contains(&ac) {
                    satisfies_acs.push(ac);
                }
            }
            continue;
        }
        if let Some(caps) = STATUS_FIELD.captures(line) {
            let value = caps.get(1).map(|m| m.as_str()).unwrap_or_default();
            match TaskStatus::from_field(value) {
                Some(status) => status_field = status_field.or(Some(status)),
                None => diagnostics.push(Diagnostic::at(
                    idx,
                    format!("{id}: unrecognised status '{}'", value.trim()),
                )),
            }
            continue;
        }
        if let Some(caps) = COMPLETED_FIELD.captures(line) {
            let value = caps.get(1).map(|m| m.as_str()).unwrap_or_default().trim();
            let lower = value.to_ascii_lowercase();
            let done = !(lower.is_empty()
                || lower == "no"
                || lower == "false"
                || lower == "-"
                || lower.starts_with("[ ]"));
            completed_field = completed_field.or(Some(done));
            continue;
        }
        if let Some(caps) = USER_STORY_FIELD.captures(line) {
            if user_story_line.is_none() {
                let value = caps.get(1).map(|m| m.as_str()).unwrap_or_default();
                user_story = STORY_ID.find(value).map(|m| m.as_str().to_string());
                user_story_line = Some(idx);
            }
            continue;
        }
        if let Some(caps) = CHECKBOX.captures(line) {
            if caps.get(1).is_some_and(|m| m.as_str().eq_ignore_ascii_case("x")) {
                checked += 1;
            } else {
                unchecked += 1;
            }
        }
    }

    // Explicit fields win over checkboxes; bare checkbox lists count as done
    // only when at least one is ticked and none is open.
    let status = status_field
        .or(completed_field.map(status_from_done))
        .or(heading_checkbox.map(status_from_done))
        .unwrap_or_else(|| status_from_done(checked > 0 && unchecked == 0));

    Task {
        id,
        title,
        completed: status == TaskStatus::Completed,
        status,
        satisfies_acs,
        user_story,
        user_story_line,
        line: start,
        end_line: end,
    }
}
