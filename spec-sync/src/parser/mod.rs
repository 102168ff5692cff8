//! Document parser
//!
//! Turns raw `spec.md` / `tasks.md` text into user stories, acceptance
//! criteria and tasks. Parsing is pure and permissive: malformed or missing
//! sections produce empty collections plus [`Diagnostic`]s, never errors.
//! Line indices refer to `text.split('\n')` so callers can rewrite lines in
//! place without disturbing the rest of the document.

mod frontmatter;
mod patterns;
mod spec;
mod tasks;

pub use frontmatter::{Frontmatter, parse_frontmatter};
pub use spec::{AcceptanceCriterion, SpecDocument, UserStory, parse_spec};
pub use tasks::{Task, TaskStatus, TasksDocument, parse_tasks};

/// A parse anomaly worth surfacing but not worth failing over.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    /// Zero-based line index, when the anomaly is tied to one line
    pub line: Option<usize>,
    pub message: String,
}

impl Diagnostic {
    pub(crate) fn at(line: usize, message: impl Into<String>) -> Self {
        Self {
            line: Some(line),
            message: message.into(),
        }
    }
}

/// Split text into lines exactly as the rewriters expect (`'\n'` only, so
/// `\r` stays part of the line and the round trip is byte-for-byte).
pub fn split_lines(text: &str) -> Vec<&str> {
    text.split('\n').collect()
}

/// Markdown heading level (`### x` → 3), or `None` for non-heading lines.
pub fn heading_level(line: &str) -> Option<usize> {
    let trimmed = line.trim_end();
    let hashes = trimmed.chars().take_while(|c| *c == '#').count();
    if hashes == 0 || hashes > 6 {
        return None;
    }
    match trimmed[hashes..].chars().next() {
        Some(' ') | Some('\t') => Some(hashes),
        None => Some(hashes),
        _ => None,
    }
}

/// `US-1`, `US-001` → `US-001`. Returns `None` for anything else.
pub fn normalize_story_id(raw: &str) -> Option<String> {
    let digits = raw.strip_prefix("US-")?;
    let n: u32 = digits.parse().ok()?;
    Some(format!("US-{n:03}"))
}

/// The user story an AC id names by convention (`AC-US1-02` → `US-001`).
pub fn story_for_ac_id(ac_id: &str) -> Option<String> {
    let caps = patterns::AC_STORY_PREFIX.captures(ac_id)?;
    let n: u32 = caps.get(1)?.as_str().parse().ok()?;
    Some(format!("US-{n:03}"))
}

/// Lowercase dash-separated slug for file and folder names.
///
/// Example: "Add user auth!" → "add-user-auth"
pub fn create_slug(description: &str) -> String {
    let slug = description
        .to_lowercase()
        .chars()
        .map(|c| {
            if c.is_alphanumeric() {
                c
            } else if c.is_whitespace() || c == '-' || c == '_' {
                '-'
            } else {
                ' '
            }
        })
        .collect::<String>();

    slug.split(|c: char| c == '-' || c.is_whitespace())
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join("-")
}
