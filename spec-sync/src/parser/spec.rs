//! `spec.md` parsing: user stories and their acceptance criteria.

use std::collections::HashSet;

use super::frontmatter::{Frontmatter, parse_frontmatter};
use super::patterns::{AC_LINE, STORY_HEADING};
use super::{Diagnostic, heading_level, normalize_story_id, split_lines, story_for_ac_id};

/// A checkbox-tracked requirement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AcceptanceCriterion {
    pub id: String,
    pub description: String,
    /// Checkbox state as written in the spec
    pub completed: bool,
    /// Zero-based line index of the checkbox line
    pub line: usize,
    /// Owning user story, `None` when the line sits outside every story block
    pub user_story: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserStory {
    pub id: String,
    pub title: String,
    pub line: usize,
    pub acceptance_criteria: Vec<AcceptanceCriterion>,
}

impl UserStory {
    /// `US-001` regardless of how the heading padded the number.
    pub fn canonical_id(&self) -> String {
        normalize_story_id(&self.id).unwrap_or_else(|| self.id.clone())
    }
}

/// Parsed spec. Always produced, whatever the input looks like.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SpecDocument {
    pub frontmatter: Frontmatter,
    pub title: Option<String>,
    pub summary: String,
    pub user_stories: Vec<UserStory>,
    /// AC lines found outside any user story block
    pub unassigned_acs: Vec<AcceptanceCriterion>,
    pub diagnostics: Vec<Diagnostic>,
}

impl SpecDocument {
    /// Every AC in document order of stories, then unassigned ones.
    pub fn all_acs(&self) -> impl Iterator<Item = &AcceptanceCriterion> {
        self.user_stories
            .iter()
            .flat_map(|s| s.acceptance_criteria.iter())
            .chain(self.unassigned_acs.iter())
    }

    pub fn find_ac(&self, id: &str) -> Option<&AcceptanceCriterion> {
        self.all_acs().find(|ac| ac.id == id)
    }

    pub fn find_story(&self, id: &str) -> Option<&UserStory> {
        let canonical = normalize_story_id(id);
        self.user_stories
            .iter()
            .find(|s| s.id == id || (canonical.is_some() && Some(s.canonical_id()) == canonical))
    }

    /// The story owning `ac_id`: the block it was written in, or, for an
    /// unassigned AC, the story its identifier names (`AC-US2-01` → `US-002`).
    pub fn story_for_ac(&self, ac_id: &str) -> Option<&UserStory> {
        if let Some(story) = self
            .user_stories
            .iter()
            .find(|s| s.acceptance_criteria.iter().any(|ac| ac.id == ac_id))
        {
            return Some(story);
        }
        if !self.unassigned_acs.iter().any(|ac| ac.id == ac_id) {
            return None;
        }
        let inferred = story_for_ac_id(ac_id)?;
        self.find_story(&inferred)
    }
}

/// Parse specification text.
pub fn parse_spec(text: &str) -> SpecDocument {
    let frontmatter = parse_frontmatter(text);
    let lines = split_lines(text);
    let body_start = frontmatter.body_start;

    let mut doc = SpecDocument {
        frontmatter,
        ..SpecDocument::default()
    };
    let mut seen_acs: HashSet<String> = HashSet::new();
    let mut seen_stories: HashSet<String> = HashSet::new();
    // (index into user_stories, heading level)
    let mut current: Option<(usize, usize)> = None;

    for (idx, line) in lines.iter().enumerate().skip(body_start) {
        if let Some(level) = heading_level(line) {
            if level == 1 {
                if doc.title.is_none() {
                    doc.title = Some(line.trim_start_matches('#').trim().to_string());
                }
                current = None;
                continue;
            }
            if let Some(caps) = STORY_HEADING.captures(line) {
                let id = caps.get(2).map(|m| m.as_str()).unwrap_or_default().to_string();
                let title = caps.get(3).map(|m| m.as_str()).unwrap_or_default().to_string();
                if !seen_stories.insert(id.clone()) {
                    doc.diagnostics
                        .push(Diagnostic::at(idx, format!("duplicate user story {id}")));
                    current = doc
                        .user_stories
                        .iter()
                        .position(|s| s.id == id)
                        .map(|i| (i, level));
                    continue;
                }
                doc.user_stories.push(UserStory {
                    id,
                    title,
                    line: idx,
                    acceptance_criteria: Vec::new(),
                });
                current = Some((doc.user_stories.len() - 1, level));
                continue;
            }
            if current.is_some_and(|(_, story_level)| level <= story_level) {
                current = None;
            }
            continue;
        }

        let Some(caps) = AC_LINE.captures(line) else {
            continue;
        };
        let id = caps.get(3).map(|m| m.as_str()).unwrap_or_default().to_string();
        if !seen_acs.insert(id.clone()) {
            doc.diagnostics.push(Diagnostic::at(
                idx,
                format!("duplicate acceptance criterion {id}; first occurrence kept"),
            ));
            continue;
        }
        let completed = caps
            .get(1)
            .is_some_and(|m| m.as_str().eq_ignore_ascii_case("x"));
        let description = caps.get(4).map(|m| m.as_str()).unwrap_or_default().to_string();

        match current {
            Some((story_idx, _)) => {
                let story = &mut doc.user_stories[story_idx];
                story.acceptance_criteria.push(AcceptanceCriterion {
                    id,
                    description,
                    completed,
                    line: idx,
                    user_story: Some(story.id.clone()),
                });
            }
            None => {
                doc.diagnostics.push(Diagnostic::at(
                    idx,
                    format!("{id} is not inside a user story section"),
                ));
                doc.unassigned_acs.push(AcceptanceCriterion {
                    id,
                    description,
                    completed,
                    line: idx,
                    user_story: None,
                });
            }
        }
    }

    if doc.title.is_none() {
        doc.title = doc.frontmatter.get("title").map(str::to_string);
    }
    doc.summary = extract_summary(&lines, body_start);
    doc
}

/// First paragraph after the title, or under a `Summary`/`Overview` heading.
fn extract_summary(lines: &[&str], body_start: usize) -> String {
    let mut in_named_section = false;
    let mut before_sections = true;
    let mut paragraph: Vec<&str> = Vec::new();

    for line in lines.iter().skip(body_start) {
        if let Some(level) = heading_level(line) {
            if !paragraph.is_empty() {
                break;
            }
            if level >= 2 {
                before_sections = false;
                let name = line.trim_start_matches('#').trim().to_ascii_lowercase();
                in_named_section = name == "summary" || name == "overview";
            }
            continue;
        }
        if !(before_sections || in_named_section) {
            continue;
        }
        let trimmed = line.trim();
        if trimmed.is_empty() {
            if !paragraph.is_empty() {
                break;
            }
            continue;
        }
        paragraph.push(trimmed);
    }
    paragraph.join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const SPEC: &str = "---\nincrement: 0001-auth\nfeature_id: FS-010\n---\n# Auth\n\nLogin for users.\n\n## User Stories\n\n### US-001: Login\n\n**Acceptance Criteria**:\n- [ ] **AC-US1-01**: User can log in\n- [x] AC-US1-02: Session persists\n\n### US-002: Logout\n\n- [ ] **AC-US2-01:** User can log out\n\n## Out of Scope\n\n- [ ] **AC-US2-02**: stray criterion\n";

    #[test]
    fn test_parse_stories_and_acs() {
        let doc = parse_spec(SPEC);
        assert_eq!(doc.title.as_deref(), Some("Auth"));
        assert_eq!(doc.summary, "Login for users.");
        assert_eq!(doc.frontmatter.get("feature_id"), Some("FS-010"));

        let ids: Vec<&str> = doc.user_stories.iter().map(|s| s.id.as_str()).collect();
        assert_eq!(ids, vec!["US-001", "US-002"]);

        let us1 = &doc.user_stories[0];
        assert_eq!(us1.title, "Login");
        assert_eq!(us1.acceptance_criteria.len(), 2);
        assert_eq!(us1.acceptance_criteria[0].id, "AC-US1-01");
        assert_eq!(us1.acceptance_criteria[0].description, "User can log in");
        assert!(!us1.acceptance_criteria[0].completed);
        assert!(us1.acceptance_criteria[1].completed);

        let us2 = &doc.user_stories[1];
        assert_eq!(us2.acceptance_criteria[0].id, "AC-US2-01");
        assert_eq!(us2.acceptance_criteria[0].description, "User can log out");
    }

    #[test]
    fn test_ac_outside_story_is_unassigned_with_diagnostic() {
        let doc = parse_spec(SPEC);
        assert_eq!(doc.unassigned_acs.len(), 1);
        assert_eq!(doc.unassigned_acs[0].id, "AC-US2-02");
        assert_eq!(doc.diagnostics.len(), 1);
        assert_eq!(
            doc.story_for_ac("AC-US2-02").map(|s| s.id.as_str()),
            Some("US-002")
        );
    }

    #[test]
    fn test_line_index_points_at_checkbox() {
        let doc = parse_spec(SPEC);
        let lines: Vec<&str> = SPEC.split('\n').collect();
        let ac = doc.find_ac("AC-US1-02").expect("ac present");
        assert!(lines[ac.line].contains("AC-US1-02"));
    }

    #[test]
    fn test_duplicate_ac_first_wins() {
        let doc = parse_spec("### US-001: A\n- [ ] **AC-US1-01**: first\n- [x] **AC-US1-01**: second\n");
        assert_eq!(doc.user_stories[0].acceptance_criteria.len(), 1);
        assert_eq!(doc.user_stories[0].acceptance_criteria[0].description, "first");
        assert_eq!(doc.diagnostics.len(), 1);
    }

    #[test]
    fn test_garbage_yields_empty_document() {
        let doc = parse_spec("random text\n- [ ] not an ac\n####### deep");
        assert!(doc.user_stories.is_empty());
        assert!(doc.unassigned_acs.is_empty());
        assert_eq!(parse_spec(""), SpecDocument::default());
    }

    #[test]
    fn test_parse_is_deterministic() {
        assert_eq!(parse_spec(SPEC), parse_spec(SPEC));
    }
}
