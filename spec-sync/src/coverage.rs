//! Coverage mapper
//!
//! Builds the bidirectional AC ↔ Task graph for one increment and derives
//! coverage, orphan and completion figures from it. Pure: no I/O, no errors.
//! Invalid input degrades to a zero-coverage report.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};

use crate::clock::Clock;
use crate::parser::{SpecDocument, TasksDocument};

/// How claiming tasks decide an AC's completion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum CoverageMode {
    /// Complete when at least one claiming task is complete
    AnyComplete,
    /// Complete only when every claiming task is complete
    #[default]
    AllComplete,
}

/// Derived completion for one AC.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AcStatus {
    pub ac_id: String,
    pub total_tasks: usize,
    pub completed_tasks: usize,
    /// Completed share of claiming tasks, two decimals
    pub percentage: f64,
    pub is_complete: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoryCoverage {
    pub story_id: String,
    pub title: String,
    pub total_acs: usize,
    pub covered_acs: usize,
    pub completed_acs: usize,
    pub coverage_percentage: u32,
}

/// Read-only snapshot; recomputed on every call, never authoritative.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CoverageReport {
    pub total_acs: usize,
    pub covered_acs: usize,
    pub uncovered_acs: Vec<String>,
    pub orphan_tasks: Vec<String>,
    /// AC ids claimed by tasks but absent from the spec
    pub invalid_references: Vec<String>,
    pub ac_to_tasks: BTreeMap<String, Vec<String>>,
    pub task_to_acs: BTreeMap<String, Vec<String>>,
    pub ac_status: BTreeMap<String, AcStatus>,
    pub per_story: Vec<StoryCoverage>,
    pub coverage_percentage: u32,
    pub generated_at: DateTime<Utc>,
}

impl CoverageReport {
    pub fn is_ac_complete(&self, ac_id: &str) -> bool {
        self.ac_status.get(ac_id).is_some_and(|s| s.is_complete)
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

/// `round(part / whole * 100)`, with `0/0` counting as fully covered.
pub fn percent(part: usize, whole: usize) -> u32 {
    if whole == 0 {
        return 100;
    }
    ((part as f64 / whole as f64) * 100.0).round() as u32
}

fn two_decimal_percent(part: usize, whole: usize) -> f64 {
    if whole == 0 {
        return 0.0;
    }
    ((part as f64 / whole as f64) * 100.0 * 100.0).round() / 100.0
}

/// Build the coverage report for one increment.
pub fn build_report(
    spec: &SpecDocument,
    tasks: &TasksDocument,
    mode: CoverageMode,
    clock: &dyn Clock,
) -> CoverageReport {
    let mut ac_to_tasks: BTreeMap<String, Vec<String>> = BTreeMap::new();
    let mut task_to_acs: BTreeMap<String, Vec<String>> = BTreeMap::new();
    let mut orphan_tasks = Vec::new();

    for task in &tasks.tasks {
        if task.is_orphan() {
            orphan_tasks.push(task.id.clone());
        }
        task_to_acs.insert(task.id.clone(), task.satisfies_acs.clone());
        for ac in &task.satisfies_acs {
            ac_to_tasks
                .entry(ac.clone())
                .or_default()
                .push(task.id.clone());
        }
    }

    let spec_ids: HashSet<&str> = spec.all_acs().map(|ac| ac.id.as_str()).collect();
    let invalid_references: Vec<String> = ac_to_tasks
        .keys()
        .filter(|id| !spec_ids.contains(id.as_str()))
        .cloned()
        .collect();

    let mut ac_status = BTreeMap::new();
    let mut uncovered_acs = Vec::new();
    let mut covered = 0;
    for ac in spec.all_acs() {
        let claimants = ac_to_tasks.get(&ac.id).map(Vec::as_slice).unwrap_or_default();
        if claimants.is_empty() {
            uncovered_acs.push(ac.id.clone());
        } else {
            covered += 1;
        }
        let completed_tasks = claimants
            .iter()
            .filter(|id| tasks.find(id).is_some_and(|t| t.completed))
            .count();
        let total_tasks = claimants.len();
        let is_complete = match mode {
            CoverageMode::AllComplete => total_tasks > 0 && completed_tasks == total_tasks,
            CoverageMode::AnyComplete => completed_tasks > 0,
        };
        ac_status.insert(
            ac.id.clone(),
            AcStatus {
                ac_id: ac.id.clone(),
                total_tasks,
                completed_tasks,
                percentage: two_decimal_percent(completed_tasks, total_tasks),
                is_complete,
            },
        );
    }

    let per_story = spec
        .user_stories
        .iter()
        .map(|story| {
            let total = story.acceptance_criteria.len();
            let covered = story
                .acceptance_criteria
                .iter()
                .filter(|ac| ac_to_tasks.contains_key(&ac.id))
                .count();
            let completed = story
                .acceptance_criteria
                .iter()
                .filter(|ac| ac_status.get(&ac.id).is_some_and(|s: &AcStatus| s.is_complete))
                .count();
            StoryCoverage {
                story_id: story.id.clone(),
                title: story.title.clone(),
                total_acs: total,
                covered_acs: covered,
                completed_acs: completed,
                coverage_percentage: percent(covered, total),
            }
        })
        .collect();

    let total_acs = spec_ids.len();
    CoverageReport {
        total_acs,
        covered_acs: covered,
        uncovered_acs,
        orphan_tasks,
        invalid_references,
        ac_to_tasks,
        task_to_acs,
        ac_status,
        per_story,
        coverage_percentage: percent(covered, total_acs),
        generated_at: clock.now(),
    }
}

/// Result of cross-checking spec ACs against task claims.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct MappingValidation {
    /// ACs in the spec that no task claims
    pub orphaned_acs: Vec<String>,
    /// AC ids claimed by tasks but missing from the spec
    pub invalid_references: Vec<String>,
}

impl MappingValidation {
    pub fn is_valid(&self) -> bool {
        self.orphaned_acs.is_empty() && self.invalid_references.is_empty()
    }
}

/// Compare the ACs the spec declares with the ACs tasks claim.
pub fn validate_mapping(spec: &SpecDocument, tasks: &TasksDocument) -> MappingValidation {
    let claimed: Vec<&str> = tasks
        .tasks
        .iter()
        .flat_map(|t| t.satisfies_acs.iter().map(String::as_str))
        .collect();
    let claimed_set: HashSet<&str> = claimed.iter().copied().collect();
    let declared: HashSet<&str> = spec.all_acs().map(|ac| ac.id.as_str()).collect();

    let orphaned_acs = spec
        .all_acs()
        .filter(|ac| !claimed_set.contains(ac.id.as_str()))
        .map(|ac| ac.id.clone())
        .collect();

    let mut invalid_references: Vec<String> = Vec::new();
    for id in claimed {
        if !declared.contains(id) && !invalid_references.iter().any(|r| r == id) {
            invalid_references.push(id.to_string());
        }
    }

    MappingValidation {
        orphaned_acs,
        invalid_references,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::MockClock;
    use crate::parser::{parse_spec, parse_tasks};
    use pretty_assertions::assert_eq;

    const SPEC: &str = "### US-001: Login\n- [ ] **AC-US1-01**: log in\n- [ ] **AC-US1-02**: remember me\n- [ ] **AC-US1-03**: unclaimed\n### US-002: Logout\n- [ ] **AC-US2-01**: log out\n";
    const TASKS: &str = "### T-001: a\n**Satisfies ACs**: AC-US1-01\n**Status**: [x] completed\n### T-002: b\n**Satisfies ACs**: AC-US1-02, AC-US2-01\n**Status**: [x] completed\n### T-003: c\n**Satisfies ACs**: AC-US1-02, AC-US9-99\n**Status**: [ ] pending\n### T-004: d\n**Status**: [x] completed\n";

    fn report(mode: CoverageMode) -> CoverageReport {
        build_report(
            &parse_spec(SPEC),
            &parse_tasks(TASKS),
            mode,
            &MockClock::fixed(),
        )
    }

    #[test]
    fn test_graph_and_counts() {
        let r = report(CoverageMode::AllComplete);
        assert_eq!(r.total_acs, 4);
        assert_eq!(r.covered_acs, 3);
        assert_eq!(r.uncovered_acs, vec!["AC-US1-03"]);
        assert_eq!(r.orphan_tasks, vec!["T-004"]);
        assert_eq!(r.invalid_references, vec!["AC-US9-99"]);
        assert_eq!(r.ac_to_tasks["AC-US1-02"], vec!["T-002", "T-003"]);
        assert_eq!(r.task_to_acs["T-002"], vec!["AC-US1-02", "AC-US2-01"]);
        assert_eq!(r.coverage_percentage, 75);
        assert_eq!(r.generated_at, MockClock::fixed().now());
    }

    #[test]
    fn test_all_complete_mode_requires_every_task() {
        let r = report(CoverageMode::AllComplete);
        assert!(r.is_ac_complete("AC-US1-01"));
        assert!(!r.is_ac_complete("AC-US1-02"));
        assert!(!r.is_ac_complete("AC-US1-03"));
        let status = &r.ac_status["AC-US1-02"];
        assert_eq!((status.completed_tasks, status.total_tasks), (1, 2));
        assert_eq!(status.percentage, 50.0);
    }

    #[test]
    fn test_any_complete_mode() {
        let r = report(CoverageMode::AnyComplete);
        assert!(r.is_ac_complete("AC-US1-02"));
        assert!(!r.is_ac_complete("AC-US1-03"));
    }

    #[test]
    fn test_per_story_coverage() {
        let r = report(CoverageMode::AllComplete);
        assert_eq!(r.per_story[0].story_id, "US-001");
        assert_eq!(r.per_story[0].covered_acs, 2);
        assert_eq!(r.per_story[0].coverage_percentage, 67);
        assert_eq!(r.per_story[1].coverage_percentage, 100);
        assert_eq!(r.per_story[1].completed_acs, 1);
    }

    #[test]
    fn test_empty_inputs_are_vacuously_covered() {
        let r = build_report(
            &parse_spec(""),
            &parse_tasks(""),
            CoverageMode::AllComplete,
            &MockClock::fixed(),
        );
        assert_eq!(r.total_acs, 0);
        assert_eq!(r.coverage_percentage, 100);
        assert!(r.per_story.is_empty());
    }

    #[test]
    fn test_percent_rounding() {
        assert_eq!(percent(0, 0), 100);
        assert_eq!(percent(1, 3), 33);
        assert_eq!(percent(2, 3), 67);
        assert_eq!(percent(1, 8), 13);
        assert_eq!(two_decimal_percent(1, 3), 33.33);
    }

    #[test]
    fn test_validate_mapping() {
        let v = validate_mapping(&parse_spec(SPEC), &parse_tasks(TASKS));
        assert_eq!(v.orphaned_acs, vec!["AC-US1-03"]);
        assert_eq!(v.invalid_references, vec!["AC-US9-99"]);
        assert!(!v.is_valid());
    }
}
