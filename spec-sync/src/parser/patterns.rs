//! Compiled line patterns shared by the spec and task parsers.

// Patterns are literals; a failure to compile is a programming error.
#![allow(clippy::expect_used)]

use regex_lite::Regex;
use std::sync::LazyLock;

/// `### US-001: Title` (levels 2-4)
pub(crate) static STORY_HEADING: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(#{2,4})\s+(US-\d+)\s*:?\s*(.*?)\s*$").expect("valid story heading regex")
});

/// `- [ ] **AC-US1-01**: text`, `- [x] AC-US1-01: text`, `- [ ] **AC-US1-01:** text`
pub(crate) static AC_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^\s*[-*]\s+\[([ xX])\]\s+(\*\*)?(AC-[A-Za-z0-9]+(?:-[A-Za-z0-9]+)*)(?::\*\*|\*\*:|\*\*|:)\s*(.*?)\s*$",
    )
    .expect("valid AC line regex")
});

/// `### T-001: Title`, `## T-001 Title`, `### [x] T-001: Title`
pub(crate) static TASK_HEADING: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(#{2,4})\s+(?:\[([ xX])\]\s+)?(T-\d+)\s*:?\s*(.*?)\s*$")
        .expect("valid task heading regex")
});

/// `**Satisfies ACs**: AC-US1-01, AC-US1-02` or `**AC**: ...`
pub(crate) static CLAIM_FIELD: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*(?:[-*]\s+)?\*\*(?:Satisfies ACs|ACs|AC)(?::\*\*|\*\*\s*:)\s*(.*)$")
        .expect("valid claim field regex")
});

/// `**Status**: [x] completed`
pub(crate) static STATUS_FIELD: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*(?:[-*]\s+)?\*\*Status(?::\*\*|\*\*\s*:)\s*(.*)$")
        .expect("valid status field regex")
});

/// `**Completed**: 2025-01-10`
pub(crate) static COMPLETED_FIELD: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*(?:[-*]\s+)?\*\*Completed(?::\*\*|\*\*\s*:)\s*(.*)$")
        .expect("valid completed field regex")
});

/// `**User Story**: US-001` or `**User Story**: [US-001: Title](path)`
pub(crate) static USER_STORY_FIELD: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*(?:[-*]\s+)?\*\*User Story(?::\*\*|\*\*\s*:)\s*(.*)$")
        .expect("valid user story field regex")
});

/// Any markdown checkbox line.
pub(crate) static CHECKBOX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*[-*]\s+\[([ xX])\]").expect("valid checkbox regex"));

pub(crate) static AC_ID: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"AC-[A-Za-z0-9]+(?:-[A-Za-z0-9]+)*").expect("valid AC id regex")
});

pub(crate) static STORY_ID: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"US-\d+").expect("valid story id regex"));

pub(crate) static AC_STORY_PREFIX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^AC-US(\d+)-").expect("valid AC story prefix regex"));
