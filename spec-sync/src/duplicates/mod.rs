//! Duplicate increment detection and resolution
//!
//! An increment can end up stored more than once: a copy under the primary
//! root and another under `_archive` or `_abandoned`, usually after an
//! interrupted move. A sweep groups folders by their leading four-digit
//! number, keeps one winner per group, optionally merges loser content into
//! it, and deletes the losers. Every group produces a markdown report.
//!
//! A failure inside one group never stops the others.

mod detect;
mod report;
mod resolve;

pub use detect::{DuplicateGroup, IncrementCopy, detect_duplicates, increment_number};
pub use report::render_report;
pub use resolve::{
    DecidedBy, GroupResolution, MergeAction, ResolveOptions, SweepSummary, WinnerSelection,
    resolve_all, resolve_all_locked, resolve_group, select_winner,
};

/// Folder under the winner that receives resolution reports.
pub const REPORTS_DIR: &str = "reports";
