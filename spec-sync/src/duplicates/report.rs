//! Markdown resolution report.

use chrono::{DateTime, Utc};
use std::fmt::Write as _;
use std::path::Path;

use super::resolve::{GroupResolution, MergeAction};

fn shown(path: &Path, root: &Path) -> String {
    path.strip_prefix(root)
        .unwrap_or(path)
        .to_string_lossy()
        .replace('\\', "/")
}

/// Render the report for one resolved group. Paths are shown relative to
/// `root` when they sit below it.
pub fn render_report(resolution: &GroupResolution, root: &Path, generated_at: DateTime<Utc>) -> String {
    let mut out = String::new();
    let mode = if resolution.dry_run { "dry-run" } else { "applied" };

    let _ = writeln!(out, "# Duplicate Resolution: {}\n", resolution.increment);
    let _ = writeln!(out, "- **Generated**: {}", generated_at.to_rfc3339());
    let _ = writeln!(out, "- **Mode**: {mode}\n");

    out.push_str("## Detected Duplicates\n\n");
    out.push_str("| Location | Path | Status | Last Activity | Files |\n");
    out.push_str("|---|---|---|---|---|\n");
    for copy in &resolution.copies {
        let activity = copy
            .last_activity
            .map_or_else(|| "-".to_string(), |at| at.to_rfc3339());
        let _ = writeln!(
            out,
            "| {} | `{}` | {} | {} | {} |",
            copy.location,
            shown(&copy.path, root),
            copy.status,
            activity,
            copy.file_count
        );
    }

    out.push_str("\n## Winner Selection\n\n");
    let _ = writeln!(out, "- **Winner**: `{}`", shown(&resolution.winner, root));
    let _ = writeln!(out, "- **Decided by**: {}", resolution.decided_by.as_str());
    for line in &resolution.explanation {
        let _ = writeln!(out, "- {line}");
    }
    for loser in &resolution.losers {
        let _ = writeln!(out, "- **Loser**: `{}`", shown(loser, root));
    }

    out.push_str("\n## Merged Paths\n\n");
    if resolution.merged.is_empty() {
        out.push_str("_None_\n");
    }
    for action in &resolution.merged {
        let _ = match action {
            MergeAction::Copy { from, to } => {
                writeln!(out, "- `{}` → `{}`", shown(from, root), shown(to, root))
            }
            MergeAction::CopyRenamed { from, to } => writeln!(
                out,
                "- `{}` → `{}` (renamed, content differs)",
                shown(from, root),
                shown(to, root)
            ),
            MergeAction::SkipIdentical { from } => {
                writeln!(out, "- `{}` skipped (identical)", shown(from, root))
            }
            MergeAction::MergeMetadata { from, added } => writeln!(
                out,
                "- `{}` merged into winner metadata ({})",
                shown(from, root),
                added.join(", ")
            ),
        };
    }

    out.push_str("\n## Deleted Paths\n\n");
    let verb = if resolution.dry_run { "would delete" } else { "deleted" };
    for path in &resolution.deleted {
        let _ = writeln!(out, "- `{}` ({verb})", shown(path, root));
    }

    if !resolution.errors.is_empty() {
        out.push_str("\n## Errors\n\n");
        out.push_str("Resolution of this group stopped; remaining steps were not applied.\n\n");
        for error in &resolution.errors {
            let _ = writeln!(out, "- {error}");
        }
    }
    out
}
