use chrono::{DateTime, Utc};
use std::cmp::Ordering;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use super::REPORTS_DIR;
use super::detect::{DuplicateGroup, IncrementCopy, detect_duplicates};
use super::report::render_report;
use crate::METADATA_FILE;
use crate::clock::{Clock, file_stamp};
use crate::config::{DuplicatesConfig, ProjectPaths};
use crate::error::Result;
use crate::lock::{LockMetadata, SweepLock};
use crate::metadata::IncrementMetadata;
use crate::store::FileStore;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ResolveOptions {
    /// Copy loser content into the winner before deleting
    pub merge: bool,
    /// Analyse and report only
    pub dry_run: bool,
}

impl From<&DuplicatesConfig> for ResolveOptions {
    fn from(config: &DuplicatesConfig) -> Self {
        Self {
            merge: config.merge,
            dry_run: config.dry_run,
        }
    }
}

/// The first criterion that separated the winner from the runner-up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecidedBy {
    Status,
    Recency,
    Completeness,
    Location,
    Path,
}

impl DecidedBy {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Status => "status",
            Self::Recency => "recency",
            Self::Completeness => "completeness",
            Self::Location => "location",
            Self::Path => "path",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WinnerSelection {
    /// Index into the group's copies
    pub winner: usize,
    pub decided_by: DecidedBy,
    /// One line per criterion on which the winner beat every other copy
    pub explanation: Vec<String>,
}

/// Planned content move from a loser into the winner.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MergeAction {
    Copy { from: PathBuf, to: PathBuf },
    /// Collision with different content; copied under a `.MERGED-` name
    CopyRenamed { from: PathBuf, to: PathBuf },
    /// Collision with identical content
    SkipIdentical { from: PathBuf },
    /// External links merged into the winner's `metadata.json`
    MergeMetadata { from: PathBuf, added: Vec<String> },
}

/// Outcome of one group. In dry-run, `merged` and `deleted` describe what
/// would have happened.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupResolution {
    pub increment: String,
    pub copies: Vec<IncrementCopy>,
    pub winner: PathBuf,
    pub losers: Vec<PathBuf>,
    pub decided_by: DecidedBy,
    pub explanation: Vec<String>,
    pub merged: Vec<MergeAction>,
    /// Losers deleted (or to be deleted)
    pub deleted: Vec<PathBuf>,
    pub errors: Vec<String>,
    pub dry_run: bool,
    pub report: String,
    pub report_path: Option<PathBuf>,
}

impl GroupResolution {
    /// Whether the group was left partially resolved.
    pub fn aborted(&self) -> bool {
        !self.errors.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SweepSummary {
    pub groups: Vec<GroupResolution>,
    pub timestamp: DateTime<Utc>,
    pub dry_run: bool,
}

impl SweepSummary {
    pub fn has_errors(&self) -> bool {
        self.groups.iter().any(GroupResolution::aborted)
    }
}

/// Status priority, then recency, then file count, then location, then
/// path. `Less` means `a` ranks ahead of `b`.
fn rank(a: &IncrementCopy, b: &IncrementCopy) -> (Ordering, DecidedBy) {
    let steps = [
        (b.status.priority().cmp(&a.status.priority()), DecidedBy::Status),
        (b.last_activity.cmp(&a.last_activity), DecidedBy::Recency),
        (b.file_count.cmp(&a.file_count), DecidedBy::Completeness),
        (b.location.priority().cmp(&a.location.priority()), DecidedBy::Location),
        (a.path.cmp(&b.path), DecidedBy::Path),
    ];
    steps
        .into_iter()
        .find(|(ordering, _)| ordering.is_ne())
        .unwrap_or((Ordering::Equal, DecidedBy::Path))
}

pub fn select_winner(group: &DuplicateGroup) -> WinnerSelection {
    let copies = &group.copies;
    let mut order: Vec<usize> = (0..copies.len()).collect();
    order.sort_by(|&a, &b| rank(&copies[a], &copies[b]).0);

    let winner = order.first().copied().unwrap_or(0);
    let decided_by = order
        .get(1)
        .map_or(DecidedBy::Path, |&runner_up| rank(&copies[winner], &copies[runner_up]).1);

    let best = &copies[winner];
    let others = || copies.iter().enumerate().filter(move |(i, _)| *i != winner).map(|(_, c)| c);
    let mut explanation = Vec::new();
    if others().all(|c| best.status.priority() > c.status.priority()) {
        explanation.push(format!("Higher status ({})", best.status));
    }
    if let Some(at) = best.last_activity
        && others().all(|c| best.last_activity > c.last_activity)
    {
        explanation.push(format!("Most recent activity ({})", at.to_rfc3339()));
    }
    if others().all(|c| best.file_count > c.file_count) {
        explanation.push(format!("Most complete ({} files)", best.file_count));
    }
    if explanation.is_empty() {
        explanation.push(match decided_by {
            DecidedBy::Path => "Tie on every criterion; first by path".to_string(),
            _ => format!("Preferred location ({})", best.location),
        });
    }

    WinnerSelection {
        winner,
        decided_by,
        explanation,
    }
}

/// `<stem>.MERGED-<stamp>.<ext>` beside `path`, with a counter when that
/// name is already taken.
fn merged_name(path: &Path, stamp: &str, taken: &dyn Fn(&Path) -> bool) -> PathBuf {
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_default();
    let ext = path
        .extension()
        .map(|e| format!(".{}", e.to_string_lossy()))
        .unwrap_or_default();
    let mut candidate = path.with_file_name(format!("{stem}.MERGED-{stamp}{ext}"));
    let mut n = 2;
    while taken(&candidate) {
        candidate = path.with_file_name(format!("{stem}.MERGED-{stamp}-{n}{ext}"));
        n += 1;
    }
    candidate
}

struct MergePlan {
    actions: Vec<MergeAction>,
    metadata: Option<IncrementMetadata>,
}

/// Work out every move from `losers` into `winner` without touching
/// anything.
fn plan_merge(
    store: &dyn FileStore,
    winner: &Path,
    losers: &[&IncrementCopy],
    stamp: &str,
) -> Result<MergePlan> {
    let existing: BTreeSet<PathBuf> = store
        .list_files_recursive(winner)?
        .into_iter()
        .map(|rel| winner.join(rel))
        .collect();
    let mut planned: BTreeSet<PathBuf> = BTreeSet::new();
    let mut actions = Vec::new();
    let mut metadata = IncrementMetadata::load(store, winner).ok().flatten();
    let mut metadata_changed = false;

    for loser in losers {
        for rel in store.list_files_recursive(&loser.path)? {
            let from = loser.path.join(&rel);
            let to = winner.join(&rel);
            if !existing.contains(&to) && !planned.contains(&to) {
                planned.insert(to.clone());
                actions.push(MergeAction::Copy { from, to });
                continue;
            }

            if rel == Path::new(METADATA_FILE)
                && let Some(winner_meta) = metadata.as_mut()
                && let Ok(Some(loser_meta)) = IncrementMetadata::load(store, &loser.path)
            {
                let added = winner_meta.merge_external_links(&loser_meta);
                if added.is_empty() {
                    actions.push(MergeAction::SkipIdentical { from });
                } else {
                    metadata_changed = true;
                    actions.push(MergeAction::MergeMetadata { from, added });
                }
                continue;
            }

            let same = existing.contains(&to) && store.read_bytes(&from)? == store.read_bytes(&to)?;
            if same {
                actions.push(MergeAction::SkipIdentical { from });
                continue;
            }
            let renamed = merged_name(&to, stamp, &|p: &Path| {
                existing.contains(p) || planned.contains(p)
            });
            planned.insert(renamed.clone());
            actions.push(MergeAction::CopyRenamed { from, to: renamed });
        }
    }

    Ok(MergePlan {
        actions,
        metadata: metadata.filter(|_| metadata_changed),
    })
}

fn apply_merge(store: &dyn FileStore, winner: &Path, plan: &MergePlan) -> Result<()> {
    for action in &plan.actions {
        match action {
            MergeAction::Copy { from, to } | MergeAction::CopyRenamed { from, to } => {
                store.copy_file(from, to)?;
            }
            MergeAction::SkipIdentical { .. } | MergeAction::MergeMetadata { .. } => {}
        }
    }
    if let Some(metadata) = &plan.metadata {
        metadata.save(store, winner)?;
    }
    Ok(())
}

/// Resolve one group. Never fails: errors are recorded on the result and
/// stop further mutation of this group only.
pub fn resolve_group(
    store: &dyn FileStore,
    clock: &dyn Clock,
    paths: &ProjectPaths,
    group: &DuplicateGroup,
    options: ResolveOptions,
) -> GroupResolution {
    let selection = select_winner(group);
    let now = clock.now();
    let stamp = file_stamp(now);
    let winner = &group.copies[selection.winner];
    let losers: Vec<&IncrementCopy> = group
        .copies
        .iter()
        .enumerate()
        .filter(|(i, _)| *i != selection.winner)
        .map(|(_, c)| c)
        .collect();

    let mut resolution = GroupResolution {
        increment: group.key(),
        copies: group.copies.clone(),
        winner: winner.path.clone(),
        losers: losers.iter().map(|c| c.path.clone()).collect(),
        decided_by: selection.decided_by,
        explanation: selection.explanation,
        merged: Vec::new(),
        deleted: losers.iter().map(|c| c.path.clone()).collect(),
        errors: Vec::new(),
        dry_run: options.dry_run,
        report: String::new(),
        report_path: None,
    };

    let plan = if options.merge {
        match plan_merge(store, &winner.path, &losers, &stamp) {
            Ok(plan) => Some(plan),
            Err(e) => {
                resolution.errors.push(format!("merge planning failed: {e}"));
                None
            }
        }
    } else {
        None
    };
    if let Some(plan) = &plan {
        resolution.merged = plan.actions.clone();
    }

    if !options.dry_run && resolution.errors.is_empty() {
        if let Some(plan) = &plan
            && let Err(e) = apply_merge(store, &winner.path, plan)
        {
            resolution.errors.push(format!("merge failed: {e}"));
        }
        if resolution.errors.is_empty() {
            for loser in &losers {
                if let Err(e) = store.remove_dir_all(&loser.path) {
                    tracing::warn!(
                        increment = %resolution.increment,
                        path = %loser.path.display(),
                        error = %e,
                        "Failed to delete duplicate"
                    );
                    resolution.errors.push(e.to_string());
                    break;
                }
            }
        }
    }

    resolution.report = render_report(&resolution, &paths.root, now);
    if !options.dry_run {
        let report_path = winner
            .path
            .join(REPORTS_DIR)
            .join(format!("DUPLICATE-RESOLUTION-{stamp}.md"));
        match store.write_text_atomic(&report_path, &resolution.report) {
            Ok(()) => resolution.report_path = Some(report_path),
            Err(e) => {
                tracing::warn!(path = %report_path.display(), error = %e, "Failed to write resolution report");
            }
        }
    }

    tracing::info!(
        increment = %resolution.increment,
        winner = %resolution.winner.display(),
        decided_by = resolution.decided_by.as_str(),
        losers = resolution.losers.len(),
        errors = resolution.errors.len(),
        dry_run = options.dry_run,
        "Duplicate group resolved"
    );
    resolution
}

/// Detect and resolve every duplicate group under the storage roots.
/// Assumes no sync pass runs concurrently; see [`resolve_all_locked`].
pub fn resolve_all(
    store: &dyn FileStore,
    clock: &dyn Clock,
    paths: &ProjectPaths,
    options: ResolveOptions,
) -> Result<SweepSummary> {
    crate::measure_time!("resolve_duplicates", {
        let groups = detect_duplicates(store, paths)?;
        let resolved: Vec<GroupResolution> = groups
            .iter()
            .map(|group| resolve_group(store, clock, paths, group, options))
            .collect();
        Ok(SweepSummary {
            groups: resolved,
            timestamp: clock.now(),
            dry_run: options.dry_run,
        })
    })
}

/// [`resolve_all`] under the sweep lock at `<increments>/.duplicate-resolver.lock`.
/// The lock is an advisory file lock, so `paths` must be on the local
/// filesystem.
pub fn resolve_all_locked(
    store: &dyn FileStore,
    clock: &dyn Clock,
    paths: &ProjectPaths,
    options: ResolveOptions,
) -> Result<SweepSummary> {
    let _lock = SweepLock::acquire(
        &paths.increments,
        LockMetadata::current("resolve_duplicates", clock),
    )?;
    resolve_all(store, clock, paths, options)
}
