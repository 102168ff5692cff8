//! Allocator and duplicate sweeps on a real directory tree.

use chrono::{TimeZone, Utc};
use pretty_assertions::assert_eq;
use speckit_sync::allocator::{
    AllocationStrategy, ExternalWorkItem, FeatureSnapshot, allocate, create_feature_folder,
};
use speckit_sync::config::{LayoutConfig, ProjectPaths};
use speckit_sync::duplicates::{ResolveOptions, resolve_all, resolve_all_locked};
use speckit_sync::lock::{LockMetadata, SWEEP_LOCK_FILE, SweepLock};
use speckit_sync::{LocalFileStore, MockClock, SyncError};
use std::path::Path;
use tempfile::TempDir;

fn write(path: &Path, text: &str) {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).expect("create parent");
    }
    std::fs::write(path, text).expect("write file");
}

fn project() -> (TempDir, ProjectPaths) {
    let dir = TempDir::new().expect("temp dir");
    let paths = LayoutConfig::default().resolve(dir.path());
    (dir, paths)
}

#[test]
fn imported_items_fill_gaps_then_append() {
    let (_dir, paths) = project();
    let store = LocalFileStore::new();
    let clock = MockClock::fixed();
    write(
        &paths.features.join("FS-010/FEATURE.md"),
        "---\nid: FS-010\ncreated: 2025-01-10\n---\n# Search\n",
    );
    write(
        &paths.features_archive.join("FS-020-export/README.md"),
        "---\nid: FS-020\ncreatedAt: 2025-01-20\n---\n# Export\n",
    );

    let early = ExternalWorkItem {
        external_id: "GH-#15".to_string(),
        title: "Saved filters".to_string(),
        created_at: Utc.with_ymd_and_hms(2025, 1, 15, 0, 0, 0).unwrap(),
        external_url: Some("https://tracker.example/15".to_string()),
    };
    let first = allocate(&store, &paths, &early).expect("allocate");
    assert_eq!(first.id.to_string(), "FS-011E");
    assert_eq!(first.strategy, AllocationStrategy::ChronologicalInsert);
    create_feature_folder(&store, &paths, first.id, &early, &clock).expect("create folder");

    let late = ExternalWorkItem {
        external_id: "GH-#30".to_string(),
        created_at: Utc.with_ymd_and_hms(2025, 1, 30, 0, 0, 0).unwrap(),
        ..early.clone()
    };
    let second = allocate(&store, &paths, &late).expect("allocate");
    assert_eq!(second.id.to_string(), "FS-021E");
    assert_eq!(second.strategy, AllocationStrategy::Append);

    let repeat = allocate(&store, &paths, &early).expect("allocate");
    assert_eq!(repeat.strategy, AllocationStrategy::Existing);
    assert_eq!(repeat.id, first.id);

    let stats = FeatureSnapshot::scan(&store, &paths).expect("scan").stats();
    assert_eq!((stats.total, stats.archived, stats.external), (3, 1, 1));
    assert_eq!(stats.max_number, 20);
}

fn seed_duplicates(paths: &ProjectPaths) {
    let winner = paths.increments.join("0004-export");
    let loser = paths.archived.join("0004-export");
    write(
        &winner.join("metadata.json"),
        "{\"status\": \"active\", \"lastActivity\": \"2025-02-01T00:00:00Z\"}\n",
    );
    write(&winner.join("spec.md"), "# Export v2\n");
    write(
        &loser.join("metadata.json"),
        "{\"status\": \"completed\", \"lastActivity\": \"2025-03-01T00:00:00Z\", \"jira\": {\"key\": \"EXP-4\"}}\n",
    );
    write(&loser.join("spec.md"), "# Export v1\n");
    write(&loser.join("reports/qa.md"), "QA notes\n");
}

#[test]
fn locked_sweep_merges_and_deletes_losers() {
    let (dir, paths) = project();
    let store = LocalFileStore::new();
    let clock = MockClock::fixed();
    seed_duplicates(&paths);

    let summary = resolve_all_locked(
        &store,
        &clock,
        &paths,
        ResolveOptions {
            merge: true,
            dry_run: false,
        },
    )
    .expect("sweep");
    assert_eq!(summary.groups.len(), 1);
    let group = &summary.groups[0];
    assert!(!group.aborted());
    assert_eq!(group.winner, paths.increments.join("0004-export"));

    let winner = paths.increments.join("0004-export");
    assert!(!paths.archived.join("0004-export").exists());
    assert_eq!(
        std::fs::read_to_string(winner.join("spec.md")).expect("spec"),
        "# Export v2\n"
    );
    assert_eq!(
        std::fs::read_to_string(winner.join("spec.MERGED-20260115T120000Z.md")).expect("merged"),
        "# Export v1\n"
    );
    assert!(winner.join("reports/qa.md").exists());
    assert!(
        std::fs::read_to_string(winner.join("metadata.json"))
            .expect("metadata")
            .contains("EXP-4")
    );

    let report = winner.join("reports/DUPLICATE-RESOLUTION-20260115T120000Z.md");
    let text = std::fs::read_to_string(report).expect("report");
    assert!(text.contains("Higher status (active)"));
    assert!(text.contains("(deleted)"));

    assert!(!dir.path().join("increments").join(SWEEP_LOCK_FILE).exists());
}

#[test]
fn dry_run_sweep_leaves_tree_untouched() {
    let (_dir, paths) = project();
    let store = LocalFileStore::new();
    let clock = MockClock::fixed();
    seed_duplicates(&paths);

    let summary = resolve_all(
        &store,
        &clock,
        &paths,
        ResolveOptions {
            merge: true,
            dry_run: true,
        },
    )
    .expect("sweep");
    let group = &summary.groups[0];
    assert_eq!(group.deleted, vec![paths.archived.join("0004-export")]);
    assert!(group.report.contains("(would delete)"));
    assert!(paths.archived.join("0004-export/spec.md").exists());
    assert!(!paths.increments.join("0004-export/reports").exists());
    assert!(
        !paths
            .increments
            .join("0004-export/spec.MERGED-20260115T120000Z.md")
            .exists()
    );
}

#[test]
fn concurrent_sweep_is_refused() {
    let (_dir, paths) = project();
    let store = LocalFileStore::new();
    let clock = MockClock::fixed();
    seed_duplicates(&paths);

    let held = SweepLock::acquire(
        &paths.increments,
        LockMetadata::current("manual_repair", &clock),
    )
    .expect("first lock");

    let err = resolve_all_locked(&store, &clock, &paths, ResolveOptions::default())
        .expect_err("second sweep must fail");
    match err {
        SyncError::Locked { holder, .. } => assert!(holder.contains("manual_repair")),
        other => panic!("unexpected error: {other}"),
    }
    assert!(paths.archived.join("0004-export").exists());
    drop(held);

    resolve_all_locked(&store, &clock, &paths, ResolveOptions::default()).expect("sweep after release");
    assert!(!paths.archived.join("0004-export").exists());
}
