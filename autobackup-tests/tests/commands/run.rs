//! Tests for the 'run' command
//!
//! The run command archives a target once and delivers the artifact to
//! every ready destination, pruning old artifacts afterwards.

use autobackup::managers::target::{DestinationOutcome, PruneOutcome};
use autobackup::utils::locker::TargetLock;
use test_utils::{
    archive_contents, archive_entries, dir_listing, sample_tree, seed_artifact, write_file,
    ConfigBuilder, TestContext, SAMPLE_FILES,
};

#[test]
fn test_run_round_trip() {
    let ctx = TestContext::with_minimal_config();
    sample_tree(&ctx.source("docs"));

    let report = ctx.manager().backup_target("docs").unwrap();
    assert!(report.is_success(), "{:?}", report.failures());
    assert_eq!(report.artifact, "docs.tar.gz");
    assert_eq!(report.uploaded(), vec!["local"]);

    let contents = archive_contents(&ctx.backups("docs").join("docs.tar.gz"));
    let expected: Vec<&str> = SAMPLE_FILES
        .iter()
        .copied()
        .filter(|name| !name.starts_with(".git/"))
        .collect();

    assert_eq!(contents.keys().map(String::as_str).collect::<Vec<_>>(), expected);
    for (name, data) in &contents {
        assert_eq!(data.as_slice(), name.as_bytes());
    }
    assert_eq!(report.file_count, expected.len());
}

#[test]
fn test_run_excludes_configured_directories() {
    let ctx = TestContext::from_builder(
        ConfigBuilder::minimal().with_exclude_dirs("docs", &["logs"]),
    );
    sample_tree(&ctx.source("docs"));

    ctx.manager().backup_target("docs").unwrap();

    let entries = archive_entries(&ctx.backups("docs").join("docs.tar.gz"));
    assert!(entries.iter().all(|e| !format!("/{}", e).contains("/logs/")));
    assert!(entries.contains(&"logsarchive/2023.log".to_string()));
    assert!(entries.contains(&"readme.txt".to_string()));
}

#[test]
fn test_run_includes_vcs_when_asked() {
    let ctx = TestContext::from_builder(ConfigBuilder::minimal().with_vcs_included("docs"));
    sample_tree(&ctx.source("docs"));

    ctx.manager().backup_target("docs").unwrap();

    let entries = archive_entries(&ctx.backups("docs").join("docs.tar.gz"));
    assert!(entries.contains(&".git/HEAD".to_string()));
    assert_eq!(entries.len(), SAMPLE_FILES.len());
}

#[test]
fn test_run_absolute_hierarchy() {
    let ctx = TestContext::from_builder(ConfigBuilder::minimal().with_absolute_hierarchy("docs"));
    let source = ctx.source("docs");
    write_file(&source, "readme.txt", "hello");

    ctx.manager().backup_target("docs").unwrap();

    let entries = archive_entries(&ctx.backups("docs").join("docs.tar.gz"));
    let absolute = std::path::absolute(source.join("readme.txt")).unwrap();
    assert_eq!(entries, vec![absolute.to_string_lossy().into_owned()]);
}

#[test]
fn test_run_keeps_newest_artifacts() {
    let ctx = TestContext::from_builder(
        ConfigBuilder::minimal()
            .with_date_suffix("docs")
            .with_keep_only("docs", 2),
    );
    write_file(&ctx.source("docs"), "a.txt", "a");

    let backups = ctx.backups("docs");
    seed_artifact(&backups, "docs_01012024_000000.tar.gz", 3);
    seed_artifact(&backups, "docs_02012024_000000.tar.gz", 2);
    seed_artifact(&backups, "docs_03012024_000000.tar.gz", 1);
    // Not an artifact of this target, never pruned
    seed_artifact(&backups, "notes.txt", 10);

    let report = ctx.manager().backup_target("docs").unwrap();
    assert!(report.is_success(), "{:?}", report.failures());

    match &report.destinations[0].outcome {
        DestinationOutcome::Uploaded {
            prune: PruneOutcome::Pruned { deleted },
        } => assert_eq!(deleted.len(), 2),
        other => panic!("unexpected outcome: {:?}", other),
    }

    let mut expected = vec![
        "docs_03012024_000000.tar.gz".to_string(),
        report.artifact.clone(),
        "notes.txt".to_string(),
    ];
    expected.sort();
    assert_eq!(dir_listing(&backups), expected);
}

#[test]
fn test_run_retention_ignores_other_naming_form() {
    let ctx = TestContext::from_builder(
        ConfigBuilder::minimal()
            .with_date_suffix("docs")
            .with_keep_only("docs", 1),
    );
    write_file(&ctx.source("docs"), "a.txt", "a");

    let backups = ctx.backups("docs");
    // Undated name, written by hand or before date_suffix was enabled
    seed_artifact(&backups, "docs.tar.gz", 30);
    seed_artifact(&backups, "docs_01012024_000000.tar.gz", 3);

    let report = ctx.manager().backup_target("docs").unwrap();
    assert!(report.is_success(), "{:?}", report.failures());

    let mut expected = vec!["docs.tar.gz".to_string(), report.artifact.clone()];
    expected.sort();
    assert_eq!(dir_listing(&backups), expected);
}

#[test]
fn test_run_without_retention_keeps_everything() {
    let ctx = TestContext::from_builder(ConfigBuilder::minimal().with_date_suffix("docs"));
    write_file(&ctx.source("docs"), "a.txt", "a");

    let backups = ctx.backups("docs");
    seed_artifact(&backups, "docs_01012024_000000.tar.gz", 3);
    seed_artifact(&backups, "docs_02012024_000000.tar.gz", 2);

    let report = ctx.manager().backup_target("docs").unwrap();
    assert!(matches!(
        report.destinations[0].outcome,
        DestinationOutcome::Uploaded {
            prune: PruneOutcome::Skipped
        }
    ));
    assert_eq!(dir_listing(&backups).len(), 3);
}

#[test]
fn test_run_with_unready_destination() {
    let builder = ConfigBuilder::minimal();
    // A directory cannot be created below a regular file
    let blocker = builder.temp_dir().join("blocker");
    std::fs::write(&blocker, "not a directory").unwrap();
    let ctx = TestContext::from_builder(builder.add_local_destination(
        "docs",
        "broken",
        &blocker.join("backups"),
    ));
    write_file(&ctx.source("docs"), "a.txt", "a");

    let mut manager = ctx.manager();
    let report = manager.backup_target("docs").unwrap();

    assert_eq!(report.excluded, vec!["broken".to_string()]);
    assert_eq!(report.uploaded(), vec!["local"]);
    assert!(!report.is_success());
    assert!(ctx.backups("docs").join("docs.tar.gz").exists());

    assert!(manager.backup_target_strict("docs").is_err());
}

#[test]
fn test_run_cleans_work_directory() {
    let ctx = TestContext::with_minimal_config();
    sample_tree(&ctx.source("docs"));

    ctx.manager().backup_target("docs").unwrap();

    assert!(dir_listing(&ctx.temp_dir().join("work")).is_empty());
}

#[test]
fn test_run_missing_source_aborts() {
    let builder = ConfigBuilder::new();
    let missing = builder.temp_dir().join("does-not-exist");
    let backups = builder.temp_dir().join("backups").join("ghost");
    let ctx = TestContext::from_builder(
        builder
            .add_target_at("ghost", &missing)
            .add_local_destination("ghost", "local", &backups),
    );

    assert!(ctx.manager().backup_target("ghost").is_err());
    assert!(dir_listing(&backups).is_empty());
    assert!(dir_listing(&ctx.temp_dir().join("work")).is_empty());
}

#[test]
fn test_run_refuses_when_locked() {
    let ctx = TestContext::with_minimal_config();
    write_file(&ctx.source("docs"), "a.txt", "a");

    let mut lock = TargetLock::open(&ctx.temp_dir().join("locks"), "docs").unwrap();
    let guard = lock.try_acquire().unwrap();

    let mut manager = ctx.manager();
    assert!(manager.backup_target("docs").is_err());

    drop(guard);
    assert!(manager.backup_target("docs").unwrap().is_success());
}

#[test]
fn test_run_all_reports_failed_targets() {
    let builder = ConfigBuilder::minimal();
    let missing = builder.temp_dir().join("does-not-exist");
    let backups = builder.temp_dir().join("backups").join("ghost");
    let ctx = TestContext::from_builder(
        builder
            .add_target_at("ghost", &missing)
            .add_local_destination("ghost", "local", &backups),
    );
    write_file(&ctx.source("docs"), "a.txt", "a");

    let err = ctx.manager().backup_all().unwrap_err();
    let message = format!("{:#}", err);
    assert!(message.contains("1 target(s) failed"), "{}", message);
    assert!(message.contains("ghost"), "{}", message);

    // The healthy target still ran
    assert!(ctx.backups("docs").join("docs.tar.gz").exists());
}
