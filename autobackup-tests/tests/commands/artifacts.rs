//! Tests for the 'artifacts' command
//!
//! The artifacts command lists the artifacts of a target held by each of
//! its destinations.

use test_utils::{seed_artifact, write_file, ConfigBuilder, TestContext};

#[test]
fn test_artifacts_after_run() {
    let ctx = TestContext::with_minimal_config();
    write_file(&ctx.source("docs"), "a.txt", "a");

    let mut manager = ctx.manager();
    manager.backup_target("docs").unwrap();

    let listings = manager.target_mut("docs").unwrap().list_artifacts(None);
    assert_eq!(listings.len(), 1);

    let (id, items) = &listings[0];
    assert_eq!(id, "local");
    let items = items.as_ref().unwrap();
    assert_eq!(items.len(), 1);
    assert!(items[0].name.ends_with("docs.tar.gz"));
}

#[test]
fn test_artifacts_ignore_foreign_files() {
    let ctx = TestContext::with_minimal_config();
    let backups = ctx.backups("docs");
    seed_artifact(&backups, "docs.tar.gz", 2);
    // Dated names belong to targets with date_suffix set
    seed_artifact(&backups, "docs_01012024_000000.tar.gz", 2);
    seed_artifact(&backups, "docs2.tar.gz", 2);
    seed_artifact(&backups, "readme.md", 2);
    // Only direct children count
    seed_artifact(&backups.join("nested"), "docs.tar.gz", 3);

    let mut manager = ctx.manager();
    let listings = manager.target_mut("docs").unwrap().list_artifacts(None);
    let items = listings[0].1.as_ref().unwrap();

    assert_eq!(items.len(), 1);
    assert!(items[0].name.ends_with("/docs.tar.gz"));
    assert!(!items[0].name.contains("nested"));
}

#[test]
fn test_artifacts_destination_filter() {
    let builder = ConfigBuilder::minimal();
    let usb = builder.temp_dir().join("usb");
    let ctx = TestContext::from_builder(builder.add_local_destination("docs", "usb", &usb));
    seed_artifact(&usb, "docs.tar.gz", 1);

    let mut manager = ctx.manager();
    let listings = manager.target_mut("docs").unwrap().list_artifacts(Some("usb"));

    assert_eq!(listings.len(), 1);
    assert_eq!(listings[0].0, "usb");
    assert_eq!(listings[0].1.as_ref().unwrap().len(), 1);
}

#[test]
fn test_artifacts_unready_destination_reports_error() {
    let builder = ConfigBuilder::minimal();
    let blocker = builder.temp_dir().join("blocker");
    std::fs::write(&blocker, "file").unwrap();
    let ctx = TestContext::from_builder(builder.add_local_destination(
        "docs",
        "broken",
        &blocker.join("sub"),
    ));

    let mut manager = ctx.manager();
    let listings = manager.target_mut("docs").unwrap().list_artifacts(None);

    assert_eq!(listings.len(), 2);
    assert!(listings[0].1.is_ok());
    assert!(listings[1].1.is_err());
}
