//! Tests for the 'list' command
//!
//! The list command displays all configured targets and their details.

use autobackup::config::resolve_all_targets;
use test_utils::ConfigBuilder;

#[test]
fn test_list_all_targets() {
    let config = ConfigBuilder::new()
        .add_target("docs")
        .add_target("photos")
        .add_target("music")
        .build();

    let resolved = resolve_all_targets(&config).unwrap();

    // Name order
    let names: Vec<_> = resolved.keys().cloned().collect();
    assert_eq!(names, vec!["docs", "music", "photos"]);
}

#[test]
fn test_list_shows_destinations() {
    let builder = ConfigBuilder::minimal();
    let extra = builder.temp_dir().join("usb");
    let config = builder.add_local_destination("docs", "usb", &extra).build();

    let resolved = resolve_all_targets(&config).unwrap();
    let ids: Vec<_> = resolved["docs"]
        .destinations
        .iter()
        .map(|d| d.id.as_str())
        .collect();

    // Upload order follows the configuration
    assert_eq!(ids, vec!["local", "usb"]);
}

#[test]
fn test_list_shows_schedule_and_retention() {
    let config = ConfigBuilder::minimal()
        .with_cron("docs", "30 3 * * 1")
        .with_keep_only("docs", 5)
        .build();

    let resolved = resolve_all_targets(&config).unwrap();
    let docs = &resolved["docs"].settings;

    assert_eq!(docs.cron.as_deref(), Some("30 3 * * 1"));
    assert_eq!(docs.keep_only, 5);
}

#[test]
fn test_list_target_without_destinations() {
    let builder = ConfigBuilder::new();
    let source = builder.temp_dir().join("src");
    let config = builder.add_target_at("bare", &source).build();

    let resolved = resolve_all_targets(&config).unwrap();
    assert!(resolved["bare"].destinations.is_empty());
}
