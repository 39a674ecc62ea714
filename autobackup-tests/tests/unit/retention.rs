//! Unit tests for retention selection

use rstest::rstest;
use test_utils::{backup_item, BackupItem, RetentionPolicy};

fn names(items: &[BackupItem]) -> Vec<&str> {
    items.iter().map(|i| i.name.as_str()).collect()
}

fn sample() -> Vec<BackupItem> {
    // Listing order deliberately differs from age order
    vec![
        backup_item("day3", 1),
        backup_item("day1", 3),
        backup_item("day4", 0),
        backup_item("day2", 2),
    ]
}

#[rstest]
#[case(1, vec!["day1", "day2", "day3"])]
#[case(2, vec!["day1", "day2"])]
#[case(3, vec!["day1"])]
#[case(4, vec![])]
#[case(10, vec![])]
fn test_select_oldest(#[case] keep: i64, #[case] expected: Vec<&str>) {
    let policy = RetentionPolicy::new(keep);
    assert_eq!(names(&policy.select_for_deletion(&sample())), expected);
}

#[rstest]
#[case(0)]
#[case(-1)]
#[case(-100)]
fn test_disabled_policy(#[case] keep: i64) {
    let policy = RetentionPolicy::new(keep);
    assert!(!policy.is_enabled());
    assert!(policy.select_for_deletion(&sample()).is_empty());
}

#[test]
fn test_empty_listing() {
    assert!(RetentionPolicy::new(3).select_for_deletion(&[]).is_empty());
}

#[test]
fn test_equal_timestamps_keep_listing_order() {
    let items = vec![
        backup_item("first", 1),
        backup_item("second", 1),
        backup_item("third", 1),
    ];
    let doomed = RetentionPolicy::new(1).select_for_deletion(&items);
    assert_eq!(names(&doomed), vec!["first", "second"]);
}
