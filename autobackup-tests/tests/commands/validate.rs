//! Tests for the 'validate' command
//!
//! The validate command checks configuration file syntax and validity.

use autobackup::config::{load_config, resolve_all_targets, ConfigError};
use test_utils::{minimal_config_toml, ConfigBuilder, TestContext};

#[test]
fn test_validate_valid_config() {
    let ctx = TestContext::with_minimal_config();

    let result = load_config(ctx.config_path().unwrap());
    assert!(result.is_ok(), "Valid config should pass validation");

    let loaded = result.unwrap();
    assert_eq!(loaded.targets.len(), 1);
    assert_eq!(resolve_all_targets(&loaded).unwrap()["docs"].destinations.len(), 1);
}

#[test]
fn test_validate_multiple_targets() {
    let ctx = TestContext::from_builder(
        ConfigBuilder::new()
            .add_target("docs")
            .add_target("photos")
            .add_target("music"),
    );

    let loaded = load_config(ctx.config_path().unwrap()).unwrap();
    assert_eq!(loaded.targets.len(), 3);
}

#[test]
fn test_validate_template() {
    let ctx = TestContext::new();
    let content = minimal_config_toml()
        .replace("{log_dir}", "/tmp/autobackup/logs")
        .replace("{lock_dir}", "/tmp/autobackup/locks")
        .replace("{source}", "/srv/docs")
        .replace("{backup_path}", "/mnt/backups");
    let path = ctx.create_file("config.toml", &content);

    let loaded = load_config(&path).unwrap();
    assert_eq!(loaded.targets["docs"].path.to_str(), Some("/srv/docs"));
}

#[test]
fn test_validate_invalid_toml() {
    let ctx = TestContext::new();
    let config_path = ctx.create_file("config.toml", "invalid { toml content");

    let result = load_config(&config_path);
    assert!(matches!(result, Err(ConfigError::ParseError(_))));
}

#[test]
fn test_validate_missing_path() {
    let ctx = TestContext::new();
    let config_path = ctx.create_file(
        "config.toml",
        r#"
[targets.docs]
destinations = []
"#,
    );

    let result = load_config(&config_path);
    assert!(result.is_err(), "A target without a path should fail");
}

#[test]
fn test_validate_destination_without_block() {
    let ctx = TestContext::new();
    let config_path = ctx.create_file(
        "config.toml",
        r#"
[targets.docs]
path = "/srv/docs"
destinations = ["nas"]
"#,
    );

    let err = load_config(&config_path).unwrap_err();
    assert!(err.to_string().contains("nas"));
    assert!(matches!(err, ConfigError::MissingDestinationBlock { .. }));
}

#[test]
fn test_validate_empty_config() {
    let ctx = TestContext::new();
    let config_path = ctx.create_file("config.toml", "");

    let result = load_config(&config_path);
    assert!(result.is_err(), "A config without targets should fail");
}
