//! Unit tests for configuration loading and validation
//!
//! These tests verify config parsing, validation, and target resolution.

use autobackup::config::{
    load_config, parse_config, resolve_all_targets, resolve_named_target, ConfigError,
    DestinationConfig, DestinationKind,
};
use rstest::rstest;
use test_utils::{multi_target_config_toml, ConfigBuilder, ResultAssertions, TestContext};

#[test]
fn test_config_loading_valid() {
    let ctx = TestContext::from_builder(ConfigBuilder::minimal().add_target("photos"));

    let loaded = load_config(ctx.config_path().unwrap());
    assert!(loaded.is_ok(), "Config should load successfully: {:?}", loaded.err());

    let loaded = loaded.unwrap();
    assert!(loaded.targets.contains_key("docs"));
    assert!(loaded.targets.contains_key("photos"));
}

#[test]
fn test_config_loading_missing_file() {
    let ctx = TestContext::new();
    let result = load_config(ctx.temp_dir().join("missing.toml"));
    assert!(matches!(result, Err(ConfigError::ReadError(_))));
}

#[test]
fn test_multi_target_resolution() {
    let config = parse_config(multi_target_config_toml()).unwrap();
    let resolved = resolve_all_targets(&config).unwrap();

    let docs = &resolved["docs"];
    assert_eq!(docs.settings.keep_only, 7);
    assert!(docs.settings.date_suffix);
    assert_eq!(docs.settings.cron.as_deref(), Some("0 2 * * *"));

    let kinds: Vec<_> = docs.destinations.iter().map(|d| d.config.kind()).collect();
    assert_eq!(kinds, vec![DestinationKind::Local, DestinationKind::S3]);

    match &resolved["photos"].destinations[0].config {
        DestinationConfig::Gcs(params) => {
            assert_eq!(params.bucket, "photo-archive");
            assert_eq!(params.folder, "");
            assert!(params.credentials.is_none());
        }
        other => panic!("expected GCS destination, got {:?}", other),
    }
}

#[test]
fn test_resolve_unknown_target() {
    let config = parse_config(multi_target_config_toml()).unwrap();
    resolve_named_target(&config, "music").assert_err_contains("music");
}

#[rstest]
#[case("local", DestinationKind::Local)]
#[case("s3", DestinationKind::S3)]
#[case("aws", DestinationKind::S3)]
#[case("gcs", DestinationKind::Gcs)]
#[case("gcp", DestinationKind::Gcs)]
#[case("GCP", DestinationKind::Gcs)]
fn test_destination_kind_aliases(#[case] name: &str, #[case] expected: DestinationKind) {
    assert_eq!(DestinationKind::parse(name), Some(expected));
}

#[rstest]
#[case("ftp")]
#[case("")]
#[case("azure")]
fn test_destination_kind_unknown(#[case] name: &str) {
    assert_eq!(DestinationKind::parse(name), None);
}

#[rstest]
#[case::unknown_local_key(
    r#"
[targets.docs]
path = "/srv/docs"
destinations = ["local"]

[targets.docs.local]
directory = "/backups"
bucket = "oops"
"#
)]
#[case::missing_bucket(
    r#"
[targets.docs]
path = "/srv/docs"
destinations = ["s3"]

[targets.docs.s3]
folder = "docs"
"#
)]
fn test_invalid_destination_parameters(#[case] toml: &str) {
    let err = parse_config(toml).unwrap_err();
    assert!(
        matches!(err, ConfigError::InvalidDestination { .. }),
        "unexpected error: {}",
        err
    );
}

#[rstest]
#[case::slash_in_name("[targets.\"a/b\"]\npath = \"/srv\"\n")]
#[case::empty_path("[targets.docs]\npath = \"\"\n")]
#[case::bad_cron("[targets.docs]\npath = \"/srv\"\ncron = \"every day\"\n")]
#[case::duplicate_destination(
    "[targets.docs]\npath = \"/srv\"\ndestinations = [\"local\", \"local\"]\n[targets.docs.local]\ndirectory = \"/b\"\n"
)]
fn test_validation_errors(#[case] toml: &str) {
    let err = parse_config(toml).unwrap_err();
    assert!(
        matches!(err, ConfigError::ValidationError(_)),
        "unexpected error: {}",
        err
    );
}

#[test]
fn test_unused_destination_block_is_accepted() {
    let config = parse_config(
        r#"
[targets.docs]
path = "/srv/docs"
destinations = []

[targets.docs.local]
directory = "/backups"
"#,
    )
    .unwrap();

    let resolved = resolve_named_target(&config, "docs").unwrap();
    assert!(resolved.destinations.is_empty());
}

#[test]
fn test_global_defaults() {
    let config = parse_config(multi_target_config_toml()).unwrap();
    assert_eq!(config.global.log_level, "info");
    assert_eq!(config.global.log_max_files, 10);
    assert!(config.global.temp_directory.is_none());
}
