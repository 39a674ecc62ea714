//! Unit tests for artifact naming

use autobackup::archive::{ArchiveFormat, ArtifactNaming};
use chrono::{Local, TimeZone};
use rstest::rstest;

fn dated() -> ArtifactNaming {
    ArtifactNaming::new("docs", true, ArchiveFormat::TarGz)
}

#[test]
fn test_file_name_with_date_suffix() {
    let timestamp = Local.with_ymd_and_hms(2024, 3, 7, 4, 5, 6).unwrap();
    assert_eq!(dated().file_name(&timestamp), "docs_07032024_040506.tar.gz");
}

#[test]
fn test_file_name_without_date_suffix() {
    let naming = ArtifactNaming::new("docs", false, ArchiveFormat::TarGz);
    let timestamp = Local.with_ymd_and_hms(2024, 3, 7, 4, 5, 6).unwrap();
    assert_eq!(naming.file_name(&timestamp), "docs.tar.gz");
}

#[rstest]
#[case("tar.gz", ArchiveFormat::TarGz, ".tar.gz")]
#[case("tgz", ArchiveFormat::TarGz, ".tar.gz")]
#[case("compressed", ArchiveFormat::TarGz, ".tar.gz")]
#[case("zip", ArchiveFormat::Unknown, ".unknown")]
fn test_format_extension(
    #[case] format: &str,
    #[case] expected: ArchiveFormat,
    #[case] extension: &str,
) {
    let parsed = ArchiveFormat::parse(format);
    assert_eq!(parsed, expected);
    assert_eq!(parsed.extension(), extension);
}

#[rstest]
#[case("docs.tar.gz", false, true)]
#[case("docs_07032024_040506.tar.gz", true, false)]
#[case("backups/docs/docs_07032024_040506.tar.gz", true, false)]
#[case("backups/docs/docs.tar.gz", false, true)]
#[case("docs2.tar.gz", false, false)]
#[case("mydocs.tar.gz", false, false)]
#[case("docs_extra.tar.gz", false, false)]
#[case("docs_0703_040506.tar.gz", false, false)]
#[case("docs.tar.gz.partial", false, false)]
#[case("docs.zip", false, false)]
fn test_matches(#[case] name: &str, #[case] when_dated: bool, #[case] when_undated: bool) {
    assert_eq!(dated().matches(name), when_dated, "{}", name);
    let undated = ArtifactNaming::new("docs", false, ArchiveFormat::TarGz);
    assert_eq!(undated.matches(name), when_undated, "{}", name);
}

#[test]
fn test_target_names_with_regex_characters() {
    let naming = ArtifactNaming::new("a.b+c", false, ArchiveFormat::TarGz);
    assert!(naming.matches("a.b+c.tar.gz"));
    assert!(!naming.matches("aXb+c.tar.gz"));
}

#[test]
fn test_unknown_format_names() {
    let naming = ArtifactNaming::new("docs", false, ArchiveFormat::Unknown);
    assert!(naming.matches("docs.unknown"));
    assert!(!naming.matches("docs.tar.gz"));
}
