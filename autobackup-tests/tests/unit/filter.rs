//! Unit tests for path filtering

use autobackup::archive::{PathFilter, VCS_DIRS};
use rstest::rstest;
use std::path::Path;

fn excludes(dirs: &[&str]) -> Vec<String> {
    dirs.iter().map(|d| d.to_string()).collect()
}

#[rstest]
#[case("/srv/docs/.git/HEAD")]
#[case("/srv/docs/sub/.hg/store")]
#[case("/srv/docs/.svn/entries")]
#[case("/srv/docs/.bzr/branch")]
#[case("/srv/docs/_darcs/patches")]
#[case("/srv/docs/CVS/Root")]
fn test_vcs_metadata_excluded(#[case] path: &str) {
    let filter = PathFilter::new(true, &[]);
    assert!(!filter.includes(Path::new(path)));

    let permissive = PathFilter::new(false, &[]);
    assert!(permissive.includes(Path::new(path)));
}

#[test]
fn test_vcs_names_only_match_whole_components() {
    let filter = PathFilter::new(true, &[]);
    assert!(filter.includes(Path::new("/srv/docs/.gitignore")));
    assert!(filter.includes(Path::new("/srv/docs/my.git/file")));
    assert!(filter.includes(Path::new("/srv/docs/CVSROOT/file")));
    assert_eq!(VCS_DIRS.len(), 6);
}

#[rstest]
#[case("/srv/docs/logs/app.log", false)]
#[case("/srv/docs/nested/logs/deep.log", false)]
#[case("/srv/docs/logsarchive/old.log", true)]
#[case("/srv/docs/mylogs/old.log", false)]
#[case("/srv/docs/logs.txt", true)]
fn test_exclude_dirs_match_prefix(#[case] path: &str, #[case] included: bool) {
    let filter = PathFilter::new(false, &excludes(&["logs"]));
    assert_eq!(filter.includes(Path::new(path)), included, "{}", path);
}

#[rstest]
#[case("logs")]
#[case("logs/")]
#[case("logs//")]
fn test_exclude_dirs_trailing_separator_normalised(#[case] entry: &str) {
    let filter = PathFilter::new(false, &excludes(&[entry]));
    assert!(!filter.includes(Path::new("/srv/logs/a.log")));
    assert!(filter.includes(Path::new("/srv/logsarchive/a.log")));
}

#[test]
fn test_leading_separator_anchors_to_segment() {
    let filter = PathFilter::new(false, &excludes(&["/logs"]));
    assert!(!filter.includes(Path::new("/srv/logs/a.log")));
    assert!(filter.includes(Path::new("/srv/mylogs/a.log")));
}

#[test]
fn test_multi_segment_exclude() {
    let filter = PathFilter::new(false, &excludes(&["var/cache"]));
    assert!(!filter.includes(Path::new("/srv/var/cache/blob")));
    assert!(filter.includes(Path::new("/srv/var/cached/blob")));
    assert!(filter.includes(Path::new("/srv/cache/blob")));
    assert!(!filter.includes(Path::new("/srv/othervar/cache/blob")));
}

#[test]
fn test_directory_itself_excluded() {
    let filter = PathFilter::new(false, &excludes(&["logs"]));
    assert!(!filter.includes_dir(Path::new("/srv/docs/logs")));
    assert!(filter.includes_dir(Path::new("/srv/docs/logsarchive")));
}

#[test]
fn test_relative_paths_get_leading_slash() {
    let filter = PathFilter::new(false, &excludes(&["logs"]));
    assert!(!filter.includes(Path::new("logs/app.log")));
}

#[test]
fn test_skip_dir() {
    let filter = PathFilter::new(false, &[]).skip_dir("/srv/docs/autobackup_docs_x");
    assert!(!filter.includes(Path::new("/srv/docs/autobackup_docs_x/docs.tar.gz")));
    assert!(filter.includes(Path::new("/srv/docs/autobackup_docs_y/file")));
}
