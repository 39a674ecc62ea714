//! Test fixtures and sample data
//!
//! Source trees to archive, aged artifacts for retention scenarios and
//! helpers that read archives back.

use autobackup::destinations::BackupItem;
use chrono::{Duration, TimeZone, Utc};
use filetime::{set_file_mtime, FileTime};
use flate2::read::GzDecoder;
use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::Read;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

/// Files created by [`sample_tree`], relative to its root
pub const SAMPLE_FILES: &[&str] = &[
    ".git/HEAD",
    ".git/objects/ab/cdef",
    "logs/app.log",
    "logsarchive/2023.log",
    "nested/logs/deep.log",
    "notes/today.md",
    "readme.txt",
    "src/lib.rs",
    "src/main.rs",
];

/// Populate `root` with [`SAMPLE_FILES`]; each file holds its own name
pub fn sample_tree(root: &Path) {
    for name in SAMPLE_FILES {
        write_file(root, name, name);
    }
}

/// Write `content` to `root/name`, creating parent directories
pub fn write_file(root: &Path, name: &str, content: &str) -> PathBuf {
    let path = root.join(name);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).expect("Failed to create parent directory");
    }
    fs::write(&path, content).expect("Failed to write file");
    path
}

/// Place a fake artifact in `dir` whose mtime lies `days_ago` in the past
pub fn seed_artifact(dir: &Path, name: &str, days_ago: u64) -> PathBuf {
    fs::create_dir_all(dir).expect("Failed to create artifact dir");
    let path = dir.join(name);
    fs::write(&path, format!("old artifact {}", name)).expect("Failed to write artifact");
    age_file(&path, days_ago);
    path
}

/// Set the mtime of `path` to `days_ago` days before now
pub fn age_file(path: &Path, days_ago: u64) {
    let when = SystemTime::now() - std::time::Duration::from_secs(days_ago * 86_400);
    set_file_mtime(path, FileTime::from_system_time(when)).expect("Failed to set mtime");
}

/// A listed artifact modified `days_ago` days before 2024-06-01
pub fn backup_item(name: &str, days_ago: i64) -> BackupItem {
    let base = Utc
        .with_ymd_and_hms(2024, 6, 1, 12, 0, 0)
        .single()
        .expect("valid date");
    BackupItem::new(name, base - Duration::days(days_ago))
}

/// Names of every entry in a `.tar.gz` archive, in archive order
pub fn archive_entries(path: &Path) -> Vec<String> {
    let file = File::open(path).expect("Failed to open archive");
    let mut archive = tar::Archive::new(GzDecoder::new(file));

    archive
        .entries()
        .expect("Failed to read archive")
        .map(|entry| {
            let entry = entry.expect("Failed to read archive entry");
            String::from_utf8_lossy(&entry.path_bytes()).into_owned()
        })
        .collect()
}

/// Entry name to contents for every entry in a `.tar.gz` archive
pub fn archive_contents(path: &Path) -> BTreeMap<String, Vec<u8>> {
    let file = File::open(path).expect("Failed to open archive");
    let mut archive = tar::Archive::new(GzDecoder::new(file));

    let mut contents = BTreeMap::new();
    for entry in archive.entries().expect("Failed to read archive") {
        let mut entry = entry.expect("Failed to read archive entry");
        let name = String::from_utf8_lossy(&entry.path_bytes()).into_owned();
        let mut data = Vec::new();
        entry
            .read_to_end(&mut data)
            .expect("Failed to read archive entry data");
        contents.insert(name, data);
    }
    contents
}

/// Sorted file names inside `dir` (empty when it does not exist)
pub fn dir_listing(dir: &Path) -> Vec<String> {
    let mut names: Vec<String> = match fs::read_dir(dir) {
        Ok(entries) => entries
            .filter_map(|e| e.ok())
            .map(|e| e.file_name().to_string_lossy().into_owned())
            .collect(),
        Err(_) => Vec::new(),
    };
    names.sort();
    names
}

/// Minimal valid config TOML template
pub fn minimal_config_toml() -> &'static str {
    r#"
[global]
log_directory = "{log_dir}"
lock_directory = "{lock_dir}"

[targets.docs]
path = "{source}"
destinations = ["local"]

[targets.docs.local]
directory = "{backup_path}"
"#
}

/// Config with several targets and destination kinds
pub fn multi_target_config_toml() -> &'static str {
    r#"
[targets.docs]
path = "/srv/docs"
cron = "0 2 * * *"
keep_only = 7
date_suffix = true
exclude_dirs = ["cache", "tmp"]
destinations = ["nas", "aws"]

[targets.docs.nas]
type = "local"
directory = "/mnt/nas/docs"

[targets.docs.aws]
bucket = "company-backups"
folder = "docs"
region = "eu-west-1"

[targets.photos]
path = "/srv/photos"
destinations = ["gcp"]

[targets.photos.gcp]
bucket = "photo-archive"
"#
}
