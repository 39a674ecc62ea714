use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;

/// Root configuration structure
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub global: GlobalConfig,
    #[serde(default)]
    pub targets: BTreeMap<String, BackupTargetConfig>,
}

/// Global configuration settings
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct GlobalConfig {
    /// Logging configuration
    #[serde(default = "default_log_directory")]
    pub log_directory: PathBuf,
    #[serde(default = "default_log_level")]
    pub log_level: String,
    #[serde(default = "default_log_max_files")]
    pub log_max_files: u32,

    /// Parent directory for per-run work directories (system temp when unset)
    #[serde(default)]
    pub temp_directory: Option<PathBuf>,

    /// Directory holding the per-target lock files
    #[serde(default = "default_lock_directory")]
    pub lock_directory: PathBuf,
}

impl Default for GlobalConfig {
    fn default() -> Self {
        Self {
            log_directory: default_log_directory(),
            log_level: default_log_level(),
            log_max_files: default_log_max_files(),
            temp_directory: None,
            lock_directory: default_lock_directory(),
        }
    }
}

/// Backup target configuration (raw, as written in the TOML file)
///
/// Every identifier listed in `destinations` must have a table of the same
/// name inside the target; those tables are collected in `destination_params`.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct BackupTargetConfig {
    /// Root of the subtree to archive
    pub path: PathBuf,

    /// Archive format; `tar.gz` is the only container produced
    #[serde(default = "default_format")]
    pub format: String,

    /// Cron schedule used by `setup`
    #[serde(default)]
    pub cron: Option<String>,

    /// Number of artifacts to keep per destination (<= 0 disables pruning)
    #[serde(default)]
    pub keep_only: i64,

    /// Append `_DDMMYYYY_HHMMSS` to artifact names
    #[serde(default)]
    pub date_suffix: bool,

    #[serde(default = "default_exclude_vcs")]
    pub exclude_vcs: bool,

    /// Store absolute paths inside the archive
    #[serde(default)]
    pub preserve_absolute_hierarchy: bool,

    #[serde(default)]
    pub exclude_dirs: Vec<String>,

    /// Destination identifiers, in upload order
    #[serde(default)]
    pub destinations: Vec<String>,

    #[serde(flatten)]
    pub destination_params: BTreeMap<String, toml::Value>,
}

/// Supported storage backends
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum DestinationKind {
    Local,
    S3,
    Gcs,
}

impl DestinationKind {
    pub const ALL: [DestinationKind; 3] = [Self::Local, Self::S3, Self::Gcs];

    /// Parse a kind name, accepting the `aws` and `gcp` aliases
    pub fn parse(name: &str) -> Option<Self> {
        match name.to_lowercase().as_str() {
            "local" => Some(Self::Local),
            "s3" | "aws" => Some(Self::S3),
            "gcs" | "gcp" => Some(Self::Gcs),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Local => "local",
            Self::S3 => "s3",
            Self::Gcs => "gcs",
        }
    }
}

impl fmt::Display for DestinationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct LocalParams {
    pub directory: PathBuf,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct S3Params {
    pub bucket: String,
    #[serde(default)]
    pub folder: String,
    /// Shared credentials file
    #[serde(default)]
    pub credentials: Option<PathBuf>,
    /// Shared config file
    #[serde(default)]
    pub config: Option<PathBuf>,
    #[serde(default)]
    pub profile: Option<String>,
    #[serde(default)]
    pub region: Option<String>,
    /// Custom endpoint for S3-compatible stores (path-style addressing)
    #[serde(default)]
    pub endpoint: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct GcsParams {
    pub bucket: String,
    #[serde(default)]
    pub folder: String,
    /// Service account key file
    #[serde(default)]
    pub credentials: Option<PathBuf>,
}

/// Decoded destination parameter block
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DestinationConfig {
    Local(LocalParams),
    S3(S3Params),
    Gcs(GcsParams),
}

impl DestinationConfig {
    pub fn kind(&self) -> DestinationKind {
        match self {
            Self::Local(_) => DestinationKind::Local,
            Self::S3(_) => DestinationKind::S3,
            Self::Gcs(_) => DestinationKind::Gcs,
        }
    }
}

/// Archive and retention settings of one target
#[derive(Debug, Clone)]
pub struct TargetSettings {
    pub name: String,
    pub path: PathBuf,
    pub format: String,
    pub cron: Option<String>,
    pub keep_only: i64,
    pub date_suffix: bool,
    pub exclude_vcs: bool,
    pub preserve_absolute_hierarchy: bool,
    pub exclude_dirs: Vec<String>,
}

impl TargetSettings {
    /// Settings with every option at its default value
    pub fn new(name: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            path: path.into(),
            format: default_format(),
            cron: None,
            keep_only: 0,
            date_suffix: false,
            exclude_vcs: default_exclude_vcs(),
            preserve_absolute_hierarchy: false,
            exclude_dirs: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedDestination {
    pub id: String,
    pub config: DestinationConfig,
}

/// Resolved target configuration (paths expanded, destinations decoded)
#[derive(Debug, Clone)]
pub struct ResolvedTarget {
    pub settings: TargetSettings,
    pub destinations: Vec<ResolvedDestination>,
}

impl ResolvedTarget {
    pub fn name(&self) -> &str {
        &self.settings.name
    }
}

// Default value functions

fn default_log_directory() -> PathBuf { PathBuf::from("~/.local/state/autobackup") }
fn default_log_level() -> String { "info".to_string() }
fn default_log_max_files() -> u32 { 10 }
fn default_lock_directory() -> PathBuf { std::env::temp_dir() }
fn default_format() -> String { "tar.gz".to_string() }
fn default_exclude_vcs() -> bool { true }
