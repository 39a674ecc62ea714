//! Fluent API for building test configurations
//!
//! Every path (sources, destinations, logs, locks, work directories) lives
//! inside one temporary directory owned by the builder.

use autobackup::config::{BackupTargetConfig, Config, GlobalConfig};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// Builder for creating test configurations
pub struct ConfigBuilder {
    temp_dir: TempDir,
    global: GlobalConfig,
    targets: BTreeMap<String, BackupTargetConfig>,
}

impl ConfigBuilder {
    /// Create a new ConfigBuilder with no targets
    pub fn new() -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");

        let log_directory = temp_dir.path().join("logs");
        fs::create_dir_all(&log_directory).expect("Failed to create log_directory");

        let global = GlobalConfig {
            log_directory,
            log_level: "debug".to_string(),
            log_max_files: 5,
            temp_directory: Some(temp_dir.path().join("work")),
            lock_directory: temp_dir.path().join("locks"),
        };

        Self {
            temp_dir,
            global,
            targets: BTreeMap::new(),
        }
    }

    /// One target `docs` with a single local destination
    pub fn minimal() -> Self {
        Self::new().add_target("docs")
    }

    /// Add a target whose source is `sources/<name>` and whose only
    /// destination is `local` at `backups/<name>`
    pub fn add_target(self, name: &str) -> Self {
        let source = self.temp_dir.path().join("sources").join(name);
        fs::create_dir_all(&source).expect("Failed to create source dir");

        let backups = self.temp_dir.path().join("backups").join(name);
        self.add_target_at(name, &source)
            .add_local_destination(name, "local", &backups)
    }

    /// Add a target with a custom source path and no destinations
    pub fn add_target_at(mut self, name: &str, path: &Path) -> Self {
        self.targets.insert(
            name.to_string(),
            BackupTargetConfig {
                path: path.to_path_buf(),
                format: "tar.gz".to_string(),
                cron: None,
                keep_only: 0,
                date_suffix: false,
                exclude_vcs: true,
                preserve_absolute_hierarchy: false,
                exclude_dirs: vec![],
                destinations: vec![],
                destination_params: BTreeMap::new(),
            },
        );
        self
    }

    /// Add a local destination `id` to a target
    pub fn add_local_destination(self, target: &str, id: &str, directory: &Path) -> Self {
        let mut block = toml::Table::new();
        block.insert("type".to_string(), "local".into());
        block.insert(
            "directory".to_string(),
            directory.to_string_lossy().replace('\\', "/").into(),
        );
        self.add_destination_block(target, id, block)
    }

    /// Add a destination with a raw parameter block
    pub fn add_destination_block(mut self, target: &str, id: &str, block: toml::Table) -> Self {
        let entry = self.target_entry(target);
        entry.destinations.push(id.to_string());
        entry
            .destination_params
            .insert(id.to_string(), toml::Value::Table(block));
        self
    }

    pub fn with_keep_only(mut self, target: &str, keep_only: i64) -> Self {
        self.target_entry(target).keep_only = keep_only;
        self
    }

    pub fn with_date_suffix(mut self, target: &str) -> Self {
        self.target_entry(target).date_suffix = true;
        self
    }

    pub fn with_exclude_dirs(mut self, target: &str, dirs: &[&str]) -> Self {
        self.target_entry(target).exclude_dirs = dirs.iter().map(|d| d.to_string()).collect();
        self
    }

    pub fn with_vcs_included(mut self, target: &str) -> Self {
        self.target_entry(target).exclude_vcs = false;
        self
    }

    pub fn with_absolute_hierarchy(mut self, target: &str) -> Self {
        self.target_entry(target).preserve_absolute_hierarchy = true;
        self
    }

    pub fn with_cron(mut self, target: &str, schedule: &str) -> Self {
        self.target_entry(target).cron = Some(schedule.to_string());
        self
    }

    /// Set the log directory
    pub fn with_log_dir(mut self, path: &Path) -> Self {
        self.global.log_directory = path.to_path_buf();
        self
    }

    /// Get the temp directory path
    pub fn temp_dir(&self) -> &Path {
        self.temp_dir.path()
    }

    /// Source directory of a target
    pub fn source_path(&self, target: &str) -> Option<PathBuf> {
        self.targets.get(target).map(|t| t.path.clone())
    }

    /// Directory of a local destination
    pub fn destination_path(&self, target: &str, id: &str) -> Option<PathBuf> {
        self.targets
            .get(target)?
            .destination_params
            .get(id)?
            .get("directory")?
            .as_str()
            .map(PathBuf::from)
    }

    /// Build the Config
    pub fn build(self) -> Config {
        self.persist().0
    }

    /// Keep the temp directory (deleted when the returned handle drops)
    pub fn persist(self) -> (Config, TempDir) {
        let config = Config {
            global: self.global,
            targets: self.targets,
        };
        (config, self.temp_dir)
    }

    /// Write the configuration as TOML next to the test data
    pub fn write(self) -> (PathBuf, Config, TempDir) {
        let (config, temp_dir) = self.persist();
        let path = temp_dir.path().join("config.toml");
        let content = toml::to_string_pretty(&config).expect("Failed to serialize config");
        fs::write(&path, content).expect("Failed to write config file");
        (path, config, temp_dir)
    }

    fn target_entry(&mut self, target: &str) -> &mut BackupTargetConfig {
        self.targets
            .get_mut(target)
            .unwrap_or_else(|| panic!("Target '{}' not added to builder", target))
    }
}

impl Default for ConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}
