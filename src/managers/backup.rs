//! Backup manager - runs targets under their lock and summarises the outcome

use super::target::{BackupTarget, RunReport};
use crate::config::{self, Config};
use crate::utils::locker::TargetLock;
use anyhow::{Context, Result};
use std::collections::BTreeMap;
use tracing::{error, info, warn};

pub struct BackupManager {
    config: Config,
    targets: BTreeMap<String, BackupTarget>,
}

impl BackupManager {
    /// Create a manager with one target per configured entry
    pub fn new(config: Config) -> Result<Self> {
        let resolved = config::resolve_all_targets(&config)
            .context("Failed to resolve targets")?;

        let temp_root = config
            .global
            .temp_directory
            .as_deref()
            .map(config::expand_tilde);

        let targets = resolved
            .into_iter()
            .map(|(name, target)| {
                let target = BackupTarget::from_resolved(target).with_temp_root(temp_root.clone());
                (name, target)
            })
            .collect();

        Ok(Self { config, targets })
    }

    /// Create a manager over pre-built targets
    pub fn with_targets(config: Config, targets: Vec<BackupTarget>) -> Self {
        let targets = targets
            .into_iter()
            .map(|target| (target.name().to_string(), target))
            .collect();

        Self { config, targets }
    }

    /// Run one target while holding its lock
    ///
    /// Returns an error only when the run could not happen or aborted;
    /// destination failures are reported in the returned [`RunReport`].
    pub fn backup_target(&mut self, name: &str) -> Result<RunReport> {
        let lock_dir = config::expand_tilde(&self.config.global.lock_directory);
        let target = self
            .targets
            .get_mut(name)
            .context(format!("Target not found: {}", name))?;

        let mut lock = TargetLock::open(&lock_dir, name)?;
        let _guard = lock
            .try_acquire()
            .context(format!("Failed to acquire lock for target '{}'", name))?;

        info!("Starting backup for target: {}", name);
        let report = target
            .process()
            .with_context(|| format!("Backup of target '{}' aborted", name))?;

        for failure in report.failures() {
            warn!("Target '{}': {}", name, failure);
        }

        Ok(report)
    }

    /// Run one target and fail when any destination failed
    pub fn backup_target_strict(&mut self, name: &str) -> Result<RunReport> {
        let report = self.backup_target(name)?;

        if !report.is_success() {
            let failures = report.failures();
            anyhow::bail!(
                "Backup of '{}' failed for {} destination(s): {}",
                name,
                failures.len(),
                failures.join(", ")
            );
        }

        Ok(report)
    }

    /// Run every target in name order
    pub fn backup_all(&mut self) -> Result<()> {
        info!("Starting backup for all targets");

        let names = self.target_names();
        if names.is_empty() {
            warn!("No targets to backup");
            return Ok(());
        }

        info!("Found {} targets", names.len());

        let mut success_count = 0;
        let mut errors = Vec::new();

        for name in &names {
            match self.backup_target_strict(name) {
                Ok(_) => success_count += 1,
                Err(e) => {
                    error!("Failed to backup target '{}': {:#}", name, e);
                    errors.push(format!("{}: {:#}", name, e));
                }
            }
        }

        info!(
            "Backup summary: {} succeeded, {} failed",
            success_count,
            errors.len()
        );

        if !errors.is_empty() {
            anyhow::bail!(
                "{} target(s) failed to backup:\n{}",
                errors.len(),
                errors.join("\n")
            );
        }

        Ok(())
    }

    /// Get list of all target names
    pub fn target_names(&self) -> Vec<String> {
        self.targets.keys().cloned().collect()
    }

    pub fn target(&self, name: &str) -> Option<&BackupTarget> {
        self.targets.get(name)
    }

    pub fn target_mut(&mut self, name: &str) -> Option<&mut BackupTarget> {
        self.targets.get_mut(name)
    }
}
