//! Local filesystem destination

use super::{delete_each, BackupItem, Destination, Readiness};
use crate::archive::{Artifact, ArtifactNaming};
use crate::config::LocalParams;
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Copies artifacts into a directory
pub struct LocalDestination {
    directory: PathBuf,
    naming: ArtifactNaming,
    readiness: Readiness,
}

impl LocalDestination {
    pub fn new(params: &LocalParams, naming: ArtifactNaming) -> Self {
        Self {
            directory: params.directory.clone(),
            naming,
            readiness: Readiness::NotInitialized,
        }
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }

    fn connect(&self) -> Result<()> {
        fs::create_dir_all(&self.directory)
            .with_context(|| format!("Failed to create directory {:?}", self.directory))?;

        let metadata = fs::metadata(&self.directory)
            .with_context(|| format!("Failed to stat {:?}", self.directory))?;
        if !metadata.is_dir() {
            anyhow::bail!("{:?} is not a directory", self.directory);
        }

        Ok(())
    }
}

impl Destination for LocalDestination {
    fn name(&self) -> &'static str {
        "local"
    }

    fn initialize(&mut self) -> bool {
        if self.readiness.is_settled() {
            return self.readiness.is_ready();
        }
        let result = self.connect();
        let kind = self.name();
        self.readiness.settle(kind, result)
    }

    fn readiness(&self) -> Readiness {
        self.readiness
    }

    fn upload(&self, artifact: &Artifact) -> Result<()> {
        let target = self.directory.join(&artifact.file_name);
        let partial = self
            .directory
            .join(format!(".{}.partial", artifact.file_name));

        debug!("Copying {:?} to {:?}", artifact.path, partial);
        if let Err(e) = fs::copy(&artifact.path, &partial) {
            let _ = fs::remove_file(&partial);
            return Err(e).with_context(|| format!("Failed to copy artifact to {:?}", partial));
        }

        if let Err(e) = fs::rename(&partial, &target) {
            let _ = fs::remove_file(&partial);
            return Err(e).with_context(|| format!("Failed to move artifact to {:?}", target));
        }

        info!("Stored {:?}", target);
        Ok(())
    }

    fn list_artifacts(&self) -> Result<Vec<BackupItem>> {
        let entries = fs::read_dir(&self.directory)
            .with_context(|| format!("Failed to read directory {:?}", self.directory))?;

        let mut items = Vec::new();
        for entry in entries {
            let entry = entry.with_context(|| format!("Failed to read directory {:?}", self.directory))?;
            let file_name = entry.file_name();
            let Some(name) = file_name.to_str() else {
                continue;
            };
            if !self.naming.matches(name) {
                continue;
            }

            let metadata = entry
                .metadata()
                .with_context(|| format!("Failed to stat {:?}", entry.path()))?;
            if !metadata.is_file() {
                continue;
            }
            let modified = metadata
                .modified()
                .with_context(|| format!("Failed to read mtime of {:?}", entry.path()))?;

            items.push(BackupItem::new(
                entry.path().to_string_lossy(),
                DateTime::<Utc>::from(modified),
            ));
        }

        Ok(items)
    }

    fn delete_artifacts(&self, items: &[BackupItem]) -> Result<()> {
        delete_each(items, |item| {
            fs::remove_file(&item.name).with_context(|| format!("Failed to remove {}", item.name))
        })
    }
}
