//! Per-target run pipeline: archive once, then upload and prune per destination

use crate::archive::{ArchiveBuilder, ArchiveError, Artifact, ArtifactNaming};
use crate::config::{ResolvedTarget, TargetSettings};
use crate::destinations::{build_destination, BackupItem, Destination};
use crate::retention::RetentionPolicy;
use anyhow::Result;
use chrono::Local;
use serde::Serialize;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tempfile::TempDir;
use tracing::{debug, error, info, info_span, warn};

/// Fatal run errors; destination problems never end up here
#[derive(Debug, thiserror::Error)]
pub enum RunError {
    #[error("Failed to create work directory in {path:?}: {source}")]
    Workdir {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error(transparent)]
    Archive(#[from] ArchiveError),
}

/// A destination together with its configured identifier
pub struct ConfiguredDestination {
    pub id: String,
    pub backend: Box<dyn Destination>,
}

/// What happened at one destination
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum DestinationOutcome {
    /// Upload failed; retention was not applied
    UploadFailed { error: String },
    Uploaded { prune: PruneOutcome },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum PruneOutcome {
    /// Retention disabled (`keep_only <= 0`)
    Skipped,
    Pruned { deleted: Vec<String> },
    Failed { error: String },
}

#[derive(Debug, Clone, Serialize)]
pub struct DestinationReport {
    pub id: String,
    pub kind: &'static str,
    pub outcome: DestinationOutcome,
}

/// Summary of one run
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub target: String,
    pub artifact: String,
    pub file_count: usize,
    pub size_bytes: u64,
    /// Destinations that were not ready and took no part in the run
    pub excluded: Vec<String>,
    pub destinations: Vec<DestinationReport>,
}

impl RunReport {
    fn new(target: &str, artifact: &Artifact) -> Self {
        Self {
            target: target.to_string(),
            artifact: artifact.file_name.clone(),
            file_count: artifact.file_count,
            size_bytes: artifact.size_bytes,
            excluded: Vec::new(),
            destinations: Vec::new(),
        }
    }

    /// Every configured destination was ready, received the artifact and
    /// applied retention without error
    pub fn is_success(&self) -> bool {
        self.failures().is_empty()
    }

    /// Human-readable description of each problem
    pub fn failures(&self) -> Vec<String> {
        let mut failures: Vec<String> = self
            .excluded
            .iter()
            .map(|id| format!("{}: destination not ready", id))
            .collect();

        for dest in &self.destinations {
            match &dest.outcome {
                DestinationOutcome::UploadFailed { error } => {
                    failures.push(format!("{}: upload failed: {}", dest.id, error))
                }
                DestinationOutcome::Uploaded {
                    prune: PruneOutcome::Failed { error },
                } => failures.push(format!("{}: retention failed: {}", dest.id, error)),
                DestinationOutcome::Uploaded { .. } => {}
            }
        }

        failures
    }

    /// Identifiers of destinations that hold the new artifact
    pub fn uploaded(&self) -> Vec<&str> {
        self.destinations
            .iter()
            .filter(|d| matches!(d.outcome, DestinationOutcome::Uploaded { .. }))
            .map(|d| d.id.as_str())
            .collect()
    }
}

/// Temporary directory owned by one run, removed when dropped
struct Workdir {
    dir: Option<TempDir>,
}

impl Workdir {
    fn create(target: &str, temp_root: Option<&Path>) -> std::result::Result<Self, RunError> {
        let prefix = format!("autobackup_{}_", target);
        let mut builder = tempfile::Builder::new();
        builder.prefix(&prefix);

        let dir = match temp_root {
            Some(root) => fs::create_dir_all(root)
                .and_then(|()| builder.tempdir_in(root))
                .map_err(|source| RunError::Workdir {
                    path: root.to_path_buf(),
                    source,
                })?,
            None => builder.tempdir().map_err(|source| RunError::Workdir {
                path: std::env::temp_dir(),
                source,
            })?,
        };

        debug!("Created work directory {:?}", dir.path());
        Ok(Self { dir: Some(dir) })
    }

    fn path(&self) -> &Path {
        self.dir
            .as_ref()
            .map(TempDir::path)
            .unwrap_or_else(|| Path::new(""))
    }
}

impl Drop for Workdir {
    fn drop(&mut self) {
        if let Some(dir) = self.dir.take() {
            let path = dir.path().to_path_buf();
            match dir.close() {
                Ok(()) => debug!("Removed work directory {:?}", path),
                Err(e) => warn!("Failed to remove work directory {:?}: {}", path, e),
            }
        }
    }
}

/// One named, independently triggered backup unit
pub struct BackupTarget {
    settings: TargetSettings,
    destinations: Vec<ConfiguredDestination>,
    temp_root: Option<PathBuf>,
}

impl BackupTarget {
    pub fn new(settings: TargetSettings) -> Self {
        Self {
            settings,
            destinations: Vec::new(),
            temp_root: None,
        }
    }

    /// Build a target and its backends from resolved configuration
    pub fn from_resolved(resolved: ResolvedTarget) -> Self {
        let naming = ArtifactNaming::for_target(&resolved.settings);
        let mut target = Self::new(resolved.settings);

        for dest in resolved.destinations {
            let backend = build_destination(&dest.config, naming.clone());
            target = target.with_destination(dest.id, backend);
        }

        target
    }

    /// Append a destination (upload order follows insertion order)
    pub fn with_destination(mut self, id: impl Into<String>, backend: Box<dyn Destination>) -> Self {
        self.destinations.push(ConfiguredDestination {
            id: id.into(),
            backend,
        });
        self
    }

    /// Parent directory for work directories (system temp when unset)
    pub fn with_temp_root(mut self, root: Option<PathBuf>) -> Self {
        self.temp_root = root;
        self
    }

    pub fn name(&self) -> &str {
        &self.settings.name
    }

    pub fn settings(&self) -> &TargetSettings {
        &self.settings
    }

    pub fn destinations(&self) -> &[ConfiguredDestination] {
        &self.destinations
    }

    /// Initialise destinations not yet attempted; returns how many are ready
    pub fn initialize(&mut self) -> usize {
        for dest in &mut self.destinations {
            if dest.backend.readiness().is_settled() {
                continue;
            }
            let span = info_span!("destination", id = %dest.id, kind = dest.backend.name());
            let _enter = span.enter();
            if dest.backend.initialize() {
                info!("Destination ready");
            } else {
                warn!("Destination excluded from this target");
            }
        }

        self.destinations
            .iter()
            .filter(|dest| dest.backend.is_ready())
            .count()
    }

    /// Run the pipeline once
    ///
    /// Fatal errors (work directory, walk, archive writing) abort the run.
    /// Destination failures are logged and recorded in the report. The work
    /// directory and the local artifact are removed on every path.
    pub fn process(&mut self) -> std::result::Result<RunReport, RunError> {
        let span = info_span!("target", name = %self.settings.name);
        let _enter = span.enter();
        let started = Instant::now();

        let ready = self.initialize();

        let workdir = Workdir::create(&self.settings.name, self.temp_root.as_deref())?;

        let builder = ArchiveBuilder::new(&self.settings);
        let files = builder.enumerate(workdir.path())?;
        info!("Archiving {} files from {:?}", files.len(), self.settings.path);
        let artifact = builder.write(workdir.path(), &files, Local::now())?;
        info!(
            "Created {} ({} files, {} bytes)",
            artifact.file_name, artifact.file_count, artifact.size_bytes
        );

        let mut report = RunReport::new(&self.settings.name, &artifact);
        if ready == 0 {
            warn!("No ready destinations, discarding {}", artifact.file_name);
        }

        let policy = RetentionPolicy::new(self.settings.keep_only);
        for dest in &self.destinations {
            if !dest.backend.is_ready() {
                report.excluded.push(dest.id.clone());
                continue;
            }

            let span = info_span!("destination", id = %dest.id, kind = dest.backend.name());
            let _enter = span.enter();
            report.destinations.push(DestinationReport {
                id: dest.id.clone(),
                kind: dest.backend.name(),
                outcome: deliver(dest.backend.as_ref(), &artifact, &policy),
            });
        }

        drop(workdir);

        info!(
            "Run finished in {:.2}s: {} of {} destinations received {}",
            started.elapsed().as_secs_f64(),
            report.uploaded().len(),
            self.destinations.len(),
            artifact.file_name
        );
        Ok(report)
    }

    /// Artifacts at each ready destination, optionally restricted to one id
    pub fn list_artifacts(&mut self, only: Option<&str>) -> Vec<(String, Result<Vec<BackupItem>>)> {
        self.initialize();

        self.destinations
            .iter()
            .filter(|dest| only.map_or(true, |id| dest.id == id))
            .map(|dest| {
                let listing = if dest.backend.is_ready() {
                    dest.backend.list_artifacts()
                } else {
                    Err(anyhow::anyhow!("destination '{}' is not ready", dest.id))
                };
                (dest.id.clone(), listing)
            })
            .collect()
    }
}

/// Upload, then prune when the upload succeeded and retention is enabled
fn deliver(
    backend: &dyn Destination,
    artifact: &Artifact,
    policy: &RetentionPolicy,
) -> DestinationOutcome {
    if let Err(e) = backend.upload(artifact) {
        error!("Upload failed: {:#}", e);
        return DestinationOutcome::UploadFailed {
            error: format!("{:#}", e),
        };
    }
    info!("Uploaded {}", artifact.file_name);

    if !policy.is_enabled() {
        debug!("Retention disabled, skipping cleanup");
        return DestinationOutcome::Uploaded {
            prune: PruneOutcome::Skipped,
        };
    }

    let prune = match backend.prune(policy) {
        Ok(deleted) => PruneOutcome::Pruned {
            deleted: deleted.into_iter().map(|item| item.name).collect(),
        },
        Err(e) => {
            error!("Retention cleanup failed: {:#}", e);
            PruneOutcome::Failed {
                error: format!("{:#}", e),
            }
        }
    };

    DestinationOutcome::Uploaded { prune }
}
