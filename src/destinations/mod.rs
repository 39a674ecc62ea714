//! Storage destinations
//!
//! Every backend implements [`Destination`]; the orchestrator only talks to
//! the trait. Backends are built from a decoded [`DestinationConfig`] by
//! [`build_destination`], the single construction point.

pub mod gcs;
pub mod local;
pub mod s3;

use crate::archive::{Artifact, ArtifactNaming};
use crate::config::DestinationConfig;
use crate::retention::RetentionPolicy;
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, info, warn};

pub use gcs::GcsDestination;
pub use local::LocalDestination;
pub use s3::S3Destination;

/// Whether a destination can be used
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Readiness {
    #[default]
    NotInitialized,
    Ready,
    Failed,
}

impl Readiness {
    pub fn is_ready(&self) -> bool {
        *self == Self::Ready
    }

    /// Initialisation has already been attempted
    pub fn is_settled(&self) -> bool {
        *self != Self::NotInitialized
    }

    /// Record the outcome of an initialisation attempt
    pub fn settle(&mut self, kind: &str, result: Result<()>) -> bool {
        *self = match result {
            Ok(()) => {
                debug!("{} destination ready", kind);
                Self::Ready
            }
            Err(e) => {
                warn!("Failed to initialize {} destination: {:#}", kind, e);
                Self::Failed
            }
        };
        self.is_ready()
    }
}

/// One artifact seen at a destination
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BackupItem {
    /// Path (local) or object key
    pub name: String,
    pub modified: DateTime<Utc>,
}

impl BackupItem {
    pub fn new(name: impl Into<String>, modified: DateTime<Utc>) -> Self {
        Self {
            name: name.into(),
            modified,
        }
    }
}

/// A storage backend receiving, listing and deleting artifacts
pub trait Destination: Send {
    /// Backend kind (`local`, `s3`, `gcs`)
    fn name(&self) -> &'static str;

    /// Validate parameters and establish connectivity
    ///
    /// Runs at most once; later calls return the recorded outcome.
    /// Failures are logged and leave the destination `Failed`.
    fn initialize(&mut self) -> bool;

    fn readiness(&self) -> Readiness;

    fn is_ready(&self) -> bool {
        self.readiness().is_ready()
    }

    /// Store the artifact under its file name
    fn upload(&self, artifact: &Artifact) -> Result<()>;

    /// Artifacts of the owning target, in listing order
    fn list_artifacts(&self) -> Result<Vec<BackupItem>>;

    /// Delete every item, continuing past individual failures
    fn delete_artifacts(&self, items: &[BackupItem]) -> Result<()>;

    /// Apply the retention policy, returning the deleted items
    fn prune(&self, policy: &RetentionPolicy) -> Result<Vec<BackupItem>> {
        let items = self
            .list_artifacts()
            .context("Failed to list artifacts")?;

        let doomed = policy.select_for_deletion(&items);
        if doomed.is_empty() {
            debug!(
                "{} artifacts present, keeping {}: nothing to delete",
                items.len(),
                policy.keep_only
            );
            return Ok(doomed);
        }

        info!(
            "Deleting {} of {} artifacts (keep {})",
            doomed.len(),
            items.len(),
            policy.keep_only
        );
        self.delete_artifacts(&doomed)?;
        Ok(doomed)
    }
}

/// Build the backend for a decoded parameter block
pub fn build_destination(config: &DestinationConfig, naming: ArtifactNaming) -> Box<dyn Destination> {
    match config {
        DestinationConfig::Local(params) => Box::new(LocalDestination::new(params, naming)),
        DestinationConfig::S3(params) => Box::new(S3Destination::new(params, naming)),
        DestinationConfig::Gcs(params) => Box::new(GcsDestination::new(params, naming)),
    }
}

/// Object key of `file_name` inside `folder`
pub fn object_key(folder: &str, file_name: &str) -> String {
    let folder = folder.trim_matches('/');
    if folder.is_empty() {
        file_name.to_string()
    } else {
        format!("{}/{}", folder, file_name)
    }
}

/// Listing prefix for `folder` (empty for the bucket root)
pub(crate) fn folder_prefix(folder: &str) -> String {
    let folder = folder.trim_matches('/');
    if folder.is_empty() {
        String::new()
    } else {
        format!("{}/", folder)
    }
}

/// Whether `key` is an artifact sitting directly inside `prefix`
pub(crate) fn is_listed_artifact(naming: &ArtifactNaming, prefix: &str, key: &str) -> bool {
    key.strip_prefix(prefix)
        .filter(|name| !name.contains('/'))
        .map(|name| naming.matches(name))
        .unwrap_or(false)
}

/// Run `delete` for every item, then report all failures together
pub(crate) fn delete_each<F>(items: &[BackupItem], mut delete: F) -> Result<()>
where
    F: FnMut(&BackupItem) -> Result<()>,
{
    let mut failures = Vec::new();

    for item in items {
        match delete(item) {
            Ok(()) => info!("Deleted {}", item.name),
            Err(e) => {
                warn!("Failed to delete {}: {:#}", item.name, e);
                failures.push(format!("{}: {:#}", item.name, e));
            }
        }
    }

    if failures.is_empty() {
        Ok(())
    } else {
        anyhow::bail!(
            "Failed to delete {} of {} artifacts: {}",
            failures.len(),
            items.len(),
            failures.join("; ")
        )
    }
}

/// Mock destination for tests
pub mod mock {
    use super::*;
    use std::sync::{Arc, Mutex};

    /// Recorded destination call
    #[derive(Clone, Debug, PartialEq, Eq)]
    pub enum DestinationCall {
        Initialize,
        Upload { file_name: String },
        List,
        Delete { names: Vec<String> },
    }

    /// In-memory destination; clones share state so a test can keep a
    /// handle after boxing one copy into a target
    #[derive(Clone, Default)]
    pub struct MockDestination {
        pub calls: Arc<Mutex<Vec<DestinationCall>>>,
        /// Artifacts currently "stored"
        pub items: Arc<Mutex<Vec<BackupItem>>>,
        pub should_fail_init: Arc<Mutex<bool>>,
        pub should_fail_upload: Arc<Mutex<bool>>,
        pub should_fail_list: Arc<Mutex<bool>>,
        /// Names whose deletion fails
        pub failing_deletes: Arc<Mutex<Vec<String>>>,
        readiness: Arc<Mutex<Readiness>>,
    }

    impl MockDestination {
        pub fn new() -> Self {
            Self::default()
        }

        /// Configure pre-existing artifacts
        pub fn with_items(self, items: Vec<BackupItem>) -> Self {
            *self.items.lock().unwrap() = items;
            self
        }

        /// Configure initialize to fail
        pub fn with_failing_init(self) -> Self {
            *self.should_fail_init.lock().unwrap() = true;
            self
        }

        /// Configure upload to fail
        pub fn with_failing_upload(self) -> Self {
            *self.should_fail_upload.lock().unwrap() = true;
            self
        }

        /// Configure list_artifacts to fail
        pub fn with_failing_list(self) -> Self {
            *self.should_fail_list.lock().unwrap() = true;
            self
        }

        /// Configure deletion of `name` to fail
        pub fn with_failing_delete(self, name: &str) -> Self {
            self.failing_deletes.lock().unwrap().push(name.to_string());
            self
        }

        /// Get all recorded calls
        pub fn get_calls(&self) -> Vec<DestinationCall> {
            self.calls.lock().unwrap().clone()
        }

        /// Names of all uploaded artifacts
        pub fn uploads(&self) -> Vec<String> {
            self.get_calls()
                .into_iter()
                .filter_map(|call| match call {
                    DestinationCall::Upload { file_name } => Some(file_name),
                    _ => None,
                })
                .collect()
        }

        /// Names of the artifacts currently stored
        pub fn item_names(&self) -> Vec<String> {
            self.items
                .lock()
                .unwrap()
                .iter()
                .map(|item| item.name.clone())
                .collect()
        }

        fn record(&self, call: DestinationCall) {
            self.calls.lock().unwrap().push(call);
        }
    }

    impl Destination for MockDestination {
        fn name(&self) -> &'static str {
            "mock"
        }

        fn initialize(&mut self) -> bool {
            let mut readiness = self.readiness.lock().unwrap();
            if readiness.is_settled() {
                return readiness.is_ready();
            }
            self.calls.lock().unwrap().push(DestinationCall::Initialize);

            let result = if *self.should_fail_init.lock().unwrap() {
                Err(anyhow::anyhow!("mock initialization failure"))
            } else {
                Ok(())
            };
            readiness.settle("mock", result)
        }

        fn readiness(&self) -> Readiness {
            *self.readiness.lock().unwrap()
        }

        fn upload(&self, artifact: &Artifact) -> Result<()> {
            self.record(DestinationCall::Upload {
                file_name: artifact.file_name.clone(),
            });
            if *self.should_fail_upload.lock().unwrap() {
                anyhow::bail!("mock upload failure");
            }
            self.items
                .lock()
                .unwrap()
                .push(BackupItem::new(artifact.file_name.clone(), Utc::now()));
            Ok(())
        }

        fn list_artifacts(&self) -> Result<Vec<BackupItem>> {
            self.record(DestinationCall::List);
            if *self.should_fail_list.lock().unwrap() {
                anyhow::bail!("mock list failure");
            }
            Ok(self.items.lock().unwrap().clone())
        }

        fn delete_artifacts(&self, items: &[BackupItem]) -> Result<()> {
            self.record(DestinationCall::Delete {
                names: items.iter().map(|item| item.name.clone()).collect(),
            });
            let failing = self.failing_deletes.lock().unwrap().clone();
            delete_each(items, |item| {
                if failing.contains(&item.name) {
                    anyhow::bail!("mock delete failure");
                }
                self.items.lock().unwrap().retain(|kept| kept.name != item.name);
                Ok(())
            })
        }
    }
}
