//! Google Cloud Storage destination

use super::{
    delete_each, folder_prefix, is_listed_artifact, object_key, BackupItem, Destination,
    Readiness,
};
use crate::archive::{Artifact, ArtifactNaming};
use crate::config::GcsParams;
use anyhow::{Context, Result};
use futures::TryStreamExt;
use object_store::gcp::GoogleCloudStorageBuilder;
use object_store::path::Path as ObjectPath;
use object_store::{ObjectStore, WriteMultipart};
use std::path::Path;
use std::sync::Arc;
use tokio::io::AsyncReadExt;
use tokio::runtime::Runtime;
use tracing::{debug, info};

/// Read size per upload chunk
const CHUNK_SIZE: usize = 8 * 1024 * 1024;
/// Parts in flight during a multipart upload
const MAX_CONCURRENT_PARTS: usize = 4;

struct Session {
    runtime: Runtime,
    store: Arc<dyn ObjectStore>,
}

pub struct GcsDestination {
    params: GcsParams,
    naming: ArtifactNaming,
    readiness: Readiness,
    session: Option<Session>,
}

impl GcsDestination {
    pub fn new(params: &GcsParams, naming: ArtifactNaming) -> Self {
        Self {
            params: params.clone(),
            naming,
            readiness: Readiness::NotInitialized,
            session: None,
        }
    }

    /// Destination over an already connected store, ready for use
    #[cfg(test)]
    fn with_store(params: &GcsParams, naming: ArtifactNaming, store: Arc<dyn ObjectStore>) -> Result<Self> {
        let runtime = new_runtime()?;
        Ok(Self {
            params: params.clone(),
            naming,
            readiness: Readiness::Ready,
            session: Some(Session { runtime, store }),
        })
    }

    fn connect(&mut self) -> Result<()> {
        if self.params.bucket.is_empty() {
            anyhow::bail!("bucket must not be empty");
        }

        let mut builder = GoogleCloudStorageBuilder::from_env().with_bucket_name(&self.params.bucket);
        if let Some(ref credentials) = self.params.credentials {
            if !credentials.is_file() {
                anyhow::bail!("Credentials file not found: {:?}", credentials);
            }
            builder = builder.with_service_account_path(credentials.to_string_lossy());
        }
        let store: Arc<dyn ObjectStore> = Arc::new(
            builder
                .build()
                .with_context(|| format!("Failed to create client for bucket {}", self.params.bucket))?,
        );

        let runtime = new_runtime()?;

        let prefix = self.folder_path();
        runtime
            .block_on(store.list_with_delimiter(prefix.as_ref()))
            .with_context(|| format!("Bucket {} is not accessible", self.params.bucket))?;

        debug!("Bucket {} is accessible", self.params.bucket);
        self.session = Some(Session { runtime, store });
        Ok(())
    }

    fn session(&self) -> Result<&Session> {
        self.session
            .as_ref()
            .context("GCS destination used before initialization")
    }

    fn folder_path(&self) -> Option<ObjectPath> {
        let folder = self.params.folder.trim_matches('/');
        (!folder.is_empty()).then(|| ObjectPath::from(folder))
    }
}

fn new_runtime() -> Result<Runtime> {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("Failed to start async runtime")
}

/// Stream a local file into a multipart upload
async fn copy_into(source: &Path, writer: &mut WriteMultipart) -> Result<()> {
    let mut file = tokio::fs::File::open(source)
        .await
        .with_context(|| format!("Failed to open artifact {:?}", source))?;
    let mut buffer = vec![0u8; CHUNK_SIZE];

    loop {
        let read = file
            .read(&mut buffer)
            .await
            .with_context(|| format!("Failed to read artifact {:?}", source))?;
        if read == 0 {
            return Ok(());
        }
        writer
            .wait_for_capacity(MAX_CONCURRENT_PARTS)
            .await
            .context("Upload part failed")?;
        writer.write(&buffer[..read]);
    }
}

impl Destination for GcsDestination {
    fn name(&self) -> &'static str {
        "gcs"
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
        let session = self.session()?;
        let key = object_key(&self.params.folder, &artifact.file_name);
        let location = ObjectPath::from(key.as_str());

        session.runtime.block_on(async {
            let upload = session
                .store
                .put_multipart(&location)
                .await
                .with_context(|| format!("Failed to start upload of gs://{}/{}", self.params.bucket, key))?;
            let mut writer = WriteMultipart::new(upload);

            if let Err(e) = copy_into(&artifact.path, &mut writer).await {
                if let Err(abort) = writer.abort().await {
                    debug!("Failed to abort upload of {}: {}", key, abort);
                }
                return Err(e);
            }

            writer
                .finish()
                .await
                .with_context(|| format!("Failed to upload gs://{}/{}", self.params.bucket, key))?;
            Ok::<(), anyhow::Error>(())
        })?;

        info!("Uploaded gs://{}/{}", self.params.bucket, key);
        Ok(())
    }

    fn list_artifacts(&self) -> Result<Vec<BackupItem>> {
        let session = self.session()?;
        let prefix = folder_prefix(&self.params.folder);
        let folder = self.folder_path();
        debug!("Listing gs://{}/{}", self.params.bucket, prefix);

        let objects: Vec<_> = session
            .runtime
            .block_on(session.store.list(folder.as_ref()).try_collect())
            .with_context(|| format!("Failed to list gs://{}/{}", self.params.bucket, prefix))?;

        Ok(objects
            .into_iter()
            .filter(|meta| is_listed_artifact(&self.naming, &prefix, meta.location.as_ref()))
            .map(|meta| BackupItem::new(meta.location.to_string(), meta.last_modified))
            .collect())
    }

    fn delete_artifacts(&self, items: &[BackupItem]) -> Result<()> {
        let session = self.session()?;

        delete_each(items, |item| {
            let location = ObjectPath::from(item.name.as_str());
            session
                .runtime
                .block_on(session.store.delete(&location))
                .with_context(|| format!("Failed to delete gs://{}/{}", self.params.bucket, item.name))
        })
    }
}
