//! S3 destination
//!
//! Works with AWS S3 and S3-compatible storage. A custom `endpoint` switches
//! the client to path-style addressing. The async SDK runs on a
//! current-thread runtime owned by the destination.

use super::{
    delete_each, folder_prefix, is_listed_artifact, object_key, BackupItem, Destination,
    Readiness,
};
use crate::archive::{Artifact, ArtifactNaming};
use crate::config::S3Params;
use anyhow::{Context, Result};
use aws_config::profile::profile_file::{ProfileFileKind, ProfileFiles};
use aws_config::BehaviorVersion;
use aws_sdk_s3::config::Region;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::types::Object;
use aws_sdk_s3::Client;
use chrono::{DateTime, Utc};
use tokio::runtime::Runtime;
use tracing::{debug, info, warn};

struct Session {
    runtime: Runtime,
    client: Client,
}

pub struct S3Destination {
    params: S3Params,
    naming: ArtifactNaming,
    readiness: Readiness,
    session: Option<Session>,
}

impl S3Destination {
    pub fn new(params: &S3Params, naming: ArtifactNaming) -> Self {
        Self {
            params: params.clone(),
            naming,
            readiness: Readiness::NotInitialized,
            session: None,
        }
    }

    fn connect(&mut self) -> Result<()> {
        if self.params.bucket.is_empty() {
            anyhow::bail!("bucket must not be empty");
        }

        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .context("Failed to start async runtime")?;

        let client = runtime.block_on(create_client(&self.params));

        runtime
            .block_on(client.head_bucket().bucket(&self.params.bucket).send())
            .with_context(|| format!("Bucket {} is not accessible", self.params.bucket))?;

        debug!("Bucket {} is accessible", self.params.bucket);
        self.session = Some(Session { runtime, client });
        Ok(())
    }

    fn session(&self) -> Result<&Session> {
        self.session
            .as_ref()
            .context("S3 destination used before initialization")
    }
}

/// Build a client from the default provider chain, honouring custom
/// shared credential/config files, profile, region and endpoint
async fn create_client(params: &S3Params) -> Client {
    let mut loader = aws_config::defaults(BehaviorVersion::latest());

    if params.credentials.is_some() || params.config.is_some() {
        let mut files = ProfileFiles::builder()
            .include_default_credentials_file(params.credentials.is_none())
            .include_default_config_file(params.config.is_none());
        if let Some(ref path) = params.credentials {
            files = files.with_file(ProfileFileKind::Credentials, path);
        }
        if let Some(ref path) = params.config {
            files = files.with_file(ProfileFileKind::Config, path);
        }
        loader = loader.profile_files(files.build());
    }

    if let Some(ref profile) = params.profile {
        loader = loader.profile_name(profile);
    }

    if let Some(ref region) = params.region {
        loader = loader.region(Region::new(region.clone()));
    }

    let sdk_config = loader.load().await;
    let mut s3_config_builder = aws_sdk_s3::config::Builder::from(&sdk_config);

    if let Some(ref endpoint_url) = params.endpoint {
        debug!("Using custom S3 endpoint: {}", endpoint_url);
        s3_config_builder = s3_config_builder
            .endpoint_url(endpoint_url)
            .force_path_style(true);
    }

    Client::from_conf(s3_config_builder.build())
}

/// Artifacts of one listing page; objects without a modification time are skipped
fn listed_artifacts(naming: &ArtifactNaming, prefix: &str, objects: Vec<Object>) -> Vec<BackupItem> {
    objects
        .into_iter()
        .filter_map(|object| {
            let key = object.key?;
            if !is_listed_artifact(naming, prefix, &key) {
                return None;
            }

            let modified = object
                .last_modified
                .and_then(|t| DateTime::<Utc>::from_timestamp(t.secs(), t.subsec_nanos()));
            match modified {
                Some(modified) => Some(BackupItem::new(key, modified)),
                None => {
                    warn!("Skipping {}: no modification time reported", key);
                    None
                }
            }
        })
        .collect()
}

/// Token of the next listing page, if there is one
fn next_page_token(is_truncated: Option<bool>, token: Option<String>) -> Option<String> {
    match is_truncated {
        Some(true) => token,
        _ => None,
    }
}

impl Destination for S3Destination {
    fn name(&self) -> &'static str {
        "s3"
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

        session.runtime.block_on(async {
            let body = ByteStream::from_path(&artifact.path)
                .await
                .with_context(|| format!("Failed to read artifact {:?}", artifact.path))?;

            session
                .client
                .put_object()
                .bucket(&self.params.bucket)
                .key(&key)
                .body(body)
                .send()
                .await
                .with_context(|| format!("Failed to upload s3://{}/{}", self.params.bucket, key))?;

            Ok::<(), anyhow::Error>(())
        })?;

        info!("Uploaded s3://{}/{}", self.params.bucket, key);
        Ok(())
    }

    fn list_artifacts(&self) -> Result<Vec<BackupItem>> {
        let session = self.session()?;
        let prefix = folder_prefix(&self.params.folder);
        debug!("Listing s3://{}/{}", self.params.bucket, prefix);

        session.runtime.block_on(async {
            let mut items = Vec::new();
            let mut continuation_token: Option<String> = None;

            loop {
                let mut request = session
                    .client
                    .list_objects_v2()
                    .bucket(&self.params.bucket)
                    .prefix(&prefix);

                if let Some(token) = continuation_token {
                    request = request.continuation_token(token);
                }

                let resp = request
                    .send()
                    .await
                    .with_context(|| format!("Failed to list s3://{}/{}", self.params.bucket, prefix))?;

                items.extend(listed_artifacts(
                    &self.naming,
                    &prefix,
                    resp.contents.unwrap_or_default(),
                ));

                continuation_token =
                    next_page_token(resp.is_truncated, resp.next_continuation_token);
                if continuation_token.is_none() {
                    break;
                }
            }

            Ok::<_, anyhow::Error>(items)
        })
    }

    fn delete_artifacts(&self, items: &[BackupItem]) -> Result<()> {
        let session = self.session()?;

        delete_each(items, |item| {
            session
                .runtime
                .block_on(
                    session
                        .client
                        .delete_object()
                        .bucket(&self.params.bucket)
                        .key(&item.name)
                        .send(),
                )
                .with_context(|| format!("Failed to delete s3://{}/{}", self.params.bucket, item.name))?;
            Ok(())
        })
    }
}
