//! Remote object storage the dataset loader downloads from.

use crate::error::{TrainingError, TrainingResult};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;

#[async_trait]
pub trait ObjectStore: Send + Sync {
    fn id(&self) -> &'static str;

    /// Download `bucket/key` to `local_path`. Fails if the object does not exist.
    async fn download(&self, bucket: &str, key: &str, local_path: &Path) -> TrainingResult<()>;
}

fn check_key(key: &str) -> TrainingResult<()> {
    if key.is_empty() || key.starts_with('/') || key.split('/').any(|part| part == "..") {
        return Err(TrainingError::DataUnavailable(format!("invalid object key: {key:?}")));
    }
    Ok(())
}

/// S3-compatible store addressed path-style: `GET <endpoint>/<bucket>/<key>`.
#[derive(Debug, Clone)]
pub struct HttpObjectStore {
    endpoint: String,
    client: reqwest::Client,
}

impl HttpObjectStore {
    pub fn new(endpoint: impl Into<String>, timeout: Duration) -> TrainingResult<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { endpoint: endpoint.into().trim_end_matches('/').to_string(), client })
    }
}

#[async_trait]
impl ObjectStore for HttpObjectStore {
    fn id(&self) -> &'static str {
        "http"
    }

    async fn download(&self, bucket: &str, key: &str, local_path: &Path) -> TrainingResult<()> {
        check_key(key)?;
        let url = format!("{}/{bucket}/{key}", self.endpoint);
        debug!(%url, "downloading object");

        let response = self.client.get(&url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(TrainingError::DataUnavailable(format!("GET {url} returned {status}")));
        }
        let bytes = response.bytes().await?;
        tokio::fs::write(local_path, &bytes).await?;
        Ok(())
    }
}

/// Buckets are directories under `root`.
#[derive(Debug, Clone)]
pub struct FsObjectStore {
    root: PathBuf,
}

impl FsObjectStore {
    #[must_use]
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }
}

#[async_trait]
impl ObjectStore for FsObjectStore {
    fn id(&self) -> &'static str {
        "fs"
    }

    async fn download(&self, bucket: &str, key: &str, local_path: &Path) -> TrainingResult<()> {
        check_key(key)?;
        let src = self.root.join(bucket).join(key);
        debug!(src = %src.display(), "copying object");
        tokio::fs::copy(&src, local_path).await.map_err(|e| {
            TrainingError::DataUnavailable(format!("{bucket}/{key}: {e}"))
        })?;
        Ok(())
    }
}
