use super::{DATASET_ARTIFACT_DIR, DATASET_FILE, FEATURES, TARGET};
use crate::error::{TrainingError, TrainingResult};
use crate::handle::DatasetHandle;
use crate::store::ObjectStore;
use crate::table::Frame;
use crate::tracker::ActiveRun;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::TempDir;
use tracing::{debug, info, warn};

/// Where the raw dataset comes from: a bucket in an object store, or a
/// local directory when no bucket is configured.
#[derive(Clone)]
pub struct DataSource {
    store: Arc<dyn ObjectStore>,
    bucket: Option<String>,
    data_dir: PathBuf,
}

impl std::fmt::Debug for DataSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DataSource")
            .field("store", &self.store.id())
            .field("bucket", &self.bucket)
            .field("data_dir", &self.data_dir)
            .finish()
    }
}

impl DataSource {
    pub fn new(store: Arc<dyn ObjectStore>, bucket: Option<String>, data_dir: PathBuf) -> Self {
        let bucket = bucket.filter(|b| !b.trim().is_empty());
        Self { store, bucket, data_dir }
    }

    #[must_use]
    pub fn bucket(&self) -> Option<&str> {
        self.bucket.as_deref()
    }

    #[must_use]
    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    async fn fetch(&self, remote_key: &str, staged: &Path) -> TrainingResult<()> {
        match &self.bucket {
            Some(bucket) => {
                debug!(store = self.store.id(), bucket, key = remote_key, "downloading dataset");
                self.store.download(bucket, remote_key, staged).await
            }
            None => {
                let local = self.data_dir.join(remote_key);
                warn!(path = %local.display(), "no bucket configured, using local dataset");
                if !local.is_file() {
                    return Err(TrainingError::DataUnavailable(format!(
                        "local dataset not found: {}",
                        local.display()
                    )));
                }
                tokio::fs::copy(&local, staged).await?;
                Ok(())
            }
        }
    }
}

/// Fetch `remote_key`, check it is a usable passenger table, and log it as
/// `path_output/data.csv`.
pub async fn load_data(run: &ActiveRun, source: &DataSource, remote_key: &str) -> TrainingResult<DatasetHandle> {
    if remote_key.trim().is_empty() {
        return Err(TrainingError::DataUnavailable("empty dataset key".to_string()));
    }
    let temp = TempDir::new()?;
    let staged = temp.path().join(DATASET_FILE);
    source.fetch(remote_key, &staged).await?;

    let frame = Frame::read_csv(&staged)
        .map_err(|e| TrainingError::DataUnavailable(format!("{remote_key} is not a readable CSV table: {e}")))?;
    if frame.is_empty() {
        return Err(TrainingError::DataUnavailable(format!("{remote_key} has no rows")));
    }
    let mut required = FEATURES.to_vec();
    required.push(TARGET);
    frame.require_columns(&required)?;

    let handle = run.log_artifact(&staged, DATASET_ARTIFACT_DIR)?;
    info!(run_id = run.run_id(), rows = frame.len(), %handle, "dataset loaded");
    Ok(handle)
}
