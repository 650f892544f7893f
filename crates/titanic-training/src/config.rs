//! Pipeline configuration: defaults, then an optional TOML file, then
//! environment overrides.

use crate::error::{TrainingError, TrainingResult};
use crate::local_tracker::LocalTracker;
use crate::model::TrainParams;
use crate::steps::{DataSource, DEFAULT_MODEL_NAME};
use crate::store::{FsObjectStore, HttpObjectStore, ObjectStore};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

/// Config file looked up in the working directory when none is given.
pub const DEFAULT_CONFIG_FILE: &str = "titanic.toml";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DataConfig {
    /// Object-store bucket. Unset means read from `data_dir`.
    pub bucket: Option<String>,
    /// HTTP object store endpoint. Unset means buckets are directories under
    /// `data_dir`.
    pub object_store_url: Option<String>,
    pub data_dir: PathBuf,
    /// Object key (or file name under `data_dir`) of the raw dataset.
    pub key: String,
    pub timeout_secs: u64,
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            bucket: None,
            object_store_url: None,
            data_dir: PathBuf::from("data"),
            key: "all_titanic.csv".to_string(),
            timeout_secs: 30,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackingConfig {
    pub uri: String,
    pub experiment: String,
    pub model_name: String,
}

impl Default for TrackingConfig {
    fn default() -> Self {
        Self {
            uri: "mlruns".to_string(),
            experiment: "titanic".to_string(),
            model_name: DEFAULT_MODEL_NAME.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub data: DataConfig,
    pub tracking: TrackingConfig,
    pub train: TrainParams,
}

impl PipelineConfig {
    pub fn load_from_file(path: &Path) -> TrainingResult<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| TrainingError::Config(format!("{}: {e}", path.display())))?;
        toml::from_str(&content).map_err(|e| TrainingError::Config(format!("{}: {e}", path.display())))
    }

    /// Load `path`, or `titanic.toml` if present, then apply `env`.
    ///
    /// An explicit path that does not exist is an error; a missing default
    /// file is not.
    pub fn load(path: Option<&Path>, env: &dyn Fn(&str) -> Option<String>) -> TrainingResult<Self> {
        let mut config = match path {
            Some(path) => Self::load_from_file(path)?,
            None if Path::new(DEFAULT_CONFIG_FILE).is_file() => Self::load_from_file(Path::new(DEFAULT_CONFIG_FILE))?,
            None => Self::default(),
        };
        config.apply_env(env);
        config.train.validate()?;
        Ok(config)
    }

    /// Override fields from environment variables. Empty values are ignored.
    pub fn apply_env(&mut self, env: &dyn Fn(&str) -> Option<String>) {
        let get = |key: &str| env(key).filter(|v| !v.trim().is_empty());

        if let Some(v) = get("TITANIC_BUCKET") {
            self.data.bucket = Some(v);
        }
        if let Some(v) = get("TITANIC_OBJECT_STORE_URL") {
            self.data.object_store_url = Some(v);
        }
        if let Some(v) = get("TITANIC_DATA_DIR") {
            self.data.data_dir = PathBuf::from(v);
        }
        if let Some(v) = get("MLFLOW_TRACKING_URI") {
            self.tracking.uri = v;
        }
        if let Some(v) = get("TITANIC_EXPERIMENT") {
            self.tracking.experiment = v;
        }
        if let Some(v) = get("TITANIC_MODEL_NAME") {
            self.tracking.model_name = v;
        }
    }

    #[must_use]
    pub fn tracker(&self) -> LocalTracker {
        LocalTracker::from_uri(&self.tracking.uri)
    }

    pub fn data_source(&self) -> TrainingResult<DataSource> {
        let store: Arc<dyn ObjectStore> = match &self.data.object_store_url {
            Some(url) => Arc::new(HttpObjectStore::new(url.clone(), Duration::from_secs(self.data.timeout_secs))?),
            None => Arc::new(FsObjectStore::new(self.data.data_dir.clone())),
        };
        Ok(DataSource::new(store, self.data.bucket.clone(), self.data.data_dir.clone()))
    }
}
