//! Experiment tracker contract and the explicit run context threaded through
//! every pipeline step.

use crate::artifacts::{RunManifest, RunStatus};
use crate::error::TrainingResult;
use crate::handle::Handle;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::debug;

/// Scheme prefix for logged model URIs.
pub const MODELS_SCHEME: &str = "models:/";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnSpec {
    pub name: Option<String>,
    #[serde(rename = "type")]
    pub dtype: String,
}

/// Input/output schema recorded with a logged model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelSignature {
    pub inputs: Vec<ColumnSpec>,
    pub outputs: Vec<ColumnSpec>,
}

/// Everything needed to log a model package.
#[derive(Debug, Clone)]
pub struct ModelPackage {
    /// Serialized model file, copied into the package as `model.json`.
    pub model_file: PathBuf,
    pub flavor: String,
    pub signature: ModelSignature,
    pub input_example: serde_json::Value,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelInfo {
    pub model_id: String,
    pub model_uri: String,
    pub run_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelVersion {
    pub name: String,
    pub version: u32,
    pub model_uri: String,
    pub created_at: DateTime<Utc>,
}

/// Storage backend for runs, metrics, artifacts and registered models.
///
/// Implementations must make a logged artifact durable before returning.
pub trait Tracker: Send + Sync {
    fn start_run(&self, experiment: &str) -> TrainingResult<RunManifest>;

    fn get_run(&self, run_id: &str) -> TrainingResult<RunManifest>;

    fn end_run(&self, run_id: &str, status: RunStatus) -> TrainingResult<()>;

    fn log_param(&self, run_id: &str, key: &str, value: &str) -> TrainingResult<()>;

    fn log_metric(&self, run_id: &str, key: &str, value: f64) -> TrainingResult<()>;

    /// Store `local_path` under `<artifact_path>/<file name>` and return that
    /// relative path.
    fn log_artifact(&self, run_id: &str, local_path: &Path, artifact_path: &str) -> TrainingResult<String>;

    /// Log several `(local_path, artifact_path)` files as one unit: either all
    /// of them are published or none is.
    fn log_artifacts(&self, run_id: &str, files: &[(&Path, &str)]) -> TrainingResult<Vec<String>>;

    fn log_dict(&self, run_id: &str, value: &serde_json::Value, artifact_file: &str) -> TrainingResult<()>;

    /// Resolve a run-relative artifact path to a readable local file.
    fn download_artifacts(&self, run_id: &str, artifact_path: &str) -> TrainingResult<PathBuf>;

    fn run_metrics(&self, run_id: &str) -> TrainingResult<BTreeMap<String, f64>>;

    fn log_model(&self, run_id: &str, package: &ModelPackage) -> TrainingResult<ModelInfo>;

    fn register_model(&self, model_uri: &str, name: &str) -> TrainingResult<ModelVersion>;
}

/// Handle on one active run. Every tracker call a step makes goes through it.
#[derive(Clone)]
pub struct ActiveRun {
    tracker: Arc<dyn Tracker>,
    run_id: String,
    experiment: String,
}

impl std::fmt::Debug for ActiveRun {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ActiveRun")
            .field("run_id", &self.run_id)
            .field("experiment", &self.experiment)
            .finish_non_exhaustive()
    }
}

impl ActiveRun {
    pub fn start(tracker: Arc<dyn Tracker>, experiment: &str) -> TrainingResult<Self> {
        let manifest = tracker.start_run(experiment)?;
        debug!(run_id = %manifest.run_id, experiment, "started run");
        Ok(Self { tracker, run_id: manifest.run_id, experiment: manifest.experiment })
    }

    /// Attach to a run started by an earlier process.
    pub fn resume(tracker: Arc<dyn Tracker>, run_id: &str) -> TrainingResult<Self> {
        let manifest = tracker.get_run(run_id)?;
        debug!(run_id, experiment = %manifest.experiment, "resumed run");
        Ok(Self { tracker, run_id: manifest.run_id, experiment: manifest.experiment })
    }

    #[must_use]
    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    #[must_use]
    pub fn experiment(&self) -> &str {
        &self.experiment
    }

    #[must_use]
    pub fn tracker(&self) -> &Arc<dyn Tracker> {
        &self.tracker
    }

    pub fn log_param(&self, key: &str, value: impl ToString) -> TrainingResult<()> {
        self.tracker.log_param(&self.run_id, key, &value.to_string())
    }

    pub fn log_metric(&self, key: &str, value: f64) -> TrainingResult<()> {
        self.tracker.log_metric(&self.run_id, key, value)
    }

    pub fn log_artifact<K>(&self, local_path: &Path, artifact_path: &str) -> TrainingResult<Handle<K>> {
        let rel = self.tracker.log_artifact(&self.run_id, local_path, artifact_path)?;
        Ok(Handle::new(rel))
    }

    pub fn log_artifacts(&self, files: &[(&Path, &str)]) -> TrainingResult<Vec<String>> {
        self.tracker.log_artifacts(&self.run_id, files)
    }

    pub fn log_dict(&self, value: &serde_json::Value, artifact_file: &str) -> TrainingResult<()> {
        self.tracker.log_dict(&self.run_id, value, artifact_file)
    }

    /// Resolve a handle. Run-qualified handles are looked up in their own run.
    pub fn download_artifacts<K>(&self, handle: &Handle<K>) -> TrainingResult<PathBuf> {
        match handle.run_scope() {
            Some((run_id, rel)) => self.tracker.download_artifacts(run_id, rel),
            None => self.tracker.download_artifacts(&self.run_id, handle.as_str()),
        }
    }

    pub fn metrics(&self) -> TrainingResult<BTreeMap<String, f64>> {
        self.tracker.run_metrics(&self.run_id)
    }

    pub fn log_model(&self, package: &ModelPackage) -> TrainingResult<ModelInfo> {
        self.tracker.log_model(&self.run_id, package)
    }

    pub fn register_model(&self, model_uri: &str, name: &str) -> TrainingResult<ModelVersion> {
        self.tracker.register_model(model_uri, name)
    }

    pub fn end(&self, status: RunStatus) -> TrainingResult<()> {
        debug!(run_id = %self.run_id, ?status, "ending run");
        self.tracker.end_run(&self.run_id, status)
    }
}
