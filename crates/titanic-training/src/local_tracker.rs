//! File-backed [`Tracker`] used for local runs and tests.

use crate::artifacts::{make_artifact, RunManifest, RunStatus};
use crate::error::{TrainingError, TrainingResult};
use crate::layout::TrackingLayout;
use crate::tracker::{ModelInfo, ModelPackage, ModelVersion, Tracker, MODELS_SCHEME};
use chrono::Utc;
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use std::path::{Component, Path, PathBuf};
use std::sync::{Mutex, MutexGuard};
use tracing::debug;
use uuid::Uuid;

/// Directory names under the root that are not experiments.
const RESERVED_DIRS: [&str; 2] = ["models", "registry"];

pub struct LocalTracker {
    layout: TrackingLayout,
    /// run id -> experiment. Also serializes manifest read-modify-write.
    runs: Mutex<HashMap<String, String>>,
}

impl LocalTracker {
    #[must_use]
    pub fn new(root: PathBuf) -> Self {
        Self::with_layout(TrackingLayout::new(root))
    }

    #[must_use]
    pub fn from_uri(uri: &str) -> Self {
        Self::with_layout(TrackingLayout::from_uri(uri))
    }

    #[must_use]
    pub fn with_layout(layout: TrackingLayout) -> Self {
        Self { layout, runs: Mutex::new(HashMap::new()) }
    }

    #[must_use]
    pub fn layout(&self) -> &TrackingLayout {
        &self.layout
    }

    fn lock(&self) -> TrainingResult<MutexGuard<'_, HashMap<String, String>>> {
        self.runs.lock().map_err(|_| TrainingError::Tracking("tracker state lock poisoned".to_string()))
    }

    fn experiment_of(&self, runs: &mut HashMap<String, String>, run_id: &str) -> TrainingResult<String> {
        if let Some(exp) = runs.get(run_id) {
            return Ok(exp.clone());
        }
        if run_id.is_empty() || run_id.contains(['/', '\\']) || run_id.starts_with('.') {
            return Err(TrainingError::Tracking(format!("invalid run id: {run_id}")));
        }

        let entries = match std::fs::read_dir(self.layout.root()) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(TrainingError::Tracking(format!("run not found: {run_id}")));
            }
            Err(e) => return Err(e.into()),
        };

        for entry in entries {
            let entry = entry?;
            let Some(name) = entry.file_name().to_str().map(str::to_string) else {
                continue;
            };
            if RESERVED_DIRS.contains(&name.as_str()) || !entry.path().is_dir() {
                continue;
            }
            if self.layout.run_manifest_path(&name, run_id).is_file() {
                runs.insert(run_id.to_string(), name.clone());
                return Ok(name);
            }
        }

        Err(TrainingError::Tracking(format!("run not found: {run_id}")))
    }

    fn read_manifest(&self, experiment: &str, run_id: &str) -> TrainingResult<RunManifest> {
        let bytes = std::fs::read(self.layout.run_manifest_path(experiment, run_id))?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    fn write_manifest(&self, manifest: &RunManifest) -> TrainingResult<()> {
        let path = self.layout.run_manifest_path(&manifest.experiment, &manifest.run_id);
        write_json_atomic(&path, manifest)
    }

    fn update_manifest<F>(&self, run_id: &str, f: F) -> TrainingResult<RunManifest>
    where
        F: FnOnce(&mut RunManifest, &Path) -> TrainingResult<()>,
    {
        let mut runs = self.lock()?;
        let experiment = self.experiment_of(&mut runs, run_id)?;
        let mut manifest = self.read_manifest(&experiment, run_id)?;
        if manifest.status != RunStatus::Running {
            return Err(TrainingError::Tracking(format!("run {run_id} is not active")));
        }
        let artifacts_dir = self.layout.artifacts_dir(&experiment, run_id);
        f(&mut manifest, artifacts_dir.as_path())?;
        self.write_manifest(&manifest)?;
        Ok(manifest)
    }

    fn model_package_dir(&self, model_uri: &str) -> TrainingResult<(String, PathBuf)> {
        let model_id = model_uri
            .strip_prefix(MODELS_SCHEME)
            .filter(|id| !id.is_empty() && !id.contains(['/', '\\']) && !id.starts_with('.'))
            .ok_or_else(|| TrainingError::Tracking(format!("invalid model uri: {model_uri}")))?;
        let dir = self.layout.model_dir(model_id);
        if !dir.join("MLmodel.json").is_file() {
            return Err(TrainingError::Tracking(format!("model not found: {model_uri}")));
        }
        Ok((model_id.to_string(), dir))
    }
}

impl Tracker for LocalTracker {
    fn start_run(&self, experiment: &str) -> TrainingResult<RunManifest> {
        if experiment.trim().is_empty()
            || experiment.contains(['/', '\\'])
            || experiment.starts_with('.')
            || RESERVED_DIRS.contains(&experiment)
        {
            return Err(TrainingError::Tracking(format!("invalid experiment name: {experiment:?}")));
        }

        let run_id = Uuid::new_v4().simple().to_string();
        self.layout.ensure_run_dirs(experiment, &run_id)?;

        let manifest = RunManifest {
            run_id: run_id.clone(),
            experiment: experiment.to_string(),
            status: RunStatus::Running,
            started_at: Utc::now(),
            ended_at: None,
            params: BTreeMap::new(),
            artifacts: Vec::new(),
            models: Vec::new(),
        };
        self.write_manifest(&manifest)?;
        self.lock()?.insert(run_id, experiment.to_string());
        Ok(manifest)
    }

    fn get_run(&self, run_id: &str) -> TrainingResult<RunManifest> {
        let mut runs = self.lock()?;
        let experiment = self.experiment_of(&mut runs, run_id)?;
        self.read_manifest(&experiment, run_id)
    }

    fn end_run(&self, run_id: &str, status: RunStatus) -> TrainingResult<()> {
        self.update_manifest(run_id, |manifest, _| {
            manifest.status = status;
            manifest.ended_at = Some(Utc::now());
            Ok(())
        })?;
        Ok(())
    }

    fn log_param(&self, run_id: &str, key: &str, value: &str) -> TrainingResult<()> {
        self.update_manifest(run_id, |manifest, _| {
            manifest.params.insert(key.to_string(), value.to_string());
            Ok(())
        })?;
        Ok(())
    }

    fn log_metric(&self, run_id: &str, key: &str, value: f64) -> TrainingResult<()> {
        if !value.is_finite() {
            return Err(TrainingError::Tracking(format!("metric {key} is not finite: {value}")));
        }
        let mut runs = self.lock()?;
        let experiment = self.experiment_of(&mut runs, run_id)?;
        if self.read_manifest(&experiment, run_id)?.status != RunStatus::Running {
            return Err(TrainingError::Tracking(format!("run {run_id} is not active")));
        }
        let path = self.layout.metrics_path(&experiment, run_id);
        let mut metrics = read_metrics(&path)?;
        metrics.insert(key.to_string(), value);
        write_json_atomic(&path, &metrics)
    }

    fn log_artifact(&self, run_id: &str, local_path: &Path, artifact_path: &str) -> TrainingResult<String> {
        let mut rels = self.log_artifacts(run_id, &[(local_path, artifact_path)])?;
        rels.pop().ok_or_else(|| TrainingError::Tracking("no artifact logged".to_string()))
    }

    fn log_artifacts(&self, run_id: &str, files: &[(&Path, &str)]) -> TrainingResult<Vec<String>> {
        let mut planned = Vec::with_capacity(files.len());
        for (local_path, artifact_path) in files {
            let rel = artifact_rel(local_path, artifact_path)?;
            let rel_path = safe_relative(&rel)?;
            planned.push((*local_path, rel, rel_path));
        }

        self.update_manifest(run_id, |manifest, artifacts_dir| {
            let staged: Vec<(PathBuf, PathBuf)> = planned
                .iter()
                .map(|(_, _, rel_path)| {
                    let dest = artifacts_dir.join(rel_path);
                    (partial_path(&dest), dest)
                })
                .collect();
            // Stage every file before any becomes visible.
            for ((src, _, _), (tmp, _)) in planned.iter().zip(&staged) {
                if let Err(e) = stage_copy(src, tmp) {
                    for (tmp, _) in &staged {
                        let _ = std::fs::remove_file(tmp);
                    }
                    return Err(e);
                }
            }
            for ((_, rel, _), (tmp, dest)) in planned.iter().zip(&staged) {
                std::fs::rename(tmp, dest)?;
                let record = make_artifact(rel, dest)?;
                manifest.artifacts.retain(|a| &a.path != rel);
                manifest.artifacts.push(record);
            }
            Ok(())
        })?;

        let rels: Vec<String> = planned.into_iter().map(|(_, rel, _)| rel).collect();
        debug!(run_id, artifacts = ?rels, "logged artifacts");
        Ok(rels)
    }

    fn log_dict(&self, run_id: &str, value: &serde_json::Value, artifact_file: &str) -> TrainingResult<()> {
        let rel_path = safe_relative(artifact_file)?;
        self.update_manifest(run_id, |manifest, artifacts_dir| {
            let dest = artifacts_dir.join(&rel_path);
            write_json_atomic(&dest, value)?;
            let record = make_artifact(artifact_file, &dest)?;
            manifest.artifacts.retain(|a| a.path != artifact_file);
            manifest.artifacts.push(record);
            Ok(())
        })?;
        debug!(run_id, artifact = artifact_file, "logged dict");
        Ok(())
    }

    fn download_artifacts(&self, run_id: &str, artifact_path: &str) -> TrainingResult<PathBuf> {
        let rel_path = safe_relative(artifact_path)
            .map_err(|e| TrainingError::resolution(artifact_path, e.to_string()))?;
        let experiment = {
            let mut runs = self.lock()?;
            self.experiment_of(&mut runs, run_id)
                .map_err(|e| TrainingError::resolution(artifact_path, e.to_string()))?
        };

        let path = self.layout.artifacts_dir(&experiment, run_id).join(rel_path);
        if !path.is_file() {
            return Err(TrainingError::resolution(
                artifact_path,
                format!("no such artifact in run {run_id}"),
            ));
        }
        Ok(path)
    }

    fn run_metrics(&self, run_id: &str) -> TrainingResult<BTreeMap<String, f64>> {
        let mut runs = self.lock()?;
        let experiment = self.experiment_of(&mut runs, run_id)?;
        read_metrics(&self.layout.metrics_path(&experiment, run_id))
    }

    fn log_model(&self, run_id: &str, package: &ModelPackage) -> TrainingResult<ModelInfo> {
        let model_id = format!("m-{}", Uuid::new_v4().simple());
        let final_dir = self.layout.model_dir(&model_id);
        let staging = self.layout.models_dir().join(format!(".{model_id}.partial"));

        self.update_manifest(run_id, |manifest, _| {
            std::fs::create_dir_all(&staging)?;
            let staged = (|| -> TrainingResult<()> {
                std::fs::copy(&package.model_file, staging.join("model.json"))?;
                let mlmodel = serde_json::json!({
                    "model_id": model_id,
                    "run_id": run_id,
                    "flavor": package.flavor,
                    "model_file": "model.json",
                    "signature": package.signature,
                    "created_at": Utc::now(),
                });
                write_json_atomic(&staging.join("MLmodel.json"), &mlmodel)?;
                write_json_atomic(&staging.join("input_example.json"), &package.input_example)?;
                std::fs::rename(&staging, &final_dir)?;
                Ok(())
            })();
            if staged.is_err() {
                let _ = std::fs::remove_dir_all(&staging);
            }
            staged?;
            manifest.models.push(model_id.clone());
            Ok(())
        })?;

        let model_uri = format!("{MODELS_SCHEME}{model_id}");
        debug!(run_id, %model_uri, "logged model");
        Ok(ModelInfo { model_id, model_uri, run_id: run_id.to_string() })
    }

    fn register_model(&self, model_uri: &str, name: &str) -> TrainingResult<ModelVersion> {
        safe_relative(name).map_err(|_| TrainingError::Tracking(format!("invalid model name: {name}")))?;
        self.model_package_dir(model_uri)?;

        // Held so concurrent registrations cannot claim the same version.
        let _guard = self.lock()?;
        let dir = self.layout.registry_dir(name);
        std::fs::create_dir_all(&dir)?;
        let latest = crate::registry::read_versions(&dir)?.last().map_or(0, |v| v.version);

        let version = ModelVersion {
            name: name.to_string(),
            version: latest + 1,
            model_uri: model_uri.to_string(),
            created_at: Utc::now(),
        };
        write_json_atomic(&self.layout.registered_version_path(name, version.version), &version)?;
        debug!(name, version = version.version, "registered model version");
        Ok(version)
    }
}

/// Validate a `/`-separated relative path: no root, no `..`, not empty.
fn safe_relative(path: &str) -> TrainingResult<PathBuf> {
    let p = Path::new(path);
    if path.is_empty() || !p.components().all(|c| matches!(c, Component::Normal(_))) {
        return Err(TrainingError::Tracking(format!("artifact path must be relative and normalized: {path:?}")));
    }
    Ok(p.to_path_buf())
}

fn read_metrics(path: &Path) -> TrainingResult<BTreeMap<String, f64>> {
    match std::fs::read(path) {
        Ok(bytes) => Ok(serde_json::from_slice(&bytes)?),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(BTreeMap::new()),
        Err(e) => Err(e.into()),
    }
}

fn partial_path(dest: &Path) -> PathBuf {
    let name = dest.file_name().map(|n| n.to_string_lossy().to_string()).unwrap_or_default();
    dest.with_file_name(format!(".{name}.partial"))
}

/// Write next to `dest` and rename, so readers never see a half-written file.
fn write_json_atomic<T: Serialize + ?Sized>(dest: &Path, value: &T) -> TrainingResult<()> {
    if let Some(parent) = dest.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let tmp = partial_path(dest);
    std::fs::write(&tmp, serde_json::to_vec_pretty(value)?)?;
    std::fs::rename(&tmp, dest)?;
    Ok(())
}

fn artifact_rel(local_path: &Path, artifact_path: &str) -> TrainingResult<String> {
    let file_name = local_path
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| TrainingError::Tracking(format!("not a file: {}", local_path.display())))?;
    if artifact_path.is_empty() {
        Ok(file_name.to_string())
    } else {
        Ok(format!("{}/{file_name}", artifact_path.trim_end_matches('/')))
    }
}

fn stage_copy(src: &Path, tmp: &Path) -> TrainingResult<()> {
    if let Some(parent) = tmp.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::copy(src, tmp)?;
    std::fs::File::open(tmp)?.sync_all()?;
    Ok(())
}


#[cfg(test)]
mod tests {
    use super::*;
    use crate::tracker::{ColumnSpec, ModelSignature};
    use tempfile::TempDir;

    fn tracker() -> (TempDir, LocalTracker) {
        let temp = TempDir::new().unwrap();
        let tracker = LocalTracker::new(temp.path().join("mlruns"));
        (temp, tracker)
    }

    #[test]
    fn test_run_lifecycle() {
        let (_temp, tracker) = tracker();
        let run = tracker.start_run("titanic").unwrap();
        assert_eq!(run.status, RunStatus::Running);

        tracker.log_param(&run.run_id, "n_estimators", "10").unwrap();
        tracker.end_run(&run.run_id, RunStatus::Finished).unwrap();

        let stored = tracker.get_run(&run.run_id).unwrap();
        assert_eq!(stored.status, RunStatus::Finished);
        assert!(stored.ended_at.is_some());
        assert_eq!(stored.params.get("n_estimators").map(String::as_str), Some("10"));

        // Finished runs are read-only.
        assert!(tracker.log_param(&run.run_id, "x", "y").is_err());
    }

    #[test]
    fn test_get_run_scans_disk_for_unknown_ids() {
        let (temp, tracker) = tracker();
        let run = tracker.start_run("titanic").unwrap();

        let fresh = LocalTracker::new(temp.path().join("mlruns"));
        assert_eq!(fresh.get_run(&run.run_id).unwrap().experiment, "titanic");
        assert!(fresh.get_run("does-not-exist").is_err());
        assert!(fresh.get_run("../etc").is_err());
    }

    #[test]
    fn test_log_and_download_artifact() {
        let (temp, tracker) = tracker();
        let run = tracker.start_run("titanic").unwrap();
        let src = temp.path().join("xtrain.csv");
        std::fs::write(&src, "Pclass\n3\n").unwrap();

        let rel = tracker.log_artifact(&run.run_id, &src, "xtrain").unwrap();
        assert_eq!(rel, "xtrain/xtrain.csv");

        let resolved = tracker.download_artifacts(&run.run_id, &rel).unwrap();
        assert_eq!(std::fs::read_to_string(resolved).unwrap(), "Pclass\n3\n");

        let manifest = tracker.get_run(&run.run_id).unwrap();
        assert_eq!(manifest.artifacts.len(), 1);
        assert_eq!(manifest.artifacts[0].path, "xtrain/xtrain.csv");
    }

    #[test]
    fn test_download_rejects_missing_and_escaping_paths() {
        let (_temp, tracker) = tracker();
        let run = tracker.start_run("titanic").unwrap();

        let err = tracker.download_artifacts(&run.run_id, "nope.csv").unwrap_err();
        assert!(matches!(err, TrainingError::ArtifactResolution { .. }));
        let err = tracker.download_artifacts(&run.run_id, "../run.json").unwrap_err();
        assert!(matches!(err, TrainingError::ArtifactResolution { .. }));
        let err = tracker.download_artifacts("missing-run", "a.csv").unwrap_err();
        assert!(matches!(err, TrainingError::ArtifactResolution { .. }));
    }

    #[test]
    fn test_metrics_keep_latest_value() {
        let (_temp, tracker) = tracker();
        let run = tracker.start_run("titanic").unwrap();
        tracker.log_metric(&run.run_id, "mse", 0.5).unwrap();
        tracker.log_metric(&run.run_id, "mse", 0.25).unwrap();
        tracker.log_metric(&run.run_id, "mae", 0.25).unwrap();
        assert!(tracker.log_metric(&run.run_id, "r2", f64::NAN).is_err());

        let metrics = tracker.run_metrics(&run.run_id).unwrap();
        assert_eq!(metrics.len(), 2);
        assert_eq!(metrics["mse"], 0.25);
    }

    #[test]
    fn test_metrics_rejected_once_run_ends() {
        let (_temp, tracker) = tracker();
        let run = tracker.start_run("titanic").unwrap();
        tracker.log_metric(&run.run_id, "mse", 0.5).unwrap();
        tracker.end_run(&run.run_id, RunStatus::Failed).unwrap();

        let err = tracker.log_metric(&run.run_id, "mse", 0.1).unwrap_err();
        assert!(matches!(err, TrainingError::Tracking(_)));
        assert_eq!(tracker.run_metrics(&run.run_id).unwrap()["mse"], 0.5);
    }

    #[test]
    fn test_log_artifacts_is_all_or_nothing() {
        let (temp, tracker) = tracker();
        let run = tracker.start_run("titanic").unwrap();
        let xtrain = temp.path().join("xtrain.csv");
        let xtest = temp.path().join("xtest.csv");
        std::fs::write(&xtrain, "Pclass\n3\n").unwrap();
        std::fs::write(&xtest, "Pclass\n1\n").unwrap();
        let missing = temp.path().join("ytrain.csv");

        let err = tracker.log_artifacts(
            &run.run_id,
            &[(xtrain.as_path(), "xtrain"), (xtest.as_path(), "xtest"), (missing.as_path(), "ytrain")],
        );
        assert!(err.is_err());
        assert!(tracker.get_run(&run.run_id).unwrap().artifacts.is_empty());
        assert!(tracker.download_artifacts(&run.run_id, "xtrain/xtrain.csv").is_err());
        assert!(tracker.download_artifacts(&run.run_id, "xtest/xtest.csv").is_err());

        let rels = tracker
            .log_artifacts(&run.run_id, &[(xtrain.as_path(), "xtrain"), (xtest.as_path(), "xtest")])
            .unwrap();
        assert_eq!(rels, ["xtrain/xtrain.csv", "xtest/xtest.csv"]);
        assert_eq!(tracker.get_run(&run.run_id).unwrap().artifacts.len(), 2);
    }

    #[test]
    fn test_log_model_and_register_versions() {
        let (temp, tracker) = tracker();
        let run = tracker.start_run("titanic").unwrap();
        let model_file = temp.path().join("model.json");
        std::fs::write(&model_file, "{}").unwrap();

        let package = ModelPackage {
            model_file,
            flavor: "random_forest".to_string(),
            signature: ModelSignature {
                inputs: vec![ColumnSpec { name: Some("Pclass".into()), dtype: "double".into() }],
                outputs: vec![ColumnSpec { name: None, dtype: "long".into() }],
            },
            input_example: serde_json::json!({"Pclass": 3.0}),
        };
        let info = tracker.log_model(&run.run_id, &package).unwrap();
        assert!(info.model_uri.starts_with("models:/"));
        assert!(tracker.layout().model_dir(&info.model_id).join("input_example.json").is_file());

        let v1 = tracker.register_model(&info.model_uri, "titanic-survival").unwrap();
        let v2 = tracker.register_model(&info.model_uri, "titanic-survival").unwrap();
        assert_eq!((v1.version, v2.version), (1, 2));

        assert!(tracker.register_model("models:/missing", "titanic-survival").is_err());
        assert_eq!(tracker.get_run(&run.run_id).unwrap().models, vec![info.model_id]);
    }

    #[test]
    fn test_start_run_rejects_reserved_experiment() {
        let (_temp, tracker) = tracker();
        assert!(tracker.start_run("models").is_err());
        assert!(tracker.start_run("").is_err());
        assert!(tracker.start_run("../x").is_err());
    }
}
