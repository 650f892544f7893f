use crate::artifacts::{RunManifest, RunStatus};
use crate::error::{TrainingError, TrainingResult};
use crate::layout::TrackingLayout;
use crate::tracker::{ModelVersion, MODELS_SCHEME};
use std::path::Path;
use tracing::info;

fn read_manifest(path: &Path) -> TrainingResult<RunManifest> {
    let bytes = std::fs::read(path)?;
    Ok(serde_json::from_slice::<RunManifest>(&bytes)?)
}

/// Registered versions stored in `dir`, ordered by version number.
pub fn read_versions(dir: &Path) -> TrainingResult<Vec<ModelVersion>> {
    let mut out = Vec::new();
    let entries = match std::fs::read_dir(dir) {
        Ok(d) => d,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(out),
        Err(e) => return Err(e.into()),
    };

    for entry in entries {
        let path = entry?.path();
        let is_version = path
            .file_name()
            .and_then(|n| n.to_str())
            .is_some_and(|n| n.starts_with("version-") && n.ends_with(".json"));
        if !is_version {
            continue;
        }
        let bytes = std::fs::read(&path)?;
        out.push(serde_json::from_slice::<ModelVersion>(&bytes)?);
    }

    out.sort_by_key(|v| v.version);
    Ok(out)
}

pub fn registered_versions(layout: &TrackingLayout, name: &str) -> TrainingResult<Vec<ModelVersion>> {
    read_versions(&layout.registry_dir(name))
}

/// All runs of an experiment, by scanning `<root>/<experiment>/*/run.json`.
pub fn list_runs(layout: &TrackingLayout, experiment: &str) -> TrainingResult<Vec<RunManifest>> {
    let mut out = Vec::new();
    let dir = match std::fs::read_dir(layout.experiment_dir(experiment)) {
        Ok(d) => d,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(out),
        Err(e) => return Err(e.into()),
    };

    for entry in dir {
        let run_dir = entry?.path();
        let manifest_path = run_dir.join("run.json");
        if !manifest_path.is_file() {
            continue;
        }
        out.push(read_manifest(&manifest_path)?);
    }

    Ok(out)
}

/// URI of the model logged by the most recently finished run of `experiment`.
pub fn latest_model_uri(layout: &TrackingLayout, experiment: &str) -> TrainingResult<String> {
    let mut runs: Vec<RunManifest> = list_runs(layout, experiment)?
        .into_iter()
        .filter(|r| r.status == RunStatus::Finished && !r.models.is_empty())
        .collect();
    runs.sort_by_key(|r| (r.ended_at, r.started_at));

    let run = runs.last().ok_or_else(|| {
        TrainingError::Tracking(format!("no finished run with a logged model in experiment {experiment}"))
    })?;
    let model_id = run
        .models
        .last()
        .ok_or_else(|| TrainingError::Tracking(format!("run {} has no model", run.run_id)))?;

    let uri = format!("{MODELS_SCHEME}{model_id}");
    info!(experiment, run_id = %run.run_id, %uri, "resolved latest model");
    Ok(uri)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::local_tracker::LocalTracker;
    use crate::tracker::{ModelPackage, ModelSignature, Tracker};
    use tempfile::TempDir;

    fn log_dummy_model(tracker: &LocalTracker, run_id: &str, dir: &Path) -> String {
        let model_file = dir.join("model.json");
        std::fs::write(&model_file, "{}").unwrap();
        let package = ModelPackage {
            model_file,
            flavor: "random_forest".to_string(),
            signature: ModelSignature { inputs: vec![], outputs: vec![] },
            input_example: serde_json::json!({}),
        };
        tracker.log_model(run_id, &package).unwrap().model_uri
    }

    #[test]
    fn test_latest_model_uri_picks_last_finished_run() {
        let temp = TempDir::new().unwrap();
        let tracker = LocalTracker::new(temp.path().join("mlruns"));

        let first = tracker.start_run("titanic").unwrap();
        log_dummy_model(&tracker, &first.run_id, temp.path());
        tracker.end_run(&first.run_id, RunStatus::Finished).unwrap();

        let second = tracker.start_run("titanic").unwrap();
        let second_uri = log_dummy_model(&tracker, &second.run_id, temp.path());
        tracker.end_run(&second.run_id, RunStatus::Finished).unwrap();

        // Failed and still-running runs are ignored.
        let failed = tracker.start_run("titanic").unwrap();
        log_dummy_model(&tracker, &failed.run_id, temp.path());
        tracker.end_run(&failed.run_id, RunStatus::Failed).unwrap();
        let running = tracker.start_run("titanic").unwrap();
        log_dummy_model(&tracker, &running.run_id, temp.path());

        let uri = latest_model_uri(tracker.layout(), "titanic").unwrap();
        assert_eq!(uri, second_uri);
        assert_eq!(list_runs(tracker.layout(), "titanic").unwrap().len(), 4);
    }

    #[test]
    fn test_latest_model_uri_errors_without_models() {
        let temp = TempDir::new().unwrap();
        let layout = TrackingLayout::new(temp.path().to_path_buf());
        assert!(latest_model_uri(&layout, "titanic").is_err());
        assert!(registered_versions(&layout, "titanic-survival").unwrap().is_empty());
    }
}
