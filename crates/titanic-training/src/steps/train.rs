use super::{MODEL_ARTIFACT_DIR, MODEL_FILE};
use crate::error::TrainingResult;
use crate::handle::{FeaturesHandle, ModelHandle, TargetHandle};
use crate::model::{TrainParams, TrainedModel};
use crate::table::Frame;
use crate::tracker::ActiveRun;
use tempfile::TempDir;
use tracing::{debug, info};

/// Fit the encoder and forest on the train split and log the serialized
/// model as `model_trained/model.json`.
pub fn train(
    run: &ActiveRun,
    xtrain: &FeaturesHandle,
    ytrain: &TargetHandle,
    params: TrainParams,
) -> TrainingResult<ModelHandle> {
    params.validate()?;
    let x = Frame::read_csv(&run.download_artifacts(xtrain)?)?;
    let y = Frame::read_csv(&run.download_artifacts(ytrain)?)?;
    debug!(rows = x.len(), ?params, "fitting random forest");

    let model = TrainedModel::fit(&x, &y, params)?;

    let temp = TempDir::new()?;
    let path = temp.path().join(MODEL_FILE);
    model.save(&path)?;
    let handle = run.log_artifact(&path, MODEL_ARTIFACT_DIR)?;
    info!(
        run_id = run.run_id(),
        features = model.feature_names().len(),
        n_estimators = params.n_estimators,
        %handle,
        "model trained"
    );
    Ok(handle)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::TrainingError;
    use crate::local_tracker::LocalTracker;
    use std::sync::Arc;

    fn log_frame<K>(run: &ActiveRun, dir: &TempDir, name: &str, csv: &str) -> crate::handle::Handle<K> {
        let path = dir.path().join(format!("{name}.csv"));
        std::fs::write(&path, csv).unwrap();
        run.log_artifact(&path, name).unwrap()
    }

    fn setup() -> (TempDir, ActiveRun, FeaturesHandle, TargetHandle) {
        let temp = TempDir::new().unwrap();
        let run = ActiveRun::start(Arc::new(LocalTracker::new(temp.path().join("mlruns"))), "t").unwrap();
        let mut x = String::from("Pclass,Sex,SibSp,Parch\n");
        let mut y = String::from("Survived\n");
        for i in 0..24 {
            let female = i % 3 == 0;
            x.push_str(&format!("{},{},{},0\n", 1 + i % 3, if female { "female" } else { "male" }, i % 2));
            y.push_str(if female { "1\n" } else { "0\n" });
        }
        let xh = log_frame(&run, &temp, "xtrain", &x);
        let yh = log_frame(&run, &temp, "ytrain", &y);
        (temp, run, xh, yh)
    }

    #[test]
    fn test_train_logs_model() {
        let (_temp, run, x, y) = setup();
        let params = TrainParams { n_estimators: 5, max_depth: 3, random_state: 42 };
        let handle = train(&run, &x, &y, params).unwrap();
        assert_eq!(handle.as_str(), "model_trained/model.json");

        let model = TrainedModel::load(&run.download_artifacts(&handle).unwrap()).unwrap();
        assert_eq!(model.params(), params);
    }

    #[test]
    fn test_train_is_deterministic() {
        let (_temp, run, x, y) = setup();
        let params = TrainParams { n_estimators: 8, max_depth: 4, random_state: 7 };
        let first = std::fs::read(run.download_artifacts(&train(&run, &x, &y, params).unwrap()).unwrap()).unwrap();
        let second = std::fs::read(run.download_artifacts(&train(&run, &x, &y, params).unwrap()).unwrap()).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_invalid_params_log_nothing() {
        let (_temp, run, x, y) = setup();
        let before = run.tracker().get_run(run.run_id()).unwrap().artifacts.len();
        let err = train(&run, &x, &y, TrainParams { n_estimators: 0, ..TrainParams::default() }).unwrap_err();
        assert!(matches!(err, TrainingError::InvalidSpec(_)));
        assert_eq!(run.tracker().get_run(run.run_id()).unwrap().artifacts.len(), before);
    }

    #[test]
    fn test_unresolvable_handle() {
        let (_temp, run, _x, y) = setup();
        let missing = FeaturesHandle::new("xtrain/nope.csv");
        let err = train(&run, &missing, &y, TrainParams::default()).unwrap_err();
        assert!(matches!(err, TrainingError::ArtifactResolution { .. }));
    }
}
