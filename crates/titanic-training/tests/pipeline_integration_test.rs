//! End-to-end runs over the bundled 300-passenger fixture.

use std::path::PathBuf;
use std::sync::Arc;

use tempfile::TempDir;
use titanic_training::progress::CollectingProgressSink;
use titanic_training::steps::{FEATURES, TARGET};
use titanic_training::{
    latest_model_uri, load_data, registered_versions, split_train_test, train, validate, ActiveRun, DataSource,
    FeaturesHandle, Frame, FsObjectStore, Handle, LocalTracker, Pipeline, RunStatus, TargetHandle, TrainParams,
    TrainedModel, Tracker,
};

const FIXTURE_ROWS: usize = 300;

fn fixture_dir() -> PathBuf {
    PathBuf::from(concat!(env!("CARGO_MANIFEST_DIR"), "/../../data"))
}

fn local_source() -> DataSource {
    DataSource::new(Arc::new(FsObjectStore::new(fixture_dir())), None, fixture_dir())
}

fn small_params() -> TrainParams {
    TrainParams { n_estimators: 10, max_depth: 3, random_state: 42 }
}

/// Log the first `n` rows of an artifact under a new path.
fn log_head<K>(run: &ActiveRun, temp: &TempDir, handle: &Handle<K>, n: usize, dir: &str) -> Handle<K> {
    let frame = Frame::read_csv(&run.download_artifacts(handle).unwrap()).unwrap().head(n);
    let path = temp.path().join(handle.file_name());
    frame.write_csv(&path).unwrap();
    run.log_artifact(&path, dir).unwrap()
}

#[tokio::test]
async fn test_load_split_train_validate() {
    let temp = TempDir::new().unwrap();
    let tracker: Arc<dyn Tracker> = Arc::new(LocalTracker::new(temp.path().join("mlruns")));
    let run = ActiveRun::start(tracker, "titanic").unwrap();

    let dataset = load_data(&run, &local_source(), "all_titanic.csv").await.unwrap();
    assert!(dataset.as_str().contains("path_output"));
    assert!(dataset.as_str().contains(".csv"));

    let splits = split_train_test(&run, &dataset).unwrap();
    let read = |h: &str| Frame::read_csv(&run.download_artifacts(&FeaturesHandle::new(h)).unwrap()).unwrap();
    let (xtrain, xtest) = (read(splits.xtrain.as_str()), read(splits.xtest.as_str()));
    let (ytrain, ytest) = (read(splits.ytrain.as_str()), read(splits.ytest.as_str()));

    assert_eq!(xtrain.len() + xtest.len(), FIXTURE_ROWS);
    assert_eq!(xtrain.len(), ytrain.len());
    assert_eq!(xtest.len(), ytest.len());
    let ratio = xtest.len() as f64 / FIXTURE_ROWS as f64;
    assert!(ratio > 0.25 && ratio < 0.35, "test ratio {ratio}");
    assert_eq!(xtrain.columns(), FEATURES);
    assert_eq!(ytest.columns(), [TARGET]);

    let xtrain_small: FeaturesHandle = log_head(&run, &temp, &splits.xtrain, 100, "small/xtrain");
    let ytrain_small: TargetHandle = log_head(&run, &temp, &splits.ytrain, 100, "small/ytrain");
    let xtest_small: FeaturesHandle = log_head(&run, &temp, &splits.xtest, 50, "small/xtest");
    let ytest_small: TargetHandle = log_head(&run, &temp, &splits.ytest, 50, "small/ytest");

    let model = train(&run, &xtrain_small, &ytrain_small, small_params()).unwrap();
    let trained = TrainedModel::load(&run.download_artifacts(&model).unwrap()).unwrap();
    let probe = Frame::read_csv(&run.download_artifacts(&xtest_small).unwrap()).unwrap().head(5);

    let labels = trained.predict(&probe).unwrap();
    assert_eq!(labels.len(), 5);
    assert!(labels.iter().all(|l| *l <= 1));
    for p in trained.predict_proba(&probe).unwrap() {
        assert!((p[0] + p[1] - 1.0).abs() < 1e-9);
    }

    let report = validate(&run, &model, &xtest_small, &ytest_small, "titanic-survival").unwrap();
    let m = report.metrics;
    assert!((0.0..=1.0).contains(&m.mse));
    assert!((0.0..=1.0).contains(&m.mae));
    assert!((0.0..=1.0).contains(&m.medae));
    assert!(m.r2 <= 1.0 && m.r2 >= -1.0);
    // Hard 0/1 predictions make every absolute error 0 or 1.
    assert!(m.mae <= m.mse + 1e-12);
    assert!(!report.feature_importance.is_empty());
    assert!(report.feature_importance.values().all(|v| v.is_finite()));
    assert!(report.feature_importance.contains_key("Sex_female"));
}

#[tokio::test]
async fn test_training_is_idempotent() {
    let temp = TempDir::new().unwrap();
    let tracker: Arc<dyn Tracker> = Arc::new(LocalTracker::new(temp.path().join("mlruns")));
    let run = ActiveRun::start(tracker, "titanic").unwrap();
    let dataset = load_data(&run, &local_source(), "all_titanic.csv").await.unwrap();
    let splits = split_train_test(&run, &dataset).unwrap();

    let first = train(&run, &splits.xtrain, &splits.ytrain, small_params()).unwrap();
    let first = TrainedModel::load(&run.download_artifacts(&first).unwrap()).unwrap();
    let second = train(&run, &splits.xtrain, &splits.ytrain, small_params()).unwrap();
    let second = TrainedModel::load(&run.download_artifacts(&second).unwrap()).unwrap();

    let xtest = Frame::read_csv(&run.download_artifacts(&splits.xtest).unwrap()).unwrap();
    assert_eq!(first.predict(&xtest).unwrap(), second.predict(&xtest).unwrap());
    assert_eq!(first, second);
}

#[tokio::test]
async fn test_pipeline_registers_discoverable_model() {
    let temp = TempDir::new().unwrap();
    let tracker = Arc::new(LocalTracker::new(temp.path().join("mlruns")));
    let pipeline = Pipeline::new(tracker.clone(), local_source(), "titanic", "titanic-survival");
    let sink = CollectingProgressSink::default();

    let first = pipeline.run("all_titanic.csv", small_params(), &sink).await.unwrap();
    let second = pipeline.run("all_titanic.csv", small_params(), &sink).await.unwrap();

    assert_eq!(tracker.get_run(&second.run_id).unwrap().status, RunStatus::Finished);
    assert_eq!(latest_model_uri(tracker.layout(), "titanic").unwrap(), second.report.model.model_uri);

    let versions = registered_versions(tracker.layout(), "titanic-survival").unwrap();
    let numbers: Vec<u32> = versions.iter().map(|v| v.version).collect();
    assert_eq!(numbers, vec![1, 2]);
    assert_eq!(versions[0].model_uri, first.report.model.model_uri);
}

#[tokio::test]
async fn test_run_qualified_handles_resolve_across_runs() {
    let temp = TempDir::new().unwrap();
    let tracker: Arc<dyn Tracker> = Arc::new(LocalTracker::new(temp.path().join("mlruns")));
    let loader_run = ActiveRun::start(Arc::clone(&tracker), "titanic").unwrap();
    let dataset = load_data(&loader_run, &local_source(), "all_titanic.csv").await.unwrap();
    loader_run.end(RunStatus::Finished).unwrap();

    let split_run = ActiveRun::start(tracker, "titanic").unwrap();
    let splits = split_train_test(&split_run, &dataset.qualified(loader_run.run_id())).unwrap();
    assert_eq!(splits.xtrain.as_str(), "xtrain/xtrain.csv");
}
