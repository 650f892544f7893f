//! Runs load, split, train and validate end to end inside one tracked run.

use crate::artifacts::RunStatus;
use crate::error::TrainingResult;
use crate::handle::{DatasetHandle, ModelHandle};
use crate::model::TrainParams;
use crate::progress::{PipelineStep, ProgressEvent, ProgressSink};
use crate::steps::{self, DataSource, SplitHandles, ValidationReport};
use crate::tracker::{ActiveRun, Tracker};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, info, warn};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineOutcome {
    pub run_id: String,
    pub dataset: DatasetHandle,
    pub splits: SplitHandles,
    pub model: ModelHandle,
    pub report: ValidationReport,
}

pub struct Pipeline {
    tracker: Arc<dyn Tracker>,
    source: DataSource,
    experiment: String,
    model_name: String,
}

impl Pipeline {
    pub fn new(
        tracker: Arc<dyn Tracker>,
        source: DataSource,
        experiment: impl Into<String>,
        model_name: impl Into<String>,
    ) -> Self {
        Self { tracker, source, experiment: experiment.into(), model_name: model_name.into() }
    }

    /// Start a run, execute every step, and close the run as finished or
    /// failed. Step errors are returned unchanged.
    pub async fn run(
        &self,
        remote_key: &str,
        params: TrainParams,
        progress: &dyn ProgressSink,
    ) -> TrainingResult<PipelineOutcome> {
        params.validate()?;
        let run = ActiveRun::start(Arc::clone(&self.tracker), &self.experiment)?;
        let run_id = run.run_id().to_string();
        info!(%run_id, experiment = %self.experiment, remote_key, "pipeline started");
        progress.on_event(ProgressEvent::Started { run_id: run_id.clone() });

        match self.steps(&run, remote_key, params, progress).await {
            Ok(outcome) => {
                run.end(RunStatus::Finished)?;
                progress.on_event(ProgressEvent::Finished { run_id });
                info!(run_id = %outcome.run_id, version = outcome.report.registered.version, "pipeline finished");
                Ok(outcome)
            }
            Err(e) => {
                error!(%run_id, error = %e, "pipeline failed");
                if let Err(end_err) = run.end(RunStatus::Failed) {
                    warn!(%run_id, error = %end_err, "could not mark run as failed");
                }
                progress.on_event(ProgressEvent::Failed { run_id, error: e.to_string() });
                Err(e)
            }
        }
    }

    async fn steps(
        &self,
        run: &ActiveRun,
        remote_key: &str,
        params: TrainParams,
        progress: &dyn ProgressSink,
    ) -> TrainingResult<PipelineOutcome> {
        let run_id = run.run_id().to_string();
        let started = |step: PipelineStep, index: u64| {
            progress.on_event(ProgressEvent::StepStarted {
                run_id: run_id.clone(),
                step,
                index,
                total: PipelineStep::ALL.len() as u64,
            });
        };
        let finished = |step: PipelineStep, output: String| {
            progress.on_event(ProgressEvent::StepFinished { run_id: run_id.clone(), step, output });
        };

        run.log_param("n_estimators", params.n_estimators)?;
        run.log_param("max_depth", params.max_depth)?;
        run.log_param("random_state", params.random_state)?;

        started(PipelineStep::LoadData, 1);
        let dataset = steps::load_data(run, &self.source, remote_key).await?;
        finished(PipelineStep::LoadData, dataset.to_string());

        started(PipelineStep::Split, 2);
        let splits = steps::split_train_test(run, &dataset)?;
        finished(PipelineStep::Split, format!("{}, {}", splits.xtrain, splits.xtest));

        started(PipelineStep::Train, 3);
        let model = steps::train(run, &splits.xtrain, &splits.ytrain, params)?;
        finished(PipelineStep::Train, model.to_string());

        started(PipelineStep::Validate, 4);
        let report = steps::validate(run, &model, &splits.xtest, &splits.ytest, &self.model_name)?;
        finished(
            PipelineStep::Validate,
            format!("{} v{}", report.registered.name, report.registered.version),
        );

        Ok(PipelineOutcome { run_id, dataset, splits, model, report })
    }
}
