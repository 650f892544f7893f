//! Single-step commands. Each joins (or starts) a run so steps can execute as
//! separate processes.

use super::types::StepCommand;
use crate::config::CliConfig;
use anyhow::{Context, Result};
use colored::Colorize;
use serde_json::json;
use std::sync::Arc;
use titanic_training::{
    load_data, split_train_test, train, validate, ActiveRun, FeaturesHandle, Handle, ModelHandle, RunStatus,
    TargetHandle, Tracker, TrainingResult,
};
use tracing::warn;

pub async fn execute(command: StepCommand, config: &CliConfig) -> Result<()> {
    let tracker: Arc<dyn Tracker> = Arc::new(config.pipeline.tracker());
    match command {
        StepCommand::LoadData { key, run_id, json } => {
            let run = match run_id {
                Some(id) => ActiveRun::resume(tracker, &id).context("Failed to join run")?,
                None => ActiveRun::start(tracker, &config.pipeline.tracking.experiment).context("Failed to start run")?,
            };
            let key = key.unwrap_or_else(|| config.pipeline.data.key.clone());
            let source = config.pipeline.data_source()?;
            let handle = finish_step(&run, load_data(&run, &source, &key).await)?;
            report(json, &run, "dataset", &handle);
        }
        StepCommand::Split { run_id, dataset, json } => {
            let run = ActiveRun::resume(tracker, &run_id).context("Failed to join run")?;
            let splits = finish_step(&run, split_train_test(&run, &Handle::new(dataset)))?;
            if json {
                println!("{}", json!({ "run_id": run.run_id(), "splits": splits }));
            } else {
                println!("{} {}", "Split logged for run".bold().green(), run.run_id().cyan());
                for handle in [&splits.xtrain, &splits.xtest] {
                    println!("  {}", handle.as_str().dimmed());
                }
                for handle in [&splits.ytrain, &splits.ytest] {
                    println!("  {}", handle.as_str().dimmed());
                }
            }
        }
        StepCommand::Train { run_id, xtrain, ytrain, params, json } => {
            let run = ActiveRun::resume(tracker, &run_id).context("Failed to join run")?;
            let params = params.apply(config.pipeline.train);
            let xtrain: FeaturesHandle = Handle::new(xtrain);
            let ytrain: TargetHandle = Handle::new(ytrain);
            let model = finish_step(&run, train(&run, &xtrain, &ytrain, params))?;
            report(json, &run, "model", &model);
        }
        StepCommand::Validate { run_id, model, xtest, ytest, model_name, json } => {
            let run = ActiveRun::resume(tracker, &run_id).context("Failed to join run")?;
            let name = model_name.unwrap_or_else(|| config.pipeline.tracking.model_name.clone());
            let model: ModelHandle = Handle::new(model);
            let xtest: FeaturesHandle = Handle::new(xtest);
            let ytest: TargetHandle = Handle::new(ytest);
            let report = finish_step(&run, validate(&run, &model, &xtest, &ytest, &name))?;
            run.end(RunStatus::Finished).context("Failed to finish run")?;

            if json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                super::pipeline::print_report(&report);
            }
        }
    }
    Ok(())
}

/// Mark the run failed when a step errors; the step error is returned.
fn finish_step<T>(run: &ActiveRun, result: TrainingResult<T>) -> Result<T> {
    result.map_err(|e| {
        if let Err(end_err) = run.end(RunStatus::Failed) {
            warn!(run_id = run.run_id(), error = %end_err, "could not mark run as failed");
        }
        anyhow::Error::new(e).context(format!("Step failed in run {}", run.run_id()))
    })
}

fn report<K>(json: bool, run: &ActiveRun, label: &str, handle: &Handle<K>) {
    if json {
        println!("{}", json!({ "run_id": run.run_id(), label: handle.as_str() }));
    } else {
        println!("{} {}", "Run:".bold(), run.run_id().cyan());
        println!("  {label}: {}", handle.as_str().green());
    }
}
