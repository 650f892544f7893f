//! `titanic run`: the whole pipeline in one run.

use super::types::TrainArgs;
use crate::config::CliConfig;
use anyhow::{Context, Result};
use colored::Colorize;
use std::sync::Arc;
use titanic_training::{Pipeline, StdoutProgressSink, TracingProgressSink, ValidationReport};

pub async fn execute(key: Option<String>, params: &TrainArgs, json: bool, config: &CliConfig) -> Result<()> {
    let params = params.apply(config.pipeline.train);
    let key = key.unwrap_or_else(|| config.pipeline.data.key.clone());
    let pipeline = Pipeline::new(
        Arc::new(config.pipeline.tracker()),
        config.pipeline.data_source()?,
        config.pipeline.tracking.experiment.clone(),
        config.pipeline.tracking.model_name.clone(),
    );

    let outcome = if json {
        pipeline.run(&key, params, &TracingProgressSink).await
    } else {
        pipeline.run(&key, params, &StdoutProgressSink).await
    }
    .context("Training pipeline failed")?;

    if json {
        println!("{}", serde_json::to_string_pretty(&outcome)?);
        return Ok(());
    }
    println!();
    println!("{} {}", "Pipeline complete:".bold().green(), outcome.run_id.cyan());
    print_report(&outcome.report);
    Ok(())
}

pub fn print_report(report: &ValidationReport) {
    println!();
    println!("{}", "Metrics".bold().cyan());
    for (name, value) in report.metrics.named() {
        println!("  {name:<6} {value:.4}");
    }
    println!();
    println!("{}", "Feature importance".bold().cyan());
    let mut ranked: Vec<_> = report.feature_importance.iter().collect();
    ranked.sort_by(|a, b| b.1.total_cmp(a.1));
    for (name, value) in ranked {
        println!("  {name:<12} {value:.4}");
    }
    println!();
    println!(
        "  Registered {} version {} ({})",
        report.registered.name.cyan(),
        report.registered.version.to_string().green(),
        report.model.model_uri.dimmed()
    );
    println!();
}
