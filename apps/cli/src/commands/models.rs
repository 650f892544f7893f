//! Model registry queries.

use super::types::ModelsCommand;
use crate::config::CliConfig;
use anyhow::{Context, Result};
use colored::Colorize;
use serde_json::json;
use titanic_training::{latest_model_uri, registered_versions};

pub fn execute(command: ModelsCommand, config: &CliConfig) -> Result<()> {
    let tracker = config.pipeline.tracker();
    let layout = tracker.layout();
    match command {
        ModelsCommand::Latest { experiment, json } => {
            let experiment = experiment.unwrap_or_else(|| config.pipeline.tracking.experiment.clone());
            let uri = latest_model_uri(layout, &experiment)
                .with_context(|| format!("No logged model found in experiment {experiment}"))?;
            if json {
                println!("{}", json!({ "experiment": experiment, "model_uri": uri }));
            } else {
                println!("{uri}");
            }
        }
        ModelsCommand::Versions { name, json } => {
            let name = name.unwrap_or_else(|| config.pipeline.tracking.model_name.clone());
            let versions = registered_versions(layout, &name).context("Failed to read model registry")?;
            if json {
                println!("{}", serde_json::to_string_pretty(&versions)?);
                return Ok(());
            }

            println!();
            println!("{}", format!("Registered versions of {name} ({})", versions.len()).bold().cyan());
            println!();
            if versions.is_empty() {
                println!("  {}", "No versions registered yet. Run `titanic run` first.".dimmed());
                println!();
                return Ok(());
            }
            println!("{:<8} {:<28} {}", "Version", "Created", "Model");
            println!("{}", "─".repeat(80));
            for v in versions {
                println!(
                    "{:<8} {:<28} {}",
                    v.version.to_string().cyan(),
                    v.created_at.format("%Y-%m-%d %H:%M:%S UTC").to_string().dimmed(),
                    v.model_uri
                );
            }
            println!();
        }
    }
    Ok(())
}
