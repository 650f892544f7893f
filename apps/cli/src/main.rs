//! Titanic CLI - train, validate and query the Titanic survival model
//!
//! The `titanic` command runs the training pipeline end to end or one step at
//! a time, inspects the model registry, and calls the inference API.

mod commands;
mod config;

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use commands::{models, pipeline, predict, steps, ModelsCommand, StepCommand, TrainArgs};
use config::CliConfig;

#[derive(Parser, Debug)]
#[command(name = "titanic", author, version, about = "Titanic survival model training pipeline")]
struct Args {
    /// Log level or filter directive (overrides RUST_LOG)
    #[arg(short, long, global = true)]
    log_level: Option<String>,

    /// Config file (defaults to ./titanic.toml when present)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    #[command(flatten)]
    Step(StepCommand),

    /// Run load, split, train and validate in a single run
    Run {
        /// Object key or file name under the data directory (defaults to config)
        #[arg(long)]
        key: Option<String>,

        #[command(flatten)]
        params: TrainArgs,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Inspect logged and registered models
    #[command(subcommand)]
    Models(ModelsCommand),

    /// Fetch an access token with the configured client credentials
    Token {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Ask the inference API whether a passenger survives
    Predict {
        /// Ticket class (1, 2 or 3)
        #[arg(long, value_parser = clap::value_parser!(u8).range(1..=3))]
        pclass: u8,

        /// male or female
        #[arg(long)]
        sex: String,

        /// Siblings/spouses aboard
        #[arg(long, default_value_t = 0)]
        sibsp: u32,

        /// Parents/children aboard
        #[arg(long, default_value_t = 0)]
        parch: u32,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

fn init_tracing(level: Option<&str>) {
    let filter = match level {
        Some(level) => EnvFilter::new(level),
        None => EnvFilter::try_from_default_env().unwrap_or_else(|_| "titanic=info,info".into()),
    };
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr).with_target(false))
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let config = CliConfig::load(args.config.as_deref(), &config::process_env)?;
    init_tracing(args.log_level.as_deref().or(config.log_level.as_deref()));

    match args.command {
        Command::Step(cmd) => steps::execute(cmd, &config).await,
        Command::Run { key, params, json } => pipeline::execute(key, &params, json, &config).await,
        Command::Models(cmd) => models::execute(cmd, &config),
        Command::Token { json } => predict::token(json, &config).await,
        Command::Predict { pclass, sex, sibsp, parch, json } => {
            predict::predict(pclass, &sex, sibsp, parch, json, &config).await
        }
    }
}
