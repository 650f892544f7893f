//! Command type definitions shared between main.rs and tests.

use clap::{Args, Subcommand};
use titanic_training::steps::{DATASET_ARTIFACT_DIR, DATASET_FILE, MODEL_ARTIFACT_DIR, MODEL_FILE};
use titanic_training::TrainParams;

/// Hyperparameter overrides. Unset flags fall back to the config file.
#[derive(Args, Debug, Clone, Default)]
pub struct TrainArgs {
    /// Number of trees in the forest
    #[arg(long)]
    pub n_estimators: Option<usize>,

    /// Maximum depth of each tree
    #[arg(long)]
    pub max_depth: Option<usize>,

    /// Seed for bootstrap sampling and feature selection
    #[arg(long)]
    pub random_state: Option<u64>,
}

impl TrainArgs {
    pub fn apply(&self, mut params: TrainParams) -> TrainParams {
        if let Some(n) = self.n_estimators {
            params.n_estimators = n;
        }
        if let Some(d) = self.max_depth {
            params.max_depth = d;
        }
        if let Some(s) = self.random_state {
            params.random_state = s;
        }
        params
    }
}

pub fn default_dataset() -> String {
    format!("{DATASET_ARTIFACT_DIR}/{DATASET_FILE}")
}

pub fn default_model() -> String {
    format!("{MODEL_ARTIFACT_DIR}/{MODEL_FILE}")
}

#[derive(Subcommand, Debug, Clone)]
pub enum StepCommand {
    /// Fetch the raw dataset and log it as path_output/data.csv
    LoadData {
        /// Object key or file name under the data directory (defaults to config)
        #[arg(long)]
        key: Option<String>,

        /// Join an existing run instead of starting a new one
        #[arg(long)]
        run_id: Option<String>,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Split a logged dataset into train and test artifacts
    Split {
        #[arg(long)]
        run_id: String,

        /// Dataset handle (relative path or runs:/<id>/<path>)
        #[arg(long, default_value_t = default_dataset())]
        dataset: String,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Train the random forest on the train split
    Train {
        #[arg(long)]
        run_id: String,

        #[arg(long, default_value = "xtrain/xtrain.csv")]
        xtrain: String,

        #[arg(long, default_value = "ytrain/ytrain.csv")]
        ytrain: String,

        #[command(flatten)]
        params: TrainArgs,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Score the model, log it and register a new version; ends the run
    Validate {
        #[arg(long)]
        run_id: String,

        #[arg(long, default_value_t = default_model())]
        model: String,

        #[arg(long, default_value = "xtest/xtest.csv")]
        xtest: String,

        #[arg(long, default_value = "ytest/ytest.csv")]
        ytest: String,

        /// Registered model name (defaults to config)
        #[arg(long)]
        model_name: Option<String>,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Subcommand, Debug, Clone)]
pub enum ModelsCommand {
    /// Print the model URI of the latest finished run
    Latest {
        /// Experiment name (defaults to config)
        #[arg(long)]
        experiment: Option<String>,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// List the registered versions of a model
    Versions {
        /// Registered model name (defaults to config)
        #[arg(long)]
        name: Option<String>,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}
