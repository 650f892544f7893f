//! The four pipeline steps. Each one takes an explicit [`ActiveRun`] and typed
//! handles, and returns typed handles for the artifacts it logged.
//!
//! [`ActiveRun`]: crate::tracker::ActiveRun

mod load_data;
mod split;
mod train;
mod validate;

pub use load_data::{load_data, DataSource};
pub use split::{split_frame, split_train_test, SplitFrames, SplitHandles};
pub use train::train;
pub use validate::{validate, ValidationReport};

/// Predictor columns, in the order they are written to the feature artifacts.
pub const FEATURES: [&str; 4] = ["Pclass", "Sex", "SibSp", "Parch"];
pub const TARGET: &str = "Survived";

/// Fraction of rows held out for validation.
pub const TEST_SIZE: f64 = 0.3;
pub const SPLIT_SEED: u64 = 42;

pub const DATASET_ARTIFACT_DIR: &str = "path_output";
pub const DATASET_FILE: &str = "data.csv";
pub const MODEL_ARTIFACT_DIR: &str = "model_trained";
pub const MODEL_FILE: &str = "model.json";
pub const FEATURE_IMPORTANCE_FILE: &str = "feature_importance.json";

/// Registered model name used when none is configured.
pub const DEFAULT_MODEL_NAME: &str = "titanic-survival";
