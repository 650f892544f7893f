//! Titanic Training
//!
//! Survival-model training pipeline for the Titanic passenger dataset:
//! - Loading the raw dataset from an object store or local disk
//! - Seeded train/test splitting
//! - One-hot encoding and random-forest training
//! - Validation, model logging and registration through a [`Tracker`]

pub mod artifacts;
pub mod config;
pub mod encoding;
pub mod error;
pub mod forest;
pub mod handle;
pub mod layout;
pub mod local_tracker;
pub mod metrics;
pub mod model;
pub mod pipeline;
pub mod progress;
pub mod registry;
pub mod steps;
pub mod store;
pub mod table;
pub mod tracker;

pub use artifacts::{RunManifest, RunStatus, TrackedArtifact};
pub use config::PipelineConfig;
pub use encoding::OneHotEncoder;
pub use error::{TrainingError, TrainingResult};
pub use forest::RandomForestClassifier;
pub use handle::{DatasetHandle, FeaturesHandle, Handle, ModelHandle, TargetHandle};
pub use layout::TrackingLayout;
pub use local_tracker::LocalTracker;
pub use metrics::RegressionMetrics;
pub use model::{TrainParams, TrainedModel};
pub use pipeline::{Pipeline, PipelineOutcome};
pub use progress::{PipelineStep, ProgressEvent, ProgressSink, StdoutProgressSink, TracingProgressSink};
pub use registry::{latest_model_uri, list_runs, registered_versions};
pub use steps::{load_data, split_train_test, train, validate, DataSource, SplitHandles, ValidationReport};
pub use store::{FsObjectStore, HttpObjectStore, ObjectStore};
pub use table::Frame;
pub use tracker::{ActiveRun, ModelInfo, ModelVersion, Tracker};
