use thiserror::Error;

pub type TrainingResult<T> = std::result::Result<T, TrainingError>;

#[derive(Debug, Error)]
pub enum TrainingError {
    /// Source dataset is missing or cannot be read as a table.
    #[error("dataset unavailable: {0}")]
    DataUnavailable(String),

    /// The tracker could not resolve an artifact handle to a local file.
    #[error("cannot resolve artifact `{handle}`: {reason}")]
    ArtifactResolution { handle: String, reason: String },

    #[error("schema mismatch: {0}")]
    SchemaMismatch(String),

    /// Degenerate training input (empty design matrix, non-binary target, ...).
    #[error("model fit failed: {0}")]
    ModelFit(String),

    #[error("invalid training spec: {0}")]
    InvalidSpec(String),

    #[error("tracking error: {0}")]
    Tracking(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Csv(#[from] csv::Error),

    #[error(transparent)]
    Http(#[from] reqwest::Error),
}

impl TrainingError {
    pub(crate) fn resolution(handle: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::ArtifactResolution { handle: handle.into(), reason: reason.into() }
    }
}
