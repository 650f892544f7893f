//! The trained survival model: fitted encoder plus forest, stored as one JSON
//! document.

use crate::encoding::OneHotEncoder;
use crate::error::{TrainingError, TrainingResult};
use crate::forest::{ForestParams, RandomForestClassifier};
use crate::table::Frame;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

pub const MODEL_FORMAT_VERSION: u32 = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainParams {
    pub n_estimators: usize,
    pub max_depth: usize,
    pub random_state: u64,
}

impl Default for TrainParams {
    fn default() -> Self {
        Self { n_estimators: 100, max_depth: 10, random_state: 42 }
    }
}

impl TrainParams {
    pub fn validate(&self) -> TrainingResult<()> {
        if self.n_estimators == 0 {
            return Err(TrainingError::InvalidSpec("n_estimators must be >= 1".to_string()));
        }
        if self.max_depth == 0 {
            return Err(TrainingError::InvalidSpec("max_depth must be >= 1".to_string()));
        }
        Ok(())
    }

    fn forest(self) -> ForestParams {
        ForestParams {
            n_estimators: self.n_estimators,
            max_depth: self.max_depth,
            random_state: self.random_state,
        }
    }
}

/// Read a single-column target frame as 0/1 labels. `1.0` style cells are
/// accepted.
pub fn parse_labels(frame: &Frame) -> TrainingResult<Vec<u8>> {
    if frame.columns().len() != 1 {
        return Err(TrainingError::SchemaMismatch(format!(
            "target frame must have exactly one column, found {:?}",
            frame.columns()
        )));
    }
    frame
        .rows()
        .iter()
        .enumerate()
        .map(|(idx, row)| {
            let cell = row[0].trim();
            match cell.parse::<f64>() {
                Ok(v) if v == 0.0 => Ok(0),
                Ok(v) if v == 1.0 => Ok(1),
                _ => Err(TrainingError::ModelFit(format!("row {idx}: target must be 0 or 1, got {cell:?}"))),
            }
        })
        .collect()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainedModel {
    format_version: u32,
    feature_names: Vec<String>,
    encoder: OneHotEncoder,
    forest: RandomForestClassifier,
}

impl TrainedModel {
    pub fn fit(xtrain: &Frame, ytrain: &Frame, params: TrainParams) -> TrainingResult<Self> {
        params.validate()?;
        if xtrain.is_empty() {
            return Err(TrainingError::ModelFit("training set is empty".to_string()));
        }
        if xtrain.len() != ytrain.len() {
            return Err(TrainingError::ModelFit(format!(
                "{} feature rows but {} target rows",
                xtrain.len(),
                ytrain.len()
            )));
        }

        let labels = parse_labels(ytrain)?;
        let encoder = OneHotEncoder::fit(xtrain)?;
        let matrix = encoder.transform(xtrain)?;
        let forest = RandomForestClassifier::fit(&matrix, &labels, params.forest())?;

        Ok(Self {
            format_version: MODEL_FORMAT_VERSION,
            feature_names: encoder.feature_names(),
            encoder,
            forest,
        })
    }

    /// Encode raw feature rows with the persisted encoder.
    pub fn encode(&self, x: &Frame) -> TrainingResult<Vec<Vec<f64>>> {
        self.encoder.transform(x)
    }

    pub fn predict(&self, x: &Frame) -> TrainingResult<Vec<u8>> {
        self.predict_encoded(&self.encode(x)?)
    }

    /// Predict rows already produced by [`Self::encode`].
    pub fn predict_encoded(&self, matrix: &[Vec<f64>]) -> TrainingResult<Vec<u8>> {
        self.forest.predict(matrix)
    }

    pub fn predict_proba(&self, x: &Frame) -> TrainingResult<Vec<[f64; 2]>> {
        self.forest.predict_proba(&self.encode(x)?)
    }

    #[must_use]
    pub fn feature_names(&self) -> &[String] {
        &self.feature_names
    }

    #[must_use]
    pub fn encoder(&self) -> &OneHotEncoder {
        &self.encoder
    }

    #[must_use]
    pub fn params(&self) -> TrainParams {
        let p = self.forest.params();
        TrainParams { n_estimators: p.n_estimators, max_depth: p.max_depth, random_state: p.random_state }
    }

    /// Encoded feature name to importance. Errors unless every encoded
    /// feature has exactly one importance.
    pub fn feature_importance(&self) -> TrainingResult<BTreeMap<String, f64>> {
        let importances = self.forest.feature_importances();
        if importances.len() != self.feature_names.len() {
            return Err(TrainingError::ModelFit(format!(
                "{} importances for {} encoded features",
                importances.len(),
                self.feature_names.len()
            )));
        }
        Ok(self.feature_names.iter().cloned().zip(importances.iter().copied()).collect())
    }

    pub fn save(&self, path: &Path) -> TrainingResult<()> {
        let json = serde_json::to_vec_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }

    pub fn load(path: &Path) -> TrainingResult<Self> {
        let bytes = std::fs::read(path)?;
        let model: Self = serde_json::from_slice(&bytes)?;
        if model.format_version != MODEL_FORMAT_VERSION {
            return Err(TrainingError::SchemaMismatch(format!(
                "unsupported model format version {} (expected {MODEL_FORMAT_VERSION})",
                model.format_version
            )));
        }
        if model.forest.n_features() != model.encoder.width() {
            return Err(TrainingError::SchemaMismatch(format!(
                "forest expects {} features but encoder yields {}",
                model.forest.n_features(),
                model.encoder.width()
            )));
        }
        Ok(model)
    }
}
