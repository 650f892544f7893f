use super::FEATURE_IMPORTANCE_FILE;
use crate::error::{TrainingError, TrainingResult};
use crate::handle::{FeaturesHandle, ModelHandle, TargetHandle};
use crate::metrics::RegressionMetrics;
use crate::model::{parse_labels, TrainedModel};
use crate::table::Frame;
use crate::tracker::{ActiveRun, ColumnSpec, ModelInfo, ModelPackage, ModelSignature, ModelVersion};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::collections::BTreeMap;
use tracing::info;

pub const MODEL_FLAVOR: &str = "titanic_forest";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationReport {
    pub metrics: RegressionMetrics,
    pub feature_importance: BTreeMap<String, f64>,
    pub model: ModelInfo,
    pub registered: ModelVersion,
}

fn signature(feature_names: &[String]) -> ModelSignature {
    ModelSignature {
        inputs: feature_names
            .iter()
            .map(|name| ColumnSpec { name: Some(name.clone()), dtype: "double".to_string() })
            .collect(),
        outputs: vec![ColumnSpec { name: None, dtype: "long".to_string() }],
    }
}

/// Score the model on the test split, then log metrics, importances and the
/// model package, and register a new version under `registered_name`.
pub fn validate(
    run: &ActiveRun,
    model: &ModelHandle,
    xtest: &FeaturesHandle,
    ytest: &TargetHandle,
    registered_name: &str,
) -> TrainingResult<ValidationReport> {
    let model_path = run.download_artifacts(model)?;
    let trained = TrainedModel::load(&model_path)?;
    let x = Frame::read_csv(&run.download_artifacts(xtest)?)?;
    let y = Frame::read_csv(&run.download_artifacts(ytest)?)?;
    if x.len() != y.len() {
        return Err(TrainingError::SchemaMismatch(format!(
            "{} test feature rows but {} test targets",
            x.len(),
            y.len()
        )));
    }

    let truth: Vec<f64> = parse_labels(&y)?.into_iter().map(f64::from).collect();
    let encoded = trained.encode(&x)?;
    let predicted: Vec<f64> = trained.predict_encoded(&encoded)?.into_iter().map(f64::from).collect();
    let metrics = RegressionMetrics::compute(&truth, &predicted)?;
    let feature_importance = trained.feature_importance()?;

    let package = ModelPackage {
        model_file: model_path,
        flavor: MODEL_FLAVOR.to_string(),
        signature: signature(trained.feature_names()),
        input_example: json!({
            "columns": trained.feature_names(),
            "data": encoded.iter().take(1).collect::<Vec<_>>(),
        }),
    };

    for (key, value) in metrics.named() {
        run.log_metric(key, value)?;
    }
    run.log_dict(&serde_json::to_value(&feature_importance)?, FEATURE_IMPORTANCE_FILE)?;
    let logged = run.log_model(&package)?;
    let registered = run.register_model(&logged.model_uri, registered_name)?;

    info!(
        run_id = run.run_id(),
        mse = metrics.mse,
        r2 = metrics.r2,
        model_uri = %logged.model_uri,
        version = registered.version,
        "model validated and registered"
    );
    Ok(ValidationReport { metrics, feature_importance, model: logged, registered })
}
