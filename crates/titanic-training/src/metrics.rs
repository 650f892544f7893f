//! Error metrics computed by the validator on hard-label predictions.

use crate::error::{TrainingError, TrainingResult};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RegressionMetrics {
    pub mse: f64,
    pub mae: f64,
    pub r2: f64,
    pub medae: f64,
}

impl RegressionMetrics {
    pub fn compute(y_true: &[f64], y_pred: &[f64]) -> TrainingResult<Self> {
        if y_true.is_empty() {
            return Err(TrainingError::SchemaMismatch("cannot score an empty test set".to_string()));
        }
        if y_true.len() != y_pred.len() {
            return Err(TrainingError::SchemaMismatch(format!(
                "{} targets but {} predictions",
                y_true.len(),
                y_pred.len()
            )));
        }

        let n = y_true.len() as f64;
        let mut abs_errors: Vec<f64> = y_true.iter().zip(y_pred).map(|(t, p)| (t - p).abs()).collect();
        let ss_res: f64 = abs_errors.iter().map(|e| e * e).sum();
        let mse = ss_res / n;
        let mae = abs_errors.iter().sum::<f64>() / n;

        let mean = y_true.iter().sum::<f64>() / n;
        let ss_tot: f64 = y_true.iter().map(|t| (t - mean).powi(2)).sum();
        let r2 = if ss_tot == 0.0 {
            if ss_res == 0.0 { 1.0 } else { 0.0 }
        } else {
            1.0 - ss_res / ss_tot
        };

        abs_errors.sort_by(f64::total_cmp);
        let mid = abs_errors.len() / 2;
        let medae = if abs_errors.len() % 2 == 0 {
            f64::midpoint(abs_errors[mid - 1], abs_errors[mid])
        } else {
            abs_errors[mid]
        };

        Ok(Self { mse, mae, r2, medae })
    }

    /// Metric names as they are logged to the tracker.
    #[must_use]
    pub fn named(&self) -> [(&'static str, f64); 4] {
        [("mse", self.mse), ("mae", self.mae), ("r2", self.r2), ("medae", self.medae)]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_perfect_predictions() {
        let m = RegressionMetrics::compute(&[0.0, 1.0, 1.0], &[0.0, 1.0, 1.0]).unwrap();
        assert_eq!(m, RegressionMetrics { mse: 0.0, mae: 0.0, r2: 1.0, medae: 0.0 });
    }

    #[test]
    fn test_binary_errors() {
        let m = RegressionMetrics::compute(&[0.0, 1.0, 1.0, 0.0], &[0.0, 0.0, 1.0, 1.0]).unwrap();
        assert!((m.mse - 0.5).abs() < 1e-12);
        assert!((m.mae - 0.5).abs() < 1e-12);
        assert!((m.medae - 0.5).abs() < 1e-12);
        // ss_tot = 1.0, ss_res = 2.0
        assert!((m.r2 + 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_constant_target_r2() {
        let perfect = RegressionMetrics::compute(&[1.0, 1.0], &[1.0, 1.0]).unwrap();
        assert_eq!(perfect.r2, 1.0);
        let off = RegressionMetrics::compute(&[1.0, 1.0], &[0.0, 1.0]).unwrap();
        assert_eq!(off.r2, 0.0);
    }

    #[test]
    fn test_rejects_bad_input() {
        assert!(RegressionMetrics::compute(&[], &[]).is_err());
        assert!(RegressionMetrics::compute(&[1.0], &[1.0, 0.0]).is_err());
    }

    #[test]
    fn test_named_order() {
        let m = RegressionMetrics::compute(&[1.0], &[0.0]).unwrap();
        let names: Vec<_> = m.named().iter().map(|(k, _)| *k).collect();
        assert_eq!(names, ["mse", "mae", "r2", "medae"]);
    }
}
