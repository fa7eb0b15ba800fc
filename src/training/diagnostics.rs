//! Per-family training diagnostics.
//!
//! These are operational records (logged and published to telemetry) and are
//! never part of the persisted instance.

use serde::{Deserialize, Serialize};

use crate::calibration::{FeatureHeader, LocationRegistry};
use crate::models::{ClassifierFamily, ParamSet, TrainedModel};

/// Cross-validation record for one search candidate
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CandidateResult {
    pub params: ParamSet,
    /// NaN when any fold failed to fit
    pub mean_score: f64,
    pub std_score: f64,
    pub fold_scores: Vec<f64>,
    pub error: Option<String>,
}

impl CandidateResult {
    pub(crate) fn scored(params: ParamSet, fold_scores: Vec<f64>) -> Self {
        let n = fold_scores.len().max(1) as f64;
        let mean = fold_scores.iter().sum::<f64>() / n;
        let variance = fold_scores.iter().map(|s| (s - mean).powi(2)).sum::<f64>() / n;
        Self {
            params,
            mean_score: mean,
            std_score: variance.sqrt(),
            fold_scores,
            error: None,
        }
    }

    pub(crate) fn failed(params: ParamSet, error: String) -> Self {
        Self {
            params,
            mean_score: f64::NAN,
            std_score: f64::NAN,
            fold_scores: Vec::new(),
            error: Some(error),
        }
    }
}

/// Everything worth knowing about one trained family
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FamilyDiagnostics {
    pub family: ClassifierFamily,
    pub cv_score: f64,
    pub cv_folds: usize,
    pub best_params: ParamSet,
    /// Accuracy of the refit model on all training rows
    pub training_score: f64,
    /// `confusion_matrix[actual][predicted]` over training rows
    pub confusion_matrix: Vec<Vec<usize>>,
    /// `(sensor id, importance)` for tree-based families
    pub feature_importances: Option<Vec<(String, f64)>>,
    pub candidates: Vec<CandidateResult>,
    pub elapsed_ms: u64,
}

impl FamilyDiagnostics {
    pub(crate) fn log(&self, registry: &LocationRegistry) {
        log::info!(
            "[Trainer] {} best params {} cv score {:.3} over {} folds",
            self.family,
            self.best_params,
            self.cv_score,
            self.cv_folds
        );
        log::info!(
            "[Trainer] {} training score {:.3} in {} ms",
            self.family,
            self.training_score,
            self.elapsed_ms
        );
        for (actual, row) in self.confusion_matrix.iter().enumerate() {
            log::debug!(
                "[Trainer] {} confusion {:>12}: {:?}",
                self.family,
                registry.name_of(actual).unwrap_or("?"),
                row
            );
        }
        if let Some(importances) = &self.feature_importances {
            let mut ranked = importances.clone();
            ranked.sort_by(|a, b| b.1.total_cmp(&a.1));
            for (sensor, value) in ranked.iter().take(10) {
                log::debug!("[Trainer] {} importance {} = {:.4}", self.family, sensor, value);
            }
        }
        for candidate in &self.candidates {
            tracing::debug!(
                family = %self.family,
                params = %candidate.params,
                mean = candidate.mean_score,
                std = candidate.std_score,
                error = candidate.error.as_deref().unwrap_or(""),
                "cv result"
            );
        }
    }
}

/// Fraction of rows predicted correctly; prediction errors count as misses
pub fn accuracy(model: &TrainedModel, x: &[Vec<f64>], y: &[usize]) -> f64 {
    if y.is_empty() {
        return f64::NAN;
    }
    let correct = x
        .iter()
        .zip(y)
        .filter(|(row, &label)| model.predict(row).is_ok_and(|p| p == label))
        .count();
    correct as f64 / y.len() as f64
}

/// `n_classes x n_classes` counts of (actual, predicted)
pub fn confusion_matrix(model: &TrainedModel, x: &[Vec<f64>], y: &[usize], n_classes: usize) -> Vec<Vec<usize>> {
    let mut matrix = vec![vec![0; n_classes]; n_classes];
    for (row, &label) in x.iter().zip(y) {
        if let Ok(predicted) = model.predict(row) {
            if predicted < n_classes {
                matrix[label][predicted] += 1;
            }
        }
    }
    matrix
}

/// Pair importances with sensor ids
pub fn named_importances(model: &TrainedModel, header: &FeatureHeader) -> Option<Vec<(String, f64)>> {
    model
        .feature_importances()
        .map(|values| header.sensors().iter().cloned().zip(values).collect())
}
