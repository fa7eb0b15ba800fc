//! Classifier catalog.
//!
//! The set of classifier families is closed: `ClassifierFamily` names every
//! algorithm the trainer knows, and `TrainedModel` holds the fitted state of
//! exactly one family. Each family exposes the same two capabilities,
//! `fit(X, y, params)` and `predict_proba(row)`, dispatched by `match`.
//!
//! Every fitted model owns a plain serde representation of its parameters
//! (weights, trees, support vectors) so persisted instances do not depend on
//! any particular numeric library.

pub mod adaboost;
pub mod forest;
pub mod gaussian_process;
pub mod gradient_boosting;
pub mod knn;
pub mod linalg;
pub mod mlp;
pub mod naive_bayes;
pub mod params;
pub mod qda;
pub mod svm;
pub mod tree;

pub use params::{ParamSet, ParamValue};

use crate::error::ModelError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Borrowed `(X, y)` with its class count
///
/// `n_classes` is the size of the location registry; some ids may have no
/// rows in a given fold.
#[derive(Debug, Clone, Copy)]
pub struct TrainingSet<'a> {
    pub x: &'a [Vec<f64>],
    pub y: &'a [usize],
    pub n_classes: usize,
}

impl<'a> TrainingSet<'a> {
    /// Validate shape: non-empty, rectangular, labels below `n_classes`
    pub fn new(x: &'a [Vec<f64>], y: &'a [usize], n_classes: usize) -> Result<Self, ModelError> {
        if x.is_empty() || y.is_empty() {
            return Err(ModelError::EmptyData);
        }
        if x.len() != y.len() {
            return Err(ModelError::DimensionMismatch {
                expected: x.len(),
                got: y.len(),
            });
        }
        let width = x[0].len();
        if let Some(row) = x.iter().find(|row| row.len() != width) {
            return Err(ModelError::DimensionMismatch {
                expected: width,
                got: row.len(),
            });
        }
        if let Some(&label) = y.iter().find(|&&label| label >= n_classes) {
            return Err(ModelError::InvalidParameter {
                name: "y".to_string(),
                reason: format!("label {} outside {} classes", label, n_classes),
            });
        }
        Ok(Self { x, y, n_classes })
    }

    pub fn n_samples(&self) -> usize {
        self.x.len()
    }

    pub fn width(&self) -> usize {
        self.x[0].len()
    }

    pub fn class_counts(&self) -> Vec<usize> {
        let mut counts = vec![0; self.n_classes];
        for &label in self.y {
            counts[label] += 1;
        }
        counts
    }

    /// Class ids with at least one row, ascending
    pub fn present_classes(&self) -> Vec<usize> {
        self.class_counts()
            .iter()
            .enumerate()
            .filter(|(_, &c)| c > 0)
            .map(|(id, _)| id)
            .collect()
    }

    pub(crate) fn require_classes(&self, required: usize) -> Result<Vec<usize>, ModelError> {
        let present = self.present_classes();
        if present.len() < required {
            return Err(ModelError::InsufficientClasses {
                required,
                found: present.len(),
            });
        }
        Ok(present)
    }
}

pub(crate) fn check_width(expected: usize, row: &[f64]) -> Result<(), ModelError> {
    if row.len() != expected {
        return Err(ModelError::DimensionMismatch {
            expected,
            got: row.len(),
        });
    }
    Ok(())
}

/// One algorithm in the training catalog
///
/// Ordering follows the catalog order, which is also the order predictions
/// are reported in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ClassifierFamily {
    #[serde(rename = "Nearest Neighbors")]
    NearestNeighbors,
    #[serde(rename = "Linear SVM")]
    LinearSvm,
    #[serde(rename = "RBF SVM")]
    RbfSvm,
    #[serde(rename = "Gaussian Process")]
    GaussianProcess,
    #[serde(rename = "Decision Tree")]
    DecisionTree,
    #[serde(rename = "Random Forest")]
    RandomForest,
    #[serde(rename = "Neural Net")]
    NeuralNet,
    #[serde(rename = "AdaBoost")]
    AdaBoost,
    #[serde(rename = "Naive Bayes")]
    NaiveBayes,
    #[serde(rename = "QDA")]
    Qda,
    #[serde(rename = "Gradient Boosting")]
    GradientBoosting,
}

impl ClassifierFamily {
    pub const ALL: [ClassifierFamily; 11] = [
        ClassifierFamily::NearestNeighbors,
        ClassifierFamily::LinearSvm,
        ClassifierFamily::RbfSvm,
        ClassifierFamily::GaussianProcess,
        ClassifierFamily::DecisionTree,
        ClassifierFamily::RandomForest,
        ClassifierFamily::NeuralNet,
        ClassifierFamily::AdaBoost,
        ClassifierFamily::NaiveBayes,
        ClassifierFamily::Qda,
        ClassifierFamily::GradientBoosting,
    ];

    /// Display name used in logs, telemetry and classification responses
    pub fn name(&self) -> &'static str {
        match self {
            ClassifierFamily::NearestNeighbors => "Nearest Neighbors",
            ClassifierFamily::LinearSvm => "Linear SVM",
            ClassifierFamily::RbfSvm => "RBF SVM",
            ClassifierFamily::GaussianProcess => "Gaussian Process",
            ClassifierFamily::DecisionTree => "Decision Tree",
            ClassifierFamily::RandomForest => "Random Forest",
            ClassifierFamily::NeuralNet => "Neural Net",
            ClassifierFamily::AdaBoost => "AdaBoost",
            ClassifierFamily::NaiveBayes => "Naive Bayes",
            ClassifierFamily::Qda => "QDA",
            ClassifierFamily::GradientBoosting => "Gradient Boosting",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|f| f.name() == name)
    }

    /// Families fitted by a training run
    ///
    /// Gaussian Process is opt-in; every other family is always attempted.
    pub fn training_catalog(include_gaussian_process: bool) -> Vec<Self> {
        Self::ALL
            .into_iter()
            .filter(|f| include_gaussian_process || *f != ClassifierFamily::GaussianProcess)
            .collect()
    }

    /// Whether live classification consults this family
    pub fn serves_predictions(&self) -> bool {
        *self != ClassifierFamily::GaussianProcess
    }

    /// Families that report per-feature importances
    pub fn is_tree_based(&self) -> bool {
        matches!(
            self,
            ClassifierFamily::DecisionTree
                | ClassifierFamily::RandomForest
                | ClassifierFamily::GradientBoosting
        )
    }

    /// Fit this family with one hyperparameter candidate
    ///
    /// # Arguments
    /// * `data` - Training rows and labels
    /// * `params` - Candidate from the family's search space
    /// * `seed` - Seed for any randomness inside the algorithm
    ///
    /// # Errors
    /// Any `ModelError`; callers treat it as a failed candidate.
    pub fn fit(
        &self,
        data: &TrainingSet,
        params: &ParamSet,
        seed: u64,
    ) -> Result<TrainedModel, ModelError> {
        let model = match self {
            ClassifierFamily::NearestNeighbors => {
                TrainedModel::NearestNeighbors(knn::KNearestNeighbors::fit(data, params)?)
            }
            ClassifierFamily::LinearSvm => {
                TrainedModel::LinearSvm(svm::SupportVectorClassifier::fit(data, params, "linear", seed)?)
            }
            ClassifierFamily::RbfSvm => {
                TrainedModel::RbfSvm(svm::SupportVectorClassifier::fit(data, params, "rbf", seed)?)
            }
            ClassifierFamily::GaussianProcess => TrainedModel::GaussianProcess(
                gaussian_process::GaussianProcessClassifier::fit(data, params)?,
            ),
            ClassifierFamily::DecisionTree => {
                TrainedModel::DecisionTree(tree::DecisionTree::fit(data, params, seed)?)
            }
            ClassifierFamily::RandomForest => {
                TrainedModel::RandomForest(forest::RandomForest::fit(data, params, seed)?)
            }
            ClassifierFamily::NeuralNet => {
                TrainedModel::NeuralNet(mlp::MultilayerPerceptron::fit(data, params, seed)?)
            }
            ClassifierFamily::AdaBoost => {
                TrainedModel::AdaBoost(adaboost::AdaBoost::fit(data, params, seed)?)
            }
            ClassifierFamily::NaiveBayes => {
                TrainedModel::NaiveBayes(naive_bayes::GaussianNaiveBayes::fit(data, params)?)
            }
            ClassifierFamily::Qda => TrainedModel::Qda(qda::QuadraticDiscriminant::fit(data, params)?),
            ClassifierFamily::GradientBoosting => TrainedModel::GradientBoosting(
                gradient_boosting::GradientBoosting::fit(data, params, seed)?,
            ),
        };
        Ok(model)
    }
}

impl fmt::Display for ClassifierFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Fitted state of one classifier family
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum TrainedModel {
    NearestNeighbors(knn::KNearestNeighbors),
    LinearSvm(svm::SupportVectorClassifier),
    RbfSvm(svm::SupportVectorClassifier),
    GaussianProcess(gaussian_process::GaussianProcessClassifier),
    DecisionTree(tree::DecisionTree),
    RandomForest(forest::RandomForest),
    NeuralNet(mlp::MultilayerPerceptron),
    AdaBoost(adaboost::AdaBoost),
    NaiveBayes(naive_bayes::GaussianNaiveBayes),
    Qda(qda::QuadraticDiscriminant),
    GradientBoosting(gradient_boosting::GradientBoosting),
}

impl TrainedModel {
    pub fn family(&self) -> ClassifierFamily {
        match self {
            TrainedModel::NearestNeighbors(_) => ClassifierFamily::NearestNeighbors,
            TrainedModel::LinearSvm(_) => ClassifierFamily::LinearSvm,
            TrainedModel::RbfSvm(_) => ClassifierFamily::RbfSvm,
            TrainedModel::GaussianProcess(_) => ClassifierFamily::GaussianProcess,
            TrainedModel::DecisionTree(_) => ClassifierFamily::DecisionTree,
            TrainedModel::RandomForest(_) => ClassifierFamily::RandomForest,
            TrainedModel::NeuralNet(_) => ClassifierFamily::NeuralNet,
            TrainedModel::AdaBoost(_) => ClassifierFamily::AdaBoost,
            TrainedModel::NaiveBayes(_) => ClassifierFamily::NaiveBayes,
            TrainedModel::Qda(_) => ClassifierFamily::Qda,
            TrainedModel::GradientBoosting(_) => ClassifierFamily::GradientBoosting,
        }
    }

    /// Probability per location id for one feature vector
    ///
    /// The result has one entry per class the model was fitted with; ids
    /// without training rows get 0.
    pub fn predict_proba(&self, row: &[f64]) -> Result<Vec<f64>, ModelError> {
        match self {
            TrainedModel::NearestNeighbors(m) => m.predict_proba(row),
            TrainedModel::LinearSvm(m) | TrainedModel::RbfSvm(m) => m.predict_proba(row),
            TrainedModel::GaussianProcess(m) => m.predict_proba(row),
            TrainedModel::DecisionTree(m) => m.predict_proba(row),
            TrainedModel::RandomForest(m) => m.predict_proba(row),
            TrainedModel::NeuralNet(m) => m.predict_proba(row),
            TrainedModel::AdaBoost(m) => m.predict_proba(row),
            TrainedModel::NaiveBayes(m) => m.predict_proba(row),
            TrainedModel::Qda(m) => m.predict_proba(row),
            TrainedModel::GradientBoosting(m) => m.predict_proba(row),
        }
    }

    /// Most probable class id (lowest id on ties)
    pub fn predict(&self, row: &[f64]) -> Result<usize, ModelError> {
        let proba = self.predict_proba(row)?;
        let mut best = 0;
        for (id, p) in proba.iter().enumerate() {
            if *p > proba[best] {
                best = id;
            }
        }
        Ok(best)
    }

    /// Normalized per-feature importances for tree-based families
    pub fn feature_importances(&self) -> Option<Vec<f64>> {
        match self {
            TrainedModel::DecisionTree(m) => Some(m.feature_importances()),
            TrainedModel::RandomForest(m) => Some(m.feature_importances()),
            TrainedModel::GradientBoosting(m) => Some(m.feature_importances()),
            _ => None,
        }
    }
}
