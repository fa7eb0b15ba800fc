//! AdaBoost (SAMME) over decision stumps.
//!
//! Each round fits a depth-1 Gini tree to the re-weighted rows and gives it
//! a vote of `learning_rate * (ln((1 - err) / err) + ln(K - 1))`. Class
//! probabilities are a softmax of the normalized vote totals divided by
//! `K - 1`.

use super::linalg::softmax;
use super::params::ParamSet;
use super::tree::{DecisionTree, TreeParams};
use super::{check_width, TrainingSet};
use crate::error::ModelError;
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdaBoost {
    stumps: Vec<DecisionTree>,
    stump_weights: Vec<f64>,
    n_features: usize,
    n_classes: usize,
    /// Classes with training rows; their count is SAMME's `K`
    classes: Vec<usize>,
}

fn argmax(values: &[f64]) -> usize {
    let mut best = 0;
    for (i, v) in values.iter().enumerate() {
        if *v > values[best] {
            best = i;
        }
    }
    best
}

impl AdaBoost {
    /// Reads `n_estimators` (50) and `learning_rate` (1.0).
    pub fn fit(data: &TrainingSet, params: &ParamSet, seed: u64) -> Result<Self, ModelError> {
        let n_estimators = params.usize_or("n_estimators", 50)?;
        let learning_rate = params.f64_or("learning_rate", 1.0)?;
        if learning_rate <= 0.0 {
            return Err(ModelError::InvalidParameter {
                name: "learning_rate".to_string(),
                reason: format!("must be positive, got {}", learning_rate),
            });
        }
        let classes = data.require_classes(2)?;
        let k = classes.len() as f64;

        let n = data.n_samples();
        let mut weights = vec![1.0 / n as f64; n];
        let stump_params = TreeParams {
            max_depth: Some(1),
            ..TreeParams::default()
        };
        let mut rng = StdRng::seed_from_u64(seed);
        let mut stumps = Vec::new();
        let mut stump_weights = Vec::new();

        for round in 0..n_estimators {
            let stump =
                DecisionTree::fit_weighted(data, &weights, (0..n).collect(), stump_params, &mut rng)?;
            let predictions: Vec<usize> = data.x.iter().map(|row| argmax(stump.leaf_distribution(row))).collect();
            let total: f64 = weights.iter().sum();
            let error: f64 = predictions
                .iter()
                .zip(data.y)
                .zip(&weights)
                .filter(|((p, y), _)| p != y)
                .map(|(_, w)| w)
                .sum::<f64>()
                / total;

            if error <= 0.0 {
                // Perfect stump: it alone decides
                stumps.push(stump);
                stump_weights.push(1.0);
                break;
            }
            if error >= 1.0 - 1.0 / k {
                if stumps.is_empty() {
                    return Err(ModelError::Numerical {
                        reason: format!("first stump no better than chance (error {:.3})", error),
                    });
                }
                tracing::debug!(round, error, "adaboost stopped early");
                break;
            }

            let alpha = learning_rate * (((1.0 - error) / error).ln() + (k - 1.0).ln());
            for ((w, p), y) in weights.iter_mut().zip(&predictions).zip(data.y) {
                if p != y {
                    *w *= alpha.exp();
                }
            }
            let total: f64 = weights.iter().sum();
            for w in weights.iter_mut() {
                *w /= total;
            }
            stumps.push(stump);
            stump_weights.push(alpha);
        }

        Ok(Self {
            stumps,
            stump_weights,
            n_features: data.width(),
            n_classes: data.n_classes,
            classes,
        })
    }

    pub fn predict_proba(&self, row: &[f64]) -> Result<Vec<f64>, ModelError> {
        check_width(self.n_features, row)?;
        let total: f64 = self.stump_weights.iter().sum();
        let mut votes = vec![0.0; self.n_classes];
        for (stump, alpha) in self.stumps.iter().zip(&self.stump_weights) {
            votes[argmax(stump.leaf_distribution(row))] += alpha / total;
        }

        let k = self.classes.len() as f64;
        let mut scores: Vec<f64> = self.classes.iter().map(|&c| votes[c] / (k - 1.0)).collect();
        softmax(&mut scores);

        let mut proba = vec![0.0; self.n_classes];
        for (p, &c) in scores.iter().zip(&self.classes) {
            proba[c] = *p;
        }
        Ok(proba)
    }
}
