//! Gradient-boosted trees with a multinomial (softmax) loss.
//!
//! Raw scores start at the log class priors. Every stage fits one
//! regression tree per class to the negative gradient `y_k - p_k` on a row
//! subsample, with Newton leaf values scaled by `(K - 1) / K`.

use super::linalg::softmax;
use super::params::ParamSet;
use super::tree::{normalized_importances, RegressionTree, TreeParams};
use super::{check_width, TrainingSet};
use crate::error::ModelError;
use rand::rngs::StdRng;
use rand::seq::index;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GradientBoosting {
    classes: Vec<usize>,
    initial: Vec<f64>,
    learning_rate: f64,
    /// `stages[m][k]` is the tree for class `classes[k]` at stage `m`
    stages: Vec<Vec<RegressionTree>>,
    n_features: usize,
    n_classes: usize,
}

impl GradientBoosting {
    /// Reads `n_estimators` (100), `learning_rate` (0.1), `subsample` (1.0)
    /// and `max_depth` (3).
    pub fn fit(data: &TrainingSet, params: &ParamSet, seed: u64) -> Result<Self, ModelError> {
        let n_estimators = params.usize_or("n_estimators", 100)?;
        let learning_rate = params.f64_or("learning_rate", 0.1)?;
        let subsample = params.f64_or("subsample", 1.0)?;
        if learning_rate <= 0.0 || !(subsample > 0.0 && subsample <= 1.0) {
            return Err(ModelError::InvalidParameter {
                name: "learning_rate/subsample".to_string(),
                reason: format!(
                    "learning_rate must be > 0 and subsample in (0, 1], got {} / {}",
                    learning_rate, subsample
                ),
            });
        }
        let tree_params = TreeParams {
            max_depth: Some(params.usize_or("max_depth", 3)?),
            ..TreeParams::default()
        };

        let classes = data.require_classes(2)?;
        let n = data.n_samples();
        let k = classes.len();
        let counts = data.class_counts();
        let initial: Vec<f64> = classes
            .iter()
            .map(|&c| (counts[c] as f64 / n as f64).ln())
            .collect();

        let targets: Vec<Vec<f64>> = classes
            .iter()
            .map(|&c| data.y.iter().map(|&y| if y == c { 1.0 } else { 0.0 }).collect())
            .collect();
        let mut raw: Vec<Vec<f64>> = vec![initial.clone(); n];
        let sample_size = ((n as f64 * subsample).round() as usize).clamp(1, n);
        let leaf_scale = (k as f64 - 1.0) / k as f64;
        let mut rng = StdRng::seed_from_u64(seed);
        let mut stages = Vec::with_capacity(n_estimators);

        for _ in 0..n_estimators {
            let proba: Vec<Vec<f64>> = raw
                .iter()
                .map(|r| {
                    let mut p = r.clone();
                    softmax(&mut p);
                    p
                })
                .collect();
            let rows: Vec<usize> = if sample_size < n {
                index::sample(&mut rng, n, sample_size).into_vec()
            } else {
                (0..n).collect()
            };

            let mut stage = Vec::with_capacity(k);
            for class in 0..k {
                let gradients: Vec<f64> = (0..n).map(|i| targets[class][i] - proba[i][class]).collect();
                let hessians: Vec<f64> = (0..n)
                    .map(|i| (proba[i][class] * (1.0 - proba[i][class])).max(1e-12))
                    .collect();
                let tree = RegressionTree::fit(data.x, &gradients, &hessians, rows.clone(), tree_params, &mut rng)?;
                for (i, row) in data.x.iter().enumerate() {
                    raw[i][class] += learning_rate * leaf_scale * tree.predict(row);
                }
                stage.push(tree);
            }
            stages.push(stage);
        }

        if raw.iter().flatten().any(|v| !v.is_finite()) {
            return Err(ModelError::Numerical {
                reason: "boosted scores diverged".to_string(),
            });
        }

        Ok(Self {
            classes,
            initial,
            learning_rate: learning_rate * leaf_scale,
            stages,
            n_features: data.width(),
            n_classes: data.n_classes,
        })
    }

    pub fn predict_proba(&self, row: &[f64]) -> Result<Vec<f64>, ModelError> {
        check_width(self.n_features, row)?;
        let mut scores = self.initial.clone();
        for stage in &self.stages {
            for (score, tree) in scores.iter_mut().zip(stage) {
                *score += self.learning_rate * tree.predict(row);
            }
        }
        softmax(&mut scores);

        let mut proba = vec![0.0; self.n_classes];
        for (p, &c) in scores.iter().zip(&self.classes) {
            proba[c] = *p;
        }
        Ok(proba)
    }

    pub fn feature_importances(&self) -> Vec<f64> {
        let mut total = vec![0.0; self.n_features];
        for tree in self.stages.iter().flatten() {
            for (t, v) in total.iter_mut().zip(&tree.importances) {
                *t += v;
            }
        }
        normalized_importances(total)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scenario() -> (Vec<Vec<f64>>, Vec<usize>) {
        (
            vec![
                vec![-60.0, -80.0],
                vec![-62.0, -78.0],
                vec![-90.0, -40.0],
                vec![-88.0, -42.0],
            ],
            vec![0, 0, 1, 1],
        )
    }

    #[test]
    fn test_boosting_separates_scenario() {
        let (x, y) = scenario();
        let data = TrainingSet::new(&x, &y, 2).unwrap();
        let params = ParamSet::new().with("n_estimators", 50i64);
        let model = GradientBoosting::fit(&data, &params, 1).unwrap();
        let proba = model.predict_proba(&[-61.0, -79.0]).unwrap();
        assert!(proba[0] > 0.9, "got {:?}", proba);
        let importances = model.feature_importances();
        assert!((importances.iter().sum::<f64>() - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_subsample_is_seeded() {
        let x: Vec<Vec<f64>> = (0..20).map(|i| vec![i as f64]).collect();
        let y: Vec<usize> = (0..20).map(|i| usize::from(i >= 10)).collect();
        let data = TrainingSet::new(&x, &y, 2).unwrap();
        let params = ParamSet::new()
            .with("n_estimators", 10i64)
            .with("subsample", 0.5);
        let a = GradientBoosting::fit(&data, &params, 4).unwrap();
        let b = GradientBoosting::fit(&data, &params, 4).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_rejects_subsample_out_of_range() {
        let (x, y) = scenario();
        let data = TrainingSet::new(&x, &y, 2).unwrap();
        let params = ParamSet::new().with("subsample", 1.5);
        assert!(GradientBoosting::fit(&data, &params, 0).is_err());
    }
}
