//! Random Forest.
//!
//! Bootstrap-sampled Gini trees with `sqrt(n_features)` candidate features
//! per split; probabilities are the mean of the trees' leaf distributions.

use super::params::ParamSet;
use super::tree::{normalized_importances, DecisionTree, TreeParams};
use super::{check_width, TrainingSet};
use crate::error::ModelError;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RandomForest {
    trees: Vec<DecisionTree>,
    n_features: usize,
    n_classes: usize,
}

impl RandomForest {
    /// Reads `n_estimators` (100) plus the decision tree parameters.
    pub fn fit(data: &TrainingSet, params: &ParamSet, seed: u64) -> Result<Self, ModelError> {
        let n_estimators = params.usize_or("n_estimators", 100)?;
        let max_features = ((data.width() as f64).sqrt().floor() as usize).max(1);
        let tree_params = TreeParams {
            max_features: Some(max_features),
            ..TreeParams::from_params(params)?
        };

        let n = data.n_samples();
        let weights = vec![1.0; n];
        let mut rng = StdRng::seed_from_u64(seed);
        let mut trees = Vec::with_capacity(n_estimators);
        for _ in 0..n_estimators {
            let bootstrap: Vec<usize> = (0..n).map(|_| rng.gen_range(0..n)).collect();
            trees.push(DecisionTree::fit_weighted(data, &weights, bootstrap, tree_params, &mut rng)?);
        }

        Ok(Self {
            trees,
            n_features: data.width(),
            n_classes: data.n_classes,
        })
    }

    pub fn predict_proba(&self, row: &[f64]) -> Result<Vec<f64>, ModelError> {
        check_width(self.n_features, row)?;
        let mut proba = vec![0.0; self.n_classes];
        for tree in &self.trees {
            for (p, v) in proba.iter_mut().zip(tree.leaf_distribution(row)) {
                *p += v;
            }
        }
        let count = self.trees.len().max(1) as f64;
        for p in proba.iter_mut() {
            *p /= count;
        }
        Ok(proba)
    }

    /// Mean of the per-tree normalized importances
    pub fn feature_importances(&self) -> Vec<f64> {
        let mut total = vec![0.0; self.n_features];
        for tree in &self.trees {
            for (t, v) in total.iter_mut().zip(tree.feature_importances()) {
                *t += v;
            }
        }
        normalized_importances(total)
    }

    pub fn n_trees(&self) -> usize {
        self.trees.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_forest_votes_for_nearby_room() {
        let x = vec![
            vec![-60.0, -80.0],
            vec![-62.0, -78.0],
            vec![-61.0, -79.5],
            vec![-90.0, -40.0],
            vec![-88.0, -42.0],
            vec![-89.0, -41.0],
        ];
        let y = vec![0, 0, 0, 1, 1, 1];
        let data = TrainingSet::new(&x, &y, 2).unwrap();
        let params = ParamSet::new().with("n_estimators", 25i64);
        let forest = RandomForest::fit(&data, &params, 42).unwrap();
        assert_eq!(forest.n_trees(), 25);

        let proba = forest.predict_proba(&[-61.0, -79.0]).unwrap();
        assert!(proba[0] > 0.5);
        assert!((proba.iter().sum::<f64>() - 1.0).abs() < 1e-9);

        let importances = forest.feature_importances();
        assert!((importances.iter().sum::<f64>() - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_same_seed_same_forest() {
        let x = vec![vec![1.0], vec![2.0], vec![3.0], vec![4.0]];
        let y = vec![0, 0, 1, 1];
        let data = TrainingSet::new(&x, &y, 2).unwrap();
        let params = ParamSet::new().with("n_estimators", 10i64);
        let a = RandomForest::fit(&data, &params, 9).unwrap();
        let b = RandomForest::fit(&data, &params, 9).unwrap();
        assert_eq!(a, b);
    }
}
