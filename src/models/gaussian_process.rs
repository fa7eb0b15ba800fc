//! Gaussian Process classifier (one-vs-rest posterior mean).
//!
//! Fits the GP posterior mean of each class indicator under an RBF kernel
//! on standardized features, then clips and normalizes the means into a
//! distribution. Training cost is cubic in the row count, which is why the
//! family is opt-in and never consulted for live predictions.

use super::linalg::{squared_euclidean, Cholesky, Standardizer};
use super::params::ParamSet;
use super::{check_width, TrainingSet};
use crate::error::ModelError;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GaussianProcessClassifier {
    scaler: Standardizer,
    length_scale: f64,
    support: Vec<Vec<f64>>,
    /// `(K + noise I)^-1 t_c` per present class
    weights: Vec<Vec<f64>>,
    classes: Vec<usize>,
    n_classes: usize,
}

impl GaussianProcessClassifier {
    /// Reads `length_scale` (1.0) and `noise` (1e-3).
    pub fn fit(data: &TrainingSet, params: &ParamSet) -> Result<Self, ModelError> {
        let length_scale = params.f64_or("length_scale", 1.0)?;
        let noise = params.f64_or("noise", 1e-3)?;
        if length_scale <= 0.0 || noise <= 0.0 {
            return Err(ModelError::InvalidParameter {
                name: "length_scale/noise".to_string(),
                reason: "must both be positive".to_string(),
            });
        }
        let classes = data.require_classes(2)?;
        let scaler = Standardizer::fit(data.x);
        let support = scaler.transform_all(data.x);
        let n = support.len();

        let mut gram = vec![vec![0.0; n]; n];
        for i in 0..n {
            for j in 0..=i {
                let k = kernel(length_scale, &support[i], &support[j]);
                gram[i][j] = k;
                gram[j][i] = k;
            }
            gram[i][i] += noise;
        }
        let factor = Cholesky::decompose(&gram)?;
        let weights = classes
            .iter()
            .map(|&c| {
                let target: Vec<f64> = data.y.iter().map(|&y| if y == c { 1.0 } else { 0.0 }).collect();
                factor.solve(&target)
            })
            .collect();

        Ok(Self {
            scaler,
            length_scale,
            support,
            weights,
            classes,
            n_classes: data.n_classes,
        })
    }

    pub fn predict_proba(&self, row: &[f64]) -> Result<Vec<f64>, ModelError> {
        check_width(self.scaler.width(), row)?;
        let z = self.scaler.transform(row);
        let k: Vec<f64> = self.support.iter().map(|s| kernel(self.length_scale, s, &z)).collect();

        let means: Vec<f64> = self
            .weights
            .iter()
            .map(|w| w.iter().zip(&k).map(|(a, b)| a * b).sum::<f64>().max(0.0))
            .collect();
        let total: f64 = means.iter().sum();

        let mut proba = vec![0.0; self.n_classes];
        for (m, &c) in means.iter().zip(&self.classes) {
            proba[c] = if total > 0.0 {
                m / total
            } else {
                1.0 / self.classes.len() as f64
            };
        }
        Ok(proba)
    }
}

fn kernel(length_scale: f64, a: &[f64], b: &[f64]) -> f64 {
    (-squared_euclidean(a, b) / (2.0 * length_scale * length_scale)).exp()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_posterior_mean_favors_nearby_class() {
        let x = vec![
            vec![-60.0, -80.0],
            vec![-62.0, -78.0],
            vec![-90.0, -40.0],
            vec![-88.0, -42.0],
        ];
        let y = vec![0, 0, 1, 1];
        let data = TrainingSet::new(&x, &y, 2).unwrap();
        let gp = GaussianProcessClassifier::fit(&data, &ParamSet::new()).unwrap();
        let proba = gp.predict_proba(&[-61.0, -79.0]).unwrap();
        assert!(proba[0] > 0.9);
        assert!((proba.iter().sum::<f64>() - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_far_query_falls_back_to_uniform() {
        let x = vec![vec![0.0], vec![1.0]];
        let y = vec![0, 1];
        let data = TrainingSet::new(&x, &y, 2).unwrap();
        let gp = GaussianProcessClassifier::fit(&data, &ParamSet::new()).unwrap();
        assert_eq!(gp.predict_proba(&[1e6]).unwrap(), vec![0.5, 0.5]);
    }
}
