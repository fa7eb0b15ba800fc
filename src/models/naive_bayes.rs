//! Gaussian Naive Bayes.
//!
//! Per-class feature means and variances with variance smoothing, combined
//! in log space and normalized with log-sum-exp.

use super::linalg::log_sum_exp;
use super::params::ParamSet;
use super::{check_width, TrainingSet};
use crate::error::ModelError;
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GaussianNaiveBayes {
    /// Class ids with training rows, ascending
    pub(crate) classes: Vec<usize>,
    pub(crate) log_priors: Vec<f64>,
    pub(crate) means: Vec<Vec<f64>>,
    pub(crate) variances: Vec<Vec<f64>>,
    pub(crate) n_classes: usize,
}

impl GaussianNaiveBayes {
    /// Reads `var_smoothing` (1e-9), the fraction of the largest feature
    /// variance added to every variance.
    pub fn fit(data: &TrainingSet, params: &ParamSet) -> Result<Self, ModelError> {
        let var_smoothing = params.f64_or("var_smoothing", 1e-9)?;
        let classes = data.present_classes();
        let width = data.width();
        let n = data.n_samples() as f64;

        let mut overall_mean = vec![0.0; width];
        for row in data.x {
            for (m, v) in overall_mean.iter_mut().zip(row) {
                *m += v / n;
            }
        }
        let max_variance = (0..width)
            .map(|j| data.x.iter().map(|r| (r[j] - overall_mean[j]).powi(2)).sum::<f64>() / n)
            .fold(0.0, f64::max);
        let epsilon = (var_smoothing * max_variance).max(1e-12);

        let counts = data.class_counts();
        let mut log_priors = Vec::with_capacity(classes.len());
        let mut means = Vec::with_capacity(classes.len());
        let mut variances = Vec::with_capacity(classes.len());
        for &class in &classes {
            let rows: Vec<&Vec<f64>> = data
                .x
                .iter()
                .zip(data.y)
                .filter(|(_, &label)| label == class)
                .map(|(row, _)| row)
                .collect();
            let count = rows.len() as f64;
            let mean: Vec<f64> = (0..width)
                .map(|j| rows.iter().map(|r| r[j]).sum::<f64>() / count)
                .collect();
            let variance: Vec<f64> = (0..width)
                .map(|j| rows.iter().map(|r| (r[j] - mean[j]).powi(2)).sum::<f64>() / count + epsilon)
                .collect();
            log_priors.push((counts[class] as f64 / n).ln());
            means.push(mean);
            variances.push(variance);
        }

        Ok(Self {
            classes,
            log_priors,
            means,
            variances,
            n_classes: data.n_classes,
        })
    }

    pub fn predict_proba(&self, row: &[f64]) -> Result<Vec<f64>, ModelError> {
        check_width(self.means.first().map_or(0, Vec::len), row)?;

        let joint: Vec<f64> = (0..self.classes.len())
            .map(|c| {
                let log_likelihood: f64 = row
                    .iter()
                    .zip(&self.means[c])
                    .zip(&self.variances[c])
                    .map(|((x, m), v)| -0.5 * (2.0 * PI * v).ln() - (x - m).powi(2) / (2.0 * v))
                    .sum();
                self.log_priors[c] + log_likelihood
            })
            .collect();
        let normalizer = log_sum_exp(&joint);

        let mut proba = vec![0.0; self.n_classes];
        for (c, &class) in self.classes.iter().enumerate() {
            proba[class] = (joint[c] - normalizer).exp();
        }
        Ok(proba)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_separates_scenario() {
        let x = vec![
            vec![-60.0, -80.0],
            vec![-62.0, -78.0],
            vec![-90.0, -40.0],
            vec![-88.0, -42.0],
        ];
        let y = vec![0, 0, 1, 1];
        let data = TrainingSet::new(&x, &y, 2).unwrap();
        let nb = GaussianNaiveBayes::fit(&data, &ParamSet::new()).unwrap();
        let proba = nb.predict_proba(&[-61.0, -79.0]).unwrap();
        assert!(proba[0] > 0.99);
        assert!((proba.iter().sum::<f64>() - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_unseen_class_zero() {
        let x = vec![vec![1.0], vec![1.2], vec![5.0], vec![5.3]];
        let y = vec![0, 0, 2, 2];
        let data = TrainingSet::new(&x, &y, 3).unwrap();
        let nb = GaussianNaiveBayes::fit(&data, &ParamSet::new()).unwrap();
        let proba = nb.predict_proba(&[5.1]).unwrap();
        assert_eq!(proba.len(), 3);
        assert_eq!(proba[1], 0.0);
        assert!(proba[2] > proba[0]);
    }

    #[test]
    fn test_nan_variance_propagates() {
        let nb = GaussianNaiveBayes {
            classes: vec![0, 1],
            log_priors: vec![0.5f64.ln(), 0.5f64.ln()],
            means: vec![vec![0.0], vec![1.0]],
            variances: vec![vec![f64::NAN], vec![1.0]],
            n_classes: 2,
        };
        let proba = nb.predict_proba(&[0.5]).unwrap();
        assert!(proba.iter().any(|p| p.is_nan()));
    }
}
