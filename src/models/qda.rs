//! Quadratic Discriminant Analysis.
//!
//! One full-covariance Gaussian per class. `reg_param` shrinks each class
//! covariance toward the identity; a small floor on the diagonal keeps
//! near-constant sensor columns invertible.

use super::linalg::{log_sum_exp, Cholesky};
use super::params::ParamSet;
use super::{check_width, TrainingSet};
use crate::error::ModelError;
use serde::{Deserialize, Serialize};

const COVARIANCE_FLOOR: f64 = 1e-6;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuadraticDiscriminant {
    classes: Vec<usize>,
    log_priors: Vec<f64>,
    means: Vec<Vec<f64>>,
    factors: Vec<Cholesky>,
    n_classes: usize,
}

impl QuadraticDiscriminant {
    /// Reads `reg_param` in [0, 1] (default 0). Needs two classes and two
    /// rows per class.
    pub fn fit(data: &TrainingSet, params: &ParamSet) -> Result<Self, ModelError> {
        let reg_param = params.f64_or("reg_param", 0.0)?;
        if !(0.0..=1.0).contains(&reg_param) {
            return Err(ModelError::InvalidParameter {
                name: "reg_param".to_string(),
                reason: format!("must lie in [0, 1], got {}", reg_param),
            });
        }
        let classes = data.require_classes(2)?;
        let counts = data.class_counts();
        let width = data.width();
        let n = data.n_samples() as f64;

        let mut log_priors = Vec::with_capacity(classes.len());
        let mut means = Vec::with_capacity(classes.len());
        let mut factors = Vec::with_capacity(classes.len());
        for &class in &classes {
            if counts[class] < 2 {
                return Err(ModelError::InvalidParameter {
                    name: "y".to_string(),
                    reason: format!("class {} has only {} sample", class, counts[class]),
                });
            }
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

            let mut covariance = vec![vec![0.0; width]; width];
            for row in &rows {
                for i in 0..width {
                    let di = row[i] - mean[i];
                    for j in 0..=i {
                        covariance[i][j] += di * (row[j] - mean[j]) / (count - 1.0);
                    }
                }
            }
            for i in 0..width {
                for j in 0..i {
                    covariance[i][j] *= 1.0 - reg_param;
                    covariance[j][i] = covariance[i][j];
                }
                covariance[i][i] = (1.0 - reg_param) * covariance[i][i] + reg_param + COVARIANCE_FLOOR;
            }

            factors.push(Cholesky::decompose(&covariance)?);
            log_priors.push((counts[class] as f64 / n).ln());
            means.push(mean);
        }

        Ok(Self {
            classes,
            log_priors,
            means,
            factors,
            n_classes: data.n_classes,
        })
    }

    pub fn predict_proba(&self, row: &[f64]) -> Result<Vec<f64>, ModelError> {
        check_width(self.means.first().map_or(0, Vec::len), row)?;

        let joint: Vec<f64> = (0..self.classes.len())
            .map(|c| {
                let centered: Vec<f64> = row.iter().zip(&self.means[c]).map(|(x, m)| x - m).collect();
                let z = self.factors[c].forward(&centered);
                let mahalanobis: f64 = z.iter().map(|v| v * v).sum();
                self.log_priors[c] - 0.5 * (self.factors[c].log_det() + mahalanobis)
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

    fn clusters() -> (Vec<Vec<f64>>, Vec<usize>) {
        (
            vec![
                vec![-60.0, -80.0],
                vec![-62.0, -78.0],
                vec![-61.0, -81.0],
                vec![-90.0, -40.0],
                vec![-88.0, -42.0],
                vec![-89.0, -43.0],
            ],
            vec![0, 0, 0, 1, 1, 1],
        )
    }

    #[test]
    fn test_separates_clusters() {
        let (x, y) = clusters();
        let data = TrainingSet::new(&x, &y, 2).unwrap();
        let params = ParamSet::new().with("reg_param", 0.1);
        let qda = QuadraticDiscriminant::fit(&data, &params).unwrap();
        let proba = qda.predict_proba(&[-61.0, -79.0]).unwrap();
        assert!(proba[0] > 0.99);
    }

    #[test]
    fn test_singular_covariance_survives_floor() {
        // Two points per class on a line give a rank-1 covariance
        let x = vec![vec![0.0, 0.0], vec![1.0, 1.0], vec![5.0, 5.0], vec![6.0, 6.0]];
        let y = vec![0, 0, 1, 1];
        let data = TrainingSet::new(&x, &y, 2).unwrap();
        let qda = QuadraticDiscriminant::fit(&data, &ParamSet::new()).unwrap();
        let proba = qda.predict_proba(&[0.5, 0.5]).unwrap();
        assert!(proba.iter().all(|p| p.is_finite()));
        assert!(proba[0] > proba[1]);
    }

    #[test]
    fn test_single_class_rejected() {
        let x = vec![vec![0.0], vec![1.0]];
        let y = vec![0, 0];
        let data = TrainingSet::new(&x, &y, 1).unwrap();
        assert!(matches!(
            QuadraticDiscriminant::fit(&data, &ParamSet::new()),
            Err(ModelError::InsufficientClasses { required: 2, found: 1 })
        ));
    }

    #[test]
    fn test_reg_param_range() {
        let (x, y) = clusters();
        let data = TrainingSet::new(&x, &y, 2).unwrap();
        let params = ParamSet::new().with("reg_param", 1.5);
        assert!(QuadraticDiscriminant::fit(&data, &params).is_err());
    }
}
