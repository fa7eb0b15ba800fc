// Small dense numeric helpers shared by the classifier families

use crate::error::ModelError;
use serde::{Deserialize, Serialize};

pub fn dot(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

pub fn squared_euclidean(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b).map(|(x, y)| (x - y) * (x - y)).sum()
}

/// Numerically stable `ln(sum(exp(v)))`
pub fn log_sum_exp(values: &[f64]) -> f64 {
    let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    if !max.is_finite() {
        return max;
    }
    max + values.iter().map(|v| (v - max).exp()).sum::<f64>().ln()
}

/// In-place softmax
pub fn softmax(values: &mut [f64]) {
    let lse = log_sum_exp(values);
    for v in values.iter_mut() {
        *v = (*v - lse).exp();
    }
}

/// Per-feature z-scoring fitted on training rows
///
/// Constant columns keep unit scale so they map to zero instead of NaN.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Standardizer {
    mean: Vec<f64>,
    scale: Vec<f64>,
}

impl Standardizer {
    pub fn fit(x: &[Vec<f64>]) -> Self {
        let width = x.first().map_or(0, Vec::len);
        let n = x.len().max(1) as f64;
        let mut mean = vec![0.0; width];
        for row in x {
            for (m, v) in mean.iter_mut().zip(row) {
                *m += v / n;
            }
        }
        let mut scale = vec![0.0; width];
        for row in x {
            for ((s, v), m) in scale.iter_mut().zip(row).zip(&mean) {
                *s += (v - m) * (v - m) / n;
            }
        }
        for s in scale.iter_mut() {
            *s = if *s > 1e-12 { s.sqrt() } else { 1.0 };
        }
        Self { mean, scale }
    }

    pub fn width(&self) -> usize {
        self.mean.len()
    }

    pub fn transform(&self, row: &[f64]) -> Vec<f64> {
        row.iter()
            .zip(&self.mean)
            .zip(&self.scale)
            .map(|((v, m), s)| (v - m) / s)
            .collect()
    }

    pub fn transform_all(&self, x: &[Vec<f64>]) -> Vec<Vec<f64>> {
        x.iter().map(|row| self.transform(row)).collect()
    }
}

/// Lower-triangular Cholesky factor of a symmetric positive definite matrix
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Cholesky {
    lower: Vec<Vec<f64>>,
}

impl Cholesky {
    pub fn decompose(matrix: &[Vec<f64>]) -> Result<Self, ModelError> {
        let n = matrix.len();
        let mut lower = vec![vec![0.0; n]; n];
        for i in 0..n {
            for j in 0..=i {
                let sum: f64 = (0..j).map(|k| lower[i][k] * lower[j][k]).sum();
                if i == j {
                    let diag = matrix[i][i] - sum;
                    if diag <= 0.0 || !diag.is_finite() {
                        return Err(ModelError::Numerical {
                            reason: format!("matrix not positive definite at pivot {}", i),
                        });
                    }
                    lower[i][j] = diag.sqrt();
                } else {
                    lower[i][j] = (matrix[i][j] - sum) / lower[j][j];
                }
            }
        }
        Ok(Self { lower })
    }

    /// `ln |A|`
    pub fn log_det(&self) -> f64 {
        2.0 * self.lower.iter().enumerate().map(|(i, row)| row[i].ln()).sum::<f64>()
    }

    /// Solve `L z = b`
    pub fn forward(&self, b: &[f64]) -> Vec<f64> {
        let n = self.lower.len();
        let mut z = vec![0.0; n];
        for i in 0..n {
            let sum: f64 = (0..i).map(|k| self.lower[i][k] * z[k]).sum();
            z[i] = (b[i] - sum) / self.lower[i][i];
        }
        z
    }

    /// Solve `A x = b`
    pub fn solve(&self, b: &[f64]) -> Vec<f64> {
        let z = self.forward(b);
        let n = self.lower.len();
        let mut x = vec![0.0; n];
        for i in (0..n).rev() {
            let sum: f64 = (i + 1..n).map(|k| self.lower[k][i] * x[k]).sum();
            x[i] = (z[i] - sum) / self.lower[i][i];
        }
        x
    }
}
