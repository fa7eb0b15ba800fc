//! Support vector classifiers (linear and RBF kernels).
//!
//! One-vs-rest hinge-loss machines trained with Pegasos stochastic
//! sub-gradient steps on standardized features; the regularization strength
//! is `1 / (C * n)`. A constant feature stands in for the intercept.
//! Decision values are turned into a distribution with a softmax.

use super::linalg::{dot, softmax, squared_euclidean, Standardizer};
use super::params::ParamSet;
use super::{check_width, TrainingSet};
use crate::error::ModelError;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
enum Decision {
    /// Primal weights per class, last entry is the intercept
    Linear { weights: Vec<Vec<f64>> },
    /// Dual coefficients per class over a shared support set
    Rbf {
        gamma: f64,
        support: Vec<Vec<f64>>,
        dual: Vec<Vec<f64>>,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SupportVectorClassifier {
    scaler: Standardizer,
    classes: Vec<usize>,
    decision: Decision,
    n_classes: usize,
}

fn rbf(gamma: f64, a: &[f64], b: &[f64]) -> f64 {
    (-gamma * squared_euclidean(a, b)).exp() + 1.0
}

impl SupportVectorClassifier {
    /// Reads `C` (1.0), `kernel` (linear|rbf, defaulting to `default_kernel`)
    /// and `gamma` (1 / n_features).
    pub fn fit(
        data: &TrainingSet,
        params: &ParamSet,
        default_kernel: &str,
        seed: u64,
    ) -> Result<Self, ModelError> {
        let c = params.f64_or("C", 1.0)?;
        if c <= 0.0 {
            return Err(ModelError::InvalidParameter {
                name: "C".to_string(),
                reason: format!("must be positive, got {}", c),
            });
        }
        let kernels: &[&str] = if default_kernel == "rbf" {
            &["rbf", "linear"]
        } else {
            &["linear", "rbf"]
        };
        let kernel = params.choice_or("kernel", kernels)?;
        let gamma = params.f64_or("gamma", 1.0 / data.width().max(1) as f64)?;
        if gamma <= 0.0 {
            return Err(ModelError::InvalidParameter {
                name: "gamma".to_string(),
                reason: format!("must be positive, got {}", gamma),
            });
        }

        let classes = data.require_classes(2)?;
        let scaler = Standardizer::fit(data.x);
        let x = scaler.transform_all(data.x);
        let n = x.len();
        let lambda = 1.0 / (c * n as f64);
        let steps = (5 * n).clamp(200, 5_000);
        let mut rng = StdRng::seed_from_u64(seed);

        let decision = if kernel == "linear" {
            let weights = classes
                .iter()
                .map(|&class| {
                    let signs: Vec<f64> = data.y.iter().map(|&l| if l == class { 1.0 } else { -1.0 }).collect();
                    pegasos_primal(&x, &signs, lambda, steps, &mut rng)
                })
                .collect::<Vec<_>>();
            Decision::Linear { weights }
        } else {
            let counts: Vec<Vec<f64>> = classes
                .iter()
                .map(|&class| {
                    let signs: Vec<f64> = data.y.iter().map(|&l| if l == class { 1.0 } else { -1.0 }).collect();
                    pegasos_kernel(&x, &signs, lambda, steps, gamma, &mut rng)
                })
                .collect();
            let support_idx: Vec<usize> = (0..n).filter(|&i| counts.iter().any(|c| c[i] != 0.0)).collect();
            Decision::Rbf {
                gamma,
                support: support_idx.iter().map(|&i| x[i].clone()).collect(),
                dual: counts
                    .iter()
                    .map(|c| support_idx.iter().map(|&i| c[i]).collect())
                    .collect(),
            }
        };

        let model = Self {
            scaler,
            classes,
            decision,
            n_classes: data.n_classes,
        };
        model.ensure_finite()?;
        Ok(model)
    }

    fn ensure_finite(&self) -> Result<(), ModelError> {
        let finite = match &self.decision {
            Decision::Linear { weights } => weights.iter().flatten().all(|w| w.is_finite()),
            Decision::Rbf { dual, .. } => dual.iter().flatten().all(|w| w.is_finite()),
        };
        if finite {
            Ok(())
        } else {
            Err(ModelError::Numerical {
                reason: "non-finite SVM coefficients".to_string(),
            })
        }
    }

    pub fn predict_proba(&self, row: &[f64]) -> Result<Vec<f64>, ModelError> {
        check_width(self.scaler.width(), row)?;
        let z = self.scaler.transform(row);

        let mut scores: Vec<f64> = match &self.decision {
            Decision::Linear { weights } => weights
                .iter()
                .map(|w| dot(&w[..z.len()], &z) + w[z.len()])
                .collect(),
            Decision::Rbf {
                gamma,
                support,
                dual,
            } => {
                let k: Vec<f64> = support.iter().map(|sv| rbf(*gamma, sv, &z)).collect();
                dual.iter().map(|coef| dot(coef, &k)).collect()
            }
        };
        softmax(&mut scores);

        let mut proba = vec![0.0; self.n_classes];
        for (score, &class) in scores.iter().zip(&self.classes) {
            proba[class] = *score;
        }
        Ok(proba)
    }
}

/// Pegasos on an explicit weight vector; returns `[w.., b]`
fn pegasos_primal(x: &[Vec<f64>], signs: &[f64], lambda: f64, steps: usize, rng: &mut StdRng) -> Vec<f64> {
    let width = x[0].len();
    let mut w = vec![0.0; width + 1];
    for t in 1..=steps {
        let i = rng.gen_range(0..x.len());
        let margin = signs[i] * (dot(&w[..width], &x[i]) + w[width]);
        let eta = 1.0 / (lambda * t as f64);
        let shrink = 1.0 - 1.0 / t as f64;
        for v in w.iter_mut() {
            *v *= shrink;
        }
        if margin < 1.0 {
            for (v, xi) in w[..width].iter_mut().zip(&x[i]) {
                *v += eta * signs[i] * xi;
            }
            w[width] += eta * signs[i];
        }
    }
    w
}

/// Kernelized Pegasos; returns the dual coefficient of every training row
fn pegasos_kernel(
    x: &[Vec<f64>],
    signs: &[f64],
    lambda: f64,
    steps: usize,
    gamma: f64,
    rng: &mut StdRng,
) -> Vec<f64> {
    let n = x.len();
    let mut alpha = vec![0.0; n];
    for t in 1..=steps {
        let i = rng.gen_range(0..n);
        let sum: f64 = (0..n)
            .filter(|&j| alpha[j] != 0.0)
            .map(|j| alpha[j] * signs[j] * rbf(gamma, &x[j], &x[i]))
            .sum();
        if signs[i] * sum / (lambda * t as f64) < 1.0 {
            alpha[i] += 1.0;
        }
    }
    let scale = lambda * steps as f64;
    alpha.iter().zip(signs).map(|(a, s)| a * s / scale).collect()
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
    fn test_linear_kernel_ranks_correct_room() {
        let (x, y) = scenario();
        let data = TrainingSet::new(&x, &y, 2).unwrap();
        let svm = SupportVectorClassifier::fit(&data, &ParamSet::new(), "linear", 3).unwrap();
        let proba = svm.predict_proba(&[-61.0, -79.0]).unwrap();
        assert!(proba[0] > proba[1]);
        let proba = svm.predict_proba(&[-89.0, -41.0]).unwrap();
        assert!(proba[1] > proba[0]);
    }

    #[test]
    fn test_rbf_kernel_ranks_correct_room() {
        let (x, y) = scenario();
        let data = TrainingSet::new(&x, &y, 2).unwrap();
        let params = ParamSet::new().with("C", 10.0).with("gamma", 1.0);
        let svm = SupportVectorClassifier::fit(&data, &params, "rbf", 3).unwrap();
        let proba = svm.predict_proba(&[-61.0, -79.0]).unwrap();
        assert!(proba[0] > proba[1]);
        assert!((proba.iter().sum::<f64>() - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_rejects_non_positive_c() {
        let (x, y) = scenario();
        let data = TrainingSet::new(&x, &y, 2).unwrap();
        let params = ParamSet::new().with("C", 0.0);
        assert!(SupportVectorClassifier::fit(&data, &params, "linear", 0).is_err());
    }

    #[test]
    fn test_single_class_rejected() {
        let x = vec![vec![1.0], vec![2.0]];
        let y = vec![1, 1];
        let data = TrainingSet::new(&x, &y, 2).unwrap();
        assert!(matches!(
            SupportVectorClassifier::fit(&data, &ParamSet::new(), "rbf", 0),
            Err(ModelError::InsufficientClasses { .. })
        ));
    }
}
