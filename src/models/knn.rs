//! K-Nearest Neighbors.
//!
//! Stores the training rows and votes among the `k` closest, either one vote
//! per neighbour or weighted by inverse distance.

use super::linalg::squared_euclidean;
use super::params::ParamSet;
use super::{check_width, TrainingSet};
use crate::error::ModelError;
use serde::{Deserialize, Serialize};

/// Distance metric for neighbour search
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DistanceMetric {
    Euclidean,
    Manhattan,
}

impl DistanceMetric {
    fn distance(self, a: &[f64], b: &[f64]) -> f64 {
        match self {
            DistanceMetric::Euclidean => squared_euclidean(a, b).sqrt(),
            DistanceMetric::Manhattan => a.iter().zip(b).map(|(x, y)| (x - y).abs()).sum(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum VoteWeights {
    Uniform,
    /// Inverse distance; exact matches take the whole vote
    Distance,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KNearestNeighbors {
    k: usize,
    weights: VoteWeights,
    metric: DistanceMetric,
    x: Vec<Vec<f64>>,
    y: Vec<usize>,
    n_classes: usize,
}

impl KNearestNeighbors {
    /// Reads `n_neighbors` (5), `weights` (uniform|distance), `metric`
    /// (euclidean|manhattan). Fails when `k` exceeds the sample count.
    pub fn fit(data: &TrainingSet, params: &ParamSet) -> Result<Self, ModelError> {
        let k = params.usize_or("n_neighbors", 5)?;
        if k > data.n_samples() {
            return Err(ModelError::InvalidParameter {
                name: "n_neighbors".to_string(),
                reason: format!("expected n_neighbors <= n_samples, got {} > {}", k, data.n_samples()),
            });
        }
        let weights = match params.choice_or("weights", &["uniform", "distance"])? {
            "distance" => VoteWeights::Distance,
            _ => VoteWeights::Uniform,
        };
        let metric = match params.choice_or("metric", &["euclidean", "manhattan"])? {
            "manhattan" => DistanceMetric::Manhattan,
            _ => DistanceMetric::Euclidean,
        };
        Ok(Self {
            k,
            weights,
            metric,
            x: data.x.to_vec(),
            y: data.y.to_vec(),
            n_classes: data.n_classes,
        })
    }

    pub fn predict_proba(&self, row: &[f64]) -> Result<Vec<f64>, ModelError> {
        check_width(self.x.first().map_or(0, Vec::len), row)?;

        let mut distances: Vec<(f64, usize)> = self
            .x
            .iter()
            .zip(&self.y)
            .map(|(train, &label)| (self.metric.distance(train, row), label))
            .collect();
        distances.sort_by(|a, b| a.0.total_cmp(&b.0));
        let nearest = &distances[..self.k.min(distances.len())];

        let mut votes = vec![0.0; self.n_classes];
        match self.weights {
            VoteWeights::Uniform => {
                for &(_, label) in nearest {
                    votes[label] += 1.0;
                }
            }
            VoteWeights::Distance => {
                let exact: Vec<usize> = nearest
                    .iter()
                    .filter(|(d, _)| *d == 0.0)
                    .map(|&(_, label)| label)
                    .collect();
                if exact.is_empty() {
                    for &(d, label) in nearest {
                        votes[label] += 1.0 / d;
                    }
                } else {
                    for label in exact {
                        votes[label] += 1.0;
                    }
                }
            }
        }

        let total: f64 = votes.iter().sum();
        for v in votes.iter_mut() {
            *v /= total;
        }
        Ok(votes)
    }
}
