//! CART decision trees.
//!
//! Classification trees split on weighted Gini impurity and keep the class
//! distribution of each leaf, so `predict_proba` is the leaf's distribution.
//! Regression trees split on squared error and store a Newton step
//! (`sum(g) / sum(h)`) per leaf; gradient boosting builds on them.

use super::params::ParamSet;
use super::{check_width, TrainingSet};
use crate::error::ModelError;
use rand::rngs::StdRng;
use rand::seq::index;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};

/// A node in a decision tree (either split or leaf).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum TreeNode {
    /// Samples with `row[feature] <= threshold` go left
    Split {
        feature: usize,
        threshold: f64,
        left: Box<TreeNode>,
        right: Box<TreeNode>,
    },
    Leaf { value: Vec<f64> },
}

impl TreeNode {
    fn leaf_for(&self, row: &[f64]) -> &[f64] {
        let mut node = self;
        loop {
            match node {
                TreeNode::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    node = if row[*feature] <= *threshold { left } else { right };
                }
                TreeNode::Leaf { value } => return value,
            }
        }
    }

    /// Leaf depth 0, split depth 1 + max(children)
    pub fn depth(&self) -> usize {
        match self {
            TreeNode::Split { left, right, .. } => 1 + left.depth().max(right.depth()),
            TreeNode::Leaf { .. } => 0,
        }
    }

    pub fn n_leaves(&self) -> usize {
        match self {
            TreeNode::Split { left, right, .. } => left.n_leaves() + right.n_leaves(),
            TreeNode::Leaf { .. } => 1,
        }
    }
}

/// Growth limits shared by every tree builder
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TreeParams {
    pub max_depth: Option<usize>,
    pub min_samples_split: usize,
    /// Features considered per split; `None` means all
    pub max_features: Option<usize>,
}

impl Default for TreeParams {
    fn default() -> Self {
        Self {
            max_depth: None,
            min_samples_split: 2,
            max_features: None,
        }
    }
}

impl TreeParams {
    pub fn from_params(params: &ParamSet) -> Result<Self, ModelError> {
        let min_samples_split = params.usize_or("min_samples_split", 2)?;
        if min_samples_split < 2 {
            return Err(ModelError::InvalidParameter {
                name: "min_samples_split".to_string(),
                reason: format!("must be at least 2, got {}", min_samples_split),
            });
        }
        Ok(Self {
            max_depth: params.opt_usize_or("max_depth", None)?,
            min_samples_split,
            max_features: None,
        })
    }
}

/// Impurity bookkeeping for one kind of tree
trait Criterion {
    type Stats: Clone;

    fn empty(&self) -> Self::Stats;
    fn add(&self, stats: &mut Self::Stats, sample: usize);
    fn remove(&self, stats: &mut Self::Stats, sample: usize);
    /// Impurity scaled by node weight, so children can be summed
    fn weighted_impurity(&self, stats: &Self::Stats) -> f64;
    fn leaf_value(&self, stats: &Self::Stats) -> Vec<f64>;
}

struct Gini<'a> {
    labels: &'a [usize],
    weights: &'a [f64],
    n_classes: usize,
}

impl Criterion for Gini<'_> {
    type Stats = (Vec<f64>, f64);

    fn empty(&self) -> Self::Stats {
        (vec![0.0; self.n_classes], 0.0)
    }

    fn add(&self, stats: &mut Self::Stats, sample: usize) {
        let w = self.weights[sample];
        stats.0[self.labels[sample]] += w;
        stats.1 += w;
    }

    fn remove(&self, stats: &mut Self::Stats, sample: usize) {
        let w = self.weights[sample];
        stats.0[self.labels[sample]] -= w;
        stats.1 -= w;
    }

    fn weighted_impurity(&self, (counts, total): &Self::Stats) -> f64 {
        if *total <= 0.0 {
            return 0.0;
        }
        total - counts.iter().map(|c| c * c).sum::<f64>() / total
    }

    fn leaf_value(&self, (counts, total): &Self::Stats) -> Vec<f64> {
        if *total <= 0.0 {
            return vec![1.0 / self.n_classes as f64; self.n_classes];
        }
        counts.iter().map(|c| c / total).collect()
    }
}

struct SquaredError<'a> {
    gradients: &'a [f64],
    hessians: &'a [f64],
}

impl Criterion for SquaredError<'_> {
    /// (count, sum g, sum g^2, sum h)
    type Stats = (f64, f64, f64, f64);

    fn empty(&self) -> Self::Stats {
        (0.0, 0.0, 0.0, 0.0)
    }

    fn add(&self, s: &mut Self::Stats, sample: usize) {
        let g = self.gradients[sample];
        s.0 += 1.0;
        s.1 += g;
        s.2 += g * g;
        s.3 += self.hessians[sample];
    }

    fn remove(&self, s: &mut Self::Stats, sample: usize) {
        let g = self.gradients[sample];
        s.0 -= 1.0;
        s.1 -= g;
        s.2 -= g * g;
        s.3 -= self.hessians[sample];
    }

    fn weighted_impurity(&self, s: &Self::Stats) -> f64 {
        if s.0 <= 0.0 {
            return 0.0;
        }
        (s.2 - s.1 * s.1 / s.0).max(0.0)
    }

    fn leaf_value(&self, s: &Self::Stats) -> Vec<f64> {
        if s.3.abs() < 1e-12 {
            vec![0.0]
        } else {
            vec![s.1 / s.3]
        }
    }
}

struct Builder<'a, C: Criterion> {
    x: &'a [Vec<f64>],
    criterion: C,
    params: TreeParams,
    n_features: usize,
    importances: Vec<f64>,
    rng: &'a mut StdRng,
}

impl<C: Criterion> Builder<'_, C> {
    fn stats_of(&self, samples: &[usize]) -> C::Stats {
        let mut stats = self.criterion.empty();
        for &s in samples {
            self.criterion.add(&mut stats, s);
        }
        stats
    }

    fn build(&mut self, samples: &mut [usize], depth: usize) -> TreeNode {
        let stats = self.stats_of(samples);
        let impurity = self.criterion.weighted_impurity(&stats);

        let depth_reached = self.params.max_depth.is_some_and(|max| depth >= max);
        if depth_reached || samples.len() < self.params.min_samples_split || impurity <= 1e-12 {
            return TreeNode::Leaf {
                value: self.criterion.leaf_value(&stats),
            };
        }

        let Some((feature, threshold, gain)) = self.best_split(samples, &stats, impurity) else {
            return TreeNode::Leaf {
                value: self.criterion.leaf_value(&stats),
            };
        };
        self.importances[feature] += gain.max(0.0);

        let x = self.x;
        let mid = partition(samples, |&s| x[s][feature] <= threshold);
        let (left, right) = samples.split_at_mut(mid);
        TreeNode::Split {
            feature,
            threshold,
            left: Box::new(self.build(left, depth + 1)),
            right: Box::new(self.build(right, depth + 1)),
        }
    }

    fn best_split(
        &mut self,
        samples: &[usize],
        parent: &C::Stats,
        parent_impurity: f64,
    ) -> Option<(usize, f64, f64)> {
        let features: Vec<usize> = match self.params.max_features {
            Some(k) if k < self.n_features => {
                index::sample(&mut *self.rng, self.n_features, k).into_vec()
            }
            _ => (0..self.n_features).collect(),
        };

        let mut best: Option<(usize, f64, f64)> = None;
        let mut order = samples.to_vec();
        for feature in features {
            order.sort_by(|&a, &b| self.x[a][feature].total_cmp(&self.x[b][feature]));
            let mut left = self.criterion.empty();
            let mut right = parent.clone();
            for i in 0..order.len() - 1 {
                self.criterion.add(&mut left, order[i]);
                self.criterion.remove(&mut right, order[i]);
                let (here, next) = (self.x[order[i]][feature], self.x[order[i + 1]][feature]);
                if here == next {
                    continue;
                }
                let gain = parent_impurity
                    - self.criterion.weighted_impurity(&left)
                    - self.criterion.weighted_impurity(&right);
                // Zero-gain splits are allowed so XOR-like layouts still separate
                if gain > -1e-12 && best.map_or(true, |(_, _, g)| gain > g) {
                    best = Some((feature, here + (next - here) / 2.0, gain));
                }
            }
        }
        best
    }
}

/// In-place partition; returns the count of `pred` matches
fn partition<F: Fn(&usize) -> bool>(samples: &mut [usize], pred: F) -> usize {
    let mut mid = 0;
    for i in 0..samples.len() {
        if pred(&samples[i]) {
            samples.swap(mid, i);
            mid += 1;
        }
    }
    mid
}

fn normalized(mut importances: Vec<f64>) -> Vec<f64> {
    let total: f64 = importances.iter().sum();
    if total > 0.0 {
        for v in importances.iter_mut() {
            *v /= total;
        }
    }
    importances
}

/// Gini classification tree
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecisionTree {
    pub(crate) root: TreeNode,
    pub(crate) n_features: usize,
    pub(crate) importances: Vec<f64>,
}

impl DecisionTree {
    /// Fit with `max_depth` / `min_samples_split` from the search candidate
    pub fn fit(data: &TrainingSet, params: &ParamSet, seed: u64) -> Result<Self, ModelError> {
        let tree_params = TreeParams::from_params(params)?;
        let weights = vec![1.0; data.n_samples()];
        let samples: Vec<usize> = (0..data.n_samples()).collect();
        let mut rng = StdRng::seed_from_u64(seed);
        Self::fit_weighted(data, &weights, samples, tree_params, &mut rng)
    }

    /// Fit on an explicit sample list (duplicates allowed) with sample weights
    pub(crate) fn fit_weighted(
        data: &TrainingSet,
        weights: &[f64],
        mut samples: Vec<usize>,
        params: TreeParams,
        rng: &mut StdRng,
    ) -> Result<Self, ModelError> {
        if samples.is_empty() {
            return Err(ModelError::EmptyData);
        }
        let n_features = data.width();
        let mut builder = Builder {
            x: data.x,
            criterion: Gini {
                labels: data.y,
                weights,
                n_classes: data.n_classes,
            },
            params,
            n_features,
            importances: vec![0.0; n_features],
            rng,
        };
        let root = builder.build(&mut samples, 0);
        Ok(Self {
            root,
            n_features,
            importances: builder.importances,
        })
    }

    pub fn predict_proba(&self, row: &[f64]) -> Result<Vec<f64>, ModelError> {
        check_width(self.n_features, row)?;
        Ok(self.root.leaf_for(row).to_vec())
    }

    pub(crate) fn leaf_distribution(&self, row: &[f64]) -> &[f64] {
        self.root.leaf_for(row)
    }

    /// Impurity decrease per feature, normalized to sum to 1
    pub fn feature_importances(&self) -> Vec<f64> {
        normalized(self.importances.clone())
    }

    pub fn depth(&self) -> usize {
        self.root.depth()
    }
}

/// Squared-error regression tree with Newton leaf values
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegressionTree {
    root: TreeNode,
    pub(crate) importances: Vec<f64>,
}

impl RegressionTree {
    pub(crate) fn fit(
        x: &[Vec<f64>],
        gradients: &[f64],
        hessians: &[f64],
        mut samples: Vec<usize>,
        params: TreeParams,
        rng: &mut StdRng,
    ) -> Result<Self, ModelError> {
        if samples.is_empty() {
            return Err(ModelError::EmptyData);
        }
        let n_features = x.first().map_or(0, Vec::len);
        let mut builder = Builder {
            x,
            criterion: SquaredError {
                gradients,
                hessians,
            },
            params,
            n_features,
            importances: vec![0.0; n_features],
            rng,
        };
        let root = builder.build(&mut samples, 0);
        Ok(Self {
            root,
            importances: builder.importances,
        })
    }

    pub(crate) fn predict(&self, row: &[f64]) -> f64 {
        self.root.leaf_for(row).first().copied().unwrap_or(0.0)
    }
}

pub(crate) fn normalized_importances(raw: Vec<f64>) -> Vec<f64> {
    normalized(raw)
}
