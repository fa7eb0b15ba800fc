//! Hyperparameter search spaces and randomized candidate search.
//!
//! Every family has a fixed categorical grid. A search draws up to
//! `search_iterations` distinct grid points (the whole grid when it is not
//! larger), scores each by stratified cross-validated accuracy and refits
//! the best on every row.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};

use once_cell::sync::Lazy;
use rand::rngs::StdRng;
use rand::seq::index;
use rayon::prelude::*;

use super::cv::{Fold, StratifiedKFold};
use super::diagnostics::{accuracy, CandidateResult};
use crate::error::ModelError;
use crate::models::{ClassifierFamily, ParamSet, ParamValue, TrainedModel, TrainingSet};

/// Categorical grid of named parameters
#[derive(Debug, Clone, Default)]
pub struct SearchSpace {
    params: Vec<(&'static str, Vec<ParamValue>)>,
}

impl SearchSpace {
    fn param<V: Into<ParamValue>>(mut self, name: &'static str, values: Vec<V>) -> Self {
        self.params.push((name, values.into_iter().map(Into::into).collect()));
        self
    }

    /// Number of grid points (1 for an empty space)
    pub fn grid_size(&self) -> usize {
        self.params.iter().map(|(_, values)| values.len()).product()
    }

    /// Grid point at `index` in mixed-radix order, last parameter fastest
    pub fn candidate(&self, mut index: usize) -> ParamSet {
        let mut set = ParamSet::new();
        for (name, values) in self.params.iter().rev() {
            set.insert(name, values[index % values.len()].clone());
            index /= values.len();
        }
        set
    }

    /// Distinct candidates: the whole grid, or a random `n_iter` subset
    pub fn sample(&self, n_iter: usize, rng: &mut StdRng) -> Vec<ParamSet> {
        let size = self.grid_size();
        if size <= n_iter {
            return (0..size).map(|i| self.candidate(i)).collect();
        }
        let mut picks = index::sample(rng, size, n_iter).into_vec();
        picks.sort_unstable();
        picks.into_iter().map(|i| self.candidate(i)).collect()
    }
}

static SEARCH_SPACES: Lazy<HashMap<ClassifierFamily, SearchSpace>> = Lazy::new(|| {
    let c_values = vec![0.001, 0.01, 0.1, 1.0, 10.0];
    let gamma_values = vec![0.1, 1.0, 10.0, 100.0];
    let depth_values: Vec<Option<i64>> = vec![None, Some(5), Some(10), Some(15), Some(20)];
    let split_values: Vec<i64> = vec![2, 5, 10];

    let mut spaces = HashMap::new();
    spaces.insert(
        ClassifierFamily::NearestNeighbors,
        SearchSpace::default()
            .param("n_neighbors", vec![3i64, 5, 7, 9])
            .param("weights", vec!["uniform", "distance"])
            .param("metric", vec!["euclidean", "manhattan"]),
    );
    spaces.insert(
        ClassifierFamily::LinearSvm,
        SearchSpace::default()
            .param("C", c_values.clone())
            .param("kernel", vec!["linear", "rbf"])
            .param("gamma", gamma_values.clone()),
    );
    spaces.insert(
        ClassifierFamily::RbfSvm,
        SearchSpace::default()
            .param("C", c_values)
            .param("gamma", gamma_values),
    );
    spaces.insert(ClassifierFamily::GaussianProcess, SearchSpace::default());
    spaces.insert(
        ClassifierFamily::DecisionTree,
        SearchSpace::default()
            .param("max_depth", depth_values.clone())
            .param("min_samples_split", split_values.clone()),
    );
    spaces.insert(
        ClassifierFamily::RandomForest,
        SearchSpace::default()
            .param("n_estimators", vec![10i64, 50, 100, 200])
            .param("max_depth", depth_values)
            .param("min_samples_split", split_values),
    );
    spaces.insert(
        ClassifierFamily::NeuralNet,
        SearchSpace::default()
            .param(
                "hidden_layer_sizes",
                vec![vec![50usize, 50, 50], vec![50, 100, 50], vec![100]],
            )
            .param("activation", vec!["tanh", "relu"])
            .param("solver", vec!["sgd", "adam"])
            .param("alpha", vec![0.0001, 0.001, 0.05])
            .param("learning_rate", vec!["constant", "adaptive"]),
    );
    spaces.insert(
        ClassifierFamily::AdaBoost,
        SearchSpace::default()
            .param("n_estimators", vec![50i64, 100, 200])
            .param("learning_rate", vec![0.01, 0.05, 0.1, 0.5, 1.0]),
    );
    spaces.insert(ClassifierFamily::NaiveBayes, SearchSpace::default());
    spaces.insert(
        ClassifierFamily::Qda,
        SearchSpace::default().param("reg_param", vec![0.0, 0.1, 0.2, 0.3, 0.4, 0.5]),
    );
    spaces.insert(
        ClassifierFamily::GradientBoosting,
        SearchSpace::default()
            .param("n_estimators", vec![100i64, 200, 300])
            .param("learning_rate", vec![0.01, 0.1, 1.0])
            .param("subsample", vec![0.5, 0.7, 1.0])
            .param("max_depth", vec![3i64, 7, 9]),
    );
    spaces
});

/// Search grid for a classifier family
pub fn search_space(family: ClassifierFamily) -> &'static SearchSpace {
    static EMPTY: Lazy<SearchSpace> = Lazy::new(SearchSpace::default);
    SEARCH_SPACES.get(&family).unwrap_or(&EMPTY)
}

/// Result of a completed search
#[derive(Debug, Clone)]
pub struct SearchOutcome {
    pub model: TrainedModel,
    pub best_params: ParamSet,
    /// Mean CV accuracy of the best candidate (training accuracy without CV)
    pub best_score: f64,
    pub cv_folds: usize,
    pub candidates: Vec<CandidateResult>,
}

/// Randomized search for one family
pub struct RandomizedSearch<'a> {
    pub family: ClassifierFamily,
    pub candidates: Vec<ParamSet>,
    pub max_folds: usize,
    pub parallel: bool,
    pub seed: u64,
    /// Raised by the timeout guard; checked before each candidate
    pub cancel: &'a AtomicBool,
}

impl RandomizedSearch<'_> {
    /// Score every candidate and refit the best on all rows
    ///
    /// # Errors
    /// The first candidate error when no candidate yields a finite score,
    /// `Timeout` when cancelled before a winner was refit.
    pub fn run(&self, data: &TrainingSet) -> Result<SearchOutcome, ModelError> {
        let folds = StratifiedKFold::effective_splits(self.max_folds, data.y)
            .map(|k| StratifiedKFold::new(k).split(data.y))
            .unwrap_or_default();

        let evaluate = |params: &ParamSet| self.evaluate(data, &folds, params);
        let candidates: Vec<CandidateResult> = if self.parallel {
            self.candidates.par_iter().map(evaluate).collect()
        } else {
            self.candidates.iter().map(evaluate).collect()
        };

        let mut best: Option<usize> = None;
        for (i, result) in candidates.iter().enumerate() {
            if result.mean_score.is_finite()
                && best.map_or(true, |b| result.mean_score > candidates[b].mean_score)
            {
                best = Some(i);
            }
        }
        let Some(best) = best else {
            if self.cancel.load(Ordering::Relaxed) {
                // The guard reports the real budget to the caller
                return Err(ModelError::Timeout { seconds: 0 });
            }
            let reason = candidates
                .iter()
                .find_map(|c| c.error.clone())
                .unwrap_or_else(|| "no candidate produced a finite score".to_string());
            return Err(ModelError::Numerical { reason });
        };

        let best_params = candidates[best].params.clone();
        let best_score = candidates[best].mean_score;
        let model = self.family.fit(data, &best_params, self.seed)?;
        Ok(SearchOutcome {
            model,
            best_params,
            best_score,
            cv_folds: folds.len(),
            candidates,
        })
    }

    fn evaluate(&self, data: &TrainingSet, folds: &[Fold], params: &ParamSet) -> CandidateResult {
        if self.cancel.load(Ordering::Relaxed) {
            return CandidateResult::failed(params.clone(), "cancelled after timeout".to_string());
        }

        if folds.is_empty() {
            return match self.family.fit(data, params, self.seed) {
                Ok(model) => {
                    let score = accuracy(&model, data.x, data.y);
                    CandidateResult::scored(params.clone(), vec![score])
                }
                Err(err) => CandidateResult::failed(params.clone(), err.to_string()),
            };
        }

        let mut scores = Vec::with_capacity(folds.len());
        for fold in folds {
            let train_x: Vec<Vec<f64>> = fold.train.iter().map(|&i| data.x[i].clone()).collect();
            let train_y: Vec<usize> = fold.train.iter().map(|&i| data.y[i]).collect();
            let test_x: Vec<Vec<f64>> = fold.test.iter().map(|&i| data.x[i].clone()).collect();
            let test_y: Vec<usize> = fold.test.iter().map(|&i| data.y[i]).collect();

            let fitted = TrainingSet::new(&train_x, &train_y, data.n_classes)
                .and_then(|train| self.family.fit(&train, params, self.seed));
            match fitted {
                Ok(model) => scores.push(accuracy(&model, &test_x, &test_y)),
                Err(err) => {
                    tracing::debug!(family = %self.family, params = %params, error = %err, "candidate failed");
                    return CandidateResult::failed(params.clone(), err.to_string());
                }
            }
        }
        CandidateResult::scored(params.clone(), scores)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;

    #[test]
    fn test_grid_sizes_match_catalog() {
        assert_eq!(search_space(ClassifierFamily::NearestNeighbors).grid_size(), 16);
        assert_eq!(search_space(ClassifierFamily::LinearSvm).grid_size(), 40);
        assert_eq!(search_space(ClassifierFamily::RbfSvm).grid_size(), 20);
        assert_eq!(search_space(ClassifierFamily::DecisionTree).grid_size(), 15);
        assert_eq!(search_space(ClassifierFamily::RandomForest).grid_size(), 60);
        assert_eq!(search_space(ClassifierFamily::NeuralNet).grid_size(), 72);
        assert_eq!(search_space(ClassifierFamily::AdaBoost).grid_size(), 15);
        assert_eq!(search_space(ClassifierFamily::NaiveBayes).grid_size(), 1);
        assert_eq!(search_space(ClassifierFamily::Qda).grid_size(), 6);
        assert_eq!(search_space(ClassifierFamily::GradientBoosting).grid_size(), 81);
    }

    #[test]
    fn test_small_grid_is_exhaustive() {
        let mut rng = StdRng::seed_from_u64(0);
        let candidates = search_space(ClassifierFamily::Qda).sample(10, &mut rng);
        assert_eq!(candidates.len(), 6);
        let empty = search_space(ClassifierFamily::NaiveBayes).sample(10, &mut rng);
        assert_eq!(empty, vec![ParamSet::new()]);
    }

    #[test]
    fn test_large_grid_sampled_without_replacement() {
        let mut rng = StdRng::seed_from_u64(0);
        let candidates = search_space(ClassifierFamily::NeuralNet).sample(10, &mut rng);
        assert_eq!(candidates.len(), 10);
        for (i, a) in candidates.iter().enumerate() {
            for b in &candidates[i + 1..] {
                assert_ne!(a, b);
            }
        }
    }

    #[test]
    fn test_candidate_decoding() {
        let space = search_space(ClassifierFamily::DecisionTree);
        let first = space.candidate(0);
        assert_eq!(first.get("max_depth"), Some(&ParamValue::None));
        assert_eq!(first.get("min_samples_split"), Some(&ParamValue::Int(2)));
        let last = space.candidate(14);
        assert_eq!(last.get("max_depth"), Some(&ParamValue::Int(20)));
        assert_eq!(last.get("min_samples_split"), Some(&ParamValue::Int(10)));
    }

    fn scenario() -> (Vec<Vec<f64>>, Vec<usize>) {
        (
            vec![
                vec![-60.0, -80.0],
                vec![-90.0, -40.0],
                vec![-62.0, -78.0],
                vec![-88.0, -42.0],
            ],
            vec![0, 1, 0, 1],
        )
    }

    #[test]
    fn test_search_picks_finite_candidate_over_failures() {
        let (x, y) = scenario();
        let data = TrainingSet::new(&x, &y, 2).unwrap();
        let cancel = AtomicBool::new(false);
        // n_neighbors 3 cannot fit a two-row training fold
        let search = RandomizedSearch {
            family: ClassifierFamily::NearestNeighbors,
            candidates: vec![
                ParamSet::new().with("n_neighbors", 3i64),
                ParamSet::new().with("n_neighbors", 1i64),
            ],
            max_folds: 5,
            parallel: false,
            seed: 0,
            cancel: &cancel,
        };
        let outcome = search.run(&data).unwrap();
        assert_eq!(outcome.cv_folds, 2);
        assert!(outcome.candidates[0].mean_score.is_nan());
        assert!(outcome.candidates[0].error.is_some());
        assert_eq!(outcome.best_params.get("n_neighbors"), Some(&ParamValue::Int(1)));
        assert_eq!(outcome.best_score, 1.0);
    }

    #[test]
    fn test_search_fails_when_every_candidate_fails() {
        let (x, y) = scenario();
        let data = TrainingSet::new(&x, &y, 2).unwrap();
        let cancel = AtomicBool::new(false);
        let search = RandomizedSearch {
            family: ClassifierFamily::NearestNeighbors,
            candidates: vec![ParamSet::new().with("n_neighbors", 9i64)],
            max_folds: 5,
            parallel: true,
            seed: 0,
            cancel: &cancel,
        };
        assert!(matches!(search.run(&data), Err(ModelError::Numerical { .. })));
    }

    #[test]
    fn test_cancelled_search_reports_timeout() {
        let (x, y) = scenario();
        let data = TrainingSet::new(&x, &y, 2).unwrap();
        let cancel = AtomicBool::new(true);
        let search = RandomizedSearch {
            family: ClassifierFamily::DecisionTree,
            candidates: vec![ParamSet::new()],
            max_folds: 5,
            parallel: false,
            seed: 0,
            cancel: &cancel,
        };
        assert!(matches!(search.run(&data), Err(ModelError::Timeout { .. })));
    }

    #[test]
    fn test_single_row_class_skips_cross_validation() {
        let x = vec![vec![1.0], vec![2.0], vec![9.0]];
        let y = vec![0, 0, 1];
        let data = TrainingSet::new(&x, &y, 2).unwrap();
        let cancel = AtomicBool::new(false);
        let search = RandomizedSearch {
            family: ClassifierFamily::DecisionTree,
            candidates: vec![ParamSet::new()],
            max_folds: 5,
            parallel: false,
            seed: 0,
            cancel: &cancel,
        };
        let outcome = search.run(&data).unwrap();
        assert_eq!(outcome.cv_folds, 0);
        assert_eq!(outcome.best_score, 1.0);
    }
}
