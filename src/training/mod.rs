// Training module - fits the classifier catalog against a signal matrix
//
// This module provides:
// 1. StratifiedKFold: class-balanced cross-validation folds
// 2. SearchSpace / RandomizedSearch: per-family hyperparameter search
// 3. ModelTrainer: catalog loop with the per-family timeout guard
// 4. FamilyDiagnostics: score, confusion matrix, importances, CV table

pub mod cv;
pub mod diagnostics;
pub mod search;
pub mod trainer;

pub use diagnostics::{CandidateResult, FamilyDiagnostics};
pub use search::{search_space, SearchSpace};
pub use trainer::{ModelTrainer, TrainingReport};
