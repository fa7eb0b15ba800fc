//! Model trainer.
//!
//! Fits every family of the training catalog one after another. Each family
//! runs a randomized search on a detached worker thread and the trainer
//! waits at most `family_timeout_secs` for it. On expiry the family is
//! reported as timed out and the worker is left running; a shared flag tells
//! it to skip candidates it has not started yet, but a candidate already
//! fitting runs to completion and its result is dropped.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use rand::Rng;

use super::diagnostics::{accuracy, confusion_matrix, named_importances, FamilyDiagnostics};
use super::search::{search_space, RandomizedSearch, SearchOutcome};
use crate::calibration::SignalMatrix;
use crate::config::TrainingConfig;
use crate::error::{log_training_error, ErrorCode, ModelError, TrainingError};
use crate::models::{ClassifierFamily, TrainedModel, TrainingSet};
use crate::telemetry::{emit, MetricEvent, TelemetryCollector};

const SEED_STREAM: u64 = 100;
const CANDIDATE_STREAM: u64 = 200;

/// Outcome of a training run
#[derive(Debug, Clone)]
pub struct TrainingReport {
    /// Families that trained within budget, in catalog order
    pub models: BTreeMap<ClassifierFamily, TrainedModel>,
    pub diagnostics: Vec<FamilyDiagnostics>,
    /// Families skipped, with the reason
    pub failures: Vec<(ClassifierFamily, ModelError)>,
    pub elapsed: Duration,
}

/// Fits the classifier catalog against a signal matrix
pub struct ModelTrainer<'a> {
    config: TrainingConfig,
    telemetry: Option<&'a TelemetryCollector>,
}

impl<'a> ModelTrainer<'a> {
    pub fn new(config: TrainingConfig, telemetry: Option<&'a TelemetryCollector>) -> Self {
        Self { config, telemetry }
    }

    pub fn config(&self) -> &TrainingConfig {
        &self.config
    }

    /// Train every catalog family
    ///
    /// # Arguments
    /// * `family_id` - Deployment identifier, used in logs and telemetry
    /// * `matrix` - Prepared calibration data
    ///
    /// # Errors
    /// * `InvalidConfig` - training settings rejected up front
    /// * `NoModelsTrained` - every family failed or timed out
    pub fn train(&self, family_id: &str, matrix: &SignalMatrix) -> Result<TrainingReport, TrainingError> {
        self.config
            .validate()
            .map_err(|reason| TrainingError::InvalidConfig { reason })
            .inspect_err(|err| log_training_error(err, "ModelTrainer::train"))?;

        let started = Instant::now();
        let features = Arc::new(matrix.features.clone());
        let labels = Arc::new(matrix.labels.clone());
        let catalog = ClassifierFamily::training_catalog(self.config.include_gaussian_process);

        log::info!(
            "[Trainer] {}: training {} families on {} samples x {} sensors ({} locations)",
            family_id,
            catalog.len(),
            matrix.n_samples(),
            matrix.header.width(),
            matrix.n_classes()
        );

        let mut report = TrainingReport {
            models: BTreeMap::new(),
            diagnostics: Vec::new(),
            failures: Vec::new(),
            elapsed: Duration::ZERO,
        };

        for (i, &family) in catalog.iter().enumerate() {
            let family_started = Instant::now();
            match self.fit_with_timeout(family, i as u64, &features, &labels, matrix.n_classes()) {
                Ok(outcome) => {
                    let diagnostics = FamilyDiagnostics {
                        family,
                        cv_score: outcome.best_score,
                        cv_folds: outcome.cv_folds,
                        training_score: accuracy(&outcome.model, &matrix.features, &matrix.labels),
                        confusion_matrix: confusion_matrix(
                            &outcome.model,
                            &matrix.features,
                            &matrix.labels,
                            matrix.n_classes(),
                        ),
                        feature_importances: named_importances(&outcome.model, &matrix.header),
                        best_params: outcome.best_params,
                        candidates: outcome.candidates,
                        elapsed_ms: family_started.elapsed().as_millis() as u64,
                    };
                    diagnostics.log(&matrix.registry);
                    emit(self.telemetry, || MetricEvent::FamilyTrained {
                        family: family.name().to_string(),
                        cv_score: diagnostics.cv_score,
                        training_score: diagnostics.training_score,
                        elapsed_ms: diagnostics.elapsed_ms,
                    });
                    emit(self.telemetry, || {
                        MetricEvent::FamilyDiagnostics(Box::new(diagnostics.clone()))
                    });
                    report.models.insert(family, outcome.model);
                    report.diagnostics.push(diagnostics);
                }
                Err(ModelError::Timeout { seconds }) => {
                    log::warn!(
                        "[Trainer] {}: {} exceeded {} s; worker abandoned",
                        family_id,
                        family,
                        seconds
                    );
                    emit(self.telemetry, || MetricEvent::FamilyTimedOut {
                        family: family.name().to_string(),
                        timeout_secs: seconds,
                    });
                    report.failures.push((family, ModelError::Timeout { seconds }));
                }
                Err(err) => {
                    log::warn!("[Trainer] {}: {} skipped: {}", family_id, family, err);
                    emit(self.telemetry, || MetricEvent::FamilyFailed {
                        family: family.name().to_string(),
                        code: err.code(),
                        reason: err.message(),
                    });
                    report.failures.push((family, err));
                }
            }
        }

        report.elapsed = started.elapsed();
        emit(self.telemetry, || MetricEvent::TrainingCompleted {
            family_id: family_id.to_string(),
            trained: report.models.len(),
            attempted: catalog.len(),
            elapsed_ms: report.elapsed.as_millis() as u64,
        });

        if report.models.is_empty() {
            let err = TrainingError::NoModelsTrained {
                attempted: catalog.len(),
            };
            log_training_error(&err, "ModelTrainer::train");
            return Err(err);
        }

        log::info!(
            "[Trainer] {}: {}/{} families trained in {:.1} s",
            family_id,
            report.models.len(),
            catalog.len(),
            report.elapsed.as_secs_f64()
        );
        Ok(report)
    }

    /// Run one family's search on a detached worker, bounded by the budget
    fn fit_with_timeout(
        &self,
        family: ClassifierFamily,
        stream: u64,
        features: &Arc<Vec<Vec<f64>>>,
        labels: &Arc<Vec<usize>>,
        n_classes: usize,
    ) -> Result<SearchOutcome, ModelError> {
        let seed: u64 = self.config.rng(SEED_STREAM + stream).gen();
        let candidates = search_space(family).sample(
            self.config.search_iterations,
            &mut self.config.rng(CANDIDATE_STREAM + stream),
        );
        let max_folds = self.config.cv_folds;
        let parallel = self.config.parallel_search;
        let budget = self.config.family_timeout_secs;

        let x = Arc::clone(features);
        let y = Arc::clone(labels);

        tracing::debug!(family = %family, candidates = candidates.len(), "spawning fit worker");
        run_guarded(
            format!("fit-{}", family.name().to_lowercase().replace(' ', "-")),
            Duration::from_secs(budget),
            move |cancel| {
                let data = TrainingSet::new(&x, &y, n_classes)?;
                RandomizedSearch {
                    family,
                    candidates,
                    max_folds,
                    parallel,
                    seed,
                    cancel,
                }
                .run(&data)
            },
        )
    }
}

/// Run `job` on a detached thread and wait at most `budget` for it
///
/// On expiry the cancel flag handed to `job` is raised and the thread is
/// abandoned. A job that observes the flag and returns its own `Timeout`
/// is reported the same way.
pub(crate) fn run_guarded<T, F>(name: String, budget: Duration, job: F) -> Result<T, ModelError>
where
    T: Send + 'static,
    F: FnOnce(&AtomicBool) -> Result<T, ModelError> + Send + 'static,
{
    let cancel = Arc::new(AtomicBool::new(false));
    let worker_cancel = Arc::clone(&cancel);
    let (tx, rx) = mpsc::channel();

    thread::Builder::new()
        .name(name)
        .spawn(move || {
            // Receiver is gone when the guard already gave up
            let _ = tx.send(job(&worker_cancel));
        })
        .map_err(|err| ModelError::Numerical {
            reason: format!("failed to spawn fit worker: {}", err),
        })?;

    match rx.recv_timeout(budget) {
        Ok(Err(ModelError::Timeout { .. })) | Err(RecvTimeoutError::Timeout) => {
            cancel.store(true, Ordering::Relaxed);
            Err(ModelError::Timeout {
                seconds: budget.as_secs(),
            })
        }
        Ok(result) => result,
        Err(RecvTimeoutError::Disconnected) => Err(ModelError::Numerical {
            reason: "fit worker panicked".to_string(),
        }),
    }
}

#[cfg(test)]
#[path = "trainer_tests.rs"]
mod trainer_tests;
