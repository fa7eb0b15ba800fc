// InstanceManager: service-layer orchestration for one data folder
//
// learn:    calibration CSV -> signal matrix -> trainer -> store -> cache
// classify: cache hit, or store load -> cache, then classify
//
// Training and classification must not run against the same family at the
// same time; the manager does not arbitrate that.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use crate::calibration::SignalMatrix;
use crate::config::AppConfig;
use crate::engine::{AiInstance, Classification, SensorReading};
use crate::error::{
    log_classify_error, log_training_error, ClassifyError, ModelError, StoreError, TrainingError,
};
use crate::managers::cache::{ExpiringInstanceCache, InstanceCache};
use crate::models::ClassifierFamily;
use crate::store::ModelStore;
use crate::telemetry::{emit, MetricEvent, TelemetryCollector};
use crate::training::{FamilyDiagnostics, ModelTrainer};

/// Result of a `learn` call
#[derive(Debug, Clone)]
pub struct LearnOutcome {
    pub instance: Arc<AiInstance>,
    pub diagnostics: Vec<FamilyDiagnostics>,
    /// Families skipped, with the reason
    pub failures: Vec<(ClassifierFamily, ModelError)>,
    pub elapsed: Duration,
    /// Where the instance was persisted
    pub path: PathBuf,
}

/// Owns the store, the warm cache handle and the telemetry sink
pub struct InstanceManager {
    config: AppConfig,
    store: ModelStore,
    cache: Arc<dyn InstanceCache>,
    telemetry: Option<Arc<TelemetryCollector>>,
}

impl InstanceManager {
    /// Create a manager with explicit collaborators
    ///
    /// # Arguments
    /// * `config` - Training, cache and store settings
    /// * `cache` - Warm instance cache shared with other managers
    /// * `telemetry` - Optional diagnostics sink
    pub fn new(
        config: AppConfig,
        cache: Arc<dyn InstanceCache>,
        telemetry: Option<Arc<TelemetryCollector>>,
    ) -> Self {
        let store = ModelStore::from_config(&config.store);
        Self {
            config,
            store,
            cache,
            telemetry,
        }
    }

    /// Create a manager with a private expiring cache and no telemetry
    pub fn with_default_cache(config: AppConfig) -> Self {
        let cache = Arc::new(ExpiringInstanceCache::from_config(&config.cache));
        Self::new(config, cache, None)
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn store(&self) -> &ModelStore {
        &self.store
    }

    /// Train a family from its calibration file and make it servable
    ///
    /// # Errors
    /// * `CalibrationNotFound` / `CalibrationRead` / `EmptyCalibration`
    /// * `NoModelsTrained` - nothing is persisted in that case
    /// * `StorePersist` - training succeeded but the save failed
    pub fn learn(&self, family: &str, csv_path: impl AsRef<Path>) -> Result<LearnOutcome, TrainingError> {
        let matrix = SignalMatrix::from_csv(csv_path, &self.config.training)
            .inspect_err(|err| log_training_error(err, "InstanceManager::learn"))?;
        let mut report = ModelTrainer::new(self.config.training.clone(), self.telemetry.as_deref())
            .train(family, &matrix)?;
        let diagnostics = std::mem::take(&mut report.diagnostics);
        let failures = std::mem::take(&mut report.failures);
        let elapsed = report.elapsed;

        let instance = AiInstance::from_training(family, matrix, report);
        let path = self.store.save(&instance).map_err(|err| {
            let err = TrainingError::StorePersist {
                reason: err.to_string(),
            };
            log_training_error(&err, "InstanceManager::learn");
            err
        })?;

        let instance = Arc::new(instance);
        self.cache.put(family.to_string(), Arc::clone(&instance));
        Ok(LearnOutcome {
            instance,
            diagnostics,
            failures,
            elapsed,
            path,
        })
    }

    /// Classify a reading against the instance named by `reading.family`
    ///
    /// # Errors
    /// * `ModelNotFound` - the family was never trained in this data folder
    /// * `Store` - the persisted instance could not be loaded
    pub fn classify(&self, reading: &SensorReading) -> Result<Classification, ClassifyError> {
        let instance = self.instance(&reading.family)?;
        Ok(instance.classify(reading, self.telemetry.as_deref()))
    }

    /// Cached instance for a family, loading it from the store on a miss
    pub fn instance(&self, family: &str) -> Result<Arc<AiInstance>, ClassifyError> {
        if let Some(instance) = self.cache.get(family) {
            self.record_lookup(family, true);
            return Ok(instance);
        }
        self.record_lookup(family, false);

        let instance = self
            .store
            .load(family)
            .map_err(|err| match err {
                StoreError::NotFound { path } => ClassifyError::ModelNotFound {
                    family: family.to_string(),
                    path,
                },
                other => ClassifyError::Store(other),
            })
            .inspect_err(|err| log_classify_error(err, "InstanceManager::instance"))?;

        let instance = Arc::new(instance);
        self.cache.put(family.to_string(), Arc::clone(&instance));
        Ok(instance)
    }

    fn record_lookup(&self, family: &str, hit: bool) {
        tracing::debug!(family, hit, "instance cache lookup");
        emit(self.telemetry.as_deref(), || MetricEvent::CacheLookup {
            family_id: family.to_string(),
            hit,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{StoreConfig, TrainingConfig};
    use std::fs;

    fn manager_in(dir: &Path, telemetry: Option<Arc<TelemetryCollector>>) -> InstanceManager {
        let config = AppConfig {
            training: TrainingConfig {
                seed: Some(3),
                search_iterations: 1,
                cv_folds: 2,
                ..TrainingConfig::default()
            },
            store: StoreConfig {
                data_folder: dir.to_path_buf(),
                ..StoreConfig::default()
            },
            ..AppConfig::default()
        };
        let cache = Arc::new(ExpiringInstanceCache::from_config(&config.cache));
        InstanceManager::new(config, cache, telemetry)
    }

    fn write_calibration(dir: &Path) -> PathBuf {
        let path = dir.join("fam1.csv");
        fs::write(
            &path,
            "location,wifi-aa,wifi-bb\nroomA,-60,-80\nroomA,-62,-78\nroomB,-90,-40\nroomB,-88,-42\n",
        )
        .unwrap();
        path
    }

    #[test]
    fn test_learn_persists_and_caches() {
        let dir = tempfile::tempdir().unwrap();
        let telemetry = Arc::new(TelemetryCollector::default());
        let manager = manager_in(dir.path(), Some(Arc::clone(&telemetry)));
        let outcome = manager.learn("fam1", write_calibration(dir.path())).unwrap();
        assert!(outcome.path.exists());
        assert!(!outcome.instance.models.is_empty());
        assert_eq!(outcome.diagnostics.len(), outcome.instance.models.len());

        let cached = manager.instance("fam1").unwrap();
        assert!(Arc::ptr_eq(&cached, &outcome.instance));
        let hits = telemetry
            .snapshot()
            .recent
            .iter()
            .filter(|e| matches!(e, MetricEvent::CacheLookup { hit: true, .. }))
            .count();
        assert_eq!(hits, 1);
    }

    #[test]
    fn test_cold_manager_loads_from_store() {
        let dir = tempfile::tempdir().unwrap();
        manager_in(dir.path(), None)
            .learn("fam1", write_calibration(dir.path()))
            .unwrap();

        let cold = manager_in(dir.path(), None);
        let reading = SensorReading::new("fam1").with("wifi", "aa", -61.0).with("wifi", "bb", -79.0);
        let result = cold.classify(&reading).unwrap();
        assert!(!result.is_unknown);
        assert!(!result.predictions.is_empty());
    }

    #[test]
    fn test_unknown_family_is_model_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let manager = manager_in(dir.path(), None);
        match manager.classify(&SensorReading::new("nobody")) {
            Err(ClassifyError::ModelNotFound { family, .. }) => assert_eq!(family, "nobody"),
            other => panic!("Expected ModelNotFound, got {:?}", other),
        }
    }

    #[test]
    fn test_missing_calibration_persists_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let manager = manager_in(dir.path(), None);
        let err = manager.learn("fam1", dir.path().join("missing.csv")).unwrap_err();
        assert!(matches!(err, TrainingError::CalibrationNotFound { .. }));
        assert!(!manager.store().path_for("fam1").exists());
    }
}
