//! End-to-end tests for the training and classification pipeline
//!
//! Covers calibration CSV -> trained instance -> persisted file -> live
//! classification, through both the core types and `InstanceManager`.

use std::fs;
use std::path::{Path, PathBuf};

use locator_ai::calibration::{SignalMatrix, NOT_OBSERVED};
use locator_ai::config::{AppConfig, StoreConfig, TrainingConfig};
use locator_ai::engine::{AiInstance, SensorReading};
use locator_ai::error::{ClassifyError, StoreError, TrainingError};
use locator_ai::managers::InstanceManager;
use locator_ai::store;
use locator_ai::training::ModelTrainer;

const SCENARIO_CSV: &str =
    "location,wifi-aa,wifi-bb\nroomA,-60,-80\nroomA,-62,-78\nroomB,-90,-40\nroomB,-88,-42\n";

fn training_config() -> TrainingConfig {
    TrainingConfig {
        seed: Some(42),
        search_iterations: 3,
        ..TrainingConfig::default()
    }
}

fn write_csv(dir: &Path, body: &str) -> PathBuf {
    let path = dir.join("calibration.csv");
    fs::write(&path, body).unwrap();
    path
}

fn train_scenario(dir: &Path) -> AiInstance {
    let config = training_config();
    let matrix = SignalMatrix::from_csv(write_csv(dir, SCENARIO_CSV), &config).unwrap();
    let report = ModelTrainer::new(config, None).train("fam1", &matrix).unwrap();
    AiInstance::from_training("fam1", matrix, report)
}

fn near_room_a() -> SensorReading {
    serde_json::from_str(r#"{"f":"fam1","s":{"wifi":{"aa":-61,"bb":-79}}}"#).unwrap()
}

#[test]
fn test_scenario_ranks_room_a_first() {
    let dir = tempfile::tempdir().unwrap();
    let instance = train_scenario(dir.path());

    assert_eq!(instance.registry.id_of("roomA"), Some(0));
    assert_eq!(instance.registry.id_of("roomB"), Some(1));
    assert!(!instance.models.is_empty());

    let result = instance.classify(&near_room_a(), None);
    assert!(!result.is_unknown);
    assert!(!result.predictions.is_empty());

    let room_a_first = result
        .predictions
        .iter()
        .filter(|p| p.locations.first().map(String::as_str) == Some("0"))
        .count();
    assert!(
        room_a_first * 2 > result.predictions.len(),
        "only {} of {} families ranked roomA first",
        room_a_first,
        result.predictions.len()
    );
}

#[test]
fn test_unknown_sensor_scenario() {
    let dir = tempfile::tempdir().unwrap();
    let instance = train_scenario(dir.path());
    let reading: SensorReading = serde_json::from_str(r#"{"f":"fam1","s":{"wifi":{"zz":-50}}}"#).unwrap();

    let (features, is_unknown) = instance.feature_vector(&reading);
    assert!(is_unknown);
    assert!(features.iter().all(|v| *v == NOT_OBSERVED));
    assert!(instance.classify(&reading, None).is_unknown);
}

#[test]
fn test_reloaded_instance_classifies_identically() {
    let dir = tempfile::tempdir().unwrap();
    let instance = train_scenario(dir.path());
    let path = dir.path().join("fam1.find3.ai");

    store::save(&instance, &path).unwrap();
    let reloaded = store::load(&path).unwrap();

    assert_eq!(reloaded.registry, instance.registry);
    assert_eq!(reloaded.header, instance.header);
    let readings = [
        near_room_a(),
        SensorReading::new("fam1").with("wifi", "aa", -89.0).with("wifi", "bb", -41.0),
        SensorReading::new("fam1").with("wifi", "bb", -60.0),
    ];
    for reading in &readings {
        assert_eq!(
            reloaded.classify(reading, None),
            instance.classify(reading, None)
        );
    }
}

#[test]
fn test_registry_ids_stable_through_persistence() {
    let dir = tempfile::tempdir().unwrap();
    let body = "location,wifi-aa\nhall,-50\nkitchen,-70\nhall,-52\nporch,-90\nkitchen,-71\nporch,-88\n";
    let config = training_config();
    let matrix = SignalMatrix::from_csv(write_csv(dir.path(), body), &config).unwrap();
    let report = ModelTrainer::new(config, None).train("fam1", &matrix).unwrap();
    let instance = AiInstance::from_training("fam1", matrix, report);

    let path = dir.path().join("fam1.ai");
    store::save(&instance, &path).unwrap();
    let reloaded = store::load(&path).unwrap();
    for (id, name) in [(0, "hall"), (1, "kitchen"), (2, "porch")] {
        assert_eq!(reloaded.registry.id_of(name), Some(id));
        assert_eq!(reloaded.registry.name_of(id), Some(name));
    }
}

#[test]
fn test_missing_calibration_is_not_found() {
    let dir = tempfile::tempdir().unwrap();
    let err = SignalMatrix::from_csv(dir.path().join("nope.csv"), &training_config()).unwrap_err();
    assert!(matches!(err, TrainingError::CalibrationNotFound { .. }));
}

#[test]
fn test_missing_model_file_is_not_found() {
    let dir = tempfile::tempdir().unwrap();
    let err = store::load(dir.path().join("nope.ai")).unwrap_err();
    assert!(matches!(err, StoreError::NotFound { .. }));
}

#[test]
fn test_manager_learn_then_classify() {
    let dir = tempfile::tempdir().unwrap();
    let config = AppConfig {
        training: training_config(),
        store: StoreConfig {
            data_folder: dir.path().join("models"),
            ..StoreConfig::default()
        },
        ..AppConfig::default()
    };
    let manager = InstanceManager::with_default_cache(config.clone());
    let outcome = manager.learn("fam1", write_csv(dir.path(), SCENARIO_CSV)).unwrap();
    assert_eq!(
        outcome.diagnostics.len(),
        outcome.instance.models.len()
    );
    assert_eq!(outcome.instance.models.len() + outcome.failures.len(), 10);

    let warm = manager.classify(&near_room_a()).unwrap();
    let cold = InstanceManager::with_default_cache(config).classify(&near_room_a()).unwrap();
    assert_eq!(warm, cold);

    let mut other = near_room_a();
    other.family = "fam2".to_string();
    assert!(matches!(
        manager.classify(&other),
        Err(ClassifyError::ModelNotFound { .. })
    ));
}
