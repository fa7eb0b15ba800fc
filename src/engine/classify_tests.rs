use super::*;
use crate::calibration::{FeatureHeader, LocationRegistry};
use crate::models::naive_bayes::GaussianNaiveBayes;
use crate::models::params::ParamSet;
use crate::models::{TrainedModel, TrainingSet};

fn two_rooms() -> (Vec<Vec<f64>>, Vec<usize>) {
    let mut x = Vec::new();
    let mut y = Vec::new();
    for i in 0..5 {
        let jitter = i as f64;
        x.push(vec![-60.0 - jitter, -80.0 + jitter]);
        y.push(0);
        x.push(vec![-90.0 + jitter, -40.0 - jitter]);
        y.push(1);
    }
    (x, y)
}

fn fitted(family: ClassifierFamily, x: &[Vec<f64>], y: &[usize]) -> TrainedModel {
    let data = TrainingSet::new(x, y, 2).unwrap();
    let params = match family {
        ClassifierFamily::NearestNeighbors => ParamSet::new().with("n_neighbors", 3i64),
        _ => ParamSet::new(),
    };
    family.fit(&data, &params, 5).unwrap()
}

fn instance(families: &[ClassifierFamily]) -> AiInstance {
    let (x, y) = two_rooms();
    let mut registry = LocationRegistry::default();
    registry.register("roomA");
    registry.register("roomB");
    let models = families.iter().map(|&f| (f, fitted(f, &x, &y))).collect();
    AiInstance::new("fam1", FeatureHeader::new(["wifi-aa", "wifi-bb"]), registry, models)
}

fn near_room_a() -> SensorReading {
    SensorReading::new("fam1").with("wifi", "aa", -61.0).with("wifi", "bb", -79.0)
}

#[test]
fn test_predictions_ranked_in_catalog_order() {
    let ai = instance(&[
        ClassifierFamily::NaiveBayes,
        ClassifierFamily::NearestNeighbors,
        ClassifierFamily::DecisionTree,
    ]);
    let result = ai.classify(&near_room_a(), None);

    assert!(!result.is_unknown);
    let names: Vec<&str> = result.predictions.iter().map(|p| p.name.as_str()).collect();
    assert_eq!(names, vec!["Nearest Neighbors", "Decision Tree", "Naive Bayes"]);
    for prediction in &result.predictions {
        assert_eq!(prediction.locations[0], "0");
        assert_eq!(prediction.locations.len(), 2);
        assert!(prediction.probabilities[0] >= prediction.probabilities[1]);
    }
    assert_eq!(result.top_location(ClassifierFamily::DecisionTree), Some("roomA"));
    assert_eq!(result.location_names.get("1").map(String::as_str), Some("roomB"));
}

#[test]
fn test_gaussian_process_never_serves() {
    let ai = instance(&[ClassifierFamily::GaussianProcess, ClassifierFamily::DecisionTree]);
    let result = ai.classify(&near_room_a(), None);
    assert_eq!(result.predictions.len(), 1);
    assert_eq!(result.predictions[0].name, "Decision Tree");
}

#[test]
fn test_failing_family_is_isolated() {
    let healthy = instance(&[ClassifierFamily::NearestNeighbors, ClassifierFamily::DecisionTree]);
    let baseline = healthy.classify(&near_room_a(), None);

    let mut broken = healthy.clone();
    broken.models.insert(
        ClassifierFamily::NaiveBayes,
        TrainedModel::NaiveBayes(GaussianNaiveBayes {
            classes: vec![0, 1],
            log_priors: vec![0.5f64.ln(), 0.5f64.ln()],
            means: vec![vec![0.0, 0.0], vec![1.0, 1.0]],
            variances: vec![vec![f64::NAN, 1.0], vec![1.0, 1.0]],
            n_classes: 2,
        }),
    );
    let narrow_x: Vec<Vec<f64>> = vec![vec![-60.0], vec![-61.0], vec![-90.0], vec![-89.0]];
    let narrow_y = vec![0, 0, 1, 1];
    let data = TrainingSet::new(&narrow_x, &narrow_y, 2).unwrap();
    broken.models.insert(
        ClassifierFamily::Qda,
        TrainedModel::NearestNeighbors(
            crate::models::knn::KNearestNeighbors::fit(&data, &ParamSet::new().with("n_neighbors", 1i64))
                .unwrap(),
        ),
    );

    let telemetry = TelemetryCollector::new(16, 16);
    let result = broken.classify(&near_room_a(), Some(&telemetry));
    assert_eq!(result.predictions, baseline.predictions);

    let discarded = telemetry
        .snapshot()
        .recent
        .iter()
        .filter(|event| matches!(event, MetricEvent::PredictionDiscarded { .. }))
        .count();
    assert_eq!(discarded, 2);
}

#[test]
fn test_no_models_gives_empty_predictions() {
    let ai = instance(&[]);
    let result = ai.classify(&near_room_a(), None);
    assert!(result.predictions.is_empty());
    assert_eq!(result.location_names.len(), 2);
}

#[test]
fn test_unknown_reading_still_classified() {
    let ai = instance(&[ClassifierFamily::DecisionTree]);
    let result = ai.classify(&SensorReading::new("fam1").with("wifi", "zz", -50.0), None);
    assert!(result.is_unknown);
    assert_eq!(result.predictions.len(), 1);
}

#[test]
fn test_rank_is_stable_on_ties_and_rounds() {
    let prediction = rank(ClassifierFamily::Qda, &[0.25, 0.4999, 0.25, 0.0001]);
    assert_eq!(prediction.locations, vec!["1", "0", "2", "3"]);
    assert_eq!(prediction.probabilities, vec![0.5, 0.25, 0.25, 0.0]);
    assert_eq!(round2(0.126), 0.13);
}

#[test]
fn test_response_wire_format() {
    let ai = instance(&[ClassifierFamily::DecisionTree]);
    let json = serde_json::to_value(ai.classify(&near_room_a(), None)).unwrap();
    assert_eq!(json["location_names"]["0"], "roomA");
    assert_eq!(json["predictions"][0]["name"], "Decision Tree");
    assert_eq!(json["predictions"][0]["locations"][0], "0");
    assert_eq!(json["is_unknown"], false);
}
