//! Classification engine.
//!
//! One scoped thread per serving family computes a probability distribution
//! over location ids; the call joins every thread before ranking. Families
//! that error, panic or produce NaN are logged and left out of the response.

use std::collections::BTreeMap;
use std::thread;
use std::time::Instant;

use serde::{Deserialize, Serialize};

use super::instance::{AiInstance, SensorReading};
use crate::error::ModelError;
use crate::models::ClassifierFamily;
use crate::telemetry::{emit, now_timestamp_ms, MetricEvent, TelemetryCollector};

/// Ranked output of one classifier family
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Prediction {
    /// Classifier family display name
    pub name: String,
    /// Location ids (stringified), most probable first
    pub locations: Vec<String>,
    /// Probabilities rounded to two decimals, aligned with `locations`
    pub probabilities: Vec<f64>,
}

/// Response to one classification request
///
/// An empty `predictions` list means no family produced a usable result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Classification {
    pub location_names: BTreeMap<String, String>,
    pub predictions: Vec<Prediction>,
    pub is_unknown: bool,
}

impl Classification {
    /// Location name ranked first by the given family
    pub fn top_location(&self, family: ClassifierFamily) -> Option<&str> {
        self.predictions
            .iter()
            .find(|p| p.name == family.name())
            .and_then(|p| p.locations.first())
            .and_then(|id| self.location_names.get(id))
            .map(String::as_str)
    }
}

impl AiInstance {
    /// Classify one live reading with every serving family
    ///
    /// # Arguments
    /// * `reading` - Sensor readings keyed by type and address
    /// * `telemetry` - Optional sink for per-family discards and the summary
    ///
    /// # Returns
    /// Predictions in catalog order. This never fails as a whole.
    pub fn classify(&self, reading: &SensorReading, telemetry: Option<&TelemetryCollector>) -> Classification {
        let started = Instant::now();
        let (features, is_unknown) = self.feature_vector(reading);

        let outcomes: Vec<(ClassifierFamily, Result<Vec<f64>, ModelError>)> = thread::scope(|scope| {
            let handles: Vec<_> = self
                .models
                .iter()
                .filter(|(family, _)| family.serves_predictions())
                .map(|(family, model)| {
                    let features = &features;
                    (*family, scope.spawn(move || model.predict_proba(features)))
                })
                .collect();

            handles
                .into_iter()
                .map(|(family, handle)| {
                    let result = handle.join().unwrap_or_else(|_| {
                        Err(ModelError::Numerical {
                            reason: "predict panicked".to_string(),
                        })
                    });
                    (family, result)
                })
                .collect()
        });

        let mut predictions = Vec::with_capacity(outcomes.len());
        for (family, outcome) in outcomes {
            match outcome {
                Ok(proba) if proba.iter().any(|p| p.is_nan()) => {
                    log::warn!("[Engine] {}: {} produced NaN, discarded", self.family, family);
                    emit(telemetry, || MetricEvent::PredictionDiscarded {
                        family: family.name().to_string(),
                        reason: "NaN probability".to_string(),
                    });
                }
                Ok(proba) => predictions.push(rank(family, &proba)),
                Err(err) => {
                    log::warn!("[Engine] {}: {} failed: {}", self.family, family, err);
                    emit(telemetry, || MetricEvent::PredictionDiscarded {
                        family: family.name().to_string(),
                        reason: err.to_string(),
                    });
                }
            }
        }

        let elapsed_us = started.elapsed().as_micros() as u64;
        tracing::debug!(
            family = %self.family,
            predictions = predictions.len(),
            is_unknown,
            elapsed_us,
            "classified reading"
        );
        emit(telemetry, || MetricEvent::Classified {
            family_id: self.family.clone(),
            predictions: predictions.len(),
            is_unknown,
            elapsed_us,
            timestamp_ms: now_timestamp_ms(),
        });

        Classification {
            location_names: self
                .registry
                .iter()
                .map(|(id, name)| (id.to_string(), name.to_string()))
                .collect(),
            predictions,
            is_unknown,
        }
    }
}

/// Rank location ids by descending probability
///
/// The sort is stable, so equal probabilities keep ascending id order.
fn rank(family: ClassifierFamily, proba: &[f64]) -> Prediction {
    let mut order: Vec<usize> = (0..proba.len()).collect();
    order.sort_by(|&a, &b| proba[b].total_cmp(&proba[a]));
    Prediction {
        name: family.name().to_string(),
        locations: order.iter().map(usize::to_string).collect(),
        probabilities: order.iter().map(|&id| round2(proba[id])).collect(),
    }
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

#[cfg(test)]
#[path = "classify_tests.rs"]
mod classify_tests;
