// AiInstance - trained state for one deployment family

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::calibration::{sensor_id, FeatureHeader, LocationRegistry, SignalMatrix, NOT_OBSERVED};
use crate::models::{ClassifierFamily, TrainedModel};
use crate::training::TrainingReport;

/// Live reading: sensor type -> sensor address -> value
///
/// Serialized with the short keys used on the wire:
/// `{"f": "fam1", "s": {"wifi": {"aa": -61}}}`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SensorReading {
    #[serde(rename = "f")]
    pub family: String,
    #[serde(rename = "s", default)]
    pub sensors: BTreeMap<String, BTreeMap<String, f64>>,
}

impl SensorReading {
    pub fn new(family: impl Into<String>) -> Self {
        Self {
            family: family.into(),
            sensors: BTreeMap::new(),
        }
    }

    /// Builder-style insert of one reading
    pub fn with(mut self, sensor_type: &str, address: &str, value: f64) -> Self {
        self.sensors
            .entry(sensor_type.to_string())
            .or_default()
            .insert(address.to_string(), value);
        self
    }
}

/// Trained state of one family: the unit that is persisted and cached
#[derive(Debug, Clone)]
pub struct AiInstance {
    pub family: String,
    pub header: FeatureHeader,
    pub registry: LocationRegistry,
    /// Trained classifiers keyed in catalog order
    pub models: BTreeMap<ClassifierFamily, TrainedModel>,
}

impl AiInstance {
    pub fn new(
        family: impl Into<String>,
        header: FeatureHeader,
        registry: LocationRegistry,
        models: BTreeMap<ClassifierFamily, TrainedModel>,
    ) -> Self {
        Self {
            family: family.into(),
            header,
            registry,
            models,
        }
    }

    /// Assemble an instance from a finished training run
    ///
    /// The trained models move out of the report; diagnostics stay with the
    /// caller if it split them off first.
    pub fn from_training(family: impl Into<String>, matrix: SignalMatrix, report: TrainingReport) -> Self {
        Self::new(family, matrix.header, matrix.registry, report.models)
    }

    /// Names of the trained classifier families, in catalog order
    pub fn trained_families(&self) -> Vec<&'static str> {
        self.models.keys().map(|family| family.name()).collect()
    }

    /// Align a live reading with the training header
    ///
    /// Readings for sensors absent from the header are ignored. Returns the
    /// feature vector and whether no reading matched any column.
    pub fn feature_vector(&self, reading: &SensorReading) -> (Vec<f64>, bool) {
        let mut features = vec![NOT_OBSERVED; self.header.width()];
        let mut matched = false;
        for (sensor_type, addresses) in &reading.sensors {
            for (address, value) in addresses {
                if let Some(index) = self.header.feature_index(&sensor_id(sensor_type, address)) {
                    features[index] = *value;
                    matched = true;
                }
            }
        }
        (features, !matched)
    }
}
