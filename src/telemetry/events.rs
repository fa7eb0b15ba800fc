//! Core telemetry event types describing training and classification
//! diagnostics exposed to the CLI and any embedding service.

use serde::{Deserialize, Serialize};

use crate::training::FamilyDiagnostics;

/// Rich metric events covering per-family training outcomes, prediction
/// health and cache behaviour.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", content = "payload", rename_all = "snake_case")]
pub enum MetricEvent {
    /// A classifier family produced a model
    FamilyTrained {
        family: String,
        cv_score: f64,
        training_score: f64,
        elapsed_ms: u64,
    },
    /// Full diagnostics for a trained family (never persisted)
    FamilyDiagnostics(Box<FamilyDiagnostics>),
    /// A classifier family failed to fit and was skipped
    FamilyFailed {
        family: String,
        code: i32,
        reason: String,
    },
    /// A classifier family exceeded its budget and was abandoned
    FamilyTimedOut { family: String, timeout_secs: u64 },
    /// Training run finished
    TrainingCompleted {
        family_id: String,
        trained: usize,
        attempted: usize,
        elapsed_ms: u64,
    },
    /// A family's prediction was dropped from a classification response
    PredictionDiscarded { family: String, reason: String },
    /// A classification response was produced
    Classified {
        family_id: String,
        predictions: usize,
        is_unknown: bool,
        elapsed_us: u64,
        timestamp_ms: u64,
    },
    /// Warm instance cache consulted
    CacheLookup { family_id: String, hit: bool },
}
