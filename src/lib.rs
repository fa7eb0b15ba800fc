// Locator AI Core - ensemble location classifier
// Trains a fixed catalog of classifiers on labeled sensor fingerprints and
// ranks locations for live readings

// Module declarations
pub mod calibration;
pub mod config;
pub mod engine;
pub mod error;
pub mod managers;
pub mod models;
pub mod store;
pub mod telemetry;
pub mod training;

// Re-exports for convenience
pub use calibration::{FeatureHeader, LocationRegistry, SignalMatrix};
pub use config::AppConfig;
pub use engine::{AiInstance, Classification, Prediction, SensorReading};
pub use managers::{ExpiringInstanceCache, InstanceCache, InstanceManager};
pub use models::{ClassifierFamily, TrainedModel};
pub use telemetry::{MetricEvent, TelemetryCollector};
pub use training::{ModelTrainer, TrainingReport};

/// Install a `tracing` subscriber filtered by `RUST_LOG`
///
/// `log` records from the library are forwarded through the same
/// subscriber. Safe to call more than once; later calls are ignored.
pub fn init_logging(default_filter: &str) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_filter));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}
