//! Configuration management for training and serving
//!
//! This module provides runtime configuration loading from JSON files so
//! training budgets, cache bounds and storage locations can be tuned without
//! recompilation. Every section has defaults matching the production service.

use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Complete application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub training: TrainingConfig,
    pub cache: CacheConfig,
    pub store: StoreConfig,
}

/// Model training parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainingConfig {
    /// Sliding window length (samples) used by imputation
    pub window_size: usize,
    /// Upper bound on stratified cross-validation folds
    pub cv_folds: usize,
    /// Number of hyperparameter candidates drawn per family
    pub search_iterations: usize,
    /// Wall-clock budget per classifier family
    pub family_timeout_secs: u64,
    /// Fixed RNG seed for shuffling and search; `None` draws from entropy
    pub seed: Option<u64>,
    /// Train the Gaussian Process family (never used for classification)
    pub include_gaussian_process: bool,
    /// Evaluate search candidates on the rayon pool
    pub parallel_search: bool,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            window_size: 15,
            cv_folds: 5,
            search_iterations: 10,
            family_timeout_secs: 100,
            seed: None,
            include_gaussian_process: false,
            parallel_search: true,
        }
    }
}

impl TrainingConfig {
    /// Reject settings the trainer cannot run with
    pub fn validate(&self) -> Result<(), String> {
        if self.window_size == 0 {
            return Err("window_size must be at least 1".to_string());
        }
        if self.cv_folds < 2 {
            return Err(format!("cv_folds must be at least 2, got {}", self.cv_folds));
        }
        if self.search_iterations == 0 {
            return Err("search_iterations must be at least 1".to_string());
        }
        if self.family_timeout_secs == 0 {
            return Err("family_timeout_secs must be at least 1".to_string());
        }
        Ok(())
    }

    /// RNG for one stage of a training run
    ///
    /// With a fixed seed each `stream` gets its own reproducible sequence,
    /// otherwise the generator is seeded from OS entropy.
    pub fn rng(&self, stream: u64) -> StdRng {
        match self.seed {
            Some(seed) => StdRng::seed_from_u64(seed ^ stream.wrapping_mul(0x9E37_79B9_7F4A_7C15)),
            None => StdRng::from_entropy(),
        }
    }
}

/// Warm instance cache bounds
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Maximum resident instances
    pub max_len: usize,
    /// Seconds an instance stays warm after insertion
    pub max_age_secs: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_len: 100_000,
            max_age_secs: 60,
        }
    }
}

/// Persisted model location
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    pub data_folder: PathBuf,
    /// File extension without the leading dot
    pub extension: String,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            data_folder: PathBuf::from("."),
            extension: "find3.ai".to_string(),
        }
    }
}

impl AppConfig {
    /// Load configuration from JSON file
    ///
    /// # Arguments
    /// * `path` - Path to JSON config file
    ///
    /// # Returns
    /// Loaded configuration; if the file doesn't exist or the JSON is
    /// invalid, the default config is returned and a warning logged.
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Self {
        match fs::read_to_string(&path) {
            Ok(contents) => match serde_json::from_str(&contents) {
                Ok(config) => {
                    log::info!("[Config] Loaded configuration from {:?}", path.as_ref());
                    config
                }
                Err(err) => {
                    log::warn!(
                        "[Config] Failed to parse JSON from {:?}: {}. Using defaults.",
                        path.as_ref(),
                        err
                    );
                    Self::default()
                }
            },
            Err(err) => {
                log::warn!(
                    "[Config] Failed to read config file {:?}: {}. Using defaults.",
                    path.as_ref(),
                    err
                );
                Self::default()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.training.window_size, 15);
        assert_eq!(config.training.cv_folds, 5);
        assert_eq!(config.training.family_timeout_secs, 100);
        assert!(!config.training.include_gaussian_process);
        assert_eq!(config.cache.max_len, 100_000);
        assert_eq!(config.cache.max_age_secs, 60);
        assert_eq!(config.store.extension, "find3.ai");
    }

    #[test]
    fn test_json_roundtrip() {
        let mut config = AppConfig::default();
        config.training.seed = Some(7);
        let json = serde_json::to_string_pretty(&config).unwrap();
        let parsed: AppConfig = serde_json::from_str(&json).unwrap();

        assert_eq!(parsed.training, config.training);
        assert_eq!(parsed.cache, config.cache);
    }

    #[test]
    fn test_partial_json_fills_defaults() {
        let parsed: AppConfig =
            serde_json::from_str(r#"{"training": {"cv_folds": 3}}"#).unwrap();
        assert_eq!(parsed.training.cv_folds, 3);
        assert_eq!(parsed.training.window_size, 15);
        assert_eq!(parsed.cache.max_age_secs, 60);
    }

    #[test]
    fn test_missing_file_falls_back_to_defaults() {
        let config = AppConfig::load_from_file("/nonexistent/locator.json");
        assert_eq!(config.training, TrainingConfig::default());
    }

    #[test]
    fn test_validate_rejects_single_fold() {
        let config = TrainingConfig {
            cv_folds: 1,
            ..TrainingConfig::default()
        };
        assert!(config.validate().is_err());
        assert!(TrainingConfig::default().validate().is_ok());
    }
}
