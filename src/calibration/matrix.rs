// SignalMatrix - calibration CSV to (X, y)
//
// Parses the labeled calibration file, registers location names, maps empty
// or malformed cells to the not-observed sentinel, imputes per location and
// shuffles the rows.

use super::imputation::fill_missing_with_window;
use super::{FeatureHeader, LocationRegistry, NOT_OBSERVED};
use crate::config::TrainingConfig;
use crate::error::TrainingError;
use csv::{ReaderBuilder, Trim};
use rand::seq::SliceRandom;
use std::fs::File;
use std::io::Read;
use std::path::Path;

const SHUFFLE_STREAM: u64 = 1;

/// Training data for one family
#[derive(Debug, Clone)]
pub struct SignalMatrix {
    pub header: FeatureHeader,
    pub registry: LocationRegistry,
    /// One row per sample, `header.width()` columns
    pub features: Vec<Vec<f64>>,
    /// Location id per row
    pub labels: Vec<usize>,
}

impl SignalMatrix {
    /// Load and prepare a calibration CSV
    ///
    /// # Errors
    /// * `CalibrationNotFound` - the file does not exist
    /// * `CalibrationRead` - the file cannot be read or is not valid CSV
    /// * `EmptyCalibration` - the file holds no sample rows
    pub fn from_csv<P: AsRef<Path>>(
        path: P,
        config: &TrainingConfig,
    ) -> Result<Self, TrainingError> {
        let path = path.as_ref();
        let source = path.display().to_string();
        let file = File::open(path).map_err(|err| match err.kind() {
            std::io::ErrorKind::NotFound => TrainingError::CalibrationNotFound {
                path: source.clone(),
            },
            _ => TrainingError::CalibrationRead {
                path: source.clone(),
                reason: err.to_string(),
            },
        })?;
        Self::from_reader(file, &source, config)
    }

    /// Parse calibration rows from any reader
    ///
    /// `source` is only used in log lines and errors.
    pub fn from_reader<R: Read>(
        reader: R,
        source: &str,
        config: &TrainingConfig,
    ) -> Result<Self, TrainingError> {
        let read_err = |err: csv::Error| TrainingError::CalibrationRead {
            path: source.to_string(),
            reason: err.to_string(),
        };

        let mut csv = ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .trim(Trim::All)
            .from_reader(reader);

        let columns: Vec<String> = csv.headers().map_err(read_err)?.iter().map(String::from).collect();
        if columns.is_empty() {
            return Err(TrainingError::EmptyCalibration {
                path: source.to_string(),
            });
        }
        let header = FeatureHeader::new(columns.iter().skip(1).cloned());
        let width = header.width();

        let mut registry = LocationRegistry::new();
        let mut features = Vec::new();
        let mut labels = Vec::new();
        let mut malformed = 0usize;

        for (line, record) in csv.records().enumerate() {
            let record = record.map_err(read_err)?;
            if record.len() > columns.len() {
                log::warn!(
                    "[Calibration] {} row {} has {} cells, header has {}; extra cells ignored",
                    source,
                    line + 2,
                    record.len(),
                    columns.len()
                );
            }

            labels.push(registry.register(record.get(0).unwrap_or_default()));
            let row: Vec<f64> = (0..width)
                .map(|col| match parse_cell(record.get(col + 1).unwrap_or_default()) {
                    Some(value) => value,
                    None => {
                        malformed += 1;
                        log::debug!(
                            "[Calibration] {} row {} column {}: not a number, treated as not observed",
                            source,
                            line + 2,
                            header.sensors()[col]
                        );
                        NOT_OBSERVED
                    }
                })
                .collect();
            features.push(row);
        }

        if features.is_empty() {
            return Err(TrainingError::EmptyCalibration {
                path: source.to_string(),
            });
        }
        if malformed > 0 {
            log::warn!(
                "[Calibration] {}: {} malformed cells treated as not observed",
                source,
                malformed
            );
        }

        fill_missing_with_window(&mut features, &labels, config.window_size);

        let mut order: Vec<usize> = (0..features.len()).collect();
        order.shuffle(&mut config.rng(SHUFFLE_STREAM));
        let features = order.iter().map(|&i| features[i].clone()).collect();
        let labels = order.iter().map(|&i| labels[i]).collect();

        tracing::info!(
            source,
            samples = order.len(),
            sensors = width,
            locations = registry.len(),
            "calibration matrix built"
        );

        Ok(Self {
            header,
            registry,
            features,
            labels,
        })
    }

    pub fn n_samples(&self) -> usize {
        self.labels.len()
    }

    pub fn n_classes(&self) -> usize {
        self.registry.len()
    }

    /// Row count per location id
    pub fn class_counts(&self) -> Vec<usize> {
        let mut counts = vec![0; self.n_classes()];
        for &label in &self.labels {
            counts[label] += 1;
        }
        counts
    }
}

/// Parse one reading cell
///
/// Empty cells are legitimately unobserved. `None` means the cell held
/// something that is not a finite number.
fn parse_cell(cell: &str) -> Option<f64> {
    if cell.is_empty() {
        return Some(NOT_OBSERVED);
    }
    cell.parse::<f64>().ok().filter(|v| v.is_finite())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seeded() -> TrainingConfig {
        TrainingConfig {
            seed: Some(11),
            ..TrainingConfig::default()
        }
    }

    fn build(csv: &str) -> Result<SignalMatrix, TrainingError> {
        SignalMatrix::from_reader(csv.as_bytes(), "test.csv", &seeded())
    }

    /// Rows sorted back into a deterministic order for assertions
    fn sorted_rows(matrix: &SignalMatrix) -> Vec<(usize, Vec<f64>)> {
        let mut rows: Vec<(usize, Vec<f64>)> = matrix
            .labels
            .iter()
            .copied()
            .zip(matrix.features.iter().cloned())
            .collect();
        rows.sort_by(|a, b| a.partial_cmp(b).unwrap());
        rows
    }

    #[test]
    fn test_scenario_matrix() {
        let matrix = build(
            "location,wifi-aa,wifi-bb\nroomA,-60,-80\nroomA,-62,-78\nroomB,-90,-40\nroomB,-88,-42\n",
        )
        .unwrap();
        assert_eq!(matrix.registry.id_of("roomA"), Some(0));
        assert_eq!(matrix.registry.id_of("roomB"), Some(1));
        assert_eq!(matrix.header.width(), 2);
        assert_eq!(matrix.n_samples(), 4);
        assert_eq!(matrix.class_counts(), vec![2, 2]);
        assert_eq!(
            sorted_rows(&matrix),
            vec![
                (0, vec![-62.0, -78.0]),
                (0, vec![-60.0, -80.0]),
                (1, vec![-90.0, -40.0]),
                (1, vec![-88.0, -42.0]),
            ]
        );
    }

    #[test]
    fn test_malformed_and_empty_cells_are_imputed() {
        let matrix = build("location,wifi-aa\nroomA,-60\nroomA,abc\nroomA,\nroomA,-70\n").unwrap();
        for row in &matrix.features {
            assert_ne!(row[0], NOT_OBSERVED);
        }
    }

    #[test]
    fn test_short_rows_padded_and_extra_cells_ignored() {
        let matrix = build("location,a-1,a-2\nx,-50\ny,-40,-30,-20\n").unwrap();
        assert_eq!(matrix.features.iter().map(Vec::len).max(), Some(2));
        let x = matrix.registry.id_of("x").unwrap();
        let row = sorted_rows(&matrix).into_iter().find(|(l, _)| *l == x).unwrap();
        assert_eq!(row.1, vec![-50.0, NOT_OBSERVED]);
    }

    #[test]
    fn test_header_only_is_empty_calibration() {
        match build("location,wifi-aa\n") {
            Err(TrainingError::EmptyCalibration { path }) => assert_eq!(path, "test.csv"),
            other => panic!("Expected EmptyCalibration, got {:?}", other),
        }
    }

    #[test]
    fn test_missing_file_is_not_found() {
        let err = SignalMatrix::from_csv("/nonexistent/cal.csv", &seeded()).unwrap_err();
        assert!(matches!(err, TrainingError::CalibrationNotFound { .. }));
    }

    #[test]
    fn test_seeded_shuffle_is_reproducible() {
        let csv: String = std::iter::once("location,s-1\n".to_string())
            .chain((0..30).map(|i| format!("l{},{}\n", i % 3, -(i as i32) - 1)))
            .collect();
        let a = build(&csv).unwrap();
        let b = build(&csv).unwrap();
        assert_eq!(a.labels, b.labels);
        assert_eq!(a.features, b.features);
    }
}
