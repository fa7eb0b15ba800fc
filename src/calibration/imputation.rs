// Windowed imputation of unobserved readings
//
// Rows are grouped by location. Within a group, each sentinel cell is
// replaced with the mean of the observed values in a sliding window of
// `window` rows: trailing window going forward, leading window going
// backward, then trailing again. Filled cells feed the windows of the cells
// after them in the same pass, so a single reading reaches the whole group.
// Only columns with no reading at all in a group keep the sentinel.

use super::NOT_OBSERVED;
use std::collections::BTreeMap;

/// Impute sentinel cells in place, grouped by `labels`
///
/// # Arguments
/// * `features` - Row-major feature matrix in original file order
/// * `labels` - Location id per row
/// * `window` - Window length in rows (including the cell itself)
pub fn fill_missing_with_window(features: &mut [Vec<f64>], labels: &[usize], window: usize) {
    let window = window.max(1);
    let width = features.first().map_or(0, Vec::len);

    let mut groups: BTreeMap<usize, Vec<usize>> = BTreeMap::new();
    for (row, &label) in labels.iter().enumerate() {
        groups.entry(label).or_default().push(row);
    }

    for rows in groups.values() {
        for col in 0..width {
            let mut column: Vec<f64> = rows.iter().map(|&r| features[r][col]).collect();
            if column.iter().all(|&v| v == NOT_OBSERVED) {
                continue;
            }
            fill_pass(&mut column, window, Direction::Forward);
            fill_pass(&mut column, window, Direction::Backward);
            fill_pass(&mut column, window, Direction::Forward);
            for (&r, v) in rows.iter().zip(column) {
                features[r][col] = v;
            }
        }
    }
}

#[derive(Clone, Copy)]
enum Direction {
    Forward,
    Backward,
}

fn fill_pass(column: &mut [f64], window: usize, direction: Direction) {
    let len = column.len();
    let order: Box<dyn Iterator<Item = usize>> = match direction {
        Direction::Forward => Box::new(0..len),
        Direction::Backward => Box::new((0..len).rev()),
    };
    for i in order {
        if column[i] != NOT_OBSERVED {
            continue;
        }
        let range = match direction {
            Direction::Forward => (i + 1).saturating_sub(window)..i + 1,
            Direction::Backward => i..(i + window).min(len),
        };
        if let Some(mean) = observed_mean(&column[range]) {
            column[i] = mean;
        }
    }
}

fn observed_mean(values: &[f64]) -> Option<f64> {
    let (sum, count) = values
        .iter()
        .filter(|&&v| v != NOT_OBSERVED)
        .fold((0.0, 0usize), |(s, c), &v| (s + v, c + 1));
    (count > 0).then(|| sum / count as f64)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn column(features: &[Vec<f64>], col: usize) -> Vec<f64> {
        features.iter().map(|row| row[col]).collect()
    }

    #[test]
    fn test_fills_interior_gap_forward() {
        let mut features = vec![vec![-60.0], vec![0.0], vec![-70.0]];
        fill_missing_with_window(&mut features, &[0, 0, 0], 15);
        assert_eq!(column(&features, 0), vec![-60.0, -60.0, -70.0]);
    }

    #[test]
    fn test_fills_leading_gap_backward() {
        let mut features = vec![vec![0.0], vec![0.0], vec![-50.0], vec![-70.0]];
        fill_missing_with_window(&mut features, &[0, 0, 0, 0], 15);
        assert_eq!(column(&features, 0), vec![-60.0, -60.0, -50.0, -70.0]);
    }

    #[test]
    fn test_groups_are_independent() {
        let mut features = vec![vec![-40.0], vec![0.0], vec![-90.0], vec![0.0]];
        fill_missing_with_window(&mut features, &[0, 1, 1, 0], 15);
        assert_eq!(column(&features, 0), vec![-40.0, -90.0, -90.0, -40.0]);
    }

    #[test]
    fn test_unobserved_column_stays_sentinel() {
        let mut features = vec![vec![-60.0, 0.0], vec![-62.0, 0.0]];
        fill_missing_with_window(&mut features, &[0, 0], 15);
        assert_eq!(column(&features, 1), vec![0.0, 0.0]);
    }

    fn sentinel_rows(features: &[Vec<f64>]) -> Vec<usize> {
        features
            .iter()
            .enumerate()
            .filter(|(_, row)| row[0] == NOT_OBSERVED)
            .map(|(i, _)| i)
            .collect()
    }

    #[test]
    fn test_no_sentinel_left_when_column_observed() {
        let mut features: Vec<Vec<f64>> = (0..40)
            .map(|i| vec![if i == 20 { -55.0 } else { 0.0 }])
            .collect();
        fill_missing_with_window(&mut features, &vec![3; 40], 15);
        assert!(sentinel_rows(&features).is_empty());
        assert!(features.iter().all(|r| r[0] == -55.0));
    }

    #[test]
    fn test_long_trailing_gap_filled() {
        let mut features: Vec<Vec<f64>> = (0..50)
            .map(|i| vec![if i == 0 { -70.0 } else { 0.0 }])
            .collect();
        fill_missing_with_window(&mut features, &vec![0; 50], 15);
        assert!(sentinel_rows(&features).is_empty());
        assert_eq!(features[49][0], -70.0);
    }

    #[test]
    fn test_long_leading_gap_filled_in_mixed_groups() {
        let mut features: Vec<Vec<f64>> = (0..60)
            .map(|i| vec![if i == 59 { -45.0 } else { 0.0 }])
            .collect();
        // Odd rows belong to a location that never saw the sensor
        let labels: Vec<usize> = (0..60).map(|i| i % 2).collect();
        fill_missing_with_window(&mut features, &labels, 4);
        for (i, row) in features.iter().enumerate() {
            let expected = if i % 2 == 1 { -45.0 } else { NOT_OBSERVED };
            assert_eq!(row[0], expected, "row {}", i);
        }
    }

    #[test]
    fn test_filled_values_carry_forward() {
        let mut features = vec![vec![-30.0], vec![0.0], vec![0.0], vec![-60.0]];
        fill_missing_with_window(&mut features, &[0, 0, 0, 0], 2);
        assert_eq!(column(&features, 0), vec![-30.0, -30.0, -30.0, -60.0]);
    }
}
