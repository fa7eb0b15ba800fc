//! Stratified k-fold splitting.
//!
//! Each class is split into `n_splits` contiguous chunks (the first
//! `len % n_splits` chunks one row larger) and chunk `i` of every class goes
//! to test fold `i`. Rows arrive already shuffled from the matrix builder,
//! so no further shuffling happens here.

use std::collections::BTreeMap;

/// Train/test row indices for one fold
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fold {
    pub train: Vec<usize>,
    pub test: Vec<usize>,
}

#[derive(Debug, Clone, Copy)]
pub struct StratifiedKFold {
    n_splits: usize,
}

impl StratifiedKFold {
    pub fn new(n_splits: usize) -> Self {
        Self { n_splits }
    }

    /// Fold count usable for `labels` given a requested maximum
    ///
    /// Clamped to the smallest class so every fold sees every class in
    /// training. `None` when some class has a single row and cross
    /// validation is impossible.
    pub fn effective_splits(requested: usize, labels: &[usize]) -> Option<usize> {
        let mut counts: BTreeMap<usize, usize> = BTreeMap::new();
        for &label in labels {
            *counts.entry(label).or_default() += 1;
        }
        let smallest = counts.values().copied().min()?;
        let splits = requested.min(smallest);
        (splits >= 2).then_some(splits)
    }

    pub fn split(&self, labels: &[usize]) -> Vec<Fold> {
        let mut by_class: BTreeMap<usize, Vec<usize>> = BTreeMap::new();
        for (row, &label) in labels.iter().enumerate() {
            by_class.entry(label).or_default().push(row);
        }

        let mut test_sets: Vec<Vec<usize>> = vec![Vec::new(); self.n_splits];
        for rows in by_class.values() {
            let base = rows.len() / self.n_splits;
            let remainder = rows.len() % self.n_splits;
            let mut start = 0;
            for (i, fold) in test_sets.iter_mut().enumerate() {
                let size = base + usize::from(i < remainder);
                fold.extend_from_slice(&rows[start..start + size]);
                start += size;
            }
        }

        test_sets
            .into_iter()
            .filter(|test| !test.is_empty())
            .map(|mut test| {
                test.sort_unstable();
                let train = (0..labels.len())
                    .filter(|row| test.binary_search(row).is_err())
                    .collect();
                Fold { train, test }
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_each_fold_holds_every_class() {
        let labels = vec![0, 1, 0, 1, 0, 1, 0, 1, 2, 2];
        let folds = StratifiedKFold::new(2).split(&labels);
        assert_eq!(folds.len(), 2);
        for fold in &folds {
            let mut classes: Vec<usize> = fold.test.iter().map(|&r| labels[r]).collect();
            classes.sort_unstable();
            classes.dedup();
            assert_eq!(classes, vec![0, 1, 2]);
            assert_eq!(fold.train.len() + fold.test.len(), labels.len());
        }
    }

    #[test]
    fn test_test_sets_partition_rows() {
        let labels: Vec<usize> = (0..23).map(|i| i % 3).collect();
        let folds = StratifiedKFold::new(5).split(&labels);
        let mut all: Vec<usize> = folds.iter().flat_map(|f| f.test.clone()).collect();
        all.sort_unstable();
        assert_eq!(all, (0..23).collect::<Vec<_>>());
    }

    #[test]
    fn test_effective_splits_clamped_to_smallest_class() {
        assert_eq!(StratifiedKFold::effective_splits(5, &[0, 0, 1, 1]), Some(2));
        assert_eq!(StratifiedKFold::effective_splits(5, &[0; 12]), Some(5));
        assert_eq!(StratifiedKFold::effective_splits(5, &[0, 0, 1]), None);
        assert_eq!(StratifiedKFold::effective_splits(5, &[]), None);
    }
}
