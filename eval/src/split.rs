// SPDX-License-Identifier: AGPL-3.0-or-later
// SPDX-FileCopyrightText: 2024 Hyperpolymath

//! Seeded train/validation/test partitioning
//!
//! The dataset is split twice: the test set is peeled off first, then the
//! validation set is taken from the remainder. `val_size` is a fraction of the
//! whole dataset, so the second split uses `val_size / (1 - test_size)`.

use crate::datasets::{Dataset, Label, Sample};
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

#[derive(Error, Debug, PartialEq)]
pub enum SplitError {
    #[error("test_size must be in (0, 1), got {0}")]
    InvalidTestSize(f64),

    #[error("val_size must be in (0, 1), got {0}")]
    InvalidValSize(f64),

    #[error("test_size + val_size must be < 1, got {0}")]
    FractionsTooLarge(f64),

    #[error("Splitting {n_samples} samples with fraction {fraction} leaves an empty partition")]
    EmptyPartition { n_samples: usize, fraction: f64 },

    #[error("Stratified split needs at least 2 samples of every class; {label:?} has {count}")]
    ClassTooSmall { label: Label, count: usize },

    #[error("Stratified split needs at least {n_classes} samples per partition, got {size}")]
    PartitionSmallerThanClasses { n_classes: usize, size: usize },
}

/// Partitioning parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SplitConfig {
    /// Fraction of the whole dataset used for testing
    pub test_size: f64,
    /// Fraction of the whole dataset used for validation
    pub val_size: f64,
    /// Seed shared by both splits
    pub random_state: u64,
    /// Preserve label proportions in every partition
    pub stratify: bool,
}

impl Default for SplitConfig {
    fn default() -> Self {
        Self {
            test_size: 0.15,
            val_size: 0.15,
            random_state: 42,
            stratify: true,
        }
    }
}

impl SplitConfig {
    pub fn validate(&self) -> Result<(), SplitError> {
        if !(self.test_size > 0.0 && self.test_size < 1.0) {
            return Err(SplitError::InvalidTestSize(self.test_size));
        }
        if !(self.val_size > 0.0 && self.val_size < 1.0) {
            return Err(SplitError::InvalidValSize(self.val_size));
        }
        let total = self.test_size + self.val_size;
        if total >= 1.0 {
            return Err(SplitError::FractionsTooLarge(total));
        }
        Ok(())
    }

    /// Validation fraction relative to the train+validation remainder
    pub fn val_fraction_of_remainder(&self) -> f64 {
        self.val_size / (1.0 - self.test_size)
    }
}

/// Three disjoint partitions covering the whole dataset
#[derive(Debug, Clone)]
pub struct DatasetSplit {
    pub train: Vec<Sample>,
    pub validation: Vec<Sample>,
    pub test: Vec<Sample>,
}

impl DatasetSplit {
    pub fn total_samples(&self) -> usize {
        self.train.len() + self.validation.len() + self.test.len()
    }

    pub fn sizes(&self) -> SplitSizes {
        SplitSizes {
            train: self.train.len(),
            validation: self.validation.len(),
            test: self.test.len(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SplitSizes {
    pub train: usize,
    pub validation: usize,
    pub test: usize,
}

/// Split samples into train/validation/test according to `config`
pub fn split_data(samples: &[Sample], config: &SplitConfig) -> Result<DatasetSplit, SplitError> {
    config.validate()?;

    let (train_val, test) = train_test_split(
        samples.to_vec(),
        config.test_size,
        config.random_state,
        config.stratify,
    )?;

    let (train, validation) = train_test_split(
        train_val,
        config.val_fraction_of_remainder(),
        config.random_state,
        config.stratify,
    )?;

    tracing::info!(
        "Split {} samples: train={} (pos {:.3}), val={} (pos {:.3}), test={} (pos {:.3})",
        samples.len(),
        train.len(),
        Dataset::positive_rate(&train),
        validation.len(),
        Dataset::positive_rate(&validation),
        test.len(),
        Dataset::positive_rate(&test),
    );

    Ok(DatasetSplit {
        train,
        validation,
        test,
    })
}

/// Single seeded split returning `(train, test)`
pub fn train_test_split(
    samples: Vec<Sample>,
    test_fraction: f64,
    seed: u64,
    stratify: bool,
) -> Result<(Vec<Sample>, Vec<Sample>), SplitError> {
    let n = samples.len();
    // Plain ceil, so float noise like 20.000000000000004 rounds up
    let n_test = (test_fraction * n as f64).ceil() as usize;
    let n_train = n.saturating_sub(n_test);

    if n_test == 0 || n_train == 0 {
        return Err(SplitError::EmptyPartition {
            n_samples: n,
            fraction: test_fraction,
        });
    }

    let mut rng = ChaCha8Rng::seed_from_u64(seed);

    if !stratify {
        let mut samples = samples;
        samples.shuffle(&mut rng);
        let test = samples.split_off(n_train);
        return Ok((samples, test));
    }

    // Group by label; BTreeMap keeps class order stable across runs
    let mut by_class: BTreeMap<Label, Vec<Sample>> = BTreeMap::new();
    for sample in samples {
        by_class.entry(sample.label).or_default().push(sample);
    }

    for (label, members) in &by_class {
        if members.len() < 2 {
            return Err(SplitError::ClassTooSmall {
                label: *label,
                count: members.len(),
            });
        }
    }
    let n_classes = by_class.len();
    for size in [n_test, n_train] {
        if size < n_classes {
            return Err(SplitError::PartitionSmallerThanClasses { n_classes, size });
        }
    }

    let counts: Vec<usize> = by_class.values().map(Vec::len).collect();
    let allocation = allocate_proportionally(&counts, n_test);

    let mut train = Vec::with_capacity(n_train);
    let mut test = Vec::with_capacity(n_test);
    for (mut members, take) in by_class.into_values().zip(allocation) {
        members.shuffle(&mut rng);
        let rest = members.split_off(take);
        test.extend(members);
        train.extend(rest);
    }

    train.shuffle(&mut rng);
    test.shuffle(&mut rng);
    Ok((train, test))
}

/// Distribute `total` draws across classes proportionally to `counts`
///
/// Floors first, then hands the remainder to the largest fractional parts,
/// earlier classes winning ties. No class receives more than its count.
fn allocate_proportionally(counts: &[usize], total: usize) -> Vec<usize> {
    let n: usize = counts.iter().sum();
    if n == 0 {
        return vec![0; counts.len()];
    }

    let exact: Vec<f64> = counts
        .iter()
        .map(|&c| total as f64 * c as f64 / n as f64)
        .collect();
    let mut allocation: Vec<usize> = exact
        .iter()
        .zip(counts)
        .map(|(e, &c)| (e.floor() as usize).min(c))
        .collect();

    let mut order: Vec<usize> = (0..counts.len()).collect();
    order.sort_by(|&a, &b| {
        let frac_a = exact[a] - exact[a].floor();
        let frac_b = exact[b] - exact[b].floor();
        frac_b
            .partial_cmp(&frac_a)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then(a.cmp(&b))
    });

    let mut remaining = total.saturating_sub(allocation.iter().sum());
    while remaining > 0 {
        let before = remaining;
        for &idx in &order {
            if remaining == 0 {
                break;
            }
            if allocation[idx] < counts[idx] {
                allocation[idx] += 1;
                remaining -= 1;
            }
        }
        if remaining == before {
            break;
        }
    }

    allocation
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    fn ids(samples: &[Sample]) -> Vec<String> {
        samples.iter().map(|s| s.id.clone()).collect()
    }

    fn samples(size: usize) -> Vec<Sample> {
        crate::datasets::Dataset::load_synthetic(size, 7).samples
    }

    #[test]
    fn test_split_is_deterministic() {
        let data = samples(500);
        let config = SplitConfig::default();

        let a = split_data(&data, &config).unwrap();
        let b = split_data(&data, &config).unwrap();

        assert_eq!(ids(&a.train), ids(&b.train));
        assert_eq!(ids(&a.validation), ids(&b.validation));
        assert_eq!(ids(&a.test), ids(&b.test));
    }

    #[test]
    fn test_different_seed_changes_membership() {
        let data = samples(500);
        let a = split_data(&data, &SplitConfig::default()).unwrap();
        let b = split_data(
            &data,
            &SplitConfig {
                random_state: 1234,
                ..SplitConfig::default()
            },
        )
        .unwrap();

        let test_a: HashSet<_> = ids(&a.test).into_iter().collect();
        let test_b: HashSet<_> = ids(&b.test).into_iter().collect();
        assert_ne!(test_a, test_b);
    }

    #[test]
    fn test_partitions_are_disjoint_and_exhaustive() {
        for stratify in [true, false] {
            let data = samples(333);
            let split = split_data(
                &data,
                &SplitConfig {
                    stratify,
                    ..SplitConfig::default()
                },
            )
            .unwrap();

            let train: HashSet<_> = ids(&split.train).into_iter().collect();
            let val: HashSet<_> = ids(&split.validation).into_iter().collect();
            let test: HashSet<_> = ids(&split.test).into_iter().collect();

            assert!(train.is_disjoint(&val));
            assert!(train.is_disjoint(&test));
            assert!(val.is_disjoint(&test));

            let union: HashSet<_> = train.union(&val).chain(test.iter()).cloned().collect();
            let all: HashSet<_> = ids(&data).into_iter().collect();
            assert_eq!(union, all);
            assert_eq!(split.total_samples(), data.len());
        }
    }

    #[test]
    fn test_sizes_follow_whole_dataset_fractions() {
        let data = samples(1000);
        let config = SplitConfig {
            test_size: 0.2,
            val_size: 0.1,
            random_state: 42,
            stratify: false,
        };
        let split = split_data(&data, &config).unwrap();

        // 200 test, then 800 * (0.1 / 0.8) = 100 validation
        assert_eq!(split.sizes(), SplitSizes { train: 700, validation: 100, test: 200 });
    }

    #[test]
    fn test_sizes_round_float_products_up() {
        let data = samples(100);
        let config = SplitConfig {
            test_size: 0.3,
            val_size: 0.2,
            random_state: 42,
            stratify: false,
        };
        let split = split_data(&data, &config).unwrap();

        // 70 * (0.2 / 0.7) evaluates to 20.000000000000004
        assert_eq!(split.sizes(), SplitSizes { train: 49, validation: 21, test: 30 });
    }

    #[test]
    fn test_stratified_preserves_positive_rate() {
        let data = samples(2000);
        let overall = Dataset::positive_rate(&data);
        let split = split_data(&data, &SplitConfig::default()).unwrap();

        for part in [&split.train, &split.validation, &split.test] {
            let rate = Dataset::positive_rate(part);
            assert!((rate - overall).abs() < 0.01, "rate {} vs overall {}", rate, overall);
        }
    }

    #[test]
    fn test_invalid_fractions_rejected() {
        let data = samples(100);
        let bad = |test_size, val_size| SplitConfig {
            test_size,
            val_size,
            ..SplitConfig::default()
        };

        assert_eq!(
            split_data(&data, &bad(0.0, 0.1)).unwrap_err(),
            SplitError::InvalidTestSize(0.0)
        );
        assert_eq!(
            split_data(&data, &bad(0.2, 1.5)).unwrap_err(),
            SplitError::InvalidValSize(1.5)
        );
        assert!(matches!(
            split_data(&data, &bad(0.6, 0.4)).unwrap_err(),
            SplitError::FractionsTooLarge(_)
        ));
    }

    #[test]
    fn test_stratify_rejects_singleton_class() {
        let mut data: Vec<Sample> = samples(50)
            .into_iter()
            .map(|mut s| {
                s.label = Label::NonToxic;
                s
            })
            .collect();
        data[0].label = Label::Toxic;

        let err = split_data(&data, &SplitConfig::default()).unwrap_err();
        assert_eq!(err, SplitError::ClassTooSmall { label: Label::Toxic, count: 1 });
    }

    #[test]
    fn test_tiny_dataset_reports_empty_partition() {
        let data = samples(1);
        let err = train_test_split(data, 0.5, 42, false).unwrap_err();
        assert!(matches!(err, SplitError::EmptyPartition { n_samples: 1, .. }));
    }

    #[test]
    fn test_allocate_proportionally() {
        assert_eq!(allocate_proportionally(&[75, 25], 20), vec![15, 5]);
        // 10 * 0.667 = 6.67, 10 * 0.333 = 3.33
        assert_eq!(allocate_proportionally(&[20, 10], 10), vec![7, 3]);
        assert_eq!(allocate_proportionally(&[1, 1], 2), vec![1, 1]);
        let alloc = allocate_proportionally(&[3, 997], 17);
        assert_eq!(alloc.iter().sum::<usize>(), 17);
    }
}
