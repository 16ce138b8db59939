//! Random over- and under-sampling to equalise class counts.
//!
//! Balancing works on the full encoded dataset; the result is split
//! afterwards with `preprocessing::stratified_split`, which keeps every copy
//! of a source row on one side so resampled duplicates cannot leak into test.
use rand::seq::index;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::data_handling::Dataset;
use crate::error::{ChurnError, Result};

#[derive(Deserialize, Serialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum BalanceStrategy {
    /// Draw minority rows with replacement up to the majority count.
    Oversample,
    /// Draw majority rows without replacement down to the minority count.
    Undersample,
}

impl fmt::Display for BalanceStrategy {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            BalanceStrategy::Oversample => f.write_str("oversample"),
            BalanceStrategy::Undersample => f.write_str("undersample"),
        }
    }
}

/// New dataset with equal class counts. The untouched class keeps each of
/// its rows exactly once and comes first; the resampled class follows.
pub fn balance(dataset: &Dataset, strategy: BalanceStrategy, seed: u64) -> Result<Dataset> {
    let counts = dataset.class_counts();
    if counts.no == 0 || counts.yes == 0 {
        return Err(ChurnError::EmptyDataset(format!(
            "balancing needs both classes, got {} Yes / {} No",
            counts.yes, counts.no
        )));
    }

    let (minority, majority) = counts.minority_majority();
    let minority_rows = dataset.indices_of(minority);
    let majority_rows = dataset.indices_of(majority);
    let mut rng = ChaCha8Rng::seed_from_u64(seed);

    let rows: Vec<usize> = match strategy {
        BalanceStrategy::Oversample => {
            let drawn = (0..majority_rows.len())
                .map(|_| minority_rows[rng.gen_range(0..minority_rows.len())]);
            majority_rows.iter().copied().chain(drawn).collect()
        }
        BalanceStrategy::Undersample => {
            let mut kept: Vec<usize> = index::sample(&mut rng, majority_rows.len(), minority_rows.len())
                .into_iter()
                .map(|i| majority_rows[i])
                .collect();
            kept.sort_unstable();
            minority_rows.iter().copied().chain(kept).collect()
        }
    };

    let balanced = dataset.subset(&rows, dataset.partition());
    log::info!(
        "{}: {} Yes / {} No -> {} Yes / {} No",
        strategy,
        counts.yes,
        counts.no,
        balanced.class_counts().yes,
        balanced.class_counts().no
    );
    Ok(balanced)
}
