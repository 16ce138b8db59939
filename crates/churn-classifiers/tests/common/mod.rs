//! Deterministic synthetic churn tables shared by the integration tests.
#![allow(dead_code)]

use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

use churn_classifiers::data_handling::{Dataset, FeatureMatrix, Label, Partition, RawTable};

pub const COUNTRIES: [&str; 3] = ["France", "Germany", "Spain"];

/// Raw table with `yes` churned and `no` retained customers.
///
/// `support_calls` and `monthly_usage` carry the signal, `age` is noise and
/// every 50th row has a missing `age` cell.
pub fn churn_table(yes: usize, no: usize, seed: u64) -> RawTable {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let mut labels: Vec<bool> = (0..yes + no).map(|i| i < yes).collect();
    labels.shuffle(&mut rng);

    let columns = ["age", "monthly_usage", "support_calls", "country", "churned_status"]
        .iter()
        .map(|s| s.to_string())
        .collect();

    let rows = labels
        .iter()
        .enumerate()
        .map(|(i, &churned)| {
            let shift = if churned { 1.0 } else { 0.0 };
            let age = if i % 50 == 0 {
                None
            } else {
                Some(format!("{}", rng.gen_range(18..80)))
            };
            let usage = 40.0 - 15.0 * shift + rng.gen_range(-10.0..10.0);
            let calls = 2.0 + 4.0 * shift + rng.gen_range(-2.0..2.0);
            let country = COUNTRIES[rng.gen_range(0..COUNTRIES.len())];
            vec![
                age,
                Some(format!("{:.3}", usage)),
                Some(format!("{:.3}", calls)),
                Some(country.to_string()),
                Some(if churned { "Yes" } else { "No" }.to_string()),
            ]
        })
        .collect();

    RawTable::new(columns, rows).unwrap()
}

/// One-feature dataset split cleanly at zero.
pub fn separable(n_per_class: usize) -> Dataset {
    let mut values = Vec::new();
    let mut labels = Vec::new();
    for i in 0..n_per_class {
        values.push(-1.0 - i as f64 * 0.1);
        labels.push(Label::No);
        values.push(1.0 + i as f64 * 0.1);
        labels.push(Label::Yes);
    }
    let x = FeatureMatrix::new(
        vec!["signal".to_string()],
        ndarray::Array2::from_shape_vec((values.len(), 1), values).unwrap(),
    )
    .unwrap();
    Dataset::new(x, labels, Partition::Train).unwrap()
}
