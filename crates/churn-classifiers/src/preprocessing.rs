//! Feature preparation: cleaning, encoding, splitting and scaling.
//!
//! Missing cells are replaced with zero in every feature column; no
//! column-specific imputation is attempted. The label column is the
//! exception: a missing label is a schema error. The categorical column is one-hot encoded with
//! its categories in sorted order and the first category dropped. Dummy
//! columns are appended after the numeric columns.
//!
//! The `Scaler` is a plain value: fit it on a train partition and pass it
//! explicitly to whatever needs the same transform.
use std::collections::{BTreeSet, HashMap};

use ndarray::{Array1, Array2, Axis};
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

use crate::config::InputSchema;
use crate::data_handling::{Dataset, FeatureMatrix, Label, Partition, RawTable};
use crate::error::{ChurnError, Result};

/// Value substituted for every missing cell.
const MISSING_FILL: &str = "0";

fn clean(cell: &Option<String>) -> &str {
    match cell.as_deref().map(str::trim) {
        None | Some("") => MISSING_FILL,
        Some(v) if is_missing_token(v) => MISSING_FILL,
        Some(v) => v,
    }
}

pub(crate) fn is_missing_token(v: &str) -> bool {
    matches!(v.to_lowercase().as_str(), "na" | "nan" | "null" | "none")
}

/// Clean and encode a raw table into one numeric dataset (partition `Full`).
///
/// Fails with `Schema` on a missing or unknown label and with `Encoding` when
/// no feature column remains.
pub fn encode(raw: &RawTable, schema: &InputSchema) -> Result<Dataset> {
    let label_idx = raw.column_index(&schema.label_column).ok_or_else(|| {
        ChurnError::Schema(format!("label column '{}' is missing", schema.label_column))
    })?;
    let cat_idx = raw.column_index(&schema.categorical_column).ok_or_else(|| {
        ChurnError::Schema(format!(
            "categorical column '{}' is missing",
            schema.categorical_column
        ))
    })?;

    let labels = raw
        .rows
        .iter()
        .enumerate()
        .map(|(i, row)| {
            let cell = match row[label_idx].as_deref().map(str::trim) {
                Some(v) if !v.is_empty() && !is_missing_token(v) => v,
                _ => {
                    return Err(ChurnError::Schema(format!(
                        "row {}: missing value in label column '{}'",
                        i, schema.label_column
                    )))
                }
            };
            cell.parse::<Label>().map_err(|e| {
                ChurnError::Schema(format!("row {}: {} in '{}'", i, e, schema.label_column))
            })
        })
        .collect::<Result<Vec<Label>>>()?;

    let categories: BTreeSet<&str> = raw.rows.iter().map(|row| clean(&row[cat_idx])).collect();
    if categories.is_empty() {
        return Err(ChurnError::Encoding(format!(
            "categorical column '{}' has no values",
            schema.categorical_column
        )));
    }
    // first category is dropped
    let dummies: Vec<&str> = categories.iter().skip(1).copied().collect();
    if dummies.is_empty() {
        log::warn!(
            "categorical column '{}' has a single category; it contributes no features",
            schema.categorical_column
        );
    }

    let numeric: Vec<usize> = (0..raw.columns.len())
        .filter(|&c| c != label_idx && c != cat_idx)
        .filter(|&c| !schema.ignore_columns.contains(&raw.columns[c]))
        .collect();

    let mut names: Vec<String> = numeric.iter().map(|&c| raw.columns[c].clone()).collect();
    names.extend(
        dummies
            .iter()
            .map(|d| format!("{}_{}", schema.categorical_column, d)),
    );
    let dummy_pos: HashMap<&str, usize> = dummies
        .iter()
        .enumerate()
        .map(|(i, d)| (*d, numeric.len() + i))
        .collect();

    if names.is_empty() {
        return Err(ChurnError::Encoding(format!(
            "no feature columns remain after encoding '{}'",
            schema.categorical_column
        )));
    }

    let mut values = Array2::<f64>::zeros((raw.nrows(), names.len()));
    for (r, row) in raw.rows.iter().enumerate() {
        for (j, &c) in numeric.iter().enumerate() {
            let cell = clean(&row[c]);
            values[(r, j)] = cell.parse::<f64>().map_err(|_| {
                ChurnError::Schema(format!(
                    "row {}: column '{}' holds non-numeric value '{}'",
                    r, raw.columns[c], cell
                ))
            })?;
        }
        if let Some(&j) = dummy_pos.get(clean(&row[cat_idx])) {
            values[(r, j)] = 1.0;
        }
    }

    log::debug!(
        "encoded {} rows: {} numeric columns, {} dummy columns for '{}'",
        raw.nrows(),
        numeric.len(),
        dummies.len(),
        schema.categorical_column
    );

    Dataset::new(FeatureMatrix::new(names, values)?, labels, Partition::Full)
}

/// Split `dataset` into (train, test), preserving class proportions.
///
/// Rows sharing a row id (resampled duplicates) always land in the same
/// partition. Per class, at most `round(test_fraction * class_rows)` rows go
/// to test: groups are taken in shuffled order and a group that would
/// overshoot is skipped in favour of later, smaller ones. Both partitions
/// keep the input row order.
pub fn stratified_split(
    dataset: &Dataset,
    test_fraction: f64,
    seed: u64,
) -> Result<(Dataset, Dataset)> {
    if !(test_fraction > 0.0 && test_fraction < 1.0) {
        return Err(ChurnError::InvalidParameter(format!(
            "split fraction must be in (0, 1), got {}",
            test_fraction
        )));
    }

    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let mut is_test = vec![false; dataset.len()];

    for label in [Label::No, Label::Yes] {
        // group positions by row id, in first-appearance order
        let mut order: Vec<usize> = Vec::new();
        let mut groups: HashMap<usize, Vec<usize>> = HashMap::new();
        for pos in dataset.indices_of(label) {
            let id = dataset.row_ids()[pos];
            groups
                .entry(id)
                .or_insert_with(|| {
                    order.push(id);
                    Vec::new()
                })
                .push(pos);
        }

        let class_rows = dataset.class_counts().get(label);
        let target = (test_fraction * class_rows as f64).round() as usize;

        order.shuffle(&mut rng);
        let mut taken = 0;
        for id in order {
            if taken == target {
                break;
            }
            let group = &groups[&id];
            if taken + group.len() > target {
                continue;
            }
            for &pos in group {
                is_test[pos] = true;
            }
            taken += group.len();
        }
        if taken != target {
            log::debug!(
                "{} test rows for {} instead of {}: no row group fits the remainder",
                taken,
                label,
                target
            );
        }
    }

    let (test_idx, train_idx): (Vec<usize>, Vec<usize>) =
        (0..dataset.len()).partition(|&i| is_test[i]);

    if train_idx.is_empty() || test_idx.is_empty() {
        return Err(ChurnError::EmptyDataset(format!(
            "splitting {} rows with test fraction {} leaves an empty partition",
            dataset.len(),
            test_fraction
        )));
    }

    Ok((
        dataset.subset(&train_idx, Partition::Train),
        dataset.subset(&test_idx, Partition::Test),
    ))
}

/// Clean, encode and split a raw table into (train, test).
pub fn prepare(
    raw: &RawTable,
    schema: &InputSchema,
    test_fraction: f64,
    seed: u64,
) -> Result<(Dataset, Dataset)> {
    let encoded = encode(raw, schema)?;
    stratified_split(&encoded, test_fraction, seed)
}

/// Simple standard scaler (per-column mean/std).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Scaler {
    pub feature_names: Vec<String>,
    pub mean: Vec<f64>,
    pub std: Vec<f64>,
}

impl Scaler {
    /// Minimum stddev to avoid division by zero when transforming.
    const MIN_STD: f64 = 1e-6;

    pub fn transform(&self, x: &FeatureMatrix) -> Result<FeatureMatrix> {
        x.ensure_schema(&self.feature_names)?;
        let mean = Array1::from_vec(self.mean.clone());
        let std = Array1::from_vec(self.std.clone());
        let scaled = (x.values() - &mean) / &std;
        FeatureMatrix::new(self.feature_names.clone(), scaled)
    }

    pub fn transform_dataset(&self, dataset: &Dataset) -> Result<Dataset> {
        dataset.with_features(self.transform(dataset.x())?)
    }

    /// Scaler restricted to `names`, in that order.
    pub fn select(&self, names: &[String]) -> Result<Scaler> {
        let mut mean = Vec::with_capacity(names.len());
        let mut std = Vec::with_capacity(names.len());
        for name in names {
            let i = self
                .feature_names
                .iter()
                .position(|n| n == name)
                .ok_or_else(|| ChurnError::Schema(format!("scaler has no column '{}'", name)))?;
            mean.push(self.mean[i]);
            std.push(self.std[i]);
        }
        Ok(Scaler {
            feature_names: names.to_vec(),
            mean,
            std,
        })
    }
}

/// Fit a `Scaler` on a matrix where rows are samples and columns are features.
pub fn fit_scaler(x: &FeatureMatrix) -> Result<Scaler> {
    if x.nrows() == 0 {
        return Err(ChurnError::EmptyDataset(
            "cannot fit a scaler on zero rows".to_string(),
        ));
    }
    let values = x.values();
    let mean = values.mean_axis(Axis(0)).unwrap_or_else(|| Array1::zeros(x.ncols()));
    let std = values
        .std_axis(Axis(0), 0.0)
        .mapv(|s| s.max(Scaler::MIN_STD));

    Ok(Scaler {
        feature_names: x.names().to_vec(),
        mean: mean.to_vec(),
        std: std.to_vec(),
    })
}

/// Fit a scaler on `train` and apply it to both partitions.
pub fn scale_partitions(train: &Dataset, test: &Dataset) -> Result<(Dataset, Dataset, Scaler)> {
    let scaler = fit_scaler(train.x())?;
    Ok((
        scaler.transform_dataset(train)?,
        scaler.transform_dataset(test)?,
        scaler,
    ))
}
