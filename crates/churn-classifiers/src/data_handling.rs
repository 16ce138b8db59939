//! Data structures for labeled churn datasets.
//!
//! This module defines the raw table produced by the reader, the numeric
//! `FeatureMatrix` with its ordered column names, the binary `Label`, and
//! `Dataset`, which pairs a matrix with its labels, a partition tag and the
//! provenance of every row.
use std::fmt;
use std::str::FromStr;

use ndarray::{Array2, ArrayView1, Axis};
use serde::{Deserialize, Serialize};

use crate::error::{ChurnError, Result};

/// Churn label. `Yes` is the positive class for every metric.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Label {
    No,
    Yes,
}

impl Label {
    pub fn is_positive(self) -> bool {
        self == Label::Yes
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Label::No => "No",
            Label::Yes => "Yes",
        }
    }

    /// Numeric encoding used by the regression-style learners (Yes = 1.0).
    pub fn as_f64(self) -> f64 {
        match self {
            Label::No => 0.0,
            Label::Yes => 1.0,
        }
    }
}

impl fmt::Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Label {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "yes" => Ok(Label::Yes),
            "no" => Ok(Label::No),
            other => Err(format!("Unknown label value: {}", other)),
        }
    }
}

/// Labels aligned index-for-index with the rows of a `FeatureMatrix`.
pub type LabelVector = Vec<Label>;

/// Which side of a split a dataset belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Partition {
    Full,
    Train,
    Test,
}

/// Per-class row counts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ClassCounts {
    pub no: usize,
    pub yes: usize,
}

impl ClassCounts {
    pub fn total(&self) -> usize {
        self.no + self.yes
    }

    pub fn get(&self, label: Label) -> usize {
        match label {
            Label::No => self.no,
            Label::Yes => self.yes,
        }
    }

    /// Labels ordered (minority, majority). A tie reports `Yes` as the minority.
    pub fn minority_majority(&self) -> (Label, Label) {
        if self.no < self.yes {
            (Label::No, Label::Yes)
        } else {
            (Label::Yes, Label::No)
        }
    }
}

/// Rows of raw cells as read from the delimited source. `None` marks a missing cell.
#[derive(Debug, Clone)]
pub struct RawTable {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Option<String>>>,
}

impl RawTable {
    pub fn new(columns: Vec<String>, rows: Vec<Vec<Option<String>>>) -> Result<Self> {
        if let Some((i, row)) = rows.iter().enumerate().find(|(_, r)| r.len() != columns.len()) {
            return Err(ChurnError::Schema(format!(
                "row {} has {} cells but the header has {} columns",
                i,
                row.len(),
                columns.len()
            )));
        }
        Ok(Self { columns, rows })
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    pub fn nrows(&self) -> usize {
        self.rows.len()
    }
}

/// Numeric features with ordered column identities.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureMatrix {
    names: Vec<String>,
    values: Array2<f64>,
}

impl FeatureMatrix {
    pub fn new(names: Vec<String>, values: Array2<f64>) -> Result<Self> {
        if names.len() != values.ncols() {
            return Err(ChurnError::Schema(format!(
                "{} column names given for a matrix with {} columns",
                names.len(),
                values.ncols()
            )));
        }
        Ok(Self { names, values })
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn values(&self) -> &Array2<f64> {
        &self.values
    }

    pub fn nrows(&self) -> usize {
        self.values.nrows()
    }

    pub fn ncols(&self) -> usize {
        self.values.ncols()
    }

    pub fn row(&self, row: usize) -> ArrayView1<'_, f64> {
        self.values.row(row)
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.names.iter().position(|n| n == name)
    }

    /// Rows in the given order. Indices may repeat.
    pub fn select_rows(&self, indices: &[usize]) -> FeatureMatrix {
        FeatureMatrix {
            names: self.names.clone(),
            values: self.values.select(Axis(0), indices),
        }
    }

    /// Columns in exactly the order of `names`.
    pub fn select_columns(&self, names: &[String]) -> Result<FeatureMatrix> {
        let indices = names
            .iter()
            .map(|name| {
                self.column_index(name).ok_or_else(|| {
                    ChurnError::Schema(format!("column '{}' is not in the feature matrix", name))
                })
            })
            .collect::<Result<Vec<usize>>>()?;

        Ok(FeatureMatrix {
            names: names.to_vec(),
            values: self.values.select(Axis(1), &indices),
        })
    }

    /// Fails unless the columns are exactly `expected`, in order.
    pub fn ensure_schema(&self, expected: &[String]) -> Result<()> {
        if self.names != expected {
            return Err(ChurnError::Schema(format!(
                "feature columns {:?} do not match the expected schema {:?}",
                self.names, expected
            )));
        }
        Ok(())
    }
}

/// A feature matrix, its labels, and the partition it belongs to.
///
/// `row_ids` holds, for every row, the index of the encoded-base row it was
/// derived from. Resampled duplicates share a row id.
#[derive(Debug, Clone)]
pub struct Dataset {
    x: FeatureMatrix,
    y: LabelVector,
    row_ids: Vec<usize>,
    partition: Partition,
}

impl Dataset {
    pub fn new(x: FeatureMatrix, y: LabelVector, partition: Partition) -> Result<Self> {
        let row_ids = (0..y.len()).collect();
        Self::with_row_ids(x, y, row_ids, partition)
    }

    pub fn with_row_ids(
        x: FeatureMatrix,
        y: LabelVector,
        row_ids: Vec<usize>,
        partition: Partition,
    ) -> Result<Self> {
        if x.nrows() != y.len() || row_ids.len() != y.len() {
            return Err(ChurnError::LengthMismatch {
                rows: x.nrows(),
                labels: y.len(),
            });
        }
        Ok(Self {
            x,
            y,
            row_ids,
            partition,
        })
    }

    pub fn x(&self) -> &FeatureMatrix {
        &self.x
    }

    pub fn y(&self) -> &[Label] {
        &self.y
    }

    pub fn row_ids(&self) -> &[usize] {
        &self.row_ids
    }

    pub fn partition(&self) -> Partition {
        self.partition
    }

    pub fn feature_names(&self) -> &[String] {
        self.x.names()
    }

    pub fn len(&self) -> usize {
        self.y.len()
    }

    pub fn is_empty(&self) -> bool {
        self.y.is_empty()
    }

    pub fn class_counts(&self) -> ClassCounts {
        let yes = self.y.iter().filter(|l| l.is_positive()).count();
        ClassCounts {
            no: self.y.len() - yes,
            yes,
        }
    }

    /// Row positions (not row ids) holding `label`, in order.
    pub fn indices_of(&self, label: Label) -> Vec<usize> {
        self.y
            .iter()
            .enumerate()
            .filter(|&(_, &l)| l == label)
            .map(|(i, _)| i)
            .collect()
    }

    /// New dataset holding the rows at `indices` (positions may repeat).
    pub fn subset(&self, indices: &[usize], partition: Partition) -> Dataset {
        Dataset {
            x: self.x.select_rows(indices),
            y: indices.iter().map(|&i| self.y[i]).collect(),
            row_ids: indices.iter().map(|&i| self.row_ids[i]).collect(),
            partition,
        }
    }

    /// New dataset restricted to `names`, in that order.
    pub fn select_features(&self, names: &[String]) -> Result<Dataset> {
        Ok(Dataset {
            x: self.x.select_columns(names)?,
            y: self.y.clone(),
            row_ids: self.row_ids.clone(),
            partition: self.partition,
        })
    }

    /// New dataset with the same rows but a replacement feature matrix.
    pub fn with_features(&self, x: FeatureMatrix) -> Result<Dataset> {
        Self::with_row_ids(x, self.y.clone(), self.row_ids.clone(), self.partition)
    }

    pub fn log_summary(&self, name: &str) {
        let counts = self.class_counts();
        log::info!(
            "{} ({:?}): {} rows ({} Yes / {} No), {} feature columns",
            name,
            self.partition,
            self.len(),
            counts.yes,
            counts.no,
            self.x.ncols()
        );
    }
}
