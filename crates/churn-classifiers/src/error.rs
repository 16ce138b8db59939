use std::error::Error;
use std::fmt;

/// Crate-wide result alias.
pub type Result<T> = std::result::Result<T, ChurnError>;

/// Errors that abort a pipeline run.
///
/// None of these are transient: re-running with the same inputs fails the
/// same way, so callers are expected to fix the input or configuration.
#[derive(Debug)]
pub enum ChurnError {
    /// A required column is missing or a matrix does not match a recorded schema.
    Schema(String),
    /// A categorical column cannot be encoded.
    Encoding(String),
    /// Feature matrix rows and label vector length disagree.
    LengthMismatch { rows: usize, labels: usize },
    /// The hyper-parameter space produced no usable configuration.
    EmptySearchSpace(String),
    /// No feature scored above the importance threshold.
    EmptySelection { threshold: f64 },
    /// The model does not expose feature importances.
    ImportancesUnavailable(String),
    /// A parameter name or value is not understood.
    InvalidParameter(String),
    /// Not enough rows (or a class is missing) for the requested operation.
    EmptyDataset(String),
}

impl fmt::Display for ChurnError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            ChurnError::Schema(msg) => write!(f, "schema error: {}", msg),
            ChurnError::Encoding(msg) => write!(f, "encoding error: {}", msg),
            ChurnError::LengthMismatch { rows, labels } => write!(
                f,
                "feature matrix has {} rows but label vector has {} entries",
                rows, labels
            ),
            ChurnError::EmptySearchSpace(msg) => write!(f, "empty search space: {}", msg),
            ChurnError::EmptySelection { threshold } => write!(
                f,
                "no feature has an importance above the threshold {}",
                threshold
            ),
            ChurnError::ImportancesUnavailable(model) => {
                write!(f, "model '{}' does not expose feature importances", model)
            }
            ChurnError::InvalidParameter(msg) => write!(f, "invalid parameter: {}", msg),
            ChurnError::EmptyDataset(msg) => write!(f, "empty dataset: {}", msg),
        }
    }
}

impl Error for ChurnError {}
