//! Readers for tabular churn data.
pub mod churn_csv;

pub use churn_csv::{read_churn_csv, read_churn_csv_with_config, CsvReaderConfig};
