//! Delimited churn table reader.
use std::path::Path;

use anyhow::{Context, Result};

use crate::data_handling::RawTable;
use crate::preprocessing::is_missing_token;

/// Configuration for reading delimited churn files.
#[derive(Debug, Clone)]
pub struct CsvReaderConfig {
    pub delimiter: u8,
    /// Columns dropped while reading (e.g. customer identifiers).
    pub ignore_columns: Vec<String>,
}

impl Default for CsvReaderConfig {
    fn default() -> Self {
        Self {
            delimiter: b',',
            ignore_columns: Vec::new(),
        }
    }
}

/// Read a comma-separated file with a header row.
pub fn read_churn_csv<P: AsRef<Path>>(path: P) -> Result<RawTable> {
    read_churn_csv_with_config(path, &CsvReaderConfig::default())
}

/// Read a delimited file using a custom configuration. Empty cells and
/// `NA`/`NaN`/`null`/`None` tokens become missing cells.
pub fn read_churn_csv_with_config<P: AsRef<Path>>(
    path: P,
    config: &CsvReaderConfig,
) -> Result<RawTable> {
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(config.delimiter)
        .has_headers(true)
        .trim(csv::Trim::All)
        .from_path(&path)
        .with_context(|| format!("Failed to open churn file: {}", path.as_ref().display()))?;

    let headers = reader
        .headers()
        .context("Failed to read header row")?
        .clone();

    let keep: Vec<usize> = headers
        .iter()
        .enumerate()
        .filter(|(_, h)| !config.ignore_columns.iter().any(|c| c == h))
        .map(|(i, _)| i)
        .collect();
    let columns: Vec<String> = keep.iter().map(|&i| headers[i].to_string()).collect();

    let mut rows = Vec::new();
    for (line, record) in reader.records().enumerate() {
        let record = record.with_context(|| format!("Failed to parse record {}", line + 1))?;
        let row = keep
            .iter()
            .map(|&i| match record.get(i) {
                Some(v) if !v.is_empty() && !is_missing_token(v) => Some(v.to_string()),
                _ => None,
            })
            .collect();
        rows.push(row);
    }

    log::info!(
        "Read {} rows x {} columns from {}",
        rows.len(),
        columns.len(),
        path.as_ref().display()
    );

    RawTable::new(columns, rows).context("Inconsistent churn table")
}
