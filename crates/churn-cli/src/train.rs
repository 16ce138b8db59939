//! CLI training helpers for churn-classifiers.
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Serialize;

use churn_classifiers::config::{BalancingChoice, PipelineConfig};
use churn_classifiers::io::churn_csv::{read_churn_csv_with_config, CsvReaderConfig};
use churn_classifiers::metrics::Scoring;
use churn_classifiers::pipeline::{run, PipelineOutcome, PipelineReport};
use churn_classifiers::preprocessing::Scaler;

/// Command-line values that take precedence over the JSON config.
#[derive(Debug, Clone, Default)]
pub struct TrainOverrides {
    pub split_fraction: Option<f64>,
    pub seed: Option<u64>,
    pub balancing: Option<BalancingChoice>,
    pub scoring: Option<Scoring>,
    pub n_iter: Option<usize>,
    pub cv_folds: Option<usize>,
    pub selection_threshold: Option<f64>,
    pub bagging_estimators: Option<usize>,
    pub no_scale: bool,
}

impl TrainOverrides {
    pub fn apply(&self, config: &mut PipelineConfig) {
        if let Some(v) = self.split_fraction {
            config.split_fraction = v;
        }
        if let Some(v) = self.seed {
            config.seed = v;
        }
        if let Some(v) = self.balancing {
            config.balancing = v;
        }
        if let Some(v) = self.scoring {
            config.search.scoring = v;
        }
        if let Some(v) = self.n_iter {
            config.search.n_iter = v;
        }
        if let Some(v) = self.cv_folds {
            config.search.cv_folds = v;
        }
        if let Some(v) = self.selection_threshold {
            config.selection_threshold = v;
        }
        if let Some(v) = self.bagging_estimators {
            config.bagging_estimators = v;
        }
        if self.no_scale {
            config.scale_features = false;
        }
    }
}

/// What a training run writes to disk.
#[derive(Debug, Serialize)]
pub struct TrainOutput<'a> {
    pub input: &'a Path,
    pub config: &'a PipelineConfig,
    pub report: &'a PipelineReport,
    /// Ordered feature columns the final model expects.
    pub schema: &'a [String],
    pub scaler: Option<&'a Scaler>,
}

/// Load a pipeline configuration from a JSON file. Missing fields take their defaults.
pub fn load_pipeline_config<P: AsRef<Path>>(path: P) -> Result<PipelineConfig> {
    let content = std::fs::read_to_string(&path)
        .with_context(|| format!("Failed to read config: {}", path.as_ref().display()))?;
    let config: PipelineConfig = serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse config: {}", path.as_ref().display()))?;
    Ok(config)
}

/// Read `input` and run every training stage on it.
pub fn train_from_csv<P: AsRef<Path>>(input: P, config: &PipelineConfig) -> Result<PipelineOutcome> {
    config.validate().context("Invalid pipeline configuration")?;
    let reader = CsvReaderConfig::default();
    let raw = read_churn_csv_with_config(&input, &reader)?;
    let outcome = run(&raw, config)
        .with_context(|| format!("Training failed on {}", input.as_ref().display()))?;
    Ok(outcome)
}

/// Default report location next to the input file.
pub fn default_report_path(input: &Path) -> PathBuf {
    let stem = input
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "churn".to_string());
    input.with_file_name(format!("{}_report.json", stem))
}

/// Write the run report as pretty JSON.
pub fn write_report<P: AsRef<Path>>(
    path: P,
    input: &Path,
    config: &PipelineConfig,
    outcome: &PipelineOutcome,
) -> Result<()> {
    let output = TrainOutput {
        input,
        config,
        report: &outcome.report,
        schema: &outcome.schema,
        scaler: outcome.scaler.as_ref(),
    };
    let json = serde_json::to_string_pretty(&output).context("Failed to serialize report")?;
    std::fs::write(&path, json)
        .with_context(|| format!("Failed to write report: {}", path.as_ref().display()))?;
    log::info!("Report written to {}", path.as_ref().display());
    Ok(())
}
