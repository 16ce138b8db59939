//! Binary classification metrics with `Yes` as the positive label.
//!
//! Precision and recall are undefined when the evaluated slice has no
//! predicted or no actual positives. They are then reported as zero and a
//! `MetricWarning` is attached to the report instead of failing the run.
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::data_handling::{Dataset, Label, Partition};
use crate::error::{ChurnError, Result};
use crate::models::classifier_trait::Classifier;

/// Metric used to rank search candidates.
#[derive(Deserialize, Serialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum Scoring {
    #[default]
    Accuracy,
    Precision,
    Recall,
    F1,
}

impl std::str::FromStr for Scoring {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "accuracy" => Ok(Scoring::Accuracy),
            "precision" => Ok(Scoring::Precision),
            "recall" => Ok(Scoring::Recall),
            "f1" => Ok(Scoring::F1),
            other => Err(format!("Unknown scoring metric: {}", other)),
        }
    }
}

/// Counts of the 2x2 confusion matrix.
#[derive(Deserialize, Serialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ConfusionMatrix {
    pub true_positive: usize,
    pub false_positive: usize,
    pub true_negative: usize,
    pub false_negative: usize,
}

impl ConfusionMatrix {
    pub fn from_labels(actual: &[Label], predicted: &[Label]) -> Result<Self> {
        if actual.len() != predicted.len() {
            return Err(ChurnError::LengthMismatch {
                rows: predicted.len(),
                labels: actual.len(),
            });
        }

        let mut cm = ConfusionMatrix::default();
        for (&a, &p) in actual.iter().zip(predicted) {
            match (a.is_positive(), p.is_positive()) {
                (true, true) => cm.true_positive += 1,
                (false, true) => cm.false_positive += 1,
                (false, false) => cm.true_negative += 1,
                (true, false) => cm.false_negative += 1,
            }
        }
        Ok(cm)
    }

    pub fn total(&self) -> usize {
        self.true_positive + self.false_positive + self.true_negative + self.false_negative
    }

    /// Rows are actual (No, Yes), columns are predicted (No, Yes).
    pub fn as_rows(&self) -> [[usize; 2]; 2] {
        [
            [self.true_negative, self.false_positive],
            [self.false_negative, self.true_positive],
        ]
    }
}

/// Non-fatal condition recorded while computing metrics.
#[derive(Deserialize, Serialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum MetricWarning {
    /// Precision set to zero: nothing was predicted positive.
    NoPredictedPositives,
    /// Recall set to zero: the slice holds no actual positives.
    NoActualPositives,
}

impl fmt::Display for MetricWarning {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            MetricWarning::NoPredictedPositives => {
                f.write_str("precision is undefined (no predicted positives); reported as 0")
            }
            MetricWarning::NoActualPositives => {
                f.write_str("recall is undefined (no actual positives); reported as 0")
            }
        }
    }
}

/// Metrics of one model on one dataset.
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
pub struct EvaluationReport {
    pub model: String,
    pub partition: Partition,
    pub n_samples: usize,
    pub accuracy: f64,
    pub precision: f64,
    pub recall: f64,
    pub f1: f64,
    pub confusion_matrix: ConfusionMatrix,
    pub warnings: Vec<MetricWarning>,
}

impl EvaluationReport {
    pub fn from_confusion(model: &str, partition: Partition, cm: ConfusionMatrix) -> Self {
        let mut warnings = Vec::new();
        let predicted_pos = cm.true_positive + cm.false_positive;
        let actual_pos = cm.true_positive + cm.false_negative;

        let precision = if predicted_pos == 0 {
            warnings.push(MetricWarning::NoPredictedPositives);
            0.0
        } else {
            cm.true_positive as f64 / predicted_pos as f64
        };
        let recall = if actual_pos == 0 {
            warnings.push(MetricWarning::NoActualPositives);
            0.0
        } else {
            cm.true_positive as f64 / actual_pos as f64
        };
        let f1 = if precision + recall > 0.0 {
            2.0 * precision * recall / (precision + recall)
        } else {
            0.0
        };
        let accuracy = if cm.total() == 0 {
            0.0
        } else {
            (cm.true_positive + cm.true_negative) as f64 / cm.total() as f64
        };

        for w in &warnings {
            log::warn!("{} on {:?} data: {}", model, partition, w);
        }

        EvaluationReport {
            model: model.to_string(),
            partition,
            n_samples: cm.total(),
            accuracy,
            precision,
            recall,
            f1,
            confusion_matrix: cm,
            warnings,
        }
    }

    pub fn score(&self, scoring: Scoring) -> f64 {
        match scoring {
            Scoring::Accuracy => self.accuracy,
            Scoring::Precision => self.precision,
            Scoring::Recall => self.recall,
            Scoring::F1 => self.f1,
        }
    }

    pub fn log(&self, stage: &str) {
        log::info!(
            "[{}] {} on {} rows: accuracy {:.4}, precision {:.4}, recall {:.4}, f1 {:.4}",
            stage,
            self.model,
            self.n_samples,
            self.accuracy,
            self.precision,
            self.recall,
            self.f1
        );
        log::debug!("[{}] confusion matrix {:?}", stage, self.confusion_matrix.as_rows());
    }
}

/// Evaluate a fitted model against held-out data.
pub fn evaluate(model: &dyn Classifier, dataset: &Dataset) -> Result<EvaluationReport> {
    let predicted = model.predict(dataset.x())?;
    let cm = ConfusionMatrix::from_labels(dataset.y(), &predicted)?;
    Ok(EvaluationReport::from_confusion(
        &model.name(),
        dataset.partition(),
        cm,
    ))
}
