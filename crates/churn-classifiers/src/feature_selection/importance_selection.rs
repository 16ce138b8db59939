//! Threshold selection on learned feature importances.
//!
//! A feature is retained when its importance is strictly greater than the
//! threshold; a score equal to the threshold is dropped. Retained names keep
//! the column order of the matrix, and that order is the pruned schema every
//! later stage must use.
use serde::{Deserialize, Serialize};

use crate::data_handling::{Dataset, FeatureMatrix};
use crate::error::{ChurnError, Result};
use crate::models::classifier_trait::Classifier;

/// Default importance threshold.
pub const DEFAULT_THRESHOLD: f64 = 0.01;

/// Names of the features of `feature_matrix` whose importance in `model`
/// exceeds `threshold`, in column order.
pub fn select(
    model: &dyn Classifier,
    feature_matrix: &FeatureMatrix,
    threshold: f64,
) -> Result<Vec<String>> {
    let importances = model
        .feature_importances()
        .ok_or_else(|| ChurnError::ImportancesUnavailable(model.name()))?;
    feature_matrix.ensure_schema(model.feature_names())?;

    let retained: Vec<String> = importances
        .into_iter()
        .filter(|(_, score)| *score > threshold)
        .map(|(name, _)| name)
        .collect();

    if retained.is_empty() {
        return Err(ChurnError::EmptySelection { threshold });
    }
    Ok(retained)
}

/// Importances sorted from most to least important. Equal scores keep column order.
pub fn rank_importances(model: &dyn Classifier) -> Option<Vec<(String, f64)>> {
    let mut ranked = model.feature_importances()?;
    ranked.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
    Some(ranked)
}

/// A recorded pruned schema.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureSelection {
    pub threshold: f64,
    pub retained: Vec<String>,
    pub importances: Vec<(String, f64)>,
}

impl FeatureSelection {
    /// Run `select` and keep the importances it was based on.
    pub fn fit(model: &dyn Classifier, feature_matrix: &FeatureMatrix, threshold: f64) -> Result<Self> {
        let retained = select(model, feature_matrix, threshold)?;
        Ok(Self {
            threshold,
            retained,
            importances: model.feature_importances().unwrap_or_default(),
        })
    }

    /// Rebuild `dataset` with exactly the retained columns, in order.
    pub fn apply(&self, dataset: &Dataset) -> Result<Dataset> {
        dataset.select_features(&self.retained)
    }

    pub fn retained_importance(&self) -> f64 {
        self.importances
            .iter()
            .filter(|(name, _)| self.retained.contains(name))
            .map(|(_, s)| s)
            .sum()
    }
}
