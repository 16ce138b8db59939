use crate::data_handling::{FeatureMatrix, Label, LabelVector};
use crate::error::Result;

/// A fitted binary classifier.
///
/// Implementations are immutable once fitted: training a model always
/// produces a new value. Every model records the ordered feature names it
/// was trained on and rejects matrices with a different schema.
pub trait Classifier: Send + Sync {
    /// Probability of the positive label (`Yes`) for every row of `x`.
    fn predict_proba(&self, x: &FeatureMatrix) -> Result<Vec<f64>>;

    /// Hard labels. A probability of exactly 0.5 maps to `No`.
    fn predict(&self, x: &FeatureMatrix) -> Result<LabelVector> {
        Ok(self
            .predict_proba(x)?
            .into_iter()
            .map(|p| if p > 0.5 { Label::Yes } else { Label::No })
            .collect())
    }

    /// Column names, in order, that `x` must carry.
    fn feature_names(&self) -> &[String];

    /// `(feature, score)` pairs in schema order, summing to 1.0. `None` for
    /// model families without a notion of importance.
    fn feature_importances(&self) -> Option<Vec<(String, f64)>> {
        None
    }

    /// Human readable model name
    fn name(&self) -> String;
}

/// Pair normalised scores with names. Falls back to uniform weights when
/// every score is zero so the result still sums to 1.0.
pub(crate) fn named_importances(names: &[String], raw: &[f64]) -> Vec<(String, f64)> {
    let total: f64 = raw.iter().sum();
    let n = names.len().max(1) as f64;
    names
        .iter()
        .zip(raw)
        .map(|(name, &v)| {
            let score = if total > 0.0 { v / total } else { 1.0 / n };
            (name.clone(), score)
        })
        .collect()
}
