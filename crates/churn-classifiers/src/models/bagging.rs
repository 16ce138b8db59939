//! Bootstrap aggregation over any supported model kind.
//!
//! Estimator `i` trains on a bootstrap sample drawn from a ChaCha stream
//! keyed by `(seed, i)` and uses `seed + i` as its own model seed, so the
//! ensemble does not depend on how rayon schedules the work.
//!
//! Prediction is a majority vote of hard labels. An even split goes to
//! `No`, the first label in sorted label order.
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rayon::prelude::*;

use crate::config::{HyperparameterConfig, ModelConfig};
use crate::data_handling::{Dataset, FeatureMatrix, Label, LabelVector};
use crate::error::{ChurnError, Result};
use crate::models::classifier_trait::{named_importances, Classifier};
use crate::models::factory;

pub struct BaggingClassifier {
    base_name: String,
    feature_names: Vec<String>,
    estimators: Vec<Box<dyn Classifier>>,
}

/// Row positions of the bootstrap sample for estimator `index`.
pub fn bootstrap_indices(n_samples: usize, seed: u64, index: usize) -> Vec<usize> {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    rng.set_stream(index as u64);
    (0..n_samples).map(|_| rng.gen_range(0..n_samples)).collect()
}

/// Bootstrap sample (same size as `dataset`, drawn with replacement).
pub fn bootstrap_sample(dataset: &Dataset, seed: u64, index: usize) -> Dataset {
    let rows = bootstrap_indices(dataset.len(), seed, index);
    dataset.subset(&rows, dataset.partition())
}

/// Model config used by estimator `index`.
pub fn estimator_config(base: &ModelConfig, index: usize) -> ModelConfig {
    ModelConfig::new(base.seed.wrapping_add(index as u64), base.model_type.clone())
}

/// Bag `n_estimators` copies of `base` (with `params` applied) over `dataset`.
pub fn bag(
    base: &ModelConfig,
    params: Option<&HyperparameterConfig>,
    dataset: &Dataset,
    n_estimators: usize,
) -> Result<Box<dyn Classifier>> {
    let base = match params {
        Some(p) => base.with_params(p)?,
        None => base.clone(),
    };
    Ok(Box::new(BaggingClassifier::fit(&base, dataset, n_estimators)?))
}

impl BaggingClassifier {
    pub fn fit(base: &ModelConfig, dataset: &Dataset, n_estimators: usize) -> Result<Self> {
        if n_estimators == 0 {
            return Err(ChurnError::InvalidParameter(
                "bagging needs at least one estimator".to_string(),
            ));
        }

        let estimators = (0..n_estimators)
            .into_par_iter()
            .map(|i| {
                let sample = bootstrap_sample(dataset, base.seed, i);
                factory::train(&estimator_config(base, i), &sample, None)
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            base_name: base.name(),
            feature_names: dataset.feature_names().to_vec(),
            estimators,
        })
    }

    pub fn n_estimators(&self) -> usize {
        self.estimators.len()
    }

    /// Number of `Yes` votes per row.
    fn yes_votes(&self, x: &FeatureMatrix) -> Result<Vec<usize>> {
        x.ensure_schema(&self.feature_names)?;
        let mut votes = vec![0usize; x.nrows()];
        for estimator in &self.estimators {
            for (v, label) in votes.iter_mut().zip(estimator.predict(x)?) {
                if label.is_positive() {
                    *v += 1;
                }
            }
        }
        Ok(votes)
    }
}

impl Classifier for BaggingClassifier {
    /// Share of estimators voting `Yes`.
    fn predict_proba(&self, x: &FeatureMatrix) -> Result<Vec<f64>> {
        let n = self.estimators.len() as f64;
        Ok(self
            .yes_votes(x)?
            .into_iter()
            .map(|v| v as f64 / n)
            .collect())
    }

    fn predict(&self, x: &FeatureMatrix) -> Result<LabelVector> {
        let n = self.estimators.len();
        Ok(self
            .yes_votes(x)?
            .into_iter()
            .map(|v| if 2 * v > n { Label::Yes } else { Label::No })
            .collect())
    }

    fn feature_names(&self) -> &[String] {
        &self.feature_names
    }

    /// Mean of the estimators' importances, when all of them have some.
    fn feature_importances(&self) -> Option<Vec<(String, f64)>> {
        let mut sum = vec![0.0; self.feature_names.len()];
        for estimator in &self.estimators {
            let scores = estimator.feature_importances()?;
            for (acc, (_, s)) in sum.iter_mut().zip(scores) {
                *acc += s;
            }
        }
        Some(named_importances(&self.feature_names, &sum))
    }

    fn name(&self) -> String {
        format!("bagging({})", self.base_name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bootstrap_indices_are_keyed_by_seed_and_index() {
        let a = bootstrap_indices(50, 7, 0);
        assert_eq!(a, bootstrap_indices(50, 7, 0));
        assert_ne!(a, bootstrap_indices(50, 7, 1));
        assert_ne!(a, bootstrap_indices(50, 8, 0));
        assert!(a.iter().all(|&i| i < 50));
    }

    #[test]
    fn estimator_zero_keeps_the_base_seed() {
        let base = ModelConfig::default();
        assert_eq!(estimator_config(&base, 0), base);
        assert_eq!(estimator_config(&base, 3).seed, base.seed + 3);
    }
}
