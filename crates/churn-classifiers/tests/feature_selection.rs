//! Integration tests for importance-threshold feature selection.

mod common;

use churn_classifiers::config::{InputSchema, ModelConfig, ModelType};
use churn_classifiers::data_handling::FeatureMatrix;
use churn_classifiers::error::{ChurnError, Result};
use churn_classifiers::feature_selection::{rank_importances, select, FeatureSelection};
use churn_classifiers::models::classifier_trait::Classifier;
use churn_classifiers::models::factory;
use churn_classifiers::preprocessing::encode;

/// Classifier with fixed importances.
struct FixedImportances {
    names: Vec<String>,
    scores: Vec<f64>,
}

impl FixedImportances {
    fn new(pairs: &[(&str, f64)]) -> Self {
        Self {
            names: pairs.iter().map(|(n, _)| n.to_string()).collect(),
            scores: pairs.iter().map(|(_, s)| *s).collect(),
        }
    }

    fn matrix(&self) -> FeatureMatrix {
        FeatureMatrix::new(self.names.clone(), ndarray::Array2::zeros((1, self.names.len()))).unwrap()
    }
}

impl Classifier for FixedImportances {
    fn predict_proba(&self, x: &FeatureMatrix) -> Result<Vec<f64>> {
        x.ensure_schema(&self.names)?;
        Ok(vec![0.0; x.nrows()])
    }

    fn feature_names(&self) -> &[String] {
        &self.names
    }

    fn feature_importances(&self) -> Option<Vec<(String, f64)>> {
        Some(self.names.iter().cloned().zip(self.scores.iter().copied()).collect())
    }

    fn name(&self) -> String {
        "fixed".to_string()
    }
}

// ---------------------------------------------------------------------------
// Threshold
// ---------------------------------------------------------------------------

#[test]
fn retains_features_strictly_above_threshold_in_column_order() {
    let model = FixedImportances::new(&[
        ("a", 0.30),
        ("b", 0.01),
        ("c", 0.005),
        ("d", 0.60),
        ("e", 0.085),
    ]);
    let retained = select(&model, &model.matrix(), 0.01).unwrap();
    assert_eq!(retained, vec!["a", "d", "e"]);
}

#[test]
fn nothing_above_threshold_is_an_empty_selection() {
    let model = FixedImportances::new(&[("a", 0.5), ("b", 0.5)]);
    assert!(matches!(
        select(&model, &model.matrix(), 0.5),
        Err(ChurnError::EmptySelection { .. })
    ));
}

#[test]
fn selection_checks_the_matrix_schema() {
    let model = FixedImportances::new(&[("a", 0.5), ("b", 0.5)]);
    let other = FeatureMatrix::new(vec!["b".into(), "a".into()], ndarray::Array2::zeros((1, 2))).unwrap();
    assert!(matches!(select(&model, &other, 0.1), Err(ChurnError::Schema(_))));
}

#[test]
fn linear_models_have_no_importances_to_select_on() {
    let ds = common::separable(10);
    let model = factory::train(
        &ModelConfig::new(0, ModelType::logistic_regression()),
        &ds,
        None,
    )
    .unwrap();
    assert!(matches!(
        select(model.as_ref(), ds.x(), 0.01),
        Err(ChurnError::ImportancesUnavailable(_))
    ));
    assert!(rank_importances(model.as_ref()).is_none());
}

// ---------------------------------------------------------------------------
// Recorded selection
// ---------------------------------------------------------------------------

#[test]
fn ranking_sorts_by_descending_importance() {
    let model = FixedImportances::new(&[("a", 0.2), ("b", 0.5), ("c", 0.2), ("d", 0.1)]);
    let ranked = rank_importances(&model).unwrap();
    let names: Vec<&str> = ranked.iter().map(|(n, _)| n.as_str()).collect();
    assert_eq!(names, vec!["b", "a", "c", "d"]);
}

#[test]
fn pruned_dataset_carries_exactly_the_retained_columns() {
    let ds = encode(&common::churn_table(60, 140, 12), &InputSchema::default()).unwrap();
    let model = factory::train(&ModelConfig::new(3, ModelType::random_forest()), &ds, None).unwrap();

    let selection = FeatureSelection::fit(model.as_ref(), ds.x(), 0.01).unwrap();
    assert!(selection.retained_importance() <= 1.0 + 1e-9);
    assert!(selection.retained.iter().any(|n| n == "support_calls"));

    let pruned = selection.apply(&ds).unwrap();
    assert_eq!(pruned.feature_names(), selection.retained.as_slice());
    assert_eq!(pruned.len(), ds.len());

    let retrained = factory::train(&ModelConfig::new(3, ModelType::random_forest()), &pruned, None).unwrap();
    assert_eq!(retrained.feature_names(), selection.retained.as_slice());
    assert!(retrained.predict(pruned.x()).is_ok());
    if selection.retained.len() < ds.x().ncols() {
        assert!(retrained.predict(ds.x()).is_err());
    }
}
