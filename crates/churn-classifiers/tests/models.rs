//! Integration tests for training, prediction and evaluation.

mod common;

use churn_classifiers::config::{InputSchema, MaxFeatures, ModelConfig, ModelType};
use churn_classifiers::data_handling::{FeatureMatrix, Label, Partition};
use churn_classifiers::error::ChurnError;
use churn_classifiers::metrics::{evaluate, MetricWarning};
use churn_classifiers::models::bagging::{bag, bootstrap_sample, estimator_config};
use churn_classifiers::models::factory;
use churn_classifiers::preprocessing::{encode, scale_partitions, stratified_split};

fn small_forest() -> ModelType {
    ModelType::RandomForest {
        n_estimators: 15,
        max_depth: Some(6),
        min_samples_split: 2,
        min_samples_leaf: 1,
        max_features: MaxFeatures::Sqrt,
        bootstrap: true,
    }
}

fn small_gbdt() -> ModelType {
    ModelType::GBDT {
        max_depth: 3,
        num_boost_round: 20,
        learning_rate: 0.1,
        min_leaf_size: 1,
        debug: false,
        training_optimization_level: 2,
    }
}

fn all_kinds() -> Vec<ModelType> {
    vec![
        ModelType::logistic_regression(),
        small_forest(),
        small_gbdt(),
        ModelType::bagging(small_forest(), 3),
    ]
}

// ---------------------------------------------------------------------------
// Training and prediction
// ---------------------------------------------------------------------------

#[test]
fn every_model_kind_learns_a_separable_signal() {
    let train = common::separable(40);
    let mut test = common::separable(10);
    test = test.subset(&(0..test.len()).collect::<Vec<_>>(), Partition::Test);

    for kind in all_kinds() {
        let config = ModelConfig::new(7, kind);
        let model = factory::train(&config, &train, None).unwrap();
        let report = evaluate(model.as_ref(), &test).unwrap();
        assert!(
            report.accuracy >= 0.9,
            "{} accuracy {}",
            model.name(),
            report.accuracy
        );
        assert_eq!(report.partition, Partition::Test);
        assert_eq!(report.n_samples, test.len());

        let proba = model.predict_proba(test.x()).unwrap();
        assert!(proba.iter().all(|p| (0.0..=1.0).contains(p)));
    }
}

#[test]
fn churn_table_models_beat_the_majority_rate() {
    let ds = encode(&common::churn_table(120, 280, 5), &InputSchema::default()).unwrap();
    let (train, test) = stratified_split(&ds, 0.25, 5).unwrap();
    let (train, test, _) = scale_partitions(&train, &test).unwrap();
    let majority_rate = test.class_counts().no as f64 / test.len() as f64;

    for kind in [ModelType::logistic_regression(), small_forest(), small_gbdt()] {
        let model = factory::train(&ModelConfig::new(1, kind), &train, None).unwrap();
        let report = evaluate(model.as_ref(), &test).unwrap();
        assert!(
            report.accuracy > majority_rate,
            "{}: {} <= {}",
            model.name(),
            report.accuracy,
            majority_rate
        );
    }
}

#[test]
fn training_is_deterministic_for_a_seed() {
    let ds = encode(&common::churn_table(50, 100, 2), &InputSchema::default()).unwrap();
    let config = ModelConfig::new(3, small_forest());
    let a = factory::train(&config, &ds, None).unwrap();
    let b = factory::train(&config, &ds, None).unwrap();
    assert_eq!(a.predict_proba(ds.x()).unwrap(), b.predict_proba(ds.x()).unwrap());
    assert_eq!(a.feature_importances(), b.feature_importances());
}

#[test]
fn prediction_rejects_a_different_schema() {
    let ds = encode(&common::churn_table(20, 40, 2), &InputSchema::default()).unwrap();
    let mut reversed: Vec<String> = ds.feature_names().to_vec();
    reversed.reverse();
    let shuffled = ds.x().select_columns(&reversed).unwrap();

    for kind in all_kinds() {
        let model = factory::train(&ModelConfig::new(0, kind), &ds, None).unwrap();
        assert!(matches!(model.predict(&shuffled), Err(ChurnError::Schema(_))));
    }
}

#[test]
fn training_on_zero_rows_fails() {
    let empty = common::separable(0);
    assert!(matches!(
        factory::train(&ModelConfig::default(), &empty, None),
        Err(ChurnError::EmptyDataset(_))
    ));
}

#[test]
fn forest_on_a_matrix_without_columns_predicts_the_class_prior() {
    let x = FeatureMatrix::new(Vec::new(), ndarray::Array2::zeros((6, 0))).unwrap();
    let y = vec![Label::No, Label::No, Label::No, Label::No, Label::Yes, Label::Yes];
    let ds = churn_classifiers::data_handling::Dataset::new(x, y, Partition::Train).unwrap();

    let forest = ModelType::RandomForest {
        n_estimators: 3,
        max_depth: None,
        min_samples_split: 2,
        min_samples_leaf: 1,
        max_features: MaxFeatures::Sqrt,
        bootstrap: false,
    };
    let model = factory::train(&ModelConfig::new(0, forest), &ds, None).unwrap();
    let proba = model.predict_proba(ds.x()).unwrap();
    assert!(proba.iter().all(|p| (p - 2.0 / 6.0).abs() < 1e-12));
    assert!(model.predict(ds.x()).unwrap().iter().all(|&l| l == Label::No));
}

// ---------------------------------------------------------------------------
// Importances
// ---------------------------------------------------------------------------

#[test]
fn tree_importances_are_normalised_in_schema_order() {
    let ds = encode(&common::churn_table(60, 140, 9), &InputSchema::default()).unwrap();
    for kind in [small_forest(), small_gbdt(), ModelType::bagging(small_gbdt(), 2)] {
        let model = factory::train(&ModelConfig::new(4, kind), &ds, None).unwrap();
        let importances = model.feature_importances().unwrap();
        let names: Vec<&str> = importances.iter().map(|(n, _)| n.as_str()).collect();
        let expected: Vec<&str> = ds.feature_names().iter().map(String::as_str).collect();
        assert_eq!(names, expected);

        let total: f64 = importances.iter().map(|(_, s)| s).sum();
        assert!((total - 1.0).abs() < 1e-9, "{} sums to {}", model.name(), total);
        assert!(importances.iter().all(|(_, s)| *s >= 0.0));
    }
}

#[test]
fn logistic_regression_has_no_importances() {
    let model = factory::train(
        &ModelConfig::new(0, ModelType::logistic_regression()),
        &common::separable(10),
        None,
    )
    .unwrap();
    assert!(model.feature_importances().is_none());
}

// ---------------------------------------------------------------------------
// Bagging
// ---------------------------------------------------------------------------

#[test]
fn single_estimator_bag_matches_its_bootstrap_model() {
    let ds = encode(&common::churn_table(40, 80, 4), &InputSchema::default()).unwrap();
    let config = ModelConfig::new(11, small_forest());

    let bagged = bag(&config, None, &ds, 1).unwrap();
    let single = factory::train(
        &estimator_config(&config, 0),
        &bootstrap_sample(&ds, config.seed, 0),
        None,
    )
    .unwrap();

    assert_eq!(bagged.predict(ds.x()).unwrap(), single.predict(ds.x()).unwrap());
}

#[test]
fn bagging_is_deterministic_and_rejects_zero_estimators() {
    let ds = common::separable(20);
    let config = ModelConfig::new(5, small_gbdt());
    let a = bag(&config, None, &ds, 4).unwrap();
    let b = bag(&config, None, &ds, 4).unwrap();
    assert_eq!(a.predict_proba(ds.x()).unwrap(), b.predict_proba(ds.x()).unwrap());
    assert_eq!(a.name(), "bagging(gbdt)");

    assert!(matches!(
        bag(&config, None, &ds, 0),
        Err(ChurnError::InvalidParameter(_))
    ));
}

// ---------------------------------------------------------------------------
// Metrics
// ---------------------------------------------------------------------------

#[test]
fn degenerate_slice_reports_zero_with_warnings() {
    let train = common::separable(20);
    let model = factory::train(
        &ModelConfig::new(0, ModelType::logistic_regression()),
        &train,
        None,
    )
    .unwrap();

    let only_no = train.subset(&train.indices_of(Label::No), Partition::Test);
    let report = evaluate(model.as_ref(), &only_no).unwrap();

    assert_eq!(report.accuracy, 1.0);
    assert_eq!(report.precision, 0.0);
    assert_eq!(report.recall, 0.0);
    assert_eq!(report.f1, 0.0);
    assert!(report.warnings.contains(&MetricWarning::NoPredictedPositives));
    assert!(report.warnings.contains(&MetricWarning::NoActualPositives));
    assert_eq!(report.confusion_matrix.as_rows(), [[20, 0], [0, 0]]);
}

#[test]
fn evaluation_on_a_mismatched_matrix_fails() {
    let train = common::separable(5);
    let model = factory::train(&ModelConfig::default(), &train, None).unwrap();
    let other = FeatureMatrix::new(
        vec!["other".to_string()],
        ndarray::Array2::zeros((2, 1)),
    )
    .unwrap();
    assert!(model.predict(&other).is_err());
}
