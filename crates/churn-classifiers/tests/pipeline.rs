//! End-to-end tests for the staged training driver.

mod common;

use churn_classifiers::config::{BalancingChoice, MaxFeatures, ModelType, PipelineConfig, SearchConfig};
use churn_classifiers::error::ChurnError;
use churn_classifiers::metrics::Scoring;
use churn_classifiers::pipeline::{run, split_and_scale};
use churn_classifiers::preprocessing::encode;

fn tiny_config() -> PipelineConfig {
    PipelineConfig {
        seed: 3,
        baseline_models: vec![
            ModelType::logistic_regression(),
            ModelType::RandomForest {
                n_estimators: 10,
                max_depth: Some(5),
                min_samples_split: 2,
                min_samples_leaf: 1,
                max_features: MaxFeatures::Sqrt,
                bootstrap: true,
            },
            ModelType::GBDT {
                max_depth: 3,
                num_boost_round: 15,
                learning_rate: 0.1,
                min_leaf_size: 1,
                debug: false,
                training_optimization_level: 2,
            },
        ],
        search: SearchConfig {
            n_iter: 2,
            cv_folds: 2,
            scoring: Scoring::Accuracy,
            param_space: None,
        },
        bagging_estimators: 3,
        ..PipelineConfig::default()
    }
}

// ---------------------------------------------------------------------------
// Full run
// ---------------------------------------------------------------------------

#[test]
fn full_run_produces_every_stage_and_a_usable_model() {
    let table = common::churn_table(90, 210, 17);
    let config = tiny_config();
    let outcome = run(&table, &config).unwrap();
    let report = &outcome.report;

    let stages: Vec<&str> = report.stages.iter().map(|s| s.stage.as_str()).collect();
    let mut expected = vec!["baseline"; 3];
    expected.extend(vec!["balanced_oversample"; 3]);
    expected.extend(vec!["balanced_undersample"; 3]);
    expected.extend(["tuned", "pruned", "bagged"]);
    assert_eq!(stages, expected);

    // the final model runs on the pruned schema only
    assert_eq!(outcome.model.feature_names(), outcome.schema.as_slice());
    assert_eq!(report.stage("bagged").unwrap().features, outcome.schema);
    assert_eq!(report.stage("pruned").unwrap().features, outcome.schema);
    assert!(outcome.model.name().starts_with("bagging("));

    let scaler = outcome.scaler.as_ref().unwrap();
    assert_eq!(scaler.feature_names, outcome.schema);

    let encoded = encode(&table, &config.schema).unwrap();
    let fresh = scaler.transform(&encoded.x().select_columns(&outcome.schema).unwrap()).unwrap();
    let predictions = outcome.model.predict(&fresh).unwrap();
    assert_eq!(predictions.len(), table.nrows());

    if let Some(selection) = &report.selection {
        assert_eq!(selection.retained, outcome.schema);
    }
    assert!(report.search.candidates.len() <= 2);
    for stage in &report.stages {
        assert!((0.0..=1.0).contains(&stage.evaluation.accuracy));
    }
}

#[test]
fn report_serializes_to_json() {
    let table = common::churn_table(40, 100, 2);
    let config = PipelineConfig {
        balancing: BalancingChoice::Undersample,
        ..tiny_config()
    };
    let outcome = run(&table, &config).unwrap();

    let json = serde_json::to_value(&outcome.report).unwrap();
    assert_eq!(json["seed"], 3);
    assert!(json["stages"].as_array().unwrap().len() >= 6);
    assert!(json["best_balanced"].as_str().unwrap().ends_with("(undersample)"));
    assert!(outcome.report.stage("balanced_oversample").is_none());
}

#[test]
fn unscaled_runs_carry_no_scaler() {
    let config = PipelineConfig {
        scale_features: false,
        ..tiny_config()
    };
    let ds = encode(&common::churn_table(20, 40, 1), &config.schema).unwrap();
    let split = split_and_scale(&ds, &config).unwrap();
    assert!(split.scaler.is_none());
    assert_eq!(split.train.x().values()[(1, 1)], {
        let id = split.train.row_ids()[1];
        ds.x().values()[(id, 1)]
    });
}

// ---------------------------------------------------------------------------
// Invalid input
// ---------------------------------------------------------------------------

#[test]
fn invalid_configuration_is_rejected_before_training() {
    let table = common::churn_table(10, 20, 1);
    let config = PipelineConfig {
        split_fraction: 1.0,
        ..tiny_config()
    };
    assert!(matches!(run(&table, &config), Err(ChurnError::InvalidParameter(_))));
}

#[test]
fn missing_label_column_fails_the_run() {
    let mut table = common::churn_table(10, 20, 1);
    table.columns[4] = "status".to_string();
    assert!(matches!(run(&table, &tiny_config()), Err(ChurnError::Schema(_))));
}
