use std::io::Write;
use std::path::Path;

use churn_classifiers::config::{BalancingChoice, ModelType, PipelineConfig};
use churn_classifiers::metrics::Scoring;
use churn_cli::train::{
    default_report_path, load_pipeline_config, train_from_csv, write_report, TrainOverrides,
};

// ---------------------------------------------------------------------------
// Config loading
// ---------------------------------------------------------------------------

#[test]
fn partial_config_fills_in_defaults() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    write!(
        file,
        r#"{{
            "seed": 7,
            "balancing": "undersample",
            "search": {{ "n_iter": 4, "scoring": "f1" }},
            "baseline_models": [{{ "logistic_regression": {{ "c": 0.5, "learning_rate": 0.1, "max_iter": 50 }} }}]
        }}"#
    )
    .unwrap();

    let config = load_pipeline_config(file.path()).unwrap();
    assert_eq!(config.seed, 7);
    assert_eq!(config.balancing, BalancingChoice::Undersample);
    assert_eq!(config.search.n_iter, 4);
    assert_eq!(config.search.cv_folds, 3);
    assert_eq!(config.search.scoring, Scoring::F1);
    assert_eq!(config.split_fraction, 0.2);
    assert_eq!(config.schema.label_column, "churned_status");
    assert!(matches!(
        config.baseline_models.as_slice(),
        [ModelType::LogisticRegression { max_iter: 50, .. }]
    ));
}

#[test]
fn default_config_round_trips_through_json() {
    let config = PipelineConfig::default();
    let json = serde_json::to_string(&config).unwrap();
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(json.as_bytes()).unwrap();
    assert_eq!(load_pipeline_config(file.path()).unwrap(), config);
}

#[test]
fn unreadable_or_malformed_config_is_an_error() {
    assert!(load_pipeline_config("/definitely/not/here.json").is_err());

    let mut file = tempfile::NamedTempFile::new().unwrap();
    write!(file, "{{ not json").unwrap();
    let err = load_pipeline_config(file.path()).unwrap_err();
    assert!(format!("{:#}", err).contains("Failed to parse config"));
}

// ---------------------------------------------------------------------------
// Overrides and paths
// ---------------------------------------------------------------------------

#[test]
fn overrides_replace_only_given_values() {
    let mut config = PipelineConfig::default();
    let overrides = TrainOverrides {
        seed: Some(99),
        cv_folds: Some(5),
        scoring: Some(Scoring::Recall),
        no_scale: true,
        ..TrainOverrides::default()
    };
    overrides.apply(&mut config);

    assert_eq!(config.seed, 99);
    assert_eq!(config.search.cv_folds, 5);
    assert_eq!(config.search.scoring, Scoring::Recall);
    assert!(!config.scale_features);
    assert_eq!(config.search.n_iter, 10);
    assert_eq!(config.bagging_estimators, 10);
}

#[test]
fn report_path_sits_next_to_input() {
    assert_eq!(
        default_report_path(Path::new("/data/customers.csv")),
        Path::new("/data/customers_report.json")
    );
}

// ---------------------------------------------------------------------------
// End to end
// ---------------------------------------------------------------------------

fn write_churn_csv(path: &Path) {
    let mut file = std::fs::File::create(path).unwrap();
    writeln!(file, "customer_id,tenure,support_calls,country,churned_status").unwrap();
    let countries = ["France", "Germany", "Spain"];
    for i in 0..120 {
        let churned = i % 3 == 0;
        let calls = if churned { 6 + i % 3 } else { i % 3 };
        let tenure = if i % 40 == 7 { String::new() } else { format!("{}", 10 + (i * 7) % 50) };
        writeln!(
            file,
            "c{},{},{},{},{}",
            i,
            tenure,
            calls,
            countries[i % countries.len()],
            if churned { "Yes" } else { "No" }
        )
        .unwrap();
    }
}

#[test]
fn trains_from_csv_and_writes_report() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("customers.csv");
    write_churn_csv(&input);

    let mut config = PipelineConfig {
        baseline_models: vec![ModelType::logistic_regression(), ModelType::gbdt()],
        bagging_estimators: 2,
        ..PipelineConfig::default()
    };
    config.schema.ignore_columns = vec!["customer_id".to_string()];
    config.search.n_iter = 2;
    config.search.cv_folds = 2;

    let outcome = train_from_csv(&input, &config).unwrap();
    assert!(!outcome.schema.iter().any(|c| c == "customer_id"));

    let report_path = default_report_path(&input);
    write_report(&report_path, &input, &config, &outcome).unwrap();

    let written: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&report_path).unwrap()).unwrap();
    assert_eq!(written["schema"].as_array().unwrap().len(), outcome.schema.len());
    assert_eq!(written["config"]["seed"], 42);
    assert!(written["report"]["stages"].as_array().unwrap().len() >= 7);
}

#[test]
fn invalid_config_fails_before_reading() {
    let config = PipelineConfig {
        bagging_estimators: 0,
        ..PipelineConfig::default()
    };
    assert!(train_from_csv("/no/such/file.csv", &config).is_err());
}
