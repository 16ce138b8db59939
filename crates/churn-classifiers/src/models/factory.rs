use crate::config::{HyperparameterConfig, ModelConfig, ModelType};
use crate::data_handling::Dataset;
use crate::error::{ChurnError, Result};
use crate::models::bagging::BaggingClassifier;
use crate::models::classifier_trait::Classifier;
use crate::models::gbdt::{BoostingParams, GBDTClassifier};
use crate::models::logistic::LogisticRegressionClassifier;
use crate::models::random_forest::{ForestParams, RandomForestClassifier};

/// Fit a new classifier of the kind described by `config` on `dataset`.
///
/// `params`, when given, are applied on top of `config` first. The dataset is
/// only read.
pub fn train(
    config: &ModelConfig,
    dataset: &Dataset,
    params: Option<&HyperparameterConfig>,
) -> Result<Box<dyn Classifier>> {
    let config = match params {
        Some(p) => config.with_params(p)?,
        None => config.clone(),
    };

    if dataset.is_empty() {
        return Err(ChurnError::EmptyDataset(format!(
            "cannot train {} on zero rows",
            config.name()
        )));
    }

    log::debug!(
        "Training {} on {} rows x {} features",
        config.name(),
        dataset.len(),
        dataset.x().ncols()
    );

    let model: Box<dyn Classifier> = match &config.model_type {
        ModelType::LogisticRegression {
            c,
            learning_rate,
            max_iter,
        } => Box::new(LogisticRegressionClassifier::fit(
            dataset,
            *c,
            *learning_rate,
            *max_iter,
        )?),
        ModelType::RandomForest {
            n_estimators,
            max_depth,
            min_samples_split,
            min_samples_leaf,
            max_features,
            bootstrap,
        } => {
            let params = ForestParams {
                n_estimators: *n_estimators,
                max_depth: *max_depth,
                min_samples_split: *min_samples_split,
                min_samples_leaf: *min_samples_leaf,
                max_features: *max_features,
                bootstrap: *bootstrap,
            };
            Box::new(RandomForestClassifier::fit(dataset, params, config.seed)?)
        }
        ModelType::GBDT {
            max_depth,
            num_boost_round,
            learning_rate,
            min_leaf_size,
            debug,
            training_optimization_level,
        } => {
            let params = BoostingParams {
                max_depth: *max_depth,
                num_boost_round: *num_boost_round,
                learning_rate: *learning_rate,
                min_leaf_size: *min_leaf_size,
                debug: *debug,
                training_optimization_level: *training_optimization_level,
            };
            Box::new(GBDTClassifier::fit(dataset, params, config.seed)?)
        }
        ModelType::Bagging { base, n_estimators } => {
            let base = ModelConfig::new(config.seed, (**base).clone());
            Box::new(BaggingClassifier::fit(&base, dataset, *n_estimators)?)
        }
    };

    Ok(model)
}
