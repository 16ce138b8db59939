//! Driver composing the named training stages.
//!
//! Stages, in order: `baseline` (models on the prepared split),
//! `balanced_<strategy>` (models on each balanced variant), `tuned` (search
//! on the best balanced model), `pruned` (retrain on the selected features)
//! and `bagged` (bagging ensemble of the pruned model). Each stage reads the
//! previous stage's values and returns new ones.
//!
//! Scaling happens at the same point in every branch: right after the
//! train/test split, fitted on the train side only.
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::balancing::{balance, BalanceStrategy};
use crate::config::{HyperparameterConfig, ModelConfig, ModelType, PipelineConfig};
use crate::data_handling::{Dataset, RawTable};
use crate::error::{ChurnError, Result};
use crate::feature_selection::{rank_importances, FeatureSelection};
use crate::metrics::{evaluate, EvaluationReport, Scoring};
use crate::models::bagging::bag;
use crate::models::classifier_trait::Classifier;
use crate::models::factory;
use crate::preprocessing::{encode, scale_partitions, stratified_split, Scaler};
use crate::search::{default_param_space, search, CandidateScore};

/// A train/test pair and the scaler fitted on its train side.
#[derive(Debug, Clone)]
pub struct SplitData {
    pub train: Dataset,
    pub test: Dataset,
    pub scaler: Option<Scaler>,
}

/// Split `dataset` and, when enabled, scale both sides with a scaler fitted on train.
pub fn split_and_scale(dataset: &Dataset, config: &PipelineConfig) -> Result<SplitData> {
    let (train, test) = stratified_split(dataset, config.split_fraction, config.seed)?;
    if !config.scale_features {
        return Ok(SplitData {
            train,
            test,
            scaler: None,
        });
    }
    let (train, test, scaler) = scale_partitions(&train, &test)?;
    Ok(SplitData {
        train,
        test,
        scaler: Some(scaler),
    })
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StageReport {
    pub stage: String,
    pub model: String,
    pub features: Vec<String>,
    pub evaluation: EvaluationReport,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchSummary {
    pub model: String,
    pub scoring: Scoring,
    pub best_config: HyperparameterConfig,
    pub best_score: f64,
    pub candidates: Vec<CandidateScore>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineReport {
    pub generated_at: DateTime<Utc>,
    pub seed: u64,
    pub stages: Vec<StageReport>,
    pub best_balanced: String,
    pub search: SearchSummary,
    /// `None` when selection fell back to the full feature set.
    pub selection: Option<FeatureSelection>,
    pub importances: Option<Vec<(String, f64)>>,
}

impl PipelineReport {
    pub fn stage(&self, name: &str) -> Option<&StageReport> {
        self.stages.iter().find(|s| s.stage == name)
    }
}

/// Final artifact of a run.
pub struct PipelineOutcome {
    pub report: PipelineReport,
    /// Bagged model over the pruned schema.
    pub model: Box<dyn Classifier>,
    pub schema: Vec<String>,
    /// Scaler restricted to `schema`, if scaling was enabled.
    pub scaler: Option<Scaler>,
}

fn evaluate_stage(stage: &str, model: &dyn Classifier, test: &Dataset) -> Result<StageReport> {
    let evaluation = evaluate(model, test)?;
    evaluation.log(stage);
    Ok(StageReport {
        stage: stage.to_string(),
        model: model.name(),
        features: model.feature_names().to_vec(),
        evaluation,
    })
}

fn train_and_evaluate(
    stage: &str,
    config: &ModelConfig,
    split: &SplitData,
) -> Result<(Box<dyn Classifier>, StageReport)> {
    let model = factory::train(config, &split.train, None)?;
    let report = evaluate_stage(stage, model.as_ref(), &split.test)?;
    Ok((model, report))
}

struct BalancedWinner {
    strategy: BalanceStrategy,
    model_type: ModelType,
    split: SplitData,
    score: f64,
}

/// Run one full training pass over `raw`.
pub fn run(raw: &RawTable, config: &PipelineConfig) -> Result<PipelineOutcome> {
    config.validate()?;
    let scoring = config.search.scoring;
    let mut stages = Vec::new();

    // prepare
    let encoded = encode(raw, &config.schema)?;
    encoded.log_summary("encoded");
    let base = split_and_scale(&encoded, config)?;
    base.train.log_summary("baseline train");
    base.test.log_summary("baseline test");

    // baseline
    for model_type in &config.baseline_models {
        let (_, report) = train_and_evaluate("baseline", &config.model(model_type), &base)?;
        stages.push(report);
    }

    // balanced variants, split after resampling
    let mut winner: Option<BalancedWinner> = None;
    for strategy in config.balancing.strategies() {
        let balanced = balance(&encoded, strategy, config.seed)?;
        let split = split_and_scale(&balanced, config)?;
        let stage = format!("balanced_{}", strategy);

        for model_type in &config.baseline_models {
            let (_, report) = train_and_evaluate(&stage, &config.model(model_type), &split)?;
            let score = report.evaluation.score(scoring);
            if winner.as_ref().map_or(true, |w| score > w.score) {
                winner = Some(BalancedWinner {
                    strategy,
                    model_type: model_type.clone(),
                    split: split.clone(),
                    score,
                });
            }
            stages.push(report);
        }
    }
    let winner = winner.ok_or_else(|| {
        ChurnError::InvalidParameter("no balanced variant was trained".to_string())
    })?;
    let best_balanced = format!("{} ({})", winner.model_type.name(), winner.strategy);
    log::info!("best balanced model: {} with {:?} {:.4}", best_balanced, scoring, winner.score);

    // tune
    let base_config = config.model(&winner.model_type);
    let space = config
        .search
        .param_space
        .clone()
        .unwrap_or_else(|| default_param_space(&winner.model_type));
    let result = search(
        &base_config,
        &winner.split.train,
        &space,
        config.search.n_iter,
        config.search.cv_folds,
        scoring,
    )?;
    stages.push(evaluate_stage("tuned", result.best_model.as_ref(), &winner.split.test)?);
    let tuned_config = base_config.with_params(&result.best_config)?;

    // select features, falling back to the full set
    let importances = rank_importances(result.best_model.as_ref());
    let selection = match FeatureSelection::fit(
        result.best_model.as_ref(),
        winner.split.train.x(),
        config.selection_threshold,
    ) {
        Ok(selection) => {
            log::info!(
                "retained {} of {} features (importance > {})",
                selection.retained.len(),
                winner.split.train.x().ncols(),
                config.selection_threshold
            );
            Some(selection)
        }
        Err(e @ (ChurnError::EmptySelection { .. } | ChurnError::ImportancesUnavailable(_))) => {
            log::warn!("{}; keeping all features", e);
            None
        }
        Err(e) => return Err(e),
    };
    let schema: Vec<String> = match &selection {
        Some(s) => s.retained.clone(),
        None => winner.split.train.feature_names().to_vec(),
    };
    let pruned_train = winner.split.train.select_features(&schema)?;
    let pruned_test = winner.split.test.select_features(&schema)?;

    let pruned_model = factory::train(&tuned_config, &pruned_train, None)?;
    stages.push(evaluate_stage("pruned", pruned_model.as_ref(), &pruned_test)?);

    // bag
    let bagged = bag(&tuned_config, None, &pruned_train, config.bagging_estimators)?;
    stages.push(evaluate_stage("bagged", bagged.as_ref(), &pruned_test)?);

    let scaler = match &winner.split.scaler {
        Some(s) => Some(s.select(&schema)?),
        None => None,
    };

    let report = PipelineReport {
        generated_at: Utc::now(),
        seed: config.seed,
        stages,
        best_balanced,
        search: SearchSummary {
            model: base_config.name(),
            scoring,
            best_config: result.best_config,
            best_score: result.best_score,
            candidates: result.candidates,
        },
        selection,
        importances,
    };

    Ok(PipelineOutcome {
        report,
        model: bagged,
        schema,
        scaler,
    })
}
