//! Randomized hyper-parameter search with stratified k-fold cross-validation.
//!
//! Configurations are sampled without replacement from the Cartesian
//! product of the parameter space. Candidates are scored in parallel, but the
//! winner is chosen afterwards by comparing the recorded mean scores in
//! sampling order, so the earliest sampled configuration wins a tie.
use std::collections::{BTreeMap, HashMap, HashSet};

use rand::seq::index;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::config::{HyperparameterConfig, ModelConfig, ModelType, ParamValue, BASE_PREFIX};
use crate::data_handling::{Dataset, Label, Partition};
use crate::error::{ChurnError, Result};
use crate::metrics::{evaluate, Scoring};
use crate::models::classifier_trait::Classifier;
use crate::models::factory;

/// Parameter name to its discrete candidate values.
pub type ParamSpace = BTreeMap<String, Vec<ParamValue>>;

/// Cross-validation outcome of one sampled configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CandidateScore {
    /// Position in sampling order.
    pub index: usize,
    pub params: HyperparameterConfig,
    pub fold_scores: Vec<f64>,
    pub mean_score: f64,
}

pub struct SearchResult {
    pub best_config: HyperparameterConfig,
    pub best_score: f64,
    /// Winning configuration refit on the whole training set.
    pub best_model: Box<dyn Classifier>,
    pub candidates: Vec<CandidateScore>,
}

fn ints(values: &[i64]) -> Vec<ParamValue> {
    values.iter().map(|&v| ParamValue::Int(v)).collect()
}

fn floats(values: &[f64]) -> Vec<ParamValue> {
    values.iter().map(|&v| ParamValue::Float(v)).collect()
}

/// Search space used when the configuration does not provide one.
pub fn default_param_space(model_type: &ModelType) -> ParamSpace {
    let mut space = ParamSpace::new();
    match model_type {
        ModelType::LogisticRegression { .. } => {
            space.insert("c".into(), floats(&[0.01, 0.1, 1.0, 10.0]));
            space.insert("max_iter".into(), ints(&[100, 300]));
        }
        ModelType::RandomForest { .. } => {
            space.insert("n_estimators".into(), ints(&[50, 100, 200]));
            let mut depth = vec![ParamValue::None];
            depth.extend(ints(&[5, 10, 20]));
            space.insert("max_depth".into(), depth);
            space.insert("min_samples_split".into(), ints(&[2, 5, 10]));
            space.insert("min_samples_leaf".into(), ints(&[1, 2, 4]));
            space.insert(
                "max_features".into(),
                vec![ParamValue::Text("sqrt".into()), ParamValue::Text("log2".into())],
            );
            space.insert(
                "bootstrap".into(),
                vec![ParamValue::Bool(true), ParamValue::Bool(false)],
            );
        }
        ModelType::GBDT { .. } => {
            space.insert("num_boost_round".into(), ints(&[50, 100, 200]));
            space.insert("max_depth".into(), ints(&[3, 5, 7]));
            space.insert("learning_rate".into(), floats(&[0.05, 0.1, 0.2]));
        }
        ModelType::Bagging { base, .. } => {
            // base parameters carry a `base.` prefix so they never collide with the bag's own
            space = default_param_space(base)
                .into_iter()
                .map(|(name, values)| (format!("{}{}", BASE_PREFIX, name), values))
                .collect();
            space.insert("n_estimators".into(), ints(&[5, 10, 20]));
        }
    }
    space
}

fn decode(space: &ParamSpace, choice: &[usize]) -> HyperparameterConfig {
    space
        .iter()
        .zip(choice)
        .map(|((name, values), &i)| (name.clone(), values[i].clone()))
        .collect()
}

/// Draw up to `n_iter` distinct configurations. When the space holds no
/// more than `n_iter` configurations, every one of them is returned.
pub fn sample_configurations(
    space: &ParamSpace,
    n_iter: usize,
    seed: u64,
) -> Result<Vec<HyperparameterConfig>> {
    if space.is_empty() {
        return Err(ChurnError::EmptySearchSpace("no parameters given".to_string()));
    }
    if let Some((name, _)) = space.iter().find(|(_, values)| values.is_empty()) {
        return Err(ChurnError::EmptySearchSpace(format!(
            "parameter '{}' has no candidate values",
            name
        )));
    }

    let sizes: Vec<usize> = space.values().map(|v| v.len()).collect();
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let total = sizes.iter().try_fold(1usize, |acc, &s| acc.checked_mul(s));

    let choices: Vec<Vec<usize>> = match total {
        Some(total) => index::sample(&mut rng, total, n_iter.min(total))
            .into_iter()
            .map(|mut flat| {
                sizes
                    .iter()
                    .map(|&s| {
                        let i = flat % s;
                        flat /= s;
                        i
                    })
                    .collect()
            })
            .collect(),
        None => {
            // too large to enumerate; draw distinct combinations directly
            let mut seen = HashSet::new();
            let mut out = Vec::with_capacity(n_iter);
            while out.len() < n_iter {
                let choice: Vec<usize> = sizes.iter().map(|&s| rng.gen_range(0..s)).collect();
                if seen.insert(choice.clone()) {
                    out.push(choice);
                }
            }
            out
        }
    };

    Ok(choices.iter().map(|c| decode(space, c)).collect())
}

/// Stratified k-fold (train, validation) position lists.
///
/// Within each class, distinct row ids are dealt to folds round-robin in
/// order of first appearance, so copies of one source row share a fold.
pub fn stratified_k_fold(dataset: &Dataset, k: usize) -> Result<Vec<(Vec<usize>, Vec<usize>)>> {
    if k < 2 {
        return Err(ChurnError::InvalidParameter(format!(
            "cv_folds must be at least 2, got {}",
            k
        )));
    }

    let mut fold_of = vec![0usize; dataset.len()];
    for label in [Label::No, Label::Yes] {
        let mut assigned: HashMap<usize, usize> = HashMap::new();
        for pos in dataset.indices_of(label) {
            let id = dataset.row_ids()[pos];
            let next = assigned.len();
            fold_of[pos] = *assigned.entry(id).or_insert(next % k);
        }
    }

    let folds: Vec<(Vec<usize>, Vec<usize>)> = (0..k)
        .map(|f| (0..dataset.len()).partition(|&i| fold_of[i] != f))
        .collect();

    if let Some(f) = folds.iter().position(|(train, valid)| train.is_empty() || valid.is_empty()) {
        return Err(ChurnError::EmptyDataset(format!(
            "fold {} of {} is empty with {} rows",
            f,
            k,
            dataset.len()
        )));
    }
    Ok(folds)
}

/// Score `config` on every fold.
pub fn cross_val_scores(
    config: &ModelConfig,
    dataset: &Dataset,
    folds: &[(Vec<usize>, Vec<usize>)],
    scoring: Scoring,
) -> Result<Vec<f64>> {
    folds
        .iter()
        .map(|(train_idx, valid_idx)| {
            let train = dataset.subset(train_idx, Partition::Train);
            let valid = dataset.subset(valid_idx, Partition::Test);
            let model = factory::train(config, &train, None)?;
            Ok(evaluate(model.as_ref(), &valid)?.score(scoring))
        })
        .collect()
}

/// Randomized search over `space` for the model kind of `base`.
pub fn search(
    base: &ModelConfig,
    dataset: &Dataset,
    space: &ParamSpace,
    n_iter: usize,
    cv_folds: usize,
    scoring: Scoring,
) -> Result<SearchResult> {
    let sampled = sample_configurations(space, n_iter, base.seed)?;

    let candidates: Vec<(HyperparameterConfig, ModelConfig)> = sampled
        .into_iter()
        .filter_map(|params| match base.with_params(&params) {
            Ok(config) => Some((params, config)),
            Err(e) => {
                log::warn!("skipping configuration {:?}: {}", params, e);
                None
            }
        })
        .collect();
    if candidates.is_empty() {
        return Err(ChurnError::EmptySearchSpace(format!(
            "no sampled configuration is valid for {}",
            base.name()
        )));
    }

    let folds = stratified_k_fold(dataset, cv_folds)?;
    log::info!(
        "searching {} configurations of {} with {}-fold cross-validation ({:?})",
        candidates.len(),
        base.name(),
        cv_folds,
        scoring
    );

    let scored = candidates
        .par_iter()
        .enumerate()
        .map(|(index, (params, config))| {
            let fold_scores = cross_val_scores(config, dataset, &folds, scoring)?;
            let mean_score = fold_scores.iter().sum::<f64>() / fold_scores.len() as f64;
            log::debug!("candidate {} {:?}: mean {:.4}", index, params, mean_score);
            Ok(CandidateScore {
                index,
                params: params.clone(),
                fold_scores,
                mean_score,
            })
        })
        .collect::<Result<Vec<CandidateScore>>>()?;

    let mut best = 0;
    for (i, candidate) in scored.iter().enumerate() {
        if candidate.mean_score > scored[best].mean_score {
            best = i;
        }
    }

    let best_config = scored[best].params.clone();
    let best_model = factory::train(&candidates[best].1, dataset, None)?;
    log::info!(
        "best configuration {:?} (mean {:?} {:.4})",
        best_config,
        scoring,
        scored[best].mean_score
    );

    Ok(SearchResult {
        best_config,
        best_score: scored[best].mean_score,
        best_model,
        candidates: scored,
    })
}
