use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use crate::balancing::BalanceStrategy;
use crate::error::{ChurnError, Result};
use crate::metrics::Scoring;
use crate::search::ParamSpace;

/// Central configuration for one model: its kind, hyper-parameters and seed.
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
pub struct ModelConfig {
    pub seed: u64,

    #[serde(flatten)]
    pub model_type: ModelType,
}

/// Feature subset size considered at each random-forest split.
#[derive(Deserialize, Serialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum MaxFeatures {
    Sqrt,
    Log2,
    All,
}

impl MaxFeatures {
    /// Candidate count for `n_features` columns: at least one unless there are none.
    pub fn resolve(self, n_features: usize) -> usize {
        if n_features == 0 {
            return 0;
        }
        let n = match self {
            MaxFeatures::Sqrt => (n_features as f64).sqrt().ceil() as usize,
            MaxFeatures::Log2 => (n_features as f64).log2().ceil() as usize,
            MaxFeatures::All => n_features,
        };
        n.clamp(1, n_features)
    }
}

impl FromStr for MaxFeatures {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "sqrt" => Ok(MaxFeatures::Sqrt),
            "log2" => Ok(MaxFeatures::Log2),
            "all" | "none" => Ok(MaxFeatures::All),
            other => Err(format!("Unknown max_features value: {}", other)),
        }
    }
}

/// Prefix routing a bagging hyper-parameter to the wrapped model
/// (`base.n_estimators` is the tree count of a bagged forest).
pub const BASE_PREFIX: &str = "base.";

/// Supported model kinds and their hyper-parameters.
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum ModelType {
    LogisticRegression {
        /// Inverse L2 regularisation strength.
        c: f64,
        learning_rate: f64,
        max_iter: usize,
    },
    RandomForest {
        n_estimators: usize,
        max_depth: Option<usize>,
        min_samples_split: usize,
        min_samples_leaf: usize,
        max_features: MaxFeatures,
        bootstrap: bool,
    },
    #[serde(rename = "gbdt")]
    GBDT {
        max_depth: u32,
        num_boost_round: u32,
        learning_rate: f32,
        min_leaf_size: usize,
        debug: bool,
        training_optimization_level: u8,
    },
    Bagging {
        base: Box<ModelType>,
        n_estimators: usize,
    },
}

impl Default for ModelType {
    fn default() -> Self {
        ModelType::random_forest()
    }
}

impl ModelType {
    pub fn logistic_regression() -> Self {
        ModelType::LogisticRegression {
            c: 1.0,
            learning_rate: 0.1,
            max_iter: 300,
        }
    }

    pub fn random_forest() -> Self {
        ModelType::RandomForest {
            n_estimators: 100,
            max_depth: None,
            min_samples_split: 2,
            min_samples_leaf: 1,
            max_features: MaxFeatures::Sqrt,
            bootstrap: true,
        }
    }

    pub fn gbdt() -> Self {
        ModelType::GBDT {
            max_depth: 3,
            num_boost_round: 100,
            learning_rate: 0.1,
            min_leaf_size: 1,
            debug: false,
            training_optimization_level: 2,
        }
    }

    pub fn bagging(base: ModelType, n_estimators: usize) -> Self {
        ModelType::Bagging {
            base: Box::new(base),
            n_estimators,
        }
    }

    /// Short kind name, e.g. `random_forest` or `bagging(gbdt)`.
    pub fn name(&self) -> String {
        match self {
            ModelType::LogisticRegression { .. } => "logistic_regression".to_string(),
            ModelType::RandomForest { .. } => "random_forest".to_string(),
            ModelType::GBDT { .. } => "gbdt".to_string(),
            ModelType::Bagging { base, .. } => format!("bagging({})", base.name()),
        }
    }

    /// Whether fitted models of this kind report feature importances.
    pub fn has_importances(&self) -> bool {
        match self {
            ModelType::LogisticRegression { .. } => false,
            ModelType::RandomForest { .. } | ModelType::GBDT { .. } => true,
            ModelType::Bagging { base, .. } => base.has_importances(),
        }
    }

    fn apply(&mut self, name: &str, value: &ParamValue) -> Result<()> {
        let kind = self.name();
        let unknown = || {
            ChurnError::InvalidParameter(format!("'{}' is not a parameter of {}", name, kind))
        };

        match self {
            ModelType::LogisticRegression {
                c,
                learning_rate,
                max_iter,
            } => match name {
                "c" => *c = value.as_positive_f64(name)?,
                "learning_rate" => *learning_rate = value.as_positive_f64(name)?,
                "max_iter" => *max_iter = value.as_positive_usize(name)?,
                _ => return Err(unknown()),
            },
            ModelType::RandomForest {
                n_estimators,
                max_depth,
                min_samples_split,
                min_samples_leaf,
                max_features,
                bootstrap,
            } => match name {
                "n_estimators" => *n_estimators = value.as_positive_usize(name)?,
                "max_depth" => *max_depth = value.as_optional_usize(name)?,
                "min_samples_split" => *min_samples_split = value.as_positive_usize(name)?.max(2),
                "min_samples_leaf" => *min_samples_leaf = value.as_positive_usize(name)?,
                "max_features" => {
                    *max_features = value
                        .as_str(name)?
                        .parse()
                        .map_err(ChurnError::InvalidParameter)?
                }
                "bootstrap" => *bootstrap = value.as_bool(name)?,
                _ => return Err(unknown()),
            },
            ModelType::GBDT {
                max_depth,
                num_boost_round,
                learning_rate,
                min_leaf_size,
                ..
            } => match name {
                "max_depth" => *max_depth = value.as_positive_usize(name)? as u32,
                "num_boost_round" => *num_boost_round = value.as_positive_usize(name)? as u32,
                "learning_rate" => *learning_rate = value.as_positive_f64(name)? as f32,
                "min_leaf_size" => *min_leaf_size = value.as_positive_usize(name)?,
                _ => return Err(unknown()),
            },
            ModelType::Bagging { base, n_estimators } => match name.strip_prefix(BASE_PREFIX) {
                Some(base_name) => base.apply(base_name, value)?,
                None if name == "n_estimators" => *n_estimators = value.as_positive_usize(name)?,
                None => base.apply(name, value)?,
            },
        }
        Ok(())
    }
}

impl FromStr for ModelType {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let lower = s.to_lowercase();
        if let Some(base) = lower.strip_prefix("bagging:") {
            return Ok(ModelType::bagging(base.parse()?, 10));
        }
        match lower.as_str() {
            "logistic" | "logistic_regression" => Ok(ModelType::logistic_regression()),
            "random_forest" | "rf" => Ok(ModelType::random_forest()),
            "gbdt" | "gradient_boosting" => Ok(ModelType::gbdt()),
            _ => Err(format!(
                "Unknown model type: {}. Expected logistic, random_forest, gbdt or bagging:<base>",
                s
            )),
        }
    }
}

impl ModelConfig {
    pub fn new(seed: u64, model_type: ModelType) -> Self {
        Self { seed, model_type }
    }

    /// New config with every parameter in `params` applied.
    pub fn with_params(&self, params: &HyperparameterConfig) -> Result<ModelConfig> {
        let mut model_type = self.model_type.clone();
        for (name, value) in params {
            model_type.apply(name, value)?;
        }
        Ok(ModelConfig {
            seed: self.seed,
            model_type,
        })
    }

    pub fn name(&self) -> String {
        self.model_type.name()
    }
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            seed: 42,
            model_type: ModelType::default(),
        }
    }
}

/// One hyper-parameter value drawn from a candidate list.
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
#[serde(untagged)]
pub enum ParamValue {
    None,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
}

impl ParamValue {
    fn invalid(&self, name: &str, expected: &str) -> ChurnError {
        ChurnError::InvalidParameter(format!("{} expects {}, got {}", name, expected, self))
    }

    fn as_positive_usize(&self, name: &str) -> Result<usize> {
        match self {
            ParamValue::Int(v) if *v > 0 => Ok(*v as usize),
            _ => Err(self.invalid(name, "a positive integer")),
        }
    }

    fn as_optional_usize(&self, name: &str) -> Result<Option<usize>> {
        match self {
            ParamValue::None => Ok(None),
            _ => self.as_positive_usize(name).map(Some),
        }
    }

    fn as_positive_f64(&self, name: &str) -> Result<f64> {
        let v = match self {
            ParamValue::Float(v) => *v,
            ParamValue::Int(v) => *v as f64,
            _ => return Err(self.invalid(name, "a number")),
        };
        if v.is_finite() && v > 0.0 {
            Ok(v)
        } else {
            Err(self.invalid(name, "a positive number"))
        }
    }

    fn as_bool(&self, name: &str) -> Result<bool> {
        match self {
            ParamValue::Bool(v) => Ok(*v),
            _ => Err(self.invalid(name, "a boolean")),
        }
    }

    fn as_str(&self, name: &str) -> Result<&str> {
        match self {
            ParamValue::Text(v) => Ok(v),
            _ => Err(self.invalid(name, "a string")),
        }
    }
}

impl fmt::Display for ParamValue {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            ParamValue::None => f.write_str("none"),
            ParamValue::Bool(v) => write!(f, "{}", v),
            ParamValue::Int(v) => write!(f, "{}", v),
            ParamValue::Float(v) => write!(f, "{}", v),
            ParamValue::Text(v) => f.write_str(v),
        }
    }
}

/// Parameter name to chosen value. Ordered so configurations compare and print stably.
pub type HyperparameterConfig = BTreeMap<String, ParamValue>;

/// Which balanced variants the pipeline builds.
#[derive(Deserialize, Serialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum BalancingChoice {
    Oversample,
    Undersample,
    Both,
}

impl BalancingChoice {
    pub fn strategies(self) -> Vec<BalanceStrategy> {
        match self {
            BalancingChoice::Oversample => vec![BalanceStrategy::Oversample],
            BalancingChoice::Undersample => vec![BalanceStrategy::Undersample],
            BalancingChoice::Both => vec![BalanceStrategy::Oversample, BalanceStrategy::Undersample],
        }
    }
}

impl FromStr for BalancingChoice {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "oversample" => Ok(BalancingChoice::Oversample),
            "undersample" => Ok(BalancingChoice::Undersample),
            "both" => Ok(BalancingChoice::Both),
            other => Err(format!("Unknown balancing strategy: {}", other)),
        }
    }
}

/// Column roles of the input table.
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct InputSchema {
    pub label_column: String,
    pub categorical_column: String,
    /// Identifier columns dropped before encoding.
    pub ignore_columns: Vec<String>,
}

impl Default for InputSchema {
    fn default() -> Self {
        Self {
            label_column: "churned_status".to_string(),
            categorical_column: "country".to_string(),
            ignore_columns: Vec::new(),
        }
    }
}

/// Randomized search settings.
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct SearchConfig {
    pub n_iter: usize,
    pub cv_folds: usize,
    pub scoring: Scoring,
    /// Overrides the default space of the model kind being tuned.
    pub param_space: Option<ParamSpace>,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            n_iter: 10,
            cv_folds: 3,
            scoring: Scoring::Accuracy,
            param_space: None,
        }
    }
}

/// Every knob of one pipeline run.
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct PipelineConfig {
    /// Share of rows assigned to the test partition.
    pub split_fraction: f64,
    pub seed: u64,
    pub balancing: BalancingChoice,
    pub scale_features: bool,
    pub baseline_models: Vec<ModelType>,
    pub search: SearchConfig,
    pub selection_threshold: f64,
    pub bagging_estimators: usize,
    pub schema: InputSchema,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            split_fraction: 0.2,
            seed: 42,
            balancing: BalancingChoice::Both,
            scale_features: true,
            baseline_models: vec![
                ModelType::logistic_regression(),
                ModelType::random_forest(),
                ModelType::gbdt(),
            ],
            search: SearchConfig::default(),
            selection_threshold: 0.01,
            bagging_estimators: 10,
            schema: InputSchema::default(),
        }
    }
}

impl PipelineConfig {
    pub fn validate(&self) -> Result<()> {
        if !(self.split_fraction > 0.0 && self.split_fraction < 1.0) {
            return Err(ChurnError::InvalidParameter(format!(
                "split_fraction must be in (0, 1), got {}",
                self.split_fraction
            )));
        }
        if self.search.cv_folds < 2 {
            return Err(ChurnError::InvalidParameter(format!(
                "cv_folds must be at least 2, got {}",
                self.search.cv_folds
            )));
        }
        if self.search.n_iter == 0 {
            return Err(ChurnError::InvalidParameter("n_iter must be at least 1".to_string()));
        }
        if self.bagging_estimators == 0 {
            return Err(ChurnError::InvalidParameter(
                "bagging_estimators must be at least 1".to_string(),
            ));
        }
        if !self.selection_threshold.is_finite() || self.selection_threshold < 0.0 {
            return Err(ChurnError::InvalidParameter(format!(
                "selection_threshold must be a non-negative number, got {}",
                self.selection_threshold
            )));
        }
        if self.baseline_models.is_empty() {
            return Err(ChurnError::InvalidParameter(
                "at least one baseline model is required".to_string(),
            ));
        }
        Ok(())
    }

    /// Model config for `model_type` seeded with the run seed.
    pub fn model(&self, model_type: &ModelType) -> ModelConfig {
        ModelConfig::new(self.seed, model_type.clone())
    }
}
