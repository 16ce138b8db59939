use gbdt::config::Config;
use gbdt::decision_tree::{Data, DataVec};
use gbdt::gradient_boost::GBDT;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

use crate::data_handling::{Dataset, FeatureMatrix, Label};
use crate::error::Result;
use crate::models::classifier_trait::{named_importances, Classifier};

/// Hyper-parameters forwarded to the `gbdt` crate.
#[derive(Debug, Clone, Copy)]
pub struct BoostingParams {
    pub max_depth: u32,
    pub num_boost_round: u32,
    pub learning_rate: f32,
    pub min_leaf_size: usize,
    pub debug: bool,
    pub training_optimization_level: u8,
}

/// Gradient Boosting Decision Tree (GBDT) classifier with log-likelihood loss.
///
/// The `gbdt` crate does not expose its trees, so importances are
/// permutation importances measured on the training rows when fitting.
pub struct GBDTClassifier {
    model: GBDT,
    feature_names: Vec<String>,
    importances: Vec<(String, f64)>,
}

fn to_data_vec(x: &FeatureMatrix, labels: Option<&[Label]>) -> DataVec {
    let mut data = DataVec::with_capacity(x.nrows());
    for row in 0..x.nrows() {
        let features: Vec<f32> = x.row(row).iter().map(|&v| v as f32).collect();
        // log-likelihood loss expects labels in {-1, 1}
        let label = match labels {
            Some(y) if y[row].is_positive() => 1.0,
            Some(_) => -1.0,
            None => 0.0,
        };
        data.push(Data::new_training_data(features, 1.0, label, None));
    }
    data
}

fn accuracy(model: &GBDT, x: &FeatureMatrix, y: &[Label]) -> f64 {
    let predictions = model.predict(&to_data_vec(x, None));
    let correct = predictions
        .iter()
        .zip(y)
        .filter(|&(&p, &l)| ((p as f64) > 0.5) == l.is_positive())
        .count();
    correct as f64 / y.len().max(1) as f64
}

impl GBDTClassifier {
    pub fn fit(dataset: &Dataset, params: BoostingParams, seed: u64) -> Result<Self> {
        let mut config = Config::new();

        config.set_feature_size(dataset.x().ncols());
        config.set_shrinkage(params.learning_rate);
        config.set_max_depth(params.max_depth);
        config.set_iterations(params.num_boost_round as usize);
        config.set_min_leaf_size(params.min_leaf_size);
        config.set_debug(params.debug);
        config.set_training_optimization_level(params.training_optimization_level);
        config.set_loss("LogLikelyhood");

        let mut gbdt = GBDT::new(&config);
        let mut train_x = to_data_vec(dataset.x(), Some(dataset.y()));
        gbdt.fit(&mut train_x);

        let importances = permutation_importances(&gbdt, dataset, seed)?;

        Ok(Self {
            model: gbdt,
            feature_names: dataset.feature_names().to_vec(),
            importances,
        })
    }
}

/// Accuracy lost when each column is shuffled, clipped at zero and
/// normalised to sum to one.
fn permutation_importances(
    model: &GBDT,
    dataset: &Dataset,
    seed: u64,
) -> Result<Vec<(String, f64)>> {
    let x = dataset.x();
    let y = dataset.y();
    let baseline = accuracy(model, x, y);

    let drops: Vec<f64> = (0..x.ncols())
        .map(|col| {
            let mut rng = ChaCha8Rng::seed_from_u64(seed.wrapping_add(col as u64));
            let mut values = x.values().clone();
            let mut column: Vec<f64> = values.column(col).to_vec();
            column.shuffle(&mut rng);
            for (cell, v) in values.column_mut(col).iter_mut().zip(column) {
                *cell = v;
            }
            let shuffled = FeatureMatrix::new(x.names().to_vec(), values)?;
            Ok((baseline - accuracy(model, &shuffled, y)).max(0.0))
        })
        .collect::<Result<Vec<f64>>>()?;

    Ok(named_importances(x.names(), &drops))
}

impl Classifier for GBDTClassifier {
    fn predict_proba(&self, x: &FeatureMatrix) -> Result<Vec<f64>> {
        x.ensure_schema(&self.feature_names)?;
        let predictions = self.model.predict(&to_data_vec(x, None));
        Ok(predictions.into_iter().map(|p| p as f64).collect())
    }

    fn feature_names(&self) -> &[String] {
        &self.feature_names
    }

    fn feature_importances(&self) -> Option<Vec<(String, f64)>> {
        Some(self.importances.clone())
    }

    fn name(&self) -> String {
        "gbdt".to_string()
    }
}
