use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rayon::prelude::*;

use crate::config::MaxFeatures;
use crate::data_handling::{Dataset, FeatureMatrix};
use crate::error::Result;
use crate::models::classifier_trait::{named_importances, Classifier};
use crate::models::decision_tree::{DecisionTree, TreeParams};

/// Hyper-parameters of a random forest.
#[derive(Debug, Clone, Copy)]
pub struct ForestParams {
    pub n_estimators: usize,
    pub max_depth: Option<usize>,
    pub min_samples_split: usize,
    pub min_samples_leaf: usize,
    pub max_features: MaxFeatures,
    pub bootstrap: bool,
}

/// Random forest of CART trees. Tree `i` draws its bootstrap sample and its
/// split candidates from a generator seeded with `seed + i`.
#[derive(Debug, Clone)]
pub struct RandomForestClassifier {
    feature_names: Vec<String>,
    trees: Vec<DecisionTree>,
    importances: Vec<(String, f64)>,
}

impl RandomForestClassifier {
    pub fn fit(dataset: &Dataset, params: ForestParams, seed: u64) -> Result<Self> {
        let x = dataset.x().values();
        let y = dataset.y();
        let n_samples = dataset.len();
        let n_features = dataset.x().ncols();

        let tree_params = TreeParams {
            max_depth: params.max_depth,
            min_samples_split: params.min_samples_split.max(2),
            min_samples_leaf: params.min_samples_leaf.max(1),
            max_features: params.max_features.resolve(n_features),
        };

        let trees: Vec<DecisionTree> = (0..params.n_estimators)
            .into_par_iter()
            .map(|tree_idx| {
                let mut rng = ChaCha8Rng::seed_from_u64(seed.wrapping_add(tree_idx as u64));
                let rows: Vec<usize> = if params.bootstrap {
                    (0..n_samples).map(|_| rng.gen_range(0..n_samples)).collect()
                } else {
                    (0..n_samples).collect()
                };
                DecisionTree::fit(x, y, &rows, tree_params, &mut rng)
            })
            .collect();

        // Normalise per tree, then average, so every tree weighs the same.
        let mut averaged = vec![0.0; n_features];
        for tree in &trees {
            let total: f64 = tree.raw_importances().iter().sum();
            if total > 0.0 {
                for (acc, v) in averaged.iter_mut().zip(tree.raw_importances()) {
                    *acc += v / total;
                }
            }
        }
        let importances = named_importances(dataset.feature_names(), &averaged);

        log::debug!(
            "random forest: {} trees, max depth reached {}",
            trees.len(),
            trees.iter().map(|t| t.depth()).max().unwrap_or(0)
        );

        Ok(Self {
            feature_names: dataset.feature_names().to_vec(),
            trees,
            importances,
        })
    }

    pub fn n_trees(&self) -> usize {
        self.trees.len()
    }
}

impl Classifier for RandomForestClassifier {
    fn predict_proba(&self, x: &FeatureMatrix) -> Result<Vec<f64>> {
        x.ensure_schema(&self.feature_names)?;
        let n_trees = self.trees.len().max(1) as f64;
        Ok((0..x.nrows())
            .map(|r| {
                let row = x.row(r);
                self.trees.iter().map(|t| t.predict_row(row)).sum::<f64>() / n_trees
            })
            .collect())
    }

    fn feature_names(&self) -> &[String] {
        &self.feature_names
    }

    fn feature_importances(&self) -> Option<Vec<(String, f64)>> {
        Some(self.importances.clone())
    }

    fn name(&self) -> String {
        "random_forest".to_string()
    }
}
