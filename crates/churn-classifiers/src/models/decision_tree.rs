//! CART classification tree with Gini impurity.
//!
//! Used as the base learner of the random forest. Trees are grown on a list
//! of row positions so bootstrap samples (with repeated rows) never have to
//! be materialised.
use ndarray::{Array2, ArrayView1};
use rand::seq::index;
use rand_chacha::ChaCha8Rng;

use crate::data_handling::Label;

/// Growth limits of a single tree.
#[derive(Debug, Clone, Copy)]
pub struct TreeParams {
    pub max_depth: Option<usize>,
    pub min_samples_split: usize,
    pub min_samples_leaf: usize,
    /// Number of candidate features drawn at every split.
    pub max_features: usize,
}

#[derive(Debug, Clone)]
enum TreeNode {
    Leaf {
        prob_yes: f64,
    },
    Split {
        feature: usize,
        threshold: f64,
        left: Box<TreeNode>,
        right: Box<TreeNode>,
    },
}

#[derive(Debug, Clone)]
pub struct DecisionTree {
    root: TreeNode,
    /// Weighted impurity decrease per feature, not normalised.
    importances: Vec<f64>,
}

fn gini(yes: usize, total: usize) -> f64 {
    if total == 0 {
        return 0.0;
    }
    let p = yes as f64 / total as f64;
    2.0 * p * (1.0 - p)
}

struct Grower<'a> {
    x: &'a Array2<f64>,
    y: &'a [Label],
    params: TreeParams,
    importances: Vec<f64>,
}

struct BestSplit {
    feature: usize,
    threshold: f64,
    gain: f64,
}

impl<'a> Grower<'a> {
    fn count_yes(&self, rows: &[usize]) -> usize {
        rows.iter().filter(|&&r| self.y[r].is_positive()).count()
    }

    fn grow(&mut self, rows: &[usize], depth: usize, rng: &mut ChaCha8Rng) -> TreeNode {
        let n = rows.len();
        let yes = self.count_yes(rows);
        let leaf = TreeNode::Leaf {
            prob_yes: if n == 0 { 0.0 } else { yes as f64 / n as f64 },
        };

        if n < self.params.min_samples_split
            || n < 2 * self.params.min_samples_leaf
            || yes == 0
            || yes == n
            || self.params.max_depth.map_or(false, |d| depth >= d)
        {
            return leaf;
        }

        let Some(best) = self.best_split(rows, yes, rng) else {
            return leaf;
        };

        let (left_rows, right_rows): (Vec<usize>, Vec<usize>) = rows
            .iter()
            .partition(|&&r| self.x[(r, best.feature)] <= best.threshold);

        self.importances[best.feature] += n as f64 * best.gain;

        let left = self.grow(&left_rows, depth + 1, rng);
        let right = self.grow(&right_rows, depth + 1, rng);
        TreeNode::Split {
            feature: best.feature,
            threshold: best.threshold,
            left: Box::new(left),
            right: Box::new(right),
        }
    }

    /// Scan sorted values of each candidate feature and keep the first split
    /// with the largest impurity decrease.
    fn best_split(&self, rows: &[usize], yes: usize, rng: &mut ChaCha8Rng) -> Option<BestSplit> {
        let n = rows.len();
        let n_features = self.x.ncols();
        let parent = gini(yes, n);
        let min_leaf = self.params.min_samples_leaf;
        if n_features == 0 || self.params.max_features == 0 {
            return None;
        }

        let amount = self.params.max_features.min(n_features);
        let mut candidates = index::sample(rng, n_features, amount).into_vec();
        candidates.sort_unstable();

        let mut best: Option<BestSplit> = None;
        let mut sorted = rows.to_vec();

        for feature in candidates {
            sorted.sort_by(|&a, &b| {
                self.x[(a, feature)]
                    .partial_cmp(&self.x[(b, feature)])
                    .unwrap_or(std::cmp::Ordering::Equal)
            });

            let mut left_yes = 0usize;
            for i in 0..n - 1 {
                if self.y[sorted[i]].is_positive() {
                    left_yes += 1;
                }
                let v = self.x[(sorted[i], feature)];
                let next = self.x[(sorted[i + 1], feature)];
                if v == next {
                    continue;
                }

                let left_n = i + 1;
                let right_n = n - left_n;
                if left_n < min_leaf || right_n < min_leaf {
                    continue;
                }

                let weighted = (left_n as f64 * gini(left_yes, left_n)
                    + right_n as f64 * gini(yes - left_yes, right_n))
                    / n as f64;
                let gain = parent - weighted;

                if gain > 1e-12 && best.as_ref().map_or(true, |b| gain > b.gain) {
                    best = Some(BestSplit {
                        feature,
                        threshold: (v + next) / 2.0,
                        gain,
                    });
                }
            }
        }

        best
    }
}

impl DecisionTree {
    /// Grow a tree on the rows at `rows` (positions may repeat).
    pub fn fit(
        x: &Array2<f64>,
        y: &[Label],
        rows: &[usize],
        params: TreeParams,
        rng: &mut ChaCha8Rng,
    ) -> Self {
        let mut grower = Grower {
            x,
            y,
            params,
            importances: vec![0.0; x.ncols()],
        };
        let root = grower.grow(rows, 0, rng);
        DecisionTree {
            root,
            importances: grower.importances,
        }
    }

    pub fn predict_row(&self, row: ArrayView1<'_, f64>) -> f64 {
        let mut node = &self.root;
        loop {
            match node {
                TreeNode::Leaf { prob_yes } => return *prob_yes,
                TreeNode::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    node = if row[*feature] <= *threshold { left } else { right };
                }
            }
        }
    }

    pub fn raw_importances(&self) -> &[f64] {
        &self.importances
    }

    pub fn depth(&self) -> usize {
        fn walk(node: &TreeNode) -> usize {
            match node {
                TreeNode::Leaf { .. } => 0,
                TreeNode::Split { left, right, .. } => 1 + walk(left).max(walk(right)),
            }
        }
        walk(&self.root)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;
    use rand::SeedableRng;

    fn params() -> TreeParams {
        TreeParams {
            max_depth: None,
            min_samples_split: 2,
            min_samples_leaf: 1,
            max_features: 2,
        }
    }

    #[test]
    fn splits_on_the_informative_feature() {
        // column 1 separates the classes, column 0 is noise
        let x = array![[0.3, 0.0], [0.1, 0.1], [0.2, 0.9], [0.4, 1.0]];
        let y = [Label::No, Label::No, Label::Yes, Label::Yes];
        let mut rng = ChaCha8Rng::seed_from_u64(0);
        let tree = DecisionTree::fit(&x, &y, &[0, 1, 2, 3], params(), &mut rng);

        assert_eq!(tree.depth(), 1);
        assert_eq!(tree.raw_importances()[0], 0.0);
        assert!(tree.raw_importances()[1] > 0.0);
        assert_eq!(tree.predict_row(x.row(0)), 0.0);
        assert_eq!(tree.predict_row(x.row(3)), 1.0);
    }

    #[test]
    fn matrix_without_columns_grows_a_single_leaf() {
        let x = Array2::<f64>::zeros((4, 0));
        let y = [Label::No, Label::Yes, Label::No, Label::Yes];
        let mut rng = ChaCha8Rng::seed_from_u64(0);
        let p = TreeParams {
            max_features: 0,
            ..params()
        };
        let tree = DecisionTree::fit(&x, &y, &[0, 1, 2, 3], p, &mut rng);
        assert_eq!(tree.depth(), 0);
        assert!(tree.raw_importances().is_empty());
        assert_eq!(tree.predict_row(x.row(0)), 0.5);
    }

    #[test]
    fn max_depth_zero_yields_class_frequency() {
        let x = array![[0.0], [1.0], [2.0], [3.0]];
        let y = [Label::No, Label::Yes, Label::Yes, Label::Yes];
        let mut rng = ChaCha8Rng::seed_from_u64(0);
        let p = TreeParams {
            max_depth: Some(0),
            max_features: 1,
            ..params()
        };
        let tree = DecisionTree::fit(&x, &y, &[0, 1, 2, 3], p, &mut rng);
        assert!((tree.predict_row(x.row(0)) - 0.75).abs() < 1e-12);
    }
}
