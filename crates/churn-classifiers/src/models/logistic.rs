use ndarray::Array1;

use crate::data_handling::{Dataset, FeatureMatrix};
use crate::error::Result;
use crate::models::classifier_trait::Classifier;

/// Gradient norm below which optimisation stops early.
const TOLERANCE: f64 = 1e-6;

/// L2-regularised logistic regression fitted by batch gradient descent.
#[derive(Debug, Clone)]
pub struct LogisticRegressionClassifier {
    feature_names: Vec<String>,
    weights: Array1<f64>,
    intercept: f64,
    n_iter: usize,
}

fn sigmoid(z: f64) -> f64 {
    if z >= 0.0 {
        1.0 / (1.0 + (-z).exp())
    } else {
        let e = z.exp();
        e / (1.0 + e)
    }
}

impl LogisticRegressionClassifier {
    /// Fit on `dataset`. `c` is the inverse regularisation strength; the
    /// intercept is not penalised.
    pub fn fit(dataset: &Dataset, c: f64, learning_rate: f64, max_iter: usize) -> Result<Self> {
        let x = dataset.x().values();
        let y: Array1<f64> = dataset.y().iter().map(|l| l.as_f64()).collect();
        let n = x.nrows() as f64;

        let mut weights = Array1::<f64>::zeros(x.ncols());
        let mut intercept = 0.0;
        let mut n_iter = 0;

        for _ in 0..max_iter {
            n_iter += 1;
            let residual = (x.dot(&weights) + intercept).mapv(sigmoid) - &y;

            let grad_w = x.t().dot(&residual) / n + &weights / (c * n);
            let grad_b = residual.sum() / n;

            weights.scaled_add(-learning_rate, &grad_w);
            intercept -= learning_rate * grad_b;

            let grad_norm = grad_w.iter().map(|g| g * g).sum::<f64>() + grad_b * grad_b;
            if grad_norm.sqrt() < TOLERANCE {
                break;
            }
        }

        log::debug!(
            "logistic regression converged after {} iterations (c = {})",
            n_iter,
            c
        );

        Ok(Self {
            feature_names: dataset.feature_names().to_vec(),
            weights,
            intercept,
            n_iter,
        })
    }

    pub fn coefficients(&self) -> &Array1<f64> {
        &self.weights
    }

    pub fn intercept(&self) -> f64 {
        self.intercept
    }

    pub fn n_iter(&self) -> usize {
        self.n_iter
    }
}

impl Classifier for LogisticRegressionClassifier {
    fn predict_proba(&self, x: &FeatureMatrix) -> Result<Vec<f64>> {
        x.ensure_schema(&self.feature_names)?;
        Ok((x.values().dot(&self.weights) + self.intercept)
            .mapv(sigmoid)
            .to_vec())
    }

    fn feature_names(&self) -> &[String] {
        &self.feature_names
    }

    fn name(&self) -> String {
        "logistic_regression".to_string()
    }
}
