//! Multinomial logistic regression.

use ndarray::{Array1, Array2, ArrayView1, ArrayView2, Axis};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{
    LOGISTIC_REGRESSION, Model, ModelType, check_prediction_data, check_training_data,
    class_count, from_parameters, not_fitted, to_parameters,
};
use crate::error::{Error, Result};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct SoftmaxFit {
    /// Per-feature standardisation applied before the linear layer.
    means: Vec<f64>,
    scales: Vec<f64>,
    /// One row of weights per class.
    weights: Vec<Vec<f64>>,
    biases: Vec<f64>,
}

impl SoftmaxFit {
    fn standardise(&self, x: ArrayView2<'_, f64>) -> Array2<f64> {
        let means = Array1::from(self.means.clone());
        let scales = Array1::from(self.scales.clone());
        (&x - &means) / &scales
    }

    fn scores(&self, z: &Array2<f64>) -> Array2<f64> {
        let n_classes = self.biases.len();
        let n_features = self.means.len();
        let weights = Array2::from_shape_fn((n_classes, n_features), |(c, j)| self.weights[c][j]);
        z.dot(&weights.t()) + &Array1::from(self.biases.clone())
    }
}

/// Row-wise softmax, shifted by the row maximum.
fn softmax(scores: &mut Array2<f64>) {
    for mut row in scores.rows_mut() {
        let max = row.fold(f64::NEG_INFINITY, |acc, &v| acc.max(v));
        row.mapv_inplace(|v| (v - max).exp());
        let total = row.sum();
        row /= total;
    }
}

/// Index of the largest value, lowest index on ties.
#[allow(clippy::cast_precision_loss)]
fn argmax(row: ArrayView1<'_, f64>) -> f64 {
    let mut best = 0;
    for (idx, &v) in row.iter().enumerate() {
        if v > row[best] {
            best = idx;
        }
    }
    best as f64
}

/// Softmax regression trained by full-batch gradient descent on standardised features with
/// an L2 penalty on the weights.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogisticRegression {
    learning_rate: f64,
    max_iter: usize,
    l2: f64,
    fitted: Option<SoftmaxFit>,
}

impl Default for LogisticRegression {
    fn default() -> Self {
        Self {
            learning_rate: 0.5,
            max_iter: 500,
            l2: 1e-3,
            fitted: None,
        }
    }
}

impl Model for LogisticRegression {
    fn name(&self) -> &'static str {
        LOGISTIC_REGRESSION
    }

    fn model_type(&self) -> ModelType {
        ModelType::Classification
    }

    #[allow(
        clippy::cast_possible_truncation,
        clippy::cast_precision_loss,
        clippy::cast_sign_loss
    )]
    fn fit(&mut self, x: ArrayView2<'_, f64>, y: ArrayView1<'_, f64>) -> Result<()> {
        check_training_data(x, y)?;
        let n_classes = class_count(y)?;
        let (n_rows, n_features) = x.dim();
        let n = n_rows as f64;

        let means = x.mean_axis(Axis(0)).unwrap_or_else(|| Array1::zeros(n_features));
        let scales = x
            .std_axis(Axis(0), 0.0)
            .mapv(|s| if s > 0.0 { s } else { 1.0 });
        let mut fit = SoftmaxFit {
            means: means.to_vec(),
            scales: scales.to_vec(),
            weights: vec![vec![0.0; n_features]; n_classes],
            biases: vec![0.0; n_classes],
        };
        let z = fit.standardise(x);

        let mut targets = Array2::<f64>::zeros((n_rows, n_classes));
        for (row, &class) in y.iter().enumerate() {
            targets[[row, class as usize]] = 1.0;
        }

        let mut weights = Array2::<f64>::zeros((n_classes, n_features));
        let mut biases = Array1::<f64>::zeros(n_classes);
        for _ in 0..self.max_iter {
            let mut probabilities = z.dot(&weights.t()) + &biases;
            softmax(&mut probabilities);
            let error = probabilities - &targets;

            let grad_w = error.t().dot(&z) / n + &weights * self.l2;
            let grad_b = error.sum_axis(Axis(0)) / n;
            weights.scaled_add(-self.learning_rate, &grad_w);
            biases.scaled_add(-self.learning_rate, &grad_b);
        }

        fit.weights = weights.rows().into_iter().map(|row| row.to_vec()).collect();
        fit.biases = biases.to_vec();
        self.fitted = Some(fit);
        Ok(())
    }

    fn predict(&self, x: ArrayView2<'_, f64>) -> Result<Array1<f64>> {
        let fitted = self.fitted.as_ref().ok_or_else(|| not_fitted(LOGISTIC_REGRESSION))?;
        check_prediction_data(x, fitted.means.len())?;
        if fitted.scales.len() != fitted.means.len()
            || fitted.weights.iter().any(|w| w.len() != fitted.means.len())
            || fitted.weights.len() != fitted.biases.len()
        {
            return Err(Error::serialization(
                "logistic_regression state has inconsistent dimensions",
            ));
        }

        let scores = fitted.scores(&fitted.standardise(x));
        Ok(scores.rows().into_iter().map(argmax).collect())
    }

    fn parameters(&self) -> Result<Value> {
        to_parameters(self)
    }

    fn restore(&mut self, parameters: Value) -> Result<()> {
        *self = from_parameters(LOGISTIC_REGRESSION, parameters)?;
        Ok(())
    }
}
