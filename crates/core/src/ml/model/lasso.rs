//! L1-regularised linear regression.

use ndarray::{Array1, ArrayView1, ArrayView2, Axis};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{
    LASSO, Model, ModelType, check_prediction_data, check_training_data, from_parameters,
    not_fitted, to_parameters,
};
use crate::error::{Error, Result};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct LinearFit {
    coefficients: Vec<f64>,
    intercept: f64,
}

/// Minimises `(1 / 2n)·‖y − Xw − b‖² + alpha·‖w‖₁` by cyclic coordinate descent.
///
/// The intercept is not penalised; features and target are centred before the descent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Lasso {
    alpha: f64,
    max_iter: usize,
    tolerance: f64,
    fitted: Option<LinearFit>,
}

impl Default for Lasso {
    fn default() -> Self {
        Self {
            alpha: 1.0,
            max_iter: 1000,
            tolerance: 1e-6,
            fitted: None,
        }
    }
}

impl Lasso {
    /// Unfitted model with regularisation strength `alpha`.
    pub fn new(alpha: f64) -> Result<Self> {
        if !alpha.is_finite() || alpha < 0.0 {
            return Err(Error::invalid_argument(format!(
                "lasso alpha must be a non-negative number, got {alpha}"
            )));
        }
        Ok(Self {
            alpha,
            ..Self::default()
        })
    }

    pub fn coefficients(&self) -> Option<&[f64]> {
        self.fitted.as_ref().map(|f| f.coefficients.as_slice())
    }

    pub fn intercept(&self) -> Option<f64> {
        self.fitted.as_ref().map(|f| f.intercept)
    }
}

fn soft_threshold(value: f64, threshold: f64) -> f64 {
    if value > threshold {
        value - threshold
    } else if value < -threshold {
        value + threshold
    } else {
        0.0
    }
}

impl Model for Lasso {
    fn name(&self) -> &'static str {
        LASSO
    }

    fn model_type(&self) -> ModelType {
        ModelType::Regression
    }

    #[allow(clippy::cast_precision_loss)]
    fn fit(&mut self, x: ArrayView2<'_, f64>, y: ArrayView1<'_, f64>) -> Result<()> {
        check_training_data(x, y)?;
        let n = x.nrows() as f64;

        let x_mean = x.mean_axis(Axis(0)).unwrap_or_else(|| Array1::zeros(x.ncols()));
        let y_mean = y.sum() / n;
        let centred = &x - &x_mean;
        let mut residual = y.mapv(|v| v - y_mean);

        let norms: Vec<f64> = centred
            .axis_iter(Axis(1))
            .map(|col| col.dot(&col) / n)
            .collect();
        let mut weights = vec![0.0; x.ncols()];

        for _ in 0..self.max_iter {
            let mut max_delta = 0.0_f64;
            for (j, column) in centred.axis_iter(Axis(1)).enumerate() {
                if norms[j] == 0.0 {
                    continue;
                }
                let rho = column.dot(&residual) / n + norms[j] * weights[j];
                let updated = soft_threshold(rho, self.alpha) / norms[j];
                let delta = updated - weights[j];
                if delta != 0.0 {
                    residual.scaled_add(-delta, &column);
                    weights[j] = updated;
                    max_delta = max_delta.max(delta.abs());
                }
            }
            if max_delta < self.tolerance {
                break;
            }
        }

        let intercept = y_mean - x_mean.dot(&Array1::from(weights.clone()));
        self.fitted = Some(LinearFit {
            coefficients: weights,
            intercept,
        });
        Ok(())
    }

    fn predict(&self, x: ArrayView2<'_, f64>) -> Result<Array1<f64>> {
        let fitted = self.fitted.as_ref().ok_or_else(|| not_fitted(LASSO))?;
        check_prediction_data(x, fitted.coefficients.len())?;
        let weights = Array1::from(fitted.coefficients.clone());
        Ok(x.dot(&weights) + fitted.intercept)
    }

    fn parameters(&self) -> Result<Value> {
        to_parameters(self)
    }

    fn restore(&mut self, parameters: Value) -> Result<()> {
        *self = from_parameters(LASSO, parameters)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{Array2, array};

    fn line() -> (Array2<f64>, Array1<f64>) {
        let x = Array2::from_shape_fn((10, 1), |(i, _)| i as f64);
        let y = x.column(0).mapv(|v| 2.0 * v + 1.0);
        (x, y)
    }

    #[test]
    fn test_default_alpha_shrinks_slope() {
        let (x, y) = line();
        let mut model = Lasso::default();
        model.fit(x.view(), y.view()).unwrap();

        // var(x) = 8.25, cov(x, y) = 16.5, slope = (16.5 - 1) / 8.25
        let slope = model.coefficients().unwrap()[0];
        assert!((slope - 15.5 / 8.25).abs() < 1e-6);
        assert!((model.intercept().unwrap() - (10.0 - 4.5 * slope)).abs() < 1e-6);
    }

    #[test]
    fn test_small_alpha_approaches_least_squares() {
        let (x, y) = line();
        let mut model = Lasso::new(1e-6).unwrap();
        model.fit(x.view(), y.view()).unwrap();
        assert!((model.coefficients().unwrap()[0] - 2.0).abs() < 1e-4);
        assert!((model.intercept().unwrap() - 1.0).abs() < 1e-3);
    }

    #[test]
    fn test_large_alpha_zeroes_weights() {
        let (x, y) = line();
        let mut model = Lasso::new(100.0).unwrap();
        model.fit(x.view(), y.view()).unwrap();

        assert_eq!(model.coefficients().unwrap(), &[0.0]);
        let predicted = model.predict(array![[0.0], [100.0]].view()).unwrap();
        assert!((predicted[0] - 10.0).abs() < 1e-12);
        assert!((predicted[1] - 10.0).abs() < 1e-12);
    }

    #[test]
    fn test_constant_feature_ignored() {
        let x = array![[0.0, 5.0], [1.0, 5.0], [2.0, 5.0], [3.0, 5.0]];
        let y = array![0.0, 1.0, 2.0, 3.0];
        let mut model = Lasso::new(0.01).unwrap();
        model.fit(x.view(), y.view()).unwrap();
        assert_eq!(model.coefficients().unwrap()[1], 0.0);
    }

    #[test]
    fn test_rejects_negative_alpha() {
        assert!(matches!(Lasso::new(-1.0), Err(Error::InvalidArgument(_))));
    }
}
