//! Ordinary least squares in closed form.

use ndarray::{Array1, Array2, ArrayView1, ArrayView2, Axis, concatenate};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{
    MULTIPLE_LINEAR_REGRESSION, Model, ModelType, check_prediction_data, check_training_data,
    from_parameters, not_fitted, to_parameters,
};
use crate::error::{Error, Result};

/// Relative pivot size below which a matrix is treated as singular.
const SINGULAR_TOLERANCE: f64 = 1e-12;

/// `w = (XᵀX)⁻¹Xᵀy` over `X` with a trailing column of ones.
///
/// A complete one-hot block sums to the column of ones, so a design matrix holding any
/// one-hot encoded categorical input is rank deficient and `fit` fails with
/// [`Error::SingularMatrix`]. Use numerical inputs, or a regularized model such as lasso,
/// for categorical data.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MultipleLinearRegression {
    /// One weight per feature followed by the intercept.
    coefficients: Option<Vec<f64>>,
}

impl MultipleLinearRegression {
    /// Learned weights, intercept last.
    pub fn coefficients(&self) -> Option<&[f64]> {
        self.coefficients.as_deref()
    }
}

fn with_bias(x: ArrayView2<'_, f64>) -> Result<Array2<f64>> {
    let ones = Array2::<f64>::ones((x.nrows(), 1));
    concatenate(Axis(1), &[x.view(), ones.view()])
        .map_err(|e| Error::invalid_argument(format!("design matrix: {e}")))
}

/// Gauss-Jordan inverse with partial pivoting.
pub(crate) fn invert(matrix: &Array2<f64>) -> Result<Array2<f64>> {
    let n = matrix.nrows();
    if n != matrix.ncols() {
        return Err(Error::invalid_argument("cannot invert a non-square matrix"));
    }

    let scale = matrix.iter().fold(0.0_f64, |acc, v| acc.max(v.abs())).max(1.0);
    let mut a = matrix.clone();
    let mut inv = Array2::<f64>::eye(n);

    for col in 0..n {
        let pivot_row = (col..n)
            .max_by(|&i, &j| a[[i, col]].abs().total_cmp(&a[[j, col]].abs()))
            .unwrap_or(col);
        let pivot = a[[pivot_row, col]];
        if pivot.abs() <= SINGULAR_TOLERANCE * scale {
            return Err(Error::SingularMatrix(format!(
                "{n}x{n} matrix has no inverse (pivot {pivot:e} in column {col})"
            )));
        }

        if pivot_row != col {
            for k in 0..n {
                a.swap([pivot_row, k], [col, k]);
                inv.swap([pivot_row, k], [col, k]);
            }
        }

        for k in 0..n {
            a[[col, k]] /= pivot;
            inv[[col, k]] /= pivot;
        }

        for row in 0..n {
            if row == col {
                continue;
            }
            let factor = a[[row, col]];
            if factor == 0.0 {
                continue;
            }
            for k in 0..n {
                a[[row, k]] -= factor * a[[col, k]];
                inv[[row, k]] -= factor * inv[[col, k]];
            }
        }
    }

    Ok(inv)
}

impl Model for MultipleLinearRegression {
    fn name(&self) -> &'static str {
        MULTIPLE_LINEAR_REGRESSION
    }

    fn model_type(&self) -> ModelType {
        ModelType::Regression
    }

    fn fit(&mut self, x: ArrayView2<'_, f64>, y: ArrayView1<'_, f64>) -> Result<()> {
        check_training_data(x, y)?;
        let design = with_bias(x)?;
        let gram = design.t().dot(&design);
        let inverse = invert(&gram)?;
        let weights = inverse.dot(&design.t().dot(&y));
        self.coefficients = Some(weights.to_vec());
        Ok(())
    }

    fn predict(&self, x: ArrayView2<'_, f64>) -> Result<Array1<f64>> {
        let coefficients = self
            .coefficients
            .as_ref()
            .ok_or_else(|| not_fitted(MULTIPLE_LINEAR_REGRESSION))?;
        let n_features = coefficients
            .len()
            .checked_sub(1)
            .ok_or_else(|| not_fitted(MULTIPLE_LINEAR_REGRESSION))?;
        check_prediction_data(x, n_features)?;
        let design = with_bias(x)?;
        Ok(design.dot(&Array1::from(coefficients.clone())))
    }

    fn parameters(&self) -> Result<Value> {
        to_parameters(self)
    }

    fn restore(&mut self, parameters: Value) -> Result<()> {
        *self = from_parameters(MULTIPLE_LINEAR_REGRESSION, parameters)?;
        Ok(())
    }
}
