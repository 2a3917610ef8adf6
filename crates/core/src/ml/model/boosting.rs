//! Least-squares gradient boosting over regression trees.

use ndarray::{Array1, ArrayView1, ArrayView2};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::tree::{Criterion, DecisionTree, TreeBuilder, TreeParams};
use super::{
    GRADIENT_BOOSTING, Model, ModelType, check_prediction_data, check_training_data,
    from_parameters, not_fitted, to_parameters,
};
use crate::error::Result;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct BoostedEnsemble {
    n_features: usize,
    initial: f64,
    trees: Vec<DecisionTree>,
}

impl BoostedEnsemble {
    fn predict(&self, x: ArrayView2<'_, f64>, learning_rate: f64) -> Array1<f64> {
        x.rows()
            .into_iter()
            .map(|row| {
                self.trees
                    .iter()
                    .fold(self.initial, |acc, tree| acc + learning_rate * tree.predict_row(row))
            })
            .collect()
    }
}

/// Starts from the target mean and adds `n_estimators` shrunken trees, each fitted to the
/// residuals of the ensemble so far.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GradientBoosting {
    n_estimators: usize,
    learning_rate: f64,
    max_depth: usize,
    min_samples_split: usize,
    fitted: Option<BoostedEnsemble>,
}

impl Default for GradientBoosting {
    fn default() -> Self {
        Self {
            n_estimators: 100,
            learning_rate: 0.1,
            max_depth: 3,
            min_samples_split: 2,
            fitted: None,
        }
    }
}

impl Model for GradientBoosting {
    fn name(&self) -> &'static str {
        GRADIENT_BOOSTING
    }

    fn model_type(&self) -> ModelType {
        ModelType::Regression
    }

    #[allow(clippy::cast_precision_loss)]
    fn fit(&mut self, x: ArrayView2<'_, f64>, y: ArrayView1<'_, f64>) -> Result<()> {
        check_training_data(x, y)?;
        let params = TreeParams {
            max_depth: self.max_depth,
            min_samples_split: self.min_samples_split,
            max_features: None,
        };
        let rows: Vec<usize> = (0..x.nrows()).collect();

        let initial = y.sum() / y.len() as f64;
        let mut current = Array1::from_elem(y.len(), initial);
        let mut trees = Vec::with_capacity(self.n_estimators);

        for _ in 0..self.n_estimators {
            let residual = &y - &current;
            let tree = TreeBuilder::new(x.view(), residual.view(), params, Criterion::Variance)
                .build(&rows, None);
            for (value, row) in current.iter_mut().zip(x.rows()) {
                *value += self.learning_rate * tree.predict_row(row);
            }
            trees.push(tree);
        }

        self.fitted = Some(BoostedEnsemble {
            n_features: x.ncols(),
            initial,
            trees,
        });
        Ok(())
    }

    fn predict(&self, x: ArrayView2<'_, f64>) -> Result<Array1<f64>> {
        let fitted = self.fitted.as_ref().ok_or_else(|| not_fitted(GRADIENT_BOOSTING))?;
        check_prediction_data(x, fitted.n_features)?;
        Ok(fitted.predict(x, self.learning_rate))
    }

    fn parameters(&self) -> Result<Value> {
        to_parameters(self)
    }

    fn restore(&mut self, parameters: Value) -> Result<()> {
        *self = from_parameters(GRADIENT_BOOSTING, parameters)?;
        Ok(())
    }
}
