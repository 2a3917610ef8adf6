//! Random forest classification.

use ndarray::{Array1, ArrayView1, ArrayView2};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::tree::{Criterion, DecisionTree, TreeBuilder, TreeParams};
use super::{
    Model, ModelType, RANDOM_FOREST, check_prediction_data, check_training_data, class_count,
    from_parameters, majority, not_fitted, to_parameters,
};
use crate::error::Result;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct Forest {
    n_features: usize,
    n_classes: usize,
    trees: Vec<DecisionTree>,
}

/// Bagged Gini trees, each split drawing `max(1, ⌊√p⌋)` candidate features.
///
/// Bootstrap samples and feature draws come from a generator seeded with `seed`, so a fit
/// on the same data always yields the same forest.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RandomForest {
    n_estimators: usize,
    max_depth: usize,
    min_samples_split: usize,
    seed: u64,
    fitted: Option<Forest>,
}

impl Default for RandomForest {
    fn default() -> Self {
        Self {
            n_estimators: 100,
            max_depth: 16,
            min_samples_split: 2,
            seed: 42,
            fitted: None,
        }
    }
}

impl RandomForest {
    #[must_use]
    pub const fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    #[must_use]
    pub const fn with_estimators(mut self, n_estimators: usize) -> Self {
        self.n_estimators = n_estimators;
        self
    }
}

#[allow(
    clippy::cast_possible_truncation,
    clippy::cast_precision_loss,
    clippy::cast_sign_loss
)]
fn features_per_split(n_features: usize) -> usize {
    ((n_features as f64).sqrt().floor() as usize).max(1)
}

impl Model for RandomForest {
    fn name(&self) -> &'static str {
        RANDOM_FOREST
    }

    fn model_type(&self) -> ModelType {
        ModelType::Classification
    }

    fn fit(&mut self, x: ArrayView2<'_, f64>, y: ArrayView1<'_, f64>) -> Result<()> {
        check_training_data(x, y)?;
        let n_classes = class_count(y)?;
        let n_rows = x.nrows();
        let params = TreeParams {
            max_depth: self.max_depth,
            min_samples_split: self.min_samples_split,
            max_features: Some(features_per_split(x.ncols())),
        };

        let mut rng = StdRng::seed_from_u64(self.seed);
        let mut trees = Vec::with_capacity(self.n_estimators);
        for _ in 0..self.n_estimators {
            let sample: Vec<usize> = (0..n_rows).map(|_| rng.random_range(0..n_rows)).collect();
            let tree = TreeBuilder::new(x.view(), y.view(), params, Criterion::Gini { n_classes })
                .build(&sample, Some(&mut rng));
            trees.push(tree);
        }

        self.fitted = Some(Forest {
            n_features: x.ncols(),
            n_classes,
            trees,
        });
        Ok(())
    }

    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    fn predict(&self, x: ArrayView2<'_, f64>) -> Result<Array1<f64>> {
        let fitted = self.fitted.as_ref().ok_or_else(|| not_fitted(RANDOM_FOREST))?;
        check_prediction_data(x, fitted.n_features)?;

        Ok(x.rows()
            .into_iter()
            .map(|row| {
                let mut votes = vec![0usize; fitted.n_classes.max(1)];
                for tree in &fitted.trees {
                    let class = tree.predict_row(row);
                    if class.is_finite() && class >= 0.0 {
                        let idx = (class as usize).min(votes.len() - 1);
                        votes[idx] += 1;
                    }
                }
                majority(&votes)
            })
            .collect())
    }

    fn parameters(&self) -> Result<Value> {
        to_parameters(self)
    }

    fn restore(&mut self, parameters: Value) -> Result<()> {
        *self = from_parameters(RANDOM_FOREST, parameters)?;
        Ok(())
    }
}
