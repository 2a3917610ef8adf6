//! k-nearest-neighbours classification.

use ndarray::{Array1, ArrayView1, ArrayView2};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{
    K_NEAREST_NEIGHBORS, Model, ModelType, check_prediction_data, check_training_data,
    class_count, from_parameters, majority, not_fitted, to_parameters,
};
use crate::error::{Error, Result};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct Neighbours {
    n_classes: usize,
    points: Vec<Vec<f64>>,
    labels: Vec<f64>,
}

/// Majority vote among the `k` training points closest in Euclidean distance.
///
/// Equal distances are broken by training order; tied votes go to the lowest class index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KNearestNeighbors {
    k: usize,
    fitted: Option<Neighbours>,
}

impl Default for KNearestNeighbors {
    fn default() -> Self {
        Self { k: 3, fitted: None }
    }
}

impl KNearestNeighbors {
    pub fn new(k: usize) -> Result<Self> {
        if k == 0 {
            return Err(Error::invalid_argument("k must be at least 1"));
        }
        Ok(Self { k, fitted: None })
    }

    pub const fn k(&self) -> usize {
        self.k
    }
}

fn squared_distance(a: ArrayView1<'_, f64>, b: &[f64]) -> f64 {
    a.iter().zip(b).map(|(x, y)| (x - y).powi(2)).sum()
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn vote(neighbours: &Neighbours, row: ArrayView1<'_, f64>, k: usize) -> f64 {
    let mut distances: Vec<(f64, usize)> = neighbours
        .points
        .iter()
        .enumerate()
        .map(|(idx, point)| (squared_distance(row, point), idx))
        .collect();
    distances.sort_by(|a, b| a.0.total_cmp(&b.0).then(a.1.cmp(&b.1)));

    let mut counts = vec![0usize; neighbours.n_classes];
    for &(_, idx) in distances.iter().take(k) {
        let class = (neighbours.labels[idx] as usize).min(neighbours.n_classes - 1);
        counts[class] += 1;
    }
    majority(&counts)
}

impl Model for KNearestNeighbors {
    fn name(&self) -> &'static str {
        K_NEAREST_NEIGHBORS
    }

    fn model_type(&self) -> ModelType {
        ModelType::Classification
    }

    fn fit(&mut self, x: ArrayView2<'_, f64>, y: ArrayView1<'_, f64>) -> Result<()> {
        check_training_data(x, y)?;
        let n_classes = class_count(y)?;
        self.fitted = Some(Neighbours {
            n_classes,
            points: x.rows().into_iter().map(|row| row.to_vec()).collect(),
            labels: y.to_vec(),
        });
        Ok(())
    }

    fn predict(&self, x: ArrayView2<'_, f64>) -> Result<Array1<f64>> {
        let fitted = self.fitted.as_ref().ok_or_else(|| not_fitted(K_NEAREST_NEIGHBORS))?;
        let n_features = fitted.points.first().map_or(0, Vec::len);
        check_prediction_data(x, n_features)?;
        if fitted.n_classes == 0 {
            return Err(Error::serialization("k_nearest_neighbors state has no classes"));
        }
        Ok(x.rows()
            .into_iter()
            .map(|row| vote(fitted, row, self.k))
            .collect())
    }

    fn parameters(&self) -> Result<Value> {
        to_parameters(self)
    }

    fn restore(&mut self, parameters: Value) -> Result<()> {
        *self = from_parameters(K_NEAREST_NEIGHBORS, parameters)?;
        Ok(())
    }
}
