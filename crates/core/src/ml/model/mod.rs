//! Trainable models behind a common fit/predict contract.
//!
//! Every model serializes its hyperparameters and learned state as one JSON document
//! ([`Model::parameters`]) and can be rebuilt from it ([`Model::restore`]).
//!
//! | identifier | type |
//! |---|---|
//! | `multiple_linear_regression` | regression |
//! | `lasso` | regression |
//! | `gradient_boosting` | regression |
//! | `k_nearest_neighbors` | classification |
//! | `random_forest` | classification |
//! | `logistic_regression` | classification |

mod boosting;
mod forest;
mod knn;
mod lasso;
mod linear;
mod logistic;
mod tree;

use std::fmt;

use ndarray::{Array1, ArrayView1, ArrayView2};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use crate::artifact::{Artifact, ArtifactType};
use crate::error::{Error, Result};

pub use boosting::GradientBoosting;
pub use forest::RandomForest;
pub use knn::KNearestNeighbors;
pub use lasso::Lasso;
pub use linear::MultipleLinearRegression;
pub use logistic::LogisticRegression;

pub const MULTIPLE_LINEAR_REGRESSION: &str = "multiple_linear_regression";
pub const LASSO: &str = "lasso";
pub const GRADIENT_BOOSTING: &str = "gradient_boosting";
pub const K_NEAREST_NEIGHBORS: &str = "k_nearest_neighbors";
pub const RANDOM_FOREST: &str = "random_forest";
pub const LOGISTIC_REGRESSION: &str = "logistic_regression";

pub const REGRESSION_MODELS: &[&str] = &[MULTIPLE_LINEAR_REGRESSION, LASSO, GRADIENT_BOOSTING];
pub const CLASSIFICATION_MODELS: &[&str] =
    &[K_NEAREST_NEIGHBORS, RANDOM_FOREST, LOGISTIC_REGRESSION];

/// Learning task a model solves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModelType {
    Regression,
    Classification,
}

impl ModelType {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Regression => "regression",
            Self::Classification => "classification",
        }
    }
}

impl fmt::Display for ModelType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<ModelType> for ArtifactType {
    fn from(value: ModelType) -> Self {
        match value {
            ModelType::Regression => Self::Regression,
            ModelType::Classification => Self::Classification,
        }
    }
}

/// A trainable model.
///
/// Classification models expect targets that are class indices `0..k` encoded as `f64`
/// and predict values from the same set.
pub trait Model: fmt::Debug + Send {
    /// Factory identifier.
    fn name(&self) -> &'static str;

    fn model_type(&self) -> ModelType;

    /// Train on `x` (one row per observation) and `y`.
    fn fit(&mut self, x: ArrayView2<'_, f64>, y: ArrayView1<'_, f64>) -> Result<()>;

    /// Predict one value per row of `x`. Fails with InvalidState before `fit`.
    fn predict(&self, x: ArrayView2<'_, f64>) -> Result<Array1<f64>>;

    /// Hyperparameters and learned state as an independent JSON document.
    fn parameters(&self) -> Result<Value>;

    /// Replace this model's state with a document produced by [`Model::parameters`].
    fn restore(&mut self, parameters: Value) -> Result<()>;

    /// Package `{type, model, parameters}` as a JSON artifact typed after the model.
    fn to_artifact(&self, name: &str, asset_path: &str) -> Result<Artifact> {
        let document = json!({
            "type": self.model_type(),
            "model": self.name(),
            "parameters": self.parameters()?,
        });
        let data = serde_json::to_vec(&document)?;
        Ok(Artifact::new(name, self.model_type().into(), asset_path)
            .with_data(data)
            .with_tag(self.name()))
    }
}

/// Build a fresh, unfitted model from its identifier.
pub fn get_model(name: &str) -> Result<Box<dyn Model>> {
    let model: Box<dyn Model> = match name {
        MULTIPLE_LINEAR_REGRESSION => Box::new(MultipleLinearRegression::default()),
        LASSO => Box::new(Lasso::default()),
        GRADIENT_BOOSTING => Box::new(GradientBoosting::default()),
        K_NEAREST_NEIGHBORS => Box::new(KNearestNeighbors::default()),
        RANDOM_FOREST => Box::new(RandomForest::default()),
        LOGISTIC_REGRESSION => Box::new(LogisticRegression::default()),
        other => return Err(Error::UnknownName(format!("model {other}"))),
    };
    Ok(model)
}

/// Serialize a model's whole state.
pub(crate) fn to_parameters<T: Serialize>(model: &T) -> Result<Value> {
    Ok(serde_json::to_value(model)?)
}

/// Decode a model's whole state.
pub(crate) fn from_parameters<T: DeserializeOwned>(name: &str, parameters: Value) -> Result<T> {
    serde_json::from_value(parameters)
        .map_err(|e| Error::serialization(format!("{name} parameters: {e}")))
}

/// Shared preconditions of every `fit`.
pub(crate) fn check_training_data(x: ArrayView2<'_, f64>, y: ArrayView1<'_, f64>) -> Result<()> {
    if x.nrows() == 0 || x.ncols() == 0 {
        return Err(Error::invalid_argument(format!(
            "training data must be non-empty, got {}x{}",
            x.nrows(),
            x.ncols()
        )));
    }
    if x.nrows() != y.len() {
        return Err(Error::invalid_argument(format!(
            "x has {} rows but y has {} values",
            x.nrows(),
            y.len()
        )));
    }
    if x.iter().chain(y.iter()).any(|v| !v.is_finite()) {
        return Err(Error::invalid_argument("training data contains non-finite values"));
    }
    Ok(())
}

/// Shared preconditions of every `predict`.
pub(crate) fn check_prediction_data(x: ArrayView2<'_, f64>, n_features: usize) -> Result<()> {
    if x.ncols() != n_features {
        return Err(Error::invalid_argument(format!(
            "model was fitted on {n_features} features, got {}",
            x.ncols()
        )));
    }
    if x.iter().any(|v| !v.is_finite()) {
        return Err(Error::invalid_argument("prediction data contains non-finite values"));
    }
    Ok(())
}

pub(crate) fn not_fitted(name: &str) -> Error {
    Error::invalid_state(format!("{name} must be fitted before predict"))
}

/// Number of classes in a class-index target, failing on values that are not indices.
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub(crate) fn class_count(y: ArrayView1<'_, f64>) -> Result<usize> {
    let mut max = 0.0_f64;
    for &v in y {
        if v < 0.0 || v.fract() != 0.0 {
            return Err(Error::invalid_argument(format!(
                "classification target must contain class indices, found {v}"
            )));
        }
        max = max.max(v);
    }
    Ok(max as usize + 1)
}

/// Index of the largest count, preferring the lowest index on ties.
#[allow(clippy::cast_precision_loss)]
pub(crate) fn majority(counts: &[usize]) -> f64 {
    let mut best = 0;
    for (idx, &count) in counts.iter().enumerate() {
        if count > counts[best] {
            best = idx;
        }
    }
    best as f64
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_factory_builds_every_model() {
        for name in REGRESSION_MODELS {
            let model = get_model(name).unwrap();
            assert_eq!(model.name(), *name);
            assert_eq!(model.model_type(), ModelType::Regression);
        }
        for name in CLASSIFICATION_MODELS {
            let model = get_model(name).unwrap();
            assert_eq!(model.name(), *name);
            assert_eq!(model.model_type(), ModelType::Classification);
        }
        assert!(matches!(get_model("svm"), Err(Error::UnknownName(_))));
    }

    #[test]
    fn test_predict_before_fit_is_invalid_state() {
        let x = array![[1.0], [2.0]];
        for name in REGRESSION_MODELS.iter().chain(CLASSIFICATION_MODELS) {
            let model = get_model(name).unwrap();
            assert!(
                matches!(model.predict(x.view()), Err(Error::InvalidState(_))),
                "{name}"
            );
        }
    }

    #[test]
    fn test_fit_rejects_bad_input() {
        let mut model = get_model(MULTIPLE_LINEAR_REGRESSION).unwrap();
        let x = array![[1.0], [2.0]];
        assert!(matches!(
            model.fit(x.view(), array![1.0].view()),
            Err(Error::InvalidArgument(_))
        ));
        assert!(matches!(
            model.fit(array![[1.0], [f64::NAN]].view(), array![1.0, 2.0].view()),
            Err(Error::InvalidArgument(_))
        ));
        let empty = ndarray::Array2::<f64>::zeros((0, 1));
        assert!(matches!(
            model.fit(empty.view(), ndarray::Array1::<f64>::zeros(0).view()),
            Err(Error::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_parameters_restore_round_trip() {
        let x = array![[0.0, 1.0], [1.0, 0.0], [2.0, 1.0], [3.0, 0.0], [4.0, 1.0], [5.0, 0.0]];
        let y_reg = array![1.0, 2.0, 5.0, 6.0, 9.0, 10.0];
        let y_cls = array![0.0, 0.0, 1.0, 1.0, 2.0, 2.0];

        for name in REGRESSION_MODELS.iter().chain(CLASSIFICATION_MODELS) {
            let mut model = get_model(name).unwrap();
            let y = match model.model_type() {
                ModelType::Regression => y_reg.view(),
                ModelType::Classification => y_cls.view(),
            };
            model.fit(x.view(), y).unwrap();
            let expected = model.predict(x.view()).unwrap();

            let mut restored = get_model(name).unwrap();
            restored.restore(model.parameters().unwrap()).unwrap();
            assert_eq!(restored.predict(x.view()).unwrap(), expected, "{name}");
        }
    }

    #[test]
    fn test_restore_rejects_malformed_parameters() {
        let mut model = get_model(LASSO).unwrap();
        assert!(matches!(
            model.restore(json!({"alpha": "high"})),
            Err(Error::Serialization(_))
        ));
    }

    #[test]
    fn test_to_artifact() {
        let mut model = get_model(MULTIPLE_LINEAR_REGRESSION).unwrap();
        model
            .fit(array![[1.0], [2.0], [3.0]].view(), array![3.0, 5.0, 7.0].view())
            .unwrap();

        let artifact = model.to_artifact("lr", "model/lr").unwrap();
        assert_eq!(*artifact.artifact_type(), ArtifactType::Regression);
        assert_eq!(artifact.tags(), vec![MULTIPLE_LINEAR_REGRESSION]);

        let document: Value = serde_json::from_slice(&artifact.read().unwrap()).unwrap();
        assert_eq!(document["type"], "regression");
        assert_eq!(document["parameters"], model.parameters().unwrap());
    }

    #[test]
    fn test_class_count() {
        assert_eq!(class_count(array![0.0, 2.0, 1.0].view()).unwrap(), 3);
        assert!(class_count(array![0.5].view()).is_err());
        assert!(class_count(array![-1.0].view()).is_err());
        assert!((majority(&[2, 3, 3]) - 1.0).abs() < f64::EPSILON);
    }
}
