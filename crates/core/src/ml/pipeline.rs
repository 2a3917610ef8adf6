//! Train/evaluate/serialize workflow over a dataset, one model and a set of metrics.
//!
//! `execute` is deterministic: rows are split without shuffling, categories and classes are
//! ordered lexicographically, and every model seeds its own randomness.

use std::fmt;

use ndarray::{ArrayView1, Axis};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tracing::{debug, info, instrument};

use crate::artifact::{Artifact, ArtifactType};
use crate::error::{Error, Result};
use crate::ml::codec;
use crate::ml::dataset::Dataset;
use crate::ml::encoding::{FeatureEncoder, TargetValue};
use crate::ml::feature::{Feature, FeatureType};
use crate::ml::frame::DataFrame;
use crate::ml::metric::{Metric, get_metric};
use crate::ml::model::{Model, ModelType, get_model};
use crate::registry::ArtifactRegistry;

/// One metric evaluated on one partition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricScore {
    pub metric: String,
    pub value: f64,
}

/// Metric scores on both partitions, in metric order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Evaluation {
    pub train_metrics: Vec<MetricScore>,
    pub test_metrics: Vec<MetricScore>,
}

/// Outcome of [`Pipeline::execute`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineResult {
    pub train_metrics: Vec<MetricScore>,
    pub test_metrics: Vec<MetricScore>,
    pub test_predictions: Vec<TargetValue>,
    pub test_ground_truth: Vec<TargetValue>,
}

/// Identity of the dataset a pipeline was built on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatasetRef {
    pub id: String,
    pub name: String,
    pub version: String,
    pub asset_path: String,
}

impl DatasetRef {
    fn of(dataset: &Dataset) -> Self {
        Self {
            id: dataset.id(),
            name: dataset.name().to_string(),
            version: dataset.version().to_string(),
            asset_path: dataset.asset_path().to_string(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct ModelDocument {
    name: String,
    #[serde(rename = "type")]
    model_type: ModelType,
    parameters: Value,
}

/// Payload of the pipeline blob.
#[derive(Debug, Serialize, Deserialize)]
struct PipelineDocument {
    dataset: DatasetRef,
    model: ModelDocument,
    metrics: Vec<String>,
    input_features: Vec<Feature>,
    target_feature: Feature,
    split: f64,
    encoder: FeatureEncoder,
    #[serde(default)]
    evaluation: Option<Evaluation>,
}

/// Serializable description of a pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineSummary {
    pub dataset: DatasetRef,
    pub model: String,
    pub model_type: ModelType,
    pub metrics: Vec<String>,
    pub input_features: Vec<Feature>,
    pub target_feature: Feature,
    pub split: f64,
    pub fitted: bool,
    pub encoded_columns: Vec<String>,
    pub evaluation: Option<Evaluation>,
}

/// Number of training rows for `n` rows at ratio `split`.
#[allow(
    clippy::cast_possible_truncation,
    clippy::cast_precision_loss,
    clippy::cast_sign_loss
)]
pub fn train_size(n: usize, split: f64) -> usize {
    ((split * n as f64).floor() as usize).min(n)
}

pub struct Pipeline {
    dataset: Dataset,
    model: Box<dyn Model>,
    metrics: Vec<Box<dyn Metric>>,
    input_features: Vec<Feature>,
    target_feature: Feature,
    split: f64,
    encoder: Option<FeatureEncoder>,
    evaluation: Option<Evaluation>,
}

impl fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pipeline")
            .field("dataset", &self.dataset.id())
            .field("model", &self.model.name())
            .field("metrics", &self.metrics())
            .field("input_features", &self.input_features)
            .field("target_feature", &self.target_feature)
            .field("split", &self.split)
            .field("fitted", &self.encoder.is_some())
            .finish()
    }
}

impl Pipeline {
    /// Assemble a pipeline, validating its configuration.
    pub fn new(
        dataset: Dataset,
        model: Box<dyn Model>,
        metrics: Vec<Box<dyn Metric>>,
        input_features: Vec<Feature>,
        target_feature: Feature,
        split: f64,
    ) -> Result<Self> {
        if !(split > 0.0 && split < 1.0) {
            return Err(Error::invalid_argument(format!(
                "split must be strictly between 0 and 1, got {split}"
            )));
        }
        if input_features.is_empty() {
            return Err(Error::invalid_argument("at least one input feature is required"));
        }
        for (idx, feature) in input_features.iter().enumerate() {
            if feature.name() == target_feature.name() {
                return Err(Error::invalid_argument(format!(
                    "target feature {} is also an input feature",
                    feature.name()
                )));
            }
            if input_features[..idx].iter().any(|f| f.name() == feature.name()) {
                return Err(Error::invalid_argument(format!(
                    "input feature {} is listed twice",
                    feature.name()
                )));
            }
        }

        let expected = match target_feature.feature_type() {
            FeatureType::Categorical => ModelType::Classification,
            FeatureType::Numerical => ModelType::Regression,
        };
        if model.model_type() != expected {
            return Err(Error::invalid_argument(format!(
                "{} target {} requires a {expected} model, got {} ({})",
                target_feature.feature_type(),
                target_feature.name(),
                model.name(),
                model.model_type()
            )));
        }

        Ok(Self {
            dataset,
            model,
            metrics,
            input_features,
            target_feature,
            split,
            encoder: None,
            evaluation: None,
        })
    }

    /// Split, fit, predict and evaluate. Nothing is persisted.
    #[instrument(skip(self), fields(dataset = %self.dataset.id(), model = self.model.name()))]
    pub fn execute(&mut self) -> Result<PipelineResult> {
        let frame = self.dataset.read()?;
        let encoder = FeatureEncoder::fit(&frame, &self.input_features, &self.target_feature)?;
        let x = encoder.transform(&frame)?;
        let y = encoder.transform_target(&frame)?;

        let n = frame.n_rows();
        let n_train = train_size(n, self.split);
        if n_train == 0 {
            return Err(Error::invalid_argument(format!(
                "split {} of {n} rows leaves no training data",
                self.split
            )));
        }
        debug!(rows = n, train = n_train, test = n - n_train, columns = x.ncols(), "Split dataset");

        let (x_train, x_test) = x.view().split_at(Axis(0), n_train);
        let (y_train, y_test) = y.view().split_at(Axis(0), n_train);

        self.model.fit(x_train, y_train)?;
        let train_predictions = self.model.predict(x_train)?;
        let test_predictions = self.model.predict(x_test)?;

        let train_metrics = self.evaluate(y_train, train_predictions.view())?;
        let test_metrics = if y_test.is_empty() {
            Vec::new()
        } else {
            self.evaluate(y_test, test_predictions.view())?
        };

        let result = PipelineResult {
            train_metrics: train_metrics.clone(),
            test_metrics: test_metrics.clone(),
            test_predictions: encoder.decode_target(test_predictions.view()),
            test_ground_truth: encoder.decode_target(y_test),
        };

        for score in &test_metrics {
            info!(metric = %score.metric, value = score.value, "Test metric");
        }
        self.encoder = Some(encoder);
        self.evaluation = Some(Evaluation {
            train_metrics,
            test_metrics,
        });
        Ok(result)
    }

    fn evaluate(
        &self,
        ground_truth: ArrayView1<'_, f64>,
        prediction: ArrayView1<'_, f64>,
    ) -> Result<Vec<MetricScore>> {
        self.metrics
            .iter()
            .map(|metric| -> Result<MetricScore> {
                Ok(MetricScore {
                    metric: metric.name().to_string(),
                    value: metric.evaluate(ground_truth, prediction)?,
                })
            })
            .collect()
    }

    /// Predict target values for `frame`, which must contain every input column.
    pub fn predict(&self, frame: &DataFrame) -> Result<Vec<TargetValue>> {
        let encoder = self.fitted_encoder()?;
        let x = encoder.transform(frame)?;
        let predictions = self.model.predict(x.view())?;
        Ok(encoder.decode_target(predictions.view()))
    }

    /// Predict target values for CSV rows, decoding categorical inputs as text.
    pub fn predict_csv(&self, bytes: &[u8]) -> Result<Vec<TargetValue>> {
        let frame = DataFrame::from_csv_with_kinds(bytes, &self.fitted_encoder()?.input_kinds())?;
        self.predict(&frame)
    }

    fn fitted_encoder(&self) -> Result<&FeatureEncoder> {
        self.encoder
            .as_ref()
            .ok_or_else(|| Error::invalid_state("pipeline has not been executed"))
    }

    /// Serialize the fitted pipeline into a `pipeline` artifact.
    #[instrument(skip(self), fields(model = self.model.name()))]
    pub fn save(&self, name: &str, version: &str, asset_path: &str) -> Result<Artifact> {
        let encoder = self.fitted_encoder()?.clone();
        let document = PipelineDocument {
            dataset: DatasetRef::of(&self.dataset),
            model: ModelDocument {
                name: self.model.name().to_string(),
                model_type: self.model.model_type(),
                parameters: self.model.parameters()?,
            },
            metrics: self.metrics(),
            input_features: self.input_features.clone(),
            target_feature: self.target_feature.clone(),
            split: self.split,
            encoder,
            evaluation: self.evaluation.clone(),
        };
        let blob = codec::encode(&document)?;
        debug!(bytes = blob.len(), "Encoded pipeline");

        Ok(Artifact::new(name, ArtifactType::Pipeline, asset_path)
            .with_version(version)
            .with_data(blob)
            .with_tag(self.model.model_type().as_str())
            .with_metadata("model", self.model.name())
            .with_metadata("metrics", json!(self.metrics()))
            .with_metadata("dataset_id", self.dataset.id())
            .with_metadata("split", self.split))
    }

    /// Load a pipeline blob stored at `asset_path`.
    #[instrument(skip(registry))]
    pub fn load(registry: &ArtifactRegistry, asset_path: &str) -> Result<Self> {
        let blob = registry.blobs().load(asset_path)?;
        Self::from_blob(registry, &blob)
    }

    /// Rebuild a pipeline from a registered `pipeline` artifact.
    pub fn from_artifact(registry: &ArtifactRegistry, artifact: &Artifact) -> Result<Self> {
        if *artifact.artifact_type() != ArtifactType::Pipeline {
            return Err(Error::invalid_argument(format!(
                "artifact {} has type {}, expected pipeline",
                artifact.id(),
                artifact.artifact_type()
            )));
        }
        let blob = artifact.read()?;
        Self::from_blob(registry, &blob)
    }

    fn from_blob(registry: &ArtifactRegistry, blob: &[u8]) -> Result<Self> {
        let document: PipelineDocument = codec::decode(blob)?;

        let dataset = Dataset::from_artifact(registry.get(&document.dataset.id)?)?;
        let mut model = get_model(&document.model.name)?;
        if model.model_type() != document.model.model_type {
            return Err(Error::serialization(format!(
                "model {} is {}, document says {}",
                document.model.name,
                model.model_type(),
                document.model.model_type
            )));
        }
        model.restore(document.model.parameters)?;
        let metrics = document
            .metrics
            .iter()
            .map(|name| get_metric(name))
            .collect::<Result<Vec<_>>>()?;

        let mut pipeline = Self::new(
            dataset,
            model,
            metrics,
            document.input_features,
            document.target_feature,
            document.split,
        )
        .map_err(|e| Error::serialization(format!("pipeline document: {e}")))?;
        pipeline.encoder = Some(document.encoder);
        pipeline.evaluation = document.evaluation;

        info!(
            dataset = %pipeline.dataset.id(),
            model = pipeline.model.name(),
            "Loaded pipeline"
        );
        Ok(pipeline)
    }

    pub const fn dataset(&self) -> &Dataset {
        &self.dataset
    }

    pub fn model(&self) -> &dyn Model {
        self.model.as_ref()
    }

    /// Metric identifiers in evaluation order.
    pub fn metrics(&self) -> Vec<String> {
        self.metrics.iter().map(|m| m.name().to_string()).collect()
    }

    pub fn input_features(&self) -> &[Feature] {
        &self.input_features
    }

    pub const fn target_feature(&self) -> &Feature {
        &self.target_feature
    }

    pub const fn split(&self) -> f64 {
        self.split
    }

    /// Scores from the last `execute`, or from the saved pipeline.
    pub const fn evaluation(&self) -> Option<&Evaluation> {
        self.evaluation.as_ref()
    }

    pub fn summary(&self) -> PipelineSummary {
        PipelineSummary {
            dataset: DatasetRef::of(&self.dataset),
            model: self.model.name().to_string(),
            model_type: self.model.model_type(),
            metrics: self.metrics(),
            input_features: self.input_features.clone(),
            target_feature: self.target_feature.clone(),
            split: self.split,
            fitted: self.encoder.is_some(),
            encoded_columns: self
                .encoder
                .as_ref()
                .map(FeatureEncoder::column_names)
                .unwrap_or_default(),
            evaluation: self.evaluation.clone(),
        }
    }
}
