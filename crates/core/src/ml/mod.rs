//! Machine-learning layer: datasets, feature typing, models, metrics and pipelines.

pub mod codec;
pub mod dataset;
pub mod encoding;
pub mod feature;
pub mod frame;
pub mod metric;
pub mod model;
pub mod pipeline;

pub use dataset::Dataset;
pub use encoding::{ColumnEncoding, FeatureEncoder, TargetEncoding, TargetValue};
pub use feature::{Feature, FeatureType, detect_feature_types, detect_frame_feature_types};
pub use frame::{Column, ColumnKind, DataFrame};
pub use metric::{CLASSIFICATION_METRICS, Metric, REGRESSION_METRICS, get_metric};
pub use model::{CLASSIFICATION_MODELS, Model, ModelType, REGRESSION_MODELS, get_model};
pub use pipeline::{Evaluation, MetricScore, Pipeline, PipelineResult, PipelineSummary};
