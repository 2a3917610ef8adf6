//! Projection of a frame onto a numeric design matrix and target vector.
//!
//! The encoder is fitted once on the full dataset and serialized with the pipeline, so a
//! loaded pipeline encodes new frames exactly as the training frame was encoded.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use ndarray::{Array1, Array2, ArrayView1};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::ml::feature::{Feature, FeatureType};
use crate::ml::frame::{Column, ColumnKind, DataFrame, format_number};

/// How one input feature maps to design-matrix columns.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ColumnEncoding {
    /// One column, values passed through.
    Numerical { name: String },
    /// One column per category, in ascending order.
    OneHot { name: String, categories: Vec<String> },
}

impl ColumnEncoding {
    pub fn name(&self) -> &str {
        match self {
            Self::Numerical { name } | Self::OneHot { name, .. } => name,
        }
    }

    pub fn width(&self) -> usize {
        match self {
            Self::Numerical { .. } => 1,
            Self::OneHot { categories, .. } => categories.len(),
        }
    }
}

/// How the target maps to model outputs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TargetEncoding {
    Numerical { name: String },
    /// Class labels mapped to their index in the ascending `classes` list.
    Label { name: String, classes: Vec<String> },
}

impl TargetEncoding {
    pub fn name(&self) -> &str {
        match self {
            Self::Numerical { name } | Self::Label { name, .. } => name,
        }
    }
}

/// A decoded model output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TargetValue {
    Number(f64),
    Label(String),
}

impl fmt::Display for TargetValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Number(v) => write!(f, "{v}"),
            Self::Label(label) => f.write_str(label),
        }
    }
}

/// Fitted mapping from frame columns to model inputs and outputs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeatureEncoder {
    inputs: Vec<ColumnEncoding>,
    target: TargetEncoding,
}

fn text_cells(column: &Column) -> Vec<String> {
    match column {
        Column::Numeric(values) => values.iter().map(|v| format_number(*v)).collect(),
        Column::Text(values) => values.clone(),
    }
}

fn sorted_categories(column: &Column) -> Vec<String> {
    text_cells(column)
        .into_iter()
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

fn numeric_values<'a>(name: &str, column: &'a Column) -> Result<&'a [f64]> {
    match column {
        Column::Numeric(values) => {
            if let Some(row) = values.iter().position(|v| !v.is_finite()) {
                return Err(Error::invalid_argument(format!(
                    "column {name} has a missing or non-finite value at row {row}"
                )));
            }
            Ok(values)
        }
        Column::Text(_) => Err(Error::invalid_argument(format!(
            "column {name} is not numeric"
        ))),
    }
}

impl FeatureEncoder {
    /// Learn category and class lists from `frame`.
    pub fn fit(frame: &DataFrame, inputs: &[Feature], target: &Feature) -> Result<Self> {
        let inputs = inputs
            .iter()
            .map(|feature| -> Result<ColumnEncoding> {
                let column = frame.column(feature.name())?;
                Ok(match feature.feature_type() {
                    FeatureType::Numerical => {
                        numeric_values(feature.name(), column)?;
                        ColumnEncoding::Numerical {
                            name: feature.name().to_string(),
                        }
                    }
                    FeatureType::Categorical => ColumnEncoding::OneHot {
                        name: feature.name().to_string(),
                        categories: sorted_categories(column),
                    },
                })
            })
            .collect::<Result<Vec<_>>>()?;

        let column = frame.column(target.name())?;
        let target = match target.feature_type() {
            FeatureType::Numerical => {
                numeric_values(target.name(), column)?;
                TargetEncoding::Numerical {
                    name: target.name().to_string(),
                }
            }
            FeatureType::Categorical => TargetEncoding::Label {
                name: target.name().to_string(),
                classes: sorted_categories(column),
            },
        };

        Ok(Self { inputs, target })
    }

    pub fn inputs(&self) -> &[ColumnEncoding] {
        &self.inputs
    }

    pub const fn target(&self) -> &TargetEncoding {
        &self.target
    }

    /// Column kinds the input columns must be decoded with; one-hot columns are text.
    pub fn input_kinds(&self) -> BTreeMap<String, ColumnKind> {
        self.inputs
            .iter()
            .map(|encoding| {
                let kind = match encoding {
                    ColumnEncoding::Numerical { .. } => ColumnKind::Numeric,
                    ColumnEncoding::OneHot { .. } => ColumnKind::Text,
                };
                (encoding.name().to_string(), kind)
            })
            .collect()
    }

    /// Width of the design matrix.
    pub fn n_columns(&self) -> usize {
        self.inputs.iter().map(ColumnEncoding::width).sum()
    }

    /// Design-matrix column names; one-hot columns are named `feature=category`.
    pub fn column_names(&self) -> Vec<String> {
        self.inputs
            .iter()
            .flat_map(|encoding| match encoding {
                ColumnEncoding::Numerical { name } => vec![name.clone()],
                ColumnEncoding::OneHot { name, categories } => categories
                    .iter()
                    .map(|c| format!("{name}={c}"))
                    .collect(),
            })
            .collect()
    }

    /// Encode the input columns of `frame`.
    ///
    /// Categories not seen during `fit` encode as an all-zero row.
    pub fn transform(&self, frame: &DataFrame) -> Result<Array2<f64>> {
        let n_rows = frame.n_rows();
        let mut matrix = Array2::<f64>::zeros((n_rows, self.n_columns()));
        let mut offset = 0;

        for encoding in &self.inputs {
            let column = frame.column(encoding.name())?;
            match encoding {
                ColumnEncoding::Numerical { name } => {
                    let values = numeric_values(name, column)?;
                    matrix
                        .column_mut(offset)
                        .assign(&ArrayView1::from(values));
                }
                ColumnEncoding::OneHot { categories, .. } => {
                    for (row, cell) in text_cells(column).iter().enumerate() {
                        if let Ok(idx) = categories.binary_search(cell) {
                            matrix[[row, offset + idx]] = 1.0;
                        }
                    }
                }
            }
            offset += encoding.width();
        }
        Ok(matrix)
    }

    /// Encode the target column of `frame`.
    #[allow(clippy::cast_precision_loss)]
    pub fn transform_target(&self, frame: &DataFrame) -> Result<Array1<f64>> {
        let column = frame.column(self.target.name())?;
        match &self.target {
            TargetEncoding::Numerical { name } => Ok(Array1::from(numeric_values(name, column)?.to_vec())),
            TargetEncoding::Label { name, classes } => text_cells(column)
                .iter()
                .map(|cell| {
                    classes
                        .binary_search(cell)
                        .map(|idx| idx as f64)
                        .map_err(|_| {
                            Error::invalid_argument(format!("unknown class {cell:?} in column {name}"))
                        })
                })
                .collect(),
        }
    }

    /// Map model outputs back to target values.
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    pub fn decode_target(&self, values: ArrayView1<'_, f64>) -> Vec<TargetValue> {
        match &self.target {
            TargetEncoding::Numerical { .. } => values.iter().map(|v| TargetValue::Number(*v)).collect(),
            TargetEncoding::Label { classes, .. } => values
                .iter()
                .map(|v| {
                    let label = (v.is_finite() && *v >= 0.0)
                        .then(|| classes.get(v.round() as usize))
                        .flatten();
                    label.map_or_else(
                        || TargetValue::Number(*v),
                        |label| TargetValue::Label(label.clone()),
                    )
                })
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn frame() -> DataFrame {
        DataFrame::from_columns([
            ("size", Column::Numeric(vec![1.0, 2.0, 3.0])),
            (
                "colour",
                Column::Text(vec!["red".into(), "blue".into(), "red".into()]),
            ),
            (
                "label",
                Column::Text(vec!["yes".into(), "no".into(), "yes".into()]),
            ),
        ])
        .unwrap()
    }

    fn features() -> (Vec<Feature>, Feature) {
        (
            vec![
                Feature::new("colour", FeatureType::Categorical),
                Feature::new("size", FeatureType::Numerical),
            ],
            Feature::new("label", FeatureType::Categorical),
        )
    }

    #[test]
    fn test_one_hot_sorted_and_in_input_order() {
        let (inputs, target) = features();
        let encoder = FeatureEncoder::fit(&frame(), &inputs, &target).unwrap();

        assert_eq!(encoder.column_names(), vec!["colour=blue", "colour=red", "size"]);
        let x = encoder.transform(&frame()).unwrap();
        assert_eq!(
            x,
            array![[0.0, 1.0, 1.0], [1.0, 0.0, 2.0], [0.0, 1.0, 3.0]]
        );
    }

    #[test]
    fn test_label_encoding_round_trip() {
        let (inputs, target) = features();
        let encoder = FeatureEncoder::fit(&frame(), &inputs, &target).unwrap();

        let y = encoder.transform_target(&frame()).unwrap();
        assert_eq!(y, array![1.0, 0.0, 1.0]);
        assert_eq!(
            encoder.decode_target(y.view()),
            vec![
                TargetValue::Label("yes".into()),
                TargetValue::Label("no".into()),
                TargetValue::Label("yes".into()),
            ]
        );
    }

    #[test]
    fn test_unseen_category_is_all_zero() {
        let (inputs, target) = features();
        let encoder = FeatureEncoder::fit(&frame(), &inputs, &target).unwrap();

        let new = DataFrame::from_columns([
            ("colour", Column::Text(vec!["green".into()])),
            ("size", Column::Numeric(vec![9.0])),
        ])
        .unwrap();
        assert_eq!(encoder.transform(&new).unwrap(), array![[0.0, 0.0, 9.0]]);
    }

    #[test]
    fn test_input_kinds_mark_one_hot_columns_as_text() {
        let (inputs, target) = features();
        let encoder = FeatureEncoder::fit(&frame(), &inputs, &target).unwrap();
        assert_eq!(
            encoder.input_kinds(),
            BTreeMap::from([
                ("colour".to_string(), ColumnKind::Text),
                ("size".to_string(), ColumnKind::Numeric),
            ])
        );
    }

    #[test]
    fn test_missing_numeric_value_rejected() {
        let frame = DataFrame::from_columns([
            ("x", Column::Numeric(vec![1.0, f64::NAN])),
            ("y", Column::Numeric(vec![1.0, 2.0])),
        ])
        .unwrap();
        let result = FeatureEncoder::fit(
            &frame,
            &[Feature::new("x", FeatureType::Numerical)],
            &Feature::new("y", FeatureType::Numerical),
        );
        assert!(matches!(result, Err(Error::InvalidArgument(_))));
    }

    #[test]
    fn test_missing_input_column() {
        let (inputs, target) = features();
        let encoder = FeatureEncoder::fit(&frame(), &inputs, &target).unwrap();
        let partial = DataFrame::from_columns([("size", Column::Numeric(vec![1.0]))]).unwrap();
        assert!(matches!(
            encoder.transform(&partial),
            Err(Error::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_encoder_serializes() {
        let (inputs, target) = features();
        let encoder = FeatureEncoder::fit(&frame(), &inputs, &target).unwrap();
        let value = serde_json::to_value(&encoder).unwrap();
        assert_eq!(value["inputs"][0]["kind"], "one_hot");
        assert_eq!(value["target"]["classes"], serde_json::json!(["no", "yes"]));
        let back: FeatureEncoder = serde_json::from_value(value).unwrap();
        assert_eq!(back, encoder);
    }
}
