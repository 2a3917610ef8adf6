//! Feature typing.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::ml::dataset::Dataset;
use crate::ml::frame::DataFrame;

/// Semantic type of a column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FeatureType {
    Numerical,
    Categorical,
}

impl FeatureType {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Numerical => "numerical",
            Self::Categorical => "categorical",
        }
    }
}

impl fmt::Display for FeatureType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A named column and its semantic type.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Feature {
    name: String,
    #[serde(rename = "type")]
    feature_type: FeatureType,
}

impl Feature {
    pub fn new(name: impl Into<String>, feature_type: FeatureType) -> Self {
        Self {
            name: name.into(),
            feature_type,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub const fn feature_type(&self) -> FeatureType {
        self.feature_type
    }
}

impl fmt::Display for Feature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.name, self.feature_type)
    }
}

/// Classify every column of the dataset, in column order.
pub fn detect_feature_types(dataset: &Dataset) -> Result<Vec<Feature>> {
    let frame = dataset.read()?;
    Ok(detect_frame_feature_types(&frame))
}

/// Numeric storage is numerical; anything else is categorical.
pub fn detect_frame_feature_types(frame: &DataFrame) -> Vec<Feature> {
    frame
        .iter()
        .map(|(name, column)| {
            let feature_type = if column.is_numeric() {
                FeatureType::Numerical
            } else {
                FeatureType::Categorical
            };
            Feature::new(name, feature_type)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detect_feature_types_in_column_order() {
        let csv = b"age,city,income,code\n30,Oslo,1000.5,A1\n41,Rome,,B2\n";
        let dataset = Dataset::from_csv_bytes(csv.to_vec(), "people", "dataset/people", None);

        let features = detect_feature_types(&dataset).unwrap();
        assert_eq!(
            features,
            vec![
                Feature::new("age", FeatureType::Numerical),
                Feature::new("city", FeatureType::Categorical),
                Feature::new("income", FeatureType::Numerical),
                Feature::new("code", FeatureType::Categorical),
            ]
        );
    }

    #[test]
    fn test_feature_serialization() {
        let feature = Feature::new("city", FeatureType::Categorical);
        let value = serde_json::to_value(&feature).unwrap();
        assert_eq!(value, serde_json::json!({"name": "city", "type": "categorical"}));
        assert_eq!(feature.to_string(), "city (categorical)");
    }
}
