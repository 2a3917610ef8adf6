//! Artifact identity and versioning model.
//!
//! An artifact is a named, versioned payload plus descriptive metadata. Its id is derived
//! from name and version only, so registering a second artifact with the same pair replaces
//! the first.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{Error, Result};

/// Version assigned when the producer does not choose one.
pub const DEFAULT_VERSION: &str = "1.0.0";

/// Derive the artifact id: `base64(name) + "_" + version`.
pub fn generate_id(name: &str, version: &str) -> String {
    format!("{}_{}", STANDARD.encode(name.as_bytes()), version)
}

/// Artifact type tag.
///
/// Tags outside the built-in set are accepted as long as they are lowercase identifiers.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum ArtifactType {
    Dataset,
    Model,
    Pipeline,
    Regression,
    Classification,
    Other(String),
}

impl ArtifactType {
    /// Get string representation.
    pub fn as_str(&self) -> &str {
        match self {
            Self::Dataset => "dataset",
            Self::Model => "model",
            Self::Pipeline => "pipeline",
            Self::Regression => "regression",
            Self::Classification => "classification",
            Self::Other(tag) => tag,
        }
    }
}

impl fmt::Display for ArtifactType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ArtifactType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Ok(match s {
            "dataset" => Self::Dataset,
            "model" => Self::Model,
            "pipeline" => Self::Pipeline,
            "regression" => Self::Regression,
            "classification" => Self::Classification,
            other => {
                let valid = !other.is_empty()
                    && other
                        .chars()
                        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_' || c == '-');
                if !valid {
                    return Err(Error::invalid_argument(format!(
                        "unknown artifact type tag: {other:?}"
                    )));
                }
                Self::Other(other.to_string())
            }
        })
    }
}

impl TryFrom<String> for ArtifactType {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl From<ArtifactType> for String {
    fn from(value: ArtifactType) -> Self {
        value.as_str().to_string()
    }
}

/// Metadata row persisted for every registered artifact.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArtifactRecord {
    pub name: String,
    pub version: String,
    pub asset_path: String,
    pub tags: Vec<String>,
    pub metadata: BTreeMap<String, Value>,
    #[serde(rename = "type")]
    pub artifact_type: ArtifactType,
}

/// A named, versioned unit of bytes plus metadata.
#[derive(Debug, Clone, PartialEq)]
pub struct Artifact {
    name: String,
    version: String,
    artifact_type: ArtifactType,
    asset_path: String,
    data: Option<Bytes>,
    tags: Vec<String>,
    metadata: BTreeMap<String, Value>,
}

impl Artifact {
    /// Create an artifact with the default version, no data, tags or metadata.
    pub fn new(
        name: impl Into<String>,
        artifact_type: ArtifactType,
        asset_path: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            version: DEFAULT_VERSION.to_string(),
            artifact_type,
            asset_path: asset_path.into(),
            data: None,
            tags: Vec::new(),
            metadata: BTreeMap::new(),
        }
    }

    /// Rebuild an artifact from its persisted record and (optionally) its bytes.
    pub fn from_record(record: ArtifactRecord, data: Option<Bytes>) -> Self {
        Self {
            name: record.name,
            version: record.version,
            artifact_type: record.artifact_type,
            asset_path: record.asset_path,
            data,
            tags: record.tags,
            metadata: record.metadata,
        }
    }

    #[must_use]
    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = version.into();
        self
    }

    #[must_use]
    pub fn with_data(mut self, data: impl Into<Bytes>) -> Self {
        self.data = Some(data.into());
        self
    }

    #[must_use]
    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tags.push(tag.into());
        self
    }

    #[must_use]
    pub fn with_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags.extend(tags.into_iter().map(Into::into));
        self
    }

    #[must_use]
    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    /// Derived identifier, see [`generate_id`].
    pub fn id(&self) -> String {
        generate_id(&self.name, &self.version)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    pub const fn artifact_type(&self) -> &ArtifactType {
        &self.artifact_type
    }

    pub fn asset_path(&self) -> &str {
        &self.asset_path
    }

    /// Copy of the tags.
    pub fn tags(&self) -> Vec<String> {
        self.tags.clone()
    }

    /// Copy of the metadata mapping.
    pub fn metadata(&self) -> BTreeMap<String, Value> {
        self.metadata.clone()
    }

    /// Returns true when a payload is attached.
    pub const fn has_data(&self) -> bool {
        self.data.is_some()
    }

    /// The payload, failing with InvalidState when none is attached.
    pub fn read(&self) -> Result<Bytes> {
        self.data.clone().ok_or_else(|| {
            Error::invalid_state(format!("artifact {} has no data available", self.id()))
        })
    }

    /// Replace the payload.
    pub fn save(&mut self, data: impl Into<Bytes>) {
        self.data = Some(data.into());
    }

    /// Insert or replace one metadata entry.
    pub fn set_metadata(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.metadata.insert(key.into(), value.into());
    }

    pub fn metadata_value(&self, key: &str) -> Option<&Value> {
        self.metadata.get(key)
    }

    /// Metadata row written to the metadata store.
    pub fn record(&self) -> ArtifactRecord {
        ArtifactRecord {
            name: self.name.clone(),
            version: self.version.clone(),
            asset_path: self.asset_path.clone(),
            tags: self.tags.clone(),
            metadata: self.metadata.clone(),
            artifact_type: self.artifact_type.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use serde_json::json;

    #[test]
    fn test_generate_id() {
        assert_eq!(generate_id("sales", "1.0.0"), "c2FsZXM=_1.0.0");
        assert_eq!(generate_id("sales", "1.0.0"), generate_id("sales", "1.0.0"));
        assert_ne!(generate_id("sales", "1.0.0"), generate_id("sales", "1.0.1"));
    }

    #[test]
    fn test_id_ignores_other_fields() {
        let a = Artifact::new("iris", ArtifactType::Dataset, "dataset/iris").with_data("a");
        let b = Artifact::new("iris", ArtifactType::Pipeline, "pipeline/other")
            .with_tag("x")
            .with_data("b");
        assert_eq!(a.id(), b.id());
    }

    #[test]
    fn test_accessors_return_copies() {
        let artifact = Artifact::new("m", ArtifactType::Model, "model/m")
            .with_tags(["a", "b"])
            .with_metadata("score", 0.9);

        let mut tags = artifact.tags();
        tags.push("c".to_string());
        let mut metadata = artifact.metadata();
        metadata.insert("other".to_string(), json!(1));

        assert_eq!(artifact.tags(), vec!["a", "b"]);
        assert_eq!(artifact.metadata().len(), 1);
    }

    #[test]
    fn test_read_without_data_is_invalid_state() {
        let mut artifact = Artifact::new("m", ArtifactType::Model, "model/m");
        assert!(matches!(artifact.read(), Err(Error::InvalidState(_))));

        artifact.save(vec![1u8, 2, 3]);
        assert_eq!(artifact.read().unwrap().as_ref(), &[1, 2, 3]);
    }

    #[test]
    fn test_artifact_type_parsing() {
        assert_eq!("dataset".parse::<ArtifactType>().unwrap(), ArtifactType::Dataset);
        assert_eq!(ArtifactType::Regression.to_string(), "regression");
        assert_eq!(
            "report".parse::<ArtifactType>().unwrap(),
            ArtifactType::Other("report".to_string())
        );
        assert!(matches!(
            "Not A Tag".parse::<ArtifactType>(),
            Err(Error::InvalidArgument(_))
        ));
        assert!("".parse::<ArtifactType>().is_err());
    }

    #[test]
    fn test_record_serializes_type_field() {
        let record = Artifact::new("sales", ArtifactType::Dataset, "dataset/sales")
            .with_tag("raw")
            .record();
        let value = serde_json::to_value(&record).unwrap();
        assert_eq!(value["type"], "dataset");
        assert_eq!(value["asset_path"], "dataset/sales");

        let back: ArtifactRecord = serde_json::from_value(value).unwrap();
        assert_eq!(back, record);
    }

    proptest! {
        #[test]
        fn prop_id_depends_on_name_and_version(
            name in ".{0,24}",
            v1 in "[0-9a-z.]{1,8}",
            v2 in "[0-9a-z.]{1,8}",
        ) {
            prop_assert_eq!(generate_id(&name, &v1), generate_id(&name, &v1));
            if v1 != v2 {
                prop_assert_ne!(generate_id(&name, &v1), generate_id(&name, &v2));
            }
        }
    }
}
