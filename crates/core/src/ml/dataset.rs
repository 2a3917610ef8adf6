//! Dataset artifacts: CSV payloads with a header row.
//!
//! Datasets built from a frame record each column's kind under the `columns` metadata key, so
//! that text columns of numeric-looking cells and all-empty numeric columns decode as they were
//! written.

use std::collections::BTreeMap;

use serde_json::Value;

use crate::artifact::{Artifact, ArtifactType, DEFAULT_VERSION};
use crate::error::{Error, Result};
use crate::ml::frame::{ColumnKind, DataFrame};

/// Metadata key holding the column kinds.
pub const COLUMNS_METADATA: &str = "columns";

fn kinds_value(frame: &DataFrame) -> Result<Value> {
    serde_json::to_value(frame.column_kinds())
        .map_err(|e| Error::serialization(format!("column kinds: {e}")))
}

/// An [`Artifact`] whose type is always `dataset` and whose payload is CSV.
#[derive(Debug, Clone, PartialEq)]
pub struct Dataset {
    artifact: Artifact,
}

impl Dataset {
    /// Encode `frame` as CSV into a new dataset artifact.
    pub fn from_frame(
        frame: &DataFrame,
        name: impl Into<String>,
        asset_path: impl Into<String>,
        version: Option<&str>,
    ) -> Result<Self> {
        let data = frame.to_csv()?;
        let artifact = Artifact::new(name, ArtifactType::Dataset, asset_path)
            .with_version(version.unwrap_or(DEFAULT_VERSION))
            .with_data(data)
            .with_metadata(COLUMNS_METADATA, kinds_value(frame)?);
        Ok(Self { artifact })
    }

    /// Wrap raw CSV bytes without decoding them. Column kinds are inferred on read.
    pub fn from_csv_bytes(
        data: impl Into<bytes::Bytes>,
        name: impl Into<String>,
        asset_path: impl Into<String>,
        version: Option<&str>,
    ) -> Self {
        let artifact = Artifact::new(name, ArtifactType::Dataset, asset_path)
            .with_version(version.unwrap_or(DEFAULT_VERSION))
            .with_data(data);
        Self { artifact }
    }

    /// View a registered artifact as a dataset.
    pub fn from_artifact(artifact: Artifact) -> Result<Self> {
        if *artifact.artifact_type() != ArtifactType::Dataset {
            return Err(Error::invalid_argument(format!(
                "artifact {} has type {}, expected dataset",
                artifact.id(),
                artifact.artifact_type()
            )));
        }
        Ok(Self { artifact })
    }

    /// Decode the payload, applying the recorded column kinds when present.
    pub fn read(&self) -> Result<DataFrame> {
        let data = self.artifact.read()?;
        let kinds = self.column_kinds()?.unwrap_or_default();
        DataFrame::from_csv_with_kinds(&data, &kinds)
    }

    /// Recorded column kinds, if the dataset carries them.
    pub fn column_kinds(&self) -> Result<Option<BTreeMap<String, ColumnKind>>> {
        self.artifact
            .metadata_value(COLUMNS_METADATA)
            .map(|value| {
                serde_json::from_value(value.clone()).map_err(|e| {
                    Error::serialization(format!("dataset {} column kinds: {e}", self.artifact.id()))
                })
            })
            .transpose()
    }

    /// Replace the payload with `frame` encoded as CSV.
    pub fn save(&mut self, frame: &DataFrame) -> Result<()> {
        let data = frame.to_csv()?;
        let kinds = kinds_value(frame)?;
        self.artifact.save(data);
        self.artifact.set_metadata(COLUMNS_METADATA, kinds);
        Ok(())
    }

    pub fn id(&self) -> String {
        self.artifact.id()
    }

    pub fn name(&self) -> &str {
        self.artifact.name()
    }

    pub fn version(&self) -> &str {
        self.artifact.version()
    }

    pub fn asset_path(&self) -> &str {
        self.artifact.asset_path()
    }

    pub const fn artifact(&self) -> &Artifact {
        &self.artifact
    }

    pub fn into_artifact(self) -> Artifact {
        self.artifact
    }
}
