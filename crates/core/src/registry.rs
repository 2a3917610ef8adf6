//! Artifact registry composing blob storage and metadata storage.
//!
//! `register` writes the bytes first and the metadata record second; `delete` removes the
//! blob first and the record second. Neither pair is transactional: a failure between the
//! two steps leaves a blob without a record (register) or a record without a blob (delete).
//! Re-registering an id whose `asset_path` changed leaves the old blob in place.

use bytes::Bytes;
use tracing::{debug, info, instrument};

use crate::artifact::{Artifact, ArtifactRecord, ArtifactType};
use crate::error::{Error, Result};
use crate::storage::{BlobStore, MetadataStore};

/// Metadata collection holding artifact records.
pub const ARTIFACTS_COLLECTION: &str = "artifacts";

/// Repository for artifacts.
pub struct ArtifactRegistry {
    storage: Box<dyn BlobStore>,
    database: Box<dyn MetadataStore>,
}

impl std::fmt::Debug for ArtifactRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ArtifactRegistry")
            .field("storage", &self.storage.backend_type())
            .finish_non_exhaustive()
    }
}

impl ArtifactRegistry {
    /// Create a registry over the given stores.
    pub fn new(storage: Box<dyn BlobStore>, database: Box<dyn MetadataStore>) -> Self {
        Self { storage, database }
    }

    /// Read-only access to the blob store.
    pub fn blobs(&self) -> &dyn BlobStore {
        self.storage.as_ref()
    }

    /// Persist an artifact's bytes and metadata record.
    ///
    /// An existing artifact with the same id is overwritten.
    #[instrument(skip_all, fields(id = %artifact.id(), asset_path = %artifact.asset_path()))]
    pub fn register(&mut self, artifact: &Artifact) -> Result<()> {
        if artifact.name().is_empty() {
            return Err(Error::invalid_argument("artifact name is empty"));
        }
        if artifact.version().is_empty() {
            return Err(Error::invalid_argument("artifact version is empty"));
        }
        let data = artifact.read()?;
        let id = artifact.id();

        if let Ok(previous) = self.record(&id) {
            if previous.asset_path != artifact.asset_path() {
                debug!(
                    id = %id,
                    previous = %previous.asset_path,
                    "Overwriting artifact with a new asset path; previous blob is kept"
                );
            }
        }

        self.storage.save(&data, artifact.asset_path())?;
        let record = serde_json::to_value(artifact.record())?;
        self.database.set(ARTIFACTS_COLLECTION, &id, record)?;

        info!(
            id = %id,
            name = %artifact.name(),
            version = %artifact.version(),
            artifact_type = %artifact.artifact_type(),
            bytes = data.len(),
            "Registered artifact"
        );
        Ok(())
    }

    /// List artifacts, optionally keeping only those of exactly `type_filter`.
    #[instrument(skip(self))]
    pub fn list(&self, type_filter: Option<&ArtifactType>) -> Result<Vec<Artifact>> {
        let mut artifacts = Vec::new();
        for (id, value) in self.database.list(ARTIFACTS_COLLECTION)? {
            let record = decode_record(&id, value)?;
            if type_filter.is_some_and(|t| *t != record.artifact_type) {
                continue;
            }
            artifacts.push(self.hydrate(record)?);
        }
        debug!(count = artifacts.len(), "Listed artifacts");
        Ok(artifacts)
    }

    /// Get an artifact by id, loading its bytes.
    #[instrument(skip(self))]
    pub fn get(&self, id: &str) -> Result<Artifact> {
        let record = self.record(id)?;
        self.hydrate(record)
    }

    /// Returns true when a record exists for `id`.
    pub fn exists(&self, id: &str) -> Result<bool> {
        match self.database.get(ARTIFACTS_COLLECTION, id) {
            Ok(_) => Ok(true),
            Err(e) if e.is_not_found() => Ok(false),
            Err(e) => Err(e),
        }
    }

    /// Delete an artifact's blob, then its metadata record.
    #[instrument(skip(self))]
    pub fn delete(&mut self, id: &str) -> Result<()> {
        let record = self.record(id)?;
        self.storage.delete(&record.asset_path)?;
        self.database.delete(ARTIFACTS_COLLECTION, id)?;
        info!(id = %id, asset_path = %record.asset_path, "Deleted artifact");
        Ok(())
    }

    /// Re-synchronize with persisted metadata.
    pub fn refresh(&mut self) -> Result<()> {
        self.database.refresh()
    }

    fn record(&self, id: &str) -> Result<ArtifactRecord> {
        let value = self
            .database
            .get(ARTIFACTS_COLLECTION, id)
            .map_err(|e| match e {
                Error::NotFound(_) => Error::not_found(format!("artifact {id}")),
                other => other,
            })?;
        decode_record(id, value)
    }

    fn hydrate(&self, record: ArtifactRecord) -> Result<Artifact> {
        let data = self.storage.load(&record.asset_path)?;
        Ok(Artifact::from_record(record, Some(Bytes::from(data))))
    }
}

fn decode_record(id: &str, value: serde_json::Value) -> Result<ArtifactRecord> {
    serde_json::from_value(value)
        .map_err(|e| Error::serialization(format!("artifact record {id}: {e}")))
}
