//! Metadata record storage.
//!
//! Records are JSON values grouped into named collections and addressed by key. The JSON
//! backend keeps one document per record inside a [`BlobStore`] so that metadata survives
//! process restarts and can be re-read with [`MetadataStore::refresh`].

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info, instrument, warn};

use super::blob::BlobStore;
use crate::error::{Error, Result};

/// Named-collection key/value record store.
pub trait MetadataStore: Send {
    /// Create or replace the record under `collection`/`key`.
    fn set(&mut self, collection: &str, key: &str, record: Value) -> Result<()>;

    /// Fetch a record, failing with NotFound if absent.
    fn get(&self, collection: &str, key: &str) -> Result<Value>;

    /// All `(key, record)` pairs of a collection in ascending key order.
    ///
    /// A collection that was never written is empty.
    fn list(&self, collection: &str) -> Result<Vec<(String, Value)>>;

    /// Remove a record, failing with NotFound if absent.
    fn delete(&mut self, collection: &str, key: &str) -> Result<()>;

    /// Re-synchronize in-memory state with persisted state.
    fn refresh(&mut self) -> Result<()>;
}

type Collections = BTreeMap<String, BTreeMap<String, Value>>;

fn record_not_found(collection: &str, key: &str) -> Error {
    Error::not_found(format!("record {collection}/{key}"))
}

/// Metadata store held entirely in memory.
#[derive(Debug, Clone, Default)]
pub struct InMemoryMetadataStore {
    collections: Collections,
}

impl InMemoryMetadataStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl MetadataStore for InMemoryMetadataStore {
    fn set(&mut self, collection: &str, key: &str, record: Value) -> Result<()> {
        self.collections
            .entry(collection.to_string())
            .or_default()
            .insert(key.to_string(), record);
        Ok(())
    }

    fn get(&self, collection: &str, key: &str) -> Result<Value> {
        self.collections
            .get(collection)
            .and_then(|records| records.get(key))
            .cloned()
            .ok_or_else(|| record_not_found(collection, key))
    }

    fn list(&self, collection: &str) -> Result<Vec<(String, Value)>> {
        Ok(self
            .collections
            .get(collection)
            .map(|records| {
                records
                    .iter()
                    .map(|(k, v)| (k.clone(), v.clone()))
                    .collect()
            })
            .unwrap_or_default())
    }

    fn delete(&mut self, collection: &str, key: &str) -> Result<()> {
        self.collections
            .get_mut(collection)
            .and_then(|records| records.remove(key))
            .map(|_| ())
            .ok_or_else(|| record_not_found(collection, key))
    }

    fn refresh(&mut self) -> Result<()> {
        Ok(())
    }
}

/// On-disk shape of a single record document.
#[derive(Debug, Serialize, Deserialize)]
struct RecordDocument {
    collection: String,
    key: String,
    record: Value,
}

/// Metadata store persisting each record as a JSON document in a blob store.
///
/// Documents live at `{collection}/{hex(key)}.json`; hex-encoding the key keeps ids that
/// contain `/`, `+` or `=` usable as file names.
#[derive(Debug)]
pub struct JsonMetadataStore<B: BlobStore> {
    storage: B,
    collections: Collections,
}

impl<B: BlobStore> JsonMetadataStore<B> {
    /// Create a store over `storage` and load every persisted document.
    pub fn open(storage: B) -> Result<Self> {
        let mut store = Self {
            storage,
            collections: Collections::new(),
        };
        store.refresh()?;
        Ok(store)
    }

    fn document_path(collection: &str, key: &str) -> Result<String> {
        if collection.is_empty() || collection.contains(['/', '\\']) || collection == ".." {
            return Err(Error::invalid_argument(format!(
                "invalid collection name: {collection:?}"
            )));
        }
        Ok(format!("{collection}/{}.json", hex::encode(key.as_bytes())))
    }

    fn load_document(&self, path: &str) -> Result<RecordDocument> {
        let bytes = self.storage.load(path)?;
        serde_json::from_slice(&bytes)
            .map_err(|e| Error::serialization(format!("metadata document {path}: {e}")))
    }
}

impl<B: BlobStore> MetadataStore for JsonMetadataStore<B> {
    #[instrument(skip(self, record))]
    fn set(&mut self, collection: &str, key: &str, record: Value) -> Result<()> {
        let path = Self::document_path(collection, key)?;
        let document = RecordDocument {
            collection: collection.to_string(),
            key: key.to_string(),
            record,
        };
        let bytes = serde_json::to_vec_pretty(&document)?;
        self.storage.save(&bytes, &path)?;

        self.collections
            .entry(document.collection)
            .or_default()
            .insert(document.key, document.record);
        debug!(path = %path, "Persisted metadata record");
        Ok(())
    }

    fn get(&self, collection: &str, key: &str) -> Result<Value> {
        self.collections
            .get(collection)
            .and_then(|records| records.get(key))
            .cloned()
            .ok_or_else(|| record_not_found(collection, key))
    }

    fn list(&self, collection: &str) -> Result<Vec<(String, Value)>> {
        Ok(self
            .collections
            .get(collection)
            .map(|records| {
                records
                    .iter()
                    .map(|(k, v)| (k.clone(), v.clone()))
                    .collect()
            })
            .unwrap_or_default())
    }

    #[instrument(skip(self))]
    fn delete(&mut self, collection: &str, key: &str) -> Result<()> {
        if !self
            .collections
            .get(collection)
            .is_some_and(|records| records.contains_key(key))
        {
            return Err(record_not_found(collection, key));
        }

        let path = Self::document_path(collection, key)?;
        match self.storage.delete(&path) {
            Ok(()) => {}
            // Already gone on disk; dropping the in-memory copy is enough.
            Err(e) if e.is_not_found() => {
                warn!(path = %path, "Metadata document missing on delete");
            }
            Err(e) => return Err(e),
        }

        if let Some(records) = self.collections.get_mut(collection) {
            records.remove(key);
        }
        Ok(())
    }

    fn refresh(&mut self) -> Result<()> {
        let paths = match self.storage.list("") {
            Ok(paths) => paths,
            Err(e) if e.is_not_found() => Vec::new(),
            Err(e) => return Err(e),
        };

        let mut collections = Collections::new();
        for path in paths.iter().filter(|p| p.ends_with(".json")) {
            let document = self.load_document(path)?;
            collections
                .entry(document.collection)
                .or_default()
                .insert(document.key, document.record);
        }

        let total: usize = collections.values().map(BTreeMap::len).sum();
        self.collections = collections;
        info!(
            backend = self.storage.backend_type(),
            records = total,
            "Refreshed metadata store"
        );
        Ok(())
    }
}
