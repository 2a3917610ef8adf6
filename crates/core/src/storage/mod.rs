//! Storage layer implementations for AutoOp.
//!
//! This module provides the blob store for artifact bytes and the metadata store for
//! artifact records.

pub mod blob;
pub mod metadata;

pub use blob::{BlobStore, InMemoryBlobStore, LocalBlobStore};
pub use metadata::{InMemoryMetadataStore, JsonMetadataStore, MetadataStore};
