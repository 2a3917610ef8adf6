//! AutoOp core library.
//!
//! Versioned artifact storage (blob store, metadata store, registry) and a deterministic
//! train/evaluate/serialize pipeline engine over pluggable models and metrics.

pub mod artifact;
pub mod config;
pub mod error;
pub mod ml;
pub mod registry;
pub mod storage;
pub mod system;

pub use artifact::{Artifact, ArtifactRecord, ArtifactType, DEFAULT_VERSION, generate_id};
pub use config::AutoopConfig;
pub use error::{Error, Result};
pub use registry::{ARTIFACTS_COLLECTION, ArtifactRegistry};
pub use system::AutoMlSystem;
