//! Composition root wiring configuration, storage and the registry together.

use tracing::info;

use crate::config::AutoopConfig;
use crate::error::Result;
use crate::registry::ArtifactRegistry;
use crate::storage::{JsonMetadataStore, LocalBlobStore};

/// One registry over filesystem-backed stores.
///
/// Construct one per process (or per test) and pass it by reference.
#[derive(Debug)]
pub struct AutoMlSystem {
    config: AutoopConfig,
    registry: ArtifactRegistry,
}

impl AutoMlSystem {
    /// Open (and create if missing) the object and metadata roots from `config`.
    pub fn open(config: &AutoopConfig) -> Result<Self> {
        let objects = LocalBlobStore::new(config.objects_root.clone())?;
        let metadata = JsonMetadataStore::open(LocalBlobStore::new(config.metadata_root.clone())?)?;

        let mut registry = ArtifactRegistry::new(Box::new(objects), Box::new(metadata));
        registry.refresh()?;

        info!(
            objects_root = %config.objects_root.display(),
            metadata_root = %config.metadata_root.display(),
            "AutoOp system opened"
        );

        Ok(Self {
            config: config.clone(),
            registry,
        })
    }

    pub const fn config(&self) -> &AutoopConfig {
        &self.config
    }

    pub const fn registry(&self) -> &ArtifactRegistry {
        &self.registry
    }

    pub const fn registry_mut(&mut self) -> &mut ArtifactRegistry {
        &mut self.registry
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::artifact::{Artifact, ArtifactType};
    use tempfile::TempDir;

    #[test]
    fn test_open_creates_roots() {
        let tmp = TempDir::new().unwrap();
        let config = AutoopConfig::from_assets_root(tmp.path().join("assets"));

        let system = AutoMlSystem::open(&config).unwrap();

        assert!(config.objects_root.is_dir());
        assert!(config.metadata_root.is_dir());
        assert!(system.registry().list(None).unwrap().is_empty());
    }

    #[test]
    fn test_two_systems_share_state_through_disk() {
        let tmp = TempDir::new().unwrap();
        let config = AutoopConfig::from_assets_root(tmp.path());

        let artifact = Artifact::new("iris", ArtifactType::Dataset, "dataset/iris")
            .with_data(b"a\n1\n".to_vec());
        {
            let mut system = AutoMlSystem::open(&config).unwrap();
            system.registry_mut().register(&artifact).unwrap();
        }

        let system = AutoMlSystem::open(&config).unwrap();
        assert_eq!(system.registry().get(&artifact.id()).unwrap(), artifact);
        assert_eq!(system.config(), &config);
    }
}
