//! Configuration for the AutoOp storage roots.
//!
//! Values come from built-in defaults, an optional `autoop.{toml,json,yaml}` file and
//! `AUTOOP_*` environment variables, in increasing order of precedence.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::{Error, Result};

const DEFAULT_OBJECTS_ROOT: &str = "./assets/objects";
const DEFAULT_METADATA_ROOT: &str = "./assets/dbo";

/// Storage configuration consumed by [`crate::AutoMlSystem`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AutoopConfig {
    /// Root directory for artifact bytes
    pub objects_root: PathBuf,
    /// Root directory for metadata documents
    pub metadata_root: PathBuf,
}

impl Default for AutoopConfig {
    fn default() -> Self {
        Self {
            objects_root: PathBuf::from(DEFAULT_OBJECTS_ROOT),
            metadata_root: PathBuf::from(DEFAULT_METADATA_ROOT),
        }
    }
}

impl AutoopConfig {
    /// Lay both roots out under a single assets directory.
    pub fn from_assets_root(root: impl AsRef<Path>) -> Self {
        let root = root.as_ref();
        Self {
            objects_root: root.join("objects"),
            metadata_root: root.join("dbo"),
        }
    }

    /// Load configuration from environment variables only.
    pub fn from_env() -> Result<Self> {
        Self::load(None)
    }

    /// Load configuration, layering `file` (or an optional `./autoop.*`) and the environment
    /// on top of the defaults.
    ///
    /// An explicitly given file must exist.
    pub fn load(file: Option<&Path>) -> Result<Self> {
        let defaults = Self::default();
        let mut builder = config::Config::builder()
            .set_default("objects_root", defaults.objects_root.to_string_lossy().into_owned())
            .and_then(|b| {
                b.set_default(
                    "metadata_root",
                    defaults.metadata_root.to_string_lossy().into_owned(),
                )
            })
            .map_err(|e| Error::invalid_argument(format!("config defaults: {e}")))?;

        builder = match file {
            Some(path) => builder.add_source(config::File::from(path).required(true)),
            None => builder.add_source(config::File::with_name("autoop").required(false)),
        };

        builder
            .add_source(config::Environment::with_prefix("AUTOOP"))
            .build()
            .and_then(|c| c.try_deserialize())
            .map_err(|e| Error::invalid_argument(format!("config: {e}")))
    }

    /// Log the configuration at startup.
    pub fn log_startup(&self) {
        info!("AutoOp Configuration:");
        info!("  Objects root:  {}", self.objects_root.display());
        info!("  Metadata root: {}", self.metadata_root.display());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_default_config() {
        let config = AutoopConfig::default();
        assert_eq!(config.objects_root, PathBuf::from("./assets/objects"));
        assert_eq!(config.metadata_root, PathBuf::from("./assets/dbo"));
    }

    #[test]
    fn test_from_assets_root() {
        let config = AutoopConfig::from_assets_root("/srv/autoop");
        assert_eq!(config.objects_root, PathBuf::from("/srv/autoop/objects"));
        assert_eq!(config.metadata_root, PathBuf::from("/srv/autoop/dbo"));
    }

    #[test]
    fn test_load_from_file() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("autoop.toml");
        std::fs::write(
            &path,
            "objects_root = \"/data/objects\"\nmetadata_root = \"/data/meta\"\n",
        )
        .unwrap();

        let config = AutoopConfig::load(Some(&path)).unwrap();
        assert_eq!(config.objects_root, PathBuf::from("/data/objects"));
        assert_eq!(config.metadata_root, PathBuf::from("/data/meta"));
    }

    #[test]
    fn test_load_missing_explicit_file_fails() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("missing.toml");
        let result = AutoopConfig::load(Some(&path));
        assert!(matches!(result, Err(Error::InvalidArgument(_))));
    }
}
