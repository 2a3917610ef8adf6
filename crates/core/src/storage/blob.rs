//! Blob storage for artifact bytes.
//!
//! Blobs are addressed by a relative, `/`-separated key (`dataset/sales`,
//! `pipeline/run1.blob`). The local backend maps keys onto files under a root directory and
//! creates missing parent directories on write.

use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Component, Path, PathBuf};

use tracing::{debug, instrument};

use crate::error::{Error, Result};

/// Byte-blob persistence keyed by hierarchical path.
///
/// Writes to the same key are not atomic with respect to each other; callers serialize them.
pub trait BlobStore: Send {
    /// Create or overwrite the blob at `path`.
    fn save(&mut self, data: &[u8], path: &str) -> Result<()>;

    /// Load the blob at `path`, failing with NotFound if absent.
    fn load(&self, path: &str) -> Result<Vec<u8>>;

    /// Delete the blob at `path`, failing with NotFound if absent.
    fn delete(&mut self, path: &str) -> Result<()>;

    /// Recursively list blob keys under `prefix`, sorted.
    ///
    /// An empty prefix lists everything; a prefix that does not exist is NotFound.
    fn list(&self, prefix: &str) -> Result<Vec<String>>;

    /// Get backend type name
    fn backend_type(&self) -> &'static str;
}

/// Validate a blob key and split it into its segments.
///
/// Absolute keys and `..` segments are rejected so that no key resolves outside the root.
fn key_segments(path: &str) -> Result<Vec<&str>> {
    if path.starts_with('/') || path.starts_with('\\') || Path::new(path).is_absolute() {
        return Err(Error::invalid_argument(format!(
            "blob key must be relative: {path}"
        )));
    }

    let mut segments = Vec::new();
    for component in Path::new(path).components() {
        match component {
            Component::Normal(segment) => {
                let segment = segment.to_str().ok_or_else(|| {
                    Error::invalid_argument(format!("blob key is not valid UTF-8: {path}"))
                })?;
                segments.push(segment);
            }
            Component::CurDir => {}
            Component::ParentDir | Component::RootDir | Component::Prefix(_) => {
                return Err(Error::invalid_argument(format!(
                    "blob key escapes the store root: {path}"
                )));
            }
        }
    }
    Ok(segments)
}

/// Normalize a key to its canonical `a/b/c` form.
fn normalize_key(path: &str) -> Result<String> {
    let segments = key_segments(path)?;
    if segments.is_empty() {
        return Err(Error::invalid_argument("blob key is empty"));
    }
    Ok(segments.join("/"))
}

fn map_io(err: io::Error, path: &str) -> Error {
    if err.kind() == io::ErrorKind::NotFound {
        Error::not_found(format!("blob {path}"))
    } else {
        Error::Io(err)
    }
}

/// Filesystem blob store rooted at a directory.
#[derive(Debug, Clone)]
pub struct LocalBlobStore {
    root: PathBuf,
}

impl LocalBlobStore {
    /// Open a store at `root`, creating the directory if needed.
    pub fn new(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        fs::create_dir_all(&root)?;
        debug!(root = %root.display(), "Opened local blob store");
        Ok(Self { root })
    }

    /// Root directory of this store.
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn resolve(&self, path: &str) -> Result<PathBuf> {
        let mut full = self.root.clone();
        for segment in key_segments(path)? {
            full.push(segment);
        }
        Ok(full)
    }

    fn collect_files(&self, dir: &Path, out: &mut Vec<String>) -> Result<()> {
        for entry in fs::read_dir(dir)? {
            let entry = entry?;
            let path = entry.path();
            if entry.file_type()?.is_dir() {
                self.collect_files(&path, out)?;
            } else if let Ok(relative) = path.strip_prefix(&self.root) {
                let key = relative
                    .components()
                    .map(|c| c.as_os_str().to_string_lossy())
                    .collect::<Vec<_>>()
                    .join("/");
                out.push(key);
            }
        }
        Ok(())
    }
}

impl BlobStore for LocalBlobStore {
    #[instrument(skip(self, data), fields(bytes = data.len()))]
    fn save(&mut self, data: &[u8], path: &str) -> Result<()> {
        normalize_key(path)?;
        let full = self.resolve(path)?;
        if let Some(parent) = full.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&full, data)?;
        debug!(path = %path, "Saved blob");
        Ok(())
    }

    fn load(&self, path: &str) -> Result<Vec<u8>> {
        normalize_key(path)?;
        let full = self.resolve(path)?;
        if full.is_dir() {
            return Err(Error::not_found(format!("blob {path}")));
        }
        fs::read(&full).map_err(|e| map_io(e, path))
    }

    #[instrument(skip(self))]
    fn delete(&mut self, path: &str) -> Result<()> {
        normalize_key(path)?;
        let full = self.resolve(path)?;
        if full.is_dir() {
            return Err(Error::not_found(format!("blob {path}")));
        }
        fs::remove_file(&full).map_err(|e| map_io(e, path))?;
        debug!(path = %path, "Deleted blob");
        Ok(())
    }

    fn list(&self, prefix: &str) -> Result<Vec<String>> {
        let full = self.resolve(prefix)?;
        if !full.exists() {
            return Err(Error::not_found(format!("prefix {prefix}")));
        }

        let mut keys = Vec::new();
        if full.is_file() {
            keys.push(normalize_key(prefix)?);
        } else {
            self.collect_files(&full, &mut keys)?;
        }
        keys.sort();
        Ok(keys)
    }

    fn backend_type(&self) -> &'static str {
        "local"
    }
}

/// Blob store held entirely in memory.
#[derive(Debug, Clone, Default)]
pub struct InMemoryBlobStore {
    blobs: BTreeMap<String, Vec<u8>>,
}

impl InMemoryBlobStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored blobs.
    pub fn len(&self) -> usize {
        self.blobs.len()
    }

    /// Returns true when no blob is stored.
    pub fn is_empty(&self) -> bool {
        self.blobs.is_empty()
    }
}

impl BlobStore for InMemoryBlobStore {
    fn save(&mut self, data: &[u8], path: &str) -> Result<()> {
        let key = normalize_key(path)?;
        self.blobs.insert(key, data.to_vec());
        Ok(())
    }

    fn load(&self, path: &str) -> Result<Vec<u8>> {
        let key = normalize_key(path)?;
        self.blobs
            .get(&key)
            .cloned()
            .ok_or_else(|| Error::not_found(format!("blob {path}")))
    }

    fn delete(&mut self, path: &str) -> Result<()> {
        let key = normalize_key(path)?;
        self.blobs
            .remove(&key)
            .map(|_| ())
            .ok_or_else(|| Error::not_found(format!("blob {path}")))
    }

    fn list(&self, prefix: &str) -> Result<Vec<String>> {
        let segments = key_segments(prefix)?;
        if segments.is_empty() {
            return Ok(self.blobs.keys().cloned().collect());
        }

        let exact = segments.join("/");
        let dir = format!("{exact}/");
        let keys: Vec<String> = self
            .blobs
            .keys()
            .filter(|k| **k == exact || k.starts_with(&dir))
            .cloned()
            .collect();

        if keys.is_empty() {
            return Err(Error::not_found(format!("prefix {prefix}")));
        }
        Ok(keys)
    }

    fn backend_type(&self) -> &'static str {
        "memory"
    }
}
