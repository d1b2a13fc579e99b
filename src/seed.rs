/// Seed file sources for auto-bootstrap
///
/// On first load the list store tries a few conventional relative locations
/// for a seed file. This module provides an async trait for fetching those
/// files, with implementations for folder-based and in-memory lookup.
use async_trait::async_trait;
use std::collections::HashMap;
#[cfg(feature = "tokio-runtime")]
use std::path::{Component, Path, PathBuf};
use std::sync::{Arc, RwLock};
use thiserror::Error;

/// Error types for seed fetching
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SeedError {
    #[error("Seed file not found: {0}")]
    NotFound(String),
    #[error("IO error: {0}")]
    IoError(String),
    #[error("Invalid path: {0}")]
    InvalidPath(String),
}

/// Async trait for fetching seed files
///
/// Implementations resolve a relative path (e.g. `../data/random-picker-lists.json`)
/// to the file's text, the way a page would fetch it relative to its own URL.
#[async_trait]
pub trait SeedSource: Send + Sync {
    /// Fetch the text of the seed file at `path`
    async fn fetch(&self, path: &str) -> Result<String, SeedError>;
}

/// Filesystem-based seed source
///
/// Resolves candidate paths against a base directory. Candidates may step up
/// with `..` (the conventional locations do), but absolute paths are rejected.
///
/// Only available with the `tokio-runtime` feature (not on WASM).
#[cfg(feature = "tokio-runtime")]
pub struct FolderSeedSource {
    base_path: PathBuf,
}

#[cfg(feature = "tokio-runtime")]
impl FolderSeedSource {
    /// Create a new FolderSeedSource rooted at `base_path`
    ///
    /// # Example
    /// ```no_run
    /// use roster_picker::seed::FolderSeedSource;
    /// use std::path::PathBuf;
    ///
    /// let source = FolderSeedSource::new(PathBuf::from("./screens"));
    /// ```
    pub fn new(base_path: PathBuf) -> Self {
        FolderSeedSource { base_path }
    }
}

#[cfg(feature = "tokio-runtime")]
#[async_trait]
impl SeedSource for FolderSeedSource {
    async fn fetch(&self, path: &str) -> Result<String, SeedError> {
        let relative = Path::new(path);
        let is_relative = relative
            .components()
            .all(|c| matches!(c, Component::Normal(_) | Component::CurDir | Component::ParentDir));
        if path.is_empty() || !is_relative {
            return Err(SeedError::InvalidPath(path.to_string()));
        }

        let full = self.base_path.join(relative);
        match tokio::fs::read_to_string(&full).await {
            Ok(content) => Ok(content),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(SeedError::NotFound(path.to_string()))
            }
            Err(e) => Err(SeedError::IoError(e.to_string())),
        }
    }
}

/// In-memory seed store
///
/// Useful for testing and for hosts that fetch seed files themselves.
#[derive(Clone)]
pub struct InMemorySeedSource {
    files: Arc<RwLock<HashMap<String, String>>>,
}

impl InMemorySeedSource {
    /// Create a new empty InMemorySeedSource
    pub fn new() -> Self {
        InMemorySeedSource {
            files: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Add a seed file under `path`
    ///
    /// # Example
    /// ```
    /// use roster_picker::seed::InMemorySeedSource;
    ///
    /// let source = InMemorySeedSource::new();
    /// source.add("./random-picker-lists.json", r#"{"Students": ["Ann"]}"#);
    /// ```
    pub fn add(&self, path: impl Into<String>, content: impl Into<String>) {
        if let Ok(mut files) = self.files.write() {
            files.insert(path.into(), content.into());
        }
    }

    /// Remove a seed file. Returns `true` if it existed.
    pub fn remove(&self, path: &str) -> bool {
        self.files
            .write()
            .map(|mut files| files.remove(path).is_some())
            .unwrap_or(false)
    }
}

impl Default for InMemorySeedSource {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SeedSource for InMemorySeedSource {
    async fn fetch(&self, path: &str) -> Result<String, SeedError> {
        let files = self
            .files
            .read()
            .map_err(|_| SeedError::IoError("seed store lock poisoned".to_string()))?;
        files
            .get(path)
            .cloned()
            .ok_or_else(|| SeedError::NotFound(path.to_string()))
    }
}

/// Chain source that tries multiple sources in sequence
///
/// `NotFound` moves on to the next source; any other error stops the chain.
#[derive(Clone, Default)]
pub struct ChainSeedSource {
    sources: Vec<Arc<dyn SeedSource>>,
}

impl ChainSeedSource {
    /// Create a new empty ChainSeedSource
    pub fn new() -> Self {
        ChainSeedSource {
            sources: Vec::new(),
        }
    }

    /// Add a source to the chain. Sources are tried in the order added.
    pub fn with_source(mut self, source: Arc<dyn SeedSource>) -> Self {
        self.sources.push(source);
        self
    }
}

#[async_trait]
impl SeedSource for ChainSeedSource {
    async fn fetch(&self, path: &str) -> Result<String, SeedError> {
        for source in &self.sources {
            match source.fetch(path).await {
                Ok(text) => return Ok(text),
                Err(SeedError::NotFound(_)) => continue,
                Err(e) => return Err(e),
            }
        }
        Err(SeedError::NotFound(path.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_in_memory_source_basic() {
        let source = InMemorySeedSource::new();
        source.add("./lists.json", "{}");

        assert_eq!(source.fetch("./lists.json").await.unwrap(), "{}");
        assert!(matches!(
            source.fetch("../lists.json").await,
            Err(SeedError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_in_memory_source_remove() {
        let source = InMemorySeedSource::new();
        source.add("a", "{}");
        assert!(source.remove("a"));
        assert!(!source.remove("a"));
    }

    #[tokio::test]
    async fn test_chain_source_falls_through() {
        let first = InMemorySeedSource::new();
        let second = InMemorySeedSource::new();
        second.add("b.json", "second");

        let chain = ChainSeedSource::new()
            .with_source(Arc::new(first))
            .with_source(Arc::new(second));

        assert_eq!(chain.fetch("b.json").await.unwrap(), "second");
        assert!(matches!(
            chain.fetch("c.json").await,
            Err(SeedError::NotFound(_))
        ));
    }

    #[cfg(feature = "tokio-runtime")]
    #[tokio::test]
    async fn test_folder_source_reads_parent_relative() {
        let dir = tempfile::tempdir().unwrap();
        let data = dir.path().join("data");
        let screens = dir.path().join("screens");
        std::fs::create_dir_all(&data).unwrap();
        std::fs::create_dir_all(&screens).unwrap();
        std::fs::write(data.join("random-picker-lists.json"), "{}").unwrap();

        let source = FolderSeedSource::new(screens);
        let text = source.fetch("../data/random-picker-lists.json").await;
        assert_eq!(text.unwrap(), "{}");
    }

    #[cfg(feature = "tokio-runtime")]
    #[tokio::test]
    async fn test_folder_source_rejects_absolute() {
        let source = FolderSeedSource::new(PathBuf::from("/tmp"));
        let result = source.fetch("/etc/passwd").await;
        assert!(matches!(result, Err(SeedError::InvalidPath(_))));
    }

    #[cfg(feature = "tokio-runtime")]
    #[tokio::test]
    async fn test_folder_source_missing() {
        let source = FolderSeedSource::new(PathBuf::from("/nonexistent"));
        let result = source.fetch("./random-picker-lists.json").await;
        assert!(matches!(result, Err(SeedError::NotFound(_))));
    }
}
