//! Per-origin key-value storage for persisted picker state.
//!
//! Everything the engine persists (named lists, allocator slots, the active
//! list name) is written as a JSON string under a well-known key, the same
//! shape a browser's `localStorage` offers. [`StorageBackend`] abstracts over
//! where those strings live.
//!
//! # Failure Modes
//!
//! | Failure | Cause | Behavior |
//! |---------|-------|----------|
//! | `StorageError::Io` | File I/O failure | Returned to caller, in-memory state unaffected |
//! | `StorageError::Corruption` | Unparseable file or value | Callers treat it as absence |
//! | `StorageError::QuotaExceeded` | Value too large for the backend | Write rejected, nothing stored |
//! | `StorageError::Unavailable` | Storage disabled | Reads and writes rejected |

use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use std::ffi::OsString;
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, RwLock};
use thiserror::Error;

/// Errors that can occur while reading or writing persisted values.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("storage corruption: {0}")]
    Corruption(String),

    #[error("storage quota exceeded: {needed} bytes needed, {quota} allowed")]
    QuotaExceeded { needed: usize, quota: usize },

    #[error("storage unavailable: {0}")]
    Unavailable(String),
}

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Pluggable string key-value storage.
///
/// Implementations must be thread-safe so a backend can be shared between the
/// list store and the allocator.
pub trait StorageBackend: Send + Sync {
    /// Human-readable name for logging.
    fn name(&self) -> &str;

    /// Read the value stored under `key`, or `None` if nothing is stored.
    fn get(&self, key: &str) -> StorageResult<Option<String>>;

    /// Store `value` under `key`, replacing any previous value.
    fn set(&self, key: &str, value: &str) -> StorageResult<()>;

    /// Remove the value stored under `key`. Removing a missing key is not an error.
    fn remove(&self, key: &str) -> StorageResult<()>;

    /// Check if the backend is available and functional.
    fn is_available(&self) -> bool {
        true
    }
}

/// Read and deserialize a JSON value stored under `key`.
///
/// A value that does not parse as `T` is reported as [`StorageError::Corruption`].
pub fn read_json<T: DeserializeOwned>(
    backend: &dyn StorageBackend,
    key: &str,
) -> StorageResult<Option<T>> {
    match backend.get(key)? {
        Some(raw) => serde_json::from_str(&raw)
            .map(Some)
            .map_err(|e| StorageError::Corruption(format!("value under '{key}': {e}"))),
        None => Ok(None),
    }
}

/// Serialize `value` as JSON and store it under `key`.
pub fn write_json<T: Serialize + ?Sized>(
    backend: &dyn StorageBackend,
    key: &str,
    value: &T,
) -> StorageResult<()> {
    let raw = serde_json::to_string(value)
        .map_err(|e| StorageError::Corruption(format!("failed to encode '{key}': {e}")))?;
    backend.set(key, &raw)
}

/// In-memory storage backend for tests and ephemeral sessions.
///
/// An optional quota caps the total number of bytes (keys plus values) held,
/// which lets callers exercise the quota-exceeded path.
#[derive(Debug)]
pub struct MemoryStorage {
    data: RwLock<HashMap<String, String>>,
    quota: Option<usize>,
    available: AtomicBool,
}

impl MemoryStorage {
    /// Create a new empty memory storage with no quota.
    pub fn new() -> Self {
        MemoryStorage {
            data: RwLock::new(HashMap::new()),
            quota: None,
            available: AtomicBool::new(true),
        }
    }

    /// Create an empty memory storage that rejects writes beyond `bytes`.
    pub fn with_quota(bytes: usize) -> Self {
        MemoryStorage {
            quota: Some(bytes),
            ..Self::new()
        }
    }

    /// Simulate storage being disabled (or re-enabled).
    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    /// Store a raw value without any checks, for seeding test fixtures.
    pub fn insert_raw(&self, key: impl Into<String>, value: impl Into<String>) {
        if let Ok(mut data) = self.data.write() {
            data.insert(key.into(), value.into());
        }
    }

    fn check_available(&self) -> StorageResult<()> {
        if self.available.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(StorageError::Unavailable("memory storage disabled".into()))
        }
    }
}

impl Default for MemoryStorage {
    fn default() -> Self {
        Self::new()
    }
}

impl StorageBackend for MemoryStorage {
    fn name(&self) -> &str {
        "MemoryStorage"
    }

    fn get(&self, key: &str) -> StorageResult<Option<String>> {
        self.check_available()?;
        let data = self
            .data
            .read()
            .map_err(|_| StorageError::Corruption("lock poisoned".into()))?;
        Ok(data.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> StorageResult<()> {
        self.check_available()?;
        let mut data = self
            .data
            .write()
            .map_err(|_| StorageError::Corruption("lock poisoned".into()))?;

        if let Some(quota) = self.quota {
            let others: usize = data
                .iter()
                .filter(|(k, _)| k.as_str() != key)
                .map(|(k, v)| k.len() + v.len())
                .sum();
            let needed = others + key.len() + value.len();
            if needed > quota {
                return Err(StorageError::QuotaExceeded { needed, quota });
            }
        }

        data.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> StorageResult<()> {
        self.check_available()?;
        let mut data = self
            .data
            .write()
            .map_err(|_| StorageError::Corruption("lock poisoned".into()))?;
        data.remove(key);
        Ok(())
    }

    fn is_available(&self) -> bool {
        self.available.load(Ordering::SeqCst)
    }
}

/// File-based storage backend.
///
/// All keys live in a single JSON object file:
///
/// ```json
/// {
///   "randomPickerLists": "{\"Students\":[\"Ann\",\"Bo\"]}",
///   "sevenPickersSelectedList": "\"Students\""
/// }
/// ```
///
/// Writes go to `{path}.tmp`, are flushed and synced, then renamed over the
/// target so a crash never leaves a half-written file behind.
#[derive(Debug)]
pub struct FileStorage {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl FileStorage {
    /// Create a file storage at the given path.
    ///
    /// The file does not need to exist; it will be created on first write.
    ///
    /// # Example
    /// ```no_run
    /// use roster_picker::storage::FileStorage;
    ///
    /// let storage = FileStorage::new("./roster-state.json");
    /// ```
    pub fn new(path: impl AsRef<Path>) -> Self {
        FileStorage {
            path: path.as_ref().to_path_buf(),
            write_lock: Mutex::new(()),
        }
    }

    /// Path of the backing file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self.path.file_name().map(OsString::from).unwrap_or_default();
        name.push(".tmp");
        self.path.with_file_name(name)
    }

    fn read_all(&self) -> StorageResult<BTreeMap<String, String>> {
        if !self.path.exists() {
            return Ok(BTreeMap::new());
        }

        let file = File::open(&self.path)?;
        serde_json::from_reader(BufReader::new(file)).map_err(|e| {
            StorageError::Corruption(format!(
                "failed to parse {}: {e}",
                self.path.display()
            ))
        })
    }

    fn write_all(&self, entries: &BTreeMap<String, String>) -> StorageResult<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let tmp_path = self.temp_path();
        {
            let file = File::create(&tmp_path)?;
            let mut writer = BufWriter::new(file);
            serde_json::to_writer_pretty(&mut writer, entries)
                .map_err(|e| StorageError::Corruption(format!("failed to encode: {e}")))?;
            writer.flush()?;
            writer.get_ref().sync_all()?;
        }
        fs::rename(&tmp_path, &self.path)?;
        Ok(())
    }

    /// Read-modify-write of the whole file under the write lock.
    ///
    /// A corrupt file is replaced rather than preserved.
    fn update(&self, apply: impl FnOnce(&mut BTreeMap<String, String>)) -> StorageResult<()> {
        let _guard = self
            .write_lock
            .lock()
            .map_err(|_| StorageError::Corruption("lock poisoned".into()))?;

        let mut entries = match self.read_all() {
            Ok(entries) => entries,
            Err(StorageError::Corruption(reason)) => {
                tracing::warn!(path = %self.path.display(), %reason, "replacing corrupt storage file");
                BTreeMap::new()
            }
            Err(e) => return Err(e),
        };
        apply(&mut entries);
        self.write_all(&entries)
    }
}

impl StorageBackend for FileStorage {
    fn name(&self) -> &str {
        "FileStorage"
    }

    fn get(&self, key: &str) -> StorageResult<Option<String>> {
        Ok(self.read_all()?.remove(key))
    }

    fn set(&self, key: &str, value: &str) -> StorageResult<()> {
        self.update(|entries| {
            entries.insert(key.to_string(), value.to_string());
        })
    }

    fn remove(&self, key: &str) -> StorageResult<()> {
        self.update(|entries| {
            entries.remove(key);
        })
    }
}
