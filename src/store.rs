//! Named list storage
//!
//! The [`ListStore`] owns the canonical mapping of list name to entries and
//! mirrors it, write-through, into a [`StorageBackend`] under one well-known
//! key. Reads never fail: a missing or corrupt persisted value is an empty
//! store. Writes that fail leave the in-memory copy authoritative and report
//! the failure so an explicit save or import can warn the user.

use serde_json::Value as JsonValue;
use std::collections::BTreeMap;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::config::EngineConfig;
use crate::seed::SeedSource;
use crate::span::Span;
use crate::storage::{self, StorageBackend, StorageError};

/// Mapping of list name to entries, in canonical (sorted) key order.
pub type ListMap = BTreeMap<String, Vec<String>>;

/// How an imported mapping is combined with the current store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImportStrategy {
    /// Discard the current store and adopt the incoming mapping wholesale.
    Replace,
    /// Use the incoming mapping as the base; current lists win on name collision.
    Merge,
}

/// An imported file that is not a mapping of names to string arrays.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ImportError {
    #[error("invalid JSON: {message}")]
    Syntax { message: String, span: Span },

    #[error("expected an object mapping list names to arrays of names")]
    NotAnObject,

    #[error("list '{name}' must be an array of strings")]
    InvalidList { name: String },
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("list name cannot be empty")]
    EmptyName,

    #[error("cannot save an empty list: '{0}'")]
    EmptyList(String),

    #[error("failed to encode lists: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("failed to persist lists: {0}")]
    Storage(#[from] StorageError),

    #[error(transparent)]
    Import(#[from] ImportError),
}

/// Trim every entry and drop the ones left blank.
pub fn normalize_entries<I, S>(entries: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    entries
        .into_iter()
        .map(|entry| entry.as_ref().trim().to_string())
        .filter(|entry| !entry.is_empty())
        .collect()
}

/// Parse an import file into a list mapping without touching any store.
///
/// Entries are normalized the same way [`ListStore::save_list`] normalizes them.
///
/// # Example
/// ```
/// use roster_picker::store::parse_import;
///
/// let lists = parse_import(r#"{"Students": ["Ann", " Bo ", ""]}"#).unwrap();
/// assert_eq!(lists["Students"], vec!["Ann", "Bo"]);
/// ```
pub fn parse_import(text: &str) -> Result<ListMap, ImportError> {
    let value: JsonValue = serde_json::from_str(text).map_err(|e| ImportError::Syntax {
        message: e.to_string(),
        span: Span::at_line_column(text, e.line(), e.column()),
    })?;

    let JsonValue::Object(object) = value else {
        return Err(ImportError::NotAnObject);
    };

    let mut lists = ListMap::new();
    for (name, entries) in object {
        let JsonValue::Array(items) = entries else {
            return Err(ImportError::InvalidList { name });
        };
        let mut names = Vec::with_capacity(items.len());
        for item in items {
            match item {
                JsonValue::String(s) => names.push(s),
                _ => return Err(ImportError::InvalidList { name }),
            }
        }
        lists.insert(name, normalize_entries(names));
    }
    Ok(lists)
}

/// Combine `incoming` with `current` according to `strategy`.
pub fn merge_lists(current: ListMap, incoming: ListMap, strategy: ImportStrategy) -> ListMap {
    match strategy {
        ImportStrategy::Replace => incoming,
        ImportStrategy::Merge => {
            let mut merged = incoming;
            merged.extend(current);
            merged
        }
    }
}

/// Durable, mergeable storage of named participant lists.
pub struct ListStore {
    backend: Arc<dyn StorageBackend>,
    key: String,
    lists: ListMap,
}

impl ListStore {
    /// Open the store persisted in `backend`, loading whatever is there.
    pub fn open(backend: Arc<dyn StorageBackend>, config: &EngineConfig) -> Self {
        let lists = Self::load(backend.as_ref(), &config.lists_key);
        ListStore {
            backend,
            key: config.lists_key.clone(),
            lists,
        }
    }

    /// Read the persisted mapping. Absence or a parse failure yields an empty map.
    pub fn load(backend: &dyn StorageBackend, key: &str) -> ListMap {
        match storage::read_json::<ListMap>(backend, key) {
            Ok(Some(lists)) => {
                debug!(backend = backend.name(), count = lists.len(), "loaded saved lists");
                lists
            }
            Ok(None) => ListMap::new(),
            Err(e) => {
                warn!(backend = backend.name(), error = %e, "could not load saved lists, starting empty");
                ListMap::new()
            }
        }
    }

    /// Re-read the persisted mapping, picking up changes made elsewhere.
    pub fn reload(&mut self) {
        self.lists = Self::load(self.backend.as_ref(), &self.key);
    }

    /// Write the full mapping to storage.
    ///
    /// On failure the in-memory lists are kept as they are.
    pub fn save(&self) -> Result<(), StoreError> {
        storage::write_json(self.backend.as_ref(), &self.key, &self.lists).map_err(|e| {
            warn!(backend = self.backend.name(), error = %e, "error saving lists");
            StoreError::Storage(e)
        })
    }

    /// All lists, keyed by name.
    pub fn lists(&self) -> &ListMap {
        &self.lists
    }

    /// Entries of the named list, if it exists.
    pub fn get(&self, name: &str) -> Option<&[String]> {
        self.lists.get(name).map(Vec::as_slice)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.lists.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.lists.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lists.is_empty()
    }

    /// Save entries under `name`, overwriting any list with the same name.
    ///
    /// The name and entries are trimmed and blank entries dropped; an empty
    /// name or a list with no remaining entries is rejected.
    pub fn save_list<I, S>(&mut self, name: &str, entries: I) -> Result<(), StoreError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let name = name.trim();
        if name.is_empty() {
            return Err(StoreError::EmptyName);
        }
        let entries = normalize_entries(entries);
        if entries.is_empty() {
            return Err(StoreError::EmptyList(name.to_string()));
        }

        info!(list = name, entries = entries.len(), "saving list");
        self.lists.insert(name.to_string(), entries);
        self.save()
    }

    /// Delete a list. Returns `false` if no list had that name.
    pub fn delete_list(&mut self, name: &str) -> Result<bool, StoreError> {
        if self.lists.remove(name).is_none() {
            return Ok(false);
        }
        info!(list = name, "deleted list");
        self.save()?;
        Ok(true)
    }

    /// Combine an already-parsed mapping with the store and persist the result.
    pub fn import_merge(
        &mut self,
        incoming: ListMap,
        strategy: ImportStrategy,
    ) -> Result<(), StoreError> {
        let current = std::mem::take(&mut self.lists);
        self.lists = merge_lists(current, incoming, strategy);
        info!(?strategy, count = self.lists.len(), "imported lists");
        self.save()
    }

    /// Parse an import file and apply it. Invalid files leave the store untouched.
    ///
    /// Returns the number of lists the file contained.
    pub fn import_json(&mut self, text: &str, strategy: ImportStrategy) -> Result<usize, StoreError> {
        let incoming = parse_import(text)?;
        let count = incoming.len();
        self.import_merge(incoming, strategy)?;
        Ok(count)
    }

    /// Snapshot of the full mapping for download.
    pub fn export(&self) -> ListMap {
        self.lists.clone()
    }

    /// The full mapping as pretty-printed JSON.
    pub fn export_json(&self) -> Result<String, StoreError> {
        Ok(serde_json::to_string_pretty(&self.lists)?)
    }

    /// Names of all lists in sorted order.
    ///
    /// The iterator is lazy and `Clone`, so it can be restarted.
    pub fn names(&self) -> impl Iterator<Item = &str> + Clone + '_ {
        self.lists.keys().map(String::as_str)
    }

    /// Names of lists accepted by `filter`, in sorted order.
    pub fn list_names<'a, F>(&'a self, filter: F) -> impl Iterator<Item = &'a str> + Clone + 'a
    where
        F: Fn(&str) -> bool + Clone + 'a,
    {
        self.names().filter(move |name| filter(name))
    }

    /// Names containing `keyword`, compared case-insensitively.
    pub fn names_containing<'a>(
        &'a self,
        keyword: &str,
    ) -> impl Iterator<Item = &'a str> + Clone + 'a {
        let keyword = keyword.to_lowercase();
        self.list_names(move |name| name.to_lowercase().contains(&keyword))
    }

    /// Try each candidate seed path in order and merge the first valid file.
    ///
    /// Seed data never overrides lists already saved locally. Returns the path
    /// that was used, or `None` if no candidate resolved to a valid file.
    ///
    /// # Example
    /// ```
    /// # tokio_test::block_on(async {
    /// use roster_picker::seed::InMemorySeedSource;
    /// use roster_picker::storage::MemoryStorage;
    /// use roster_picker::{EngineConfig, ListStore};
    /// use std::sync::Arc;
    ///
    /// let source = InMemorySeedSource::new();
    /// source.add("./random-picker-lists.json", r#"{"Students": ["Ann", "Bo"]}"#);
    ///
    /// let mut store = ListStore::open(Arc::new(MemoryStorage::new()), &EngineConfig::default());
    /// let used = store.auto_bootstrap(&source, &["../data/random-picker-lists.json", "./random-picker-lists.json"][..]).await;
    /// assert_eq!(used.as_deref(), Some("./random-picker-lists.json"));
    /// assert!(store.contains("Students"));
    /// # });
    /// ```
    pub async fn auto_bootstrap<P>(&mut self, source: &dyn SeedSource, candidates: &[P]) -> Option<String>
    where
        P: AsRef<str> + Sync,
    {
        for candidate in candidates {
            let path = candidate.as_ref();
            let text = match source.fetch(path).await {
                Ok(text) => text,
                Err(e) => {
                    debug!(path, error = %e, "seed candidate unavailable");
                    continue;
                }
            };
            let incoming = match parse_import(&text) {
                Ok(lists) => lists,
                Err(e) => {
                    debug!(path, error = %e, "seed candidate is not a valid list file");
                    continue;
                }
            };

            let current = std::mem::take(&mut self.lists);
            self.lists = merge_lists(current, incoming, ImportStrategy::Merge);
            if let Err(e) = self.save() {
                debug!(path, error = %e, "bootstrapped lists kept in memory only");
            }
            info!(path, count = self.lists.len(), "auto-loaded and merged seed lists");
            return Some(path.to_string());
        }

        debug!("no seed file found in any expected location");
        None
    }
}

impl std::fmt::Debug for ListStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ListStore")
            .field("backend", &self.backend.name())
            .field("key", &self.key)
            .field("lists", &self.lists.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStorage;

    fn store_with(backend: Arc<MemoryStorage>) -> ListStore {
        ListStore::open(backend, &EngineConfig::default())
    }

    #[test]
    fn test_load_missing_is_empty() {
        let store = store_with(Arc::new(MemoryStorage::new()));
        assert!(store.is_empty());
    }

    #[test]
    fn test_load_corrupt_is_empty() {
        let backend = Arc::new(MemoryStorage::new());
        backend.insert_raw("randomPickerLists", "[1, 2");
        let store = store_with(backend);
        assert!(store.is_empty());
    }

    #[test]
    fn test_save_list_normalizes() {
        let backend = Arc::new(MemoryStorage::new());
        let mut store = store_with(backend.clone());
        store
            .save_list("  Group A ", ["  Ann", "", "Bo  ", "   "])
            .unwrap();

        assert_eq!(store.get("Group A").unwrap(), ["Ann", "Bo"]);
        let reopened = store_with(backend);
        assert_eq!(reopened.get("Group A").unwrap(), ["Ann", "Bo"]);
    }

    #[test]
    fn test_save_list_rejects_empty() {
        let mut store = store_with(Arc::new(MemoryStorage::new()));
        assert!(matches!(
            store.save_list("   ", ["Ann"]),
            Err(StoreError::EmptyName)
        ));
        assert!(matches!(
            store.save_list("Empty", ["", "  "]),
            Err(StoreError::EmptyList(_))
        ));
        assert!(store.is_empty());
    }

    #[test]
    fn test_duplicate_entries_are_kept() {
        let mut store = store_with(Arc::new(MemoryStorage::new()));
        store.save_list("Dupes", ["Ann", "Ann"]).unwrap();
        assert_eq!(store.get("Dupes").unwrap().len(), 2);
    }

    #[test]
    fn test_delete_list() {
        let mut store = store_with(Arc::new(MemoryStorage::new()));
        store.save_list("A", ["x"]).unwrap();
        assert!(store.delete_list("A").unwrap());
        assert!(!store.delete_list("A").unwrap());
        assert!(!store.contains("A"));
    }

    #[test]
    fn test_failed_save_keeps_memory() {
        let backend = Arc::new(MemoryStorage::with_quota(8));
        let mut store = store_with(backend);
        let result = store.save_list("Students", ["Ann", "Bo", "Cy"]);
        assert!(matches!(
            result,
            Err(StoreError::Storage(StorageError::QuotaExceeded { .. }))
        ));
        assert_eq!(store.get("Students").unwrap(), ["Ann", "Bo", "Cy"]);
    }

    #[test]
    fn test_parse_import_rejects_bad_shapes() {
        assert_eq!(parse_import("[]"), Err(ImportError::NotAnObject));
        assert_eq!(parse_import("null"), Err(ImportError::NotAnObject));
        assert_eq!(
            parse_import(r#"{"A": "Ann"}"#),
            Err(ImportError::InvalidList { name: "A".into() })
        );
        assert_eq!(
            parse_import(r#"{"A": ["Ann", 3]}"#),
            Err(ImportError::InvalidList { name: "A".into() })
        );
        assert!(matches!(
            parse_import("{\"A\": [\"Ann\""),
            Err(ImportError::Syntax { .. })
        ));
    }

    #[test]
    fn test_invalid_import_leaves_store_untouched() {
        let mut store = store_with(Arc::new(MemoryStorage::new()));
        store.save_list("Students", ["Ann"]).unwrap();

        let result = store.import_json("not json", ImportStrategy::Replace);
        assert!(matches!(result, Err(StoreError::Import(_))));
        assert_eq!(store.get("Students").unwrap(), ["Ann"]);
    }

    #[test]
    fn test_replace_import() {
        let mut store = store_with(Arc::new(MemoryStorage::new()));
        store.save_list("Old", ["x"]).unwrap();
        let count = store
            .import_json(r#"{"New": ["y"]}"#, ImportStrategy::Replace)
            .unwrap();
        assert_eq!(count, 1);
        assert!(!store.contains("Old"));
        assert_eq!(store.get("New").unwrap(), ["y"]);
    }

    #[test]
    fn test_names_containing_is_case_insensitive() {
        let mut store = store_with(Arc::new(MemoryStorage::new()));
        store.save_list("Students 2026", ["a"]).unwrap();
        store.save_list("STUDENT helpers", ["b"]).unwrap();
        store.save_list("Prompts", ["c"]).unwrap();

        let names = store.names_containing("student");
        let first: Vec<_> = names.clone().collect();
        let again: Vec<_> = names.collect();
        assert_eq!(first, vec!["STUDENT helpers", "Students 2026"]);
        assert_eq!(first, again);
    }

    #[test]
    fn test_export_json_is_pretty() {
        let mut store = store_with(Arc::new(MemoryStorage::new()));
        store.save_list("A", ["x"]).unwrap();
        let json = store.export_json().unwrap();
        assert!(json.contains('\n'));
        assert_eq!(parse_import(&json).unwrap(), store.export());
    }
}
