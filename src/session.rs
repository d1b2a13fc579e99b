//! Explicit picker instances for a presentation layer.
//!
//! A [`Session`] owns the shared [`ListStore`], the single [`Allocator`], and
//! any number of independent bag samplers addressed by [`BagHandle`]. The
//! presentation layer keeps the handles and passes them back into every
//! operation. Listeners registered with [`Session::subscribe`] are called
//! only after a mutation has fully completed, so a re-render always sees
//! consistent state.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;
use tracing::debug;

use crate::allocator::{AllocationError, Allocator};
use crate::bag::{entries_from_text, BagSampler, PickOutcome};
use crate::config::EngineConfig;
use crate::seed::SeedSource;
use crate::storage::StorageBackend;
use crate::store::{ImportStrategy, ListMap, ListStore, StoreError};

/// Opaque identifier of one bag sampler within a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BagHandle(u64);

/// A completed state change, delivered to subscribers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Change {
    ListsChanged,
    BagChanged(BagHandle),
    SlotsChanged,
    ActiveListChanged,
}

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("unknown picker {0:?}")]
    UnknownBag(BagHandle),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Allocation(#[from] AllocationError),
}

type Listener = Box<dyn FnMut(&Change)>;

pub struct Session<R: Rng = StdRng> {
    config: EngineConfig,
    store: ListStore,
    allocator: Allocator,
    bags: HashMap<BagHandle, BagSampler>,
    next_bag: u64,
    rng: R,
    listeners: Vec<Listener>,
}

impl Session<StdRng> {
    /// Open a session over `backend` with an entropy-seeded RNG.
    pub fn open(backend: Arc<dyn StorageBackend>, config: EngineConfig) -> Self {
        Self::with_rng(backend, config, StdRng::from_entropy())
    }

    /// Open a session whose draws are reproducible for a given seed.
    pub fn with_seed(backend: Arc<dyn StorageBackend>, config: EngineConfig, seed: u64) -> Self {
        Self::with_rng(backend, config, StdRng::seed_from_u64(seed))
    }
}

impl<R: Rng> Session<R> {
    pub fn with_rng(backend: Arc<dyn StorageBackend>, config: EngineConfig, rng: R) -> Self {
        let store = ListStore::open(backend.clone(), &config);
        let allocator = Allocator::open(backend, &config);
        Session {
            config,
            store,
            allocator,
            bags: HashMap::new(),
            next_bag: 0,
            rng,
            listeners: Vec::new(),
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn store(&self) -> &ListStore {
        &self.store
    }

    pub fn allocator(&self) -> &Allocator {
        &self.allocator
    }

    /// Register a callback invoked after every completed mutation.
    pub fn subscribe(&mut self, listener: impl FnMut(&Change) + 'static) {
        self.listeners.push(Box::new(listener));
    }

    fn notify(&mut self, change: Change) {
        debug!(?change, listeners = self.listeners.len(), "state changed");
        for listener in &mut self.listeners {
            listener(&change);
        }
    }

    /// Notify for store results that may have changed the in-memory lists.
    ///
    /// A storage failure still leaves the new lists in memory.
    fn notify_lists<T>(&mut self, result: Result<T, StoreError>) -> Result<T, SessionError> {
        if matches!(result, Ok(_) | Err(StoreError::Storage(_))) {
            self.notify(Change::ListsChanged);
        }
        Ok(result?)
    }

    // Bag samplers

    pub fn create_bag(&mut self) -> BagHandle {
        let handle = BagHandle(self.next_bag);
        self.next_bag += 1;
        self.bags.insert(handle, BagSampler::new());
        handle
    }

    /// Discard a bag. Returns `false` if the handle was unknown.
    pub fn drop_bag(&mut self, handle: BagHandle) -> bool {
        self.bags.remove(&handle).is_some()
    }

    pub fn bag(&self, handle: BagHandle) -> Option<&BagSampler> {
        self.bags.get(&handle)
    }

    /// Draw from `source` using the bag behind `handle`.
    pub fn pick(&mut self, handle: BagHandle, source: &[String]) -> Result<PickOutcome, SessionError> {
        let bag = self
            .bags
            .get_mut(&handle)
            .ok_or(SessionError::UnknownBag(handle))?;
        let outcome = bag.pick(source, &mut self.rng);
        if outcome != PickOutcome::Empty {
            self.notify(Change::BagChanged(handle));
        }
        Ok(outcome)
    }

    /// Draw from newline-separated picker text.
    pub fn pick_from_text(&mut self, handle: BagHandle, text: &str) -> Result<PickOutcome, SessionError> {
        self.pick(handle, &entries_from_text(text))
    }

    /// Draw from a saved list; a missing list behaves as an empty one.
    pub fn pick_from_list(&mut self, handle: BagHandle, name: &str) -> Result<PickOutcome, SessionError> {
        let source = self.store.get(name).map(<[String]>::to_vec).unwrap_or_default();
        self.pick(handle, &source)
    }

    pub fn reset_bag(&mut self, handle: BagHandle) -> Result<(), SessionError> {
        self.bags
            .get_mut(&handle)
            .ok_or(SessionError::UnknownBag(handle))?
            .reset();
        self.notify(Change::BagChanged(handle));
        Ok(())
    }

    // List store

    pub fn save_list<I, S>(&mut self, name: &str, entries: I) -> Result<(), SessionError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let result = self.store.save_list(name, entries);
        self.notify_lists(result)
    }

    pub fn delete_list(&mut self, name: &str) -> Result<bool, SessionError> {
        let result = self.store.delete_list(name);
        match result {
            Ok(false) => Ok(false),
            other => self.notify_lists(other),
        }
    }

    pub fn import_json(&mut self, text: &str, strategy: ImportStrategy) -> Result<usize, SessionError> {
        let result = self.store.import_json(text, strategy);
        self.notify_lists(result)
    }

    pub fn import_merge(&mut self, incoming: ListMap, strategy: ImportStrategy) -> Result<(), SessionError> {
        let result = self.store.import_merge(incoming, strategy);
        self.notify_lists(result)
    }

    pub fn export(&self) -> ListMap {
        self.store.export()
    }

    pub fn export_json(&self) -> Result<String, SessionError> {
        Ok(self.store.export_json()?)
    }

    /// Re-read lists and allocator state after an external change.
    pub fn reload(&mut self) {
        let active_before = self.allocator.active_list().to_string();
        self.store.reload();
        self.allocator.reload();
        self.notify(Change::ListsChanged);
        self.notify(Change::SlotsChanged);
        if self.allocator.active_list() != active_before {
            self.notify(Change::ActiveListChanged);
        }
    }

    /// Merge the first seed file found at the configured locations.
    pub async fn auto_bootstrap(&mut self, source: &dyn SeedSource) -> Option<String> {
        let paths = self.config.seed_paths.clone();
        let used = self.store.auto_bootstrap(source, paths.as_slice()).await;
        if used.is_some() {
            self.notify(Change::ListsChanged);
        }
        used
    }

    // Allocator

    /// Fill every unlocked slot from the active list.
    pub fn randomize(&mut self) -> Result<usize, SessionError> {
        let filled = self.allocator.randomize_unlocked(&self.store, &mut self.rng)?;
        self.notify(Change::SlotsChanged);
        Ok(filled)
    }

    pub fn toggle_lock(&mut self, index: usize) -> Result<bool, SessionError> {
        let locked = self.allocator.toggle_lock(index)?;
        self.notify(Change::SlotsChanged);
        Ok(locked)
    }

    pub fn set_occupant(&mut self, index: usize, name: &str) -> Result<(), SessionError> {
        self.allocator.set_occupant(index, name)?;
        self.notify(Change::SlotsChanged);
        Ok(())
    }

    pub fn clear_all(&mut self) {
        self.allocator.clear_all();
        self.notify(Change::SlotsChanged);
    }

    pub fn switch_list(&mut self, name: &str) {
        self.allocator.switch_list(name);
        self.notify(Change::ActiveListChanged);
    }

    /// Lists offered as allocator sources.
    pub fn candidate_lists(&self) -> Vec<&str> {
        self.allocator.candidate_lists(&self.store).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStorage;
    use std::cell::RefCell;
    use std::rc::Rc;

    fn session() -> Session {
        Session::with_seed(Arc::new(MemoryStorage::new()), EngineConfig::default(), 42)
    }

    #[test]
    fn test_bags_are_independent() {
        let mut session = session();
        session.save_list("Class", ["a", "b", "c"]).unwrap();
        let first = session.create_bag();
        let second = session.create_bag();
        assert_ne!(first, second);

        session.pick_from_list(first, "Class").unwrap();
        session.pick_from_list(first, "Class").unwrap();
        session.pick_from_list(second, "Class").unwrap();

        assert_eq!(session.bag(first).unwrap().remaining(), 1);
        assert_eq!(session.bag(second).unwrap().remaining(), 2);
    }

    #[test]
    fn test_unknown_bag() {
        let mut session = session();
        let handle = session.create_bag();
        assert!(session.drop_bag(handle));
        assert!(matches!(
            session.pick_from_text(handle, "a"),
            Err(SessionError::UnknownBag(_))
        ));
        assert!(matches!(
            session.reset_bag(handle),
            Err(SessionError::UnknownBag(_))
        ));
    }

    #[test]
    fn test_listeners_see_completed_changes() {
        let mut session = session();
        let changes = Rc::new(RefCell::new(Vec::new()));
        let sink = changes.clone();
        session.subscribe(move |change| sink.borrow_mut().push(*change));

        let bag = session.create_bag();
        session.pick_from_text(bag, "").unwrap();
        session.save_list("Students 2026", ["a", "b", "c", "d", "e", "f", "g"]).unwrap();
        session.pick_from_text(bag, "x").unwrap();
        session.randomize().unwrap();
        session.switch_list("Other");
        assert!(session.toggle_lock(99).is_err());
        assert!(session.save_list("", ["x"]).is_err());

        assert_eq!(
            *changes.borrow(),
            vec![
                Change::ListsChanged,
                Change::BagChanged(bag),
                Change::SlotsChanged,
                Change::ActiveListChanged,
            ]
        );
    }

    #[test]
    fn test_reload_picks_up_changes_from_another_session() {
        let backend = Arc::new(MemoryStorage::new());
        let mut local = Session::with_seed(backend.clone(), EngineConfig::default(), 1);
        let mut other = Session::with_seed(backend, EngineConfig::default(), 2);

        let changes = Rc::new(RefCell::new(Vec::new()));
        let sink = changes.clone();
        local.subscribe(move |change| sink.borrow_mut().push(*change));

        other.save_list("Period 4 students", ["Ann", "Bo"]).unwrap();
        other.set_occupant(0, "Ann").unwrap();
        other.toggle_lock(0).unwrap();
        other.switch_list("Period 4 students");

        assert!(!local.store().contains("Period 4 students"));
        local.reload();

        assert!(local.store().contains("Period 4 students"));
        assert_eq!(local.allocator().slots()[0].occupant(), Some("Ann"));
        assert!(local.allocator().slots()[0].locked);
        assert_eq!(local.allocator().active_list(), "Period 4 students");
        assert_eq!(
            *changes.borrow(),
            vec![
                Change::ListsChanged,
                Change::SlotsChanged,
                Change::ActiveListChanged
            ]
        );

        // Nothing changed in between, so the active list is not re-announced
        changes.borrow_mut().clear();
        local.reload();
        assert_eq!(
            *changes.borrow(),
            vec![Change::ListsChanged, Change::SlotsChanged]
        );
    }

    #[test]
    fn test_delete_missing_list_is_silent() {
        let mut session = session();
        let count = Rc::new(RefCell::new(0));
        let sink = count.clone();
        session.subscribe(move |_| *sink.borrow_mut() += 1);
        assert!(!session.delete_list("nope").unwrap());
        assert_eq!(*count.borrow(), 0);
    }
}
