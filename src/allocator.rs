//! Seven-slot constrained allocator with per-slot locks.
//!
//! The allocator keeps exactly [`SLOT_COUNT`] slots. Locked slots keep their
//! occupant; [`Allocator::randomize_unlocked`] refills every unlocked slot
//! with distinct names drawn from the active list, never reusing a name that
//! sits in a locked slot. A draw that cannot fill every unlocked slot changes
//! nothing.
//!
//! Slot state and the active list name are persisted under their own keys,
//! independently of the list store. Every mutation writes through; a failed
//! write is logged and remembered, and the in-memory state stays authoritative.

use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::config::{EngineConfig, SLOT_COUNT};
use crate::storage::{self, StorageBackend};
use crate::store::ListStore;

/// One allocator slot, persisted as `{ "name": "...", "locked": false }`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Slot {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub locked: bool,
}

impl Slot {
    /// The occupant's name, or `None` if the slot is empty.
    pub fn occupant(&self) -> Option<&str> {
        if self.name.is_empty() {
            None
        } else {
            Some(&self.name)
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AllocationError {
    #[error("no names in list '{list}'")]
    EmptySource { list: String },

    #[error("not enough names to fill all unlocked slots: {needed} needed, {available} available")]
    InsufficientCandidates { needed: usize, available: usize },

    #[error("slot {index} does not exist")]
    SlotOutOfRange { index: usize },
}

/// Pad or truncate a persisted slot array to exactly [`SLOT_COUNT`] slots.
pub fn normalize_slots(slots: Vec<Slot>) -> [Slot; SLOT_COUNT] {
    let mut slots = slots.into_iter();
    std::array::from_fn(|_| slots.next().unwrap_or_default())
}

/// The allocator's candidate pool after list resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SourceList<'s> {
    /// Name of the list actually used, or `None` if nothing resolved.
    pub name: Option<&'s str>,
    pub entries: &'s [String],
}

pub struct Allocator {
    backend: Arc<dyn StorageBackend>,
    slots_key: String,
    active_list_key: String,
    default_list: String,
    candidate_keyword: String,
    slots: [Slot; SLOT_COUNT],
    active_list: String,
    last_persist_error: Option<String>,
}

impl Allocator {
    /// Open the allocator persisted in `backend`.
    ///
    /// Missing or corrupt slot data yields seven empty, unlocked slots; a
    /// missing active list name yields the configured default.
    pub fn open(backend: Arc<dyn StorageBackend>, config: &EngineConfig) -> Self {
        let mut allocator = Allocator {
            backend,
            slots_key: config.slots_key.clone(),
            active_list_key: config.active_list_key.clone(),
            default_list: config.default_list.clone(),
            candidate_keyword: config.candidate_keyword.clone(),
            slots: Default::default(),
            active_list: config.default_list.clone(),
            last_persist_error: None,
        };
        allocator.reload();
        allocator
    }

    /// Re-read slots and the active list name from storage.
    pub fn reload(&mut self) {
        let backend = self.backend.as_ref();

        self.slots = match storage::read_json::<Vec<Slot>>(backend, &self.slots_key) {
            Ok(Some(slots)) => {
                if slots.len() != SLOT_COUNT {
                    debug!(stored = slots.len(), "normalizing persisted slot count");
                }
                normalize_slots(slots)
            }
            Ok(None) => Default::default(),
            Err(e) => {
                warn!(error = %e, "could not load slots, starting empty");
                Default::default()
            }
        };

        self.active_list = match storage::read_json::<String>(backend, &self.active_list_key) {
            Ok(Some(name)) => name,
            Ok(None) => self.default_list.clone(),
            Err(e) => {
                warn!(error = %e, "could not load active list name, using default");
                self.default_list.clone()
            }
        };
    }

    pub fn slots(&self) -> &[Slot; SLOT_COUNT] {
        &self.slots
    }

    pub fn slot(&self, index: usize) -> Result<&Slot, AllocationError> {
        self.slots
            .get(index)
            .ok_or(AllocationError::SlotOutOfRange { index })
    }

    /// Name of the list the allocator draws from.
    pub fn active_list(&self) -> &str {
        &self.active_list
    }

    /// The most recent persistence failure, cleared by the next successful write.
    pub fn last_persist_error(&self) -> Option<&str> {
        self.last_persist_error.as_deref()
    }

    /// Pick the candidate pool for `requested`.
    ///
    /// Resolution order: the requested list, then the configured default
    /// list, then an empty pool.
    pub fn resolve_source_list<'s>(&self, store: &'s ListStore, requested: &str) -> SourceList<'s> {
        for name in [requested, self.default_list.as_str()] {
            if let Some((key, entries)) = store.lists().get_key_value(name) {
                return SourceList {
                    name: Some(key.as_str()),
                    entries: entries.as_slice(),
                };
            }
        }
        SourceList {
            name: None,
            entries: &[],
        }
    }

    /// The candidate pool for the active list.
    pub fn source_list<'s>(&self, store: &'s ListStore) -> SourceList<'s> {
        self.resolve_source_list(store, &self.active_list)
    }

    /// Lists offered as allocator sources: names containing the candidate keyword.
    pub fn candidate_lists<'s>(
        &self,
        store: &'s ListStore,
    ) -> impl Iterator<Item = &'s str> + Clone + 's {
        store.names_containing(&self.candidate_keyword)
    }

    /// Make `name` the active list and persist the choice.
    pub fn switch_list(&mut self, name: &str) {
        info!(list = name, "switching allocator list");
        self.active_list = name.to_string();
        let result = storage::write_json(self.backend.as_ref(), &self.active_list_key, name);
        self.record_persist(result);
    }

    /// Fill every unlocked slot with a distinct name from the active list.
    ///
    /// Names occupying locked slots are excluded, and duplicates in the list
    /// count once. Returns the number of slots filled. On error nothing changes.
    pub fn randomize_unlocked<R: Rng>(
        &mut self,
        store: &ListStore,
        rng: &mut R,
    ) -> Result<usize, AllocationError> {
        let source = self.source_list(store);
        if source.entries.is_empty() {
            return Err(AllocationError::EmptySource {
                list: source.name.unwrap_or(&self.active_list).to_string(),
            });
        }

        let locked: HashSet<&str> = self
            .slots
            .iter()
            .filter(|slot| slot.locked)
            .filter_map(Slot::occupant)
            .collect();

        let mut seen = HashSet::new();
        let mut available: Vec<&String> = Vec::with_capacity(source.entries.len());
        for name in source.entries {
            if !locked.contains(name.as_str()) && seen.insert(name.as_str()) {
                available.push(name);
            }
        }

        let unlocked: Vec<usize> = (0..SLOT_COUNT)
            .filter(|&index| !self.slots[index].locked)
            .collect();

        if available.len() < unlocked.len() {
            debug!(
                needed = unlocked.len(),
                available = available.len(),
                "not enough candidates for unlocked slots"
            );
            return Err(AllocationError::InsufficientCandidates {
                needed: unlocked.len(),
                available: available.len(),
            });
        }

        available.shuffle(rng);
        let picks: Vec<String> = available
            .into_iter()
            .take(unlocked.len())
            .cloned()
            .collect();

        for (&index, name) in unlocked.iter().zip(picks) {
            self.slots[index].name = name;
        }

        info!(filled = unlocked.len(), list = ?source.name, "randomized unlocked slots");
        self.persist_slots();
        Ok(unlocked.len())
    }

    /// Flip the lock on a slot, leaving its occupant alone. Returns the new lock state.
    pub fn toggle_lock(&mut self, index: usize) -> Result<bool, AllocationError> {
        let slot = self
            .slots
            .get_mut(index)
            .ok_or(AllocationError::SlotOutOfRange { index })?;
        slot.locked = !slot.locked;
        let locked = slot.locked;
        debug!(index, locked, "toggled slot lock");
        self.persist_slots();
        Ok(locked)
    }

    /// Manually set a slot's occupant, regardless of its lock.
    pub fn set_occupant(&mut self, index: usize, name: &str) -> Result<(), AllocationError> {
        let slot = self
            .slots
            .get_mut(index)
            .ok_or(AllocationError::SlotOutOfRange { index })?;
        slot.name = name.trim().to_string();
        debug!(index, name = %slot.name, "set slot occupant");
        self.persist_slots();
        Ok(())
    }

    /// Reset every slot to empty and unlocked.
    pub fn clear_all(&mut self) {
        self.slots = Default::default();
        info!("cleared all slots");
        self.persist_slots();
    }

    fn persist_slots(&mut self) {
        let result = storage::write_json(self.backend.as_ref(), &self.slots_key, &self.slots);
        self.record_persist(result);
    }

    fn record_persist(&mut self, result: storage::StorageResult<()>) {
        match result {
            Ok(()) => self.last_persist_error = None,
            Err(e) => {
                warn!(backend = self.backend.name(), error = %e, "error saving allocator state");
                self.last_persist_error = Some(e.to_string());
            }
        }
    }
}

impl std::fmt::Debug for Allocator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Allocator")
            .field("backend", &self.backend.name())
            .field("slots", &self.slots)
            .field("active_list", &self.active_list)
            .finish()
    }
}
