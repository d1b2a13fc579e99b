//! Roster Picker - randomized selection over named participant lists
//!
//! This library implements the selection engine behind classroom picker
//! widgets: a persisted store of named lists, a bag sampler that cycles
//! through a list without repeats, and a seven-slot allocator whose locked
//! slots survive re-draws.
//!
//! # Example
//!
//! ```
//! use roster_picker::storage::MemoryStorage;
//! use roster_picker::{EngineConfig, PickOutcome, Session};
//! use std::sync::Arc;
//!
//! let mut session = Session::with_seed(Arc::new(MemoryStorage::new()), EngineConfig::default(), 42);
//! session.save_list("Students", ["Ann", "Bo"]).unwrap();
//!
//! let bag = session.create_bag();
//! let first = session.pick_from_list(bag, "Students").unwrap();
//! assert!(matches!(first, PickOutcome::Picked { remaining: 1, .. }));
//! let second = session.pick_from_list(bag, "Students").unwrap();
//! assert!(second.is_cycle_complete());
//! ```

pub mod allocator;
pub mod bag;
pub mod config;
pub mod diagnostic;
pub mod seed;
pub mod session;
pub mod span;
pub mod storage;
pub mod store;

use rand::rngs::StdRng;
use rand::SeedableRng;

/// Re-export main types for convenience
pub use allocator::{AllocationError, Allocator, Slot};
pub use bag::{BagSampler, PickOutcome};
pub use config::{EngineConfig, SLOT_COUNT};
pub use seed::{SeedError, SeedSource};
pub use session::{BagHandle, Change, Session, SessionError};
pub use storage::{StorageBackend, StorageError};
pub use store::{ImportError, ImportStrategy, ListMap, ListStore, StoreError};

/// Draw `count` times from `entries` with a fresh bag and a seeded RNG
///
/// This is a convenience function for deterministic output; the bag refills
/// itself whenever a cycle completes, so `count` may exceed the list size.
///
/// # Example
/// ```
/// use roster_picker::pick_with_seed;
///
/// let entries = vec!["Ann".to_string(), "Bo".to_string()];
/// let picks = pick_with_seed(&entries, 4, 7);
/// assert_eq!(picks.len(), 4);
/// assert!(picks[1].is_cycle_complete());
/// ```
pub fn pick_with_seed(entries: &[String], count: usize, seed: u64) -> Vec<PickOutcome> {
    let mut rng = StdRng::seed_from_u64(seed);
    pick_many(entries, count, &mut rng)
}

/// Draw `count` times from `entries` with a fresh bag
///
/// Stops early with a single [`PickOutcome::Empty`] if `entries` is empty.
pub fn pick_many<R: rand::Rng>(entries: &[String], count: usize, rng: &mut R) -> Vec<PickOutcome> {
    let mut bag = BagSampler::new();
    let mut picks = Vec::with_capacity(count);
    for _ in 0..count {
        let outcome = bag.pick(entries, rng);
        let empty = outcome == PickOutcome::Empty;
        picks.push(outcome);
        if empty {
            break;
        }
    }
    picks
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pick_with_seed_is_deterministic() {
        let entries: Vec<String> = ["a", "b", "c"].iter().map(|s| s.to_string()).collect();
        assert_eq!(pick_with_seed(&entries, 6, 12345), pick_with_seed(&entries, 6, 12345));
    }

    #[test]
    fn test_pick_many_empty() {
        let mut rng = StdRng::seed_from_u64(1);
        assert_eq!(pick_many(&[], 3, &mut rng), vec![PickOutcome::Empty]);
    }

    #[test]
    fn test_pick_many_cycles() {
        let entries: Vec<String> = ["a", "b"].iter().map(|s| s.to_string()).collect();
        let mut rng = StdRng::seed_from_u64(9);
        let picks = pick_many(&entries, 4, &mut rng);
        let completes: Vec<bool> = picks.iter().map(PickOutcome::is_cycle_complete).collect();
        assert_eq!(completes, vec![false, true, false, true]);
    }
}
