//! Sampling without replacement, with automatic reset on exhaustion.
//!
//! A [`BagSampler`] draws entries from a snapshot of its source list until
//! every entry has come up once, then refills itself so the next pick starts
//! a fresh cycle. The caller passes the current source on every pick; if its
//! value differs from the snapshot the bag is reseeded from the new content.

use rand::Rng;
use tracing::debug;

use crate::store::normalize_entries;

/// Split picker text into entries: one per line, trimmed, blanks dropped.
///
/// # Example
/// ```
/// use roster_picker::bag::entries_from_text;
///
/// assert_eq!(entries_from_text("Ann\n\n  Bo \n"), vec!["Ann", "Bo"]);
/// ```
pub fn entries_from_text(text: &str) -> Vec<String> {
    normalize_entries(text.lines())
}

/// Result of a single pick.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PickOutcome {
    /// An entry was drawn and `remaining` entries are still undrawn.
    Picked { entry: String, remaining: usize },
    /// The last undrawn entry was drawn; the bag has been refilled.
    CycleComplete { entry: String },
    /// The source list had no entries. Nothing changed.
    Empty,
}

impl PickOutcome {
    /// The drawn entry, if any.
    pub fn entry(&self) -> Option<&str> {
        match self {
            PickOutcome::Picked { entry, .. } | PickOutcome::CycleComplete { entry } => {
                Some(entry)
            }
            PickOutcome::Empty => None,
        }
    }

    pub fn is_cycle_complete(&self) -> bool {
        matches!(self, PickOutcome::CycleComplete { .. })
    }
}

/// Per-instance bag state.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BagSampler {
    all_entries: Vec<String>,
    available_entries: Vec<String>,
}

impl BagSampler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Draw one entry from `source`.
    ///
    /// The bag is (re)seeded when it is idle or when `source` no longer equals
    /// the last snapshot, discarding whatever was left of the old cycle.
    pub fn pick<R: Rng>(&mut self, source: &[String], rng: &mut R) -> PickOutcome {
        if source.is_empty() {
            return PickOutcome::Empty;
        }

        if self.available_entries.is_empty() || self.all_entries != source {
            debug!(entries = source.len(), "seeding bag from source list");
            self.all_entries = source.to_vec();
            self.available_entries = self.all_entries.clone();
        }

        let index = rng.gen_range(0..self.available_entries.len());
        let entry = self.available_entries.swap_remove(index);

        if self.available_entries.is_empty() {
            self.available_entries = self.all_entries.clone();
            PickOutcome::CycleComplete { entry }
        } else {
            PickOutcome::Picked {
                entry,
                remaining: self.available_entries.len(),
            }
        }
    }

    /// Draw one entry from newline-separated picker text.
    pub fn pick_from_text<R: Rng>(&mut self, text: &str, rng: &mut R) -> PickOutcome {
        self.pick(&entries_from_text(text), rng)
    }

    /// Forget the snapshot and return to idle.
    pub fn reset(&mut self) {
        self.all_entries.clear();
        self.available_entries.clear();
    }

    /// True if no snapshot has been taken since creation or the last reset.
    pub fn is_idle(&self) -> bool {
        self.all_entries.is_empty()
    }

    /// Number of entries not yet drawn in the current cycle.
    pub fn remaining(&self) -> usize {
        self.available_entries.len()
    }

    /// Size of the current snapshot.
    pub fn total(&self) -> usize {
        self.all_entries.len()
    }

    pub fn all_entries(&self) -> &[String] {
        &self.all_entries
    }

    pub fn available_entries(&self) -> &[String] {
        &self.available_entries
    }
}
