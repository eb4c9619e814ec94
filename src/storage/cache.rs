//! Latest-snapshot cache.
//!
//! Holds at most one decoded snapshot. Writers build a complete `Snapshot`
//! first and swap it in under the lock; readers clone the `Arc` out, so a
//! reader never observes a half-built value and never blocks a writer for
//! longer than a pointer swap.

use std::sync::{Arc, PoisonError, RwLock};

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::storage::model::Snapshot;

/// A cached snapshot together with when and in which refresh it was stored.
#[derive(Clone, Serialize, Debug, PartialEq)]
pub struct CacheEntry {
    pub snapshot: Arc<Snapshot>,
    pub updated_at: DateTime<Utc>,
    /// Number of successful replacements so far, starting at 1.
    pub generation: u64,
}

#[derive(Debug, Default)]
struct Slot {
    entry: Option<CacheEntry>,
    generation: u64,
}

/// Atomically replaced holder of the most recent snapshot.
#[derive(Debug, Default)]
pub struct SnapshotCache {
    slot: RwLock<Slot>,
}

impl SnapshotCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the cached snapshot and returns the new generation.
    pub fn replace(&self, snapshot: Snapshot) -> u64 {
        let snapshot = Arc::new(snapshot);
        let mut slot = self.slot.write().unwrap_or_else(PoisonError::into_inner);
        slot.generation += 1;
        let generation = slot.generation;
        slot.entry = Some(CacheEntry {
            snapshot,
            updated_at: Utc::now(),
            generation,
        });
        generation
    }

    /// Returns the current snapshot, if any refresh has succeeded yet.
    pub fn current(&self) -> Option<Arc<Snapshot>> {
        self.entry().map(|e| e.snapshot)
    }

    /// Returns the current entry with its metadata.
    pub fn entry(&self) -> Option<CacheEntry> {
        self.slot
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .entry
            .clone()
    }

    /// Number of successful replacements so far.
    pub fn generation(&self) -> u64 {
        self.slot
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .generation
    }

    /// Drops the cached snapshot. The generation counter is kept.
    pub fn clear(&self) {
        self.slot
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .entry = None;
    }
}
