//! Snapshot model and the in-memory latest-snapshot cache.
//!
//! Nothing is persisted: the exporter only ever serves the most recent
//! decoded sample.

pub mod cache;
pub mod model;

pub use cache::{CacheEntry, SnapshotCache};
pub use model::{DiskStat, RawLine, Snapshot, UptimeStat};
