//! Data model shared by the decoder, the cache and the exporter.

mod snapshot;
mod system;

pub use snapshot::{
    BlockInfo, BlockKind, CpuCore, EngineRate, MemoryUsage, MultitaskingShare, PowerRail, RawLine,
    Snapshot,
};
pub use system::{DiskStat, UptimeStat};
