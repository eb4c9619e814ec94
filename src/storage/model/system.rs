//! OS-level statistics exported next to the tegrastats data.

use serde::{Deserialize, Serialize};

/// Space usage of one mounted filesystem, in bytes.
/// Source: `/proc/mounts` + `statvfs(3)`
#[derive(Clone, Serialize, Deserialize, Debug, Default, PartialEq)]
pub struct DiskStat {
    pub mountpoint: String,
    pub total: u64,
    pub used: u64,
    pub free: u64,
    /// `used / (used + free) * 100`, rounded to one decimal.
    pub percent: f64,
}

/// Seconds since boot.
/// Source: `/proc/uptime`
#[derive(Clone, Copy, Serialize, Deserialize, Debug, Default, PartialEq)]
pub struct UptimeStat {
    pub seconds: f64,
}
