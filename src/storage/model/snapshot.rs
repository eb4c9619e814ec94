//! Decoded tegrastats snapshot.
//!
//! A `Snapshot` is the typed form of one tegrastats line. Every optional
//! fragment the line did not carry is `None` (or an empty collection); no
//! field is ever filled with a zero placeholder. Units are kept exactly as
//! tegrastats printed them.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// One complete line read from the tegrastats log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawLine(String);

impl RawLine {
    pub fn new(line: impl Into<String>) -> Self {
        Self(line.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_inner(self) -> String {
        self.0
    }
}

impl fmt::Display for RawLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// What the parenthesised block after a memory fraction describes.
#[derive(Clone, Copy, Serialize, Deserialize, Debug, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum BlockKind {
    /// `lfb`: largest free block of the allocator (RAM, IRAM).
    LargestFree,
    /// `cached`: swap pages also held in RAM.
    Cached,
}

/// Block descriptor, e.g. `lfb 98x4MB` or `cached 3MB`.
#[derive(Clone, Serialize, Deserialize, Debug, PartialEq, Eq)]
pub struct BlockInfo {
    pub kind: BlockKind,
    /// Number of free blocks of `size`. Only RAM reports it.
    pub count: Option<u64>,
    pub size: u64,
    /// Scale letter as printed (`M`, `k`, ...).
    pub unit: char,
}

/// A `<TAG> used/total<unit>B (...)` fragment.
#[derive(Clone, Serialize, Deserialize, Debug, PartialEq, Eq)]
pub struct MemoryUsage {
    pub used: u64,
    pub total: u64,
    /// Scale letter as printed (`M`, `k`, ...).
    pub unit: char,
    pub block: BlockInfo,
}

/// Time share of the MTS foreground/background task groups, in percent.
#[derive(Clone, Copy, Serialize, Deserialize, Debug, PartialEq, Eq)]
pub struct MultitaskingShare {
    pub foreground: u32,
    pub background: u32,
}

/// Load and clock of a hardware engine (EMC, GR3D, APE, NVDEC, ...).
#[derive(Clone, Copy, Serialize, Deserialize, Debug, Default, PartialEq, Eq)]
pub struct EngineRate {
    /// Percent busy relative to the current clock.
    pub utilization: Option<u32>,
    pub frequency_mhz: Option<u32>,
}

/// One entry of the `CPU [...]` list.
#[derive(Clone, Serialize, Deserialize, Debug, PartialEq, Eq)]
pub struct CpuCore {
    /// 1-based position in the list.
    pub index: usize,
    /// `false` when tegrastats printed `off`.
    pub enabled: bool,
    pub utilization: Option<u32>,
    pub frequency_mhz: Option<u32>,
    /// cpufreq scaling governor, when the kernel exposes one for this core.
    pub governor: Option<String>,
}

/// Instantaneous and running-average draw of a power rail.
#[derive(Clone, Copy, Serialize, Deserialize, Debug, PartialEq, Eq)]
pub struct PowerRail {
    pub current_mw: u64,
    pub average_mw: u64,
}

/// Typed content of one tegrastats line.
#[derive(Clone, Serialize, Deserialize, Debug, PartialEq)]
pub struct Snapshot {
    /// Main memory. A line without it is not a usable sample.
    /// Source: `RAM X/YMB (lfb NxZMB)`
    pub memory: MemoryUsage,

    /// Source: `SWAP X/YMB (cached ZMB)`
    pub swap: Option<MemoryUsage>,

    /// Memory local to the video engines (older boards).
    /// Source: `IRAM X/YkB (lfb ZkB)`
    pub iram: Option<MemoryUsage>,

    /// Source: `MTS fg X% bg Y%`
    pub multitasking: Option<MultitaskingShare>,

    /// Engine tag (with any `_FREQ` suffix removed) to its load/clock.
    /// Source: `EMC_FREQ X%@Y`, `GR3D_FREQ X%`, `APE Y`, ...
    pub rates: BTreeMap<String, EngineRate>,

    /// Cores in the order tegrastats lists them.
    /// Source: `CPU [X%@Y,off,...]`
    pub cpu_cores: Vec<CpuCore>,

    /// Sensor tag to degrees Celsius.
    /// Source: `name@XC`
    pub temperatures: BTreeMap<String, f64>,

    /// Rail tag to power draw.
    /// Source: `NAME X/Y` or `NAME XmW/YmW`
    pub power_rails: BTreeMap<String, PowerRail>,
}

impl Snapshot {
    /// Snapshot with only the mandatory memory fragment.
    pub fn new(memory: MemoryUsage) -> Self {
        Self {
            memory,
            swap: None,
            iram: None,
            multitasking: None,
            rates: BTreeMap::new(),
            cpu_cores: Vec::new(),
            temperatures: BTreeMap::new(),
            power_rails: BTreeMap::new(),
        }
    }

    /// GPU (GR3D) utilization, if the platform reports it.
    pub fn gpu_utilization(&self) -> Option<u32> {
        self.rates.get("GR3D").and_then(|r| r.utilization)
    }

    pub fn enabled_cores(&self) -> usize {
        self.cpu_cores.iter().filter(|c| c.enabled).count()
    }
}
