//! Field decoders for tegrastats lines.
//!
//! A tegrastats line is a flat sequence of independent fragments:
//!
//! ```text
//! RAM 2015/3964MB (lfb 98x4MB) SWAP 29/1982MB (cached 3MB) CPU [6%@102,off]
//! EMC_FREQ 0% GR3D_FREQ 0%@76 APE 25 PLL@28C CPU@31.5C POM_5V_IN 1388/1388
//! ```
//!
//! Each decoder here matches one kind of fragment anywhere in the line and
//! returns `None` (or an empty collection) when the line does not carry it.
//! Decoders are pure functions over the text and can run in any order; the
//! only fragment that needs outside data (CPU governors) is completed by
//! [`super::LineDecoder`].

use std::collections::BTreeMap;
use std::sync::LazyLock;

use regex::Regex;

use crate::storage::model::{
    BlockInfo, BlockKind, CpuCore, EngineRate, MemoryUsage, MultitaskingShare, PowerRail, Snapshot,
};

/// Why a line could not be turned into a snapshot at all.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DecodeError {
    #[error("empty tegrastats line")]
    Empty,
    #[error("tegrastats line has no RAM fragment")]
    MissingMemory,
}

// `X/YuB (lfb NxZuB)`, `X/YuB (lfb ZuB)` or `X/YuB (cached ZuB)`
static MEMORY_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b(RAM|IRAM|SWAP) (\d+)/(\d+)(\w)B ?\((lfb|cached) (?:(\d+)x)?(\d+)(\w)B\)")
        .expect("memory pattern is valid")
});

static MTS_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\bMTS fg (\d+)% bg (\d+)%").expect("MTS pattern is valid"));

// `NAME N`, `NAME N%` or `NAME N%@F`; the caller rejects fractions like `NAME N/M`.
static RATE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b([A-Z][A-Z0-9_]*) (\d+)(?:(%)(?:@(\d+))?)?").expect("rate pattern is valid")
});

static CPU_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\bCPU \[([^\]]*)\](?:@(\d+))?").expect("CPU pattern is valid")
});

static CORE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\d+)%?(?:@(\d+))?$").expect("core pattern is valid"));

static TEMP_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b(\w+)@(-?\d+(?:\.\d+)?)C\b").expect("temperature pattern is valid")
});

static RAIL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b(\w+) (\d+)(?:mW)?/(\d+)(?:mW)?\b").expect("power rail pattern is valid")
});

/// Memory fragments tegrastats can print.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemoryTag {
    Ram,
    Iram,
    Swap,
}

impl MemoryTag {
    pub fn label(self) -> &'static str {
        match self {
            MemoryTag::Ram => "RAM",
            MemoryTag::Iram => "IRAM",
            MemoryTag::Swap => "SWAP",
        }
    }

    fn block_kind(self) -> BlockKind {
        match self {
            MemoryTag::Ram | MemoryTag::Iram => BlockKind::LargestFree,
            MemoryTag::Swap => BlockKind::Cached,
        }
    }
}

fn first_char(s: &str) -> Option<char> {
    s.chars().next()
}

/// Decodes the `<TAG> used/total<u>B (<lfb|cached> [Nx]size<u>B)` fragment for `tag`.
pub fn parse_memory(line: &str, tag: MemoryTag) -> Option<MemoryUsage> {
    MEMORY_RE.captures_iter(line).find_map(|caps| {
        if &caps[1] != tag.label() {
            return None;
        }
        let kind = match &caps[5] {
            "lfb" => BlockKind::LargestFree,
            _ => BlockKind::Cached,
        };
        if kind != tag.block_kind() {
            return None;
        }
        let count = match caps.get(6) {
            Some(m) => Some(m.as_str().parse().ok()?),
            None => None,
        };

        Some(MemoryUsage {
            used: caps[2].parse().ok()?,
            total: caps[3].parse().ok()?,
            unit: first_char(&caps[4])?,
            block: BlockInfo {
                kind,
                count,
                size: caps[7].parse().ok()?,
                unit: first_char(&caps[8])?,
            },
        })
    })
}

/// Decodes `MTS fg X% bg Y%`.
pub fn parse_multitasking(line: &str) -> Option<MultitaskingShare> {
    let caps = MTS_RE.captures(line)?;
    Some(MultitaskingShare {
        foreground: caps[1].parse().ok()?,
        background: caps[2].parse().ok()?,
    })
}

/// Strips the `_FREQ` suffix newer releases append to engine tags, so that
/// `GR3D_FREQ` and `GR3D` name the same engine.
pub fn normalize_rate_tag(tag: &str) -> &str {
    tag.strip_suffix("_FREQ").unwrap_or(tag)
}

/// A value token ends at whitespace, punctuation or the end of the line, but
/// not at `/` (a memory or rail fraction) or inside a longer word.
fn ends_value_token(rest: &str) -> bool {
    match rest.chars().next() {
        None => true,
        Some(c) => c != '/' && c != '.' && c != '_' && !c.is_alphanumeric(),
    }
}

/// Decodes every `NAME value` engine fragment.
///
/// `N%@F` carries utilization and clock, `N%` only utilization. A bare `N`
/// is a clock: the engines printed that way (APE, NVDEC, NVENC, MSENC, VIC)
/// only report their frequency. Later occurrences of a tag replace earlier ones.
pub fn parse_rates(line: &str) -> BTreeMap<String, EngineRate> {
    let mut rates = BTreeMap::new();

    for caps in RATE_RE.captures_iter(line) {
        let Some(whole) = caps.get(0) else {
            continue;
        };
        if !ends_value_token(&line[whole.end()..]) {
            continue;
        }
        let Ok(value) = caps[2].parse::<u32>() else {
            continue;
        };

        let rate = if caps.get(3).is_some() {
            EngineRate {
                utilization: Some(value),
                frequency_mhz: caps.get(4).and_then(|m| m.as_str().parse().ok()),
            }
        } else {
            EngineRate {
                utilization: None,
                frequency_mhz: Some(value),
            }
        };
        rates.insert(normalize_rate_tag(&caps[1]).to_string(), rate);
    }

    rates
}

fn parse_core(index: usize, token: &str, shared_mhz: Option<u32>) -> CpuCore {
    let mut core = CpuCore {
        index,
        enabled: false,
        utilization: None,
        frequency_mhz: None,
        governor: None,
    };
    if token.is_empty() || token == "off" {
        return core;
    }

    core.enabled = true;
    if let Some(caps) = CORE_RE.captures(token) {
        core.utilization = caps[1].parse().ok();
        core.frequency_mhz = caps
            .get(2)
            .and_then(|m| m.as_str().parse().ok())
            .or(shared_mhz);
    }
    core
}

/// Decodes `CPU [c1,c2,...]` (optionally followed by a shared `@F` clock).
///
/// Returns one entry per listed core, 1-based, in list order. `off` cores
/// carry no load values. Governors are left empty.
pub fn parse_cpu_cores(line: &str) -> Vec<CpuCore> {
    let Some(caps) = CPU_RE.captures(line) else {
        return Vec::new();
    };
    let list = caps[1].trim();
    if list.is_empty() {
        return Vec::new();
    }
    let shared_mhz = caps.get(2).and_then(|m| m.as_str().parse().ok());

    list.split(',')
        .enumerate()
        .map(|(i, token)| parse_core(i + 1, token.trim(), shared_mhz))
        .collect()
}

/// Decodes every `name@XC` sensor reading. Later occurrences win.
pub fn parse_temperatures(line: &str) -> BTreeMap<String, f64> {
    TEMP_RE
        .captures_iter(line)
        .filter_map(|caps| Some((caps[1].to_string(), caps[2].parse().ok()?)))
        .collect()
}

/// Decodes every `NAME cur/avg` power rail (values in mW, with or without
/// the `mW` suffix JetPack 5 prints). Later occurrences win.
pub fn parse_power_rails(line: &str) -> BTreeMap<String, PowerRail> {
    RAIL_RE
        .captures_iter(line)
        .filter_map(|caps| {
            let rail = PowerRail {
                current_mw: caps[2].parse().ok()?,
                average_mw: caps[3].parse().ok()?,
            };
            Some((caps[1].to_string(), rail))
        })
        .collect()
}

/// Runs every field decoder over `line`.
///
/// Fails only when the line is empty or lacks the RAM fragment; any other
/// missing fragment is simply absent from the result.
pub fn parse_line(line: &str) -> Result<Snapshot, DecodeError> {
    let line = line.trim();
    if line.is_empty() {
        return Err(DecodeError::Empty);
    }
    let memory = parse_memory(line, MemoryTag::Ram).ok_or(DecodeError::MissingMemory)?;

    Ok(Snapshot {
        memory,
        swap: parse_memory(line, MemoryTag::Swap),
        iram: parse_memory(line, MemoryTag::Iram),
        multitasking: parse_multitasking(line),
        rates: parse_rates(line),
        cpu_cores: parse_cpu_cores(line),
        temperatures: parse_temperatures(line),
        power_rails: parse_power_rails(line),
    })
}
