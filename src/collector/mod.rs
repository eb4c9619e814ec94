//! Telemetry collection for NVIDIA Jetson boards.
//!
//! This module starts the vendor `tegrastats` writer, decodes the lines it
//! appends to its log, and reads the host stats tegrastats does not cover.
//! All file and process access goes through traits so everything can run
//! against mocks on a machine that is not a Jetson.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                         Collector                           │
//! │  ┌─────────────────────┐   ┌─────────────────────────────┐  │
//! │  │    SampleSource     │   │     SystemCollector         │  │
//! │  │  - tegrastats proc  │   │  - /proc/uptime             │  │
//! │  │  - log tail         │   │  - /proc/mounts + statvfs   │  │
//! │  └──────────┬──────────┘   └──────────────┬──────────────┘  │
//! │  ┌──────────▼──────────┐                  │                 │
//! │  │    LineDecoder      │                  │                 │
//! │  │  - field decoders   │                  │                 │
//! │  │  - cpufreq governor │                  │                 │
//! │  └──────────┬──────────┘                  │                 │
//! │  ┌──────────▼──────────┐                  │                 │
//! │  │   SnapshotCache     │                  │                 │
//! │  └─────────────────────┘                  │                 │
//! │                     ┌─────────────────────┘                 │
//! │              ┌──────▼──────┐  ┌───────────────┐             │
//! │              │  FileSystem │  │ CommandRunner │ (traits)    │
//! │              └──────┬──────┘  └───────┬───────┘             │
//! └─────────────────────┼─────────────────┼─────────────────────┘
//!              ┌────────┴──────┐   ┌──────┴───────┐
//!              │ RealFs/MockFs │   │ System/Mock  │
//!              └───────────────┘   └──────────────┘
//! ```
//!
//! # Usage
//!
//! ```
//! use jetson_exporter::collector::{Collector, MockFs, MockRunner};
//! use jetson_exporter::config::ExporterConfig;
//!
//! let config = ExporterConfig {
//!     logfile: jetson_exporter::collector::mock::SCENARIO_LOG.into(),
//!     ..Default::default()
//! };
//! let collector = Collector::new(
//!     MockFs::jetson_nano(),
//!     MockRunner::new(),
//!     "/usr/bin/tegrastats",
//!     &config,
//! );
//! assert!(collector.refresh().updated());
//! assert_eq!(collector.snapshot().unwrap().cpu_cores.len(), 4);
//! ```

#[allow(clippy::module_inception)]
mod collector;
pub mod mock;
pub mod procfs;
pub mod tegrastats;
pub mod traits;

pub use collector::{Collector, CollectorTiming, Refresh};
pub use mock::{MockFs, MockRunner};
pub use procfs::{CollectError, SystemCollector};
pub use tegrastats::{DecodeError, LineDecoder, SampleSource, SourceError};
pub use traits::{CommandOutput, CommandRunner, FileSystem, FsUsage, RealFs, SystemRunner, Tail};
