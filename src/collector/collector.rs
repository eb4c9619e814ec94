//! Main collector that combines the tegrastats source and host stats.
//!
//! The `Collector` owns every stateful piece of the pipeline: the sample
//! source, the decoder and the latest-snapshot cache. A refresh reads one
//! line, decodes it and swaps the cache; host stats bypass the cache and
//! are read fresh on every call.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{error, trace, warn};

use crate::collector::procfs::{CollectError, SystemCollector};
use crate::collector::tegrastats::{LineDecoder, SampleSource, SourceError};
use crate::collector::traits::{CommandRunner, FileSystem};
use crate::config::ExporterConfig;
use crate::storage::{CacheEntry, DiskStat, Snapshot, SnapshotCache, UptimeStat};

/// Timing information for each refresh phase.
#[derive(Debug, Clone, Copy, Default)]
pub struct CollectorTiming {
    /// Total refresh time.
    pub total: Duration,
    /// Time to read the latest log line.
    pub read: Duration,
    /// Time to decode the line.
    pub decode: Duration,
}

/// Result of one [`Collector::refresh`].
#[derive(Debug, Clone, Copy, Default)]
pub struct Refresh {
    /// Cache generation stored by this refresh; `None` if the previous
    /// snapshot was kept.
    pub generation: Option<u64>,
    pub timing: CollectorTiming,
}

impl Refresh {
    pub fn updated(&self) -> bool {
        self.generation.is_some()
    }
}

/// Gathers tegrastats snapshots and host stats.
pub struct Collector<F: FileSystem + Clone, R: CommandRunner> {
    source: SampleSource<F, R>,
    decoder: LineDecoder<F>,
    system: SystemCollector<F>,
    cache: SnapshotCache,
}

impl<F: FileSystem + Clone, R: CommandRunner> Collector<F, R> {
    /// Creates a collector driving the tegrastats `binary`.
    pub fn new(fs: F, runner: R, binary: impl Into<PathBuf>, config: &ExporterConfig) -> Self {
        Self {
            source: SampleSource::new(
                fs.clone(),
                runner,
                binary,
                config.logfile.clone(),
                config.interval,
            ),
            decoder: LineDecoder::new(fs.clone(), config.sys_path.clone()),
            system: SystemCollector::new(fs, config.proc_path.clone()),
            cache: SnapshotCache::new(),
        }
    }

    pub fn source(&self) -> &SampleSource<F, R> {
        &self.source
    }

    pub fn start(&self) -> Result<(), SourceError> {
        self.source.start()
    }

    pub fn stop(&self) {
        self.source.stop();
    }

    /// Replaces the cached snapshot with the latest sample.
    ///
    /// Never fails: when no usable sample is available the previous snapshot
    /// stays in place and the reason is logged.
    pub fn refresh(&self) -> Refresh {
        let start = Instant::now();
        let mut refresh = Refresh::default();

        let line = match self.source.read() {
            Ok(line) => line,
            Err(e) => {
                warn!(error = %e, "no fresh tegrastats sample, keeping previous snapshot");
                refresh.timing.read = start.elapsed();
                refresh.timing.total = refresh.timing.read;
                return refresh;
            }
        };
        refresh.timing.read = start.elapsed();

        let decode_start = Instant::now();
        match self.decoder.decode(line.as_str()) {
            Ok(snapshot) => {
                refresh.generation = Some(self.cache.replace(snapshot));
            }
            Err(e) => {
                error!(error = %e, line = %line, "failed to decode tegrastats line");
            }
        }
        refresh.timing.decode = decode_start.elapsed();
        refresh.timing.total = start.elapsed();

        trace!(
            generation = ?refresh.generation,
            read_us = refresh.timing.read.as_micros() as u64,
            decode_us = refresh.timing.decode.as_micros() as u64,
            "refresh done"
        );
        refresh
    }

    /// Truncates the tegrastats log.
    pub fn cleanup(&self) -> Result<(), SourceError> {
        self.source.cleanup()
    }

    pub fn snapshot(&self) -> Option<Arc<Snapshot>> {
        self.cache.current()
    }

    pub fn entry(&self) -> Option<CacheEntry> {
        self.cache.entry()
    }

    /// Drops the cached snapshot.
    pub fn clear(&self) {
        self.cache.clear();
    }

    pub fn disks(&self) -> Result<Vec<DiskStat>, CollectError> {
        self.system.collect_disks()
    }

    pub fn uptime(&self) -> Result<UptimeStat, CollectError> {
        self.system.collect_uptime()
    }
}
