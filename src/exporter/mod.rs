//! Prometheus exporter facade.
//!
//! A scrape runs in two phases under one lock: refresh the cached snapshot
//! from the latest tegrastats line, then project the snapshot and the host
//! stats onto metric families in a fixed order. Concurrent scrapes wait for
//! each other instead of interleaving refreshes.

pub mod background;
pub mod families;
pub mod server;

use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Mutex, PoisonError};

use prometheus::proto::MetricFamily;
use prometheus::{Encoder, TextEncoder};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::collector::tegrastats::locate_tegrastats;
use crate::collector::traits::{CommandRunner, FileSystem};
use crate::collector::{Collector, SourceError};
use crate::config::{ConfigError, ExporterConfig};

pub use families::ProjectError;

/// Where a scrape currently is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
#[repr(u8)]
pub enum ScrapePhase {
    Idle = 0,
    Refreshing = 1,
    Projecting = 2,
}

impl ScrapePhase {
    fn from_u8(value: u8) -> Self {
        match value {
            1 => ScrapePhase::Refreshing,
            2 => ScrapePhase::Projecting,
            _ => ScrapePhase::Idle,
        }
    }
}

/// Failure to turn collected families into the text exposition format.
#[derive(Debug, thiserror::Error)]
pub enum ExportError {
    #[error("failed to encode metrics: {0}")]
    Encode(#[from] prometheus::Error),
    #[error("encoded metrics are not UTF-8: {0}")]
    Utf8(#[from] std::string::FromUtf8Error),
}

/// Failure to bring the exporter up.
#[derive(Debug, thiserror::Error)]
pub enum LaunchError {
    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Source(#[from] SourceError),
}

/// Resets the phase to `Idle` when a scrape ends, even by panic.
struct PhaseGuard<'a>(&'a AtomicU8);

impl PhaseGuard<'_> {
    fn enter(&self, phase: ScrapePhase) {
        self.0.store(phase as u8, Ordering::Release);
    }
}

impl Drop for PhaseGuard<'_> {
    fn drop(&mut self) {
        self.0.store(ScrapePhase::Idle as u8, Ordering::Release);
    }
}

/// Serves tegrastats snapshots and host stats as Prometheus families.
pub struct JetsonExporter<F: FileSystem + Clone, R: CommandRunner> {
    collector: Collector<F, R>,
    scrape_lock: Mutex<()>,
    phase: AtomicU8,
}

impl<F: FileSystem + Clone, R: CommandRunner> JetsonExporter<F, R> {
    pub fn new(collector: Collector<F, R>) -> Self {
        Self {
            collector,
            scrape_lock: Mutex::new(()),
            phase: AtomicU8::new(ScrapePhase::Idle as u8),
        }
    }

    /// Validates `config`, finds tegrastats and starts it.
    pub fn launch(fs: F, runner: R, config: &ExporterConfig) -> Result<Self, LaunchError> {
        config.validate()?;
        let binary = locate_tegrastats(&fs, config.tegrastats_path.as_deref())?;
        let collector = Collector::new(fs, runner, binary, config);
        collector.start()?;
        Ok(Self::new(collector))
    }

    pub fn collector(&self) -> &Collector<F, R> {
        &self.collector
    }

    pub fn phase(&self) -> ScrapePhase {
        ScrapePhase::from_u8(self.phase.load(Ordering::Acquire))
    }

    /// Refreshes the snapshot and builds every family that can be built, in
    /// the order cpu, gpu, ram, swap, temperature, voltage, disk, uptime.
    pub fn scrape(&self) -> Vec<MetricFamily> {
        let _lock = self
            .scrape_lock
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        let phase = PhaseGuard(&self.phase);

        phase.enter(ScrapePhase::Refreshing);
        self.collector.refresh();

        phase.enter(ScrapePhase::Projecting);
        let snapshot = self.collector.snapshot();
        let snapshot = snapshot.as_deref();

        let mut out = Vec::new();
        project("cpu", families::cpu(snapshot), &mut out);
        project("gpu_utilization_percentage", families::gpu(snapshot), &mut out);
        project("ram", families::ram(snapshot), &mut out);
        project("swap", families::swap(snapshot), &mut out);
        project("temperature", families::temperature(snapshot), &mut out);
        project("voltage", families::voltage(snapshot), &mut out);
        project("disk", families::disk(self.collector.disks()), &mut out);
        project("uptime", families::uptime(self.collector.uptime()), &mut out);
        out
    }

    /// Scrapes and encodes in the Prometheus text format.
    pub fn render(&self) -> Result<String, ExportError> {
        let families = self.scrape();
        let mut buf = Vec::new();
        TextEncoder::new().encode(&families, &mut buf)?;
        Ok(String::from_utf8(buf)?)
    }

    /// Stops tegrastats and drops the cached snapshot.
    pub fn shutdown(&self) {
        let _lock = self
            .scrape_lock
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        self.collector.stop();
        self.collector.clear();
        info!("exporter shut down");
    }
}

fn project(name: &'static str, result: families::FamilyResult, out: &mut Vec<MetricFamily>) {
    match result {
        Ok(families) => out.extend(
            families
                .into_iter()
                .filter(|family| !family.get_metric().is_empty()),
        ),
        Err(e) if e.is_expected() => debug!(family = name, reason = %e, "family skipped"),
        Err(e) => warn!(family = name, error = %e, "family failed"),
    }
}
