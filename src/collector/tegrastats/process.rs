//! Control of the `tegrastats` background process.
//!
//! tegrastats daemonizes itself: `--start` forks a writer that appends to
//! `--logfile` every `--interval` milliseconds and returns immediately, and
//! `--stop` terminates every running instance.

use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use tracing::{debug, info};

use crate::collector::traits::{CommandRunner, FileSystem};

/// Install locations probed when no explicit binary is configured.
pub const TEGRASTATS_CANDIDATES: &[&str] = &["/usr/bin/tegrastats", "/home/nvidia/tegrastats"];

/// Errors raised while controlling tegrastats or reading its log.
#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    #[error("tegrastats not found (searched: {searched})")]
    NotInstalled { searched: String },

    #[error("failed to run tegrastats: {0}")]
    Spawn(#[source] io::Error),

    #[error("tegrastats --start exited with {code:?}: {stderr}")]
    StartFailed { code: Option<i32>, stderr: String },

    #[error("tegrastats --stop exited with {code:?}: {stderr}")]
    StopFailed { code: Option<i32>, stderr: String },

    #[error("no complete sample in {path}")]
    NoData { path: String },

    #[error("cannot read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: io::Error,
    },

    #[error("cannot truncate {path}: {source}")]
    Truncate {
        path: String,
        #[source]
        source: io::Error,
    },
}

impl SourceError {
    /// Whether the error only means "no fresh sample this time".
    pub fn is_transient(&self) -> bool {
        matches!(self, SourceError::NoData { .. } | SourceError::Io { .. })
    }
}

/// Finds the tegrastats binary.
///
/// An explicit path is used as-is if it is a file; otherwise the usual
/// install locations are probed in order.
pub fn locate_tegrastats<F: FileSystem>(
    fs: &F,
    explicit: Option<&Path>,
) -> Result<PathBuf, SourceError> {
    let candidates: Vec<PathBuf> = match explicit {
        Some(path) => vec![path.to_path_buf()],
        None => TEGRASTATS_CANDIDATES.iter().map(PathBuf::from).collect(),
    };

    candidates
        .iter()
        .find(|p| fs.is_file(p))
        .cloned()
        .ok_or_else(|| SourceError::NotInstalled {
            searched: candidates
                .iter()
                .map(|p| p.display().to_string())
                .collect::<Vec<_>>()
                .join(", "),
        })
}

/// Handle on a tegrastats writer started by this exporter.
pub struct TegrastatsProcess<R: CommandRunner> {
    runner: R,
    binary: PathBuf,
    logfile: PathBuf,
    interval: Duration,
    running: bool,
}

impl<R: CommandRunner> TegrastatsProcess<R> {
    pub fn new(
        runner: R,
        binary: impl Into<PathBuf>,
        logfile: impl Into<PathBuf>,
        interval: Duration,
    ) -> Self {
        Self {
            runner,
            binary: binary.into(),
            logfile: logfile.into(),
            interval,
            running: false,
        }
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn logfile(&self) -> &Path {
        &self.logfile
    }

    /// Starts the writer. Does nothing if this handle already started one.
    pub fn start(&mut self) -> Result<(), SourceError> {
        if self.running {
            debug!("tegrastats already running");
            return Ok(());
        }

        let args = vec![
            "--logfile".to_string(),
            self.logfile.display().to_string(),
            "--interval".to_string(),
            self.interval.as_millis().to_string(),
            "--start".to_string(),
        ];
        let output = self
            .runner
            .run(&self.binary, &args)
            .map_err(SourceError::Spawn)?;
        if !output.success() {
            return Err(SourceError::StartFailed {
                code: output.code,
                stderr: output.stderr.trim().to_string(),
            });
        }

        self.running = true;
        info!(
            binary = %self.binary.display(),
            logfile = %self.logfile.display(),
            interval_ms = self.interval.as_millis() as u64,
            "tegrastats started"
        );
        Ok(())
    }

    /// Stops the writer. Does nothing if it was never started.
    pub fn stop(&mut self) -> Result<(), SourceError> {
        if !self.running {
            return Ok(());
        }
        // Whatever happens, do not try to stop twice.
        self.running = false;

        let output = self
            .runner
            .run(&self.binary, &["--stop".to_string()])
            .map_err(SourceError::Spawn)?;
        if !output.success() {
            return Err(SourceError::StopFailed {
                code: output.code,
                stderr: output.stderr.trim().to_string(),
            });
        }

        info!("tegrastats stopped");
        Ok(())
    }
}
