//! Exporter configuration.
//!
//! The binary fills this from command-line flags and `JETSON_EXPORTER_*`
//! environment variables; library users build it directly.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::PathBuf;
use std::time::Duration;

/// Longest sampling interval tegrastats accepts (its `--interval` is a C int
/// of milliseconds).
pub const MAX_INTERVAL: Duration = Duration::from_millis(i32::MAX as u64);

/// Rejected configuration values.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ConfigError {
    #[error("sampling interval must be at least 1 ms")]
    ZeroInterval,
    #[error("sampling interval must not exceed {} ms", MAX_INTERVAL.as_millis())]
    IntervalTooLarge,
    #[error("cleanup interval must be non-zero")]
    ZeroCleanupInterval,
    #[error("log file path is empty")]
    EmptyLogfile,
}

/// Everything the exporter needs to run.
#[derive(Debug, Clone, PartialEq)]
pub struct ExporterConfig {
    /// Address the HTTP server binds.
    pub listen: SocketAddr,
    /// How often tegrastats writes a sample.
    pub interval: Duration,
    /// File tegrastats appends samples to.
    pub logfile: PathBuf,
    /// How often the log is truncated.
    pub cleanup_interval: Duration,
    /// tegrastats binary; the usual install locations are probed when unset.
    pub tegrastats_path: Option<PathBuf>,
    pub proc_path: String,
    pub sys_path: PathBuf,
}

impl Default for ExporterConfig {
    fn default() -> Self {
        Self {
            listen: SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), 8000),
            interval: Duration::from_secs(1),
            logfile: PathBuf::from("./stats.log"),
            cleanup_interval: Duration::from_secs(60 * 60),
            tegrastats_path: None,
            proc_path: "/proc".to_string(),
            sys_path: PathBuf::from("/sys"),
        }
    }
}

impl ExporterConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        // tegrastats takes its interval in whole milliseconds
        if self.interval.as_millis() == 0 {
            return Err(ConfigError::ZeroInterval);
        }
        if self.interval > MAX_INTERVAL {
            return Err(ConfigError::IntervalTooLarge);
        }
        if self.cleanup_interval.is_zero() {
            return Err(ConfigError::ZeroCleanupInterval);
        }
        if self.logfile.as_os_str().is_empty() {
            return Err(ConfigError::EmptyLogfile);
        }
        Ok(())
    }

    /// How long to wait after starting tegrastats before serving, so the
    /// first scrape finds at least one sample.
    pub fn warmup(&self) -> Duration {
        self.interval.saturating_mul(2)
    }
}
