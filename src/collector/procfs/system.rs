//! System collector for host-level stats that tegrastats does not report.

use std::io;
use std::path::Path;

use tracing::debug;

use crate::collector::procfs::parser::{MountEntry, ParseError, parse_mounts, parse_uptime};
use crate::collector::traits::{FileSystem, FsUsage};
use crate::storage::model::{DiskStat, UptimeStat};

/// Errors raised while reading host stats.
#[derive(Debug, thiserror::Error)]
pub enum CollectError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    #[error(transparent)]
    Parse(#[from] ParseError),
}

/// Collects uptime from `/proc/uptime` and disk usage of every mounted
/// block device.
pub struct SystemCollector<F: FileSystem> {
    fs: F,
    proc_path: String,
}

impl<F: FileSystem> SystemCollector<F> {
    /// Creates a new system collector.
    ///
    /// # Arguments
    /// * `fs` - Filesystem implementation (real or mock)
    /// * `proc_path` - Base path to proc filesystem (usually "/proc")
    pub fn new(fs: F, proc_path: impl Into<String>) -> Self {
        Self {
            fs,
            proc_path: proc_path.into(),
        }
    }

    pub fn collect_uptime(&self) -> Result<UptimeStat, CollectError> {
        let path = format!("{}/uptime", self.proc_path);
        let content = self.fs.read_to_string(Path::new(&path))?;
        Ok(UptimeStat {
            seconds: parse_uptime(&content)?,
        })
    }

    pub fn collect_mounts(&self) -> Result<Vec<MountEntry>, CollectError> {
        let path = format!("{}/mounts", self.proc_path);
        let content = self.fs.read_to_string(Path::new(&path))?;
        Ok(parse_mounts(&content))
    }

    /// Collects usage of every block-device mount.
    ///
    /// A mount whose usage cannot be read (permissions, stale NFS handle, ...)
    /// is skipped; only a failure to list mounts is an error.
    pub fn collect_disks(&self) -> Result<Vec<DiskStat>, CollectError> {
        let disks = self
            .collect_mounts()?
            .into_iter()
            .filter_map(|mount| {
                match self.fs.fs_usage(Path::new(&mount.mountpoint)) {
                    Ok(usage) => Some(disk_stat(mount.mountpoint, usage)),
                    Err(e) => {
                        debug!(mountpoint = %mount.mountpoint, error = %e, "skipping mount");
                        None
                    }
                }
            })
            .collect();
        Ok(disks)
    }
}

/// Percentage of the space usable by unprivileged users that is in use,
/// rounded to one decimal (the value `df` prints).
fn usage_percent(usage: &FsUsage) -> f64 {
    let denominator = usage.used + usage.free;
    if denominator == 0 {
        return 0.0;
    }
    let percent = usage.used as f64 / denominator as f64 * 100.0;
    (percent * 10.0).round() / 10.0
}

fn disk_stat(mountpoint: String, usage: FsUsage) -> DiskStat {
    DiskStat {
        mountpoint,
        total: usage.total,
        used: usage.used,
        free: usage.free,
        percent: usage_percent(&usage),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collector::mock::MockFs;
    use crate::collector::traits::RealFs;

    #[test]
    fn test_collect_uptime() {
        let collector = SystemCollector::new(MockFs::jetson_nano(), "/proc");
        let uptime = collector.collect_uptime().unwrap();
        assert_eq!(uptime.seconds, 350735.47);
    }

    #[test]
    fn test_collect_uptime_errors() {
        let collector = SystemCollector::new(MockFs::new(), "/proc");
        assert!(matches!(
            collector.collect_uptime(),
            Err(CollectError::Io(_))
        ));

        let fs = MockFs::new();
        fs.add_file("/proc/uptime", "garbage");
        let collector = SystemCollector::new(fs, "/proc");
        assert!(matches!(
            collector.collect_uptime(),
            Err(CollectError::Parse(_))
        ));
    }

    #[test]
    fn test_collect_disks() {
        let collector = SystemCollector::new(MockFs::jetson_nano(), "/proc");
        let disks = collector.collect_disks().unwrap();

        let mountpoints: Vec<_> = disks.iter().map(|d| d.mountpoint.as_str()).collect();
        assert_eq!(
            mountpoints,
            vec!["/", "/var/lib/docker/overlay", "/mnt/usb drive"]
        );

        let usb = &disks[2];
        assert_eq!(usb.total, 8_000_000_000);
        assert_eq!(usb.used, 2_000_000_000);
        assert_eq!(usb.free, 6_000_000_000);
        assert_eq!(usb.percent, 25.0);

        // 14_567_890_944 / 29_567_890_944
        assert_eq!(disks[0].percent, 49.3);
    }

    #[test]
    fn test_collect_disks_skips_unreadable_mount() {
        let fs = MockFs::new();
        fs.add_file(
            "/proc/mounts",
            "/dev/sda1 / ext4 rw 0 0\n/dev/sdb1 /gone ext4 rw 0 0\n",
        );
        fs.set_fs_usage(
            "/",
            FsUsage {
                total: 100,
                used: 0,
                free: 0,
            },
        );

        let disks = SystemCollector::new(fs, "/proc").collect_disks().unwrap();
        assert_eq!(disks.len(), 1);
        assert_eq!(disks[0].percent, 0.0);
    }

    #[test]
    fn test_collect_disks_without_mounts_file() {
        let collector = SystemCollector::new(MockFs::new(), "/proc");
        assert!(collector.collect_disks().is_err());
    }

    #[test]
    fn test_usage_percent_rounding() {
        let usage = FsUsage {
            total: 3,
            used: 1,
            free: 2,
        };
        assert_eq!(usage_percent(&usage), 33.3);
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn test_real_proc() {
        let collector = SystemCollector::new(RealFs::new(), "/proc");
        assert!(collector.collect_uptime().unwrap().seconds > 0.0);
        assert!(collector.collect_mounts().is_ok());
    }
}
