//! Sample source: the tegrastats writer plus the log it appends to.

use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use tracing::{debug, error, info};

use crate::collector::tegrastats::process::{SourceError, TegrastatsProcess};
use crate::collector::tegrastats::tailer::{TAIL_WINDOW, last_complete_line};
use crate::collector::traits::{CommandRunner, FileSystem};
use crate::storage::model::RawLine;

/// Owns the tegrastats process and its log file.
///
/// `read` and `cleanup` take the same lock, so the log is never truncated
/// while a sample is being extracted from it.
pub struct SampleSource<F: FileSystem, R: CommandRunner> {
    fs: F,
    logfile: PathBuf,
    interval: Duration,
    process: Mutex<TegrastatsProcess<R>>,
    log_lock: Mutex<()>,
}

impl<F: FileSystem, R: CommandRunner> SampleSource<F, R> {
    /// Creates a source for `binary` writing to `logfile` every `interval`.
    /// Nothing is started until [`start`](Self::start).
    pub fn new(
        fs: F,
        runner: R,
        binary: impl Into<PathBuf>,
        logfile: impl Into<PathBuf>,
        interval: Duration,
    ) -> Self {
        let logfile = logfile.into();
        Self {
            fs,
            process: Mutex::new(TegrastatsProcess::new(
                runner,
                binary,
                logfile.clone(),
                interval,
            )),
            logfile,
            interval,
            log_lock: Mutex::new(()),
        }
    }

    pub fn logfile(&self) -> &Path {
        &self.logfile
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn is_running(&self) -> bool {
        self.process
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_running()
    }

    /// Starts tegrastats. Idempotent.
    pub fn start(&self) -> Result<(), SourceError> {
        self.process
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .start()
    }

    /// Stops tegrastats. A failure is logged; the caller is shutting down
    /// and has nothing better to do with it.
    pub fn stop(&self) {
        let result = self
            .process
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .stop();
        if let Err(e) = result {
            error!(error = %e, "failed to stop tegrastats");
        }
    }

    /// Returns the most recent complete line of the log.
    pub fn read(&self) -> Result<RawLine, SourceError> {
        let _guard = self.log_lock.lock().unwrap_or_else(PoisonError::into_inner);

        let tail = match self.fs.read_tail(&self.logfile, TAIL_WINDOW) {
            Ok(tail) => tail,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                return Err(self.no_data());
            }
            Err(source) => {
                return Err(SourceError::Io {
                    path: self.logfile.display().to_string(),
                    source,
                });
            }
        };

        last_complete_line(&tail)
            .map(RawLine::new)
            .ok_or_else(|| self.no_data())
    }

    /// Truncates the log so it does not grow without bound.
    pub fn cleanup(&self) -> Result<(), SourceError> {
        let _guard = self.log_lock.lock().unwrap_or_else(PoisonError::into_inner);

        match self.fs.truncate(&self.logfile) {
            Ok(()) => {
                info!(logfile = %self.logfile.display(), "tegrastats log truncated");
                Ok(())
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                debug!(logfile = %self.logfile.display(), "no log to truncate");
                Ok(())
            }
            Err(source) => Err(SourceError::Truncate {
                path: self.logfile.display().to_string(),
                source,
            }),
        }
    }

    fn no_data(&self) -> SourceError {
        SourceError::NoData {
            path: self.logfile.display().to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collector::mock::{MockFs, MockRunner, SCENARIO_LOG, samples};
    use crate::collector::tegrastats::parser::parse_line;
    use crate::collector::traits::{RealFs, SystemRunner};
    use std::io::Write;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::thread;

    fn source(fs: &MockFs, runner: &MockRunner) -> SampleSource<MockFs, MockRunner> {
        SampleSource::new(
            fs.clone(),
            runner.clone(),
            "/usr/bin/tegrastats",
            SCENARIO_LOG,
            Duration::from_secs(1),
        )
    }

    #[test]
    fn test_read_latest_line() {
        let fs = MockFs::jetson_nano();
        let src = source(&fs, &MockRunner::new());

        fs.append(SCENARIO_LOG, &format!("{}\n", samples::TX2));
        assert_eq!(src.read().unwrap().as_str(), samples::TX2);
    }

    #[test]
    fn test_read_skips_unfinished_line() {
        let fs = MockFs::jetson_nano();
        let src = source(&fs, &MockRunner::new());

        fs.append(SCENARIO_LOG, "RAM 2016/3964MB (lfb");
        assert_eq!(src.read().unwrap().as_str(), samples::NANO);
    }

    #[test]
    fn test_read_no_data() {
        let fs = MockFs::new();
        let src = source(&fs, &MockRunner::new());
        assert!(matches!(src.read(), Err(SourceError::NoData { .. })));

        fs.add_file(SCENARIO_LOG, "");
        assert!(matches!(src.read(), Err(SourceError::NoData { .. })));
    }

    #[test]
    fn test_cleanup_truncates() {
        let fs = MockFs::jetson_nano();
        let src = source(&fs, &MockRunner::new());

        src.cleanup().unwrap();
        assert_eq!(fs.content(SCENARIO_LOG).as_deref(), Some(""));
        assert!(matches!(src.read(), Err(SourceError::NoData { .. })));

        fs.remove_file(SCENARIO_LOG);
        src.cleanup().unwrap();
    }

    #[test]
    fn test_start_stop() {
        let fs = MockFs::jetson_nano();
        let runner = MockRunner::new();
        let src = source(&fs, &runner);

        src.start().unwrap();
        src.start().unwrap();
        assert!(src.is_running());
        assert_eq!(runner.count("--start"), 1);

        src.stop();
        assert!(!src.is_running());
        assert_eq!(runner.count("--stop"), 1);
    }

    #[test]
    fn test_stop_failure_is_swallowed() {
        let fs = MockFs::jetson_nano();
        let runner = MockRunner::new();
        runner.exit_with("--stop", 1);
        let src = source(&fs, &runner);

        src.start().unwrap();
        src.stop();
        assert!(!src.is_running());
    }

    #[test]
    fn test_real_log_file() {
        let dir = tempfile::tempdir().unwrap();
        let log = dir.path().join("stats.log");
        let src = SampleSource::new(
            RealFs::new(),
            SystemRunner::new(),
            "/usr/bin/tegrastats",
            &log,
            Duration::from_secs(1),
        );

        assert!(matches!(src.read(), Err(SourceError::NoData { .. })));

        std::fs::write(&log, format!("{}\n{}\n", samples::TX2, samples::NANO)).unwrap();
        assert_eq!(src.read().unwrap().as_str(), samples::NANO);

        src.cleanup().unwrap();
        assert_eq!(std::fs::metadata(&log).unwrap().len(), 0);
    }

    #[test]
    fn test_read_large_log_uses_window() {
        let dir = tempfile::tempdir().unwrap();
        let log = dir.path().join("stats.log");
        let mut content = String::new();
        while content.len() < 3 * TAIL_WINDOW as usize {
            content.push_str(samples::TX2);
            content.push('\n');
        }
        content.push_str(samples::ORIN);
        content.push('\n');
        std::fs::write(&log, content).unwrap();

        let src = SampleSource::new(
            RealFs::new(),
            SystemRunner::new(),
            "/usr/bin/tegrastats",
            &log,
            Duration::from_secs(1),
        );
        assert_eq!(src.read().unwrap().as_str(), samples::ORIN);
    }

    #[test]
    fn test_concurrent_cleanup_never_yields_partial_line() {
        let dir = tempfile::tempdir().unwrap();
        let log = dir.path().join("stats.log");
        std::fs::write(&log, "").unwrap();

        let src = Arc::new(SampleSource::new(
            RealFs::new(),
            SystemRunner::new(),
            "/usr/bin/tegrastats",
            &log,
            Duration::from_millis(10),
        ));
        let done = Arc::new(AtomicBool::new(false));

        let writer = {
            let log = log.clone();
            let done = done.clone();
            thread::spawn(move || {
                let mut file = std::fs::OpenOptions::new()
                    .append(true)
                    .open(&log)
                    .unwrap();
                let record = format!("{}\n", samples::NANO);
                for _ in 0..2000 {
                    file.write_all(record.as_bytes()).unwrap();
                }
                done.store(true, Ordering::SeqCst);
            })
        };
        let cleaner = {
            let src = src.clone();
            let done = done.clone();
            thread::spawn(move || {
                while !done.load(Ordering::SeqCst) {
                    src.cleanup().unwrap();
                    thread::yield_now();
                }
            })
        };

        let expected = parse_line(samples::NANO).unwrap();
        while !done.load(Ordering::SeqCst) {
            match src.read() {
                Ok(line) => {
                    assert_eq!(line.as_str(), samples::NANO);
                    assert_eq!(parse_line(line.as_str()).unwrap(), expected);
                }
                Err(SourceError::NoData { .. }) => {}
                Err(e) => panic!("unexpected error: {e}"),
            }
        }

        writer.join().unwrap();
        cleaner.join().unwrap();
        // Whatever survived the last truncation is still whole.
        if let Ok(line) = src.read() {
            assert_eq!(line.as_str(), samples::NANO);
        }
    }
}
