//! Abstractions for filesystem and subprocess access to enable testing and mocking.
//!
//! The `FileSystem` trait lets collectors work against the real `/proc`, `/sys`
//! and tegrastats log on a Jetson, or against an in-memory mock in CI. The
//! `CommandRunner` trait does the same for the `tegrastats` control commands.

use std::fs::{File, OpenOptions};
use std::io::{self, Read, Seek, SeekFrom};
use std::path::Path;
use std::process::{Command, Stdio};
use std::sync::mpsc::{self, Receiver};
use std::thread;
use std::time::{Duration, Instant};

/// Trailing window of a file returned by [`FileSystem::read_tail`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Tail {
    /// Decoded window content (lossy UTF-8).
    pub text: String,
    /// `true` if the window starts at offset 0, i.e. covers the whole file.
    pub from_start: bool,
}

/// Space accounting of a mounted filesystem, in bytes.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct FsUsage {
    pub total: u64,
    pub used: u64,
    /// Space available to unprivileged users.
    pub free: u64,
}

/// Abstraction for filesystem operations.
pub trait FileSystem: Send + Sync {
    /// Reads the entire contents of a file as a string.
    fn read_to_string(&self, path: &Path) -> io::Result<String>;

    /// Checks if a path exists.
    fn exists(&self, path: &Path) -> bool;

    /// Checks if a path exists and is a regular file.
    fn is_file(&self, path: &Path) -> bool;

    /// Reads at most the last `max_bytes` bytes of a file.
    fn read_tail(&self, path: &Path, max_bytes: u64) -> io::Result<Tail>;

    /// Truncates an existing file to zero length.
    fn truncate(&self, path: &Path) -> io::Result<()>;

    /// Returns space usage of the filesystem mounted at `mountpoint`.
    fn fs_usage(&self, mountpoint: &Path) -> io::Result<FsUsage>;
}

/// Real filesystem implementation that delegates to `std::fs` and `statvfs(3)`.
#[derive(Debug, Default, Clone, Copy)]
pub struct RealFs;

impl RealFs {
    pub fn new() -> Self {
        Self
    }
}

impl FileSystem for RealFs {
    fn read_to_string(&self, path: &Path) -> io::Result<String> {
        std::fs::read_to_string(path)
    }

    fn exists(&self, path: &Path) -> bool {
        path.exists()
    }

    fn is_file(&self, path: &Path) -> bool {
        path.is_file()
    }

    fn read_tail(&self, path: &Path, max_bytes: u64) -> io::Result<Tail> {
        let mut file = File::open(path)?;
        let len = file.metadata()?.len();
        let start = len.saturating_sub(max_bytes);
        file.seek(SeekFrom::Start(start))?;

        // The writer may append between metadata() and read(); cap at the window
        // size so a burst of new data cannot make this read unbounded.
        let mut buf = Vec::with_capacity(max_bytes.min(len) as usize);
        file.take(max_bytes).read_to_end(&mut buf)?;

        Ok(Tail {
            text: String::from_utf8_lossy(&buf).into_owned(),
            from_start: start == 0,
        })
    }

    fn truncate(&self, path: &Path) -> io::Result<()> {
        OpenOptions::new().write(true).open(path)?.set_len(0)
    }

    #[cfg(unix)]
    fn fs_usage(&self, mountpoint: &Path) -> io::Result<FsUsage> {
        use std::ffi::CString;
        use std::os::unix::ffi::OsStrExt;

        let c_path = CString::new(mountpoint.as_os_str().as_bytes())
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e))?;

        // SAFETY: statvfs is plain old data, all-zero is a valid bit pattern.
        let mut stat: libc::statvfs = unsafe { std::mem::zeroed() };
        // SAFETY: c_path is a valid NUL-terminated string and stat is a valid out pointer.
        let rc = unsafe { libc::statvfs(c_path.as_ptr(), &mut stat) };
        if rc != 0 {
            return Err(io::Error::last_os_error());
        }

        let frsize = stat.f_frsize as u64;
        let blocks = stat.f_blocks as u64;
        Ok(FsUsage {
            total: blocks * frsize,
            used: blocks.saturating_sub(stat.f_bfree as u64) * frsize,
            free: stat.f_bavail as u64 * frsize,
        })
    }

    #[cfg(not(unix))]
    fn fs_usage(&self, _mountpoint: &Path) -> io::Result<FsUsage> {
        Err(io::Error::new(
            io::ErrorKind::Unsupported,
            "filesystem usage requires statvfs",
        ))
    }
}

/// Captured result of an external command.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CommandOutput {
    /// Exit code, `None` if the process was killed by a signal.
    pub code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.code == Some(0)
    }
}

/// Abstraction for running external commands to completion.
pub trait CommandRunner: Send + Sync {
    /// Runs `program` with `args` and waits for it to exit.
    ///
    /// Returns `Err` only if the process could not be spawned; a non-zero exit
    /// is reported through [`CommandOutput::code`].
    fn run(&self, program: &Path, args: &[String]) -> io::Result<CommandOutput>;
}

/// Default deadline for one command run by [`SystemRunner`].
pub const COMMAND_TIMEOUT: Duration = Duration::from_secs(10);

const POLL_INTERVAL: Duration = Duration::from_millis(10);

/// How long to keep collecting output after the command exited. A command
/// that daemonizes leaves its pipes open in the background child.
const OUTPUT_GRACE: Duration = Duration::from_millis(500);

/// Runs commands with `std::process::Command`, killing any that does not
/// exit within the timeout.
#[derive(Debug, Clone, Copy)]
pub struct SystemRunner {
    timeout: Duration,
}

impl Default for SystemRunner {
    fn default() -> Self {
        Self {
            timeout: COMMAND_TIMEOUT,
        }
    }
}

impl SystemRunner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_timeout(timeout: Duration) -> Self {
        Self { timeout }
    }
}

/// Reads a pipe to the end on its own thread.
fn drain<P: Read + Send + 'static>(pipe: Option<P>) -> Receiver<String> {
    let (tx, rx) = mpsc::channel();
    if let Some(mut pipe) = pipe {
        thread::spawn(move || {
            let mut buf = Vec::new();
            let _ = pipe.read_to_end(&mut buf);
            let _ = tx.send(String::from_utf8_lossy(&buf).into_owned());
        });
    }
    rx
}

impl CommandRunner for SystemRunner {
    fn run(&self, program: &Path, args: &[String]) -> io::Result<CommandOutput> {
        let mut child = Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()?;
        let stdout = drain(child.stdout.take());
        let stderr = drain(child.stderr.take());

        let start = Instant::now();
        let status = loop {
            if let Some(status) = child.try_wait()? {
                break status;
            }
            if start.elapsed() >= self.timeout {
                let _ = child.kill();
                let _ = child.wait();
                return Err(io::Error::new(
                    io::ErrorKind::TimedOut,
                    format!(
                        "{} did not exit within {:?}",
                        program.display(),
                        self.timeout
                    ),
                ));
            }
            thread::sleep(POLL_INTERVAL);
        };

        let grace = OUTPUT_GRACE.min(self.timeout.saturating_sub(start.elapsed()));
        Ok(CommandOutput {
            code: status.code(),
            stdout: stdout.recv_timeout(grace).unwrap_or_default(),
            stderr: stderr.recv_timeout(grace).unwrap_or_default(),
        })
    }
}
