//! In-memory mock filesystem for testing collectors without a real Jetson.
//!
//! Unlike a plain value, clones of `MockFs` share one backing store, the same
//! way every handle to the real filesystem sees the same files. Tests can keep
//! a handle, give a clone to a collector, and then append log lines or remove
//! files underneath it.

use crate::collector::traits::{FileSystem, FsUsage, Tail};
use std::collections::{HashMap, HashSet};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

#[derive(Debug, Default)]
struct Inner {
    /// Map from path to file contents.
    files: HashMap<PathBuf, String>,
    /// Set of directories, implied by added files.
    directories: HashSet<PathBuf>,
    /// Filesystem usage keyed by mountpoint.
    usage: HashMap<PathBuf, FsUsage>,
}

/// In-memory filesystem for testing.
#[derive(Debug, Clone, Default)]
pub struct MockFs {
    inner: Arc<Mutex<Inner>>,
}

impl MockFs {
    /// Creates a new empty mock filesystem.
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Adds (or replaces) a file with the given content.
    ///
    /// Parent directories are automatically created.
    pub fn add_file(&self, path: impl AsRef<Path>, content: impl Into<String>) {
        let path = path.as_ref().to_path_buf();
        let mut inner = self.lock();

        let mut parent = path.parent();
        while let Some(p) = parent {
            if !p.as_os_str().is_empty() {
                inner.directories.insert(p.to_path_buf());
            }
            parent = p.parent();
        }

        inner.files.insert(path, content.into());
    }

    /// Appends to a file, creating it if missing.
    pub fn append(&self, path: impl AsRef<Path>, content: &str) {
        let path = path.as_ref();
        if !self.is_file(path) {
            self.add_file(path, content);
            return;
        }
        if let Some(current) = self.lock().files.get_mut(path) {
            current.push_str(content);
        }
    }

    /// Removes a file. Returns `true` if it existed.
    pub fn remove_file(&self, path: impl AsRef<Path>) -> bool {
        self.lock().files.remove(path.as_ref()).is_some()
    }

    /// Registers usage numbers for a mountpoint.
    pub fn set_fs_usage(&self, mountpoint: impl AsRef<Path>, usage: FsUsage) {
        self.lock()
            .usage
            .insert(mountpoint.as_ref().to_path_buf(), usage);
    }

    /// Returns the current content of a file, if present.
    pub fn content(&self, path: impl AsRef<Path>) -> Option<String> {
        self.lock().files.get(path.as_ref()).cloned()
    }
}

fn not_found(path: &Path) -> io::Error {
    io::Error::new(
        io::ErrorKind::NotFound,
        format!("file not found: {:?}", path),
    )
}

impl FileSystem for MockFs {
    fn read_to_string(&self, path: &Path) -> io::Result<String> {
        self.lock()
            .files
            .get(path)
            .cloned()
            .ok_or_else(|| not_found(path))
    }

    fn exists(&self, path: &Path) -> bool {
        let inner = self.lock();
        inner.files.contains_key(path) || inner.directories.contains(path)
    }

    fn is_file(&self, path: &Path) -> bool {
        self.lock().files.contains_key(path)
    }

    fn read_tail(&self, path: &Path, max_bytes: u64) -> io::Result<Tail> {
        let inner = self.lock();
        let content = inner.files.get(path).ok_or_else(|| not_found(path))?;
        let bytes = content.as_bytes();
        let start = bytes.len().saturating_sub(max_bytes as usize);
        Ok(Tail {
            text: String::from_utf8_lossy(&bytes[start..]).into_owned(),
            from_start: start == 0,
        })
    }

    fn truncate(&self, path: &Path) -> io::Result<()> {
        let mut inner = self.lock();
        let content = inner.files.get_mut(path).ok_or_else(|| not_found(path))?;
        content.clear();
        Ok(())
    }

    fn fs_usage(&self, mountpoint: &Path) -> io::Result<FsUsage> {
        self.lock()
            .usage
            .get(mountpoint)
            .copied()
            .ok_or_else(|| not_found(mountpoint))
    }
}
