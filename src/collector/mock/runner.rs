//! Scripted command runner for testing subprocess control.

use crate::collector::traits::{CommandOutput, CommandRunner};
use std::collections::HashMap;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

#[derive(Debug, Default)]
struct Inner {
    /// Every invocation: program followed by its arguments.
    calls: Vec<(PathBuf, Vec<String>)>,
    /// Exit code keyed by a trigger argument (e.g. `--start`).
    exit_codes: HashMap<String, i32>,
    /// Trigger arguments for which spawning fails outright.
    spawn_failures: Vec<String>,
}

/// Records invocations and answers with scripted exit codes.
///
/// Every command exits 0 unless scripted otherwise. Clones share the same
/// call log so tests can inspect what a collector ran.
#[derive(Debug, Clone, Default)]
pub struct MockRunner {
    inner: Arc<Mutex<Inner>>,
}

impl MockRunner {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Makes any invocation containing `arg` exit with `code`.
    pub fn exit_with(&self, arg: &str, code: i32) {
        self.lock().exit_codes.insert(arg.to_string(), code);
    }

    /// Makes any invocation containing `arg` fail to spawn.
    pub fn fail_spawn(&self, arg: &str) {
        self.lock().spawn_failures.push(arg.to_string());
    }

    /// Returns all recorded invocations.
    pub fn calls(&self) -> Vec<(PathBuf, Vec<String>)> {
        self.lock().calls.clone()
    }

    /// Counts invocations that contained `arg`.
    pub fn count(&self, arg: &str) -> usize {
        self.lock()
            .calls
            .iter()
            .filter(|(_, args)| args.iter().any(|a| a == arg))
            .count()
    }
}

impl CommandRunner for MockRunner {
    fn run(&self, program: &Path, args: &[String]) -> io::Result<CommandOutput> {
        let mut inner = self.lock();
        inner.calls.push((program.to_path_buf(), args.to_vec()));

        if args.iter().any(|a| inner.spawn_failures.contains(a)) {
            return Err(io::Error::new(
                io::ErrorKind::NotFound,
                format!("cannot spawn {}", program.display()),
            ));
        }

        let code = args
            .iter()
            .find_map(|a| inner.exit_codes.get(a).copied())
            .unwrap_or(0);
        Ok(CommandOutput {
            code: Some(code),
            stdout: String::new(),
            stderr: if code == 0 {
                String::new()
            } else {
                format!("exit status {code}")
            },
        })
    }
}
