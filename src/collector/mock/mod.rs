//! Mock filesystem and command runner implementations for testing.
//!
//! This module provides `MockFs`, `MockRunner` and pre-built Jetson scenarios
//! for testing collectors without a real board or `tegrastats` binary.

mod filesystem;
mod runner;
mod scenarios;

pub use filesystem::MockFs;
pub use runner::MockRunner;
pub use scenarios::{SCENARIO_LOG, samples};
