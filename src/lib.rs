//! jetson-exporter - Prometheus exporter for NVIDIA Jetson telemetry.
//!
//! This library provides the pieces shared between:
//! - `jetson-exporter` - the HTTP exporter driving `tegrastats`
//! - `jetson-decode` - offline decoder for captured tegrastats logs

pub mod collector;
pub mod config;
pub mod exporter;
pub mod storage;

/// Crate version string.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
