//! Structured logging setup for `frepo`.
//!
//! # Feature Flags
//!
//! - `telemetry` (default): normal tracing output
//! - `release-logs`: strip debug/trace at compile time
//! - `max-perf`: disable all tracing for maximum performance

mod init;

pub use init::{init_telemetry, TelemetryConfig, TelemetryGuard};
