//! Tracing setup and crash reporting.

/// Initialize process-wide observability (tracing/logging).
///
/// This is safe to call multiple times; subsequent calls become no-ops.
pub fn init() {
    tracing::init();
}

/// Tracing configuration (filters, layers).
pub mod tracing;

/// Crash-reporting sink contract.
pub mod crash;

pub use crash::{CrashReport, CrashReporter, NoopCrashReporter, TracingCrashReporter};
