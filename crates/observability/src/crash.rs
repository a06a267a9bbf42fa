//! Crash-reporting sink.
//!
//! The dispatcher hands every captured failure to a [`CrashReporter`] when
//! crash reporting is enabled. Real sinks (an error-tracking service) live
//! outside this workspace; [`TracingCrashReporter`] writes reports to the log.

use std::sync::Arc;

use serde::Serialize;
use serde_json::Value as JsonValue;

/// Context attached to a captured failure.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CrashReport {
    pub bin: String,
    /// Handler category (`dynamodb`, `sqs`, `adhoc`) when known.
    pub category: Option<String>,
    pub function: Option<String>,
    pub reason: String,
    /// The full record (or batch) that failed.
    pub record: JsonValue,
    /// Whether the failure aborts the invocation.
    pub fatal: bool,
}

pub trait CrashReporter: Send + Sync {
    fn capture(&self, report: &CrashReport);
}

impl<R> CrashReporter for Arc<R>
where
    R: CrashReporter + ?Sized,
{
    fn capture(&self, report: &CrashReport) {
        (**self).capture(report)
    }
}

/// Drops every report.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopCrashReporter;

impl CrashReporter for NoopCrashReporter {
    fn capture(&self, _report: &CrashReport) {}
}

/// Emits each report as an `error` event.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingCrashReporter;

impl CrashReporter for TracingCrashReporter {
    fn capture(&self, report: &CrashReport) {
        let record = serde_json::to_string(&report.record).unwrap_or_default();
        ::tracing::error!(
            bin = %report.bin,
            category = report.category.as_deref().unwrap_or("unknown"),
            function = report.function.as_deref().unwrap_or(""),
            fatal = report.fatal,
            record = %record,
            "captured failure: {}",
            report.reason
        );
    }
}
