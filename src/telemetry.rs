//! Telemetry sink - leveled error/diagnostic reporting.
//!
//! The engine never depends on a concrete logging backend. Everything flows
//! through the [`ErrorReporter`] trait; the default implementation forwards
//! to `tracing` events. The core continues regardless of what the sink does
//! with a report.

use std::fmt;
use std::sync::Arc;

// =============================================================================
// Levels and Categories
// =============================================================================

/// Severity of a report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ReportLevel {
    Debug,
    Warning,
    Error,
    /// An invariant has been broken; the engine self-heals but the condition
    /// indicates a framework-level bug upstream.
    Fatal,
}

impl fmt::Display for ReportLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReportLevel::Debug => write!(f, "debug"),
            ReportLevel::Warning => write!(f, "warning"),
            ReportLevel::Error => write!(f, "error"),
            ReportLevel::Fatal => write!(f, "fatal"),
        }
    }
}

// Categories used by the engine itself.
pub const CATEGORY_MOUNT: &str = "mount";
pub const CATEGORY_PIPELINE: &str = "pipeline";

// =============================================================================
// Reporter Trait
// =============================================================================

/// Narrow reporting interface consumed by the engine.
///
/// `metadata` carries structured key/value context (unit ids, versions);
/// `sampling_frequency` is a hint for sinks that sample, `1` meaning
/// "always report".
pub trait ErrorReporter: Send + Sync {
    fn report(
        &self,
        level: ReportLevel,
        category: &str,
        message: &str,
        sampling_frequency: u32,
        metadata: &[(&str, String)],
    );
}

/// Shared reporter handle.
pub type SharedReporter = Arc<dyn ErrorReporter>;

// =============================================================================
// Tracing-backed Default
// =============================================================================

/// Default reporter: forwards every report to a `tracing` event.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingReporter;

impl ErrorReporter for TracingReporter {
    fn report(
        &self,
        level: ReportLevel,
        category: &str,
        message: &str,
        _sampling_frequency: u32,
        metadata: &[(&str, String)],
    ) {
        let meta = if metadata.is_empty() {
            String::new()
        } else {
            let parts: Vec<String> = metadata
                .iter()
                .map(|(key, value)| format!("{key}={value}"))
                .collect();
            format!(" [{}]", parts.join(", "))
        };

        match level {
            ReportLevel::Debug => tracing::debug!(target: "spark_render", "{category}: {message}{meta}"),
            ReportLevel::Warning => tracing::warn!(target: "spark_render", "{category}: {message}{meta}"),
            ReportLevel::Error | ReportLevel::Fatal => {
                tracing::error!(target: "spark_render", "{category}: {message}{meta}")
            }
        }
    }
}

/// Create the default shared reporter.
pub fn default_reporter() -> SharedReporter {
    Arc::new(TracingReporter)
}

// =============================================================================
// Recording Reporter (tests)
// =============================================================================

/// Reporter that records every report for later inspection.
///
/// Useful in tests asserting that a recovery path actually reported.
#[derive(Default)]
pub struct RecordingReporter {
    reports: parking_lot::Mutex<Vec<(ReportLevel, String, String)>>,
}

impl RecordingReporter {
    pub fn new() -> Self {
        Self::default()
    }

    /// All reports captured so far, as (level, category, message).
    pub fn reports(&self) -> Vec<(ReportLevel, String, String)> {
        self.reports.lock().clone()
    }

    /// Count reports at or above a level.
    pub fn count_at_least(&self, level: ReportLevel) -> usize {
        self.reports
            .lock()
            .iter()
            .filter(|(l, _, _)| *l >= level)
            .count()
    }
}

impl ErrorReporter for RecordingReporter {
    fn report(
        &self,
        level: ReportLevel,
        category: &str,
        message: &str,
        _sampling_frequency: u32,
        _metadata: &[(&str, String)],
    ) {
        self.reports
            .lock()
            .push((level, category.to_string(), message.to_string()));
    }
}

// =============================================================================
// Tests
// =============================================================================
