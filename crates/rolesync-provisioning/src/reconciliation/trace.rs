//! Progress reporting for synchronisation runs.
//!
//! The engine writes ordered text lines at two verbosity levels and signals
//! the end of the run with [`ProgressTrace::finished`].

use std::sync::{Mutex, PoisonError};

use serde::{Deserialize, Serialize};

/// Target used for trace lines emitted through `tracing`.
pub const TRACE_LOG_TARGET: &str = "rolesync::sync";

/// Verbosity of a trace line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TraceLevel {
    /// Run-level progress.
    Summary,
    /// Per-row decisions.
    Detail,
}

/// Sink for run progress.
pub trait ProgressTrace: Send + Sync {
    /// Write one line.
    fn output(&self, level: TraceLevel, message: &str);

    /// Mark the run as finished.
    fn finished(&self) {}
}

/// Forwards trace lines to `tracing`: summary lines at `info`, detail at `debug`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingTrace;

impl TracingTrace {
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl ProgressTrace for TracingTrace {
    fn output(&self, level: TraceLevel, message: &str) {
        match level {
            TraceLevel::Summary => tracing::info!(target: TRACE_LOG_TARGET, "{message}"),
            TraceLevel::Detail => tracing::debug!(target: TRACE_LOG_TARGET, "{message}"),
        }
    }

    fn finished(&self) {
        tracing::debug!(target: TRACE_LOG_TARGET, "Trace finished");
    }
}

/// Keeps every line in memory.
#[derive(Debug, Default)]
pub struct BufferedTrace {
    lines: Mutex<Vec<(TraceLevel, String)>>,
    finished: Mutex<bool>,
}

impl BufferedTrace {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// All lines written so far.
    pub fn lines(&self) -> Vec<(TraceLevel, String)> {
        self.lines
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Lines written at `level`.
    pub fn messages(&self, level: TraceLevel) -> Vec<String> {
        self.lines()
            .into_iter()
            .filter(|(line_level, _)| *line_level == level)
            .map(|(_, message)| message)
            .collect()
    }

    /// Whether any line contains `needle`.
    pub fn contains(&self, needle: &str) -> bool {
        self.lines()
            .iter()
            .any(|(_, message)| message.contains(needle))
    }

    /// Plain-text transcript; detail lines are indented.
    pub fn transcript(&self) -> String {
        self.lines()
            .iter()
            .map(|(level, message)| match level {
                TraceLevel::Summary => message.clone(),
                TraceLevel::Detail => format!("  {message}"),
            })
            .collect::<Vec<_>>()
            .join("\n")
    }

    pub fn is_finished(&self) -> bool {
        *self.finished.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl ProgressTrace for BufferedTrace {
    fn output(&self, level: TraceLevel, message: &str) {
        self.lines
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((level, message.to_string()));
    }

    fn finished(&self) {
        *self.finished.lock().unwrap_or_else(PoisonError::into_inner) = true;
    }
}

/// Discards everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullTrace;

impl ProgressTrace for NullTrace {
    fn output(&self, _level: TraceLevel, _message: &str) {}
}
