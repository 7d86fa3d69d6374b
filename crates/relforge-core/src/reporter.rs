//! Progress reporting for orchestration steps.
//!
//! The orchestrator reports one line per step through an injected reporter,
//! so progress output is testable and substitutable.

use std::sync::Mutex;

/// Minimal line-oriented progress capability.
pub trait ProgressReporter: Send + Sync {
    /// Emit one line of step progress.
    fn line(&self, message: &str);
}

/// Routes progress lines to the `tracing` subscriber at info level.
#[derive(Debug, Default)]
pub struct TracingReporter;

impl TracingReporter {
    pub fn new() -> Self {
        TracingReporter
    }
}

impl ProgressReporter for TracingReporter {
    fn line(&self, message: &str) {
        tracing::info!("{message}");
    }
}

/// Collects progress lines for assertions in tests.
#[derive(Debug, Default)]
pub struct RecordingReporter {
    lines: Mutex<Vec<String>>,
}

impl RecordingReporter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn lines(&self) -> Vec<String> {
        self.lines.lock().unwrap().clone()
    }
}

impl ProgressReporter for RecordingReporter {
    fn line(&self, message: &str) {
        self.lines.lock().unwrap().push(message.to_string());
    }
}
