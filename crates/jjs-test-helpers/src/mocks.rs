//! Mock implementations for testing

use jjs_core::diagnostics::{Diagnostic, DiagnosticHandler, DiagnosticLevel};
use jjs_core::errors::Result;
use jjs_core::rebind::{RebindOracle, StaticRebindOracle};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// A mock diagnostic handler that collects diagnostics
#[derive(Debug, Default)]
pub struct MockDiagnosticHandler {
    diagnostics: Mutex<Vec<Diagnostic>>,
}

impl MockDiagnosticHandler {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    fn lock(&self) -> MutexGuard<'_, Vec<Diagnostic>> {
        self.diagnostics.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn count(&self, level: DiagnosticLevel) -> usize {
        self.lock().iter().filter(|d| d.level == level).count()
    }

    /// Messages reported at `level`, in order
    pub fn messages(&self, level: DiagnosticLevel) -> Vec<String> {
        self.lock()
            .iter()
            .filter(|d| d.level == level)
            .map(|d| d.message.clone())
            .collect()
    }
}

impl DiagnosticHandler for MockDiagnosticHandler {
    fn report(&self, diagnostic: Diagnostic) {
        self.lock().push(diagnostic);
    }

    fn has_errors(&self) -> bool {
        self.count(DiagnosticLevel::Error) > 0
    }

    fn error_count(&self) -> usize {
        self.count(DiagnosticLevel::Error)
    }

    fn warning_count(&self) -> usize {
        self.count(DiagnosticLevel::Warning)
    }

    fn get_diagnostics(&self) -> Vec<Diagnostic> {
        self.lock().clone()
    }
}

/// Rebind oracle that answers from fixed rules and records every request
#[derive(Debug, Default)]
pub struct RecordingRebindOracle {
    inner: StaticRebindOracle,
    requests: Mutex<Vec<String>>,
}

impl RecordingRebindOracle {
    pub fn new(inner: StaticRebindOracle) -> Self {
        Self {
            inner,
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Types passed to [`RebindOracle::rebind`], in order
    pub fn requests(&self) -> Vec<String> {
        self.requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl RebindOracle for RecordingRebindOracle {
    fn rebind(&self, requested: &str) -> Result<String> {
        self.requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(requested.to_string());
        self.inner.rebind(requested)
    }

    fn all_possible_answers(&self, requested: &str) -> Vec<String> {
        self.inner.all_possible_answers(requested)
    }
}
