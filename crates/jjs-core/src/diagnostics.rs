use crate::errors::CompilationError;
use crate::source_info::SourceInfo;
use std::sync::{Mutex, PoisonError};

/// Diagnostic severity level
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiagnosticLevel {
    Error,
    Warning,
    Info,
}

/// A diagnostic message with optional provenance and severity
#[derive(Debug, Clone)]
pub struct Diagnostic {
    pub level: DiagnosticLevel,
    pub source: Option<SourceInfo>,
    pub message: String,
}

impl Diagnostic {
    pub fn error(source: Option<SourceInfo>, message: impl Into<String>) -> Self {
        Self {
            level: DiagnosticLevel::Error,
            source,
            message: message.into(),
        }
    }

    pub fn warning(source: Option<SourceInfo>, message: impl Into<String>) -> Self {
        Self {
            level: DiagnosticLevel::Warning,
            source,
            message: message.into(),
        }
    }

    pub fn info(source: Option<SourceInfo>, message: impl Into<String>) -> Self {
        Self {
            level: DiagnosticLevel::Info,
            source,
            message: message.into(),
        }
    }

    fn location(&self) -> String {
        match &self.source {
            Some(source) => source.to_string(),
            None => "<compiler>".to_string(),
        }
    }
}

/// Trait for handling diagnostics
/// This allows for dependency injection and testing with mock handlers
pub trait DiagnosticHandler: Send + Sync {
    fn report(&self, diagnostic: Diagnostic);

    fn error(&self, source: Option<&SourceInfo>, message: &str) {
        self.report(Diagnostic::error(source.cloned(), message));
    }

    fn warning(&self, source: Option<&SourceInfo>, message: &str) {
        self.report(Diagnostic::warning(source.cloned(), message));
    }

    fn info(&self, source: Option<&SourceInfo>, message: &str) {
        self.report(Diagnostic::info(source.cloned(), message));
    }

    fn has_errors(&self) -> bool;
    fn error_count(&self) -> usize;
    fn warning_count(&self) -> usize;
    fn get_diagnostics(&self) -> Vec<Diagnostic>;
}

/// Report a user error and return the error that aborts compilation
pub fn user_error(
    handler: &dyn DiagnosticHandler,
    source: Option<&SourceInfo>,
    message: impl Into<String>,
) -> CompilationError {
    let message = message.into();
    tracing::error!("{}", message);
    handler.error(source, &message);
    CompilationError::unable_to_complete(message)
}

fn count_level(diagnostics: &Mutex<Vec<Diagnostic>>, level: DiagnosticLevel) -> usize {
    diagnostics
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
        .iter()
        .filter(|d| d.level == level)
        .count()
}

/// Console-based diagnostic handler that prints to stderr
pub struct ConsoleDiagnosticHandler {
    diagnostics: Mutex<Vec<Diagnostic>>,
    pretty: bool,
}

impl ConsoleDiagnosticHandler {
    pub fn new(pretty: bool) -> Self {
        Self {
            diagnostics: Mutex::new(Vec::new()),
            pretty,
        }
    }
}

impl DiagnosticHandler for ConsoleDiagnosticHandler {
    fn report(&self, diagnostic: Diagnostic) {
        let level_str = match diagnostic.level {
            DiagnosticLevel::Error => "error",
            DiagnosticLevel::Warning => "warning",
            DiagnosticLevel::Info => "info",
        };

        if self.pretty {
            eprintln!(
                "\x1b[1m{}\x1b[0m at {}: {}",
                level_str,
                diagnostic.location(),
                diagnostic.message
            );
        } else {
            eprintln!("{} at {}: {}", level_str, diagnostic.location(), diagnostic.message);
        }

        self.diagnostics
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(diagnostic);
    }

    fn has_errors(&self) -> bool {
        self.error_count() > 0
    }

    fn error_count(&self) -> usize {
        count_level(&self.diagnostics, DiagnosticLevel::Error)
    }

    fn warning_count(&self) -> usize {
        count_level(&self.diagnostics, DiagnosticLevel::Warning)
    }

    fn get_diagnostics(&self) -> Vec<Diagnostic> {
        self.diagnostics
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

/// Collecting diagnostic handler for testing
/// Collects all diagnostics without printing
pub struct CollectingDiagnosticHandler {
    diagnostics: Mutex<Vec<Diagnostic>>,
}

impl CollectingDiagnosticHandler {
    pub fn new() -> Self {
        Self {
            diagnostics: Mutex::new(Vec::new()),
        }
    }

    /// Messages of every diagnostic at `level`, in report order
    pub fn messages(&self, level: DiagnosticLevel) -> Vec<String> {
        self.diagnostics
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter(|d| d.level == level)
            .map(|d| d.message.clone())
            .collect()
    }
}

impl Default for CollectingDiagnosticHandler {
    fn default() -> Self {
        Self::new()
    }
}

impl DiagnosticHandler for CollectingDiagnosticHandler {
    fn report(&self, diagnostic: Diagnostic) {
        self.diagnostics
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(diagnostic);
    }

    fn has_errors(&self) -> bool {
        self.error_count() > 0
    }

    fn error_count(&self) -> usize {
        count_level(&self.diagnostics, DiagnosticLevel::Error)
    }

    fn warning_count(&self) -> usize {
        count_level(&self.diagnostics, DiagnosticLevel::Warning)
    }

    fn get_diagnostics(&self) -> Vec<Diagnostic> {
        self.diagnostics
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_diagnostic_creation() {
        let diag = Diagnostic::error(Some(SourceInfo::unknown()), "Test error");

        assert_eq!(diag.level, DiagnosticLevel::Error);
        assert_eq!(diag.message, "Test error");
        assert_eq!(diag.location(), "Unknown(0)");
    }

    #[test]
    fn test_collecting_handler() {
        let handler = CollectingDiagnosticHandler::new();
        let info = SourceInfo::unknown();

        handler.error(Some(&info), "Error 1");
        handler.warning(None, "Warning 1");
        handler.error(None, "Error 2");

        assert_eq!(handler.error_count(), 2);
        assert_eq!(handler.warning_count(), 1);
        assert!(handler.has_errors());
        assert_eq!(handler.get_diagnostics().len(), 3);
        assert_eq!(handler.messages(DiagnosticLevel::Error), vec!["Error 1", "Error 2"]);
    }

    #[test]
    fn test_user_error_is_reported() {
        let handler = CollectingDiagnosticHandler::new();
        let err = user_error(&handler, None, "Missing entry class app.Main");

        assert!(err.is_user_error());
        assert_eq!(handler.messages(DiagnosticLevel::Error), vec!["Missing entry class app.Main"]);
    }

    #[test]
    fn test_no_errors() {
        let handler = CollectingDiagnosticHandler::new();
        handler.info(None, "just saying");

        assert!(!handler.has_errors());
        assert_eq!(handler.error_count(), 0);
        assert_eq!(handler.get_diagnostics().len(), 1);
    }
}
