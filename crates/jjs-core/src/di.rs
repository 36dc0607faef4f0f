use crate::compiler::JavaToJavaScriptCompiler;
use crate::config::CompilerConfig;
use crate::diagnostics::{ConsoleDiagnosticHandler, DiagnosticHandler};
use std::sync::Arc;

/// Dependency injection container
/// Owns the configuration and the diagnostic sink and wires them into compilers
pub struct Container {
    config: Arc<CompilerConfig>,
    diagnostic_handler: Arc<dyn DiagnosticHandler>,
}

impl Container {
    /// Create a new container with production dependencies
    pub fn new(config: CompilerConfig) -> Self {
        Container {
            config: Arc::new(config),
            diagnostic_handler: Arc::new(ConsoleDiagnosticHandler::new(false)),
        }
    }

    /// Create a container with a custom diagnostic handler (for testing)
    pub fn with_dependencies(config: CompilerConfig, diagnostic_handler: Arc<dyn DiagnosticHandler>) -> Self {
        Container {
            config: Arc::new(config),
            diagnostic_handler,
        }
    }

    pub fn config(&self) -> &Arc<CompilerConfig> {
        &self.config
    }

    pub fn diagnostic_handler(&self) -> &Arc<dyn DiagnosticHandler> {
        &self.diagnostic_handler
    }

    /// A compiler configured with this container's options and handler
    pub fn compiler(&self) -> JavaToJavaScriptCompiler {
        JavaToJavaScriptCompiler::new(
            self.config.compiler_options.clone(),
            Arc::clone(&self.diagnostic_handler),
        )
    }

    pub fn has_errors(&self) -> bool {
        self.diagnostic_handler.has_errors()
    }

    pub fn error_count(&self) -> usize {
        self.diagnostic_handler.error_count()
    }

    pub fn warning_count(&self) -> usize {
        self.diagnostic_handler.warning_count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::JsOutputOption;
    use crate::diagnostics::CollectingDiagnosticHandler;

    #[test]
    fn test_container_creation() {
        let container = Container::new(CompilerConfig::default());

        assert_eq!(container.error_count(), 0);
        assert!(!container.has_errors());
    }

    #[test]
    fn test_container_with_collecting_handler() {
        let diagnostics = Arc::new(CollectingDiagnosticHandler::new());
        let container = Container::with_dependencies(CompilerConfig::default(), diagnostics.clone());

        container.diagnostic_handler().error(None, "Test error");

        assert!(container.has_errors());
        assert_eq!(diagnostics.error_count(), 1);
    }

    #[test]
    fn test_compiler_receives_options() {
        let mut config = CompilerConfig::default();
        config.compiler_options.output = JsOutputOption::Pretty;

        let container = Container::new(config);
        assert_eq!(container.compiler().options().output, JsOutputOption::Pretty);
    }
}
