use crate::compiler::Phase;
use crate::source_info::SourceInfo;
use std::fmt;
use thiserror::Error;

/// Placeholder used when a node cannot be described while building a trace
pub const UNDESCRIBABLE_NODE: &str = "<unable to describe node>";

/// Errors surfaced by the compiler pipeline
#[derive(Debug, Error)]
pub enum CompilationError {
    /// A user/input error that has already been reported through the
    /// diagnostic handler
    #[error("unable to complete compilation: {message}")]
    UnableToComplete { message: String },

    #[error(transparent)]
    Internal(#[from] InternalCompilerError),

    #[error(transparent)]
    AstIo(#[from] AstIoError),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl CompilationError {
    pub fn unable_to_complete(message: impl Into<String>) -> Self {
        CompilationError::UnableToComplete {
            message: message.into(),
        }
    }

    pub fn is_internal(&self) -> bool {
        matches!(self, CompilationError::Internal(_))
    }

    pub fn is_user_error(&self) -> bool {
        matches!(self, CompilationError::UnableToComplete { .. })
    }
}

pub type Result<T> = std::result::Result<T, CompilationError>;

/// Result type of traversal hooks and walkers
pub type VisitResult<T = ()> = std::result::Result<T, InternalCompilerError>;

/// Serializing or deserializing a private AST copy failed
#[derive(Debug, Error)]
#[error("failed to {operation} AST copy: {source}")]
pub struct AstIoError {
    pub operation: &'static str,
    #[source]
    pub source: bincode::Error,
}

impl AstIoError {
    pub fn serialize(source: bincode::Error) -> Self {
        Self {
            operation: "serialize",
            source,
        }
    }

    pub fn deserialize(source: bincode::Error) -> Self {
        Self {
            operation: "deserialize",
            source,
        }
    }
}

/// One frame of the node trace, innermost first
#[derive(Debug, Clone)]
pub struct NodeTraceEntry {
    pub kind: String,
    pub description: String,
    pub source: Option<SourceInfo>,
}

impl fmt::Display for NodeTraceEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.kind, self.description)?;
        if let Some(source) = &self.source {
            write!(f, " at {}", source)?;
        }
        Ok(())
    }
}

/// An unexpected state inside the pipeline
#[derive(Debug, Clone)]
pub struct InternalCompilerError {
    message: String,
    phase: Option<Phase>,
    node_trace: Vec<NodeTraceEntry>,
}

impl InternalCompilerError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            phase: None,
            node_trace: Vec::new(),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn phase(&self) -> Option<Phase> {
        self.phase
    }

    pub fn node_trace(&self) -> &[NodeTraceEntry] {
        &self.node_trace
    }

    /// Tag the error with the phase it escaped from, keeping the innermost phase
    pub fn in_phase(mut self, phase: Phase) -> Self {
        if self.phase.is_none() {
            self.phase = Some(phase);
        }
        self
    }

    /// Append the node currently being processed to the trace.
    ///
    /// `describe` runs under a fresh [`TraceGuard`]; if it fails the
    /// placeholder description is used instead.
    pub fn add_node<F>(&mut self, kind: &str, source: Option<&SourceInfo>, describe: F)
    where
        F: FnOnce(&mut TraceGuard) -> VisitResult<String>,
    {
        let mut guard = TraceGuard::new();
        let description = guard.describe(describe);
        self.node_trace.push(NodeTraceEntry {
            kind: kind.to_string(),
            description,
            source: source.cloned(),
        });
    }

    /// Builder form of [`add_node`](Self::add_node)
    pub fn with_node<F>(mut self, kind: &str, source: Option<&SourceInfo>, describe: F) -> Self
    where
        F: FnOnce(&mut TraceGuard) -> VisitResult<String>,
    {
        self.add_node(kind, source, describe);
        self
    }
}

impl fmt::Display for InternalCompilerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "internal compiler error")?;
        if let Some(phase) = self.phase {
            write!(f, " during {}", phase)?;
        }
        write!(f, ": {}", self.message)?;
        for entry in &self.node_trace {
            write!(f, "\n  at {}", entry)?;
        }
        Ok(())
    }
}

impl std::error::Error for InternalCompilerError {}

/// Reentrancy guard for node descriptions.
///
/// A description requested while another one is in progress through the same
/// guard yields [`UNDESCRIBABLE_NODE`] instead of recursing.
#[derive(Debug, Default)]
pub struct TraceGuard {
    in_progress: bool,
}

impl TraceGuard {
    pub fn new() -> Self {
        Self { in_progress: false }
    }

    pub fn is_in_progress(&self) -> bool {
        self.in_progress
    }

    pub fn describe<F>(&mut self, describe: F) -> String
    where
        F: FnOnce(&mut TraceGuard) -> VisitResult<String>,
    {
        if self.in_progress {
            return UNDESCRIBABLE_NODE.to_string();
        }
        self.in_progress = true;
        let result = describe(self);
        self.in_progress = false;
        result.unwrap_or_else(|_| UNDESCRIBABLE_NODE.to_string())
    }
}
