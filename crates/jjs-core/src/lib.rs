//! Whole-program optimizing compiler from a typed Java-like AST to JavaScript
//!
//! The pipeline for one permutation is
//! pre-normalization, an optimization fixpoint over the typed AST, the
//! lowering normalizations, code generation, an optimization fixpoint over
//! the JavaScript AST, naming and finally source emission. See
//! [`compiler::JavaToJavaScriptCompiler`] for the driver.

pub mod arena;
pub mod codegen;
pub mod compiler;
pub mod config;
pub mod di;
pub mod diagnostics;
pub mod errors;
pub mod fixpoint;
pub mod jast;
pub mod js;
pub mod normalize;
pub mod optimizer;
pub mod rebind;
pub mod report;
pub mod source_info;
pub mod symbol_map;
pub mod unified_ast;

pub use arena::{Arena, Id};
pub use compiler::{JavaToJavaScriptCompiler, PermutationAst, PermutationResult, Phase};
pub use config::{CliOverrides, CompilerConfig, CompilerOptions, JsOutputOption, ModuleDef, PermutationDef};
pub use di::Container;
pub use diagnostics::{
    CollectingDiagnosticHandler, ConsoleDiagnosticHandler, Diagnostic, DiagnosticHandler, DiagnosticLevel,
};
pub use errors::{AstIoError, CompilationError, InternalCompilerError, NodeTraceEntry};
pub use fixpoint::{FixpointDriver, OptimizationPass};
pub use jast::JProgram;
pub use js::JsProgram;
pub use rebind::{RebindOracle, StaticRebindOracle};
pub use source_info::{CorrelationFactory, SourceInfo};
pub use unified_ast::{AstBundle, UnifiedAst};
