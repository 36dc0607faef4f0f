//! Test compilation helpers for jjs
//!
//! Provides convenient functions for running typed programs through the
//! compiler in tests, using proper DI through the Container.

use crate::eval::{run_program, EvalError};
use jjs_core::compiler::{PermutationAst, PermutationResult};
use jjs_core::config::{CompilerConfig, CompilerOptions, ModuleDef, PermutationDef};
use jjs_core::di::Container;
use jjs_core::diagnostics::CollectingDiagnosticHandler;
use jjs_core::errors::{CompilationError, InternalCompilerError};
use jjs_core::jast::JProgram;
use jjs_core::rebind::StaticRebindOracle;
use std::sync::Arc;
use thiserror::Error;

/// Why a compile-and-run helper failed
#[derive(Debug, Error)]
pub enum RunError {
    #[error("compilation failed: {0}")]
    Compile(#[from] CompilationError),

    #[error("evaluation failed: {0}")]
    Eval(#[from] EvalError),
}

fn container(options: CompilerOptions, module: &ModuleDef) -> (Container, Arc<CollectingDiagnosticHandler>) {
    let handler = Arc::new(CollectingDiagnosticHandler::new());
    let config = CompilerConfig {
        compiler_options: options,
        module: module.clone(),
        permutations: Vec::new(),
    };
    (Container::with_dependencies(config, handler.clone()), handler)
}

/// Compile every permutation of `program`
///
/// # Arguments
/// * `program` - Typed program with the support library installed
/// * `module` - Module naming the entry classes
/// * `permutations` - Rebind answers per permutation; empty means one default permutation
/// * `options` - Compiler options
///
/// # Returns
/// One result per permutation and the handler that collected diagnostics
pub fn compile_permutations(
    program: JProgram,
    module: &ModuleDef,
    permutations: &[PermutationDef],
    options: CompilerOptions,
) -> (
    Result<Vec<Result<PermutationResult, CompilationError>>, CompilationError>,
    Arc<CollectingDiagnosticHandler>,
) {
    let (container, handler) = container(options, module);
    let result = container.compiler().compile(program, module, permutations);
    (result, handler)
}

/// Compile a single default permutation
///
/// # Arguments
/// * `program` - Typed program with the support library installed
/// * `module` - Module naming the entry classes
/// * `options` - Compiler options
///
/// # Returns
/// The permutation's output or the error that stopped compilation
pub fn compile_js(program: JProgram, module: &ModuleDef, options: CompilerOptions) -> Result<PermutationResult, CompilationError> {
    let (result, _) = compile_permutations(program, module, &[], options);
    result?
        .into_iter()
        .next()
        .unwrap_or_else(|| Err(InternalCompilerError::new("no permutation was compiled").into()))
}

/// Compile a single default permutation up to and including naming
///
/// Use this when a test needs to inspect or evaluate the output AST
/// rather than the emitted text.
pub fn compile_ast(program: JProgram, module: &ModuleDef, options: CompilerOptions) -> Result<PermutationAst, CompilationError> {
    let (container, _) = container(options, module);
    let compiler = container.compiler();
    let unified = compiler.precompile(program, module, &StaticRebindOracle::new())?;
    compiler.permutation_ast(&unified, &PermutationDef::default())
}

/// Compile `program` and run the output, returning the printed lines
pub fn compile_and_run(program: JProgram, module: &ModuleDef, options: CompilerOptions) -> Result<Vec<String>, RunError> {
    let ast = compile_ast(program, module, options)?;
    Ok(run_program(&ast.js)?)
}

/// Options with aggressive optimization toggled and readable output
pub fn readable_options(aggressive: bool) -> CompilerOptions {
    CompilerOptions {
        aggressively_optimize: aggressive,
        output: jjs_core::config::JsOutputOption::Pretty,
        ..CompilerOptions::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures;

    #[test]
    fn test_hello_prints() {
        let lines = compile_and_run(fixtures::hello_program(), &fixtures::main_module(), CompilerOptions::default()).unwrap();
        assert_eq!(lines, vec!["Hello, world"]);
    }

    #[test]
    fn test_compile_js_reports_missing_entry() {
        let error = compile_js(
            fixtures::hello_program(),
            &fixtures::missing_entry_module(),
            CompilerOptions::default(),
        )
        .unwrap_err();
        assert!(error.is_user_error());
    }
}
