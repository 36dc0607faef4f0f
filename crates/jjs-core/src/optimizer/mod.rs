//! Whole-program optimization of the typed AST
//!
//! [`optimize`] drives the pass list below to a fixpoint. Passes run in
//! this order on every sweep:
//!
//! 1. [`Pruner`] removes everything unreachable from the entry points
//! 2. [`Finalizer`] marks members that are never overridden or reassigned
//! 3. [`MakeCallsStatic`] turns monomorphic instance calls into static calls
//! 4. [`TypeTightener`] narrows declared types to the types that flow in
//! 5. [`MethodCallTightener`] retargets virtual calls to the narrowest override
//! 6. [`DeadCodeElimination`] folds constants and removes dead statements
//! 7. [`MethodInliner`] inlines small static methods (aggressive only)
//! 8. [`EnumOrdinalizer`] replaces enums that never need objects with ints

pub mod control_flow;
pub mod dead_code;
pub mod enum_ordinalizer;
pub mod finalizer;
pub mod make_calls_static;
pub mod method_call_tightener;
pub mod method_inliner;
pub mod pruner;
pub mod type_tightener;

pub use control_flow::{compute_reachability, Reachability};
pub use dead_code::DeadCodeElimination;
pub use enum_ordinalizer::EnumOrdinalizer;
pub use finalizer::Finalizer;
pub use make_calls_static::MakeCallsStatic;
pub use method_call_tightener::MethodCallTightener;
pub use method_inliner::MethodInliner;
pub use pruner::Pruner;
pub use type_tightener::TypeTightener;

use crate::config::CompilerOptions;
use crate::diagnostics::DiagnosticHandler;
use crate::errors::CompilationError;
use crate::fixpoint::{FixpointDriver, FixpointOutcome};
use crate::jast::program::JProgram;
use std::sync::Arc;

/// The optimization pass list in its fixed order
pub fn optimizer(options: &CompilerOptions, handler: Arc<dyn DiagnosticHandler>) -> FixpointDriver<JProgram> {
    FixpointDriver::new(
        "optimize",
        options.max_fixpoint_iterations,
        options.aggressively_optimize,
        handler,
    )
    .with_pass(Pruner::new())
    .with_pass(Finalizer)
    .with_pass(MakeCallsStatic)
    .with_pass(TypeTightener)
    .with_pass(MethodCallTightener)
    .with_pass(DeadCodeElimination)
    .with_pass(MethodInliner)
    .with_pass(EnumOrdinalizer)
}

/// Optimize `program` until no pass finds anything left to do
pub fn optimize(
    program: &mut JProgram,
    options: &CompilerOptions,
    handler: Arc<dyn DiagnosticHandler>,
) -> Result<FixpointOutcome, CompilationError> {
    let mut driver = optimizer(options, handler);
    let outcome = driver.run(program)?;
    tracing::debug!(
        iterations = outcome.iterations,
        converged = outcome.converged,
        types = program.declared_types.len(),
        "optimization finished"
    );
    Ok(outcome)
}
