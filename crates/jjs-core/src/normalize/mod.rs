//! Normalizations around the optimizer
//!
//! [`pre_normalize`] runs once before optimization. [`lower`] runs the
//! lowering passes once each, in this order; later passes rely on the
//! earlier ones having run:
//!
//! 1. [`Devirtualizer`]
//! 2. [`CatchBlockNormalizer`]
//! 3. [`CompoundAssignmentNormalizer`]
//! 4. [`LongEmulationNormalizer`] (no long compound assignments left)
//! 5. [`CastNormalizer`] (longs emulated; assigns query ids)
//! 6. [`ArrayNormalizer`] (query ids assigned)
//! 7. [`EqualityNormalizer`]
//! 8. a final prune without rescuing the runtime
//!
//! Rebind replacement lives here too but is driven per permutation by the
//! compiler.

pub mod arrays;
pub mod assertions;
pub mod casts;
pub mod catch_blocks;
pub mod compound_assignment;
pub mod devirtualizer;
pub mod equality;
pub mod long_emulation;
pub mod rebinds;

pub use arrays::ArrayNormalizer;
pub use assertions::{AssertionNormalizer, AssertionRemover};
pub use casts::CastNormalizer;
pub use catch_blocks::CatchBlockNormalizer;
pub use compound_assignment::CompoundAssignmentNormalizer;
pub use devirtualizer::Devirtualizer;
pub use equality::EqualityNormalizer;
pub use long_emulation::LongEmulationNormalizer;
pub use rebinds::{rescue_rebind_answers, ReplaceRebinds};

use crate::config::CompilerOptions;
use crate::diagnostics::DiagnosticHandler;
use crate::errors::{CompilationError, VisitResult};
use crate::fixpoint::FixpointDriver;
use crate::jast::program::JProgram;
use crate::optimizer::Pruner;
use std::sync::Arc;

/// Assertion handling, before the optimizer sees the program
pub fn pre_normalize(program: &mut JProgram, options: &CompilerOptions) -> VisitResult<bool> {
    if options.enable_assertions {
        AssertionNormalizer.run(program)
    } else {
        AssertionRemover.run(program)
    }
}

/// The lowering pass list in contract order
pub fn lowering(options: &CompilerOptions, handler: Arc<dyn DiagnosticHandler>) -> FixpointDriver<JProgram> {
    FixpointDriver::new("lower", 1, options.aggressively_optimize, handler)
        .with_pass(Devirtualizer)
        .with_pass(CatchBlockNormalizer)
        .with_pass(CompoundAssignmentNormalizer)
        .with_pass(LongEmulationNormalizer)
        .with_pass(CastNormalizer::new(options.cast_checking_disabled))
        .with_pass(ArrayNormalizer)
        .with_pass(EqualityNormalizer)
        .with_pass(Pruner::final_prune())
}

/// Run every lowering pass exactly once
pub fn lower(
    program: &mut JProgram,
    options: &CompilerOptions,
    handler: Arc<dyn DiagnosticHandler>,
) -> Result<bool, CompilationError> {
    let mut driver = lowering(options, handler);
    let changed = driver.sweep(program)?;
    tracing::debug!(
        changed,
        types = program.declared_types.len(),
        query_ids = program.query_ids.len(),
        "lowering finished"
    );
    Ok(changed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostics::CollectingDiagnosticHandler;

    #[test]
    fn test_lowering_order() {
        let handler = Arc::new(CollectingDiagnosticHandler::new());
        let driver = lowering(&CompilerOptions::default(), handler);
        assert_eq!(
            driver.pass_names(),
            vec![
                "devirtualizer",
                "catch-block-normalizer",
                "compound-assignment-normalizer",
                "long-emulation-normalizer",
                "cast-normalizer",
                "array-normalizer",
                "equality-normalizer",
                "final-pruner",
            ]
        );
    }
}
