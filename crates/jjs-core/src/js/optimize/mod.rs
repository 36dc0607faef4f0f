//! Optimization of the generated JavaScript
//!
//! [`js_optimizer`] runs, in order on every sweep: static evaluation,
//! function inlining (aggressive only), unused function removal and
//! duplicate function removal. The literal interner is not part of the
//! fixpoint; it runs once right before naming.

pub mod duplicate_functions;
pub mod inliner;
pub mod literal_interner;
pub mod static_eval;
pub mod unused_functions;

pub use duplicate_functions::{remove_duplicate_functions, JsDuplicateFunctionRemover};
pub use inliner::{inline_functions, JsInliner};
pub use literal_interner::intern_literals;
pub use static_eval::{static_eval, JsStaticEval};
pub use unused_functions::{remove_unused_functions, JsUnusedFunctionRemover};

use crate::config::CompilerOptions;
use crate::diagnostics::DiagnosticHandler;
use crate::errors::CompilationError;
use crate::fixpoint::{FixpointDriver, FixpointOutcome};
use crate::js::ast::JsProgram;
use std::sync::Arc;

pub fn js_optimizer(options: &CompilerOptions, handler: Arc<dyn DiagnosticHandler>) -> FixpointDriver<JsProgram> {
    FixpointDriver::new(
        "js-optimize",
        options.max_fixpoint_iterations,
        options.aggressively_optimize,
        handler,
    )
    .with_pass(JsStaticEval)
    .with_pass(JsInliner)
    .with_pass(JsUnusedFunctionRemover)
    .with_pass(JsDuplicateFunctionRemover)
}

pub fn optimize(
    program: &mut JsProgram,
    options: &CompilerOptions,
    handler: Arc<dyn DiagnosticHandler>,
) -> Result<FixpointOutcome, CompilationError> {
    let outcome = js_optimizer(options, handler).run(program)?;
    tracing::debug!(
        iterations = outcome.iterations,
        converged = outcome.converged,
        statements = program.global_block.len(),
        "js optimization finished"
    );
    Ok(outcome)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostics::CollectingDiagnosticHandler;
    use crate::js::ast::{JsExpression, JsFunction, JsStatement, JsStatementKind};
    use crate::js::scope::{ScopeKind, StaticRef};
    use crate::js::source_gen::{to_source, TextOutput};
    use crate::source_info::SourceInfo;

    #[test]
    fn test_pass_order() {
        let handler = Arc::new(CollectingDiagnosticHandler::new());
        let options = CompilerOptions::default();
        assert_eq!(
            js_optimizer(&options, handler.clone()).pass_names(),
            vec![
                "js-static-eval",
                "js-inliner",
                "js-unused-function-remover",
                "js-duplicate-function-remover",
            ]
        );
        let cautious = CompilerOptions {
            aggressively_optimize: false,
            ..CompilerOptions::default()
        };
        assert!(!js_optimizer(&cautious, handler).pass_names().contains(&"js-inliner"));
    }

    #[test]
    fn test_folded_branch_leaves_function_unused() {
        // function helper(){} if (false) helper();
        let info = SourceInfo::unknown;
        let mut program = JsProgram::new();
        let top = program.top_scope;
        let helper = program.fresh_name(top, "helper", "helper");
        program.set_static_ref(helper, StaticRef::Function);
        let scope = program.new_scope(top, ScopeKind::Function, "helper");
        program.global_block.push(JsStatement::new(
            info(),
            JsStatementKind::Function(JsFunction {
                info: info(),
                name: Some(helper),
                params: vec![],
                body: vec![],
                scope,
            }),
        ));
        program.global_block.push(JsStatement::new(
            info(),
            JsStatementKind::If {
                cond: JsExpression::boolean(info(), false),
                then_stmt: Box::new(
                    JsExpression::invoke(info(), JsExpression::name_ref(info(), helper), vec![]).make_stmt(),
                ),
                else_stmt: None,
            },
        ));

        let handler = Arc::new(CollectingDiagnosticHandler::new());
        let outcome = optimize(&mut program, &CompilerOptions::default(), handler).unwrap();
        assert!(outcome.converged);
        assert!(outcome.changed);
        assert_eq!(to_source(&program, TextOutput::Minified), "");
    }
}
