//! Rebinds virtual calls to the most specific implementation visible from
//! the receiver's static type

use crate::errors::{CompilationError, VisitResult};
use crate::fixpoint::OptimizationPass;
use crate::jast::declarations::MethodId;
use crate::jast::expression::{JExpression, JExpressionKind};
use crate::jast::program::JProgram;
use crate::jast::type_oracle::TypeOracle;
use crate::jast::types::JType;
use crate::jast::visitor::{self, ExprContext, JModVisitor};

pub struct MethodCallTightener;

impl OptimizationPass<JProgram> for MethodCallTightener {
    fn name(&self) -> &'static str {
        "method-call-tightener"
    }

    fn run(&mut self, program: &mut JProgram) -> Result<bool, CompilationError> {
        Ok(tighten_method_calls(program)?)
    }
}

struct CallTightener<'a> {
    oracle: &'a TypeOracle,
    changed: bool,
}

impl CallTightener<'_> {
    fn most_specific(&self, program: &JProgram, receiver: &JType, target: MethodId) -> Option<MethodId> {
        let JType::Declared(class) = receiver else {
            return None;
        };
        let decl = &program.methods[target];
        if !decl.is_virtual() || *class == decl.enclosing_type || self.oracle.is_interface(*class) {
            return None;
        }
        if !self.oracle.is_subtype(*class, decl.enclosing_type) {
            return None;
        }
        let sig = self.oracle.signature(target)?;
        self.oracle
            .resolve(*class, sig)
            .filter(|found| *found != target)
    }
}

impl JModVisitor for CallTightener<'_> {
    fn end_visit_expr(&mut self, expr: &mut JExpression, ctx: &mut ExprContext<'_>) -> VisitResult {
        let JExpressionKind::MethodCall {
            instance: Some(instance),
            target,
            static_dispatch: false,
            ..
        } = &mut expr.kind
        else {
            return Ok(());
        };
        let receiver = instance.ty(ctx.program);
        if let Some(found) = self.most_specific(ctx.program, &receiver, *target) {
            tracing::trace!(
                from = %ctx.program.method_name(*target),
                to = %ctx.program.method_name(found),
                "tightened call"
            );
            *target = found;
            self.changed = true;
        }
        Ok(())
    }
}

pub fn tighten_method_calls(program: &mut JProgram) -> VisitResult<bool> {
    let oracle = TypeOracle::build(program);
    let mut tightener = CallTightener {
        oracle: &oracle,
        changed: false,
    };
    visitor::accept_program(&mut tightener, program)?;
    Ok(tightener.changed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::jast::declarations::MethodFlags;
    use crate::jast::statement::{JStatement, JStatementKind};
    use crate::source_info::SourceInfo;

    fn info() -> SourceInfo {
        SourceInfo::unknown()
    }

    #[test]
    fn test_call_retargets_to_receiver_override() {
        let mut program = JProgram::new(false);
        let base = program.create_class(info(), "Base", None, false, false);
        let base_m = program.create_method(info(), base, "m", JType::VOID, MethodFlags::instance());
        let leaf = program.create_class(info(), "Leaf", Some(base), false, false);
        let leaf_m = program.create_method(info(), leaf, "m", JType::VOID, MethodFlags::instance());
        let app = program.create_class(info(), "App", None, false, false);
        let main = program.create_method(info(), app, "main", JType::VOID, MethodFlags::static_method());
        let local = program.create_local(info(), main, "x", JType::Declared(leaf), false);
        program.set_body(
            main,
            vec![JStatement::expr(JExpression::call(
                info(),
                Some(JExpression::var_ref(info(), local)),
                base_m,
                vec![],
            ))],
        );

        assert!(tighten_method_calls(&mut program).unwrap());
        let stmts = program.methods[main].body.statements().unwrap();
        assert!(matches!(
            &stmts[0].kind,
            JStatementKind::Expression(e)
                if matches!(e.kind, JExpressionKind::MethodCall { target, .. } if target == leaf_m)
        ));
        assert!(!tighten_method_calls(&mut program).unwrap());
    }

    #[test]
    fn test_super_call_is_untouched() {
        let mut program = JProgram::new(false);
        let base = program.create_class(info(), "Base", None, false, false);
        let base_m = program.create_method(info(), base, "m", JType::VOID, MethodFlags::instance());
        let leaf = program.create_class(info(), "Leaf", Some(base), false, false);
        let leaf_m = program.create_method(info(), leaf, "m", JType::VOID, MethodFlags::instance());
        program.set_body(
            leaf_m,
            vec![JStatement::expr(JExpression::super_call(
                info(),
                JExpression::this(info(), leaf),
                base_m,
                vec![],
            ))],
        );

        assert!(!tighten_method_calls(&mut program).unwrap());
    }
}
