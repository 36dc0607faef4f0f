//! Reference comparisons become strict `===`/`!==`, except comparisons
//! against the `null` literal, which keep `==` so that `undefined` matches.

use crate::errors::{CompilationError, VisitResult};
use crate::fixpoint::OptimizationPass;
use crate::jast::expression::{BinaryOp, JExpression, JExpressionKind};
use crate::jast::program::JProgram;
use crate::jast::visitor::{self, ExprContext, JModVisitor};

pub struct EqualityNormalizer;

impl OptimizationPass<JProgram> for EqualityNormalizer {
    fn name(&self) -> &'static str {
        "equality-normalizer"
    }

    fn run(&mut self, program: &mut JProgram) -> Result<bool, CompilationError> {
        Ok(normalize_equality(program)?)
    }
}

struct EqualityRewriter {
    changed: bool,
}

impl JModVisitor for EqualityRewriter {
    fn end_visit_expr(&mut self, expr: &mut JExpression, ctx: &mut ExprContext<'_>) -> VisitResult {
        let JExpressionKind::Binary { op, lhs, rhs, .. } = &mut expr.kind else {
            return Ok(());
        };
        let strict = match op {
            BinaryOp::Eq => BinaryOp::RefEq,
            BinaryOp::Neq => BinaryOp::RefNeq,
            _ => return Ok(()),
        };
        if lhs.is_null_literal() || rhs.is_null_literal() {
            return Ok(());
        }
        let program = &*ctx.program;
        if lhs.ty(program).is_reference() && rhs.ty(program).is_reference() {
            *op = strict;
            self.changed = true;
        }
        Ok(())
    }
}

pub fn normalize_equality(program: &mut JProgram) -> VisitResult<bool> {
    let mut rewriter = EqualityRewriter { changed: false };
    visitor::accept_program(&mut rewriter, program)?;
    Ok(rewriter.changed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::jast::declarations::{MethodFlags, MethodId};
    use crate::jast::runtime;
    use crate::jast::statement::{JStatement, JStatementKind};
    use crate::jast::types::JType;
    use crate::source_info::SourceInfo;

    fn info() -> SourceInfo {
        SourceInfo::unknown()
    }

    fn compare(program: &mut JProgram, main: MethodId, lhs: JExpression, rhs: JExpression) -> BinaryOp {
        program.set_body(
            main,
            vec![JStatement::return_stmt(
                info(),
                Some(JExpression::binary(info(), BinaryOp::Eq, lhs, rhs, JType::BOOLEAN)),
            )],
        );
        normalize_equality(program).unwrap();
        let stmts = program.methods[main].body.statements().unwrap();
        match &stmts[0].kind {
            JStatementKind::Return(Some(JExpression {
                kind: JExpressionKind::Binary { op, .. },
                ..
            })) => *op,
            other => panic!("expected comparison, got {:?}", other),
        }
    }

    #[test]
    fn test_reference_equality_becomes_strict_except_null() {
        let mut program = JProgram::new(false);
        runtime::install(&mut program);
        let object = program.indexed_type("Object").unwrap();
        let app = program.create_class(info(), "app.Main", Some(object), false, false);
        let main = program.create_method(info(), app, "main", JType::BOOLEAN, MethodFlags::static_method());
        let a = program.create_param(info(), main, "a", JType::Declared(app), false);
        let b = program.create_param(info(), main, "b", JType::Declared(app), false);
        let i = program.create_param(info(), main, "i", JType::INT, false);

        let v = |var| JExpression::var_ref(info(), var);
        assert_eq!(compare(&mut program, main, v(a), v(b)), BinaryOp::RefEq);
        assert_eq!(compare(&mut program, main, v(a), JExpression::null_lit(info())), BinaryOp::Eq);
        assert_eq!(compare(&mut program, main, v(i), JExpression::int_lit(info(), 1)), BinaryOp::Eq);
    }
}
