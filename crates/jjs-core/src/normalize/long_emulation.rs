//! 64-bit integer arithmetic through the `LongLib` runtime class
//!
//! Every operator applied to `long` operands becomes a call such as
//! `LongLib.add(a, b)`. Values that flow into a `long` slot from a narrower
//! type get an explicit widening cast, which the cast normalizer later
//! resolves to `LongLib.fromInt`/`LongLib.fromDouble`. Integral constants
//! are widened in place.
//!
//! Compound assignments and increments on `long` must already have been
//! split up; meeting one here is an internal error.

use crate::errors::{CompilationError, InternalCompilerError, VisitResult};
use crate::fixpoint::OptimizationPass;
use crate::jast::declarations::MethodId;
use crate::jast::expression::{BinaryOp, JExpression, JExpressionKind, JLiteral, UnaryOp};
use crate::jast::program::JProgram;
use crate::jast::statement::{JStatement, JStatementKind};
use crate::jast::types::JType;
use crate::jast::visitor::{self, ExprContext, JModVisitor, StmtContext};

pub struct LongEmulationNormalizer;

impl OptimizationPass<JProgram> for LongEmulationNormalizer {
    fn name(&self) -> &'static str {
        "long-emulation-normalizer"
    }

    fn run(&mut self, program: &mut JProgram) -> Result<bool, CompilationError> {
        Ok(emulate_longs(program)?)
    }
}

/// Runtime helper implementing `op` on longs
fn helper_key(op: BinaryOp) -> Option<&'static str> {
    Some(match op {
        BinaryOp::Add => "LongLib.add",
        BinaryOp::Sub => "LongLib.sub",
        BinaryOp::Mul => "LongLib.mul",
        BinaryOp::Div => "LongLib.div",
        BinaryOp::Mod => "LongLib.mod",
        BinaryOp::BitAnd => "LongLib.and",
        BinaryOp::BitOr => "LongLib.or",
        BinaryOp::BitXor => "LongLib.xor",
        BinaryOp::Shl => "LongLib.shl",
        BinaryOp::Shr => "LongLib.shr",
        BinaryOp::Shru => "LongLib.shru",
        BinaryOp::Eq => "LongLib.eq",
        BinaryOp::Neq => "LongLib.neq",
        BinaryOp::Lt => "LongLib.lt",
        BinaryOp::Le => "LongLib.lte",
        BinaryOp::Gt => "LongLib.gt",
        BinaryOp::Ge => "LongLib.gte",
        _ => return None,
    })
}

/// `expr` as a long-typed expression
fn widen(program: &JProgram, expr: JExpression) -> JExpression {
    if expr.ty(program).is_long() {
        return expr;
    }
    match expr.as_literal().and_then(JLiteral::as_i64) {
        Some(value) => JExpression::long_lit(expr.info, value),
        None => {
            let info = expr.info.clone();
            JExpression::cast(info, JType::LONG, expr)
        }
    }
}

fn take(slot: &mut JExpression) -> JExpression {
    let info = slot.info.clone();
    std::mem::replace(slot, JExpression::null_lit(info))
}

/// Widen `slot` in place when it is not already a long; reports a change
fn widen_slot(program: &JProgram, slot: &mut JExpression) -> bool {
    if slot.ty(program).is_long() {
        return false;
    }
    let value = take(slot);
    *slot = widen(program, value);
    true
}

struct LongRewriter {
    changed: bool,
}

impl LongRewriter {
    fn widen_args(&mut self, program: &JProgram, params: &[JType], args: &mut [JExpression]) {
        for (param, arg) in params.iter().zip(args.iter_mut()) {
            if param.is_long() {
                self.changed |= widen_slot(program, arg);
            }
        }
    }

    fn param_types(program: &JProgram, method: MethodId) -> Vec<JType> {
        program.methods[method]
            .params
            .iter()
            .map(|p| program.variables[*p].ty.clone())
            .collect()
    }

    fn rewrite_binary(
        &mut self,
        expr: &mut JExpression,
        ctx: &mut ExprContext<'_>,
    ) -> VisitResult {
        let program = &*ctx.program;
        let JExpressionKind::Binary { op, lhs, rhs, ty } = &mut expr.kind else {
            return Ok(());
        };
        let lhs_ty = lhs.ty(program);
        let rhs_ty = rhs.ty(program);
        let op = *op;

        if op.is_compound_assignment() && (ty.is_long() || lhs_ty.is_long()) {
            return Err(InternalCompilerError::new(
                "long compound assignment must be split before long emulation",
            ));
        }
        if op == BinaryOp::Assign {
            if lhs_ty.is_long() {
                self.changed |= widen_slot(program, rhs);
            }
            return Ok(());
        }
        if matches!(op, BinaryOp::RefEq | BinaryOp::RefNeq) {
            return Ok(());
        }

        let args = if op.is_shift() {
            if !lhs_ty.is_long() {
                return Ok(());
            }
            let count = take(rhs);
            let count = if rhs_ty.is_long() {
                let to_int = program.indexed_method("LongLib.toInt")?;
                JExpression::static_call(count.info.clone(), to_int, vec![count])
            } else {
                count
            };
            vec![take(lhs), count]
        } else if op.is_comparison() {
            if !JType::binary_promotion(&lhs_ty, &rhs_ty).is_long() {
                return Ok(());
            }
            vec![widen(program, take(lhs)), widen(program, take(rhs))]
        } else {
            if !ty.is_long() {
                return Ok(());
            }
            vec![widen(program, take(lhs)), widen(program, take(rhs))]
        };
        let Some(key) = helper_key(op) else {
            return Err(InternalCompilerError::new(format!(
                "no long helper for operator '{}'",
                op.symbol()
            )));
        };
        let helper = program.indexed_method(key)?;
        let call = JExpression::static_call(expr.info.clone(), helper, args);
        tracing::trace!(helper = key, "emulated long operation");
        ctx.replace_me(call);
        self.changed = true;
        Ok(())
    }
}

impl JModVisitor for LongRewriter {
    fn end_visit_stmt(&mut self, stmt: &mut JStatement, ctx: &mut StmtContext<'_>) -> VisitResult {
        let program = &*ctx.program;
        match &mut stmt.kind {
            JStatementKind::LocalDecl { var, init: Some(init) } => {
                if program.variables[*var].ty.is_long() {
                    self.changed |= widen_slot(program, init);
                }
            }
            JStatementKind::Return(Some(value)) => {
                let returns_long = ctx
                    .method
                    .is_some_and(|m| program.methods[m].return_type.is_long());
                if returns_long {
                    self.changed |= widen_slot(program, value);
                }
            }
            _ => {}
        }
        Ok(())
    }

    fn end_visit_expr(&mut self, expr: &mut JExpression, ctx: &mut ExprContext<'_>) -> VisitResult {
        if matches!(expr.kind, JExpressionKind::Binary { .. }) {
            return self.rewrite_binary(expr, ctx);
        }
        let program = &*ctx.program;
        match &mut expr.kind {
            JExpressionKind::Unary { op, arg } => {
                if !arg.ty(program).is_long() {
                    return Ok(());
                }
                let key = match op {
                    UnaryOp::Neg => "LongLib.neg",
                    UnaryOp::BitNot => "LongLib.not",
                    UnaryOp::Not => return Ok(()),
                    _ => {
                        return Err(InternalCompilerError::new(
                            "long increment must be split before long emulation",
                        ))
                    }
                };
                let helper = program.indexed_method(key)?;
                let call = JExpression::static_call(expr.info.clone(), helper, vec![take(arg)]);
                ctx.replace_me(call);
                self.changed = true;
            }
            JExpressionKind::MethodCall { target, args, .. } => {
                let params = Self::param_types(program, *target);
                self.widen_args(program, &params, args);
            }
            JExpressionKind::NewInstance { ctor, args, .. } => {
                let params = Self::param_types(program, *ctor);
                self.widen_args(program, &params, args);
            }
            JExpressionKind::NewArray {
                ty,
                initializers: Some(inits),
                ..
            } => {
                if ty.element_type().is_some_and(JType::is_long) {
                    for init in inits {
                        self.changed |= widen_slot(program, init);
                    }
                }
            }
            JExpressionKind::Conditional {
                then_expr,
                else_expr,
                ty,
                ..
            } => {
                if ty.is_long() {
                    self.changed |= widen_slot(program, then_expr);
                    self.changed |= widen_slot(program, else_expr);
                }
            }
            _ => {}
        }
        Ok(())
    }
}

pub fn emulate_longs(program: &mut JProgram) -> VisitResult<bool> {
    let mut rewriter = LongRewriter { changed: false };
    visitor::accept_program(&mut rewriter, program)?;
    Ok(rewriter.changed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::jast::declarations::MethodFlags;
    use crate::jast::runtime;
    use crate::source_info::SourceInfo;

    fn info() -> SourceInfo {
        SourceInfo::unknown()
    }

    fn setup() -> (JProgram, MethodId) {
        let mut program = JProgram::new(false);
        runtime::install(&mut program);
        let object = program.indexed_type("Object").unwrap();
        let app = program.create_class(info(), "app.Main", Some(object), false, false);
        let main = program.create_method(info(), app, "main", JType::LONG, MethodFlags::static_method());
        (program, main)
    }

    fn returned(program: &JProgram, method: MethodId) -> &JExpression {
        let stmts = program.methods[method].body.statements().unwrap();
        match &stmts.last().unwrap().kind {
            JStatementKind::Return(Some(e)) => e,
            other => panic!("expected return, got {:?}", other),
        }
    }

    #[test]
    fn test_mixed_addition_calls_helper_with_widened_operand() {
        let (mut program, main) = setup();
        let a = program.create_param(info(), main, "a", JType::LONG, false);
        let i = program.create_param(info(), main, "i", JType::INT, false);
        program.set_body(
            main,
            vec![JStatement::return_stmt(
                info(),
                Some(JExpression::binary(
                    info(),
                    BinaryOp::Add,
                    JExpression::var_ref(info(), a),
                    JExpression::var_ref(info(), i),
                    JType::LONG,
                )),
            )],
        );

        assert!(emulate_longs(&mut program).unwrap());
        let add = program.indexed_method("LongLib.add").unwrap();
        let JExpressionKind::MethodCall { target, args, .. } = &returned(&program, main).kind else {
            panic!("expected helper call");
        };
        assert_eq!(*target, add);
        assert!(matches!(&args[1].kind, JExpressionKind::Cast { ty, .. } if ty.is_long()));
        assert!(!emulate_longs(&mut program).unwrap());
    }

    #[test]
    fn test_int_constant_widens_in_place() {
        let (mut program, main) = setup();
        program.set_body(
            main,
            vec![JStatement::return_stmt(info(), Some(JExpression::int_lit(info(), -3)))],
        );

        assert!(emulate_longs(&mut program).unwrap());
        assert!(matches!(
            returned(&program, main).as_literal(),
            Some(JLiteral::Long(-3))
        ));
    }

    #[test]
    fn test_comparison_uses_helper() {
        let (mut program, main) = setup();
        program.methods[main].return_type = JType::BOOLEAN;
        let a = program.create_param(info(), main, "a", JType::LONG, false);
        program.set_body(
            main,
            vec![JStatement::return_stmt(
                info(),
                Some(JExpression::binary(
                    info(),
                    BinaryOp::Lt,
                    JExpression::var_ref(info(), a),
                    JExpression::int_lit(info(), 10),
                    JType::BOOLEAN,
                )),
            )],
        );

        emulate_longs(&mut program).unwrap();
        let lt = program.indexed_method("LongLib.lt").unwrap();
        let JExpressionKind::MethodCall { target, args, .. } = &returned(&program, main).kind else {
            panic!("expected helper call");
        };
        assert_eq!(*target, lt);
        assert!(matches!(args[1].as_literal(), Some(JLiteral::Long(10))));
    }

    #[test]
    fn test_surviving_compound_assignment_is_internal_error() {
        let (mut program, main) = setup();
        let a = program.create_local(info(), main, "a", JType::LONG, false);
        program.set_body(
            main,
            vec![JStatement::expr(JExpression::binary(
                info(),
                BinaryOp::AsgAdd,
                JExpression::var_ref(info(), a),
                JExpression::long_lit(info(), 1),
                JType::LONG,
            ))],
        );
        assert!(emulate_longs(&mut program).is_err());
    }
}
