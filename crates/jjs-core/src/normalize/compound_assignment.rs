//! Splits compound assignments and increments whose JavaScript counterpart
//! would compute the wrong value
//!
//! `long` and `byte`/`short`/`char` targets, and integral division, are
//! rewritten as plain assignments so that later passes can insert the
//! library calls and narrowing casts:
//!
//! ```text
//! b += x      =>  b = (byte) (b + x)
//! a[f()] /= 2 =>  ($t = f(), a[$t] = a[$t] / 2)
//! c++         =>  ($t = c, c = (char) ($t + 1), $t)
//! ```

use crate::errors::{CompilationError, InternalCompilerError, VisitResult};
use crate::fixpoint::OptimizationPass;
use crate::jast::declarations::MethodId;
use crate::jast::expression::{BinaryOp, JExpression, JExpressionKind, UnaryOp};
use crate::jast::program::JProgram;
use crate::jast::statement::{JStatement, JStatementKind};
use crate::jast::types::{JType, PrimitiveType};
use crate::jast::visitor::{self, ExprContext, JModVisitor, StmtContext};
use crate::source_info::SourceInfo;

pub struct CompoundAssignmentNormalizer;

impl OptimizationPass<JProgram> for CompoundAssignmentNormalizer {
    fn name(&self) -> &'static str {
        "compound-assignment-normalizer"
    }

    fn run(&mut self, program: &mut JProgram) -> Result<bool, CompilationError> {
        Ok(normalize_compound_assignments(program)?)
    }
}

/// Whether an update of a `target`-typed location with `op` must be split
fn needs_break_up(op: BinaryOp, target: &JType) -> bool {
    match target.primitive() {
        Some(PrimitiveType::Long) => true,
        Some(p) if p.is_narrow_integral() => true,
        Some(p) if p.is_integral() => op == BinaryOp::Div,
        _ => false,
    }
}

fn one(info: &SourceInfo, ty: &JType) -> JExpression {
    if ty.is_long() {
        JExpression::long_lit(info.clone(), 1)
    } else if ty.is_floating() {
        JExpression::double_lit(info.clone(), 1.0)
    } else {
        JExpression::int_lit(info.clone(), 1)
    }
}

/// Temporaries and assignments that evaluate an lvalue's subexpressions once
struct Stabilizer<'p> {
    program: &'p mut JProgram,
    method: MethodId,
    info: SourceInfo,
    setup: Vec<JExpression>,
}

impl Stabilizer<'_> {
    fn temp(&mut self, value: JExpression) -> JExpression {
        let ty = value.ty(self.program);
        let temp = self.program.create_local(self.info.clone(), self.method, "$t", ty.clone(), false);
        let info = value.info.clone();
        self.setup.push(JExpression::assign(
            info.clone(),
            JExpression::var_ref(info.clone(), temp),
            value,
            ty,
        ));
        JExpression::var_ref(info, temp)
    }

    fn stable(&mut self, expr: JExpression) -> JExpression {
        if expr.is_stable() {
            expr
        } else {
            self.temp(expr)
        }
    }

    /// A copy of `lvalue` whose subexpressions can be evaluated twice
    fn lvalue(&mut self, lvalue: JExpression) -> VisitResult<JExpression> {
        let info = lvalue.info;
        let kind = match lvalue.kind {
            JExpressionKind::VariableRef(var) => JExpressionKind::VariableRef(var),
            JExpressionKind::FieldRef { instance, field } => JExpressionKind::FieldRef {
                instance: instance.map(|i| Box::new(self.stable(*i))),
                field,
            },
            JExpressionKind::ArrayRef { array, index } => {
                let array = self.stable(*array);
                let index = self.stable(*index);
                JExpressionKind::ArrayRef {
                    array: Box::new(array),
                    index: Box::new(index),
                }
            }
            _ => {
                return Err(InternalCompilerError::new("unexpected assignment target"));
            }
        };
        Ok(JExpression::new(info, kind))
    }

    fn finish(self, result: JExpression) -> JExpression {
        if self.setup.is_empty() {
            return result;
        }
        let info = result.info.clone();
        let mut exprs = self.setup;
        exprs.push(result);
        JExpression::multi(info, exprs)
    }
}

/// `target = (T) (read op rhs)`
fn compute(
    info: &SourceInfo,
    op: BinaryOp,
    read: JExpression,
    rhs: JExpression,
    target_ty: &JType,
    rhs_ty: &JType,
) -> JExpression {
    let result_ty = if op.is_shift() {
        target_ty.unary_promotion()
    } else {
        JType::binary_promotion(target_ty, rhs_ty)
    };
    let value = JExpression::binary(info.clone(), op, read, rhs, result_ty.clone());
    if result_ty == *target_ty {
        value
    } else {
        JExpression::cast(info.clone(), target_ty.clone(), value)
    }
}

struct CompoundSplitter {
    changed: bool,
}

impl CompoundSplitter {
    fn method(ctx: &ExprContext<'_>) -> VisitResult<MethodId> {
        ctx.method
            .ok_or_else(|| InternalCompilerError::new("assignment outside of a method body"))
    }

    fn split_binary(
        ctx: &mut ExprContext<'_>,
        info: SourceInfo,
        op: BinaryOp,
        lhs: JExpression,
        rhs: JExpression,
        ty: JType,
    ) -> VisitResult<JExpression> {
        let method = Self::method(ctx)?;
        let rhs_ty = rhs.ty(ctx.program);
        let mut stabilizer = Stabilizer {
            program: &mut *ctx.program,
            method,
            info: info.clone(),
            setup: Vec::new(),
        };
        let target = stabilizer.lvalue(lhs)?;
        let value = compute(&info, op, target.clone(), rhs, &ty, &rhs_ty);
        Ok(stabilizer.finish(JExpression::assign(info, target, value, ty)))
    }

    fn split_unary(
        ctx: &mut ExprContext<'_>,
        info: SourceInfo,
        op: UnaryOp,
        arg: JExpression,
    ) -> VisitResult<JExpression> {
        let method = Self::method(ctx)?;
        let ty = arg.ty(ctx.program);
        let bin_op = if op.is_increment() {
            BinaryOp::Add
        } else {
            BinaryOp::Sub
        };
        let mut stabilizer = Stabilizer {
            program: &mut *ctx.program,
            method,
            info: info.clone(),
            setup: Vec::new(),
        };
        let target = stabilizer.lvalue(arg)?;
        let delta = one(&info, &ty);
        let delta_ty = delta.ty(stabilizer.program);
        if !op.is_postfix() {
            let value = compute(&info, bin_op, target.clone(), delta, &ty, &delta_ty);
            return Ok(stabilizer.finish(JExpression::assign(info, target, value, ty)));
        }

        let old = stabilizer.temp(target.clone());
        let value = compute(&info, bin_op, old.clone(), delta, &ty, &delta_ty);
        stabilizer
            .setup
            .push(JExpression::assign(info.clone(), target, value, ty));
        Ok(stabilizer.finish(old))
    }
}

/// A postfix update whose value is discarded behaves like the prefix form
fn discard_postfix(expr: &mut JExpression, program: &JProgram) {
    if let JExpressionKind::Unary { op, arg } = &mut expr.kind {
        if op.is_postfix() && needs_break_up(BinaryOp::Add, &arg.ty(program)) {
            *op = if op.is_increment() {
                UnaryOp::PreInc
            } else {
                UnaryOp::PreDec
            };
        }
    }
}

impl JModVisitor for CompoundSplitter {
    fn visit_stmt(&mut self, stmt: &mut JStatement, ctx: &mut StmtContext<'_>) -> VisitResult<bool> {
        match &mut stmt.kind {
            JStatementKind::Expression(expr) => discard_postfix(expr, ctx.program),
            JStatementKind::For { increments, .. } => {
                for inc in increments {
                    discard_postfix(inc, ctx.program);
                }
            }
            _ => {}
        }
        Ok(true)
    }

    fn end_visit_expr(&mut self, expr: &mut JExpression, ctx: &mut ExprContext<'_>) -> VisitResult {
        let info = expr.info.clone();
        let placeholder = || JExpression::null_lit(SourceInfo::unknown());
        match &mut expr.kind {
            JExpressionKind::Binary { op, lhs, rhs, ty } => {
                let Some(plain) = op.non_assignment_of() else {
                    return Ok(());
                };
                if !needs_break_up(plain, ty) {
                    return Ok(());
                }
                let lhs = std::mem::replace(lhs.as_mut(), placeholder());
                let rhs = std::mem::replace(rhs.as_mut(), placeholder());
                let ty = ty.clone();
                let replacement = Self::split_binary(ctx, info, plain, lhs, rhs, ty)?;
                ctx.replace_me(replacement);
            }
            JExpressionKind::Unary { op, arg } if op.is_modifying() => {
                let arg_ty = arg.ty(ctx.program);
                if !needs_break_up(BinaryOp::Add, &arg_ty) {
                    return Ok(());
                }
                let op = *op;
                let arg = std::mem::replace(arg.as_mut(), placeholder());
                let replacement = Self::split_unary(ctx, info, op, arg)?;
                ctx.replace_me(replacement);
            }
            _ => return Ok(()),
        }
        tracing::trace!("split compound assignment");
        self.changed = true;
        Ok(())
    }
}

pub fn normalize_compound_assignments(program: &mut JProgram) -> VisitResult<bool> {
    let mut splitter = CompoundSplitter { changed: false };
    visitor::accept_program(&mut splitter, program)?;
    Ok(splitter.changed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::jast::declarations::{MethodFlags, VarId};
    use crate::jast::types::TypeId;

    fn info() -> SourceInfo {
        SourceInfo::unknown()
    }

    fn setup() -> (JProgram, TypeId, MethodId) {
        let mut program = JProgram::new(false);
        let app = program.create_class(info(), "app.Main", None, false, false);
        let main = program.create_method(info(), app, "main", JType::VOID, MethodFlags::static_method());
        (program, app, main)
    }

    fn only_expr(program: &JProgram, method: MethodId) -> &JExpression {
        let stmts = program.methods[method].body.statements().unwrap();
        match &stmts[0].kind {
            JStatementKind::Expression(e) | JStatementKind::Return(Some(e)) => e,
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_byte_compound_assignment_gets_narrowing_cast() {
        let (mut program, _, main) = setup();
        let b = program.create_local(info(), main, "b", JType::BYTE, false);
        let x = program.create_param(info(), main, "x", JType::INT, false);
        program.set_body(
            main,
            vec![JStatement::expr(JExpression::binary(
                info(),
                BinaryOp::AsgAdd,
                JExpression::var_ref(info(), b),
                JExpression::var_ref(info(), x),
                JType::BYTE,
            ))],
        );

        assert!(normalize_compound_assignments(&mut program).unwrap());
        let JExpressionKind::Binary { op, rhs, .. } = &only_expr(&program, main).kind else {
            panic!("expected assignment");
        };
        assert_eq!(*op, BinaryOp::Assign);
        assert!(matches!(&rhs.kind, JExpressionKind::Cast { ty, .. } if *ty == JType::BYTE));
        assert!(!normalize_compound_assignments(&mut program).unwrap());
    }

    #[test]
    fn test_int_addition_is_left_alone() {
        let (mut program, _, main) = setup();
        let i = program.create_local(info(), main, "i", JType::INT, false);
        program.set_body(
            main,
            vec![JStatement::expr(JExpression::binary(
                info(),
                BinaryOp::AsgAdd,
                JExpression::var_ref(info(), i),
                JExpression::int_lit(info(), 2),
                JType::INT,
            ))],
        );
        assert!(!normalize_compound_assignments(&mut program).unwrap());
    }

    #[test]
    fn test_array_target_is_evaluated_once() {
        let (mut program, app, main) = setup();
        let next = program.create_method(info(), app, "next", JType::INT, MethodFlags::static_method());
        let arr = program.create_param(info(), main, "arr", JType::array_of(JType::INT), false);
        program.set_body(
            main,
            vec![JStatement::expr(JExpression::binary(
                info(),
                BinaryOp::AsgDiv,
                JExpression::array_ref(
                    info(),
                    JExpression::var_ref(info(), arr),
                    JExpression::static_call(info(), next, vec![]),
                ),
                JExpression::int_lit(info(), 2),
                JType::INT,
            ))],
        );

        assert!(normalize_compound_assignments(&mut program).unwrap());
        let JExpressionKind::Multi(parts) = &only_expr(&program, main).kind else {
            panic!("expected a sequence");
        };
        // index temp, then the assignment
        assert_eq!(parts.len(), 2);
        let calls = parts.iter().map(count_calls).sum::<usize>();
        assert_eq!(calls, 1);
    }

    fn count_calls(expr: &JExpression) -> usize {
        let mut count = usize::from(matches!(expr.kind, JExpressionKind::MethodCall { .. }));
        expr.for_each_child(&mut |child| count += count_calls(child));
        count
    }

    #[test]
    fn test_postfix_char_increment_keeps_old_value() {
        let (mut program, _, main) = setup();
        main_returns(&mut program, main, JType::CHAR);
        let c: VarId = program.create_local(info(), main, "c", JType::CHAR, false);
        program.set_body(
            main,
            vec![JStatement::return_stmt(
                info(),
                Some(JExpression::unary(info(), UnaryOp::PostInc, JExpression::var_ref(info(), c))),
            )],
        );

        assert!(normalize_compound_assignments(&mut program).unwrap());
        let JExpressionKind::Multi(parts) = &only_expr(&program, main).kind else {
            panic!("expected a sequence");
        };
        assert_eq!(parts.len(), 3);
        assert!(matches!(parts[2].kind, JExpressionKind::VariableRef(v) if v != c));
    }

    fn main_returns(program: &mut JProgram, main: MethodId, ty: JType) {
        program.methods[main].return_type = ty;
    }

    #[test]
    fn test_discarded_long_increment_needs_no_temporary() {
        let (mut program, _, main) = setup();
        let l = program.create_local(info(), main, "l", JType::LONG, false);
        program.set_body(
            main,
            vec![JStatement::expr(JExpression::unary(
                info(),
                UnaryOp::PostInc,
                JExpression::var_ref(info(), l),
            ))],
        );

        assert!(normalize_compound_assignments(&mut program).unwrap());
        let JExpressionKind::Binary { op, rhs, .. } = &only_expr(&program, main).kind else {
            panic!("expected assignment");
        };
        assert_eq!(*op, BinaryOp::Assign);
        assert!(matches!(&rhs.kind, JExpressionKind::Binary { op: BinaryOp::Add, ty, .. } if *ty == JType::LONG));
        assert_eq!(program.methods[main].locals.len(), 1);
    }
}
