//! Static evaluation of the output program
//!
//! Folds literal arithmetic, comparisons and string concatenation with
//! JavaScript semantics, short-circuits boolean operators with a constant
//! left operand, picks constant branches and drops statements that can never
//! run or have no effect.

use crate::errors::CompilationError;
use crate::fixpoint::OptimizationPass;
use crate::js::ast::{JsBinaryOp, JsExpression, JsExpressionKind, JsProgram, JsStatement, JsStatementKind, JsUnaryOp};
use crate::js::source_gen::format_number;
use crate::js::visitor::{accept_stmts, JsModVisitor};

pub struct JsStaticEval;

impl OptimizationPass<JsProgram> for JsStaticEval {
    fn name(&self) -> &'static str {
        "js-static-eval"
    }

    fn run(&mut self, program: &mut JsProgram) -> Result<bool, CompilationError> {
        Ok(static_eval(program))
    }
}

pub fn static_eval(program: &mut JsProgram) -> bool {
    let mut evaluator = StaticEvaluator { changed: false };
    accept_stmts(&mut evaluator, &mut program.global_block);
    evaluator.changed
}

fn take(expr: &mut JsExpression) -> JsExpression {
    let placeholder = JsExpression::null(expr.info.clone());
    std::mem::replace(expr, placeholder)
}

fn take_stmt(stmt: &mut JsStatement) -> JsStatement {
    let placeholder = JsStatement::empty(stmt.info.clone());
    std::mem::replace(stmt, placeholder)
}

/// ECMAScript ToInt32
pub fn to_int32(value: f64) -> i32 {
    if !value.is_finite() {
        return 0;
    }
    value.trunc().rem_euclid(4_294_967_296.0) as u64 as u32 as i32
}

fn to_uint32(value: f64) -> u32 {
    to_int32(value) as u32
}

/// String conversion of a literal, as `+` with a string operand performs it
fn literal_to_string(expr: &JsExpression) -> Option<String> {
    match &expr.kind {
        JsExpressionKind::String(s) => Some(s.clone()),
        JsExpressionKind::Number(n) => Some(format_number(*n)),
        JsExpressionKind::Boolean(b) => Some(b.to_string()),
        JsExpressionKind::Null => Some("null".to_string()),
        _ => None,
    }
}

/// Equality of two literals; `None` when it depends on type coercion
fn literal_equality(lhs: &JsExpression, rhs: &JsExpression, strict: bool) -> Option<bool> {
    use JsExpressionKind as K;
    match (&lhs.kind, &rhs.kind) {
        (K::Number(a), K::Number(b)) => Some(a == b),
        (K::String(a), K::String(b)) => Some(a == b),
        (K::Boolean(a), K::Boolean(b)) => Some(a == b),
        (K::Null, K::Null) => Some(true),
        _ if strict => Some(false),
        // null is only loosely equal to null and undefined
        (K::Null, _) | (_, K::Null) => Some(false),
        _ => None,
    }
}

fn fold_numbers(op: JsBinaryOp, a: f64, b: f64) -> Option<JsExpressionKind> {
    let number = match op {
        JsBinaryOp::Add => a + b,
        JsBinaryOp::Sub => a - b,
        JsBinaryOp::Mul => a * b,
        JsBinaryOp::Div => a / b,
        JsBinaryOp::Mod => a % b,
        JsBinaryOp::BitAnd => (to_int32(a) & to_int32(b)) as f64,
        JsBinaryOp::BitOr => (to_int32(a) | to_int32(b)) as f64,
        JsBinaryOp::BitXor => (to_int32(a) ^ to_int32(b)) as f64,
        JsBinaryOp::Shl => to_int32(a).wrapping_shl(to_uint32(b) & 31) as f64,
        JsBinaryOp::Shr => (to_int32(a) >> (to_uint32(b) & 31)) as f64,
        JsBinaryOp::Shru => (to_uint32(a) >> (to_uint32(b) & 31)) as f64,
        JsBinaryOp::Lt => return Some(JsExpressionKind::Boolean(a < b)),
        JsBinaryOp::Le => return Some(JsExpressionKind::Boolean(a <= b)),
        JsBinaryOp::Gt => return Some(JsExpressionKind::Boolean(a > b)),
        JsBinaryOp::Ge => return Some(JsExpressionKind::Boolean(a >= b)),
        _ => return None,
    };
    // -0 has no literal form
    if number == 0.0 && number.is_sign_negative() {
        return None;
    }
    Some(JsExpressionKind::Number(number))
}

fn fold_binary(op: JsBinaryOp, lhs: &mut JsExpression, rhs: &mut JsExpression) -> Option<JsExpression> {
    match op {
        JsBinaryOp::And => {
            return match lhs.as_bool()? {
                true => Some(take(rhs)),
                false => Some(take(lhs)),
            }
        }
        JsBinaryOp::Or => {
            return match lhs.as_bool()? {
                true => Some(take(lhs)),
                false => Some(take(rhs)),
            }
        }
        JsBinaryOp::Comma => return (!lhs.has_side_effects()).then(|| take(rhs)),
        _ => {}
    }
    if !lhs.is_literal() || !rhs.is_literal() {
        return None;
    }
    let info = lhs.info.clone();
    let kind = match op {
        JsBinaryOp::Eq | JsBinaryOp::StrictEq => {
            JsExpressionKind::Boolean(literal_equality(lhs, rhs, op == JsBinaryOp::StrictEq)?)
        }
        JsBinaryOp::Neq | JsBinaryOp::StrictNeq => {
            JsExpressionKind::Boolean(!literal_equality(lhs, rhs, op == JsBinaryOp::StrictNeq)?)
        }
        JsBinaryOp::Add
            if matches!(lhs.kind, JsExpressionKind::String(_)) || matches!(rhs.kind, JsExpressionKind::String(_)) =>
        {
            JsExpressionKind::String(literal_to_string(lhs)? + &literal_to_string(rhs)?)
        }
        _ => match (&lhs.kind, &rhs.kind) {
            (JsExpressionKind::Number(a), JsExpressionKind::Number(b)) => fold_numbers(op, *a, *b)?,
            _ => return None,
        },
    };
    Some(JsExpression::new(info, kind))
}

struct StaticEvaluator {
    changed: bool,
}

impl StaticEvaluator {
    fn replace_expr(&mut self, expr: &mut JsExpression, replacement: JsExpression) {
        tracing::trace!("static eval folded expression");
        *expr = replacement;
        self.changed = true;
    }
}

impl JsModVisitor for StaticEvaluator {
    fn end_visit_expr(&mut self, expr: &mut JsExpression) {
        let folded = match &mut expr.kind {
            JsExpressionKind::Prefix {
                op: JsUnaryOp::Not,
                arg,
            } => arg.as_bool().map(|b| JsExpression::boolean(expr.info.clone(), !b)),
            JsExpressionKind::Prefix {
                op: JsUnaryOp::Neg,
                arg,
            } => match arg.kind {
                JsExpressionKind::Number(n) if n > 0.0 => Some(JsExpression::number(expr.info.clone(), -n)),
                _ => None,
            },
            JsExpressionKind::Binary { op, lhs, rhs } => fold_binary(*op, lhs, rhs),
            JsExpressionKind::Conditional {
                cond,
                then_expr,
                else_expr,
            } => match cond.as_bool() {
                Some(true) => Some(take(then_expr)),
                Some(false) => Some(take(else_expr)),
                None => None,
            },
            _ => None,
        };
        if let Some(folded) = folded {
            self.replace_expr(expr, folded);
        }
    }

    fn end_visit_stmt(&mut self, stmt: &mut JsStatement) {
        let info = stmt.info.clone();
        let replacement = match &mut stmt.kind {
            JsStatementKind::If {
                cond,
                then_stmt,
                else_stmt,
            } => match cond.as_bool() {
                Some(true) => Some(take_stmt(then_stmt)),
                Some(false) => Some(match else_stmt {
                    Some(else_stmt) => take_stmt(else_stmt),
                    None => JsStatement::empty(info),
                }),
                None => None,
            },
            JsStatementKind::While { cond, .. } if cond.as_bool() == Some(false) => Some(JsStatement::empty(info)),
            JsStatementKind::For {
                init,
                cond: Some(cond),
                ..
            } if cond.as_bool() == Some(false) => Some(match init.take() {
                Some(init) => *init,
                None => JsStatement::empty(info),
            }),
            JsStatementKind::Expression(expr) if !expr.has_side_effects() => Some(JsStatement::empty(info)),
            _ => None,
        };
        if let Some(replacement) = replacement {
            *stmt = replacement;
            self.changed = true;
        }
    }

    fn end_visit_stmts(&mut self, stmts: &mut Vec<JsStatement>) {
        let mut result = Vec::with_capacity(stmts.len());
        let mut abrupt = false;
        let mut changed = false;
        for stmt in stmts.drain(..) {
            if abrupt {
                // hoisted declarations survive, initializers never run
                match stmt.kind {
                    JsStatementKind::Function(_) => result.push(stmt),
                    JsStatementKind::Vars(mut vars) => {
                        for var in &mut vars {
                            changed |= var.init.take().is_some();
                        }
                        result.push(JsStatement::new(stmt.info, JsStatementKind::Vars(vars)));
                    }
                    _ => changed = true,
                }
                continue;
            }
            match stmt.kind {
                JsStatementKind::Empty => changed = true,
                JsStatementKind::Block(inner) => {
                    changed = true;
                    abrupt = inner.last().is_some_and(JsStatement::is_abrupt);
                    result.extend(inner);
                }
                _ => {
                    abrupt = stmt.is_abrupt();
                    result.push(stmt);
                }
            }
        }
        *stmts = result;
        self.changed |= changed;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::js::source_gen::{JsSourceGenerator, TextOutput};
    use crate::source_info::SourceInfo;

    fn info() -> SourceInfo {
        SourceInfo::unknown()
    }

    fn num(n: f64) -> JsExpression {
        JsExpression::number(info(), n)
    }

    fn eval_expr(expr: JsExpression) -> String {
        let mut program = JsProgram::new();
        let x = program.fresh_name(program.top_scope, "x", "x");
        program
            .global_block
            .push(JsExpression::assign(info(), JsExpression::name_ref(info(), x), expr).make_stmt());
        static_eval(&mut program);
        JsSourceGenerator::render_stmt(&program, &program.global_block[0], TextOutput::Minified)
    }

    #[test]
    fn test_folds_literals_with_js_semantics() {
        assert_eq!(eval_expr(JsExpression::binary(info(), JsBinaryOp::Add, num(1.0), num(2.0))), "x=3;");
        assert_eq!(
            eval_expr(JsExpression::binary(info(), JsBinaryOp::Add, JsExpression::string(info(), "a"), num(1.5))),
            "x=\"a1.5\";"
        );
        assert_eq!(eval_expr(JsExpression::binary(info(), JsBinaryOp::Shru, num(-1.0), num(28.0))), "x=15;");
        assert_eq!(eval_expr(JsExpression::binary(info(), JsBinaryOp::BitOr, num(4294967297.0), num(0.0))), "x=1;");
        assert_eq!(
            eval_expr(JsExpression::binary(info(), JsBinaryOp::StrictEq, JsExpression::null(info()), num(0.0))),
            "x=false;"
        );
        // loose equality between strings and numbers is left alone
        assert_eq!(
            eval_expr(JsExpression::binary(info(), JsBinaryOp::Eq, JsExpression::string(info(), "1"), num(1.0))),
            "x=\"1\"==1;"
        );
        assert_eq!(eval_expr(JsExpression::binary(info(), JsBinaryOp::Sub, num(0.0), num(0.0))), "x=0;");
    }

    #[test]
    fn test_short_circuit_and_conditional() {
        let mut program = JsProgram::new();
        let f = program.fresh_name(program.top_scope, "f", "f");
        let call = JsExpression::invoke(info(), JsExpression::name_ref(info(), f), vec![]);
        let and = JsExpression::binary(info(), JsBinaryOp::And, JsExpression::boolean(info(), true), call.clone());
        let cond = JsExpression::conditional(info(), JsExpression::not(info(), JsExpression::boolean(info(), true)), num(1.0), call);
        program.global_block.push(and.make_stmt());
        program.global_block.push(cond.make_stmt());

        assert!(static_eval(&mut program));
        assert_eq!(
            crate::js::source_gen::to_source(&program, TextOutput::Minified),
            "f();\nf();\n"
        );
        assert!(!static_eval(&mut program));
    }

    #[test]
    fn test_dead_statements_are_dropped() {
        let mut program = JsProgram::new();
        let top = program.top_scope;
        let f = program.fresh_name(top, "f", "f");
        let y = program.fresh_name(top, "y", "y");
        let call = JsExpression::invoke(info(), JsExpression::name_ref(info(), f), vec![]);
        program.global_block = vec![
            JsStatement::new(
                info(),
                JsStatementKind::If {
                    cond: JsExpression::boolean(info(), false),
                    then_stmt: Box::new(call.clone().make_stmt()),
                    else_stmt: Some(Box::new(JsStatement::block(info(), vec![JsStatement::ret(info(), None)]))),
                },
            ),
            call.make_stmt(),
            JsStatement::var(info(), y, Some(num(1.0))),
        ];

        assert!(static_eval(&mut program));
        assert_eq!(
            crate::js::source_gen::to_source(&program, TextOutput::Minified),
            "return;\nvar y;\n"
        );
        assert!(!static_eval(&mut program));
    }

    #[test]
    fn test_to_int32() {
        assert_eq!(to_int32(2147483648.0), -2147483648);
        assert_eq!(to_int32(-1.5), -1);
        assert_eq!(to_int32(f64::NAN), 0);
    }
}
