//! Local simplification: constant folding, branch and loop pruning, and
//! removal of statements that cannot run or have no effect
//!
//! Folding follows the arithmetic the emitted code performs at runtime.
//! Integer `+`, `-` and `*` are only folded while the result stays within
//! `int` range; division and remainder by zero are left alone.

use crate::errors::{CompilationError, VisitResult};
use crate::fixpoint::OptimizationPass;
use crate::jast::declarations::{MethodBody, MethodId};
use crate::jast::expression::{BinaryOp, JExpression, JExpressionKind, JLiteral, UnaryOp};
use crate::jast::program::JProgram;
use crate::jast::statement::{JStatement, JStatementKind};
use crate::jast::types::{JType, PrimitiveType};
use crate::jast::visitor::{self, ExprContext, JModVisitor, StmtContext};
use crate::source_info::SourceInfo;
use std::cmp::Ordering;

pub struct DeadCodeElimination;

impl OptimizationPass<JProgram> for DeadCodeElimination {
    fn name(&self) -> &'static str {
        "dead-code-elimination"
    }

    fn run(&mut self, program: &mut JProgram) -> Result<bool, CompilationError> {
        Ok(eliminate_dead_code(program)?)
    }
}

pub fn eliminate_dead_code(program: &mut JProgram) -> VisitResult<bool> {
    let mut visitor = DeadCodeVisitor { changed: false };
    visitor::accept_program(&mut visitor, program)?;
    Ok(visitor.changed)
}

struct DeadCodeVisitor {
    changed: bool,
}

impl JModVisitor for DeadCodeVisitor {
    fn end_visit_method(&mut self, method: MethodId, program: &mut JProgram) -> VisitResult {
        if let MethodBody::Java(stmts) = &mut program.methods[method].body {
            self.changed |= clean_list(stmts);
        }
        Ok(())
    }

    fn end_visit_expr(&mut self, expr: &mut JExpression, ctx: &mut ExprContext<'_>) -> VisitResult {
        if let Some(replacement) = simplify_expr(expr, ctx.program, ctx.is_lvalue()) {
            ctx.replace_me(replacement);
            self.changed = true;
        }
        Ok(())
    }

    fn end_visit_stmt(&mut self, stmt: &mut JStatement, ctx: &mut StmtContext<'_>) -> VisitResult {
        self.changed |= clean_nested_lists(stmt);
        self.changed |= simplify_stmt(stmt, ctx);
        Ok(())
    }
}

// ----------------------------------------------------------------------
// Statements
// ----------------------------------------------------------------------

fn remove_or_empty(info: &SourceInfo, ctx: &mut StmtContext<'_>) {
    if ctx.can_remove() {
        ctx.remove_me();
    } else {
        ctx.replace_me(JStatement::empty(info.clone()));
    }
}

fn contains_jump(stmt: &JStatement) -> bool {
    fn any(stmts: &[JStatement]) -> bool {
        stmts.iter().any(contains_jump)
    }
    match &stmt.kind {
        JStatementKind::Break(_) | JStatementKind::Continue(_) => true,
        JStatementKind::Block(stmts) => any(stmts),
        JStatementKind::If {
            then_stmt, else_stmt, ..
        } => contains_jump(then_stmt) || else_stmt.as_deref().is_some_and(contains_jump),
        JStatementKind::While { body, .. }
        | JStatementKind::DoWhile { body, .. }
        | JStatementKind::Label { body, .. } => contains_jump(body),
        JStatementKind::For { init, body, .. } => any(init) || contains_jump(body),
        JStatementKind::Try {
            block,
            catches,
            finally,
        } => any(block) || catches.iter().any(|c| any(&c.body)) || finally.as_deref().is_some_and(any),
        JStatementKind::Switch { cases, .. } => cases.iter().any(|c| any(&c.body)),
        _ => false,
    }
}

/// Splice nested blocks and drop statements after an abrupt completion
fn clean_list(stmts: &mut Vec<JStatement>) -> bool {
    let mut changed = false;
    if stmts.iter().any(|s| matches!(s.kind, JStatementKind::Block(_))) {
        let mut flat = Vec::with_capacity(stmts.len());
        for stmt in stmts.drain(..) {
            match stmt.kind {
                JStatementKind::Block(inner) => flat.extend(inner),
                _ => flat.push(stmt),
            }
        }
        *stmts = flat;
        changed = true;
    }
    if let Some(last) = stmts.iter().position(JStatement::unconditionally_breaks) {
        if last + 1 < stmts.len() {
            stmts.truncate(last + 1);
            changed = true;
        }
    }
    changed
}

fn clean_nested_lists(stmt: &mut JStatement) -> bool {
    match &mut stmt.kind {
        JStatementKind::Block(stmts) => clean_list(stmts),
        JStatementKind::Try {
            block,
            catches,
            finally,
        } => {
            let mut changed = clean_list(block);
            for catch in catches {
                changed |= clean_list(&mut catch.body);
            }
            if let Some(finally) = finally {
                changed |= clean_list(finally);
            }
            changed
        }
        JStatementKind::Switch { cases, .. } => {
            let mut changed = false;
            for case in cases {
                changed |= clean_list(&mut case.body);
            }
            changed
        }
        _ => false,
    }
}

fn simplify_stmt(stmt: &mut JStatement, ctx: &mut StmtContext<'_>) -> bool {
    let info = stmt.info.clone();
    match &mut stmt.kind {
        JStatementKind::Expression(expr) => {
            if !expr.has_side_effects() {
                remove_or_empty(&info, ctx);
                return true;
            }
            if let JExpressionKind::Multi(parts) = &mut expr.kind {
                if ctx.can_remove() {
                    for part in parts.drain(..).filter(JExpression::has_side_effects) {
                        ctx.insert_before(JStatement::expr(part));
                    }
                    ctx.remove_me();
                    return true;
                }
            }
            false
        }
        JStatementKind::If {
            cond,
            then_stmt,
            else_stmt,
        } => {
            if let Some(value) = cond.as_bool_literal() {
                let taken = if value {
                    Some(std::mem::replace(&mut **then_stmt, JStatement::empty(info.clone())))
                } else {
                    else_stmt.take().map(|s| *s)
                };
                match taken {
                    Some(branch) => ctx.replace_me(branch),
                    None => remove_or_empty(&info, ctx),
                }
                return true;
            }
            if else_stmt.as_deref().is_some_and(JStatement::is_empty_block) {
                *else_stmt = None;
                return true;
            }
            if then_stmt.is_empty_block() {
                match else_stmt.take() {
                    Some(otherwise) => {
                        let negated = JExpression::not(cond.info.clone(), cond.clone());
                        ctx.replace_me(JStatement::if_stmt(info, negated, *otherwise, None));
                    }
                    None if cond.has_side_effects() => ctx.replace_me(JStatement::expr(cond.clone())),
                    None => remove_or_empty(&info, ctx),
                }
                return true;
            }
            false
        }
        JStatementKind::While { cond, .. } if cond.as_bool_literal() == Some(false) => {
            remove_or_empty(&info, ctx);
            true
        }
        JStatementKind::DoWhile { body, cond }
            if cond.as_bool_literal() == Some(false) && !contains_jump(body) =>
        {
            let body = std::mem::replace(&mut **body, JStatement::empty(info));
            ctx.replace_me(body);
            true
        }
        JStatementKind::For {
            init, cond: Some(cond), ..
        } if cond.as_bool_literal() == Some(false) => {
            if init.is_empty() {
                remove_or_empty(&info, ctx);
            } else {
                let init = std::mem::take(init);
                ctx.replace_me(JStatement::block(info, init));
            }
            true
        }
        JStatementKind::Try {
            block,
            catches,
            finally,
        } => {
            if finally.as_ref().is_some_and(Vec::is_empty) {
                *finally = None;
                return true;
            }
            if block.is_empty() {
                match finally.take() {
                    Some(finally) => ctx.replace_me(JStatement::block(info, finally)),
                    None => remove_or_empty(&info, ctx),
                }
                return true;
            }
            if catches.is_empty() && finally.is_none() {
                let block = std::mem::take(block);
                ctx.replace_me(JStatement::block(info, block));
                return true;
            }
            false
        }
        JStatementKind::Label { body, .. } if body.is_empty_block() => {
            remove_or_empty(&info, ctx);
            true
        }
        JStatementKind::Block(stmts) if stmts.is_empty() && ctx.can_remove() => {
            ctx.remove_me();
            true
        }
        _ => false,
    }
}

// ----------------------------------------------------------------------
// Expressions
// ----------------------------------------------------------------------

fn simplify_expr(expr: &JExpression, program: &JProgram, lvalue: bool) -> Option<JExpression> {
    let info = expr.info.clone();
    let literal = |value: JLiteral| Some(JExpression::literal(info.clone(), value));
    match &expr.kind {
        JExpressionKind::FieldRef { instance: None, field } if !lvalue => {
            let decl = &program.fields[*field];
            if decl.is_static && decl.is_final {
                return decl.constant.clone().and_then(literal);
            }
            None
        }
        JExpressionKind::Binary { op, lhs, rhs, ty } => match op {
            BinaryOp::And | BinaryOp::Or => simplify_short_circuit(*op, lhs, rhs),
            _ if op.is_assignment() => None,
            _ => {
                let (l, r) = (lhs.as_literal()?, rhs.as_literal()?);
                fold_binary(program, *op, l, r, ty).and_then(literal)
            }
        },
        JExpressionKind::Unary { op, arg } => {
            if *op == UnaryOp::Not {
                if let JExpressionKind::Unary {
                    op: UnaryOp::Not,
                    arg: inner,
                } = &arg.kind
                {
                    return Some((**inner).clone());
                }
            }
            fold_unary(*op, arg.as_literal()?).and_then(literal)
        }
        JExpressionKind::Conditional {
            cond,
            then_expr,
            else_expr,
            ..
        } => {
            if let Some(value) = cond.as_bool_literal() {
                return Some(if value { (**then_expr).clone() } else { (**else_expr).clone() });
            }
            match (then_expr.as_bool_literal(), else_expr.as_bool_literal()) {
                (Some(true), Some(false)) => Some((**cond).clone()),
                (Some(false), Some(true)) => Some(JExpression::not(info.clone(), (**cond).clone())),
                _ => None,
            }
        }
        JExpressionKind::Cast { ty, expr: inner } => {
            let target = ty.primitive()?;
            fold_cast(target, inner.as_literal()?).and_then(literal)
        }
        JExpressionKind::InstanceOf { expr: inner, .. } if inner.is_null_literal() => {
            literal(JLiteral::Boolean(false))
        }
        JExpressionKind::Multi(parts) => simplify_multi(&info, parts),
        _ => None,
    }
}

fn simplify_short_circuit(op: BinaryOp, lhs: &JExpression, rhs: &JExpression) -> Option<JExpression> {
    let is_and = op == BinaryOp::And;
    if let Some(value) = lhs.as_bool_literal() {
        // true && x, false || x => x; false && x, true || x => lhs
        return Some(if value == is_and { rhs.clone() } else { lhs.clone() });
    }
    let value = rhs.as_bool_literal()?;
    if value == is_and {
        return Some(lhs.clone());
    }
    if lhs.has_side_effects() {
        Some(JExpression::multi(lhs.info.clone(), vec![lhs.clone(), rhs.clone()]))
    } else {
        Some(rhs.clone())
    }
}

fn simplify_multi(info: &SourceInfo, parts: &[JExpression]) -> Option<JExpression> {
    let nested = parts.iter().any(|p| matches!(p.kind, JExpressionKind::Multi(_)));
    let last = parts.len().checked_sub(1)?;
    let droppable = parts[..last].iter().any(|p| !p.has_side_effects());
    if !nested && !droppable && parts.len() > 1 {
        return None;
    }

    let mut flat = Vec::with_capacity(parts.len());
    for part in parts {
        match &part.kind {
            JExpressionKind::Multi(inner) => flat.extend(inner.iter().cloned()),
            _ => flat.push(part.clone()),
        }
    }
    let last = flat.pop()?;
    let mut kept: Vec<JExpression> = flat.into_iter().filter(JExpression::has_side_effects).collect();
    if kept.is_empty() {
        return Some(last);
    }
    kept.push(last);
    Some(JExpression::multi(info.clone(), kept))
}

/// String spelling of a literal inside a concatenation
fn concat_text(lit: &JLiteral) -> Option<String> {
    Some(match lit {
        JLiteral::String(s) => s.clone(),
        JLiteral::Int(i) => i.to_string(),
        JLiteral::Long(l) => l.to_string(),
        JLiteral::Boolean(b) => b.to_string(),
        JLiteral::Char(c) => String::from_utf16_lossy(&[*c]),
        JLiteral::Null => "null".to_string(),
        _ => return None,
    })
}

fn is_integral_lit(lit: &JLiteral) -> bool {
    matches!(lit, JLiteral::Int(_) | JLiteral::Long(_) | JLiteral::Char(_))
}

fn fold_binary(program: &JProgram, op: BinaryOp, l: &JLiteral, r: &JLiteral, ty: &JType) -> Option<JLiteral> {
    if op == BinaryOp::Add && program.is_string_type(ty) {
        return Some(JLiteral::String(concat_text(l)? + &concat_text(r)?));
    }
    if op.is_comparison() {
        return fold_comparison(op, l, r).map(JLiteral::Boolean);
    }
    if let (Some(a), Some(b)) = (l.as_bool(), r.as_bool()) {
        return match op {
            BinaryOp::BitAnd => Some(JLiteral::Boolean(a & b)),
            BinaryOp::BitOr => Some(JLiteral::Boolean(a | b)),
            BinaryOp::BitXor => Some(JLiteral::Boolean(a ^ b)),
            _ => None,
        };
    }
    match ty.primitive()? {
        PrimitiveType::Long => fold_long(op, l.as_i64()?, r.as_i64()?).map(JLiteral::Long),
        p if p.is_integral() => {
            if !is_integral_lit(l) || !is_integral_lit(r) {
                return None;
            }
            fold_int(op, l.as_i64()?, r.as_i64()?).map(JLiteral::Int)
        }
        p if p.is_floating() => fold_double(op, l.as_f64()?, r.as_f64()?).map(JLiteral::Double),
        _ => None,
    }
}

fn fold_comparison(op: BinaryOp, l: &JLiteral, r: &JLiteral) -> Option<bool> {
    if let (Some(a), Some(b)) = (l.as_bool(), r.as_bool()) {
        return match op {
            BinaryOp::Eq => Some(a == b),
            BinaryOp::Neq => Some(a != b),
            _ => None,
        };
    }
    if matches!(op, BinaryOp::RefEq | BinaryOp::RefNeq) {
        return (l.is_null() && r.is_null()).then_some(op == BinaryOp::RefEq);
    }
    let ordering = if is_integral_lit(l) && is_integral_lit(r) {
        Some(l.as_i64()?.cmp(&r.as_i64()?))
    } else {
        let (a, b) = (l.as_f64()?, r.as_f64()?);
        // NaN compares false except for !=
        if a.is_nan() || b.is_nan() {
            return Some(op == BinaryOp::Neq);
        }
        a.partial_cmp(&b)
    }?;
    Some(match op {
        BinaryOp::Lt => ordering == Ordering::Less,
        BinaryOp::Le => ordering != Ordering::Greater,
        BinaryOp::Gt => ordering == Ordering::Greater,
        BinaryOp::Ge => ordering != Ordering::Less,
        BinaryOp::Eq => ordering == Ordering::Equal,
        BinaryOp::Neq => ordering != Ordering::Equal,
        _ => return None,
    })
}

fn fold_int(op: BinaryOp, a: i64, b: i64) -> Option<i32> {
    let (x, y) = (i32::try_from(a).ok()?, i32::try_from(b).ok()?);
    let shift = (y & 31) as u32;
    match op {
        BinaryOp::Add => i32::try_from(a + b).ok(),
        BinaryOp::Sub => i32::try_from(a - b).ok(),
        BinaryOp::Mul => i32::try_from(a * b).ok(),
        BinaryOp::Div if y != 0 => Some(x.wrapping_div(y)),
        BinaryOp::Mod if y != 0 => Some(x.wrapping_rem(y)),
        BinaryOp::BitAnd => Some(x & y),
        BinaryOp::BitOr => Some(x | y),
        BinaryOp::BitXor => Some(x ^ y),
        BinaryOp::Shl => Some(x.wrapping_shl(shift)),
        BinaryOp::Shr => Some(x >> shift),
        // An unsigned shift by zero of a negative value leaves int range at runtime
        BinaryOp::Shru if shift > 0 || x >= 0 => Some(((x as u32) >> shift) as i32),
        _ => None,
    }
}

fn fold_long(op: BinaryOp, a: i64, b: i64) -> Option<i64> {
    let shift = (b & 63) as u32;
    match op {
        BinaryOp::Add => Some(a.wrapping_add(b)),
        BinaryOp::Sub => Some(a.wrapping_sub(b)),
        BinaryOp::Mul => Some(a.wrapping_mul(b)),
        BinaryOp::Div if b != 0 => Some(a.wrapping_div(b)),
        BinaryOp::Mod if b != 0 => Some(a.wrapping_rem(b)),
        BinaryOp::BitAnd => Some(a & b),
        BinaryOp::BitOr => Some(a | b),
        BinaryOp::BitXor => Some(a ^ b),
        BinaryOp::Shl => Some(a.wrapping_shl(shift)),
        BinaryOp::Shr => Some(a >> shift),
        BinaryOp::Shru => Some(((a as u64) >> shift) as i64),
        _ => None,
    }
}

fn fold_double(op: BinaryOp, a: f64, b: f64) -> Option<f64> {
    match op {
        BinaryOp::Add => Some(a + b),
        BinaryOp::Sub => Some(a - b),
        BinaryOp::Mul => Some(a * b),
        BinaryOp::Div => Some(a / b),
        BinaryOp::Mod => Some(a % b),
        _ => None,
    }
}

fn fold_unary(op: UnaryOp, lit: &JLiteral) -> Option<JLiteral> {
    match (op, lit) {
        (UnaryOp::Not, JLiteral::Boolean(b)) => Some(JLiteral::Boolean(!b)),
        (UnaryOp::Neg, JLiteral::Int(i)) => i.checked_neg().map(JLiteral::Int),
        (UnaryOp::Neg, JLiteral::Char(c)) => Some(JLiteral::Int(-i32::from(*c))),
        (UnaryOp::Neg, JLiteral::Long(l)) => Some(JLiteral::Long(l.wrapping_neg())),
        (UnaryOp::Neg, JLiteral::Double(d)) => Some(JLiteral::Double(-d)),
        (UnaryOp::Neg, JLiteral::Float(f)) => Some(JLiteral::Float(-f)),
        (UnaryOp::BitNot, JLiteral::Int(i)) => Some(JLiteral::Int(!i)),
        (UnaryOp::BitNot, JLiteral::Char(c)) => Some(JLiteral::Int(!i32::from(*c))),
        (UnaryOp::BitNot, JLiteral::Long(l)) => Some(JLiteral::Long(!l)),
        _ => None,
    }
}

fn fold_cast(target: PrimitiveType, lit: &JLiteral) -> Option<JLiteral> {
    if let JLiteral::Boolean(b) = lit {
        return (target == PrimitiveType::Boolean).then_some(JLiteral::Boolean(*b));
    }
    // Floating values convert through int (or long) with saturation
    let integral = if is_integral_lit(lit) {
        lit.as_i64()?
    } else if target == PrimitiveType::Long {
        lit.as_f64()? as i64
    } else {
        i64::from(lit.as_f64()? as i32)
    };
    Some(match target {
        PrimitiveType::Long => JLiteral::Long(integral),
        PrimitiveType::Int => JLiteral::Int(integral as i32),
        PrimitiveType::Short => JLiteral::Int(i32::from(integral as i16)),
        PrimitiveType::Byte => JLiteral::Int(i32::from(integral as i8)),
        PrimitiveType::Char => JLiteral::Char(integral as u16),
        PrimitiveType::Double | PrimitiveType::Float => {
            if is_integral_lit(lit) {
                JLiteral::Double(integral as f64)
            } else {
                JLiteral::Double(lit.as_f64()?)
            }
        }
        PrimitiveType::Boolean | PrimitiveType::Void => return None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::jast::declarations::MethodFlags;

    fn info() -> SourceInfo {
        SourceInfo::unknown()
    }

    fn int(v: i32) -> JExpression {
        JExpression::int_lit(info(), v)
    }

    fn add(lhs: JExpression, rhs: JExpression) -> JExpression {
        JExpression::binary(info(), BinaryOp::Add, lhs, rhs, JType::INT)
    }

    /// Run the pass over `App.m` with the given body and return the result
    fn run(body: Vec<JStatement>) -> (JProgram, MethodId, bool) {
        let mut program = JProgram::new(false);
        let app = program.create_class(info(), "App", None, false, false);
        let m = program.create_method(info(), app, "m", JType::INT, MethodFlags::static_method());
        program.set_body(m, body);
        let changed = eliminate_dead_code(&mut program).unwrap();
        (program, m, changed)
    }

    fn body(program: &JProgram, m: MethodId) -> &[JStatement] {
        program.methods[m].body.statements().unwrap()
    }

    fn returned_literal(program: &JProgram, m: MethodId) -> Option<JLiteral> {
        match &body(program, m).last()?.kind {
            JStatementKind::Return(Some(e)) => e.as_literal().cloned(),
            _ => None,
        }
    }

    #[test]
    fn test_folds_int_arithmetic() {
        let (program, m, changed) = run(vec![JStatement::return_stmt(
            info(),
            Some(add(int(2), JExpression::binary(info(), BinaryOp::Mul, int(3), int(4), JType::INT))),
        )]);
        assert!(changed);
        assert_eq!(returned_literal(&program, m), Some(JLiteral::Int(14)));
    }

    #[test]
    fn test_int_overflow_is_not_folded() {
        let (program, m, changed) = run(vec![JStatement::return_stmt(info(), Some(add(int(i32::MAX), int(1))))]);
        assert!(!changed);
        assert_eq!(returned_literal(&program, m), None);
    }

    #[test]
    fn test_division_by_zero_is_not_folded() {
        let div = JExpression::binary(info(), BinaryOp::Div, int(1), int(0), JType::INT);
        let (_, _, changed) = run(vec![JStatement::return_stmt(info(), Some(div))]);
        assert!(!changed);
    }

    #[test]
    fn test_long_arithmetic_wraps() {
        let sum = JExpression::binary(
            info(),
            BinaryOp::Add,
            JExpression::long_lit(info(), i64::MAX),
            JExpression::long_lit(info(), 1),
            JType::LONG,
        );
        let (program, m, _) = run(vec![JStatement::return_stmt(info(), Some(sum))]);
        assert_eq!(returned_literal(&program, m), Some(JLiteral::Long(i64::MIN)));
    }

    #[test]
    fn test_constant_if_keeps_taken_branch() {
        let (program, m, _) = run(vec![
            JStatement::if_stmt(
                info(),
                JExpression::bool_lit(info(), false),
                JStatement::return_stmt(info(), Some(int(1))),
                Some(JStatement::return_stmt(info(), Some(int(2)))),
            ),
        ]);
        assert_eq!(body(&program, m).len(), 1);
        assert_eq!(returned_literal(&program, m), Some(JLiteral::Int(2)));
    }

    #[test]
    fn test_statements_after_return_are_dropped() {
        let (program, m, _) = run(vec![
            JStatement::return_stmt(info(), Some(int(1))),
            JStatement::return_stmt(info(), Some(int(2))),
        ]);
        assert_eq!(body(&program, m).len(), 1);
        assert_eq!(returned_literal(&program, m), Some(JLiteral::Int(1)));
    }

    #[test]
    fn test_pure_expression_statement_and_false_loop_removed() {
        let (program, m, _) = run(vec![
            JStatement::expr(add(int(1), int(2))),
            JStatement::while_stmt(
                info(),
                JExpression::bool_lit(info(), false),
                JStatement::return_stmt(info(), Some(int(1))),
            ),
            JStatement::return_stmt(info(), Some(int(3))),
        ]);
        assert_eq!(body(&program, m).len(), 1);
    }

    #[test]
    fn test_short_circuit_with_literal_operand() {
        let mut program = JProgram::new(false);
        let app = program.create_class(info(), "App", None, false, false);
        let m = program.create_method(info(), app, "m", JType::BOOLEAN, MethodFlags::static_method());
        let flag = program.create_param(info(), m, "flag", JType::BOOLEAN, false);
        let and = JExpression::binary(
            info(),
            BinaryOp::And,
            JExpression::bool_lit(info(), true),
            JExpression::var_ref(info(), flag),
            JType::BOOLEAN,
        );
        program.set_body(m, vec![JStatement::return_stmt(info(), Some(and))]);

        assert!(eliminate_dead_code(&mut program).unwrap());
        assert!(matches!(
            &body(&program, m)[0].kind,
            JStatementKind::Return(Some(e)) if matches!(e.kind, JExpressionKind::VariableRef(v) if v == flag)
        ));
        assert!(!eliminate_dead_code(&mut program).unwrap());
    }

    #[test]
    fn test_empty_try_is_removed() {
        let try_stmt = JStatement::new(
            info(),
            JStatementKind::Try {
                block: vec![],
                catches: vec![],
                finally: Some(vec![JStatement::return_stmt(info(), Some(int(5)))]),
            },
        );
        let (program, m, _) = run(vec![try_stmt]);
        assert_eq!(body(&program, m).len(), 1);
        assert_eq!(returned_literal(&program, m), Some(JLiteral::Int(5)));
    }

    #[test]
    fn test_string_concat_folds_char() {
        let mut program = JProgram::new(false);
        let object = program.create_class(info(), "java.lang.Object", None, false, false);
        program.register_indexed_type("Object", object);
        let string = program.create_class(info(), "java.lang.String", Some(object), false, true);
        program.register_indexed_type("String", string);
        let folded = fold_binary(
            &program,
            BinaryOp::Add,
            &JLiteral::String("a".into()),
            &JLiteral::Char(u16::from(b'b')),
            &JType::Declared(string),
        );
        assert_eq!(folded, Some(JLiteral::String("ab".into())));
    }

    #[test]
    fn test_fold_cast_saturates() {
        assert_eq!(fold_cast(PrimitiveType::Int, &JLiteral::Double(1e20)), Some(JLiteral::Int(i32::MAX)));
        assert_eq!(fold_cast(PrimitiveType::Byte, &JLiteral::Int(200)), Some(JLiteral::Int(-56)));
        assert_eq!(fold_cast(PrimitiveType::Int, &JLiteral::Double(f64::NAN)), Some(JLiteral::Int(0)));
    }
}
