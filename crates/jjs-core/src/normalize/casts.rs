//! Lowers casts, `instanceof` and the numeric conversions JavaScript does
//! not perform on its own
//!
//! * numeric casts become narrowing or `LongLib` helpers, or disappear;
//!   constant operands are folded
//! * int division is truncated through `Cast.narrow_int`
//! * char and long operands of string concatenation are converted to
//!   strings explicitly
//! * reference casts become `Cast.dynamicCast*` calls unless they are
//!   statically safe or checking is disabled
//! * `instanceof` becomes `Cast.instanceOf`/`isString`/`isArray`, or a
//!   null check when the test cannot fail otherwise
//!
//! Every declared type that takes part in a runtime check gets a query id
//! first. Long emulation must have finished.

use crate::errors::{CompilationError, VisitResult};
use crate::fixpoint::OptimizationPass;
use crate::jast::expression::{BinaryOp, JExpression, JExpressionKind, JLiteral};
use crate::jast::program::JProgram;
use crate::jast::type_oracle::TypeOracle;
use crate::jast::types::{JType, PrimitiveType, TypeId};
use crate::jast::visitor::{self, ExprContext, JModVisitor, JVisitor, VisitCx};
use crate::source_info::SourceInfo;
use indexmap::IndexSet;

pub struct CastNormalizer {
    disable_checking: bool,
}

impl CastNormalizer {
    pub fn new(disable_checking: bool) -> Self {
        Self { disable_checking }
    }
}

impl OptimizationPass<JProgram> for CastNormalizer {
    fn name(&self) -> &'static str {
        "cast-normalizer"
    }

    fn run(&mut self, program: &mut JProgram) -> Result<bool, CompilationError> {
        Ok(normalize_casts(program, self.disable_checking)?)
    }
}

// ----------------------------------------------------------------------
// Query ids
// ----------------------------------------------------------------------

struct QueryTypeCollector {
    found: IndexSet<TypeId>,
}

impl QueryTypeCollector {
    fn note(&mut self, program: &JProgram, ty: &JType) {
        let (leaf, _) = ty.leaf_and_dims();
        if let Some(t) = leaf.declared() {
            if !program.is_object_type(leaf) && !program.is_string_type(leaf) {
                self.found.insert(t);
            }
        }
    }
}

impl JVisitor for QueryTypeCollector {
    fn end_visit_expr(&mut self, expr: &JExpression, cx: VisitCx<'_>) {
        match &expr.kind {
            JExpressionKind::Cast { ty, .. } if ty.is_reference() => self.note(cx.program, ty),
            JExpressionKind::InstanceOf { test, .. } => self.note(cx.program, test),
            JExpressionKind::NewArray { ty, .. } => self.note(cx.program, ty),
            _ => {}
        }
    }
}

/// Give every type used by a cast, an `instanceof` or an array allocation
/// a query id; returns whether any new id was handed out
pub fn assign_query_ids(program: &mut JProgram) -> bool {
    let mut collector = QueryTypeCollector {
        found: IndexSet::new(),
    };
    visitor::visit_program(&mut collector, program);
    let mut assigned = false;
    for ty in collector.found {
        if !program.query_ids.contains_key(&ty) {
            let next = program.query_ids.len() as u32;
            program.query_ids.insert(ty, next);
            assigned = true;
        }
    }
    if assigned {
        tracing::debug!(count = program.query_ids.len(), "assigned query ids");
    }
    assigned
}

/// Runtime query id of `ty`, or -1 when no value can ever match it
pub fn query_id(program: &JProgram, ty: &JType) -> i32 {
    ty.declared()
        .and_then(|t| program.query_ids.get(&t))
        .and_then(|id| i32::try_from(*id).ok())
        .unwrap_or(-1)
}

// ----------------------------------------------------------------------
// Numeric conversions
// ----------------------------------------------------------------------

fn narrow_key(to: PrimitiveType) -> Option<&'static str> {
    match to {
        PrimitiveType::Byte => Some("Cast.narrow_byte"),
        PrimitiveType::Short => Some("Cast.narrow_short"),
        PrimitiveType::Char => Some("Cast.narrow_char"),
        _ => None,
    }
}

fn helper(program: &JProgram, key: &str, info: &SourceInfo, args: Vec<JExpression>) -> VisitResult<JExpression> {
    let method = program.indexed_method(key)?;
    Ok(JExpression::static_call(info.clone(), method, args))
}

/// Narrow an int-valued expression to a byte, short or char
fn narrow_int_value(program: &JProgram, info: &SourceInfo, to: PrimitiveType, value: JExpression) -> VisitResult<JExpression> {
    match narrow_key(to) {
        Some(key) => helper(program, key, info, vec![value]),
        None => Ok(value),
    }
}

/// Constant value of a numeric cast applied to a literal
fn fold_numeric(to: PrimitiveType, lit: &JLiteral) -> Option<JLiteral> {
    let floating = matches!(lit, JLiteral::Float(_) | JLiteral::Double(_));
    // Float to int conversions saturate and map NaN to zero
    let whole = if floating {
        lit.as_f64().map(|v| i64::from(v as i32))
    } else {
        lit.as_i64()
    };
    Some(match to {
        PrimitiveType::Byte => JLiteral::Int(i32::from(whole? as i32 as i8)),
        PrimitiveType::Short => JLiteral::Int(i32::from(whole? as i32 as i16)),
        PrimitiveType::Char => JLiteral::Char(whole? as i32 as u16),
        PrimitiveType::Int => JLiteral::Int(whole? as i32),
        PrimitiveType::Long => JLiteral::Long(if floating { lit.as_f64()? as i64 } else { lit.as_i64()? }),
        PrimitiveType::Float => JLiteral::Float(lit.as_f64()? as f32),
        PrimitiveType::Double => JLiteral::Double(lit.as_f64()?),
        PrimitiveType::Boolean | PrimitiveType::Void => return None,
    })
}

fn lower_numeric_cast(
    program: &JProgram,
    info: &SourceInfo,
    to: PrimitiveType,
    from: PrimitiveType,
    value: JExpression,
) -> VisitResult<JExpression> {
    use PrimitiveType::*;

    if to == from || !to.is_numeric() || !from.is_numeric() {
        return Ok(value);
    }
    if let Some(folded) = value.as_literal().and_then(|lit| fold_numeric(to, lit)) {
        return Ok(JExpression::literal(info.clone(), folded));
    }
    match (from, to) {
        (Long, Float | Double) => helper(program, "LongLib.toDouble", info, vec![value]),
        (Long, _) => {
            let int = helper(program, "LongLib.toInt", info, vec![value])?;
            narrow_int_value(program, info, to, int)
        }
        (Float | Double, Long) => helper(program, "LongLib.fromDouble", info, vec![value]),
        (_, Long) => helper(program, "LongLib.fromInt", info, vec![value]),
        (_, Float | Double) => Ok(value),
        (Float | Double, _) => {
            let int = helper(program, "Cast.round_int", info, vec![value])?;
            narrow_int_value(program, info, to, int)
        }
        (_, Int) | (Byte, Short) => Ok(value),
        _ => narrow_int_value(program, info, to, value),
    }
}

// ----------------------------------------------------------------------
// Rewriting
// ----------------------------------------------------------------------

fn take(slot: &mut JExpression) -> JExpression {
    let info = slot.info.clone();
    std::mem::replace(slot, JExpression::null_lit(info))
}

fn is_int_division(expr: &JExpression) -> bool {
    matches!(
        &expr.kind,
        JExpressionKind::Binary { op: BinaryOp::Div, ty, .. } if ty.is_int_like()
    )
}

struct CastRewriter {
    oracle: TypeOracle,
    disable_checking: bool,
    changed: bool,
    /// The next division visited is already the argument of `narrow_int`
    next_div_wrapped: bool,
    /// One entry per int division being visited
    div_wrapped: Vec<bool>,
}

impl CastRewriter {
    fn lower_reference_cast(
        &self,
        program: &JProgram,
        info: &SourceInfo,
        to: &JType,
        from: &JType,
        value: JExpression,
    ) -> VisitResult<JExpression> {
        if self.disable_checking
            || from.is_null()
            || program.is_object_type(to)
            || self.oracle.can_assign(from, to)
        {
            return Ok(value);
        }
        if program.is_string_type(to) {
            return helper(program, "Cast.dynamicCastString", info, vec![value]);
        }
        if to.is_array() {
            return helper(program, "Cast.dynamicCastArray", info, vec![value]);
        }
        let id = JExpression::int_lit(info.clone(), query_id(program, to));
        helper(program, "Cast.dynamicCast", info, vec![value, id])
    }

    fn lower_instance_of(
        &self,
        program: &JProgram,
        info: &SourceInfo,
        test: &JType,
        from: &JType,
        value: JExpression,
    ) -> VisitResult<JExpression> {
        if program.is_object_type(test) || (!from.is_null() && self.oracle.can_assign(from, test)) {
            return Ok(JExpression::binary(
                info.clone(),
                BinaryOp::Neq,
                value,
                JExpression::null_lit(info.clone()),
                JType::BOOLEAN,
            ));
        }
        if program.is_string_type(test) {
            return helper(program, "Cast.isString", info, vec![value]);
        }
        if test.is_array() {
            return helper(program, "Cast.isArray", info, vec![value]);
        }
        let id = JExpression::int_lit(info.clone(), query_id(program, test));
        helper(program, "Cast.instanceOf", info, vec![value, id])
    }

    /// Converts a char or long operand of a string concatenation
    fn stringify(&mut self, program: &JProgram, operand: &mut JExpression) -> VisitResult {
        let ty = operand.ty(program);
        let replacement = match (operand.as_literal(), &ty) {
            (Some(JLiteral::Char(c)), _) => {
                JExpression::string_lit(operand.info.clone(), String::from_utf16_lossy(&[*c]))
            }
            (Some(JLiteral::Long(v)), _) => JExpression::string_lit(operand.info.clone(), v.to_string()),
            (_, ty) if *ty == JType::CHAR => {
                let info = operand.info.clone();
                helper(program, "Cast.charToString", &info, vec![take(operand)])?
            }
            (_, ty) if ty.is_long() => {
                let info = operand.info.clone();
                helper(program, "LongLib.toString", &info, vec![take(operand)])?
            }
            _ => return Ok(()),
        };
        *operand = replacement;
        self.changed = true;
        Ok(())
    }
}

impl JModVisitor for CastRewriter {
    fn visit_expr(&mut self, expr: &mut JExpression, ctx: &mut ExprContext<'_>) -> VisitResult<bool> {
        if is_int_division(expr) {
            let wrapped = std::mem::take(&mut self.next_div_wrapped);
            self.div_wrapped.push(wrapped);
            return Ok(true);
        }
        self.next_div_wrapped = false;
        if let JExpressionKind::MethodCall { target, args, .. } = &expr.kind {
            let narrow_int = ctx.program.index.methods.get("Cast.narrow_int");
            if narrow_int == Some(target) && args.first().is_some_and(is_int_division) {
                self.next_div_wrapped = true;
            }
        }
        Ok(true)
    }

    fn end_visit_expr(&mut self, expr: &mut JExpression, ctx: &mut ExprContext<'_>) -> VisitResult {
        let program = &*ctx.program;
        let info = expr.info.clone();
        if is_int_division(expr) {
            if self.div_wrapped.pop().unwrap_or(false) {
                return Ok(());
            }
            let truncated = helper(program, "Cast.narrow_int", &info, vec![take(expr)])?;
            ctx.replace_me(truncated);
            self.changed = true;
            return Ok(());
        }
        let replacement = match &mut expr.kind {
            JExpressionKind::Binary { op, lhs, rhs, ty } => {
                let concat = (*op == BinaryOp::Add && program.is_string_type(ty))
                    || (*op == BinaryOp::AsgAdd && program.is_string_type(&lhs.ty(program)));
                if concat {
                    if *op == BinaryOp::Add {
                        self.stringify(program, lhs)?;
                    }
                    self.stringify(program, rhs)?;
                }
                return Ok(());
            }
            JExpressionKind::Cast { ty, expr: value } => {
                let from = value.ty(program);
                let to = ty.clone();
                let value = take(value);
                match (to.primitive(), from.primitive()) {
                    (Some(to), Some(from)) => lower_numeric_cast(program, &info, to, from, value)?,
                    (Some(_), None) | (None, Some(_)) => value,
                    (None, None) => self.lower_reference_cast(program, &info, &to, &from, value)?,
                }
            }
            JExpressionKind::InstanceOf { test, expr: value } => {
                let from = value.ty(program);
                let test = test.clone();
                let value = take(value);
                self.lower_instance_of(program, &info, &test, &from, value)?
            }
            _ => return Ok(()),
        };
        ctx.replace_me(replacement);
        self.changed = true;
        Ok(())
    }
}

pub fn normalize_casts(program: &mut JProgram, disable_checking: bool) -> VisitResult<bool> {
    let assigned = assign_query_ids(program);
    let mut rewriter = CastRewriter {
        oracle: TypeOracle::build(program),
        disable_checking,
        changed: false,
        next_div_wrapped: false,
        div_wrapped: Vec::new(),
    };
    visitor::accept_program(&mut rewriter, program)?;
    Ok(assigned || rewriter.changed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::jast::declarations::{MethodFlags, MethodId};
    use crate::jast::runtime;
    use crate::jast::statement::{JStatement, JStatementKind};

    fn info() -> SourceInfo {
        SourceInfo::unknown()
    }

    struct Fixture {
        program: JProgram,
        base: TypeId,
        derived: TypeId,
        main: MethodId,
    }

    fn setup(return_type: JType) -> Fixture {
        let mut program = JProgram::new(false);
        runtime::install(&mut program);
        let object = program.indexed_type("Object").unwrap();
        let base = program.create_class(info(), "app.Base", Some(object), false, false);
        let derived = program.create_class(info(), "app.Derived", Some(base), false, false);
        let main = program.create_method(info(), base, "main", return_type, MethodFlags::static_method());
        Fixture {
            program,
            base,
            derived,
            main,
        }
    }

    fn returned(program: &JProgram, method: MethodId) -> &JExpression {
        let stmts = program.methods[method].body.statements().unwrap();
        match &stmts[0].kind {
            JStatementKind::Return(Some(e)) => e,
            other => panic!("expected return, got {:?}", other),
        }
    }

    fn called(program: &JProgram, expr: &JExpression) -> String {
        match &expr.kind {
            JExpressionKind::MethodCall { target, .. } => program.method_name(*target),
            other => panic!("expected call, got {:?}", other),
        }
    }

    #[test]
    fn test_downcast_checks_query_id() {
        let mut f = setup(JType::VOID);
        f.program.methods[f.main].return_type = JType::Declared(f.derived);
        let b = f.program.create_param(info(), f.main, "b", JType::Declared(f.base), false);
        f.program.set_body(
            f.main,
            vec![JStatement::return_stmt(
                info(),
                Some(JExpression::cast(info(), JType::Declared(f.derived), JExpression::var_ref(info(), b))),
            )],
        );

        assert!(normalize_casts(&mut f.program, false).unwrap());
        let id = f.program.query_ids[&f.derived] as i32;
        let expr = returned(&f.program, f.main);
        assert!(called(&f.program, expr).ends_with("dynamicCast"));
        let JExpressionKind::MethodCall { args, .. } = &expr.kind else {
            unreachable!()
        };
        assert_eq!(args[1].as_literal(), Some(&JLiteral::Int(id)));
    }

    #[test]
    fn test_upcast_and_unchecked_casts_disappear() {
        let mut f = setup(JType::VOID);
        f.program.methods[f.main].return_type = JType::Declared(f.base);
        let d = f.program.create_param(info(), f.main, "d", JType::Declared(f.derived), false);
        f.program.set_body(
            f.main,
            vec![JStatement::return_stmt(
                info(),
                Some(JExpression::cast(info(), JType::Declared(f.base), JExpression::var_ref(info(), d))),
            )],
        );
        normalize_casts(&mut f.program, false).unwrap();
        assert!(matches!(returned(&f.program, f.main).kind, JExpressionKind::VariableRef(v) if v == d));

        let mut f = setup(JType::VOID);
        f.program.methods[f.main].return_type = JType::Declared(f.derived);
        let b = f.program.create_param(info(), f.main, "b", JType::Declared(f.base), false);
        f.program.set_body(
            f.main,
            vec![JStatement::return_stmt(
                info(),
                Some(JExpression::cast(info(), JType::Declared(f.derived), JExpression::var_ref(info(), b))),
            )],
        );
        normalize_casts(&mut f.program, true).unwrap();
        assert!(matches!(returned(&f.program, f.main).kind, JExpressionKind::VariableRef(v) if v == b));
    }

    #[test]
    fn test_numeric_casts() {
        let mut f = setup(JType::INT);
        let l = f.program.create_param(info(), f.main, "l", JType::LONG, false);
        f.program.set_body(
            f.main,
            vec![JStatement::return_stmt(
                info(),
                Some(JExpression::cast(info(), JType::INT, JExpression::var_ref(info(), l))),
            )],
        );
        normalize_casts(&mut f.program, false).unwrap();
        assert!(called(&f.program, returned(&f.program, f.main)).ends_with("LongLib.toInt"));

        let mut f = setup(JType::BYTE);
        f.program.set_body(
            f.main,
            vec![JStatement::return_stmt(
                info(),
                Some(JExpression::cast(info(), JType::BYTE, JExpression::int_lit(info(), 200))),
            )],
        );
        normalize_casts(&mut f.program, false).unwrap();
        assert_eq!(returned(&f.program, f.main).as_literal(), Some(&JLiteral::Int(-56)));
    }

    #[test]
    fn test_int_division_is_truncated_once() {
        let mut f = setup(JType::INT);
        let a = f.program.create_param(info(), f.main, "a", JType::INT, false);
        f.program.set_body(
            f.main,
            vec![JStatement::return_stmt(
                info(),
                Some(JExpression::binary(
                    info(),
                    BinaryOp::Div,
                    JExpression::var_ref(info(), a),
                    JExpression::int_lit(info(), 2),
                    JType::INT,
                )),
            )],
        );

        assert!(normalize_casts(&mut f.program, false).unwrap());
        let expr = returned(&f.program, f.main);
        assert!(called(&f.program, expr).ends_with("narrow_int"));
        assert!(!normalize_casts(&mut f.program, false).unwrap());
    }

    #[test]
    fn test_char_concatenation_converts_to_string() {
        let mut f = setup(JType::VOID);
        let string = f.program.string_type();
        f.program.methods[f.main].return_type = string.clone();
        let c = f.program.create_param(info(), f.main, "c", JType::CHAR, false);
        f.program.set_body(
            f.main,
            vec![JStatement::return_stmt(
                info(),
                Some(JExpression::binary(
                    info(),
                    BinaryOp::Add,
                    JExpression::string_lit(info(), "c="),
                    JExpression::var_ref(info(), c),
                    string,
                )),
            )],
        );

        normalize_casts(&mut f.program, false).unwrap();
        let JExpressionKind::Binary { rhs, .. } = &returned(&f.program, f.main).kind else {
            panic!("expected concatenation");
        };
        assert!(called(&f.program, rhs).ends_with("charToString"));
    }

    #[test]
    fn test_instanceof_lowering() {
        let mut f = setup(JType::BOOLEAN);
        let object = f.program.object_type();
        let o = f.program.create_param(info(), f.main, "o", object.clone(), false);
        f.program.set_body(
            f.main,
            vec![JStatement::return_stmt(
                info(),
                Some(JExpression::instance_of(info(), JType::Declared(f.base), JExpression::var_ref(info(), o))),
            )],
        );
        normalize_casts(&mut f.program, false).unwrap();
        assert!(called(&f.program, returned(&f.program, f.main)).ends_with("instanceOf"));

        let mut f = setup(JType::BOOLEAN);
        let d = f.program.create_param(info(), f.main, "d", JType::Declared(f.derived), false);
        f.program.set_body(
            f.main,
            vec![JStatement::return_stmt(
                info(),
                Some(JExpression::instance_of(info(), JType::Declared(f.base), JExpression::var_ref(info(), d))),
            )],
        );
        normalize_casts(&mut f.program, false).unwrap();
        assert!(matches!(
            returned(&f.program, f.main).kind,
            JExpressionKind::Binary { op: BinaryOp::Neq, .. }
        ));
    }
}
