//! Array allocation and covariant store checks through the `Array` runtime
//! class
//!
//! ```text
//! new T[n]         => Array.initDim(n, seed, queryId)
//! new T[n][m]      => Array.initDims([n, m], seed, queryId)
//! new T[] {a, b}   => Array.initValues([a, b], queryId)
//! a[i] = v         => Array.setCheck(a, i, v)
//! ```
//!
//! The seed picks the default element value; the query id is that of the
//! innermost allocated element type, or -1 when stores never need a check.
//! Query ids must already be assigned.

use crate::errors::{CompilationError, VisitResult};
use crate::fixpoint::OptimizationPass;
use crate::jast::expression::{BinaryOp, JExpression, JExpressionKind};
use crate::jast::program::JProgram;
use crate::jast::runtime;
use crate::jast::type_oracle::TypeOracle;
use crate::jast::types::JType;
use crate::jast::visitor::{self, ExprContext, JModVisitor};
use crate::normalize::casts::query_id;
use crate::source_info::SourceInfo;

pub struct ArrayNormalizer;

impl OptimizationPass<JProgram> for ArrayNormalizer {
    fn name(&self) -> &'static str {
        "array-normalizer"
    }

    fn run(&mut self, program: &mut JProgram) -> Result<bool, CompilationError> {
        Ok(normalize_arrays(program)?)
    }
}

/// Element types whose arrays carry a query id for store checks
fn is_checked_element(program: &JProgram, element: &JType) -> bool {
    element.declared().is_some()
        && !program.is_object_type(element)
        && !program.is_string_type(element)
}

fn element_query_id(program: &JProgram, element: &JType) -> i32 {
    if is_checked_element(program, element) {
        query_id(program, element)
    } else {
        -1
    }
}

/// The type of the elements created by allocating `dims` dimensions of `ty`
fn allocated_element(ty: &JType, dims: usize) -> JType {
    let mut current = ty;
    for _ in 0..dims {
        match current.element_type() {
            Some(element) => current = element,
            None => break,
        }
    }
    current.clone()
}

struct ArrayRewriter {
    oracle: TypeOracle,
    changed: bool,
}

impl ArrayRewriter {
    fn lower_allocation(
        program: &JProgram,
        info: &SourceInfo,
        ty: &JType,
        mut dims: Vec<JExpression>,
    ) -> VisitResult<JExpression> {
        let element = allocated_element(ty, dims.len());
        let seed = JExpression::int_lit(info.clone(), runtime::seed_for(&element));
        let id = JExpression::int_lit(info.clone(), element_query_id(program, &element));
        if dims.len() == 1 {
            let init_dim = program.indexed_method("Array.initDim")?;
            let mut args = Vec::with_capacity(3);
            args.append(&mut dims);
            args.push(seed);
            args.push(id);
            return Ok(JExpression::static_call(info.clone(), init_dim, args));
        }
        let init_dims = program.indexed_method("Array.initDims")?;
        let lengths = JExpression::new_array(info.clone(), JType::array_of(JType::INT), vec![], Some(dims));
        Ok(JExpression::static_call(info.clone(), init_dims, vec![lengths, seed, id]))
    }

    /// A store into an array of this static type may violate covariance
    fn needs_store_check(&self, program: &JProgram, array_ty: &JType) -> bool {
        let Some(element) = array_ty.element_type() else {
            return false;
        };
        let Some(t) = element.declared() else {
            return false;
        };
        is_checked_element(program, element)
            && !program.types[t].is_final
            && (program.types[t].is_interface() || self.oracle.has_subtypes(t))
    }
}

impl JModVisitor for ArrayRewriter {
    fn end_visit_expr(&mut self, expr: &mut JExpression, ctx: &mut ExprContext<'_>) -> VisitResult {
        let program = &*ctx.program;
        let info = expr.info.clone();
        let replacement = match &mut expr.kind {
            JExpressionKind::NewArray {
                ty,
                dims,
                initializers: None,
            } if !dims.is_empty() => Self::lower_allocation(program, &info, ty, std::mem::take(dims))?,
            JExpressionKind::NewArray {
                ty,
                initializers: Some(values),
                ..
            } => {
                let Some(element) = ty.element_type() else {
                    return Ok(());
                };
                if !is_checked_element(program, element) {
                    return Ok(());
                }
                let id = JExpression::int_lit(info.clone(), element_query_id(program, element));
                // The bare literal is typed Object[] so it is not wrapped twice
                let literal = JExpression::new_array(
                    info.clone(),
                    JType::array_of(program.object_type()),
                    vec![],
                    Some(std::mem::take(values)),
                );
                let init_values = program.indexed_method("Array.initValues")?;
                JExpression::static_call(info.clone(), init_values, vec![literal, id])
            }
            JExpressionKind::Binary {
                op: BinaryOp::Assign,
                lhs,
                rhs,
                ..
            } => {
                if rhs.is_null_literal() {
                    return Ok(());
                }
                let JExpressionKind::ArrayRef { array, index } = &mut lhs.kind else {
                    return Ok(());
                };
                if !self.needs_store_check(program, &array.ty(program)) {
                    return Ok(());
                }
                let null = || JExpression::null_lit(info.clone());
                let args = vec![
                    std::mem::replace(array.as_mut(), null()),
                    std::mem::replace(index.as_mut(), null()),
                    std::mem::replace(rhs.as_mut(), null()),
                ];
                let set_check = program.indexed_method("Array.setCheck")?;
                JExpression::static_call(info.clone(), set_check, args)
            }
            _ => return Ok(()),
        };
        ctx.replace_me(replacement);
        self.changed = true;
        Ok(())
    }
}

pub fn normalize_arrays(program: &mut JProgram) -> VisitResult<bool> {
    let mut rewriter = ArrayRewriter {
        oracle: TypeOracle::build(program),
        changed: false,
    };
    visitor::accept_program(&mut rewriter, program)?;
    Ok(rewriter.changed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::jast::declarations::{MethodFlags, MethodId};
    use crate::jast::expression::JLiteral;
    use crate::jast::statement::{JStatement, JStatementKind};
    use crate::jast::types::TypeId;
    use crate::normalize::casts::assign_query_ids;

    fn info() -> SourceInfo {
        SourceInfo::unknown()
    }

    fn setup() -> (JProgram, TypeId, MethodId) {
        let mut program = JProgram::new(false);
        runtime::install(&mut program);
        let object = program.indexed_type("Object").unwrap();
        let shape = program.create_class(info(), "app.Shape", Some(object), true, false);
        program.create_class(info(), "app.Circle", Some(shape), false, false);
        let main = program.create_method(info(), shape, "main", JType::VOID, MethodFlags::static_method());
        (program, shape, main)
    }

    fn first_expr(program: &JProgram, method: MethodId) -> &JExpression {
        let stmts = program.methods[method].body.statements().unwrap();
        match &stmts[0].kind {
            JStatementKind::Expression(e) | JStatementKind::Return(Some(e)) => e,
            other => panic!("expected expression, got {:?}", other),
        }
    }

    fn call_parts(program: &JProgram, expr: &JExpression) -> (String, Vec<JExpression>) {
        match &expr.kind {
            JExpressionKind::MethodCall { target, args, .. } => (program.method_name(*target), args.clone()),
            other => panic!("expected call, got {:?}", other),
        }
    }

    #[test]
    fn test_single_dimension_uses_init_dim() {
        let (mut program, shape, main) = setup();
        program.set_body(
            main,
            vec![JStatement::expr(JExpression::new_array(
                info(),
                JType::array_of(JType::Declared(shape)),
                vec![JExpression::int_lit(info(), 4)],
                None,
            ))],
        );
        assign_query_ids(&mut program);
        let id = program.query_ids[&shape] as i32;

        assert!(normalize_arrays(&mut program).unwrap());
        let (name, args) = call_parts(&program, first_expr(&program, main));
        assert!(name.ends_with("initDim"));
        assert_eq!(args[1].as_literal(), Some(&JLiteral::Int(runtime::SEED_NULL)));
        assert_eq!(args[2].as_literal(), Some(&JLiteral::Int(id)));
    }

    #[test]
    fn test_multi_dimension_uses_init_dims() {
        let (mut program, _, main) = setup();
        program.set_body(
            main,
            vec![JStatement::expr(JExpression::new_array(
                info(),
                JType::array_of(JType::array_of(JType::LONG)),
                vec![JExpression::int_lit(info(), 2), JExpression::int_lit(info(), 3)],
                None,
            ))],
        );

        normalize_arrays(&mut program).unwrap();
        let (name, args) = call_parts(&program, first_expr(&program, main));
        assert!(name.ends_with("initDims"));
        assert!(matches!(&args[0].kind, JExpressionKind::NewArray { initializers: Some(v), .. } if v.len() == 2));
        assert_eq!(args[1].as_literal(), Some(&JLiteral::Int(runtime::SEED_LONG)));
        assert_eq!(args[2].as_literal(), Some(&JLiteral::Int(-1)));
    }

    #[test]
    fn test_store_into_covariant_array_is_checked() {
        let (mut program, shape, main) = setup();
        let shapes = program.create_param(info(), main, "shapes", JType::array_of(JType::Declared(shape)), false);
        let s = program.create_param(info(), main, "s", JType::Declared(shape), false);
        program.set_body(
            main,
            vec![JStatement::expr(JExpression::assign(
                info(),
                JExpression::array_ref(info(), JExpression::var_ref(info(), shapes), JExpression::int_lit(info(), 0)),
                JExpression::var_ref(info(), s),
                JType::Declared(shape),
            ))],
        );

        assert!(normalize_arrays(&mut program).unwrap());
        let (name, args) = call_parts(&program, first_expr(&program, main));
        assert!(name.ends_with("setCheck"));
        assert_eq!(args.len(), 3);
    }

    #[test]
    fn test_initializer_array_wrapped_once() {
        let (mut program, shape, main) = setup();
        program.set_body(
            main,
            vec![JStatement::expr(JExpression::new_array(
                info(),
                JType::array_of(JType::Declared(shape)),
                vec![],
                Some(vec![JExpression::null_lit(info())]),
            ))],
        );
        assign_query_ids(&mut program);

        assert!(normalize_arrays(&mut program).unwrap());
        let (name, _) = call_parts(&program, first_expr(&program, main));
        assert!(name.ends_with("initValues"));
        assert!(!normalize_arrays(&mut program).unwrap());
    }
}
