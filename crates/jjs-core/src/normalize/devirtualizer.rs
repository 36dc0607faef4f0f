//! Calls that cannot go through a prototype: string methods and the Object
//! methods on receivers that may be strings or arrays

use crate::errors::{CompilationError, VisitResult};
use crate::fixpoint::OptimizationPass;
use crate::jast::expression::{JExpression, JExpressionKind};
use crate::jast::program::JProgram;
use crate::jast::types::JType;
use crate::jast::visitor::{self, ExprContext, JModVisitor};

pub struct Devirtualizer;

impl OptimizationPass<JProgram> for Devirtualizer {
    fn name(&self) -> &'static str {
        "devirtualizer"
    }

    fn run(&mut self, program: &mut JProgram) -> Result<bool, CompilationError> {
        Ok(devirtualize(program)?)
    }
}

struct CallRewriter {
    changed: bool,
}

/// A value of this type may be a JavaScript string or array at runtime
fn may_be_primitive_object(program: &JProgram, ty: &JType) -> bool {
    ty.is_array() || program.is_object_type(ty) || program.is_string_type(ty)
}

impl JModVisitor for CallRewriter {
    fn end_visit_expr(&mut self, expr: &mut JExpression, ctx: &mut ExprContext<'_>) -> VisitResult {
        let JExpressionKind::MethodCall {
            instance: Some(instance),
            target,
            args,
            static_dispatch: false,
        } = &mut expr.kind
        else {
            return Ok(());
        };
        let program = &*ctx.program;
        let Some(helper) = program.devirtualized.get(&*target).copied() else {
            return Ok(());
        };
        let owner = JType::Declared(program.methods[*target].enclosing_type);
        let receiver = instance.ty(program);
        let rewrite = program.is_string_type(&owner) || may_be_primitive_object(program, &receiver);
        if !rewrite {
            return Ok(());
        }

        tracing::trace!(
            from = %program.method_name(*target),
            to = %program.method_name(helper),
            "devirtualized call"
        );
        let receiver = std::mem::replace(instance.as_mut(), JExpression::null_lit(expr.info.clone()));
        let mut all_args = Vec::with_capacity(args.len() + 1);
        all_args.push(receiver);
        all_args.append(args);
        ctx.replace_me(JExpression::static_call(expr.info.clone(), helper, all_args));
        self.changed = true;
        Ok(())
    }
}

pub fn devirtualize(program: &mut JProgram) -> VisitResult<bool> {
    let mut rewriter = CallRewriter { changed: false };
    visitor::accept_program(&mut rewriter, program)?;
    Ok(rewriter.changed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::jast::declarations::{MethodFlags, MethodId};
    use crate::jast::runtime;
    use crate::jast::statement::{JStatement, JStatementKind};
    use crate::jast::types::TypeId;
    use crate::source_info::SourceInfo;

    fn info() -> SourceInfo {
        SourceInfo::unknown()
    }

    fn call_target(program: &JProgram, method: MethodId) -> (MethodId, usize, bool) {
        let stmts = program.methods[method].body.statements().unwrap();
        match &stmts[0].kind {
            JStatementKind::Expression(JExpression {
                kind: JExpressionKind::MethodCall { target, args, instance, .. },
                ..
            }) => (*target, args.len(), instance.is_some()),
            other => panic!("expected call, got {:?}", other),
        }
    }

    fn setup() -> (JProgram, TypeId, MethodId) {
        let mut program = JProgram::new(false);
        runtime::install(&mut program);
        let object = program.indexed_type("Object").unwrap();
        let app = program.create_class(info(), "app.Main", Some(object), false, false);
        let main = program.create_method(info(), app, "main", JType::VOID, MethodFlags::static_method());
        (program, app, main)
    }

    #[test]
    fn test_string_call_uses_static_helper() {
        let (mut program, _, main) = setup();
        let string = program.string_type();
        let s = program.create_param(info(), main, "s", string, false);
        let length = program.indexed_method("String.length").unwrap();
        program.set_body(
            main,
            vec![JStatement::expr(JExpression::call(
                info(),
                Some(JExpression::var_ref(info(), s)),
                length,
                vec![],
            ))],
        );

        assert!(devirtualize(&mut program).unwrap());
        let helper = program.indexed_method("String.$length").unwrap();
        assert_eq!(call_target(&program, main), (helper, 1, false));
        assert!(!devirtualize(&mut program).unwrap());
    }

    #[test]
    fn test_object_receiver_uses_dispatch_helper() {
        let (mut program, _, main) = setup();
        let object = program.object_type();
        let o = program.create_param(info(), main, "o", object, false);
        let to_string = program.indexed_method("Object.toString").unwrap();
        program.set_body(
            main,
            vec![JStatement::expr(JExpression::call(
                info(),
                Some(JExpression::var_ref(info(), o)),
                to_string,
                vec![],
            ))],
        );

        assert!(devirtualize(&mut program).unwrap());
        let helper = program.indexed_method("Object.$toString").unwrap();
        assert_eq!(call_target(&program, main), (helper, 1, false));
    }

    #[test]
    fn test_user_class_receiver_keeps_virtual_call() {
        let (mut program, app, main) = setup();
        let me = program.create_param(info(), main, "me", JType::Declared(app), false);
        let hash_code = program.indexed_method("Object.hashCode").unwrap();
        program.set_body(
            main,
            vec![JStatement::expr(JExpression::call(
                info(),
                Some(JExpression::var_ref(info(), me)),
                hash_code,
                vec![],
            ))],
        );

        // support library bodies may still be rewritten; only main is checked
        devirtualize(&mut program).unwrap();
        assert_eq!(call_target(&program, main), (hash_code, 0, true));
    }
}
