//! Merges the catch clauses of every try statement into a single clause
//!
//! ```text
//! try { .. } catch ($e) {
//!   $e = Exceptions.caught($e);
//!   if ($e instanceof A) { A a = $e; .. }
//!   else if ($e instanceof B) { B b = $e; .. }
//!   else throw $e;
//! }
//! ```
//!
//! A clause catching `Throwable` (or `Object`) ends the chain.

use crate::errors::{CompilationError, VisitResult};
use crate::fixpoint::OptimizationPass;
use crate::jast::declarations::MethodId;
use crate::jast::expression::JExpression;
use crate::jast::program::JProgram;
use crate::jast::statement::{JCatch, JStatement, JStatementKind};
use crate::jast::types::JType;
use crate::jast::visitor::{self, JModVisitor, StmtContext};
use crate::source_info::SourceInfo;

pub struct CatchBlockNormalizer;

impl OptimizationPass<JProgram> for CatchBlockNormalizer {
    fn name(&self) -> &'static str {
        "catch-block-normalizer"
    }

    fn run(&mut self, program: &mut JProgram) -> Result<bool, CompilationError> {
        Ok(normalize_catch_blocks(program)?)
    }
}

struct CatchMerger {
    changed: bool,
}

impl CatchMerger {
    fn catches_everything(program: &JProgram, ty: &JType) -> bool {
        program.is_object_type(ty)
            || ty
                .declared()
                .is_some_and(|t| program.index.types.get("Throwable") == Some(&t))
    }

    fn merge(
        program: &mut JProgram,
        method: MethodId,
        info: &SourceInfo,
        catches: Vec<JCatch>,
    ) -> VisitResult<JCatch> {
        let caught = program.indexed_method("Exceptions.caught")?;
        let object = program.object_type();
        let exception = program.create_local(info.clone(), method, "$e", object.clone(), false);
        let e_ref = || JExpression::var_ref(info.clone(), exception);

        let mut chain = JStatement::throw_stmt(info.clone(), e_ref());
        for catch in catches.into_iter().rev() {
            let var_ty = program.variables[catch.var].ty.clone();
            let mut body = Vec::with_capacity(catch.body.len() + 1);
            body.push(JStatement::local_decl(catch.info.clone(), catch.var, Some(e_ref())));
            body.extend(catch.body);
            let block = JStatement::block(catch.info.clone(), body);
            chain = if Self::catches_everything(program, &var_ty) {
                block
            } else {
                JStatement::if_stmt(
                    catch.info.clone(),
                    JExpression::instance_of(catch.info.clone(), var_ty, e_ref()),
                    block,
                    Some(chain),
                )
            };
        }

        let unwrap = JStatement::expr(JExpression::assign(
            info.clone(),
            e_ref(),
            JExpression::static_call(info.clone(), caught, vec![e_ref()]),
            object,
        ));
        Ok(JCatch {
            info: info.clone(),
            var: exception,
            body: vec![unwrap, chain],
        })
    }

    fn is_merged(program: &JProgram, catches: &[JCatch]) -> bool {
        match catches {
            [] => true,
            [only] => {
                let var = &program.variables[only.var];
                var.name == "$e" && program.is_object_type(&var.ty)
            }
            _ => false,
        }
    }
}

impl JModVisitor for CatchMerger {
    fn end_visit_stmt(&mut self, stmt: &mut JStatement, ctx: &mut StmtContext<'_>) -> VisitResult {
        let JStatementKind::Try { catches, .. } = &mut stmt.kind else {
            return Ok(());
        };
        if Self::is_merged(ctx.program, catches) {
            return Ok(());
        }
        let Some(method) = ctx.method else {
            return Ok(());
        };
        let merged = Self::merge(ctx.program, method, &stmt.info, std::mem::take(catches))?;
        catches.push(merged);
        self.changed = true;
        Ok(())
    }
}

pub fn normalize_catch_blocks(program: &mut JProgram) -> VisitResult<bool> {
    let mut merger = CatchMerger { changed: false };
    visitor::accept_program(&mut merger, program)?;
    Ok(merger.changed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::jast::declarations::MethodFlags;
    use crate::jast::expression::JExpressionKind;
    use crate::jast::runtime;

    fn info() -> SourceInfo {
        SourceInfo::unknown()
    }

    #[test]
    fn test_two_catches_become_instanceof_chain() {
        let mut program = JProgram::new(false);
        runtime::install(&mut program);
        let object = program.indexed_type("Object").unwrap();
        let throwable = program.indexed_type("Throwable").unwrap();
        let class_cast = program.indexed_type("ClassCastException").unwrap();
        let app = program.create_class(info(), "app.Main", Some(object), false, false);
        let main = program.create_method(info(), app, "main", JType::VOID, MethodFlags::static_method());
        let cce = program.create_local(info(), main, "cce", JType::Declared(class_cast), false);
        let any = program.create_local(info(), main, "t", JType::Declared(throwable), false);
        program.set_body(
            main,
            vec![JStatement::new(
                info(),
                JStatementKind::Try {
                    block: vec![],
                    catches: vec![
                        JCatch {
                            info: info(),
                            var: cce,
                            body: vec![],
                        },
                        JCatch {
                            info: info(),
                            var: any,
                            body: vec![],
                        },
                    ],
                    finally: None,
                },
            )],
        );

        assert!(normalize_catch_blocks(&mut program).unwrap());
        let stmts = program.methods[main].body.statements().unwrap();
        let JStatementKind::Try { catches, .. } = &stmts[0].kind else {
            panic!("expected try");
        };
        assert_eq!(catches.len(), 1);
        let merged = &catches[0];
        assert_eq!(program.variables[merged.var].name, "$e");
        assert_eq!(merged.body.len(), 2);
        let JStatementKind::If { cond, else_stmt, .. } = &merged.body[1].kind else {
            panic!("expected instanceof chain");
        };
        assert!(matches!(cond.kind, JExpressionKind::InstanceOf { .. }));
        // Throwable ends the chain without a test or a rethrow
        let else_stmt = else_stmt.as_ref().unwrap();
        assert!(matches!(&else_stmt.kind, JStatementKind::Block(body) if body.len() == 1));

        assert!(!normalize_catch_blocks(&mut program).unwrap());
    }
}
