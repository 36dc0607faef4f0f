//! `assert` statements: lowered to explicit checks when assertions are
//! enabled, removed otherwise

use crate::errors::VisitResult;
use crate::jast::expression::{BinaryOp, JExpression};
use crate::jast::program::JProgram;
use crate::jast::statement::{JStatement, JStatementKind};
use crate::jast::visitor::{self, JModVisitor, StmtContext};

/// `assert t : m` => `if (!t) Exceptions.throwAssertionError(m)`
pub struct AssertionNormalizer;

impl AssertionNormalizer {
    pub fn run(&self, program: &mut JProgram) -> VisitResult<bool> {
        let mut normalizer = AssertionRewriter {
            remove: false,
            changed: false,
        };
        visitor::accept_program(&mut normalizer, program)?;
        Ok(normalizer.changed)
    }
}

/// Drops every `assert` statement
pub struct AssertionRemover;

impl AssertionRemover {
    pub fn run(&self, program: &mut JProgram) -> VisitResult<bool> {
        let mut remover = AssertionRewriter {
            remove: true,
            changed: false,
        };
        visitor::accept_program(&mut remover, program)?;
        Ok(remover.changed)
    }
}

struct AssertionRewriter {
    remove: bool,
    changed: bool,
}

impl AssertionRewriter {
    fn message_arg(program: &JProgram, message: Option<JExpression>, stmt: &JStatement) -> JExpression {
        let Some(message) = message else {
            return JExpression::null_lit(stmt.info.clone());
        };
        let string = program.string_type();
        if message.ty(program) == string {
            return message;
        }
        let info = message.info.clone();
        JExpression::binary(
            info.clone(),
            BinaryOp::Add,
            JExpression::string_lit(info, ""),
            message,
            string,
        )
    }
}

impl JModVisitor for AssertionRewriter {
    fn end_visit_stmt(&mut self, stmt: &mut JStatement, ctx: &mut StmtContext<'_>) -> VisitResult {
        let JStatementKind::Assert { test, message } = &mut stmt.kind else {
            return Ok(());
        };
        self.changed = true;
        if self.remove {
            if ctx.can_remove() {
                ctx.remove_me();
            } else {
                ctx.replace_me(JStatement::empty(stmt.info.clone()));
            }
            return Ok(());
        }

        let throw_assertion = ctx.program.indexed_method("Exceptions.throwAssertionError")?;
        let test = std::mem::replace(test, JExpression::bool_lit(stmt.info.clone(), true));
        let message = message.take();
        let arg = Self::message_arg(ctx.program, message, stmt);
        let info = stmt.info.clone();
        ctx.replace_me(JStatement::if_stmt(
            info.clone(),
            JExpression::not(test.info.clone(), test),
            JStatement::expr(JExpression::static_call(info, throw_assertion, vec![arg])),
            None,
        ));
        Ok(())
    }
}
