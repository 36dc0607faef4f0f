//! Traversal of method bodies
//!
//! [`JVisitor`] observes; [`JModVisitor`] rewrites. Both see statements and
//! expressions in source order, with a pre-order hook that decides whether to
//! descend and a post-order hook.
//!
//! Mutating hooks receive a context owning `&mut JProgram` for the duration
//! of the hook. A replacement requested from a pre-order hook is installed
//! without being traversed; one requested from a post-order hook takes effect
//! when control returns to the parent. Removal and insertion are only legal
//! in statement lists, and an lvalue slot only accepts assignable
//! expressions; violations fail immediately with an internal compiler error.
//!
//! Every frame that an error passes through appends itself to the error's
//! node trace.

use crate::errors::{InternalCompilerError, VisitResult};
use crate::jast::declarations::MethodId;
use crate::jast::expression::{JExpression, JExpressionKind};
use crate::jast::program::JProgram;
use crate::jast::statement::{JStatement, JStatementKind};
use crate::jast::to_source;

// ----------------------------------------------------------------------
// Read-only traversal
// ----------------------------------------------------------------------

/// Where a read-only hook is running
#[derive(Clone, Copy)]
pub struct VisitCx<'a> {
    pub program: &'a JProgram,
    pub method: Option<MethodId>,
    /// The expression is being written
    pub lvalue: bool,
}

pub trait JVisitor {
    fn visit_method(&mut self, _method: MethodId, _program: &JProgram) -> bool {
        true
    }

    fn end_visit_method(&mut self, _method: MethodId, _program: &JProgram) {}

    fn visit_stmt(&mut self, _stmt: &JStatement, _cx: VisitCx<'_>) -> bool {
        true
    }

    fn end_visit_stmt(&mut self, _stmt: &JStatement, _cx: VisitCx<'_>) {}

    fn visit_expr(&mut self, _expr: &JExpression, _cx: VisitCx<'_>) -> bool {
        true
    }

    fn end_visit_expr(&mut self, _expr: &JExpression, _cx: VisitCx<'_>) {}
}

/// Visit every live method
pub fn visit_program<V: JVisitor + ?Sized>(visitor: &mut V, program: &JProgram) {
    for method in program.live_methods() {
        visit_method(visitor, program, method);
    }
}

pub fn visit_method<V: JVisitor + ?Sized>(visitor: &mut V, program: &JProgram, method: MethodId) {
    if visitor.visit_method(method, program) {
        if let Some(stmts) = program.methods[method].body.statements() {
            let cx = VisitCx {
                program,
                method: Some(method),
                lvalue: false,
            };
            visit_stmts(visitor, stmts, cx);
        }
    }
    visitor.end_visit_method(method, program);
}

pub fn visit_stmts<V: JVisitor + ?Sized>(visitor: &mut V, stmts: &[JStatement], cx: VisitCx<'_>) {
    for stmt in stmts {
        visit_stmt(visitor, stmt, cx);
    }
}

pub fn visit_stmt<V: JVisitor + ?Sized>(visitor: &mut V, stmt: &JStatement, cx: VisitCx<'_>) {
    if visitor.visit_stmt(stmt, cx) {
        match &stmt.kind {
            JStatementKind::Block(stmts) => visit_stmts(visitor, stmts, cx),
            JStatementKind::LocalDecl { init, .. } => {
                if let Some(init) = init {
                    visit_expr(visitor, init, cx);
                }
            }
            JStatementKind::Expression(expr) | JStatementKind::Throw(expr) => {
                visit_expr(visitor, expr, cx)
            }
            JStatementKind::If {
                cond,
                then_stmt,
                else_stmt,
            } => {
                visit_expr(visitor, cond, cx);
                visit_stmt(visitor, then_stmt, cx);
                if let Some(else_stmt) = else_stmt {
                    visit_stmt(visitor, else_stmt, cx);
                }
            }
            JStatementKind::While { cond, body } => {
                visit_expr(visitor, cond, cx);
                visit_stmt(visitor, body, cx);
            }
            JStatementKind::DoWhile { body, cond } => {
                visit_stmt(visitor, body, cx);
                visit_expr(visitor, cond, cx);
            }
            JStatementKind::For {
                init,
                cond,
                increments,
                body,
            } => {
                visit_stmts(visitor, init, cx);
                if let Some(cond) = cond {
                    visit_expr(visitor, cond, cx);
                }
                visit_stmt(visitor, body, cx);
                for inc in increments {
                    visit_expr(visitor, inc, cx);
                }
            }
            JStatementKind::Return(value) => {
                if let Some(value) = value {
                    visit_expr(visitor, value, cx);
                }
            }
            JStatementKind::Try {
                block,
                catches,
                finally,
            } => {
                visit_stmts(visitor, block, cx);
                for catch in catches {
                    visit_stmts(visitor, &catch.body, cx);
                }
                if let Some(finally) = finally {
                    visit_stmts(visitor, finally, cx);
                }
            }
            JStatementKind::Break(_) | JStatementKind::Continue(_) => {}
            JStatementKind::Label { body, .. } => visit_stmt(visitor, body, cx),
            JStatementKind::Switch { expr, cases } => {
                visit_expr(visitor, expr, cx);
                for case in cases {
                    visit_stmts(visitor, &case.body, cx);
                }
            }
            JStatementKind::Assert { test, message } => {
                visit_expr(visitor, test, cx);
                if let Some(message) = message {
                    visit_expr(visitor, message, cx);
                }
            }
        }
    }
    visitor.end_visit_stmt(stmt, cx);
}

pub fn visit_expr<V: JVisitor + ?Sized>(visitor: &mut V, expr: &JExpression, cx: VisitCx<'_>) {
    let here = VisitCx { lvalue: false, ..cx };
    if visitor.visit_expr(expr, cx) {
        let lvalue = VisitCx { lvalue: true, ..cx };
        match &expr.kind {
            JExpressionKind::Binary { op, lhs, rhs, .. } if op.is_assignment() => {
                visit_expr(visitor, lhs, lvalue);
                visit_expr(visitor, rhs, here);
            }
            JExpressionKind::Unary { op, arg } if op.is_modifying() => {
                visit_expr(visitor, arg, lvalue);
            }
            _ => expr.for_each_child(&mut |child| visit_expr(visitor, child, here)),
        }
    }
    visitor.end_visit_expr(expr, cx);
}

// ----------------------------------------------------------------------
// Mutating traversal
// ----------------------------------------------------------------------

/// Context handed to expression hooks of a [`JModVisitor`]
pub struct ExprContext<'a> {
    pub program: &'a mut JProgram,
    pub method: Option<MethodId>,
    lvalue: bool,
    replacement: Option<JExpression>,
}

impl<'a> ExprContext<'a> {
    fn new(program: &'a mut JProgram, method: Option<MethodId>, lvalue: bool) -> Self {
        Self {
            program,
            method,
            lvalue,
            replacement: None,
        }
    }

    /// The expression sits in an assignment target position
    pub fn is_lvalue(&self) -> bool {
        self.lvalue
    }

    pub fn replace_me(&mut self, replacement: JExpression) {
        self.replacement = Some(replacement);
    }

    pub fn did_change(&self) -> bool {
        self.replacement.is_some()
    }
}

enum StmtAction {
    Replace(JStatement),
    Remove,
}

/// Context handed to statement hooks of a [`JModVisitor`]
pub struct StmtContext<'a> {
    pub program: &'a mut JProgram,
    pub method: Option<MethodId>,
    in_list: bool,
    action: Option<StmtAction>,
    before: Vec<JStatement>,
    after: Vec<JStatement>,
}

impl<'a> StmtContext<'a> {
    fn new(program: &'a mut JProgram, method: Option<MethodId>, in_list: bool) -> Self {
        Self {
            program,
            method,
            in_list,
            action: None,
            before: Vec::new(),
            after: Vec::new(),
        }
    }

    /// Removal and insertion are allowed here
    pub fn can_remove(&self) -> bool {
        self.in_list
    }

    pub fn replace_me(&mut self, replacement: JStatement) {
        self.action = Some(StmtAction::Replace(replacement));
    }

    pub fn remove_me(&mut self) {
        self.action = Some(StmtAction::Remove);
    }

    pub fn insert_before(&mut self, stmt: JStatement) {
        self.before.push(stmt);
    }

    pub fn insert_after(&mut self, stmt: JStatement) {
        self.after.push(stmt);
    }

    fn check_slot(&self) -> VisitResult {
        if self.in_list {
            return Ok(());
        }
        if matches!(self.action, Some(StmtAction::Remove)) {
            return Err(InternalCompilerError::new(
                "cannot remove a statement from a single-statement slot",
            ));
        }
        if !self.before.is_empty() || !self.after.is_empty() {
            return Err(InternalCompilerError::new(
                "cannot insert statements around a single-statement slot",
            ));
        }
        Ok(())
    }
}

/// Accumulated outcome of both hooks on one statement
#[derive(Default)]
struct StmtOutcome {
    action: Option<StmtAction>,
    before: Vec<JStatement>,
    after: Vec<JStatement>,
}

impl StmtOutcome {
    fn absorb(&mut self, ctx: StmtContext<'_>) {
        if ctx.action.is_some() {
            self.action = ctx.action;
        }
        self.before.extend(ctx.before);
        self.after.extend(ctx.after);
    }
}

pub trait JModVisitor {
    fn visit_method(&mut self, _method: MethodId, _program: &mut JProgram) -> VisitResult<bool> {
        Ok(true)
    }

    fn end_visit_method(&mut self, _method: MethodId, _program: &mut JProgram) -> VisitResult {
        Ok(())
    }

    fn visit_stmt(&mut self, _stmt: &mut JStatement, _ctx: &mut StmtContext<'_>) -> VisitResult<bool> {
        Ok(true)
    }

    fn end_visit_stmt(&mut self, _stmt: &mut JStatement, _ctx: &mut StmtContext<'_>) -> VisitResult {
        Ok(())
    }

    fn visit_expr(&mut self, _expr: &mut JExpression, _ctx: &mut ExprContext<'_>) -> VisitResult<bool> {
        Ok(true)
    }

    fn end_visit_expr(&mut self, _expr: &mut JExpression, _ctx: &mut ExprContext<'_>) -> VisitResult {
        Ok(())
    }
}

/// Rewrite every live method
pub fn accept_program<V: JModVisitor + ?Sized>(visitor: &mut V, program: &mut JProgram) -> VisitResult {
    for method in program.live_methods() {
        accept_method(visitor, program, method)?;
    }
    Ok(())
}

pub fn accept_method<V: JModVisitor + ?Sized>(
    visitor: &mut V,
    program: &mut JProgram,
    method: MethodId,
) -> VisitResult {
    let result = accept_method_inner(visitor, program, method);
    result.map_err(|err| {
        let info = program.methods[method].info.clone();
        let name = program.method_name(method);
        err.with_node("Method", Some(&info), |_| Ok(name))
    })
}

fn accept_method_inner<V: JModVisitor + ?Sized>(
    visitor: &mut V,
    program: &mut JProgram,
    method: MethodId,
) -> VisitResult {
    if visitor.visit_method(method, program)? {
        if let Some(mut body) = program.take_body(method) {
            let result = accept_stmts(visitor, program, Some(method), &mut body);
            program.restore_body(method, body);
            result?;
        }
    }
    visitor.end_visit_method(method, program)
}

/// Rewrite a statement list, applying removals and insertions
pub fn accept_stmts<V: JModVisitor + ?Sized>(
    visitor: &mut V,
    program: &mut JProgram,
    method: Option<MethodId>,
    stmts: &mut Vec<JStatement>,
) -> VisitResult {
    let mut i = 0;
    while i < stmts.len() {
        let outcome = match accept_stmt_hooks(visitor, program, method, &mut stmts[i], true) {
            Ok(outcome) => outcome,
            Err(err) => return Err(trace_stmt(err, program, &stmts[i])),
        };
        let inserted_before = outcome.before.len();
        for (offset, stmt) in outcome.before.into_iter().enumerate() {
            stmts.insert(i + offset, stmt);
        }
        i += inserted_before;
        match outcome.action {
            Some(StmtAction::Replace(replacement)) => {
                stmts[i] = replacement;
                i += 1;
            }
            Some(StmtAction::Remove) => {
                stmts.remove(i);
            }
            None => i += 1,
        }
        let inserted_after = outcome.after.len();
        for (offset, stmt) in outcome.after.into_iter().enumerate() {
            stmts.insert(i + offset, stmt);
        }
        i += inserted_after;
    }
    Ok(())
}

/// Rewrite a single-statement slot such as a loop body
pub fn accept_stmt<V: JModVisitor + ?Sized>(
    visitor: &mut V,
    program: &mut JProgram,
    method: Option<MethodId>,
    stmt: &mut JStatement,
) -> VisitResult {
    let outcome = match accept_stmt_hooks(visitor, program, method, stmt, false) {
        Ok(outcome) => outcome,
        Err(err) => return Err(trace_stmt(err, program, stmt)),
    };
    if let Some(StmtAction::Replace(replacement)) = outcome.action {
        *stmt = replacement;
    }
    Ok(())
}

fn accept_stmt_hooks<V: JModVisitor + ?Sized>(
    visitor: &mut V,
    program: &mut JProgram,
    method: Option<MethodId>,
    stmt: &mut JStatement,
    in_list: bool,
) -> VisitResult<StmtOutcome> {
    let mut outcome = StmtOutcome::default();

    let mut ctx = StmtContext::new(program, method, in_list);
    let descend = visitor.visit_stmt(stmt, &mut ctx)?;
    ctx.check_slot()?;
    outcome.absorb(ctx);
    if outcome.action.is_some() {
        return Ok(outcome);
    }

    if descend {
        accept_stmt_children(visitor, program, method, stmt)?;
    }

    let mut ctx = StmtContext::new(program, method, in_list);
    visitor.end_visit_stmt(stmt, &mut ctx)?;
    ctx.check_slot()?;
    outcome.absorb(ctx);
    Ok(outcome)
}

fn accept_stmt_children<V: JModVisitor + ?Sized>(
    visitor: &mut V,
    program: &mut JProgram,
    method: Option<MethodId>,
    stmt: &mut JStatement,
) -> VisitResult {
    match &mut stmt.kind {
        JStatementKind::Block(stmts) => accept_stmts(visitor, program, method, stmts)?,
        JStatementKind::LocalDecl { init, .. } => {
            if let Some(init) = init {
                accept_expr(visitor, program, method, init)?;
            }
        }
        JStatementKind::Expression(expr) | JStatementKind::Throw(expr) => {
            accept_expr(visitor, program, method, expr)?
        }
        JStatementKind::If {
            cond,
            then_stmt,
            else_stmt,
        } => {
            accept_expr(visitor, program, method, cond)?;
            accept_stmt(visitor, program, method, then_stmt)?;
            if let Some(else_stmt) = else_stmt {
                accept_stmt(visitor, program, method, else_stmt)?;
            }
        }
        JStatementKind::While { cond, body } => {
            accept_expr(visitor, program, method, cond)?;
            accept_stmt(visitor, program, method, body)?;
        }
        JStatementKind::DoWhile { body, cond } => {
            accept_stmt(visitor, program, method, body)?;
            accept_expr(visitor, program, method, cond)?;
        }
        JStatementKind::For {
            init,
            cond,
            increments,
            body,
        } => {
            accept_stmts(visitor, program, method, init)?;
            if let Some(cond) = cond {
                accept_expr(visitor, program, method, cond)?;
            }
            accept_stmt(visitor, program, method, body)?;
            for inc in increments {
                accept_expr(visitor, program, method, inc)?;
            }
        }
        JStatementKind::Return(value) => {
            if let Some(value) = value {
                accept_expr(visitor, program, method, value)?;
            }
        }
        JStatementKind::Try {
            block,
            catches,
            finally,
        } => {
            accept_stmts(visitor, program, method, block)?;
            for catch in catches {
                accept_stmts(visitor, program, method, &mut catch.body)?;
            }
            if let Some(finally) = finally {
                accept_stmts(visitor, program, method, finally)?;
            }
        }
        JStatementKind::Break(_) | JStatementKind::Continue(_) => {}
        JStatementKind::Label { body, .. } => accept_stmt(visitor, program, method, body)?,
        JStatementKind::Switch { expr, cases } => {
            accept_expr(visitor, program, method, expr)?;
            for case in cases {
                accept_stmts(visitor, program, method, &mut case.body)?;
            }
        }
        JStatementKind::Assert { test, message } => {
            accept_expr(visitor, program, method, test)?;
            if let Some(message) = message {
                accept_expr(visitor, program, method, message)?;
            }
        }
    }
    Ok(())
}

/// Rewrite an expression in an rvalue slot
pub fn accept_expr<V: JModVisitor + ?Sized>(
    visitor: &mut V,
    program: &mut JProgram,
    method: Option<MethodId>,
    expr: &mut JExpression,
) -> VisitResult {
    accept_expr_slot(visitor, program, method, expr, false)
}

fn accept_expr_slot<V: JModVisitor + ?Sized>(
    visitor: &mut V,
    program: &mut JProgram,
    method: Option<MethodId>,
    expr: &mut JExpression,
    lvalue: bool,
) -> VisitResult {
    match accept_expr_hooks(visitor, program, method, expr, lvalue) {
        Ok(()) => Ok(()),
        Err(err) => {
            let info = expr.info.clone();
            let program: &JProgram = program;
            Err(err.with_node(expr.kind_name(), Some(&info), |guard| {
                to_source::describe_expr(program, expr, guard)
            }))
        }
    }
}

fn accept_expr_hooks<V: JModVisitor + ?Sized>(
    visitor: &mut V,
    program: &mut JProgram,
    method: Option<MethodId>,
    expr: &mut JExpression,
    lvalue: bool,
) -> VisitResult {
    let mut ctx = ExprContext::new(program, method, lvalue);
    let descend = visitor.visit_expr(expr, &mut ctx)?;
    if let Some(replacement) = ctx.replacement.take() {
        return install(expr, replacement, lvalue);
    }

    if descend {
        accept_expr_children(visitor, program, method, expr)?;
    }

    let mut ctx = ExprContext::new(program, method, lvalue);
    visitor.end_visit_expr(expr, &mut ctx)?;
    if let Some(replacement) = ctx.replacement.take() {
        return install(expr, replacement, lvalue);
    }
    Ok(())
}

fn install(slot: &mut JExpression, replacement: JExpression, lvalue: bool) -> VisitResult {
    if lvalue && !replacement.is_lvalue() {
        return Err(InternalCompilerError::new(format!(
            "cannot replace an assignment target with a {} expression",
            replacement.kind_name()
        )));
    }
    *slot = replacement;
    Ok(())
}

fn accept_expr_children<V: JModVisitor + ?Sized>(
    visitor: &mut V,
    program: &mut JProgram,
    method: Option<MethodId>,
    expr: &mut JExpression,
) -> VisitResult {
    match &mut expr.kind {
        JExpressionKind::Literal(_) | JExpressionKind::VariableRef(_) | JExpressionKind::This(_) => {}
        JExpressionKind::FieldRef { instance, .. } => {
            if let Some(instance) = instance {
                accept_expr(visitor, program, method, instance)?;
            }
        }
        JExpressionKind::MethodCall { instance, args, .. } => {
            if let Some(instance) = instance {
                accept_expr(visitor, program, method, instance)?;
            }
            for arg in args {
                accept_expr(visitor, program, method, arg)?;
            }
        }
        JExpressionKind::NewInstance { args, .. } => {
            for arg in args {
                accept_expr(visitor, program, method, arg)?;
            }
        }
        JExpressionKind::NewArray {
            dims, initializers, ..
        } => {
            for dim in dims {
                accept_expr(visitor, program, method, dim)?;
            }
            if let Some(inits) = initializers {
                for init in inits {
                    accept_expr(visitor, program, method, init)?;
                }
            }
        }
        JExpressionKind::ArrayRef { array, index } => {
            accept_expr(visitor, program, method, array)?;
            accept_expr(visitor, program, method, index)?;
        }
        JExpressionKind::ArrayLength(array) => accept_expr(visitor, program, method, array)?,
        JExpressionKind::Binary { op, lhs, rhs, .. } => {
            let is_assignment = op.is_assignment();
            accept_expr_slot(visitor, program, method, lhs, is_assignment)?;
            accept_expr(visitor, program, method, rhs)?;
        }
        JExpressionKind::Unary { op, arg } => {
            let modifying = op.is_modifying();
            accept_expr_slot(visitor, program, method, arg, modifying)?;
        }
        JExpressionKind::Conditional {
            cond,
            then_expr,
            else_expr,
            ..
        } => {
            accept_expr(visitor, program, method, cond)?;
            accept_expr(visitor, program, method, then_expr)?;
            accept_expr(visitor, program, method, else_expr)?;
        }
        JExpressionKind::Cast { expr, .. } | JExpressionKind::InstanceOf { expr, .. } => {
            accept_expr(visitor, program, method, expr)?
        }
        JExpressionKind::Multi(exprs) => {
            for e in exprs {
                accept_expr(visitor, program, method, e)?;
            }
        }
    }
    Ok(())
}

fn trace_stmt(err: InternalCompilerError, program: &JProgram, stmt: &JStatement) -> InternalCompilerError {
    let info = stmt.info.clone();
    err.with_node(stmt.kind_name(), Some(&info), |guard| {
        to_source::describe_stmt(program, stmt, guard)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::jast::declarations::MethodFlags;
    use crate::jast::expression::{BinaryOp, JLiteral};
    use crate::jast::types::JType;
    use crate::source_info::SourceInfo;

    fn info() -> SourceInfo {
        SourceInfo::unknown()
    }

    fn program_with_body(stmts: Vec<JStatement>) -> (JProgram, MethodId) {
        let mut program = JProgram::new(false);
        let class = program.create_class(info(), "Foo", None, false, false);
        let method = program.create_method(info(), class, "run", JType::VOID, MethodFlags::static_method());
        program.set_body(method, stmts);
        (program, method)
    }

    fn int_stmt(v: i32) -> JStatement {
        JStatement::expr(JExpression::int_lit(info(), v))
    }

    fn body_ints(program: &JProgram, method: MethodId) -> Vec<i32> {
        program.methods[method]
            .body
            .statements()
            .unwrap_or_default()
            .iter()
            .filter_map(|s| match &s.kind {
                JStatementKind::Expression(e) => match e.as_literal() {
                    Some(JLiteral::Int(v)) => Some(*v),
                    _ => None,
                },
                _ => None,
            })
            .collect()
    }

    struct CountLiterals(usize);

    impl JVisitor for CountLiterals {
        fn visit_expr(&mut self, expr: &JExpression, _cx: VisitCx<'_>) -> bool {
            if expr.as_literal().is_some() {
                self.0 += 1;
            }
            true
        }
    }

    #[test]
    fn test_read_only_visit_counts_nested_literals() {
        let (program, _) = program_with_body(vec![
            int_stmt(1),
            JStatement::if_stmt(
                info(),
                JExpression::bool_lit(info(), true),
                int_stmt(2),
                Some(int_stmt(3)),
            ),
        ]);
        let mut counter = CountLiterals(0);
        visit_program(&mut counter, &program);
        assert_eq!(counter.0, 4);
    }

    struct RemoveTwos;

    impl JModVisitor for RemoveTwos {
        fn end_visit_stmt(&mut self, stmt: &mut JStatement, ctx: &mut StmtContext<'_>) -> VisitResult {
            if let JStatementKind::Expression(e) = &stmt.kind {
                if matches!(e.as_literal(), Some(JLiteral::Int(2))) {
                    ctx.insert_before(int_stmt(20));
                    ctx.insert_after(int_stmt(21));
                    ctx.remove_me();
                }
            }
            Ok(())
        }
    }

    #[test]
    fn test_remove_and_insert_in_list() {
        let (mut program, method) = program_with_body(vec![int_stmt(1), int_stmt(2), int_stmt(3)]);
        accept_program(&mut RemoveTwos, &mut program).unwrap();
        assert_eq!(body_ints(&program, method), vec![1, 20, 21, 3]);
    }

    #[test]
    fn test_remove_in_single_slot_fails_fast() {
        let (mut program, _) = program_with_body(vec![JStatement::if_stmt(
            info(),
            JExpression::bool_lit(info(), true),
            int_stmt(2),
            None,
        )]);
        let err = accept_program(&mut RemoveTwos, &mut program).unwrap_err();
        assert!(err.message().contains("single-statement slot"));
        let kinds: Vec<_> = err.node_trace().iter().map(|e| e.kind.as_str()).collect();
        assert_eq!(kinds, vec!["ExpressionStatement", "If", "Method"]);
    }

    struct ReplaceVarsWithLiteral;

    impl JModVisitor for ReplaceVarsWithLiteral {
        fn visit_expr(&mut self, expr: &mut JExpression, ctx: &mut ExprContext<'_>) -> VisitResult<bool> {
            if matches!(expr.kind, JExpressionKind::VariableRef(_)) {
                ctx.replace_me(JExpression::int_lit(expr.info.clone(), 0));
            }
            Ok(true)
        }
    }

    #[test]
    fn test_lvalue_replacement_with_literal_fails() {
        let mut program = JProgram::new(false);
        let class = program.create_class(info(), "Foo", None, false, false);
        let method = program.create_method(info(), class, "run", JType::VOID, MethodFlags::static_method());
        let local = program.create_local(info(), method, "x", JType::INT, false);
        program.set_body(
            method,
            vec![JStatement::expr(JExpression::assign(
                info(),
                JExpression::var_ref(info(), local),
                JExpression::var_ref(info(), local),
                JType::INT,
            ))],
        );

        let err = accept_program(&mut ReplaceVarsWithLiteral, &mut program).unwrap_err();
        assert!(err.message().contains("assignment target"));
        assert_eq!(err.node_trace()[0].kind, "VariableRef");
        assert_eq!(err.node_trace()[1].kind, "Binary");
    }

    struct DoubleInts;

    impl JModVisitor for DoubleInts {
        fn end_visit_expr(&mut self, expr: &mut JExpression, ctx: &mut ExprContext<'_>) -> VisitResult {
            if let Some(JLiteral::Int(v)) = expr.as_literal() {
                ctx.replace_me(JExpression::binary(
                    expr.info.clone(),
                    BinaryOp::Add,
                    JExpression::int_lit(expr.info.clone(), *v),
                    JExpression::int_lit(expr.info.clone(), *v),
                    JType::INT,
                ));
            }
            Ok(())
        }
    }

    #[test]
    fn test_post_order_replacement_is_not_revisited() {
        let (mut program, method) = program_with_body(vec![int_stmt(4)]);
        accept_program(&mut DoubleInts, &mut program).unwrap();
        let stmts = program.methods[method].body.statements().unwrap_or_default();
        let JStatementKind::Expression(expr) = &stmts[0].kind else {
            panic!("expected expression statement");
        };
        assert_eq!(expr.node_count(), 3);
    }
}
