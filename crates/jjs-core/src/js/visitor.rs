//! Traversal of the output AST
//!
//! [`JsVisitor`] observes, [`JsModVisitor`] rewrites nodes in place. Both
//! walk in source order with a pre-order hook that can cut off descent and
//! a post-order hook. Statement lists get their own post-order hook so that
//! passes can drop or splice statements once every element has been seen.

use crate::js::ast::{JsExpression, JsExpressionKind, JsFunction, JsStatement, JsStatementKind};

pub trait JsVisitor {
    fn visit_function(&mut self, _function: &JsFunction) -> bool {
        true
    }

    fn end_visit_function(&mut self, _function: &JsFunction) {}

    fn visit_stmt(&mut self, _stmt: &JsStatement) -> bool {
        true
    }

    fn end_visit_stmt(&mut self, _stmt: &JsStatement) {}

    fn visit_expr(&mut self, _expr: &JsExpression) -> bool {
        true
    }

    fn end_visit_expr(&mut self, _expr: &JsExpression) {}
}

pub fn walk_stmts<V: JsVisitor + ?Sized>(visitor: &mut V, stmts: &[JsStatement]) {
    for stmt in stmts {
        walk_stmt(visitor, stmt);
    }
}

pub fn walk_function<V: JsVisitor + ?Sized>(visitor: &mut V, function: &JsFunction) {
    if visitor.visit_function(function) {
        walk_stmts(visitor, &function.body);
    }
    visitor.end_visit_function(function);
}

pub fn walk_stmt<V: JsVisitor + ?Sized>(visitor: &mut V, stmt: &JsStatement) {
    if visitor.visit_stmt(stmt) {
        match &stmt.kind {
            JsStatementKind::Block(stmts) => walk_stmts(visitor, stmts),
            JsStatementKind::Expression(expr) | JsStatementKind::Throw(expr) => walk_expr(visitor, expr),
            JsStatementKind::Vars(vars) => {
                for var in vars {
                    if let Some(init) = &var.init {
                        walk_expr(visitor, init);
                    }
                }
            }
            JsStatementKind::Function(function) => walk_function(visitor, function),
            JsStatementKind::If {
                cond,
                then_stmt,
                else_stmt,
            } => {
                walk_expr(visitor, cond);
                walk_stmt(visitor, then_stmt);
                if let Some(else_stmt) = else_stmt {
                    walk_stmt(visitor, else_stmt);
                }
            }
            JsStatementKind::While { cond, body } => {
                walk_expr(visitor, cond);
                walk_stmt(visitor, body);
            }
            JsStatementKind::DoWhile { body, cond } => {
                walk_stmt(visitor, body);
                walk_expr(visitor, cond);
            }
            JsStatementKind::For { init, cond, incr, body } => {
                if let Some(init) = init {
                    walk_stmt(visitor, init);
                }
                if let Some(cond) = cond {
                    walk_expr(visitor, cond);
                }
                if let Some(incr) = incr {
                    walk_expr(visitor, incr);
                }
                walk_stmt(visitor, body);
            }
            JsStatementKind::Return(value) => {
                if let Some(value) = value {
                    walk_expr(visitor, value);
                }
            }
            JsStatementKind::Label { body, .. } => walk_stmt(visitor, body),
            JsStatementKind::Try { block, catch, finally } => {
                walk_stmts(visitor, block);
                if let Some(catch) = catch {
                    walk_stmts(visitor, &catch.body);
                }
                if let Some(finally) = finally {
                    walk_stmts(visitor, finally);
                }
            }
            JsStatementKind::Switch { expr, cases } => {
                walk_expr(visitor, expr);
                for case in cases {
                    if let Some(label) = &case.label {
                        walk_expr(visitor, label);
                    }
                    walk_stmts(visitor, &case.body);
                }
            }
            JsStatementKind::Break(_)
            | JsStatementKind::Continue(_)
            | JsStatementKind::Empty
            | JsStatementKind::Verbatim(_) => {}
        }
    }
    visitor.end_visit_stmt(stmt);
}

pub fn walk_expr<V: JsVisitor + ?Sized>(visitor: &mut V, expr: &JsExpression) {
    if visitor.visit_expr(expr) {
        match &expr.kind {
            JsExpressionKind::NameRef { qualifier, .. } => {
                if let Some(qualifier) = qualifier {
                    walk_expr(visitor, qualifier);
                }
            }
            JsExpressionKind::ArrayAccess { array, index } => {
                walk_expr(visitor, array);
                walk_expr(visitor, index);
            }
            JsExpressionKind::Invocation { target, args } => {
                walk_expr(visitor, target);
                args.iter().for_each(|a| walk_expr(visitor, a));
            }
            JsExpressionKind::New { ctor, args } => {
                walk_expr(visitor, ctor);
                args.iter().for_each(|a| walk_expr(visitor, a));
            }
            JsExpressionKind::Binary { lhs, rhs, .. } => {
                walk_expr(visitor, lhs);
                walk_expr(visitor, rhs);
            }
            JsExpressionKind::Prefix { arg, .. } | JsExpressionKind::Postfix { arg, .. } => walk_expr(visitor, arg),
            JsExpressionKind::Conditional {
                cond,
                then_expr,
                else_expr,
            } => {
                walk_expr(visitor, cond);
                walk_expr(visitor, then_expr);
                walk_expr(visitor, else_expr);
            }
            JsExpressionKind::Function(function) => walk_function(visitor, function),
            JsExpressionKind::ArrayLiteral(elements) => elements.iter().for_each(|e| walk_expr(visitor, e)),
            JsExpressionKind::ObjectLiteral(props) => {
                for prop in props {
                    walk_expr(visitor, &prop.key);
                    walk_expr(visitor, &prop.value);
                }
            }
            JsExpressionKind::Number(_)
            | JsExpressionKind::String(_)
            | JsExpressionKind::Boolean(_)
            | JsExpressionKind::Null
            | JsExpressionKind::This => {}
        }
    }
    visitor.end_visit_expr(expr);
}

pub trait JsModVisitor {
    fn visit_function(&mut self, _function: &mut JsFunction) -> bool {
        true
    }

    fn end_visit_function(&mut self, _function: &mut JsFunction) {}

    fn visit_stmt(&mut self, _stmt: &mut JsStatement) -> bool {
        true
    }

    fn end_visit_stmt(&mut self, _stmt: &mut JsStatement) {}

    /// Runs after every statement of the list has been visited
    fn end_visit_stmts(&mut self, _stmts: &mut Vec<JsStatement>) {}

    fn visit_expr(&mut self, _expr: &mut JsExpression) -> bool {
        true
    }

    fn end_visit_expr(&mut self, _expr: &mut JsExpression) {}
}

pub fn accept_stmts<V: JsModVisitor + ?Sized>(visitor: &mut V, stmts: &mut Vec<JsStatement>) {
    for stmt in stmts.iter_mut() {
        accept_stmt(visitor, stmt);
    }
    visitor.end_visit_stmts(stmts);
}

pub fn accept_function<V: JsModVisitor + ?Sized>(visitor: &mut V, function: &mut JsFunction) {
    if visitor.visit_function(function) {
        accept_stmts(visitor, &mut function.body);
    }
    visitor.end_visit_function(function);
}

pub fn accept_stmt<V: JsModVisitor + ?Sized>(visitor: &mut V, stmt: &mut JsStatement) {
    if visitor.visit_stmt(stmt) {
        match &mut stmt.kind {
            JsStatementKind::Block(stmts) => accept_stmts(visitor, stmts),
            JsStatementKind::Expression(expr) | JsStatementKind::Throw(expr) => accept_expr(visitor, expr),
            JsStatementKind::Vars(vars) => {
                for var in vars {
                    if let Some(init) = &mut var.init {
                        accept_expr(visitor, init);
                    }
                }
            }
            JsStatementKind::Function(function) => accept_function(visitor, function),
            JsStatementKind::If {
                cond,
                then_stmt,
                else_stmt,
            } => {
                accept_expr(visitor, cond);
                accept_stmt(visitor, then_stmt);
                if let Some(else_stmt) = else_stmt {
                    accept_stmt(visitor, else_stmt);
                }
            }
            JsStatementKind::While { cond, body } => {
                accept_expr(visitor, cond);
                accept_stmt(visitor, body);
            }
            JsStatementKind::DoWhile { body, cond } => {
                accept_stmt(visitor, body);
                accept_expr(visitor, cond);
            }
            JsStatementKind::For { init, cond, incr, body } => {
                if let Some(init) = init {
                    accept_stmt(visitor, init);
                }
                if let Some(cond) = cond {
                    accept_expr(visitor, cond);
                }
                if let Some(incr) = incr {
                    accept_expr(visitor, incr);
                }
                accept_stmt(visitor, body);
            }
            JsStatementKind::Return(value) => {
                if let Some(value) = value {
                    accept_expr(visitor, value);
                }
            }
            JsStatementKind::Label { body, .. } => accept_stmt(visitor, body),
            JsStatementKind::Try { block, catch, finally } => {
                accept_stmts(visitor, block);
                if let Some(catch) = catch {
                    accept_stmts(visitor, &mut catch.body);
                }
                if let Some(finally) = finally {
                    accept_stmts(visitor, finally);
                }
            }
            JsStatementKind::Switch { expr, cases } => {
                accept_expr(visitor, expr);
                for case in cases {
                    if let Some(label) = &mut case.label {
                        accept_expr(visitor, label);
                    }
                    accept_stmts(visitor, &mut case.body);
                }
            }
            JsStatementKind::Break(_)
            | JsStatementKind::Continue(_)
            | JsStatementKind::Empty
            | JsStatementKind::Verbatim(_) => {}
        }
    }
    visitor.end_visit_stmt(stmt);
}

pub fn accept_expr<V: JsModVisitor + ?Sized>(visitor: &mut V, expr: &mut JsExpression) {
    if visitor.visit_expr(expr) {
        match &mut expr.kind {
            JsExpressionKind::NameRef { qualifier, .. } => {
                if let Some(qualifier) = qualifier {
                    accept_expr(visitor, qualifier);
                }
            }
            JsExpressionKind::ArrayAccess { array, index } => {
                accept_expr(visitor, array);
                accept_expr(visitor, index);
            }
            JsExpressionKind::Invocation { target, args } => {
                accept_expr(visitor, target);
                args.iter_mut().for_each(|a| accept_expr(visitor, a));
            }
            JsExpressionKind::New { ctor, args } => {
                accept_expr(visitor, ctor);
                args.iter_mut().for_each(|a| accept_expr(visitor, a));
            }
            JsExpressionKind::Binary { lhs, rhs, .. } => {
                accept_expr(visitor, lhs);
                accept_expr(visitor, rhs);
            }
            JsExpressionKind::Prefix { arg, .. } | JsExpressionKind::Postfix { arg, .. } => {
                accept_expr(visitor, arg)
            }
            JsExpressionKind::Conditional {
                cond,
                then_expr,
                else_expr,
            } => {
                accept_expr(visitor, cond);
                accept_expr(visitor, then_expr);
                accept_expr(visitor, else_expr);
            }
            JsExpressionKind::Function(function) => accept_function(visitor, function),
            JsExpressionKind::ArrayLiteral(elements) => {
                elements.iter_mut().for_each(|e| accept_expr(visitor, e))
            }
            JsExpressionKind::ObjectLiteral(props) => {
                for prop in props {
                    accept_expr(visitor, &mut prop.key);
                    accept_expr(visitor, &mut prop.value);
                }
            }
            JsExpressionKind::Number(_)
            | JsExpressionKind::String(_)
            | JsExpressionKind::Boolean(_)
            | JsExpressionKind::Null
            | JsExpressionKind::This => {}
        }
    }
    visitor.end_visit_expr(expr);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::js::ast::JsBinaryOp;
    use crate::source_info::SourceInfo;

    fn info() -> SourceInfo {
        SourceInfo::unknown()
    }

    struct NumberCounter(usize);

    impl JsVisitor for NumberCounter {
        fn visit_expr(&mut self, expr: &JsExpression) -> bool {
            if matches!(expr.kind, JsExpressionKind::Number(_)) {
                self.0 += 1;
            }
            true
        }
    }

    struct Doubler;

    impl JsModVisitor for Doubler {
        fn end_visit_expr(&mut self, expr: &mut JsExpression) {
            if let JsExpressionKind::Number(n) = &mut expr.kind {
                *n *= 2.0;
            }
        }

        fn end_visit_stmts(&mut self, stmts: &mut Vec<JsStatement>) {
            stmts.retain(|s| !s.is_empty());
        }
    }

    #[test]
    fn test_walk_and_rewrite() {
        let sum = JsExpression::binary(
            info(),
            JsBinaryOp::Add,
            JsExpression::number(info(), 1.0),
            JsExpression::number(info(), 2.0),
        );
        let mut stmts = vec![sum.make_stmt(), JsStatement::empty(info())];

        let mut counter = NumberCounter(0);
        walk_stmts(&mut counter, &stmts);
        assert_eq!(counter.0, 2);

        accept_stmts(&mut Doubler, &mut stmts);
        assert_eq!(stmts.len(), 1);
        let JsStatementKind::Expression(JsExpression {
            kind: JsExpressionKind::Binary { rhs, .. },
            ..
        }) = &stmts[0].kind
        else {
            panic!("expected binary expression");
        };
        assert!(matches!(rhs.kind, JsExpressionKind::Number(n) if n == 4.0));
    }
}
