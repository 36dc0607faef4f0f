//! Inlining of small top-level functions at their call sites
//!
//! A function qualifies when its body is one `return expr;` or one
//! expression statement, optionally preceded by a class initializer call.
//! The call is replaced by the expression with parameters substituted, as
//! long as that keeps argument evaluation order and count intact.
//! Afterwards class initializer calls that are already known to have run
//! on the current path are dropped.

use crate::errors::CompilationError;
use crate::fixpoint::OptimizationPass;
use crate::js::ast::{JsBinaryOp, JsExpression, JsExpressionKind, JsFunction, JsProgram, JsStatement, JsStatementKind};
use crate::js::scope::{NameId, ScopeId, StaticRef};
use crate::js::visitor::{accept_expr, accept_stmts, walk_expr, JsModVisitor, JsVisitor};
use rustc_hash::{FxHashMap, FxHashSet};

pub struct JsInliner;

impl OptimizationPass<JsProgram> for JsInliner {
    fn name(&self) -> &'static str {
        "js-inliner"
    }

    fn aggressive_only(&self) -> bool {
        true
    }

    fn run(&mut self, program: &mut JsProgram) -> Result<bool, CompilationError> {
        Ok(inline_functions(program))
    }
}

pub fn inline_functions(program: &mut JsProgram) -> bool {
    let clinits: FxHashSet<NameId> = program
        .names
        .iter()
        .filter(|(_, name)| name.static_ref == Some(StaticRef::Clinit))
        .map(|(id, _)| id)
        .collect();
    let candidates = collect_candidates(program, &clinits);

    let mut block = std::mem::take(&mut program.global_block);
    let mut inliner = InliningVisitor {
        candidates: &candidates,
        current: Vec::new(),
        changed: false,
    };
    accept_stmts(&mut inliner, &mut block);

    let mut remover = ClinitCallRemover {
        clinits: &clinits,
        changed: false,
    };
    for stmt in &mut block {
        match &mut stmt.kind {
            JsStatementKind::Function(function) => remover.function(function),
            _ => remover.stmt(stmt, &mut FxHashSet::default()),
        }
    }
    program.global_block = block;

    if inliner.changed || remover.changed {
        tracing::debug!(inlined = inliner.changed, clinits = remover.changed, "js inliner changed program");
    }
    inliner.changed || remover.changed
}

/// A function whose body reduces to one expression
struct Candidate {
    params: Vec<NameId>,
    clinit: Option<JsExpression>,
    hoisted: JsExpression,
}

fn clinit_called(expr: &JsExpression, clinits: &FxHashSet<NameId>) -> Option<NameId> {
    match &expr.kind {
        JsExpressionKind::Invocation { target, args } if args.is_empty() => {
            target.as_name().filter(|name| clinits.contains(name))
        }
        _ => None,
    }
}

fn collect_candidates(program: &JsProgram, clinits: &FxHashSet<NameId>) -> FxHashMap<NameId, Candidate> {
    let mut candidates = FxHashMap::default();
    for stmt in &program.global_block {
        let JsStatementKind::Function(function) = &stmt.kind else {
            continue;
        };
        let Some(name) = function.name else {
            continue;
        };
        if program.names[name].static_ref != Some(StaticRef::Function) {
            continue;
        }
        let (clinit, last) = match function.body.as_slice() {
            [last] => (None, last),
            [first, last] => match &first.kind {
                JsStatementKind::Expression(call) if clinit_called(call, clinits).is_some() => {
                    (Some(call.clone()), last)
                }
                _ => continue,
            },
            _ => continue,
        };
        let hoisted = match &last.kind {
            JsStatementKind::Return(Some(expr)) | JsStatementKind::Expression(expr) => expr,
            _ => continue,
        };
        if !is_hoistable(program, function, name, hoisted) {
            continue;
        }
        candidates.insert(
            name,
            Candidate {
                params: function.params.clone(),
                clinit,
                hoisted: hoisted.clone(),
            },
        );
    }
    candidates
}

/// The expression means the same thing at any call site
fn is_hoistable(program: &JsProgram, function: &JsFunction, own_name: NameId, expr: &JsExpression) -> bool {
    struct Checker<'a> {
        program: &'a JsProgram,
        scope: ScopeId,
        params: &'a [NameId],
        own_name: NameId,
        ok: bool,
    }
    impl JsVisitor for Checker<'_> {
        fn visit_expr(&mut self, expr: &JsExpression) -> bool {
            match &expr.kind {
                JsExpressionKind::This | JsExpressionKind::Function(_) => self.ok = false,
                JsExpressionKind::NameRef { qualifier: None, name } => {
                    let declared = &self.program.names[*name];
                    let local = declared.scope == self.scope && !self.params.contains(name);
                    let arguments = declared.scope == self.program.root_scope && declared.ident == "arguments";
                    if local || arguments || *name == self.own_name {
                        self.ok = false;
                    }
                }
                _ => {}
            }
            self.ok
        }
    }
    let mut checker = Checker {
        program,
        scope: function.scope,
        params: &function.params,
        own_name,
        ok: true,
    };
    walk_expr(&mut checker, expr);
    checker.ok
}

#[derive(Default)]
struct NameCollector {
    names: FxHashSet<NameId>,
}

impl JsVisitor for NameCollector {
    fn visit_expr(&mut self, expr: &JsExpression) -> bool {
        if let JsExpressionKind::NameRef { name, .. } = &expr.kind {
            self.names.insert(*name);
        }
        true
    }
}

fn refers_to(expr: &JsExpression, names: &[NameId]) -> bool {
    let mut collector = NameCollector::default();
    walk_expr(&mut collector, expr);
    names.iter().any(|n| collector.names.contains(n))
}

fn is_param(expr: &JsExpression, params: &[NameId]) -> bool {
    expr.as_name().is_some_and(|name| params.contains(&name))
}

/// Parameters must be consumed exactly once, in order, unconditionally and
/// before any call could observe or throw
struct EvaluationOrder<'a> {
    required: &'a [NameId],
    unevaluated: std::collections::VecDeque<NameId>,
    maintains_order: bool,
}

impl JsVisitor for EvaluationOrder<'_> {
    fn end_visit_expr(&mut self, expr: &JsExpression) {
        match &expr.kind {
            JsExpressionKind::Binary {
                op: JsBinaryOp::And | JsBinaryOp::Or,
                rhs,
                ..
            } => {
                if refers_to(rhs, self.required) {
                    self.maintains_order = false;
                }
            }
            JsExpressionKind::Conditional {
                then_expr, else_expr, ..
            } => {
                if refers_to(then_expr, self.required) || refers_to(else_expr, self.required) {
                    self.maintains_order = false;
                }
            }
            JsExpressionKind::Function(_) => self.maintains_order = false,
            JsExpressionKind::Invocation { .. } | JsExpressionKind::New { .. } => {
                if !self.unevaluated.is_empty() {
                    self.maintains_order = false;
                }
            }
            JsExpressionKind::NameRef { qualifier: None, name } if self.required.contains(name) => {
                if self.unevaluated.pop_front() != Some(*name) {
                    self.maintains_order = false;
                }
            }
            _ => {}
        }
    }
}

/// Parameters are never assigned or modified
fn params_are_read_only(expr: &JsExpression, params: &[NameId]) -> bool {
    struct Usage<'a> {
        params: &'a [NameId],
        lvalue: bool,
    }
    impl JsVisitor for Usage<'_> {
        fn end_visit_expr(&mut self, expr: &JsExpression) {
            match &expr.kind {
                JsExpressionKind::Binary { op, lhs, .. } if op.is_assignment() => {
                    self.lvalue |= is_param(lhs, self.params);
                }
                JsExpressionKind::Prefix { op, arg } | JsExpressionKind::Postfix { op, arg } if op.is_modifying() => {
                    self.lvalue |= is_param(arg, self.params);
                }
                _ => {}
            }
        }
    }
    let mut usage = Usage { params, lvalue: false };
    walk_expr(&mut usage, expr);
    !usage.lvalue
}

/// Literals and `this` can be evaluated any number of times, in any order
fn always_flexible(expr: &JsExpression) -> bool {
    expr.is_literal() || matches!(expr.kind, JsExpressionKind::This)
}

fn is_inlinable(candidate: &Candidate, args: &[JsExpression]) -> bool {
    if args.len() != candidate.params.len() {
        return false;
    }

    // names shared by the arguments and the body could observe each other
    let mut arg_names = NameCollector::default();
    for arg in args {
        walk_expr(&mut arg_names, arg);
    }
    let mut body_names = NameCollector::default();
    walk_expr(&mut body_names, &candidate.hoisted);
    if body_names
        .names
        .iter()
        .any(|n| !candidate.params.contains(n) && arg_names.names.contains(n))
    {
        return false;
    }

    if args.iter().any(JsExpression::has_side_effects) {
        let required: Vec<NameId> = candidate
            .params
            .iter()
            .zip(args)
            .filter(|(_, arg)| !always_flexible(arg))
            .map(|(param, _)| *param)
            .collect();
        if !required.is_empty() {
            let mut order = EvaluationOrder {
                required: &required,
                unevaluated: required.iter().copied().collect(),
                maintains_order: true,
            };
            walk_expr(&mut order, &candidate.hoisted);
            if !order.maintains_order || !order.unevaluated.is_empty() {
                return false;
            }
        }
    }

    params_are_read_only(&candidate.hoisted, &candidate.params)
}

struct ParamSubstituter<'a> {
    params: &'a [NameId],
    args: &'a [JsExpression],
}

impl JsModVisitor for ParamSubstituter<'_> {
    fn end_visit_expr(&mut self, expr: &mut JsExpression) {
        let Some(name) = expr.as_name() else {
            return;
        };
        if let Some(index) = self.params.iter().position(|p| *p == name) {
            if let Some(arg) = self.args.get(index) {
                *expr = arg.clone();
            }
        }
    }
}

struct InliningVisitor<'a> {
    candidates: &'a FxHashMap<NameId, Candidate>,
    /// Names of the enclosing functions
    current: Vec<Option<NameId>>,
    changed: bool,
}

impl JsModVisitor for InliningVisitor<'_> {
    fn visit_function(&mut self, function: &mut JsFunction) -> bool {
        self.current.push(function.name);
        true
    }

    fn end_visit_function(&mut self, _function: &mut JsFunction) {
        self.current.pop();
    }

    fn end_visit_expr(&mut self, expr: &mut JsExpression) {
        let JsExpressionKind::Invocation { target, args } = &expr.kind else {
            return;
        };
        let Some(callee) = target.as_name() else {
            return;
        };
        let Some(candidate) = self.candidates.get(&callee) else {
            return;
        };
        if self.current.contains(&Some(callee)) || !is_inlinable(candidate, args) {
            return;
        }

        let mut replacement = candidate.hoisted.clone();
        let mut substituter = ParamSubstituter {
            params: &candidate.params,
            args,
        };
        accept_expr(&mut substituter, &mut replacement);
        if let Some(clinit) = &candidate.clinit {
            replacement = JsExpression::binary(expr.info.clone(), JsBinaryOp::Comma, clinit.clone(), replacement);
        }
        tracing::trace!(callee = callee.index(), "inlined js function");
        *expr = replacement;
        self.changed = true;
    }
}

/// Drops class initializer calls already made on every path to them
struct ClinitCallRemover<'a> {
    clinits: &'a FxHashSet<NameId>,
    changed: bool,
}

impl ClinitCallRemover<'_> {
    fn function(&mut self, function: &mut JsFunction) {
        self.stmts(&mut function.body, &mut FxHashSet::default());
    }

    fn stmts(&mut self, stmts: &mut [JsStatement], called: &mut FxHashSet<NameId>) {
        for stmt in stmts {
            self.stmt(stmt, called);
        }
    }

    fn stmt(&mut self, stmt: &mut JsStatement, called: &mut FxHashSet<NameId>) {
        if let JsStatementKind::Expression(expr) = &stmt.kind {
            if clinit_called(expr, self.clinits).is_some_and(|c| called.contains(&c)) {
                stmt.kind = JsStatementKind::Empty;
                self.changed = true;
                return;
            }
        }
        match &mut stmt.kind {
            JsStatementKind::Block(stmts) => self.stmts(stmts, &mut called.clone()),
            JsStatementKind::Expression(expr) | JsStatementKind::Throw(expr) => self.expr(expr, called),
            JsStatementKind::Return(value) => {
                if let Some(value) = value {
                    self.expr(value, called);
                }
            }
            JsStatementKind::Vars(vars) => {
                for var in vars {
                    if let Some(init) = &mut var.init {
                        self.expr(init, called);
                    }
                }
            }
            JsStatementKind::Function(function) => self.function(function),
            JsStatementKind::If {
                cond,
                then_stmt,
                else_stmt,
            } => {
                self.expr(cond, called);
                self.stmt(then_stmt, &mut called.clone());
                if let Some(else_stmt) = else_stmt {
                    self.stmt(else_stmt, &mut called.clone());
                }
            }
            JsStatementKind::While { cond, body } => {
                self.expr(cond, called);
                self.stmt(body, &mut called.clone());
            }
            JsStatementKind::DoWhile { body, cond } => {
                let mut inner = called.clone();
                self.stmt(body, &mut inner);
                self.expr(cond, &mut inner);
            }
            JsStatementKind::For { init, cond, body, .. } => {
                if let Some(init) = init {
                    self.stmt(init, called);
                }
                if let Some(cond) = cond {
                    self.expr(cond, called);
                }
                self.stmt(body, &mut called.clone());
            }
            JsStatementKind::Label { body, .. } => self.stmt(body, &mut called.clone()),
            JsStatementKind::Try { block, catch, finally } => {
                self.stmts(block, &mut called.clone());
                if let Some(catch) = catch {
                    self.stmts(&mut catch.body, &mut called.clone());
                }
                if let Some(finally) = finally {
                    self.stmts(finally, &mut called.clone());
                }
            }
            JsStatementKind::Switch { expr, cases } => {
                self.expr(expr, called);
                for case in cases {
                    self.stmts(&mut case.body, &mut called.clone());
                }
            }
            JsStatementKind::Break(_)
            | JsStatementKind::Continue(_)
            | JsStatementKind::Empty
            | JsStatementKind::Verbatim(_) => {}
        }
    }

    fn expr(&mut self, expr: &mut JsExpression, called: &mut FxHashSet<NameId>) {
        if let JsExpressionKind::Binary {
            op: JsBinaryOp::Comma,
            lhs,
            rhs,
        } = &mut expr.kind
        {
            if clinit_called(lhs, self.clinits).is_some_and(|c| called.contains(&c)) {
                let rhs = std::mem::replace(rhs.as_mut(), JsExpression::null(expr.info.clone()));
                *expr = rhs;
                self.changed = true;
                self.expr(expr, called);
                return;
            }
        }
        match &mut expr.kind {
            JsExpressionKind::Binary {
                op: JsBinaryOp::And | JsBinaryOp::Or,
                lhs,
                rhs,
            } => {
                self.expr(lhs, called);
                self.expr(rhs, &mut called.clone());
            }
            JsExpressionKind::Binary { lhs, rhs, .. } => {
                self.expr(lhs, called);
                self.expr(rhs, called);
            }
            JsExpressionKind::Conditional {
                cond,
                then_expr,
                else_expr,
            } => {
                self.expr(cond, called);
                self.expr(then_expr, &mut called.clone());
                self.expr(else_expr, &mut called.clone());
            }
            JsExpressionKind::Invocation { target, args } => {
                self.expr(target, called);
                for arg in args.iter_mut() {
                    self.expr(arg, called);
                }
                if let Some(clinit) = clinit_called(expr, self.clinits) {
                    called.insert(clinit);
                }
            }
            JsExpressionKind::New { ctor, args } => {
                self.expr(ctor, called);
                for arg in args {
                    self.expr(arg, called);
                }
            }
            JsExpressionKind::NameRef {
                qualifier: Some(qualifier),
                ..
            } => self.expr(qualifier, called),
            JsExpressionKind::ArrayAccess { array, index } => {
                self.expr(array, called);
                self.expr(index, called);
            }
            JsExpressionKind::Prefix { arg, .. } | JsExpressionKind::Postfix { arg, .. } => self.expr(arg, called),
            JsExpressionKind::Function(function) => self.function(function),
            JsExpressionKind::ArrayLiteral(elements) => {
                for element in elements {
                    self.expr(element, called);
                }
            }
            JsExpressionKind::ObjectLiteral(props) => {
                for prop in props {
                    self.expr(&mut prop.value, called);
                }
            }
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::js::scope::ScopeKind;
    use crate::js::source_gen::{to_source, TextOutput};
    use crate::source_info::SourceInfo;

    fn info() -> SourceInfo {
        SourceInfo::unknown()
    }

    fn name(n: NameId) -> JsExpression {
        JsExpression::name_ref(info(), n)
    }

    fn call(target: NameId, args: Vec<JsExpression>) -> JsExpression {
        JsExpression::invoke(info(), name(target), args)
    }

    /// `function <ident>(<params>) { <body> }` at top level
    fn declare(
        program: &mut JsProgram,
        ident: &str,
        params: &[&str],
        body: impl FnOnce(&[NameId]) -> Vec<JsStatement>,
    ) -> NameId {
        let top = program.top_scope;
        let fn_name = program.fresh_name(top, ident, ident);
        program.set_static_ref(fn_name, StaticRef::Function);
        let scope = program.new_scope(top, ScopeKind::Function, ident);
        let params: Vec<NameId> = params.iter().map(|p| program.fresh_name(scope, p, p)).collect();
        let body = body(&params);
        program.global_block.push(JsStatement::new(
            info(),
            JsStatementKind::Function(JsFunction {
                info: info(),
                name: Some(fn_name),
                params,
                body,
                scope,
            }),
        ));
        fn_name
    }

    #[test]
    fn test_inlines_delegating_function() {
        let mut program = JsProgram::new();
        let add = declare(&mut program, "add", &["a", "b"], |p| {
            vec![JsStatement::ret(
                info(),
                Some(JsExpression::binary(info(), JsBinaryOp::Add, name(p[0]), name(p[1]))),
            )]
        });
        let x = program.fresh_name(program.top_scope, "x", "x");
        program
            .global_block
            .push(JsStatement::var(info(), x, Some(call(add, vec![JsExpression::number(info(), 1.0), JsExpression::number(info(), 2.0)]))));

        assert!(inline_functions(&mut program));
        assert!(to_source(&program, TextOutput::Minified).ends_with("var x=1+2;\n"));
        assert!(!inline_functions(&mut program));
    }

    #[test]
    fn test_keeps_call_when_order_would_change() {
        let mut program = JsProgram::new();
        let swap = declare(&mut program, "swap", &["a", "b"], |p| {
            vec![JsStatement::ret(
                info(),
                Some(JsExpression::binary(info(), JsBinaryOp::Sub, name(p[1]), name(p[0]))),
            )]
        });
        let f = program.fresh_name(program.top_scope, "f", "f");
        let g = program.fresh_name(program.top_scope, "g", "g");
        program
            .global_block
            .push(call(swap, vec![call(f, vec![]), call(g, vec![])]).make_stmt());

        assert!(!inline_functions(&mut program));
    }

    #[test]
    fn test_duplicate_clinit_calls_are_removed() {
        let mut program = JsProgram::new();
        let top = program.top_scope;
        let clinit = program.fresh_name(top, "$clinit_Foo", "$clinit");
        program.set_static_ref(clinit, StaticRef::Clinit);
        let helper = declare(&mut program, "helper", &[], |_| {
            vec![
                call(clinit, vec![]).make_stmt(),
                JsStatement::ret(info(), Some(JsExpression::number(info(), 7.0))),
            ]
        });
        let r = program.fresh_name(top, "r", "r");
        declare(&mut program, "user", &[], |_| {
            vec![
                call(clinit, vec![]).make_stmt(),
                JsExpression::assign(info(), name(r), call(helper, vec![])).make_stmt(),
            ]
        });

        assert!(inline_functions(&mut program));
        let js = to_source(&program, TextOutput::Minified);
        assert!(js.contains("function user(){$clinit_Foo();r=7;}"), "{}", js);
    }
}
