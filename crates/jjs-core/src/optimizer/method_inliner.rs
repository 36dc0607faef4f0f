//! Inlines small static methods at their call sites
//!
//! A method qualifies when its body is empty, a single expression
//! statement, or a single `return expr;`, it is small, and it neither calls
//! itself nor writes its own parameters. Arguments are substituted for
//! parameters only when doing so evaluates every argument with effects
//! exactly once, in the original order, before anything else the body does.

use crate::errors::{CompilationError, VisitResult};
use crate::fixpoint::OptimizationPass;
use crate::jast::declarations::{MethodBody, MethodId, VarId};
use crate::jast::expression::{BinaryOp, JExpression, JExpressionKind};
use crate::jast::program::JProgram;
use crate::jast::statement::JStatementKind;
use crate::jast::visitor::{self, ExprContext, JModVisitor};
use rustc_hash::FxHashMap;

/// Largest body, in expression nodes, worth copying into callers
pub const MAX_INLINE_NODES: usize = 40;

pub struct MethodInliner;

impl OptimizationPass<JProgram> for MethodInliner {
    fn name(&self) -> &'static str {
        "method-inliner"
    }

    fn aggressive_only(&self) -> bool {
        true
    }

    fn run(&mut self, program: &mut JProgram) -> Result<bool, CompilationError> {
        Ok(inline_methods(program)?)
    }
}

/// What an inlinable body evaluates to
#[derive(Debug, Clone)]
enum InlineBody {
    Empty,
    Value(JExpression),
}

fn references_method(expr: &JExpression, method: MethodId) -> bool {
    let mut found = matches!(&expr.kind, JExpressionKind::MethodCall { target, .. } if *target == method);
    expr.for_each_child(&mut |child| found |= references_method(child, method));
    found
}

fn writes_variable(expr: &JExpression) -> bool {
    let mut found = match &expr.kind {
        JExpressionKind::Binary { op, lhs, .. } if op.is_assignment() => {
            matches!(lhs.kind, JExpressionKind::VariableRef(_))
        }
        JExpressionKind::Unary { op, arg } if op.is_modifying() => {
            matches!(arg.kind, JExpressionKind::VariableRef(_))
        }
        _ => false,
    };
    expr.for_each_child(&mut |child| found |= writes_variable(child));
    found
}

fn inline_body(program: &JProgram, method: MethodId) -> Option<InlineBody> {
    let decl = &program.methods[method];
    if !decl.is_static || decl.is_clinit || decl.is_constructor {
        return None;
    }
    // Rebind requests survive until the permutation replaces them
    if program.index.methods.get("GWT.create") == Some(&method) {
        return None;
    }
    let MethodBody::Java(stmts) = &decl.body else {
        return None;
    };
    let body = match stmts.as_slice() {
        [] => InlineBody::Empty,
        [only] => match &only.kind {
            JStatementKind::Return(Some(value)) => InlineBody::Value(value.clone()),
            JStatementKind::Return(None) => InlineBody::Empty,
            JStatementKind::Expression(value) => InlineBody::Value(value.clone()),
            _ => return None,
        },
        _ => return None,
    };
    if let InlineBody::Value(value) = &body {
        if value.node_count() > MAX_INLINE_NODES || references_method(value, method) || writes_variable(value) {
            return None;
        }
    }
    Some(body)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Event {
    Param(usize),
    Effect,
    /// A parameter read that may not run
    ConditionalParam(usize),
}

/// Parameter reads and effects of `expr` in evaluation order
fn evaluation_events(expr: &JExpression, params: &[VarId], conditional: bool, out: &mut Vec<Event>) {
    match &expr.kind {
        JExpressionKind::VariableRef(var) => {
            if let Some(index) = params.iter().position(|p| p == var) {
                out.push(if conditional {
                    Event::ConditionalParam(index)
                } else {
                    Event::Param(index)
                });
            }
            return;
        }
        JExpressionKind::Binary {
            op: BinaryOp::And | BinaryOp::Or,
            lhs,
            rhs,
            ..
        } => {
            evaluation_events(lhs, params, conditional, out);
            evaluation_events(rhs, params, true, out);
            return;
        }
        JExpressionKind::Conditional {
            cond,
            then_expr,
            else_expr,
            ..
        } => {
            evaluation_events(cond, params, conditional, out);
            evaluation_events(then_expr, params, true, out);
            evaluation_events(else_expr, params, true, out);
            return;
        }
        _ => {}
    }
    expr.for_each_child(&mut |child| evaluation_events(child, params, conditional, out));
    let effect = match &expr.kind {
        JExpressionKind::MethodCall { .. } | JExpressionKind::NewInstance { .. } => true,
        JExpressionKind::Binary { op, .. } => op.is_assignment(),
        JExpressionKind::Unary { op, .. } => op.is_modifying(),
        _ => false,
    };
    if effect {
        out.push(Event::Effect);
    }
}

/// Whether `args` may be substituted into `body` for `params`
fn substitution_preserves_order(body: &JExpression, params: &[VarId], args: &[JExpression]) -> bool {
    let mut events = Vec::new();
    evaluation_events(body, params, false, &mut events);

    let expected: Vec<usize> = (0..args.len()).filter(|i| !args[*i].is_stable()).collect();
    let mut seen = Vec::new();
    let mut effect_seen = false;
    for event in events {
        match event {
            Event::Effect => effect_seen = true,
            Event::Param(index) | Event::ConditionalParam(index) if args[index].is_stable() => {}
            Event::Param(index) => {
                if effect_seen {
                    return false;
                }
                seen.push(index);
            }
            Event::ConditionalParam(_) => return false,
        }
    }
    seen == expected
}

struct Substituter<'a> {
    params: &'a [VarId],
    args: Vec<Option<JExpression>>,
}

impl Substituter<'_> {
    fn substitute(&mut self, expr: &mut JExpression) {
        if let JExpressionKind::VariableRef(var) = &expr.kind {
            if let Some(index) = self.params.iter().position(|p| p == var) {
                let stable = matches!(&self.args[index], Some(value) if value.is_stable());
                let replacement = if stable {
                    self.args[index].clone()
                } else {
                    self.args[index].take()
                };
                if let Some(replacement) = replacement {
                    *expr = replacement;
                }
                return;
            }
        }
        match &mut expr.kind {
            JExpressionKind::Literal(_) | JExpressionKind::VariableRef(_) | JExpressionKind::This(_) => {}
            JExpressionKind::FieldRef { instance, .. } => {
                if let Some(instance) = instance {
                    self.substitute(instance);
                }
            }
            JExpressionKind::MethodCall { instance, args, .. } => {
                if let Some(instance) = instance {
                    self.substitute(instance);
                }
                args.iter_mut().for_each(|a| self.substitute(a));
            }
            JExpressionKind::NewInstance { args, .. } => args.iter_mut().for_each(|a| self.substitute(a)),
            JExpressionKind::NewArray {
                dims, initializers, ..
            } => {
                dims.iter_mut().for_each(|d| self.substitute(d));
                if let Some(inits) = initializers {
                    inits.iter_mut().for_each(|i| self.substitute(i));
                }
            }
            JExpressionKind::ArrayRef { array, index } => {
                self.substitute(array);
                self.substitute(index);
            }
            JExpressionKind::ArrayLength(array) => self.substitute(array),
            JExpressionKind::Binary { lhs, rhs, .. } => {
                self.substitute(lhs);
                self.substitute(rhs);
            }
            JExpressionKind::Unary { arg, .. } => self.substitute(arg),
            JExpressionKind::Conditional {
                cond,
                then_expr,
                else_expr,
                ..
            } => {
                self.substitute(cond);
                self.substitute(then_expr);
                self.substitute(else_expr);
            }
            JExpressionKind::Cast { expr, .. } | JExpressionKind::InstanceOf { expr, .. } => self.substitute(expr),
            JExpressionKind::Multi(exprs) => exprs.iter_mut().for_each(|e| self.substitute(e)),
        }
    }
}

struct Inliner<'a> {
    bodies: &'a FxHashMap<MethodId, InlineBody>,
    current: Option<MethodId>,
    changed: bool,
}

impl Inliner<'_> {
    fn crosses_class_init(&self, program: &JProgram, callee: MethodId) -> bool {
        let owner = program.methods[callee].enclosing_type;
        let caller_owner = self.current.map(|m| program.methods[m].enclosing_type);
        program.types[owner].clinit.is_some() && caller_owner != Some(owner)
    }

    fn inline_call(&self, program: &JProgram, expr: &JExpression) -> Option<JExpression> {
        let JExpressionKind::MethodCall {
            instance: None,
            target,
            args,
            ..
        } = &expr.kind
        else {
            return None;
        };
        if Some(*target) == self.current || self.crosses_class_init(program, *target) {
            return None;
        }
        let body = self.bodies.get(target)?;
        let decl = &program.methods[*target];
        if decl.params.len() != args.len() {
            return None;
        }
        let info = expr.info.clone();

        match body {
            InlineBody::Empty => {
                let mut effects: Vec<JExpression> = args.iter().filter(|a| a.has_side_effects()).cloned().collect();
                Some(match effects.len() {
                    0 => JExpression::null_lit(info),
                    1 => effects.remove(0),
                    _ => JExpression::multi(info, effects),
                })
            }
            InlineBody::Value(value) => {
                if !substitution_preserves_order(value, &decl.params, args) {
                    return None;
                }
                let mut inlined = value.clone();
                let mut substituter = Substituter {
                    params: &decl.params,
                    args: args.iter().cloned().map(Some).collect(),
                };
                substituter.substitute(&mut inlined);

                // Keep the declared result type visible to later lowering
                let result_ty = decl.return_type.clone();
                let value_ty = inlined.ty(program);
                if result_ty.primitive().is_some() && !result_ty.is_void() && value_ty != result_ty {
                    inlined = JExpression::cast(info, result_ty, inlined);
                }
                Some(inlined)
            }
        }
    }
}

impl JModVisitor for Inliner<'_> {
    fn visit_method(&mut self, method: MethodId, _program: &mut JProgram) -> VisitResult<bool> {
        self.current = Some(method);
        Ok(true)
    }

    fn end_visit_expr(&mut self, expr: &mut JExpression, ctx: &mut ExprContext<'_>) -> VisitResult {
        if let Some(replacement) = self.inline_call(ctx.program, expr) {
            tracing::trace!(
                caller = ?self.current.map(|m| ctx.program.method_name(m)),
                "inlined call"
            );
            ctx.replace_me(replacement);
            self.changed = true;
        }
        Ok(())
    }
}

pub fn inline_methods(program: &mut JProgram) -> VisitResult<bool> {
    let bodies: FxHashMap<MethodId, InlineBody> = program
        .live_methods()
        .into_iter()
        .filter_map(|m| inline_body(program, m).map(|body| (m, body)))
        .collect();
    if bodies.is_empty() {
        return Ok(false);
    }
    let mut inliner = Inliner {
        bodies: &bodies,
        current: None,
        changed: false,
    };
    visitor::accept_program(&mut inliner, program)?;
    Ok(inliner.changed)
}
