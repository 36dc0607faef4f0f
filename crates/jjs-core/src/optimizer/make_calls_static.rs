//! Turns monomorphic instance calls into static calls
//!
//! Every instance method reached through a call site that can only dispatch
//! to it gets a static twin `$name(this$static, ...)` holding the original
//! body. The instance method keeps a one-line body forwarding to the twin so
//! that the remaining polymorphic sites still work.

use crate::errors::{CompilationError, VisitResult};
use crate::fixpoint::OptimizationPass;
use crate::jast::declarations::{MethodFlags, MethodId, VarId};
use crate::jast::expression::{JExpression, JExpressionKind};
use crate::jast::program::JProgram;
use crate::jast::statement::JStatement;
use crate::jast::type_oracle::TypeOracle;
use crate::jast::types::JType;
use crate::jast::visitor::{self, ExprContext, JModVisitor, JVisitor, VisitCx};
use rustc_hash::{FxHashMap, FxHashSet};

pub struct MakeCallsStatic;

impl OptimizationPass<JProgram> for MakeCallsStatic {
    fn name(&self) -> &'static str {
        "make-calls-static"
    }

    fn run(&mut self, program: &mut JProgram) -> Result<bool, CompilationError> {
        Ok(make_calls_static(program)?)
    }
}

/// Whether a call to `target` through a receiver can only reach `target`
fn is_monomorphic(program: &JProgram, oracle: &TypeOracle, target: MethodId, static_dispatch: bool) -> bool {
    let decl = &program.methods[target];
    if decl.is_static || decl.is_constructor || decl.is_abstract || decl.is_native() {
        return false;
    }
    // Object methods may be called on strings and arrays
    if program.index.types.get("Object") == Some(&decl.enclosing_type) {
        return false;
    }
    if program.is_static_impl(target) || program.devirtualized.contains_key(&target) {
        return false;
    }
    static_dispatch
        || decl.is_private
        || decl.is_final
        || program.types[decl.enclosing_type].is_final
        || !oracle.is_overridden(target)
}

struct MonomorphicCallFinder<'a> {
    oracle: &'a TypeOracle,
    targets: FxHashSet<MethodId>,
}

impl JVisitor for MonomorphicCallFinder<'_> {
    fn visit_expr(&mut self, expr: &JExpression, cx: VisitCx<'_>) -> bool {
        if let JExpressionKind::MethodCall {
            instance: Some(_),
            target,
            static_dispatch,
            ..
        } = &expr.kind
        {
            if is_monomorphic(cx.program, self.oracle, *target, *static_dispatch) {
                self.targets.insert(*target);
            }
        }
        true
    }
}

/// Rewrites a moved instance body to use the explicit receiver parameter
struct BodyRemapper {
    this_param: VarId,
    params: FxHashMap<VarId, VarId>,
}

impl JModVisitor for BodyRemapper {
    fn end_visit_expr(&mut self, expr: &mut JExpression, ctx: &mut ExprContext<'_>) -> VisitResult {
        match &expr.kind {
            JExpressionKind::This(_) => {
                ctx.replace_me(JExpression::var_ref(expr.info.clone(), self.this_param));
            }
            JExpressionKind::VariableRef(var) => {
                if let Some(mapped) = self.params.get(var) {
                    ctx.replace_me(JExpression::var_ref(expr.info.clone(), *mapped));
                }
            }
            _ => {}
        }
        Ok(())
    }
}

/// Create the static twin of `method` and turn `method` into a forwarder
fn create_static_impl(program: &mut JProgram, method: MethodId) -> VisitResult<MethodId> {
    let decl = program.methods[method].clone();
    let owner = decl.enclosing_type;
    let info = decl.info.make_child();
    let static_impl = program.create_method(
        info.clone(),
        owner,
        &format!("${}", decl.name),
        decl.return_type.clone(),
        MethodFlags::static_method(),
    );
    let this_param = program.create_param(info.clone(), static_impl, "this$static", JType::Declared(owner), true);

    let mut params = FxHashMap::default();
    for param in &decl.params {
        let var = program.variables[*param].clone();
        let copy = program.create_param(var.info.clone(), static_impl, &var.name, var.ty.clone(), var.is_final);
        params.insert(*param, copy);
    }

    // Locals move along with the body
    for local in &decl.locals {
        program.variables[*local].enclosing_method = static_impl;
    }
    program.methods[static_impl].locals = decl.locals.clone();
    program.methods[method].locals.clear();

    let mut body = program.take_body(method).unwrap_or_default();
    let mut remapper = BodyRemapper { this_param, params };
    visitor::accept_stmts(&mut remapper, program, Some(static_impl), &mut body)?;
    program.set_body(static_impl, body);

    let mut args = vec![JExpression::this(info.clone(), owner)];
    args.extend(decl.params.iter().map(|p| JExpression::var_ref(info.clone(), *p)));
    let forward = JExpression::static_call(info.clone(), static_impl, args);
    let stub = if decl.return_type.is_void() {
        JStatement::expr(forward)
    } else {
        JStatement::return_stmt(info, Some(forward))
    };
    program.set_body(method, vec![stub]);
    program.static_impls.insert(method, static_impl);

    tracing::trace!(method = %program.method_name(method), "created static implementation");
    Ok(static_impl)
}

struct CallRedirector<'a> {
    redirect: &'a FxHashMap<MethodId, MethodId>,
    changed: bool,
}

impl JModVisitor for CallRedirector<'_> {
    fn visit_method(&mut self, method: MethodId, program: &mut JProgram) -> VisitResult<bool> {
        // The forwarding stub must keep calling its twin, never itself
        Ok(!program.static_impls.contains_key(&method))
    }

    fn end_visit_expr(&mut self, expr: &mut JExpression, ctx: &mut ExprContext<'_>) -> VisitResult {
        let JExpressionKind::MethodCall {
            instance, target, args, ..
        } = &mut expr.kind
        else {
            return Ok(());
        };
        let Some(static_impl) = self.redirect.get(&*target).copied() else {
            return Ok(());
        };
        let Some(receiver) = instance.take() else {
            return Ok(());
        };
        let mut static_args = Vec::with_capacity(args.len() + 1);
        static_args.push(*receiver);
        static_args.append(args);
        ctx.replace_me(JExpression::static_call(expr.info.clone(), static_impl, static_args));
        self.changed = true;
        Ok(())
    }
}

pub fn make_calls_static(program: &mut JProgram) -> VisitResult<bool> {
    let oracle = TypeOracle::build(program);
    let mut finder = MonomorphicCallFinder {
        oracle: &oracle,
        targets: FxHashSet::default(),
    };
    visitor::visit_program(&mut finder, program);
    if finder.targets.is_empty() {
        return Ok(false);
    }

    let mut targets: Vec<MethodId> = finder.targets.into_iter().collect();
    targets.sort();

    let mut redirect = FxHashMap::default();
    let mut changed = false;
    for target in targets {
        let static_impl = match program.static_impls.get(&target) {
            Some(existing) => *existing,
            None => {
                changed = true;
                create_static_impl(program, target)?
            }
        };
        redirect.insert(target, static_impl);
    }

    let mut redirector = CallRedirector {
        redirect: &redirect,
        changed: false,
    };
    visitor::accept_program(&mut redirector, program)?;
    Ok(changed || redirector.changed)
}
