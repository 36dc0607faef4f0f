//! Removal of unreachable program members
//!
//! Reachability comes from [`control_flow`](super::control_flow). Beyond
//! dropping whole types, methods and fields, the pruner
//!
//! - replaces writes to fields that are never read with the written value,
//! - drops locals that are never read (their declarations and writes keep
//!   only the side effects of the assigned value),
//! - drops unreferenced parameters of static methods when every argument
//!   passed for them is free of side effects,
//! - retypes remaining references to pruned types as the null type.

use crate::errors::{CompilationError, VisitResult};
use crate::fixpoint::OptimizationPass;
use crate::jast::declarations::{FieldId, MethodId, VarId};
use crate::jast::expression::{BinaryOp, JExpression, JExpressionKind};
use crate::jast::program::{JProgram, Member};
use crate::jast::statement::{JStatement, JStatementKind};
use crate::jast::type_oracle::TypeOracle;
use crate::jast::types::{JType, TypeId};
use crate::jast::visitor::{self, ExprContext, JModVisitor, JVisitor, StmtContext, VisitCx};
use crate::optimizer::control_flow::{compute_reachability, Reachability};
use rustc_hash::{FxHashMap, FxHashSet};

pub struct Pruner {
    rescue_runtime: bool,
}

impl Pruner {
    /// Pruner used inside the optimization fixpoint; keeps the runtime
    /// helpers the lowering passes will call
    pub fn new() -> Self {
        Self { rescue_runtime: true }
    }

    /// Pruner run once after lowering, with no artificial rescue
    pub fn final_prune() -> Self {
        Self { rescue_runtime: false }
    }
}

impl Default for Pruner {
    fn default() -> Self {
        Self::new()
    }
}

impl OptimizationPass<JProgram> for Pruner {
    fn name(&self) -> &'static str {
        if self.rescue_runtime {
            "pruner"
        } else {
            "final-pruner"
        }
    }

    fn run(&mut self, program: &mut JProgram) -> Result<bool, CompilationError> {
        Ok(prune(program, self.rescue_runtime)?)
    }
}

/// Prune `program` once; returns whether anything was removed or retyped
pub fn prune(program: &mut JProgram, rescue_runtime: bool) -> VisitResult<bool> {
    let oracle = TypeOracle::build(program);
    let reach = compute_reachability(program, &oracle, rescue_runtime);

    let dead_types: FxHashSet<TypeId> = program
        .declared_types
        .iter()
        .copied()
        .filter(|ty| !reach.types.contains(ty))
        .collect();

    let mut dead_methods = Vec::new();
    let mut dead_fields = Vec::new();
    let mut write_only_fields = FxHashSet::default();
    for ty in &program.declared_types {
        if dead_types.contains(ty) {
            continue;
        }
        let decl = &program.types[*ty];
        dead_methods.extend(decl.methods.iter().copied().filter(|m| !reach.methods.contains(m)));
        for field in &decl.fields {
            if !reach.is_field_live(*field) {
                dead_fields.push(*field);
            } else if !reach.fields_read.contains(field) && !program.rescued.contains(&Member::Field(*field)) {
                write_only_fields.insert(*field);
            }
        }
    }

    let dead_params = removable_params(program, &reach);

    let live_methods: Vec<MethodId> = program
        .live_methods()
        .into_iter()
        .filter(|m| reach.methods.contains(m))
        .collect();

    let mut rewriter = PruneRewriter {
        reach: &reach,
        write_only_fields: &write_only_fields,
        dead_params: &dead_params,
        dead_types: &dead_types,
        changed: false,
    };
    for method in &live_methods {
        visitor::accept_method(&mut rewriter, program, *method)?;
    }
    let mut changed = rewriter.changed;

    for (method, indices) in &dead_params {
        let decl = &mut program.methods[*method];
        let mut index = 0;
        decl.params.retain(|_| {
            let keep = !indices.contains(&index);
            index += 1;
            keep
        });
        let mut index = 0;
        decl.original_param_types.retain(|_| {
            let keep = !indices.contains(&index);
            index += 1;
            keep
        });
        changed = true;
        tracing::trace!(method = %program.method_name(*method), removed = indices.len(), "pruned parameters");
    }

    for method in &live_methods {
        let before = program.methods[*method].locals.len();
        program.methods[*method]
            .locals
            .retain(|local| reach.vars_read.contains(local));
        changed |= program.methods[*method].locals.len() != before;
    }

    for method in &dead_methods {
        tracing::trace!(method = %program.method_name(*method), "pruned method");
        program.detach_method(*method);
    }
    for field in dead_fields.iter().chain(write_only_fields.iter()) {
        tracing::trace!(field = %program.field_name(*field), "pruned field");
        program.detach_field(*field);
    }
    let mut sorted_dead_types: Vec<TypeId> = dead_types.iter().copied().collect();
    sorted_dead_types.sort();
    for ty in &sorted_dead_types {
        tracing::trace!(ty = %program.types[*ty].name, "pruned type");
        program.detach_type(*ty);
    }
    changed |= !dead_methods.is_empty() || !dead_fields.is_empty() || !write_only_fields.is_empty();
    changed |= !dead_types.is_empty();

    if !dead_types.is_empty() {
        changed |= retype_declarations(program, &dead_types);
    }

    let live: FxHashSet<MethodId> = program.live_methods().into_iter().collect();
    program
        .static_impls
        .retain(|instance, static_impl| live.contains(instance) && live.contains(static_impl));

    let instantiated: FxHashSet<TypeId> = reach
        .instantiated
        .iter()
        .copied()
        .filter(|ty| !dead_types.contains(ty))
        .collect();
    program.instantiated = Some(instantiated);

    Ok(changed)
}

/// Static methods whose unreferenced parameters can go, with the indices to drop
fn removable_params(program: &JProgram, reach: &Reachability) -> FxHashMap<MethodId, FxHashSet<usize>> {
    let indexed: FxHashSet<MethodId> = program.index.methods.values().copied().collect();
    let mut candidates: FxHashMap<MethodId, FxHashSet<usize>> = FxHashMap::default();
    for method in program.live_methods() {
        let decl = &program.methods[method];
        if !reach.methods.contains(&method)
            || !decl.is_static
            || decl.is_native()
            || decl.is_clinit
            || program.is_entry_method(method)
            || program.rescued.contains(&Member::Method(method))
            || indexed.contains(&method)
            || program.is_static_impl(method)
        {
            continue;
        }
        let unused: FxHashSet<usize> = decl
            .params
            .iter()
            .enumerate()
            .filter(|(_, p)| !reach.vars_referenced.contains(p))
            .map(|(i, _)| i)
            .collect();
        if !unused.is_empty() {
            candidates.insert(method, unused);
        }
    }
    if candidates.is_empty() {
        return candidates;
    }

    let mut blocker = ArgumentBlocker {
        candidates: &mut candidates,
    };
    for method in program.live_methods() {
        if reach.methods.contains(&method) {
            visitor::visit_method(&mut blocker, program, method);
        }
    }
    candidates.retain(|_, indices| !indices.is_empty());
    candidates
}

/// Withdraws parameter indices for which some call site passes an
/// argument with side effects
struct ArgumentBlocker<'a> {
    candidates: &'a mut FxHashMap<MethodId, FxHashSet<usize>>,
}

impl JVisitor for ArgumentBlocker<'_> {
    fn visit_expr(&mut self, expr: &JExpression, _cx: VisitCx<'_>) -> bool {
        if let JExpressionKind::MethodCall { target, args, .. } = &expr.kind {
            if let Some(indices) = self.candidates.get_mut(target) {
                indices.retain(|i| args.get(*i).is_some_and(|arg| !arg.has_side_effects()));
            }
        }
        true
    }
}

struct PruneRewriter<'a> {
    reach: &'a Reachability,
    write_only_fields: &'a FxHashSet<FieldId>,
    dead_params: &'a FxHashMap<MethodId, FxHashSet<usize>>,
    dead_types: &'a FxHashSet<TypeId>,
    changed: bool,
}

impl PruneRewriter<'_> {
    fn is_dead_local(&self, var: VarId, program: &JProgram) -> bool {
        !program.variables[var].is_param() && !self.reach.vars_read.contains(&var)
    }

    fn retype(&mut self, ty: &mut JType) {
        if references_dead_type(ty, self.dead_types) {
            *ty = JType::Null;
            self.changed = true;
        }
    }
}

impl JModVisitor for PruneRewriter<'_> {
    fn end_visit_stmt(&mut self, stmt: &mut JStatement, ctx: &mut StmtContext<'_>) -> VisitResult {
        if let JStatementKind::LocalDecl { var, init } = &mut stmt.kind {
            if self.is_dead_local(*var, ctx.program) {
                self.changed = true;
                match init.take() {
                    Some(value) if value.has_side_effects() => ctx.replace_me(JStatement::expr(value)),
                    _ if ctx.can_remove() => ctx.remove_me(),
                    _ => ctx.replace_me(JStatement::empty(stmt.info.clone())),
                }
            }
        }
        Ok(())
    }

    fn end_visit_expr(&mut self, expr: &mut JExpression, ctx: &mut ExprContext<'_>) -> VisitResult {
        match &mut expr.kind {
            JExpressionKind::Binary {
                op: BinaryOp::Assign,
                lhs,
                rhs,
                ty,
            } => {
                self.retype(ty);
                let replacement = match &mut lhs.kind {
                    JExpressionKind::VariableRef(var) if self.is_dead_local(*var, ctx.program) => {
                        Some(std::mem::replace(rhs.as_mut(), JExpression::null_lit(expr.info.clone())))
                    }
                    JExpressionKind::FieldRef { instance, field } if self.write_only_fields.contains(&*field) => {
                        let value = std::mem::replace(rhs.as_mut(), JExpression::null_lit(expr.info.clone()));
                        match instance.take() {
                            Some(instance) if instance.has_side_effects() => {
                                Some(JExpression::multi(expr.info.clone(), vec![*instance, value]))
                            }
                            _ => Some(value),
                        }
                    }
                    _ => None,
                };
                if let Some(replacement) = replacement {
                    self.changed = true;
                    ctx.replace_me(replacement);
                }
            }
            JExpressionKind::MethodCall { target, args, .. } => {
                if let Some(indices) = self.dead_params.get(&*target) {
                    let mut index = 0;
                    args.retain(|_| {
                        let keep = !indices.contains(&index);
                        index += 1;
                        keep
                    });
                }
            }
            JExpressionKind::Binary { ty, .. } | JExpressionKind::Conditional { ty, .. } => self.retype(ty),
            _ => {}
        }
        Ok(())
    }
}

fn references_dead_type(ty: &JType, dead: &FxHashSet<TypeId>) -> bool {
    matches!(ty.leaf_and_dims().0, JType::Declared(id) if dead.contains(id))
}

/// Point declarations of live members at the null type where their declared
/// type was pruned
fn retype_declarations(program: &mut JProgram, dead: &FxHashSet<TypeId>) -> bool {
    let mut changed = false;
    for field in program.live_fields() {
        if references_dead_type(&program.fields[field].ty, dead) {
            program.fields[field].ty = JType::Null;
            changed = true;
        }
    }
    for method in program.live_methods() {
        if references_dead_type(&program.methods[method].return_type, dead) {
            program.methods[method].return_type = JType::Null;
            changed = true;
        }
        let vars: Vec<VarId> = program.methods[method]
            .params
            .iter()
            .chain(program.methods[method].locals.iter())
            .copied()
            .collect();
        for var in vars {
            if references_dead_type(&program.variables[var].ty, dead) {
                program.variables[var].ty = JType::Null;
                changed = true;
            }
        }
    }
    changed
}
