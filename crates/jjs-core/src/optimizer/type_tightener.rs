//! Narrows declared types to what actually flows into them
//!
//! Every assignment, argument and return contributes the static type of its
//! value to the slot it lands in. A slot's new type is the least upper bound
//! of those contributions when that is narrower than its declaration. Slots
//! whose type has no possible instance become the null type.
//!
//! With the narrowed types in place the pass drops casts that always
//! succeed, decides `instanceof` tests whose outcome is known statically,
//! and redirects member accesses on values that can only be null to the
//! null placeholders.

use crate::errors::{CompilationError, VisitResult};
use crate::fixpoint::OptimizationPass;
use crate::jast::declarations::{FieldId, MethodId, VarId};
use crate::jast::expression::{BinaryOp, JExpression, JExpressionKind};
use crate::jast::program::{JProgram, Member};
use crate::jast::statement::{JStatement, JStatementKind};
use crate::jast::type_oracle::TypeOracle;
use crate::jast::types::JType;
use crate::jast::visitor::{self, ExprContext, JModVisitor, JVisitor, VisitCx};
use indexmap::IndexMap;
use rustc_hash::FxHashSet;

pub struct TypeTightener;

impl OptimizationPass<JProgram> for TypeTightener {
    fn name(&self) -> &'static str {
        "type-tightener"
    }

    fn run(&mut self, program: &mut JProgram) -> Result<bool, CompilationError> {
        Ok(tighten_types(program)?)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum Slot {
    Var(VarId),
    Field(FieldId),
    Return(MethodId),
}

#[derive(Default)]
struct FlowRecorder<'a> {
    oracle: Option<&'a TypeOracle>,
    flows: IndexMap<Slot, Vec<JType>>,
    frozen: FxHashSet<Slot>,
}

impl FlowRecorder<'_> {
    fn record(&mut self, slot: Slot, ty: JType) {
        self.flows.entry(slot).or_default().push(ty);
    }

    fn record_args(&mut self, program: &JProgram, target: MethodId, args: &[JExpression]) {
        for (param, arg) in program.methods[target].params.iter().zip(args) {
            self.record(Slot::Var(*param), arg.ty(program));
        }
    }

    /// Overriders of `method`, transitively
    fn all_overriders(&self, method: MethodId) -> Vec<MethodId> {
        let Some(oracle) = self.oracle else {
            return Vec::new();
        };
        let mut seen = vec![method];
        let mut i = 0;
        while i < seen.len() {
            for overrider in oracle.overriders(seen[i]) {
                if !seen.contains(overrider) {
                    seen.push(*overrider);
                }
            }
            i += 1;
        }
        seen.remove(0);
        seen
    }
}

impl JVisitor for FlowRecorder<'_> {
    fn visit_stmt(&mut self, stmt: &JStatement, cx: VisitCx<'_>) -> bool {
        match &stmt.kind {
            JStatementKind::LocalDecl { var, init: Some(init) } => {
                self.record(Slot::Var(*var), init.ty(cx.program));
            }
            JStatementKind::Return(Some(value)) => {
                if let Some(method) = cx.method {
                    self.record(Slot::Return(method), value.ty(cx.program));
                }
            }
            JStatementKind::Try { catches, .. } => {
                for catch in catches {
                    self.frozen.insert(Slot::Var(catch.var));
                }
            }
            _ => {}
        }
        true
    }

    fn visit_expr(&mut self, expr: &JExpression, cx: VisitCx<'_>) -> bool {
        let program = cx.program;
        match &expr.kind {
            JExpressionKind::Binary { op, lhs, rhs, .. } if op.is_assignment() => {
                let slot = match &lhs.kind {
                    JExpressionKind::VariableRef(var) => Some(Slot::Var(*var)),
                    JExpressionKind::FieldRef { field, .. } => Some(Slot::Field(*field)),
                    _ => None,
                };
                if let Some(slot) = slot {
                    // `s += x` keeps whatever type the target already has
                    let ty = if *op == BinaryOp::Assign {
                        rhs.ty(program)
                    } else {
                        lhs.ty(program)
                    };
                    self.record(slot, ty);
                }
            }
            JExpressionKind::MethodCall {
                target,
                args,
                static_dispatch,
                instance,
            } => {
                self.record_args(program, *target, args);
                if instance.is_some() && !*static_dispatch {
                    for overrider in self.all_overriders(*target) {
                        self.record_args(program, overrider, args);
                    }
                }
            }
            JExpressionKind::NewInstance { ctor, args, .. } => self.record_args(program, *ctor, args),
            _ => {}
        }
        true
    }
}

fn freeze_members(program: &JProgram, recorder: &mut FlowRecorder<'_>) {
    let indexed_methods: FxHashSet<MethodId> = program.index.methods.values().copied().collect();
    let indexed_fields: FxHashSet<FieldId> = program.index.fields.values().copied().collect();

    for method in program.live_methods() {
        let decl = &program.methods[method];
        let external = program.is_entry_method(method)
            || program.rescued.contains(&Member::Method(method))
            || indexed_methods.contains(&method);
        if external || decl.is_native() {
            recorder.frozen.insert(Slot::Return(method));
            for param in &decl.params {
                recorder.frozen.insert(Slot::Var(*param));
            }
        }
    }
    for field in program.live_fields() {
        if program.rescued.contains(&Member::Field(field)) || indexed_fields.contains(&field) {
            recorder.frozen.insert(Slot::Field(field));
        }
    }
}

fn declared_type(program: &JProgram, slot: Slot) -> &JType {
    match slot {
        Slot::Var(var) => &program.variables[var].ty,
        Slot::Field(field) => &program.fields[field].ty,
        Slot::Return(method) => &program.methods[method].return_type,
    }
}

fn set_type(program: &mut JProgram, slot: Slot, ty: JType) {
    match slot {
        Slot::Var(var) => program.variables[var].ty = ty,
        Slot::Field(field) => program.fields[field].ty = ty,
        Slot::Return(method) => program.methods[method].return_type = ty,
    }
}

/// The type `slot` should have, if it differs from its declaration
fn tightened(oracle: &TypeOracle, declared: &JType, observed: Option<&Vec<JType>>) -> Option<JType> {
    if !declared.is_reference() || declared.is_null() {
        return None;
    }
    if let JType::Declared(ty) = declared {
        if !oracle.has_instantiated_subtype(*ty) {
            return Some(JType::Null);
        }
    }
    let observed = observed?;
    let general = oracle.generalize(observed)?;
    let stronger = oracle.stronger_type(declared, &general);
    (stronger != *declared).then_some(stronger)
}

/// Narrow slot types; returns whether any type changed
fn tighten_slots(program: &mut JProgram, oracle: &TypeOracle) -> bool {
    let mut recorder = FlowRecorder {
        oracle: Some(oracle),
        ..FlowRecorder::default()
    };
    visitor::visit_program(&mut recorder, program);
    freeze_members(program, &mut recorder);

    // Overriders' results flow out of every method they override
    for method in program.live_methods() {
        for overrider in recorder.all_overriders(method) {
            let ty = program.methods[overrider].return_type.clone();
            recorder.record(Slot::Return(method), ty);
        }
    }

    let mut slots: Vec<Slot> = Vec::new();
    for method in program.live_methods() {
        let decl = &program.methods[method];
        slots.push(Slot::Return(method));
        slots.extend(decl.params.iter().chain(decl.locals.iter()).map(|v| Slot::Var(*v)));
    }
    slots.extend(program.live_fields().into_iter().map(Slot::Field));

    let mut changed = false;
    for slot in slots {
        if recorder.frozen.contains(&slot) {
            continue;
        }
        let declared = declared_type(program, slot);
        if let Some(ty) = tightened(oracle, declared, recorder.flows.get(&slot)) {
            tracing::trace!(?slot, from = %program.type_name(declared), to = %program.type_name(&ty), "tightened");
            set_type(program, slot, ty);
            changed = true;
        }
    }
    changed
}

struct TightenRewriter<'a> {
    oracle: &'a TypeOracle,
    changed: bool,
}

impl TightenRewriter<'_> {
    /// `false`, keeping the effects of `expr`
    fn known_false(expr: &JExpression) -> JExpression {
        let info = expr.info.clone();
        if expr.has_side_effects() {
            JExpression::multi(info.clone(), vec![expr.clone(), JExpression::bool_lit(info, false)])
        } else {
            JExpression::bool_lit(info, false)
        }
    }

    fn unrelated_classes(&self, program: &JProgram, a: &JType, b: &JType) -> bool {
        let (JType::Declared(a), JType::Declared(b)) = (a, b) else {
            return false;
        };
        program.types[*a].is_class()
            && program.types[*b].is_class()
            && !self.oracle.is_subtype(*a, *b)
            && !self.oracle.is_subtype(*b, *a)
    }

    fn rewrite(&self, expr: &JExpression, ctx: &ExprContext<'_>) -> Option<JExpression> {
        let program: &JProgram = ctx.program;
        let info = expr.info.clone();
        match &expr.kind {
            JExpressionKind::Cast { ty, expr: inner } if ty.is_reference() => {
                let from = inner.ty(program);
                self.oracle.can_assign(&from, ty).then(|| (**inner).clone())
            }
            JExpressionKind::InstanceOf { test, expr: inner } => {
                let from = inner.ty(program);
                if from.is_null() {
                    return Some(Self::known_false(inner));
                }
                if self.oracle.can_assign(&from, test) {
                    return Some(JExpression::binary(
                        info.clone(),
                        BinaryOp::RefNeq,
                        (**inner).clone(),
                        JExpression::null_lit(info),
                        JType::BOOLEAN,
                    ));
                }
                let uninstantiable = test
                    .declared()
                    .is_some_and(|t| !self.oracle.has_instantiated_subtype(t));
                if uninstantiable || self.unrelated_classes(program, &from, test) {
                    return Some(Self::known_false(inner));
                }
                None
            }
            JExpressionKind::MethodCall {
                instance: Some(instance),
                args,
                target,
                ..
            } => {
                let null_method = program.null_method?;
                if *target == null_method || !instance.ty(program).is_null() {
                    return None;
                }
                let mut parts: Vec<JExpression> = std::iter::once(&**instance)
                    .chain(args.iter())
                    .filter(|e| e.has_side_effects())
                    .cloned()
                    .collect();
                let call = JExpression::static_call(info.clone(), null_method, Vec::new());
                if parts.is_empty() {
                    return Some(call);
                }
                parts.push(call);
                Some(JExpression::multi(info, parts))
            }
            JExpressionKind::FieldRef {
                instance: Some(instance),
                field,
            } => {
                let null_field = program.null_field?;
                if *field == null_field || !instance.ty(program).is_null() {
                    return None;
                }
                let placeholder = JExpression::field_ref(info.clone(), None, null_field);
                if !instance.has_side_effects() {
                    return Some(placeholder);
                }
                if ctx.is_lvalue() {
                    return None;
                }
                Some(JExpression::multi(info, vec![(**instance).clone(), placeholder]))
            }
            _ => None,
        }
    }
}

impl JModVisitor for TightenRewriter<'_> {
    fn end_visit_expr(&mut self, expr: &mut JExpression, ctx: &mut ExprContext<'_>) -> VisitResult {
        if let Some(replacement) = self.rewrite(expr, ctx) {
            ctx.replace_me(replacement);
            self.changed = true;
        }
        Ok(())
    }
}

pub fn tighten_types(program: &mut JProgram) -> VisitResult<bool> {
    let oracle = TypeOracle::build(program);
    let slots_changed = tighten_slots(program, &oracle);

    let mut rewriter = TightenRewriter {
        oracle: &oracle,
        changed: false,
    };
    visitor::accept_program(&mut rewriter, program)?;
    Ok(slots_changed || rewriter.changed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::jast::declarations::MethodFlags;
    use crate::source_info::SourceInfo;

    fn info() -> SourceInfo {
        SourceInfo::unknown()
    }

    struct Shapes {
        program: JProgram,
        shape: crate::jast::types::TypeId,
        circle: crate::jast::types::TypeId,
        main: MethodId,
        local: VarId,
    }

    /// `Shape s = new Circle();` inside `App.main`
    fn shapes() -> Shapes {
        let mut program = JProgram::new(false);
        let object = program.create_class(info(), "java.lang.Object", None, false, false);
        program.register_indexed_type("Object", object);
        let shape = program.create_class(info(), "Shape", Some(object), true, false);
        let circle = program.create_class(info(), "Circle", Some(shape), false, false);
        let ctor = program.create_method(info(), circle, "Circle", JType::VOID, MethodFlags::constructor());
        let app = program.create_class(info(), "App", Some(object), false, false);
        let main = program.create_method(info(), app, "main", JType::VOID, MethodFlags::static_method());
        program.add_entry_method(main, None);
        let local = program.create_local(info(), main, "s", JType::Declared(shape), false);
        program.set_body(
            main,
            vec![JStatement::local_decl(
                info(),
                local,
                Some(JExpression::new_instance(info(), circle, ctor, vec![])),
            )],
        );
        Shapes {
            program,
            shape,
            circle,
            main,
            local,
        }
    }

    #[test]
    fn test_local_tightens_to_assigned_class() {
        let Shapes {
            mut program,
            circle,
            local,
            ..
        } = shapes();
        assert!(tighten_types(&mut program).unwrap());
        assert_eq!(program.variables[local].ty, JType::Declared(circle));
        assert!(!tighten_types(&mut program).unwrap());
    }

    #[test]
    fn test_redundant_cast_and_instanceof() {
        let Shapes {
            mut program,
            shape,
            main,
            local,
            ..
        } = shapes();
        let mut body = program.take_body(main).unwrap();
        body.push(JStatement::expr(JExpression::cast(
            info(),
            JType::Declared(shape),
            JExpression::var_ref(info(), local),
        )));
        body.push(JStatement::expr(JExpression::instance_of(
            info(),
            JType::Declared(shape),
            JExpression::var_ref(info(), local),
        )));
        program.restore_body(main, body);

        tighten_types(&mut program).unwrap();
        let stmts = program.methods[main].body.statements().unwrap();
        assert!(matches!(
            &stmts[1].kind,
            JStatementKind::Expression(e) if matches!(e.kind, JExpressionKind::VariableRef(_))
        ));
        assert!(matches!(
            &stmts[2].kind,
            JStatementKind::Expression(e)
                if matches!(e.kind, JExpressionKind::Binary { op: BinaryOp::RefNeq, .. })
        ));
    }

    #[test]
    fn test_uninstantiated_type_becomes_null() {
        let mut program = JProgram::new(false);
        let app = program.create_class(info(), "App", None, false, false);
        let ghost = program.create_class(info(), "Ghost", None, false, false);
        let field = program.create_field(info(), app, "g", JType::Declared(ghost), true, false);
        program.instantiated = Some(FxHashSet::from_iter([app]));

        assert!(tighten_types(&mut program).unwrap());
        assert_eq!(program.fields[field].ty, JType::Null);
    }

    #[test]
    fn test_entry_params_are_never_tightened() {
        let Shapes {
            mut program,
            shape,
            circle,
            main,
            ..
        } = shapes();
        let param = program.create_param(info(), main, "arg", JType::Declared(shape), false);
        let ctor = program.find_method(circle, "Circle", 0).unwrap();
        let mut body = program.take_body(main).unwrap();
        body.push(JStatement::expr(JExpression::static_call(
            info(),
            main,
            vec![JExpression::new_instance(info(), circle, ctor, vec![])],
        )));
        program.restore_body(main, body);

        tighten_types(&mut program).unwrap();
        assert_eq!(program.variables[param].ty, JType::Declared(shape));
    }
}
