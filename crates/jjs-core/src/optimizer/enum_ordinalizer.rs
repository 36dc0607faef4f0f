//! Replaces enum values with their ordinals
//!
//! An enum whose values are only stored in slots of the enum's own type,
//! compared with `==` and asked for their ordinal never needs an object per
//! constant. For such an enum every slot of its type becomes `int`, every
//! constant read becomes its ordinal literal, `e.ordinal()` becomes `e`, and
//! the class initializer stops constructing the constants.
//!
//! Any use that needs a real object keeps the enum as it is: a cast or
//! `instanceof` involving it, its class literal, access to an instance member
//! other than the ordinal, construction outside the constant initializers,
//! comparison with anything but the same enum, string conversion, and any
//! flow into or out of a slot of a different type.

use crate::errors::{CompilationError, VisitResult};
use crate::fixpoint::OptimizationPass;
use crate::jast::declarations::{FieldId, MethodId};
use crate::jast::expression::{BinaryOp, JExpression, JExpressionKind, JLiteral};
use crate::jast::program::{JProgram, Member};
use crate::jast::statement::{JStatement, JStatementKind};
use crate::jast::types::{JType, TypeId};
use crate::jast::visitor::{self, ExprContext, JModVisitor, JVisitor, VisitCx};
use rustc_hash::FxHashSet;

pub struct EnumOrdinalizer;

impl OptimizationPass<JProgram> for EnumOrdinalizer {
    fn name(&self) -> &'static str {
        "enum-ordinalizer"
    }

    fn run(&mut self, program: &mut JProgram) -> Result<bool, CompilationError> {
        Ok(ordinalize_enums(program)?)
    }
}

/// Members of `java.lang.Enum` an ordinalized value may still reach
struct EnumSupport {
    ordinal_field: FieldId,
    ordinal_method: MethodId,
    super_ctor: MethodId,
}

impl EnumSupport {
    fn find(program: &JProgram) -> Option<Self> {
        Some(Self {
            ordinal_field: program.indexed_field("Enum.ordinal").ok()?,
            ordinal_method: program.indexed_method("Enum.ordinal").ok()?,
            super_ctor: program.indexed_method("Enum.<init>").ok()?,
        })
    }

    /// `ordinal()` or its static twin
    fn is_ordinal_method(&self, program: &JProgram, method: MethodId) -> bool {
        method == self.ordinal_method || program.instance_of_static_impl(method) == Some(self.ordinal_method)
    }
}

/// The candidate enum `ty` mentions, looking through array dimensions
fn enum_in(candidates: &FxHashSet<TypeId>, ty: &JType) -> Option<TypeId> {
    ty.leaf_and_dims().0.declared().filter(|id| candidates.contains(id))
}

/// Ordinal of `field` when it is a constant of one of `enums`
fn constant_ordinal(program: &JProgram, enums: &FxHashSet<TypeId>, field: FieldId) -> Option<i32> {
    let decl = &program.fields[field];
    decl.ordinal.filter(|_| enums.contains(&decl.enclosing_type))
}

/// Collects the enums that must stay objects
struct OrdinalAnalyzer<'a> {
    support: &'a EnumSupport,
    candidates: &'a FxHashSet<TypeId>,
    blocked: FxHashSet<TypeId>,
}

impl OrdinalAnalyzer<'_> {
    fn block(&mut self, program: &JProgram, ty: &JType, reason: &'static str) {
        if let Some(id) = enum_in(self.candidates, ty) {
            if self.blocked.insert(id) {
                tracing::trace!(ty = %program.types[id].name, reason, "enum kept as objects");
            }
        }
    }

    /// A value of type `from` lands in a slot of type `to`
    fn flow(&mut self, program: &JProgram, from: &JType, to: &JType) {
        if from != to {
            self.block(program, from, "flows into another type");
            self.block(program, to, "receives another type");
        }
    }

    fn flow_args(&mut self, program: &JProgram, target: MethodId, args: &[JExpression]) {
        for (param, arg) in program.methods[target].params.iter().zip(args) {
            self.flow(program, &arg.ty(program), &program.variables[*param].ty);
        }
    }

    /// `E.C = new E(...)` for a constant `C` of a candidate `E`
    fn constant_construction<'e>(
        &self,
        program: &JProgram,
        lhs: &JExpression,
        rhs: &'e JExpression,
    ) -> Option<(MethodId, &'e [JExpression])> {
        let JExpressionKind::FieldRef { instance: None, field } = &lhs.kind else {
            return None;
        };
        constant_ordinal(program, self.candidates, *field)?;
        match &rhs.kind {
            JExpressionKind::NewInstance { class, ctor, args } if *class == program.fields[*field].enclosing_type => {
                Some((*ctor, args))
            }
            _ => None,
        }
    }

    fn block_escaping_members(&mut self, program: &JProgram) {
        for member in &program.rescued {
            match member {
                Member::Type(ty) => self.block(program, &JType::Declared(*ty), "rescued"),
                Member::Field(field) => self.block(program, &program.fields[*field].ty, "rescued"),
                Member::Method(method) => self.block_signature(program, *method, "rescued"),
            }
        }
    }

    fn block_signature(&mut self, program: &JProgram, method: MethodId, reason: &'static str) {
        let decl = &program.methods[method];
        self.block(program, &decl.return_type, reason);
        for param in &decl.params {
            self.block(program, &program.variables[*param].ty, reason);
        }
    }
}

impl JVisitor for OrdinalAnalyzer<'_> {
    fn visit_stmt(&mut self, stmt: &JStatement, cx: VisitCx<'_>) -> bool {
        let program = cx.program;
        match &stmt.kind {
            JStatementKind::LocalDecl { var, init: Some(init) } => {
                self.flow(program, &init.ty(program), &program.variables[*var].ty);
            }
            JStatementKind::Return(Some(value)) => {
                if let Some(method) = cx.method {
                    self.flow(program, &value.ty(program), &program.methods[method].return_type);
                }
            }
            JStatementKind::Switch { expr, .. } => self.block(program, &expr.ty(program), "switched on"),
            _ => {}
        }
        true
    }

    fn visit_expr(&mut self, expr: &JExpression, cx: VisitCx<'_>) -> bool {
        let program = cx.program;
        match &expr.kind {
            JExpressionKind::Literal(JLiteral::Class(ty)) => self.block(program, ty, "class literal"),
            JExpressionKind::Binary { op, lhs, rhs, .. } => {
                if *op == BinaryOp::Assign {
                    if let Some((ctor, args)) = self.constant_construction(program, lhs, rhs) {
                        self.flow_args(program, ctor, args);
                        for arg in args {
                            visitor::visit_expr(self, arg, cx);
                        }
                        return false;
                    }
                    self.flow(program, &rhs.ty(program), &lhs.ty(program));
                } else if matches!(op, BinaryOp::Eq | BinaryOp::Neq | BinaryOp::RefEq | BinaryOp::RefNeq) {
                    self.flow(program, &lhs.ty(program), &rhs.ty(program));
                } else {
                    self.block(program, &lhs.ty(program), "operand");
                    self.block(program, &rhs.ty(program), "operand");
                }
            }
            JExpressionKind::FieldRef {
                instance: Some(instance),
                field,
            } if *field != self.support.ordinal_field => {
                self.block(program, &instance.ty(program), "instance field");
            }
            JExpressionKind::MethodCall {
                instance,
                target,
                args,
                ..
            } => {
                if *target == self.support.super_ctor || self.support.is_ordinal_method(program, *target) {
                    return true;
                }
                let decl = &program.methods[*target];
                if let Some(instance) = instance {
                    self.block(program, &instance.ty(program), "instance call");
                } else if decl.name == "valueOf" {
                    self.block(program, &JType::Declared(decl.enclosing_type), "valueOf");
                }
                if decl.is_native() {
                    self.block_signature(program, *target, "native");
                }
                self.flow_args(program, *target, args);
            }
            JExpressionKind::NewInstance { class, ctor, args } => {
                self.block(program, &JType::Declared(*class), "constructed");
                self.flow_args(program, *ctor, args);
            }
            JExpressionKind::NewArray {
                ty,
                initializers: Some(initializers),
                ..
            } => {
                if let Some(element) = ty.element_type() {
                    for init in initializers {
                        self.flow(program, &init.ty(program), element);
                    }
                }
            }
            JExpressionKind::Conditional {
                then_expr,
                else_expr,
                ty,
                ..
            } => {
                self.flow(program, &then_expr.ty(program), ty);
                self.flow(program, &else_expr.ty(program), ty);
            }
            JExpressionKind::Cast { ty, expr: inner } => self.flow(program, &inner.ty(program), ty),
            JExpressionKind::InstanceOf { test, expr: inner } => {
                self.block(program, &inner.ty(program), "instanceof");
                self.block(program, test, "instanceof");
            }
            _ => {}
        }
        true
    }
}

/// `ty` with every candidate enum leaf replaced by `int`
fn remap(enums: &FxHashSet<TypeId>, ty: &JType) -> Option<JType> {
    enum_in(enums, ty)?;
    let dims = ty.leaf_and_dims().1;
    Some((0..dims).fold(JType::INT, |element, _| JType::array_of(element)))
}

fn remap_in_place(enums: &FxHashSet<TypeId>, ty: &mut JType) {
    if let Some(remapped) = remap(enums, ty) {
        *ty = remapped;
    }
}

/// Retype every live declaration that mentions one of `enums`
fn remap_declarations(program: &mut JProgram, enums: &FxHashSet<TypeId>) {
    for field in program.live_fields() {
        remap_in_place(enums, &mut program.fields[field].ty);
    }
    for method in program.live_methods() {
        let decl = &mut program.methods[method];
        remap_in_place(enums, &mut decl.return_type);
        for ty in &mut decl.original_param_types {
            remap_in_place(enums, ty);
        }
        let vars: Vec<_> = decl.params.iter().chain(decl.locals.iter()).copied().collect();
        for var in vars {
            remap_in_place(enums, &mut program.variables[var].ty);
        }
    }
}

struct OrdinalRewriter<'a> {
    support: &'a EnumSupport,
    enums: &'a FxHashSet<TypeId>,
}

impl JModVisitor for OrdinalRewriter<'_> {
    fn end_visit_expr(&mut self, expr: &mut JExpression, ctx: &mut ExprContext<'_>) -> VisitResult {
        let info = expr.info.clone();
        match &mut expr.kind {
            JExpressionKind::FieldRef { instance: None, field } if !ctx.is_lvalue() => {
                if let Some(ordinal) = constant_ordinal(ctx.program, self.enums, *field) {
                    ctx.replace_me(JExpression::int_lit(info, ordinal));
                }
            }
            JExpressionKind::FieldRef {
                instance: Some(instance),
                field,
            } if *field == self.support.ordinal_field => {
                if instance.ty(ctx.program) == JType::INT {
                    let value = std::mem::replace(instance.as_mut(), JExpression::null_lit(info));
                    ctx.replace_me(value);
                }
            }
            JExpressionKind::MethodCall {
                instance, target, args, ..
            } if self.support.is_ordinal_method(ctx.program, *target) => {
                let receiver = match instance {
                    Some(instance) => Some(instance.as_mut()),
                    None => args.first_mut(),
                };
                if let Some(receiver) = receiver.filter(|r| r.ty(ctx.program) == JType::INT) {
                    let value = std::mem::replace(receiver, JExpression::null_lit(info));
                    ctx.replace_me(value);
                }
            }
            JExpressionKind::Binary {
                op: BinaryOp::Assign,
                lhs,
                rhs,
                ty,
            } => {
                remap_in_place(self.enums, ty);
                if let JExpressionKind::FieldRef { instance: None, field } = &lhs.kind {
                    if let Some(ordinal) = constant_ordinal(ctx.program, self.enums, *field) {
                        **rhs = JExpression::int_lit(info, ordinal);
                    }
                }
            }
            JExpressionKind::Binary { ty, .. }
            | JExpressionKind::Conditional { ty, .. }
            | JExpressionKind::Cast { ty, .. }
            | JExpressionKind::NewArray { ty, .. } => remap_in_place(self.enums, ty),
            _ => {}
        }
        Ok(())
    }
}

/// Ordinalize every enum that never needs to be an object; returns whether
/// any enum was replaced
pub fn ordinalize_enums(program: &mut JProgram) -> VisitResult<bool> {
    let Some(support) = EnumSupport::find(program) else {
        return Ok(false);
    };
    let candidates: FxHashSet<TypeId> = program
        .declared_types
        .iter()
        .copied()
        .filter(|ty| program.types[*ty].is_enum() && !program.types[*ty].is_ordinalized)
        .collect();
    if candidates.is_empty() {
        return Ok(false);
    }

    let mut analyzer = OrdinalAnalyzer {
        support: &support,
        candidates: &candidates,
        blocked: FxHashSet::default(),
    };
    analyzer.block_escaping_members(program);
    visitor::visit_program(&mut analyzer, program);
    let blocked = analyzer.blocked;

    let enums: FxHashSet<TypeId> = candidates.difference(&blocked).copied().collect();
    if enums.is_empty() {
        return Ok(false);
    }

    remap_declarations(program, &enums);
    let mut rewriter = OrdinalRewriter {
        support: &support,
        enums: &enums,
    };
    visitor::accept_program(&mut rewriter, program)?;

    let mut names = Vec::new();
    for ty in &enums {
        program.types[*ty].is_ordinalized = true;
        names.push(program.types[*ty].name.clone());
    }
    names.sort();
    tracing::debug!(ordinalized = ?names, kept = blocked.len(), "enums ordinalized");
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::jast::declarations::MethodFlags;
    use crate::jast::runtime;
    use crate::source_info::SourceInfo;

    fn info() -> SourceInfo {
        SourceInfo::unknown()
    }

    struct Colors {
        program: JProgram,
        color: TypeId,
        red: FieldId,
        green: FieldId,
        main: MethodId,
        print: MethodId,
    }

    /// `enum Color { RED, GREEN }` plus a static `main` and a native `print(int)`
    fn colors() -> Colors {
        let mut program = JProgram::new(false);
        runtime::install(&mut program);
        let enum_ctor = program.indexed_method("Enum.<init>").unwrap();
        let object = program.indexed_type("Object").unwrap();

        let color = program.create_enum(info(), "app.Color");
        let ctor = program.create_method(info(), color, "Color", JType::VOID, MethodFlags::constructor());
        let name = program.create_param(info(), ctor, "name", program.string_type(), false);
        let ordinal = program.create_param(info(), ctor, "ordinal", JType::INT, false);
        program.set_body(
            ctor,
            vec![JStatement::expr(JExpression::super_call(
                info(),
                JExpression::this(info(), color),
                enum_ctor,
                vec![JExpression::var_ref(info(), name), JExpression::var_ref(info(), ordinal)],
            ))],
        );
        let red = program.create_enum_constant(info(), color, "RED", 0);
        let green = program.create_enum_constant(info(), color, "GREEN", 1);
        let clinit = program.ensure_clinit(color);
        let construct = |field, name: &str, ordinal| {
            let args = vec![JExpression::string_lit(info(), name), JExpression::int_lit(info(), ordinal)];
            JStatement::expr(JExpression::assign(
                info(),
                JExpression::field_ref(info(), None, field),
                JExpression::new_instance(info(), color, ctor, args),
                JType::Declared(color),
            ))
        };
        program.set_body(clinit, vec![construct(red, "RED", 0), construct(green, "GREEN", 1)]);

        let app = program.create_class(info(), "app.Main", Some(object), false, false);
        let main = program.create_method(info(), app, "main", JType::VOID, MethodFlags::static_method());
        program.add_entry_method(main, None);
        let print = program.create_method(info(), app, "print", JType::VOID, MethodFlags::static_method());
        program.create_param(info(), print, "x", JType::INT, false);
        program.set_native_body(print, "console.log(x);");
        Colors {
            program,
            color,
            red,
            green,
            main,
            print,
        }
    }

    fn constant(field: FieldId) -> JExpression {
        JExpression::field_ref(info(), None, field)
    }

    #[test]
    fn test_constants_become_ordinals() {
        let Colors {
            mut program,
            color,
            red,
            green,
            main,
            print,
        } = colors();
        let ordinal = program.indexed_method("Enum.ordinal").unwrap();
        let c = program.create_local(info(), main, "c", JType::Declared(color), false);
        program.set_body(
            main,
            vec![
                JStatement::local_decl(info(), c, Some(constant(green))),
                JStatement::expr(JExpression::static_call(
                    info(),
                    print,
                    vec![JExpression::call(info(), Some(JExpression::var_ref(info(), c)), ordinal, vec![])],
                )),
                JStatement::expr(JExpression::static_call(
                    info(),
                    print,
                    vec![JExpression::conditional(
                        info(),
                        JExpression::binary(
                            info(),
                            BinaryOp::Eq,
                            JExpression::var_ref(info(), c),
                            constant(red),
                            JType::BOOLEAN,
                        ),
                        JExpression::int_lit(info(), 1),
                        JExpression::int_lit(info(), 0),
                        JType::INT,
                    )],
                )),
            ],
        );

        assert!(ordinalize_enums(&mut program).unwrap());
        assert!(program.types[color].is_ordinalized);
        assert_eq!(program.variables[c].ty, JType::INT);
        assert_eq!(program.fields[red].ty, JType::INT);

        let stmts = program.methods[main].body.statements().unwrap();
        match &stmts[0].kind {
            JStatementKind::LocalDecl { init: Some(init), .. } => {
                assert!(matches!(init.kind, JExpressionKind::Literal(JLiteral::Int(1))))
            }
            other => panic!("unexpected statement {:?}", other),
        }
        match &stmts[1].kind {
            JStatementKind::Expression(JExpression {
                kind: JExpressionKind::MethodCall { args, .. },
                ..
            }) => assert!(matches!(args[0].kind, JExpressionKind::VariableRef(v) if v == c)),
            other => panic!("unexpected statement {:?}", other),
        }

        let clinit = program.types[color].clinit.unwrap();
        for stmt in program.methods[clinit].body.statements().unwrap() {
            match &stmt.kind {
                JStatementKind::Expression(JExpression {
                    kind: JExpressionKind::Binary { rhs, ty, .. },
                    ..
                }) => {
                    assert!(matches!(rhs.kind, JExpressionKind::Literal(JLiteral::Int(_))));
                    assert_eq!(*ty, JType::INT);
                }
                other => panic!("unexpected statement {:?}", other),
            }
        }

        assert!(!ordinalize_enums(&mut program).unwrap());
    }

    #[test]
    fn test_upcast_keeps_enum() {
        let Colors {
            mut program,
            color,
            red,
            main,
            ..
        } = colors();
        let object = program.object_type();
        let o = program.create_local(info(), main, "o", object, false);
        program.set_body(main, vec![JStatement::local_decl(info(), o, Some(constant(red)))]);

        assert!(!ordinalize_enums(&mut program).unwrap());
        assert!(!program.types[color].is_ordinalized);
        assert_eq!(program.fields[red].ty, JType::Declared(color));
    }

    #[test]
    fn test_null_comparison_keeps_enum() {
        let Colors {
            mut program,
            color,
            red,
            main,
            ..
        } = colors();
        program.set_body(
            main,
            vec![JStatement::expr(JExpression::binary(
                info(),
                BinaryOp::Eq,
                constant(red),
                JExpression::null_lit(info()),
                JType::BOOLEAN,
            ))],
        );

        assert!(!ordinalize_enums(&mut program).unwrap());
        assert!(!program.types[color].is_ordinalized);
    }

    #[test]
    fn test_instance_field_keeps_enum() {
        let Colors {
            mut program,
            color,
            red,
            main,
            ..
        } = colors();
        let weight = program.create_field(info(), color, "weight", JType::INT, false, false);
        program.set_body(
            main,
            vec![JStatement::expr(JExpression::field_ref(info(), Some(constant(red)), weight))],
        );

        assert!(!ordinalize_enums(&mut program).unwrap());
    }

    #[test]
    fn test_enum_arrays_become_int_arrays() {
        let Colors {
            mut program,
            color,
            red,
            green,
            main,
            ..
        } = colors();
        let array_ty = JType::array_of(JType::Declared(color));
        let values = program.create_local(info(), main, "values", array_ty.clone(), false);
        let init = JExpression::new(
            info(),
            JExpressionKind::NewArray {
                ty: array_ty,
                dims: vec![],
                initializers: Some(vec![constant(red), constant(green)]),
            },
        );
        program.set_body(main, vec![JStatement::local_decl(info(), values, Some(init))]);

        assert!(ordinalize_enums(&mut program).unwrap());
        assert_eq!(program.variables[values].ty, JType::array_of(JType::INT));
        let stmts = program.methods[main].body.statements().unwrap();
        match &stmts[0].kind {
            JStatementKind::LocalDecl {
                init: Some(JExpression {
                    kind: JExpressionKind::NewArray { ty, initializers, .. },
                    ..
                }),
                ..
            } => {
                assert_eq!(*ty, JType::array_of(JType::INT));
                let inits = initializers.as_ref().unwrap();
                assert!(matches!(inits[1].kind, JExpressionKind::Literal(JLiteral::Int(1))));
            }
            other => panic!("unexpected statement {:?}", other),
        }
    }
}
