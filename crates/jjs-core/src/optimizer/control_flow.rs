//! Rapid type analysis over the typed program
//!
//! Starting from the roots (entry methods, rescued members and, while the
//! optimization fixpoint runs, every indexed runtime member) the analyzer
//! follows calls, instantiations and field/variable references. A virtual
//! call makes its signature live; every instantiated class that is a subtype
//! of the call's declaring type then contributes the implementation it
//! dispatches to.

use crate::jast::declarations::{FieldId, MethodId, VarId};
use crate::jast::expression::{BinaryOp, JExpression, JExpressionKind, JLiteral};
use crate::jast::program::{JProgram, Member};
use crate::jast::statement::{JStatement, JStatementKind};
use crate::jast::type_oracle::TypeOracle;
use crate::jast::types::{JType, TypeId};
use crate::jast::visitor::{self, JVisitor, VisitCx};
use rustc_hash::FxHashSet;

/// Everything the analysis proved reachable
#[derive(Debug, Default, Clone)]
pub struct Reachability {
    /// Types whose declaration must survive
    pub types: FxHashSet<TypeId>,
    /// Classes with live instances
    pub instantiated: FxHashSet<TypeId>,
    pub methods: FxHashSet<MethodId>,
    pub fields_read: FxHashSet<FieldId>,
    pub fields_written: FxHashSet<FieldId>,
    /// Variables whose value is observed
    pub vars_read: FxHashSet<VarId>,
    /// Variables mentioned anywhere, plain writes included
    pub vars_referenced: FxHashSet<VarId>,
}

impl Reachability {
    pub fn is_field_live(&self, field: FieldId) -> bool {
        self.fields_read.contains(&field) || self.fields_written.contains(&field)
    }
}

pub struct ControlFlowAnalyzer<'a> {
    program: &'a JProgram,
    oracle: &'a TypeOracle,
    result: Reachability,
    worklist: Vec<MethodId>,
    live_virtuals: Vec<MethodId>,
    live_virtual_set: FxHashSet<MethodId>,
}

impl<'a> ControlFlowAnalyzer<'a> {
    pub fn new(program: &'a JProgram, oracle: &'a TypeOracle) -> Self {
        Self {
            program,
            oracle,
            result: Reachability::default(),
            worklist: Vec::new(),
            live_virtuals: Vec::new(),
            live_virtual_set: FxHashSet::default(),
        }
    }

    /// Entry methods, their receivers' constructors and explicitly rescued members
    pub fn trace_entry_points(&mut self) {
        let program = self.program;
        for entry in &program.entry_methods {
            self.trace_method(entry.method);
            if let Some(ctor) = entry.ctor {
                self.trace_method(ctor);
                self.trace_instantiated(program.methods[ctor].enclosing_type);
            }
        }

        let mut rescued: Vec<Member> = program.rescued.iter().copied().collect();
        rescued.sort_by_key(|m| match m {
            Member::Type(t) => (0, t.index()),
            Member::Field(f) => (1, f.index()),
            Member::Method(m) => (2, m.index()),
        });
        for member in rescued {
            match member {
                Member::Type(ty) => self.trace_rescued_type(ty),
                Member::Field(field) => {
                    self.result.fields_read.insert(field);
                    self.result.fields_written.insert(field);
                    self.trace_type(program.fields[field].enclosing_type);
                }
                Member::Method(method) => self.trace_virtual_or_direct(method),
            }
        }
        let mut answers: Vec<TypeId> = program.rebind_rescues.iter().copied().collect();
        answers.sort();
        for ty in answers {
            self.trace_rescued_type(ty);
        }

        // Strings and class literals exist without an explicit `new`, and
        // string conversion of any object dispatches to `toString`.
        for key in ["String", "Class"] {
            if let Some(ty) = program.index.types.get(key) {
                self.trace_instantiated(*ty);
            }
        }
        if let Some(to_string) = program.index.methods.get("Object.toString") {
            self.trace_virtual_or_direct(*to_string);
        }
    }

    /// Keep every indexed runtime member alive so lowering can still call it
    pub fn trace_runtime(&mut self) {
        let program = self.program;
        for (_, method) in program.indexed_methods_sorted() {
            self.trace_virtual_or_direct(method);
        }
        let mut fields: Vec<FieldId> = program.index.fields.values().copied().collect();
        fields.sort();
        for field in fields {
            self.result.fields_read.insert(field);
            self.result.fields_written.insert(field);
            self.trace_type(program.fields[field].enclosing_type);
        }
        let mut types: Vec<TypeId> = program.index.types.values().copied().collect();
        types.sort();
        for ty in types {
            self.trace_type(ty);
        }
    }

    fn trace_rescued_type(&mut self, ty: TypeId) {
        let program = self.program;
        let decl = &program.types[ty];
        self.trace_type(ty);
        if decl.is_class() && !decl.is_abstract {
            self.trace_instantiated(ty);
        }
        for method in &decl.methods {
            self.trace_virtual_or_direct(*method);
        }
        for field in &decl.fields {
            self.result.fields_read.insert(*field);
            self.result.fields_written.insert(*field);
        }
    }

    fn trace_virtual_or_direct(&mut self, method: MethodId) {
        self.trace_method(method);
        if self.program.methods[method].is_virtual() {
            self.trace_virtual_call(method);
        }
    }

    pub fn trace_method(&mut self, method: MethodId) {
        if !self.result.methods.insert(method) {
            return;
        }
        self.worklist.push(method);
        let decl = &self.program.methods[method];
        let owner = decl.enclosing_type;
        self.trace_type(owner);
        if decl.is_static || decl.is_constructor {
            self.trace_clinit(owner);
        }
        if decl.is_clinit {
            if let Some(parent) = self.program.types[owner].super_class {
                self.trace_clinit(parent);
            }
        }
    }

    fn trace_clinit(&mut self, ty: TypeId) {
        if let Some(clinit) = self.program.types[ty].clinit {
            self.trace_method(clinit);
        }
    }

    pub fn trace_type(&mut self, ty: TypeId) {
        if !self.result.types.insert(ty) {
            return;
        }
        let decl = &self.program.types[ty];
        if let Some(parent) = decl.super_class {
            self.trace_type(parent);
        }
        for interface in &decl.interfaces {
            self.trace_type(*interface);
        }
    }

    fn trace_jtype(&mut self, ty: &JType) {
        if let (JType::Declared(id), _) = ty.leaf_and_dims() {
            self.trace_type(*id);
        }
    }

    pub fn trace_instantiated(&mut self, ty: TypeId) {
        if !self.result.instantiated.insert(ty) {
            return;
        }
        self.trace_type(ty);
        let live: Vec<MethodId> = self.live_virtuals.clone();
        for target in live {
            self.dispatch(ty, target);
        }
    }

    fn trace_virtual_call(&mut self, target: MethodId) {
        if !self.live_virtual_set.insert(target) {
            return;
        }
        self.live_virtuals.push(target);
        let mut instantiated: Vec<TypeId> = self.result.instantiated.iter().copied().collect();
        instantiated.sort();
        for ty in instantiated {
            self.dispatch(ty, target);
        }
    }

    /// Make live the implementation an instance of `class` runs for `target`
    fn dispatch(&mut self, class: TypeId, target: MethodId) {
        let owner = self.program.methods[target].enclosing_type;
        if self.oracle.is_interface(class) || !self.oracle.is_subtype(class, owner) {
            return;
        }
        let implementation = self
            .oracle
            .signature(target)
            .and_then(|sig| self.oracle.resolve(class, sig));
        if let Some(implementation) = implementation {
            self.trace_method(implementation);
        }
    }

    fn trace_field_access(&mut self, field: FieldId, read: bool, write: bool) {
        if read {
            self.result.fields_read.insert(field);
        }
        if write {
            self.result.fields_written.insert(field);
        }
        let decl = &self.program.fields[field];
        self.trace_type(decl.enclosing_type);
        if decl.is_static && decl.constant.is_none() {
            self.trace_clinit(decl.enclosing_type);
        }
    }

    /// Drain the worklist and return the closure
    pub fn finish(mut self) -> Reachability {
        let program = self.program;
        while let Some(method) = self.worklist.pop() {
            for param in &program.methods[method].params {
                // Native bodies read their parameters by name
                if program.methods[method].is_native() {
                    self.result.vars_read.insert(*param);
                    self.result.vars_referenced.insert(*param);
                }
            }
            visitor::visit_method(&mut self, program, method);
        }
        self.result
    }
}

impl JVisitor for ControlFlowAnalyzer<'_> {
    fn visit_stmt(&mut self, stmt: &JStatement, _cx: VisitCx<'_>) -> bool {
        if let JStatementKind::Try { catches, .. } = &stmt.kind {
            for catch in catches {
                self.result.vars_read.insert(catch.var);
                self.result.vars_referenced.insert(catch.var);
                let ty = self.program.variables[catch.var].ty.clone();
                self.trace_jtype(&ty);
            }
        }
        true
    }

    fn visit_expr(&mut self, expr: &JExpression, cx: VisitCx<'_>) -> bool {
        match &expr.kind {
            JExpressionKind::Binary {
                op: BinaryOp::Assign,
                lhs,
                rhs,
                ..
            } => {
                // A plain assignment writes its target without observing it
                match &lhs.kind {
                    JExpressionKind::VariableRef(var) => {
                        self.result.vars_referenced.insert(*var);
                    }
                    JExpressionKind::FieldRef { instance, field } => {
                        self.trace_field_access(*field, false, true);
                        if let Some(instance) = instance {
                            visitor::visit_expr(self, instance, cx);
                        }
                    }
                    _ => visitor::visit_expr(self, lhs, cx),
                }
                visitor::visit_expr(self, rhs, cx);
                return false;
            }
            JExpressionKind::VariableRef(var) => {
                self.result.vars_read.insert(*var);
                self.result.vars_referenced.insert(*var);
            }
            JExpressionKind::FieldRef { field, .. } => {
                self.trace_field_access(*field, true, cx.lvalue);
            }
            JExpressionKind::This(ty) => self.trace_type(*ty),
            JExpressionKind::MethodCall {
                target,
                static_dispatch,
                ..
            } => {
                self.trace_method(*target);
                if !*static_dispatch && self.program.methods[*target].is_virtual() {
                    self.trace_virtual_call(*target);
                }
            }
            JExpressionKind::NewInstance { class, ctor, .. } => {
                self.trace_instantiated(*class);
                self.trace_method(*ctor);
            }
            JExpressionKind::NewArray { ty, .. } => self.trace_jtype(ty),
            JExpressionKind::Cast { ty, .. } => self.trace_jtype(ty),
            JExpressionKind::InstanceOf { test, .. } => self.trace_jtype(test),
            JExpressionKind::Literal(JLiteral::Class(ty)) => self.trace_jtype(ty),
            _ => {}
        }
        true
    }
}

/// Run the analysis from the program's roots
pub fn compute_reachability(program: &JProgram, oracle: &TypeOracle, rescue_runtime: bool) -> Reachability {
    let mut analyzer = ControlFlowAnalyzer::new(program, oracle);
    analyzer.trace_entry_points();
    if rescue_runtime {
        analyzer.trace_runtime();
    }
    analyzer.finish()
}
