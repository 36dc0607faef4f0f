//! Generation of the output AST from the lowered typed program
//!
//! Every live type is emitted supertype first:
//!
//! 1. one `var` statement for its static fields
//! 2. a seed function, when the class has live instances
//! 3. its class initializer, which disarms itself on first call
//! 4. one top-level function per method with a body
//! 5. the prototype setup: methods, field defaults, `typeId$` and
//!    `castableTypeMap$`
//!
//! followed by one call per entry method. Every name is declared through
//! the output scopes before any statement is built, so colliding short
//! names are already disambiguated (`Foo`, `Foo_0`, ...) when a namer runs.
//!
//! The generator only accepts lowered programs. A cast, an `instanceof`, an
//! array allocation, a long operator, a multi-catch `try` or an `assert`
//! reaching it is an internal error.

mod classes;
mod expressions;
pub mod names;
mod statements;

pub use names::JavaToJsNames;

use crate::errors::{InternalCompilerError, VisitResult};
use crate::jast::declarations::{FieldId, MethodBody, MethodId, VarId};
use crate::jast::program::JProgram;
use crate::jast::runtime::{EQUALS_NAME, HASH_CODE_NAME, TO_STRING_NAME};
use crate::jast::type_oracle::TypeOracle;
use crate::jast::types::TypeId;
use crate::js::ast::{JsProgram, JsStatement, JsStatementKind, JsVar};
use crate::js::scope::{NameId, ScopeId, StaticRef};
use crate::source_info::SourceInfo;
use names::{mangle, poly_ident};
use rustc_hash::{FxHashMap, FxHashSet};

/// The output of code generation for one permutation
#[derive(Debug, Clone)]
pub struct GeneratedJs {
    pub program: JsProgram,
    pub names: JavaToJsNames,
}

/// Translate a lowered program
pub fn generate(program: &JProgram) -> VisitResult<GeneratedJs> {
    let mut generator = CodeGenerator::new(program);
    generator.declare_names();
    generator.emit_types()?;
    generator.emit_entries()?;
    tracing::debug!(
        types = generator.order.len(),
        functions = generator.names.methods.len(),
        statements = generator.js.global_block.len(),
        "generated javascript ast"
    );
    Ok(GeneratedJs {
        program: generator.js,
        names: generator.names,
    })
}

pub(crate) struct CodeGenerator<'a> {
    program: &'a JProgram,
    oracle: TypeOracle,
    js: JsProgram,
    names: JavaToJsNames,
    poly_by_signature: FxHashMap<String, NameId>,
    /// `_`, holds the prototype under construction
    temp: NameId,
    /// Live types, every superclass before its subclasses
    order: Vec<TypeId>,
    with_clinit: FxHashSet<TypeId>,
    with_prototype: FxHashSet<TypeId>,
    next_type_id: u32,
}

/// State of the function currently being translated
pub(crate) struct FunctionCx {
    scope: ScopeId,
    class_chain: Vec<TypeId>,
    vars: FxHashMap<VarId, NameId>,
    /// Variables in first-use order
    used: Vec<VarId>,
    /// Variables with a `var` statement, a parameter slot or a catch slot
    declared: FxHashSet<VarId>,
    labels: FxHashMap<String, NameId>,
}

impl FunctionCx {
    fn new(scope: ScopeId, class_chain: Vec<TypeId>) -> Self {
        Self {
            scope,
            class_chain,
            vars: FxHashMap::default(),
            used: Vec::new(),
            declared: FxHashSet::default(),
            labels: FxHashMap::default(),
        }
    }

    fn var_name(&mut self, js: &mut JsProgram, program: &JProgram, var: VarId) -> NameId {
        if let Some(name) = self.vars.get(&var) {
            return *name;
        }
        let ident = &program.variables[var].name;
        let name = js.fresh_name(self.scope, ident, ident);
        self.vars.insert(var, name);
        self.used.push(var);
        name
    }

    fn label(&mut self, js: &mut JsProgram, label: &str) -> NameId {
        if let Some(name) = self.labels.get(label) {
            return *name;
        }
        let name = js.fresh_name(self.scope, label, label);
        self.labels.insert(label.to_string(), name);
        name
    }

    /// `var` statement for temporaries that never had a declaration
    fn hoisted_vars(&self, info: &SourceInfo) -> Option<JsStatement> {
        let vars: Vec<JsVar> = self
            .used
            .iter()
            .filter(|var| !self.declared.contains(var))
            .map(|var| JsVar {
                info: info.clone(),
                name: self.vars[var],
                init: None,
            })
            .collect();
        (!vars.is_empty()).then(|| JsStatement::new(info.clone(), JsStatementKind::Vars(vars)))
    }
}

impl<'a> CodeGenerator<'a> {
    fn new(program: &'a JProgram) -> Self {
        let oracle = TypeOracle::build(program);
        let mut js = JsProgram::new();
        let top = js.top_scope;
        let temp = js.fresh_name(top, "_", "_");

        let mut order = Vec::new();
        let mut seen = FxHashSet::default();
        for ty in &program.declared_types {
            for class in oracle.class_chain(*ty).into_iter().rev() {
                if seen.insert(class) {
                    order.push(class);
                }
            }
        }

        let mut with_clinit = FxHashSet::default();
        let mut with_prototype = FxHashSet::default();
        for ty in &order {
            let decl = &program.types[*ty];
            let own = decl.clinit.is_some_and(|clinit| {
                matches!(&program.methods[clinit].body, MethodBody::Java(stmts) if !stmts.is_empty())
            });
            let inherited = oracle
                .super_class(*ty)
                .is_some_and(|parent| with_clinit.contains(&parent));
            if own || inherited {
                with_clinit.insert(*ty);
            }
            if decl.is_class() && oracle.has_instantiated_subtype(*ty) {
                with_prototype.insert(*ty);
            }
        }

        Self {
            program,
            oracle,
            js,
            names: JavaToJsNames::default(),
            poly_by_signature: FxHashMap::default(),
            temp,
            order,
            with_clinit,
            with_prototype,
            next_type_id: 0,
        }
    }

    /// Declare every top-level function, static variable and property
    fn declare_names(&mut self) {
        let program = self.program;
        let top = self.js.top_scope;
        let object_scope = self.js.object_scope;
        for ty in self.order.clone() {
            let decl = &program.types[ty];
            let short = decl.short_name();
            let mangled = mangle(&decl.name);

            if self.with_prototype.contains(&ty) {
                let seed = self.js.fresh_name(top, &mangled, short);
                self.names.types.insert(ty, seed);
            }
            if self.with_clinit.contains(&ty) {
                let clinit = self.js.fresh_name(
                    top,
                    &format!("$clinit_{}", mangled),
                    &format!("$clinit_{}", short),
                );
                self.js.set_static_ref(clinit, StaticRef::Clinit);
                self.names.clinits.insert(ty, clinit);
            }

            for field in &decl.fields {
                if program.null_field == Some(*field) {
                    continue;
                }
                let f = &program.fields[*field];
                let name = if f.is_static {
                    let name = self.js.fresh_name(
                        top,
                        &mangle(&program.field_name(*field)),
                        &format!("{}_{}", short, f.name),
                    );
                    self.js.set_static_ref(name, StaticRef::Var);
                    name
                } else {
                    self.js.fresh_name(object_scope, &f.name, &f.name)
                };
                self.names.fields.insert(*field, name);
            }

            for method in &decl.methods {
                let m = &program.methods[*method];
                if m.is_clinit {
                    continue;
                }
                if !matches!(m.body, MethodBody::Abstract) {
                    let name = self.js.fresh_name(
                        top,
                        &mangle(&program.method_name(*method)),
                        &format!("{}_{}", short, m.name),
                    );
                    // constructors keep their identity: the prototype hangs off them
                    if !m.is_constructor {
                        self.js.set_static_ref(name, StaticRef::Function);
                    }
                    self.names.methods.insert(*method, name);
                }
                if m.is_virtual() {
                    self.poly_name(*method);
                }
            }
        }
    }

    /// Prototype property of a virtual method, shared by every method with
    /// the same signature
    fn poly_name(&mut self, method: MethodId) -> NameId {
        let signature = self.program.signature(method);
        if let Some(name) = self.poly_by_signature.get(&signature) {
            self.names.polymorphic.insert(method, *name);
            return *name;
        }
        let name = match signature.as_str() {
            "equals(Ljava/lang/Object;)" => self.js.fixed_property(EQUALS_NAME),
            "hashCode()" => self.js.fixed_property(HASH_CODE_NAME),
            "toString()" => self.js.fixed_property(TO_STRING_NAME),
            _ => {
                let simple = &self.program.methods[method].name;
                let object_scope = self.js.object_scope;
                self.js
                    .fresh_name(object_scope, &poly_ident(simple, &signature), simple)
            }
        };
        self.poly_by_signature.insert(signature, name);
        self.names.polymorphic.insert(method, name);
        name
    }

    fn function_of(&self, method: MethodId) -> VisitResult<NameId> {
        self.names.function(method).ok_or_else(|| {
            InternalCompilerError::new(format!(
                "no function was generated for {}",
                self.program.method_name(method)
            ))
        })
    }

    fn seed_of(&self, ty: TypeId) -> VisitResult<NameId> {
        self.names.seed(ty).ok_or_else(|| {
            InternalCompilerError::new(format!("{} has no prototype", self.program.types[ty].name))
        })
    }

    fn field_of(&self, field: FieldId) -> VisitResult<NameId> {
        self.names.field(field).ok_or_else(|| {
            InternalCompilerError::new(format!("{} has no output name", self.program.field_name(field)))
        })
    }
}
