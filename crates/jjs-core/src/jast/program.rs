//! The typed program: arenas of declarations plus whole-program tables
//!
//! Declarations live in [`Arena`]s and refer to each other through handles.
//! Arena slots are never freed; removing a member detaches it from its
//! owner's member list (and removing a type detaches it from
//! [`JProgram::declared_types`]), after which nothing can reach it.

use crate::arena::Arena;
use crate::errors::{InternalCompilerError, VisitResult};
use crate::jast::declarations::{
    FieldId, JDeclaredType, JField, JMethod, JVariable, MethodBody, MethodFlags, MethodId,
    NativeBody, TypeKind, VarId, VariableKind,
};
use crate::jast::statement::JStatement;
use crate::jast::types::{JType, TypeId};
use crate::source_info::{CorrelationFactory, SourceInfo};
use indexmap::IndexMap;
use rustc_hash::{FxHashMap, FxHashSet};
use serde::{Deserialize, Serialize};

/// A program member that can be rescued or pruned
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Member {
    Type(TypeId),
    Field(FieldId),
    Method(MethodId),
}

/// An entry method; instance entries carry the no-arg constructor that
/// creates their receiver
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntryMethod {
    pub method: MethodId,
    pub ctor: Option<MethodId>,
}

/// Runtime members looked up by fixed name
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IndexedRegistry {
    pub types: FxHashMap<String, TypeId>,
    pub methods: FxHashMap<String, MethodId>,
    pub fields: FxHashMap<String, FieldId>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct JProgram {
    pub types: Arena<JDeclaredType>,
    pub fields: Arena<JField>,
    pub methods: Arena<JMethod>,
    pub variables: Arena<JVariable>,
    /// Live types, in declaration order
    pub declared_types: Vec<TypeId>,
    pub entry_methods: Vec<EntryMethod>,
    pub rescued: FxHashSet<Member>,
    /// Rebind answers rescued before the permutation's answers are known
    #[serde(default)]
    pub rebind_rescues: FxHashSet<TypeId>,
    pub index: IndexedRegistry,
    /// Instance method -> static implementation holding its body
    pub static_impls: FxHashMap<MethodId, MethodId>,
    /// Instance method -> static helper used when the receiver may be a
    /// string or an array
    pub devirtualized: FxHashMap<MethodId, MethodId>,
    /// Types participating in runtime type checks, with their query id
    pub query_ids: IndexMap<TypeId, u32>,
    /// Classes with live instances; `None` until the first prune
    pub instantiated: Option<FxHashSet<TypeId>>,
    pub null_method: Option<MethodId>,
    pub null_field: Option<FieldId>,
    pub correlator: CorrelationFactory,
}

impl JProgram {
    pub fn new(track_source_info: bool) -> Self {
        Self {
            correlator: CorrelationFactory::new(track_source_info),
            ..Self::default()
        }
    }

    /// Source info for a node created by the front end
    pub fn info(&mut self, file: &str, start_line: u32, start_pos: u32, end_pos: u32) -> SourceInfo {
        self.correlator.create_info(file, start_line, start_pos, end_pos)
    }

    // ------------------------------------------------------------------
    // Construction
    // ------------------------------------------------------------------

    pub fn create_class(
        &mut self,
        info: SourceInfo,
        name: &str,
        super_class: Option<TypeId>,
        is_abstract: bool,
        is_final: bool,
    ) -> TypeId {
        self.create_type(info, name, TypeKind::Class, super_class, is_abstract, is_final)
    }

    /// Create an enum extending the support library's `java.lang.Enum`
    pub fn create_enum(&mut self, info: SourceInfo, name: &str) -> TypeId {
        let base = self.index.types.get("Enum").copied();
        self.create_type(info, name, TypeKind::Enum, base, false, true)
    }

    pub fn create_interface(&mut self, info: SourceInfo, name: &str) -> TypeId {
        let object = self.index.types.get("Object").copied();
        self.create_type(info, name, TypeKind::Interface, object, true, false)
    }

    fn create_type(
        &mut self,
        mut info: SourceInfo,
        name: &str,
        kind: TypeKind,
        super_class: Option<TypeId>,
        is_abstract: bool,
        is_final: bool,
    ) -> TypeId {
        info.add_correlation(self.correlator.by_class(name));
        let id = self.types.alloc(JDeclaredType {
            info,
            name: name.to_string(),
            kind,
            super_class,
            interfaces: Vec::new(),
            fields: Vec::new(),
            methods: Vec::new(),
            clinit: None,
            is_abstract,
            is_final,
            is_ordinalized: false,
        });
        self.declared_types.push(id);
        id
    }

    pub fn add_interface(&mut self, ty: TypeId, interface: TypeId) {
        let decl = &mut self.types[ty];
        if !decl.interfaces.contains(&interface) {
            decl.interfaces.push(interface);
        }
    }

    pub fn create_field(
        &mut self,
        mut info: SourceInfo,
        enclosing_type: TypeId,
        name: &str,
        ty: JType,
        is_static: bool,
        is_final: bool,
    ) -> FieldId {
        let qualified = format!("{}.{}", self.types[enclosing_type].name, name);
        info.add_correlation(self.correlator.by_field(&qualified));
        let id = self.fields.alloc(JField {
            info,
            name: name.to_string(),
            enclosing_type,
            ty,
            is_static,
            is_final,
            constant: None,
            ordinal: None,
        });
        self.types[enclosing_type].fields.push(id);
        id
    }

    /// Static final field of `enum_ty` holding the constant at `ordinal`
    pub fn create_enum_constant(&mut self, info: SourceInfo, enum_ty: TypeId, name: &str, ordinal: i32) -> FieldId {
        let field = self.create_field(info, enum_ty, name, JType::Declared(enum_ty), true, true);
        self.fields[field].ordinal = Some(ordinal);
        field
    }

    /// Create a method with an empty Java body (or an abstract body when
    /// the flags say so). Parameters are added with [`create_param`](Self::create_param).
    pub fn create_method(
        &mut self,
        mut info: SourceInfo,
        enclosing_type: TypeId,
        name: &str,
        return_type: JType,
        flags: MethodFlags,
    ) -> MethodId {
        let qualified = format!("{}.{}", self.types[enclosing_type].name, name);
        info.add_correlation(self.correlator.by_method(&qualified));
        let body = if flags.is_abstract {
            MethodBody::Abstract
        } else {
            MethodBody::Java(Vec::new())
        };
        let id = self.methods.alloc(JMethod {
            info,
            name: name.to_string(),
            enclosing_type,
            params: Vec::new(),
            locals: Vec::new(),
            return_type,
            original_param_types: Vec::new(),
            body,
            is_static: flags.is_static,
            is_abstract: flags.is_abstract,
            is_final: flags.is_final,
            is_private: flags.is_private,
            is_constructor: flags.is_constructor,
            is_clinit: false,
        });
        self.types[enclosing_type].methods.push(id);
        id
    }

    /// The class initialiser of `ty`, created on first request
    pub fn ensure_clinit(&mut self, ty: TypeId) -> MethodId {
        if let Some(clinit) = self.types[ty].clinit {
            return clinit;
        }
        let info = self.types[ty].info.make_child();
        let clinit = self.create_method(info, ty, "$clinit", JType::VOID, MethodFlags::static_method());
        self.methods[clinit].is_clinit = true;
        self.types[ty].clinit = Some(clinit);
        clinit
    }

    pub fn create_param(
        &mut self,
        info: SourceInfo,
        method: MethodId,
        name: &str,
        ty: JType,
        is_final: bool,
    ) -> VarId {
        let id = self.variables.alloc(JVariable {
            info,
            name: name.to_string(),
            ty: ty.clone(),
            kind: VariableKind::Parameter,
            enclosing_method: method,
            is_final,
        });
        let decl = &mut self.methods[method];
        decl.params.push(id);
        decl.original_param_types.push(ty);
        id
    }

    pub fn create_local(
        &mut self,
        info: SourceInfo,
        method: MethodId,
        name: &str,
        ty: JType,
        is_final: bool,
    ) -> VarId {
        let id = self.variables.alloc(JVariable {
            info,
            name: name.to_string(),
            ty,
            kind: VariableKind::Local,
            enclosing_method: method,
            is_final,
        });
        self.methods[method].locals.push(id);
        id
    }

    pub fn set_body(&mut self, method: MethodId, stmts: Vec<JStatement>) {
        self.methods[method].body = MethodBody::Java(stmts);
    }

    pub fn set_native_body(&mut self, method: MethodId, code: impl Into<String>) {
        self.methods[method].body = MethodBody::Native(NativeBody { code: code.into() });
    }

    pub fn set_constant(&mut self, field: FieldId, value: crate::jast::JLiteral) {
        self.fields[field].constant = Some(value);
    }

    pub fn add_entry_method(&mut self, method: MethodId, ctor: Option<MethodId>) {
        if !self.entry_methods.iter().any(|e| e.method == method) {
            self.entry_methods.push(EntryMethod { method, ctor });
        }
    }

    pub fn rescue(&mut self, member: Member) {
        self.rescued.insert(member);
    }

    pub fn register_indexed_type(&mut self, key: &str, ty: TypeId) {
        self.index.types.insert(key.to_string(), ty);
    }

    pub fn register_indexed_method(&mut self, key: &str, method: MethodId) {
        self.index.methods.insert(key.to_string(), method);
    }

    pub fn register_indexed_field(&mut self, key: &str, field: FieldId) {
        self.index.fields.insert(key.to_string(), field);
    }

    // ------------------------------------------------------------------
    // Bodies
    // ------------------------------------------------------------------

    /// Temporarily take a Java body out of its method so it can be
    /// rewritten while the rest of the program is mutably borrowed
    pub fn take_body(&mut self, method: MethodId) -> Option<Vec<JStatement>> {
        match &mut self.methods[method].body {
            MethodBody::Java(stmts) => Some(std::mem::take(stmts)),
            _ => None,
        }
    }

    /// Put back a body taken with [`take_body`](Self::take_body)
    pub fn restore_body(&mut self, method: MethodId, stmts: Vec<JStatement>) {
        if let MethodBody::Java(slot) = &mut self.methods[method].body {
            *slot = stmts;
        }
    }

    // ------------------------------------------------------------------
    // Lookup
    // ------------------------------------------------------------------

    pub fn indexed_type(&self, key: &str) -> VisitResult<TypeId> {
        self.index
            .types
            .get(key)
            .copied()
            .ok_or_else(|| InternalCompilerError::new(format!("unknown indexed type '{}'", key)))
    }

    pub fn indexed_method(&self, key: &str) -> VisitResult<MethodId> {
        self.index
            .methods
            .get(key)
            .copied()
            .ok_or_else(|| InternalCompilerError::new(format!("unknown indexed method '{}'", key)))
    }

    pub fn indexed_field(&self, key: &str) -> VisitResult<FieldId> {
        self.index
            .fields
            .get(key)
            .copied()
            .ok_or_else(|| InternalCompilerError::new(format!("unknown indexed field '{}'", key)))
    }

    /// Indexed methods, sorted by key
    pub fn indexed_methods_sorted(&self) -> Vec<(&str, MethodId)> {
        let mut all: Vec<_> = self
            .index
            .methods
            .iter()
            .map(|(k, v)| (k.as_str(), *v))
            .collect();
        all.sort_by(|a, b| a.0.cmp(b.0));
        all
    }

    pub fn find_type(&self, name: &str) -> Option<TypeId> {
        self.declared_types
            .iter()
            .copied()
            .find(|id| self.types[*id].name == name)
    }

    /// Method declared directly on `ty` with the given name and arity
    pub fn find_method(&self, ty: TypeId, name: &str, arity: usize) -> Option<MethodId> {
        self.types[ty]
            .methods
            .iter()
            .copied()
            .find(|m| self.methods[*m].name == name && self.methods[*m].params.len() == arity)
    }

    pub fn object_type(&self) -> JType {
        self.index
            .types
            .get("Object")
            .map(|id| JType::Declared(*id))
            .unwrap_or(JType::Null)
    }

    pub fn string_type(&self) -> JType {
        self.index
            .types
            .get("String")
            .map(|id| JType::Declared(*id))
            .unwrap_or(JType::Null)
    }

    pub fn class_literal_type(&self) -> JType {
        self.index
            .types
            .get("Class")
            .map(|id| JType::Declared(*id))
            .unwrap_or_else(|| self.object_type())
    }

    pub fn is_string_type(&self, ty: &JType) -> bool {
        matches!(ty, JType::Declared(id) if self.index.types.get("String") == Some(id))
    }

    pub fn is_object_type(&self, ty: &JType) -> bool {
        matches!(ty, JType::Declared(id) if self.index.types.get("Object") == Some(id))
    }

    /// Every method of every live type, in declaration order
    pub fn live_methods(&self) -> Vec<MethodId> {
        self.declared_types
            .iter()
            .flat_map(|ty| self.types[*ty].methods.iter().copied())
            .collect()
    }

    pub fn live_fields(&self) -> Vec<FieldId> {
        self.declared_types
            .iter()
            .flat_map(|ty| self.types[*ty].fields.iter().copied())
            .collect()
    }

    pub fn live_type_set(&self) -> FxHashSet<TypeId> {
        self.declared_types.iter().copied().collect()
    }

    pub fn is_entry_method(&self, method: MethodId) -> bool {
        self.entry_methods.iter().any(|e| e.method == method)
    }

    /// The instance method a static implementation was created from
    pub fn instance_of_static_impl(&self, static_impl: MethodId) -> Option<MethodId> {
        self.static_impls
            .iter()
            .find(|(_, s)| **s == static_impl)
            .map(|(instance, _)| *instance)
    }

    pub fn is_static_impl(&self, method: MethodId) -> bool {
        self.static_impls.values().any(|s| *s == method)
    }

    // ------------------------------------------------------------------
    // Removal
    // ------------------------------------------------------------------

    pub fn detach_type(&mut self, ty: TypeId) {
        self.declared_types.retain(|t| *t != ty);
    }

    pub fn detach_method(&mut self, method: MethodId) {
        let owner = self.methods[method].enclosing_type;
        self.types[owner].methods.retain(|m| *m != method);
        if self.types[owner].clinit == Some(method) {
            self.types[owner].clinit = None;
        }
    }

    pub fn detach_field(&mut self, field: FieldId) {
        let owner = self.fields[field].enclosing_type;
        self.types[owner].fields.retain(|f| *f != field);
    }

    // ------------------------------------------------------------------
    // Names
    // ------------------------------------------------------------------

    /// Java source spelling of a type
    pub fn type_name(&self, ty: &JType) -> String {
        match ty {
            JType::Primitive(p) => p.name().to_string(),
            JType::Null => "null".to_string(),
            JType::Declared(id) => self.types[*id].name.clone(),
            JType::Array(element) => format!("{}[]", self.type_name(element)),
        }
    }

    pub fn type_descriptor(&self, ty: &JType) -> String {
        match ty {
            JType::Primitive(p) => p.descriptor().to_string(),
            JType::Null => "N".to_string(),
            JType::Declared(id) => format!("L{};", self.types[*id].name.replace('.', "/")),
            JType::Array(element) => format!("[{}", self.type_descriptor(element)),
        }
    }

    /// Name plus original parameter types; overriding is decided on this
    pub fn signature(&self, method: MethodId) -> String {
        let decl = &self.methods[method];
        let mut sig = format!("{}(", decl.name);
        for ty in &decl.original_param_types {
            sig.push_str(&self.type_descriptor(ty));
        }
        sig.push(')');
        sig
    }

    /// `pkg.Type.method` for logging
    pub fn method_name(&self, method: MethodId) -> String {
        let decl = &self.methods[method];
        format!("{}.{}", self.types[decl.enclosing_type].name, decl.name)
    }

    pub fn field_name(&self, field: FieldId) -> String {
        let decl = &self.fields[field];
        format!("{}.{}", self.types[decl.enclosing_type].name, decl.name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_class_is_live() {
        let mut program = JProgram::new(false);
        let object = program.create_class(SourceInfo::unknown(), "java.lang.Object", None, false, false);
        program.register_indexed_type("Object", object);
        let foo = program.create_class(SourceInfo::unknown(), "a.Foo", Some(object), false, false);

        assert_eq!(program.declared_types, vec![object, foo]);
        assert_eq!(program.types[foo].short_name(), "Foo");
        assert_eq!(program.find_type("a.Foo"), Some(foo));
        assert!(program.is_object_type(&JType::Declared(object)));
    }

    #[test]
    fn test_signature_uses_original_param_types() {
        let mut program = JProgram::new(false);
        let foo = program.create_class(SourceInfo::unknown(), "a.Foo", None, false, false);
        let m = program.create_method(SourceInfo::unknown(), foo, "m", JType::VOID, MethodFlags::static_method());
        let p = program.create_param(SourceInfo::unknown(), m, "x", JType::Declared(foo), false);
        program.create_param(SourceInfo::unknown(), m, "y", JType::array_of(JType::INT), false);

        program.variables[p].ty = JType::Null;
        assert_eq!(program.signature(m), "m(La/Foo;[I)");
    }

    #[test]
    fn test_take_and_restore_body() {
        let mut program = JProgram::new(false);
        let foo = program.create_class(SourceInfo::unknown(), "Foo", None, false, false);
        let m = program.create_method(SourceInfo::unknown(), foo, "m", JType::VOID, MethodFlags::static_method());
        program.set_body(m, vec![JStatement::empty(SourceInfo::unknown())]);

        let body = program.take_body(m).unwrap();
        assert_eq!(body.len(), 1);
        assert_eq!(program.methods[m].body.statements().map(<[_]>::len), Some(0));
        program.restore_body(m, body);
        assert_eq!(program.methods[m].body.statements().map(<[_]>::len), Some(1));
    }

    #[test]
    fn test_detach_method_clears_clinit() {
        let mut program = JProgram::new(false);
        let foo = program.create_class(SourceInfo::unknown(), "Foo", None, false, false);
        let clinit = program.ensure_clinit(foo);
        assert_eq!(program.ensure_clinit(foo), clinit);

        program.detach_method(clinit);
        assert!(program.types[foo].clinit.is_none());
        assert!(program.live_methods().is_empty());
    }

    #[test]
    fn test_missing_indexed_member_is_internal_error() {
        let program = JProgram::new(false);
        let err = program.indexed_method("Cast.dynamicCast").unwrap_err();
        assert!(err.message().contains("Cast.dynamicCast"));
    }

    #[test]
    fn test_program_serializes_with_bincode() {
        let mut program = JProgram::new(true);
        let foo = program.create_class(SourceInfo::unknown(), "Foo", None, false, false);
        program.rescue(Member::Type(foo));

        let bytes = bincode::serialize(&program).unwrap();
        let copy: JProgram = bincode::deserialize(&bytes).unwrap();
        assert_eq!(copy.declared_types, vec![foo]);
        assert!(copy.rescued.contains(&Member::Type(foo)));
        assert!(copy.correlator.is_enabled());
    }
}
