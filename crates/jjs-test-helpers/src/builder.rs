//! Fluent construction of typed programs for tests
//!
//! Every builder starts from a program with the support library installed,
//! so the result is ready for the full pipeline once an entry class exists.

use crate::eval::PRINT_NATIVE;
use jjs_core::compiler::ENTRY_METHOD_NAME;
use jjs_core::jast::{runtime, FieldId, JProgram, JType, MethodFlags, MethodId, TypeId, VarId};
use jjs_core::jast::{JExpression, JStatement};
use jjs_core::source_info::SourceInfo;

const TEST_FILE: &str = "Test.java";

pub struct ProgramBuilder {
    program: JProgram,
    object: TypeId,
    object_ctor: MethodId,
    line: u32,
}

impl Default for ProgramBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl ProgramBuilder {
    pub fn new() -> Self {
        Self::with_tracking(false)
    }

    /// Builder whose source infos record correlations
    pub fn with_tracking(track: bool) -> Self {
        let mut program = JProgram::new(track);
        runtime::install(&mut program);
        let (object, object_ctor) = match (program.indexed_type("Object"), program.indexed_method("Object.<init>")) {
            (Ok(object), Ok(ctor)) => (object, ctor),
            _ => panic!("support library did not register java.lang.Object"),
        };
        Self {
            program,
            object,
            object_ctor,
            line: 1,
        }
    }

    /// A fresh source position, one line below the previous one
    pub fn info(&mut self) -> SourceInfo {
        let line = self.line;
        self.line += 1;
        self.program.info(TEST_FILE, line, line * 10, line * 10 + 9)
    }

    pub fn program(&self) -> &JProgram {
        &self.program
    }

    pub fn program_mut(&mut self) -> &mut JProgram {
        &mut self.program
    }

    pub fn object(&self) -> TypeId {
        self.object
    }

    pub fn object_ctor(&self) -> MethodId {
        self.object_ctor
    }

    /// Concrete class extending `java.lang.Object`
    pub fn class(&mut self, name: &str) -> TypeId {
        let object = self.object;
        self.subclass(name, object)
    }

    pub fn subclass(&mut self, name: &str, super_class: TypeId) -> TypeId {
        let info = self.info();
        self.program.create_class(info, name, Some(super_class), false, false)
    }

    pub fn abstract_class(&mut self, name: &str, super_class: TypeId) -> TypeId {
        let info = self.info();
        self.program.create_class(info, name, Some(super_class), true, false)
    }

    pub fn interface(&mut self, name: &str) -> TypeId {
        let info = self.info();
        self.program.create_interface(info, name)
    }

    pub fn implements(&mut self, class: TypeId, interface: TypeId) {
        self.program.add_interface(class, interface);
    }

    pub fn static_field(&mut self, ty: TypeId, name: &str, field_ty: JType) -> FieldId {
        let info = self.info();
        self.program.create_field(info, ty, name, field_ty, true, false)
    }

    pub fn field(&mut self, ty: TypeId, name: &str, field_ty: JType) -> FieldId {
        let info = self.info();
        self.program.create_field(info, ty, name, field_ty, false, false)
    }

    pub fn method_with(
        &mut self,
        ty: TypeId,
        name: &str,
        return_type: JType,
        params: &[(&str, JType)],
        flags: MethodFlags,
    ) -> (MethodId, Vec<VarId>) {
        let info = self.info();
        let method = self.program.create_method(info, ty, name, return_type, flags);
        let vars = params
            .iter()
            .map(|(param, param_ty)| {
                let info = self.info();
                self.program.create_param(info, method, param, param_ty.clone(), false)
            })
            .collect();
        (method, vars)
    }

    pub fn static_method(
        &mut self,
        ty: TypeId,
        name: &str,
        return_type: JType,
        params: &[(&str, JType)],
    ) -> (MethodId, Vec<VarId>) {
        self.method_with(ty, name, return_type, params, MethodFlags::static_method())
    }

    pub fn method(
        &mut self,
        ty: TypeId,
        name: &str,
        return_type: JType,
        params: &[(&str, JType)],
    ) -> (MethodId, Vec<VarId>) {
        self.method_with(ty, name, return_type, params, MethodFlags::instance())
    }

    /// Constructor whose body starts with `super()` on `super_ctor`;
    /// `body` is appended after that call
    pub fn constructor(
        &mut self,
        ty: TypeId,
        super_ctor: MethodId,
        params: &[(&str, JType)],
        body: impl FnOnce(&mut Self, &[VarId]) -> Vec<JStatement>,
    ) -> (MethodId, Vec<VarId>) {
        let simple = self.program.types[ty]
            .name
            .rsplit('.')
            .next()
            .unwrap_or_default()
            .to_string();
        let (ctor, vars) = self.method_with(ty, &simple, JType::VOID, params, MethodFlags::constructor());
        let info = self.info();
        let this = JExpression::this(info.clone(), ty);
        let mut stmts = vec![JStatement::expr(JExpression::super_call(info, this, super_ctor, vec![]))];
        stmts.extend(body(self, &vars));
        self.program.set_body(ctor, stmts);
        (ctor, vars)
    }

    /// Enum `name` with a constructor `(ordinal)` and one constant per entry
    /// of `constants`, created in declaration order by its class initializer
    pub fn enumeration(&mut self, name: &str, constants: &[&str]) -> (TypeId, Vec<FieldId>) {
        let enum_ctor = match self.program.indexed_method("Enum.<init>") {
            Ok(ctor) => ctor,
            Err(_) => panic!("support library did not register java.lang.Enum"),
        };
        let string_ty = self.program.string_type();
        let info = self.info();
        let ty = self.program.create_enum(info, name);
        let ty_ref = JType::Declared(ty);
        let simple = self.program.types[ty].short_name().to_string();
        let (ctor, vars) = self.method_with(
            ty,
            &simple,
            JType::VOID,
            &[("name", string_ty), ("ordinal", JType::INT)],
            MethodFlags::constructor(),
        );
        let info = self.info();
        let this = JExpression::this(info.clone(), ty);
        let args = vars.iter().map(|v| JExpression::var_ref(info.clone(), *v)).collect();
        self.program
            .set_body(ctor, vec![JStatement::expr(JExpression::super_call(info, this, enum_ctor, args))]);

        let mut fields = Vec::new();
        let mut init = Vec::new();
        for (ordinal, constant) in constants.iter().enumerate() {
            let info = self.info();
            let ordinal = ordinal as i32;
            let field = self.program.create_enum_constant(info.clone(), ty, constant, ordinal);
            let args = vec![JExpression::string_lit(info.clone(), *constant), JExpression::int_lit(info.clone(), ordinal)];
            init.push(JStatement::expr(JExpression::assign(
                info.clone(),
                JExpression::field_ref(info.clone(), None, field),
                JExpression::new_instance(info, ty, ctor, args),
                ty_ref.clone(),
            )));
            fields.push(field);
        }
        self.clinit(ty, init);

        // values() hands out a fresh array of the constants in ordinal order
        let (values, _) = self.static_method(ty, "values", JType::array_of(ty_ref.clone()), &[]);
        let info = self.info();
        let elements = fields.iter().map(|f| JExpression::field_ref(info.clone(), None, *f)).collect();
        let array = JExpression::new_array(info.clone(), JType::array_of(ty_ref), vec![], Some(elements));
        self.program.set_body(values, vec![JStatement::return_stmt(info, Some(array))]);
        (ty, fields)
    }

    /// Zero-argument constructor chaining to `java.lang.Object`
    pub fn default_constructor(&mut self, ty: TypeId) -> MethodId {
        let object_ctor = self.object_ctor;
        self.constructor(ty, object_ctor, &[], |_, _| Vec::new()).0
    }

    pub fn local(&mut self, method: MethodId, name: &str, ty: JType) -> VarId {
        let info = self.info();
        self.program.create_local(info, method, name, ty, false)
    }

    pub fn set_body(&mut self, method: MethodId, stmts: Vec<JStatement>) {
        self.program.set_body(method, stmts);
    }

    /// Static initializer of `ty` with `stmts` as its body
    pub fn clinit(&mut self, ty: TypeId, stmts: Vec<JStatement>) -> MethodId {
        let clinit = self.program.ensure_clinit(ty);
        self.program.set_body(clinit, stmts);
        clinit
    }

    /// Static native `name(x)` whose body prints `x`
    pub fn print_method(&mut self, ty: TypeId, name: &str, param: JType) -> MethodId {
        let (method, _) = self.static_method(ty, name, JType::VOID, &[("x", param)]);
        self.program.set_native_body(method, PRINT_NATIVE);
        method
    }

    /// Static `onModuleLoad()` on `ty`, with `stmts` as its body
    pub fn entry(&mut self, ty: TypeId, stmts: Vec<JStatement>) -> MethodId {
        let (method, _) = self.static_method(ty, ENTRY_METHOD_NAME, JType::VOID, &[]);
        self.program.set_body(method, stmts);
        method
    }

    pub fn build(self) -> JProgram {
        self.program
    }
}

/// `receiver.method(args)` or `method(args)` as a statement
pub fn call_stmt(info: SourceInfo, receiver: Option<JExpression>, method: MethodId, args: Vec<JExpression>) -> JStatement {
    JStatement::expr(JExpression::call(info, receiver, method, args))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_installs_runtime_and_entry() {
        let mut builder = ProgramBuilder::new();
        let main = builder.class("app.Main");
        let entry = builder.entry(main, vec![]);
        let program = builder.build();

        assert_eq!(program.find_type("app.Main"), Some(main));
        assert_eq!(program.find_method(main, ENTRY_METHOD_NAME, 0), Some(entry));
        assert!(program.indexed_type("String").is_ok());
    }

    #[test]
    fn test_enumeration_numbers_constants_in_order() {
        let mut builder = ProgramBuilder::new();
        let (color, constants) = builder.enumeration("app.Color", &["RED", "GREEN"]);
        let program = builder.build();

        assert!(program.types[color].is_enum());
        assert_eq!(program.types[color].super_class, program.indexed_type("Enum").ok());
        let ordinals: Vec<Option<i32>> = constants.iter().map(|f| program.fields[*f].ordinal).collect();
        assert_eq!(ordinals, vec![Some(0), Some(1)]);
        assert!(program.types[color].clinit.is_some());
        let values = program.find_method(color, "values", 0).unwrap();
        assert_eq!(program.methods[values].return_type, JType::array_of(JType::Declared(color)));
    }

    #[test]
    fn test_constructor_calls_super_first() {
        let mut builder = ProgramBuilder::new();
        let point = builder.class("app.Point");
        let ctor = builder.default_constructor(point);
        let program = builder.build();

        assert!(program.methods[ctor].is_constructor);
        assert_eq!(program.methods[ctor].name, "Point");
    }
}
