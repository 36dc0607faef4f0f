use super::{CodeGenerator, FunctionCx};
use crate::errors::{InternalCompilerError, VisitResult};
use crate::jast::declarations::{MethodBody, MethodId};
use crate::jast::expression::JLiteral;
use crate::jast::types::{JType, TypeId};
use crate::js::ast::{JsExpression, JsFunction, JsPropertyInit, JsStatement, JsStatementKind, JsVar};
use crate::js::scope::ScopeKind;
use crate::source_info::SourceInfo;

impl CodeGenerator<'_> {
    pub(super) fn emit_types(&mut self) -> VisitResult {
        let info = SourceInfo::unknown();
        self.js.global_block.push(JsStatement::var(info, self.temp, None));

        for ty in self.order.clone() {
            if let Some(statics) = self.static_fields(ty)? {
                self.js.global_block.push(statics);
            }
            if self.with_prototype.contains(&ty) {
                let seed = self.seed_function(ty)?;
                self.js.global_block.push(seed);
            }
            if self.with_clinit.contains(&ty) {
                let clinit = self.clinit_function(ty)?;
                self.js.global_block.push(clinit);
            }
            for method in self.program.types[ty].methods.clone() {
                if self.program.methods[method].is_clinit || self.names.function(method).is_none() {
                    continue;
                }
                let function = self.method_function(method)?;
                self.js.global_block.push(function);
            }
            if self.with_prototype.contains(&ty) {
                let setup = self.prototype_setup(ty)?;
                self.js.global_block.extend(setup);
            }
        }
        Ok(())
    }

    /// `Main.main();` or `Main.run.call(new Main());` per entry method
    pub(super) fn emit_entries(&mut self) -> VisitResult {
        for entry in self.program.entry_methods.clone() {
            let info = self.program.methods[entry.method].info.clone();
            let function = JsExpression::name_ref(info.clone(), self.function_of(entry.method)?);
            let call = match entry.ctor {
                Some(ctor) => {
                    let receiver =
                        JsExpression::new_object(info.clone(), JsExpression::name_ref(info.clone(), self.function_of(ctor)?), vec![]);
                    let call = self.js.fixed_property("call");
                    JsExpression::invoke(info.clone(), JsExpression::qualified(info, function, call), vec![receiver])
                }
                None => JsExpression::invoke(info, function, vec![]),
            };
            self.js.global_block.push(call.make_stmt());
        }
        Ok(())
    }

    fn static_fields(&mut self, ty: TypeId) -> VisitResult<Option<JsStatement>> {
        let program = self.program;
        let mut vars = Vec::new();
        for field in &program.types[ty].fields {
            let decl = &program.fields[*field];
            if !decl.is_static || program.null_field == Some(*field) {
                continue;
            }
            let init = match &decl.constant {
                Some(value) => self.literal(decl.info.clone(), value),
                None => self.default_value(decl.info.clone(), &decl.ty),
            };
            vars.push(JsVar {
                info: decl.info.clone(),
                name: self.field_of(*field)?,
                init: Some(init),
            });
        }
        if vars.is_empty() {
            return Ok(None);
        }
        Ok(Some(JsStatement::new(
            program.types[ty].info.clone(),
            JsStatementKind::Vars(vars),
        )))
    }

    /// `function Foo(){}`
    fn seed_function(&mut self, ty: TypeId) -> VisitResult<JsStatement> {
        let decl = &self.program.types[ty];
        let seed = self.seed_of(ty)?;
        let top = self.js.top_scope;
        let scope = self.js.new_scope(top, ScopeKind::Function, decl.name.clone());
        Ok(JsStatement::new(
            decl.info.clone(),
            JsStatementKind::Function(JsFunction {
                info: decl.info.clone(),
                name: Some(seed),
                params: Vec::new(),
                body: Vec::new(),
                scope,
            }),
        ))
    }

    /// `function $clinit_Foo(){ $clinit_Foo = function(){}; $clinit_Super(); body }`
    fn clinit_function(&mut self, ty: TypeId) -> VisitResult<JsStatement> {
        let program = self.program;
        let decl = &program.types[ty];
        let name = self.names.clinits.get(&ty).copied().ok_or_else(|| {
            InternalCompilerError::new(format!("{} has no class initializer name", decl.name))
        })?;
        let info = decl
            .clinit
            .map(|clinit| program.methods[clinit].info.clone())
            .unwrap_or_else(|| decl.info.clone());
        let top = self.js.top_scope;
        let scope = self.js.new_scope(top, ScopeKind::Function, format!("{} initializer", decl.name));
        let disarmed = self.js.new_scope(scope, ScopeKind::Function, "disarmed initializer");

        let mut body = vec![JsExpression::assign(
            info.clone(),
            JsExpression::name_ref(info.clone(), name),
            JsExpression::function(JsFunction {
                info: info.clone(),
                name: None,
                params: Vec::new(),
                body: Vec::new(),
                scope: disarmed,
            }),
        )
        .make_stmt()];
        if let Some(parent) = self.oracle.super_class(ty) {
            if let Some(parent_clinit) = self.names.clinits.get(&parent) {
                body.push(
                    JsExpression::invoke(info.clone(), JsExpression::name_ref(info.clone(), *parent_clinit), vec![])
                        .make_stmt(),
                );
            }
        }
        if let Some(clinit) = decl.clinit {
            if let MethodBody::Java(stmts) = &program.methods[clinit].body {
                let mut cx = FunctionCx::new(scope, self.oracle.class_chain(ty));
                let translated = self
                    .stmts(&mut cx, stmts)
                    .map_err(|e| e.with_node("method", Some(&info), |_| Ok(program.method_name(clinit))))?;
                if let Some(vars) = cx.hoisted_vars(&info) {
                    body.push(vars);
                }
                body.extend(translated);
            }
        }

        Ok(JsStatement::new(
            info.clone(),
            JsStatementKind::Function(JsFunction {
                info,
                name: Some(name),
                params: Vec::new(),
                body,
                scope,
            }),
        ))
    }

    fn method_function(&mut self, method: MethodId) -> VisitResult<JsStatement> {
        let program = self.program;
        let decl = &program.methods[method];
        let info = decl.info.clone();
        self.method_function_inner(method)
            .map_err(|e| e.with_node("method", Some(&info), |_| Ok(program.method_name(method))))
    }

    fn method_function_inner(&mut self, method: MethodId) -> VisitResult<JsStatement> {
        let program = self.program;
        let decl = &program.methods[method];
        let info = decl.info.clone();
        let name = self.function_of(method)?;
        let top = self.js.top_scope;
        let scope = self.js.new_scope(top, ScopeKind::Function, program.method_name(method));

        let (params, body) = match &decl.body {
            MethodBody::Native(native) => {
                if native.code.trim().is_empty() {
                    return Err(InternalCompilerError::new(format!(
                        "native method {} has an empty body",
                        program.method_name(method)
                    )));
                }
                let params = decl
                    .params
                    .iter()
                    .map(|param| self.js.declare_unobfuscatable(scope, &program.variables[*param].name))
                    .collect();
                let body = vec![JsStatement::new(info.clone(), JsStatementKind::Verbatim(native.code.clone()))];
                (params, body)
            }
            MethodBody::Java(stmts) => {
                let mut cx = FunctionCx::new(scope, self.oracle.class_chain(decl.enclosing_type));
                let params = decl
                    .params
                    .iter()
                    .map(|param| {
                        cx.declared.insert(*param);
                        cx.var_name(&mut self.js, program, *param)
                    })
                    .collect();
                let mut body = Vec::new();
                if self.runs_clinit_on_entry(method) {
                    if let Some(clinit) = self.names.clinits.get(&decl.enclosing_type) {
                        body.push(
                            JsExpression::invoke(info.clone(), JsExpression::name_ref(info.clone(), *clinit), vec![])
                                .make_stmt(),
                        );
                    }
                }
                let translated = self.stmts(&mut cx, stmts)?;
                if let Some(vars) = cx.hoisted_vars(&info) {
                    body.insert(0, vars);
                }
                body.extend(translated);
                (params, body)
            }
            MethodBody::Abstract => {
                return Err(InternalCompilerError::new(format!(
                    "abstract method {} has a function name",
                    program.method_name(method)
                )));
            }
        };

        Ok(JsStatement::new(
            info.clone(),
            JsStatementKind::Function(JsFunction {
                info,
                name: Some(name),
                params,
                body,
                scope,
            }),
        ))
    }

    /// Static methods and constructors trigger their class's initializer
    fn runs_clinit_on_entry(&self, method: MethodId) -> bool {
        let decl = &self.program.methods[method];
        (decl.is_static || decl.is_constructor)
            && !decl.is_clinit
            && !self.program.is_static_impl(method)
            && self.with_clinit.contains(&decl.enclosing_type)
    }

    /// `_ = Foo.prototype = Ctor.prototype = new Super();` and the member
    /// assignments that follow it
    fn prototype_setup(&mut self, ty: TypeId) -> VisitResult<Vec<JsStatement>> {
        let program = self.program;
        let decl = &program.types[ty];
        let info = decl.info.clone();
        let prototype = self.js.fixed_property("prototype");
        let temp_name = self.temp;
        let temp = || JsExpression::name_ref(info.clone(), temp_name);

        let mut value = match self.oracle.super_class(ty) {
            Some(parent) => JsExpression::new_object(
                info.clone(),
                JsExpression::name_ref(info.clone(), self.seed_of(parent)?),
                vec![],
            ),
            None => JsExpression::object(info.clone(), Vec::new()),
        };
        let mut holders = vec![self.seed_of(ty)?];
        holders.extend(
            decl.methods
                .iter()
                .filter(|m| program.methods[**m].is_constructor)
                .filter_map(|m| self.names.function(*m)),
        );
        for holder in holders.into_iter().rev() {
            value = JsExpression::assign(
                info.clone(),
                JsExpression::qualified(info.clone(), JsExpression::name_ref(info.clone(), holder), prototype),
                value,
            );
        }
        let mut stmts = vec![JsExpression::assign(info.clone(), temp(), value).make_stmt()];

        for method in &decl.methods {
            let m = &program.methods[*method];
            if !m.is_virtual() {
                continue;
            }
            let Some(function) = self.names.function(*method) else {
                continue;
            };
            let property = self.poly_name(*method);
            stmts.push(
                JsExpression::assign(
                    m.info.clone(),
                    JsExpression::qualified(info.clone(), temp(), property),
                    JsExpression::name_ref(m.info.clone(), function),
                )
                .make_stmt(),
            );
        }

        for field in &decl.fields {
            let f = &program.fields[*field];
            if f.is_static {
                continue;
            }
            let property = self.field_of(*field)?;
            let default = self.default_value(f.info.clone(), &f.ty);
            stmts.push(
                JsExpression::assign(
                    f.info.clone(),
                    JsExpression::qualified(info.clone(), temp(), property),
                    default,
                )
                .make_stmt(),
            );
        }

        let type_id = self.js.fixed_property("typeId$");
        stmts.push(
            JsExpression::assign(
                info.clone(),
                JsExpression::qualified(info.clone(), temp(), type_id),
                JsExpression::number(info.clone(), f64::from(self.next_type_id)),
            )
            .make_stmt(),
        );
        self.next_type_id += 1;

        let mut query_ids: Vec<u32> = self
            .oracle
            .supertypes(ty)
            .iter()
            .filter_map(|sup| program.query_ids.get(sup).copied())
            .collect();
        query_ids.sort_unstable();
        if !query_ids.is_empty() {
            let castable = self.js.fixed_property("castableTypeMap$");
            let entries = query_ids
                .into_iter()
                .map(|id| JsPropertyInit {
                    key: JsExpression::number(info.clone(), f64::from(id)),
                    value: JsExpression::number(info.clone(), 1.0),
                })
                .collect();
            stmts.push(
                JsExpression::assign(
                    info.clone(),
                    JsExpression::qualified(info.clone(), temp(), castable),
                    JsExpression::object(info.clone(), entries),
                )
                .make_stmt(),
            );
        }
        Ok(stmts)
    }

    /// Value of a field before any assignment
    pub(super) fn default_value(&self, info: SourceInfo, ty: &JType) -> JsExpression {
        if ty.is_long() {
            self.literal(info, &JLiteral::Long(0))
        } else if ty.is_boolean() {
            JsExpression::boolean(info, false)
        } else if ty.primitive().is_some() {
            JsExpression::number(info, 0.0)
        } else {
            JsExpression::null(info)
        }
    }
}
