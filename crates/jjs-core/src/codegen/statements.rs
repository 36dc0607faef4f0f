use super::{CodeGenerator, FunctionCx};
use crate::errors::{InternalCompilerError, VisitResult};
use crate::jast::statement::{JStatement, JStatementKind};
use crate::jast::to_source::describe_stmt;
use crate::js::ast::{JsCase, JsCatch, JsExpression, JsStatement, JsStatementKind, JsVar};
use crate::js::scope::ScopeKind;

impl CodeGenerator<'_> {
    pub(super) fn stmts(&mut self, cx: &mut FunctionCx, stmts: &[JStatement]) -> VisitResult<Vec<JsStatement>> {
        stmts.iter().map(|stmt| self.stmt(cx, stmt)).collect()
    }

    pub(super) fn stmt(&mut self, cx: &mut FunctionCx, stmt: &JStatement) -> VisitResult<JsStatement> {
        let program = self.program;
        self.translate_stmt(cx, stmt)
            .map_err(|e| e.with_node(stmt.kind_name(), Some(&stmt.info), |g| describe_stmt(program, stmt, g)))
    }

    fn translate_stmt(&mut self, cx: &mut FunctionCx, stmt: &JStatement) -> VisitResult<JsStatement> {
        let info = stmt.info.clone();
        let kind = match &stmt.kind {
            JStatementKind::Block(stmts) => JsStatementKind::Block(self.stmts(cx, stmts)?),
            JStatementKind::LocalDecl { var, init } => {
                let init = init.as_ref().map(|e| self.expr(cx, e)).transpose()?;
                let name = cx.var_name(&mut self.js, self.program, *var);
                cx.declared.insert(*var);
                return Ok(JsStatement::var(info, name, init));
            }
            JStatementKind::Expression(expr) => JsStatementKind::Expression(self.expr(cx, expr)?),
            JStatementKind::If {
                cond,
                then_stmt,
                else_stmt,
            } => JsStatementKind::If {
                cond: self.expr(cx, cond)?,
                then_stmt: Box::new(self.stmt(cx, then_stmt)?),
                else_stmt: else_stmt
                    .as_ref()
                    .map(|s| self.stmt(cx, s).map(Box::new))
                    .transpose()?,
            },
            JStatementKind::While { cond, body } => JsStatementKind::While {
                cond: self.expr(cx, cond)?,
                body: Box::new(self.stmt(cx, body)?),
            },
            JStatementKind::DoWhile { body, cond } => JsStatementKind::DoWhile {
                body: Box::new(self.stmt(cx, body)?),
                cond: self.expr(cx, cond)?,
            },
            JStatementKind::For {
                init,
                cond,
                increments,
                body,
            } => {
                let init = self.for_init(cx, stmt, init)?;
                let cond = cond.as_ref().map(|e| self.expr(cx, e)).transpose()?;
                let incr = if increments.is_empty() {
                    None
                } else {
                    let exprs = increments
                        .iter()
                        .map(|e| self.expr(cx, e))
                        .collect::<VisitResult<Vec<_>>>()?;
                    Some(JsExpression::comma(info.clone(), exprs))
                };
                JsStatementKind::For {
                    init: init.map(Box::new),
                    cond,
                    incr,
                    body: Box::new(self.stmt(cx, body)?),
                }
            }
            JStatementKind::Return(value) => {
                JsStatementKind::Return(value.as_ref().map(|e| self.expr(cx, e)).transpose()?)
            }
            JStatementKind::Throw(value) => JsStatementKind::Throw(self.expr(cx, value)?),
            JStatementKind::Break(label) => {
                JsStatementKind::Break(label.as_deref().map(|l| cx.label(&mut self.js, l)))
            }
            JStatementKind::Continue(label) => {
                JsStatementKind::Continue(label.as_deref().map(|l| cx.label(&mut self.js, l)))
            }
            JStatementKind::Label { name, body } => JsStatementKind::Label {
                label: cx.label(&mut self.js, name),
                body: Box::new(self.stmt(cx, body)?),
            },
            JStatementKind::Try {
                block,
                catches,
                finally,
            } => {
                if catches.len() > 1 {
                    return Err(InternalCompilerError::new(format!(
                        "try with {} catch blocks reached code generation",
                        catches.len()
                    )));
                }
                let block = self.stmts(cx, block)?;
                let catch = match catches.first() {
                    Some(catch) => {
                        let scope = self.js.new_scope(cx.scope, ScopeKind::Catch, "catch");
                        let ident = &self.program.variables[catch.var].name;
                        let param = self.js.fresh_name(scope, ident, ident);
                        cx.vars.insert(catch.var, param);
                        cx.declared.insert(catch.var);
                        Some(JsCatch {
                            info: catch.info.clone(),
                            param,
                            scope,
                            body: self.stmts(cx, &catch.body)?,
                        })
                    }
                    None => None,
                };
                let finally = finally.as_ref().map(|f| self.stmts(cx, f)).transpose()?;
                JsStatementKind::Try { block, catch, finally }
            }
            JStatementKind::Switch { expr, cases } => {
                let expr = self.expr(cx, expr)?;
                let cases = cases
                    .iter()
                    .map(|case| {
                        Ok(JsCase {
                            label: case.label.as_ref().map(|lit| self.literal(case.info.clone(), lit)),
                            body: self.stmts(cx, &case.body)?,
                        })
                    })
                    .collect::<VisitResult<Vec<_>>>()?;
                JsStatementKind::Switch { expr, cases }
            }
            JStatementKind::Assert { .. } => {
                return Err(InternalCompilerError::new("assert reached code generation"));
            }
        };
        Ok(JsStatement::new(info, kind))
    }

    /// `var i=0,j=1` when every initializer declares, `i=0,f()` otherwise
    fn for_init(
        &mut self,
        cx: &mut FunctionCx,
        stmt: &JStatement,
        init: &[JStatement],
    ) -> VisitResult<Option<JsStatement>> {
        if init.is_empty() {
            return Ok(None);
        }
        let info = stmt.info.clone();
        let all_decls = init
            .iter()
            .all(|s| matches!(s.kind, JStatementKind::LocalDecl { .. }));
        if all_decls {
            let mut vars = Vec::with_capacity(init.len());
            for decl in init {
                if let JStatementKind::LocalDecl { var, init } = &decl.kind {
                    let init = init.as_ref().map(|e| self.expr(cx, e)).transpose()?;
                    let name = cx.var_name(&mut self.js, self.program, *var);
                    cx.declared.insert(*var);
                    vars.push(JsVar {
                        info: decl.info.clone(),
                        name,
                        init,
                    });
                }
            }
            return Ok(Some(JsStatement::new(info, JsStatementKind::Vars(vars))));
        }

        let mut exprs = Vec::with_capacity(init.len());
        for s in init {
            match &s.kind {
                JStatementKind::Expression(expr) => exprs.push(self.expr(cx, expr)?),
                // assigned here, declared by the hoisted var statement
                JStatementKind::LocalDecl { var, init } => {
                    let value = init.as_ref().map(|e| self.expr(cx, e)).transpose()?;
                    let name = cx.var_name(&mut self.js, self.program, *var);
                    if let Some(value) = value {
                        exprs.push(JsExpression::assign(
                            s.info.clone(),
                            JsExpression::name_ref(s.info.clone(), name),
                            value,
                        ));
                    }
                }
                _ => {
                    return Err(InternalCompilerError::new(format!(
                        "{} in a for initializer",
                        s.kind_name()
                    )))
                }
            }
        }
        if exprs.is_empty() {
            return Ok(None);
        }
        Ok(Some(JsExpression::comma(info, exprs).make_stmt()))
    }
}

#[cfg(test)]
mod tests {
    use crate::codegen::generate;
    use crate::jast::declarations::MethodFlags;
    use crate::jast::expression::{BinaryOp, JExpression, UnaryOp};
    use crate::jast::program::JProgram;
    use crate::jast::statement::{JCatch, JStatement, JStatementKind, JSwitchCase};
    use crate::jast::types::JType;
    use crate::jast::JLiteral;
    use crate::js::namer::JsVerboseNamer;
    use crate::js::source_gen::{to_source, TextOutput};
    use crate::source_info::SourceInfo;

    fn info() -> SourceInfo {
        SourceInfo::unknown()
    }

    fn program_with(body: impl FnOnce(&mut JProgram, crate::jast::declarations::MethodId) -> Vec<JStatement>) -> String {
        let mut program = JProgram::new(false);
        let object = program.create_class(info(), "java.lang.Object", None, false, false);
        program.register_indexed_type("Object", object);
        let main_class = program.create_class(info(), "app.Main", Some(object), false, true);
        let main = program.create_method(info(), main_class, "main", JType::VOID, MethodFlags::static_method());
        let stmts = body(&mut program, main);
        program.set_body(main, stmts);
        program.add_entry_method(main, None);

        let mut generated = generate(&program).unwrap();
        JsVerboseNamer.exec(&mut generated.program).unwrap();
        to_source(&generated.program, TextOutput::Minified)
    }

    #[test]
    fn test_for_loop_declares_its_counter() {
        let js = program_with(|program, main| {
            let i = program.create_local(info(), main, "i", JType::INT, false);
            vec![JStatement::new(
                info(),
                JStatementKind::For {
                    init: vec![JStatement::local_decl(info(), i, Some(JExpression::int_lit(info(), 0)))],
                    cond: Some(JExpression::binary(
                        info(),
                        BinaryOp::Lt,
                        JExpression::var_ref(info(), i),
                        JExpression::int_lit(info(), 3),
                        JType::BOOLEAN,
                    )),
                    increments: vec![JExpression::unary(info(), UnaryOp::PostInc, JExpression::var_ref(info(), i))],
                    body: Box::new(JStatement::empty(info())),
                },
            )]
        });
        assert!(js.contains("for(var i=0;i<3;i++)"), "{}", js);
    }

    #[test]
    fn test_undeclared_temporaries_are_hoisted() {
        let js = program_with(|program, main| {
            let t = program.create_local(info(), main, "t", JType::INT, false);
            vec![JStatement::expr(JExpression::assign(
                info(),
                JExpression::var_ref(info(), t),
                JExpression::int_lit(info(), 1),
                JType::INT,
            ))]
        });
        assert!(js.contains("function app_Main_main(){var t;t=1;}"), "{}", js);
    }

    #[test]
    fn test_single_catch_and_labels() {
        let js = program_with(|program, main| {
            let e = program.create_local(info(), main, "e", program.object_type(), false);
            vec![
                JStatement::new(
                    info(),
                    JStatementKind::Try {
                        block: vec![JStatement::throw_stmt(info(), JExpression::null_lit(info()))],
                        catches: vec![JCatch {
                            info: info(),
                            var: e,
                            body: vec![JStatement::throw_stmt(info(), JExpression::var_ref(info(), e))],
                        }],
                        finally: None,
                    },
                ),
                JStatement::new(
                    info(),
                    JStatementKind::Label {
                        name: "outer".to_string(),
                        body: Box::new(JStatement::while_stmt(
                            info(),
                            JExpression::bool_lit(info(), true),
                            JStatement::new(info(), JStatementKind::Break(Some("outer".to_string()))),
                        )),
                    },
                ),
            ]
        });
        assert!(js.contains("catch(e){throw e;}"), "{}", js);
        assert!(js.contains("outer:while(true)break outer;"), "{}", js);
    }

    #[test]
    fn test_switch_cases_use_literal_labels() {
        let js = program_with(|program, main| {
            let x = program.create_param(info(), main, "x", JType::INT, false);
            vec![JStatement::new(
                info(),
                JStatementKind::Switch {
                    expr: JExpression::var_ref(info(), x),
                    cases: vec![
                        JSwitchCase {
                            info: info(),
                            label: Some(JLiteral::Int(1)),
                            body: vec![JStatement::new(info(), JStatementKind::Break(None))],
                        },
                        JSwitchCase {
                            info: info(),
                            label: None,
                            body: vec![],
                        },
                    ],
                },
            )]
        });
        assert!(js.contains("switch(x){case 1:break;default:}"), "{}", js);
    }
}
