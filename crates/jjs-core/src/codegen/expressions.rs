use super::{CodeGenerator, FunctionCx};
use crate::errors::{InternalCompilerError, VisitResult};
use crate::jast::declarations::{FieldId, MethodId};
use crate::jast::expression::{BinaryOp, JExpression, JExpressionKind, JLiteral, UnaryOp};
use crate::jast::to_source::describe_expr;
use crate::js::ast::{JsBinaryOp, JsExpression, JsUnaryOp};
use crate::source_info::SourceInfo;

fn js_binary_op(op: BinaryOp) -> JsBinaryOp {
    match op {
        BinaryOp::Mul => JsBinaryOp::Mul,
        BinaryOp::Div => JsBinaryOp::Div,
        BinaryOp::Mod => JsBinaryOp::Mod,
        BinaryOp::Add => JsBinaryOp::Add,
        BinaryOp::Sub => JsBinaryOp::Sub,
        BinaryOp::Shl => JsBinaryOp::Shl,
        BinaryOp::Shr => JsBinaryOp::Shr,
        BinaryOp::Shru => JsBinaryOp::Shru,
        BinaryOp::Lt => JsBinaryOp::Lt,
        BinaryOp::Le => JsBinaryOp::Le,
        BinaryOp::Gt => JsBinaryOp::Gt,
        BinaryOp::Ge => JsBinaryOp::Ge,
        BinaryOp::Eq => JsBinaryOp::Eq,
        BinaryOp::Neq => JsBinaryOp::Neq,
        BinaryOp::RefEq => JsBinaryOp::StrictEq,
        BinaryOp::RefNeq => JsBinaryOp::StrictNeq,
        BinaryOp::BitAnd => JsBinaryOp::BitAnd,
        BinaryOp::BitXor => JsBinaryOp::BitXor,
        BinaryOp::BitOr => JsBinaryOp::BitOr,
        BinaryOp::And => JsBinaryOp::And,
        BinaryOp::Or => JsBinaryOp::Or,
        BinaryOp::Assign => JsBinaryOp::Assign,
        BinaryOp::AsgAdd => JsBinaryOp::AsgAdd,
        BinaryOp::AsgSub => JsBinaryOp::AsgSub,
        BinaryOp::AsgMul => JsBinaryOp::AsgMul,
        BinaryOp::AsgDiv => JsBinaryOp::AsgDiv,
        BinaryOp::AsgMod => JsBinaryOp::AsgMod,
        BinaryOp::AsgShl => JsBinaryOp::AsgShl,
        BinaryOp::AsgShr => JsBinaryOp::AsgShr,
        BinaryOp::AsgShru => JsBinaryOp::AsgShru,
        BinaryOp::AsgBitAnd => JsBinaryOp::AsgBitAnd,
        BinaryOp::AsgBitXor => JsBinaryOp::AsgBitXor,
        BinaryOp::AsgBitOr => JsBinaryOp::AsgBitOr,
    }
}

/// `prefix..., value`, or just `value`
fn sequence(info: SourceInfo, mut prefix: Vec<JsExpression>, value: JsExpression) -> JsExpression {
    if prefix.is_empty() {
        return value;
    }
    prefix.push(value);
    JsExpression::comma(info, prefix)
}

impl CodeGenerator<'_> {
    pub(super) fn expr(&mut self, cx: &mut FunctionCx, expr: &JExpression) -> VisitResult<JsExpression> {
        let program = self.program;
        self.translate_expr(cx, expr)
            .map_err(|e| e.with_node(expr.kind_name(), Some(&expr.info), |g| describe_expr(program, expr, g)))
    }

    fn exprs(&mut self, cx: &mut FunctionCx, exprs: &[JExpression]) -> VisitResult<Vec<JsExpression>> {
        exprs.iter().map(|e| self.expr(cx, e)).collect()
    }

    /// Longs are `[low, high]` pairs of 32-bit words
    pub(super) fn literal(&self, info: SourceInfo, lit: &JLiteral) -> JsExpression {
        match lit {
            JLiteral::Boolean(b) => JsExpression::boolean(info, *b),
            JLiteral::Int(v) => JsExpression::number(info, f64::from(*v)),
            JLiteral::Long(v) => {
                let low = *v as u32;
                let high = (*v >> 32) as i32;
                JsExpression::array(
                    info.clone(),
                    vec![
                        JsExpression::number(info.clone(), f64::from(low)),
                        JsExpression::number(info, f64::from(high)),
                    ],
                )
            }
            JLiteral::Float(v) => JsExpression::number(info, f64::from(*v)),
            JLiteral::Double(v) => JsExpression::number(info, *v),
            JLiteral::Char(c) => JsExpression::number(info, f64::from(*c)),
            JLiteral::String(s) => JsExpression::string(info, s.clone()),
            JLiteral::Null => JsExpression::null(info),
            JLiteral::Class(ty) => JsExpression::string(info, self.program.type_name(ty)),
        }
    }

    fn translate_expr(&mut self, cx: &mut FunctionCx, expr: &JExpression) -> VisitResult<JsExpression> {
        let info = expr.info.clone();
        match &expr.kind {
            JExpressionKind::Literal(lit) => Ok(self.literal(info, lit)),
            JExpressionKind::This(_) => Ok(JsExpression::this(info)),
            JExpressionKind::VariableRef(_) | JExpressionKind::FieldRef { .. } | JExpressionKind::ArrayRef { .. } => {
                let (target, prefix) = self.lvalue(cx, expr)?;
                Ok(sequence(info, prefix, target))
            }
            JExpressionKind::MethodCall {
                instance,
                target,
                args,
                static_dispatch,
            } => self.method_call(cx, info, instance.as_deref(), *target, args, *static_dispatch),
            JExpressionKind::NewInstance { ctor, args, .. } => {
                let ctor = JsExpression::name_ref(info.clone(), self.function_of(*ctor)?);
                let args = self.exprs(cx, args)?;
                Ok(JsExpression::new_object(info, ctor, args))
            }
            JExpressionKind::NewArray { .. } => {
                Err(InternalCompilerError::new("array allocation reached code generation"))
            }
            JExpressionKind::Cast { .. } => Err(InternalCompilerError::new("cast reached code generation")),
            JExpressionKind::InstanceOf { .. } => {
                Err(InternalCompilerError::new("instanceof reached code generation"))
            }
            JExpressionKind::ArrayLength(array) => {
                let array = self.expr(cx, array)?;
                let length = self.js.fixed_property("length");
                Ok(JsExpression::qualified(info, array, length))
            }
            JExpressionKind::Binary { op, lhs, rhs, ty } => {
                let program = self.program;
                if *op != BinaryOp::Assign && (lhs.ty(program).is_long() || rhs.ty(program).is_long()) {
                    return Err(InternalCompilerError::new(format!(
                        "long operator {} reached code generation",
                        op.symbol()
                    )));
                }
                if op.is_assignment() {
                    let (target, prefix) = self.lvalue(cx, lhs)?;
                    let value = self.expr(cx, rhs)?;
                    let assign = JsExpression::binary(info.clone(), js_binary_op(*op), target, value);
                    return Ok(sequence(info, prefix, assign));
                }
                let lhs = self.expr(cx, lhs)?;
                let rhs = self.expr(cx, rhs)?;
                let result = JsExpression::binary(info.clone(), js_binary_op(*op), lhs, rhs);
                // `&`, `|` and `^` on booleans produce numbers in JavaScript
                if ty.is_boolean() && matches!(op, BinaryOp::BitAnd | BinaryOp::BitOr | BinaryOp::BitXor) {
                    return Ok(JsExpression::not(info.clone(), JsExpression::not(info, result)));
                }
                Ok(result)
            }
            JExpressionKind::Unary { op, arg } => {
                if *op != UnaryOp::Not && arg.ty(self.program).is_long() {
                    return Err(InternalCompilerError::new(format!(
                        "long operator {} reached code generation",
                        op.symbol()
                    )));
                }
                if op.is_modifying() {
                    let (target, prefix) = self.lvalue(cx, arg)?;
                    let js_op = if op.is_increment() { JsUnaryOp::Inc } else { JsUnaryOp::Dec };
                    let update = if op.is_postfix() {
                        JsExpression::postfix(info.clone(), js_op, target)
                    } else {
                        JsExpression::prefix(info.clone(), js_op, target)
                    };
                    return Ok(sequence(info, prefix, update));
                }
                let js_op = match op {
                    UnaryOp::Neg => JsUnaryOp::Neg,
                    UnaryOp::Not => JsUnaryOp::Not,
                    _ => JsUnaryOp::BitNot,
                };
                let arg = self.expr(cx, arg)?;
                Ok(JsExpression::prefix(info, js_op, arg))
            }
            JExpressionKind::Conditional {
                cond,
                then_expr,
                else_expr,
                ..
            } => {
                let cond = self.expr(cx, cond)?;
                let then_expr = self.expr(cx, then_expr)?;
                let else_expr = self.expr(cx, else_expr)?;
                Ok(JsExpression::conditional(info, cond, then_expr, else_expr))
            }
            JExpressionKind::Multi(exprs) => {
                if exprs.is_empty() {
                    return Err(InternalCompilerError::new("empty multi expression"));
                }
                let exprs = self.exprs(cx, exprs)?;
                Ok(JsExpression::comma(info, exprs))
            }
        }
    }

    /// Assignable form of `expr` plus the expressions that must run before it
    /// is read or written: a side-effecting qualifier of a static field and
    /// the initializer of a foreign class
    fn lvalue(&mut self, cx: &mut FunctionCx, expr: &JExpression) -> VisitResult<(JsExpression, Vec<JsExpression>)> {
        let info = expr.info.clone();
        match &expr.kind {
            JExpressionKind::VariableRef(var) => {
                let name = cx.var_name(&mut self.js, self.program, *var);
                Ok((JsExpression::name_ref(info, name), Vec::new()))
            }
            JExpressionKind::FieldRef { instance, field } => {
                self.field_lvalue(cx, info, instance.as_deref(), *field)
            }
            JExpressionKind::ArrayRef { array, index } => {
                let array = self.expr(cx, array)?;
                let index = self.expr(cx, index)?;
                Ok((JsExpression::array_access(info, array, index), Vec::new()))
            }
            _ => Err(InternalCompilerError::new(format!(
                "{} is not assignable",
                expr.kind_name()
            ))),
        }
    }

    fn field_lvalue(
        &mut self,
        cx: &mut FunctionCx,
        info: SourceInfo,
        instance: Option<&JExpression>,
        field: FieldId,
    ) -> VisitResult<(JsExpression, Vec<JsExpression>)> {
        let program = self.program;
        if program.null_field == Some(field) {
            let receiver = match instance {
                Some(instance) => self.expr(cx, instance)?,
                None => JsExpression::null(info.clone()),
            };
            let property = self.js.fixed_property("nullField");
            return Ok((JsExpression::qualified(info, receiver, property), Vec::new()));
        }

        let decl = &program.fields[field];
        let name = self.field_of(field)?;
        if !decl.is_static {
            let receiver = match instance {
                Some(instance) => self.expr(cx, instance)?,
                None => JsExpression::this(info.clone()),
            };
            return Ok((JsExpression::qualified(info, receiver, name), Vec::new()));
        }

        let mut prefix = Vec::new();
        if let Some(instance) = instance {
            if instance.has_side_effects() {
                prefix.push(self.expr(cx, instance)?);
            }
        }
        let owner = decl.enclosing_type;
        let is_constant = decl.is_final && decl.constant.is_some();
        if !is_constant && !cx.class_chain.contains(&owner) {
            if let Some(clinit) = self.names.clinits.get(&owner) {
                prefix.push(JsExpression::invoke(
                    info.clone(),
                    JsExpression::name_ref(info.clone(), *clinit),
                    vec![],
                ));
            }
        }
        Ok((JsExpression::name_ref(info, name), prefix))
    }

    fn method_call(
        &mut self,
        cx: &mut FunctionCx,
        info: SourceInfo,
        instance: Option<&JExpression>,
        target: MethodId,
        args: &[JExpression],
        static_dispatch: bool,
    ) -> VisitResult<JsExpression> {
        let program = self.program;
        if program.null_method == Some(target) {
            let mut parts = Vec::new();
            if let Some(instance) = instance {
                if instance.has_side_effects() {
                    parts.push(self.expr(cx, instance)?);
                }
            }
            for arg in args {
                if arg.has_side_effects() {
                    parts.push(self.expr(cx, arg)?);
                }
            }
            let property = self.js.fixed_property("nullMethod");
            let call = JsExpression::invoke(
                info.clone(),
                JsExpression::qualified(info.clone(), JsExpression::null(info.clone()), property),
                vec![],
            );
            return Ok(sequence(info, parts, call));
        }

        let decl = &program.methods[target];
        if decl.is_static {
            let mut prefix = Vec::new();
            if let Some(instance) = instance {
                if instance.has_side_effects() {
                    prefix.push(self.expr(cx, instance)?);
                }
            }
            let function = JsExpression::name_ref(info.clone(), self.function_of(target)?);
            let args = self.exprs(cx, args)?;
            return Ok(sequence(info.clone(), prefix, JsExpression::invoke(info, function, args)));
        }

        let receiver = match instance {
            Some(instance) => self.expr(cx, instance)?,
            None => JsExpression::this(info.clone()),
        };
        if decl.is_virtual() && !static_dispatch {
            let property = match self.names.polymorphic.get(&target) {
                Some(name) => *name,
                None => self.poly_name(target),
            };
            let args = self.exprs(cx, args)?;
            return Ok(JsExpression::invoke(
                info.clone(),
                JsExpression::qualified(info, receiver, property),
                args,
            ));
        }

        // exact dispatch: `Foo_bar.call(receiver, args...)`
        let function = JsExpression::name_ref(info.clone(), self.function_of(target)?);
        let call = self.js.fixed_property("call");
        let mut call_args = vec![receiver];
        call_args.extend(self.exprs(cx, args)?);
        Ok(JsExpression::invoke(
            info.clone(),
            JsExpression::qualified(info, function, call),
            call_args,
        ))
    }
}
