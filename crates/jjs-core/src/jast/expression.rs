use crate::jast::declarations::{FieldId, MethodId, VarId};
use crate::jast::program::JProgram;
use crate::jast::types::{JType, TypeId};
use crate::source_info::{LiteralKind, SourceInfo};
use serde::{Deserialize, Serialize};

/// A compile-time constant value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum JLiteral {
    Boolean(bool),
    Int(i32),
    Long(i64),
    Float(f32),
    Double(f64),
    /// UTF-16 code unit
    Char(u16),
    String(String),
    Null,
    /// `Foo.class`
    Class(JType),
}

impl JLiteral {
    pub fn ty(&self, program: &JProgram) -> JType {
        match self {
            JLiteral::Boolean(_) => JType::BOOLEAN,
            JLiteral::Int(_) => JType::INT,
            JLiteral::Long(_) => JType::LONG,
            JLiteral::Float(_) => JType::FLOAT,
            JLiteral::Double(_) => JType::DOUBLE,
            JLiteral::Char(_) => JType::CHAR,
            JLiteral::String(_) => program.string_type(),
            JLiteral::Null => JType::Null,
            JLiteral::Class(_) => program.class_literal_type(),
        }
    }

    pub fn kind(&self) -> LiteralKind {
        match self {
            JLiteral::Boolean(_) => LiteralKind::Boolean,
            JLiteral::Int(_) => LiteralKind::Int,
            JLiteral::Long(_) => LiteralKind::Long,
            JLiteral::Float(_) => LiteralKind::Float,
            JLiteral::Double(_) => LiteralKind::Double,
            JLiteral::Char(_) => LiteralKind::Char,
            JLiteral::String(_) => LiteralKind::String,
            JLiteral::Null => LiteralKind::Null,
            JLiteral::Class(_) => LiteralKind::Class,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            JLiteral::Boolean(b) => Some(*b),
            _ => None,
        }
    }

    /// Value widened to long, for integral and char literals
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            JLiteral::Int(v) => Some(i64::from(*v)),
            JLiteral::Long(v) => Some(*v),
            JLiteral::Char(v) => Some(i64::from(*v)),
            _ => None,
        }
    }

    /// Value widened to double, for any numeric or char literal
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            JLiteral::Int(v) => Some(f64::from(*v)),
            JLiteral::Long(v) => Some(*v as f64),
            JLiteral::Char(v) => Some(f64::from(*v)),
            JLiteral::Float(v) => Some(f64::from(*v)),
            JLiteral::Double(v) => Some(*v),
            _ => None,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, JLiteral::Null)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BinaryOp {
    Mul,
    Div,
    Mod,
    Add,
    Sub,
    Shl,
    Shr,
    Shru,
    Lt,
    Le,
    Gt,
    Ge,
    Eq,
    Neq,
    /// Strict reference identity, introduced by lowering
    RefEq,
    RefNeq,
    BitAnd,
    BitXor,
    BitOr,
    And,
    Or,
    Assign,
    AsgAdd,
    AsgSub,
    AsgMul,
    AsgDiv,
    AsgMod,
    AsgShl,
    AsgShr,
    AsgShru,
    AsgBitAnd,
    AsgBitXor,
    AsgBitOr,
}

impl BinaryOp {
    pub fn symbol(self) -> &'static str {
        match self {
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
            BinaryOp::Mod => "%",
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Shl => "<<",
            BinaryOp::Shr => ">>",
            BinaryOp::Shru => ">>>",
            BinaryOp::Lt => "<",
            BinaryOp::Le => "<=",
            BinaryOp::Gt => ">",
            BinaryOp::Ge => ">=",
            BinaryOp::Eq => "==",
            BinaryOp::Neq => "!=",
            BinaryOp::RefEq => "===",
            BinaryOp::RefNeq => "!==",
            BinaryOp::BitAnd => "&",
            BinaryOp::BitXor => "^",
            BinaryOp::BitOr => "|",
            BinaryOp::And => "&&",
            BinaryOp::Or => "||",
            BinaryOp::Assign => "=",
            BinaryOp::AsgAdd => "+=",
            BinaryOp::AsgSub => "-=",
            BinaryOp::AsgMul => "*=",
            BinaryOp::AsgDiv => "/=",
            BinaryOp::AsgMod => "%=",
            BinaryOp::AsgShl => "<<=",
            BinaryOp::AsgShr => ">>=",
            BinaryOp::AsgShru => ">>>=",
            BinaryOp::AsgBitAnd => "&=",
            BinaryOp::AsgBitXor => "^=",
            BinaryOp::AsgBitOr => "|=",
        }
    }

    pub fn is_assignment(self) -> bool {
        self == BinaryOp::Assign || self.is_compound_assignment()
    }

    pub fn is_compound_assignment(self) -> bool {
        self.non_assignment_of().is_some()
    }

    /// `+` for `+=`, and so on
    pub fn non_assignment_of(self) -> Option<BinaryOp> {
        Some(match self {
            BinaryOp::AsgAdd => BinaryOp::Add,
            BinaryOp::AsgSub => BinaryOp::Sub,
            BinaryOp::AsgMul => BinaryOp::Mul,
            BinaryOp::AsgDiv => BinaryOp::Div,
            BinaryOp::AsgMod => BinaryOp::Mod,
            BinaryOp::AsgShl => BinaryOp::Shl,
            BinaryOp::AsgShr => BinaryOp::Shr,
            BinaryOp::AsgShru => BinaryOp::Shru,
            BinaryOp::AsgBitAnd => BinaryOp::BitAnd,
            BinaryOp::AsgBitXor => BinaryOp::BitXor,
            BinaryOp::AsgBitOr => BinaryOp::BitOr,
            _ => return None,
        })
    }

    pub fn is_comparison(self) -> bool {
        matches!(
            self,
            BinaryOp::Lt
                | BinaryOp::Le
                | BinaryOp::Gt
                | BinaryOp::Ge
                | BinaryOp::Eq
                | BinaryOp::Neq
                | BinaryOp::RefEq
                | BinaryOp::RefNeq
        )
    }

    pub fn is_short_circuit(self) -> bool {
        matches!(self, BinaryOp::And | BinaryOp::Or)
    }

    pub fn is_shift(self) -> bool {
        matches!(self, BinaryOp::Shl | BinaryOp::Shr | BinaryOp::Shru)
    }

    pub fn is_division(self) -> bool {
        matches!(self, BinaryOp::Div | BinaryOp::Mod)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum UnaryOp {
    Neg,
    Not,
    BitNot,
    PreInc,
    PreDec,
    PostInc,
    PostDec,
}

impl UnaryOp {
    pub fn symbol(self) -> &'static str {
        match self {
            UnaryOp::Neg => "-",
            UnaryOp::Not => "!",
            UnaryOp::BitNot => "~",
            UnaryOp::PreInc | UnaryOp::PostInc => "++",
            UnaryOp::PreDec | UnaryOp::PostDec => "--",
        }
    }

    /// Increments and decrements write their operand
    pub fn is_modifying(self) -> bool {
        matches!(
            self,
            UnaryOp::PreInc | UnaryOp::PreDec | UnaryOp::PostInc | UnaryOp::PostDec
        )
    }

    pub fn is_postfix(self) -> bool {
        matches!(self, UnaryOp::PostInc | UnaryOp::PostDec)
    }

    pub fn is_increment(self) -> bool {
        matches!(self, UnaryOp::PreInc | UnaryOp::PostInc)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JExpression {
    pub info: SourceInfo,
    pub kind: JExpressionKind,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum JExpressionKind {
    Literal(JLiteral),
    VariableRef(VarId),
    FieldRef {
        instance: Option<Box<JExpression>>,
        field: FieldId,
    },
    This(TypeId),
    MethodCall {
        instance: Option<Box<JExpression>>,
        target: MethodId,
        args: Vec<JExpression>,
        /// Call the target directly instead of dispatching through the receiver
        static_dispatch: bool,
    },
    NewInstance {
        class: TypeId,
        ctor: MethodId,
        args: Vec<JExpression>,
    },
    NewArray {
        ty: JType,
        dims: Vec<JExpression>,
        initializers: Option<Vec<JExpression>>,
    },
    ArrayRef {
        array: Box<JExpression>,
        index: Box<JExpression>,
    },
    ArrayLength(Box<JExpression>),
    Binary {
        op: BinaryOp,
        lhs: Box<JExpression>,
        rhs: Box<JExpression>,
        ty: JType,
    },
    Unary {
        op: UnaryOp,
        arg: Box<JExpression>,
    },
    Conditional {
        cond: Box<JExpression>,
        then_expr: Box<JExpression>,
        else_expr: Box<JExpression>,
        ty: JType,
    },
    Cast {
        ty: JType,
        expr: Box<JExpression>,
    },
    InstanceOf {
        test: JType,
        expr: Box<JExpression>,
    },
    /// Comma sequence; the value is the last expression's
    Multi(Vec<JExpression>),
}

impl JExpression {
    pub fn new(info: SourceInfo, kind: JExpressionKind) -> Self {
        Self { info, kind }
    }

    pub fn literal(info: SourceInfo, value: JLiteral) -> Self {
        Self::new(info, JExpressionKind::Literal(value))
    }

    pub fn bool_lit(info: SourceInfo, value: bool) -> Self {
        Self::literal(info, JLiteral::Boolean(value))
    }

    pub fn int_lit(info: SourceInfo, value: i32) -> Self {
        Self::literal(info, JLiteral::Int(value))
    }

    pub fn long_lit(info: SourceInfo, value: i64) -> Self {
        Self::literal(info, JLiteral::Long(value))
    }

    pub fn double_lit(info: SourceInfo, value: f64) -> Self {
        Self::literal(info, JLiteral::Double(value))
    }

    pub fn string_lit(info: SourceInfo, value: impl Into<String>) -> Self {
        Self::literal(info, JLiteral::String(value.into()))
    }

    pub fn null_lit(info: SourceInfo) -> Self {
        Self::literal(info, JLiteral::Null)
    }

    pub fn var_ref(info: SourceInfo, var: VarId) -> Self {
        Self::new(info, JExpressionKind::VariableRef(var))
    }

    pub fn field_ref(info: SourceInfo, instance: Option<JExpression>, field: FieldId) -> Self {
        Self::new(
            info,
            JExpressionKind::FieldRef {
                instance: instance.map(Box::new),
                field,
            },
        )
    }

    pub fn this(info: SourceInfo, ty: TypeId) -> Self {
        Self::new(info, JExpressionKind::This(ty))
    }

    /// Virtual call when `instance` is given, static call otherwise
    pub fn call(
        info: SourceInfo,
        instance: Option<JExpression>,
        target: MethodId,
        args: Vec<JExpression>,
    ) -> Self {
        Self::new(
            info,
            JExpressionKind::MethodCall {
                instance: instance.map(Box::new),
                target,
                args,
                static_dispatch: false,
            },
        )
    }

    pub fn static_call(info: SourceInfo, target: MethodId, args: Vec<JExpression>) -> Self {
        Self::call(info, None, target, args)
    }

    /// `super.m(...)` style call bound to exactly `target`
    pub fn super_call(
        info: SourceInfo,
        instance: JExpression,
        target: MethodId,
        args: Vec<JExpression>,
    ) -> Self {
        Self::new(
            info,
            JExpressionKind::MethodCall {
                instance: Some(Box::new(instance)),
                target,
                args,
                static_dispatch: true,
            },
        )
    }

    pub fn new_instance(info: SourceInfo, class: TypeId, ctor: MethodId, args: Vec<JExpression>) -> Self {
        Self::new(info, JExpressionKind::NewInstance { class, ctor, args })
    }

    pub fn new_array(
        info: SourceInfo,
        ty: JType,
        dims: Vec<JExpression>,
        initializers: Option<Vec<JExpression>>,
    ) -> Self {
        Self::new(
            info,
            JExpressionKind::NewArray {
                ty,
                dims,
                initializers,
            },
        )
    }

    pub fn array_ref(info: SourceInfo, array: JExpression, index: JExpression) -> Self {
        Self::new(
            info,
            JExpressionKind::ArrayRef {
                array: Box::new(array),
                index: Box::new(index),
            },
        )
    }

    pub fn array_length(info: SourceInfo, array: JExpression) -> Self {
        Self::new(info, JExpressionKind::ArrayLength(Box::new(array)))
    }

    pub fn binary(info: SourceInfo, op: BinaryOp, lhs: JExpression, rhs: JExpression, ty: JType) -> Self {
        Self::new(
            info,
            JExpressionKind::Binary {
                op,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
                ty,
            },
        )
    }

    pub fn assign(info: SourceInfo, lhs: JExpression, rhs: JExpression, ty: JType) -> Self {
        Self::binary(info, BinaryOp::Assign, lhs, rhs, ty)
    }

    pub fn unary(info: SourceInfo, op: UnaryOp, arg: JExpression) -> Self {
        Self::new(
            info,
            JExpressionKind::Unary {
                op,
                arg: Box::new(arg),
            },
        )
    }

    pub fn not(info: SourceInfo, arg: JExpression) -> Self {
        Self::unary(info, UnaryOp::Not, arg)
    }

    pub fn conditional(
        info: SourceInfo,
        cond: JExpression,
        then_expr: JExpression,
        else_expr: JExpression,
        ty: JType,
    ) -> Self {
        Self::new(
            info,
            JExpressionKind::Conditional {
                cond: Box::new(cond),
                then_expr: Box::new(then_expr),
                else_expr: Box::new(else_expr),
                ty,
            },
        )
    }

    pub fn cast(info: SourceInfo, ty: JType, expr: JExpression) -> Self {
        Self::new(
            info,
            JExpressionKind::Cast {
                ty,
                expr: Box::new(expr),
            },
        )
    }

    pub fn instance_of(info: SourceInfo, test: JType, expr: JExpression) -> Self {
        Self::new(
            info,
            JExpressionKind::InstanceOf {
                test,
                expr: Box::new(expr),
            },
        )
    }

    pub fn multi(info: SourceInfo, exprs: Vec<JExpression>) -> Self {
        Self::new(info, JExpressionKind::Multi(exprs))
    }

    pub fn as_literal(&self) -> Option<&JLiteral> {
        match &self.kind {
            JExpressionKind::Literal(lit) => Some(lit),
            _ => None,
        }
    }

    pub fn is_null_literal(&self) -> bool {
        matches!(self.kind, JExpressionKind::Literal(JLiteral::Null))
    }

    pub fn as_bool_literal(&self) -> Option<bool> {
        self.as_literal().and_then(JLiteral::as_bool)
    }

    /// Variable, field and array element references may be assigned
    pub fn is_lvalue(&self) -> bool {
        matches!(
            self.kind,
            JExpressionKind::VariableRef(_)
                | JExpressionKind::FieldRef { .. }
                | JExpressionKind::ArrayRef { .. }
        )
    }

    /// Literals, variable refs and `this` evaluate to the same value with no
    /// effect no matter how often they are evaluated
    pub fn is_stable(&self) -> bool {
        matches!(
            self.kind,
            JExpressionKind::Literal(_) | JExpressionKind::VariableRef(_) | JExpressionKind::This(_)
        )
    }

    /// Static type of this expression
    pub fn ty(&self, program: &JProgram) -> JType {
        match &self.kind {
            JExpressionKind::Literal(lit) => lit.ty(program),
            JExpressionKind::VariableRef(var) => program.variables[*var].ty.clone(),
            JExpressionKind::FieldRef { field, .. } => program.fields[*field].ty.clone(),
            JExpressionKind::This(ty) => JType::Declared(*ty),
            JExpressionKind::MethodCall { target, .. } => program.methods[*target].return_type.clone(),
            JExpressionKind::NewInstance { class, .. } => JType::Declared(*class),
            JExpressionKind::NewArray { ty, .. } => ty.clone(),
            JExpressionKind::ArrayRef { array, .. } => match array.ty(program) {
                JType::Array(element) => *element,
                _ => JType::Null,
            },
            JExpressionKind::ArrayLength(_) => JType::INT,
            JExpressionKind::Binary { ty, .. } => ty.clone(),
            JExpressionKind::Unary { op, arg } => {
                if *op == UnaryOp::Not {
                    JType::BOOLEAN
                } else {
                    arg.ty(program)
                }
            }
            JExpressionKind::Conditional { ty, .. } => ty.clone(),
            JExpressionKind::Cast { ty, .. } => ty.clone(),
            JExpressionKind::InstanceOf { .. } => JType::BOOLEAN,
            JExpressionKind::Multi(exprs) => exprs
                .last()
                .map(|last| last.ty(program))
                .unwrap_or(JType::VOID),
        }
    }

    /// Whether evaluating this expression may have an observable effect
    /// beyond producing its value
    pub fn has_side_effects(&self) -> bool {
        match &self.kind {
            JExpressionKind::Literal(_) | JExpressionKind::VariableRef(_) | JExpressionKind::This(_) => {
                false
            }
            JExpressionKind::FieldRef { instance, .. } => {
                instance.as_ref().is_some_and(|i| i.has_side_effects())
            }
            JExpressionKind::MethodCall { .. } | JExpressionKind::NewInstance { .. } => true,
            JExpressionKind::NewArray {
                dims, initializers, ..
            } => {
                dims.iter().any(JExpression::has_side_effects)
                    || initializers
                        .as_ref()
                        .is_some_and(|inits| inits.iter().any(JExpression::has_side_effects))
            }
            JExpressionKind::ArrayRef { array, index } => {
                array.has_side_effects() || index.has_side_effects()
            }
            JExpressionKind::ArrayLength(array) => array.has_side_effects(),
            JExpressionKind::Binary { op, lhs, rhs, .. } => {
                op.is_assignment() || lhs.has_side_effects() || rhs.has_side_effects()
            }
            JExpressionKind::Unary { op, arg } => op.is_modifying() || arg.has_side_effects(),
            JExpressionKind::Conditional {
                cond,
                then_expr,
                else_expr,
                ..
            } => cond.has_side_effects() || then_expr.has_side_effects() || else_expr.has_side_effects(),
            // A reference cast that survives tightening may throw
            JExpressionKind::Cast { ty, expr } => {
                (ty.is_reference() && !expr.is_null_literal()) || expr.has_side_effects()
            }
            JExpressionKind::InstanceOf { expr, .. } => expr.has_side_effects(),
            JExpressionKind::Multi(exprs) => exprs.iter().any(JExpression::has_side_effects),
        }
    }

    /// Number of expression nodes in this tree
    pub fn node_count(&self) -> usize {
        let mut count = 1;
        self.for_each_child(&mut |child| count += child.node_count());
        count
    }

    /// Direct subexpressions in evaluation order
    pub fn for_each_child<'a>(&'a self, f: &mut dyn FnMut(&'a JExpression)) {
        match &self.kind {
            JExpressionKind::Literal(_) | JExpressionKind::VariableRef(_) | JExpressionKind::This(_) => {}
            JExpressionKind::FieldRef { instance, .. } => {
                if let Some(instance) = instance {
                    f(instance);
                }
            }
            JExpressionKind::MethodCall { instance, args, .. } => {
                if let Some(instance) = instance {
                    f(instance);
                }
                args.iter().for_each(|a| f(a));
            }
            JExpressionKind::NewInstance { args, .. } => args.iter().for_each(|a| f(a)),
            JExpressionKind::NewArray {
                dims, initializers, ..
            } => {
                dims.iter().for_each(|d| f(d));
                if let Some(inits) = initializers {
                    inits.iter().for_each(|i| f(i));
                }
            }
            JExpressionKind::ArrayRef { array, index } => {
                f(array);
                f(index);
            }
            JExpressionKind::ArrayLength(array) => f(array),
            JExpressionKind::Binary { lhs, rhs, .. } => {
                f(lhs);
                f(rhs);
            }
            JExpressionKind::Unary { arg, .. } => f(arg),
            JExpressionKind::Conditional {
                cond,
                then_expr,
                else_expr,
                ..
            } => {
                f(cond);
                f(then_expr);
                f(else_expr);
            }
            JExpressionKind::Cast { expr, .. } | JExpressionKind::InstanceOf { expr, .. } => f(expr),
            JExpressionKind::Multi(exprs) => exprs.iter().for_each(|e| f(e)),
        }
    }

    pub fn kind_name(&self) -> &'static str {
        match &self.kind {
            JExpressionKind::Literal(_) => "Literal",
            JExpressionKind::VariableRef(_) => "VariableRef",
            JExpressionKind::FieldRef { .. } => "FieldRef",
            JExpressionKind::This(_) => "This",
            JExpressionKind::MethodCall { .. } => "MethodCall",
            JExpressionKind::NewInstance { .. } => "NewInstance",
            JExpressionKind::NewArray { .. } => "NewArray",
            JExpressionKind::ArrayRef { .. } => "ArrayRef",
            JExpressionKind::ArrayLength(_) => "ArrayLength",
            JExpressionKind::Binary { .. } => "Binary",
            JExpressionKind::Unary { .. } => "Unary",
            JExpressionKind::Conditional { .. } => "Conditional",
            JExpressionKind::Cast { .. } => "Cast",
            JExpressionKind::InstanceOf { .. } => "InstanceOf",
            JExpressionKind::Multi(_) => "Multi",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::jast::declarations::MethodFlags;

    fn info() -> SourceInfo {
        SourceInfo::unknown()
    }

    #[test]
    fn test_compound_assignment_ops() {
        assert_eq!(BinaryOp::AsgShru.non_assignment_of(), Some(BinaryOp::Shru));
        assert!(BinaryOp::AsgAdd.is_assignment());
        assert!(BinaryOp::Assign.is_assignment());
        assert!(!BinaryOp::Assign.is_compound_assignment());
        assert!(!BinaryOp::Add.is_assignment());
    }

    #[test]
    fn test_side_effects() {
        let lit = JExpression::int_lit(info(), 1);
        assert!(!lit.has_side_effects());

        let neg = JExpression::unary(info(), UnaryOp::Neg, lit.clone());
        assert!(!neg.has_side_effects());

        let multi = JExpression::multi(info(), vec![lit.clone(), neg]);
        assert!(!multi.has_side_effects());
    }

    #[test]
    fn test_reference_cast_may_throw() {
        let mut program = JProgram::new(false);
        let shape = program.create_class(info(), "Shape", None, false, false);
        let main = program.create_method(info(), shape, "main", JType::VOID, MethodFlags::static_method());
        let local = program.create_local(info(), main, "o", JType::Declared(shape), false);

        let widen = JExpression::cast(info(), JType::DOUBLE, JExpression::int_lit(info(), 1));
        assert!(!widen.has_side_effects());

        let narrow = JExpression::cast(info(), JType::Declared(shape), JExpression::var_ref(info(), local));
        assert!(narrow.has_side_effects());

        let null_cast = JExpression::cast(info(), JType::Declared(shape), JExpression::null_lit(info()));
        assert!(!null_cast.has_side_effects());
    }

    #[test]
    fn test_node_count() {
        let sum = JExpression::binary(
            info(),
            BinaryOp::Add,
            JExpression::int_lit(info(), 1),
            JExpression::unary(info(), UnaryOp::Neg, JExpression::int_lit(info(), 2)),
            JType::INT,
        );
        assert_eq!(sum.node_count(), 4);
    }

    #[test]
    fn test_literal_widening() {
        assert_eq!(JLiteral::Char(65).as_i64(), Some(65));
        assert_eq!(JLiteral::Int(-3).as_f64(), Some(-3.0));
        assert_eq!(JLiteral::String("x".into()).as_i64(), None);
    }
}
