//! The output program

use crate::arena::Arena;
use crate::js::scope::{
    is_reserved, JsName, JsScope, NameId, ScopeId, ScopeKind, StaticRef, FIXED_PROPERTIES, JS_GLOBALS,
    RESERVED_WORDS,
};
use crate::source_info::SourceInfo;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum JsBinaryOp {
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
    StrictEq,
    StrictNeq,
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
    Comma,
}

impl JsBinaryOp {
    pub fn symbol(self) -> &'static str {
        match self {
            JsBinaryOp::Mul => "*",
            JsBinaryOp::Div => "/",
            JsBinaryOp::Mod => "%",
            JsBinaryOp::Add => "+",
            JsBinaryOp::Sub => "-",
            JsBinaryOp::Shl => "<<",
            JsBinaryOp::Shr => ">>",
            JsBinaryOp::Shru => ">>>",
            JsBinaryOp::Lt => "<",
            JsBinaryOp::Le => "<=",
            JsBinaryOp::Gt => ">",
            JsBinaryOp::Ge => ">=",
            JsBinaryOp::Eq => "==",
            JsBinaryOp::Neq => "!=",
            JsBinaryOp::StrictEq => "===",
            JsBinaryOp::StrictNeq => "!==",
            JsBinaryOp::BitAnd => "&",
            JsBinaryOp::BitXor => "^",
            JsBinaryOp::BitOr => "|",
            JsBinaryOp::And => "&&",
            JsBinaryOp::Or => "||",
            JsBinaryOp::Assign => "=",
            JsBinaryOp::AsgAdd => "+=",
            JsBinaryOp::AsgSub => "-=",
            JsBinaryOp::AsgMul => "*=",
            JsBinaryOp::AsgDiv => "/=",
            JsBinaryOp::AsgMod => "%=",
            JsBinaryOp::AsgShl => "<<=",
            JsBinaryOp::AsgShr => ">>=",
            JsBinaryOp::AsgShru => ">>>=",
            JsBinaryOp::AsgBitAnd => "&=",
            JsBinaryOp::AsgBitXor => "^=",
            JsBinaryOp::AsgBitOr => "|=",
            JsBinaryOp::Comma => ",",
        }
    }

    /// Binding strength; larger binds tighter
    pub fn precedence(self) -> u8 {
        match self {
            JsBinaryOp::Comma => 1,
            op if op.is_assignment() => 2,
            JsBinaryOp::Or => 4,
            JsBinaryOp::And => 5,
            JsBinaryOp::BitOr => 6,
            JsBinaryOp::BitXor => 7,
            JsBinaryOp::BitAnd => 8,
            JsBinaryOp::Eq | JsBinaryOp::Neq | JsBinaryOp::StrictEq | JsBinaryOp::StrictNeq => 9,
            JsBinaryOp::Lt | JsBinaryOp::Le | JsBinaryOp::Gt | JsBinaryOp::Ge => 10,
            JsBinaryOp::Shl | JsBinaryOp::Shr | JsBinaryOp::Shru => 11,
            JsBinaryOp::Add | JsBinaryOp::Sub => 12,
            _ => 13,
        }
    }

    pub fn is_assignment(self) -> bool {
        matches!(
            self,
            JsBinaryOp::Assign
                | JsBinaryOp::AsgAdd
                | JsBinaryOp::AsgSub
                | JsBinaryOp::AsgMul
                | JsBinaryOp::AsgDiv
                | JsBinaryOp::AsgMod
                | JsBinaryOp::AsgShl
                | JsBinaryOp::AsgShr
                | JsBinaryOp::AsgShru
                | JsBinaryOp::AsgBitAnd
                | JsBinaryOp::AsgBitXor
                | JsBinaryOp::AsgBitOr
        )
    }

    pub fn is_right_associative(self) -> bool {
        self.is_assignment()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum JsUnaryOp {
    Neg,
    Pos,
    Not,
    BitNot,
    Inc,
    Dec,
    TypeOf,
    Void,
    Delete,
}

impl JsUnaryOp {
    pub fn symbol(self) -> &'static str {
        match self {
            JsUnaryOp::Neg => "-",
            JsUnaryOp::Pos => "+",
            JsUnaryOp::Not => "!",
            JsUnaryOp::BitNot => "~",
            JsUnaryOp::Inc => "++",
            JsUnaryOp::Dec => "--",
            JsUnaryOp::TypeOf => "typeof",
            JsUnaryOp::Void => "void",
            JsUnaryOp::Delete => "delete",
        }
    }

    pub fn is_keyword(self) -> bool {
        matches!(self, JsUnaryOp::TypeOf | JsUnaryOp::Void | JsUnaryOp::Delete)
    }

    pub fn is_modifying(self) -> bool {
        matches!(self, JsUnaryOp::Inc | JsUnaryOp::Dec | JsUnaryOp::Delete)
    }
}

pub const PRECEDENCE_CONDITIONAL: u8 = 3;
pub const PRECEDENCE_PREFIX: u8 = 14;
pub const PRECEDENCE_POSTFIX: u8 = 15;
pub const PRECEDENCE_NEW: u8 = 16;
pub const PRECEDENCE_CALL: u8 = 17;
pub const PRECEDENCE_PRIMARY: u8 = 18;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsFunction {
    pub info: SourceInfo,
    pub name: Option<NameId>,
    pub params: Vec<NameId>,
    pub body: Vec<JsStatement>,
    pub scope: ScopeId,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsPropertyInit {
    /// Property name, string or number
    pub key: JsExpression,
    pub value: JsExpression,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum JsExpressionKind {
    NameRef {
        qualifier: Option<Box<JsExpression>>,
        name: NameId,
    },
    ArrayAccess {
        array: Box<JsExpression>,
        index: Box<JsExpression>,
    },
    Invocation {
        target: Box<JsExpression>,
        args: Vec<JsExpression>,
    },
    New {
        ctor: Box<JsExpression>,
        args: Vec<JsExpression>,
    },
    Binary {
        op: JsBinaryOp,
        lhs: Box<JsExpression>,
        rhs: Box<JsExpression>,
    },
    Prefix {
        op: JsUnaryOp,
        arg: Box<JsExpression>,
    },
    Postfix {
        op: JsUnaryOp,
        arg: Box<JsExpression>,
    },
    Conditional {
        cond: Box<JsExpression>,
        then_expr: Box<JsExpression>,
        else_expr: Box<JsExpression>,
    },
    Function(Box<JsFunction>),
    Number(f64),
    String(String),
    Boolean(bool),
    Null,
    This,
    ArrayLiteral(Vec<JsExpression>),
    ObjectLiteral(Vec<JsPropertyInit>),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsExpression {
    pub info: SourceInfo,
    pub kind: JsExpressionKind,
}

impl JsExpression {
    pub fn new(info: SourceInfo, kind: JsExpressionKind) -> Self {
        Self { info, kind }
    }

    pub fn name_ref(info: SourceInfo, name: NameId) -> Self {
        Self::new(info, JsExpressionKind::NameRef { qualifier: None, name })
    }

    pub fn qualified(info: SourceInfo, qualifier: JsExpression, name: NameId) -> Self {
        Self::new(
            info,
            JsExpressionKind::NameRef {
                qualifier: Some(Box::new(qualifier)),
                name,
            },
        )
    }

    pub fn invoke(info: SourceInfo, target: JsExpression, args: Vec<JsExpression>) -> Self {
        Self::new(
            info,
            JsExpressionKind::Invocation {
                target: Box::new(target),
                args,
            },
        )
    }

    pub fn new_object(info: SourceInfo, ctor: JsExpression, args: Vec<JsExpression>) -> Self {
        Self::new(
            info,
            JsExpressionKind::New {
                ctor: Box::new(ctor),
                args,
            },
        )
    }

    pub fn binary(info: SourceInfo, op: JsBinaryOp, lhs: JsExpression, rhs: JsExpression) -> Self {
        Self::new(
            info,
            JsExpressionKind::Binary {
                op,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
            },
        )
    }

    pub fn assign(info: SourceInfo, lhs: JsExpression, rhs: JsExpression) -> Self {
        Self::binary(info, JsBinaryOp::Assign, lhs, rhs)
    }

    /// `a, b, c`; a single expression is returned as is
    pub fn comma(info: SourceInfo, mut exprs: Vec<JsExpression>) -> Self {
        let Some(mut result) = exprs.pop() else {
            return Self::new(info, JsExpressionKind::Null);
        };
        while let Some(prev) = exprs.pop() {
            result = Self::binary(info.clone(), JsBinaryOp::Comma, prev, result);
        }
        result
    }

    pub fn prefix(info: SourceInfo, op: JsUnaryOp, arg: JsExpression) -> Self {
        Self::new(
            info,
            JsExpressionKind::Prefix {
                op,
                arg: Box::new(arg),
            },
        )
    }

    pub fn postfix(info: SourceInfo, op: JsUnaryOp, arg: JsExpression) -> Self {
        Self::new(
            info,
            JsExpressionKind::Postfix {
                op,
                arg: Box::new(arg),
            },
        )
    }

    pub fn conditional(info: SourceInfo, cond: JsExpression, then_expr: JsExpression, else_expr: JsExpression) -> Self {
        Self::new(
            info,
            JsExpressionKind::Conditional {
                cond: Box::new(cond),
                then_expr: Box::new(then_expr),
                else_expr: Box::new(else_expr),
            },
        )
    }

    pub fn array_access(info: SourceInfo, array: JsExpression, index: JsExpression) -> Self {
        Self::new(
            info,
            JsExpressionKind::ArrayAccess {
                array: Box::new(array),
                index: Box::new(index),
            },
        )
    }

    pub fn function(function: JsFunction) -> Self {
        Self::new(function.info.clone(), JsExpressionKind::Function(Box::new(function)))
    }

    pub fn number(info: SourceInfo, value: f64) -> Self {
        Self::new(info, JsExpressionKind::Number(value))
    }

    pub fn string(info: SourceInfo, value: impl Into<String>) -> Self {
        Self::new(info, JsExpressionKind::String(value.into()))
    }

    pub fn boolean(info: SourceInfo, value: bool) -> Self {
        Self::new(info, JsExpressionKind::Boolean(value))
    }

    pub fn null(info: SourceInfo) -> Self {
        Self::new(info, JsExpressionKind::Null)
    }

    pub fn this(info: SourceInfo) -> Self {
        Self::new(info, JsExpressionKind::This)
    }

    pub fn array(info: SourceInfo, elements: Vec<JsExpression>) -> Self {
        Self::new(info, JsExpressionKind::ArrayLiteral(elements))
    }

    pub fn object(info: SourceInfo, properties: Vec<JsPropertyInit>) -> Self {
        Self::new(info, JsExpressionKind::ObjectLiteral(properties))
    }

    pub fn not(info: SourceInfo, arg: JsExpression) -> Self {
        Self::prefix(info, JsUnaryOp::Not, arg)
    }

    pub fn is_literal(&self) -> bool {
        matches!(
            self.kind,
            JsExpressionKind::Number(_)
                | JsExpressionKind::String(_)
                | JsExpressionKind::Boolean(_)
                | JsExpressionKind::Null
        )
    }

    /// Unqualified name reference
    pub fn as_name(&self) -> Option<NameId> {
        match &self.kind {
            JsExpressionKind::NameRef { qualifier: None, name } => Some(*name),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self.kind {
            JsExpressionKind::Boolean(b) => Some(b),
            _ => None,
        }
    }

    /// Binding strength of the outermost operator
    pub fn precedence(&self) -> u8 {
        match &self.kind {
            JsExpressionKind::Binary { op, .. } => op.precedence(),
            JsExpressionKind::Conditional { .. } => PRECEDENCE_CONDITIONAL,
            JsExpressionKind::Prefix { .. } => PRECEDENCE_PREFIX,
            JsExpressionKind::Postfix { .. } => PRECEDENCE_POSTFIX,
            JsExpressionKind::New { .. } => PRECEDENCE_NEW,
            JsExpressionKind::Invocation { .. }
            | JsExpressionKind::ArrayAccess { .. }
            | JsExpressionKind::NameRef { qualifier: Some(_), .. } => PRECEDENCE_CALL,
            JsExpressionKind::Number(n) if *n < 0.0 || (*n == 0.0 && n.is_sign_negative()) => PRECEDENCE_PREFIX,
            _ => PRECEDENCE_PRIMARY,
        }
    }

    /// Whether evaluating this expression may have an effect beyond its value
    pub fn has_side_effects(&self) -> bool {
        match &self.kind {
            JsExpressionKind::NameRef { qualifier, .. } => {
                qualifier.as_ref().is_some_and(|q| q.has_side_effects())
            }
            JsExpressionKind::ArrayAccess { array, index } => array.has_side_effects() || index.has_side_effects(),
            JsExpressionKind::Invocation { .. } | JsExpressionKind::New { .. } => true,
            JsExpressionKind::Binary { op, lhs, rhs } => {
                op.is_assignment() || lhs.has_side_effects() || rhs.has_side_effects()
            }
            JsExpressionKind::Prefix { op, arg } | JsExpressionKind::Postfix { op, arg } => {
                op.is_modifying() || arg.has_side_effects()
            }
            JsExpressionKind::Conditional {
                cond,
                then_expr,
                else_expr,
            } => cond.has_side_effects() || then_expr.has_side_effects() || else_expr.has_side_effects(),
            JsExpressionKind::ArrayLiteral(elements) => elements.iter().any(JsExpression::has_side_effects),
            JsExpressionKind::ObjectLiteral(props) => props.iter().any(|p| p.value.has_side_effects()),
            JsExpressionKind::Function(_)
            | JsExpressionKind::Number(_)
            | JsExpressionKind::String(_)
            | JsExpressionKind::Boolean(_)
            | JsExpressionKind::Null
            | JsExpressionKind::This => false,
        }
    }

    pub fn make_stmt(self) -> JsStatement {
        JsStatement::new(self.info.clone(), JsStatementKind::Expression(self))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsVar {
    pub info: SourceInfo,
    pub name: NameId,
    pub init: Option<JsExpression>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsCatch {
    pub info: SourceInfo,
    pub param: NameId,
    pub scope: ScopeId,
    pub body: Vec<JsStatement>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsCase {
    /// `None` for `default:`
    pub label: Option<JsExpression>,
    pub body: Vec<JsStatement>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum JsStatementKind {
    Block(Vec<JsStatement>),
    Expression(JsExpression),
    Vars(Vec<JsVar>),
    Function(JsFunction),
    If {
        cond: JsExpression,
        then_stmt: Box<JsStatement>,
        else_stmt: Option<Box<JsStatement>>,
    },
    While {
        cond: JsExpression,
        body: Box<JsStatement>,
    },
    DoWhile {
        body: Box<JsStatement>,
        cond: JsExpression,
    },
    For {
        init: Option<Box<JsStatement>>,
        cond: Option<JsExpression>,
        incr: Option<JsExpression>,
        body: Box<JsStatement>,
    },
    Return(Option<JsExpression>),
    Throw(JsExpression),
    Break(Option<NameId>),
    Continue(Option<NameId>),
    Label {
        label: NameId,
        body: Box<JsStatement>,
    },
    Try {
        block: Vec<JsStatement>,
        catch: Option<JsCatch>,
        finally: Option<Vec<JsStatement>>,
    },
    Switch {
        expr: JsExpression,
        cases: Vec<JsCase>,
    },
    Empty,
    /// Opaque native code, printed as is
    Verbatim(String),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsStatement {
    pub info: SourceInfo,
    pub kind: JsStatementKind,
}

impl JsStatement {
    pub fn new(info: SourceInfo, kind: JsStatementKind) -> Self {
        Self { info, kind }
    }

    pub fn block(info: SourceInfo, stmts: Vec<JsStatement>) -> Self {
        Self::new(info, JsStatementKind::Block(stmts))
    }

    pub fn empty(info: SourceInfo) -> Self {
        Self::new(info, JsStatementKind::Empty)
    }

    pub fn var(info: SourceInfo, name: NameId, init: Option<JsExpression>) -> Self {
        Self::new(
            info.clone(),
            JsStatementKind::Vars(vec![JsVar { info, name, init }]),
        )
    }

    pub fn ret(info: SourceInfo, value: Option<JsExpression>) -> Self {
        Self::new(info, JsStatementKind::Return(value))
    }

    pub fn is_empty(&self) -> bool {
        match &self.kind {
            JsStatementKind::Empty => true,
            JsStatementKind::Block(stmts) => stmts.iter().all(JsStatement::is_empty),
            _ => false,
        }
    }

    /// Control never falls through this statement
    pub fn is_abrupt(&self) -> bool {
        match &self.kind {
            JsStatementKind::Return(_)
            | JsStatementKind::Throw(_)
            | JsStatementKind::Break(_)
            | JsStatementKind::Continue(_) => true,
            JsStatementKind::Block(stmts) => stmts.last().is_some_and(JsStatement::is_abrupt),
            _ => false,
        }
    }
}

/// The whole output program: scopes, names and the global statement list
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsProgram {
    pub scopes: Arena<JsScope>,
    pub names: Arena<JsName>,
    pub root_scope: ScopeId,
    pub object_scope: ScopeId,
    pub top_scope: ScopeId,
    pub global_block: Vec<JsStatement>,
}

impl Default for JsProgram {
    fn default() -> Self {
        Self::new()
    }
}

impl JsProgram {
    pub fn new() -> Self {
        let mut scopes = Arena::new();
        let root_scope = scopes.alloc(JsScope {
            parent: None,
            kind: ScopeKind::Root,
            description: "root".to_string(),
            names: IndexMap::new(),
            children: Vec::new(),
        });
        let mut program = Self {
            scopes,
            names: Arena::new(),
            root_scope,
            object_scope: root_scope,
            top_scope: root_scope,
            global_block: Vec::new(),
        };
        for ident in RESERVED_WORDS.iter().chain(JS_GLOBALS) {
            program.declare_unobfuscatable(root_scope, ident);
        }
        program.object_scope = program.new_scope(root_scope, ScopeKind::Object, "object");
        for ident in FIXED_PROPERTIES {
            program.declare_unobfuscatable(program.object_scope, ident);
        }
        program.top_scope = program.new_scope(root_scope, ScopeKind::Top, "top");
        program
    }

    pub fn new_scope(&mut self, parent: ScopeId, kind: ScopeKind, description: impl Into<String>) -> ScopeId {
        let scope = self.scopes.alloc(JsScope {
            parent: Some(parent),
            kind,
            description: description.into(),
            names: IndexMap::new(),
            children: Vec::new(),
        });
        self.scopes[parent].children.push(scope);
        scope
    }

    fn alloc_name(&mut self, scope: ScopeId, ident: &str, short_ident: &str, obfuscatable: bool) -> NameId {
        let name = self.names.alloc(JsName {
            ident: ident.to_string(),
            short_ident: short_ident.to_string(),
            scope,
            obfuscatable,
            text: None,
            static_ref: None,
        });
        self.scopes[scope].names.insert(ident.to_string(), name);
        name
    }

    /// Declare `ident` in `scope`, returning the existing name if there is one
    pub fn declare_name(&mut self, scope: ScopeId, ident: &str, short_ident: &str) -> NameId {
        if let Some(existing) = self.scopes[scope].names.get(ident) {
            return *existing;
        }
        self.alloc_name(scope, ident, short_ident, true)
    }

    /// Declare a name whose text is fixed
    pub fn declare_unobfuscatable(&mut self, scope: ScopeId, ident: &str) -> NameId {
        if let Some(existing) = self.scopes[scope].names.get(ident) {
            return *existing;
        }
        let name = self.alloc_name(scope, ident, ident, false);
        self.names[name].text = Some(ident.to_string());
        name
    }

    /// Declare a new name in `scope` based on `base`, disambiguated against
    /// every name visible from the scope (`Foo`, `Foo_0`, `Foo_1`, ...)
    pub fn fresh_name(&mut self, scope: ScopeId, base: &str, short_ident: &str) -> NameId {
        let mut ident = base.to_string();
        let mut counter = 0usize;
        while self.find_existing(scope, &ident).is_some() || is_reserved(&ident) {
            ident = format!("{}_{}", base, counter);
            counter += 1;
        }
        self.alloc_name(scope, &ident, short_ident, true)
    }

    /// Name of a property, declared in the object scope
    pub fn property_name(&mut self, ident: &str) -> NameId {
        let scope = self.object_scope;
        self.declare_name(scope, ident, ident)
    }

    /// Fixed property name such as `prototype`
    pub fn fixed_property(&mut self, ident: &str) -> NameId {
        let scope = self.object_scope;
        self.declare_unobfuscatable(scope, ident)
    }

    /// Find `ident` in `scope` or any of its ancestors
    pub fn find_existing(&self, scope: ScopeId, ident: &str) -> Option<NameId> {
        let mut current = Some(scope);
        while let Some(s) = current {
            if let Some(name) = self.scopes[s].names.get(ident) {
                return Some(*name);
            }
            current = self.scopes[s].parent;
        }
        None
    }

    pub fn name_text(&self, name: NameId) -> &str {
        self.names[name].text()
    }

    pub fn set_static_ref(&mut self, name: NameId, static_ref: StaticRef) {
        self.names[name].static_ref = Some(static_ref);
    }

    /// Scopes in depth-first order starting at `scope`
    pub fn scope_tree(&self, scope: ScopeId) -> Vec<ScopeId> {
        let mut order = Vec::new();
        let mut stack = vec![scope];
        while let Some(s) = stack.pop() {
            order.push(s);
            stack.extend(self.scopes[s].children.iter().rev());
        }
        order
    }

    /// Every text visible from `scope` through its ancestors, `scope` itself excluded
    pub fn ancestor_texts(&self, scope: ScopeId) -> Vec<&str> {
        let mut texts = Vec::new();
        let mut current = self.scopes[scope].parent;
        while let Some(s) = current {
            texts.extend(
                self.scopes[s]
                    .names
                    .values()
                    .filter_map(|n| self.names[*n].text.as_deref()),
            );
            current = self.scopes[s].parent;
        }
        texts
    }
}
