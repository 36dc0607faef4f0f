use crate::jast::declarations::VarId;
use crate::jast::expression::{JExpression, JLiteral};
use crate::source_info::SourceInfo;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JStatement {
    pub info: SourceInfo,
    pub kind: JStatementKind,
}

/// `catch (T var) { body }`; the caught type is the variable's declared type
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JCatch {
    pub info: SourceInfo,
    pub var: VarId,
    pub body: Vec<JStatement>,
}

/// One `case` of a switch; `None` is `default`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JSwitchCase {
    pub info: SourceInfo,
    pub label: Option<JLiteral>,
    pub body: Vec<JStatement>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum JStatementKind {
    Block(Vec<JStatement>),
    LocalDecl {
        var: VarId,
        init: Option<JExpression>,
    },
    Expression(JExpression),
    If {
        cond: JExpression,
        then_stmt: Box<JStatement>,
        else_stmt: Option<Box<JStatement>>,
    },
    While {
        cond: JExpression,
        body: Box<JStatement>,
    },
    DoWhile {
        body: Box<JStatement>,
        cond: JExpression,
    },
    For {
        init: Vec<JStatement>,
        cond: Option<JExpression>,
        increments: Vec<JExpression>,
        body: Box<JStatement>,
    },
    Return(Option<JExpression>),
    Throw(JExpression),
    Try {
        block: Vec<JStatement>,
        catches: Vec<JCatch>,
        finally: Option<Vec<JStatement>>,
    },
    Break(Option<String>),
    Continue(Option<String>),
    Label {
        name: String,
        body: Box<JStatement>,
    },
    Switch {
        expr: JExpression,
        cases: Vec<JSwitchCase>,
    },
    Assert {
        test: JExpression,
        message: Option<JExpression>,
    },
}

impl JStatement {
    pub fn new(info: SourceInfo, kind: JStatementKind) -> Self {
        Self { info, kind }
    }

    pub fn block(info: SourceInfo, stmts: Vec<JStatement>) -> Self {
        Self::new(info, JStatementKind::Block(stmts))
    }

    pub fn empty(info: SourceInfo) -> Self {
        Self::block(info, Vec::new())
    }

    pub fn expr(expr: JExpression) -> Self {
        let info = expr.info.clone();
        Self::new(info, JStatementKind::Expression(expr))
    }

    pub fn local_decl(info: SourceInfo, var: VarId, init: Option<JExpression>) -> Self {
        Self::new(info, JStatementKind::LocalDecl { var, init })
    }

    pub fn if_stmt(
        info: SourceInfo,
        cond: JExpression,
        then_stmt: JStatement,
        else_stmt: Option<JStatement>,
    ) -> Self {
        Self::new(
            info,
            JStatementKind::If {
                cond,
                then_stmt: Box::new(then_stmt),
                else_stmt: else_stmt.map(Box::new),
            },
        )
    }

    pub fn while_stmt(info: SourceInfo, cond: JExpression, body: JStatement) -> Self {
        Self::new(
            info,
            JStatementKind::While {
                cond,
                body: Box::new(body),
            },
        )
    }

    pub fn return_stmt(info: SourceInfo, value: Option<JExpression>) -> Self {
        Self::new(info, JStatementKind::Return(value))
    }

    pub fn throw_stmt(info: SourceInfo, value: JExpression) -> Self {
        Self::new(info, JStatementKind::Throw(value))
    }

    pub fn is_empty_block(&self) -> bool {
        matches!(&self.kind, JStatementKind::Block(stmts) if stmts.is_empty())
    }

    /// Control never falls through to the next statement
    pub fn unconditionally_breaks(&self) -> bool {
        match &self.kind {
            JStatementKind::Return(_)
            | JStatementKind::Throw(_)
            | JStatementKind::Break(_)
            | JStatementKind::Continue(_) => true,
            JStatementKind::Block(stmts) => stmts.iter().any(JStatement::unconditionally_breaks),
            JStatementKind::If {
                then_stmt,
                else_stmt: Some(else_stmt),
                ..
            } => then_stmt.unconditionally_breaks() && else_stmt.unconditionally_breaks(),
            _ => false,
        }
    }

    pub fn kind_name(&self) -> &'static str {
        match &self.kind {
            JStatementKind::Block(_) => "Block",
            JStatementKind::LocalDecl { .. } => "LocalDecl",
            JStatementKind::Expression(_) => "ExpressionStatement",
            JStatementKind::If { .. } => "If",
            JStatementKind::While { .. } => "While",
            JStatementKind::DoWhile { .. } => "DoWhile",
            JStatementKind::For { .. } => "For",
            JStatementKind::Return(_) => "Return",
            JStatementKind::Throw(_) => "Throw",
            JStatementKind::Try { .. } => "Try",
            JStatementKind::Break(_) => "Break",
            JStatementKind::Continue(_) => "Continue",
            JStatementKind::Label { .. } => "Label",
            JStatementKind::Switch { .. } => "Switch",
            JStatementKind::Assert { .. } => "Assert",
        }
    }

    /// Number of statement and expression nodes in this tree
    pub fn node_count(&self) -> usize {
        fn list(stmts: &[JStatement]) -> usize {
            stmts.iter().map(JStatement::node_count).sum()
        }
        fn opt(expr: &Option<JExpression>) -> usize {
            expr.as_ref().map_or(0, JExpression::node_count)
        }
        1 + match &self.kind {
            JStatementKind::Block(stmts) => list(stmts),
            JStatementKind::LocalDecl { init, .. } => opt(init),
            JStatementKind::Expression(expr) | JStatementKind::Throw(expr) => expr.node_count(),
            JStatementKind::If {
                cond,
                then_stmt,
                else_stmt,
            } => {
                cond.node_count()
                    + then_stmt.node_count()
                    + else_stmt.as_ref().map_or(0, |s| s.node_count())
            }
            JStatementKind::While { cond, body } | JStatementKind::DoWhile { body, cond } => {
                cond.node_count() + body.node_count()
            }
            JStatementKind::For {
                init,
                cond,
                increments,
                body,
            } => {
                list(init)
                    + opt(cond)
                    + increments.iter().map(JExpression::node_count).sum::<usize>()
                    + body.node_count()
            }
            JStatementKind::Return(value) => opt(value),
            JStatementKind::Try {
                block,
                catches,
                finally,
            } => {
                list(block)
                    + catches.iter().map(|c| 1 + list(&c.body)).sum::<usize>()
                    + finally.as_deref().map_or(0, list)
            }
            JStatementKind::Break(_) | JStatementKind::Continue(_) => 0,
            JStatementKind::Label { body, .. } => body.node_count(),
            JStatementKind::Switch { expr, cases } => {
                expr.node_count() + cases.iter().map(|c| 1 + list(&c.body)).sum::<usize>()
            }
            JStatementKind::Assert { test, message } => test.node_count() + opt(message),
        }
    }
}
