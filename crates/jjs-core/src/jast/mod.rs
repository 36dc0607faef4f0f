//! Typed program AST
//!
//! The front end hands the compiler a [`JProgram`]: classes, interfaces,
//! fields and methods with fully typed bodies. All whole-program analyses
//! and the lowering passes operate on this representation before the code
//! generator turns it into a [`JsProgram`](crate::js::JsProgram).

pub mod declarations;
pub mod expression;
pub mod program;
pub mod runtime;
pub mod statement;
pub mod to_source;
pub mod type_oracle;
pub mod types;
pub mod visitor;

pub use declarations::{
    FieldId, JDeclaredType, JField, JMethod, JVariable, MethodBody, MethodFlags, MethodId, NativeBody,
    TypeKind, VarId, VariableKind,
};
pub use expression::{BinaryOp, JExpression, JExpressionKind, JLiteral, UnaryOp};
pub use program::{EntryMethod, IndexedRegistry, JProgram, Member};
pub use statement::{JCatch, JStatement, JStatementKind, JSwitchCase};
pub use type_oracle::TypeOracle;
pub use types::{JType, PrimitiveType, TypeId};
pub use visitor::{ExprContext, JModVisitor, JVisitor, StmtContext, VisitCx};
