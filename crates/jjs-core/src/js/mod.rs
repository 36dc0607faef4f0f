//! JavaScript output AST
//!
//! The code generator builds a [`JsProgram`]; the passes in [`optimize`]
//! shrink it, a namer from [`namer`] picks printed identifiers and
//! [`source_gen`] turns it into text.

pub mod ast;
pub mod namer;
pub mod optimize;
pub mod scope;
pub mod source_gen;
pub mod sourcemap;
pub mod visitor;

pub use ast::{JsBinaryOp, JsExpression, JsExpressionKind, JsFunction, JsProgram, JsStatement, JsStatementKind, JsUnaryOp};
pub use scope::{JsName, JsScope, NameId, ScopeId, ScopeKind, StaticRef};
pub use source_gen::{GeneratedSource, JsSourceGenerator, SourceRange, SourceRangeMap, TextOutput};
pub use sourcemap::{SourceMap, SourceMapBuilder};
pub use visitor::{JsModVisitor, JsVisitor};
