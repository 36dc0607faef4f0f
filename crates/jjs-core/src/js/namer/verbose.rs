//! Naming from the full declared identifier
//!
//! Declared identifiers are already unique within their scope, so this mostly
//! keeps them as they are and only resolves shadowing and reserved words.

use super::name_readably;
use crate::errors::VisitResult;
use crate::js::ast::JsProgram;

#[derive(Debug, Default, Clone, Copy)]
pub struct JsVerboseNamer;

impl JsVerboseNamer {
    pub fn exec(&self, program: &mut JsProgram) -> VisitResult {
        name_readably(program, |name| name.ident.clone(), None)?;
        tracing::debug!("verbose names assigned");
        Ok(())
    }
}
