//! Readable naming from each name's short identifier

use super::name_readably;
use crate::config::NameDenylist;
use crate::errors::VisitResult;
use crate::js::ast::JsProgram;

/// Names every pending name after its short identifier, suffixing `_N` on
/// conflicts and avoiding the configured denylist
#[derive(Debug, Default)]
pub struct JsPrettyNamer {
    denylist: NameDenylist,
}

impl JsPrettyNamer {
    pub fn new(denylist: NameDenylist) -> Self {
        Self { denylist }
    }

    pub fn exec(&self, program: &mut JsProgram) -> VisitResult {
        name_readably(program, |name| name.short_ident.clone(), Some(&self.denylist))?;
        tracing::debug!("pretty names assigned");
        Ok(())
    }
}
