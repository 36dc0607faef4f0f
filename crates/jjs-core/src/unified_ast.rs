//! The precompiled program shared by every permutation
//!
//! Permutations mutate their AST freely, so each one needs a private copy.
//! With more than one expected permutation the canonical AST is serialized
//! once with `bincode`; [`UnifiedAst::fresh_ast`] hands out the live copy the
//! first time and a deserialized copy on every later call.

use crate::config::{CompilerOptions, ModuleDef};
use crate::errors::{AstIoError, InternalCompilerError, Result};
use crate::jast::program::JProgram;
use crate::js::ast::JsProgram;
use serde::{Deserialize, Serialize};
use std::sync::{Mutex, PoisonError};

/// One permutation's private ASTs
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AstBundle {
    pub program: JProgram,
    pub js_program: JsProgram,
}

impl AstBundle {
    pub fn new(program: JProgram) -> Self {
        Self {
            program,
            js_program: JsProgram::new(),
        }
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        bincode::serialize(self).map_err(|e| AstIoError::serialize(e).into())
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        bincode::deserialize(bytes).map_err(|e| AstIoError::deserialize(e).into())
    }
}

#[derive(Debug, Default)]
struct AstState {
    live: Option<AstBundle>,
    serialized: Option<Vec<u8>>,
    copies: usize,
}

#[derive(Debug)]
pub struct UnifiedAst {
    options: CompilerOptions,
    module: ModuleDef,
    state: Mutex<AstState>,
}

impl UnifiedAst {
    /// Wrap a precompiled AST; `expected_permutations` decides whether a
    /// serialized copy is kept for later callers
    pub fn new(
        options: CompilerOptions,
        module: ModuleDef,
        bundle: AstBundle,
        expected_permutations: usize,
    ) -> Result<Self> {
        let serialized = if expected_permutations > 1 {
            let bytes = bundle.to_bytes()?;
            tracing::debug!(bytes = bytes.len(), "serialized unified AST");
            Some(bytes)
        } else {
            None
        };
        Ok(Self {
            options,
            module,
            state: Mutex::new(AstState {
                live: Some(bundle),
                serialized,
                copies: 0,
            }),
        })
    }

    pub fn options(&self) -> &CompilerOptions {
        &self.options
    }

    pub fn module(&self) -> &ModuleDef {
        &self.module
    }

    /// A private copy of the precompiled ASTs
    pub fn fresh_ast(&self) -> Result<AstBundle> {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        state.copies += 1;
        if let Some(live) = state.live.take() {
            return Ok(live);
        }
        let Some(bytes) = state.serialized.as_deref() else {
            return Err(InternalCompilerError::new(
                "the unified AST was already handed out and no serialized copy was kept",
            )
            .into());
        };
        let mut bundle = AstBundle::from_bytes(bytes)?;
        bundle.program.correlator.clear();
        tracing::debug!(copy = state.copies, "deserialized private AST copy");
        Ok(bundle)
    }

    /// Serialized size of the canonical AST, if one was kept
    pub fn serialized_len(&self) -> Option<usize> {
        let state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        state.serialized.as_ref().map(Vec::len)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::CompilationError;
    use crate::jast::types::JType;
    use crate::jast::MethodFlags;
    use crate::source_info::SourceInfo;

    fn bundle() -> AstBundle {
        let mut program = JProgram::new(false);
        let object = program.create_class(SourceInfo::unknown(), "java.lang.Object", None, false, false);
        program.create_method(SourceInfo::unknown(), object, "main", JType::VOID, MethodFlags::static_method());
        AstBundle::new(program)
    }

    #[test]
    fn test_single_permutation_hands_out_live_copy_once() {
        let unified = UnifiedAst::new(CompilerOptions::default(), ModuleDef::default(), bundle(), 1).unwrap();
        assert!(unified.serialized_len().is_none());
        assert!(unified.fresh_ast().is_ok());
        assert!(matches!(unified.fresh_ast(), Err(CompilationError::Internal(_))));
    }

    #[test]
    fn test_copies_are_independent() {
        let unified = UnifiedAst::new(CompilerOptions::default(), ModuleDef::default(), bundle(), 3).unwrap();
        let mut first = unified.fresh_ast().unwrap();
        first.program.declared_types.clear();
        let second = unified.fresh_ast().unwrap();
        let third = unified.fresh_ast().unwrap();
        assert_eq!(second.program.declared_types.len(), 1);
        assert_eq!(third.program.methods.len(), 1);
    }

    #[test]
    fn test_corrupt_bytes_are_ast_io_errors() {
        let error = AstBundle::from_bytes(&[0xff, 0x01]).unwrap_err();
        assert!(matches!(error, CompilationError::AstIo(_)));
    }
}
