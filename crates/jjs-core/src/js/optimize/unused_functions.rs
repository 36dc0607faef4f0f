//! Removal of top-level functions that nothing reachable refers to
//!
//! Roots are the global statements other than function declarations.
//! Function declarations become live when a live statement names them.

use crate::errors::CompilationError;
use crate::fixpoint::OptimizationPass;
use crate::js::ast::{JsExpression, JsExpressionKind, JsProgram, JsStatementKind};
use crate::js::scope::{NameId, StaticRef};
use crate::js::visitor::{walk_stmt, walk_stmts, JsVisitor};
use rustc_hash::{FxHashMap, FxHashSet};

pub struct JsUnusedFunctionRemover;

impl OptimizationPass<JsProgram> for JsUnusedFunctionRemover {
    fn name(&self) -> &'static str {
        "js-unused-function-remover"
    }

    fn run(&mut self, program: &mut JsProgram) -> Result<bool, CompilationError> {
        Ok(remove_unused_functions(program))
    }
}

#[derive(Default)]
struct NameRefs {
    names: Vec<NameId>,
}

impl JsVisitor for NameRefs {
    fn visit_expr(&mut self, expr: &JsExpression) -> bool {
        if let JsExpressionKind::NameRef { qualifier: None, name } = &expr.kind {
            self.names.push(*name);
        }
        true
    }
}

pub fn remove_unused_functions(program: &mut JsProgram) -> bool {
    let mut declarations: FxHashMap<NameId, usize> = FxHashMap::default();
    for (index, stmt) in program.global_block.iter().enumerate() {
        if let JsStatementKind::Function(function) = &stmt.kind {
            if let Some(name) = function.name {
                if matches!(
                    program.names[name].static_ref,
                    Some(StaticRef::Function | StaticRef::Clinit)
                ) {
                    declarations.insert(name, index);
                }
            }
        }
    }

    let mut refs = NameRefs::default();
    for (index, stmt) in program.global_block.iter().enumerate() {
        let declared = matches!(&stmt.kind, JsStatementKind::Function(f) if f.name.is_some_and(|n| declarations.get(&n) == Some(&index)));
        if !declared {
            walk_stmt(&mut refs, stmt);
        }
    }

    let mut live: FxHashSet<NameId> = FxHashSet::default();
    while let Some(name) = refs.names.pop() {
        let Some(&index) = declarations.get(&name) else {
            continue;
        };
        if !live.insert(name) {
            continue;
        }
        if let JsStatementKind::Function(function) = &program.global_block[index].kind {
            walk_stmts(&mut refs, &function.body);
        }
    }

    let dead: FxHashSet<usize> = declarations
        .iter()
        .filter(|(name, _)| !live.contains(*name))
        .map(|(_, index)| *index)
        .collect();
    let removed = dead.len();
    let mut index = 0;
    program.global_block.retain(|_| {
        let keep = !dead.contains(&index);
        index += 1;
        keep
    });
    if removed > 0 {
        tracing::debug!(removed, "removed unused js functions");
    }
    removed > 0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::js::ast::{JsFunction, JsStatement};
    use crate::js::scope::ScopeKind;
    use crate::source_info::SourceInfo;

    fn info() -> SourceInfo {
        SourceInfo::unknown()
    }

    fn function(program: &mut JsProgram, ident: &str, body: Vec<JsStatement>) -> (NameId, JsStatement) {
        let top = program.top_scope;
        let name = program.fresh_name(top, ident, ident);
        program.set_static_ref(name, StaticRef::Function);
        let scope = program.new_scope(top, ScopeKind::Function, ident);
        let stmt = JsStatement::new(
            info(),
            JsStatementKind::Function(JsFunction {
                info: info(),
                name: Some(name),
                params: vec![],
                body,
                scope,
            }),
        );
        (name, stmt)
    }

    #[test]
    fn test_unreferenced_functions_are_removed() {
        let mut program = JsProgram::new();
        let (leaf, leaf_decl) = function(&mut program, "leaf", vec![]);
        let call_leaf = JsExpression::invoke(info(), JsExpression::name_ref(info(), leaf), vec![]);
        let (used, used_decl) = function(&mut program, "used", vec![call_leaf.make_stmt()]);
        let (_, dead_decl) = function(&mut program, "dead", vec![]);
        program.global_block = vec![
            leaf_decl,
            used_decl,
            dead_decl,
            JsExpression::invoke(info(), JsExpression::name_ref(info(), used), vec![]).make_stmt(),
        ];

        assert!(remove_unused_functions(&mut program));
        assert_eq!(program.global_block.len(), 3);
        assert!(!remove_unused_functions(&mut program));
    }
}
