//! Choosing the printed text of every output name
//!
//! A namer assigns `text` to every name that does not have one yet. All three
//! strategies keep the same guarantees, which [`check_names`] verifies:
//! texts are unique within a scope, no name shadows a name of an enclosing
//! scope, and generated texts are never reserved words, host globals or the
//! text of any unobfuscatable name.

pub mod obfuscate;
pub mod pretty;
pub mod verbose;

pub use obfuscate::JsObfuscateNamer;
pub use pretty::JsPrettyNamer;
pub use verbose::JsVerboseNamer;

use crate::config::{JsOutputOption, NameDenylist};
use crate::errors::{InternalCompilerError, VisitResult};
use crate::js::ast::JsProgram;
use crate::js::optimize::intern_literals;
use crate::js::scope::{is_reserved, is_valid_ident, NameId, ScopeId, ScopeKind};
use rustc_hash::FxHashSet;

/// Texts of every name whose text is fixed, in any scope
pub(crate) fn unobfuscatable_texts(program: &JsProgram) -> FxHashSet<String> {
    program
        .names
        .iter()
        .filter(|(_, name)| !name.obfuscatable)
        .filter_map(|(_, name)| name.text.clone())
        .collect()
}

/// Texts already taken in `scope` itself
pub(crate) fn scope_texts(program: &JsProgram, scope: ScopeId) -> FxHashSet<String> {
    program.scopes[scope]
        .names
        .values()
        .filter_map(|n| program.names[*n].text.clone())
        .collect()
}

/// Names of `scope` still waiting for a text
pub(crate) fn unnamed(program: &JsProgram, scope: ScopeId) -> Vec<NameId> {
    program.scopes[scope]
        .names
        .values()
        .copied()
        .filter(|n| program.names[*n].text.is_none())
        .collect()
}

/// Turn an arbitrary identifier into a valid ASCII one
pub(crate) fn sanitize(ident: &str) -> String {
    let mut out: String = ident
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '_' || c == '$' { c } else { '_' })
        .collect();
    if out.is_empty() || out.starts_with(|c: char| c.is_ascii_digit()) {
        out.insert(0, '_');
    }
    out
}

/// Numbered candidates tried past every text that could block them before
/// the denylist is taken to reject every `base_N`
const MAX_DENIED_CANDIDATES: usize = 10_000;

/// Readable naming shared by the pretty and verbose namers: `base`, then
/// `base_0`, `base_1`, ... until the text is free
pub(crate) fn name_readably<F>(program: &mut JsProgram, base_of: F, denylist: Option<&NameDenylist>) -> VisitResult
where
    F: Fn(&crate::js::scope::JsName) -> String,
{
    let unobfuscatable = unobfuscatable_texts(program);
    let denied_exact = denylist.map_or(0, |d| d.exact.len());
    let root = program.root_scope;
    for scope in program.scope_tree(root) {
        let pending = unnamed(program, scope);
        if pending.is_empty() {
            continue;
        }
        let mut taken: FxHashSet<String> = program
            .ancestor_texts(scope)
            .into_iter()
            .map(str::to_string)
            .collect();
        taken.extend(scope_texts(program, scope));

        for name in pending {
            let base = sanitize(&base_of(&program.names[name]));
            let free = |candidate: &str| {
                !taken.contains(candidate)
                    && !unobfuscatable.contains(candidate)
                    && !is_reserved(candidate)
                    && !denylist.is_some_and(|d| d.is_denied(candidate))
            };
            let limit = taken.len() + unobfuscatable.len() + denied_exact + MAX_DENIED_CANDIDATES;
            let mut candidate = base.clone();
            let mut counter = 0usize;
            while !free(&candidate) {
                if counter == limit {
                    return Err(InternalCompilerError::new(format!(
                        "no usable name for '{}': the denylist rejects '{}' and every numbered variant up to '{}'",
                        program.names[name].ident, base, candidate
                    )));
                }
                candidate = format!("{}_{}", base, counter);
                counter += 1;
            }
            taken.insert(candidate.clone());
            program.names[name].text = Some(candidate);
        }
    }
    Ok(())
}

/// Verify the naming guarantees over the whole program
pub fn check_names(program: &JsProgram) -> VisitResult {
    let unobfuscatable = unobfuscatable_texts(program);
    for scope in program.scope_tree(program.root_scope) {
        if program.scopes[scope].kind == ScopeKind::Root {
            continue;
        }
        let ancestors: FxHashSet<&str> = program.ancestor_texts(scope).into_iter().collect();
        let mut seen: FxHashSet<&str> = FxHashSet::default();
        for name in program.scopes[scope].names.values() {
            let js_name = &program.names[*name];
            let Some(text) = js_name.text.as_deref() else {
                return Err(InternalCompilerError::new(format!(
                    "name '{}' in scope '{}' was never assigned a text",
                    js_name.ident, program.scopes[scope].description
                )));
            };
            if !seen.insert(text) {
                return Err(InternalCompilerError::new(format!(
                    "text '{}' is used twice in scope '{}'",
                    text, program.scopes[scope].description
                )));
            }
            if !js_name.obfuscatable {
                continue;
            }
            if ancestors.contains(text) {
                return Err(InternalCompilerError::new(format!(
                    "'{}' in scope '{}' shadows an enclosing name",
                    text, program.scopes[scope].description
                )));
            }
            if is_reserved(text) || unobfuscatable.contains(text) || !is_valid_ident(text) {
                return Err(InternalCompilerError::new(format!("'{}' is not a usable identifier", text)));
            }
        }
    }
    Ok(())
}

/// Intern literals where the output mode asks for it, then name everything
pub fn name_program(program: &mut JsProgram, output: JsOutputOption, denylist: &NameDenylist) -> VisitResult {
    match output {
        JsOutputOption::Obfuscated => {
            intern_literals(program);
            JsObfuscateNamer::new().exec(program);
        }
        JsOutputOption::Pretty => JsPrettyNamer::new(denylist.clone()).exec(program)?,
        JsOutputOption::Detailed => {
            intern_literals(program);
            JsVerboseNamer.exec(program)?;
        }
    }
    check_names(program)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize() {
        assert_eq!(sanitize("java.lang.Object"), "java_lang_Object");
        assert_eq!(sanitize("1st"), "_1st");
        assert_eq!(sanitize(""), "_");
        assert_eq!(sanitize("$clinit"), "$clinit");
    }

    #[test]
    fn test_check_names_rejects_shadowing() {
        let mut program = JsProgram::new();
        let top = program.top_scope;
        let outer = program.declare_name(top, "outer", "outer");
        let inner_scope = program.new_scope(top, ScopeKind::Function, "f");
        let inner = program.declare_name(inner_scope, "inner", "inner");
        program.names[outer].text = Some("a".to_string());
        program.names[inner].text = Some("a".to_string());
        let error = check_names(&program).unwrap_err();
        assert!(error.message().contains("shadows"));

        program.names[inner].text = Some("b".to_string());
        assert!(check_names(&program).is_ok());
    }

    #[test]
    fn test_check_names_requires_text() {
        let mut program = JsProgram::new();
        let top = program.top_scope;
        program.declare_name(top, "pending", "pending");
        assert!(check_names(&program).is_err());
    }

    #[test]
    fn test_name_program_reports_exhausted_denylist() {
        let mut program = JsProgram::new();
        let top = program.top_scope;
        program.declare_name(top, "app_Main_foo", "foo");
        let denylist = NameDenylist {
            exact: vec!["foo".to_string()],
            suffixes: (0..10).map(|d| d.to_string()).collect(),
        };
        let error = name_program(&mut program, JsOutputOption::Pretty, &denylist).unwrap_err();
        assert!(error.message().contains("rejects 'foo'"), "{}", error);
    }
}
