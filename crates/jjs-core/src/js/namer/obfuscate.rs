//! Shortest-identifier naming
//!
//! Scopes are named in pre-order. Each scope draws idents from a counter that
//! starts where its parent's counter ended, so a nested name can never
//! shadow an enclosing one while sibling scopes reuse the same short names.

use super::{scope_texts, unnamed, unobfuscatable_texts};
use crate::js::ast::JsProgram;
use crate::js::scope::{is_reserved, ScopeId};
use rustc_hash::FxHashMap;

const FIRST_CHARS: &[u8] = b"abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ_$";
const REST_CHARS: &[u8] = b"abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ_$0123456789";

/// The `index`-th identifier in the obfuscated sequence: `a`..`$`, `aa`, `ba`, ...
pub fn obfuscated_ident(index: usize) -> String {
    let mut out = String::new();
    out.push(FIRST_CHARS[index % FIRST_CHARS.len()] as char);
    let mut rest = index / FIRST_CHARS.len();
    while rest > 0 {
        rest -= 1;
        out.push(REST_CHARS[rest % REST_CHARS.len()] as char);
        rest /= REST_CHARS.len();
    }
    out
}

#[derive(Debug, Default)]
pub struct JsObfuscateNamer {
    end_counters: FxHashMap<ScopeId, usize>,
}

impl JsObfuscateNamer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn exec(&mut self, program: &mut JsProgram) {
        let unobfuscatable = unobfuscatable_texts(program);
        let root = program.root_scope;
        let mut assigned = 0usize;
        for scope in program.scope_tree(root) {
            let mut counter = program.scopes[scope]
                .parent
                .and_then(|p| self.end_counters.get(&p).copied())
                .unwrap_or(0);
            let mut taken = scope_texts(program, scope);
            for name in unnamed(program, scope) {
                let text = loop {
                    let candidate = obfuscated_ident(counter);
                    counter += 1;
                    if !is_reserved(&candidate) && !unobfuscatable.contains(&candidate) && !taken.contains(&candidate) {
                        break candidate;
                    }
                };
                taken.insert(text.clone());
                program.names[name].text = Some(text);
                assigned += 1;
            }
            self.end_counters.insert(scope, counter);
        }
        tracing::debug!(assigned, "obfuscated names assigned");
    }
}
