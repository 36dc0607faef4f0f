//! Hoisting of repeated literals into top-level variables
//!
//! A literal is internable when it is long enough to be worth a variable:
//! strings of three or more printed characters, numbers of four or more,
//! and non-empty array or object literals made only of literals. Every
//! internable literal seen at least twice becomes `$intern_N`, declared in a
//! single `var` at the head of the program in first-occurrence order.
//! Object literal keys are never interned.

use crate::js::ast::{JsExpression, JsExpressionKind, JsProgram, JsStatement, JsStatementKind, JsVar};
use crate::js::scope::{NameId, StaticRef};
use crate::js::source_gen::{format_number, quote_string, JsSourceGenerator, TextOutput};
use crate::js::visitor::{accept_expr, accept_stmts, walk_expr, walk_stmts, JsModVisitor, JsVisitor};
use crate::source_info::SourceInfo;
use indexmap::IndexMap;
use rustc_hash::FxHashMap;

const MIN_STRING_LENGTH: usize = 3;
const MIN_NUMBER_LENGTH: usize = 4;
const MIN_OCCURRENCES: usize = 2;

/// Identity of an internable literal, `None` when it is not internable
fn intern_key(program: &JsProgram, expr: &JsExpression) -> Option<String> {
    match &expr.kind {
        JsExpressionKind::String(s) => {
            let quoted = quote_string(s);
            (quoted.len() >= MIN_STRING_LENGTH).then(|| format!("s{}", quoted))
        }
        JsExpressionKind::Number(n) => {
            let printed = format_number(*n);
            (printed.len() >= MIN_NUMBER_LENGTH).then(|| format!("n{}", printed))
        }
        JsExpressionKind::ArrayLiteral(elements) => {
            (!elements.is_empty() && elements.iter().all(JsExpression::is_literal))
                .then(|| format!("a{}", JsSourceGenerator::render_expr(program, expr, TextOutput::Minified)))
        }
        JsExpressionKind::ObjectLiteral(props) => {
            (!props.is_empty() && props.iter().all(|p| p.value.is_literal()))
                .then(|| format!("o{}", JsSourceGenerator::render_expr(program, expr, TextOutput::Minified)))
        }
        _ => None,
    }
}

struct Occurrences<'a> {
    program: &'a JsProgram,
    /// Count and first occurrence, by key in first-occurrence order
    seen: IndexMap<String, (usize, JsExpression)>,
}

impl JsVisitor for Occurrences<'_> {
    fn visit_expr(&mut self, expr: &JsExpression) -> bool {
        if let Some(key) = intern_key(self.program, expr) {
            self.seen.entry(key).or_insert_with(|| (0, expr.clone())).0 += 1;
            return false;
        }
        if let JsExpressionKind::ObjectLiteral(props) = &expr.kind {
            for prop in props {
                walk_expr(self, &prop.value);
            }
            return false;
        }
        true
    }
}

struct Substitute<'a> {
    program: &'a JsProgram,
    interned: &'a FxHashMap<String, NameId>,
}

impl JsModVisitor for Substitute<'_> {
    fn visit_expr(&mut self, expr: &mut JsExpression) -> bool {
        if let Some(key) = intern_key(self.program, expr) {
            if let Some(name) = self.interned.get(&key) {
                *expr = JsExpression::name_ref(expr.info.clone(), *name);
            }
            return false;
        }
        if let JsExpressionKind::ObjectLiteral(props) = &mut expr.kind {
            for prop in props {
                accept_expr(self, &mut prop.value);
            }
            return false;
        }
        true
    }
}

/// Intern repeated literals, returning whether anything was hoisted
pub fn intern_literals(program: &mut JsProgram) -> bool {
    let mut block = std::mem::take(&mut program.global_block);
    let candidates: Vec<(String, JsExpression)> = {
        let mut occurrences = Occurrences {
            program,
            seen: IndexMap::new(),
        };
        walk_stmts(&mut occurrences, &block);
        occurrences
            .seen
            .into_iter()
            .filter(|(_, (count, _))| *count >= MIN_OCCURRENCES)
            .map(|(key, (_, literal))| (key, literal))
            .collect()
    };
    if candidates.is_empty() {
        program.global_block = block;
        return false;
    }

    let top = program.top_scope;
    let mut interned: FxHashMap<String, NameId> = FxHashMap::default();
    let mut vars = Vec::with_capacity(candidates.len());
    for (index, (key, literal)) in candidates.into_iter().enumerate() {
        let ident = format!("$intern_{}", index);
        let name = program.fresh_name(top, &ident, &ident);
        program.set_static_ref(name, StaticRef::Var);
        interned.insert(key, name);
        vars.push(JsVar {
            info: literal.info.clone(),
            name,
            init: Some(literal),
        });
    }

    let mut substitute = Substitute {
        program,
        interned: &interned,
    };
    accept_stmts(&mut substitute, &mut block);
    tracing::debug!(interned = vars.len(), "interned js literals");

    block.insert(
        0,
        JsStatement::new(SourceInfo::unknown(), JsStatementKind::Vars(vars)),
    );
    program.global_block = block;
    true
}
