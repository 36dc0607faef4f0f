//! Removal of structurally identical top-level functions
//!
//! Two functions are duplicates when their bodies match node for node, with
//! parameters and locals compared by position. References to a later
//! duplicate are redirected to the first one and the later declaration is
//! dropped.

use crate::errors::CompilationError;
use crate::fixpoint::OptimizationPass;
use crate::js::ast::{JsExpression, JsExpressionKind, JsFunction, JsProgram, JsStatement, JsStatementKind};
use crate::js::scope::{NameId, ScopeId, StaticRef};
use crate::js::visitor::{accept_stmts, walk_stmts, JsModVisitor, JsVisitor};
use rustc_hash::{FxHashMap, FxHashSet};

pub struct JsDuplicateFunctionRemover;

impl OptimizationPass<JsProgram> for JsDuplicateFunctionRemover {
    fn name(&self) -> &'static str {
        "js-duplicate-function-remover"
    }

    fn run(&mut self, program: &mut JsProgram) -> Result<bool, CompilationError> {
        Ok(remove_duplicate_functions(program))
    }
}

/// Structural key of a function body
struct Fingerprint<'a> {
    program: &'a JsProgram,
    scope: ScopeId,
    locals: FxHashMap<NameId, usize>,
    out: String,
}

impl Fingerprint<'_> {
    fn name(&mut self, name: NameId) {
        if self.program.names[name].scope == self.scope {
            let next = self.locals.len();
            let local = *self.locals.entry(name).or_insert(next);
            self.out.push_str(&format!("L{} ", local));
        } else {
            self.out.push_str(&format!("N{} ", name.index()));
        }
    }

    fn tag(&mut self, tag: &str) {
        self.out.push_str(tag);
        self.out.push(' ');
    }
}

impl JsVisitor for Fingerprint<'_> {
    fn visit_function(&mut self, function: &JsFunction) -> bool {
        self.tag(&format!("fn{}/{}", function.params.len(), function.body.len()));
        if let Some(name) = function.name {
            self.name(name);
        }
        for param in &function.params {
            self.name(*param);
        }
        true
    }

    fn visit_stmt(&mut self, stmt: &JsStatement) -> bool {
        let tag = match &stmt.kind {
            JsStatementKind::Block(stmts) => format!("blk{}", stmts.len()),
            JsStatementKind::Expression(_) => "exp".to_string(),
            JsStatementKind::Vars(vars) => {
                let shape: String = vars.iter().map(|v| if v.init.is_some() { '=' } else { '_' }).collect();
                self.tag(&format!("var{}", shape));
                for var in vars {
                    self.name(var.name);
                }
                return true;
            }
            JsStatementKind::Function(_) => "decl".to_string(),
            JsStatementKind::If { else_stmt, .. } => format!("if{}", else_stmt.is_some()),
            JsStatementKind::While { .. } => "while".to_string(),
            JsStatementKind::DoWhile { .. } => "do".to_string(),
            JsStatementKind::For { init, cond, incr, .. } => {
                format!("for{}{}{}", init.is_some(), cond.is_some(), incr.is_some())
            }
            JsStatementKind::Return(value) => format!("ret{}", value.is_some()),
            JsStatementKind::Throw(_) => "throw".to_string(),
            JsStatementKind::Break(label) | JsStatementKind::Continue(label) => {
                let keyword = if matches!(stmt.kind, JsStatementKind::Break(_)) { "brk" } else { "cont" };
                self.tag(keyword);
                if let Some(label) = label {
                    self.name(*label);
                }
                return true;
            }
            JsStatementKind::Label { label, .. } => {
                self.tag("label");
                self.name(*label);
                return true;
            }
            JsStatementKind::Try { block, catch, finally } => {
                self.tag(&format!(
                    "try{}/{}/{}",
                    block.len(),
                    catch.as_ref().map_or(0, |c| c.body.len() + 1),
                    finally.as_ref().map_or(0, |f| f.len() + 1)
                ));
                if let Some(catch) = catch {
                    self.name(catch.param);
                }
                return true;
            }
            JsStatementKind::Switch { cases, .. } => {
                let shape: Vec<String> = cases
                    .iter()
                    .map(|c| format!("{}{}", if c.label.is_some() { 'c' } else { 'd' }, c.body.len()))
                    .collect();
                format!("switch{}", shape.join(","))
            }
            JsStatementKind::Empty => "empty".to_string(),
            JsStatementKind::Verbatim(text) => format!("native{:?}", text),
        };
        self.tag(&tag);
        true
    }

    fn visit_expr(&mut self, expr: &JsExpression) -> bool {
        let tag = match &expr.kind {
            JsExpressionKind::NameRef { qualifier, name } => {
                self.tag(if qualifier.is_some() { "qref" } else { "ref" });
                self.name(*name);
                return true;
            }
            JsExpressionKind::ArrayAccess { .. } => "idx".to_string(),
            JsExpressionKind::Invocation { args, .. } => format!("call{}", args.len()),
            JsExpressionKind::New { args, .. } => format!("new{}", args.len()),
            JsExpressionKind::Binary { op, .. } => format!("bin{}", op.symbol()),
            JsExpressionKind::Prefix { op, .. } => format!("pre{}", op.symbol()),
            JsExpressionKind::Postfix { op, .. } => format!("post{}", op.symbol()),
            JsExpressionKind::Conditional { .. } => "cond".to_string(),
            JsExpressionKind::Function(_) => "fnexpr".to_string(),
            JsExpressionKind::Number(n) => format!("num{}", n.to_bits()),
            JsExpressionKind::String(s) => format!("str{:?}", s),
            JsExpressionKind::Boolean(b) => format!("bool{}", b),
            JsExpressionKind::Null => "null".to_string(),
            JsExpressionKind::This => "this".to_string(),
            JsExpressionKind::ArrayLiteral(elements) => format!("arr{}", elements.len()),
            JsExpressionKind::ObjectLiteral(props) => format!("obj{}", props.len()),
        };
        self.tag(&tag);
        true
    }
}

fn fingerprint(program: &JsProgram, function: &JsFunction) -> String {
    let has_native = function
        .body
        .iter()
        .any(|s| matches!(s.kind, JsStatementKind::Verbatim(_)));
    let mut print = Fingerprint {
        program,
        scope: function.scope,
        locals: FxHashMap::default(),
        out: format!("p{} ", function.params.len()),
    };
    if has_native {
        // native text refers to parameters by their declared identifiers
        for param in &function.params {
            print.out.push_str(&program.names[*param].ident);
            print.out.push(' ');
        }
    }
    for param in &function.params {
        print.name(*param);
    }
    walk_stmts(&mut print, &function.body);
    print.out
}

struct Redirect<'a> {
    replacements: &'a FxHashMap<NameId, NameId>,
}

impl JsModVisitor for Redirect<'_> {
    fn end_visit_expr(&mut self, expr: &mut JsExpression) {
        if let JsExpressionKind::NameRef { qualifier: None, name } = &mut expr.kind {
            if let Some(original) = self.replacements.get(name) {
                *name = *original;
            }
        }
    }
}

pub fn remove_duplicate_functions(program: &mut JsProgram) -> bool {
    let mut first_by_key: FxHashMap<String, NameId> = FxHashMap::default();
    let mut replacements: FxHashMap<NameId, NameId> = FxHashMap::default();
    for stmt in &program.global_block {
        let JsStatementKind::Function(function) = &stmt.kind else {
            continue;
        };
        let Some(name) = function.name else {
            continue;
        };
        if program.names[name].static_ref != Some(StaticRef::Function) {
            continue;
        }
        let key = fingerprint(program, function);
        match first_by_key.get(&key) {
            Some(original) => {
                replacements.insert(name, *original);
            }
            None => {
                first_by_key.insert(key, name);
            }
        }
    }
    if replacements.is_empty() {
        return false;
    }

    let duplicates: FxHashSet<NameId> = replacements.keys().copied().collect();
    program.global_block.retain(|stmt| match &stmt.kind {
        JsStatementKind::Function(function) => !function.name.is_some_and(|n| duplicates.contains(&n)),
        _ => true,
    });
    let mut redirect = Redirect {
        replacements: &replacements,
    };
    accept_stmts(&mut redirect, &mut program.global_block);
    tracing::debug!(removed = duplicates.len(), "removed duplicate js functions");
    true
}
