//! Printing the output AST as JavaScript text
//!
//! Parenthesization is driven purely by operator precedence. Token
//! separation is automatic: a space is only inserted where two tokens would
//! otherwise merge (`return x`, `a- -1`), so the same printer serves both
//! the minified and the pretty layout.

use crate::js::ast::{
    JsBinaryOp, JsCase, JsExpression, JsExpressionKind, JsFunction, JsProgram, JsStatement, JsStatementKind,
    PRECEDENCE_CALL, PRECEDENCE_CONDITIONAL, PRECEDENCE_PREFIX,
};
use crate::js::scope::{is_valid_ident, NameId, RESERVED_WORDS};
use crate::source_info::SourceInfo;
use serde::Serialize;

/// Layout of the printed text
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum TextOutput {
    /// No optional whitespace; one line per global statement
    #[default]
    Minified,
    /// Indented, one statement per line, spaces around operators
    Pretty,
}

/// The output span of one printed function or statement
#[derive(Debug, Clone, Serialize)]
pub struct SourceRange {
    /// Byte offset of the first character
    pub start: usize,
    /// Byte offset one past the last character
    pub end: usize,
    /// Zero-based line of `start`
    pub line: usize,
    /// Zero-based column of `start`, in characters
    pub column: usize,
    /// Number of enclosing ranges
    pub depth: usize,
    pub info: SourceInfo,
}

/// Ranges in emission order
#[derive(Debug, Clone, Default, Serialize)]
pub struct SourceRangeMap {
    ranges: Vec<SourceRange>,
}

impl SourceRangeMap {
    pub fn ranges(&self) -> &[SourceRange] {
        &self.ranges
    }

    pub fn len(&self) -> usize {
        self.ranges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ranges.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &SourceRange> {
        self.ranges.iter()
    }

    pub fn get(&self, ordinal: usize) -> Option<&SourceRange> {
        self.ranges.get(ordinal)
    }
}

#[derive(Debug, Clone)]
pub struct GeneratedSource {
    pub js: String,
    pub ranges: Option<SourceRangeMap>,
}

pub struct JsSourceGenerator<'a> {
    program: &'a JsProgram,
    policy: TextOutput,
    output: String,
    indent_level: usize,
    indent_str: &'static str,
    at_line_start: bool,
    line: usize,
    column: usize,
    record_ranges: bool,
    ranges: Vec<SourceRange>,
    depth: usize,
}

impl<'a> JsSourceGenerator<'a> {
    pub fn new(program: &'a JsProgram, policy: TextOutput) -> Self {
        Self {
            program,
            policy,
            output: String::new(),
            indent_level: 0,
            indent_str: "  ",
            at_line_start: true,
            line: 0,
            column: 0,
            record_ranges: false,
            ranges: Vec::new(),
            depth: 0,
        }
    }

    /// Record a [`SourceRange`] for every function and statement printed
    pub fn with_ranges(mut self, record: bool) -> Self {
        self.record_ranges = record;
        self
    }

    pub fn generate(mut self) -> GeneratedSource {
        let program = self.program;
        for stmt in &program.global_block {
            self.print_stmt(stmt);
            self.hard_newline();
        }
        tracing::debug!(
            bytes = self.output.len(),
            ranges = self.ranges.len(),
            policy = ?self.policy,
            "emitted javascript"
        );
        GeneratedSource {
            js: self.output,
            ranges: self.record_ranges.then_some(SourceRangeMap { ranges: self.ranges }),
        }
    }

    /// Render one statement on its own
    pub fn render_stmt(program: &JsProgram, stmt: &JsStatement, policy: TextOutput) -> String {
        let mut generator = JsSourceGenerator::new(program, policy);
        generator.print_stmt(stmt);
        generator.output
    }

    /// Render one expression on its own
    pub fn render_expr(program: &JsProgram, expr: &JsExpression, policy: TextOutput) -> String {
        let mut generator = JsSourceGenerator::new(program, policy);
        generator.print_expr(expr, 0);
        generator.output
    }

    fn is_pretty(&self) -> bool {
        self.policy == TextOutput::Pretty
    }

    fn push(&mut self, text: &str) {
        for ch in text.chars() {
            if ch == '\n' {
                self.line += 1;
                self.column = 0;
            } else {
                self.column += 1;
            }
        }
        self.output.push_str(text);
    }

    fn flush_indent(&mut self) {
        if self.at_line_start {
            self.at_line_start = false;
            if self.is_pretty() {
                let indent = self.indent_str.repeat(self.indent_level);
                self.push(&indent);
            }
        }
    }

    fn write(&mut self, text: &str) {
        let Some(first) = text.chars().next() else {
            return;
        };
        if self.at_line_start {
            self.flush_indent();
        } else if let Some(last) = self.output.chars().next_back() {
            if needs_separator(last, first) {
                self.push(" ");
            }
        }
        self.push(text);
    }

    fn space(&mut self) {
        if self.is_pretty() && !self.at_line_start {
            self.push(" ");
        }
    }

    fn newline(&mut self) {
        if self.is_pretty() {
            self.hard_newline();
        }
    }

    fn hard_newline(&mut self) {
        self.push("\n");
        self.at_line_start = true;
    }

    fn begin_range(&mut self, info: &SourceInfo) -> Option<usize> {
        if !self.record_ranges {
            return None;
        }
        self.flush_indent();
        let ordinal = self.ranges.len();
        self.ranges.push(SourceRange {
            start: self.output.len(),
            end: self.output.len(),
            line: self.line,
            column: self.column,
            depth: self.depth,
            info: info.clone(),
        });
        self.depth += 1;
        Some(ordinal)
    }

    fn end_range(&mut self, ordinal: Option<usize>) {
        let Some(ordinal) = ordinal else {
            return;
        };
        self.depth = self.depth.saturating_sub(1);
        let end = self.output.len();
        if let Some(range) = self.ranges.get_mut(ordinal) {
            range.end = end;
        }
    }

    fn name(&mut self, name: NameId) {
        let program = self.program;
        self.write(program.name_text(name));
    }

    fn print_block(&mut self, stmts: &[JsStatement]) {
        if stmts.is_empty() {
            self.write("{}");
            return;
        }
        self.write("{");
        self.indent_level += 1;
        self.newline();
        for stmt in stmts {
            self.print_stmt(stmt);
            self.newline();
        }
        self.indent_level -= 1;
        self.write("}");
    }

    /// Body of a compound statement
    fn print_body(&mut self, body: &JsStatement) {
        if let JsStatementKind::Block(stmts) = &body.kind {
            self.space();
            self.print_block(stmts);
        } else if self.is_pretty() {
            self.indent_level += 1;
            self.newline();
            self.print_stmt(body);
            self.indent_level -= 1;
        } else {
            self.print_stmt(body);
        }
    }

    /// Separator between the end of a body and a trailing keyword
    fn after_body(&mut self, body: &JsStatement) {
        if matches!(body.kind, JsStatementKind::Block(_)) {
            self.space();
        } else {
            self.newline();
        }
    }

    fn print_paren_expr(&mut self, expr: &JsExpression) {
        self.write("(");
        self.print_expr(expr, 0);
        self.write(")");
    }

    pub fn print_stmt(&mut self, stmt: &JsStatement) {
        let range = self.begin_range(&stmt.info);
        match &stmt.kind {
            JsStatementKind::Block(stmts) => self.print_block(stmts),
            JsStatementKind::Expression(expr) => {
                if starts_with_function_or_object(expr) {
                    self.print_paren_expr(expr);
                } else {
                    self.print_expr(expr, 0);
                }
                self.write(";");
            }
            JsStatementKind::Vars(vars) => {
                self.write("var");
                for (i, var) in vars.iter().enumerate() {
                    if i > 0 {
                        self.write(",");
                        self.space();
                    } else {
                        self.push(" ");
                    }
                    self.name(var.name);
                    if let Some(init) = &var.init {
                        self.space();
                        self.write("=");
                        self.space();
                        self.print_expr(init, 2);
                    }
                }
                self.write(";");
            }
            JsStatementKind::Function(function) => self.print_function(function),
            JsStatementKind::If {
                cond,
                then_stmt,
                else_stmt,
            } => {
                self.write("if");
                self.space();
                self.print_paren_expr(cond);
                let dangling = else_stmt.is_some() && matches!(then_stmt.kind, JsStatementKind::If { .. });
                if dangling {
                    self.space();
                    self.print_block(std::slice::from_ref(then_stmt.as_ref()));
                    self.space();
                } else {
                    self.print_body(then_stmt);
                    if else_stmt.is_some() {
                        self.after_body(then_stmt);
                    }
                }
                if let Some(else_stmt) = else_stmt {
                    self.write("else");
                    if matches!(else_stmt.kind, JsStatementKind::If { .. }) {
                        self.push(" ");
                        self.print_stmt(else_stmt);
                    } else {
                        self.print_body(else_stmt);
                    }
                }
            }
            JsStatementKind::While { cond, body } => {
                self.write("while");
                self.space();
                self.print_paren_expr(cond);
                self.print_body(body);
            }
            JsStatementKind::DoWhile { body, cond } => {
                self.write("do");
                self.print_body(body);
                self.after_body(body);
                self.write("while");
                self.space();
                self.print_paren_expr(cond);
                self.write(";");
            }
            JsStatementKind::For { init, cond, incr, body } => {
                self.write("for");
                self.space();
                self.write("(");
                if let Some(init) = init {
                    self.print_for_init(init);
                }
                self.write(";");
                if let Some(cond) = cond {
                    self.space();
                    self.print_expr(cond, 0);
                }
                self.write(";");
                if let Some(incr) = incr {
                    self.space();
                    self.print_expr(incr, 0);
                }
                self.write(")");
                self.print_body(body);
            }
            JsStatementKind::Return(value) => {
                self.write("return");
                if let Some(value) = value {
                    self.space();
                    self.print_expr(value, 0);
                }
                self.write(";");
            }
            JsStatementKind::Throw(value) => {
                self.write("throw");
                self.space();
                self.print_expr(value, 0);
                self.write(";");
            }
            JsStatementKind::Break(label) => {
                self.write("break");
                if let Some(label) = label {
                    self.name(*label);
                }
                self.write(";");
            }
            JsStatementKind::Continue(label) => {
                self.write("continue");
                if let Some(label) = label {
                    self.name(*label);
                }
                self.write(";");
            }
            JsStatementKind::Label { label, body } => {
                self.name(*label);
                self.write(":");
                self.space();
                self.print_stmt(body);
            }
            JsStatementKind::Try { block, catch, finally } => {
                self.write("try");
                self.space();
                self.print_block(block);
                if let Some(catch) = catch {
                    self.space();
                    self.write("catch");
                    self.space();
                    self.write("(");
                    self.name(catch.param);
                    self.write(")");
                    self.space();
                    self.print_block(&catch.body);
                }
                if let Some(finally) = finally {
                    self.space();
                    self.write("finally");
                    self.space();
                    self.print_block(finally);
                }
            }
            JsStatementKind::Switch { expr, cases } => {
                self.write("switch");
                self.space();
                self.print_paren_expr(expr);
                self.space();
                self.write("{");
                self.indent_level += 1;
                self.newline();
                for case in cases {
                    self.print_case(case);
                }
                self.indent_level -= 1;
                self.write("}");
            }
            JsStatementKind::Empty => self.write(";"),
            JsStatementKind::Verbatim(text) => self.write(text),
        }
        self.end_range(range);
    }

    fn print_case(&mut self, case: &JsCase) {
        match &case.label {
            Some(label) => {
                self.write("case");
                self.space();
                self.print_expr(label, 0);
            }
            None => self.write("default"),
        }
        self.write(":");
        self.indent_level += 1;
        self.newline();
        for stmt in &case.body {
            self.print_stmt(stmt);
            self.newline();
        }
        self.indent_level -= 1;
    }

    fn print_for_init(&mut self, init: &JsStatement) {
        match &init.kind {
            JsStatementKind::Vars(vars) => {
                self.write("var");
                self.push(" ");
                for (i, var) in vars.iter().enumerate() {
                    if i > 0 {
                        self.write(",");
                        self.space();
                    }
                    self.name(var.name);
                    if let Some(value) = &var.init {
                        self.space();
                        self.write("=");
                        self.space();
                        self.print_expr(value, 2);
                    }
                }
            }
            JsStatementKind::Expression(expr) => self.print_expr(expr, 0),
            _ => {}
        }
    }

    fn print_function(&mut self, function: &JsFunction) {
        let range = self.begin_range(&function.info);
        self.write("function");
        if let Some(name) = function.name {
            self.name(name);
        }
        self.write("(");
        for (i, param) in function.params.iter().enumerate() {
            if i > 0 {
                self.write(",");
                self.space();
            }
            self.name(*param);
        }
        self.write(")");
        self.space();
        self.print_block(&function.body);
        self.end_range(range);
    }

    fn print_args(&mut self, args: &[JsExpression]) {
        self.write("(");
        for (i, arg) in args.iter().enumerate() {
            if i > 0 {
                self.write(",");
                self.space();
            }
            self.print_expr(arg, 2);
        }
        self.write(")");
    }

    /// Print `expr`, parenthesized if it binds looser than `min_precedence`
    pub fn print_expr(&mut self, expr: &JsExpression, min_precedence: u8) {
        let parens = expr.precedence() < min_precedence;
        if parens {
            self.write("(");
        }
        match &expr.kind {
            JsExpressionKind::NameRef { qualifier, name } => {
                if let Some(qualifier) = qualifier {
                    if matches!(qualifier.kind, JsExpressionKind::Number(_)) {
                        self.print_paren_expr(qualifier);
                    } else {
                        self.print_expr(qualifier, PRECEDENCE_CALL);
                    }
                    self.write(".");
                }
                self.name(*name);
            }
            JsExpressionKind::ArrayAccess { array, index } => {
                self.print_expr(array, PRECEDENCE_CALL);
                self.write("[");
                self.print_expr(index, 0);
                self.write("]");
            }
            JsExpressionKind::Invocation { target, args } => {
                self.print_expr(target, PRECEDENCE_CALL);
                self.print_args(args);
            }
            JsExpressionKind::New { ctor, args } => {
                self.write("new");
                if contains_call(ctor) {
                    self.print_paren_expr(ctor);
                } else {
                    self.print_expr(ctor, PRECEDENCE_CALL);
                }
                self.print_args(args);
            }
            JsExpressionKind::Binary { op, lhs, rhs } => {
                let precedence = op.precedence();
                let (left, right) = if op.is_right_associative() {
                    (precedence + 1, precedence)
                } else {
                    (precedence, precedence + 1)
                };
                self.print_expr(lhs, left);
                if *op == JsBinaryOp::Comma {
                    self.write(",");
                } else {
                    self.space();
                    self.write(op.symbol());
                }
                self.space();
                self.print_expr(rhs, right);
            }
            JsExpressionKind::Prefix { op, arg } => {
                self.write(op.symbol());
                self.print_expr(arg, PRECEDENCE_PREFIX);
            }
            JsExpressionKind::Postfix { op, arg } => {
                self.print_expr(arg, PRECEDENCE_CALL);
                self.write(op.symbol());
            }
            JsExpressionKind::Conditional {
                cond,
                then_expr,
                else_expr,
            } => {
                self.print_expr(cond, PRECEDENCE_CONDITIONAL + 1);
                self.space();
                self.write("?");
                self.space();
                self.print_expr(then_expr, 2);
                self.space();
                self.write(":");
                self.space();
                self.print_expr(else_expr, 2);
            }
            JsExpressionKind::Function(function) => self.print_function(function),
            JsExpressionKind::Number(value) => self.write(&format_number(*value)),
            JsExpressionKind::String(value) => self.write(&quote_string(value)),
            JsExpressionKind::Boolean(value) => self.write(if *value { "true" } else { "false" }),
            JsExpressionKind::Null => self.write("null"),
            JsExpressionKind::This => self.write("this"),
            JsExpressionKind::ArrayLiteral(elements) => {
                self.write("[");
                for (i, element) in elements.iter().enumerate() {
                    if i > 0 {
                        self.write(",");
                        self.space();
                    }
                    self.print_expr(element, 2);
                }
                self.write("]");
            }
            JsExpressionKind::ObjectLiteral(props) => {
                self.write("{");
                for (i, prop) in props.iter().enumerate() {
                    if i > 0 {
                        self.write(",");
                        self.space();
                    }
                    match &prop.key.kind {
                        JsExpressionKind::String(key) if is_valid_ident(key) && !RESERVED_WORDS.contains(&key.as_str()) => {
                            self.write(key)
                        }
                        _ => self.print_expr(&prop.key, 0),
                    }
                    self.write(":");
                    self.space();
                    self.print_expr(&prop.value, 2);
                }
                self.write("}");
            }
        }
        if parens {
            self.write(")");
        }
    }
}

/// Print the whole program without a range map
pub fn to_source(program: &JsProgram, policy: TextOutput) -> String {
    JsSourceGenerator::new(program, policy).generate().js
}

fn is_ident_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_' || c == '$'
}

fn needs_separator(last: char, first: char) -> bool {
    (is_ident_char(last) && is_ident_char(first)) || (last == '+' && first == '+') || (last == '-' && first == '-')
}

/// Whether the statement-leading token of `expr` would be `function` or `{`
fn starts_with_function_or_object(expr: &JsExpression) -> bool {
    match &expr.kind {
        JsExpressionKind::Function(_) | JsExpressionKind::ObjectLiteral(_) => true,
        JsExpressionKind::Binary { lhs, .. } => starts_with_function_or_object(lhs),
        JsExpressionKind::Invocation { target, .. } => starts_with_function_or_object(target),
        JsExpressionKind::ArrayAccess { array, .. } => starts_with_function_or_object(array),
        JsExpressionKind::NameRef {
            qualifier: Some(qualifier),
            ..
        } => starts_with_function_or_object(qualifier),
        JsExpressionKind::Postfix { arg, .. } => starts_with_function_or_object(arg),
        JsExpressionKind::Conditional { cond, .. } => starts_with_function_or_object(cond),
        _ => false,
    }
}

/// A call inside a `new` target would bind the argument list to itself
fn contains_call(expr: &JsExpression) -> bool {
    match &expr.kind {
        JsExpressionKind::Invocation { .. } => true,
        JsExpressionKind::NameRef {
            qualifier: Some(qualifier),
            ..
        } => contains_call(qualifier),
        JsExpressionKind::ArrayAccess { array, .. } => contains_call(array),
        _ => false,
    }
}

/// Format a number the way JavaScript's `Number.prototype.toString` does
pub fn format_number(value: f64) -> String {
    if value.is_nan() {
        return "NaN".to_string();
    }
    if value.is_infinite() {
        return if value > 0.0 { "Infinity" } else { "-Infinity" }.to_string();
    }
    if value == 0.0 {
        return "0".to_string();
    }
    let sign = if value < 0.0 { "-" } else { "" };
    // shortest round-trip digits, as d.ddde[-]x
    let scientific = format!("{:e}", value.abs());
    let (mantissa, exponent) = scientific.split_once('e').unwrap_or((&scientific, "0"));
    let exponent: i32 = exponent.parse().unwrap_or(0);
    let digits: String = mantissa.chars().filter(|c| *c != '.').collect();
    let k = digits.len() as i32;
    let n = exponent + 1;

    let body = if k <= n && n <= 21 {
        format!("{}{}", digits, "0".repeat((n - k) as usize))
    } else if 0 < n && n <= 21 {
        let (int, frac) = digits.split_at(n as usize);
        format!("{}.{}", int, frac)
    } else if -6 < n && n <= 0 {
        format!("0.{}{}", "0".repeat((-n) as usize), digits)
    } else {
        let e = n - 1;
        let e_sign = if e >= 0 { '+' } else { '-' };
        let (lead, rest) = digits.split_at(1);
        if rest.is_empty() {
            format!("{}e{}{}", lead, e_sign, e.abs())
        } else {
            format!("{}.{}e{}{}", lead, rest, e_sign, e.abs())
        }
    };
    format!("{}{}", sign, body)
}

/// Quote a string literal with whichever quote character needs fewer escapes
pub fn quote_string(value: &str) -> String {
    let doubles = value.matches('"').count();
    let singles = value.matches('\'').count();
    let quote = if doubles > singles { '\'' } else { '"' };

    let mut out = String::with_capacity(value.len() + 2);
    out.push(quote);
    for ch in value.chars() {
        match ch {
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            '\u{8}' => out.push_str("\\b"),
            '\u{c}' => out.push_str("\\f"),
            '\u{b}' => out.push_str("\\v"),
            '\u{2028}' => out.push_str("\\u2028"),
            '\u{2029}' => out.push_str("\\u2029"),
            c if c == quote => {
                out.push('\\');
                out.push(c);
            }
            c if (c as u32) < 0x20 || (0x7f..0xa0).contains(&(c as u32)) => {
                out.push_str(&format!("\\x{:02x}", c as u32));
            }
            c => out.push(c),
        }
    }
    out.push(quote);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::js::ast::{JsUnaryOp, JsVar};
    use crate::js::scope::ScopeKind;

    fn info() -> SourceInfo {
        SourceInfo::unknown()
    }

    fn num(value: f64) -> JsExpression {
        JsExpression::number(info(), value)
    }

    fn render(program: &JsProgram, expr: &JsExpression) -> String {
        JsSourceGenerator::render_expr(program, expr, TextOutput::Minified)
    }

    #[test]
    fn test_format_number() {
        assert_eq!(format_number(1.0), "1");
        assert_eq!(format_number(-0.0), "0");
        assert_eq!(format_number(0.5), "0.5");
        assert_eq!(format_number(-3.25), "-3.25");
        assert_eq!(format_number(123456789012.0), "123456789012");
        assert_eq!(format_number(1e21), "1e+21");
        assert_eq!(format_number(1.5e-7), "1.5e-7");
        assert_eq!(format_number(0.000001), "0.000001");
        assert_eq!(format_number(f64::NAN), "NaN");
        assert_eq!(format_number(f64::NEG_INFINITY), "-Infinity");
    }

    #[test]
    fn test_quote_string() {
        assert_eq!(quote_string("abc"), "\"abc\"");
        assert_eq!(quote_string("say \"hi\""), "'say \"hi\"'");
        assert_eq!(quote_string("it's"), "\"it's\"");
        assert_eq!(quote_string("a\nb\\"), "\"a\\nb\\\\\"");
        assert_eq!(quote_string("\u{1}"), "\"\\x01\"");
    }

    #[test]
    fn test_precedence_drives_parentheses() {
        let program = JsProgram::new();
        let sum = JsExpression::binary(info(), JsBinaryOp::Add, num(1.0), num(2.0));
        let product = JsExpression::binary(info(), JsBinaryOp::Mul, sum.clone(), num(3.0));
        assert_eq!(render(&program, &product), "(1+2)*3");

        let left_nested = JsExpression::binary(info(), JsBinaryOp::Sub, sum.clone(), num(3.0));
        assert_eq!(render(&program, &left_nested), "1+2-3");
        let right_nested = JsExpression::binary(info(), JsBinaryOp::Sub, num(3.0), sum);
        assert_eq!(render(&program, &right_nested), "3-(1+2)");

        let neg = JsExpression::binary(info(), JsBinaryOp::Sub, num(1.0), num(-1.0));
        assert_eq!(render(&program, &neg), "1- -1");
        let double_neg = JsExpression::prefix(info(), JsUnaryOp::Neg, JsExpression::prefix(info(), JsUnaryOp::Neg, num(1.0)));
        assert_eq!(render(&program, &double_neg), "- -1");
    }

    #[test]
    fn test_statements_minified_and_pretty() {
        let mut program = JsProgram::new();
        let top = program.top_scope;
        let f = program.fresh_name(top, "f", "f");
        let scope = program.new_scope(top, ScopeKind::Function, "f");
        let x = program.fresh_name(scope, "x", "x");
        let body = vec![JsStatement::new(
            info(),
            JsStatementKind::If {
                cond: JsExpression::name_ref(info(), x),
                then_stmt: Box::new(JsStatement::ret(info(), Some(num(1.0)))),
                else_stmt: None,
            },
        )];
        program.global_block.push(JsStatement::new(
            info(),
            JsStatementKind::Function(JsFunction {
                info: info(),
                name: Some(f),
                params: vec![x],
                body,
                scope,
            }),
        ));
        let a = program.fresh_name(top, "a", "a");
        program.global_block.push(JsStatement::new(
            info(),
            JsStatementKind::Vars(vec![JsVar {
                info: info(),
                name: a,
                init: Some(JsExpression::invoke(info(), JsExpression::name_ref(info(), f), vec![num(2.0)])),
            }]),
        ));

        assert_eq!(
            to_source(&program, TextOutput::Minified),
            "function f(x){if(x)return 1;}\nvar a=f(2);\n"
        );
        insta::assert_snapshot!(to_source(&program, TextOutput::Pretty).trim_end(), @r"
        function f(x) {
          if (x)
            return 1;
        }
        var a = f(2);
        ");
    }

    #[test]
    fn test_function_expression_statement_is_wrapped() {
        let mut program = JsProgram::new();
        let scope = program.new_scope(program.top_scope, ScopeKind::Function, "anon");
        let function = JsExpression::function(JsFunction {
            info: info(),
            name: None,
            params: vec![],
            body: vec![],
            scope,
        });
        let call = JsExpression::invoke(info(), function, vec![]).make_stmt();
        assert_eq!(
            JsSourceGenerator::render_stmt(&program, &call, TextOutput::Minified),
            "(function(){}());"
        );
    }

    #[test]
    fn test_ranges_are_recorded_in_emission_order() {
        let mut program = JsProgram::new();
        let a = program.fresh_name(program.top_scope, "a", "a");
        program.global_block.push(JsStatement::var(info(), a, Some(num(1.0))));
        program
            .global_block
            .push(JsExpression::assign(info(), JsExpression::name_ref(info(), a), num(2.0)).make_stmt());

        let generated = JsSourceGenerator::new(&program, TextOutput::Minified)
            .with_ranges(true)
            .generate();
        let ranges = generated.ranges.unwrap();
        assert_eq!(ranges.len(), 2);
        let second = ranges.get(1).unwrap();
        assert_eq!(second.line, 1);
        assert_eq!(second.column, 0);
        assert_eq!(&generated.js[second.start..second.end], "a=2;");
    }
}
