//! Java-like rendering of typed AST nodes for traces and debug logs

use crate::errors::{TraceGuard, VisitResult};
use crate::jast::declarations::MethodId;
use crate::jast::expression::{JExpression, JExpressionKind, JLiteral};
use crate::jast::program::JProgram;
use crate::jast::statement::{JStatement, JStatementKind};
use std::fmt::Write;

pub fn describe_expr(program: &JProgram, expr: &JExpression, _guard: &mut TraceGuard) -> VisitResult<String> {
    Ok(expr_to_source(program, expr))
}

/// First line of the rendered statement
pub fn describe_stmt(program: &JProgram, stmt: &JStatement, _guard: &mut TraceGuard) -> VisitResult<String> {
    let text = stmt_to_source(program, stmt);
    Ok(text.lines().next().unwrap_or_default().to_string())
}

pub fn literal_to_source(program: &JProgram, lit: &JLiteral) -> String {
    match lit {
        JLiteral::Boolean(b) => b.to_string(),
        JLiteral::Int(v) => v.to_string(),
        JLiteral::Long(v) => format!("{}L", v),
        JLiteral::Float(v) => format!("{}f", v),
        JLiteral::Double(v) => format!("{:?}", v),
        JLiteral::Char(c) => match char::from_u32(u32::from(*c)) {
            Some(ch) if !ch.is_control() => format!("'{}'", ch),
            _ => format!("'\\u{:04x}'", c),
        },
        JLiteral::String(s) => format!("{:?}", s),
        JLiteral::Null => "null".to_string(),
        JLiteral::Class(ty) => format!("{}.class", program.type_name(ty)),
    }
}

pub fn expr_to_source(program: &JProgram, expr: &JExpression) -> String {
    let mut out = String::new();
    write_expr(program, expr, &mut out);
    out
}

fn write_args(program: &JProgram, args: &[JExpression], out: &mut String) {
    out.push('(');
    for (i, arg) in args.iter().enumerate() {
        if i > 0 {
            out.push_str(", ");
        }
        write_expr(program, arg, out);
    }
    out.push(')');
}

fn write_operand(program: &JProgram, expr: &JExpression, out: &mut String) {
    let simple = matches!(
        expr.kind,
        JExpressionKind::Literal(_)
            | JExpressionKind::VariableRef(_)
            | JExpressionKind::FieldRef { .. }
            | JExpressionKind::This(_)
            | JExpressionKind::MethodCall { .. }
            | JExpressionKind::ArrayRef { .. }
            | JExpressionKind::ArrayLength(_)
    );
    if simple {
        write_expr(program, expr, out);
    } else {
        out.push('(');
        write_expr(program, expr, out);
        out.push(')');
    }
}

fn write_expr(program: &JProgram, expr: &JExpression, out: &mut String) {
    match &expr.kind {
        JExpressionKind::Literal(lit) => out.push_str(&literal_to_source(program, lit)),
        JExpressionKind::VariableRef(var) => out.push_str(&program.variables[*var].name),
        JExpressionKind::FieldRef { instance, field } => {
            match instance {
                Some(instance) => write_operand(program, instance, out),
                None => out.push_str(program.types[program.fields[*field].enclosing_type].short_name()),
            }
            out.push('.');
            out.push_str(&program.fields[*field].name);
        }
        JExpressionKind::This(_) => out.push_str("this"),
        JExpressionKind::MethodCall {
            instance, target, args, ..
        } => {
            let decl = &program.methods[*target];
            match instance {
                Some(instance) => write_operand(program, instance, out),
                None => out.push_str(program.types[decl.enclosing_type].short_name()),
            }
            out.push('.');
            out.push_str(&decl.name);
            write_args(program, args, out);
        }
        JExpressionKind::NewInstance { class, args, .. } => {
            out.push_str("new ");
            out.push_str(program.types[*class].short_name());
            write_args(program, args, out);
        }
        JExpressionKind::NewArray {
            ty,
            dims,
            initializers,
        } => {
            let (leaf, total) = ty.leaf_and_dims();
            let _ = write!(out, "new {}", program.type_name(leaf));
            for dim in dims {
                out.push('[');
                write_expr(program, dim, out);
                out.push(']');
            }
            for _ in dims.len()..total {
                out.push_str("[]");
            }
            if let Some(inits) = initializers {
                out.push_str(" {");
                for (i, init) in inits.iter().enumerate() {
                    if i > 0 {
                        out.push_str(", ");
                    }
                    write_expr(program, init, out);
                }
                out.push('}');
            }
        }
        JExpressionKind::ArrayRef { array, index } => {
            write_operand(program, array, out);
            out.push('[');
            write_expr(program, index, out);
            out.push(']');
        }
        JExpressionKind::ArrayLength(array) => {
            write_operand(program, array, out);
            out.push_str(".length");
        }
        JExpressionKind::Binary { op, lhs, rhs, .. } => {
            write_operand(program, lhs, out);
            let _ = write!(out, " {} ", op.symbol());
            write_operand(program, rhs, out);
        }
        JExpressionKind::Unary { op, arg } => {
            if op.is_postfix() {
                write_operand(program, arg, out);
                out.push_str(op.symbol());
            } else {
                out.push_str(op.symbol());
                write_operand(program, arg, out);
            }
        }
        JExpressionKind::Conditional {
            cond,
            then_expr,
            else_expr,
            ..
        } => {
            write_operand(program, cond, out);
            out.push_str(" ? ");
            write_operand(program, then_expr, out);
            out.push_str(" : ");
            write_operand(program, else_expr, out);
        }
        JExpressionKind::Cast { ty, expr } => {
            let _ = write!(out, "({}) ", program.type_name(ty));
            write_operand(program, expr, out);
        }
        JExpressionKind::InstanceOf { test, expr } => {
            write_operand(program, expr, out);
            let _ = write!(out, " instanceof {}", program.type_name(test));
        }
        JExpressionKind::Multi(exprs) => {
            out.push('(');
            for (i, e) in exprs.iter().enumerate() {
                if i > 0 {
                    out.push_str(", ");
                }
                write_expr(program, e, out);
            }
            out.push(')');
        }
    }
}

pub fn stmt_to_source(program: &JProgram, stmt: &JStatement) -> String {
    let mut out = String::new();
    write_stmt(program, stmt, 0, &mut out);
    out
}

/// Full method with signature, for debug dumps
pub fn method_to_source(program: &JProgram, method: MethodId) -> String {
    let decl = &program.methods[method];
    let mut out = String::new();
    if decl.is_static {
        out.push_str("static ");
    }
    let _ = write!(out, "{} {}(", program.type_name(&decl.return_type), decl.name);
    for (i, param) in decl.params.iter().enumerate() {
        if i > 0 {
            out.push_str(", ");
        }
        let var = &program.variables[*param];
        let _ = write!(out, "{} {}", program.type_name(&var.ty), var.name);
    }
    out.push(')');
    match decl.body.statements() {
        Some(stmts) => {
            out.push_str(" {\n");
            for stmt in stmts {
                write_stmt(program, stmt, 1, &mut out);
            }
            out.push('}');
        }
        None if decl.is_native() => out.push_str(" /*-{ native }-*/;"),
        None => out.push(';'),
    }
    out
}

fn indent(level: usize, out: &mut String) {
    for _ in 0..level {
        out.push_str("  ");
    }
}

fn write_block(program: &JProgram, stmts: &[JStatement], level: usize, out: &mut String) {
    out.push_str("{\n");
    for stmt in stmts {
        write_stmt(program, stmt, level + 1, out);
    }
    indent(level, out);
    out.push('}');
}

fn write_stmt(program: &JProgram, stmt: &JStatement, level: usize, out: &mut String) {
    indent(level, out);
    match &stmt.kind {
        JStatementKind::Block(stmts) => write_block(program, stmts, level, out),
        JStatementKind::LocalDecl { var, init } => {
            let decl = &program.variables[*var];
            let _ = write!(out, "{} {}", program.type_name(&decl.ty), decl.name);
            if let Some(init) = init {
                out.push_str(" = ");
                write_expr(program, init, out);
            }
            out.push(';');
        }
        JStatementKind::Expression(expr) => {
            write_expr(program, expr, out);
            out.push(';');
        }
        JStatementKind::If {
            cond,
            then_stmt,
            else_stmt,
        } => {
            out.push_str("if (");
            write_expr(program, cond, out);
            out.push_str(")\n");
            write_stmt(program, then_stmt, level + 1, out);
            if let Some(else_stmt) = else_stmt {
                out.push('\n');
                indent(level, out);
                out.push_str("else\n");
                write_stmt(program, else_stmt, level + 1, out);
            }
            return;
        }
        JStatementKind::While { cond, body } => {
            out.push_str("while (");
            write_expr(program, cond, out);
            out.push_str(")\n");
            write_stmt(program, body, level + 1, out);
            return;
        }
        JStatementKind::DoWhile { body, cond } => {
            out.push_str("do\n");
            write_stmt(program, body, level + 1, out);
            out.push('\n');
            indent(level, out);
            out.push_str("while (");
            write_expr(program, cond, out);
            out.push_str(");");
        }
        JStatementKind::For {
            cond, increments, body, ..
        } => {
            out.push_str("for (...; ");
            if let Some(cond) = cond {
                write_expr(program, cond, out);
            }
            out.push_str("; ");
            for (i, inc) in increments.iter().enumerate() {
                if i > 0 {
                    out.push_str(", ");
                }
                write_expr(program, inc, out);
            }
            out.push_str(")\n");
            write_stmt(program, body, level + 1, out);
            return;
        }
        JStatementKind::Return(value) => {
            out.push_str("return");
            if let Some(value) = value {
                out.push(' ');
                write_expr(program, value, out);
            }
            out.push(';');
        }
        JStatementKind::Throw(value) => {
            out.push_str("throw ");
            write_expr(program, value, out);
            out.push(';');
        }
        JStatementKind::Try {
            block,
            catches,
            finally,
        } => {
            out.push_str("try ");
            write_block(program, block, level, out);
            for catch in catches {
                let var = &program.variables[catch.var];
                let _ = write!(out, " catch ({} {}) ", program.type_name(&var.ty), var.name);
                write_block(program, &catch.body, level, out);
            }
            if let Some(finally) = finally {
                out.push_str(" finally ");
                write_block(program, finally, level, out);
            }
        }
        JStatementKind::Break(label) => match label {
            Some(label) => {
                let _ = write!(out, "break {};", label);
            }
            None => out.push_str("break;"),
        },
        JStatementKind::Continue(label) => match label {
            Some(label) => {
                let _ = write!(out, "continue {};", label);
            }
            None => out.push_str("continue;"),
        },
        JStatementKind::Label { name, body } => {
            let _ = writeln!(out, "{}:", name);
            write_stmt(program, body, level, out);
            return;
        }
        JStatementKind::Switch { expr, cases } => {
            out.push_str("switch (");
            write_expr(program, expr, out);
            out.push_str(") {\n");
            for case in cases {
                indent(level, out);
                match &case.label {
                    Some(label) => {
                        let _ = writeln!(out, "case {}:", literal_to_source(program, label));
                    }
                    None => out.push_str("default:\n"),
                }
                for s in &case.body {
                    write_stmt(program, s, level + 1, out);
                }
            }
            indent(level, out);
            out.push('}');
        }
        JStatementKind::Assert { test, message } => {
            out.push_str("assert ");
            write_expr(program, test, out);
            if let Some(message) = message {
                out.push_str(" : ");
                write_expr(program, message, out);
            }
            out.push(';');
        }
    }
    out.push('\n');
}
