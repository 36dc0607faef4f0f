//! Marks members final wherever the current program never overrides or
//! reassigns them

use crate::errors::CompilationError;
use crate::fixpoint::OptimizationPass;
use crate::jast::declarations::{FieldId, MethodId, VarId};
use crate::jast::expression::{JExpression, JExpressionKind};
use crate::jast::program::JProgram;
use crate::jast::statement::{JStatement, JStatementKind};
use crate::jast::type_oracle::TypeOracle;
use crate::jast::visitor::{self, JVisitor, VisitCx};
use rustc_hash::{FxHashMap, FxHashSet};

pub struct Finalizer;

impl OptimizationPass<JProgram> for Finalizer {
    fn name(&self) -> &'static str {
        "finalizer"
    }

    fn run(&mut self, program: &mut JProgram) -> Result<bool, CompilationError> {
        Ok(finalize(program))
    }
}

#[derive(Default)]
struct AssignmentCollector {
    reassigned_vars: FxHashSet<VarId>,
    /// field -> methods that write it
    field_writers: FxHashMap<FieldId, FxHashSet<MethodId>>,
}

impl AssignmentCollector {
    fn record_target(&mut self, target: &JExpression, method: Option<MethodId>) {
        match &target.kind {
            JExpressionKind::VariableRef(var) => {
                self.reassigned_vars.insert(*var);
            }
            JExpressionKind::FieldRef { field, .. } => {
                let writers = self.field_writers.entry(*field).or_default();
                if let Some(method) = method {
                    writers.insert(method);
                }
            }
            _ => {}
        }
    }
}

impl JVisitor for AssignmentCollector {
    fn visit_expr(&mut self, expr: &JExpression, cx: VisitCx<'_>) -> bool {
        match &expr.kind {
            JExpressionKind::Binary { op, lhs, .. } if op.is_assignment() => self.record_target(lhs, cx.method),
            JExpressionKind::Unary { op, arg } if op.is_modifying() => self.record_target(arg, cx.method),
            _ => {}
        }
        true
    }

    fn visit_stmt(&mut self, stmt: &JStatement, _cx: VisitCx<'_>) -> bool {
        // A catch variable is bound by the runtime on every entry
        if let JStatementKind::Try { catches, .. } = &stmt.kind {
            for catch in catches {
                self.reassigned_vars.insert(catch.var);
            }
        }
        true
    }
}

/// Returns whether any member became final
pub fn finalize(program: &mut JProgram) -> bool {
    let oracle = TypeOracle::build(program);
    let mut collector = AssignmentCollector::default();
    visitor::visit_program(&mut collector, program);

    let mut changed = false;

    for method in program.live_methods() {
        let vars: Vec<VarId> = program.methods[method]
            .params
            .iter()
            .chain(program.methods[method].locals.iter())
            .copied()
            .collect();
        for var in vars {
            if !program.variables[var].is_final && !collector.reassigned_vars.contains(&var) {
                program.variables[var].is_final = true;
                changed = true;
            }
        }
    }

    for field in program.live_fields() {
        if program.fields[field].is_final {
            continue;
        }
        let decl = &program.fields[field];
        let owner = decl.enclosing_type;
        let is_static = decl.is_static;
        let only_initializers = collector.field_writers.get(&field).map_or(true, |writers| {
            writers.iter().all(|writer| {
                let m = &program.methods[*writer];
                m.enclosing_type == owner && if is_static { m.is_clinit } else { m.is_constructor }
            })
        });
        if only_initializers {
            program.fields[field].is_final = true;
            changed = true;
        }
    }

    for method in program.live_methods() {
        let decl = &program.methods[method];
        if decl.is_final || !decl.is_virtual() || oracle.is_overridden(method) {
            continue;
        }
        program.methods[method].is_final = true;
        changed = true;
    }

    for ty in program.declared_types.clone() {
        let decl = &program.types[ty];
        if decl.is_final || !decl.is_class() || decl.is_abstract || oracle.has_subtypes(ty) {
            continue;
        }
        program.types[ty].is_final = true;
        changed = true;
    }

    changed
}
