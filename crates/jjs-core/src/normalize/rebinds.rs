//! Deferred binding: `GWT.create(Foo.class)` becomes `new Answer()`

use crate::diagnostics::{user_error, DiagnosticHandler};
use crate::errors::{Result, VisitResult};
use crate::jast::declarations::MethodId;
use crate::jast::expression::{JExpression, JExpressionKind, JLiteral};
use crate::jast::program::JProgram;
use crate::jast::type_oracle::TypeOracle;
use crate::jast::types::{JType, TypeId};
use crate::jast::visitor::{self, ExprContext, JModVisitor, JVisitor, VisitCx};
use crate::rebind::RebindOracle;
use crate::source_info::SourceInfo;
use rustc_hash::FxHashMap;

/// Requested type of a rebind call, if `expr` is one
fn requested_type(expr: &JExpression, create: MethodId) -> Option<&JType> {
    let JExpressionKind::MethodCall { target, args, .. } = &expr.kind else {
        return None;
    };
    if *target != create {
        return None;
    }
    match args.as_slice() {
        [arg] => match arg.as_literal() {
            Some(JLiteral::Class(ty)) => Some(ty),
            _ => None,
        },
        _ => None,
    }
}

struct RequestCollector {
    create: MethodId,
    requests: Vec<(String, SourceInfo)>,
}

impl JVisitor for RequestCollector {
    fn end_visit_expr(&mut self, expr: &JExpression, cx: VisitCx<'_>) {
        if let Some(ty) = requested_type(expr, self.create) {
            let name = cx.program.type_name(ty);
            if !self.requests.iter().any(|(n, _)| *n == name) {
                self.requests.push((name, expr.info.clone()));
            }
        }
    }
}

fn collect_requests(program: &JProgram) -> VisitResult<Vec<(String, SourceInfo)>> {
    let create = program.indexed_method("GWT.create")?;
    let mut collector = RequestCollector {
        create,
        requests: Vec::new(),
    };
    visitor::visit_program(&mut collector, program);
    Ok(collector.requests)
}

/// Class and no-argument constructor that instantiate `answer`
fn resolve_answer(
    program: &JProgram,
    oracle: &TypeOracle,
    handler: &dyn DiagnosticHandler,
    requested: &str,
    answer: &str,
    info: &SourceInfo,
) -> Result<(TypeId, MethodId)> {
    let Some(class) = program.find_type(answer) else {
        return Err(user_error(
            handler,
            Some(info),
            format!("Rebind result '{}' for '{}' is not a known type", answer, requested),
        ));
    };
    let decl = &program.types[class];
    if decl.is_interface() || decl.is_abstract {
        return Err(user_error(
            handler,
            Some(info),
            format!("Rebind result '{}' must be a concrete class", answer),
        ));
    }
    if let Some(requested_ty) = program.find_type(requested) {
        if !oracle.is_subtype(class, requested_ty) {
            return Err(user_error(
                handler,
                Some(info),
                format!("Rebind result '{}' is not assignable to '{}'", answer, requested),
            ));
        }
    }
    let ctor = decl
        .methods
        .iter()
        .copied()
        .find(|m| program.methods[*m].is_constructor && program.methods[*m].params.is_empty());
    match ctor {
        Some(ctor) => Ok((class, ctor)),
        None => Err(user_error(
            handler,
            Some(info),
            format!("Rebind result '{}' has no default (zero argument) constructor", answer),
        )),
    }
}

/// Keep every type that some permutation may answer with alive until the
/// permutation's own answers are substituted. Returns the number of types kept.
pub fn rescue_rebind_answers(
    program: &mut JProgram,
    oracle: &dyn RebindOracle,
    handler: &dyn DiagnosticHandler,
) -> Result<usize> {
    let requests = collect_requests(program)?;
    let hierarchy = TypeOracle::build(program);
    let mut answers = Vec::new();
    for (requested, info) in &requests {
        for answer in oracle.all_possible_answers(requested) {
            let (class, _) = resolve_answer(program, &hierarchy, handler, requested, &answer, info)?;
            answers.push(class);
        }
    }
    program.rebind_rescues.extend(answers.iter().copied());
    tracing::debug!(requests = requests.len(), answers = answers.len(), "rescued rebind answers");
    Ok(answers.len())
}

/// Substitutes one permutation's rebind answers
pub struct ReplaceRebinds<'a> {
    oracle: &'a dyn RebindOracle,
    handler: &'a dyn DiagnosticHandler,
}

impl<'a> ReplaceRebinds<'a> {
    pub fn new(oracle: &'a dyn RebindOracle, handler: &'a dyn DiagnosticHandler) -> Self {
        Self { oracle, handler }
    }

    /// Rewrite every rebind call whose argument is a class literal. The
    /// answers rescued for other permutations are released afterwards.
    pub fn run(&self, program: &mut JProgram) -> Result<bool> {
        let requests = collect_requests(program)?;
        let hierarchy = TypeOracle::build(program);
        let mut answers = FxHashMap::default();
        for (requested, info) in &requests {
            let answer = self.oracle.rebind(requested)?;
            let resolved = resolve_answer(program, &hierarchy, self.handler, requested, &answer, info)?;
            tracing::debug!(requested = %requested, answer = %answer, "rebind");
            answers.insert(requested.clone(), resolved);
        }

        let mut replacer = RebindReplacer {
            create: program.indexed_method("GWT.create")?,
            answers,
            changed: false,
        };
        visitor::accept_program(&mut replacer, program)?;
        program.rebind_rescues.clear();
        Ok(replacer.changed)
    }
}

struct RebindReplacer {
    create: MethodId,
    answers: FxHashMap<String, (TypeId, MethodId)>,
    changed: bool,
}

impl JModVisitor for RebindReplacer {
    fn end_visit_expr(&mut self, expr: &mut JExpression, ctx: &mut ExprContext<'_>) -> VisitResult {
        let Some(ty) = requested_type(expr, self.create) else {
            return Ok(());
        };
        let name = ctx.program.type_name(ty);
        if let Some((class, ctor)) = self.answers.get(&name) {
            ctx.replace_me(JExpression::new_instance(expr.info.clone(), *class, *ctor, vec![]));
            self.changed = true;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostics::CollectingDiagnosticHandler;
    use crate::jast::declarations::MethodFlags;
    use crate::jast::runtime;
    use crate::jast::statement::{JStatement, JStatementKind};
    use crate::rebind::StaticRebindOracle;

    fn info() -> SourceInfo {
        SourceInfo::unknown()
    }

    struct Fixture {
        program: JProgram,
        main: MethodId,
        webkit: TypeId,
        gecko: TypeId,
    }

    fn fixture() -> Fixture {
        let mut program = JProgram::new(false);
        runtime::install(&mut program);
        let object = program.indexed_type("Object").unwrap();
        let api = program.create_interface(info(), "app.Api");
        let impl_class = |program: &mut JProgram, name: &str| {
            let class = program.create_class(info(), name, Some(object), false, false);
            program.add_interface(class, api);
            let short = name.rsplit('.').next().unwrap_or(name).to_string();
            program.create_method(info(), class, &short, JType::VOID, MethodFlags::constructor());
            class
        };
        let webkit = impl_class(&mut program, "app.WebkitApi");
        let gecko = impl_class(&mut program, "app.GeckoApi");

        let app = program.create_class(info(), "app.Main", Some(object), false, false);
        let main = program.create_method(info(), app, "main", JType::VOID, MethodFlags::static_method());
        let create = program.indexed_method("GWT.create").unwrap();
        let request = JExpression::static_call(
            info(),
            create,
            vec![JExpression::literal(info(), JLiteral::Class(JType::Declared(api)))],
        );
        program.set_body(main, vec![JStatement::expr(request)]);
        Fixture {
            program,
            main,
            webkit,
            gecko,
        }
    }

    #[test]
    fn test_request_becomes_instantiation() {
        let mut f = fixture();
        let handler = CollectingDiagnosticHandler::new();
        let oracle = StaticRebindOracle::new().with_rule("app.Api", "app.GeckoApi");

        assert!(ReplaceRebinds::new(&oracle, &handler).run(&mut f.program).unwrap());
        let stmts = f.program.methods[f.main].body.statements().unwrap();
        assert!(matches!(
            &stmts[0].kind,
            JStatementKind::Expression(e)
                if matches!(e.kind, JExpressionKind::NewInstance { class, .. } if class == f.gecko)
        ));
        assert!(!ReplaceRebinds::new(&oracle, &handler).run(&mut f.program).unwrap());
    }

    #[test]
    fn test_every_answer_is_rescued_until_replacement() {
        let mut f = fixture();
        let handler = CollectingDiagnosticHandler::new();
        let oracle = StaticRebindOracle::new()
            .with_rule("app.Api", "app.WebkitApi")
            .with_rule("app.Api", "app.GeckoApi");

        assert_eq!(rescue_rebind_answers(&mut f.program, &oracle, &handler).unwrap(), 2);
        assert!(f.program.rebind_rescues.contains(&f.webkit));
        assert!(f.program.rebind_rescues.contains(&f.gecko));

        ReplaceRebinds::new(&oracle, &handler).run(&mut f.program).unwrap();
        assert!(f.program.rebind_rescues.is_empty());
    }

    #[test]
    fn test_interface_answer_is_a_user_error() {
        let mut f = fixture();
        let handler = CollectingDiagnosticHandler::new();
        let oracle = StaticRebindOracle::new();

        let err = ReplaceRebinds::new(&oracle, &handler).run(&mut f.program).unwrap_err();
        assert!(err.is_user_error());
        assert_eq!(handler.error_count(), 1);
    }
}
