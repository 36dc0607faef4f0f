//! The compilation driver
//!
//! [`JavaToJavaScriptCompiler::precompile`] validates the module's entry
//! points and runs everything that is the same for every permutation.
//! [`JavaToJavaScriptCompiler::compile_permutation`] takes a private copy of
//! that AST and carries it through to JavaScript text.
//!
//! Internal errors escaping any phase are tagged with the phase, logged and
//! reported to the diagnostic handler here and nowhere else.

use crate::codegen::{self, GeneratedJs, JavaToJsNames};
use crate::config::{CompilerOptions, JsOutputOption, ModuleDef, PermutationDef};
use crate::diagnostics::{user_error, DiagnosticHandler};
use crate::errors::{CompilationError, InternalCompilerError, Result};
use crate::jast::declarations::MethodId;
use crate::jast::program::JProgram;
use crate::jast::types::TypeId;
use crate::js::ast::JsProgram;
use crate::js::namer::name_program;
use crate::js::source_gen::{JsSourceGenerator, TextOutput};
use crate::js::sourcemap::{SourceMap, SourceMapBuilder};
use crate::normalize::{self, ReplaceRebinds};
use crate::optimizer;
use crate::rebind::{RebindOracle, StaticRebindOracle};
use crate::report::CompileReport;
use crate::symbol_map::SymbolMap;
use crate::unified_ast::{AstBundle, UnifiedAst};
use rayon::prelude::*;
use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use std::time::Instant;

/// Name of the method every entry point class provides
pub const ENTRY_METHOD_NAME: &str = "onModuleLoad";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Phase {
    Precompile,
    Normalize,
    Optimize,
    Lower,
    Generate,
    JsOptimize,
    Name,
    Emit,
}

impl Phase {
    pub fn as_str(self) -> &'static str {
        match self {
            Phase::Precompile => "precompile",
            Phase::Normalize => "normalize",
            Phase::Optimize => "optimize",
            Phase::Lower => "lower",
            Phase::Generate => "generate",
            Phase::JsOptimize => "js-optimize",
            Phase::Name => "name",
            Phase::Emit => "emit",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Everything produced for one permutation
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PermutationResult {
    pub permutation_id: usize,
    /// Hex `blake3` digest of `js`
    pub strong_name: String,
    pub js: String,
    pub symbol_map: Option<SymbolMap>,
    pub source_map: Option<SourceMap>,
    pub report: Option<CompileReport>,
}

/// A permutation's lowered program and its named output AST
#[derive(Debug, Clone)]
pub struct PermutationAst {
    pub program: JProgram,
    pub js: JsProgram,
    pub names: JavaToJsNames,
}

pub struct JavaToJavaScriptCompiler {
    options: CompilerOptions,
    handler: Arc<dyn DiagnosticHandler>,
}

impl JavaToJavaScriptCompiler {
    pub fn new(options: CompilerOptions, handler: Arc<dyn DiagnosticHandler>) -> Self {
        Self { options, handler }
    }

    pub fn options(&self) -> &CompilerOptions {
        &self.options
    }

    /// Precompile then compile every permutation in parallel.
    ///
    /// An empty `permutations` slice compiles a single permutation without
    /// rebinds. The outer error is a precompile failure; each permutation
    /// succeeds or fails on its own. With `validate_only` no permutation is
    /// compiled.
    pub fn compile(
        &self,
        program: JProgram,
        module: &ModuleDef,
        permutations: &[PermutationDef],
    ) -> Result<Vec<Result<PermutationResult>>> {
        let permutations = if permutations.is_empty() {
            vec![PermutationDef::default()]
        } else {
            permutations.to_vec()
        };
        let oracle = StaticRebindOracle::for_permutations(&permutations);
        let unified = self.precompile_for(program, module, &oracle, permutations.len())?;
        if self.options.validate_only {
            tracing::info!(module = %module.name, "validation finished");
            return Ok(Vec::new());
        }

        let started = Instant::now();
        let results: Vec<Result<PermutationResult>> = permutations
            .par_iter()
            .map(|permutation| self.compile_permutation(&unified, permutation))
            .collect();
        let failed = results.iter().filter(|r| r.is_err()).count();
        tracing::info!(
            module = %module.name,
            permutations = results.len(),
            failed,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "compilation finished"
        );
        Ok(results)
    }

    /// Validate entry points and run the permutation-independent phases.
    ///
    /// The returned AST keeps a serialized copy, so any number of
    /// permutations can be compiled from it.
    pub fn precompile(&self, program: JProgram, module: &ModuleDef, oracle: &dyn RebindOracle) -> Result<UnifiedAst> {
        self.precompile_for(program, module, oracle, usize::MAX)
    }

    fn precompile_for(
        &self,
        mut program: JProgram,
        module: &ModuleDef,
        oracle: &dyn RebindOracle,
        expected_permutations: usize,
    ) -> Result<UnifiedAst> {
        let span = tracing::info_span!("module", name = %module.name);
        let _guard = span.enter();

        self.phase(Phase::Precompile, || {
            program
                .indexed_type("Object")
                .map_err(|_| InternalCompilerError::new("runtime library is not installed"))?;
            program.correlator.set_enabled(self.options.needs_tracking());
            self.resolve_entry_points(&mut program, module)?;
            let rescued = normalize::rescue_rebind_answers(&mut program, oracle, &*self.handler)?;
            tracing::debug!(
                entries = program.entry_methods.len(),
                rescued,
                "entry points resolved"
            );
            Ok(())
        })?;
        self.phase(Phase::Normalize, || {
            normalize::pre_normalize(&mut program, &self.options).map_err(CompilationError::from)
        })?;
        if !self.options.validate_only {
            self.phase(Phase::Optimize, || {
                optimizer::optimize(&mut program, &self.options, Arc::clone(&self.handler))
            })?;
        }

        self.phase(Phase::Precompile, || {
            UnifiedAst::new(
                self.options.clone(),
                module.clone(),
                AstBundle::new(program),
                expected_permutations,
            )
        })
    }

    /// Record one entry method per declared entry point class
    fn resolve_entry_points(&self, program: &mut JProgram, module: &ModuleDef) -> Result<()> {
        for class_name in &module.entry_points {
            let Some(class) = program.find_type(class_name) else {
                return Err(user_error(
                    &*self.handler,
                    None,
                    format!("Could not find entry point class '{}'", class_name),
                ));
            };
            let (method, ctor) = self.entry_method(program, class)?;
            program.add_entry_method(method, ctor);
        }
        if program.entry_methods.is_empty() {
            return Err(user_error(
                &*self.handler,
                None,
                format!("Module '{}' declares no entry points", module.name),
            ));
        }
        Ok(())
    }

    /// The `onModuleLoad()` to call and, for an instance method, the
    /// constructor of the receiver
    fn entry_method(&self, program: &JProgram, class: TypeId) -> Result<(MethodId, Option<MethodId>)> {
        let decl = &program.types[class];
        let mut current = Some(class);
        let mut found = None;
        while let Some(ty) = current {
            found = program
                .find_method(ty, ENTRY_METHOD_NAME, 0)
                .filter(|m| !program.methods[*m].is_abstract);
            if found.is_some() {
                break;
            }
            current = program.types[ty].super_class;
        }
        let Some(method) = found else {
            return Err(user_error(
                &*self.handler,
                Some(&decl.info),
                format!(
                    "Entry point class '{}' must have a method {}()",
                    decl.name, ENTRY_METHOD_NAME
                ),
            ));
        };
        if program.methods[method].is_static {
            return Ok((method, None));
        }

        if decl.is_abstract || !decl.is_class() {
            return Err(user_error(
                &*self.handler,
                Some(&decl.info),
                format!(
                    "Entry point class '{}' is abstract and its {}() is not static",
                    decl.name, ENTRY_METHOD_NAME
                ),
            ));
        }
        let ctor = decl
            .methods
            .iter()
            .copied()
            .find(|m| program.methods[*m].is_constructor && program.methods[*m].params.is_empty());
        match ctor {
            Some(ctor) => Ok((method, Some(ctor))),
            None => Err(user_error(
                &*self.handler,
                Some(&decl.info),
                format!(
                    "Entry point class '{}' must have a zero-argument constructor",
                    decl.name
                ),
            )),
        }
    }

    /// Carry one permutation from the unified AST to JavaScript text
    pub fn compile_permutation(&self, unified: &UnifiedAst, permutation: &PermutationDef) -> Result<PermutationResult> {
        let span = tracing::info_span!("permutation", id = permutation.id);
        let _guard = span.enter();
        let started = Instant::now();
        let options = unified.options();
        let PermutationAst { program, js, names } = self.build_permutation_ast(unified, permutation)?;

        let text_output = match options.output {
            JsOutputOption::Obfuscated => TextOutput::Minified,
            JsOutputOption::Pretty | JsOutputOption::Detailed => TextOutput::Pretty,
        };
        let needs_ranges = options.source_map || options.compile_report;
        let source = self.phase(Phase::Emit, || {
            Ok(JsSourceGenerator::new(&js, text_output)
                .with_ranges(needs_ranges)
                .generate())
        })?;
        let strong_name = blake3::hash(source.js.as_bytes()).to_hex().to_string();

        let symbol_map = options
            .symbol_map
            .then(|| SymbolMap::build(&program, &js, &names));
        let source_map = match (&source.ranges, options.source_map) {
            (Some(ranges), true) => {
                let mut builder = SourceMapBuilder::from_ranges(ranges);
                builder.set_file(format!("{}.cache.js", strong_name));
                Some(builder.build())
            }
            _ => None,
        };
        let report = match (&source.ranges, options.compile_report) {
            (Some(ranges), true) => Some(CompileReport::build(
                permutation.id,
                &program,
                &js,
                &names,
                ranges,
                source.js.len(),
            )),
            _ => None,
        };

        tracing::info!(
            bytes = source.js.len(),
            strong_name = %strong_name,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "permutation compiled"
        );
        Ok(PermutationResult {
            permutation_id: permutation.id,
            strong_name,
            js: source.js,
            symbol_map,
            source_map,
            report,
        })
    }

    /// The named output AST of one permutation, without emitting text
    pub fn permutation_ast(&self, unified: &UnifiedAst, permutation: &PermutationDef) -> Result<PermutationAst> {
        let span = tracing::info_span!("permutation", id = permutation.id);
        let _guard = span.enter();
        self.build_permutation_ast(unified, permutation)
    }

    fn build_permutation_ast(&self, unified: &UnifiedAst, permutation: &PermutationDef) -> Result<PermutationAst> {
        let options = unified.options();
        let AstBundle { mut program, .. } = self.phase(Phase::Normalize, || unified.fresh_ast())?;
        self.phase(Phase::Normalize, || {
            let oracle = StaticRebindOracle::for_permutation(permutation);
            ReplaceRebinds::new(&oracle, &*self.handler).run(&mut program)
        })?;
        self.phase(Phase::Optimize, || {
            optimizer::optimize(&mut program, options, Arc::clone(&self.handler))
        })?;
        self.phase(Phase::Lower, || {
            normalize::lower(&mut program, options, Arc::clone(&self.handler))
        })?;
        let GeneratedJs { program: mut js, names } = self.phase(Phase::Generate, || {
            codegen::generate(&program).map_err(CompilationError::from)
        })?;
        self.phase(Phase::JsOptimize, || {
            crate::js::optimize::optimize(&mut js, options, Arc::clone(&self.handler))
        })?;
        self.phase(Phase::Name, || {
            name_program(&mut js, options.output, &options.pretty_name_denylist).map_err(CompilationError::from)
        })?;
        Ok(PermutationAst { program, js, names })
    }

    /// Run one phase inside its span, turning escaping errors into diagnostics
    fn phase<T>(&self, phase: Phase, run: impl FnOnce() -> Result<T>) -> Result<T> {
        let span = tracing::info_span!("phase", phase = %phase);
        let _guard = span.enter();
        let started = Instant::now();
        match run() {
            Ok(value) => {
                tracing::info!(elapsed_ms = started.elapsed().as_millis() as u64, "{} finished", phase);
                Ok(value)
            }
            Err(CompilationError::Internal(error)) => {
                let error = error.in_phase(phase);
                tracing::error!("{}", error);
                self.handler.error(None, &error.to_string());
                Err(error.into())
            }
            // already reported where it was raised
            Err(error) if error.is_user_error() => Err(error),
            Err(error) => {
                tracing::error!(phase = %phase, "{}", error);
                self.handler.error(None, &error.to_string());
                Err(error)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostics::{CollectingDiagnosticHandler, DiagnosticLevel};
    use crate::jast::declarations::MethodFlags;
    use crate::jast::expression::JExpression;
    use crate::jast::runtime;
    use crate::jast::statement::JStatement;
    use crate::jast::types::JType;
    use crate::source_info::SourceInfo;

    fn info() -> SourceInfo {
        SourceInfo::unknown()
    }

    /// `app.Main` with a static entry calling a native logger
    fn program() -> JProgram {
        let mut program = JProgram::new(false);
        runtime::install(&mut program);
        let object = program.indexed_type("Object").unwrap();
        let main = program.create_class(info(), "app.Main", Some(object), false, true);
        let log = program.create_method(info(), main, "log", JType::VOID, MethodFlags::static_method());
        program.create_param(info(), log, "x", JType::INT, false);
        program.set_native_body(log, "console.log(x);");
        let entry = program.create_method(info(), main, ENTRY_METHOD_NAME, JType::VOID, MethodFlags::static_method());
        program.set_body(
            entry,
            vec![JStatement::expr(JExpression::static_call(
                info(),
                log,
                vec![JExpression::int_lit(info(), 42)],
            ))],
        );
        program
    }

    fn compiler(options: CompilerOptions) -> (JavaToJavaScriptCompiler, Arc<CollectingDiagnosticHandler>) {
        let handler = Arc::new(CollectingDiagnosticHandler::new());
        (JavaToJavaScriptCompiler::new(options, handler.clone()), handler)
    }

    fn module() -> ModuleDef {
        ModuleDef::new("app", vec!["app.Main".to_string()])
    }

    #[test]
    fn test_phase_names() {
        assert_eq!(Phase::JsOptimize.to_string(), "js-optimize");
        assert_eq!(Phase::Precompile.to_string(), "precompile");
    }

    #[test]
    fn test_missing_entry_class_is_a_user_error() {
        let (compiler, handler) = compiler(CompilerOptions::default());
        let module = ModuleDef::new("app", vec!["app.Missing".to_string()]);
        let error = compiler.compile(program(), &module, &[]).unwrap_err();

        assert!(error.is_user_error(), "{}", error);
        let errors = handler.messages(DiagnosticLevel::Error);
        assert_eq!(errors.len(), 1);
        assert!(errors[0].contains("app.Missing"));
    }

    #[test]
    fn test_instance_entry_needs_no_arg_constructor() {
        let (compiler, handler) = compiler(CompilerOptions::default());
        let mut program = JProgram::new(false);
        runtime::install(&mut program);
        let object = program.indexed_type("Object").unwrap();
        let main = program.create_class(info(), "app.Main", Some(object), false, false);
        program.create_method(info(), main, ENTRY_METHOD_NAME, JType::VOID, MethodFlags::instance());
        let ctor = program.create_method(info(), main, "Main", JType::VOID, MethodFlags::constructor());
        program.create_param(info(), ctor, "seed", JType::INT, false);

        let error = compiler.compile(program, &module(), &[]).unwrap_err();
        assert!(error.is_user_error());
        assert!(handler.messages(DiagnosticLevel::Error)[0].contains("zero-argument constructor"));
    }

    #[test]
    fn test_abstract_entry_class_needs_static_entry() {
        let (compiler, handler) = compiler(CompilerOptions::default());
        let mut program = JProgram::new(false);
        runtime::install(&mut program);
        let object = program.indexed_type("Object").unwrap();
        let main = program.create_class(info(), "app.Main", Some(object), true, false);
        program.create_method(info(), main, ENTRY_METHOD_NAME, JType::VOID, MethodFlags::instance());

        assert!(compiler.compile(program, &module(), &[]).is_err());
        assert!(handler.messages(DiagnosticLevel::Error)[0].contains("abstract"));
    }

    #[test]
    fn test_missing_runtime_is_internal() {
        let (compiler, handler) = compiler(CompilerOptions::default());
        let error = compiler.compile(JProgram::new(false), &module(), &[]).unwrap_err();
        match error {
            CompilationError::Internal(internal) => assert_eq!(internal.phase(), Some(Phase::Precompile)),
            other => panic!("expected an internal error, got {other}"),
        }
        assert!(handler.has_errors());
    }

    #[test]
    fn test_compiles_every_permutation() {
        let options = CompilerOptions {
            symbol_map: true,
            ..CompilerOptions::default()
        };
        let (compiler, handler) = compiler(options);
        let permutations = vec![
            PermutationDef { id: 0, ..Default::default() },
            PermutationDef { id: 1, ..Default::default() },
        ];
        let results = compiler.compile(program(), &module(), &permutations).unwrap();

        assert_eq!(results.len(), 2);
        let first = results[0].as_ref().unwrap();
        let second = results[1].as_ref().unwrap();
        assert!(first.js.contains("console.log(x);"), "{}", first.js);
        assert!(first.js.contains("(42)"), "{}", first.js);
        assert_eq!(first.strong_name, blake3::hash(first.js.as_bytes()).to_hex().to_string());
        assert_eq!(first.strong_name, second.strong_name);
        assert!(first.symbol_map.is_some());
        assert!(first.source_map.is_none());
        assert!(!handler.has_errors());
    }

    #[test]
    fn test_validate_only_compiles_nothing() {
        let options = CompilerOptions {
            validate_only: true,
            ..CompilerOptions::default()
        };
        let (compiler, _) = compiler(options);
        assert!(compiler.compile(program(), &module(), &[]).unwrap().is_empty());
    }
}
