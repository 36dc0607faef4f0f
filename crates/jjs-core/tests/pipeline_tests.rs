//! End-to-end tests of the permutation pipeline
//!
//! Programs come from the shared fixtures; the output is checked as text
//! and by running the output AST through the test evaluator.

use jjs_core::config::{CompilerOptions, JsOutputOption, PermutationDef};
use jjs_core::diagnostics::{DiagnosticHandler, DiagnosticLevel};
use jjs_core::rebind::StaticRebindOracle;
use jjs_core::symbol_map::SymbolKind;
use jjs_core::{CompilationError, JavaToJavaScriptCompiler};
use jjs_test_helpers::compile::{compile_and_run, compile_ast, compile_js, compile_permutations, readable_options};
use jjs_test_helpers::eval::run_program;
use jjs_test_helpers::fixtures;
use jjs_test_helpers::mocks::MockDiagnosticHandler;

// =============================================================================
// Scenarios
// =============================================================================

#[test]
fn test_dead_private_helper_is_removed() {
    let options = CompilerOptions {
        output: JsOutputOption::Detailed,
        ..CompilerOptions::default()
    };
    let result = compile_js(fixtures::dead_helper_program(), &fixtures::main_module(), options).unwrap();
    assert!(!result.js.contains("unusedHelper"), "{}", result.js);

    let lines = compile_and_run(
        fixtures::dead_helper_program(),
        &fixtures::main_module(),
        readable_options(true),
    )
    .unwrap();
    assert_eq!(lines, vec!["1", "2"]);
}

#[test]
fn test_missing_entry_class_reports_one_error() {
    let (result, handler) = compile_permutations(
        fixtures::hello_program(),
        &fixtures::missing_entry_module(),
        &[],
        CompilerOptions::default(),
    );
    let error = result.unwrap_err();
    assert!(matches!(error, CompilationError::UnableToComplete { .. }));

    let errors = handler.messages(DiagnosticLevel::Error);
    assert_eq!(errors.len(), 1);
    assert!(errors[0].contains("app.DoesNotExist"), "{}", errors[0]);
}

#[test]
fn test_hello_world_output() {
    for output in [JsOutputOption::Obfuscated, JsOutputOption::Pretty, JsOutputOption::Detailed] {
        let options = CompilerOptions {
            output,
            ..CompilerOptions::default()
        };
        let result = compile_js(fixtures::hello_program(), &fixtures::main_module(), options).unwrap();
        assert!(result.js.contains("Hello, world"), "{:?}: {}", output, result.js);
        assert!(result.js.contains("console.log(x);"), "{:?}: {}", output, result.js);
    }
}

#[test]
fn test_strong_name_is_content_hash() {
    let first = compile_js(fixtures::counter_program(), &fixtures::main_module(), CompilerOptions::default()).unwrap();
    let second = compile_js(fixtures::counter_program(), &fixtures::main_module(), CompilerOptions::default()).unwrap();

    assert_eq!(first.js, second.js, "compilation must be deterministic");
    assert_eq!(first.strong_name, second.strong_name);
    assert_eq!(first.strong_name, blake3::hash(first.js.as_bytes()).to_hex().to_string());
}

#[test]
fn test_obfuscated_output_is_smaller_than_detailed() {
    let size = |output| {
        let options = CompilerOptions {
            output,
            ..CompilerOptions::default()
        };
        compile_js(fixtures::counter_program(), &fixtures::main_module(), options)
            .unwrap()
            .js
            .len()
    };
    assert!(size(JsOutputOption::Obfuscated) < size(JsOutputOption::Detailed));
}

// =============================================================================
// Permutations
// =============================================================================

#[test]
fn test_each_permutation_gets_its_rebind_answer() {
    let permutations = fixtures::greeter_permutations();
    let (result, handler) = compile_permutations(
        fixtures::rebind_program(),
        &fixtures::main_module(),
        &permutations,
        readable_options(true),
    );
    let results: Vec<_> = result.unwrap().into_iter().map(Result::unwrap).collect();
    assert_eq!(results.len(), 2);
    assert_eq!(results[0].permutation_id, 0);
    assert_eq!(results[1].permutation_id, 1);
    assert_ne!(results[0].strong_name, results[1].strong_name);
    assert!(!handler.has_errors());

    let handler = MockDiagnosticHandler::new();
    let compiler = JavaToJavaScriptCompiler::new(readable_options(true), handler);
    let oracle = StaticRebindOracle::for_permutations(&permutations);
    let unified = compiler
        .precompile(fixtures::rebind_program(), &fixtures::main_module(), &oracle)
        .unwrap();
    let printed: Vec<Vec<String>> = permutations
        .iter()
        .map(|p| run_program(&compiler.permutation_ast(&unified, p).unwrap().js).unwrap())
        .collect();
    assert_eq!(printed, vec![vec!["1".to_string()], vec!["2".to_string()]]);
}

#[test]
fn test_unresolvable_rebind_is_a_user_error() {
    let permutation = PermutationDef {
        id: 0,
        rebinds: [("app.Greeter".to_string(), "app.Klingon".to_string())]
            .into_iter()
            .collect(),
    };
    let (result, handler) = compile_permutations(
        fixtures::rebind_program(),
        &fixtures::main_module(),
        &[permutation],
        CompilerOptions::default(),
    );
    assert!(result.unwrap_err().is_user_error());
    assert!(handler
        .messages(DiagnosticLevel::Error)
        .iter()
        .any(|m| m.contains("app.Klingon")));
}

#[test]
fn test_validate_only_compiles_nothing() {
    let options = CompilerOptions {
        validate_only: true,
        ..CompilerOptions::default()
    };
    let (result, _) = compile_permutations(fixtures::counter_program(), &fixtures::main_module(), &[], options);
    assert!(result.unwrap().is_empty());
}

// =============================================================================
// Side artifacts
// =============================================================================

#[test]
fn test_symbol_map_names_surviving_members() {
    let options = CompilerOptions {
        symbol_map: true,
        ..CompilerOptions::default()
    };
    let result = compile_js(fixtures::counter_program(), &fixtures::main_module(), options).unwrap();
    let symbols = result.symbol_map.unwrap();

    let counter = symbols.lookup("app.Counter", SymbolKind::Class).unwrap();
    assert!(result.js.contains(counter));
    assert!(symbols.entries.iter().all(|e| !e.js.is_empty()));
}

#[test]
fn test_source_map_points_into_test_sources() {
    let options = CompilerOptions {
        source_map: true,
        ..readable_options(false)
    };
    let result = compile_js(fixtures::counter_program(), &fixtures::main_module(), options).unwrap();
    let map = result.source_map.unwrap();

    assert_eq!(map.version, 3);
    assert_eq!(map.file.as_deref(), Some(format!("{}.cache.js", result.strong_name).as_str()));
    assert!(map.sources.iter().any(|s| s == "Test.java"), "{:?}", map.sources);
    assert!(!map.mappings.is_empty());
    // segment groups stop at the last mapped line
    assert!(map.mappings.matches(';').count() < result.js.lines().count());
}

#[test]
fn test_compile_report_accounts_for_output() {
    let options = CompilerOptions {
        compile_report: true,
        ..readable_options(true)
    };
    let result = compile_js(fixtures::counter_program(), &fixtures::main_module(), options).unwrap();
    let report = result.report.unwrap();

    assert_eq!(report.total_size, result.js.len());
    assert!(report.size_of("app.Counter").is_some());
    let attributed: usize = report.classes.iter().map(|c| c.size).sum();
    assert!(attributed <= report.total_size);
    assert!(report.classes.windows(2).all(|w| w[0].size >= w[1].size));
}

// =============================================================================
// Output AST
// =============================================================================

#[test]
fn test_output_ast_names_are_checked() {
    let ast = compile_ast(fixtures::counter_program(), &fixtures::main_module(), CompilerOptions::default()).unwrap();
    jjs_core::js::namer::check_names(&ast.js).unwrap();
    assert!(!ast.js.global_block.is_empty());
}

#[test]
fn test_private_copies_per_permutation() {
    let handler = MockDiagnosticHandler::new();
    let compiler = JavaToJavaScriptCompiler::new(CompilerOptions::default(), handler);
    let unified = compiler
        .precompile(fixtures::counter_program(), &fixtures::main_module(), &StaticRebindOracle::new())
        .unwrap();

    let first = compiler.permutation_ast(&unified, &PermutationDef::default()).unwrap();
    let second = compiler.permutation_ast(&unified, &PermutationDef::default()).unwrap();
    assert_eq!(
        run_program(&first.js).unwrap(),
        run_program(&second.js).unwrap()
    );
}
