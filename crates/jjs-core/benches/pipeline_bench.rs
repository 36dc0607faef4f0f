use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use jjs_core::config::{CompilerOptions, JsOutputOption};
use jjs_core::jast::{BinaryOp, JExpression, JProgram, JStatement, JType, MethodFlags};
use jjs_core::rebind::StaticRebindOracle;
use jjs_core::JavaToJavaScriptCompiler;
use jjs_test_helpers::builder::{call_stmt, ProgramBuilder};
use jjs_test_helpers::compile::compile_permutations;
use jjs_test_helpers::fixtures;
use jjs_test_helpers::mocks::MockDiagnosticHandler;

/// Generate a program with `class_count` worker classes, each with a
/// foldable static method and an unreachable helper
fn generate_program(class_count: usize) -> JProgram {
    let mut b = ProgramBuilder::new();
    let mut workers = Vec::new();
    for i in 0..class_count {
        let class = b.class(&format!("app.Worker{}", i));
        let (compute, params) = b.static_method(class, "compute", JType::INT, &[("n", JType::INT)]);
        let info = b.info();
        // n * (5 + 3) + (10 - 5)
        let lit = |v| JExpression::int_lit(info.clone(), v);
        let body = JExpression::binary(
            info.clone(),
            BinaryOp::Add,
            JExpression::binary(
                info.clone(),
                BinaryOp::Mul,
                JExpression::var_ref(info.clone(), params[0]),
                JExpression::binary(info.clone(), BinaryOp::Add, lit(5), lit(3), JType::INT),
                JType::INT,
            ),
            JExpression::binary(info.clone(), BinaryOp::Sub, lit(10), lit(5), JType::INT),
            JType::INT,
        );
        b.set_body(compute, vec![JStatement::return_stmt(info.clone(), Some(body))]);

        let (unused, _) = b.method_with(class, "unused", JType::VOID, &[], MethodFlags::static_method());
        b.set_body(unused, vec![]);
        workers.push(compute);
    }

    let main = b.class(fixtures::MAIN_CLASS);
    let print = b.print_method(main, "print", JType::INT);
    let info = b.info();
    let body = workers
        .iter()
        .enumerate()
        .map(|(i, compute)| {
            let arg = JExpression::int_lit(info.clone(), i as i32);
            let call = JExpression::static_call(info.clone(), *compute, vec![arg]);
            call_stmt(info.clone(), None, print, vec![call])
        })
        .collect();
    b.entry(main, body);
    b.build()
}

/// Benchmark: whole pipeline as class count grows
fn bench_class_count(c: &mut Criterion) {
    let mut group = c.benchmark_group("class_count");
    group.sample_size(10);

    for class_count in [10, 50, 200] {
        let program = generate_program(class_count);
        group.bench_with_input(BenchmarkId::new("compile", class_count), &program, |b, program| {
            b.iter(|| {
                let (result, _) = compile_permutations(
                    program.clone(),
                    &fixtures::main_module(),
                    &[],
                    CompilerOptions::default(),
                );
                black_box(result.ok())
            })
        });
    }

    group.finish();
}

/// Benchmark: one permutation from an already precompiled AST
fn bench_permutation(c: &mut Criterion) {
    let mut group = c.benchmark_group("permutation");
    let program = generate_program(50);

    for output in [JsOutputOption::Obfuscated, JsOutputOption::Pretty, JsOutputOption::Detailed] {
        let options = CompilerOptions {
            output,
            ..CompilerOptions::default()
        };
        let compiler = JavaToJavaScriptCompiler::new(options, MockDiagnosticHandler::new());
        let Ok(unified) = compiler.precompile(program.clone(), &fixtures::main_module(), &StaticRebindOracle::new())
        else {
            panic!("precompile failed");
        };
        let permutation = Default::default();
        group.bench_function(format!("{:?}", output), |b| {
            b.iter(|| black_box(compiler.compile_permutation(&unified, &permutation).ok()))
        });
    }

    group.finish();
}

/// Benchmark: two rebind permutations compiled in parallel
fn bench_rebind_permutations(c: &mut Criterion) {
    let permutations = fixtures::greeter_permutations();
    c.bench_function("rebind_permutations", |b| {
        b.iter(|| {
            let (result, _) = compile_permutations(
                fixtures::rebind_program(),
                &fixtures::main_module(),
                &permutations,
                CompilerOptions::default(),
            );
            black_box(result.ok())
        })
    });
}

criterion_group!(benches, bench_class_count, bench_permutation, bench_rebind_permutations);
criterion_main!(benches);
