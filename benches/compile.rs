use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use yang_core::context::{Context, ContextFlags};

fn generate_module(leaves: u32) -> String {
    let mut src = String::from("module bench {\n  namespace \"urn:bench\";\n  prefix b;\n\n");
    for i in 0..leaves {
        src.push_str(&format!(
            "  leaf l{i} {{\n    type string {{\n      length \"1..64\";\n      pattern \"[a-z]+\";\n    }}\n  }}\n\n"
        ));
    }
    src.push_str("}\n");
    src
}

fn criterion_benchmark(c: &mut Criterion) {
    let tree_sizes = [32, 64, 128, 256, 512, 1024];

    let mut group = c.benchmark_group("Context.compile_str() / module size");
    for size in &tree_sizes {
        let source = generate_module(*size);
        group.bench_with_input(BenchmarkId::from_parameter(size), size, |b, _| {
            b.iter(|| {
                let mut ctx = Context::new(ContextFlags::ALL_IMPLEMENTED);
                ctx.compile_str(&source).expect("failed to compile module");
            });
        });
    }
    group.finish();
}

criterion_group!(benches, criterion_benchmark);
criterion_main!(benches);
