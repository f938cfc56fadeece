use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};
use rete_core::{Cond, Field, Pattern, ReteEngine, Rule, Wme};
use std::time::Duration;

fn build_chain_rule(depth: usize) -> Rule {
    let mut conjunction = Vec::with_capacity(depth);
    for i in 0..depth {
        let id_var = Field::var(format!("$e{i}")).unwrap();
        let next_var = if i + 1 < depth {
            Field::var(format!("$e{}", i + 1)).unwrap()
        } else {
            Field::constant("terminal")
        };
        conjunction.push(Cond::Pos(Pattern::new(id_var, Field::constant("next"), next_var)));
    }
    Rule::new("chain", vec![conjunction], |_binding| Ok(()))
}

fn bench_assert_throughput(c: &mut Criterion) {
    let mut group = c.benchmark_group("assert_throughput");
    group.measurement_time(Duration::from_secs(10));
    group.sample_size(10);

    for size in [1_000, 10_000, 100_000].iter() {
        group.bench_with_input(BenchmarkId::new("assert_flat_facts", size), size, |b, &size| {
            b.iter_batched(
                || ReteEngine::new(),
                |mut engine| {
                    for i in 0..size {
                        black_box(
                            engine
                                .assert(Wme::new(format!("e{i}"), "value", format!("{i}")))
                                .unwrap(),
                        );
                    }
                },
                criterion::BatchSize::LargeInput,
            );
        });
    }
    group.finish();
}

fn bench_chain_rule_matching(c: &mut Criterion) {
    let mut group = c.benchmark_group("chain_rule_matching");
    group.measurement_time(Duration::from_secs(10));
    group.sample_size(10);

    for depth in [2, 4, 8].iter() {
        group.bench_with_input(BenchmarkId::new("depth", depth), depth, |b, &depth| {
            b.iter_batched(
                || {
                    let mut engine = ReteEngine::new();
                    engine.add_rule(build_chain_rule(depth)).unwrap();
                    engine
                },
                |mut engine| {
                    for i in 0..depth {
                        let next = if i + 1 < depth { format!("e{}", i + 1) } else { "terminal".to_string() };
                        black_box(engine.assert(Wme::new(format!("e{i}"), "next", next)).unwrap());
                    }
                    black_box(engine.matches("chain").len())
                },
                criterion::BatchSize::SmallInput,
            );
        });
    }
    group.finish();
}

fn bench_retract_cascade(c: &mut Criterion) {
    let mut group = c.benchmark_group("retract_cascade");
    group.measurement_time(Duration::from_secs(10));
    group.sample_size(10);

    group.bench_function("retract_shared_root", |b| {
        b.iter_batched(
            || {
                let mut engine = ReteEngine::new();
                engine.add_rule(build_chain_rule(3)).unwrap();
                let root = Wme::new("root", "next", "mid");
                engine.assert(root.clone()).unwrap();
                engine.assert(Wme::new("mid", "next", "leaf")).unwrap();
                engine.assert(Wme::new("leaf", "next", "terminal")).unwrap();
                (engine, root)
            },
            |(mut engine, root)| black_box(engine.retract(&root)),
            criterion::BatchSize::SmallInput,
        );
    });
    group.finish();
}

criterion_group!(benches, bench_assert_throughput, bench_chain_rule_matching, bench_retract_cascade);
criterion_main!(benches);
