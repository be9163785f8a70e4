//! Benchmarks for kbase_logic
//!
//! Run with: cargo bench -p kbase_logic

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use kbase_logic::{
    fact_set, AgendaPolicy, BackwardChainer, FactGraph, ForwardChainer, Rule, RuleGraph,
    RuleOrder, RuleSet, Samples, SelectionPolicy,
};

/// `x0 -> x1 -> ... -> xN` plus a side rule per link.
fn chain(len: usize) -> RuleSet {
    let mut rules = Vec::with_capacity(len * 2);
    for i in 0..len {
        rules.push(
            Rule::new((2 * i + 1) as u32, [format!("x{}", i)], format!("x{}", i + 1)).unwrap(),
        );
        rules.push(
            Rule::new(
                (2 * i + 2) as u32,
                [format!("x{}", i), format!("y{}", i)],
                format!("side{}", i),
            )
            .unwrap(),
        );
    }
    RuleSet::from_rules(rules).unwrap()
}

fn bench_forward(c: &mut Criterion) {
    let mut group = c.benchmark_group("forward");
    let facts = fact_set(["x0"]);

    for size in [10, 50, 200].iter() {
        let rules = chain(*size);
        for selection in [SelectionPolicy::Agenda, SelectionPolicy::Min, SelectionPolicy::Fpg] {
            group.bench_with_input(
                BenchmarkId::new(selection.to_string(), size),
                &rules,
                |b, rules| {
                    b.iter(|| {
                        ForwardChainer::new(rules)
                            .agenda(AgendaPolicy::Queue)
                            .selection(selection)
                            .run(black_box(&facts), None)
                            .unwrap()
                    });
                },
            );
        }
    }

    group.finish();
}

fn bench_backward(c: &mut Criterion) {
    let mut group = c.benchmark_group("backward");
    let facts = fact_set(["x0"]);

    for size in [10, 50, 200].iter() {
        let rules = chain(*size);
        let goal = format!("x{}", size);
        group.bench_with_input(BenchmarkId::new("min", size), &rules, |b, rules| {
            b.iter(|| {
                BackwardChainer::new(rules)
                    .order(RuleOrder::Min)
                    .prove(black_box(&goal), &facts)
                    .unwrap()
            });
        });
    }

    let kb = Samples::backward_demo();
    group.bench_function("demo_fpg", |b| {
        b.iter(|| {
            BackwardChainer::new(&kb.rules)
                .order(RuleOrder::Fpg)
                .prove(black_box("f"), &kb.facts)
                .unwrap()
        });
    });

    group.finish();
}

fn bench_graphs(c: &mut Criterion) {
    let rules = chain(100);

    c.bench_function("fpg_build", |b| {
        b.iter(|| FactGraph::build(black_box(&rules)));
    });

    c.bench_function("rpg_build", |b| {
        b.iter(|| RuleGraph::build(black_box(&rules)));
    });

    let fpg = FactGraph::build(&rules);
    c.bench_function("fpg_distance", |b| {
        b.iter(|| fpg.distance(black_box("x0"), black_box("x100")));
    });
}

criterion_group!(benches, bench_forward, bench_backward, bench_graphs);
criterion_main!(benches);
