//! UCQ rewriting benchmarks: saturating a linear rule chain and a
//! fan-out of independent rules, scaled by chain/fan-out length.

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use ruleweave::atom::Atom;
use ruleweave::query::ConjunctiveQuery;
use ruleweave::rewriting::rewrite;
use ruleweave::rule::Rule;
use ruleweave::{Limits, Session};
use std::time::Duration;

fn bench_linear_chain_rewriting(c: &mut Criterion) {
    let mut group = c.benchmark_group("linear_chain_rewriting");
    for depth in [5usize, 10, 20] {
        let session = Session::new();
        let tf = session.term_factory();
        let pf = session.predicate_factory();
        let x = tf.create_variable("X");

        let predicates: Vec<_> = (0..=depth).map(|i| pf.create_predicate(format!("p{i}"), 1)).collect();
        let rules: Vec<Rule> = (0..depth)
            .map(|i| {
                let body = ConjunctiveQuery::new(
                    vec![Atom::new(predicates[i].clone(), vec![x.clone()])].into_iter().collect(),
                    vec![x.clone()],
                );
                let head = ConjunctiveQuery::new(
                    vec![Atom::new(predicates[i + 1].clone(), vec![x.clone()])].into_iter().collect(),
                    vec![x.clone()],
                );
                Rule::new(body, vec![head])
            })
            .collect();
        let query = ConjunctiveQuery::new(
            vec![Atom::new(predicates[depth].clone(), vec![x.clone()])].into_iter().collect(),
            vec![x.clone()],
        );

        group.bench_with_input(BenchmarkId::from_parameter(depth), &depth, |b, _| {
            b.iter(|| {
                let mut limits = Limits::unbounded();
                rewrite(
                    vec![query.clone()],
                    &rules,
                    tf,
                    session.homomorphism_provider(),
                    depth as u64 + 1,
                    &mut limits,
                )
            });
        });
    }
    group.finish();
}

fn bench_fan_out_rewriting(c: &mut Criterion) {
    let mut group = c.benchmark_group("fan_out_rewriting");
    for width in [5usize, 10, 20] {
        let session = Session::new();
        let tf = session.term_factory();
        let pf = session.predicate_factory();
        let x = tf.create_variable("X");
        let y = tf.create_variable("Y");
        let target = pf.create_predicate("target", 1);

        let rules: Vec<Rule> = (0..width)
            .map(|i| {
                let source = pf.create_predicate(format!("src{i}"), 2);
                let body = ConjunctiveQuery::new(
                    vec![Atom::new(source, vec![x.clone(), y.clone()])].into_iter().collect(),
                    vec![x.clone()],
                );
                let head = ConjunctiveQuery::new(
                    vec![Atom::new(target.clone(), vec![x.clone()])].into_iter().collect(),
                    vec![x.clone()],
                );
                Rule::new(body, vec![head])
            })
            .collect();
        let query = ConjunctiveQuery::new(
            vec![Atom::new(target.clone(), vec![x.clone()])].into_iter().collect(),
            vec![x.clone()],
        );

        group.bench_with_input(BenchmarkId::from_parameter(width), &width, |b, _| {
            b.iter(|| {
                let mut limits = Limits::unbounded();
                rewrite(vec![query.clone()], &rules, tf, session.homomorphism_provider(), 2, &mut limits)
            });
        });
    }
    group.finish();
}

criterion_group! {
    name = benches;
    config = Criterion::default()
        .measurement_time(Duration::from_secs(10))
        .warm_up_time(Duration::from_secs(3));
    targets = bench_linear_chain_rewriting, bench_fan_out_rewriting
}
criterion_main!(benches);
