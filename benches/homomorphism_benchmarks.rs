//! Homomorphism engine benchmarks: atomic scan, two-atom join, and a
//! transitive-chain conjunctive query, scaled by fact-base size. Grounded in
//! style on `examples/inputlayer-inputlayer/benches/query_benchmarks.rs`.

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use ruleweave::atom::{Atom, FrozenAtomSet};
use ruleweave::homomorphism::data_source::InMemoryDataSource;
use ruleweave::{Limits, Session, Substitution};
use std::time::Duration;

fn bench_atomic_scan(c: &mut Criterion) {
    let mut group = c.benchmark_group("atomic_scan");
    for size in [100u32, 1_000, 10_000] {
        let session = Session::new();
        let tf = session.term_factory();
        let pf = session.predicate_factory();
        let p = pf.create_predicate("p", 1);
        let facts: FrozenAtomSet = (0..size)
            .map(|i| Atom::new(p.clone(), vec![tf.create_constant(format!("c{i}"))]))
            .collect();
        let data = InMemoryDataSource::new(facts);
        let x = tf.create_variable("X");
        let query = vec![Atom::new(p.clone(), vec![x.clone()])];

        group.bench_with_input(BenchmarkId::from_parameter(size), &size, |b, _| {
            b.iter(|| {
                let mut limits = Limits::unbounded();
                session
                    .homomorphism_provider()
                    .evaluate(&query, &[x.clone()], &Substitution::new(), &data, &mut limits)
                    .unwrap()
            });
        });
    }
    group.finish();
}

fn bench_two_way_join(c: &mut Criterion) {
    let mut group = c.benchmark_group("two_way_join");
    for size in [100u32, 1_000] {
        let session = Session::new();
        let tf = session.term_factory();
        let pf = session.predicate_factory();
        let edge = pf.create_predicate("edge", 2);
        let active = pf.create_predicate("active", 1);

        let mut atoms = Vec::new();
        for i in 0..size {
            atoms.push(Atom::new(
                edge.clone(),
                vec![tf.create_constant(format!("n{i}")), tf.create_constant(format!("n{}", i + 1))],
            ));
        }
        for i in 0..=size {
            atoms.push(Atom::new(active.clone(), vec![tf.create_constant(format!("n{i}"))]));
        }
        let data = InMemoryDataSource::new(atoms.into_iter().collect());

        let x = tf.create_variable("X");
        let y = tf.create_variable("Y");
        let query = vec![
            Atom::new(edge.clone(), vec![x.clone(), y.clone()]),
            Atom::new(active.clone(), vec![x.clone()]),
        ];

        group.bench_with_input(BenchmarkId::from_parameter(size), &size, |b, _| {
            b.iter(|| {
                let mut limits = Limits::unbounded();
                session
                    .homomorphism_provider()
                    .evaluate(&query, &[x.clone(), y.clone()], &Substitution::new(), &data, &mut limits)
                    .unwrap()
            });
        });
    }
    group.finish();
}

fn bench_transitive_chain_query(c: &mut Criterion) {
    let mut group = c.benchmark_group("transitive_chain_query");
    // Kept small: the conjunctive query itself grows with chain length, so
    // the search space is exponential in the naive (non-rewritten) plan.
    for hops in [3usize, 5, 7] {
        let session = Session::new();
        let tf = session.term_factory();
        let pf = session.predicate_factory();
        let edge = pf.create_predicate("edge", 2);

        let chain_len = 200u32;
        let facts: FrozenAtomSet = (0..chain_len)
            .map(|i| {
                Atom::new(
                    edge.clone(),
                    vec![tf.create_constant(format!("n{i}")), tf.create_constant(format!("n{}", i + 1))],
                )
            })
            .collect();
        let data = InMemoryDataSource::new(facts);

        let vars: Vec<_> = (0..=hops).map(|i| tf.create_variable(format!("V{i}"))).collect();
        let query: Vec<Atom> = vars
            .windows(2)
            .map(|w| Atom::new(edge.clone(), vec![w[0].clone(), w[1].clone()]))
            .collect();

        group.bench_with_input(BenchmarkId::from_parameter(hops), &hops, |b, _| {
            b.iter(|| {
                let mut limits = Limits::unbounded();
                session
                    .homomorphism_provider()
                    .evaluate(&query, &[vars[0].clone(), vars[hops].clone()], &Substitution::new(), &data, &mut limits)
                    .unwrap()
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
    targets = bench_atomic_scan, bench_two_way_join, bench_transitive_chain_query
}
criterion_main!(benches);
