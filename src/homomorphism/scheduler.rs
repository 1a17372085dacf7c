//! Atom-ordering strategies for the backtracking homomorphism search
//! (`spec.md` §4.2, step 1).

use super::data_source::{BasicQuery, DataSource};
use crate::atom::Atom;
use crate::substitution::Substitution;

/// Chooses, among the atoms not yet solved, which one to ground next.
pub trait Scheduler: Send + Sync {
    /// Returns an index into `unsolved` (not into `atoms`).
    fn choose_next(
        &self,
        atoms: &[Atom],
        unsolved: &[usize],
        sub: &Substitution,
        data: &dyn DataSource,
    ) -> usize;
}

fn basic_query_for(atom: &Atom, sub: &Substitution) -> BasicQuery {
    let mut query = BasicQuery::new(atom.predicate().clone());
    for (pos, term) in atom.terms().iter().enumerate() {
        let bound = sub.apply(term);
        if bound.is_ground() {
            query.bound_positions.insert(pos, bound);
        } else if bound.is_variable() {
            query.answer_positions.insert(pos, bound);
        }
    }
    query
}

/// The default: picks the unsolved atom with the smallest estimated
/// candidate count under the current substitution (most constrained
/// first), with "unknown" (`None`) treated as maximally unattractive.
#[derive(Debug, Clone, Copy, Default)]
pub struct MostConstrainedFirstScheduler;

impl Scheduler for MostConstrainedFirstScheduler {
    fn choose_next(
        &self,
        atoms: &[Atom],
        unsolved: &[usize],
        sub: &Substitution,
        data: &dyn DataSource,
    ) -> usize {
        unsolved
            .iter()
            .enumerate()
            .min_by_key(|&(_, &atom_idx)| {
                let bq = basic_query_for(&atoms[atom_idx], sub);
                data.estimate_bound(&bq).unwrap_or(usize::MAX)
            })
            .map_or(0, |(i, _)| i)
    }
}

/// Always picks the first remaining atom, in query order — reproducible,
/// used in tests and by callers that want deterministic atom order
/// regardless of data-source statistics.
#[derive(Debug, Clone, Copy, Default)]
pub struct SequentialScheduler;

impl Scheduler for SequentialScheduler {
    fn choose_next(
        &self,
        _atoms: &[Atom],
        _unsolved: &[usize],
        _sub: &Substitution,
        _data: &dyn DataSource,
    ) -> usize {
        0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::homomorphism::data_source::InMemoryDataSource;
    use crate::term::{PredicateFactory, TermFactory};

    #[test]
    fn sequential_scheduler_always_picks_first() {
        let tf = TermFactory::new();
        let pf = PredicateFactory::new();
        let p = pf.create_predicate("p", 1);
        let x = tf.create_variable("X");
        let atoms = vec![Atom::new(p, vec![x])];
        let data = InMemoryDataSource::default();
        let scheduler = SequentialScheduler;
        assert_eq!(
            scheduler.choose_next(&atoms, &[0], &Substitution::new(), &data),
            0
        );
    }

    #[test]
    fn most_constrained_first_prefers_smaller_candidate_set() {
        let tf = TermFactory::new();
        let pf = PredicateFactory::new();
        let p = pf.create_predicate("p", 1);
        let q = pf.create_predicate("q", 1);
        let x = tf.create_variable("X");
        let y = tf.create_variable("Y");
        let a = tf.create_constant("a");
        let atoms_data: crate::atom::FrozenAtomSet = vec![
            Atom::new(p.clone(), vec![a.clone()]),
            Atom::new(q.clone(), vec![a.clone()]),
            Atom::new(q.clone(), vec![tf.create_constant("b")]),
        ]
        .into_iter()
        .collect();
        let data = InMemoryDataSource::new(atoms_data);
        let atoms = vec![Atom::new(p, vec![x]), Atom::new(q, vec![y])];
        let scheduler = MostConstrainedFirstScheduler;
        let chosen = scheduler.choose_next(&atoms, &[0, 1], &Substitution::new(), &data);
        assert_eq!(chosen, 0);
    }
}
