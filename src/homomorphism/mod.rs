//! Homomorphism engine (C4, `spec.md` §4.2): backtracking search for
//! variable→term mappings satisfying a query on a data source, plus the
//! prepared-plan tree for repeated evaluation of a fixed formula shape.
//!
//! Grounded on
//! `examples/original_source/prototyping_inference_engine/api/atom/set/homomorphism/homomorphism_algorithm.py`
//! for the engine/data-source contract; the prepared-plan split in
//! [`plan`] mirrors the tagged-variant `ir::IRNode` tree at
//! `examples/inputlayer-inputlayer/src/ir/mod.rs`.
//!
//! Implemented as bounded recursion (depth = number of query atoms) rather
//! than an explicit backtracking-stack object; query atom counts are small
//! in practice and this reads closer to the textbook algorithm. See
//! `DESIGN.md` for the tradeoff against `spec.md` §9's "prefer explicit
//! stack frames" guidance.

pub mod data_source;
pub mod plan;
pub mod scheduler;

use crate::atom::Atom;
use crate::error::{EngineError, EngineResult, Incomplete};
use crate::exec_limits::Limits;
use crate::substitution::Substitution;
use crate::term::{PredicateFactory, Term, TermData, TermFactory};
use data_source::{BasicQuery, DataSource};
use scheduler::Scheduler;
use std::collections::HashSet;

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

/// Expands function subterms in `atoms`: a functional subterm
/// `f(t1,...,tn)` at some position is replaced by a fresh variable, and an
/// auxiliary atom over a synthetic `f/n+1` predicate is conjoined for a
/// companion function-evaluator data source to resolve (`spec.md` §4.2
/// edge cases).
pub fn expand_function_terms(
    atoms: &[Atom],
    term_factory: &TermFactory,
    predicate_factory: &PredicateFactory,
) -> (Vec<Atom>, Vec<Atom>) {
    let mut expanded = Vec::with_capacity(atoms.len());
    let mut auxiliary = Vec::new();
    for atom in atoms {
        let new_terms = atom
            .terms()
            .iter()
            .map(|t| expand_term(t, term_factory, predicate_factory, &mut auxiliary))
            .collect();
        expanded.push(Atom::new(atom.predicate().clone(), new_terms));
    }
    (expanded, auxiliary)
}

fn expand_term(
    t: &Term,
    term_factory: &TermFactory,
    predicate_factory: &PredicateFactory,
    auxiliary: &mut Vec<Atom>,
) -> Term {
    match t.data() {
        TermData::FunctionTerm { functor, args } => {
            let new_args: Vec<Term> = args
                .iter()
                .map(|a| expand_term(a, term_factory, predicate_factory, auxiliary))
                .collect();
            let fresh = term_factory.fresh_variable();
            let predicate = predicate_factory.create_predicate(functor.clone(), new_args.len() + 1);
            let mut call_args = new_args;
            call_args.push(fresh.clone());
            auxiliary.push(Atom::new(predicate, call_args));
            fresh
        }
        _ => t.clone(),
    }
}

#[allow(clippy::too_many_arguments)]
fn backtrack(
    atoms: &[Atom],
    unsolved: &[usize],
    sub: &Substitution,
    data: &dyn DataSource,
    scheduler: &dyn Scheduler,
    limits: &mut Limits,
    results: &mut Vec<Substitution>,
    seen: &mut HashSet<Vec<(Term, Term)>>,
    answer_variables: &[Term],
    stop_at_first: bool,
) -> EngineResult<bool> {
    if limits.exhausted() {
        return Ok(false);
    }
    if unsolved.is_empty() {
        let restricted = sub.restrict_to(answer_variables);
        if seen.insert(restricted.canonical_pairs()) {
            results.push(restricted);
        }
        return Ok(true);
    }
    limits.tick();
    let choice = scheduler.choose_next(atoms, unsolved, sub, data);
    let atom_idx = unsolved[choice];
    let atom = &atoms[atom_idx];
    let bq = basic_query_for(atom, sub);
    if !data.can_evaluate(&bq) {
        let pattern = data.get_atomic_pattern(atom.predicate());
        if let Some(&missing) = pattern
            .mandatory_positions
            .iter()
            .find(|p| !bq.bound_positions.contains_key(p))
        {
            return Err(EngineError::Dataflow {
                predicate: atom.predicate().name().to_string(),
                position: missing,
            });
        }
        return Ok(true);
    }
    let remaining: Vec<usize> = unsolved
        .iter()
        .copied()
        .filter(|&i| i != atom_idx)
        .collect();
    let mut complete = true;
    for tuple in data.evaluate(&bq) {
        if limits.exhausted() {
            complete = false;
            break;
        }
        let candidate = Atom::new(atom.predicate().clone(), tuple);
        if let Some(refined) = atom.unify_into(&candidate, sub) {
            let ok = backtrack(
                atoms,
                &remaining,
                &refined,
                data,
                scheduler,
                limits,
                results,
                seen,
                answer_variables,
                stop_at_first,
            )?;
            complete &= ok;
            if stop_at_first && !results.is_empty() {
                break;
            }
        }
    }
    Ok(complete)
}

/// Evaluates `query_atoms` against `data`: the lazy-in-spirit (eager here)
/// sequence of substitutions `σ ⊇ initial` with `σ(query_atoms) ⊆ data`,
/// restricted to `answer_variables`.
pub fn evaluate(
    query_atoms: &[Atom],
    answer_variables: &[Term],
    initial: &Substitution,
    data: &dyn DataSource,
    scheduler: &dyn Scheduler,
    limits: &mut Limits,
) -> EngineResult<Incomplete<Vec<Substitution>>> {
    let mut results = Vec::new();
    let mut seen = HashSet::new();
    let unsolved: Vec<usize> = (0..query_atoms.len()).collect();
    let complete = backtrack(
        query_atoms,
        &unsolved,
        initial,
        data,
        scheduler,
        limits,
        &mut results,
        &mut seen,
        answer_variables,
        false,
    )?;
    Ok(if complete {
        Incomplete::complete(results)
    } else {
        Incomplete::partial(results)
    })
}

/// `true` iff at least one homomorphism from `query_atoms` into `data`
/// extending `initial` exists; stops at the first match.
pub fn exist_homomorphism(
    query_atoms: &[Atom],
    initial: &Substitution,
    data: &dyn DataSource,
    scheduler: &dyn Scheduler,
    limits: &mut Limits,
) -> EngineResult<bool> {
    let mut results = Vec::new();
    let mut seen = HashSet::new();
    let unsolved: Vec<usize> = (0..query_atoms.len()).collect();
    backtrack(
        query_atoms,
        &unsolved,
        initial,
        data,
        scheduler,
        limits,
        &mut results,
        &mut seen,
        &[],
        true,
    )?;
    Ok(!results.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::atom::FrozenAtomSet;
    use crate::homomorphism::data_source::InMemoryDataSource;
    use crate::homomorphism::scheduler::MostConstrainedFirstScheduler;
    use crate::term::PredicateFactory;

    #[test]
    fn atomic_query_matches_all_facts() {
        let tf = TermFactory::new();
        let pf = PredicateFactory::new();
        let p = pf.create_predicate("p", 2);
        let a = tf.create_constant("a");
        let b = tf.create_constant("b");
        let c = tf.create_constant("c");
        let x = tf.create_variable("X");
        let y = tf.create_variable("Y");
        let facts: FrozenAtomSet = vec![
            Atom::new(p.clone(), vec![a.clone(), b.clone()]),
            Atom::new(p.clone(), vec![a.clone(), c.clone()]),
        ]
        .into_iter()
        .collect();
        let data = InMemoryDataSource::new(facts);
        let query = [Atom::new(p, vec![x.clone(), y.clone()])];
        let mut limits = Limits::unbounded();
        let result = evaluate(
            &query,
            &[x, y],
            &Substitution::new(),
            &data,
            &MostConstrainedFirstScheduler,
            &mut limits,
        )
        .unwrap();
        assert!(result.complete);
        assert_eq!(result.value.len(), 2);
    }

    #[test]
    fn join_query_filters_by_shared_variable() {
        let tf = TermFactory::new();
        let pf = PredicateFactory::new();
        let parent = pf.create_predicate("parent", 2);
        let male = pf.create_predicate("male", 1);
        let alice = tf.create_constant("alice");
        let bob = tf.create_constant("bob");
        let carol = tf.create_constant("carol");
        let x = tf.create_variable("X");
        let facts: FrozenAtomSet = vec![
            Atom::new(parent.clone(), vec![alice.clone(), bob.clone()]),
            Atom::new(parent.clone(), vec![bob.clone(), carol]),
            Atom::new(male.clone(), vec![bob.clone()]),
        ]
        .into_iter()
        .collect();
        let data = InMemoryDataSource::new(facts);
        let query = [
            Atom::new(parent, vec![alice, x.clone()]),
            Atom::new(male, vec![x.clone()]),
        ];
        let mut limits = Limits::unbounded();
        let result = evaluate(
            &query,
            &[x],
            &Substitution::new(),
            &data,
            &MostConstrainedFirstScheduler,
            &mut limits,
        )
        .unwrap();
        assert_eq!(result.value.len(), 1);
        assert_eq!(result.value[0].apply(&bob_var(&tf)), bob_term(&tf));
    }

    fn bob_var(tf: &TermFactory) -> Term {
        tf.create_variable("X")
    }
    fn bob_term(tf: &TermFactory) -> Term {
        tf.create_constant("bob")
    }

    #[test]
    fn exist_homomorphism_short_circuits() {
        let tf = TermFactory::new();
        let pf = PredicateFactory::new();
        let p = pf.create_predicate("p", 1);
        let a = tf.create_constant("a");
        let x = tf.create_variable("X");
        let facts: FrozenAtomSet = vec![Atom::new(p.clone(), vec![a])].into_iter().collect();
        let data = InMemoryDataSource::new(facts);
        let query = [Atom::new(p, vec![x])];
        let mut limits = Limits::unbounded();
        let found = exist_homomorphism(
            &query,
            &Substitution::new(),
            &data,
            &MostConstrainedFirstScheduler,
            &mut limits,
        )
        .unwrap();
        assert!(found);
    }

    #[test]
    fn function_term_expansion_introduces_auxiliary_atom() {
        let tf = TermFactory::new();
        let pf = PredicateFactory::new();
        let p = pf.create_predicate("p", 1);
        let x = tf.create_variable("X");
        let g = tf.create_function_term("g", vec![x]);
        let atom = Atom::new(p, vec![g]);
        let (expanded, aux) = expand_function_terms(&[atom], &tf, &pf);
        assert_eq!(expanded.len(), 1);
        assert_eq!(aux.len(), 1);
        assert_eq!(aux[0].predicate().arity(), 2);
    }

    #[test]
    fn step_bound_marks_result_incomplete() {
        let tf = TermFactory::new();
        let pf = PredicateFactory::new();
        let p = pf.create_predicate("p", 1);
        let x = tf.create_variable("X");
        let facts: FrozenAtomSet = (0..50)
            .map(|i| Atom::new(p.clone(), vec![tf.create_constant(format!("c{i}"))]))
            .collect();
        let data = InMemoryDataSource::new(facts);
        let query = [Atom::new(p, vec![x.clone()])];
        let mut limits = Limits::unbounded().with_max_steps(1);
        let result = evaluate(
            &query,
            &[x],
            &Substitution::new(),
            &data,
            &MostConstrainedFirstScheduler,
            &mut limits,
        )
        .unwrap();
        assert!(!result.complete);
    }
}
