//! UCQ rewriter and redundancy cleaner (C6, `spec.md` §4.4).
//!
//! Grounded on
//! `examples/original_source/prototyping_inference_engine/backward_chaining/breadth_first_rewriting.py`
//! (the breadth-first outer loop),
//! `.../backward_chaining/rewriting_operator/without_aggregation_rewriting_operator.py`
//! (one rewriting step built from disjunctive piece-unifiers), and
//! `.../api/query/containment/conjunctive_query_containment.py`
//! (`HomomorphismBasedCQContainment`: equality-atom normalization followed
//! by a two-stage homomorphism check — first the answer atoms, to obtain a
//! seed substitution, then the bodies).

use crate::atom::{Atom, FrozenAtomSet};
use crate::exec_limits::Limits;
use crate::homomorphism::data_source::InMemoryDataSource;
use crate::partition::{PartitionContext, TermPartition};
use crate::piece_unifier::{compute_disjunctive_unifiers, PieceUnifierCache};
use crate::query::ConjunctiveQuery;
use crate::rule::Rule;
use crate::session::HomomorphismAlgorithmProvider;
use crate::substitution::Substitution;
use crate::term::{PredicateFactory, Term, TermFactory};
use std::collections::HashSet;

/// Substitutes fresh variables for every query variable that also occurs
/// somewhere in `rules`, so rewriting never accidentally captures a rule
/// variable.
pub fn safe_rename_vars(
    queries: Vec<ConjunctiveQuery>,
    rules: &[Rule],
    factory: &TermFactory,
) -> Vec<ConjunctiveQuery> {
    let mut rule_vars: Vec<Term> = Vec::new();
    for r in rules {
        rule_vars.extend(r.body().atoms().variables());
        for disjunct in r.head() {
            rule_vars.extend(disjunct.atoms().variables());
        }
    }
    queries
        .into_iter()
        .map(|q| {
            let mut sub = Substitution::new();
            for v in q.atoms().variables() {
                if rule_vars.contains(&v) {
                    sub = sub.extended(v, factory.fresh_variable());
                }
            }
            if sub.is_empty() {
                return q;
            }
            let answer_variables = q.answer_variables().iter().map(|v| sub.apply(v)).collect();
            ConjunctiveQuery::with_pre_substitution(
                q.atoms().apply_substitution(&sub),
                answer_variables,
                q.pre_substitution().clone(),
            )
        })
        .collect()
}

/// Folds equality atoms in `query` into a term partition and applies its
/// induced substitution, dropping the equality atoms. `None` if the
/// equalities are inadmissible (two distinct constants equated) or violate
/// the answer-variable validity check.
fn normalize_equalities(query: &ConjunctiveQuery, pf: &PredicateFactory) -> Option<ConjunctiveQuery> {
    let equality = pf.equality();
    let equality_atoms: Vec<&Atom> = query.atoms().by_predicate(&equality).collect();
    if equality_atoms.is_empty() {
        return Some(query.clone());
    }
    let mut partition = TermPartition::new();
    for atom in &equality_atoms {
        partition.union(&atom.terms()[0], &atom.terms()[1]);
    }
    let ctx = PartitionContext::with_answer_variables(query.answer_variables().iter().cloned());
    let sub = partition.associated_substitution(Some(&ctx))?;
    let atoms: FrozenAtomSet = query
        .atoms()
        .iter()
        .filter(|a| *a.predicate() != equality)
        .map(|a| a.apply_substitution(&sub))
        .collect();
    let answer_variables = query.answer_variables().iter().map(|v| sub.apply(v)).collect();
    let pre_substitution = sub.restrict_to(query.answer_variables());
    Some(ConjunctiveQuery::with_pre_substitution(
        atoms,
        answer_variables,
        pre_substitution,
    ))
}

/// `q1 ⊑ q2`: both have the same answer arity, and there is a homomorphism
/// from `q2`'s body into `q1`'s body agreeing with a homomorphism between
/// the answer atoms (`spec.md` §4.4). The answer atoms are synthesized
/// with a reserved predicate so the homomorphism engine can find the
/// pre-substitution that links `q2`'s answer variables to `q1`'s.
pub fn is_contained_in(
    q1: &ConjunctiveQuery,
    q2: &ConjunctiveQuery,
    pf: &PredicateFactory,
    homomorphism: &dyn HomomorphismAlgorithmProvider,
    limits: &mut Limits,
) -> bool {
    let (n1, n2) = match (normalize_equalities(q1, pf), normalize_equalities(q2, pf)) {
        (None, _) => return true,
        (Some(_), None) => return false,
        (Some(a), Some(b)) => (a, b),
    };
    if n1.arity() != n2.arity() {
        return false;
    }

    let answer_predicate = pf.create_predicate("$answer", n1.arity());
    let answer_atom_1 = Atom::new(answer_predicate.clone(), n1.answer_variables().to_vec())
        .apply_substitution(n1.pre_substitution());
    let answer_atom_2 = Atom::new(answer_predicate, n2.answer_variables().to_vec())
        .apply_substitution(n2.pre_substitution());

    let anchor: FrozenAtomSet = vec![answer_atom_1].into_iter().collect();
    let anchor_source = InMemoryDataSource::new(anchor);
    let pre_sub = match homomorphism.evaluate(
        &[answer_atom_2],
        n2.answer_variables(),
        &Substitution::new(),
        &anchor_source,
        limits,
    ) {
        Ok(result) => match result.value.into_iter().next() {
            Some(sub) => sub,
            None => return false,
        },
        Err(_) => return false,
    };

    let body_source = InMemoryDataSource::new(n1.atoms().clone());
    let body_atoms: Vec<Atom> = n2.atoms().iter().cloned().collect();
    homomorphism
        .exist_homomorphism(&body_atoms, &pre_sub, &body_source, limits)
        .unwrap_or(false)
}

/// The UCQ core: drops `cq1` whenever a distinct `cq2` in the same set has
/// `cq1 ⊑ cq2` — `cq1` is redundant because every answer it could produce is
/// already produced by the more general `cq2`.
pub fn cover(
    queries: Vec<ConjunctiveQuery>,
    factory: &TermFactory,
    homomorphism: &dyn HomomorphismAlgorithmProvider,
    limits: &mut Limits,
) -> Vec<ConjunctiveQuery> {
    let pf = PredicateFactory::new();
    let _ = factory;
    let mut kept = Vec::with_capacity(queries.len());
    'outer: for (i, cq1) in queries.iter().enumerate() {
        for (j, cq2) in queries.iter().enumerate() {
            if i == j {
                continue;
            }
            if is_contained_in(cq1, cq2, &pf, homomorphism, limits) {
                continue 'outer;
            }
        }
        kept.push(cq1.clone());
    }
    kept
}

/// Drops every member of `candidates` that is contained in some member of
/// `reference`.
pub fn remove_more_specific_than(
    candidates: Vec<ConjunctiveQuery>,
    reference: &[ConjunctiveQuery],
    factory: &TermFactory,
    homomorphism: &dyn HomomorphismAlgorithmProvider,
    limits: &mut Limits,
) -> Vec<ConjunctiveQuery> {
    let pf = PredicateFactory::new();
    let _ = factory;
    candidates
        .into_iter()
        .filter(|cq| {
            !reference
                .iter()
                .any(|r| is_contained_in(cq, r, &pf, homomorphism, limits))
        })
        .collect()
}

/// One breadth-first rewriting step (`spec.md` §4.4): for every rule,
/// compute disjunctive piece-unifiers between `new_cqs` and that rule
/// (reusing `caches`, one per rule id, to complete disjunctive heads
/// against CQs already seen in earlier steps), and build a new CQ per
/// unifier.
pub fn rewrite_operator(
    new_cqs: &[ConjunctiveQuery],
    rules: &[Rule],
    caches: &mut [PieceUnifierCache],
) -> Vec<ConjunctiveQuery> {
    let mut rewritten = Vec::new();
    for (rule_id, rule) in rules.iter().enumerate() {
        let disjunctive_unifiers =
            compute_disjunctive_unifiers(&mut caches[rule_id], rule_id, rule, new_cqs);
        for disj in &disjunctive_unifiers {
            let Some(sub) = disj.associated_substitution() else {
                continue;
            };
            let mut atoms: FrozenAtomSet = disj.rule().body().atoms().apply_substitution(&sub);
            for unifier in disj.piece_unifiers() {
                let not_unified = unifier.not_unified_part().apply_substitution(&sub);
                atoms = atoms
                    .iter()
                    .cloned()
                    .chain(not_unified.iter().cloned())
                    .collect();
            }
            let answer_variables: Vec<Term> = disj.piece_unifiers()[0]
                .query()
                .answer_variables()
                .iter()
                .map(|v| sub.apply(v))
                .collect();
            let mut pre_substitution = Substitution::new();
            for v in disj.piece_unifiers()[0].query().answer_variables() {
                let mapped = sub.apply(v);
                if mapped != *v {
                    pre_substitution = pre_substitution.extended(v.clone(), mapped);
                }
            }
            rewritten.push(ConjunctiveQuery::with_pre_substitution(
                atoms,
                answer_variables,
                pre_substitution,
            ));
        }
    }
    rewritten
}

/// The breadth-first saturation loop (`spec.md` §4.4). `rules` are indexed
/// 0..rules.len() for cache-keying purposes; `step_limit` bounds the
/// number of rewriting rounds. Returns the saturated UCQ and whether the
/// loop converged (`false` means the step limit was hit first).
pub fn rewrite(
    input: Vec<ConjunctiveQuery>,
    rules: &[Rule],
    factory: &TermFactory,
    homomorphism: &dyn HomomorphismAlgorithmProvider,
    step_limit: u64,
    limits: &mut Limits,
) -> (Vec<ConjunctiveQuery>, bool) {
    let renamed = safe_rename_vars(input, rules, factory);
    let mut result = cover(renamed, factory, homomorphism, limits);
    let mut new_cqs = result.clone();
    let mut caches: Vec<PieceUnifierCache> = rules.iter().map(|_| PieceUnifierCache::new()).collect();
    let mut step = 0u64;

    while !new_cqs.is_empty() && step < step_limit {
        step += 1;
        let mut step_cqs = rewrite_operator(&new_cqs, rules, &mut caches);
        step_cqs = cover(step_cqs, factory, homomorphism, limits);
        step_cqs = remove_more_specific_than(step_cqs, &result, factory, homomorphism, limits);
        result = remove_more_specific_than(result, &step_cqs, factory, homomorphism, limits);

        let seen: HashSet<usize> = result
            .iter()
            .enumerate()
            .filter(|(_, cq)| step_cqs.iter().any(|s| s == *cq))
            .map(|(i, _)| i)
            .collect();
        let _ = seen;
        for cq in &step_cqs {
            if !result.iter().any(|r| r == cq) {
                result.push(cq.clone());
            }
        }
        new_cqs = step_cqs;

        if limits.tick() {
            return (result, false);
        }
    }
    (result, new_cqs.is_empty())
}
