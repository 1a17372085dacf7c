//! Disjunctive piece unifiers: one full piece-unifier per head disjunct,
//! jointly consistent on the rule's frontier (`spec.md` §4.3).
//!
//! Grounded on
//! `examples/original_source/prototyping_inference_engine/unifier/disjunctive_piece_unifier_algorithm.py`
//! (`_extend`'s per-head cache-backed extension loop) and
//! `.../unifier/disjunctive_piece_unifier.py` (`associated_partition` /
//! `associated_substitution`). The frontier used for cache keying is the
//! rule's whole frontier (`Rule::frontier`) rather than a per-disjunct one —
//! a deliberate simplification consistent with how [`crate::rule::Rule`]
//! already defines frontier globally across all head disjuncts.

use super::cache::PieceUnifierCache;
use super::mono::{mono_piece_unifiers, PieceUnifier};
use crate::partition::{PartitionContext, TermPartition};
use crate::query::ConjunctiveQuery;
use crate::rule::Rule;
use crate::substitution::Substitution;
use crate::term::Term;
use std::collections::HashSet;

/// A disjunctive piece unifier: one [`PieceUnifier`] per head disjunct of
/// `rule`, jointly consistent through a shared term partition.
#[derive(Debug, Clone)]
pub struct DisjunctivePieceUnifier {
    rule: Rule,
    piece_unifiers: Vec<PieceUnifier>,
}

impl DisjunctivePieceUnifier {
    pub fn rule(&self) -> &Rule {
        &self.rule
    }

    pub fn piece_unifiers(&self) -> &[PieceUnifier] {
        &self.piece_unifiers
    }

    pub fn associated_partition(&self) -> TermPartition {
        let mut part = TermPartition::new();
        for p in &self.piece_unifiers {
            part.join(p.partition());
        }
        part
    }

    pub fn associated_substitution(&self) -> Option<Substitution> {
        let mut head_existentials = HashSet::new();
        let mut answer_variables = HashSet::new();
        for (index, unifier) in self.piece_unifiers.iter().enumerate() {
            head_existentials.extend(self.rule.head_existentials(index));
            answer_variables.extend(unifier.query().answer_variables().iter().cloned());
        }
        let ctx = PartitionContext {
            head_existentials,
            answer_variables,
        };
        self.associated_partition().associated_substitution(Some(&ctx))
    }
}

fn frontier_instantiation(rule: &Rule, partition: &TermPartition) -> Vec<Option<Term>> {
    rule.frontier()
        .iter()
        .map(|v| {
            let rep = partition.find(v);
            if rep.is_ground() {
                Some(rep)
            } else {
                None
            }
        })
        .collect()
}

fn joined_partition(partial: &[Option<PieceUnifier>]) -> TermPartition {
    let mut part = TermPartition::new();
    for p in partial.iter().flatten() {
        part.join(p.partition());
    }
    part
}

#[allow(clippy::too_many_arguments)]
fn extend(
    cache: &PieceUnifierCache,
    rule_id: usize,
    rule: &Rule,
    skip_head: usize,
    partial: &mut Vec<Option<PieceUnifier>>,
    current_head: usize,
    result: &mut Vec<DisjunctivePieceUnifier>,
) {
    if current_head == rule.head().len() {
        let piece_unifiers = partial
            .iter()
            .cloned()
            .map(|p| p.expect("every head slot filled by the time current_head reaches head().len()"))
            .collect();
        result.push(DisjunctivePieceUnifier {
            rule: rule.clone(),
            piece_unifiers,
        });
        return;
    }
    if current_head == skip_head {
        extend(cache, rule_id, rule, skip_head, partial, current_head + 1, result);
        return;
    }
    let instantiation = frontier_instantiation(rule, &joined_partition(partial));
    for unifier in cache.get_by_instantiation(rule_id, current_head, &instantiation) {
        partial[current_head] = Some(unifier.clone());
        extend(cache, rule_id, rule, skip_head, partial, current_head + 1, result);
        partial[current_head] = None;
    }
}

/// Computes disjunctive piece unifiers of `rule` against `new_cqs`,
/// consulting and updating `cache` (keyed by `rule_id`, a caller-assigned
/// stable identifier for `rule` — see [`PieceUnifierCache`]). Only unifiers
/// that consume a full conjunctive query (not merely one of its pieces)
/// participate in a disjunctive unifier, matching
/// `_compute_full_unifiers_of_a_cq` in the source algorithm.
pub fn compute_disjunctive_unifiers(
    cache: &mut PieceUnifierCache,
    rule_id: usize,
    rule: &Rule,
    new_cqs: &[ConjunctiveQuery],
) -> Vec<DisjunctivePieceUnifier> {
    cache.initialize_rule(rule_id, rule.head().len());
    let mut result = Vec::new();

    for head_index in 0..rule.head().len() {
        let full_unifiers: Vec<(PieceUnifier, ConjunctiveQuery)> = new_cqs
            .iter()
            .flat_map(|cq| {
                mono_piece_unifiers(cq, rule, head_index)
                    .into_iter()
                    .filter(|u| u.unified_query_part().len() == cq.atoms().len())
                    .map(|u| (u, cq.clone()))
                    .collect::<Vec<_>>()
            })
            .collect();

        if !full_unifiers.is_empty() && !cache.has_unifiers_for_head(rule_id, head_index) {
            cache.mark_has_unifiers(rule_id, head_index);
        }

        if cache.has_unifiers_for_all_heads(rule_id) {
            for (fpu, _) in &full_unifiers {
                let mut partial: Vec<Option<PieceUnifier>> = vec![None; rule.head().len()];
                partial[head_index] = Some(fpu.clone());
                extend(cache, rule_id, rule, head_index, &mut partial, 0, &mut result);
            }
        }

        for (fpu, cq) in &full_unifiers {
            let instantiation = frontier_instantiation(rule, fpu.partition());
            cache.store(cq, rule_id, head_index, instantiation, fpu.clone());
        }
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::atom::Atom;
    use crate::term::{PredicateFactory, TermFactory};

    #[test]
    fn conjunctive_rule_yields_one_disjunctive_unifier_per_full_match() {
        let tf = TermFactory::new();
        let pf = PredicateFactory::new();
        let q = pf.create_predicate("q", 1);
        let p = pf.create_predicate("p", 1);
        let x = tf.create_variable("X");
        let body = ConjunctiveQuery::new(
            vec![Atom::new(p, vec![x.clone()])].into_iter().collect(),
            vec![x.clone()],
        );
        let head = ConjunctiveQuery::new(
            vec![Atom::new(q.clone(), vec![x.clone()])].into_iter().collect(),
            vec![x],
        );
        let rule = Rule::new(body, vec![head]);

        let query_x = tf.create_variable("X2");
        let query = ConjunctiveQuery::new(
            vec![Atom::new(q, vec![query_x.clone()])].into_iter().collect(),
            vec![query_x],
        );
        let mut cache = PieceUnifierCache::new();
        let result = compute_disjunctive_unifiers(&mut cache, 1, &rule, &[query]);
        assert_eq!(result.len(), 1);
        assert_eq!(result[0].piece_unifiers().len(), 1);
        assert!(result[0].associated_substitution().is_some());
    }

    #[test]
    fn disjunctive_rule_waits_for_both_heads_before_emitting() {
        let tf = TermFactory::new();
        let pf = PredicateFactory::new();
        let p = pf.create_predicate("p", 1);
        let q1 = pf.create_predicate("q1", 1);
        let q2 = pf.create_predicate("q2", 1);
        let x = tf.create_variable("X");
        let body = ConjunctiveQuery::new(
            vec![Atom::new(p, vec![x.clone()])].into_iter().collect(),
            vec![x.clone()],
        );
        let head1 = ConjunctiveQuery::new(
            vec![Atom::new(q1.clone(), vec![x.clone()])].into_iter().collect(),
            vec![x.clone()],
        );
        let head2 = ConjunctiveQuery::new(
            vec![Atom::new(q2.clone(), vec![x.clone()])].into_iter().collect(),
            vec![x],
        );
        let rule = Rule::new(body, vec![head1, head2]);

        let qx = tf.create_variable("X2");
        let query1 = ConjunctiveQuery::new(
            vec![Atom::new(q1, vec![qx.clone()])].into_iter().collect(),
            vec![qx.clone()],
        );
        let mut cache = PieceUnifierCache::new();
        let first_round = compute_disjunctive_unifiers(&mut cache, 1, &rule, &[query1]);
        assert!(first_round.is_empty(), "only one head has unifiers so far");

        let query2 = ConjunctiveQuery::new(
            vec![Atom::new(q2, vec![qx.clone()])].into_iter().collect(),
            vec![qx],
        );
        let second_round = compute_disjunctive_unifiers(&mut cache, 1, &rule, &[query2]);
        assert_eq!(second_round.len(), 1);
        assert_eq!(second_round[0].piece_unifiers().len(), 2);
    }
}
