//! Incremental piece-unifier cache (`spec.md` §4.3).
//!
//! `Rule` carries no `Hash`/`Eq` (rules are typically large and compared by
//! identity, not structure), so entries are keyed by a caller-supplied rule
//! identifier rather than the `Rule` value itself — grounded on
//! `examples/original_source/prototyping_inference_engine/unifier/disjunctive_piece_unifier_algorithm.py`,
//! whose `PieceUnifierCache` plays the same role (`initialize_rule`,
//! `has_unifiers_for_head`, `store`, `get_by_instantiation`, `cleanup`) keyed
//! implicitly by Python object identity.

use super::mono::PieceUnifier;
use crate::query::ConjunctiveQuery;
use crate::term::Term;
use std::collections::{HashMap, HashSet};

type FrontierInstantiation = Vec<Option<Term>>;

#[derive(Default)]
pub struct PieceUnifierCache {
    unifiers: HashMap<(usize, usize, FrontierInstantiation), Vec<PieceUnifier>>,
    has_unifiers: HashSet<(usize, usize)>,
    known_heads: HashMap<usize, usize>,
    by_cq: HashMap<ConjunctiveQuery, Vec<(usize, usize, FrontierInstantiation)>>,
}

impl PieceUnifierCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `rule_id` as having `head_count` head disjuncts, so
    /// `has_unifiers_for_all_heads` has something to compare against.
    pub fn initialize_rule(&mut self, rule_id: usize, head_count: usize) {
        self.known_heads.entry(rule_id).or_insert(head_count);
    }

    pub fn mark_has_unifiers(&mut self, rule_id: usize, head_index: usize) {
        self.has_unifiers.insert((rule_id, head_index));
    }

    pub fn has_unifiers_for_head(&self, rule_id: usize, head_index: usize) -> bool {
        self.has_unifiers.contains(&(rule_id, head_index))
    }

    pub fn has_unifiers_for_all_heads(&self, rule_id: usize) -> bool {
        match self.known_heads.get(&rule_id) {
            Some(&count) => (0..count).all(|h| self.has_unifiers_for_head(rule_id, h)),
            None => false,
        }
    }

    pub fn store(
        &mut self,
        cq: &ConjunctiveQuery,
        rule_id: usize,
        head_index: usize,
        instantiation: FrontierInstantiation,
        unifier: PieceUnifier,
    ) {
        let key = (rule_id, head_index, instantiation);
        self.unifiers.entry(key.clone()).or_default().push(unifier);
        self.by_cq.entry(cq.clone()).or_default().push(key);
    }

    pub fn get_by_instantiation(
        &self,
        rule_id: usize,
        head_index: usize,
        instantiation: &[Option<Term>],
    ) -> &[PieceUnifier] {
        self.unifiers
            .get(&(rule_id, head_index, instantiation.to_vec()))
            .map_or(&[], Vec::as_slice)
    }

    /// Drops every cached entry whose originating CQ is no longer in
    /// `live_cqs` — called when a rewriting round retires subsumed CQs.
    pub fn cleanup(&mut self, live_cqs: &HashSet<ConjunctiveQuery>) {
        let stale: Vec<ConjunctiveQuery> = self
            .by_cq
            .keys()
            .filter(|cq| !live_cqs.contains(*cq))
            .cloned()
            .collect();
        for cq in stale {
            if let Some(keys) = self.by_cq.remove(&cq) {
                for key in keys {
                    if let Some(entries) = self.unifiers.get_mut(&key) {
                        entries.retain(|u| u.query() != &cq);
                        if entries.is_empty() {
                            self.unifiers.remove(&key);
                        }
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::atom::Atom;
    use crate::piece_unifier::mono::mono_piece_unifiers;
    use crate::rule::Rule;
    use crate::term::{PredicateFactory, TermFactory};

    #[test]
    fn store_then_get_by_instantiation_round_trips() {
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
        let unifiers = mono_piece_unifiers(&query, &rule, 0);
        let mut cache = PieceUnifierCache::new();
        cache.initialize_rule(1, 1);
        cache.store(&query, 1, 0, vec![None], unifiers[0].clone());
        assert_eq!(cache.get_by_instantiation(1, 0, &[None]).len(), 1);
        assert!(!cache.has_unifiers_for_all_heads(1));
        cache.mark_has_unifiers(1, 0);
        assert!(cache.has_unifiers_for_all_heads(1));
    }

    #[test]
    fn cleanup_drops_entries_for_retired_cqs() {
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
        let unifiers = mono_piece_unifiers(&query, &rule, 0);
        let mut cache = PieceUnifierCache::new();
        cache.store(&query, 1, 0, vec![None], unifiers[0].clone());
        cache.cleanup(&HashSet::new());
        assert!(cache.get_by_instantiation(1, 0, &[None]).is_empty());
    }
}
