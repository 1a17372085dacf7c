//! Term partition (C3): union-find over terms with a typed representative
//! discipline, admissibility, and the induced substitution (`spec.md` §4.1).
//!
//! Grounded on
//! `examples/original_source/prototyping_inference_engine/api/atom/term/term_partition.py`:
//! representative choice prefers constants over variables
//! (`comparison_priority`), admissibility means at most one ground term per
//! class, and `associated_substitution` swaps in an answer variable as
//! representative only when the current representative is an unconstrained
//! (non-answer) variable.

use crate::substitution::Substitution;
use crate::term::Term;
use std::cell::Cell;
use std::collections::{HashMap, HashSet};

/// Rule/query context `is_valid` and `associated_substitution` need: which
/// variables are head-existentials of the rule under consideration, and
/// which are answer variables of the query being normalized.
#[derive(Debug, Clone, Default)]
pub struct PartitionContext {
    pub head_existentials: HashSet<Term>,
    pub answer_variables: HashSet<Term>,
}

impl PartitionContext {
    pub fn with_answer_variables(answer_variables: impl IntoIterator<Item = Term>) -> Self {
        PartitionContext {
            head_existentials: HashSet::new(),
            answer_variables: answer_variables.into_iter().collect(),
        }
    }

    pub fn with_head_existentials(head_existentials: impl IntoIterator<Item = Term>) -> Self {
        PartitionContext {
            head_existentials: head_existentials.into_iter().collect(),
            answer_variables: HashSet::new(),
        }
    }
}

/// Union-find over [`Term`]s. Classes are stored as explicit member lists
/// (some dead after merges, skipped on iteration) rather than a classic
/// path-compressed forest, since `classes()`/`associated_substitution` need
/// to walk full membership anyway and partitions here are small (one per
/// piece-unifier or containment check).
#[derive(Debug, Clone, Default)]
pub struct TermPartition {
    classes: Vec<Vec<Term>>,
    index: HashMap<Term, usize>,
    admissible_cache: Cell<Option<bool>>,
}

impl TermPartition {
    pub fn new() -> Self {
        Self::default()
    }

    fn ensure(&mut self, t: &Term) -> usize {
        if let Some(&idx) = self.index.get(t) {
            return idx;
        }
        let idx = self.classes.len();
        self.classes.push(vec![t.clone()]);
        self.index.insert(t.clone(), idx);
        idx
    }

    /// Merges the classes of `a` and `b`, creating singleton classes first
    /// if either term is new.
    pub fn union(&mut self, a: &Term, b: &Term) {
        self.admissible_cache.set(None);
        let ia = self.ensure(a);
        let ib = self.ensure(b);
        if ia == ib {
            return;
        }
        let (keep, drop) = if self.classes[ia].len() >= self.classes[ib].len() {
            (ia, ib)
        } else {
            (ib, ia)
        };
        let moved = std::mem::take(&mut self.classes[drop]);
        for t in &moved {
            self.index.insert(t.clone(), keep);
        }
        self.classes[keep].extend(moved);
    }

    /// The class representative for `t`: the member minimizing
    /// `comparison_priority` (constants before variables), tie-broken by
    /// `Term`'s total order. Returns `t` itself if unknown to the
    /// partition.
    pub fn find(&self, t: &Term) -> Term {
        match self.index.get(t) {
            Some(&idx) => Self::representative_of(&self.classes[idx]),
            None => t.clone(),
        }
    }

    fn representative_of(class: &[Term]) -> Term {
        class
            .iter()
            .min_by(|a, b| {
                a.comparison_priority()
                    .cmp(&b.comparison_priority())
                    .then_with(|| a.cmp(b))
            })
            .cloned()
            .expect("partition classes are never empty")
    }

    /// Point-wise `union` over every pair of co-class members of `other`.
    pub fn join(&mut self, other: &TermPartition) {
        for class in &other.classes {
            if let Some((first, rest)) = class.split_first() {
                for t in rest {
                    self.union(first, t);
                }
            }
        }
    }

    /// Non-empty classes, each as a member list (unordered).
    pub fn classes(&self) -> Vec<&[Term]> {
        self.classes.iter().filter(|c| !c.is_empty()).map(Vec::as_slice).collect()
    }

    /// At most one distinct ground term per class.
    pub fn is_admissible(&self) -> bool {
        if let Some(cached) = self.admissible_cache.get() {
            return cached;
        }
        let result = self.classes().into_iter().all(|class| {
            let mut grounds: Vec<&Term> = class.iter().filter(|t| t.is_ground()).collect();
            grounds.dedup_by(|a, b| a == b);
            grounds.sort();
            grounds.dedup();
            grounds.len() <= 1
        });
        self.admissible_cache.set(Some(result));
        result
    }

    /// Rule-validity: no class mixes a ground term with a head-existential,
    /// at most one head-existential per class, and head-existentials never
    /// co-occur with answer variables.
    pub fn is_valid(&self, context: &PartitionContext) -> bool {
        self.classes().into_iter().all(|class| {
            let existentials: Vec<&Term> = class
                .iter()
                .filter(|t| context.head_existentials.contains(*t))
                .collect();
            if existentials.len() > 1 {
                return false;
            }
            if !existentials.is_empty() {
                if class.iter().any(Term::is_ground) {
                    return false;
                }
                if class
                    .iter()
                    .any(|t| context.answer_variables.contains(t))
                {
                    return false;
                }
            }
            true
        })
    }

    /// Maps every non-representative variable in each admissible class to
    /// the class representative, preferring an answer variable of
    /// `context` when the current representative is an unconstrained
    /// (non-answer) variable. Returns `None` if the partition is
    /// inadmissible, or invalid wrt `context` when one is supplied.
    pub fn associated_substitution(&self, context: Option<&PartitionContext>) -> Option<Substitution> {
        if !self.is_admissible() {
            return None;
        }
        if let Some(ctx) = context {
            if !self.is_valid(ctx) {
                return None;
            }
        }
        let mut sub = Substitution::new();
        for class in self.classes() {
            let mut rep = Self::representative_of(class);
            if let Some(ctx) = context {
                if rep.is_variable() && !ctx.answer_variables.contains(&rep) {
                    if let Some(answer_var) = class.iter().find(|t| ctx.answer_variables.contains(*t)) {
                        rep = answer_var.clone();
                    }
                }
            }
            for t in class {
                if t.is_variable() && *t != rep {
                    sub = sub.extended(t.clone(), rep.clone());
                }
            }
        }
        Some(sub)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::term::TermFactory;

    #[test]
    fn union_then_find_agree() {
        let f = TermFactory::new();
        let x = f.create_variable("X");
        let y = f.create_variable("Y");
        let mut p = TermPartition::new();
        p.union(&x, &y);
        assert_eq!(p.find(&x), p.find(&y));
    }

    #[test]
    fn representative_prefers_constant_over_variable() {
        let f = TermFactory::new();
        let x = f.create_variable("X");
        let a = f.create_constant("a");
        let mut p = TermPartition::new();
        p.union(&x, &a);
        assert_eq!(p.find(&x), a);
    }

    #[test]
    fn admissible_iff_at_most_one_ground_per_class() {
        let f = TermFactory::new();
        let a = f.create_constant("a");
        let b = f.create_constant("b");
        let x = f.create_variable("X");
        let mut ok = TermPartition::new();
        ok.union(&x, &a);
        assert!(ok.is_admissible());

        let mut bad = TermPartition::new();
        bad.union(&a, &b);
        assert!(!bad.is_admissible());
    }

    #[test]
    fn associated_substitution_respects_unioned_edges() {
        let f = TermFactory::new();
        let x = f.create_variable("X");
        let y = f.create_variable("Y");
        let a = f.create_constant("a");
        let mut p = TermPartition::new();
        p.union(&x, &y);
        p.union(&y, &a);
        let sub = p.associated_substitution(None).unwrap();
        assert_eq!(sub.apply(&x), a);
        assert_eq!(sub.apply(&y), a);
    }

    #[test]
    fn associated_substitution_none_when_inadmissible() {
        let f = TermFactory::new();
        let a = f.create_constant("a");
        let b = f.create_constant("b");
        let mut p = TermPartition::new();
        p.union(&a, &b);
        assert!(p.associated_substitution(None).is_none());
    }

    #[test]
    fn invalid_when_head_existential_mixes_with_ground() {
        let f = TermFactory::new();
        let e = f.create_variable("E");
        let a = f.create_constant("a");
        let mut p = TermPartition::new();
        p.union(&e, &a);
        let ctx = PartitionContext::with_head_existentials([e]);
        assert!(!p.is_valid(&ctx));
        assert!(p.associated_substitution(Some(&ctx)).is_none());
    }

    #[test]
    fn invalid_when_two_head_existentials_share_a_class() {
        let f = TermFactory::new();
        let e1 = f.create_variable("E1");
        let e2 = f.create_variable("E2");
        let mut p = TermPartition::new();
        p.union(&e1, &e2);
        let ctx = PartitionContext::with_head_existentials([e1, e2]);
        assert!(!p.is_valid(&ctx));
    }

    #[test]
    fn representative_swaps_to_answer_variable() {
        let f = TermFactory::new();
        let x = f.create_variable("X");
        let y = f.create_variable("Y");
        let mut p = TermPartition::new();
        p.union(&x, &y);
        let ctx = PartitionContext::with_answer_variables([y.clone()]);
        let sub = p.associated_substitution(Some(&ctx)).unwrap();
        assert_eq!(sub.apply(&x), y);
    }

    #[test]
    fn join_unions_every_edge_of_other() {
        let f = TermFactory::new();
        let x = f.create_variable("X");
        let y = f.create_variable("Y");
        let z = f.create_variable("Z");
        let mut other = TermPartition::new();
        other.union(&x, &y);
        other.union(&y, &z);
        let mut target = TermPartition::new();
        target.join(&other);
        assert_eq!(target.find(&x), target.find(&z));
    }
}
