//! Mono (single-head-disjunct) piece unifiers (`spec.md` §4.3).

use crate::atom::{Atom, FrozenAtomSet};
use crate::partition::{PartitionContext, TermPartition};
use crate::query::ConjunctiveQuery;
use crate::rule::Rule;
use crate::substitution::Substitution;
use crate::term::Term;
use std::collections::HashSet;

/// `(rule, query, unified_query_part, partition)` — a unifier between a
/// non-empty piece of `query` and the head disjunct `head_index` of
/// `rule`.
#[derive(Debug, Clone)]
pub struct PieceUnifier {
    rule: Rule,
    head_index: usize,
    query: ConjunctiveQuery,
    unified_query_part: FrozenAtomSet,
    partition: TermPartition,
}

impl PieceUnifier {
    pub fn rule(&self) -> &Rule {
        &self.rule
    }

    pub fn head_index(&self) -> usize {
        self.head_index
    }

    pub fn query(&self) -> &ConjunctiveQuery {
        &self.query
    }

    pub fn unified_query_part(&self) -> &FrozenAtomSet {
        &self.unified_query_part
    }

    pub fn partition(&self) -> &TermPartition {
        &self.partition
    }

    pub fn associated_substitution(&self) -> Option<Substitution> {
        let ctx = PartitionContext {
            head_existentials: self.rule.head_existentials(self.head_index).into_iter().collect(),
            answer_variables: self.query.answer_variables().iter().cloned().collect(),
        };
        self.partition.associated_substitution(Some(&ctx))
    }

    pub fn not_unified_part(&self) -> FrozenAtomSet {
        self.query
            .atoms()
            .iter()
            .filter(|a| !self.unified_query_part.contains(a))
            .cloned()
            .collect()
    }

    /// Frontier variables of `rule` linked, through `partition`, to a
    /// variable occurring outside `unified_query_part`.
    pub fn separating_variables(&self) -> Vec<Term> {
        separating_variables(&self.rule, &self.partition, &self.not_unified_part())
    }
}

pub(super) fn separating_variables(
    rule: &Rule,
    partition: &TermPartition,
    not_unified_part: &FrozenAtomSet,
) -> Vec<Term> {
    let outside_vars = not_unified_part.variables();
    let outside_reps: HashSet<Term> = outside_vars.iter().map(|v| partition.find(v)).collect();
    rule.frontier()
        .into_iter()
        .filter(|v| outside_reps.contains(&partition.find(v)))
        .collect()
}

fn atomic_pre_unifiers(
    component: &[usize],
    atoms: &[&Atom],
    rule: &Rule,
    head_index: usize,
    ctx: &PartitionContext,
) -> Vec<Vec<(usize, TermPartition)>> {
    let head = &rule.head()[head_index];
    component
        .iter()
        .map(|&qi| {
            let qa = atoms[qi];
            head.atoms()
                .iter()
                .enumerate()
                .filter_map(|(hi, ha)| {
                    if qa.predicate() != ha.predicate() {
                        return None;
                    }
                    let mut partition = TermPartition::new();
                    for (qt, ht) in qa.terms().iter().zip(ha.terms().iter()) {
                        partition.union(qt, ht);
                    }
                    if partition.is_admissible() && partition.is_valid(ctx) {
                        Some((hi, partition))
                    } else {
                        None
                    }
                })
                .collect()
        })
        .collect()
}

/// Connected components of `query`'s atoms over its existential (non-answer)
/// variables: two atoms are adjacent iff they share such a variable.
fn connected_components(query: &ConjunctiveQuery) -> Vec<Vec<usize>> {
    let atoms: Vec<&Atom> = query.atoms().iter().collect();
    let answer: HashSet<Term> = query.answer_variables().iter().cloned().collect();
    let mut parent: Vec<usize> = (0..atoms.len()).collect();
    fn find(parent: &mut [usize], x: usize) -> usize {
        if parent[x] != x {
            parent[x] = find(parent, parent[x]);
        }
        parent[x]
    }
    for i in 0..atoms.len() {
        for j in (i + 1)..atoms.len() {
            let vi: HashSet<Term> = atoms[i].variables().into_iter().filter(|v| !answer.contains(v)).collect();
            let vj: HashSet<Term> = atoms[j].variables().into_iter().filter(|v| !answer.contains(v)).collect();
            if vi.intersection(&vj).next().is_some() {
                let ri = find(&mut parent, i);
                let rj = find(&mut parent, j);
                if ri != rj {
                    parent[ri] = rj;
                }
            }
        }
    }
    let mut groups: std::collections::HashMap<usize, Vec<usize>> = std::collections::HashMap::new();
    for i in 0..atoms.len() {
        let r = find(&mut parent, i);
        groups.entry(r).or_default().push(i);
    }
    groups.into_values().collect()
}

fn is_connected_subset(subset: &[usize], query: &ConjunctiveQuery) -> bool {
    if subset.len() <= 1 {
        return true;
    }
    let atoms: Vec<&Atom> = query.atoms().iter().collect();
    let answer: HashSet<Term> = query.answer_variables().iter().cloned().collect();
    let mut parent: std::collections::HashMap<usize, usize> = subset.iter().map(|&i| (i, i)).collect();
    fn find(parent: &mut std::collections::HashMap<usize, usize>, x: usize) -> usize {
        let p = parent[&x];
        if p != x {
            let r = find(parent, p);
            parent.insert(x, r);
            r
        } else {
            x
        }
    }
    for &i in subset {
        for &j in subset {
            if i >= j {
                continue;
            }
            let vi: HashSet<Term> = atoms[i].variables().into_iter().filter(|v| !answer.contains(v)).collect();
            let vj: HashSet<Term> = atoms[j].variables().into_iter().filter(|v| !answer.contains(v)).collect();
            if vi.intersection(&vj).next().is_some() {
                let ri = find(&mut parent, i);
                let rj = find(&mut parent, j);
                if ri != rj {
                    parent.insert(ri, rj);
                }
            }
        }
    }
    let reps: HashSet<usize> = subset.iter().map(|&i| find(&mut parent, i)).collect();
    reps.len() == 1
}

fn cartesian_assignments(
    candidates: &[Vec<(usize, TermPartition)>],
) -> Vec<Vec<(usize, TermPartition)>> {
    let mut result: Vec<Vec<(usize, TermPartition)>> = vec![Vec::new()];
    for options in candidates {
        if options.is_empty() {
            return Vec::new();
        }
        let mut next = Vec::new();
        for prefix in &result {
            for opt in options {
                let mut p = prefix.clone();
                p.push(opt.clone());
                next.push(p);
            }
        }
        result = next;
    }
    result
}

/// Enumerates most-general mono-piece unifiers between `query` and head
/// disjunct `head_index` of `rule`. Implemented as bounded backtracking
/// over connected subsets of each existential-variable connected
/// component of `query` (components beyond 12 atoms fall back to
/// whole-component unification only, since the general problem is
/// exponential in piece size — `spec.md` §4.3's own complexity note).
pub fn mono_piece_unifiers(query: &ConjunctiveQuery, rule: &Rule, head_index: usize) -> Vec<PieceUnifier> {
    let ctx = PartitionContext {
        head_existentials: rule.head_existentials(head_index).into_iter().collect(),
        answer_variables: query.answer_variables().iter().cloned().collect(),
    };
    let atoms: Vec<&Atom> = query.atoms().iter().collect();
    let mut results = Vec::new();
    for component in connected_components(query) {
        let subsets: Vec<Vec<usize>> = if component.len() > 12 {
            vec![component.clone()]
        } else {
            power_set(&component)
        };
        for subset in subsets {
            if subset.is_empty() || !is_connected_subset(&subset, query) {
                continue;
            }
            let pre = atomic_pre_unifiers(&subset, &atoms, rule, head_index, &ctx);
            for assignment in cartesian_assignments(&pre) {
                let mut partition = TermPartition::new();
                for (_, p) in &assignment {
                    partition.join(p);
                }
                if !partition.is_admissible() || !partition.is_valid(&ctx) {
                    continue;
                }
                let unified_query_part: FrozenAtomSet =
                    subset.iter().map(|&qi| atoms[qi].clone()).collect();
                let not_unified: FrozenAtomSet = atoms
                    .iter()
                    .enumerate()
                    .filter(|(i, _)| !subset.contains(i))
                    .map(|(_, a)| (*a).clone())
                    .collect();
                let sep = separating_variables(rule, &partition, &not_unified);
                let sticky = sep.iter().any(|v| ctx.head_existentials.contains(v));
                if sticky {
                    continue;
                }
                results.push(PieceUnifier {
                    rule: rule.clone(),
                    head_index,
                    query: query.clone(),
                    unified_query_part,
                    partition,
                });
            }
        }
    }
    retain_maximal(results)
}

fn power_set(indices: &[usize]) -> Vec<Vec<usize>> {
    let mut out = Vec::new();
    for mask in 1u32..(1u32 << indices.len()) {
        let subset: Vec<usize> = indices
            .iter()
            .enumerate()
            .filter(|(bit, _)| mask & (1 << bit) != 0)
            .map(|(_, &i)| i)
            .collect();
        out.push(subset);
    }
    out
}

/// Drops any unifier whose `unified_query_part` is a proper subset of
/// another's (no strictly less-general piece unifier when a more-general
/// one covering the same area is available).
fn retain_maximal(unifiers: Vec<PieceUnifier>) -> Vec<PieceUnifier> {
    unifiers
        .iter()
        .enumerate()
        .filter(|(i, u)| {
            !unifiers.iter().enumerate().any(|(j, other)| {
                *i != j
                    && other.unified_query_part.len() > u.unified_query_part.len()
                    && u.unified_query_part.iter().all(|a| other.unified_query_part.contains(a))
            })
        })
        .map(|(_, u)| u.clone())
        .collect()
}
