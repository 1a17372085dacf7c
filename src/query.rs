//! Conjunctive queries and unions of conjunctive queries (`spec.md` §3).

use crate::atom::FrozenAtomSet;
use crate::substitution::Substitution;
use crate::term::{Term, TermFactory};
use std::hash::{Hash, Hasher};

/// `(atoms, answer_variables, optional pre_substitution)`. Invariant: every
/// answer variable occurs in `atoms` once `pre_substitution` is applied.
#[derive(Debug, Clone)]
pub struct ConjunctiveQuery {
    atoms: FrozenAtomSet,
    answer_variables: Vec<Term>,
    pre_substitution: Substitution,
}

impl ConjunctiveQuery {
    pub fn new(atoms: FrozenAtomSet, answer_variables: Vec<Term>) -> Self {
        Self::with_pre_substitution(atoms, answer_variables, Substitution::new())
    }

    pub fn with_pre_substitution(
        atoms: FrozenAtomSet,
        answer_variables: Vec<Term>,
        pre_substitution: Substitution,
    ) -> Self {
        let query = ConjunctiveQuery {
            atoms,
            answer_variables,
            pre_substitution,
        };
        debug_assert!(
            query
                .answer_variables
                .iter()
                .all(|v| query.atoms.variables().contains(&query.pre_substitution.apply(v))
                    || query.atoms.variables().contains(v)),
            "every answer variable must occur in the query body"
        );
        query
    }

    pub fn atoms(&self) -> &FrozenAtomSet {
        &self.atoms
    }

    pub fn answer_variables(&self) -> &[Term] {
        &self.answer_variables
    }

    pub fn pre_substitution(&self) -> &Substitution {
        &self.pre_substitution
    }

    pub fn arity(&self) -> usize {
        self.answer_variables.len()
    }

    /// `variables(atoms) \ answer_variables`.
    pub fn existential_variables(&self) -> Vec<Term> {
        self.atoms
            .variables()
            .into_iter()
            .filter(|v| !self.answer_variables.contains(v))
            .collect()
    }

    /// Replaces every query variable with a fresh one, keeping
    /// `answer_variables` pointwise mapped to the supplied replacements so
    /// answer identity survives renaming.
    pub fn safe_rename(&self, factory: &TermFactory) -> ConjunctiveQuery {
        let mut sub = Substitution::new();
        for v in self.atoms.variables() {
            sub = sub.extended(v, factory.fresh_variable());
        }
        let answer_variables = self
            .answer_variables
            .iter()
            .map(|v| sub.apply(v))
            .collect();
        ConjunctiveQuery::with_pre_substitution(
            self.atoms.apply_substitution(&sub),
            answer_variables,
            self.pre_substitution.clone(),
        )
    }
}

impl PartialEq for ConjunctiveQuery {
    fn eq(&self, other: &Self) -> bool {
        self.atoms == other.atoms && self.answer_variables == other.answer_variables
    }
}
impl Eq for ConjunctiveQuery {}

impl Hash for ConjunctiveQuery {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.atoms.hash(state);
        self.answer_variables.hash(state);
    }
}

/// An unordered set of [`ConjunctiveQuery`] sharing answer-variable arity;
/// members are renormalized to a shared answer-variable naming on
/// construction so that containment/cover comparisons treat corresponding
/// answer positions uniformly.
#[derive(Debug, Clone, Default)]
pub struct UnionQuery {
    queries: Vec<ConjunctiveQuery>,
}

impl UnionQuery {
    pub fn new(queries: Vec<ConjunctiveQuery>, factory: &TermFactory) -> Self {
        let arity = queries.first().map_or(0, ConjunctiveQuery::arity);
        debug_assert!(
            queries.iter().all(|q| q.arity() == arity),
            "all union members must share answer-variable arity"
        );
        let canonical: Vec<Term> = (0..arity)
            .map(|i| factory.create_variable(format!("_Ans{i}")))
            .collect();
        let normalized = queries
            .into_iter()
            .map(|q| {
                let mut sub = Substitution::new();
                for (old, new) in q.answer_variables.iter().zip(canonical.iter()) {
                    sub = sub.extended(old.clone(), new.clone());
                }
                ConjunctiveQuery::with_pre_substitution(
                    q.atoms.apply_substitution(&sub),
                    canonical.clone(),
                    q.pre_substitution.clone(),
                )
            })
            .collect();
        UnionQuery {
            queries: normalized,
        }
    }

    pub fn queries(&self) -> &[ConjunctiveQuery] {
        &self.queries
    }

    pub fn is_empty(&self) -> bool {
        self.queries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.queries.len()
    }

    pub fn arity(&self) -> usize {
        self.queries.first().map_or(0, ConjunctiveQuery::arity)
    }
}
