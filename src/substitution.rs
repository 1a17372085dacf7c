//! Substitutions: finite maps `Variable → Term` (`spec.md` §3).

use crate::term::{Term, TermData};
use std::collections::HashMap;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Substitution {
    map: HashMap<Term, Term>,
}

impl Substitution {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn singleton(var: Term, term: Term) -> Self {
        Substitution::new().extended(var, term)
    }

    /// Returns a new substitution with `var ↦ term` added, dropping the
    /// pair if it is an identity (`var == term`).
    #[must_use]
    pub fn extended(&self, var: Term, term: Term) -> Substitution {
        let mut map = self.map.clone();
        if var != term {
            map.insert(var, term);
        }
        Substitution { map }
    }

    pub fn get(&self, var: &Term) -> Option<&Term> {
        self.map.get(var)
    }

    pub fn domain(&self) -> impl Iterator<Item = &Term> {
        self.map.keys()
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    /// Recursively applies the mapping: a variable is replaced by its
    /// image (or left alone if unmapped); function-term arguments are
    /// substituted in turn. Does not chase multi-hop chains — see
    /// [`Substitution::normalize`] for that.
    pub fn apply(&self, t: &Term) -> Term {
        match t.data() {
            TermData::Variable(_) => self.map.get(t).cloned().unwrap_or_else(|| t.clone()),
            TermData::Constant(_) | TermData::Literal(_) => t.clone(),
            TermData::FunctionTerm { functor, args } => {
                let new_args: Vec<Term> = args.iter().map(|a| self.apply(a)).collect();
                if new_args == *args {
                    t.clone()
                } else {
                    Term::new_function_term(functor.clone(), new_args)
                }
            }
        }
    }

    /// `self ∘ other`, i.e. `λx. self(other(x))`; identity pairs are
    /// dropped.
    #[must_use]
    pub fn compose(&self, other: &Substitution) -> Substitution {
        let mut map = HashMap::new();
        for (v, t) in &other.map {
            let applied = self.apply(t);
            if *v != applied {
                map.insert(v.clone(), applied);
            }
        }
        for (v, t) in &self.map {
            map.entry(v.clone()).or_insert_with(|| t.clone());
        }
        Substitution { map }
    }

    /// Transitively chases variable chains (`X ↦ Y`, `Y ↦ a` collapses to
    /// `X ↦ a`) until every key maps to a ground term or an unmapped
    /// variable.
    #[must_use]
    pub fn normalize(&self) -> Substitution {
        let mut map = HashMap::new();
        for v in self.map.keys() {
            let mut current = self.map.get(v).cloned().unwrap();
            let mut seen = vec![v.clone()];
            while let TermData::Variable(_) = current.data() {
                if seen.contains(&current) {
                    break;
                }
                match self.map.get(&current) {
                    Some(next) => {
                        seen.push(current.clone());
                        current = next.clone();
                    }
                    None => break,
                }
            }
            if *v != current {
                map.insert(v.clone(), current);
            }
        }
        Substitution { map }
    }

    /// Restricts the domain to `vars`, keeping only keys whose image
    /// differs from themselves (always true for entries already in the
    /// map, but `vars` may contain keys absent here).
    #[must_use]
    pub fn restrict_to(&self, vars: &[Term]) -> Substitution {
        let mut map = HashMap::new();
        for v in vars {
            if let Some(t) = self.map.get(v) {
                map.insert(v.clone(), t.clone());
            }
        }
        Substitution { map }
    }

    /// Disjoint union: panics in debug builds if both substitutions bind
    /// the same variable to different images.
    #[must_use]
    pub fn aggregate(&self, other: &Substitution) -> Substitution {
        let mut map = self.map.clone();
        for (v, t) in &other.map {
            match map.get(v) {
                Some(existing) => debug_assert_eq!(
                    existing, t,
                    "aggregate: conflicting bindings for the same variable"
                ),
                None => {
                    map.insert(v.clone(), t.clone());
                }
            }
        }
        Substitution { map }
    }

    /// `true` iff `apply(v)` is ground for every `v` in `vars`.
    pub fn is_ground_on(&self, vars: &[Term]) -> bool {
        vars.iter().all(|v| self.apply(v).is_ground())
    }

    /// A canonical, sortable form used for deduplicating substitutions in a
    /// hash set (`spec.md` §5: "deduplication is performed by a hash set
    /// over serialized substitution maps").
    pub fn canonical_pairs(&self) -> Vec<(Term, Term)> {
        let mut pairs: Vec<(Term, Term)> = self.map.iter().map(|(k, v)| (k.clone(), v.clone())).collect();
        pairs.sort();
        pairs
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::term::TermFactory;

    #[test]
    fn apply_substitutes_variable() {
        let f = TermFactory::new();
        let x = f.create_variable("X");
        let a = f.create_constant("a");
        let sub = Substitution::singleton(x.clone(), a.clone());
        assert_eq!(sub.apply(&x), a);
    }

    #[test]
    fn apply_recurses_into_function_terms() {
        let f = TermFactory::new();
        let x = f.create_variable("X");
        let a = f.create_constant("a");
        let term = f.create_function_term("g", vec![x.clone()]);
        let sub = Substitution::singleton(x, a.clone());
        let expected = f.create_function_term("g", vec![a]);
        assert_eq!(sub.apply(&term), expected);
    }

    #[test]
    fn compose_matches_definition() {
        let f = TermFactory::new();
        let x = f.create_variable("X");
        let y = f.create_variable("Y");
        let a = f.create_constant("a");
        let sigma = Substitution::singleton(y.clone(), a.clone());
        let tau = Substitution::singleton(x.clone(), y.clone());
        let composed = sigma.compose(&tau);
        assert_eq!(composed.apply(&x), sigma.apply(&tau.apply(&x)));
    }

    #[test]
    fn normalize_chases_chains_to_ground() {
        let f = TermFactory::new();
        let x = f.create_variable("X");
        let y = f.create_variable("Y");
        let a = f.create_constant("a");
        let mut sub = Substitution::new();
        sub = sub.extended(x.clone(), y.clone());
        sub = sub.extended(y, a.clone());
        let normalized = sub.normalize();
        assert_eq!(normalized.apply(&x), a);
    }

    #[test]
    fn restrict_to_keeps_only_named_keys() {
        let f = TermFactory::new();
        let x = f.create_variable("X");
        let y = f.create_variable("Y");
        let a = f.create_constant("a");
        let b = f.create_constant("b");
        let mut sub = Substitution::new();
        sub = sub.extended(x.clone(), a);
        sub = sub.extended(y, b);
        let restricted = sub.restrict_to(&[x.clone()]);
        assert_eq!(restricted.domain().count(), 1);
        assert!(restricted.get(&x).is_some());
    }

    #[test]
    fn extended_drops_identity_pairs() {
        let f = TermFactory::new();
        let x = f.create_variable("X");
        let sub = Substitution::new().extended(x.clone(), x);
        assert!(sub.is_empty());
    }

    #[test]
    fn aggregate_is_disjoint_union() {
        let f = TermFactory::new();
        let x = f.create_variable("X");
        let y = f.create_variable("Y");
        let a = f.create_constant("a");
        let b = f.create_constant("b");
        let s1 = Substitution::singleton(x.clone(), a.clone());
        let s2 = Substitution::singleton(y.clone(), b.clone());
        let merged = s1.aggregate(&s2);
        assert_eq!(merged.apply(&x), a);
        assert_eq!(merged.apply(&y), b);
    }

    #[test]
    fn is_ground_on_checks_every_listed_variable() {
        let f = TermFactory::new();
        let x = f.create_variable("X");
        let y = f.create_variable("Y");
        let a = f.create_constant("a");
        let sub = Substitution::singleton(x.clone(), a);
        assert!(!sub.is_ground_on(&[x, y]));
    }
}
