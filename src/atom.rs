//! Atoms and atom sets (C2): predicate-indexed multisets with frozen and
//! mutable variants (`spec.md` §3).

use crate::substitution::Substitution;
use crate::term::{Predicate, Term};
use std::collections::{HashMap, HashSet};
use std::hash::{Hash, Hasher};

/// `(predicate, terms)`; arity is an invariant checked at construction.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Atom {
    predicate: Predicate,
    terms: Vec<Term>,
}

impl Atom {
    /// # Panics
    /// If `terms.len() != predicate.arity()` — malformed atoms are an
    /// invariant the core relies on, not a runtime error (`spec.md` §7).
    pub fn new(predicate: Predicate, terms: Vec<Term>) -> Self {
        debug_assert_eq!(
            terms.len(),
            predicate.arity(),
            "atom arity mismatch for predicate {}",
            predicate.name()
        );
        Atom { predicate, terms }
    }

    pub fn predicate(&self) -> &Predicate {
        &self.predicate
    }

    pub fn terms(&self) -> &[Term] {
        &self.terms
    }

    pub fn arity(&self) -> usize {
        self.terms.len()
    }

    pub fn variables(&self) -> Vec<Term> {
        let mut out = Vec::new();
        for t in &self.terms {
            t.variables_into(&mut out);
        }
        out.sort();
        out.dedup();
        out
    }

    pub fn constants(&self) -> Vec<Term> {
        self.terms
            .iter()
            .filter(|t| t.is_ground())
            .cloned()
            .collect()
    }

    pub fn is_ground(&self) -> bool {
        self.terms.iter().all(Term::is_ground)
    }

    /// Applies `sub` to every term position, returning a new atom.
    pub fn apply_substitution(&self, sub: &Substitution) -> Atom {
        Atom {
            predicate: self.predicate.clone(),
            terms: self.terms.iter().map(|t| sub.apply(t)).collect(),
        }
    }

    /// Attempts to unify `self` (the pattern) against `other` under the
    /// current `sub`, term-by-term: ground terms must be equal (via
    /// `sub`-applied comparison), unbound variables bind, bound variables
    /// must match their existing image.
    pub fn unify_into(&self, other: &Atom, sub: &Substitution) -> Option<Substitution> {
        if self.predicate != other.predicate {
            return None;
        }
        let mut acc = sub.clone();
        for (p, d) in self.terms.iter().zip(other.terms.iter()) {
            let bound = acc.apply(p);
            if bound.is_variable() {
                acc = acc.extended(bound, d.clone());
            } else if bound != *d {
                return None;
            }
        }
        Some(acc)
    }
}

/// An immutable, shareable atom set, indexed by predicate.
#[derive(Debug, Clone, Default)]
pub struct FrozenAtomSet {
    atoms: Vec<Atom>,
    by_predicate: HashMap<Predicate, Vec<usize>>,
}

impl FromIterator<Atom> for FrozenAtomSet {
    fn from_iter<I: IntoIterator<Item = Atom>>(iter: I) -> Self {
        let mut set = FrozenAtomSet::default();
        for atom in iter {
            set.push_dedup(atom);
        }
        set
    }
}

impl FrozenAtomSet {
    pub fn new() -> Self {
        Self::default()
    }

    fn push_dedup(&mut self, atom: Atom) {
        if self.atoms.contains(&atom) {
            return;
        }
        let idx = self.atoms.len();
        self.by_predicate
            .entry(atom.predicate.clone())
            .or_default()
            .push(idx);
        self.atoms.push(atom);
    }

    pub fn iter(&self) -> impl Iterator<Item = &Atom> {
        self.atoms.iter()
    }

    pub fn len(&self) -> usize {
        self.atoms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.atoms.is_empty()
    }

    pub fn contains(&self, atom: &Atom) -> bool {
        self.atoms.contains(atom)
    }

    pub fn by_predicate(&self, p: &Predicate) -> impl Iterator<Item = &Atom> {
        self.by_predicate
            .get(p)
            .into_iter()
            .flat_map(|idxs| idxs.iter().map(|&i| &self.atoms[i]))
    }

    pub fn predicates(&self) -> impl Iterator<Item = &Predicate> {
        self.by_predicate.keys()
    }

    pub fn variables(&self) -> Vec<Term> {
        let mut out = Vec::new();
        for a in &self.atoms {
            out.extend(a.variables());
        }
        out.sort();
        out.dedup();
        out
    }

    pub fn constants(&self) -> Vec<Term> {
        let mut out = Vec::new();
        for a in &self.atoms {
            out.extend(a.constants());
        }
        out.sort();
        out.dedup();
        out
    }

    /// Atoms whose terms unify with `pattern` under `sub`: each yields a
    /// refined substitution.
    pub fn matches<'a>(
        &'a self,
        pattern: &'a Atom,
        sub: &'a Substitution,
    ) -> impl Iterator<Item = Substitution> + 'a {
        self.by_predicate(pattern.predicate())
            .filter_map(move |candidate| pattern.unify_into(candidate, sub))
    }

    pub fn apply_substitution(&self, sub: &Substitution) -> FrozenAtomSet {
        self.atoms
            .iter()
            .map(|a| a.apply_substitution(sub))
            .collect()
    }

    pub fn to_mutable(&self) -> MutableAtomSet {
        let mut m = MutableAtomSet::new();
        for a in &self.atoms {
            m.add(a.clone());
        }
        m
    }
}

impl PartialEq for FrozenAtomSet {
    fn eq(&self, other: &Self) -> bool {
        self.atoms.len() == other.atoms.len()
            && self.atoms.iter().all(|a| other.atoms.contains(a))
    }
}
impl Eq for FrozenAtomSet {}

/// Order-independent: sums each atom's hash so that set-equal
/// [`FrozenAtomSet`]s (per the `PartialEq` above) always hash equal.
impl Hash for FrozenAtomSet {
    fn hash<H: Hasher>(&self, state: &mut H) {
        let combined: u64 = self
            .atoms
            .iter()
            .map(|a| {
                let mut h = std::collections::hash_map::DefaultHasher::new();
                a.hash(&mut h);
                h.finish()
            })
            .fold(0u64, u64::wrapping_add);
        combined.hash(state);
    }
}

/// A mutable atom set used by the core-computation adapter (external
/// interface 3): `add`/`remove`/`remove_all`, plus a predicate index and a
/// variable index for `O(1)` piece retrieval (`spec.md` §9 Design Notes).
#[derive(Debug, Clone, Default)]
pub struct MutableAtomSet {
    atoms: Vec<Option<Atom>>,
    by_predicate: HashMap<Predicate, HashSet<usize>>,
    by_variable: HashMap<Term, HashSet<usize>>,
    len: usize,
}

impl MutableAtomSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, atom: Atom) {
        if self.iter().any(|a| *a == atom) {
            return;
        }
        let idx = self.atoms.len();
        for v in atom.variables() {
            self.by_variable.entry(v).or_default().insert(idx);
        }
        self.by_predicate
            .entry(atom.predicate.clone())
            .or_default()
            .insert(idx);
        self.atoms.push(Some(atom));
        self.len += 1;
    }

    pub fn discard(&mut self, atom: &Atom) {
        if let Some(idx) = self
            .atoms
            .iter()
            .position(|slot| slot.as_ref() == Some(atom))
        {
            self.remove_index(idx);
        }
    }

    pub fn remove_all<'a>(&mut self, atoms: impl IntoIterator<Item = &'a Atom>) {
        for a in atoms {
            self.discard(a);
        }
    }

    fn remove_index(&mut self, idx: usize) {
        if let Some(atom) = self.atoms[idx].take() {
            self.len -= 1;
            if let Some(set) = self.by_predicate.get_mut(&atom.predicate) {
                set.remove(&idx);
            }
            for v in atom.variables() {
                if let Some(set) = self.by_variable.get_mut(&v) {
                    set.remove(&idx);
                }
            }
        }
    }

    /// Every atom mentioning `var` — the basis of a variable-induced piece.
    pub fn atoms_containing(&self, var: &Term) -> Vec<&Atom> {
        self.by_variable
            .get(var)
            .into_iter()
            .flat_map(|idxs| idxs.iter().filter_map(|&i| self.atoms[i].as_ref()))
            .collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Atom> {
        self.atoms.iter().filter_map(Option::as_ref)
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn variables(&self) -> Vec<Term> {
        let mut out: Vec<Term> = self.by_variable.keys().cloned().collect();
        out.sort();
        out
    }

    pub fn to_frozen(&self) -> FrozenAtomSet {
        self.iter().cloned().collect()
    }
}
