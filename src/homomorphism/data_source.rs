//! The readable-data-source contract (external interface 2, `spec.md` §6)
//! and the in-memory implementation the rest of the crate evaluates
//! against.

use crate::atom::FrozenAtomSet;
use crate::term::{Predicate, Term};
use std::collections::HashMap;

/// `(predicate, bound_positions, answer_positions)`: the unit of work the
/// homomorphism engine hands to a data source.
#[derive(Debug, Clone)]
pub struct BasicQuery {
    pub predicate: Predicate,
    pub bound_positions: HashMap<usize, Term>,
    pub answer_positions: HashMap<usize, Term>,
}

impl BasicQuery {
    pub fn new(predicate: Predicate) -> Self {
        BasicQuery {
            predicate,
            bound_positions: HashMap::new(),
            answer_positions: HashMap::new(),
        }
    }
}

/// Describes which positions of a predicate must be bound for a data
/// source to be able to evaluate it at all (the mandatory-parameter check
/// behind `DataflowError`).
#[derive(Debug, Clone, Default)]
pub struct AtomicPattern {
    pub mandatory_positions: Vec<usize>,
}

/// External interface 2: a source of ground facts (or, for function
/// evaluators, computed tuples) the homomorphism engine can query.
pub trait DataSource {
    fn has_predicate(&self, p: &Predicate) -> bool;
    fn get_predicates(&self) -> Vec<Predicate>;
    fn get_atomic_pattern(&self, p: &Predicate) -> AtomicPattern;
    fn evaluate(&self, query: &BasicQuery) -> Vec<Vec<Term>>;
    fn can_evaluate(&self, query: &BasicQuery) -> bool;
    /// `None` (⊥) means "unknown / unbounded" — the scheduler treats that
    /// as maximally unattractive.
    fn estimate_bound(&self, query: &BasicQuery) -> Option<usize>;
    /// Domain enumeration, used by universal plans and negation over
    /// unbound variables. `None` if the source cannot enumerate its
    /// domain.
    fn terms(&self) -> Option<Vec<Term>> {
        None
    }
}

/// A plain fact store: a [`FrozenAtomSet`] indexed by predicate, no
/// mandatory positions (any position may be left unbound; `evaluate`
/// simply filters).
#[derive(Debug, Clone, Default)]
pub struct InMemoryDataSource {
    atoms: FrozenAtomSet,
}

impl InMemoryDataSource {
    pub fn new(atoms: FrozenAtomSet) -> Self {
        InMemoryDataSource { atoms }
    }
}

impl DataSource for InMemoryDataSource {
    fn has_predicate(&self, p: &Predicate) -> bool {
        self.atoms.predicates().any(|q| q == p)
    }

    fn get_predicates(&self) -> Vec<Predicate> {
        self.atoms.predicates().cloned().collect()
    }

    fn get_atomic_pattern(&self, _p: &Predicate) -> AtomicPattern {
        AtomicPattern::default()
    }

    fn evaluate(&self, query: &BasicQuery) -> Vec<Vec<Term>> {
        self.atoms
            .by_predicate(&query.predicate)
            .filter(|atom| {
                query
                    .bound_positions
                    .iter()
                    .all(|(&pos, term)| atom.terms().get(pos) == Some(term))
            })
            .map(|atom| atom.terms().to_vec())
            .collect()
    }

    fn can_evaluate(&self, _query: &BasicQuery) -> bool {
        true
    }

    fn estimate_bound(&self, query: &BasicQuery) -> Option<usize> {
        Some(self.atoms.by_predicate(&query.predicate).count().max(
            usize::from(!query.bound_positions.is_empty()),
        ))
    }

    fn terms(&self) -> Option<Vec<Term>> {
        let mut all = self.atoms.variables();
        all.extend(self.atoms.constants());
        all.sort();
        all.dedup();
        Some(all)
    }
}

/// A function-evaluator data source (`spec.md` §4.2 edge cases): resolves
/// the auxiliary atoms produced by expanding function subterms. Exposes
/// one synthetic predicate per registered functor, of arity `n + 1` (the
/// last position is the result); every input position is mandatory.
pub struct FunctionEvaluatorDataSource {
    functions: HashMap<Predicate, Box<dyn Fn(&[Term]) -> Option<Term> + Send + Sync>>,
}

impl Default for FunctionEvaluatorDataSource {
    fn default() -> Self {
        FunctionEvaluatorDataSource {
            functions: HashMap::new(),
        }
    }
}

impl FunctionEvaluatorDataSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(
        &mut self,
        predicate: Predicate,
        f: impl Fn(&[Term]) -> Option<Term> + Send + Sync + 'static,
    ) {
        self.functions.insert(predicate, Box::new(f));
    }
}

impl DataSource for FunctionEvaluatorDataSource {
    fn has_predicate(&self, p: &Predicate) -> bool {
        self.functions.contains_key(p)
    }

    fn get_predicates(&self) -> Vec<Predicate> {
        self.functions.keys().cloned().collect()
    }

    fn get_atomic_pattern(&self, p: &Predicate) -> AtomicPattern {
        AtomicPattern {
            mandatory_positions: (0..p.arity().saturating_sub(1)).collect(),
        }
    }

    fn evaluate(&self, query: &BasicQuery) -> Vec<Vec<Term>> {
        let Some(f) = self.functions.get(&query.predicate) else {
            return Vec::new();
        };
        let arity = query.predicate.arity();
        let inputs: Vec<Term> = (0..arity.saturating_sub(1))
            .filter_map(|i| query.bound_positions.get(&i).cloned())
            .collect();
        if inputs.len() + 1 != arity {
            return Vec::new();
        }
        match f(&inputs) {
            Some(result) => {
                let mut tuple = inputs;
                tuple.push(result);
                vec![tuple]
            }
            None => Vec::new(),
        }
    }

    fn can_evaluate(&self, query: &BasicQuery) -> bool {
        let arity = query.predicate.arity();
        (0..arity.saturating_sub(1)).all(|i| query.bound_positions.contains_key(&i))
    }

    fn estimate_bound(&self, query: &BasicQuery) -> Option<usize> {
        if self.can_evaluate(query) {
            Some(1)
        } else {
            None
        }
    }
}

/// Combines two data sources, routing by predicate (the fact store first,
/// falling back to the function evaluator) — used to resolve the
/// auxiliary atoms introduced by function-term expansion alongside the
/// original fact source.
pub struct CompositeDataSource<'a> {
    pub primary: &'a dyn DataSource,
    pub secondary: &'a dyn DataSource,
}

impl DataSource for CompositeDataSource<'_> {
    fn has_predicate(&self, p: &Predicate) -> bool {
        self.primary.has_predicate(p) || self.secondary.has_predicate(p)
    }

    fn get_predicates(&self) -> Vec<Predicate> {
        let mut v = self.primary.get_predicates();
        v.extend(self.secondary.get_predicates());
        v
    }

    fn get_atomic_pattern(&self, p: &Predicate) -> AtomicPattern {
        if self.primary.has_predicate(p) {
            self.primary.get_atomic_pattern(p)
        } else {
            self.secondary.get_atomic_pattern(p)
        }
    }

    fn evaluate(&self, query: &BasicQuery) -> Vec<Vec<Term>> {
        if self.primary.has_predicate(&query.predicate) {
            self.primary.evaluate(query)
        } else {
            self.secondary.evaluate(query)
        }
    }

    fn can_evaluate(&self, query: &BasicQuery) -> bool {
        if self.primary.has_predicate(&query.predicate) {
            self.primary.can_evaluate(query)
        } else {
            self.secondary.can_evaluate(query)
        }
    }

    fn estimate_bound(&self, query: &BasicQuery) -> Option<usize> {
        if self.primary.has_predicate(&query.predicate) {
            self.primary.estimate_bound(query)
        } else {
            self.secondary.estimate_bound(query)
        }
    }

    fn terms(&self) -> Option<Vec<Term>> {
        self.primary.terms()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::atom::Atom;
    use crate::term::{PredicateFactory, TermFactory};

    #[test]
    fn in_memory_evaluate_filters_on_bound_positions() {
        let tf = TermFactory::new();
        let pf = PredicateFactory::new();
        let p = pf.create_predicate("p", 2);
        let a = tf.create_constant("a");
        let b = tf.create_constant("b");
        let c = tf.create_constant("c");
        let atoms: FrozenAtomSet = vec![
            Atom::new(p.clone(), vec![a.clone(), b.clone()]),
            Atom::new(p.clone(), vec![a.clone(), c.clone()]),
        ]
        .into_iter()
        .collect();
        let source = InMemoryDataSource::new(atoms);
        let mut query = BasicQuery::new(p);
        query.bound_positions.insert(0, a);
        let results = source.evaluate(&query);
        assert_eq!(results.len(), 2);
    }

    #[test]
    fn function_evaluator_requires_all_inputs_bound() {
        let pf = PredicateFactory::new();
        let plus = pf.create_predicate("plus", 3);
        let tf = TermFactory::new();
        let mut source = FunctionEvaluatorDataSource::new();
        source.register(plus.clone(), |args| {
            let (Some(a), Some(b)) = (as_i64(&args[0]), as_i64(&args[1])) else {
                return None;
            };
            Some(TermFactory::new().create_integer(a + b))
        });
        let mut query = BasicQuery::new(plus);
        assert!(!source.can_evaluate(&query));
        query.bound_positions.insert(0, tf.create_integer(1));
        query.bound_positions.insert(1, tf.create_integer(2));
        assert!(source.can_evaluate(&query));
        let results = source.evaluate(&query);
        assert_eq!(results.len(), 1);
    }

    fn as_i64(t: &Term) -> Option<i64> {
        match t.data() {
            crate::term::TermData::Literal(lit) => match lit.value {
                crate::term::ParsedValue::Integer(i) => Some(i),
                _ => None,
            },
            _ => None,
        }
    }
}
