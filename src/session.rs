//! Session façade (external interfaces 4–6, `spec.md` §6).
//!
//! Bundles the term/predicate factories with the three pluggable
//! collaborators the core's external interfaces name: the homomorphism
//! algorithm provider, the redundancies-cleaner provider, and the
//! rule-compilation oracle. This replaces the source's `instance()`
//! singletons (`spec.md` §9 Design Notes, Redesign Flags) with a value
//! passed explicitly by the caller.
//!
//! Grounded on `examples/inputlayer-inputlayer/src/session.rs`'s role as
//! the top-level façade bundling shared state behind a small set of
//! provider traits, simplified: this engine has no multi-tenant
//! ephemeral-fact store or audit log to carry, so only the
//! factory-plus-provider bundling survives.

use crate::atom::Atom;
use crate::compilation::{NoCompilation, RuleCompilation};
use crate::error::{EngineResult, Incomplete};
use crate::exec_limits::Limits;
use crate::homomorphism::data_source::DataSource;
use crate::homomorphism::scheduler::MostConstrainedFirstScheduler;
use crate::homomorphism::{evaluate, exist_homomorphism};
use crate::query::ConjunctiveQuery;
use crate::substitution::Substitution;
use crate::term::{PredicateFactory, Term, TermFactory};
use std::sync::Arc;

/// External interface 5: returns either the default backtracking engine or
/// a compilation-aware variant.
pub trait HomomorphismAlgorithmProvider: Send + Sync {
    fn evaluate(
        &self,
        query_atoms: &[Atom],
        answer_variables: &[Term],
        initial: &Substitution,
        data: &dyn DataSource,
        limits: &mut Limits,
    ) -> EngineResult<Incomplete<Vec<Substitution>>>;

    fn exist_homomorphism(
        &self,
        query_atoms: &[Atom],
        initial: &Substitution,
        data: &dyn DataSource,
        limits: &mut Limits,
    ) -> EngineResult<bool>;
}

/// The default provider: the backtracking engine with the
/// most-constrained-first scheduler (`spec.md` §4.2).
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultHomomorphismProvider;

impl HomomorphismAlgorithmProvider for DefaultHomomorphismProvider {
    fn evaluate(
        &self,
        query_atoms: &[Atom],
        answer_variables: &[Term],
        initial: &Substitution,
        data: &dyn DataSource,
        limits: &mut Limits,
    ) -> EngineResult<Incomplete<Vec<Substitution>>> {
        evaluate(
            query_atoms,
            answer_variables,
            initial,
            data,
            &MostConstrainedFirstScheduler,
            limits,
        )
    }

    fn exist_homomorphism(
        &self,
        query_atoms: &[Atom],
        initial: &Substitution,
        data: &dyn DataSource,
        limits: &mut Limits,
    ) -> EngineResult<bool> {
        exist_homomorphism(
            query_atoms,
            initial,
            data,
            &MostConstrainedFirstScheduler,
            limits,
        )
    }
}

/// External interface 6: returns the default CQ/UCQ cleaner
/// (`crate::rewriting::cover` / `remove_more_specific_than`) or a
/// compilation-aware one. The cleaner always runs through a homomorphism
/// provider for its containment checks, so this trait hands one down
/// rather than hard-coding the default.
pub trait RedundanciesCleanerProvider: Send + Sync {
    fn cover(
        &self,
        queries: Vec<ConjunctiveQuery>,
        factory: &TermFactory,
        homomorphism: &dyn HomomorphismAlgorithmProvider,
        limits: &mut Limits,
    ) -> Vec<ConjunctiveQuery>;

    fn remove_more_specific_than(
        &self,
        candidates: Vec<ConjunctiveQuery>,
        reference: &[ConjunctiveQuery],
        factory: &TermFactory,
        homomorphism: &dyn HomomorphismAlgorithmProvider,
        limits: &mut Limits,
    ) -> Vec<ConjunctiveQuery>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultRedundanciesCleanerProvider;

impl RedundanciesCleanerProvider for DefaultRedundanciesCleanerProvider {
    fn cover(
        &self,
        queries: Vec<ConjunctiveQuery>,
        factory: &TermFactory,
        homomorphism: &dyn HomomorphismAlgorithmProvider,
        limits: &mut Limits,
    ) -> Vec<ConjunctiveQuery> {
        crate::rewriting::cover(queries, factory, homomorphism, limits)
    }

    fn remove_more_specific_than(
        &self,
        candidates: Vec<ConjunctiveQuery>,
        reference: &[ConjunctiveQuery],
        factory: &TermFactory,
        homomorphism: &dyn HomomorphismAlgorithmProvider,
        limits: &mut Limits,
    ) -> Vec<ConjunctiveQuery> {
        crate::rewriting::remove_more_specific_than(candidates, reference, factory, homomorphism, limits)
    }
}

/// Bundles the term/predicate factories and the three pluggable
/// collaborators. Cheap to clone (factories are `Arc`-backed internally,
/// providers are already behind `Arc`).
#[derive(Clone)]
pub struct Session {
    term_factory: TermFactory,
    predicate_factory: PredicateFactory,
    homomorphism_provider: Arc<dyn HomomorphismAlgorithmProvider>,
    redundancies_cleaner_provider: Arc<dyn RedundanciesCleanerProvider>,
    rule_compilation: Arc<dyn RuleCompilation>,
}

impl Session {
    /// A session with fresh factories and the default (non-compiled)
    /// collaborators.
    pub fn new() -> Self {
        Session {
            term_factory: TermFactory::new(),
            predicate_factory: PredicateFactory::new(),
            homomorphism_provider: Arc::new(DefaultHomomorphismProvider),
            redundancies_cleaner_provider: Arc::new(DefaultRedundanciesCleanerProvider),
            rule_compilation: Arc::new(NoCompilation),
        }
    }

    pub fn with_homomorphism_provider(
        mut self,
        provider: Arc<dyn HomomorphismAlgorithmProvider>,
    ) -> Self {
        self.homomorphism_provider = provider;
        self
    }

    pub fn with_redundancies_cleaner_provider(
        mut self,
        provider: Arc<dyn RedundanciesCleanerProvider>,
    ) -> Self {
        self.redundancies_cleaner_provider = provider;
        self
    }

    pub fn with_rule_compilation(mut self, compilation: Arc<dyn RuleCompilation>) -> Self {
        self.rule_compilation = compilation;
        self
    }

    pub fn term_factory(&self) -> &TermFactory {
        &self.term_factory
    }

    pub fn predicate_factory(&self) -> &PredicateFactory {
        &self.predicate_factory
    }

    pub fn homomorphism_provider(&self) -> &dyn HomomorphismAlgorithmProvider {
        self.homomorphism_provider.as_ref()
    }

    pub fn redundancies_cleaner_provider(&self) -> &dyn RedundanciesCleanerProvider {
        self.redundancies_cleaner_provider.as_ref()
    }

    pub fn rule_compilation(&self) -> &dyn RuleCompilation {
        self.rule_compilation.as_ref()
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::atom::FrozenAtomSet;
    use crate::homomorphism::data_source::InMemoryDataSource;
    use crate::term::PredicateFactory as Pf;

    #[test]
    fn default_session_uses_no_compilation() {
        let session = Session::new();
        let tf = TermFactory::new();
        let pf = Pf::new();
        let p = pf.create_predicate("p", 1);
        let a = tf.create_constant("a");
        let atom = crate::atom::Atom::new(p, vec![a]);
        assert!(session.rule_compilation().is_more_specific_than(&atom, &atom));
    }

    #[test]
    fn default_homomorphism_provider_finds_existing_fact() {
        let session = Session::new();
        let tf = session.term_factory();
        let pf = session.predicate_factory();
        let p = pf.create_predicate("p", 1);
        let a = tf.create_constant("a");
        let atoms: FrozenAtomSet = vec![crate::atom::Atom::new(p.clone(), vec![a.clone()])]
            .into_iter()
            .collect();
        let data = InMemoryDataSource::new(atoms);
        let x = tf.create_variable("X");
        let query = vec![crate::atom::Atom::new(p, vec![x])];
        let mut limits = Limits::unbounded();
        let found = session
            .homomorphism_provider()
            .exist_homomorphism(&query, &Substitution::new(), &data, &mut limits)
            .unwrap();
        assert!(found);
    }

    #[test]
    fn builder_swaps_rule_compilation() {
        let session = Session::new().with_rule_compilation(Arc::new(NoCompilation));
        let tf = TermFactory::new();
        let pf = Pf::new();
        let p = pf.create_predicate("p", 1);
        let a = tf.create_constant("a");
        let b = tf.create_constant("b");
        let atom_a = crate::atom::Atom::new(p.clone(), vec![a]);
        let atom_b = crate::atom::Atom::new(p, vec![b]);
        assert!(!session.rule_compilation().is_more_specific_than(&atom_a, &atom_b));
    }
}
