//! A rule-based inference engine for existential rules (Datalog±):
//! homomorphism search, piece-unification, union-of-conjunctive-queries
//! rewriting, and core computation (`spec.md` §1).
//!
//! The crate root wires the term model (C1), atom sets (C2), term
//! partitions (C3), the homomorphism engine (C4), the piece-unifier engine
//! (C5), the UCQ rewriter (C6), and core computation (C7) behind the
//! [`session::Session`] façade (`spec.md` §6).

pub mod atom;
pub mod compilation;
pub mod config;
pub mod core_computation;
pub mod error;
pub mod exec_limits;
pub mod homomorphism;
pub mod partition;
pub mod piece_unifier;
pub mod query;
pub mod rewriting;
pub mod rule;
pub mod session;
pub mod substitution;
pub mod term;

pub use atom::{Atom, FrozenAtomSet, MutableAtomSet};
pub use compilation::{NoCompilation, RuleCompilation};
pub use config::EngineConfig;
pub use error::{EngineError, EngineResult, Incomplete};
pub use exec_limits::Limits;
pub use homomorphism::plan::{evaluate_plan, AtomPlan, Formula, Plan};
pub use partition::{PartitionContext, TermPartition};
pub use piece_unifier::{compute_disjunctive_unifiers, DisjunctivePieceUnifier, PieceUnifier, PieceUnifierCache};
pub use query::{ConjunctiveQuery, UnionQuery};
pub use rule::Rule;
pub use session::Session;
pub use substitution::Substitution;
pub use term::{Predicate, PredicateFactory, Term, TermFactory};
