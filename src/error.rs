//! Error types crossing the core's boundaries.
//!
//! Four kinds of anomaly are distinguished (see module docs on each
//! producer for the exact raising site): a [`DataflowError`] from the
//! homomorphism engine when an atom's ground positions cannot satisfy a
//! data source's atomic pattern, an inadmissible-partition condition
//! (surfaced as [`EngineError::InadmissiblePartition`] only at rule
//! construction — elsewhere it is a silent `None`), an
//! [`EngineError::UnsupportedFormula`] from the prepared-plan builder, and
//! [`EngineError::CancellationOrLimit`] when a step bound or deadline is
//! reached. Everything else (malformed atoms, inconsistent substitution
//! composition) is an invariant the core relies on and is checked with
//! `debug_assert!` at construction time rather than surfaced here.

use thiserror::Error;

/// Errors produced by the homomorphism engine, the rewriter, and rule
/// construction.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EngineError {
    /// An atom's ground positions violate the data source's atomic pattern
    /// (a mandatory position is left unbound).
    #[error("dataflow error: predicate {predicate} position {position} must be bound")]
    Dataflow {
        predicate: String,
        position: usize,
    },

    /// A [`crate::partition::TermPartition`] merged two distinct ground
    /// terms, or violated a head-existential constraint, while validating a
    /// rule (not while evaluating a query — there it is a silent `None`,
    /// see [`crate::partition::TermPartition::associated_substitution`]).
    #[error("inadmissible partition: {reason}")]
    InadmissiblePartition { reason: String },

    /// The prepared-plan builder has no registered plan for a formula
    /// variant.
    #[error("unsupported formula variant: {0}")]
    UnsupportedFormula(String),

    /// A caller-supplied step bound or deadline was reached before the
    /// operation completed; the caller receives the best result computed so
    /// far, tagged incomplete by the `Incomplete<T>` wrapper rather than by
    /// this variant reaching the caller directly in most call sites.
    #[error("cancelled: {0}")]
    CancellationOrLimit(String),
}

pub type EngineResult<T> = Result<T, EngineError>;

/// Wraps a result that may have been cut short by a step bound or deadline
/// (`spec.md` §5, §7: "Return partial result tagged incomplete").
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Incomplete<T> {
    pub value: T,
    pub complete: bool,
}

impl<T> Incomplete<T> {
    pub fn complete(value: T) -> Self {
        Incomplete { value, complete: true }
    }

    pub fn partial(value: T) -> Self {
        Incomplete { value, complete: false }
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Incomplete<U> {
        Incomplete { value: f(self.value), complete: self.complete }
    }
}
