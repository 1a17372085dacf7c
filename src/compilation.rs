//! Rule compilation oracle (`spec.md` §9 Design Notes): a pluggable
//! preorder over predicates that lets the rewriting and core-computation
//! stages treat some rules as already "folded into" the compilation rather
//! than rewritten/applied explicitly.
//!
//! Grounded on
//! `examples/original_source/prototyping_inference_engine/rule_compilation/api/rule_compilation.py`
//! (trait shape) and `.../rule_compilation/no_compilation.py` (the null
//! object). The richer ID-compilation variant
//! (`.../rule_compilation/id/id_rule_compilation.py`, a saturated
//! compiled-preorder over atomic existential-free rules) is acknowledged in
//! `DESIGN.md` but not implemented: this engine always runs with
//! [`NoCompilation`] since nothing in the reasoning core's rewriting or
//! core-computation stages requires a non-trivial compiled preorder.

use crate::atom::Atom;
use crate::partition::TermPartition;
use crate::substitution::Substitution;
use crate::term::Predicate;

/// A compilation structure in the Graal/Integraal lineage: a way to treat
/// some rules as folded into a predicate preorder instead of applied
/// explicitly during rewriting.
pub trait RuleCompilation: Send + Sync {
    /// `true` iff `atom_a` is at least as specific as `atom_b` under this
    /// compilation (used by the `by-specialisation` core-computation
    /// strategy, `spec.md` §4.5).
    fn is_more_specific_than(&self, atom_a: &Atom, atom_b: &Atom) -> bool;

    /// Every admissible unification between `atom_a` and `atom_b` under
    /// this compilation.
    fn get_unifications(&self, atom_a: &Atom, atom_b: &Atom) -> Vec<TermPartition>;

    /// `true` iff the two predicates may unify under this compilation.
    fn is_compatible(&self, pred_p: &Predicate, pred_q: &Predicate) -> bool;

    /// The unfolding of `atom`: itself (identity substitution) plus, for a
    /// richer compilation, any atoms a compiled rule could fold it into.
    fn unfold(&self, atom: &Atom) -> Vec<(Atom, Substitution)>;
}

/// The null object: no rule is compiled, predicates unify only with
/// themselves.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoCompilation;

impl RuleCompilation for NoCompilation {
    fn is_more_specific_than(&self, atom_a: &Atom, atom_b: &Atom) -> bool {
        atom_a == atom_b
    }

    fn get_unifications(&self, atom_a: &Atom, atom_b: &Atom) -> Vec<TermPartition> {
        if atom_a.predicate() != atom_b.predicate() {
            return Vec::new();
        }
        let mut partition = TermPartition::new();
        for (ta, tb) in atom_a.terms().iter().zip(atom_b.terms().iter()) {
            partition.union(ta, tb);
        }
        vec![partition]
    }

    fn is_compatible(&self, pred_p: &Predicate, pred_q: &Predicate) -> bool {
        pred_p == pred_q
    }

    fn unfold(&self, atom: &Atom) -> Vec<(Atom, Substitution)> {
        vec![(atom.clone(), Substitution::new())]
    }
}
