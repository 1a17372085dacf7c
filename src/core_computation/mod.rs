//! Core computation (C7, `spec.md` §4.5): retracting redundant atoms from
//! an atom set while preserving the existence of a homomorphism back into
//! the original (up to the frozen/answer variables).
//!
//! Grounded on
//! `examples/original_source/prototyping_inference_engine/api/atom/set/core/naive_core_processor.py`
//! (naive variable-deletion test),
//! `.../core/by_piece_core_processor.py` (piece-induced retraction, the
//! three [`CoreRetractionVariant`] strategies),
//! `.../core/by_piece_and_variable_core_processor.py` (per-variable piece
//! retraction), `.../core/multithread_by_piece_core_processor.py`
//! (concurrent piece dispatch under a shared lock), and
//! `.../utils/piece_splitter.py` (`VariableInducedPieceSplitter`).

use crate::atom::{Atom, FrozenAtomSet, MutableAtomSet};
use crate::exec_limits::Limits;
use crate::homomorphism::data_source::InMemoryDataSource;
use crate::session::HomomorphismAlgorithmProvider;
use crate::substitution::Substitution;
use crate::term::{Term, TermFactory};
use parking_lot::Mutex;
use rayon::prelude::*;
use std::collections::{HashSet, VecDeque};

/// Strategy for retracting a variable-induced piece during by-piece core
/// computation (`spec.md` §4.5).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CoreRetractionVariant {
    /// Try every homomorphism from the piece and keep the one deleting the
    /// most variables.
    Exhaustive,
    /// Like `Exhaustive`, but seeds the next round's search with the
    /// variable bindings already accepted, narrowing subsequent search.
    BySpecialisation,
    /// Accept the first admissible homomorphism found and retry from
    /// scratch until no more variables can be deleted.
    ByDeletion,
}

impl Default for CoreRetractionVariant {
    fn default() -> Self {
        CoreRetractionVariant::ByDeletion
    }
}

/// Splits an atom set into connected pieces induced by a set of "active"
/// variables; ground atoms and atoms with no active variable are dropped.
pub trait PieceSplitter: Send + Sync {
    fn split(&self, atoms: &FrozenAtomSet, active_variables: &HashSet<Term>) -> Vec<FrozenAtomSet>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct VariableInducedPieceSplitter;

impl PieceSplitter for VariableInducedPieceSplitter {
    fn split(&self, atoms: &FrozenAtomSet, active_variables: &HashSet<Term>) -> Vec<FrozenAtomSet> {
        if active_variables.is_empty() {
            return Vec::new();
        }
        let mut by_variable: std::collections::HashMap<Term, Vec<&Atom>> =
            active_variables.iter().map(|v| (v.clone(), Vec::new())).collect();
        for atom in atoms.iter() {
            for v in atom.variables() {
                if let Some(bucket) = by_variable.get_mut(&v) {
                    bucket.push(atom);
                }
            }
        }

        let mut visited: HashSet<Term> = HashSet::new();
        let mut pieces = Vec::new();
        for root in active_variables {
            if visited.contains(root) || by_variable[root].is_empty() {
                continue;
            }
            let mut queue = VecDeque::new();
            queue.push_back(root.clone());
            visited.insert(root.clone());
            let mut component: Vec<Atom> = Vec::new();
            while let Some(var) = queue.pop_front() {
                for atom in &by_variable[&var] {
                    if component.contains(atom) {
                        continue;
                    }
                    component.push((*atom).clone());
                    for linked in atom.variables() {
                        if active_variables.contains(&linked) && !visited.contains(&linked) {
                            visited.insert(linked.clone());
                            queue.push_back(linked);
                        }
                    }
                }
            }
            if !component.is_empty() {
                pieces.push(component.into_iter().collect());
            }
        }
        pieces
    }
}

/// Builds a substitution mapping each frozen variable to a private marker
/// constant reserved for this call. Applying it to an atom set grounds
/// every frozen-variable position, so a homomorphism search against
/// similarly-pinned data can no longer move it: `Substitution::extended`
/// always drops identity pairs, so "bound to itself" cannot be represented
/// by the `var ↦ var` the Python original's `freeze_substitution` returns —
/// grounding to a reserved constant has the same rigidifying effect
/// (`naive_core_processor.py`'s frozen domain is pinned the same way inside
/// its backtracking engine).
fn freeze_substitution(freeze: &[Term]) -> Substitution {
    let markers = TermFactory::new();
    let mut sub = Substitution::new();
    for (i, var) in freeze.iter().enumerate() {
        sub = sub.extended(var.clone(), markers.create_constant(format!("$frozen#{i}")));
    }
    sub
}

fn atoms_with_variable(atoms: &MutableAtomSet, var: &Term) -> Vec<Atom> {
    atoms.atoms_containing(var).into_iter().cloned().collect()
}

fn without_atoms(atoms: &MutableAtomSet, to_remove: &[Atom]) -> FrozenAtomSet {
    atoms.iter().filter(|a| !to_remove.contains(a)).cloned().collect()
}

fn non_frozen_variable_count(atoms: &[Atom], frozen: &HashSet<Term>) -> usize {
    let mut vars = HashSet::new();
    for a in atoms {
        for v in a.variables() {
            if !frozen.contains(&v) {
                vars.insert(v);
            }
        }
    }
    vars.len()
}

fn external_range_variables(sub: &Substitution, in_piece: &HashSet<Term>, frozen: &HashSet<Term>) -> HashSet<Term> {
    sub.domain()
        .filter_map(|v| sub.get(v))
        .filter(|t| t.is_variable() && !in_piece.contains(*t) && !frozen.contains(*t))
        .cloned()
        .collect()
}

/// Naive core computation: retract every variable whose removal still
/// leaves a homomorphism from the whole (pre-retraction) atom set into the
/// reduced one (`naive_core_processor.py`).
pub fn naive_core(
    atoms: &FrozenAtomSet,
    freeze: &[Term],
    homomorphism: &dyn HomomorphismAlgorithmProvider,
    limits: &mut Limits,
) -> FrozenAtomSet {
    let frozen: HashSet<Term> = freeze.iter().cloned().collect();
    let pin = freeze_substitution(freeze);
    let mut target = atoms.to_mutable();
    let variables: Vec<Term> = target.variables().into_iter().filter(|v| !frozen.contains(v)).collect();

    for var in variables {
        let using_var = atoms_with_variable(&target, &var);
        if using_var.is_empty() {
            continue;
        }
        let virtual_target = without_atoms(&target, &using_var).apply_substitution(&pin);
        let full: Vec<Atom> = target.iter().map(|a| a.apply_substitution(&pin)).collect();
        let data = InMemoryDataSource::new(virtual_target);
        let found = homomorphism
            .exist_homomorphism(&full, &Substitution::new(), &data, limits)
            .unwrap_or(false);
        if found {
            target.remove_all(using_var.iter());
        }
    }
    target.to_frozen()
}

fn homomorphisms_from_piece(
    piece: &FrozenAtomSet,
    target: &MutableAtomSet,
    pre_sub: &Substitution,
    pin: &Substitution,
    homomorphism: &dyn HomomorphismAlgorithmProvider,
    limits: &mut Limits,
) -> Vec<Substitution> {
    let answer_variables: Vec<Term> = piece.variables().into_iter().filter(|v| pin.get(v).is_none()).collect();
    let query_atoms: Vec<Atom> = piece.iter().map(|a| a.apply_substitution(pin)).collect();
    let data = InMemoryDataSource::new(target.to_frozen().apply_substitution(pin));
    homomorphism
        .evaluate(&query_atoms, &answer_variables, pre_sub, &data, limits)
        .map(|incomplete| incomplete.value)
        .unwrap_or_default()
}

#[allow(clippy::too_many_arguments)]
fn process_piece(
    variant: CoreRetractionVariant,
    piece: &FrozenAtomSet,
    target: &mut MutableAtomSet,
    frozen: &HashSet<Term>,
    pre_sub: &Substitution,
    pin: &Substitution,
    homomorphism: &dyn HomomorphismAlgorithmProvider,
    limits: &mut Limits,
) {
    match variant {
        CoreRetractionVariant::Exhaustive => {
            retract_piece_exhaustive(piece, target, frozen, pre_sub, pin, homomorphism, limits)
        }
        CoreRetractionVariant::BySpecialisation => {
            retract_piece_by_specialisation(piece, target, frozen, pre_sub, pin, homomorphism, limits)
        }
        CoreRetractionVariant::ByDeletion => {
            retract_piece_by_deletion(piece, target, frozen, pre_sub, pin, homomorphism, limits)
        }
    }
}

#[allow(clippy::too_many_arguments)]
fn retract_piece_exhaustive(
    piece: &FrozenAtomSet,
    target: &mut MutableAtomSet,
    frozen: &HashSet<Term>,
    pre_sub: &Substitution,
    pin: &Substitution,
    homomorphism: &dyn HomomorphismAlgorithmProvider,
    limits: &mut Limits,
) {
    let piece_vars: HashSet<Term> = piece.variables().into_iter().collect();
    let mut max_deleted: HashSet<Term> = HashSet::new();

    for hom in homomorphisms_from_piece(piece, target, pre_sub, pin, homomorphism, limits) {
        let deleted: HashSet<Term> = hom.domain().cloned().collect();
        if deleted.is_empty() {
            continue;
        }
        let external = external_range_variables(&hom, &piece_vars, frozen);
        if !external.is_disjoint(&deleted) {
            continue;
        }
        if deleted.len() > max_deleted.len() {
            max_deleted = deleted;
        }
    }

    if !max_deleted.is_empty() {
        let to_remove: Vec<Atom> = piece.iter().filter(|a| a.variables().iter().any(|v| max_deleted.contains(v))).cloned().collect();
        target.remove_all(to_remove.iter());
    }
}

#[allow(clippy::too_many_arguments)]
fn retract_piece_by_deletion(
    piece: &FrozenAtomSet,
    target: &mut MutableAtomSet,
    frozen: &HashSet<Term>,
    pre_sub: &Substitution,
    pin: &Substitution,
    homomorphism: &dyn HomomorphismAlgorithmProvider,
    limits: &mut Limits,
) {
    let mut live_piece = piece.clone();
    loop {
        let piece_vars: HashSet<Term> = live_piece.variables().into_iter().collect();
        let non_frozen = non_frozen_variable_count(&live_piece.iter().cloned().collect::<Vec<_>>(), frozen);
        if non_frozen == 0 {
            return;
        }

        let mut changed = false;
        for hom in homomorphisms_from_piece(&live_piece, target, pre_sub, pin, homomorphism, limits) {
            let deleted: HashSet<Term> = hom.domain().cloned().collect();
            if deleted.is_empty() {
                continue;
            }
            let external = external_range_variables(&hom, &piece_vars, frozen);
            if !external.is_disjoint(&deleted) {
                continue;
            }

            let to_remove: Vec<Atom> = live_piece.iter().filter(|a| a.variables().iter().any(|v| deleted.contains(v))).cloned().collect();
            target.remove_all(to_remove.iter());
            live_piece = live_piece.iter().filter(|a| !to_remove.contains(a)).cloned().collect();
            changed = true;
            if deleted.len() >= non_frozen {
                return;
            }
            break;
        }
        if !changed {
            return;
        }
    }
}

#[allow(clippy::too_many_arguments)]
fn retract_piece_by_specialisation(
    piece: &FrozenAtomSet,
    target: &mut MutableAtomSet,
    frozen: &HashSet<Term>,
    pre_sub: &Substitution,
    pin: &Substitution,
    homomorphism: &dyn HomomorphismAlgorithmProvider,
    limits: &mut Limits,
) {
    let piece_vars: HashSet<Term> = piece.variables().into_iter().collect();
    let non_frozen = non_frozen_variable_count(&piece.iter().cloned().collect::<Vec<_>>(), frozen);
    if non_frozen == 0 {
        return;
    }

    let mut local_pre_sub = pre_sub.clone();
    let mut best_deleted: HashSet<Term> = HashSet::new();

    loop {
        let mut improved = false;
        for hom in homomorphisms_from_piece(piece, target, &local_pre_sub, pin, homomorphism, limits) {
            let reduced: HashSet<Term> = hom.domain().cloned().collect();
            if reduced.is_empty() {
                continue;
            }
            let deleted: HashSet<Term> = reduced.union(&best_deleted).cloned().collect();
            let external = external_range_variables(&hom, &piece_vars, frozen);
            if !external.is_disjoint(&deleted) {
                continue;
            }
            if deleted.len() > best_deleted.len() {
                for var in &deleted {
                    if let Some(image) = hom.get(var) {
                        if image.is_variable() && !piece_vars.contains(image) {
                            local_pre_sub = local_pre_sub.extended(var.clone(), image.clone());
                        }
                    }
                }
                best_deleted = deleted;
                improved = true;
                if best_deleted.len() >= non_frozen {
                    break;
                }
            }
        }
        if !improved || best_deleted.len() >= non_frozen {
            break;
        }
    }

    if !best_deleted.is_empty() {
        let to_remove: Vec<Atom> = piece.iter().filter(|a| a.variables().iter().any(|v| best_deleted.contains(v))).cloned().collect();
        target.remove_all(to_remove.iter());
    }
}

/// By-piece core computation: splits `atoms` into variable-induced pieces
/// and retracts each using `variant`, then runs a final
/// [`naive_core`] cleanup pass to guarantee a true core
/// (`by_piece_core_processor.py`).
pub fn by_piece_core(
    atoms: &FrozenAtomSet,
    freeze: &[Term],
    variant: CoreRetractionVariant,
    splitter: &dyn PieceSplitter,
    homomorphism: &dyn HomomorphismAlgorithmProvider,
    limits: &mut Limits,
) -> FrozenAtomSet {
    let frozen: HashSet<Term> = freeze.iter().cloned().collect();
    let pin = freeze_substitution(freeze);
    let pre_sub = Substitution::new();
    let mut target = atoms.to_mutable();
    let active: HashSet<Term> = target.variables().into_iter().filter(|v| !frozen.contains(v)).collect();
    let pieces = splitter.split(atoms, &active);

    for piece in &pieces {
        process_piece(variant, piece, &mut target, &frozen, &pre_sub, &pin, homomorphism, limits);
    }

    naive_core(&target.to_frozen(), freeze, homomorphism, limits)
}

/// By-piece-and-variable core computation: within each piece, tests each
/// variable individually rather than searching for whole-piece
/// homomorphisms (`by_piece_and_variable_core_processor.py`).
pub fn by_piece_and_variable_core(
    atoms: &FrozenAtomSet,
    freeze: &[Term],
    splitter: &dyn PieceSplitter,
    homomorphism: &dyn HomomorphismAlgorithmProvider,
    limits: &mut Limits,
) -> FrozenAtomSet {
    let frozen: HashSet<Term> = freeze.iter().cloned().collect();
    let pin = freeze_substitution(freeze);
    let mut target = atoms.to_mutable();
    let active: HashSet<Term> = target.variables().into_iter().filter(|v| !frozen.contains(v)).collect();
    let pieces = splitter.split(atoms, &active);

    for piece in &pieces {
        let mut piece_mut = piece.to_mutable();
        for var in piece_mut.variables() {
            let using_var = atoms_with_variable(&piece_mut, &var);
            if using_var.is_empty() {
                continue;
            }
            let virtual_target = without_atoms(&target, &using_var).apply_substitution(&pin);
            let query_atoms: Vec<Atom> = piece_mut.iter().map(|a| a.apply_substitution(&pin)).collect();
            let data = InMemoryDataSource::new(virtual_target);
            let found = homomorphism
                .exist_homomorphism(&query_atoms, &Substitution::new(), &data, limits)
                .unwrap_or(false);
            if found {
                target.remove_all(using_var.iter());
                piece_mut.remove_all(using_var.iter());
            }
        }
    }

    naive_core(&target.to_frozen(), freeze, homomorphism, limits)
}

/// Multithreaded by-piece core computation: pieces are dispatched across a
/// rayon thread pool of `num_threads` workers, but every piece's
/// read-modify-write on the shared target is serialized behind a mutex,
/// trading full parallelism for results identical to the sequential variant
/// (`multithread_by_piece_core_processor.py`).
pub fn multithreaded_by_piece_core(
    atoms: &FrozenAtomSet,
    freeze: &[Term],
    variant: CoreRetractionVariant,
    splitter: &dyn PieceSplitter,
    homomorphism: &dyn HomomorphismAlgorithmProvider,
    num_threads: usize,
    limits: &Limits,
) -> FrozenAtomSet {
    let frozen: HashSet<Term> = freeze.iter().cloned().collect();
    let pin = freeze_substitution(freeze);
    let pre_sub = Substitution::new();
    let target = Mutex::new(atoms.to_mutable());
    let active: HashSet<Term> = target.lock().variables().into_iter().filter(|v| !frozen.contains(v)).collect();
    let pieces = splitter.split(atoms, &active);

    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(num_threads.max(1))
        .build()
        .expect("thread pool construction with a positive thread count cannot fail");

    pool.install(|| {
        pieces.par_iter().for_each(|piece| {
            let mut local_limits = limits.clone();
            let mut guard = target.lock();
            process_piece(variant, piece, &mut guard, &frozen, &pre_sub, &pin, homomorphism, &mut local_limits);
        });
    });

    let final_target = target.into_inner();
    naive_core(&final_target.to_frozen(), freeze, homomorphism, &mut limits.clone())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exec_limits::Limits;
    use crate::session::DefaultHomomorphismProvider;
    use crate::term::{PredicateFactory, TermFactory};

    #[test]
    fn naive_core_retracts_redundant_duplicate_atom() {
        let tf = TermFactory::new();
        let pf = PredicateFactory::new();
        let p = pf.create_predicate("p", 1);
        let a = tf.create_constant("a");
        let x = tf.create_variable("X");
        let atoms: FrozenAtomSet = vec![
            Atom::new(p.clone(), vec![a.clone()]),
            Atom::new(p, vec![x]),
        ]
        .into_iter()
        .collect();
        let provider = DefaultHomomorphismProvider;
        let mut limits = Limits::unbounded();
        let core = naive_core(&atoms, &[], &provider, &mut limits);
        assert_eq!(core.len(), 1);
    }

    #[test]
    fn by_piece_core_matches_naive_on_simple_example() {
        let tf = TermFactory::new();
        let pf = PredicateFactory::new();
        let p = pf.create_predicate("p", 1);
        let a = tf.create_constant("a");
        let x = tf.create_variable("X");
        let atoms: FrozenAtomSet = vec![
            Atom::new(p.clone(), vec![a]),
            Atom::new(p, vec![x]),
        ]
        .into_iter()
        .collect();
        let provider = DefaultHomomorphismProvider;
        let splitter = VariableInducedPieceSplitter;
        let mut limits = Limits::unbounded();
        let core = by_piece_core(
            &atoms,
            &[],
            CoreRetractionVariant::ByDeletion,
            &splitter,
            &provider,
            &mut limits,
        );
        assert_eq!(core.len(), 1);
    }

    #[test]
    fn frozen_variables_are_never_retracted() {
        let tf = TermFactory::new();
        let pf = PredicateFactory::new();
        let p = pf.create_predicate("p", 1);
        let x = tf.create_variable("X");
        let atoms: FrozenAtomSet = vec![Atom::new(p, vec![x.clone()])].into_iter().collect();
        let provider = DefaultHomomorphismProvider;
        let mut limits = Limits::unbounded();
        let core = naive_core(&atoms, &[x], &provider, &mut limits);
        assert_eq!(core.len(), 1);
    }

    #[test]
    fn piece_splitter_groups_atoms_sharing_active_variables() {
        let tf = TermFactory::new();
        let pf = PredicateFactory::new();
        let p = pf.create_predicate("p", 2);
        let q = pf.create_predicate("q", 1);
        let x = tf.create_variable("X");
        let y = tf.create_variable("Y");
        let z = tf.create_variable("Z");
        let atoms: FrozenAtomSet = vec![
            Atom::new(p, vec![x.clone(), y.clone()]),
            Atom::new(q, vec![z.clone()]),
        ]
        .into_iter()
        .collect();
        let splitter = VariableInducedPieceSplitter;
        let active: HashSet<Term> = vec![x, y, z].into_iter().collect();
        let pieces = splitter.split(&atoms, &active);
        assert_eq!(pieces.len(), 2);
    }
}
