//! First-order formulas and the prepared-plan tree mirroring their shape
//! (`spec.md` §4.2 "Prepared queries", §9 Design Notes: "a prepared plan is
//! built once per (query shape, data source) pair and matched by
//! construction on the variant").

use super::data_source::{BasicQuery, DataSource};
use crate::atom::Atom;
use crate::error::EngineError;
use crate::exec_limits::Limits;
use crate::partition::TermPartition;
use crate::substitution::Substitution;
use crate::term::Term;
use std::collections::HashSet;

/// A tagged-variant formula (`spec.md` §9: "`Formula::Atom | Conjunction |
/// Disjunction | Negation | Existential | Universal`").
#[derive(Debug, Clone)]
pub enum Formula {
    Atom(Atom),
    Conjunction(Vec<Formula>),
    Disjunction(Vec<Formula>),
    Negation(Box<Formula>),
    Existential(Term, Box<Formula>),
    Universal(Term, Box<Formula>),
}

impl Formula {
    pub fn free_variables(&self) -> Vec<Term> {
        let mut out = Vec::new();
        self.free_variables_into(&mut out);
        out.sort();
        out.dedup();
        out
    }

    fn free_variables_into(&self, out: &mut Vec<Term>) {
        match self {
            Formula::Atom(a) => out.extend(a.variables()),
            Formula::Conjunction(fs) | Formula::Disjunction(fs) => {
                for f in fs {
                    f.free_variables_into(out);
                }
            }
            Formula::Negation(inner) => inner.free_variables_into(out),
            Formula::Existential(v, inner) | Formula::Universal(v, inner) => {
                let mut nested = Vec::new();
                inner.free_variables_into(&mut nested);
                out.extend(nested.into_iter().filter(|t| t != v));
            }
        }
    }

    /// Flattens nested conjunctions into one level, per the conjunction
    /// plan's first step.
    fn flatten_conjunction(formulas: Vec<Formula>) -> Vec<Formula> {
        let mut out = Vec::new();
        for f in formulas {
            match f {
                Formula::Conjunction(inner) => out.extend(Self::flatten_conjunction(inner)),
                other => out.push(other),
            }
        }
        out
    }
}

/// Whether an atom plan position is already ground in the atom itself
/// (independent of any runtime substitution) or must be bound/propagated
/// through a variable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PositionRole {
    Ground,
    Bind,
}

#[derive(Debug, Clone)]
pub struct AtomPlan {
    atom: Atom,
    roles: Vec<PositionRole>,
}

/// The prepared plan tree.
#[derive(Debug, Clone)]
pub enum Plan {
    Atom(AtomPlan),
    Conjunction(Vec<Plan>),
    Disjunction(Vec<Plan>),
    Negation(Box<Plan>),
    Existential(Term, Box<Plan>),
    Universal(Term, Box<Plan>),
}

impl Plan {
    /// Builds a prepared plan once for a given `(formula shape, data
    /// source)` pair. Fails with [`EngineError::UnsupportedFormula`] if the
    /// data source cannot ever enumerate a domain needed by a `Universal`
    /// node (a `Negation` node's domain need is runtime-dependent on which
    /// variables end up unbound, so it is deferred to evaluation).
    pub fn prepare(formula: Formula, data: &dyn DataSource) -> Result<Plan, EngineError> {
        match formula {
            Formula::Atom(atom) => {
                let roles = atom
                    .terms()
                    .iter()
                    .map(|t| {
                        if t.is_ground() {
                            PositionRole::Ground
                        } else {
                            PositionRole::Bind
                        }
                    })
                    .collect();
                Ok(Plan::Atom(AtomPlan { atom, roles }))
            }
            Formula::Conjunction(fs) => {
                let flat = Formula::flatten_conjunction(fs);
                let plans = flat
                    .into_iter()
                    .map(|f| Plan::prepare(f, data))
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(Plan::Conjunction(plans))
            }
            Formula::Disjunction(fs) => {
                let plans = fs
                    .into_iter()
                    .map(|f| Plan::prepare(f, data))
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(Plan::Disjunction(plans))
            }
            Formula::Negation(inner) => Ok(Plan::Negation(Box::new(Plan::prepare(*inner, data)?))),
            Formula::Existential(v, inner) => {
                Ok(Plan::Existential(v, Box::new(Plan::prepare(*inner, data)?)))
            }
            Formula::Universal(v, inner) => {
                if data.terms().is_none() {
                    return Err(EngineError::UnsupportedFormula(
                        "universal quantification requires a data source that can enumerate its term domain".into(),
                    ));
                }
                Ok(Plan::Universal(v, Box::new(Plan::prepare(*inner, data)?)))
            }
        }
    }
}

fn basic_query_for(atom: &Atom, roles: &[PositionRole], sub: &Substitution) -> BasicQuery {
    let mut query = BasicQuery::new(atom.predicate().clone());
    for (pos, (term, role)) in atom.terms().iter().zip(roles.iter()).enumerate() {
        match role {
            PositionRole::Ground => {
                query.bound_positions.insert(pos, term.clone());
            }
            PositionRole::Bind => {
                let bound = sub.apply(term);
                if bound.is_ground() {
                    query.bound_positions.insert(pos, bound);
                } else {
                    query.answer_positions.insert(pos, bound);
                }
            }
        }
    }
    query
}

fn dedup(subs: Vec<Substitution>) -> Vec<Substitution> {
    let mut seen = HashSet::new();
    subs.into_iter()
        .filter(|s| seen.insert(s.canonical_pairs()))
        .collect()
}

fn estimate_plan_bound(plan: &Plan, sub: &Substitution, data: &dyn DataSource) -> usize {
    match plan {
        Plan::Atom(ap) => {
            let bq = basic_query_for(&ap.atom, &ap.roles, sub);
            data.estimate_bound(&bq).unwrap_or(usize::MAX)
        }
        _ => usize::MAX / 2,
    }
}

/// Evaluates a prepared plan against `data` under `sub`, honoring `limits`.
pub fn evaluate_plan(
    plan: &Plan,
    data: &dyn DataSource,
    sub: &Substitution,
    limits: &mut Limits,
) -> Result<Vec<Substitution>, EngineError> {
    if limits.tick() {
        return Ok(Vec::new());
    }
    match plan {
        Plan::Atom(ap) => {
            let bq = basic_query_for(&ap.atom, &ap.roles, sub);
            if !data.can_evaluate(&bq) {
                let pattern = data.get_atomic_pattern(ap.atom.predicate());
                if let Some(&missing) = pattern
                    .mandatory_positions
                    .iter()
                    .find(|p| !bq.bound_positions.contains_key(p))
                {
                    return Err(EngineError::Dataflow {
                        predicate: ap.atom.predicate().name().to_string(),
                        position: missing,
                    });
                }
                return Ok(Vec::new());
            }
            let mut out = Vec::new();
            for tuple in data.evaluate(&bq) {
                let candidate = Atom::new(ap.atom.predicate().clone(), tuple);
                if let Some(refined) = ap.atom.unify_into(&candidate, sub) {
                    out.push(refined);
                }
            }
            Ok(dedup(out))
        }
        Plan::Conjunction(plans) => evaluate_conjunction(plans, data, sub, limits),
        Plan::Disjunction(plans) => {
            let mut out = Vec::new();
            for p in plans {
                out.extend(evaluate_plan(p, data, sub, limits)?);
                if limits.exhausted() {
                    break;
                }
            }
            Ok(dedup(out))
        }
        Plan::Existential(var, inner) => {
            let results = evaluate_plan(inner, data, sub, limits)?;
            let projected: Vec<Substitution> = results
                .into_iter()
                .map(|s| {
                    let domain: Vec<Term> = s.domain().filter(|v| *v != var).cloned().collect();
                    s.restrict_to(&domain)
                })
                .collect();
            Ok(dedup(projected))
        }
        Plan::Universal(var, inner) => {
            let Some(domain) = data.terms() else {
                return Err(EngineError::UnsupportedFormula(
                    "universal quantification requires domain enumeration".into(),
                ));
            };
            for term in domain {
                if limits.exhausted() {
                    break;
                }
                let candidate = sub.extended(var.clone(), term);
                if evaluate_plan(inner, data, &candidate, limits)?.is_empty() {
                    return Ok(Vec::new());
                }
            }
            Ok(vec![sub.clone()])
        }
        Plan::Negation(inner) => evaluate_negation(inner, data, sub, limits),
    }
}

fn evaluate_conjunction(
    plans: &[Plan],
    data: &dyn DataSource,
    sub: &Substitution,
    limits: &mut Limits,
) -> Result<Vec<Substitution>, EngineError> {
    // Extract equality atoms (predicate "=") into one partition applied
    // before execution, per the conjunction plan's first step.
    let mut partition = TermPartition::new();
    let mut rest: Vec<&Plan> = Vec::new();
    for p in plans {
        if let Plan::Atom(ap) = p {
            if ap.atom.predicate().is_equality() {
                let terms = ap.atom.terms();
                partition.union(&sub.apply(&terms[0]), &sub.apply(&terms[1]));
                continue;
            }
        }
        rest.push(p);
    }
    let Some(equality_sub) = partition.associated_substitution(None) else {
        return Ok(Vec::new());
    };
    let base = equality_sub.compose(sub);
    join_remaining(&rest, data, &base, limits)
}

fn join_remaining(
    plans: &[&Plan],
    data: &dyn DataSource,
    sub: &Substitution,
    limits: &mut Limits,
) -> Result<Vec<Substitution>, EngineError> {
    if plans.is_empty() {
        return Ok(vec![sub.clone()]);
    }
    let (idx, _) = plans
        .iter()
        .enumerate()
        .min_by_key(|&(_, p)| estimate_plan_bound(p, sub, data))
        .expect("plans is non-empty");
    let chosen = plans[idx];
    let remaining: Vec<&Plan> = plans
        .iter()
        .enumerate()
        .filter(|&(i, _)| i != idx)
        .map(|(_, p)| *p)
        .collect();
    let mut out = Vec::new();
    for s in evaluate_plan(chosen, data, sub, limits)? {
        if limits.exhausted() {
            break;
        }
        out.extend(join_remaining(&remaining, data, &s, limits)?);
    }
    Ok(dedup(out))
}

fn evaluate_negation(
    inner: &Plan,
    data: &dyn DataSource,
    sub: &Substitution,
    limits: &mut Limits,
) -> Result<Vec<Substitution>, EngineError> {
    let free = plan_free_variables(inner);
    let unbound: Vec<Term> = free.into_iter().filter(|v| !sub.apply(v).is_ground()).collect();
    if unbound.is_empty() {
        return if evaluate_plan(inner, data, sub, limits)?.is_empty() {
            Ok(vec![sub.clone()])
        } else {
            Ok(Vec::new())
        };
    }
    tracing::warn!(
        unbound = unbound.len(),
        "negation over unbound variables requires full domain enumeration"
    );
    let Some(domain) = data.terms() else {
        return Err(EngineError::UnsupportedFormula(
            "negation over unbound variables requires domain enumeration".into(),
        ));
    };
    let mut out = Vec::new();
    let combos = cartesian_product(unbound.len(), &domain);
    for combo in combos {
        if limits.exhausted() {
            break;
        }
        let mut candidate = sub.clone();
        for (v, t) in unbound.iter().zip(combo.iter()) {
            candidate = candidate.extended(v.clone(), t.clone());
        }
        if evaluate_plan(inner, data, &candidate, limits)?.is_empty() {
            out.push(candidate);
        }
    }
    Ok(dedup(out))
}

fn plan_free_variables(plan: &Plan) -> Vec<Term> {
    let mut out = Vec::new();
    plan_free_variables_into(plan, &mut out);
    out.sort();
    out.dedup();
    out
}

fn plan_free_variables_into(plan: &Plan, out: &mut Vec<Term>) {
    match plan {
        Plan::Atom(ap) => out.extend(ap.atom.variables()),
        Plan::Conjunction(ps) | Plan::Disjunction(ps) => {
            for p in ps {
                plan_free_variables_into(p, out);
            }
        }
        Plan::Negation(inner) => plan_free_variables_into(inner, out),
        Plan::Existential(v, inner) | Plan::Universal(v, inner) => {
            let mut nested = Vec::new();
            plan_free_variables_into(inner, &mut nested);
            out.extend(nested.into_iter().filter(|t| t != v));
        }
    }
}

fn cartesian_product(n: usize, domain: &[Term]) -> Vec<Vec<Term>> {
    let mut result = vec![Vec::new()];
    for _ in 0..n {
        let mut next = Vec::new();
        for prefix in &result {
            for t in domain {
                let mut p = prefix.clone();
                p.push(t.clone());
                next.push(p);
            }
        }
        result = next;
    }
    result
}
