//! Term model (C1): variables, constants, literals, function terms, and the
//! predicates atoms are built from.
//!
//! Terms are interned: a [`TermFactory`] keeps a table from constructor key
//! (name, or lexical+datatype+lang, or functor+args) to a shared [`Term`]
//! handle, so that two terms built from equal keys are the same `Arc` and
//! structural equality is cheap. Numeric literals additionally compare equal
//! across representations (`Integer`/`Decimal`/`Double`) per the numeric
//! tower described in `spec.md` §3 — that comparison is layered on top of,
//! not a replacement for, interning identity (see `DESIGN.md`).

use dashmap::DashMap;
use std::cmp::Ordering;
use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::sync::Arc;

/// A parsed literal value, used for the numeric tower and lexical
/// comparisons described in `spec.md` §3.
#[derive(Debug, Clone)]
pub enum ParsedValue {
    Integer(i64),
    /// Fixed-point decimal: `mantissa * 10^-scale`.
    Decimal { mantissa: i64, scale: u32 },
    Double(f64),
    Boolean(bool),
    Str(String),
    Date(chrono::NaiveDate),
}

impl ParsedValue {
    fn as_numeric(&self) -> Option<f64> {
        match self {
            ParsedValue::Integer(i) => Some(*i as f64),
            ParsedValue::Decimal { mantissa, scale } => {
                Some(*mantissa as f64 / 10f64.powi(*scale as i32))
            }
            ParsedValue::Double(d) => Some(*d),
            _ => None,
        }
    }

    fn is_numeric(&self) -> bool {
        matches!(
            self,
            ParsedValue::Integer(_) | ParsedValue::Decimal { .. } | ParsedValue::Double(_)
        )
    }
}

impl PartialEq for ParsedValue {
    fn eq(&self, other: &Self) -> bool {
        if self.is_numeric() && other.is_numeric() {
            return self.as_numeric() == other.as_numeric();
        }
        match (self, other) {
            (ParsedValue::Boolean(a), ParsedValue::Boolean(b)) => a == b,
            (ParsedValue::Str(a), ParsedValue::Str(b)) => a == b,
            (ParsedValue::Date(a), ParsedValue::Date(b)) => a == b,
            _ => false,
        }
    }
}
impl Eq for ParsedValue {}

impl Hash for ParsedValue {
    fn hash<H: Hasher>(&self, state: &mut H) {
        if let Some(n) = self.as_numeric() {
            0u8.hash(state);
            n.to_bits().hash(state);
            return;
        }
        match self {
            ParsedValue::Boolean(b) => {
                1u8.hash(state);
                b.hash(state);
            }
            ParsedValue::Str(s) => {
                2u8.hash(state);
                s.hash(state);
            }
            ParsedValue::Date(d) => {
                3u8.hash(state);
                d.hash(state);
            }
            ParsedValue::Integer(_) | ParsedValue::Decimal { .. } | ParsedValue::Double(_) => {
                unreachable!("numeric variants handled above")
            }
        }
    }
}

/// A literal: a constant carrying a lexical form, an optional datatype IRI,
/// an optional language tag, and a parsed value.
#[derive(Debug, Clone)]
pub struct LiteralData {
    pub lexical: String,
    pub datatype: Option<String>,
    pub lang: Option<String>,
    pub value: ParsedValue,
}

impl PartialEq for LiteralData {
    fn eq(&self, other: &Self) -> bool {
        self.value == other.value
    }
}
impl Eq for LiteralData {}
impl Hash for LiteralData {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.value.hash(state);
    }
}

/// The payload behind a [`Term`] handle.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TermData {
    Variable(String),
    Constant(String),
    Literal(LiteralData),
    FunctionTerm { functor: String, args: Vec<Term> },
}

/// A term: a variable, constant, literal, or function term.
///
/// Cheaply `Clone`-able (an `Arc` bump); equal terms produced by the same
/// [`TermFactory`] share the same allocation.
#[derive(Debug, Clone)]
pub struct Term(Arc<TermData>);

impl PartialEq for Term {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0) || *self.0 == *other.0
    }
}
impl Eq for Term {}
impl Hash for Term {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.0.hash(state);
    }
}

impl PartialOrd for Term {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}
impl Ord for Term {
    fn cmp(&self, other: &Self) -> Ordering {
        self.comparison_priority()
            .cmp(&other.comparison_priority())
            .then_with(|| cmp_term_data(self.data(), other.data()))
    }
}

/// Structural tie-break consistent with [`Term`]'s `PartialEq`: two terms
/// that compare equal (in particular, numerically-equal literals of
/// different representations) must also `cmp` as `Equal`, so this recurses
/// through the same numeric tower `ParsedValue::eq` uses rather than
/// falling back to `Debug` text, which distinguishes representations that
/// `eq` does not.
fn cmp_term_data(a: &TermData, b: &TermData) -> Ordering {
    fn tag(t: &TermData) -> u8 {
        match t {
            TermData::Variable(_) => 0,
            TermData::Constant(_) => 1,
            TermData::Literal(_) => 2,
            TermData::FunctionTerm { .. } => 3,
        }
    }
    match (a, b) {
        (TermData::Variable(x), TermData::Variable(y)) => x.cmp(y),
        (TermData::Constant(x), TermData::Constant(y)) => x.cmp(y),
        (TermData::Literal(x), TermData::Literal(y)) => cmp_parsed_value(&x.value, &y.value),
        (
            TermData::FunctionTerm { functor: fa, args: aa },
            TermData::FunctionTerm { functor: fb, args: ab },
        ) => fa
            .cmp(fb)
            .then_with(|| aa.len().cmp(&ab.len()))
            .then_with(|| {
                aa.iter()
                    .zip(ab.iter())
                    .map(|(x, y)| x.cmp(y))
                    .find(|o| *o != Ordering::Equal)
                    .unwrap_or(Ordering::Equal)
            }),
        _ => tag(a).cmp(&tag(b)),
    }
}

fn cmp_parsed_value(a: &ParsedValue, b: &ParsedValue) -> Ordering {
    if a.is_numeric() && b.is_numeric() {
        return a
            .as_numeric()
            .unwrap()
            .total_cmp(&b.as_numeric().unwrap());
    }
    fn tag(v: &ParsedValue) -> u8 {
        match v {
            ParsedValue::Integer(_) | ParsedValue::Decimal { .. } | ParsedValue::Double(_) => 0,
            ParsedValue::Boolean(_) => 1,
            ParsedValue::Str(_) => 2,
            ParsedValue::Date(_) => 3,
        }
    }
    match (a, b) {
        (ParsedValue::Boolean(x), ParsedValue::Boolean(y)) => x.cmp(y),
        (ParsedValue::Str(x), ParsedValue::Str(y)) => x.cmp(y),
        (ParsedValue::Date(x), ParsedValue::Date(y)) => x.cmp(y),
        _ => tag(a).cmp(&tag(b)),
    }
}

impl Term {
    pub fn data(&self) -> &TermData {
        &self.0
    }

    /// `true` for variables, `false` for constants/literals/ground function
    /// terms; a function term is ground iff all its arguments are ground.
    pub fn is_ground(&self) -> bool {
        match self.data() {
            TermData::Variable(_) => false,
            TermData::Constant(_) | TermData::Literal(_) => true,
            TermData::FunctionTerm { args, .. } => args.iter().all(Term::is_ground),
        }
    }

    pub fn is_variable(&self) -> bool {
        matches!(self.data(), TermData::Variable(_))
    }

    pub fn as_variable_name(&self) -> Option<&str> {
        match self.data() {
            TermData::Variable(name) => Some(name),
            _ => None,
        }
    }

    /// Constants (priority 0) sort before variables (priority 1) in
    /// [`crate::partition::TermPartition`] representative selection.
    /// Builds a function term directly, bypassing the factory's intern
    /// table. Used by [`crate::substitution::Substitution::apply`] to
    /// rebuild function terms with substituted arguments: the result still
    /// compares equal to an interned term with the same shape (`Term`'s
    /// `PartialEq` falls back to structural comparison), it just isn't the
    /// same `Arc` — acceptable since these are transient, derived terms.
    pub(crate) fn new_function_term(functor: impl Into<String>, args: Vec<Term>) -> Term {
        Term(Arc::new(TermData::FunctionTerm {
            functor: functor.into(),
            args,
        }))
    }

    pub fn comparison_priority(&self) -> u8 {
        match self.data() {
            TermData::Variable(_) => 1,
            TermData::Constant(_) | TermData::Literal(_) | TermData::FunctionTerm { .. } => 0,
        }
    }

    /// All variables occurring in this term (recursing into function-term
    /// arguments).
    pub fn variables_into(&self, out: &mut Vec<Term>) {
        match self.data() {
            TermData::Variable(_) => out.push(self.clone()),
            TermData::Constant(_) | TermData::Literal(_) => {}
            TermData::FunctionTerm { args, .. } => {
                for a in args {
                    a.variables_into(out);
                }
            }
        }
    }
}

/// Interning factory for [`Term`]s. Process-wide in spirit (`spec.md` §5:
/// "Term/predicate factories are process-wide; they must be internally
/// synchronized"): `get_or_create` is safe to call concurrently.
#[derive(Default)]
pub struct TermFactory {
    variables: DashMap<String, Term>,
    constants: DashMap<String, Term>,
    literals: DashMap<(String, Option<String>, Option<String>), Term>,
    function_terms: DashMap<(String, Vec<Term>), Term>,
    fresh_counter: AtomicU64,
}

impl TermFactory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn create_variable(&self, name: impl Into<String>) -> Term {
        let name = name.into();
        self.variables
            .entry(name.clone())
            .or_insert_with(|| Term(Arc::new(TermData::Variable(name))))
            .clone()
    }

    pub fn create_constant(&self, id: impl Into<String>) -> Term {
        let id = id.into();
        self.constants
            .entry(id.clone())
            .or_insert_with(|| Term(Arc::new(TermData::Constant(id))))
            .clone()
    }

    pub fn create_literal(
        &self,
        lexical: impl Into<String>,
        datatype: Option<String>,
        lang: Option<String>,
    ) -> Term {
        let lexical = lexical.into();
        let key = (lexical.clone(), datatype.clone(), lang.clone());
        self.literals
            .entry(key)
            .or_insert_with(|| {
                let value = parse_literal(&lexical, datatype.as_deref());
                Term(Arc::new(TermData::Literal(LiteralData {
                    lexical,
                    datatype,
                    lang,
                    value,
                })))
            })
            .clone()
    }

    pub fn create_integer(&self, v: i64) -> Term {
        self.create_literal(v.to_string(), Some("xsd:integer".to_string()), None)
    }

    pub fn create_function_term(&self, functor: impl Into<String>, args: Vec<Term>) -> Term {
        let functor = functor.into();
        let key = (functor.clone(), args.clone());
        self.function_terms
            .entry(key)
            .or_insert_with(|| Term(Arc::new(TermData::FunctionTerm { functor, args })))
            .clone()
    }

    /// A variable guaranteed not to have been returned by a prior call on
    /// this factory (used for safe-renaming and existential freshening).
    pub fn fresh_variable(&self) -> Term {
        let n = self.fresh_counter.fetch_add(1, AtomicOrdering::Relaxed);
        self.create_variable(format!("_F{n}"))
    }
}

fn parse_literal(lexical: &str, datatype: Option<&str>) -> ParsedValue {
    match datatype {
        Some(dt) if dt.contains("boolean") => {
            ParsedValue::Boolean(lexical == "true" || lexical == "1")
        }
        Some(dt) if dt.contains("date") => chrono::NaiveDate::parse_from_str(lexical, "%Y-%m-%d")
            .map(ParsedValue::Date)
            .unwrap_or_else(|_| ParsedValue::Str(lexical.to_string())),
        Some(dt) if dt.contains("integer") || dt.contains("int") => lexical
            .parse::<i64>()
            .map(ParsedValue::Integer)
            .unwrap_or_else(|_| ParsedValue::Str(lexical.to_string())),
        Some(dt) if dt.contains("decimal") => parse_decimal(lexical)
            .unwrap_or_else(|| ParsedValue::Str(lexical.to_string())),
        Some(dt) if dt.contains("double") || dt.contains("float") => lexical
            .parse::<f64>()
            .map(ParsedValue::Double)
            .unwrap_or_else(|_| ParsedValue::Str(lexical.to_string())),
        _ => {
            if let Ok(i) = lexical.parse::<i64>() {
                ParsedValue::Integer(i)
            } else if let Some(d) = parse_decimal(lexical) {
                d
            } else {
                ParsedValue::Str(lexical.to_string())
            }
        }
    }
}

fn parse_decimal(lexical: &str) -> Option<ParsedValue> {
    let (int_part, frac_part) = lexical.split_once('.')?;
    let scale = frac_part.len() as u32;
    let digits = format!("{int_part}{frac_part}");
    let mantissa: i64 = digits.parse().ok()?;
    Some(ParsedValue::Decimal { mantissa, scale })
}

/// A predicate: `(name, arity)`, value-equal; reserved predicates
/// (equality, comparisons) carry special meaning to the homomorphism
/// engine and core computation.
#[derive(Debug, Clone)]
pub struct Predicate(Arc<PredicateData>);

#[derive(Debug, PartialEq, Eq, Hash)]
struct PredicateData {
    name: String,
    arity: usize,
}

impl PartialEq for Predicate {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0) || *self.0 == *other.0
    }
}
impl Eq for Predicate {}
impl Hash for Predicate {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.0.hash(state);
    }
}

impl Predicate {
    pub fn name(&self) -> &str {
        &self.0.name
    }

    pub fn arity(&self) -> usize {
        self.0.arity
    }

    pub fn is_equality(&self) -> bool {
        self.0.name == "=" && self.0.arity == 2
    }

    pub fn is_comparison(&self) -> bool {
        matches!(self.0.name.as_str(), "<" | "<=" | ">" | ">=" | "!=") && self.0.arity == 2
    }
}

#[derive(Default)]
pub struct PredicateFactory {
    table: DashMap<(String, usize), Predicate>,
}

impl PredicateFactory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn create_predicate(&self, name: impl Into<String>, arity: usize) -> Predicate {
        let name = name.into();
        let key = (name.clone(), arity);
        self.table
            .entry(key)
            .or_insert_with(|| Predicate(Arc::new(PredicateData { name, arity })))
            .clone()
    }

    pub fn equality(&self) -> Predicate {
        self.create_predicate("=", 2)
    }

    pub fn comparison(&self, op: &str) -> Predicate {
        debug_assert!(matches!(op, "<" | "<=" | ">" | ">=" | "!="));
        self.create_predicate(op, 2)
    }
}
