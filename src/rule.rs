//! Existential rules: `body → head`, where `head` is a non-empty ordered
//! list of disjuncts (`spec.md` §3).

use crate::query::ConjunctiveQuery;
use crate::term::Term;

#[derive(Debug, Clone)]
pub struct Rule {
    body: ConjunctiveQuery,
    head: Vec<ConjunctiveQuery>,
    label: Option<String>,
}

impl Rule {
    /// # Panics
    /// If `head` is empty — a rule without a head disjunct is malformed.
    pub fn new(body: ConjunctiveQuery, head: Vec<ConjunctiveQuery>) -> Self {
        assert!(!head.is_empty(), "a rule must have at least one head disjunct");
        Rule {
            body,
            head,
            label: None,
        }
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    pub fn body(&self) -> &ConjunctiveQuery {
        &self.body
    }

    pub fn head(&self) -> &[ConjunctiveQuery] {
        &self.head
    }

    pub fn label(&self) -> Option<&str> {
        self.label.as_deref()
    }

    pub fn is_conjunctive(&self) -> bool {
        self.head.len() == 1
    }

    pub fn is_disjunctive(&self) -> bool {
        !self.is_conjunctive()
    }

    /// `variables(body) ∩ variables(head)`.
    pub fn frontier(&self) -> Vec<Term> {
        let body_vars = self.body.atoms().variables();
        let mut head_vars: Vec<Term> = self
            .head
            .iter()
            .flat_map(|d| d.atoms().variables())
            .collect();
        head_vars.sort();
        head_vars.dedup();
        body_vars
            .into_iter()
            .filter(|v| head_vars.contains(v))
            .collect()
    }

    /// `variables(disjunct) \ frontier` for the head disjunct at `index`.
    pub fn head_existentials(&self, index: usize) -> Vec<Term> {
        let frontier = self.frontier();
        self.head[index]
            .atoms()
            .variables()
            .into_iter()
            .filter(|v| !frontier.contains(v))
            .collect()
    }
}
