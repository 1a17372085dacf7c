//! Demonstration binary: builds a small rule set and union of conjunctive
//! queries programmatically (no textual syntax — `spec.md`'s Non-goals
//! exclude a parser) and runs homomorphism evaluation, UCQ rewriting, and
//! core computation over it, logging each stage with `tracing`.
//!
//! Mirrors `examples/inputlayer-inputlayer/src/main.rs`'s role as a small
//! runnable demonstration of the library, without resurrecting a REPL.

use clap::Parser;
use ruleweave::atom::{Atom, FrozenAtomSet};
use ruleweave::core_computation::{by_piece_core, CoreRetractionVariant, VariableInducedPieceSplitter};
use ruleweave::query::ConjunctiveQuery;
use ruleweave::rewriting::rewrite;
use ruleweave::rule::Rule;
use ruleweave::{EngineConfig, Limits, Session, Substitution};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "ruleweave-demo", about = "Runs a small example through the reasoning core")]
struct Cli {
    /// Path to a TOML configuration file; falls back to config.toml/env if absent.
    #[arg(long)]
    config: Option<String>,

    /// Override the rewriting step limit for this run.
    #[arg(long)]
    max_rewriting_steps: Option<u64>,
}

fn init_tracing(config: &EngineConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.logging.level.clone()));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

/// `0` means unbounded in both `ExecutionConfig::max_steps` and
/// `ExecutionConfig::timeout_ms`.
fn limits_from_config(config: &EngineConfig) -> Limits {
    let mut limits = Limits::unbounded();
    if config.execution.max_steps > 0 {
        limits = limits.with_max_steps(config.execution.max_steps);
    }
    if config.execution.timeout_ms > 0 {
        limits = limits.with_timeout(std::time::Duration::from_millis(config.execution.timeout_ms));
    }
    limits
}

/// `parent(X, Y), parent(Y, Z) -> ancestor(X, Z)` plus a base fact set, to
/// exercise homomorphism evaluation, rewriting, and core computation in one
/// pass.
fn build_example(session: &Session) -> (Vec<Rule>, FrozenAtomSet, ConjunctiveQuery) {
    let tf = session.term_factory();
    let pf = session.predicate_factory();
    let parent = pf.create_predicate("parent", 2);
    let ancestor = pf.create_predicate("ancestor", 2);

    let x = tf.create_variable("X");
    let y = tf.create_variable("Y");
    let z = tf.create_variable("Z");

    let body = ConjunctiveQuery::new(
        vec![
            Atom::new(parent.clone(), vec![x.clone(), y.clone()]),
            Atom::new(parent.clone(), vec![y.clone(), z.clone()]),
        ]
        .into_iter()
        .collect(),
        vec![x.clone(), z.clone()],
    );
    let head = ConjunctiveQuery::new(
        vec![Atom::new(ancestor.clone(), vec![x.clone(), z.clone()])]
            .into_iter()
            .collect(),
        vec![x, z],
    );
    let rule = Rule::new(body, vec![head]).with_label("transitive_ancestor");

    let alice = tf.create_constant("alice");
    let bob = tf.create_constant("bob");
    let carol = tf.create_constant("carol");
    let facts: FrozenAtomSet = vec![
        Atom::new(parent.clone(), vec![alice, bob.clone()]),
        Atom::new(parent, vec![bob, carol]),
    ]
    .into_iter()
    .collect();

    let qx = tf.create_variable("QX");
    let query = ConjunctiveQuery::new(
        vec![Atom::new(ancestor, vec![qx.clone(), tf.create_variable("QY")])]
            .into_iter()
            .collect(),
        vec![qx],
    );

    (vec![rule], facts, query)
}

fn main() {
    let cli = Cli::parse();
    let config = match &cli.config {
        Some(path) => EngineConfig::from_file(path).unwrap_or_else(|e| {
            eprintln!("failed to load config from {path}: {e}, falling back to defaults");
            EngineConfig::default()
        }),
        None => EngineConfig::load().unwrap_or_default(),
    };
    init_tracing(&config);

    let session = Session::new();
    let (rules, facts, query) = build_example(&session);

    tracing::info!(predicates = ?facts.predicates().collect::<Vec<_>>(), "loaded fact base");

    let data = ruleweave::homomorphism::data_source::InMemoryDataSource::new(facts.clone());
    let mut eval_limits = limits_from_config(&config);
    let answers = session
        .homomorphism_provider()
        .evaluate(
            &query.atoms().iter().cloned().collect::<Vec<_>>(),
            query.answer_variables(),
            &Substitution::new(),
            &data,
            &mut eval_limits,
        )
        .expect("evaluation against an in-memory data source does not raise dataflow errors here");
    tracing::info!(count = answers.value.len(), complete = answers.complete, "direct evaluation finished");

    let max_steps = cli.max_rewriting_steps.unwrap_or(config.rewriting.max_steps);
    let mut rewrite_limits = Limits::unbounded();
    let (rewritten, converged) = rewrite(
        vec![query],
        &rules,
        session.term_factory(),
        session.homomorphism_provider(),
        max_steps,
        &mut rewrite_limits,
    );
    tracing::info!(cq_count = rewritten.len(), converged, "rewriting saturated");

    let mut core_limits = Limits::unbounded();
    let splitter = VariableInducedPieceSplitter;
    let core = by_piece_core(
        &facts,
        &[],
        CoreRetractionVariant::ByDeletion,
        &splitter,
        session.homomorphism_provider(),
        &mut core_limits,
    );
    tracing::info!(atom_count = core.len(), "core computation finished");
}
