//! Configuration system: hierarchical loading from `config.toml`,
//! `config.local.toml`, and `RULEWEAVE_*` environment variables.
//!
//! Grounded on `examples/inputlayer-inputlayer/src/config.rs`'s figment
//! merge order and env-prefix convention, adapted to this engine's own
//! sections (execution limits, scheduler choice, rewriting bounds, worker
//! count) in place of storage/optimization sections this engine has no use for.

use figment::providers::{Env, Format, Toml};
use figment::Figment;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    #[serde(default)]
    pub execution: ExecutionConfig,
    #[serde(default)]
    pub rewriting: RewritingConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionConfig {
    /// Step bound applied to homomorphism search and plan evaluation
    /// (`spec.md` §7); `0` means unbounded.
    #[serde(default = "default_max_steps")]
    pub max_steps: u64,

    /// Wall-clock budget in milliseconds; `0` means unbounded.
    #[serde(default)]
    pub timeout_ms: u64,

    /// Atom-ordering strategy for the backtracking engine: `"most_constrained"`
    /// (default) or `"sequential"`.
    #[serde(default = "default_scheduler")]
    pub scheduler: String,

    /// Worker threads for the multithreaded core-computation strategy.
    /// `0` = use all available cores (`num_cpus::get()`).
    #[serde(default)]
    pub num_threads: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RewritingConfig {
    /// Maximum number of rewriting rounds before the outer loop gives up
    /// (`spec.md` §4.4).
    #[serde(default = "default_max_rewriting_steps")]
    pub max_steps: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default = "default_log_format")]
    pub format: String,
}

fn default_max_steps() -> u64 {
    0
}
fn default_scheduler() -> String {
    "most_constrained".to_string()
}
fn default_max_rewriting_steps() -> u64 {
    1000
}
fn default_log_level() -> String {
    "info".to_string()
}
fn default_log_format() -> String {
    "text".to_string()
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        ExecutionConfig {
            max_steps: default_max_steps(),
            timeout_ms: 0,
            scheduler: default_scheduler(),
            num_threads: 0,
        }
    }
}

impl Default for RewritingConfig {
    fn default() -> Self {
        RewritingConfig {
            max_steps: default_max_rewriting_steps(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        LoggingConfig {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            execution: ExecutionConfig::default(),
            rewriting: RewritingConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl EngineConfig {
    /// Merges, in order: `config.toml`, `config.local.toml` (git-ignored
    /// overrides), then `RULEWEAVE_*` environment variables
    /// (double-underscore-separated for nested keys, e.g.
    /// `RULEWEAVE_EXECUTION__MAX_STEPS=5000`).
    pub fn load() -> Result<Self, figment::Error> {
        Figment::from(figment::providers::Serialized::defaults(EngineConfig::default()))
            .merge(Toml::file("config.toml"))
            .merge(Toml::file("config.local.toml"))
            .merge(Env::prefixed("RULEWEAVE_").split("__"))
            .extract()
    }

    pub fn from_file(path: &str) -> Result<Self, figment::Error> {
        Figment::from(figment::providers::Serialized::defaults(EngineConfig::default()))
            .merge(Toml::file(path))
            .merge(Env::prefixed("RULEWEAVE_").split("__"))
            .extract()
    }

    pub fn worker_count(&self) -> usize {
        if self.execution.num_threads == 0 {
            num_cpus::get()
        } else {
            self.execution.num_threads
        }
    }
}
