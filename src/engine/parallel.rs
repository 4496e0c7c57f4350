//! Batch matching
//!
//! Matches many independent utterances against one rule. Match state lives on
//! the tree, so every worker matches against its own clone of the arena; the
//! caller's arena is never touched.
//!
//! # Feature Flag
//!
//! Work is spread over threads only when the `parallel` feature is enabled:
//!
//! ```toml
//! [dependencies]
//! jsgf-match = { version = "0.1", features = ["parallel"] }
//! ```
//!
//! Without it the same functions run sequentially on a single clone.
//!
//! # Example
//!
//! ```
//! use jsgf_match::builder::{alt, lit};
//! use jsgf_match::{match_batch_parallel, ExpansionArena, RuleDef};
//!
//! let mut arena = ExpansionArena::new();
//! let rule = arena.build_rule(&RuleDef::new("yes_no", alt([lit("yes"), lit("no")]))).unwrap();
//!
//! let results = match_batch_parallel(&arena, rule, &["yes", "maybe", "no"]);
//! let matched: Vec<bool> = results.into_iter().map(|r| r.unwrap()).collect();
//! assert_eq!(matched, vec![true, false, true]);
//! ```

use super::arena::{ExpansionArena, RuleId};
use super::error::ExpansionError;

#[cfg(feature = "parallel")]
use rayon::prelude::*;

/// Match multiple inputs against `rule`
///
/// Results are in the same order as `inputs`.
pub fn match_batch_parallel(
    arena: &ExpansionArena,
    rule: RuleId,
    inputs: &[&str],
) -> Vec<Result<bool, ExpansionError>> {
    match_batch_parallel_with_config(arena, rule, inputs, &ParallelConfig::default())
}

/// Match multiple owned inputs against `rule`
pub fn match_batch_parallel_owned(
    arena: &ExpansionArena,
    rule: RuleId,
    inputs: Vec<String>,
) -> Vec<Result<bool, ExpansionError>> {
    let inputs: Vec<&str> = inputs.iter().map(String::as_str).collect();
    match_batch_parallel(arena, rule, &inputs)
}

/// Match multiple inputs with an explicit thread configuration
#[cfg(feature = "parallel")]
pub fn match_batch_parallel_with_config(
    arena: &ExpansionArena,
    rule: RuleId,
    inputs: &[&str],
    config: &ParallelConfig,
) -> Vec<Result<bool, ExpansionError>> {
    let run = || {
        inputs
            .par_iter()
            .with_min_len(config.min_chunk_size.max(1))
            .map_init(|| arena.clone(), |local, input| local.matches(rule, input))
            .collect()
    };

    match config.num_threads {
        Some(n) => match rayon::ThreadPoolBuilder::new().num_threads(n).build() {
            Ok(pool) => pool.install(run),
            Err(_err) => {
                log_debug!("Falling back to the global thread pool: {}", _err);
                run()
            }
        },
        None => run(),
    }
}

/// Match multiple inputs sequentially (fallback without rayon)
#[cfg(not(feature = "parallel"))]
pub fn match_batch_parallel_with_config(
    arena: &ExpansionArena,
    rule: RuleId,
    inputs: &[&str],
    _config: &ParallelConfig,
) -> Vec<Result<bool, ExpansionError>> {
    let mut local = arena.clone();
    inputs
        .iter()
        .map(|input| local.matches(rule, input))
        .collect()
}

/// Configuration for batch matching
#[derive(Debug, Clone)]
pub struct ParallelConfig {
    /// Number of threads to use (None = auto)
    pub num_threads: Option<usize>,
    /// Minimum number of inputs per work item
    pub min_chunk_size: usize,
}

impl Default for ParallelConfig {
    fn default() -> Self {
        Self {
            num_threads: None,
            min_chunk_size: 1,
        }
    }
}

impl ParallelConfig {
    /// Create a new configuration with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the number of threads to use
    pub fn with_num_threads(mut self, n: usize) -> Self {
        self.num_threads = Some(n);
        self
    }

    /// Set the minimum number of inputs per work item
    pub fn with_min_chunk_size(mut self, size: usize) -> Self {
        self.min_chunk_size = size;
        self
    }
}
