//! jsgf-match - JSGF Expansion Trees and Speech Matching
//!
//! This library holds the in-memory form of JSGF grammars and matches spoken
//! utterances against their rules. It provides:
//! - Expansion trees with strict single-parent ownership
//! - Lazily compiled matchers with upward invalidation
//! - Per-node match introspection, including per-repetition history
//! - Descendant and mutual-exclusivity queries with a per-tree cache
//! - Rules and grammars with name-based reference resolution
//! - Serializable definitions (JSON via serde) and a construction DSL
//! - Grammar lint, tree printing and batch matching
//!
//! ## Quick Start
//!
//! ```rust
//! use jsgf_match::builder::{alt, lit, opt, seq};
//! use jsgf_match::{ExpansionArena, RuleDef};
//!
//! let mut arena = ExpansionArena::new();
//! let def = RuleDef::new(
//!     "greet",
//!     seq([alt([lit("hello"), lit("hi")]), opt(lit("there").tagged("polite"))]),
//! );
//! let rule = arena.build_rule(&def).unwrap();
//!
//! assert!(arena.matches(rule, "Hello there").unwrap());
//! assert_eq!(arena.matched_tags(rule), vec!["polite".to_string()]);
//! assert!(!arena.matches(rule, "hello world").unwrap());
//! ```
//!
//! ## Loading Definitions
//!
//! ```rust
//! use jsgf_match::ExpansionArena;
//!
//! let json = r#"{
//!     "name": "commands",
//!     "rules": [
//!         { "name": "stop", "expansion": { "kind": { "Literal": { "text": "stop" } } } }
//!     ]
//! }"#;
//!
//! let mut arena = ExpansionArena::new();
//! let grammar = arena.load_grammar_json(json).unwrap();
//! let stop = arena.get_rule_by_name(grammar, "stop").unwrap();
//! assert!(arena.matches(stop, "stop").unwrap());
//! ```
//!
//! ## Feature Flags
//!
//! - `logging` - Enable debug logging using the `log` crate
//! - `parallel` - Spread batch matching over threads with `rayon`

// Lint configuration for production quality
#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]
#![warn(clippy::all)]
#![allow(clippy::new_without_default)]

/// Logging macros - no-op when logging feature is disabled
#[cfg(not(feature = "logging"))]
macro_rules! log_debug {
    ($($arg:tt)*) => {};
}

/// Logging macros - use log crate when logging feature is enabled
#[cfg(feature = "logging")]
macro_rules! log_debug {
    ($($arg:tt)*) => { log::debug!($($arg)*) };
}

#[cfg(not(feature = "logging"))]
macro_rules! log_trace {
    ($($arg:tt)*) => {};
}

#[cfg(feature = "logging")]
macro_rules! log_trace {
    ($($arg:tt)*) => { log::trace!($($arg)*) };
}

// Prelude module for convenient imports
pub mod prelude;

// Expansion tree engine
pub mod engine;

pub use engine::builder;

/// Re-export commonly used types for convenience
pub use engine::{
    // Batch matching
    match_batch_parallel,
    match_batch_parallel_owned,
    match_batch_parallel_with_config,
    AnalysisCache,
    Arity,
    DefKind,
    ExpansionArena,
    ExpansionDef,
    ExpansionError,
    ExpansionStats,
    ExpansionVisitor,
    Grammar,
    GrammarDef,
    GrammarId,
    // Lint
    GrammarLinter,
    KindCounter,
    LintKind,
    LintWarning,
    MatchConfig,
    MatchedSpan,
    Node,
    NodeId,
    NodeKind,
    ParallelConfig,
    Rule,
    RuleDef,
    RuleId,
    Snapshot,
    SnapshotEntry,
    SpliceGuard,
    TraverseOrder,
    // Debug tools
    TreePrinter,
    DEFAULT_GRAMMAR_NAME,
    DEFAULT_MAX_RECURSION_DEPTH,
    NULL_RULE_NAME,
    VOID_RULE_NAME,
};
