//! Expansion tree engine
//!
//! Everything lives in one [`ExpansionArena`]: expansion nodes, rules and
//! grammars are addressed by copyable ids, and every operation is a method
//! on the arena.
//!
//! # Module Organization
//!
//! ## Core Types
//! - [`arena`] - Arena, ids and node constructors
//! - [`node`] - Node kinds and per-node state
//! - [`ownership`] - Child mutation, weights, copies and structural identity
//! - [`error`] - Error type
//!
//! ## Matching
//! - [`matcher`] - Lazy matcher compilation
//! - [`invalidate`] - Upward matcher invalidation
//! - [`matching`] - The matching interpreter and its configuration
//! - [`history`] - Repetition snapshots
//! - [`literal_cache`] - Compiled literal patterns
//!
//! ## Rules and Grammars
//! - [`rule`] - Rules, references and tags
//! - [`grammar`] - Rule containers and name resolution
//! - [`builder`] - Serializable definitions and a construction DSL
//!
//! ## Analysis
//! - [`analysis`] - Descendant and mutual-exclusivity queries
//! - [`splice`] - Scoped splicing of referenced rules
//! - [`lint`] - Grammar lint
//!
//! ## Tooling
//! - [`visitor`] - Traversal
//! - [`debug`] - Tree printing and JSGF rendering
//! - [`parallel`] - Batch matching

// ============================================================================
// Module Declarations
// ============================================================================

pub mod analysis;
pub mod arena;
pub mod builder;
pub mod debug;
pub mod error;
pub mod grammar;
pub mod history;
pub mod invalidate;
pub mod lint;
pub mod literal_cache;
pub mod matcher;
pub mod matching;
pub mod node;
pub mod ownership;
pub mod rule;
pub mod splice;
pub mod visitor;

// Batch matching (always available, uses rayon when feature is enabled)
pub mod parallel;

// ============================================================================
// Core Types
// ============================================================================

pub use analysis::AnalysisCache;
pub use arena::{Ancestors, ExpansionArena, GrammarId, NodeId, RuleId};
pub use error::ExpansionError;
pub use node::{Arity, Node, NodeKind, NULL_RULE_NAME, VOID_RULE_NAME};

// ============================================================================
// Matching
// ============================================================================

pub use history::{Snapshot, SnapshotEntry};
pub use matching::{MatchConfig, MatchedSpan, DEFAULT_MAX_RECURSION_DEPTH};

// ============================================================================
// Rules and Grammars
// ============================================================================

pub use builder::{DefKind, ExpansionDef, GrammarDef, RuleDef};
pub use grammar::{Grammar, DEFAULT_GRAMMAR_NAME};
pub use rule::Rule;

// ============================================================================
// Analysis and Tooling
// ============================================================================

pub use debug::TreePrinter;
pub use lint::{GrammarLinter, LintKind, LintWarning};
pub use parallel::{
    match_batch_parallel, match_batch_parallel_owned, match_batch_parallel_with_config,
    ParallelConfig,
};
pub use splice::SpliceGuard;
pub use visitor::{ExpansionStats, ExpansionVisitor, KindCounter, TraverseOrder};
