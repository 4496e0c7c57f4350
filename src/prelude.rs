//! Prelude module for convenient imports
//!
//! This module re-exports the most commonly used types from jsgf-match.
//! Importing this module with a wildcard import brings the core types into
//! scope:
//!
//! ```
//! use jsgf_match::prelude::*;
//! ```
//!
//! # Re-exported Items
//!
//! ## Core Types
//! - [`ExpansionArena`] - Owner of all nodes, rules and grammars
//! - [`NodeId`], [`RuleId`], [`GrammarId`] - Arena handles
//! - [`NodeKind`] - Expansion kinds
//! - [`ExpansionError`] - Error type
//! - [`MatchConfig`] - Matching configuration
//!
//! ## Definitions
//! - [`lit()`], [`seq()`], [`alt()`], [`opt()`], [`group()`], [`repeat()`],
//!   [`kleene()`], [`rule_ref()`] - Construction DSL
//! - [`RuleDef`], [`GrammarDef`] - Serializable rule and grammar definitions
//!
//! ## Traversal
//! - [`ExpansionVisitor`] - Visitor trait
//! - [`TraverseOrder`] - Pre- or post-order

// ============================================================================
// Core Types
// ============================================================================

pub use crate::engine::{
    ExpansionArena, ExpansionError, GrammarId, MatchConfig, NodeId, NodeKind, RuleId,
};

// ============================================================================
// Definitions
// ============================================================================

pub use crate::engine::builder::{
    alt, alt_weighted, group, kleene, lit, null, opt, repeat, rule_object, rule_ref, seq, void,
    ExpansionDef, GrammarDef, RuleDef,
};

// ============================================================================
// Traversal
// ============================================================================

pub use crate::engine::visitor::{ExpansionVisitor, TraverseOrder};
