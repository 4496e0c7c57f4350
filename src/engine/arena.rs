//! Arena storage for expansion trees, rules and grammars
//!
//! Every node, rule and grammar lives in one [`ExpansionArena`] and is
//! addressed by a small copyable id. Children are owned slot lists, parents
//! are plain back-references, and re-parenting is always an arena operation
//! (see [`ownership`](super::ownership)).
//!
//! Detached nodes are never freed. A node removed from its parent becomes the
//! root of its own tree and may be adopted again later.
//!
//! Cloning an arena copies every tree, rule, grammar and cache. A clone is an
//! independent matcher, which is how callers match concurrently.

use super::error::ExpansionError;
use super::grammar::Grammar;
use super::matching::MatchConfig;
use super::node::{Node, NodeKind, NULL_RULE_NAME, VOID_RULE_NAME};
use super::rule::Rule;
use hashbrown::HashMap;
use serde::{Deserialize, Serialize};
use std::fmt;

macro_rules! arena_id {
    ($(#[$meta:meta])* $name:ident, $prefix:literal) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(u32);

        impl $name {
            /// Create an id from a raw index
            #[inline]
            pub const fn new(index: u32) -> Self {
                Self(index)
            }

            /// The raw arena index
            #[inline]
            pub const fn index(self) -> usize {
                self.0 as usize
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, concat!($prefix, "{}"), self.0)
            }
        }
    };
}

arena_id!(
    /// Handle to a node in an [`ExpansionArena`]
    NodeId,
    "#"
);
arena_id!(
    /// Handle to a rule in an [`ExpansionArena`]
    RuleId,
    "rule#"
);
arena_id!(
    /// Handle to a grammar in an [`ExpansionArena`]
    GrammarId,
    "grammar#"
);

/// Owner of all expansion nodes, rules and grammars
#[derive(Debug, Clone, Default)]
pub struct ExpansionArena {
    pub(crate) nodes: Vec<Node>,
    pub(crate) rules: Vec<Rule>,
    pub(crate) grammars: Vec<Grammar>,
    pub(crate) config: MatchConfig,
    /// Every RuleRef-by-object node, in allocation order
    pub(crate) object_refs: Vec<NodeId>,
}

impl ExpansionArena {
    /// Create an empty arena with the default match configuration
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty arena with the given match configuration
    #[inline]
    pub fn with_config(config: MatchConfig) -> Self {
        Self {
            config,
            ..Self::default()
        }
    }

    /// The current match configuration
    #[inline]
    pub fn config(&self) -> &MatchConfig {
        &self.config
    }

    /// Replace the match configuration
    #[inline]
    pub fn set_config(&mut self, config: MatchConfig) {
        self.config = config;
    }

    /// Number of nodes ever allocated in this arena
    #[inline]
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Look up a node
    #[inline]
    pub fn get(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(id.index())
    }

    /// Look up a node that is known to belong to this arena
    ///
    /// # Panics
    /// Panics if `id` was not allocated by this arena.
    #[inline]
    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id.index()]
    }

    #[inline]
    pub(crate) fn node_mut(&mut self, id: NodeId) -> &mut Node {
        &mut self.nodes[id.index()]
    }

    /// Shorthand for the kind of a node
    #[inline]
    pub fn kind(&self, id: NodeId) -> &NodeKind {
        &self.node(id).kind
    }

    /// Shorthand for a node's children
    #[inline]
    pub fn children(&self, id: NodeId) -> &[NodeId] {
        &self.node(id).children
    }

    /// Shorthand for a node's parent
    #[inline]
    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.node(id).parent
    }

    /// Shorthand for a node's current match
    #[inline]
    pub fn current_match(&self, id: NodeId) -> Option<&str> {
        self.node(id).current_match()
    }

    pub(crate) fn check_node(&self, id: NodeId) -> Result<(), ExpansionError> {
        if id.index() < self.nodes.len() {
            Ok(())
        } else {
            Err(ExpansionError::structural(
                None,
                format!("node {} does not belong to this arena", id),
            ))
        }
    }

    /// Allocate a detached node without children
    pub(crate) fn alloc(&mut self, kind: NodeKind) -> NodeId {
        let id = NodeId::new(self.nodes.len() as u32);
        if matches!(kind, NodeKind::RuleRef { .. }) {
            self.object_refs.push(id);
        }
        self.nodes.push(Node::new(kind));
        id
    }

    /// Allocate a node and adopt `children`, validating arity first
    pub(crate) fn new_node(
        &mut self,
        kind: NodeKind,
        children: Vec<NodeId>,
    ) -> Result<NodeId, ExpansionError> {
        if !kind.arity().accepts(children.len()) {
            return Err(ExpansionError::structural(
                None,
                format!(
                    "{} cannot be created with {} children",
                    kind.name(),
                    children.len()
                ),
            ));
        }
        for &child in &children {
            self.check_adoptable_orphan(child)?;
        }
        if has_duplicates(&children) {
            return Err(ExpansionError::structural(
                None,
                "the same node appears twice in a child list",
            ));
        }

        let id = self.alloc(kind);
        if !children.is_empty() {
            self.set_children(id, children)?;
        }
        Ok(id)
    }

    // ------------------------------------------------------------------
    // Constructors
    // ------------------------------------------------------------------

    /// Create a case-insensitive literal
    pub fn new_literal(&mut self, text: &str) -> NodeId {
        self.new_literal_with_case(text, false)
    }

    /// Create a literal with explicit case sensitivity
    pub fn new_literal_with_case(&mut self, text: &str, case_sensitive: bool) -> NodeId {
        self.alloc(NodeKind::Literal {
            text: text.to_string(),
            case_sensitive,
        })
    }

    /// Create a sequence of one or more detached children
    pub fn new_sequence(&mut self, children: Vec<NodeId>) -> Result<NodeId, ExpansionError> {
        self.new_node(NodeKind::Sequence, children)
    }

    /// Create an unweighted alternative set of one or more detached children
    pub fn new_alternatives(&mut self, children: Vec<NodeId>) -> Result<NodeId, ExpansionError> {
        self.new_node(
            NodeKind::AlternativeSet {
                weights: HashMap::new(),
            },
            children,
        )
    }

    /// Create an optional wrapper
    pub fn new_optional(&mut self, child: NodeId) -> Result<NodeId, ExpansionError> {
        self.new_node(NodeKind::Optional, vec![child])
    }

    /// Create a parenthesised grouping
    pub fn new_required_grouping(&mut self, child: NodeId) -> Result<NodeId, ExpansionError> {
        self.new_node(NodeKind::RequiredGrouping, vec![child])
    }

    /// Create a one-or-more repetition
    pub fn new_repeat(&mut self, child: NodeId) -> Result<NodeId, ExpansionError> {
        self.new_node(NodeKind::Repeat, vec![child])
    }

    /// Create a zero-or-more repetition
    pub fn new_kleene_star(&mut self, child: NodeId) -> Result<NodeId, ExpansionError> {
        self.new_node(NodeKind::KleeneStar, vec![child])
    }

    /// Create a by-name rule reference
    ///
    /// The reserved names `NULL` and `VOID` create the special references.
    pub fn new_rule_ref(&mut self, name: &str) -> NodeId {
        match name.trim() {
            NULL_RULE_NAME => self.new_null_ref(),
            VOID_RULE_NAME => self.new_void_ref(),
            name => self.alloc(NodeKind::NamedRuleRef {
                name: name.to_string(),
            }),
        }
    }

    /// Create a reference to a rule object
    pub fn new_rule_object_ref(&mut self, rule: RuleId) -> Result<NodeId, ExpansionError> {
        self.check_rule(rule)?;
        Ok(self.alloc(NodeKind::RuleRef { rule }))
    }

    /// Create a `<NULL>` reference
    pub fn new_null_ref(&mut self) -> NodeId {
        self.alloc(NodeKind::NullRef)
    }

    /// Create a `<VOID>` reference
    pub fn new_void_ref(&mut self) -> NodeId {
        self.alloc(NodeKind::VoidRef)
    }

    // ------------------------------------------------------------------
    // Parent chain
    // ------------------------------------------------------------------

    /// Iterate over the strict ancestors of a node, nearest first
    pub fn ancestors(&self, id: NodeId) -> Ancestors<'_> {
        Ancestors {
            arena: self,
            next: self.node(id).parent,
        }
    }

    /// The root of the tree containing `id`
    pub fn root_of(&self, id: NodeId) -> NodeId {
        self.ancestors(id).last().unwrap_or(id)
    }

    /// The rule owning the tree that contains `id`
    ///
    /// Stops at the nearest rule root, so a rule spliced under a reference
    /// still reports itself.
    pub fn owning_rule_of(&self, id: NodeId) -> Option<RuleId> {
        if let Some(rule) = self.node(id).rule {
            return Some(rule);
        }
        self.ancestors(id).find_map(|a| self.node(a).rule)
    }

    /// Whether the node is optional in context
    ///
    /// True when the node is itself an Optional or KleeneStar, or has such an
    /// ancestor.
    pub fn is_optional_in_context(&self, id: NodeId) -> bool {
        self.node(id).kind.makes_optional()
            || self.ancestors(id).any(|a| self.node(a).kind.makes_optional())
    }
}

/// Iterator over a node's ancestors
pub struct Ancestors<'a> {
    arena: &'a ExpansionArena,
    next: Option<NodeId>,
}

impl Iterator for Ancestors<'_> {
    type Item = NodeId;

    fn next(&mut self) -> Option<NodeId> {
        let current = self.next?;
        self.next = self.arena.node(current).parent;
        Some(current)
    }
}

pub(crate) fn has_duplicates(ids: &[NodeId]) -> bool {
    let mut seen = hashbrown::HashSet::with_capacity(ids.len());
    ids.iter().any(|id| !seen.insert(*id))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_constructors_link_parents() {
        let mut arena = ExpansionArena::new();
        let a = arena.new_literal("a");
        let b = arena.new_literal("b");
        let seq = arena.new_sequence(vec![a, b]).unwrap();

        assert_eq!(arena.children(seq), &[a, b]);
        assert_eq!(arena.parent(a), Some(seq));
        assert_eq!(arena.parent(seq), None);
        assert_eq!(arena.root_of(b), seq);
    }

    #[test]
    fn test_arity_rejected_on_construction() {
        let mut arena = ExpansionArena::new();
        let before = arena.node_count();
        let err = arena.new_sequence(vec![]).unwrap_err();
        assert!(matches!(err, ExpansionError::Structural { .. }));
        // Nothing allocated on failure
        assert_eq!(arena.node_count(), before);
    }

    #[test]
    fn test_child_cannot_have_two_parents() {
        let mut arena = ExpansionArena::new();
        let a = arena.new_literal("a");
        let _opt = arena.new_optional(a).unwrap();
        let err = arena.new_sequence(vec![a]).unwrap_err();
        assert!(matches!(err, ExpansionError::Structural { .. }));
    }

    #[test]
    fn test_reserved_reference_names() {
        let mut arena = ExpansionArena::new();
        let null = arena.new_rule_ref("NULL");
        let void = arena.new_rule_ref("VOID");
        let named = arena.new_rule_ref("greet");
        assert_eq!(arena.kind(null), &NodeKind::NullRef);
        assert_eq!(arena.kind(void), &NodeKind::VoidRef);
        assert!(arena.kind(named).is_rule_reference());
    }

    #[test]
    fn test_optional_in_context() {
        let mut arena = ExpansionArena::new();
        let a = arena.new_literal("a");
        let b = arena.new_literal("b");
        let opt = arena.new_optional(a).unwrap();
        let seq = arena.new_sequence(vec![opt, b]).unwrap();

        assert!(arena.is_optional_in_context(a));
        assert!(arena.is_optional_in_context(opt));
        assert!(!arena.is_optional_in_context(b));
        assert!(!arena.is_optional_in_context(seq));
    }

    #[test]
    fn test_id_display() {
        assert_eq!(NodeId::new(4).to_string(), "#4");
        assert_eq!(RuleId::new(1).to_string(), "rule#1");
        assert_eq!(GrammarId::new(0).to_string(), "grammar#0");
    }
}
