//! Expansion tree vertices
//!
//! A [`Node`] is one vertex of an expansion tree. Its kind is a closed enum;
//! everything the matcher and the analysis passes need to know about a kind
//! is exposed as a capability query on [`NodeKind`] rather than by matching
//! on variants all over the crate.

use super::analysis::AnalysisCache;
use super::arena::{NodeId, RuleId};
use super::history::Snapshot;
use super::matcher::Matcher;
use hashbrown::HashMap;
use std::ops::Range;
use std::sync::Arc;

/// Rule names reserved for the special references
pub const NULL_RULE_NAME: &str = "NULL";
/// Rule name reserved for the never-matching reference
pub const VOID_RULE_NAME: &str = "VOID";

/// The kind of an expansion node, with its kind-specific payload
#[derive(Debug, Clone, PartialEq)]
pub enum NodeKind {
    /// A fixed word sequence
    Literal {
        /// Text as written; whitespace runs are collapsed when matching
        text: String,
        /// Whether matching respects case
        case_sensitive: bool,
    },

    /// Ordered conjunction of the children
    Sequence,

    /// Disjunction of the children, optionally weighted
    AlternativeSet {
        /// Weight per child; empty means unweighted
        weights: HashMap<NodeId, f64>,
    },

    /// Zero or one occurrence of the single child
    Optional,

    /// Parenthesised grouping of the single child
    RequiredGrouping,

    /// One or more repetitions of the single child
    Repeat,

    /// Zero or more repetitions of the single child
    KleeneStar,

    /// Reference to a rule by name, resolved through the owning grammar
    NamedRuleRef {
        /// Referenced rule name
        name: String,
    },

    /// Direct reference to a rule object
    RuleRef {
        /// Referenced rule
        rule: RuleId,
    },

    /// `<NULL>`: always matches, consuming nothing
    NullRef,

    /// `<VOID>`: never matches
    VoidRef,
}

/// How many children a kind accepts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Arity {
    /// No children
    Leaf,
    /// Exactly one child
    Single,
    /// One or more children
    AtLeastOne,
}

impl Arity {
    /// Whether `count` children satisfy this arity
    #[inline]
    pub fn accepts(self, count: usize) -> bool {
        match self {
            Arity::Leaf => count == 0,
            Arity::Single => count == 1,
            Arity::AtLeastOne => count >= 1,
        }
    }
}

impl NodeKind {
    /// Short, stable name of the kind
    pub fn name(&self) -> &'static str {
        match self {
            NodeKind::Literal { .. } => "Literal",
            NodeKind::Sequence => "Sequence",
            NodeKind::AlternativeSet { .. } => "AlternativeSet",
            NodeKind::Optional => "Optional",
            NodeKind::RequiredGrouping => "RequiredGrouping",
            NodeKind::Repeat => "Repeat",
            NodeKind::KleeneStar => "KleeneStar",
            NodeKind::NamedRuleRef { .. } => "NamedRuleRef",
            NodeKind::RuleRef { .. } => "RuleRef",
            NodeKind::NullRef => "NullRef",
            NodeKind::VoidRef => "VoidRef",
        }
    }

    /// Number of children this kind accepts
    pub fn arity(&self) -> Arity {
        match self {
            NodeKind::Literal { .. }
            | NodeKind::NamedRuleRef { .. }
            | NodeKind::RuleRef { .. }
            | NodeKind::NullRef
            | NodeKind::VoidRef => Arity::Leaf,
            NodeKind::Optional
            | NodeKind::RequiredGrouping
            | NodeKind::Repeat
            | NodeKind::KleeneStar => Arity::Single,
            NodeKind::Sequence | NodeKind::AlternativeSet { .. } => Arity::AtLeastOne,
        }
    }

    /// Whether this kind records a snapshot per completed repetition
    #[inline]
    pub fn carries_history(&self) -> bool {
        matches!(self, NodeKind::Repeat | NodeKind::KleeneStar)
    }

    /// Whether descendants of this kind are optional in context
    #[inline]
    pub fn makes_optional(&self) -> bool {
        matches!(self, NodeKind::Optional | NodeKind::KleeneStar)
    }

    /// Whether this kind refers to another rule's tree
    #[inline]
    pub fn is_rule_reference(&self) -> bool {
        matches!(
            self,
            NodeKind::NamedRuleRef { .. } | NodeKind::RuleRef { .. }
        )
    }

    /// Whether this kind is an alternative set
    #[inline]
    pub fn is_alternative_set(&self) -> bool {
        matches!(self, NodeKind::AlternativeSet { .. })
    }
}

/// A single expansion tree vertex
///
/// Nodes are owned by an [`ExpansionArena`](super::arena::ExpansionArena) and
/// addressed by [`NodeId`]. Match state lives directly on the node, so a tree
/// must not be matched from two places at once.
#[derive(Debug, Clone)]
pub struct Node {
    pub(crate) kind: NodeKind,
    pub(crate) children: Vec<NodeId>,
    pub(crate) parent: Option<NodeId>,
    pub(crate) tag: Option<String>,
    /// Set only on a rule's root
    pub(crate) rule: Option<RuleId>,
    pub(crate) current_match: Option<String>,
    pub(crate) matching_slice: Option<Range<usize>>,
    pub(crate) matcher: Option<Arc<Matcher>>,
    pub(crate) history: Vec<Snapshot>,
    /// Set only on tree roots
    pub(crate) analysis: Option<AnalysisCache>,
}

impl Node {
    pub(crate) fn new(kind: NodeKind) -> Self {
        Self {
            kind,
            children: Vec::new(),
            parent: None,
            tag: None,
            rule: None,
            current_match: None,
            matching_slice: None,
            matcher: None,
            history: Vec::new(),
            analysis: None,
        }
    }

    /// The node's kind
    #[inline]
    pub fn kind(&self) -> &NodeKind {
        &self.kind
    }

    /// Owned children, in order
    #[inline]
    pub fn children(&self) -> &[NodeId] {
        &self.children
    }

    /// The parent node, `None` for a tree root
    #[inline]
    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    /// The tag annotation, already trimmed
    #[inline]
    pub fn tag(&self) -> Option<&str> {
        self.tag.as_deref()
    }

    /// Tag escaped for output: `{ tag }` with braces and backslashes escaped
    pub fn escaped_tag(&self) -> Option<String> {
        self.tag.as_deref().map(|tag| {
            let escaped = tag
                .replace('\\', "\\\\")
                .replace('{', "\\{")
                .replace('}', "\\}");
            format!("{{ {} }}", escaped)
        })
    }

    /// The rule owning this tree, if this node is a rule root
    #[inline]
    pub fn owning_rule(&self) -> Option<RuleId> {
        self.rule
    }

    /// The text matched by the last match attempt
    ///
    /// `None` means the node did not match; `Some("")` means it matched
    /// without contributing text, which only happens in optional context.
    #[inline]
    pub fn current_match(&self) -> Option<&str> {
        self.current_match.as_deref()
    }

    /// Byte range of the last match in the last matched input
    #[inline]
    pub fn matching_slice(&self) -> Option<Range<usize>> {
        self.matching_slice.clone()
    }

    /// Whether a compiled matcher is cached on this node
    #[inline]
    pub fn is_compiled(&self) -> bool {
        self.matcher.is_some()
    }

    /// One snapshot per completed repetition (Repeat / KleeneStar only)
    #[inline]
    pub fn repetition_history(&self) -> &[Snapshot] {
        &self.history
    }

    /// Literal text, for literal nodes
    pub fn literal_text(&self) -> Option<&str> {
        match &self.kind {
            NodeKind::Literal { text, .. } => Some(text),
            _ => None,
        }
    }

    /// Whether the node holds a non-empty match right now
    #[inline]
    pub(crate) fn has_text_match(&self) -> bool {
        self.current_match.as_deref().is_some_and(|m| !m.is_empty())
    }

    #[inline]
    pub(crate) fn clear_match(&mut self) {
        self.current_match = None;
        self.matching_slice = None;
        self.history.clear();
    }
}

/// Normalize a tag: trimmed, empty tags removed
pub(crate) fn normalize_tag(tag: Option<&str>) -> Option<String> {
    tag.map(str::trim)
        .filter(|t| !t.is_empty())
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_arity() {
        assert!(NodeKind::Optional.arity().accepts(1));
        assert!(!NodeKind::Optional.arity().accepts(2));
        assert!(!NodeKind::Sequence.arity().accepts(0));
        assert!(NodeKind::Sequence.arity().accepts(5));
        assert!(NodeKind::NullRef.arity().accepts(0));
        assert!(!NodeKind::NullRef.arity().accepts(1));
    }

    #[test]
    fn test_capabilities() {
        assert!(NodeKind::Repeat.carries_history());
        assert!(NodeKind::KleeneStar.carries_history());
        assert!(!NodeKind::Optional.carries_history());
        assert!(NodeKind::KleeneStar.makes_optional());
        assert!(!NodeKind::Repeat.makes_optional());
        assert!(NodeKind::NamedRuleRef {
            name: "a".to_string()
        }
        .is_rule_reference());
        assert!(!NodeKind::NullRef.is_rule_reference());
    }

    #[test]
    fn test_escaped_tag() {
        let mut node = Node::new(NodeKind::Sequence);
        assert_eq!(node.escaped_tag(), None);
        node.tag = normalize_tag(Some("  slot {x} "));
        assert_eq!(node.tag(), Some("slot {x}"));
        assert_eq!(node.escaped_tag().as_deref(), Some("{ slot \\{x\\} }"));
    }

    #[test]
    fn test_normalize_tag_empty() {
        assert_eq!(normalize_tag(Some("   ")), None);
        assert_eq!(normalize_tag(None), None);
    }
}
