//! Tree traversal over expansion trees
//!
//! Traversals never touch match state. With `follow_refs` a traversal steps
//! from a rule reference into the referenced rule's tree, visiting each rule
//! at most once per traversal so recursive grammars terminate.

use super::arena::{ExpansionArena, NodeId, RuleId};
use super::node::NodeKind;
use hashbrown::HashSet;

/// Order in which [`ExpansionArena::walk`] reports nodes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TraverseOrder {
    /// Parents before their children
    PreOrder,
    /// Children before their parents
    PostOrder,
}

/// Visitor over expansion nodes
///
/// All methods have no-op defaults; implement only what you need.
///
/// # Example
///
/// ```
/// use jsgf_match::{ExpansionArena, ExpansionVisitor, NodeId};
///
/// struct LiteralCounter(usize);
///
/// impl ExpansionVisitor for LiteralCounter {
///     fn enter(&mut self, arena: &ExpansionArena, id: NodeId) {
///         if arena.node(id).literal_text().is_some() {
///             self.0 += 1;
///         }
///     }
/// }
///
/// let mut arena = ExpansionArena::new();
/// let a = arena.new_literal("a");
/// let b = arena.new_literal("b");
/// let seq = arena.new_sequence(vec![a, b]).unwrap();
///
/// let mut counter = LiteralCounter(0);
/// arena.visit(seq, false, &mut counter);
/// assert_eq!(counter.0, 2);
/// ```
pub trait ExpansionVisitor {
    /// Called before a node's children are visited
    fn enter(&mut self, _arena: &ExpansionArena, _id: NodeId) {}

    /// Called after a node's children are visited
    fn leave(&mut self, _arena: &ExpansionArena, _id: NodeId) {}

    /// Called when a traversal crosses a reference into `rule`
    fn enter_rule(&mut self, _arena: &ExpansionArena, _rule: RuleId) {}
}

impl ExpansionArena {
    /// Drive a visitor over the tree rooted at `root`
    pub fn visit<V: ExpansionVisitor>(&self, root: NodeId, follow_refs: bool, visitor: &mut V) {
        let mut seen_rules = HashSet::new();
        if let Some(rule) = self.node(root).rule {
            seen_rules.insert(rule);
        }
        self.visit_node(root, follow_refs, &mut seen_rules, visitor);
    }

    fn visit_node<V: ExpansionVisitor>(
        &self,
        id: NodeId,
        follow_refs: bool,
        seen_rules: &mut HashSet<RuleId>,
        visitor: &mut V,
    ) {
        visitor.enter(self, id);
        for &child in &self.node(id).children {
            self.visit_node(child, follow_refs, seen_rules, visitor);
        }
        if follow_refs && self.node(id).kind.is_rule_reference() {
            if let Some(rule) = self.reference_target(id) {
                if seen_rules.insert(rule) {
                    visitor.enter_rule(self, rule);
                    let target = self.rules[rule.index()].root;
                    self.visit_node(target, follow_refs, seen_rules, visitor);
                }
            }
        }
        visitor.leave(self, id);
    }

    /// All nodes of the tree in the given order
    pub fn walk(&self, root: NodeId, order: TraverseOrder, follow_refs: bool) -> Vec<NodeId> {
        self.filter(root, order, follow_refs, |_, _| true)
    }

    /// Nodes of the tree satisfying `predicate`, in the given order
    pub fn filter<P>(
        &self,
        root: NodeId,
        order: TraverseOrder,
        follow_refs: bool,
        predicate: P,
    ) -> Vec<NodeId>
    where
        P: FnMut(&ExpansionArena, NodeId) -> bool,
    {
        struct Collector<P> {
            order: TraverseOrder,
            predicate: P,
            out: Vec<NodeId>,
        }

        impl<P: FnMut(&ExpansionArena, NodeId) -> bool> ExpansionVisitor for Collector<P> {
            fn enter(&mut self, arena: &ExpansionArena, id: NodeId) {
                if self.order == TraverseOrder::PreOrder && (self.predicate)(arena, id) {
                    self.out.push(id);
                }
            }

            fn leave(&mut self, arena: &ExpansionArena, id: NodeId) {
                if self.order == TraverseOrder::PostOrder && (self.predicate)(arena, id) {
                    self.out.push(id);
                }
            }
        }

        let mut collector = Collector {
            order,
            predicate,
            out: Vec::new(),
        };
        self.visit(root, follow_refs, &mut collector);
        collector.out
    }

    /// First node in pre-order satisfying `predicate`, within the tree only
    pub fn find_node<P>(&self, root: NodeId, mut predicate: P) -> Option<NodeId>
    where
        P: FnMut(&ExpansionArena, NodeId) -> bool,
    {
        let mut stack = vec![root];
        while let Some(id) = stack.pop() {
            if predicate(self, id) {
                return Some(id);
            }
            stack.extend(self.node(id).children.iter().rev());
        }
        None
    }

    /// Childless nodes of the tree, left to right
    pub fn leaves(&self, root: NodeId) -> Vec<NodeId> {
        self.filter(root, TraverseOrder::PreOrder, false, |arena, id| {
            arena.node(id).children.is_empty()
        })
    }

    /// Kind counts and shape information for the tree
    pub fn stats(&self, root: NodeId) -> ExpansionStats {
        let mut counter = KindCounter::default();
        self.visit(root, false, &mut counter);
        ExpansionStats {
            total_nodes: counter.total(),
            max_depth: counter.max_depth,
            has_repetition: counter.repeat_count + counter.kleene_count > 0,
            has_references: counter.reference_count > 0,
            counts: counter,
        }
    }
}

/// Visitor counting nodes per kind
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KindCounter {
    /// Literals
    pub literal_count: usize,
    /// Sequences
    pub sequence_count: usize,
    /// Alternative sets
    pub alternative_count: usize,
    /// Optionals
    pub optional_count: usize,
    /// Required groupings
    pub grouping_count: usize,
    /// One-or-more repetitions
    pub repeat_count: usize,
    /// Zero-or-more repetitions
    pub kleene_count: usize,
    /// By-name and by-object references
    pub reference_count: usize,
    /// `<NULL>` and `<VOID>`
    pub special_count: usize,
    /// Deepest nesting seen, root at depth 1
    pub max_depth: usize,
    depth: usize,
}

impl KindCounter {
    /// Total nodes counted
    pub fn total(&self) -> usize {
        self.literal_count
            + self.sequence_count
            + self.alternative_count
            + self.optional_count
            + self.grouping_count
            + self.repeat_count
            + self.kleene_count
            + self.reference_count
            + self.special_count
    }
}

impl ExpansionVisitor for KindCounter {
    fn enter(&mut self, arena: &ExpansionArena, id: NodeId) {
        self.depth += 1;
        self.max_depth = self.max_depth.max(self.depth);
        match arena.node(id).kind {
            NodeKind::Literal { .. } => self.literal_count += 1,
            NodeKind::Sequence => self.sequence_count += 1,
            NodeKind::AlternativeSet { .. } => self.alternative_count += 1,
            NodeKind::Optional => self.optional_count += 1,
            NodeKind::RequiredGrouping => self.grouping_count += 1,
            NodeKind::Repeat => self.repeat_count += 1,
            NodeKind::KleeneStar => self.kleene_count += 1,
            NodeKind::NamedRuleRef { .. } | NodeKind::RuleRef { .. } => {
                self.reference_count += 1
            }
            NodeKind::NullRef | NodeKind::VoidRef => self.special_count += 1,
        }
    }

    fn leave(&mut self, _arena: &ExpansionArena, _id: NodeId) {
        self.depth -= 1;
    }
}

/// Summary of a tree's shape
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExpansionStats {
    /// Number of nodes
    pub total_nodes: usize,
    /// Deepest nesting, root at depth 1
    pub max_depth: usize,
    /// Whether the tree contains Repeat or KleeneStar
    pub has_repetition: bool,
    /// Whether the tree references other rules
    pub has_references: bool,
    /// Per-kind counts
    pub counts: KindCounter,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(arena: &mut ExpansionArena) -> (NodeId, NodeId, NodeId, NodeId) {
        let a = arena.new_literal("a");
        let b = arena.new_literal("b");
        let alt = arena.new_alternatives(vec![a, b]).unwrap();
        let c = arena.new_literal("c");
        let seq = arena.new_sequence(vec![alt, c]).unwrap();
        (seq, alt, a, c)
    }

    #[test]
    fn test_walk_orders() {
        let mut arena = ExpansionArena::new();
        let (seq, alt, a, c) = sample(&mut arena);
        let b = arena.children(alt)[1];

        let pre = arena.walk(seq, TraverseOrder::PreOrder, false);
        assert_eq!(pre, vec![seq, alt, a, b, c]);

        let post = arena.walk(seq, TraverseOrder::PostOrder, false);
        assert_eq!(post, vec![a, b, alt, c, seq]);
    }

    #[test]
    fn test_find_and_leaves() {
        let mut arena = ExpansionArena::new();
        let (seq, alt, a, c) = sample(&mut arena);

        let found = arena.find_node(seq, |arena, id| arena.kind(id).is_alternative_set());
        assert_eq!(found, Some(alt));

        let leaves = arena.leaves(seq);
        assert_eq!(leaves.len(), 3);
        assert_eq!(leaves.first(), Some(&a));
        assert_eq!(leaves.last(), Some(&c));
    }

    #[test]
    fn test_stats() {
        let mut arena = ExpansionArena::new();
        let (seq, _, _, _) = sample(&mut arena);

        let stats = arena.stats(seq);
        assert_eq!(stats.total_nodes, 5);
        assert_eq!(stats.max_depth, 3);
        assert_eq!(stats.counts.literal_count, 3);
        assert!(!stats.has_repetition);
        assert!(!stats.has_references);
    }
}
