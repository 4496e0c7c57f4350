//! Matcher invalidation
//!
//! Dropping a node's matcher also drops every matcher built on top of it:
//! the ancestors up to the tree root and, when that root belongs to a rule,
//! every reference resolving to that rule. The walk is breadth-first and
//! stops at nodes that are already uncompiled, since nothing above an
//! uncompiled node can be compiled (see [`matcher`](super::matcher)).

use super::arena::{ExpansionArena, NodeId, RuleId};
use super::node::NodeKind;
use super::visitor::TraverseOrder;
use std::collections::VecDeque;

impl ExpansionArena {
    /// Drop the cached matcher of `id` and everything depending on it
    ///
    /// Invalidating an uncompiled node is a no-op.
    pub fn invalidate(&mut self, id: NodeId) {
        if self.check_node(id).is_err() {
            return;
        }
        let mut queue = VecDeque::from([id]);
        let mut cleared = 0usize;

        while let Some(current) = queue.pop_front() {
            if self.node_mut(current).matcher.take().is_none() {
                continue;
            }
            cleared += 1;

            let node = self.node(current);
            if let Some(parent) = node.parent {
                queue.push_back(parent);
            }
            if let Some(rule) = node.rule {
                queue.extend(self.references_to(rule));
            }
        }

        if cleared > 0 {
            log_trace!("Invalidated {} matchers starting at node {}", cleared, id);
        }
    }

    /// Invalidate every reference that resolves to `rule`
    ///
    /// Used for rule-level events (enable, disable, grammar membership,
    /// expansion replacement) that change what a reference compiles to
    /// without touching the referenced tree.
    pub(crate) fn invalidate_rule_references(&mut self, rule: RuleId) {
        for reference in self.references_to(rule) {
            self.invalidate(reference);
        }
    }

    /// Drop matchers on every node of the subtree, not following references
    ///
    /// For subtrees changing position: a by-name reference inside them may
    /// resolve differently afterwards.
    pub(crate) fn clear_compiled_subtree(&mut self, root: NodeId) {
        let mut stack = vec![root];
        while let Some(id) = stack.pop() {
            let node = self.node_mut(id);
            node.matcher = None;
            stack.extend(node.children.iter().copied());
        }
    }

    /// Reference nodes that currently resolve to `rule`
    ///
    /// By-name references only resolve inside trees of the target's grammar,
    /// so only those trees are scanned. By-object references are looked up in
    /// the arena's index of them.
    pub fn references_to(&self, rule: RuleId) -> Vec<NodeId> {
        let Some(target) = self.rules.get(rule.index()) else {
            return Vec::new();
        };
        let mut refs: Vec<NodeId> = self
            .object_refs
            .iter()
            .copied()
            .filter(|&id| matches!(&self.node(id).kind, NodeKind::RuleRef { rule: r } if *r == rule))
            .collect();

        if let Some(grammar) = target.grammar {
            for &member in self.grammar(grammar).rules() {
                let root = self.rules[member.index()].root;
                refs.extend(self.filter(root, TraverseOrder::PreOrder, false, |arena, id| {
                    match &arena.node(id).kind {
                        NodeKind::NamedRuleRef { name } => {
                            *name == target.name && arena.reference_target(id) == Some(rule)
                        }
                        _ => false,
                    }
                }));
            }
        }
        refs
    }
}
