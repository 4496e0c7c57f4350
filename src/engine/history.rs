//! Repetition snapshots and the queries over them
//!
//! A Repeat or KleeneStar records one [`Snapshot`] per completed repetition.
//! Each snapshot holds the match state of every logical descendant (reference
//! targets included) as it was when that repetition finished, so callers can
//! read back what each repetition matched after the descendants themselves
//! have been reset and overwritten.

use super::arena::{ExpansionArena, NodeId};
use super::visitor::TraverseOrder;
use hashbrown::{HashMap, HashSet};
use std::ops::Range;

/// Match state of one node at the end of a repetition
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SnapshotEntry {
    /// The node's match at that time
    pub current_match: Option<String>,
    /// The node's slice at that time
    pub matching_slice: Option<Range<usize>>,
    /// The node's own repetition history at that time, for nested repeats
    pub history: Vec<Snapshot>,
}

/// Descendant match state captured after one repetition
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Snapshot {
    entries: HashMap<NodeId, SnapshotEntry>,
}

impl Snapshot {
    /// The recorded state for `node`, if it was a descendant at the time
    #[inline]
    pub fn get(&self, node: NodeId) -> Option<&SnapshotEntry> {
        self.entries.get(&node)
    }

    /// Whether `node` was recorded
    #[inline]
    pub fn contains(&self, node: NodeId) -> bool {
        self.entries.contains_key(&node)
    }

    /// Number of recorded nodes
    #[inline]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether nothing was recorded
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl ExpansionArena {
    /// Capture the match state of every logical descendant of `node`
    pub(crate) fn take_snapshot(&self, node: NodeId) -> Snapshot {
        let entries = self
            .walk(node, TraverseOrder::PreOrder, true)
            .into_iter()
            .filter(|&id| id != node)
            .map(|id| {
                let n = self.node(id);
                (
                    id,
                    SnapshotEntry {
                        current_match: n.current_match.clone(),
                        matching_slice: n.matching_slice.clone(),
                        history: n.history.clone(),
                    },
                )
            })
            .collect();
        Snapshot { entries }
    }

    /// Write a snapshot back onto the nodes it mentions
    pub(crate) fn restore_snapshot(&mut self, snapshot: &Snapshot) {
        for (&id, entry) in &snapshot.entries {
            let node = self.node_mut(id);
            node.current_match = entry.current_match.clone();
            node.matching_slice = entry.matching_slice.clone();
            node.history = entry.history.clone();
        }
    }

    /// Clear match state on every logical descendant of `node`
    pub(crate) fn reset_descendants(&mut self, node: NodeId) {
        for id in self.walk(node, TraverseOrder::PreOrder, true) {
            if id != node {
                self.node_mut(id).clear_match();
            }
        }
    }

    /// Per-repetition matches of `node` under the repetition `repeat`
    ///
    /// Returns one entry per completed repetition. The list is empty when
    /// `repeat` carries no history or `node` is not one of its descendants.
    pub fn get_matches(&self, repeat: NodeId, node: NodeId) -> Vec<Option<String>> {
        self.history_entries(repeat, node)
            .map(|entry| entry.and_then(|e| e.current_match.clone()))
            .collect()
    }

    /// Per-repetition slices of `node` under the repetition `repeat`
    pub fn get_slices(&self, repeat: NodeId, node: NodeId) -> Vec<Option<Range<usize>>> {
        self.history_entries(repeat, node)
            .map(|entry| entry.and_then(|e| e.matching_slice.clone()))
            .collect()
    }

    fn history_entries(
        &self,
        repeat: NodeId,
        node: NodeId,
    ) -> impl Iterator<Item = Option<&SnapshotEntry>> + '_ {
        let history = self.node(repeat).repetition_history();
        let known = history.first().is_some_and(|s| s.contains(node));
        let history: &[Snapshot] = if known { history } else { &[] };
        history.iter().map(move |snapshot| snapshot.get(node))
    }

    /// Ancestors of `node` across rule boundaries
    ///
    /// Climbs parent links; at a rule root the climb continues from every
    /// reference resolving to that rule.
    fn logical_ancestors(&self, node: NodeId) -> Vec<NodeId> {
        let mut seen = HashSet::new();
        let mut out = Vec::new();
        let mut stack = vec![node];
        while let Some(id) = stack.pop() {
            let current = self.node(id);
            let mut next: Vec<NodeId> = current.parent.into_iter().collect();
            if let Some(rule) = current.rule {
                next.extend(self.references_to(rule));
            }
            for up in next {
                if seen.insert(up) {
                    out.push(up);
                    stack.push(up);
                }
            }
        }
        out
    }

    /// Whether `node` matched text, now or in any recorded repetition
    ///
    /// Repetitions reaching `node` through a rule reference count too.
    pub fn had_match(&self, node: NodeId) -> bool {
        if self.node(node).has_text_match() {
            return true;
        }
        self.logical_ancestors(node)
            .into_iter()
            .filter(|&a| self.node(a).kind.carries_history())
            .any(|a| {
                self.node(a).history.iter().any(|snapshot| {
                    snapshot
                        .get(node)
                        .and_then(|e| e.current_match.as_deref())
                        .is_some_and(|m| !m.is_empty())
                })
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snapshot_roundtrip_restores_state() {
        let mut arena = ExpansionArena::new();
        let x = arena.new_literal("x");
        let rep = arena.new_repeat(x).unwrap();

        arena.node_mut(x).current_match = Some("x".to_string());
        arena.node_mut(x).matching_slice = Some(0..1);
        let snapshot = arena.take_snapshot(rep);
        assert_eq!(snapshot.len(), 1);
        assert!(!snapshot.contains(rep));

        arena.reset_descendants(rep);
        assert_eq!(arena.current_match(x), None);

        arena.restore_snapshot(&snapshot);
        assert_eq!(arena.current_match(x), Some("x"));
        assert_eq!(arena.node(x).matching_slice(), Some(0..1));
    }

    #[test]
    fn test_queries_on_non_descendant_are_empty() {
        let mut arena = ExpansionArena::new();
        let x = arena.new_literal("x");
        let other = arena.new_literal("y");
        let rep = arena.new_repeat(x).unwrap();

        arena.node_mut(x).current_match = Some("x".to_string());
        let snapshot = arena.take_snapshot(rep);
        arena.node_mut(rep).history.push(snapshot);

        assert_eq!(arena.get_matches(rep, x), vec![Some("x".to_string())]);
        assert!(arena.get_matches(rep, other).is_empty());
        assert!(arena.get_slices(rep, other).is_empty());
    }

    #[test]
    fn test_had_match_reads_history() {
        let mut arena = ExpansionArena::new();
        let x = arena.new_literal("x");
        let rep = arena.new_kleene_star(x).unwrap();
        assert!(!arena.had_match(x));

        arena.node_mut(x).current_match = Some("x".to_string());
        let snapshot = arena.take_snapshot(rep);
        arena.node_mut(rep).history.push(snapshot);
        arena.node_mut(x).current_match = None;

        assert!(arena.had_match(x));
    }

    #[test]
    fn test_restore_brings_back_nested_history() {
        let mut arena = ExpansionArena::new();
        let x = arena.new_literal("x");
        let inner = arena.new_repeat(x).unwrap();
        let outer = arena.new_kleene_star(inner).unwrap();

        arena.node_mut(x).current_match = Some("x".to_string());
        let inner_snapshot = arena.take_snapshot(inner);
        arena.node_mut(inner).history.push(inner_snapshot);
        let snapshot = arena.take_snapshot(outer);

        arena.reset_descendants(outer);
        assert!(arena.node(inner).repetition_history().is_empty());

        arena.restore_snapshot(&snapshot);
        assert_eq!(arena.get_matches(inner, x), vec![Some("x".to_string())]);
    }
}
