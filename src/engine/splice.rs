//! Scoped splicing of referenced rules into a referencing tree
//!
//! While a [`SpliceGuard`] is alive, the root of every rule reachable from a
//! tree hangs under the reference node that points at it, so descendant and
//! exclusivity queries see the whole grammar as one tree. Dropping the guard
//! undoes every splice, on every exit path.

use super::arena::{ExpansionArena, NodeId};
use super::visitor::TraverseOrder;
use std::ops::Deref;

/// Guard holding references spliced to their targets
///
/// Gives read access to the arena plus the analysis queries. The arena
/// cannot be mutated otherwise until the guard is dropped.
pub struct SpliceGuard<'a> {
    arena: &'a mut ExpansionArena,
    root: NodeId,
    spliced: Vec<NodeId>,
}

impl ExpansionArena {
    /// Splice every rule reachable from `root` under its first reference
    ///
    /// A rule root that already has a parent, or that is the root of the
    /// referencing tree itself (recursion), is left alone.
    pub fn splice_references(&mut self, root: NodeId) -> SpliceGuard<'_> {
        let references: Vec<NodeId> = self.filter(root, TraverseOrder::PreOrder, true, |arena, id| {
            arena.node(id).kind.is_rule_reference()
        });

        // Caches on the joined roots would mix trees
        self.node_mut(root).analysis = None;
        let mut spliced = Vec::new();
        for reference in references {
            let Some(rule) = self.reference_target(reference) else {
                continue;
            };
            let target = self.rules[rule.index()].root;
            if self.node(target).parent.is_some() || self.root_of(reference) == target {
                continue;
            }
            let node = self.node_mut(target);
            node.parent = Some(reference);
            node.analysis = None;
            spliced.push(target);
        }

        log_debug!("Spliced {} rule trees under node {}", spliced.len(), root);
        SpliceGuard {
            arena: self,
            root,
            spliced,
        }
    }
}

impl SpliceGuard<'_> {
    /// Rule roots currently spliced under references
    pub fn spliced_roots(&self) -> &[NodeId] {
        &self.spliced
    }

    /// [`ExpansionArena::is_descendant_of`] across rule boundaries
    pub fn is_descendant_of(&mut self, a: NodeId, b: NodeId) -> bool {
        self.arena.is_descendant_of(a, b)
    }

    /// [`ExpansionArena::mutually_exclusive_of`] across rule boundaries
    pub fn mutually_exclusive_of(&mut self, a: NodeId, b: NodeId) -> bool {
        self.arena.mutually_exclusive_of(a, b)
    }
}

impl Deref for SpliceGuard<'_> {
    type Target = ExpansionArena;

    fn deref(&self) -> &ExpansionArena {
        self.arena
    }
}

impl Drop for SpliceGuard<'_> {
    fn drop(&mut self) {
        for &target in &self.spliced {
            self.arena.node_mut(target).parent = None;
        }
        let root = self.arena.root_of(self.root);
        self.arena.node_mut(root).analysis = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_splice_is_undone_on_drop() {
        let mut arena = ExpansionArena::new();
        let g = arena.new_grammar("g");
        let one = arena.new_literal("one");
        let two = arena.new_literal("two");
        let n_alt = arena.new_alternatives(vec![one, two]).unwrap();
        let n = arena.new_rule("n", true, n_alt).unwrap();

        let go = arena.new_literal("go");
        let reference = arena.new_rule_ref("n");
        let stop = arena.new_literal("stop");
        let choice = arena.new_alternatives(vec![reference, stop]).unwrap();
        let seq = arena.new_sequence(vec![go, choice]).unwrap();
        let r = arena.new_rule("r", true, seq).unwrap();
        arena.add_rules(g, &[n, r]).unwrap();

        {
            let mut guard = arena.splice_references(seq);
            assert_eq!(guard.spliced_roots(), &[n_alt]);
            assert_eq!(guard.parent(n_alt), Some(reference));
            assert!(guard.is_descendant_of(one, seq));
            assert!(guard.mutually_exclusive_of(one, stop));
            assert!(!guard.mutually_exclusive_of(one, go));
        }

        assert_eq!(arena.parent(n_alt), None);
        assert!(arena.analysis_cache(seq).is_none());
        assert!(arena.analysis_cache(n_alt).is_none());
        assert!(!arena.is_descendant_of(one, seq));
        assert!(!arena.mutually_exclusive_of(one, stop));
    }
}
