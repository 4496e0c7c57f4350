//! Descendant and mutual-exclusivity queries
//!
//! Both queries are memoized in an [`AnalysisCache`] on the root of the tree
//! the nodes share. The cache is pure memoization: entries mentioning a node
//! are dropped whenever that node changes position, and dropping the whole
//! cache never changes an answer.

use super::arena::{ExpansionArena, NodeId};
use hashbrown::{HashMap, HashSet};

/// Memoized query results, keyed by node pairs
#[derive(Debug, Clone, Default)]
pub struct AnalysisCache {
    descendant: HashMap<(NodeId, NodeId), bool>,
    exclusive: HashMap<(NodeId, NodeId), bool>,
}

impl AnalysisCache {
    /// Number of memoized answers
    pub fn len(&self) -> usize {
        self.descendant.len() + self.exclusive.len()
    }

    /// Whether nothing is memoized
    pub fn is_empty(&self) -> bool {
        self.descendant.is_empty() && self.exclusive.is_empty()
    }

    /// Drop every entry mentioning one of `nodes`
    pub(crate) fn forget(&mut self, nodes: &HashSet<NodeId>) {
        let keep = |(a, b): &(NodeId, NodeId), _: &mut bool| !nodes.contains(a) && !nodes.contains(b);
        self.descendant.retain(keep);
        self.exclusive.retain(keep);
    }
}

impl ExpansionArena {
    /// The analysis cache on a tree root, if any
    pub fn analysis_cache(&self, root: NodeId) -> Option<&AnalysisCache> {
        self.node(root).analysis.as_ref()
    }

    fn cache_at(&mut self, root: NodeId) -> &mut AnalysisCache {
        self.node_mut(root).analysis.get_or_insert_with(AnalysisCache::default)
    }

    pub(crate) fn forget_analysis(&mut self, root: NodeId, nodes: &HashSet<NodeId>) {
        if let Some(cache) = self.node_mut(root).analysis.as_mut() {
            cache.forget(nodes);
        }
    }

    /// Children including a rule root spliced under a reference
    pub(crate) fn logical_children(&self, id: NodeId) -> Vec<NodeId> {
        let node = self.node(id);
        let mut children = node.children.clone();
        if node.kind.is_rule_reference() {
            if let Some(rule) = self.reference_target(id) {
                let root = self.rules[rule.index()].root;
                if self.node(root).parent == Some(id) {
                    children.push(root);
                }
            }
        }
        children
    }

    /// Whether `a` lies strictly below `b`
    ///
    /// Memoized at the root of `a`'s tree.
    pub fn is_descendant_of(&mut self, a: NodeId, b: NodeId) -> bool {
        if a == b {
            return false;
        }
        let root = self.root_of(a);
        if let Some(&known) = self
            .analysis_cache(root)
            .and_then(|cache| cache.descendant.get(&(a, b)))
        {
            return known;
        }
        let result = self.ancestors(a).any(|x| x == b);
        self.cache_at(root).descendant.insert((a, b), result);
        result
    }

    /// Whether `a` and `b` can never both match text in the same parse
    ///
    /// True when their lowest common ancestor is an alternative set with more
    /// than one child, so each lies in a different alternative. Nodes in the
    /// remaining alternatives are recorded as exclusive of both along the
    /// way. Nodes in different trees are never exclusive.
    pub fn mutually_exclusive_of(&mut self, a: NodeId, b: NodeId) -> bool {
        if a == b {
            return false;
        }
        let root = self.root_of(a);
        if root != self.root_of(b) {
            return false;
        }
        if let Some(cache) = self.analysis_cache(root) {
            let known = cache
                .exclusive
                .get(&(a, b))
                .or_else(|| cache.exclusive.get(&(b, a)));
            if let Some(&known) = known {
                return known;
            }
        }

        let result = self.compute_exclusive(root, a, b);
        self.cache_at(root).exclusive.insert((a, b), result);
        result
    }

    fn compute_exclusive(&mut self, root: NodeId, a: NodeId, b: NodeId) -> bool {
        // Paths from each node up to the root, node first
        let path_a: Vec<NodeId> = std::iter::once(a).chain(self.ancestors(a)).collect();
        let on_path_a: HashSet<NodeId> = path_a.iter().copied().collect();
        let path_b: Vec<NodeId> = std::iter::once(b).chain(self.ancestors(b)).collect();

        let Some(lca_pos_b) = path_b.iter().position(|n| on_path_a.contains(n)) else {
            return false;
        };
        let lca = path_b[lca_pos_b];
        if lca == a || lca == b {
            return false;
        }
        let lca_node = self.node(lca);
        if !lca_node.kind.is_alternative_set() || lca_node.children.len() < 2 {
            return false;
        }

        let lca_pos_a = path_a.iter().position(|&n| n == lca).unwrap_or(0);
        let branch_a = path_a[lca_pos_a.saturating_sub(1)];
        let branch_b = path_b[lca_pos_b.saturating_sub(1)];

        let others: Vec<NodeId> = self
            .logical_children(lca)
            .into_iter()
            .filter(|&c| c != branch_a && c != branch_b)
            .collect();
        let mut marked = Vec::new();
        for branch in others {
            let mut stack = vec![branch];
            while let Some(id) = stack.pop() {
                marked.push(id);
                stack.extend(self.logical_children(id));
            }
        }

        let cache = self.cache_at(root);
        for id in marked {
            cache.exclusive.insert((id, a), true);
            cache.exclusive.insert((id, b), true);
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// `(a b | c | d)` as Seq-in-Alt, plus a trailing literal
    fn tree(arena: &mut ExpansionArena) -> [NodeId; 7] {
        let a = arena.new_literal("a");
        let b = arena.new_literal("b");
        let ab = arena.new_sequence(vec![a, b]).unwrap();
        let c = arena.new_literal("c");
        let d = arena.new_literal("d");
        let alt = arena.new_alternatives(vec![ab, c, d]).unwrap();
        let e = arena.new_literal("e");
        let root = arena.new_sequence(vec![alt, e]).unwrap();
        [root, alt, a, b, c, d, e]
    }

    #[test]
    fn test_descendant() {
        let mut arena = ExpansionArena::new();
        let [root, alt, a, _, c, _, e] = tree(&mut arena);

        assert!(arena.is_descendant_of(a, alt));
        assert!(arena.is_descendant_of(a, root));
        assert!(!arena.is_descendant_of(alt, a));
        assert!(!arena.is_descendant_of(e, alt));
        assert!(!arena.is_descendant_of(c, c));
        assert!(arena.analysis_cache(root).is_some_and(|cache| !cache.is_empty()));
    }

    #[test]
    fn test_exclusive() {
        let mut arena = ExpansionArena::new();
        let [_, alt, a, b, c, d, e] = tree(&mut arena);

        assert!(arena.mutually_exclusive_of(a, c));
        assert!(arena.mutually_exclusive_of(c, a));
        // Same branch
        assert!(!arena.mutually_exclusive_of(a, b));
        // Ancestor relation
        assert!(!arena.mutually_exclusive_of(a, alt));
        // Sequence siblings can co-occur
        assert!(!arena.mutually_exclusive_of(c, e));
        assert!(!arena.mutually_exclusive_of(d, d));
    }

    #[test]
    fn test_exclusive_marks_other_branches() {
        let mut arena = ExpansionArena::new();
        let [root, _, a, _, c, d, _] = tree(&mut arena);

        assert!(arena.mutually_exclusive_of(a, c));
        let cache = arena.analysis_cache(root).unwrap();
        assert_eq!(cache.exclusive.get(&(d, a)), Some(&true));
        assert_eq!(cache.exclusive.get(&(d, c)), Some(&true));
    }

    #[test]
    fn test_different_trees_not_exclusive() {
        let mut arena = ExpansionArena::new();
        let [_, _, a, _, _, _, _] = tree(&mut arena);
        let lone = arena.new_literal("lone");
        assert!(!arena.mutually_exclusive_of(a, lone));
    }

    #[test]
    fn test_structural_change_forgets_entries() {
        let mut arena = ExpansionArena::new();
        let [root, alt, a, _, c, _, _] = tree(&mut arena);
        assert!(arena.mutually_exclusive_of(a, c));

        arena.remove_child(alt, c).unwrap();
        let cache = arena.analysis_cache(root).unwrap();
        assert!(cache.exclusive.keys().all(|&(x, y)| x != c && y != c));
        assert!(!arena.mutually_exclusive_of(a, c));
    }
}
