//! Child ownership, payload mutation and copies
//!
//! Every child-list edit goes through [`ExpansionArena::set_children`], which
//! validates the whole new list before touching anything. A rejected edit
//! leaves the tree exactly as it was.

use super::arena::{has_duplicates, ExpansionArena, NodeId};
use super::error::ExpansionError;
use super::node::{normalize_tag, NodeKind};
use super::rule::validate_rule_name;
use super::visitor::TraverseOrder;
use hashbrown::{HashMap, HashSet};
use std::hash::{BuildHasher, Hash, Hasher};
use std::ops::Range;

impl ExpansionArena {
    /// Check that `child` is a free-standing tree that may be adopted
    pub(crate) fn check_adoptable_orphan(&self, child: NodeId) -> Result<(), ExpansionError> {
        self.check_node(child)?;
        let node = self.node(child);
        if node.parent.is_some() {
            return Err(ExpansionError::structural(
                child,
                "node already has a parent; detach it first",
            ));
        }
        if node.rule.is_some() {
            return Err(ExpansionError::structural(
                child,
                "a rule's root cannot become a child; reference the rule instead",
            ));
        }
        Ok(())
    }

    /// Replace a node's children
    ///
    /// Children that are dropped become detached roots; new children must be
    /// detached (or already children of `parent`). Weights are kept for
    /// children that remain.
    ///
    /// # Errors
    /// [`ExpansionError::Structural`] for an arity violation, a duplicate, a
    /// child owned elsewhere, a rule root, or a child that would create a
    /// cycle.
    pub fn set_children(&mut self, parent: NodeId, children: Vec<NodeId>) -> Result<(), ExpansionError> {
        self.check_node(parent)?;
        let kind = &self.node(parent).kind;
        if !kind.arity().accepts(children.len()) {
            return Err(ExpansionError::structural(
                parent,
                format!("{} cannot have {} children", kind.name(), children.len()),
            ));
        }
        if has_duplicates(&children) {
            return Err(ExpansionError::structural(
                parent,
                "the same node appears twice in a child list",
            ));
        }
        for &child in &children {
            self.check_node(child)?;
            if child == parent || self.ancestors(parent).any(|a| a == child) {
                return Err(ExpansionError::structural(
                    parent,
                    format!("adopting {} would create a cycle", child),
                ));
            }
            if self.node(child).parent != Some(parent) {
                self.check_adoptable_orphan(child)?;
            }
        }

        let old = std::mem::take(&mut self.node_mut(parent).children);
        let orphaned: Vec<NodeId> = old.iter().copied().filter(|c| !children.contains(c)).collect();
        let adopted: Vec<NodeId> = children.iter().copied().filter(|c| !old.contains(c)).collect();

        for &child in &orphaned {
            self.node_mut(child).parent = None;
        }
        for &child in &adopted {
            let node = self.node_mut(child);
            node.parent = Some(parent);
            node.analysis = None;
        }

        let node = self.node_mut(parent);
        if let NodeKind::AlternativeSet { weights } = &mut node.kind {
            weights.retain(|child, _| children.contains(child));
        }
        node.children = children;

        let mut moved = HashSet::new();
        for &child in orphaned.iter().chain(&adopted) {
            moved.extend(self.walk(child, TraverseOrder::PreOrder, false));
            self.clear_compiled_subtree(child);
        }
        if !moved.is_empty() {
            let root = self.root_of(parent);
            self.forget_analysis(root, &moved);
        }
        self.invalidate(parent);
        Ok(())
    }

    /// Append a detached node as the last child
    pub fn append_child(&mut self, parent: NodeId, child: NodeId) -> Result<(), ExpansionError> {
        self.check_node(parent)?;
        let mut children = self.node(parent).children.clone();
        children.push(child);
        self.set_children(parent, children)
    }

    /// Insert a detached node at `index`
    pub fn insert_child(&mut self, parent: NodeId, index: usize, child: NodeId) -> Result<(), ExpansionError> {
        self.check_node(parent)?;
        let mut children = self.node(parent).children.clone();
        if index > children.len() {
            return Err(ExpansionError::structural(
                parent,
                format!("insert index {} out of bounds for {} children", index, children.len()),
            ));
        }
        children.insert(index, child);
        self.set_children(parent, children)
    }

    /// Remove `child` from `parent`, leaving it detached
    pub fn remove_child(&mut self, parent: NodeId, child: NodeId) -> Result<(), ExpansionError> {
        let index = self.child_index(parent, child)?;
        self.remove_child_at(parent, index).map(|_| ())
    }

    /// Remove the child at `index`, returning it detached
    pub fn remove_child_at(&mut self, parent: NodeId, index: usize) -> Result<NodeId, ExpansionError> {
        let removed = self.splice_children(parent, index..index + 1, Vec::new())?;
        Ok(removed[0])
    }

    /// Swap `old` for the detached node `new` at the same position
    pub fn replace_child(&mut self, parent: NodeId, old: NodeId, new: NodeId) -> Result<(), ExpansionError> {
        let index = self.child_index(parent, old)?;
        self.splice_children(parent, index..index + 1, vec![new]).map(|_| ())
    }

    /// Replace the children in `range` with `replacement`
    ///
    /// Returns the removed children, now detached.
    pub fn splice_children(
        &mut self,
        parent: NodeId,
        range: Range<usize>,
        replacement: Vec<NodeId>,
    ) -> Result<Vec<NodeId>, ExpansionError> {
        self.check_node(parent)?;
        let mut children = self.node(parent).children.clone();
        if range.start > range.end || range.end > children.len() {
            return Err(ExpansionError::structural(
                parent,
                format!("range {:?} out of bounds for {} children", range, children.len()),
            ));
        }
        let removed: Vec<NodeId> = children.splice(range, replacement).collect();
        self.set_children(parent, children)?;
        Ok(removed)
    }

    /// Detach a node from its parent; a no-op for roots
    pub fn detach(&mut self, id: NodeId) -> Result<(), ExpansionError> {
        self.check_node(id)?;
        match self.node(id).parent {
            Some(parent) => self.remove_child(parent, id),
            None => Ok(()),
        }
    }

    /// Position of `child` in the child list of `parent`
    pub fn child_index(&self, parent: NodeId, child: NodeId) -> Result<usize, ExpansionError> {
        self.check_node(parent)?;
        self.node(parent)
            .children
            .iter()
            .position(|&c| c == child)
            .ok_or_else(|| {
                ExpansionError::structural(parent, format!("{} is not a child of this node", child))
            })
    }

    // ------------------------------------------------------------------
    // Payload mutation
    // ------------------------------------------------------------------

    /// Set the weight of one alternative
    ///
    /// # Errors
    /// [`ExpansionError::Weight`] for a negative or non-finite weight, or if
    /// `child` is not an alternative of `alt`.
    pub fn set_weight(&mut self, alt: NodeId, child: NodeId, weight: f64) -> Result<(), ExpansionError> {
        self.check_weight(alt, child, weight)?;
        if let NodeKind::AlternativeSet { weights } = &mut self.node_mut(alt).kind {
            weights.insert(child, weight);
        }
        self.invalidate(alt);
        Ok(())
    }

    /// Replace all weights of an alternative set
    ///
    /// Validated as a whole before anything is applied.
    pub fn set_weights(&mut self, alt: NodeId, weights: &[(NodeId, f64)]) -> Result<(), ExpansionError> {
        self.check_alternative_set(alt)?;
        for &(child, weight) in weights {
            self.check_weight(alt, child, weight)?;
        }
        if let NodeKind::AlternativeSet { weights: current } = &mut self.node_mut(alt).kind {
            *current = weights.iter().copied().collect();
        }
        self.invalidate(alt);
        Ok(())
    }

    /// Remove all weights, making the set unweighted
    pub fn clear_weights(&mut self, alt: NodeId) -> Result<(), ExpansionError> {
        self.check_alternative_set(alt)?;
        if let NodeKind::AlternativeSet { weights } = &mut self.node_mut(alt).kind {
            if weights.is_empty() {
                return Ok(());
            }
            weights.clear();
        }
        self.invalidate(alt);
        Ok(())
    }

    /// The weight of one alternative, if set
    pub fn weight(&self, alt: NodeId, child: NodeId) -> Option<f64> {
        match &self.get(alt)?.kind {
            NodeKind::AlternativeSet { weights } => weights.get(&child).copied(),
            _ => None,
        }
    }

    fn check_alternative_set(&self, alt: NodeId) -> Result<(), ExpansionError> {
        self.check_node(alt)?;
        if self.node(alt).kind.is_alternative_set() {
            Ok(())
        } else {
            Err(ExpansionError::structural(
                alt,
                format!("{} has no weights", self.node(alt).kind.name()),
            ))
        }
    }

    fn check_weight(&self, alt: NodeId, child: NodeId, weight: f64) -> Result<(), ExpansionError> {
        self.check_alternative_set(alt)?;
        if !weight.is_finite() || weight < 0.0 {
            return Err(ExpansionError::Weight {
                node: alt,
                reason: format!("weight {} must be finite and non-negative", weight),
            });
        }
        if !self.node(alt).children.contains(&child) {
            return Err(ExpansionError::Weight {
                node: alt,
                reason: format!("{} is not an alternative of this set", child),
            });
        }
        Ok(())
    }

    /// Change a literal's text
    pub fn set_literal_text(&mut self, id: NodeId, new_text: &str) -> Result<(), ExpansionError> {
        self.check_node(id)?;
        match &mut self.node_mut(id).kind {
            NodeKind::Literal { text, .. } => *text = new_text.to_string(),
            other => {
                let name = other.name();
                return Err(ExpansionError::structural(id, format!("{} has no text", name)));
            }
        }
        self.invalidate(id);
        Ok(())
    }

    /// Change a literal's case sensitivity
    pub fn set_case_sensitive(&mut self, id: NodeId, value: bool) -> Result<(), ExpansionError> {
        self.check_node(id)?;
        match &mut self.node_mut(id).kind {
            NodeKind::Literal { case_sensitive, .. } => {
                if *case_sensitive == value {
                    return Ok(());
                }
                *case_sensitive = value;
            }
            other => {
                let name = other.name();
                return Err(ExpansionError::structural(
                    id,
                    format!("{} has no case sensitivity", name),
                ));
            }
        }
        self.invalidate(id);
        Ok(())
    }

    /// Point a by-name reference at another rule name
    pub fn set_rule_ref_name(&mut self, id: NodeId, new_name: &str) -> Result<(), ExpansionError> {
        self.check_node(id)?;
        validate_rule_name(new_name)?;
        match &mut self.node_mut(id).kind {
            NodeKind::NamedRuleRef { name } => *name = new_name.to_string(),
            other => {
                let kind = other.name();
                return Err(ExpansionError::structural(id, format!("{} has no rule name", kind)));
            }
        }
        self.invalidate(id);
        Ok(())
    }

    /// Set or clear a node's tag
    ///
    /// Tags are trimmed; an empty tag clears it. Tags never affect matching.
    pub fn set_tag(&mut self, id: NodeId, tag: Option<&str>) -> Result<(), ExpansionError> {
        self.check_node(id)?;
        self.node_mut(id).tag = normalize_tag(tag);
        Ok(())
    }

    // ------------------------------------------------------------------
    // Copies
    // ------------------------------------------------------------------

    /// Copy the node alone: kind payload and tag, no children, no weights
    ///
    /// Kinds that need children cannot be matched until some are added.
    pub fn shallow_copy(&mut self, id: NodeId) -> NodeId {
        let source = self.node(id);
        let kind = match &source.kind {
            NodeKind::AlternativeSet { .. } => NodeKind::AlternativeSet {
                weights: HashMap::new(),
            },
            other => other.clone(),
        };
        let tag = source.tag.clone();
        let copy = self.alloc(kind);
        self.node_mut(copy).tag = tag;
        copy
    }

    /// Copy the whole subtree as a new detached tree
    ///
    /// Weights follow their children. References to rule objects are copied
    /// as references, so the referenced rule is shared rather than copied.
    pub fn deep_copy(&mut self, id: NodeId) -> NodeId {
        let copy = self.shallow_copy(id);
        let children = self.node(id).children.clone();
        let copies: Vec<NodeId> = children.iter().map(|&c| self.deep_copy(c)).collect();

        for &child in &copies {
            self.node_mut(child).parent = Some(copy);
        }
        if let NodeKind::AlternativeSet { weights } = &self.node(id).kind {
            let remapped: HashMap<NodeId, f64> = children
                .iter()
                .zip(&copies)
                .filter_map(|(old, new)| weights.get(old).map(|w| (*new, *w)))
                .collect();
            if let NodeKind::AlternativeSet { weights } = &mut self.node_mut(copy).kind {
                *weights = remapped;
            }
        }
        self.node_mut(copy).children = copies;
        copy
    }

    // ------------------------------------------------------------------
    // Structural identity
    // ------------------------------------------------------------------

    /// Equality over kind payload, tag, weights and children
    ///
    /// Match state, caches and node identity are ignored.
    pub fn structurally_eq(&self, a: NodeId, b: NodeId) -> bool {
        let (na, nb) = (self.node(a), self.node(b));
        if na.tag != nb.tag || na.children.len() != nb.children.len() {
            return false;
        }
        let same_kind = match (&na.kind, &nb.kind) {
            (NodeKind::AlternativeSet { weights: wa }, NodeKind::AlternativeSet { weights: wb }) => {
                let by_position = |w: &HashMap<NodeId, f64>, children: &[NodeId]| {
                    children.iter().map(|c| w.get(c).copied()).collect::<Vec<_>>()
                };
                by_position(wa, &na.children) == by_position(wb, &nb.children)
            }
            (ka, kb) => ka == kb,
        };
        same_kind
            && na
                .children
                .iter()
                .zip(&nb.children)
                .all(|(&ca, &cb)| self.structurally_eq(ca, cb))
    }

    /// Hash consistent with [`structurally_eq`](Self::structurally_eq)
    ///
    /// Stable within a process; not meant to be persisted.
    pub fn structural_hash(&self, id: NodeId) -> u64 {
        let state = ahash::RandomState::with_seeds(
            0x243f_6a88_85a3_08d3,
            0x1319_8a2e_0370_7344,
            0xa409_3822_299f_31d0,
            0x082e_fa98_ec4e_6c89,
        );
        let mut hasher = state.build_hasher();
        self.hash_node(id, &mut hasher);
        hasher.finish()
    }

    fn hash_node<H: Hasher>(&self, id: NodeId, state: &mut H) {
        let node = self.node(id);
        node.kind.name().hash(state);
        match &node.kind {
            NodeKind::Literal {
                text,
                case_sensitive,
            } => {
                text.hash(state);
                case_sensitive.hash(state);
            }
            NodeKind::AlternativeSet { weights } => {
                for child in &node.children {
                    weights.get(child).map(|w| w.to_bits()).hash(state);
                }
            }
            NodeKind::NamedRuleRef { name } => name.hash(state),
            NodeKind::RuleRef { rule } => rule.hash(state),
            _ => {}
        }
        node.tag.hash(state);
        node.children.len().hash(state);
        for &child in &node.children {
            self.hash_node(child, state);
        }
    }
}
