//! Lazy matcher compilation
//!
//! A node's matcher is built on first use and cached on the node until a
//! mutation invalidates it (see [`invalidate`](super::invalidate)).
//!
//! Compiling a node compiles its whole subtree first, and compiling a rule
//! reference compiles the referenced rule's root. So a compiled node always
//! has compiled children and, for references, a compiled target. Invalidation
//! relies on this to stop as soon as it meets an uncompiled node.

use super::arena::{ExpansionArena, NodeId, RuleId};
use super::error::ExpansionError;
use super::literal_cache;
use super::node::NodeKind;
use hashbrown::HashSet;
use regex::Regex;
use std::cmp::Ordering;
use std::sync::Arc;

/// Compiled, reusable matching strategy for one node
#[derive(Debug)]
pub(crate) enum Matcher {
    /// Anchored word-sequence pattern
    Literal(Regex),
    /// All children, in order
    Sequence(Vec<NodeId>),
    /// First child that matches, in preference order
    Choice(Vec<NodeId>),
    /// Child or nothing
    Optional(NodeId),
    /// Repeated child
    Repeat { child: NodeId, at_least_one: bool },
    /// Delegate to another rule's root
    Reference(NodeId),
    /// Reference to a disabled rule
    Disabled,
    /// Always matches, consumes nothing
    Null,
    /// Never matches
    Void,
}

impl ExpansionArena {
    /// Compile the matcher for `id` and everything it depends on
    ///
    /// Matching compiles lazily, so calling this is only needed to surface
    /// compilation errors early.
    ///
    /// # Errors
    /// - [`ExpansionError::Compilation`] for an empty literal or a disabled
    ///   rule's root
    /// - [`ExpansionError::Weight`] for a partially weighted alternative set
    /// - [`ExpansionError::ReferenceResolution`] for an unresolvable reference
    pub fn compile(&mut self, id: NodeId) -> Result<(), ExpansionError> {
        self.check_node(id)?;
        self.matcher_for(id).map(|_| ())
    }

    /// Compile a rule's tree
    pub fn compile_rule(&mut self, rule: RuleId) -> Result<(), ExpansionError> {
        self.check_rule(rule)?;
        let root = self.rules[rule.index()].root;
        if !self.rules[rule.index()].active {
            return Err(ExpansionError::Compilation {
                node: root,
                reason: format!("rule '{}' is disabled", self.rules[rule.index()].name),
            });
        }
        self.compile(root)
    }

    /// Cached matcher for `id`, compiling it if needed
    pub(crate) fn matcher_for(&mut self, id: NodeId) -> Result<Arc<Matcher>, ExpansionError> {
        if let Some(matcher) = &self.node(id).matcher {
            return Ok(Arc::clone(matcher));
        }
        let mut in_progress = HashSet::new();
        self.compile_node(id, &mut in_progress)
    }

    fn compile_node(
        &mut self,
        id: NodeId,
        in_progress: &mut HashSet<NodeId>,
    ) -> Result<Arc<Matcher>, ExpansionError> {
        if let Some(matcher) = &self.node(id).matcher {
            return Ok(Arc::clone(matcher));
        }
        if let Some(rule) = self.node(id).rule {
            let rule = &self.rules[rule.index()];
            if !rule.active {
                return Err(ExpansionError::Compilation {
                    node: id,
                    reason: format!("rule '{}' is disabled", rule.name),
                });
            }
        }

        let children = self.node(id).children.clone();
        let kind = self.node(id).kind.clone();
        // Shallow copies are childless until the caller fills them in
        if !kind.arity().accepts(children.len()) {
            return Err(ExpansionError::structural(
                id,
                format!("{} cannot match with {} children", kind.name(), children.len()),
            ));
        }

        in_progress.insert(id);
        for &child in &children {
            self.compile_node(child, in_progress)?;
        }

        let matcher = match &kind {
            NodeKind::Literal {
                text,
                case_sensitive,
            } => match literal_cache::get_or_compile(text, *case_sensitive) {
                Some(regex) => Matcher::Literal(regex),
                None => {
                    in_progress.remove(&id);
                    return Err(ExpansionError::Compilation {
                        node: id,
                        reason: "literal text is empty".to_string(),
                    });
                }
            },
            NodeKind::Sequence | NodeKind::RequiredGrouping => Matcher::Sequence(children),
            NodeKind::AlternativeSet { weights } => {
                match ordered_alternatives(id, &children, weights) {
                    Ok(order) => Matcher::Choice(order),
                    Err(err) => {
                        in_progress.remove(&id);
                        return Err(err);
                    }
                }
            }
            NodeKind::Optional => Matcher::Optional(children[0]),
            NodeKind::Repeat => Matcher::Repeat {
                child: children[0],
                at_least_one: true,
            },
            NodeKind::KleeneStar => Matcher::Repeat {
                child: children[0],
                at_least_one: false,
            },
            NodeKind::NamedRuleRef { .. } | NodeKind::RuleRef { .. } => {
                match self.compile_reference(id, in_progress) {
                    Ok(matcher) => matcher,
                    Err(err) => {
                        in_progress.remove(&id);
                        return Err(err);
                    }
                }
            }
            NodeKind::NullRef => Matcher::Null,
            NodeKind::VoidRef => Matcher::Void,
        };

        in_progress.remove(&id);
        log_trace!("Compiled {} matcher for node {}", kind.name(), id);
        let matcher = Arc::new(matcher);
        self.node_mut(id).matcher = Some(Arc::clone(&matcher));
        Ok(matcher)
    }

    fn compile_reference(
        &mut self,
        id: NodeId,
        in_progress: &mut HashSet<NodeId>,
    ) -> Result<Matcher, ExpansionError> {
        let rule = self.resolve_reference(id)?;
        if !self.rules[rule.index()].active {
            return Ok(Matcher::Disabled);
        }
        let root = self.rules[rule.index()].root;
        // A root already being compiled is a recursive reference
        if !in_progress.contains(&root) {
            self.compile_node(root, in_progress)?;
        }
        Ok(Matcher::Reference(root))
    }
}

/// Alternatives in the order they are tried
///
/// Unweighted sets keep their order. Weighted sets drop zero-weight children
/// and sort by descending weight; the sort is stable so ties keep their
/// original order.
fn ordered_alternatives(
    id: NodeId,
    children: &[NodeId],
    weights: &hashbrown::HashMap<NodeId, f64>,
) -> Result<Vec<NodeId>, ExpansionError> {
    if weights.is_empty() {
        return Ok(children.to_vec());
    }

    let weighted = children.iter().filter(|c| weights.contains_key(*c)).count();
    if weighted != children.len() {
        return Err(ExpansionError::Weight {
            node: id,
            reason: format!(
                "{} of {} alternatives have weights; all or none must",
                weighted,
                children.len()
            ),
        });
    }

    let mut order: Vec<(NodeId, f64)> = children
        .iter()
        .map(|c| (*c, weights[c]))
        .filter(|(_, w)| *w > 0.0)
        .collect();
    order.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(Ordering::Equal));
    Ok(order.into_iter().map(|(c, _)| c).collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compile_caches_subtree() {
        let mut arena = ExpansionArena::new();
        let a = arena.new_literal("a");
        let b = arena.new_literal("b");
        let seq = arena.new_sequence(vec![a, b]).unwrap();

        assert!(!arena.node(seq).is_compiled());
        arena.compile(seq).unwrap();
        assert!(arena.node(seq).is_compiled());
        assert!(arena.node(a).is_compiled());
        assert!(arena.node(b).is_compiled());
    }

    #[test]
    fn test_empty_literal_fails() {
        let mut arena = ExpansionArena::new();
        let empty = arena.new_literal("  ");
        let err = arena.compile(empty).unwrap_err();
        assert!(matches!(err, ExpansionError::Compilation { node, .. } if node == empty));
        assert!(!arena.node(empty).is_compiled());
    }

    #[test]
    fn test_unresolved_reference_fails() {
        let mut arena = ExpansionArena::new();
        let r = arena.new_rule_ref("missing");
        let seq = arena.new_sequence(vec![r]).unwrap();
        let err = arena.compile(seq).unwrap_err();
        assert!(err.is_reference_error());
        assert!(!arena.node(seq).is_compiled());
    }

    #[test]
    fn test_weighted_order() {
        let ids: Vec<NodeId> = (0..4).map(NodeId::new).collect();
        let mut weights = hashbrown::HashMap::new();
        weights.insert(ids[0], 1.0);
        weights.insert(ids[1], 3.0);
        weights.insert(ids[2], 0.0);
        weights.insert(ids[3], 1.0);

        let order = ordered_alternatives(NodeId::new(9), &ids, &weights).unwrap();
        assert_eq!(order, vec![ids[1], ids[0], ids[3]]);
    }

    #[test]
    fn test_partial_weights_rejected() {
        let ids: Vec<NodeId> = (0..2).map(NodeId::new).collect();
        let mut weights = hashbrown::HashMap::new();
        weights.insert(ids[0], 1.0);

        let err = ordered_alternatives(NodeId::new(9), &ids, &weights).unwrap_err();
        assert!(matches!(err, ExpansionError::Weight { .. }));
    }
}
