//! Rules: named expansion trees
//!
//! A rule owns one root node and may belong to at most one grammar. By-name
//! references resolve through the grammar of the rule that owns them.

use super::arena::{ExpansionArena, GrammarId, NodeId, RuleId};
use super::error::ExpansionError;
use super::node::{normalize_tag, NodeKind, NULL_RULE_NAME, VOID_RULE_NAME};
use super::visitor::TraverseOrder;
use hashbrown::HashSet;

/// A named expansion tree
#[derive(Debug, Clone)]
pub struct Rule {
    pub(crate) name: String,
    pub(crate) visible: bool,
    pub(crate) active: bool,
    pub(crate) root: NodeId,
    pub(crate) grammar: Option<GrammarId>,
    pub(crate) last_input: Option<String>,
}

impl Rule {
    /// The rule name
    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Whether the rule is public
    #[inline]
    pub fn is_visible(&self) -> bool {
        self.visible
    }

    /// Whether the rule is enabled for matching
    #[inline]
    pub fn is_active(&self) -> bool {
        self.active
    }

    /// Root of the rule's expansion tree
    #[inline]
    pub fn root(&self) -> NodeId {
        self.root
    }

    /// The grammar the rule belongs to
    #[inline]
    pub fn grammar(&self) -> Option<GrammarId> {
        self.grammar
    }

    /// The normalized input of the last match attempt
    #[inline]
    pub fn last_input(&self) -> Option<&str> {
        self.last_input.as_deref()
    }
}

/// Check a rule name: non-empty, no whitespace, not reserved
pub(crate) fn validate_rule_name(name: &str) -> Result<(), ExpansionError> {
    if name.is_empty() {
        return Err(ExpansionError::integrity(None, "rule name is empty"));
    }
    if name.chars().any(char::is_whitespace) {
        return Err(ExpansionError::integrity(
            None,
            format!("rule name '{}' contains whitespace", name),
        ));
    }
    if name == NULL_RULE_NAME || name == VOID_RULE_NAME {
        return Err(ExpansionError::integrity(
            None,
            format!("'{}' is a reserved rule name", name),
        ));
    }
    Ok(())
}

impl ExpansionArena {
    pub(crate) fn check_rule(&self, rule: RuleId) -> Result<(), ExpansionError> {
        if rule.index() < self.rules.len() {
            Ok(())
        } else {
            Err(ExpansionError::integrity(
                None,
                format!("rule {} does not belong to this arena", rule),
            ))
        }
    }

    /// Check that `root` can become the root of a rule
    fn check_detached_root(&self, root: NodeId) -> Result<(), ExpansionError> {
        self.check_node(root)?;
        let node = self.node(root);
        if node.parent.is_some() {
            return Err(ExpansionError::structural(
                root,
                "a rule's expansion must be a detached tree",
            ));
        }
        if node.rule.is_some() {
            return Err(ExpansionError::structural(
                root,
                "node is already the expansion of another rule",
            ));
        }
        Ok(())
    }

    /// Create a rule owning the detached tree at `root`
    ///
    /// # Errors
    /// - [`ExpansionError::GrammarIntegrity`] for an empty, whitespace
    ///   containing or reserved name
    /// - [`ExpansionError::Structural`] if `root` has a parent or already
    ///   belongs to a rule
    pub fn new_rule(
        &mut self,
        name: &str,
        visible: bool,
        root: NodeId,
    ) -> Result<RuleId, ExpansionError> {
        validate_rule_name(name)?;
        self.check_detached_root(root)?;

        let id = RuleId::new(self.rules.len() as u32);
        self.rules.push(Rule {
            name: name.to_string(),
            visible,
            active: true,
            root,
            grammar: None,
            last_input: None,
        });
        self.node_mut(root).rule = Some(id);
        Ok(id)
    }

    /// Look up a rule
    #[inline]
    pub fn get_rule(&self, rule: RuleId) -> Option<&Rule> {
        self.rules.get(rule.index())
    }

    /// Look up a rule known to belong to this arena
    ///
    /// # Panics
    /// Panics if `rule` was not created by this arena.
    #[inline]
    pub fn rule(&self, rule: RuleId) -> &Rule {
        &self.rules[rule.index()]
    }

    /// Number of rules created in this arena
    #[inline]
    pub fn rule_count(&self) -> usize {
        self.rules.len()
    }

    /// `grammar.rule` for grammared rules, the bare name otherwise
    pub fn fully_qualified_name(&self, rule: RuleId) -> String {
        let r = self.rule(rule);
        match r.grammar {
            Some(grammar) => format!("{}.{}", self.grammar(grammar).name(), r.name),
            None => r.name.clone(),
        }
    }

    /// Replace a rule's expansion with another detached tree
    ///
    /// The old tree is left detached and reusable.
    pub fn set_rule_expansion(&mut self, rule: RuleId, root: NodeId) -> Result<(), ExpansionError> {
        self.check_rule(rule)?;
        let old_root = self.rules[rule.index()].root;
        if old_root == root {
            return Ok(());
        }
        self.check_detached_root(root)?;

        self.node_mut(old_root).rule = None;
        self.clear_compiled_subtree(old_root);
        self.node_mut(old_root).clear_match();

        self.clear_compiled_subtree(root);
        self.node_mut(root).rule = Some(rule);
        self.rules[rule.index()].root = root;
        self.rules[rule.index()].last_input = None;

        self.invalidate_rule_references(rule);
        Ok(())
    }

    /// Change a rule's visibility
    pub fn set_rule_visible(&mut self, rule: RuleId, visible: bool) -> Result<(), ExpansionError> {
        self.check_rule(rule)?;
        self.rules[rule.index()].visible = visible;
        Ok(())
    }

    /// Make a rule matchable again
    pub fn enable_rule(&mut self, rule: RuleId) -> Result<(), ExpansionError> {
        self.set_rule_active(rule, true)
    }

    /// Make a rule unmatchable without altering its tree
    pub fn disable_rule(&mut self, rule: RuleId) -> Result<(), ExpansionError> {
        self.set_rule_active(rule, false)
    }

    fn set_rule_active(&mut self, rule: RuleId, active: bool) -> Result<(), ExpansionError> {
        self.check_rule(rule)?;
        if self.rules[rule.index()].active != active {
            self.rules[rule.index()].active = active;
            self.invalidate_rule_references(rule);
        }
        Ok(())
    }

    /// Resolve the rule a reference node points at
    ///
    /// By-name references resolve through the grammar of the rule owning the
    /// reference's tree.
    pub(crate) fn resolve_reference(&self, id: NodeId) -> Result<RuleId, ExpansionError> {
        match &self.node(id).kind {
            NodeKind::RuleRef { rule } => Ok(*rule),
            NodeKind::NamedRuleRef { name } => {
                let owner = self.owning_rule_of(id).ok_or_else(|| {
                    ExpansionError::unresolved(name, "reference is not part of a rule")
                })?;
                let grammar = self.rules[owner.index()].grammar.ok_or_else(|| {
                    ExpansionError::unresolved(
                        name,
                        format!("rule '{}' is not in a grammar", self.rules[owner.index()].name),
                    )
                })?;
                self.get_rule_by_name(grammar, name).ok_or_else(|| {
                    ExpansionError::unresolved(
                        name,
                        format!("no rule with that name in grammar '{}'", self.grammar(grammar).name()),
                    )
                })
            }
            other => Err(ExpansionError::structural(
                id,
                format!("{} is not a rule reference", other.name()),
            )),
        }
    }

    /// The rule a reference node currently resolves to, if any
    pub fn reference_target(&self, id: NodeId) -> Option<RuleId> {
        self.resolve_reference(id).ok()
    }

    /// Rules transitively reachable through references in the rule's tree
    ///
    /// Excludes the rule itself; unresolvable references are skipped.
    pub fn dependencies(&self, rule: RuleId) -> Vec<RuleId> {
        let root = self.rule(rule).root;
        let mut seen = HashSet::new();
        let mut deps = Vec::new();
        for id in self.walk(root, TraverseOrder::PreOrder, true) {
            if !self.node(id).kind.is_rule_reference() {
                continue;
            }
            if let Some(target) = self.reference_target(id) {
                if target != rule && seen.insert(target) {
                    deps.push(target);
                }
            }
        }
        deps
    }

    /// Rules of the same grammar whose dependencies include `rule`
    pub fn dependent_rules(&self, rule: RuleId) -> Vec<RuleId> {
        let Some(grammar) = self.rule(rule).grammar else {
            return Vec::new();
        };
        self.grammar(grammar)
            .rules()
            .iter()
            .copied()
            .filter(|&other| other != rule && self.dependencies(other).contains(&rule))
            .collect()
    }

    /// Distinct tags in the rule's own tree, in pre-order
    pub fn rule_tags(&self, rule: RuleId) -> Vec<String> {
        self.collect_tags(rule, |_, _| true, false)
    }

    /// Whether any node of the rule's own tree carries `tag`
    pub fn rule_has_tag(&self, rule: RuleId, tag: &str) -> bool {
        let Some(tag) = normalize_tag(Some(tag)) else {
            return false;
        };
        self.rule_tags(rule).contains(&tag)
    }

    /// Tags of nodes that matched text in the last match attempt
    ///
    /// Reference targets are included, and so are nodes that only matched in
    /// an earlier repetition.
    pub fn matched_tags(&self, rule: RuleId) -> Vec<String> {
        self.collect_tags(rule, |arena, id| arena.had_match(id), true)
    }

    /// Match `text` and return the tags of the nodes that matched
    ///
    /// Returns an empty list if the rule does not match.
    pub fn get_tags_matching(&mut self, rule: RuleId, text: &str) -> Result<Vec<String>, ExpansionError> {
        if self.matches(rule, text)? {
            Ok(self.matched_tags(rule))
        } else {
            Ok(Vec::new())
        }
    }

    fn collect_tags<P>(&self, rule: RuleId, mut predicate: P, follow_refs: bool) -> Vec<String>
    where
        P: FnMut(&ExpansionArena, NodeId) -> bool,
    {
        let root = self.rule(rule).root;
        let mut tags: Vec<String> = Vec::new();
        for id in self.walk(root, TraverseOrder::PreOrder, follow_refs) {
            if let Some(tag) = self.node(id).tag() {
                if predicate(self, id) && !tags.iter().any(|t| t == tag) {
                    tags.push(tag.to_string());
                }
            }
        }
        tags
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rule_name_validation() {
        let mut arena = ExpansionArena::new();
        for bad in ["", "two words", "NULL", "VOID"] {
            let root = arena.new_literal("x");
            let err = arena.new_rule(bad, true, root).unwrap_err();
            assert!(
                matches!(err, ExpansionError::GrammarIntegrity { .. }),
                "{:?} accepted",
                bad
            );
        }
    }

    #[test]
    fn test_rule_root_must_be_detached() {
        let mut arena = ExpansionArena::new();
        let a = arena.new_literal("a");
        let _seq = arena.new_sequence(vec![a]).unwrap();
        assert!(arena.new_rule("r", true, a).is_err());

        let b = arena.new_literal("b");
        arena.new_rule("r1", true, b).unwrap();
        assert!(arena.new_rule("r2", true, b).is_err());
    }

    #[test]
    fn test_owning_rule_link() {
        let mut arena = ExpansionArena::new();
        let a = arena.new_literal("a");
        let opt = arena.new_optional(a).unwrap();
        let rule = arena.new_rule("r", true, opt).unwrap();

        assert_eq!(arena.node(opt).owning_rule(), Some(rule));
        assert_eq!(arena.node(a).owning_rule(), None);
        assert_eq!(arena.owning_rule_of(a), Some(rule));
        assert_eq!(arena.fully_qualified_name(rule), "r");
    }

    #[test]
    fn test_set_rule_expansion_detaches_old_root() {
        let mut arena = ExpansionArena::new();
        let old = arena.new_literal("old");
        let rule = arena.new_rule("r", true, old).unwrap();
        let new = arena.new_literal("new");

        arena.set_rule_expansion(rule, new).unwrap();
        assert_eq!(arena.rule(rule).root(), new);
        assert_eq!(arena.node(old).owning_rule(), None);
        assert_eq!(arena.node(new).owning_rule(), Some(rule));
    }

    #[test]
    fn test_rule_tags() {
        let mut arena = ExpansionArena::new();
        let a = arena.new_literal("a");
        let b = arena.new_literal("b");
        arena.set_tag(a, Some(" first ")).unwrap();
        arena.set_tag(b, Some("second")).unwrap();
        let alt = arena.new_alternatives(vec![a, b]).unwrap();
        let rule = arena.new_rule("r", true, alt).unwrap();

        assert_eq!(arena.rule_tags(rule), vec!["first", "second"]);
        assert!(arena.rule_has_tag(rule, "first "));
        assert!(!arena.rule_has_tag(rule, "third"));
    }
}
