//! Grammars: ordered collections of uniquely named rules

use super::arena::{ExpansionArena, GrammarId, RuleId};
use super::error::ExpansionError;
use super::node::normalize_tag;

/// Default name for grammars created without one
pub const DEFAULT_GRAMMAR_NAME: &str = "default";

/// An insertion-ordered set of distinct-named rules
#[derive(Debug, Clone)]
pub struct Grammar {
    pub(crate) name: String,
    pub(crate) rules: Vec<RuleId>,
}

impl Grammar {
    /// The grammar name
    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Member rules in insertion order
    #[inline]
    pub fn rules(&self) -> &[RuleId] {
        &self.rules
    }
}

impl ExpansionArena {
    /// Create an empty grammar
    pub fn new_grammar(&mut self, name: &str) -> GrammarId {
        let name = match name.trim() {
            "" => DEFAULT_GRAMMAR_NAME,
            trimmed => trimmed,
        };
        let id = GrammarId::new(self.grammars.len() as u32);
        self.grammars.push(Grammar {
            name: name.to_string(),
            rules: Vec::new(),
        });
        id
    }

    /// Look up a grammar known to belong to this arena
    ///
    /// # Panics
    /// Panics if `grammar` was not created by this arena.
    #[inline]
    pub fn grammar(&self, grammar: GrammarId) -> &Grammar {
        &self.grammars[grammar.index()]
    }

    /// Look up a grammar
    #[inline]
    pub fn get_grammar(&self, grammar: GrammarId) -> Option<&Grammar> {
        self.grammars.get(grammar.index())
    }

    fn check_grammar(&self, grammar: GrammarId) -> Result<(), ExpansionError> {
        if grammar.index() < self.grammars.len() {
            Ok(())
        } else {
            Err(ExpansionError::integrity(
                None,
                format!("grammar {} does not belong to this arena", grammar),
            ))
        }
    }

    /// Add a rule to a grammar
    ///
    /// Adding a rule that is already a member is a no-op.
    ///
    /// # Errors
    /// [`ExpansionError::GrammarIntegrity`] if another member has the same
    /// name or the rule belongs to a different grammar.
    pub fn add_rule(&mut self, grammar: GrammarId, rule: RuleId) -> Result<(), ExpansionError> {
        self.check_grammar(grammar)?;
        self.check_rule(rule)?;

        match self.rules[rule.index()].grammar {
            Some(current) if current == grammar => return Ok(()),
            Some(other) => {
                return Err(ExpansionError::integrity(
                    rule,
                    format!(
                        "rule '{}' already belongs to grammar '{}'",
                        self.rules[rule.index()].name,
                        self.grammar(other).name
                    ),
                ))
            }
            None => {}
        }

        let name = &self.rules[rule.index()].name;
        if self.get_rule_by_name(grammar, name).is_some() {
            return Err(ExpansionError::integrity(
                rule,
                format!(
                    "grammar '{}' already has a rule named '{}'",
                    self.grammar(grammar).name,
                    name
                ),
            ));
        }

        self.grammars[grammar.index()].rules.push(rule);
        self.rules[rule.index()].grammar = Some(grammar);
        // By-name references inside the tree now resolve differently
        let root = self.rules[rule.index()].root;
        self.clear_compiled_subtree(root);
        self.invalidate_rule_references(rule);
        log_debug!(
            "Added rule '{}' to grammar '{}'",
            self.rules[rule.index()].name,
            self.grammar(grammar).name
        );
        Ok(())
    }

    /// Add several rules, stopping at the first failure
    pub fn add_rules(&mut self, grammar: GrammarId, rules: &[RuleId]) -> Result<(), ExpansionError> {
        rules.iter().try_for_each(|&rule| self.add_rule(grammar, rule))
    }

    /// Remove a rule from a grammar
    ///
    /// # Errors
    /// [`ExpansionError::GrammarIntegrity`] if the rule is not a member, or if
    /// other member rules depend on it and `force` is false.
    pub fn remove_rule(
        &mut self,
        grammar: GrammarId,
        rule: RuleId,
        force: bool,
    ) -> Result<(), ExpansionError> {
        self.check_grammar(grammar)?;
        self.check_rule(rule)?;
        if self.rules[rule.index()].grammar != Some(grammar) {
            return Err(ExpansionError::integrity(
                rule,
                format!(
                    "rule '{}' is not in grammar '{}'",
                    self.rules[rule.index()].name,
                    self.grammar(grammar).name
                ),
            ));
        }

        let dependents = self.dependent_rules(rule);
        if !dependents.is_empty() && !force {
            let names: Vec<&str> = dependents
                .iter()
                .map(|d| self.rules[d.index()].name.as_str())
                .collect();
            return Err(ExpansionError::integrity(
                rule,
                format!(
                    "rule '{}' is referenced by {}",
                    self.rules[rule.index()].name,
                    names.join(", ")
                ),
            ));
        }

        // Collected while the references still resolve
        let references = self.references_to(rule);

        self.grammars[grammar.index()].rules.retain(|&r| r != rule);
        self.rules[rule.index()].grammar = None;

        for reference in references {
            self.invalidate(reference);
        }
        let root = self.rules[rule.index()].root;
        self.clear_compiled_subtree(root);
        log_debug!(
            "Removed rule '{}' from grammar '{}'",
            self.rules[rule.index()].name,
            self.grammar(grammar).name
        );
        Ok(())
    }

    /// Remove a rule by name, returning its id
    pub fn remove_rule_by_name(
        &mut self,
        grammar: GrammarId,
        name: &str,
        force: bool,
    ) -> Result<RuleId, ExpansionError> {
        let rule = self.require_rule(grammar, name)?;
        self.remove_rule(grammar, rule, force)?;
        Ok(rule)
    }

    /// Find a member rule by name
    pub fn get_rule_by_name(&self, grammar: GrammarId, name: &str) -> Option<RuleId> {
        self.get_grammar(grammar)?
            .rules
            .iter()
            .copied()
            .find(|r| self.rules[r.index()].name == name)
    }

    fn require_rule(&self, grammar: GrammarId, name: &str) -> Result<RuleId, ExpansionError> {
        self.check_grammar(grammar)?;
        self.get_rule_by_name(grammar, name).ok_or_else(|| {
            ExpansionError::integrity(
                None,
                format!("no rule named '{}' in grammar '{}'", name, self.grammar(grammar).name),
            )
        })
    }

    /// Find member rules for each name, failing on the first missing one
    pub fn get_rules_from_names(
        &self,
        grammar: GrammarId,
        names: &[&str],
    ) -> Result<Vec<RuleId>, ExpansionError> {
        names.iter().map(|name| self.require_rule(grammar, name)).collect()
    }

    /// Visible member rules in insertion order
    pub fn visible_rules(&self, grammar: GrammarId) -> Vec<RuleId> {
        self.grammar(grammar)
            .rules
            .iter()
            .copied()
            .filter(|r| self.rules[r.index()].visible)
            .collect()
    }

    /// Visible, enabled rules that match `text`
    pub fn find_matching_rules(
        &mut self,
        grammar: GrammarId,
        text: &str,
    ) -> Result<Vec<RuleId>, ExpansionError> {
        self.check_grammar(grammar)?;
        let mut matching = Vec::new();
        for rule in self.visible_rules(grammar) {
            if self.rules[rule.index()].active && self.matches(rule, text)? {
                matching.push(rule);
            }
        }
        Ok(matching)
    }

    /// Member rules whose trees carry `tag`
    pub fn find_tagged_rules(&self, grammar: GrammarId, tag: &str, include_hidden: bool) -> Vec<RuleId> {
        let Some(tag) = normalize_tag(Some(tag)) else {
            return Vec::new();
        };
        self.grammar(grammar)
            .rules
            .iter()
            .copied()
            .filter(|&r| include_hidden || self.rules[r.index()].visible)
            .filter(|&r| self.rule_has_tag(r, &tag))
            .collect()
    }

    /// Enable a member rule by name
    pub fn enable_rule_by_name(&mut self, grammar: GrammarId, name: &str) -> Result<(), ExpansionError> {
        let rule = self.require_rule(grammar, name)?;
        self.enable_rule(rule)
    }

    /// Disable a member rule by name
    pub fn disable_rule_by_name(&mut self, grammar: GrammarId, name: &str) -> Result<(), ExpansionError> {
        let rule = self.require_rule(grammar, name)?;
        self.disable_rule(rule)
    }
}
