//! Grammar lint
//!
//! Reports patterns that compile but match badly, without matching anything:
//! - `[x] x` style optionals shadowing the next required word
//! - alternatives that can never be chosen
//! - left recursion through rule references
//! - broken weights, empty literals and unresolved references
//!
//! # Example
//!
//! ```
//! use jsgf_match::builder::{lit, opt, seq};
//! use jsgf_match::{ExpansionArena, GrammarDef, GrammarLinter, LintKind, RuleDef};
//!
//! let mut arena = ExpansionArena::new();
//! let def = GrammarDef::new("g").rule(RuleDef::new("r", seq([opt(lit("x")), lit("x")])));
//! let grammar = arena.build_grammar(&def).unwrap();
//!
//! let warnings = GrammarLinter::new(&arena, grammar).lint();
//! assert!(warnings.iter().any(|w| w.kind == LintKind::ShadowedOptional));
//! ```

use super::arena::{ExpansionArena, GrammarId, NodeId, RuleId};
use super::node::NodeKind;
use super::visitor::TraverseOrder;
use hashbrown::{HashMap, HashSet};
use std::fmt;

/// Kind of lint warning
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LintKind {
    /// An optional part starts with a word the following required part also
    /// starts with; greedy matching never lets the required part see it
    ShadowedOptional,

    /// A by-name reference that does not resolve in the grammar
    UnresolvedReference,

    /// A literal without words, which cannot compile
    EmptyLiteral,

    /// Some but not all alternatives carry weights
    IncompleteWeights,

    /// An alternative with weight zero, never tried
    ZeroWeightAlternative,

    /// An alternative that an earlier one always pre-empts
    UnreachableAlternative,

    /// A rule that can reach itself without consuming input
    LeftRecursion,

    /// A repetition directly inside another, which only matches once
    NestedRepetition,
}

impl fmt::Display for LintKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ShadowedOptional => write!(f, "shadowed optional"),
            Self::UnresolvedReference => write!(f, "unresolved reference"),
            Self::EmptyLiteral => write!(f, "empty literal"),
            Self::IncompleteWeights => write!(f, "incomplete weights"),
            Self::ZeroWeightAlternative => write!(f, "zero-weight alternative"),
            Self::UnreachableAlternative => write!(f, "unreachable alternative"),
            Self::LeftRecursion => write!(f, "left recursion"),
            Self::NestedRepetition => write!(f, "nested repetition"),
        }
    }
}

/// A lint finding
#[derive(Debug, Clone, PartialEq)]
pub struct LintWarning {
    /// The kind of warning
    pub kind: LintKind,
    /// Rule whose tree the warning was found in
    pub rule: RuleId,
    /// Node the warning is about
    pub node: NodeId,
    /// Human-readable message
    pub message: String,
    /// Other nodes involved
    pub related: Vec<NodeId>,
}

impl LintWarning {
    /// Create a new warning
    pub fn new(kind: LintKind, rule: RuleId, node: NodeId, message: impl Into<String>) -> Self {
        Self {
            kind,
            rule,
            node,
            message: message.into(),
            related: Vec::new(),
        }
    }

    /// Add related nodes
    pub fn with_related(mut self, nodes: Vec<NodeId>) -> Self {
        self.related = nodes;
        self
    }
}

impl fmt::Display for LintWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[node {}] {}: {}", self.node, self.kind, self.message)?;
        if !self.related.is_empty() {
            let related: Vec<String> = self.related.iter().map(ToString::to_string).collect();
            write!(f, " (related: {})", related.join(", "))?;
        }
        Ok(())
    }
}

/// Lints every rule of a grammar
pub struct GrammarLinter<'a> {
    arena: &'a ExpansionArena,
    grammar: GrammarId,
    nullable: HashMap<NodeId, bool>,
}

impl<'a> GrammarLinter<'a> {
    /// Create a linter for one grammar
    pub fn new(arena: &'a ExpansionArena, grammar: GrammarId) -> Self {
        Self {
            arena,
            grammar,
            nullable: HashMap::new(),
        }
    }

    /// Lint all rules, in grammar order
    pub fn lint(&mut self) -> Vec<LintWarning> {
        let rules = self.arena.grammar(self.grammar).rules().to_vec();
        let mut warnings = Vec::new();
        for rule in rules {
            self.lint_rule(rule, &mut warnings);
        }
        warnings
    }

    fn lint_rule(&mut self, rule: RuleId, warnings: &mut Vec<LintWarning>) {
        let arena = self.arena;
        let root = arena.rule(rule).root();

        for id in arena.walk(root, TraverseOrder::PreOrder, false) {
            let node = arena.node(id);
            match &node.kind {
                NodeKind::Literal { text, .. } if text.split_whitespace().next().is_none() => {
                    warnings.push(LintWarning::new(
                        LintKind::EmptyLiteral,
                        rule,
                        id,
                        "literal has no words and cannot be matched",
                    ));
                }
                NodeKind::NamedRuleRef { name } if arena.reference_target(id).is_none() => {
                    warnings.push(LintWarning::new(
                        LintKind::UnresolvedReference,
                        rule,
                        id,
                        format!("<{}> does not resolve in this grammar", name),
                    ));
                }
                NodeKind::AlternativeSet { .. } => self.lint_alternatives(rule, id, warnings),
                NodeKind::Sequence | NodeKind::RequiredGrouping => {
                    self.lint_sequence(rule, id, warnings)
                }
                NodeKind::Repeat | NodeKind::KleeneStar if arena.is_degenerate_repetition(id) => {
                    warnings.push(LintWarning::new(
                        LintKind::NestedRepetition,
                        rule,
                        id,
                        format!("{} directly inside another repetition matches once", node.kind.name()),
                    ));
                }
                _ => {}
            }
        }

        let mut path = Vec::new();
        let mut visited = HashSet::new();
        if self.reaches_rule_leftmost(root, rule, &mut visited, &mut path) {
            warnings.push(
                LintWarning::new(
                    LintKind::LeftRecursion,
                    rule,
                    root,
                    format!(
                        "rule '{}' can reference itself before consuming input",
                        arena.rule(rule).name()
                    ),
                )
                .with_related(path),
            );
        }
    }

    fn lint_alternatives(&mut self, rule: RuleId, alt: NodeId, warnings: &mut Vec<LintWarning>) {
        let arena = self.arena;
        let children = arena.children(alt);
        let weighted: Vec<NodeId> = children
            .iter()
            .copied()
            .filter(|&c| arena.weight(alt, c).is_some())
            .collect();

        if !weighted.is_empty() && weighted.len() < children.len() {
            warnings.push(
                LintWarning::new(
                    LintKind::IncompleteWeights,
                    rule,
                    alt,
                    format!("{} of {} alternatives have weights", weighted.len(), children.len()),
                )
                .with_related(weighted.clone()),
            );
        }
        for &child in &weighted {
            if arena.weight(alt, child) == Some(0.0) {
                warnings.push(LintWarning::new(
                    LintKind::ZeroWeightAlternative,
                    rule,
                    child,
                    "alternative has weight zero and is never tried",
                ));
            }
        }

        let mut nullable_seen: Option<NodeId> = None;
        let mut literals: Vec<(NodeId, Vec<String>)> = Vec::new();
        for &child in children {
            if let Some(earlier) = nullable_seen {
                warnings.push(
                    LintWarning::new(
                        LintKind::UnreachableAlternative,
                        rule,
                        child,
                        "an earlier alternative can match nothing and is always chosen first",
                    )
                    .with_related(vec![earlier]),
                );
            } else if let Some(words) = literal_words(arena, child) {
                if let Some((earlier, _)) = literals.iter().find(|(_, w)| words.starts_with(w)) {
                    warnings.push(
                        LintWarning::new(
                            LintKind::UnreachableAlternative,
                            rule,
                            child,
                            "an earlier alternative matches the same leading words",
                        )
                        .with_related(vec![*earlier]),
                    );
                }
                literals.push((child, words));
            }
            if nullable_seen.is_none() && self.is_nullable(child, &mut HashSet::new()) {
                nullable_seen = Some(child);
            }
        }
    }

    fn lint_sequence(&mut self, rule: RuleId, seq: NodeId, warnings: &mut Vec<LintWarning>) {
        let arena = self.arena;
        for pair in arena.children(seq).windows(2) {
            let (first, next) = (pair[0], pair[1]);
            if !arena.kind(first).makes_optional() {
                continue;
            }
            let shared: Vec<String> = {
                let a = self.first_words(first, &mut HashSet::new());
                let b = self.first_words(next, &mut HashSet::new());
                let mut shared: Vec<String> = a.intersection(&b).cloned().collect();
                shared.sort();
                shared
            };
            if !shared.is_empty() {
                warnings.push(
                    LintWarning::new(
                        LintKind::ShadowedOptional,
                        rule,
                        first,
                        format!(
                            "optional part and the following part both start with '{}'",
                            shared.join("', '")
                        ),
                    )
                    .with_related(vec![next]),
                );
            }
        }
    }

    /// Whether a node can match without consuming input
    fn is_nullable(&mut self, id: NodeId, rules: &mut HashSet<RuleId>) -> bool {
        if let Some(&known) = self.nullable.get(&id) {
            return known;
        }
        let arena = self.arena;
        let children = arena.children(id);
        let result = match &arena.node(id).kind {
            NodeKind::Literal { .. } | NodeKind::VoidRef => false,
            NodeKind::Optional | NodeKind::KleeneStar | NodeKind::NullRef => true,
            NodeKind::Sequence => children.iter().all(|&c| self.is_nullable(c, rules)),
            NodeKind::AlternativeSet { .. } => children.iter().any(|&c| self.is_nullable(c, rules)),
            NodeKind::RequiredGrouping | NodeKind::Repeat => children
                .first()
                .is_some_and(|&c| self.is_nullable(c, rules)),
            NodeKind::NamedRuleRef { .. } | NodeKind::RuleRef { .. } => {
                match arena.reference_target(id) {
                    // A rule already being checked contributes nothing new
                    Some(target) if rules.insert(target) => {
                        let root = arena.rule(target).root();
                        self.is_nullable(root, rules)
                    }
                    _ => false,
                }
            }
        };
        self.nullable.insert(id, result);
        result
    }

    /// Lowercased words a match of `id` can start with
    fn first_words(&mut self, id: NodeId, rules: &mut HashSet<RuleId>) -> HashSet<String> {
        let arena = self.arena;
        let children = arena.children(id);
        match &arena.node(id).kind {
            NodeKind::Literal { text, .. } => text
                .split_whitespace()
                .next()
                .map(|w| w.to_lowercase())
                .into_iter()
                .collect(),
            NodeKind::Sequence => {
                let mut words = HashSet::new();
                for &child in children {
                    words.extend(self.first_words(child, rules));
                    if !self.is_nullable(child, &mut HashSet::new()) {
                        break;
                    }
                }
                words
            }
            NodeKind::AlternativeSet { .. } => children
                .iter()
                .flat_map(|&c| self.first_words(c, rules))
                .collect(),
            NodeKind::Optional
            | NodeKind::RequiredGrouping
            | NodeKind::Repeat
            | NodeKind::KleeneStar => children
                .first()
                .map(|&c| self.first_words(c, rules))
                .unwrap_or_default(),
            NodeKind::NamedRuleRef { .. } | NodeKind::RuleRef { .. } => {
                match arena.reference_target(id) {
                    Some(target) if rules.insert(target) => {
                        let root = arena.rule(target).root();
                        self.first_words(root, rules)
                    }
                    _ => HashSet::new(),
                }
            }
            NodeKind::NullRef | NodeKind::VoidRef => HashSet::new(),
        }
    }

    /// Whether `target` is referenced from a leftmost position below `id`
    fn reaches_rule_leftmost(
        &mut self,
        id: NodeId,
        target: RuleId,
        visited: &mut HashSet<RuleId>,
        path: &mut Vec<NodeId>,
    ) -> bool {
        let arena = self.arena;
        path.push(id);
        let children = arena.children(id);
        let found = match &arena.node(id).kind {
            NodeKind::Sequence | NodeKind::RequiredGrouping => {
                let mut found = false;
                for &child in children {
                    if self.reaches_rule_leftmost(child, target, visited, path) {
                        found = true;
                        break;
                    }
                    if !self.is_nullable(child, &mut HashSet::new()) {
                        break;
                    }
                }
                found
            }
            NodeKind::AlternativeSet { .. } => children
                .iter()
                .any(|&c| self.reaches_rule_leftmost(c, target, visited, path)),
            NodeKind::Optional | NodeKind::Repeat | NodeKind::KleeneStar => children
                .first()
                .is_some_and(|&c| self.reaches_rule_leftmost(c, target, visited, path)),
            NodeKind::NamedRuleRef { .. } | NodeKind::RuleRef { .. } => {
                match arena.reference_target(id) {
                    Some(rule) if rule == target => true,
                    Some(rule) if visited.insert(rule) => {
                        let root = arena.rule(rule).root();
                        self.reaches_rule_leftmost(root, target, visited, path)
                    }
                    _ => false,
                }
            }
            _ => false,
        };
        if !found {
            path.pop();
        }
        found
    }
}

/// Lowercased words of a plain literal alternative
fn literal_words(arena: &ExpansionArena, id: NodeId) -> Option<Vec<String>> {
    arena.node(id).literal_text().map(|text| {
        text.split_whitespace()
            .map(str::to_lowercase)
            .collect()
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::builder::{alt, alt_weighted, kleene, lit, opt, repeat, rule_ref, seq};
    use crate::engine::builder::{GrammarDef, RuleDef};

    fn lint(def: GrammarDef) -> Vec<LintWarning> {
        let mut arena = ExpansionArena::new();
        let grammar = arena.build_grammar(&def).unwrap();
        GrammarLinter::new(&arena, grammar).lint()
    }

    fn kinds(warnings: &[LintWarning]) -> Vec<LintKind> {
        warnings.iter().map(|w| w.kind).collect()
    }

    #[test]
    fn test_clean_grammar() {
        let def = GrammarDef::new("g").rule(RuleDef::new(
            "greet",
            seq([alt([lit("hello"), lit("hi")]), lit("world")]),
        ));
        assert!(lint(def).is_empty());
    }

    #[test]
    fn test_shadowed_optional() {
        let def = GrammarDef::new("g").rule(RuleDef::new(
            "r",
            seq([kleene(lit("very")), lit("Very good")]),
        ));
        let warnings = lint(def);
        assert_eq!(kinds(&warnings), vec![LintKind::ShadowedOptional]);
        assert!(warnings[0].to_string().contains("shadowed optional"));
    }

    #[test]
    fn test_unreachable_alternatives() {
        let def = GrammarDef::new("g").rule(RuleDef::new(
            "r",
            alt([lit("turn"), lit("turn on"), opt(lit("x")), lit("y")]),
        ));
        let warnings = lint(def);
        assert_eq!(
            kinds(&warnings),
            vec![LintKind::UnreachableAlternative, LintKind::UnreachableAlternative]
        );
    }

    #[test]
    fn test_weights() {
        let def = GrammarDef::new("g").rule(RuleDef::new(
            "r",
            alt_weighted([(lit("a"), 1.0), (lit("b"), 0.0)]),
        ));
        assert_eq!(kinds(&lint(def)), vec![LintKind::ZeroWeightAlternative]);
    }

    #[test]
    fn test_references() {
        let def = GrammarDef::new("g")
            .rule(RuleDef::new("a", seq([rule_ref("b"), lit("x")])))
            .rule(RuleDef::new("b", alt([rule_ref("a"), rule_ref("missing")])));
        let warnings = lint(def);
        let found = kinds(&warnings);
        assert!(found.contains(&LintKind::UnresolvedReference));
        assert_eq!(
            found.iter().filter(|k| **k == LintKind::LeftRecursion).count(),
            2
        );
    }

    #[test]
    fn test_nested_repetition() {
        let def = GrammarDef::new("g").rule(RuleDef::new("r", repeat(kleene(lit("x")))));
        assert_eq!(kinds(&lint(def)), vec![LintKind::NestedRepetition]);
    }
}
