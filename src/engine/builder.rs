//! Interchange definitions for expansion trees, rules and grammars
//!
//! Trees arrive from a grammar parser either through the arena constructors
//! or as serde values. The DSL functions build those values in code:
//!
//! ```
//! use jsgf_match::builder::{alt, lit, rule_ref, seq};
//! use jsgf_match::{ExpansionArena, GrammarDef, RuleDef};
//!
//! let def = GrammarDef::new("greetings")
//!     .rule(RuleDef::new("greet", seq([alt([lit("hello"), lit("hi")]), lit("world")])))
//!     .rule(RuleDef::new("polite", seq([rule_ref("greet"), lit("please")])));
//!
//! let mut arena = ExpansionArena::new();
//! let grammar = arena.build_grammar(&def).unwrap();
//! let greet = arena.get_rule_by_name(grammar, "greet").unwrap();
//! assert!(arena.matches(greet, "hi world").unwrap());
//! ```
//!
//! Match state and compiled matchers are never part of a definition.

use super::arena::{ExpansionArena, GrammarId, NodeId, RuleId};
use super::error::ExpansionError;
use super::node::NodeKind;
use serde::{Deserialize, Serialize};

/// Kind of a node definition, with its payload
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum DefKind {
    /// Word sequence
    Literal {
        /// Text to match
        text: String,
        /// Whether matching respects case
        #[serde(default)]
        case_sensitive: bool,
    },
    /// Ordered conjunction
    Sequence,
    /// Disjunction
    Alternatives,
    /// Zero or one
    Optional,
    /// Parenthesised grouping
    RequiredGrouping,
    /// One or more
    Repeat,
    /// Zero or more
    KleeneStar,
    /// Reference by rule name, resolved through the grammar
    RuleRef {
        /// Referenced rule name
        name: String,
    },
    /// Reference to an existing rule object
    RuleObject {
        /// `grammar.rule`, or a rule name unique in the arena
        rule: String,
    },
    /// `<NULL>`
    Null,
    /// `<VOID>`
    Void,
}

/// Definition of one node and its subtree
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExpansionDef {
    /// Node kind
    pub kind: DefKind,
    /// Child definitions
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<ExpansionDef>,
    /// Tag annotation
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tag: Option<String>,
    /// Weight per child for alternatives; `None` entries are unweighted
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub weights: Option<Vec<Option<f64>>>,
}

impl ExpansionDef {
    fn new(kind: DefKind, children: Vec<ExpansionDef>) -> Self {
        Self {
            kind,
            children,
            tag: None,
            weights: None,
        }
    }

    /// Attach a tag
    pub fn tagged(mut self, tag: &str) -> Self {
        self.tag = Some(tag.to_string());
        self
    }

    /// Make a literal case-sensitive; other kinds are unchanged
    pub fn case_sensitive(mut self) -> Self {
        if let DefKind::Literal { case_sensitive, .. } = &mut self.kind {
            *case_sensitive = true;
        }
        self
    }

    /// Weight every child, in order
    pub fn weighted(mut self, weights: impl IntoIterator<Item = f64>) -> Self {
        self.weights = Some(weights.into_iter().map(Some).collect());
        self
    }
}

/// Case-insensitive literal
pub fn lit(text: &str) -> ExpansionDef {
    ExpansionDef::new(
        DefKind::Literal {
            text: text.to_string(),
            case_sensitive: false,
        },
        Vec::new(),
    )
}

/// Sequence of definitions
pub fn seq(children: impl IntoIterator<Item = ExpansionDef>) -> ExpansionDef {
    ExpansionDef::new(DefKind::Sequence, children.into_iter().collect())
}

/// Unweighted alternatives
pub fn alt(children: impl IntoIterator<Item = ExpansionDef>) -> ExpansionDef {
    ExpansionDef::new(DefKind::Alternatives, children.into_iter().collect())
}

/// Weighted alternatives
pub fn alt_weighted(children: impl IntoIterator<Item = (ExpansionDef, f64)>) -> ExpansionDef {
    let (children, weights): (Vec<_>, Vec<_>) = children.into_iter().unzip();
    alt(children).weighted(weights)
}

/// Optional
pub fn opt(child: ExpansionDef) -> ExpansionDef {
    ExpansionDef::new(DefKind::Optional, vec![child])
}

/// Required grouping
pub fn group(child: ExpansionDef) -> ExpansionDef {
    ExpansionDef::new(DefKind::RequiredGrouping, vec![child])
}

/// One or more
pub fn repeat(child: ExpansionDef) -> ExpansionDef {
    ExpansionDef::new(DefKind::Repeat, vec![child])
}

/// Zero or more
pub fn kleene(child: ExpansionDef) -> ExpansionDef {
    ExpansionDef::new(DefKind::KleeneStar, vec![child])
}

/// Reference by name
pub fn rule_ref(name: &str) -> ExpansionDef {
    ExpansionDef::new(
        DefKind::RuleRef {
            name: name.to_string(),
        },
        Vec::new(),
    )
}

/// Reference to an existing rule object
pub fn rule_object(rule: &str) -> ExpansionDef {
    ExpansionDef::new(
        DefKind::RuleObject {
            rule: rule.to_string(),
        },
        Vec::new(),
    )
}

/// `<NULL>`
pub fn null() -> ExpansionDef {
    ExpansionDef::new(DefKind::Null, Vec::new())
}

/// `<VOID>`
pub fn void() -> ExpansionDef {
    ExpansionDef::new(DefKind::Void, Vec::new())
}

fn default_visible() -> bool {
    true
}

/// Definition of a rule
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuleDef {
    /// Rule name
    pub name: String,
    /// Whether the rule is public
    #[serde(default = "default_visible")]
    pub visible: bool,
    /// The rule's tree
    pub expansion: ExpansionDef,
}

impl RuleDef {
    /// A visible rule
    pub fn new(name: &str, expansion: ExpansionDef) -> Self {
        Self {
            name: name.to_string(),
            visible: true,
            expansion,
        }
    }

    /// A hidden rule
    pub fn hidden(name: &str, expansion: ExpansionDef) -> Self {
        Self {
            visible: false,
            ..Self::new(name, expansion)
        }
    }
}

/// Definition of a grammar
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct GrammarDef {
    /// Grammar name
    pub name: String,
    /// Rules in insertion order
    #[serde(default)]
    pub rules: Vec<RuleDef>,
}

impl GrammarDef {
    /// An empty grammar definition
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            rules: Vec::new(),
        }
    }

    /// Append a rule
    pub fn rule(mut self, rule: RuleDef) -> Self {
        self.rules.push(rule);
        self
    }

    /// Serialize to JSON
    #[inline]
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Deserialize from JSON
    #[inline]
    pub fn from_json(s: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(s)
    }
}

impl ExpansionArena {
    /// Materialize a definition as a new detached tree
    ///
    /// # Errors
    /// Structural errors for arity violations, [`ExpansionError::Weight`] for
    /// invalid weights and [`ExpansionError::InvalidDefinition`] for weight
    /// lists of the wrong length or unknown rule objects.
    pub fn build(&mut self, def: &ExpansionDef) -> Result<NodeId, ExpansionError> {
        let children = def
            .children
            .iter()
            .map(|child| self.build(child))
            .collect::<Result<Vec<_>, _>>()?;

        let id = match &def.kind {
            DefKind::Literal {
                text,
                case_sensitive,
            } => {
                let id = self.new_literal_with_case(text, *case_sensitive);
                self.leaf(id, &children)?
            }
            DefKind::Sequence => self.new_sequence(children.clone())?,
            DefKind::Alternatives => self.new_alternatives(children.clone())?,
            DefKind::Optional => self.new_node(NodeKind::Optional, children.clone())?,
            DefKind::RequiredGrouping => self.new_node(NodeKind::RequiredGrouping, children.clone())?,
            DefKind::Repeat => self.new_node(NodeKind::Repeat, children.clone())?,
            DefKind::KleeneStar => self.new_node(NodeKind::KleeneStar, children.clone())?,
            DefKind::RuleRef { name } => {
                let id = self.new_rule_ref(name);
                self.leaf(id, &children)?
            }
            DefKind::RuleObject { rule } => {
                let rule = self.find_rule_qualified(rule)?;
                let id = self.new_rule_object_ref(rule)?;
                self.leaf(id, &children)?
            }
            DefKind::Null => {
                let id = self.new_null_ref();
                self.leaf(id, &children)?
            }
            DefKind::Void => {
                let id = self.new_void_ref();
                self.leaf(id, &children)?
            }
        };

        self.set_tag(id, def.tag.as_deref())?;
        if let Some(weights) = &def.weights {
            if weights.len() != children.len() {
                return Err(ExpansionError::InvalidDefinition {
                    reason: format!(
                        "{} weights given for {} alternatives",
                        weights.len(),
                        children.len()
                    ),
                });
            }
            let pairs: Vec<(NodeId, f64)> = children
                .iter()
                .zip(weights)
                .filter_map(|(child, w)| w.map(|w| (*child, w)))
                .collect();
            self.set_weights(id, &pairs)?;
        }
        Ok(id)
    }

    fn leaf(&self, id: NodeId, children: &[NodeId]) -> Result<NodeId, ExpansionError> {
        if children.is_empty() {
            Ok(id)
        } else {
            Err(ExpansionError::structural(
                id,
                format!("{} cannot have children", self.node(id).kind.name()),
            ))
        }
    }

    /// Find a rule by `grammar.rule`, or by a name unique in the arena
    fn find_rule_qualified(&self, name: &str) -> Result<RuleId, ExpansionError> {
        let candidates: Vec<RuleId> = (0..self.rules.len())
            .map(|i| RuleId::new(i as u32))
            .filter(|&r| {
                if name.contains('.') {
                    self.fully_qualified_name(r) == name
                } else {
                    self.rules[r.index()].name == name
                }
            })
            .collect();
        match candidates.as_slice() {
            [rule] => Ok(*rule),
            [] => Err(ExpansionError::InvalidDefinition {
                reason: format!("no rule '{}' to reference", name),
            }),
            _ => Err(ExpansionError::InvalidDefinition {
                reason: format!("rule name '{}' is ambiguous; qualify it with the grammar", name),
            }),
        }
    }

    /// Materialize a rule definition
    pub fn build_rule(&mut self, def: &RuleDef) -> Result<RuleId, ExpansionError> {
        let root = self.build(&def.expansion)?;
        self.new_rule(&def.name, def.visible, root)
    }

    /// Materialize a grammar definition with all its rules
    ///
    /// Rule objects may refer to rules defined earlier in the same grammar.
    pub fn build_grammar(&mut self, def: &GrammarDef) -> Result<GrammarId, ExpansionError> {
        let grammar = self.new_grammar(&def.name);
        for rule_def in &def.rules {
            let rule = self.build_rule(rule_def)?;
            self.add_rule(grammar, rule)?;
        }
        Ok(grammar)
    }

    /// Parse a JSON grammar definition and materialize it
    pub fn load_grammar_json(&mut self, json: &str) -> Result<GrammarId, ExpansionError> {
        let def = GrammarDef::from_json(json)?;
        self.build_grammar(&def)
    }

    /// Export a tree as a definition
    pub fn to_def(&self, id: NodeId) -> ExpansionDef {
        let node = self.node(id);
        let kind = match &node.kind {
            NodeKind::Literal {
                text,
                case_sensitive,
            } => DefKind::Literal {
                text: text.clone(),
                case_sensitive: *case_sensitive,
            },
            NodeKind::Sequence => DefKind::Sequence,
            NodeKind::AlternativeSet { .. } => DefKind::Alternatives,
            NodeKind::Optional => DefKind::Optional,
            NodeKind::RequiredGrouping => DefKind::RequiredGrouping,
            NodeKind::Repeat => DefKind::Repeat,
            NodeKind::KleeneStar => DefKind::KleeneStar,
            NodeKind::NamedRuleRef { name } => DefKind::RuleRef { name: name.clone() },
            NodeKind::RuleRef { rule } => DefKind::RuleObject {
                rule: self.fully_qualified_name(*rule),
            },
            NodeKind::NullRef => DefKind::Null,
            NodeKind::VoidRef => DefKind::Void,
        };
        let weights = match &node.kind {
            NodeKind::AlternativeSet { weights } if !weights.is_empty() => Some(
                node.children
                    .iter()
                    .map(|c| weights.get(c).copied())
                    .collect(),
            ),
            _ => None,
        };
        ExpansionDef {
            kind,
            children: node.children.iter().map(|&c| self.to_def(c)).collect(),
            tag: node.tag.clone(),
            weights,
        }
    }

    /// Export a rule as a definition
    pub fn rule_def(&self, rule: RuleId) -> RuleDef {
        let r = self.rule(rule);
        RuleDef {
            name: r.name.clone(),
            visible: r.visible,
            expansion: self.to_def(r.root),
        }
    }

    /// Export a grammar as a definition
    pub fn grammar_def(&self, grammar: GrammarId) -> GrammarDef {
        let g = self.grammar(grammar);
        GrammarDef {
            name: g.name.clone(),
            rules: g.rules.iter().map(|&r| self.rule_def(r)).collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_tree() {
        let mut arena = ExpansionArena::new();
        let def = seq([opt(lit("please")), lit("Go").case_sensitive().tagged("verb")]);
        let root = arena.build(&def).unwrap();

        let children = arena.children(root).to_vec();
        assert_eq!(children.len(), 2);
        assert_eq!(arena.kind(children[0]), &NodeKind::Optional);
        assert_eq!(arena.node(children[1]).tag(), Some("verb"));
        assert_eq!(
            arena.kind(children[1]),
            &NodeKind::Literal {
                text: "Go".to_string(),
                case_sensitive: true
            }
        );
    }

    #[test]
    fn test_build_weighted() {
        let mut arena = ExpansionArena::new();
        let def = alt_weighted([(lit("a"), 1.0), (lit("b"), 0.0)]);
        let root = arena.build(&def).unwrap();
        let b = arena.children(root)[1];
        assert_eq!(arena.weight(root, b), Some(0.0));

        let bad = alt([lit("a"), lit("b")]).weighted([1.0]);
        let err = arena.build(&bad).unwrap_err();
        assert!(matches!(err, ExpansionError::InvalidDefinition { .. }));
    }

    #[test]
    fn test_build_arity_errors() {
        let mut arena = ExpansionArena::new();
        let mut bad = opt(lit("a"));
        bad.children.push(lit("b"));
        assert!(matches!(
            arena.build(&bad),
            Err(ExpansionError::Structural { .. })
        ));
        assert!(arena.build(&seq(Vec::new())).is_err());
    }

    #[test]
    fn test_export_matches_import() {
        let mut arena = ExpansionArena::new();
        let def = alt([lit("x"), kleene(group(lit("y"))).tagged("ys"), null(), void()])
            .weighted([2.0, 1.0, 1.0, 0.0]);
        let root = arena.build(&def).unwrap();
        assert_eq!(arena.to_def(root), def);
    }

    #[test]
    fn test_rule_object_resolution() {
        let mut arena = ExpansionArena::new();
        let def = GrammarDef::new("g")
            .rule(RuleDef::hidden("n", alt([lit("one"), lit("two")])))
            .rule(RuleDef::new("r", seq([lit("go"), rule_object("g.n")])));
        let g = arena.build_grammar(&def).unwrap();
        let r = arena.get_rule_by_name(g, "r").unwrap();
        assert!(arena.matches(r, "go two").unwrap());

        let missing = seq([rule_object("nowhere")]);
        assert!(arena.build(&missing).is_err());
    }
}
