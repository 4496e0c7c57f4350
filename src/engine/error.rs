//! Error type for expansion trees, rules and grammars
//!
//! "Did not match" is never an error: matching operations return `Ok(false)`
//! or `Ok(None)` for that. An [`ExpansionError`] means the operation could not
//! be attempted at all.

use super::arena::{NodeId, RuleId};
use std::fmt;

/// Error type for tree mutation, matcher compilation and grammar operations
#[derive(Debug, Clone, PartialEq)]
pub enum ExpansionError {
    /// Invalid child arity or ownership on construction or mutation
    Structural {
        /// Node the mutation was applied to, if known
        node: Option<NodeId>,
        /// Why the mutation was rejected
        reason: String,
    },

    /// A rule reference could not be resolved when its matcher was built
    ReferenceResolution {
        /// The referenced rule name
        name: String,
        /// Why resolution failed
        reason: String,
    },

    /// Negative weight, weight for a non-child, or a partially weighted set
    Weight {
        /// The alternative set involved
        node: NodeId,
        /// Description of the problem
        reason: String,
    },

    /// Node state that cannot be turned into a matcher (e.g. empty literal)
    Compilation {
        /// The node that failed to compile
        node: NodeId,
        /// Description of the problem
        reason: String,
    },

    /// Duplicate rule name, removal of a rule with live dependents, or a
    /// reserved rule name
    GrammarIntegrity {
        /// The rule involved, if any
        rule: Option<RuleId>,
        /// Description of the problem
        reason: String,
    },

    /// Too many nested rule references while matching
    RecursionLimitExceeded {
        /// Depth reached
        depth: usize,
        /// Configured maximum
        max_depth: usize,
    },

    /// Malformed interchange definition (e.g. invalid JSON)
    InvalidDefinition {
        /// Description of the problem
        reason: String,
    },
}

impl ExpansionError {
    #[inline]
    pub(crate) fn structural(node: impl Into<Option<NodeId>>, reason: impl Into<String>) -> Self {
        ExpansionError::Structural {
            node: node.into(),
            reason: reason.into(),
        }
    }

    #[inline]
    pub(crate) fn integrity(rule: impl Into<Option<RuleId>>, reason: impl Into<String>) -> Self {
        ExpansionError::GrammarIntegrity {
            rule: rule.into(),
            reason: reason.into(),
        }
    }

    #[inline]
    pub(crate) fn unresolved(name: &str, reason: impl Into<String>) -> Self {
        ExpansionError::ReferenceResolution {
            name: name.to_string(),
            reason: reason.into(),
        }
    }

    /// Whether this error came from a reference that could not be resolved
    pub fn is_reference_error(&self) -> bool {
        matches!(self, ExpansionError::ReferenceResolution { .. })
    }
}

impl fmt::Display for ExpansionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExpansionError::Structural {
                node: Some(node),
                reason,
            } => write!(f, "Structural error at node {}: {}", node, reason),
            ExpansionError::Structural { node: None, reason } => {
                write!(f, "Structural error: {}", reason)
            }
            ExpansionError::ReferenceResolution { name, reason } => {
                write!(f, "Cannot resolve rule reference <{}>: {}", name, reason)
            }
            ExpansionError::Weight { node, reason } => {
                write!(f, "Invalid weights on alternative set {}: {}", node, reason)
            }
            ExpansionError::Compilation { node, reason } => {
                write!(f, "Cannot compile node {}: {}", node, reason)
            }
            ExpansionError::GrammarIntegrity {
                rule: Some(rule),
                reason,
            } => write!(f, "Grammar integrity error for rule {}: {}", rule, reason),
            ExpansionError::GrammarIntegrity { rule: None, reason } => {
                write!(f, "Grammar integrity error: {}", reason)
            }
            ExpansionError::RecursionLimitExceeded { depth, max_depth } => write!(
                f,
                "Rule reference depth {} exceeds maximum {}",
                depth, max_depth
            ),
            ExpansionError::InvalidDefinition { reason } => {
                write!(f, "Invalid expansion definition: {}", reason)
            }
        }
    }
}

impl std::error::Error for ExpansionError {}

impl From<serde_json::Error> for ExpansionError {
    fn from(err: serde_json::Error) -> Self {
        ExpansionError::InvalidDefinition {
            reason: err.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_variants() {
        let err = ExpansionError::structural(NodeId::new(3), "optional needs one child");
        assert_eq!(
            err.to_string(),
            "Structural error at node #3: optional needs one child"
        );

        let err = ExpansionError::unresolved("greet", "no rule with that name");
        assert!(err.is_reference_error());
        assert!(err.to_string().contains("<greet>"));

        let err = ExpansionError::RecursionLimitExceeded {
            depth: 11,
            max_depth: 10,
        };
        assert!(err.to_string().contains("exceeds maximum 10"));
    }

    #[test]
    fn test_from_json_error() {
        let json_err = serde_json::from_str::<u32>("not json").unwrap_err();
        let err: ExpansionError = json_err.into();
        assert!(matches!(err, ExpansionError::InvalidDefinition { .. }));
    }
}
