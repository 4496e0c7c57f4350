//! The speech-matching interpreter
//!
//! Matching is PEG style: greedy, with ordered choice and no backtracking
//! into an alternative once it has matched. Whitespace is skipped before each
//! node, and literals only match whole words.
//!
//! Results are recorded on the nodes themselves (`current_match` and
//! `matching_slice`). After the root has run, a cleanup pass strips every
//! match that did not contribute to the final result, so a failed attempt
//! never leaves partial credit behind.

use super::arena::{ExpansionArena, NodeId, RuleId};
use super::error::ExpansionError;
use super::history::Snapshot;
use super::matcher::Matcher;
use super::node::NodeKind;
use super::visitor::TraverseOrder;
use hashbrown::HashSet;
use std::ops::Range;

/// Default maximum number of nested rule references while matching
pub const DEFAULT_MAX_RECURSION_DEPTH: usize = 256;

/// Configuration for matching
///
/// # Example
///
/// ```
/// use jsgf_match::MatchConfig;
///
/// let config = MatchConfig::new()
///     .with_max_recursion_depth(32)
///     .with_lowercase_input(true);
/// assert!(config.trim_input);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchConfig {
    /// Maximum nested rule references (0 = unlimited)
    pub max_recursion_depth: usize,

    /// Trim leading and trailing whitespace from input
    pub trim_input: bool,

    /// Lowercase input before matching
    pub lowercase_input: bool,
}

impl Default for MatchConfig {
    fn default() -> Self {
        Self {
            max_recursion_depth: DEFAULT_MAX_RECURSION_DEPTH,
            trim_input: true,
            lowercase_input: false,
        }
    }
}

impl MatchConfig {
    /// Create a config with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the maximum reference depth
    pub fn with_max_recursion_depth(mut self, depth: usize) -> Self {
        self.max_recursion_depth = depth;
        self
    }

    /// Set whether input is trimmed
    pub fn with_trim_input(mut self, trim: bool) -> Self {
        self.trim_input = trim;
        self
    }

    /// Set whether input is lowercased
    pub fn with_lowercase_input(mut self, lowercase: bool) -> Self {
        self.lowercase_input = lowercase;
        self
    }

    fn normalize(&self, text: &str) -> String {
        let text = if self.trim_input { text.trim() } else { text };
        if self.lowercase_input {
            text.to_lowercase()
        } else {
            text.to_string()
        }
    }
}

/// A substring found by [`ExpansionArena::find_matching_part`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchedSpan {
    /// Byte range in the normalized input
    pub range: Range<usize>,
    /// The matched text
    pub text: String,
}

#[inline]
fn skip_whitespace(input: &str, pos: usize) -> usize {
    input[pos..]
        .char_indices()
        .find(|(_, c)| !c.is_whitespace())
        .map_or(input.len(), |(i, _)| pos + i)
}

#[inline]
fn at_word_boundary(input: &str, pos: usize) -> bool {
    input[pos..].chars().next().map_or(true, char::is_whitespace)
}

/// Byte offsets where words start, in order
fn word_starts(input: &str) -> Vec<usize> {
    let mut separators: Vec<usize> = if input.is_ascii() {
        let bytes = input.as_bytes();
        memchr::memchr3_iter(b' ', b'\t', b'\n', bytes)
            .chain(memchr::memchr3_iter(b'\r', b'\x0b', b'\x0c', bytes))
            .collect()
    } else {
        input
            .char_indices()
            .filter(|(_, c)| c.is_whitespace())
            .map(|(i, _)| i)
            .collect()
    };
    separators.sort_unstable();

    let mut starts = vec![skip_whitespace(input, 0)];
    for sep in separators {
        let start = skip_whitespace(input, sep);
        if starts.last() != Some(&start) {
            starts.push(start);
        }
    }
    starts
}

impl ExpansionArena {
    /// Match `text` against a rule, requiring the whole input to match
    ///
    /// Returns `Ok(false)` when the text does not match, including when the
    /// rule is disabled. Errors mean matching could not be attempted.
    ///
    /// # Errors
    /// Compilation errors of any reachable node, unresolvable references and
    /// [`ExpansionError::RecursionLimitExceeded`]. Match state is reset when
    /// an error is returned.
    pub fn matches(&mut self, rule: RuleId, text: &str) -> Result<bool, ExpansionError> {
        self.check_rule(rule)?;
        let root = self.rules[rule.index()].root;
        let input = self.config.normalize(text);
        self.reset_tree(root);

        if !self.rules[rule.index()].active {
            log_debug!("Rule '{}' is disabled", self.rules[rule.index()].name);
            self.rules[rule.index()].last_input = Some(input);
            return Ok(false);
        }

        log_debug!(
            "Matching rule '{}' against {:?}",
            self.rules[rule.index()].name,
            input
        );
        let result = match self.match_root(root, &input, 0) {
            Ok(result) => result,
            Err(err) => {
                self.reset_tree(root);
                return Err(err);
            }
        };

        let matched = result.is_some_and(|end| skip_whitespace(&input, end) == input.len());
        if !matched {
            self.node_mut(root).clear_match();
        }
        self.strip_unmatched(root);
        log_debug!("Rule '{}' matched: {}", self.rules[rule.index()].name, matched);
        self.rules[rule.index()].last_input = Some(input);
        Ok(matched)
    }

    /// Find the left-most word-aligned substring of `text` the rule matches
    ///
    /// Each word start is tried in turn; the first non-empty match wins. Node
    /// match state reflects the returned span afterwards.
    pub fn find_matching_part(
        &mut self,
        rule: RuleId,
        text: &str,
    ) -> Result<Option<MatchedSpan>, ExpansionError> {
        self.check_rule(rule)?;
        let root = self.rules[rule.index()].root;
        let input = self.config.normalize(text);
        self.reset_tree(root);

        if !self.rules[rule.index()].active {
            self.rules[rule.index()].last_input = Some(input);
            return Ok(None);
        }

        let mut found = None;
        for start in word_starts(&input) {
            if start >= input.len() {
                break;
            }
            match self.match_root(root, &input, start) {
                Ok(Some(end)) if end > start => {
                    found = Some(start..end);
                    break;
                }
                Ok(_) => self.reset_tree(root),
                Err(err) => {
                    self.reset_tree(root);
                    return Err(err);
                }
            }
        }

        let span = found.map(|range| MatchedSpan {
            text: input[range.clone()].to_string(),
            range,
        });
        if span.is_some() {
            self.strip_unmatched(root);
        }
        self.rules[rule.index()].last_input = Some(input);
        Ok(span)
    }

    /// The slice of the last input covered by the rule's root
    pub fn matched_text(&self, rule: RuleId) -> Option<&str> {
        let rule = self.get_rule(rule)?;
        let input = rule.last_input.as_deref()?;
        let slice = self.node(rule.root).matching_slice.clone()?;
        input.get(slice)
    }

    /// Clear match state on the rule's tree and every tree it references
    pub fn reset_match(&mut self, rule: RuleId) -> Result<(), ExpansionError> {
        self.check_rule(rule)?;
        let root = self.rules[rule.index()].root;
        self.reset_tree(root);
        Ok(())
    }

    fn reset_tree(&mut self, root: NodeId) {
        for id in self.walk(root, TraverseOrder::PreOrder, true) {
            self.node_mut(id).clear_match();
        }
    }

    fn match_root(
        &mut self,
        root: NodeId,
        input: &str,
        pos: usize,
    ) -> Result<Option<usize>, ExpansionError> {
        self.matcher_for(root)?;
        self.match_node(root, input, pos, 0)
    }

    /// Match one node at `pos`, recording the result on the node
    ///
    /// Returns the end of the match. `depth` counts rule references crossed.
    fn match_node(
        &mut self,
        id: NodeId,
        input: &str,
        pos: usize,
        depth: usize,
    ) -> Result<Option<usize>, ExpansionError> {
        let matcher = self.matcher_for(id)?;
        let start = skip_whitespace(input, pos);

        let result = match &*matcher {
            Matcher::Literal(regex) => regex
                .find(&input[start..])
                .map(|m| start + m.end())
                .filter(|&end| at_word_boundary(input, end)),
            Matcher::Sequence(children) => {
                let mut cur = pos;
                let mut complete = true;
                for &child in children {
                    match self.match_node(child, input, cur, depth)? {
                        Some(end) => cur = end,
                        None => {
                            complete = false;
                            break;
                        }
                    }
                }
                complete.then_some(cur)
            }
            Matcher::Choice(children) => {
                let mut found = None;
                for &child in children {
                    if let Some(end) = self.match_node(child, input, pos, depth)? {
                        found = Some(end);
                        break;
                    }
                }
                found
            }
            Matcher::Optional(child) => {
                Some(self.match_node(*child, input, pos, depth)?.unwrap_or(pos))
            }
            Matcher::Repeat {
                child,
                at_least_one,
            } => self.match_repetition(id, *child, *at_least_one, input, pos, depth)?,
            Matcher::Reference(target) => {
                let max_depth = self.config.max_recursion_depth;
                if max_depth > 0 && depth >= max_depth {
                    return Err(ExpansionError::RecursionLimitExceeded {
                        depth: depth + 1,
                        max_depth,
                    });
                }
                self.match_node(*target, input, pos, depth + 1)?
            }
            Matcher::Disabled | Matcher::Void => None,
            Matcher::Null => Some(pos),
        };

        self.record(id, input, start, result);
        Ok(result)
    }

    fn match_repetition(
        &mut self,
        id: NodeId,
        child: NodeId,
        at_least_one: bool,
        input: &str,
        pos: usize,
        depth: usize,
    ) -> Result<Option<usize>, ExpansionError> {
        let once = self.is_degenerate_repetition(id);
        self.node_mut(id).history.clear();

        let mut cur = pos;
        let mut last: Option<Snapshot> = None;
        while let Some(end) = self.match_node(child, input, cur, depth)? {
            let zero_width = end <= cur;
            if zero_width && (last.is_some() || !at_least_one) {
                break;
            }
            self.strip_unmatched(child);
            let snapshot = self.take_snapshot(id);
            self.node_mut(id).history.push(snapshot.clone());
            last = Some(snapshot);
            cur = end;
            if once || zero_width {
                break;
            }
            self.reset_descendants(id);
        }

        match &last {
            Some(snapshot) => self.restore_snapshot(snapshot),
            None => self.reset_descendants(id),
        }
        if at_least_one && last.is_none() {
            Ok(None)
        } else {
            Ok(Some(cur))
        }
    }

    /// Whether the nearest repetition above `id` is reached through
    /// single-child links only, making this repetition meaningless
    pub(crate) fn is_degenerate_repetition(&self, id: NodeId) -> bool {
        for ancestor in self.ancestors(id) {
            let node = self.node(ancestor);
            if node.children.len() != 1 {
                return false;
            }
            if node.kind.carries_history() {
                return true;
            }
        }
        false
    }

    fn record(&mut self, id: NodeId, input: &str, start: usize, result: Option<usize>) {
        let keep_empty = matches!(self.node(id).kind, NodeKind::NullRef)
            || self.is_optional_in_context(id);
        let node = self.node_mut(id);
        match result {
            Some(end) if end > start => {
                node.current_match = Some(input[start..end].to_string());
                node.matching_slice = Some(start..end);
            }
            Some(_) if keep_empty => {
                node.current_match = Some(String::new());
                node.matching_slice = None;
            }
            _ => {
                node.current_match = None;
                node.matching_slice = None;
            }
        }
    }

    /// Strip matches that did not contribute to their parent's match
    ///
    /// A node keeps its match only if it is reachable from `root` through
    /// nodes that all contributed to their parents. A reference's target root
    /// counts as a child of every reference resolving to it, so a rule used
    /// twice keeps the state of whichever use covers it.
    pub(crate) fn strip_unmatched(&mut self, root: NodeId) {
        let own_rule = self.owning_rule_of(root);
        let kept = self.logical_closure(root, own_rule, |arena, parent, child| {
            arena.contributes(parent, child)
        });
        let reached = self.logical_closure(root, own_rule, |_, _, _| true);
        for id in reached {
            if !kept.contains(&id) {
                self.node_mut(id).clear_match();
            }
        }
    }

    fn logical_closure<F>(
        &self,
        root: NodeId,
        own_rule: Option<RuleId>,
        mut follow: F,
    ) -> HashSet<NodeId>
    where
        F: FnMut(&ExpansionArena, NodeId, NodeId) -> bool,
    {
        let mut reached = HashSet::new();
        reached.insert(root);
        let mut stack = vec![root];
        while let Some(id) = stack.pop() {
            for child in self.match_logical_children(id, own_rule) {
                if !reached.contains(&child) && follow(self, id, child) {
                    reached.insert(child);
                    stack.push(child);
                }
            }
        }
        reached
    }

    fn match_logical_children(&self, id: NodeId, own_rule: Option<RuleId>) -> Vec<NodeId> {
        let node = self.node(id);
        let mut children = node.children.clone();
        if node.kind.is_rule_reference() {
            if let Some(rule) = self.reference_target(id) {
                if Some(rule) != own_rule {
                    children.push(self.rules[rule.index()].root);
                }
            }
        }
        children
    }

    fn contributes(&self, parent: NodeId, id: NodeId) -> bool {
        let parent = self.node(parent);
        let node = self.node(id);
        let Some(parent_match) = parent.current_match.as_deref() else {
            return false;
        };
        if parent_match.is_empty() && node.has_text_match() {
            return false;
        }
        match (&parent.matching_slice, &node.matching_slice) {
            (Some(outer), Some(inner)) => outer.start <= inner.start && inner.end <= outer.end,
            _ => true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_word_starts_after_any_whitespace() {
        assert_eq!(word_starts("a b\tc"), vec![0, 2, 4]);
        assert_eq!(word_starts("one\rtwo\x0cthree"), vec![0, 4, 8]);
        assert_eq!(word_starts("eins\u{a0}zwei"), vec![0, 6]);
        assert_eq!(word_starts("  a  "), vec![2, 5]);
    }

    fn rule_of(arena: &mut ExpansionArena, root: NodeId) -> RuleId {
        arena.new_rule("test", true, root).unwrap()
    }

    #[test]
    fn test_literal_word_boundaries() {
        let mut arena = ExpansionArena::new();
        let lit = arena.new_literal("hello world");
        let rule = rule_of(&mut arena, lit);

        assert!(arena.matches(rule, "hello world").unwrap());
        assert!(arena.matches(rule, "  HELLO   world ").unwrap());
        assert_eq!(arena.current_match(lit), Some("HELLO   world"));
        assert!(!arena.matches(rule, "hello worlds").unwrap());
        assert!(!arena.matches(rule, "hello").unwrap());
    }

    #[test]
    fn test_case_sensitive_literal() {
        let mut arena = ExpansionArena::new();
        let lit = arena.new_literal_with_case("Hello", true);
        let rule = rule_of(&mut arena, lit);
        assert!(arena.matches(rule, "Hello").unwrap());
        assert!(!arena.matches(rule, "hello").unwrap());
    }

    #[test]
    fn test_optional_normalization() {
        let mut arena = ExpansionArena::new();
        let please = arena.new_literal("please");
        let opt = arena.new_optional(please).unwrap();
        let go = arena.new_literal("go");
        let seq = arena.new_sequence(vec![go, opt]).unwrap();
        let rule = rule_of(&mut arena, seq);

        assert!(arena.matches(rule, "go").unwrap());
        assert_eq!(arena.current_match(opt), Some(""));
        assert_eq!(arena.current_match(please), None);

        assert!(arena.matches(rule, "go please").unwrap());
        assert_eq!(arena.current_match(opt), Some("please"));
        assert_eq!(arena.node(please).matching_slice(), Some(3..9));
    }

    #[test]
    fn test_no_partial_credit() {
        let mut arena = ExpansionArena::new();
        let a = arena.new_literal("a");
        let b = arena.new_literal("b");
        let seq = arena.new_sequence(vec![a, b]).unwrap();
        let rule = rule_of(&mut arena, seq);

        assert!(!arena.matches(rule, "a c").unwrap());
        assert_eq!(arena.current_match(a), None);
        assert_eq!(arena.current_match(seq), None);

        // Trailing input is a failure too
        assert!(!arena.matches(rule, "a b c").unwrap());
        assert_eq!(arena.current_match(a), None);
        assert_eq!(arena.current_match(b), None);
    }

    #[test]
    fn test_ambiguous_optional_fails_deterministically() {
        let mut arena = ExpansionArena::new();
        let x1 = arena.new_literal("x");
        let opt = arena.new_optional(x1).unwrap();
        let x2 = arena.new_literal("x");
        let seq = arena.new_sequence(vec![opt, x2]).unwrap();
        let rule = rule_of(&mut arena, seq);

        assert!(!arena.matches(rule, "x").unwrap());
        assert!(!arena.matches(rule, "x").unwrap());
        assert!(arena.matches(rule, "x x").unwrap());
    }

    #[test]
    fn test_repeat_snapshots() {
        let mut arena = ExpansionArena::new();
        let x = arena.new_literal("x");
        let rep = arena.new_repeat(x).unwrap();
        let rule = rule_of(&mut arena, rep);

        assert!(arena.matches(rule, "x x x").unwrap());
        assert_eq!(arena.get_matches(rep, x), vec![Some("x".to_string()); 3]);
        assert_eq!(
            arena.get_slices(rep, x),
            vec![Some(0..1), Some(2..3), Some(4..5)]
        );
        assert_eq!(arena.current_match(rep), Some("x x x"));
        assert!(!arena.matches(rule, "").unwrap());
    }

    #[test]
    fn test_snapshot_excludes_losing_alternative() {
        let mut arena = ExpansionArena::new();
        let a1 = arena.new_literal("a");
        let b = arena.new_literal("b");
        let ab = arena.new_sequence(vec![a1, b]).unwrap();
        let a2 = arena.new_literal("a");
        let c = arena.new_literal("c");
        let ac = arena.new_sequence(vec![a2, c]).unwrap();
        let alt = arena.new_alternatives(vec![ab, ac]).unwrap();
        let rep = arena.new_kleene_star(alt).unwrap();
        let rule = rule_of(&mut arena, rep);

        assert!(arena.matches(rule, "a b a c").unwrap());
        assert_eq!(arena.get_matches(rep, a1), vec![Some("a".to_string()), None]);
        assert_eq!(arena.get_matches(rep, a2), vec![None, Some("a".to_string())]);
        assert!(arena.had_match(c));
    }

    #[test]
    fn test_kleene_star_zero() {
        let mut arena = ExpansionArena::new();
        let x = arena.new_literal("x");
        let star = arena.new_kleene_star(x).unwrap();
        let end = arena.new_literal("end");
        let seq = arena.new_sequence(vec![star, end]).unwrap();
        let rule = rule_of(&mut arena, seq);

        assert!(arena.matches(rule, "end").unwrap());
        assert_eq!(arena.current_match(star), Some(""));
        assert!(arena.get_matches(star, x).is_empty());
    }

    #[test]
    fn test_nested_repeat_degrades() {
        let mut arena = ExpansionArena::new();
        let x = arena.new_literal("x");
        let inner = arena.new_repeat(x).unwrap();
        let outer = arena.new_repeat(inner).unwrap();
        let rule = rule_of(&mut arena, outer);

        assert!(arena.matches(rule, "x x").unwrap());
        assert_eq!(arena.node(outer).repetition_history().len(), 2);
    }

    #[test]
    fn test_null_and_void() {
        let mut arena = ExpansionArena::new();
        let null = arena.new_null_ref();
        let go = arena.new_literal("go");
        let seq = arena.new_sequence(vec![null, go]).unwrap();
        let rule = rule_of(&mut arena, seq);
        assert!(arena.matches(rule, "go").unwrap());
        assert_eq!(arena.current_match(null), Some(""));

        let void = arena.new_void_ref();
        let void_rule = arena.new_rule("never", true, void).unwrap();
        assert!(!arena.matches(void_rule, "").unwrap());
        assert!(!arena.matches(void_rule, "anything").unwrap());
    }

    #[test]
    fn test_unresolved_reference_is_error() {
        let mut arena = ExpansionArena::new();
        let r = arena.new_rule_ref("missing");
        let rule = rule_of(&mut arena, r);
        let err = arena.matches(rule, "x").unwrap_err();
        assert!(err.is_reference_error());
    }

    #[test]
    fn test_recursion_limit() {
        let mut arena = ExpansionArena::with_config(MatchConfig::new().with_max_recursion_depth(8));
        let g = arena.new_grammar("g");
        let again = arena.new_rule_ref("loop");
        let x = arena.new_literal("x");
        let seq = arena.new_sequence(vec![again, x]).unwrap();
        let rule = arena.new_rule("loop", true, seq).unwrap();
        arena.add_rule(g, rule).unwrap();

        let err = arena.matches(rule, "x").unwrap_err();
        assert_eq!(
            err,
            ExpansionError::RecursionLimitExceeded {
                depth: 9,
                max_depth: 8
            }
        );
        assert_eq!(arena.current_match(x), None);
    }

    #[test]
    fn test_find_matching_part() {
        let mut arena = ExpansionArena::new();
        let lit = arena.new_literal("turn on");
        let rule = rule_of(&mut arena, lit);

        let span = arena
            .find_matching_part(rule, "please turn on the light")
            .unwrap()
            .unwrap();
        assert_eq!(span.text, "turn on");
        assert_eq!(span.range, 7..14);
        assert_eq!(arena.matched_text(rule), Some("turn on"));

        assert_eq!(arena.find_matching_part(rule, "returned online").unwrap(), None);
    }

    #[test]
    fn test_lowercase_config() {
        let mut arena =
            ExpansionArena::with_config(MatchConfig::new().with_lowercase_input(true));
        let lit = arena.new_literal_with_case("hello", true);
        let rule = rule_of(&mut arena, lit);
        assert!(arena.matches(rule, "HELLO").unwrap());
        assert_eq!(arena.rule(rule).last_input(), Some("hello"));
    }
}
