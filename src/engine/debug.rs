//! Developer tools
//!
//! - [`TreePrinter`] renders a tree one node per line with its match state
//! - [`ExpansionArena::jsgf_text`] renders a tree back to JSGF notation

use super::arena::{ExpansionArena, NodeId, RuleId};
use super::node::NodeKind;
use std::fmt::Write;

/// Expansion tree pretty printer
///
/// ```
/// use jsgf_match::builder::{alt, lit, seq};
/// use jsgf_match::{ExpansionArena, TreePrinter};
///
/// let mut arena = ExpansionArena::new();
/// let root = arena.build(&seq([lit("hello"), alt([lit("world"), lit("there")])])).unwrap();
/// let text = TreePrinter::new().print(&arena, root);
/// assert!(text.starts_with("Sequence\n  Literal \"hello\""));
/// ```
pub struct TreePrinter {
    /// Indentation string
    indent: String,
    /// Maximum depth to print
    max_depth: Option<usize>,
    /// Whether to print current matches
    show_matches: bool,
}

impl TreePrinter {
    /// Create a new tree printer
    pub fn new() -> Self {
        Self {
            indent: "  ".to_string(),
            max_depth: None,
            show_matches: true,
        }
    }

    /// Set the indentation string
    pub fn indent(mut self, indent: &str) -> Self {
        self.indent = indent.to_string();
        self
    }

    /// Set the maximum depth to print
    pub fn max_depth(mut self, depth: usize) -> Self {
        self.max_depth = Some(depth);
        self
    }

    /// Print or hide current match state
    pub fn show_matches(mut self, show: bool) -> Self {
        self.show_matches = show;
        self
    }

    /// Print the tree below `root`
    pub fn print(&self, arena: &ExpansionArena, root: NodeId) -> String {
        let mut output = String::new();
        self.print_node(arena, root, 0, &mut output);
        output
    }

    /// Print a rule header followed by its tree
    pub fn print_rule(&self, arena: &ExpansionArena, rule: RuleId) -> String {
        let r = arena.rule(rule);
        let mut output = format!(
            "{}<{}> ({})\n",
            if r.is_visible() { "public " } else { "" },
            arena.fully_qualified_name(rule),
            if r.is_active() { "enabled" } else { "disabled" }
        );
        self.print_node(arena, r.root(), 1, &mut output);
        output
    }

    fn print_node(&self, arena: &ExpansionArena, id: NodeId, depth: usize, output: &mut String) {
        let indent = self.indent.repeat(depth);
        if self.max_depth.is_some_and(|max| depth > max) {
            let _ = writeln!(output, "{}...", indent);
            return;
        }

        let node = arena.node(id);
        let _ = write!(output, "{}", indent);
        if let Some(parent) = node.parent() {
            if let Some(weight) = arena.weight(parent, id) {
                let _ = write!(output, "/{}/ ", weight);
            }
        }
        let _ = write!(output, "{}", node_label(arena, id));
        if let Some(tag) = node.tag() {
            let _ = write!(output, " {{{}}}", tag);
        }
        if self.show_matches {
            if let Some(text) = node.current_match() {
                let _ = write!(output, " => {:?}", text);
            }
        }
        output.push('\n');

        for &child in node.children() {
            self.print_node(arena, child, depth + 1, output);
        }
    }
}

impl Default for TreePrinter {
    fn default() -> Self {
        Self::new()
    }
}

fn node_label(arena: &ExpansionArena, id: NodeId) -> String {
    let kind = arena.kind(id);
    match kind {
        NodeKind::Literal {
            text,
            case_sensitive: true,
        } => format!("{} {:?} (case-sensitive)", kind.name(), text),
        NodeKind::Literal { text, .. } => format!("{} {:?}", kind.name(), text),
        NodeKind::NamedRuleRef { name } => format!("{} <{}>", kind.name(), name),
        NodeKind::RuleRef { rule } => {
            format!("{} <{}>", kind.name(), arena.fully_qualified_name(*rule))
        }
        _ => kind.name().to_string(),
    }
}

impl ExpansionArena {
    /// Render the tree below `id` in JSGF notation
    ///
    /// Sequences inside sequences and alternatives get parentheses so the
    /// text reads back into the same shape.
    pub fn jsgf_text(&self, id: NodeId) -> String {
        let mut out = String::new();
        self.write_jsgf(id, &mut out);
        out
    }

    fn write_jsgf(&self, id: NodeId, out: &mut String) {
        let node = self.node(id);
        let children = node.children();
        match node.kind() {
            NodeKind::Literal { text, .. } => out.push_str(text),
            NodeKind::Sequence => self.write_joined(id, children, " ", out),
            NodeKind::AlternativeSet { .. } => self.write_joined(id, children, " | ", out),
            NodeKind::Optional => self.write_wrapped("[", children, "]", out),
            NodeKind::RequiredGrouping => self.write_wrapped("(", children, ")", out),
            NodeKind::Repeat => self.write_suffixed(children, "+", out),
            NodeKind::KleeneStar => self.write_suffixed(children, "*", out),
            NodeKind::NamedRuleRef { name } => {
                let _ = write!(out, "<{}>", name);
            }
            NodeKind::RuleRef { rule } => {
                let _ = write!(out, "<{}>", self.rule(*rule).name());
            }
            NodeKind::NullRef => out.push_str("<NULL>"),
            NodeKind::VoidRef => out.push_str("<VOID>"),
        }
        if let Some(tag) = node.escaped_tag() {
            let _ = write!(out, " {}", tag);
        }
    }

    fn write_joined(&self, parent: NodeId, children: &[NodeId], sep: &str, out: &mut String) {
        for (i, &child) in children.iter().enumerate() {
            if i > 0 {
                out.push_str(sep);
            }
            if let Some(weight) = self.weight(parent, child) {
                let _ = write!(out, "/{}/ ", weight);
            }
            let nested = matches!(
                self.kind(child),
                NodeKind::Sequence | NodeKind::AlternativeSet { .. }
            );
            if nested {
                out.push('(');
                self.write_jsgf(child, out);
                out.push(')');
            } else {
                self.write_jsgf(child, out);
            }
        }
    }

    fn write_wrapped(&self, open: &str, children: &[NodeId], close: &str, out: &mut String) {
        out.push_str(open);
        if let Some(&child) = children.first() {
            self.write_jsgf(child, out);
        }
        out.push_str(close);
    }

    fn write_suffixed(&self, children: &[NodeId], suffix: &str, out: &mut String) {
        if let Some(&child) = children.first() {
            let atomic = matches!(
                self.kind(child),
                NodeKind::Literal { .. }
                    | NodeKind::NamedRuleRef { .. }
                    | NodeKind::RuleRef { .. }
                    | NodeKind::RequiredGrouping
                    | NodeKind::Optional
            ) && self.node(child).tag().is_none()
                && self
                    .node(child)
                    .literal_text()
                    .map_or(true, |text| text.split_whitespace().count() == 1);
            if atomic {
                self.write_jsgf(child, out);
            } else {
                out.push('(');
                self.write_jsgf(child, out);
                out.push(')');
            }
        }
        out.push_str(suffix);
    }
}
