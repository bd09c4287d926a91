//! # Block Grammar
//!
//! Every persisted metadata block (stored values, print functions, form
//! descriptions, function bodies) is written in one nested,
//! parenthesis-delimited key/value syntax:
//!
//! ```text
//! WM(Formularwerte((ID 'Name' VALUE 'Alice')(ID 'City' VALUE 'Rome')))
//! ```
//!
//! A block parses into a forest of [`ConfNode`]s. A string literal is a leaf,
//! `NAME(...)` and `NAME 'v'` are named nodes, `(...)` is an anonymous node.
//! Rendering is lossless with respect to the tree: `parse(render(x)) == x`.

mod parser;

pub use parser::parse;

use std::fmt;

/// One node of a parsed block.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ConfNode {
    /// A quoted string literal.
    Str(String),
    /// A named (or, with an empty name, anonymous) list of children.
    Node {
        /// Node name; empty for `( ... )`.
        name: String,
        /// Children in document order.
        children: Vec<ConfNode>,
    },
}

impl ConfNode {
    /// Create a string leaf.
    #[must_use]
    pub fn str(value: impl Into<String>) -> Self {
        Self::Str(value.into())
    }

    /// Create a named node.
    #[must_use]
    pub fn node(name: impl Into<String>, children: Vec<ConfNode>) -> Self {
        Self::Node {
            name: name.into(),
            children,
        }
    }

    /// Create an anonymous `( ... )` node.
    #[must_use]
    pub fn group(children: Vec<ConfNode>) -> Self {
        Self::node(String::new(), children)
    }

    /// Create `NAME 'value'`.
    #[must_use]
    pub fn pair(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self::node(name, vec![Self::str(value)])
    }

    /// Node name, or the literal text of a leaf.
    #[must_use]
    pub fn name(&self) -> &str {
        match self {
            Self::Str(s) => s,
            Self::Node { name, .. } => name,
        }
    }

    /// Children of a node; leaves have none.
    #[must_use]
    pub fn children(&self) -> &[ConfNode] {
        match self {
            Self::Str(_) => &[],
            Self::Node { children, .. } => children,
        }
    }

    /// Mutable children; `None` for leaves.
    pub fn children_mut(&mut self) -> Option<&mut Vec<ConfNode>> {
        match self {
            Self::Str(_) => None,
            Self::Node { children, .. } => Some(children),
        }
    }

    /// First direct child node with the given name.
    #[must_use]
    pub fn child(&self, name: &str) -> Option<&ConfNode> {
        self.children()
            .iter()
            .find(|c| matches!(c, Self::Node { name: n, .. } if n == name))
    }

    /// Literal carried by `NAME 'v'`, or the text of a leaf.
    #[must_use]
    pub fn literal(&self) -> Option<&str> {
        match self {
            Self::Str(s) => Some(s),
            Self::Node { children, .. } => match children.as_slice() {
                [Self::Str(s)] => Some(s),
                _ => None,
            },
        }
    }

    /// Literal of the direct child named `name`.
    #[must_use]
    pub fn value_of(&self, name: &str) -> Option<&str> {
        self.child(name).and_then(ConfNode::literal)
    }

    /// Every descendant node (depth-first, pre-order) with the given name.
    #[must_use]
    pub fn find_all<'a>(&'a self, name: &str) -> Vec<&'a ConfNode> {
        let mut out = Vec::new();
        collect_named(std::slice::from_ref(self), name, &mut out);
        out
    }

    /// Render this node in block syntax.
    #[must_use]
    pub fn render(&self) -> String {
        let mut out = String::new();
        write_node(self, &mut out);
        out
    }
}

impl fmt::Display for ConfNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.render())
    }
}

/// Every node named `name` anywhere inside `items`.
#[must_use]
pub fn find_all<'a>(items: &'a [ConfNode], name: &str) -> Vec<&'a ConfNode> {
    let mut out = Vec::new();
    collect_named(items, name, &mut out);
    out
}

/// Render a forest of top-level items separated by single spaces.
#[must_use]
pub fn render_items(items: &[ConfNode]) -> String {
    let mut out = String::new();
    for (i, item) in items.iter().enumerate() {
        if i > 0 {
            out.push(' ');
        }
        write_node(item, &mut out);
    }
    out
}

/// Quote a literal, doubling embedded single quotes.
#[must_use]
pub fn quote(value: &str) -> String {
    let mut out = String::with_capacity(value.len() + 2);
    out.push('\'');
    for c in value.chars() {
        if c == '\'' {
            out.push('\'');
        }
        out.push(c);
    }
    out.push('\'');
    out
}

/// Check whether `name` is a valid bare identifier.
#[must_use]
pub fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {
            chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
        }
        _ => false,
    }
}

fn collect_named<'a>(items: &'a [ConfNode], name: &str, out: &mut Vec<&'a ConfNode>) {
    for item in items {
        if let ConfNode::Node { name: n, children } = item {
            if n == name {
                out.push(item);
            }
            collect_named(children, name, out);
        }
    }
}

fn write_node(node: &ConfNode, out: &mut String) {
    match node {
        ConfNode::Str(s) => out.push_str(&quote(s)),
        ConfNode::Node { name, children } => {
            out.push_str(name);
            if let ([ConfNode::Str(s)], false) = (children.as_slice(), name.is_empty()) {
                out.push(' ');
                out.push_str(&quote(s));
                return;
            }
            out.push('(');
            out.push_str(&render_items(children));
            out.push(')');
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pair_renders_short_form() {
        assert_eq!(ConfNode::pair("ID", "a").render(), "ID 'a'");
    }

    #[test]
    fn quotes_are_doubled() {
        assert_eq!(quote("it's"), "'it''s'");
    }

    #[test]
    fn nested_rendering() {
        let node = ConfNode::node(
            "WM",
            vec![ConfNode::node(
                "Formularwerte",
                vec![ConfNode::group(vec![
                    ConfNode::pair("ID", "a"),
                    ConfNode::pair("VALUE", ""),
                ])],
            )],
        );
        assert_eq!(node.render(), "WM(Formularwerte((ID 'a' VALUE '')))");
    }

    #[test]
    fn find_all_descends() {
        let tree = ConfNode::node(
            "WM",
            vec![
                ConfNode::node("Formular", vec![ConfNode::pair("TITLE", "x")]),
                ConfNode::node("Formular", vec![]),
            ],
        );
        assert_eq!(tree.find_all("Formular").len(), 2);
        assert_eq!(tree.find_all("TITLE")[0].literal(), Some("x"));
    }

    #[test]
    fn identifiers() {
        assert!(is_identifier("printLetter_2"));
        assert!(!is_identifier("2print"));
        assert!(!is_identifier(""));
        assert!(!is_identifier("WM(x)"));
    }
}
