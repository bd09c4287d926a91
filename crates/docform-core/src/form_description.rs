//! # Form Description
//!
//! The `WollMuxFormularbeschreibung` block. A document may carry several
//! `Formular` sections; they are merged into one, so the stored form is
//! always
//!
//! ```text
//! WM(Formular(TITLE '...' Fenster(...) Sichtbarkeit(...) Funktionen(...)))
//! ```
//!
//! Document-local functions live in the `Funktionen` sections as
//! `NAME(body...)` entries.

use crate::DocError;
use crate::conf::{self, ConfNode};
use crate::functions::Function;
use crate::primitives::{
    FORM_SECTION, FUNCTIONS_SECTION, ROOT_SECTION, VISIBILITY_SECTION, WINDOW_SECTION,
};

/// The merged form definition of one document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormDescription {
    form: ConfNode,
}

impl Default for FormDescription {
    fn default() -> Self {
        Self {
            form: ConfNode::node(FORM_SECTION, Vec::new()),
        }
    }
}

impl FormDescription {
    /// An empty description.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Wrap an existing `Formular` node (any name is accepted; children are
    /// taken as the form's content).
    #[must_use]
    pub fn from_form(form: &ConfNode) -> Self {
        Self {
            form: ConfNode::node(FORM_SECTION, form.children().to_vec()),
        }
    }

    /// Parse a stored block, merging every `Formular` section.
    pub fn from_block(src: &str) -> Result<Self, DocError> {
        let items = conf::parse(src)?;
        let children = conf::find_all(&items, FORM_SECTION)
            .into_iter()
            .flat_map(|f| f.children().iter().cloned())
            .collect();
        Ok(Self {
            form: ConfNode::node(FORM_SECTION, children),
        })
    }

    /// Serialize into block syntax.
    #[must_use]
    pub fn to_block(&self) -> String {
        ConfNode::node(ROOT_SECTION, vec![self.form.clone()]).render()
    }

    /// The merged `Formular` node.
    #[must_use]
    pub fn form(&self) -> &ConfNode {
        &self.form
    }

    fn sections(&self, name: &str) -> impl Iterator<Item = &ConfNode> {
        self.form
            .children()
            .iter()
            .filter(move |c| matches!(c, ConfNode::Node { name: n, .. } if n == name))
    }

    fn has_content(&self, name: &str) -> bool {
        self.sections(name).any(|s| !s.children().is_empty())
    }

    /// Whether a window layout is defined.
    #[must_use]
    pub fn has_window(&self) -> bool {
        self.has_content(WINDOW_SECTION)
    }

    /// Whether the description carries anything worth persisting.
    #[must_use]
    pub fn is_worth_storing(&self) -> bool {
        self.has_window()
            || self.has_content(VISIBILITY_SECTION)
            || self.has_content(FUNCTIONS_SECTION)
    }

    /// `(name, body)` of every local function definition.
    #[must_use]
    pub fn function_definitions(&self) -> Vec<(String, Vec<ConfNode>)> {
        self.sections(FUNCTIONS_SECTION)
            .flat_map(|s| s.children().iter())
            .filter_map(|f| match f {
                ConfNode::Node { name, children } => Some((name.clone(), children.clone())),
                ConfNode::Str(_) => None,
            })
            .collect()
    }

    /// Insert or replace the definition of `function`.
    pub fn set_function(&mut self, function: &Function) {
        let entry = function.to_conf();
        let Some(form) = self.form.children_mut() else {
            return;
        };
        for section in form.iter_mut() {
            let ConfNode::Node { name, children } = section else {
                continue;
            };
            if name.as_str() != FUNCTIONS_SECTION {
                continue;
            }
            if let Some(slot) = children.iter_mut().find(|c| c.name() == function.name()) {
                *slot = entry;
                return;
            }
        }
        match form.iter_mut().find(|c| c.name() == FUNCTIONS_SECTION) {
            Some(section) => {
                if let Some(children) = section.children_mut() {
                    children.push(entry);
                }
            }
            None => form.push(ConfNode::node(FUNCTIONS_SECTION, vec![entry])),
        }
    }

    /// Remove the definition of `name`. Returns whether it existed.
    pub fn remove_function(&mut self, name: &str) -> bool {
        let Some(form) = self.form.children_mut() else {
            return false;
        };
        let mut removed = false;
        for section in form.iter_mut() {
            if section.name() != FUNCTIONS_SECTION {
                continue;
            }
            if let Some(children) = section.children_mut() {
                let before = children.len();
                children.retain(|c| c.name() != name || matches!(c, ConfNode::Str(_)));
                removed |= children.len() != before;
            }
        }
        removed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn formular_sections_are_merged() {
        let desc = FormDescription::from_block(
            "WM(Formular(TITLE 'a' Fenster(Tab(X 'y'))) Formular(Funktionen(F('x'))))",
        )
        .expect("parse");
        assert_eq!(
            desc.to_block(),
            "WM(Formular(TITLE 'a' Fenster(Tab(X 'y')) Funktionen(F 'x')))"
        );
        assert!(desc.has_window());
        assert_eq!(desc.function_definitions().len(), 1);
    }

    #[test]
    fn empty_sections_are_not_worth_storing() {
        let desc =
            FormDescription::from_block("WM(Formular(TITLE 'x' Fenster() Funktionen()))").expect("parse");
        assert!(!desc.is_worth_storing());
        assert!(!FormDescription::new().is_worth_storing());
    }

    #[test]
    fn functions_are_added_replaced_and_removed() {
        let mut desc = FormDescription::new();
        desc.set_function(&Function::parse("F", "'1'").expect("parse"));
        desc.set_function(&Function::parse("G", "'2'").expect("parse"));
        desc.set_function(&Function::parse("F", "'3'").expect("parse"));
        assert_eq!(desc.to_block(), "WM(Formular(Funktionen(F '3' G '2')))");
        assert!(desc.is_worth_storing());
        assert!(desc.remove_function("F"));
        assert!(!desc.remove_function("F"));
        assert_eq!(desc.to_block(), "WM(Formular(Funktionen(G '2')))");
    }
}
