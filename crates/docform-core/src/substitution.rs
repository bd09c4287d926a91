//! # Field Substitution
//!
//! Replaces every occurrence of one field id by a sequence of literal text
//! and field references, e.g. turning `Greeting` into
//! `"Dear " <Name> "!"`.
//!
//! - Handles without a trafo are replaced in the text: their content is
//!   deleted and the sequence inserted in its place, with one fresh
//!   untransformed handle per field reference.
//! - Handles with a trafo cannot be split. They accept only a 1:1
//!   substitution (exactly one field reference) and are rebound in place:
//!   handles with their own id are rebound by the host, text fields get
//!   their document-local trafo rewritten to read the new id.

use crate::DocError;
use crate::fields::{FieldIndex, FormField};
use crate::functions::{Function, FunctionRegistry};
use std::collections::{BTreeMap, BTreeSet};
use tracing::error;

/// One element of a substitution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubstElement {
    /// Literal text.
    Text(String),
    /// A reference to a field id.
    Field(String),
}

/// Ordered replacement for one field id.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FieldSubstitution {
    elements: Vec<SubstElement>,
}

impl FieldSubstitution {
    /// An empty substitution.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append literal text.
    #[must_use]
    pub fn text(mut self, text: impl Into<String>) -> Self {
        self.elements.push(SubstElement::Text(text.into()));
        self
    }

    /// Append a field reference.
    #[must_use]
    pub fn field(mut self, id: impl Into<String>) -> Self {
        self.elements.push(SubstElement::Field(id.into()));
        self
    }

    /// Elements in order.
    #[must_use]
    pub fn elements(&self) -> &[SubstElement] {
        &self.elements
    }

    /// Whether there is nothing to insert.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    /// The target id of a 1:1 substitution.
    #[must_use]
    pub fn single_field_id(&self) -> Option<&str> {
        match self.elements.as_slice() {
            [SubstElement::Field(id)] => Some(id),
            _ => None,
        }
    }

    /// Every referenced field id.
    #[must_use]
    pub fn field_ids(&self) -> BTreeSet<String> {
        self.elements
            .iter()
            .filter_map(|e| match e {
                SubstElement::Field(id) => Some(id.clone()),
                SubstElement::Text(_) => None,
            })
            .collect()
    }
}

/// What a substitution pass changed besides the document text.
#[derive(Debug, Clone, Default)]
pub struct SubstitutionOutcome {
    /// Ids that now appear in the document and need a redisplay.
    pub new_ids: BTreeSet<String>,
    /// Local functions rewritten to read the new id.
    pub rewritten: BTreeMap<String, Function>,
}

/// Applies substitutions against one scan.
#[derive(Debug, Clone, Copy)]
pub struct SubstitutionEngine<'a> {
    index: &'a FieldIndex,
    registry: &'a FunctionRegistry,
}

impl<'a> SubstitutionEngine<'a> {
    /// An engine over one scan.
    #[must_use]
    pub fn new(index: &'a FieldIndex, registry: &'a FunctionRegistry) -> Self {
        Self { index, registry }
    }

    /// Substitute every handle of `old_id`. Rejected handles are logged and
    /// left untouched.
    #[must_use]
    pub fn apply(&self, old_id: &str, substitution: &FieldSubstitution) -> SubstitutionOutcome {
        let mut outcome = SubstitutionOutcome::default();
        if substitution.is_empty() {
            return outcome;
        }
        let new_id = substitution.single_field_id();

        for field in self.index.fields(old_id) {
            match (field.binding().trafo(), new_id) {
                (None, _) => self.replace_content(field, substitution),
                (Some(trafo), Some(new_id)) => {
                    self.rebind(field, trafo, old_id, new_id, &mut outcome);
                }
                (Some(trafo), None) => error!(
                    "Field '{}' uses trafo '{}' and only accepts a substitution by exactly one field",
                    old_id, trafo
                ),
            }
        }
        outcome.new_ids = substitution.field_ids();
        outcome
    }

    fn replace_content(&self, field: &FormField, substitution: &FieldSubstitution) {
        let handle = field.handle();
        let Some(mut anchor) = handle.anchor() else {
            error!("Field has no insertion point; substitution skipped");
            return;
        };
        handle.dispose();
        for element in substitution.elements() {
            let inserted = match element {
                SubstElement::Text(text) => anchor.insert_text(text),
                SubstElement::Field(id) => anchor.insert_field(id),
            };
            if let Err(e) = inserted {
                error!("Substitution insert failed: {}", e);
            }
        }
    }

    fn rebind(
        &self,
        field: &FormField,
        trafo: &str,
        old_id: &str,
        new_id: &str,
        outcome: &mut SubstitutionOutcome,
    ) {
        if field.handle().field_id().is_some() {
            if let Err(e) = field.handle().substitute_field_id(old_id, new_id) {
                error!("Could not rebind field '{}' to '{}': {}", old_id, new_id, e);
            }
            return;
        }

        if outcome.rewritten.contains_key(trafo) {
            return;
        }
        if !self.registry.is_local(trafo) {
            error!("{}", DocError::IllegalRebind(trafo.to_string()));
            return;
        }
        let Some(function) = self.registry.get(trafo) else {
            return;
        };
        match function.with_substituted_value(old_id, new_id) {
            Ok(rewritten) => {
                outcome.rewritten.insert(trafo.to_string(), rewritten);
            }
            Err(e) => error!("Could not rewrite trafo '{}': {}", trafo, e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_field_id_needs_exactly_one_field() {
        assert_eq!(FieldSubstitution::new().field("X").single_field_id(), Some("X"));
        assert_eq!(FieldSubstitution::new().text("X").single_field_id(), None);
        assert_eq!(
            FieldSubstitution::new().field("X").field("Y").single_field_id(),
            None
        );
        assert_eq!(
            FieldSubstitution::new().text("a").field("X").single_field_id(),
            None
        );
    }

    #[test]
    fn field_ids_are_collected() {
        let s = FieldSubstitution::new()
            .text("Dear ")
            .field("Name")
            .text("!")
            .field("Name");
        assert_eq!(s.field_ids().into_iter().collect::<Vec<_>>(), ["Name"]);
    }
}
