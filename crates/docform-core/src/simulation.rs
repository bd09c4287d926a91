//! # Simulation
//!
//! While a simulation runs (e.g. during a mail merge preview), value
//! changes, visibility changes and field redraws are recorded here instead
//! of being applied to the document. Stopping the simulation hands the
//! recorded state back and leaves the document as it was.

use crate::FieldKey;
use crate::fields::FieldIndex;
use crate::values::FieldValueTable;
use std::collections::BTreeMap;

/// Recorded state of one simulation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SimulationContext {
    values: FieldValueTable,
    visibility: BTreeMap<String, bool>,
    field_contents: BTreeMap<FieldKey, String>,
}

impl SimulationContext {
    /// Snapshot the current values, group states and handle contents.
    #[must_use]
    pub fn start(
        values: &FieldValueTable,
        visibility: &BTreeMap<String, bool>,
        index: &FieldIndex,
    ) -> Self {
        Self {
            values: values.clone(),
            visibility: visibility.clone(),
            field_contents: index
                .all()
                .iter()
                .map(|f| (f.key(), f.handle().value()))
                .collect(),
        }
    }

    /// Simulated values.
    #[must_use]
    pub fn values(&self) -> &FieldValueTable {
        &self.values
    }

    /// Simulated state of a visibility group, if it was ever set.
    #[must_use]
    pub fn group_visibility(&self, group: &str) -> Option<bool> {
        self.visibility.get(group).copied()
    }

    /// Every simulated group state.
    #[must_use]
    pub fn group_states(&self) -> &BTreeMap<String, bool> {
        &self.visibility
    }

    /// Simulated content of one handle.
    #[must_use]
    pub fn field_content(&self, key: FieldKey) -> Option<&str> {
        self.field_contents.get(&key).map(String::as_str)
    }

    /// Every simulated handle content.
    #[must_use]
    pub fn field_contents(&self) -> &BTreeMap<FieldKey, String> {
        &self.field_contents
    }

    pub(crate) fn set_value(&mut self, id: &str, value: Option<&str>) {
        self.values.set(id, value);
    }

    pub(crate) fn set_group_visibility(&mut self, group: &str, visible: bool) {
        self.visibility.insert(group.to_string(), visible);
    }

    pub(crate) fn set_field_content(&mut self, key: FieldKey, content: String) {
        self.field_contents.insert(key, content);
    }
}
