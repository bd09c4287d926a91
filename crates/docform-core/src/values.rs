//! # Stored Field Values
//!
//! The id → value table persisted under `WollMuxFormularwerte` as
//!
//! ```text
//! WM(Formularwerte((ID 'Name' VALUE 'Ann')(ID 'City' VALUE '')))
//! ```
//!
//! An id missing from the table is distinct from an id mapped to `""`.

use crate::DocError;
use crate::conf::{self, ConfNode};
use crate::primitives::{ROOT_SECTION, VALUES_SECTION};
use std::collections::BTreeMap;
use tracing::warn;

/// Stored values of one document.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FieldValueTable {
    values: BTreeMap<String, String>,
}

impl FieldValueTable {
    /// An empty table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Stored value of `id`.
    #[must_use]
    pub fn get(&self, id: &str) -> Option<&str> {
        self.values.get(id).map(String::as_str)
    }

    /// Store `value` for `id`, or drop `id` when `value` is `None`.
    pub fn set(&mut self, id: &str, value: Option<&str>) {
        match value {
            Some(v) => {
                self.values.insert(id.to_string(), v.to_string());
            }
            None => {
                self.values.remove(id);
            }
        }
    }

    /// Whether `id` has a stored value.
    #[must_use]
    pub fn contains(&self, id: &str) -> bool {
        self.values.contains_key(id)
    }

    /// Every stored id, sorted.
    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.values.keys().map(String::as_str)
    }

    /// The table as a map.
    #[must_use]
    pub fn as_map(&self) -> &BTreeMap<String, String> {
        &self.values
    }

    /// Number of stored ids.
    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Whether nothing is stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Serialize into block syntax.
    #[must_use]
    pub fn to_block(&self) -> String {
        let entries = self
            .values
            .iter()
            .map(|(id, value)| {
                ConfNode::group(vec![
                    ConfNode::pair("ID", id.clone()),
                    ConfNode::pair("VALUE", value.clone()),
                ])
            })
            .collect();
        ConfNode::node(
            ROOT_SECTION,
            vec![ConfNode::node(VALUES_SECTION, entries)],
        )
        .render()
    }

    /// Parse a stored block. Entries without `ID` or `VALUE` are skipped.
    pub fn from_block(src: &str) -> Result<Self, DocError> {
        let items = conf::parse(src)?;
        let mut table = Self::new();
        for section in conf::find_all(&items, VALUES_SECTION) {
            for entry in section.children() {
                match (entry.value_of("ID"), entry.value_of("VALUE")) {
                    (Some(id), Some(value)) => table.set(id, Some(value)),
                    _ => warn!("Skipping incomplete stored value entry: {}", entry),
                }
            }
        }
        Ok(table)
    }
}

impl FromIterator<(String, String)> for FieldValueTable {
    fn from_iter<I: IntoIterator<Item = (String, String)>>(iter: I) -> Self {
        Self {
            values: iter.into_iter().collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn block_format() {
        let mut table = FieldValueTable::new();
        table.set("b", Some(""));
        table.set("a", Some("it's"));
        assert_eq!(
            table.to_block(),
            "WM(Formularwerte((ID 'a' VALUE 'it''s')(ID 'b' VALUE '')))"
        );
        assert_eq!(FieldValueTable::from_block(&table.to_block()).expect("parse"), table);
    }

    #[test]
    fn empty_value_differs_from_absent() {
        let mut table = FieldValueTable::new();
        table.set("x", Some(""));
        assert_eq!(table.get("x"), Some(""));
        table.set("x", None);
        assert_eq!(table.get("x"), None);
    }

    #[test]
    fn incomplete_entries_are_skipped() {
        let table =
            FieldValueTable::from_block("WM(Formularwerte((ID 'a')(ID 'b' VALUE 'v')))").expect("parse");
        assert_eq!(table.len(), 1);
        assert_eq!(table.get("b"), Some("v"));
    }

    #[test]
    fn malformed_block_is_an_error() {
        assert!(FieldValueTable::from_block("WM(Formularwerte(").is_err());
    }
}
