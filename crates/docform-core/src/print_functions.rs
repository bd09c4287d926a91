//! # Print Functions
//!
//! The set of print functions a document requests. Stored under
//! `PrintFunction` as
//!
//! ```text
//! WM(Druckfunktionen((FUNCTION 'a')(FUNCTION 'b')))
//! ```
//!
//! or, when exactly one function is set and its name is an identifier, as
//! its bare name. Older documents only know the bare form, so it is kept for
//! the single-function case.

use crate::conf::{self, ConfNode};
use crate::primitives::{PRINT_FUNCTIONS_SECTION, ROOT_SECTION};
use std::collections::BTreeSet;
use tracing::warn;

/// Requested print functions, sorted by name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PrintFunctions {
    names: BTreeSet<String>,
}

impl PrintFunctions {
    /// Decode a stored value. Unreadable values yield an empty set.
    #[must_use]
    pub fn from_stored(value: &str) -> Self {
        let trimmed = value.trim();
        if trimmed.is_empty() {
            return Self::default();
        }
        if conf::is_identifier(trimmed) {
            return Self {
                names: BTreeSet::from([trimmed.to_string()]),
            };
        }
        match conf::parse(trimmed) {
            Ok(items) => Self {
                names: conf::find_all(&items, PRINT_FUNCTIONS_SECTION)
                    .into_iter()
                    .flat_map(|s| s.children().iter())
                    .filter_map(|entry| entry.value_of("FUNCTION"))
                    .filter(|name| !name.is_empty())
                    .map(str::to_string)
                    .collect(),
            },
            Err(e) => {
                warn!("Ignoring unreadable print function block: {}", e);
                Self::default()
            }
        }
    }

    /// Encode for storage; `None` when nothing is set.
    #[must_use]
    pub fn to_stored(&self) -> Option<String> {
        match self.names.len() {
            0 => None,
            1 if self.names.iter().all(|name| conf::is_identifier(name)) => {
                self.names.iter().next().cloned()
            }
            _ => {
                let entries = self
                    .names
                    .iter()
                    .map(|name| ConfNode::group(vec![ConfNode::pair("FUNCTION", name.clone())]))
                    .collect();
                Some(
                    ConfNode::node(
                        ROOT_SECTION,
                        vec![ConfNode::node(PRINT_FUNCTIONS_SECTION, entries)],
                    )
                    .render(),
                )
            }
        }
    }

    /// Request `name`. Returns whether it was new.
    pub fn add(&mut self, name: &str) -> bool {
        self.names.insert(name.to_string())
    }

    /// Drop `name`. Returns whether it was set.
    pub fn remove(&mut self, name: &str) -> bool {
        self.names.remove(name)
    }

    /// Whether `name` is requested.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.names.contains(name)
    }

    /// Requested names, sorted.
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.names.iter().map(String::as_str)
    }

    /// Whether nothing is requested.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}
