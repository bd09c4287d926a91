//! # Fragment Overrides
//!
//! Maps text-fragment ids to replacement ids, stored under `OverrideFrag` as
//!
//! ```text
//! overrideFrag((FRAG_ID 'a' NEW_FRAG_ID 'b')(FRAG_ID 'c' NEW_FRAG_ID 'd'))
//! ```
//!
//! Overrides never chain: a replacement may not itself be overridden, and an
//! overridden id may not serve as a replacement. The first override set for
//! an id wins.

use crate::DocError;
use crate::conf::{self, ConfNode};
use crate::primitives::OVERRIDE_FRAG_SECTION;
use std::collections::BTreeMap;
use tracing::error;

/// Fragment id → replacement fragment id.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OverrideFragMap {
    map: BTreeMap<String, String>,
}

impl OverrideFragMap {
    /// Record `frag_id → new_frag_id`. An existing override for `frag_id`
    /// is kept. Returns whether the map changed.
    ///
    /// # Errors
    ///
    /// Returns `DocError::ChainedOverride` if the new entry would form a
    /// chain with an existing one.
    pub fn insert(&mut self, frag_id: &str, new_frag_id: &str) -> Result<bool, DocError> {
        if self.map.contains_key(new_frag_id) {
            return Err(DocError::ChainedOverride(new_frag_id.to_string()));
        }
        if self.map.values().any(|v| v == frag_id) {
            return Err(DocError::ChainedOverride(frag_id.to_string()));
        }
        if self.map.contains_key(frag_id) {
            return Ok(false);
        }
        self.map
            .insert(frag_id.to_string(), new_frag_id.to_string());
        Ok(true)
    }

    /// Replacement for `frag_id`.
    #[must_use]
    pub fn get(&self, frag_id: &str) -> Option<&str> {
        self.map.get(frag_id).map(String::as_str)
    }

    /// Whether no override is set.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    /// Serialize into block syntax.
    #[must_use]
    pub fn to_block(&self) -> String {
        let entries = self
            .map
            .iter()
            .map(|(frag, new_frag)| {
                ConfNode::group(vec![
                    ConfNode::pair("FRAG_ID", frag.clone()),
                    ConfNode::pair("NEW_FRAG_ID", new_frag.clone()),
                ])
            })
            .collect();
        ConfNode::node(OVERRIDE_FRAG_SECTION, entries).render()
    }

    /// Parse a block. Incomplete and chaining entries are logged and skipped.
    pub fn from_block(src: &str) -> Result<Self, DocError> {
        let items = conf::parse(src)?;
        let mut map = Self::default();
        for section in conf::find_all(&items, OVERRIDE_FRAG_SECTION) {
            for entry in section.children() {
                let (Some(frag), Some(new_frag)) =
                    (entry.value_of("FRAG_ID"), entry.value_of("NEW_FRAG_ID"))
                else {
                    error!("overrideFrag entry needs FRAG_ID and NEW_FRAG_ID: {}", entry);
                    continue;
                };
                if let Err(e) = map.insert(frag, new_frag) {
                    error!("{}", e);
                }
            }
        }
        Ok(map)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chains_are_rejected() {
        let mut map = OverrideFragMap::default();
        map.insert("a", "b").expect("insert");
        assert!(matches!(map.insert("b", "c"), Err(DocError::ChainedOverride(id)) if id == "b"));
        assert!(matches!(map.insert("x", "a"), Err(DocError::ChainedOverride(id)) if id == "a"));
    }

    #[test]
    fn first_override_wins() {
        let mut map = OverrideFragMap::default();
        assert!(map.insert("a", "b").expect("insert"));
        assert!(!map.insert("a", "c").expect("insert"));
        assert_eq!(map.get("a"), Some("b"));
    }

    #[test]
    fn block_format() {
        let mut map = OverrideFragMap::default();
        map.insert("a", "b").expect("insert");
        map.insert("c", "d").expect("insert");
        let block = map.to_block();
        assert_eq!(
            block,
            "overrideFrag((FRAG_ID 'a' NEW_FRAG_ID 'b')(FRAG_ID 'c' NEW_FRAG_ID 'd'))"
        );
        assert_eq!(OverrideFragMap::from_block(&block).expect("parse"), map);
    }

    #[test]
    fn chained_entries_in_block_are_skipped() {
        let map = OverrideFragMap::from_block(
            "overrideFrag((FRAG_ID 'a' NEW_FRAG_ID 'b')(FRAG_ID 'b' NEW_FRAG_ID 'c')(FRAG_ID 'x'))",
        )
        .expect("parse");
        assert_eq!(map.get("a"), Some("b"));
        assert_eq!(map.get("b"), None);
        assert_eq!(map.get("x"), None);
    }
}
