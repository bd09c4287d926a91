//! # Preset Resolution
//!
//! Decides, when a document is opened, which value each id should start
//! with, and whether the document content actually agrees with it.
//!
//! 1. The candidate of an id is the content of its first untransformed
//!    handle, else its stored value.
//! 2. Every handle listed under the id must be reproducible from the
//!    candidates: untransformed handles show the candidate, single-parameter
//!    handles show their trafo applied to it, multi-parameter handles show
//!    their trafo applied to all candidates. A multi-parameter handle with a
//!    parameter that has no candidate is not checked.
//! 3. Ids that pass keep their candidate; every other id is `Unknown`.
//!
//! All candidates are collected before any check runs, so the outcome does
//! not depend on iteration order.

use crate::Preset;
use crate::fields::{FieldBinding, FieldIndex, FormField};
use crate::functions::FunctionRegistry;
use crate::trafo::TrafoEngine;
use crate::values::FieldValueTable;
use std::collections::{BTreeMap, BTreeSet};

/// Computes presets from a field index and the stored table.
#[derive(Debug, Clone, Copy)]
pub struct PresetResolver<'a> {
    index: &'a FieldIndex,
    stored: &'a FieldValueTable,
    registry: &'a FunctionRegistry,
}

impl<'a> PresetResolver<'a> {
    /// A resolver over one scan.
    #[must_use]
    pub fn new(
        index: &'a FieldIndex,
        stored: &'a FieldValueTable,
        registry: &'a FunctionRegistry,
    ) -> Self {
        Self {
            index,
            stored,
            registry,
        }
    }

    /// Preset of every id known to the index or the stored table.
    #[must_use]
    pub fn resolve(&self) -> BTreeMap<String, Preset> {
        let ids: BTreeSet<&str> = self.index.ids().chain(self.stored.ids()).collect();

        let candidates: BTreeMap<String, String> = ids
            .iter()
            .filter_map(|id| self.candidate(id).map(|v| ((*id).to_string(), v)))
            .collect();

        ids.into_iter()
            .map(|id| {
                let preset = match candidates.get(id) {
                    Some(value) if self.consistent(self.index.fields(id), value, &candidates) => {
                        Preset::Value(value.clone())
                    }
                    _ => Preset::Unknown,
                };
                (id.to_string(), preset)
            })
            .collect()
    }

    fn candidate(&self, id: &str) -> Option<String> {
        self.index
            .fields(id)
            .iter()
            .find(|f| !f.is_transformed())
            .map(|f| f.handle().value())
            .or_else(|| self.stored.get(id).map(str::to_string))
    }

    fn consistent(
        &self,
        fields: &[FormField],
        value: &str,
        candidates: &BTreeMap<String, String>,
    ) -> bool {
        let trafos = TrafoEngine::new(self.registry);
        fields.iter().all(|field| {
            let expected = match field.binding() {
                FieldBinding::Untransformed => value.to_string(),
                FieldBinding::SingleParameter { trafo } => trafos.evaluate_single(trafo, value),
                FieldBinding::MultiParameter { trafo } => {
                    let incomplete = self
                        .registry
                        .get(trafo)
                        .is_some_and(|f| f.params().iter().any(|p| !candidates.contains_key(p)));
                    if incomplete {
                        return true;
                    }
                    trafos.evaluate(trafo, candidates)
                }
            };
            field.handle().value() == expected
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::functions::Function;
    use crate::host::{FieldScanner, InMemoryDocument};

    fn registry() -> FunctionRegistry {
        let mut reg = FunctionRegistry::default();
        reg.add_local(Function::parse("Double", "VALUE 'x' VALUE 'x'").expect("parse"))
            .expect("add");
        reg.add_local(Function::parse("Full", "VALUE 'First' ' ' VALUE 'Last'").expect("parse"))
            .expect("add");
        reg
    }

    fn resolve(doc: &InMemoryDocument, stored: &FieldValueTable) -> BTreeMap<String, Preset> {
        let reg = registry();
        let index = FieldIndex::build(doc.scan_fields().expect("scan"), &reg);
        PresetResolver::new(&index, stored, &reg).resolve()
    }

    #[test]
    fn agreeing_fields_keep_value() {
        let doc = InMemoryDocument::new();
        doc.push_field("N", "A");
        doc.push_field("N", "A");
        let presets = resolve(&doc, &FieldValueTable::new());
        assert_eq!(presets["N"], Preset::Value("A".into()));
    }

    #[test]
    fn disagreeing_fields_are_unknown() {
        let doc = InMemoryDocument::new();
        doc.push_field("N", "A");
        doc.push_field("N", "B");
        let presets = resolve(&doc, &FieldValueTable::new());
        assert_eq!(presets["N"], Preset::Unknown);
    }

    #[test]
    fn single_parameter_trafo_is_checked() {
        let doc = InMemoryDocument::new();
        doc.push_field("N", "A");
        doc.push_transformed_field("N", "Double", "AA");
        assert_eq!(resolve(&doc, &FieldValueTable::new())["N"], Preset::Value("A".into()));

        let doc = InMemoryDocument::new();
        doc.push_field("N", "A");
        doc.push_transformed_field("N", "Double", "AB");
        assert_eq!(resolve(&doc, &FieldValueTable::new())["N"], Preset::Unknown);
    }

    #[test]
    fn stored_value_is_used_without_untransformed_handle() {
        let doc = InMemoryDocument::new();
        doc.push_transformed_field("N", "Double", "zz");
        let stored: FieldValueTable = [("N".to_string(), "z".to_string())].into_iter().collect();
        assert_eq!(resolve(&doc, &stored)["N"], Preset::Value("z".into()));
    }

    #[test]
    fn ids_without_evidence_are_unknown_not_omitted() {
        let doc = InMemoryDocument::new();
        doc.push_transformed_field("N", "Double", "zz");
        let presets = resolve(&doc, &FieldValueTable::new());
        assert_eq!(presets.get("N"), Some(&Preset::Unknown));
    }

    #[test]
    fn multi_parameter_handle_with_missing_dependency_is_skipped() {
        // "Full" reads First and Last; Last has no candidate at all, so the
        // text field cannot be checked and does not veto First.
        let doc = InMemoryDocument::new();
        doc.push_field("First", "Ann");
        doc.push_text_field("Full", "something else entirely");
        let presets = resolve(&doc, &FieldValueTable::new());
        assert_eq!(presets["First"], Preset::Value("Ann".into()));
        assert_eq!(presets["Last"], Preset::Unknown);
    }

    #[test]
    fn multi_parameter_handle_with_all_dependencies_is_checked() {
        let doc = InMemoryDocument::new();
        doc.push_field("First", "Ann");
        doc.push_field("Last", "Lee");
        doc.push_text_field("Full", "Ann Lee");
        let presets = resolve(&doc, &FieldValueTable::new());
        assert_eq!(presets["First"], Preset::Value("Ann".into()));
        assert_eq!(presets["Last"], Preset::Value("Lee".into()));

        let doc = InMemoryDocument::new();
        doc.push_field("First", "Ann");
        doc.push_field("Last", "Lee");
        doc.push_text_field("Full", "Bob Lee");
        let presets = resolve(&doc, &FieldValueTable::new());
        assert_eq!(presets["First"], Preset::Unknown);
        assert_eq!(presets["Last"], Preset::Unknown);
    }
}
