//! In-memory host document.
//!
//! Models a document as a flat sequence of text runs and fields, plus hidden
//! notes, metadata graphs, function resources and visibility elements. Used
//! by the test suites and by embedders that render documents themselves.

use super::{
    FieldScanner, FormFieldHandle, HostDocument, MetadataAccess, MetadataGraph, TextAnchor,
    VisibilityElement,
};
use crate::DocError;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

#[derive(Debug)]
enum Segment {
    Text(String),
    Field(FieldSlot),
    Mark(u64),
}

#[derive(Debug)]
struct FieldSlot {
    slot: u64,
    id: Option<String>,
    trafo: Option<String>,
    single: bool,
    value: String,
}

#[derive(Debug, Default)]
struct GraphState {
    file: String,
    statements: Vec<(String, String)>,
}

#[derive(Debug, Default)]
struct DocState {
    modified: bool,
    notes: Vec<(String, String)>,
    graphs: BTreeMap<String, GraphState>,
    stores: u64,
    content: Vec<Segment>,
    resources: BTreeSet<String>,
    focused: Option<u64>,
    next_slot: u64,
}

impl DocState {
    fn allocate(&mut self) -> u64 {
        let slot = self.next_slot;
        self.next_slot = self.next_slot.saturating_add(1);
        slot
    }

    fn position_of(&self, slot: u64) -> Option<usize> {
        self.content
            .iter()
            .position(|seg| matches!(seg, Segment::Field(f) if f.slot == slot))
    }

    fn position_of_mark(&self, mark: u64) -> Option<usize> {
        self.content
            .iter()
            .position(|seg| matches!(seg, Segment::Mark(m) if *m == mark))
    }

    fn field_mut(&mut self, slot: u64) -> Option<&mut FieldSlot> {
        self.content.iter_mut().find_map(|seg| match seg {
            Segment::Field(f) if f.slot == slot => Some(f),
            _ => None,
        })
    }
}

fn lock(state: &Mutex<DocState>) -> MutexGuard<'_, DocState> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}

/// A host document held entirely in memory.
///
/// Cloning yields another handle to the same document.
#[derive(Debug, Clone)]
pub struct InMemoryDocument {
    state: Arc<Mutex<DocState>>,
    metadata: bool,
    visibility: Arc<Mutex<Vec<Arc<MemoryVisibility>>>>,
}

impl Default for InMemoryDocument {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryDocument {
    /// An empty document with a metadata graph facility.
    #[must_use]
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(DocState::default())),
            metadata: true,
            visibility: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// An empty document whose host offers no metadata graphs.
    #[must_use]
    pub fn without_metadata() -> Self {
        Self {
            metadata: false,
            ..Self::new()
        }
    }

    /// Append a text run.
    pub fn push_text(&self, text: &str) {
        lock(&self.state).content.push(Segment::Text(text.to_string()));
    }

    /// Append an untransformed field for `id`.
    pub fn push_field(&self, id: &str, value: &str) {
        self.push_slot(Some(id), None, false, value);
    }

    /// Append a field for `id` whose single-parameter trafo is `trafo`.
    pub fn push_transformed_field(&self, id: &str, trafo: &str, value: &str) {
        self.push_slot(Some(id), Some(trafo), true, value);
    }

    /// Append a field computed by `trafo` from the ids it declares.
    pub fn push_text_field(&self, trafo: &str, value: &str) {
        self.push_slot(None, Some(trafo), false, value);
    }

    fn push_slot(&self, id: Option<&str>, trafo: Option<&str>, single: bool, value: &str) {
        let mut state = lock(&self.state);
        let slot = state.allocate();
        state.content.push(Segment::Field(FieldSlot {
            slot,
            id: id.map(str::to_string),
            trafo: trafo.map(str::to_string),
            single,
            value: value.to_string(),
        }));
    }

    /// Register a visibility element belonging to `groups`.
    pub fn push_visibility_element(&self, groups: &[&str], visible: bool) {
        let element = MemoryVisibility {
            groups: groups.iter().map(|g| (*g).to_string()).collect(),
            visible: Mutex::new(visible),
        };
        self.visibility
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(Arc::new(element));
    }

    /// Visibility of every element, in registration order.
    #[must_use]
    pub fn visibility_states(&self) -> Vec<bool> {
        self.visibility
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|e| e.is_visible())
            .collect()
    }

    /// Allocate a host resource for function `name`.
    pub fn push_function_resource(&self, name: &str) {
        lock(&self.state).resources.insert(name.to_string());
    }

    /// Rendered document text.
    #[must_use]
    pub fn text(&self) -> String {
        lock(&self.state)
            .content
            .iter()
            .map(|seg| match seg {
                Segment::Text(t) => t.as_str(),
                Segment::Field(f) => f.value.as_str(),
                Segment::Mark(_) => "",
            })
            .collect()
    }

    /// Rendered content of every field bound to `id`.
    #[must_use]
    pub fn field_values(&self, id: &str) -> Vec<String> {
        lock(&self.state)
            .content
            .iter()
            .filter_map(|seg| match seg {
                Segment::Field(f) if f.id.as_deref() == Some(id) => Some(f.value.clone()),
                _ => None,
            })
            .collect()
    }

    /// Rendered content of the focused field.
    #[must_use]
    pub fn focused_value(&self) -> Option<String> {
        let mut state = lock(&self.state);
        let slot = state.focused?;
        state.field_mut(slot).map(|f| f.value.clone())
    }

    /// Number of notes carrying `label`.
    #[must_use]
    pub fn note_count(&self, label: &str) -> usize {
        lock(&self.state)
            .notes
            .iter()
            .filter(|(l, _)| l == label)
            .count()
    }

    /// Every literal stored under `predicate`, across all graphs.
    #[must_use]
    pub fn graph_literals(&self, predicate: &str) -> Vec<String> {
        lock(&self.state)
            .graphs
            .values()
            .flat_map(|g| g.statements.iter())
            .filter(|(p, _)| p == predicate)
            .map(|(_, v)| v.clone())
            .collect()
    }

    /// How often the metadata graphs were stored to document storage.
    #[must_use]
    pub fn store_count(&self) -> u64 {
        lock(&self.state).stores
    }
}

impl HostDocument for InMemoryDocument {
    fn is_modified(&self) -> bool {
        lock(&self.state).modified
    }

    fn set_modified(&self, modified: bool) {
        lock(&self.state).modified = modified;
    }

    fn notes(&self, label: &str) -> Result<Vec<String>, DocError> {
        Ok(lock(&self.state)
            .notes
            .iter()
            .filter(|(l, _)| l == label)
            .map(|(_, c)| c.clone())
            .collect())
    }

    fn write_notes(&self, label: &str, chunks: &[String]) -> Result<(), DocError> {
        let mut state = lock(&self.state);
        state.notes.retain(|(l, _)| l != label);
        state
            .notes
            .extend(chunks.iter().map(|c| (label.to_string(), c.clone())));
        state.modified = true;
        Ok(())
    }

    fn remove_notes(&self, label: &str) -> Result<(), DocError> {
        let mut state = lock(&self.state);
        let before = state.notes.len();
        state.notes.retain(|(l, _)| l != label);
        if state.notes.len() != before {
            state.modified = true;
        }
        Ok(())
    }

    fn metadata_access(&self) -> Option<Arc<dyn MetadataAccess>> {
        if !self.metadata {
            return None;
        }
        Some(Arc::new(MemoryMetadata {
            state: Arc::clone(&self.state),
        }))
    }

    fn function_resources(&self) -> Result<Vec<String>, DocError> {
        Ok(lock(&self.state).resources.iter().cloned().collect())
    }

    fn release_function_resource(&self, name: &str) -> Result<(), DocError> {
        let mut state = lock(&self.state);
        if state.resources.remove(name) {
            state.modified = true;
        }
        Ok(())
    }
}

impl FieldScanner for InMemoryDocument {
    fn scan_fields(&self) -> Result<Vec<Arc<dyn FormFieldHandle>>, DocError> {
        let state = lock(&self.state);
        Ok(state
            .content
            .iter()
            .filter_map(|seg| match seg {
                Segment::Field(f) => Some(Arc::new(MemoryField {
                    state: Arc::clone(&self.state),
                    slot: f.slot,
                }) as Arc<dyn FormFieldHandle>),
                _ => None,
            })
            .collect())
    }

    fn visibility_elements(&self) -> Vec<Arc<dyn VisibilityElement>> {
        self.visibility
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|e| Arc::clone(e) as Arc<dyn VisibilityElement>)
            .collect()
    }
}

// =============================================================================
// METADATA GRAPHS
// =============================================================================

struct MemoryMetadata {
    state: Arc<Mutex<DocState>>,
}

impl MetadataAccess for MemoryMetadata {
    fn find_graph(&self, type_uri: &str) -> Result<Option<Arc<dyn MetadataGraph>>, DocError> {
        if !lock(&self.state).graphs.contains_key(type_uri) {
            return Ok(None);
        }
        Ok(Some(Arc::new(MemoryGraph {
            state: Arc::clone(&self.state),
            type_uri: type_uri.to_string(),
        })))
    }

    fn create_graph(
        &self,
        file_name: &str,
        type_uri: &str,
    ) -> Result<Arc<dyn MetadataGraph>, DocError> {
        let mut state = lock(&self.state);
        if state.graphs.values().any(|g| g.file == file_name) {
            return Err(DocError::Host(format!("graph file '{}' already exists", file_name)));
        }
        state.graphs.insert(
            type_uri.to_string(),
            GraphState {
                file: file_name.to_string(),
                statements: Vec::new(),
            },
        );
        state.modified = true;
        Ok(Arc::new(MemoryGraph {
            state: Arc::clone(&self.state),
            type_uri: type_uri.to_string(),
        }))
    }

    fn store(&self) -> Result<(), DocError> {
        let mut state = lock(&self.state);
        state.stores = state.stores.saturating_add(1);
        Ok(())
    }
}

struct MemoryGraph {
    state: Arc<Mutex<DocState>>,
    type_uri: String,
}

impl MetadataGraph for MemoryGraph {
    fn literals(&self, predicate: &str) -> Result<Vec<String>, DocError> {
        let state = lock(&self.state);
        let graph = state
            .graphs
            .get(&self.type_uri)
            .ok_or_else(|| DocError::Host(format!("graph '{}' was removed", self.type_uri)))?;
        Ok(graph
            .statements
            .iter()
            .filter(|(p, _)| p == predicate)
            .map(|(_, v)| v.clone())
            .collect())
    }

    fn add_literal(&self, predicate: &str, value: &str) -> Result<(), DocError> {
        let mut state = lock(&self.state);
        let graph = state
            .graphs
            .get_mut(&self.type_uri)
            .ok_or_else(|| DocError::Host(format!("graph '{}' was removed", self.type_uri)))?;
        graph
            .statements
            .push((predicate.to_string(), value.to_string()));
        state.modified = true;
        Ok(())
    }

    fn remove_predicate(&self, predicate: &str) -> Result<(), DocError> {
        let mut state = lock(&self.state);
        let Some(graph) = state.graphs.get_mut(&self.type_uri) else {
            return Ok(());
        };
        let before = graph.statements.len();
        graph.statements.retain(|(p, _)| p != predicate);
        if graph.statements.len() != before {
            state.modified = true;
        }
        Ok(())
    }
}

// =============================================================================
// FIELDS
// =============================================================================

struct MemoryField {
    state: Arc<Mutex<DocState>>,
    slot: u64,
}

impl MemoryField {
    fn read<R>(&self, f: impl FnOnce(&FieldSlot) -> R) -> Option<R> {
        let mut state = lock(&self.state);
        state.field_mut(self.slot).map(|slot| f(slot))
    }
}

impl FormFieldHandle for MemoryField {
    fn field_id(&self) -> Option<String> {
        self.read(|f| f.id.clone()).flatten()
    }

    fn value(&self) -> String {
        self.read(|f| f.value.clone()).unwrap_or_default()
    }

    fn set_value(&self, value: &str) {
        let mut state = lock(&self.state);
        if let Some(field) = state.field_mut(self.slot) {
            field.value = value.to_string();
            state.modified = true;
        }
    }

    fn trafo_name(&self) -> Option<String> {
        self.read(|f| f.trafo.clone()).flatten()
    }

    fn is_single_parameter_trafo(&self) -> bool {
        self.read(|f| f.single).unwrap_or(false)
    }

    fn substitute_field_id(&self, old_id: &str, new_id: &str) -> Result<(), DocError> {
        let mut state = lock(&self.state);
        let field = state
            .field_mut(self.slot)
            .ok_or_else(|| DocError::Host("field was disposed".to_string()))?;
        if field.id.as_deref() != Some(old_id) {
            return Err(DocError::Host(format!("field is not bound to '{}'", old_id)));
        }
        field.id = Some(new_id.to_string());
        state.modified = true;
        Ok(())
    }

    fn anchor(&self) -> Option<Box<dyn TextAnchor>> {
        let mut state = lock(&self.state);
        let pos = state.position_of(self.slot)?;
        let mark = state.allocate();
        state.content.insert(pos, Segment::Mark(mark));
        Some(Box::new(MemoryAnchor {
            state: Arc::clone(&self.state),
            mark,
        }))
    }

    fn dispose(&self) {
        let mut state = lock(&self.state);
        if let Some(pos) = state.position_of(self.slot) {
            state.content.remove(pos);
            state.modified = true;
        }
    }

    fn focus(&self) {
        lock(&self.state).focused = Some(self.slot);
    }
}

struct MemoryAnchor {
    state: Arc<Mutex<DocState>>,
    mark: u64,
}

impl MemoryAnchor {
    fn insert(&self, segment: impl FnOnce(&mut DocState) -> Segment) -> Result<(), DocError> {
        let mut state = lock(&self.state);
        let pos = state
            .position_of_mark(self.mark)
            .ok_or_else(|| DocError::Host("anchor position lost".to_string()))?;
        let segment = segment(&mut *state);
        state.content.insert(pos, segment);
        state.modified = true;
        Ok(())
    }
}

impl TextAnchor for MemoryAnchor {
    fn insert_text(&mut self, text: &str) -> Result<(), DocError> {
        self.insert(|_| Segment::Text(text.to_string()))
    }

    fn insert_field(&mut self, id: &str) -> Result<(), DocError> {
        self.insert(|state| {
            Segment::Field(FieldSlot {
                slot: state.allocate(),
                id: Some(id.to_string()),
                trafo: None,
                single: false,
                value: String::new(),
            })
        })
    }
}

impl Drop for MemoryAnchor {
    fn drop(&mut self) {
        let mut state = lock(&self.state);
        if let Some(pos) = state.position_of_mark(self.mark) {
            state.content.remove(pos);
        }
    }
}

// =============================================================================
// VISIBILITY
// =============================================================================

#[derive(Debug)]
struct MemoryVisibility {
    groups: Vec<String>,
    visible: Mutex<bool>,
}

impl VisibilityElement for MemoryVisibility {
    fn groups(&self) -> Vec<String> {
        self.groups.clone()
    }

    fn is_visible(&self) -> bool {
        *self.visible.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn set_visible(&self, visible: bool) {
        *self.visible.lock().unwrap_or_else(PoisonError::into_inner) = visible;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn notes_replace_and_mark_modified() {
        let doc = InMemoryDocument::new();
        doc.write_notes("L", &["a".into(), "b".into()]).expect("write");
        assert!(doc.is_modified());
        assert_eq!(doc.notes("L").expect("read"), vec!["a", "b"]);
        doc.write_notes("L", &["c".into()]).expect("write");
        assert_eq!(doc.note_count("L"), 1);
    }

    #[test]
    fn graph_absent_until_created() {
        let doc = InMemoryDocument::new();
        let access = doc.metadata_access().expect("metadata");
        assert!(access.find_graph("T").expect("find").is_none());
        let graph = access.create_graph("f.rdf", "T").expect("create");
        graph.add_literal("p", "v").expect("add");
        assert_eq!(doc.graph_literals("p"), vec!["v"]);
        assert!(access.find_graph("T").expect("find").is_some());
    }

    #[test]
    fn no_metadata_facility() {
        assert!(InMemoryDocument::without_metadata().metadata_access().is_none());
    }

    #[test]
    fn anchor_replaces_field_in_place() {
        let doc = InMemoryDocument::new();
        doc.push_text("[");
        doc.push_field("Greeting", "hello");
        doc.push_text("]");
        let fields = doc.scan_fields().expect("scan");
        let mut anchor = fields[0].anchor().expect("anchor");
        fields[0].dispose();
        anchor.insert_text("Dear ").expect("text");
        anchor.insert_field("Name").expect("field");
        anchor.insert_text("!").expect("text");
        drop(anchor);
        assert_eq!(doc.text(), "[Dear !]");
        assert_eq!(doc.field_values("Name"), vec![String::new()]);
        assert!(doc.field_values("Greeting").is_empty());
    }
}
