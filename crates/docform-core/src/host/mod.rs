//! # Host Document Interfaces
//!
//! The engine never touches a document's text model directly. Everything it
//! needs from the host application is expressed by the traits in this module:
//!
//! - [`HostDocument`]: modified flag, hidden notes, metadata graphs and
//!   per-function host resources.
//! - [`MetadataAccess`] / [`MetadataGraph`]: the structured (RDF-like) metadata
//!   facility. Hosts without one return `None` from
//!   [`HostDocument::metadata_access`].
//! - [`FormFieldHandle`] / [`TextAnchor`]: one field occurrence in the text.
//! - [`FieldScanner`] / [`VisibilityElement`]: discovery of fields and
//!   visibility-controlled regions.
//!
//! Two reference hosts ship with the crate: [`InMemoryDocument`] and the
//! disk-backed [`RedbDocument`].

mod memory;
mod redb_document;

pub use memory::InMemoryDocument;
pub use redb_document::RedbDocument;

use crate::DocError;
use std::sync::Arc;

/// The document a model is bound to.
///
/// Writes through this trait (notes, graphs, resources) mark the document
/// modified, exactly as user edits would.
pub trait HostDocument: Send + Sync {
    /// Current state of the "modified" flag.
    fn is_modified(&self) -> bool;

    /// Overwrite the "modified" flag.
    fn set_modified(&self, modified: bool);

    /// Contents of every hidden note carrying `label`, in document order.
    fn notes(&self, label: &str) -> Result<Vec<String>, DocError>;

    /// Replace every note carrying `label` by one note per chunk.
    fn write_notes(&self, label: &str, chunks: &[String]) -> Result<(), DocError>;

    /// Delete every note carrying `label`.
    fn remove_notes(&self, label: &str) -> Result<(), DocError>;

    /// The structured metadata facility, if the host has one.
    fn metadata_access(&self) -> Option<Arc<dyn MetadataAccess>>;

    /// Names of host resources allocated on behalf of functions.
    fn function_resources(&self) -> Result<Vec<String>, DocError>;

    /// Release the host resource allocated for function `name`.
    fn release_function_resource(&self, name: &str) -> Result<(), DocError>;
}

/// Access to the document's metadata graphs.
pub trait MetadataAccess: Send + Sync {
    /// The graph typed `type_uri`, if the document has one.
    fn find_graph(&self, type_uri: &str) -> Result<Option<Arc<dyn MetadataGraph>>, DocError>;

    /// Create a graph stored as `file_name` and typed `type_uri`.
    fn create_graph(
        &self,
        file_name: &str,
        type_uri: &str,
    ) -> Result<Arc<dyn MetadataGraph>, DocError>;

    /// Persist all metadata graphs into document storage.
    fn store(&self) -> Result<(), DocError>;
}

/// One metadata graph. Every statement has the document as its subject.
pub trait MetadataGraph: Send + Sync {
    /// Literal objects of every statement with `predicate`.
    fn literals(&self, predicate: &str) -> Result<Vec<String>, DocError>;

    /// Add the statement `(document, predicate, value)`.
    fn add_literal(&self, predicate: &str, value: &str) -> Result<(), DocError>;

    /// Remove every statement with `predicate`.
    fn remove_predicate(&self, predicate: &str) -> Result<(), DocError>;
}

/// One field occurrence inside the document text.
pub trait FormFieldHandle: Send + Sync {
    /// The id this handle was inserted for; `None` for fields whose ids come
    /// from the parameters of their trafo.
    fn field_id(&self) -> Option<String>;

    /// Currently rendered content.
    fn value(&self) -> String;

    /// Replace the rendered content.
    fn set_value(&self, value: &str);

    /// Name of the bound trafo, if any.
    fn trafo_name(&self) -> Option<String>;

    /// Whether the trafo receives the field's own value as its only input.
    fn is_single_parameter_trafo(&self) -> bool;

    /// Rebind this handle from `old_id` to `new_id` in place.
    fn substitute_field_id(&self, old_id: &str, new_id: &str) -> Result<(), DocError>;

    /// Insertion point at this handle's position, for replacing it.
    fn anchor(&self) -> Option<Box<dyn TextAnchor>>;

    /// Remove the handle and its content from the document.
    fn dispose(&self);

    /// Move the view cursor to this handle.
    fn focus(&self);
}

/// Insertion point in the document text. Inserted pieces appear in call order.
pub trait TextAnchor: Send {
    /// Insert plain text.
    fn insert_text(&mut self, text: &str) -> Result<(), DocError>;

    /// Insert a fresh, untransformed field for `id`.
    fn insert_field(&mut self, id: &str) -> Result<(), DocError>;
}

/// A region whose visibility is controlled by named groups.
pub trait VisibilityElement: Send + Sync {
    /// Groups this element belongs to.
    fn groups(&self) -> Vec<String>;

    /// Whether the element is currently shown.
    fn is_visible(&self) -> bool;

    /// Show or hide the element.
    fn set_visible(&self, visible: bool);
}

/// The scanning pass over document content.
pub trait FieldScanner: Send + Sync {
    /// Every field handle currently in the document, in document order.
    fn scan_fields(&self) -> Result<Vec<Arc<dyn FormFieldHandle>>, DocError>;

    /// Every visibility-controlled element, in document order.
    fn visibility_elements(&self) -> Vec<Arc<dyn VisibilityElement>>;
}
