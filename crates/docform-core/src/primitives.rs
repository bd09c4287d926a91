//! # Fixed Constants
//!
//! Wire-level identifiers and limits for the docform CORE.
//!
//! These values are compiled into the binary and shared by every open
//! document. They are part of the on-disk format of existing documents and
//! must not change between releases.

/// XML namespace that marks docform metadata inside a document's RDF graph.
///
/// Every `MetadataKey` descriptor is appended to this prefix to form the
/// predicate URI of its triple.
pub const METADATA_NAMESPACE: &str = "http://www.wollmux.org/WollMuxMetadata#";

/// Type URI (relative to `METADATA_NAMESPACE`) of the metadata graph.
pub const METADATA_GRAPH_TYPE: &str = "WollMuxDaten";

/// File name of the metadata graph inside the document package.
pub const METADATA_GRAPH_FILE: &str = "wollmux.rdf";

/// Maximum number of characters a single hidden note may carry.
///
/// Longer values are split over several notes with the same label.
pub const NOTE_CHUNK_LEN: usize = 16000;

/// Name prefix of document-local functions generated by the autofunction
/// manager. Only functions carrying this prefix are garbage-collected.
pub const AUTOFUNCTION_PREFIX: &str = "AUTOFUNCTION_";

/// Version string recorded when a document carries no provenance block.
pub const VERSION_UNKNOWN: &str = "unknown";

/// Document kind value persisted by `mark_as_form_document`.
pub const FORM_DOCUMENT_TYPE: &str = "formDocument";

// =============================================================================
// BLOCK GRAMMAR SECTION NAMES
// =============================================================================

/// Root node of every serialized block.
pub const ROOT_SECTION: &str = "WM";

/// Section holding stored field values.
pub const VALUES_SECTION: &str = "Formularwerte";

/// Section holding the selected print functions.
pub const PRINT_FUNCTIONS_SECTION: &str = "Druckfunktionen";

/// Section holding one form definition.
pub const FORM_SECTION: &str = "Formular";

/// Section holding document-local function definitions.
pub const FUNCTIONS_SECTION: &str = "Funktionen";

/// Window layout section of a form definition.
pub const WINDOW_SECTION: &str = "Fenster";

/// Visibility rule section of a form definition.
pub const VISIBILITY_SECTION: &str = "Sichtbarkeit";

/// Section holding mail-merge settings.
pub const MAILMERGE_SECTION: &str = "Seriendruck";

/// Root of the fragment override block.
pub const OVERRIDE_FRAG_SECTION: &str = "overrideFrag";
