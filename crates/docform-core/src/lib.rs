//! # docform-core
//!
//! The form engine of docform: binds form fields inside a text document to
//! named values and persists the document's metadata blocks.
//!
//! ## Layers
//!
//! - `storage`: four persistence strategies over two host backends (hidden
//!   annotations and a structured metadata graph), selected per document.
//! - `conf`: the parenthesis-delimited block grammar every stored block uses.
//! - `functions` / `trafo`: the trafo language and its evaluation.
//! - `fields`, `preset`, `substitution`, `simulation`: the field engine.
//! - `model`: [`DocumentModel`], the per-document facade.
//!
//! ## Architectural Constraints
//!
//! - The host document is reached only through the traits in `host`
//! - One lock per open document, never global
//! - Storage failures degrade to "no effect" and are logged, never raised
//! - No async, no network dependencies (pure Rust)

// =============================================================================
// MODULES
// =============================================================================

pub mod autofunction;
pub mod conf;
pub mod config;
pub mod fields;
pub mod form_description;
pub mod functions;
pub mod host;
pub mod model;
pub mod override_frag;
pub mod preset;
pub mod primitives;
pub mod print_functions;
pub mod simulation;
pub mod storage;
pub mod substitution;
pub mod trafo;
pub mod types;
pub mod values;

// =============================================================================
// RE-EXPORTS: Core Types (from types module)
// =============================================================================

pub use types::{DocError, FieldKey, MetadataKey, PersistenceMode, Preset};

// =============================================================================
// RE-EXPORTS: Engine
// =============================================================================

pub use autofunction::AutofunctionManager;
pub use conf::ConfNode;
pub use config::Settings;
pub use fields::{FieldBinding, FieldIndex, FormField};
pub use form_description::FormDescription;
pub use functions::{Function, FunctionRegistry};
pub use model::DocumentModel;
pub use override_frag::OverrideFragMap;
pub use preset::PresetResolver;
pub use print_functions::PrintFunctions;
pub use simulation::SimulationContext;
pub use substitution::{FieldSubstitution, SubstElement, SubstitutionEngine, SubstitutionOutcome};
pub use trafo::TrafoEngine;
pub use values::FieldValueTable;

// =============================================================================
// RE-EXPORTS: Persistence
// =============================================================================

pub use host::{HostDocument, InMemoryDocument, RedbDocument};
pub use storage::{MetadataStore, PersistentStore, StoreFactory};
