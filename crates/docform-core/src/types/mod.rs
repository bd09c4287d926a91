//! # Core Type Definitions
//!
//! This module contains the shared vocabulary of the docform CORE:
//! - Metadata block identifiers (`MetadataKey`)
//! - Persistence strategy selection (`PersistenceMode`)
//! - Preset resolution outcome (`Preset`)
//! - Field handle identity (`FieldKey`)
//! - Error types (`DocError`)
//!
//! ## Determinism Guarantees
//!
//! All identifier types implement `Ord` so they can key `BTreeMap`/`BTreeSet`
//! and iterate in a stable order.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

// =============================================================================
// METADATA KEYS
// =============================================================================

/// Stable identifier of a persisted metadata block.
///
/// The descriptor doubles as the note label inside the annotation backend and
/// as the predicate suffix inside the graph backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum MetadataKey {
    /// Form description (window layout, visibility rules, local functions).
    FormDescription,
    /// Stored field values.
    FormValues,
    /// Selected print functions.
    PrintFunctions,
    /// Mail-merge settings.
    MailMerge,
    /// Document kind (e.g. `formDocument`).
    DocumentKind,
    /// Version of the tool that last touched the document.
    ToolVersion,
    /// Version of the host application that last touched the document.
    HostVersion,
    /// Function that generates the file name proposal on first save.
    FilenameGenerator,
    /// Fragment override map.
    OverrideFrag,
}

impl MetadataKey {
    /// Number of keys.
    pub const COUNT: usize = 9;

    /// Every key, in declaration order.
    pub const ALL: [MetadataKey; Self::COUNT] = [
        MetadataKey::FormDescription,
        MetadataKey::FormValues,
        MetadataKey::PrintFunctions,
        MetadataKey::MailMerge,
        MetadataKey::DocumentKind,
        MetadataKey::ToolVersion,
        MetadataKey::HostVersion,
        MetadataKey::FilenameGenerator,
        MetadataKey::OverrideFrag,
    ];

    /// The stable on-disk descriptor of this key.
    #[must_use]
    pub const fn descriptor(self) -> &'static str {
        match self {
            Self::FormDescription => "WollMuxFormularbeschreibung",
            Self::FormValues => "WollMuxFormularwerte",
            Self::PrintFunctions => "PrintFunction",
            Self::MailMerge => "WollMuxSeriendruck",
            Self::DocumentKind => "SetType",
            Self::ToolVersion => "WollMuxVersion",
            Self::HostVersion => "OOoVersion",
            Self::FilenameGenerator => "FilenameGeneratorFunction",
            Self::OverrideFrag => "OverrideFrag",
        }
    }

    /// Look a key up by its descriptor.
    #[must_use]
    pub fn from_descriptor(descriptor: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|key| key.descriptor() == descriptor)
    }
}

impl fmt::Display for MetadataKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.descriptor())
    }
}

// =============================================================================
// PERSISTENCE MODE
// =============================================================================

/// Which persistence strategy a document model runs with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum PersistenceMode {
    /// Hidden notes only (legacy format).
    Annotation,
    /// Notes and graph, mirrored in both directions.
    #[default]
    Transition,
    /// Graph only, legacy notes are migrated away on first read.
    RdfReadLegacy,
    /// Graph only.
    Rdf,
}

impl PersistenceMode {
    /// Configuration spelling of this mode.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Annotation => "annotation",
            Self::Transition => "transition",
            Self::RdfReadLegacy => "rdfReadLegacy",
            Self::Rdf => "rdf",
        }
    }

    /// Parse a configured mode name, case-insensitively.
    ///
    /// Returns `None` for unknown names; callers decide on the default.
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        [Self::Annotation, Self::Transition, Self::RdfReadLegacy, Self::Rdf]
            .into_iter()
            .find(|mode| mode.name().eq_ignore_ascii_case(name.trim()))
    }
}

impl fmt::Display for PersistenceMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

// =============================================================================
// PRESET
// =============================================================================

/// The value a field should show when a document is (re)opened.
///
/// `Unknown` is a distinct variant, so no legitimate field content can ever
/// be mistaken for it.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Preset {
    /// The fields agree on this value.
    Value(String),
    /// No consistent value could be determined.
    Unknown,
}

impl Preset {
    /// The determined value, if any.
    #[must_use]
    pub fn as_value(&self) -> Option<&str> {
        match self {
            Self::Value(v) => Some(v),
            Self::Unknown => None,
        }
    }

    /// Check whether no value could be determined.
    #[must_use]
    pub fn is_unknown(&self) -> bool {
        matches!(self, Self::Unknown)
    }
}

// =============================================================================
// FIELD IDENTITY
// =============================================================================

/// Identity of one discovered field handle within a scan.
///
/// A multi-parameter handle is listed under several ids but keeps one key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct FieldKey(pub u64);

// =============================================================================
// ERROR TYPES
// =============================================================================

/// Errors that can occur in the docform CORE.
///
/// Storage and parse failures are logged and degraded at the store and codec
/// boundaries; only editing errors reach interactive callers.
#[derive(Debug, Error)]
pub enum DocError {
    /// The host cannot provide a structured metadata graph.
    #[error("Metadata graph backend not supported by this document")]
    UnsupportedBackend,

    /// A stored block failed to parse.
    #[error("Malformed block: {0}")]
    MalformedBlock(String),

    /// Attempt to edit a function that is not document-local.
    #[error("Function '{0}' is not defined in this document and cannot be changed")]
    IllegalRebind(String),

    /// An override mapping would create a transitive chain.
    #[error("Fragment '{0}' already takes part in another override; chains are not allowed")]
    ChainedOverride(String),

    /// The id is already active in its namespace.
    #[error("Duplicate id: {0}")]
    DuplicateId(String),

    /// A function definition could not be parsed.
    #[error("Invalid function definition: {0}")]
    InvalidFunction(String),

    /// The host document rejected an operation.
    #[error("Host error: {0}")]
    Host(String),

    /// An I/O error occurred.
    #[error("I/O error: {0}")]
    Io(String),
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn descriptors_are_unique() {
        let mut seen = std::collections::BTreeSet::new();
        for key in MetadataKey::ALL {
            assert!(seen.insert(key.descriptor()), "duplicate {}", key);
        }
    }

    #[test]
    fn descriptor_lookup_roundtrips() {
        for key in MetadataKey::ALL {
            assert_eq!(MetadataKey::from_descriptor(key.descriptor()), Some(key));
        }
        assert_eq!(MetadataKey::from_descriptor("nope"), None);
    }

    #[test]
    fn mode_names_are_case_insensitive() {
        assert_eq!(
            PersistenceMode::from_name("RDFREADLEGACY"),
            Some(PersistenceMode::RdfReadLegacy)
        );
        assert_eq!(PersistenceMode::from_name(" rdf "), Some(PersistenceMode::Rdf));
        assert_eq!(PersistenceMode::from_name("notes"), None);
    }

    #[test]
    fn unknown_preset_never_equals_a_value() {
        assert_ne!(Preset::Unknown, Preset::Value(String::new()));
        assert_eq!(Preset::Value("A".into()).as_value(), Some("A"));
        assert!(Preset::Unknown.is_unknown());
    }
}
