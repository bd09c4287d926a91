//! # Metadata Persistence
//!
//! Small named metadata blocks are stored under one of four strategies:
//!
//! | Mode            | Reads                          | Writes           |
//! |-----------------|--------------------------------|------------------|
//! | `annotation`    | hidden notes                   | hidden notes     |
//! | `transition`    | notes, then graph (mirrored)   | notes and graph  |
//! | `rdfReadLegacy` | notes migrate into graph       | graph            |
//! | `rdf`           | graph                          | graph            |
//!
//! The hybrid strategies copy data between backends on read. Those copies
//! never change the host's "modified" flag.
//!
//! ## Error handling
//!
//! The leaf stores return `Result`. [`PersistentStore`] is the boundary where
//! storage errors are logged and turned into "no effect".

mod annotation;
mod graph;
mod legacy_read;
mod transition;

pub use annotation::AnnotationStore;
pub use graph::GraphStore;
pub use legacy_read::LegacyReadStore;
pub use transition::TransitionStore;

use crate::host::HostDocument;
use crate::{DocError, MetadataKey, PersistenceMode};
use std::sync::Arc;
use tracing::{debug, error, warn};

/// Contract shared by every persistence strategy.
pub trait MetadataStore: Send {
    /// Stored value of `key`, or `None` if absent.
    fn get(&mut self, key: MetadataKey) -> Result<Option<String>, DocError>;

    /// Store `value` under `key`, replacing any previous value.
    fn set(&mut self, key: MetadataKey, value: &str) -> Result<(), DocError>;

    /// Remove `key`.
    fn remove(&mut self, key: MetadataKey) -> Result<(), DocError>;

    /// Push buffered state into document storage.
    fn flush(&mut self) -> Result<(), DocError>;
}

// =============================================================================
// ERROR LOGGING HELPERS
// =============================================================================

/// Log a storage error and convert Result to Option.
#[inline]
fn log_and_convert<T>(result: Result<T, DocError>, context: &str) -> Option<T> {
    match result {
        Ok(v) => Some(v),
        Err(e) => {
            warn!("Storage error in {}: {}", context, e);
            None
        }
    }
}

/// Log a storage error and fall back to the default value.
#[inline]
fn log_and_default<T: Default>(result: Result<T, DocError>, context: &str) -> T {
    match result {
        Ok(v) => v,
        Err(e) => {
            warn!("Storage error in {}: {}", context, e);
            T::default()
        }
    }
}

/// Run `op` and restore the host's modified flag afterwards.
pub(crate) fn preserve_modified<T>(host: &dyn HostDocument, op: impl FnOnce() -> T) -> T {
    let modified = host.is_modified();
    let out = op();
    host.set_modified(modified);
    out
}

// =============================================================================
// PERSISTENT STORE
// =============================================================================

/// The persistence strategy of one open document, chosen once.
#[derive(Debug)]
pub enum PersistentStore {
    /// Hidden notes only.
    Annotation(AnnotationStore),
    /// Notes and graph, mirrored.
    Transition(TransitionStore),
    /// Graph, migrating legacy notes away.
    RdfReadLegacy(LegacyReadStore),
    /// Graph only.
    Rdf(GraphStore),
}

impl PersistentStore {
    /// The strategy actually in use.
    #[must_use]
    pub fn mode(&self) -> PersistenceMode {
        match self {
            Self::Annotation(_) => PersistenceMode::Annotation,
            Self::Transition(_) => PersistenceMode::Transition,
            Self::RdfReadLegacy(_) => PersistenceMode::RdfReadLegacy,
            Self::Rdf(_) => PersistenceMode::Rdf,
        }
    }

    fn inner(&mut self) -> &mut dyn MetadataStore {
        match self {
            Self::Annotation(s) => s,
            Self::Transition(s) => s,
            Self::RdfReadLegacy(s) => s,
            Self::Rdf(s) => s,
        }
    }

    /// Stored value of `key`; storage errors read as absent.
    pub fn get(&mut self, key: MetadataKey) -> Option<String> {
        log_and_convert(self.inner().get(key), "get").flatten()
    }

    /// Store `value` under `key`; storage errors are logged.
    pub fn set(&mut self, key: MetadataKey, value: &str) {
        log_and_default(self.inner().set(key, value), "set");
    }

    /// Remove `key`; storage errors are logged.
    pub fn remove(&mut self, key: MetadataKey) {
        log_and_default(self.inner().remove(key), "remove");
    }

    /// Flush buffered state; storage errors are logged.
    pub fn flush(&mut self) {
        log_and_default(self.inner().flush(), "flush");
    }
}

// =============================================================================
// STORE FACTORY
// =============================================================================

/// Builds the [`PersistentStore`] of a document.
#[derive(Debug, Clone, Copy, Default)]
pub struct StoreFactory;

impl StoreFactory {
    /// Resolve a configured mode name. Missing or unknown names select
    /// `transition`.
    #[must_use]
    pub fn resolve_mode(configured: Option<&str>) -> PersistenceMode {
        let fallback = PersistenceMode::default();
        match configured {
            None => {
                debug!("No persistence mode configured, using '{}'", fallback);
                fallback
            }
            Some(name) => PersistenceMode::from_name(name).unwrap_or_else(|| {
                error!(
                    "Unknown persistence mode '{}', using '{}' instead",
                    name, fallback
                );
                fallback
            }),
        }
    }

    /// Build the store for a configured mode name.
    pub fn create(host: Arc<dyn HostDocument>, configured: Option<&str>) -> PersistentStore {
        Self::create_for_mode(host, Self::resolve_mode(configured))
    }

    /// Build the store for `mode`, downgrading to annotations when the host
    /// has no metadata graph facility.
    pub fn create_for_mode(host: Arc<dyn HostDocument>, mode: PersistenceMode) -> PersistentStore {
        let annotations = AnnotationStore::new(Arc::clone(&host));
        let graph = match mode {
            PersistenceMode::Annotation => return PersistentStore::Annotation(annotations),
            _ => GraphStore::open(host.as_ref()),
        };
        match graph {
            Ok(graph) => match mode {
                PersistenceMode::Transition => {
                    PersistentStore::Transition(TransitionStore::new(host, annotations, graph))
                }
                PersistenceMode::RdfReadLegacy => {
                    PersistentStore::RdfReadLegacy(LegacyReadStore::new(host, annotations, graph))
                }
                _ => PersistentStore::Rdf(graph),
            },
            Err(e) => {
                warn!(
                    "{}; persistence mode '{}' falls back to 'annotation'",
                    e, mode
                );
                PersistentStore::Annotation(annotations)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::InMemoryDocument;

    #[test]
    fn unknown_and_missing_modes_select_transition() {
        assert_eq!(StoreFactory::resolve_mode(None), PersistenceMode::Transition);
        assert_eq!(
            StoreFactory::resolve_mode(Some("bogus")),
            PersistenceMode::Transition
        );
        assert_eq!(StoreFactory::resolve_mode(Some("RDF")), PersistenceMode::Rdf);
    }

    #[test]
    fn unsupported_backend_downgrades_to_annotation() {
        for mode in ["transition", "rdfReadLegacy", "rdf"] {
            let host: Arc<dyn HostDocument> = Arc::new(InMemoryDocument::without_metadata());
            let store = StoreFactory::create(host, Some(mode));
            assert_eq!(store.mode(), PersistenceMode::Annotation);
        }
    }

    #[test]
    fn factory_honours_mode() {
        let host: Arc<dyn HostDocument> = Arc::new(InMemoryDocument::new());
        let store = StoreFactory::create(host, Some("rdfreadlegacy"));
        assert_eq!(store.mode(), PersistenceMode::RdfReadLegacy);
    }

    #[test]
    fn preserve_modified_restores_flag() {
        let doc = InMemoryDocument::new();
        preserve_modified(&doc, || doc.set_modified(true));
        assert!(!doc.is_modified());
    }
}
