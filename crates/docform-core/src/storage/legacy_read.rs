//! Graph backend that drains legacy notes on first read.

use super::{AnnotationStore, GraphStore, MetadataStore, preserve_modified};
use crate::host::HostDocument;
use crate::{DocError, MetadataKey};
use std::sync::Arc;
use tracing::warn;

/// Reads migrate a legacy value into the graph and delete the note; the
/// note is deleted only once the graph write succeeded. Writes go to the
/// graph only and keep the legacy slot empty.
pub struct LegacyReadStore {
    host: Arc<dyn HostDocument>,
    legacy: AnnotationStore,
    graph: GraphStore,
}

impl std::fmt::Debug for LegacyReadStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LegacyReadStore")
            .field("legacy", &self.legacy)
            .field("graph", &self.graph)
            .finish_non_exhaustive()
    }
}

impl LegacyReadStore {
    /// Combine the two backends of `host`.
    #[must_use]
    pub fn new(host: Arc<dyn HostDocument>, legacy: AnnotationStore, graph: GraphStore) -> Self {
        Self {
            host,
            legacy,
            graph,
        }
    }
}

impl MetadataStore for LegacyReadStore {
    fn get(&mut self, key: MetadataKey) -> Result<Option<String>, DocError> {
        match self.legacy.get(key) {
            Ok(Some(value)) => {
                preserve_modified(self.host.as_ref(), || match self.graph.set(key, &value) {
                    Ok(()) => {
                        if let Err(e) = self.legacy.remove(key) {
                            warn!("Could not drop migrated legacy {}: {}", key, e);
                        }
                    }
                    Err(e) => warn!("Could not migrate legacy {} into the graph: {}", key, e),
                });
                return Ok(Some(value));
            }
            Ok(None) => {}
            Err(e) => warn!("Could not read legacy {}: {}", key, e),
        }
        self.graph.get(key)
    }

    fn set(&mut self, key: MetadataKey, value: &str) -> Result<(), DocError> {
        self.graph.set(key, value)?;
        self.legacy.remove(key)
    }

    fn remove(&mut self, key: MetadataKey) -> Result<(), DocError> {
        self.graph.remove(key)?;
        self.legacy.remove(key)
    }

    fn flush(&mut self) -> Result<(), DocError> {
        self.graph.flush()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::InMemoryDocument;

    const VALUES_PREDICATE: &str = "http://www.wollmux.org/WollMuxMetadata#WollMuxFormularwerte";

    fn store(doc: &InMemoryDocument) -> LegacyReadStore {
        let host: Arc<dyn HostDocument> = Arc::new(doc.clone());
        let graph = GraphStore::open(host.as_ref()).expect("graph");
        LegacyReadStore::new(Arc::clone(&host), AnnotationStore::new(host), graph)
    }

    #[test]
    fn legacy_value_migrates_once() {
        let doc = InMemoryDocument::new();
        AnnotationStore::new(Arc::new(doc.clone()))
            .set(MetadataKey::FormValues, "old")
            .expect("seed");
        doc.set_modified(false);

        let mut store = store(&doc);
        assert_eq!(store.get(MetadataKey::FormValues).expect("get"), Some("old".into()));
        assert!(!doc.is_modified());
        assert_eq!(doc.note_count("WollMuxFormularwerte"), 0);
        assert_eq!(doc.graph_literals(VALUES_PREDICATE), vec!["old"]);

        // second read is served by the graph alone
        assert_eq!(store.get(MetadataKey::FormValues).expect("get"), Some("old".into()));
    }

    #[test]
    fn writes_skip_legacy_notes() {
        let doc = InMemoryDocument::new();
        let mut store = store(&doc);
        store.set(MetadataKey::FormValues, "new").expect("set");
        assert_eq!(doc.note_count("WollMuxFormularwerte"), 0);
        assert_eq!(doc.graph_literals(VALUES_PREDICATE), vec!["new"]);
    }

    #[test]
    fn set_clears_stale_legacy_slot() {
        let doc = InMemoryDocument::new();
        AnnotationStore::new(Arc::new(doc.clone()))
            .set(MetadataKey::FormValues, "stale")
            .expect("seed");
        let mut store = store(&doc);
        store.set(MetadataKey::FormValues, "fresh").expect("set");
        assert_eq!(doc.note_count("WollMuxFormularwerte"), 0);
        assert_eq!(store.get(MetadataKey::FormValues).expect("get"), Some("fresh".into()));
    }
}
