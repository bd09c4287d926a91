//! Dual-format backend used while documents migrate to the graph format.

use super::{AnnotationStore, GraphStore, MetadataStore, preserve_modified};
use crate::host::HostDocument;
use crate::{DocError, MetadataKey};
use std::sync::Arc;
use tracing::warn;

/// Reads prefer the legacy notes and mirror whatever they find into the
/// other backend; writes go to both.
pub struct TransitionStore {
    host: Arc<dyn HostDocument>,
    legacy: AnnotationStore,
    graph: GraphStore,
}

impl std::fmt::Debug for TransitionStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransitionStore")
            .field("legacy", &self.legacy)
            .field("graph", &self.graph)
            .finish_non_exhaustive()
    }
}

impl TransitionStore {
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

impl MetadataStore for TransitionStore {
    fn get(&mut self, key: MetadataKey) -> Result<Option<String>, DocError> {
        match self.legacy.get(key) {
            Ok(Some(value)) => {
                let copied = preserve_modified(self.host.as_ref(), || self.graph.set(key, &value));
                if let Err(e) = copied {
                    warn!("Could not mirror {} into the metadata graph: {}", key, e);
                }
                return Ok(Some(value));
            }
            Ok(None) => {}
            Err(e) => warn!("Could not read legacy {}: {}", key, e),
        }

        let Some(value) = self.graph.get(key)? else {
            return Ok(None);
        };
        let copied = preserve_modified(self.host.as_ref(), || self.legacy.set(key, &value));
        if let Err(e) = copied {
            warn!("Could not mirror {} into legacy notes: {}", key, e);
        }
        Ok(Some(value))
    }

    fn set(&mut self, key: MetadataKey, value: &str) -> Result<(), DocError> {
        let legacy = self.legacy.set(key, value);
        let graph = self.graph.set(key, value);
        legacy.and(graph)
    }

    fn remove(&mut self, key: MetadataKey) -> Result<(), DocError> {
        let legacy = self.legacy.remove(key);
        let graph = self.graph.remove(key);
        legacy.and(graph)
    }

    fn flush(&mut self) -> Result<(), DocError> {
        let legacy = self.legacy.flush();
        let graph = self.graph.flush();
        legacy.and(graph)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::InMemoryDocument;

    fn store(doc: &InMemoryDocument) -> TransitionStore {
        let host: Arc<dyn HostDocument> = Arc::new(doc.clone());
        let graph = GraphStore::open(host.as_ref()).expect("graph");
        TransitionStore::new(Arc::clone(&host), AnnotationStore::new(host), graph)
    }

    #[test]
    fn legacy_value_is_copied_into_graph_without_modifying() {
        let doc = InMemoryDocument::new();
        let mut legacy = AnnotationStore::new(Arc::new(doc.clone()));
        legacy.set(MetadataKey::FormValues, "v").expect("seed");
        doc.set_modified(false);

        let mut store = store(&doc);
        assert_eq!(store.get(MetadataKey::FormValues).expect("get"), Some("v".into()));
        assert!(!doc.is_modified());
        assert_eq!(
            doc.graph_literals("http://www.wollmux.org/WollMuxMetadata#WollMuxFormularwerte"),
            vec!["v"]
        );
    }

    #[test]
    fn graph_value_is_copied_into_legacy() {
        let doc = InMemoryDocument::new();
        let mut graph = GraphStore::open(&doc).expect("graph");
        graph.set(MetadataKey::PrintFunctions, "p").expect("seed");
        doc.set_modified(true);

        let mut store = store(&doc);
        assert_eq!(store.get(MetadataKey::PrintFunctions).expect("get"), Some("p".into()));
        assert!(doc.is_modified());
        assert_eq!(doc.note_count("PrintFunction"), 1);
    }

    #[test]
    fn writes_reach_both_backends() {
        let doc = InMemoryDocument::new();
        let mut store = store(&doc);
        store.set(MetadataKey::MailMerge, "m").expect("set");
        assert_eq!(doc.note_count("WollMuxSeriendruck"), 1);
        assert_eq!(
            doc.graph_literals("http://www.wollmux.org/WollMuxMetadata#WollMuxSeriendruck"),
            vec!["m"]
        );
        store.remove(MetadataKey::MailMerge).expect("remove");
        assert_eq!(doc.note_count("WollMuxSeriendruck"), 0);
        assert_eq!(store.get(MetadataKey::MailMerge).expect("get"), None);
    }
}
