//! Metadata-graph backend.

use super::MetadataStore;
use crate::host::{HostDocument, MetadataAccess, MetadataGraph};
use crate::primitives::{METADATA_GRAPH_FILE, METADATA_GRAPH_TYPE, METADATA_NAMESPACE};
use crate::{DocError, MetadataKey};
use std::sync::Arc;

/// Stores each key as one literal statement in the document's metadata
/// graph, with `<namespace><descriptor>` as predicate.
///
/// The graph is looked up on first use and created on first write only.
pub struct GraphStore {
    access: Arc<dyn MetadataAccess>,
    graph: Option<Arc<dyn MetadataGraph>>,
    type_uri: String,
    predicates: [String; MetadataKey::COUNT],
}

impl std::fmt::Debug for GraphStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GraphStore")
            .field("type_uri", &self.type_uri)
            .field("graph_open", &self.graph.is_some())
            .finish_non_exhaustive()
    }
}

impl GraphStore {
    /// Open the graph store of `host`.
    ///
    /// # Errors
    ///
    /// Returns `DocError::UnsupportedBackend` if the host has no metadata
    /// graph facility.
    pub fn open(host: &dyn HostDocument) -> Result<Self, DocError> {
        let access = host.metadata_access().ok_or(DocError::UnsupportedBackend)?;
        Ok(Self {
            access,
            graph: None,
            type_uri: format!("{}{}", METADATA_NAMESPACE, METADATA_GRAPH_TYPE),
            predicates: MetadataKey::ALL.map(|key| format!("{}{}", METADATA_NAMESPACE, key)),
        })
    }

    /// Predicate URI of `key`.
    #[must_use]
    pub fn predicate(&self, key: MetadataKey) -> &str {
        &self.predicates[key as usize]
    }

    fn existing_graph(&mut self) -> Result<Option<Arc<dyn MetadataGraph>>, DocError> {
        if let Some(graph) = &self.graph {
            return Ok(Some(Arc::clone(graph)));
        }
        let found = self.access.find_graph(&self.type_uri)?;
        self.graph.clone_from(&found);
        Ok(found)
    }

    fn graph_for_write(&mut self) -> Result<Arc<dyn MetadataGraph>, DocError> {
        if let Some(graph) = self.existing_graph()? {
            return Ok(graph);
        }
        let graph = self
            .access
            .create_graph(METADATA_GRAPH_FILE, &self.type_uri)?;
        self.graph = Some(Arc::clone(&graph));
        Ok(graph)
    }
}

impl MetadataStore for GraphStore {
    fn get(&mut self, key: MetadataKey) -> Result<Option<String>, DocError> {
        let Some(graph) = self.existing_graph()? else {
            return Ok(None);
        };
        Ok(graph.literals(self.predicate(key))?.into_iter().next())
    }

    fn set(&mut self, key: MetadataKey, value: &str) -> Result<(), DocError> {
        let graph = self.graph_for_write()?;
        let predicate = self.predicate(key);
        graph.remove_predicate(predicate)?;
        graph.add_literal(predicate, value)
    }

    fn remove(&mut self, key: MetadataKey) -> Result<(), DocError> {
        match self.existing_graph()? {
            Some(graph) => graph.remove_predicate(self.predicate(key)),
            None => Ok(()),
        }
    }

    fn flush(&mut self) -> Result<(), DocError> {
        self.access.store()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::InMemoryDocument;

    #[test]
    fn open_requires_metadata_facility() {
        let doc = InMemoryDocument::without_metadata();
        assert!(matches!(
            GraphStore::open(&doc),
            Err(DocError::UnsupportedBackend)
        ));
    }

    #[test]
    fn reads_do_not_create_the_graph() {
        let doc = InMemoryDocument::new();
        let mut store = GraphStore::open(&doc).expect("open");
        assert_eq!(store.get(MetadataKey::ToolVersion).expect("get"), None);
        store.remove(MetadataKey::ToolVersion).expect("remove");
        assert!(!doc.is_modified());
    }

    #[test]
    fn set_replaces_previous_statement() {
        let doc = InMemoryDocument::new();
        let mut store = GraphStore::open(&doc).expect("open");
        store.set(MetadataKey::DocumentKind, "a").expect("set");
        store.set(MetadataKey::DocumentKind, "b").expect("set");
        let predicate = store.predicate(MetadataKey::DocumentKind).to_string();
        assert_eq!(
            predicate,
            "http://www.wollmux.org/WollMuxMetadata#SetType"
        );
        assert_eq!(doc.graph_literals(&predicate), vec!["b"]);
        assert_eq!(store.get(MetadataKey::DocumentKind).expect("get"), Some("b".into()));
    }

    #[test]
    fn flush_stores_metadata() {
        let doc = InMemoryDocument::new();
        let mut store = GraphStore::open(&doc).expect("open");
        store.flush().expect("flush");
        assert_eq!(doc.store_count(), 1);
    }
}
