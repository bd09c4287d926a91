//! # redb-backed Host Document
//!
//! A document whose hidden notes and metadata graphs live in a redb
//! database file. It carries no text body, so scanning yields no fields;
//! the CLI uses it to inspect and edit document metadata.
//!
//! ## Durability
//!
//! - Notes and function resources are committed immediately, like edits to
//!   document content.
//! - Metadata graph writes are buffered and committed by
//!   [`MetadataAccess::store`], mirroring a host that keeps its RDF graphs in
//!   memory until they are stored into the document package.

use super::{
    FieldScanner, FormFieldHandle, HostDocument, MetadataAccess, MetadataGraph, VisibilityElement,
};
use crate::DocError;
use redb::{Database, ReadableDatabase, ReadableTable, TableDefinition};
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

/// Table for notes: label -> postcard-encoded chunk list
const NOTES: TableDefinition<&str, &[u8]> = TableDefinition::new("notes");

/// Table for graphs: type URI -> file name
const GRAPHS: TableDefinition<&str, &str> = TableDefinition::new("graphs");

/// Table for statements: (type URI, predicate) -> postcard-encoded literal list
const TRIPLES: TableDefinition<(&str, &str), &[u8]> = TableDefinition::new("triples");

/// Table for host resources allocated on behalf of functions
const RESOURCES: TableDefinition<&str, ()> = TableDefinition::new("resources");

/// Table for file-level facts: key -> value
const META: TableDefinition<&str, &str> = TableDefinition::new("meta");

/// On-disk layout version written into `META`.
const FORMAT_VERSION: &str = "1";

#[derive(Debug, Default)]
struct PendingGraphs {
    created: BTreeMap<String, String>,
    statements: BTreeMap<(String, String), Vec<String>>,
}

struct Inner {
    db: Database,
    modified: AtomicBool,
    pending: Mutex<PendingGraphs>,
}

/// A host document persisted in a redb database.
#[derive(Clone)]
pub struct RedbDocument {
    inner: Arc<Inner>,
}

impl std::fmt::Debug for RedbDocument {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedbDocument")
            .field("modified", &self.inner.modified.load(Ordering::SeqCst))
            .finish_non_exhaustive()
    }
}

impl RedbDocument {
    /// Open or create a document file at the given path.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, DocError> {
        let db = Database::create(path.as_ref()).map_err(|e| DocError::Io(e.to_string()))?;

        // Initialize tables if they don't exist
        {
            let write_txn = db.begin_write().map_err(|e| DocError::Io(e.to_string()))?;
            let _ = write_txn
                .open_table(NOTES)
                .map_err(|e| DocError::Io(e.to_string()))?;
            let _ = write_txn
                .open_table(GRAPHS)
                .map_err(|e| DocError::Io(e.to_string()))?;
            let _ = write_txn
                .open_table(TRIPLES)
                .map_err(|e| DocError::Io(e.to_string()))?;
            let _ = write_txn
                .open_table(RESOURCES)
                .map_err(|e| DocError::Io(e.to_string()))?;
            {
                let mut meta = write_txn
                    .open_table(META)
                    .map_err(|e| DocError::Io(e.to_string()))?;
                let existing = meta
                    .get("format")
                    .map_err(|e| DocError::Io(e.to_string()))?
                    .map(|v| v.value().to_string());
                match existing.as_deref() {
                    None => {
                        meta.insert("format", FORMAT_VERSION)
                            .map_err(|e| DocError::Io(e.to_string()))?;
                    }
                    Some(FORMAT_VERSION) => {}
                    Some(other) => {
                        return Err(DocError::Io(format!(
                            "unsupported document format version {}",
                            other
                        )));
                    }
                }
            }
            write_txn.commit().map_err(|e| DocError::Io(e.to_string()))?;
        }

        Ok(Self {
            inner: Arc::new(Inner {
                db,
                modified: AtomicBool::new(false),
                pending: Mutex::new(PendingGraphs::default()),
            }),
        })
    }

    /// Labels of every note stored in the document.
    pub fn note_labels(&self) -> Result<Vec<String>, DocError> {
        let read_txn = self
            .inner
            .db
            .begin_read()
            .map_err(|e| DocError::Io(e.to_string()))?;
        let table = read_txn
            .open_table(NOTES)
            .map_err(|e| DocError::Io(e.to_string()))?;
        let mut labels = Vec::new();
        for entry in table.iter().map_err(|e| DocError::Io(e.to_string()))? {
            let (key, _) = entry.map_err(|e| DocError::Io(e.to_string()))?;
            labels.push(key.value().to_string());
        }
        Ok(labels)
    }

    /// Allocate a host resource for function `name`.
    pub fn add_function_resource(&self, name: &str) -> Result<(), DocError> {
        let write_txn = self
            .inner
            .db
            .begin_write()
            .map_err(|e| DocError::Io(e.to_string()))?;
        {
            let mut table = write_txn
                .open_table(RESOURCES)
                .map_err(|e| DocError::Io(e.to_string()))?;
            table
                .insert(name, ())
                .map_err(|e| DocError::Io(e.to_string()))?;
        }
        write_txn.commit().map_err(|e| DocError::Io(e.to_string()))?;
        self.inner.modified.store(true, Ordering::SeqCst);
        Ok(())
    }
}

impl Inner {
    fn pending(&self) -> std::sync::MutexGuard<'_, PendingGraphs> {
        self.pending.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn committed_graph(&self, type_uri: &str) -> Result<bool, DocError> {
        let read_txn = self
            .db
            .begin_read()
            .map_err(|e| DocError::Io(e.to_string()))?;
        let table = read_txn
            .open_table(GRAPHS)
            .map_err(|e| DocError::Io(e.to_string()))?;
        Ok(table
            .get(type_uri)
            .map_err(|e| DocError::Io(e.to_string()))?
            .is_some())
    }

    fn committed_literals(&self, type_uri: &str, predicate: &str) -> Result<Vec<String>, DocError> {
        let read_txn = self
            .db
            .begin_read()
            .map_err(|e| DocError::Io(e.to_string()))?;
        let table = read_txn
            .open_table(TRIPLES)
            .map_err(|e| DocError::Io(e.to_string()))?;
        match table
            .get((type_uri, predicate))
            .map_err(|e| DocError::Io(e.to_string()))?
        {
            Some(data) => postcard::from_bytes::<Vec<String>>(data.value())
                .map_err(|e| DocError::Io(e.to_string())),
            None => Ok(Vec::new()),
        }
    }

    fn literals(&self, type_uri: &str, predicate: &str) -> Result<Vec<String>, DocError> {
        let key = (type_uri.to_string(), predicate.to_string());
        if let Some(buffered) = self.pending().statements.get(&key) {
            return Ok(buffered.clone());
        }
        self.committed_literals(type_uri, predicate)
    }
}

impl HostDocument for RedbDocument {
    fn is_modified(&self) -> bool {
        self.inner.modified.load(Ordering::SeqCst)
    }

    fn set_modified(&self, modified: bool) {
        self.inner.modified.store(modified, Ordering::SeqCst);
    }

    fn notes(&self, label: &str) -> Result<Vec<String>, DocError> {
        let read_txn = self
            .inner
            .db
            .begin_read()
            .map_err(|e| DocError::Io(e.to_string()))?;
        let table = read_txn
            .open_table(NOTES)
            .map_err(|e| DocError::Io(e.to_string()))?;
        match table.get(label).map_err(|e| DocError::Io(e.to_string()))? {
            Some(data) => postcard::from_bytes::<Vec<String>>(data.value())
                .map_err(|e| DocError::Io(e.to_string())),
            None => Ok(Vec::new()),
        }
    }

    fn write_notes(&self, label: &str, chunks: &[String]) -> Result<(), DocError> {
        let bytes = postcard::to_allocvec(chunks).map_err(|e| DocError::Io(e.to_string()))?;
        let write_txn = self
            .inner
            .db
            .begin_write()
            .map_err(|e| DocError::Io(e.to_string()))?;
        {
            let mut table = write_txn
                .open_table(NOTES)
                .map_err(|e| DocError::Io(e.to_string()))?;
            table
                .insert(label, bytes.as_slice())
                .map_err(|e| DocError::Io(e.to_string()))?;
        }
        write_txn.commit().map_err(|e| DocError::Io(e.to_string()))?;
        self.inner.modified.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn remove_notes(&self, label: &str) -> Result<(), DocError> {
        let write_txn = self
            .inner
            .db
            .begin_write()
            .map_err(|e| DocError::Io(e.to_string()))?;
        let removed = {
            let mut table = write_txn
                .open_table(NOTES)
                .map_err(|e| DocError::Io(e.to_string()))?;
            table
                .remove(label)
                .map_err(|e| DocError::Io(e.to_string()))?
                .is_some()
        };
        write_txn.commit().map_err(|e| DocError::Io(e.to_string()))?;
        if removed {
            self.inner.modified.store(true, Ordering::SeqCst);
        }
        Ok(())
    }

    fn metadata_access(&self) -> Option<Arc<dyn MetadataAccess>> {
        Some(Arc::new(RedbMetadata {
            inner: Arc::clone(&self.inner),
        }))
    }

    fn function_resources(&self) -> Result<Vec<String>, DocError> {
        let read_txn = self
            .inner
            .db
            .begin_read()
            .map_err(|e| DocError::Io(e.to_string()))?;
        let table = read_txn
            .open_table(RESOURCES)
            .map_err(|e| DocError::Io(e.to_string()))?;
        let mut names = Vec::new();
        for entry in table.iter().map_err(|e| DocError::Io(e.to_string()))? {
            let (key, _) = entry.map_err(|e| DocError::Io(e.to_string()))?;
            names.push(key.value().to_string());
        }
        Ok(names)
    }

    fn release_function_resource(&self, name: &str) -> Result<(), DocError> {
        let write_txn = self
            .inner
            .db
            .begin_write()
            .map_err(|e| DocError::Io(e.to_string()))?;
        let removed = {
            let mut table = write_txn
                .open_table(RESOURCES)
                .map_err(|e| DocError::Io(e.to_string()))?;
            table
                .remove(name)
                .map_err(|e| DocError::Io(e.to_string()))?
                .is_some()
        };
        write_txn.commit().map_err(|e| DocError::Io(e.to_string()))?;
        if removed {
            self.inner.modified.store(true, Ordering::SeqCst);
        }
        Ok(())
    }
}

impl FieldScanner for RedbDocument {
    fn scan_fields(&self) -> Result<Vec<Arc<dyn FormFieldHandle>>, DocError> {
        Ok(Vec::new())
    }

    fn visibility_elements(&self) -> Vec<Arc<dyn VisibilityElement>> {
        Vec::new()
    }
}

// =============================================================================
// METADATA GRAPHS
// =============================================================================

struct RedbMetadata {
    inner: Arc<Inner>,
}

impl MetadataAccess for RedbMetadata {
    fn find_graph(&self, type_uri: &str) -> Result<Option<Arc<dyn MetadataGraph>>, DocError> {
        let exists = self.inner.pending().created.contains_key(type_uri)
            || self.inner.committed_graph(type_uri)?;
        if !exists {
            return Ok(None);
        }
        Ok(Some(Arc::new(RedbMetadataGraph {
            inner: Arc::clone(&self.inner),
            type_uri: type_uri.to_string(),
        })))
    }

    fn create_graph(
        &self,
        file_name: &str,
        type_uri: &str,
    ) -> Result<Arc<dyn MetadataGraph>, DocError> {
        self.inner
            .pending()
            .created
            .insert(type_uri.to_string(), file_name.to_string());
        self.inner.modified.store(true, Ordering::SeqCst);
        Ok(Arc::new(RedbMetadataGraph {
            inner: Arc::clone(&self.inner),
            type_uri: type_uri.to_string(),
        }))
    }

    fn store(&self) -> Result<(), DocError> {
        let pending = std::mem::take(&mut *self.inner.pending());
        if pending.created.is_empty() && pending.statements.is_empty() {
            return Ok(());
        }

        let write_txn = self
            .inner
            .db
            .begin_write()
            .map_err(|e| DocError::Io(e.to_string()))?;
        {
            let mut graphs = write_txn
                .open_table(GRAPHS)
                .map_err(|e| DocError::Io(e.to_string()))?;
            for (type_uri, file_name) in &pending.created {
                graphs
                    .insert(type_uri.as_str(), file_name.as_str())
                    .map_err(|e| DocError::Io(e.to_string()))?;
            }

            let mut triples = write_txn
                .open_table(TRIPLES)
                .map_err(|e| DocError::Io(e.to_string()))?;
            for ((type_uri, predicate), literals) in &pending.statements {
                let key = (type_uri.as_str(), predicate.as_str());
                if literals.is_empty() {
                    triples
                        .remove(key)
                        .map_err(|e| DocError::Io(e.to_string()))?;
                } else {
                    let bytes = postcard::to_allocvec(literals)
                        .map_err(|e| DocError::Io(e.to_string()))?;
                    triples
                        .insert(key, bytes.as_slice())
                        .map_err(|e| DocError::Io(e.to_string()))?;
                }
            }
        }
        write_txn.commit().map_err(|e| DocError::Io(e.to_string()))?;
        Ok(())
    }
}

struct RedbMetadataGraph {
    inner: Arc<Inner>,
    type_uri: String,
}

impl MetadataGraph for RedbMetadataGraph {
    fn literals(&self, predicate: &str) -> Result<Vec<String>, DocError> {
        self.inner.literals(&self.type_uri, predicate)
    }

    fn add_literal(&self, predicate: &str, value: &str) -> Result<(), DocError> {
        let mut literals = self.inner.literals(&self.type_uri, predicate)?;
        literals.push(value.to_string());
        self.inner
            .pending()
            .statements
            .insert((self.type_uri.clone(), predicate.to_string()), literals);
        self.inner.modified.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn remove_predicate(&self, predicate: &str) -> Result<(), DocError> {
        if self.inner.literals(&self.type_uri, predicate)?.is_empty() {
            return Ok(());
        }
        self.inner
            .pending()
            .statements
            .insert((self.type_uri.clone(), predicate.to_string()), Vec::new());
        self.inner.modified.store(true, Ordering::SeqCst);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn notes_persist_after_reopen() {
        let temp = tempdir().expect("temp dir");
        let path = temp.path().join("doc.redb");
        {
            let doc = RedbDocument::open(&path).expect("open");
            doc.write_notes("L", &["a".into(), "b".into()]).expect("write");
            assert!(doc.is_modified());
        }
        {
            let doc = RedbDocument::open(&path).expect("reopen");
            assert!(!doc.is_modified());
            assert_eq!(doc.notes("L").expect("read"), vec!["a", "b"]);
            assert_eq!(doc.note_labels().expect("labels"), vec!["L"]);
        }
    }

    #[test]
    fn graph_writes_need_store() {
        let temp = tempdir().expect("temp dir");
        let path = temp.path().join("doc.redb");
        {
            let doc = RedbDocument::open(&path).expect("open");
            let access = doc.metadata_access().expect("metadata");
            let graph = access.create_graph("g.rdf", "T").expect("create");
            graph.add_literal("p", "lost").expect("add");
            assert_eq!(graph.literals("p").expect("read"), vec!["lost"]);
        }
        {
            let doc = RedbDocument::open(&path).expect("reopen");
            let access = doc.metadata_access().expect("metadata");
            assert!(access.find_graph("T").expect("find").is_none());
            let graph = access.create_graph("g.rdf", "T").expect("create");
            graph.add_literal("p", "kept").expect("add");
            access.store().expect("store");
        }
        {
            let doc = RedbDocument::open(&path).expect("reopen");
            let access = doc.metadata_access().expect("metadata");
            let graph = access.find_graph("T").expect("find").expect("graph");
            assert_eq!(graph.literals("p").expect("read"), vec!["kept"]);
            graph.remove_predicate("p").expect("remove");
            access.store().expect("store");
            assert!(graph.literals("p").expect("read").is_empty());
        }
    }

    #[test]
    fn resources_are_released() {
        let temp = tempdir().expect("temp dir");
        let doc = RedbDocument::open(temp.path().join("doc.redb")).expect("open");
        doc.add_function_resource("AUTOFUNCTION_1").expect("add");
        assert_eq!(doc.function_resources().expect("list"), vec!["AUTOFUNCTION_1"]);
        doc.release_function_resource("AUTOFUNCTION_1").expect("release");
        assert!(doc.function_resources().expect("list").is_empty());
    }
}
