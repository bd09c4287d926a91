//! Hidden-note backend (the legacy format).

use super::MetadataStore;
use crate::host::HostDocument;
use crate::primitives::NOTE_CHUNK_LEN;
use crate::{DocError, MetadataKey};
use std::sync::Arc;

/// Stores each key in hidden notes labelled with the key's descriptor.
///
/// Values longer than [`NOTE_CHUNK_LEN`] characters are split over several
/// notes; an empty value is one empty note.
pub struct AnnotationStore {
    host: Arc<dyn HostDocument>,
}

impl std::fmt::Debug for AnnotationStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AnnotationStore").finish_non_exhaustive()
    }
}

impl AnnotationStore {
    /// Create a store over the notes of `host`.
    #[must_use]
    pub fn new(host: Arc<dyn HostDocument>) -> Self {
        Self { host }
    }
}

/// Split `value` into note-sized chunks; always at least one.
fn chunk(value: &str) -> Vec<String> {
    let chars: Vec<char> = value.chars().collect();
    if chars.is_empty() {
        return vec![String::new()];
    }
    chars
        .chunks(NOTE_CHUNK_LEN)
        .map(|c| c.iter().collect())
        .collect()
}

impl MetadataStore for AnnotationStore {
    fn get(&mut self, key: MetadataKey) -> Result<Option<String>, DocError> {
        let notes = self.host.notes(key.descriptor())?;
        if notes.is_empty() {
            return Ok(None);
        }
        Ok(Some(notes.concat()))
    }

    fn set(&mut self, key: MetadataKey, value: &str) -> Result<(), DocError> {
        self.host.write_notes(key.descriptor(), &chunk(value))
    }

    fn remove(&mut self, key: MetadataKey) -> Result<(), DocError> {
        self.host.remove_notes(key.descriptor())
    }

    fn flush(&mut self) -> Result<(), DocError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::InMemoryDocument;

    fn store() -> (InMemoryDocument, AnnotationStore) {
        let doc = InMemoryDocument::new();
        let store = AnnotationStore::new(Arc::new(doc.clone()));
        (doc, store)
    }

    #[test]
    fn empty_value_is_one_note() {
        let (doc, mut store) = store();
        store.set(MetadataKey::FormValues, "").expect("set");
        assert_eq!(doc.note_count("WollMuxFormularwerte"), 1);
        assert_eq!(store.get(MetadataKey::FormValues).expect("get"), Some(String::new()));
    }

    #[test]
    fn long_values_are_chunked() {
        let (doc, mut store) = store();
        let value = "x".repeat(NOTE_CHUNK_LEN * 2 + 1);
        store.set(MetadataKey::FormDescription, &value).expect("set");
        assert_eq!(doc.note_count("WollMuxFormularbeschreibung"), 3);
        assert_eq!(store.get(MetadataKey::FormDescription).expect("get"), Some(value));

        store.set(MetadataKey::FormDescription, "short").expect("set");
        assert_eq!(doc.note_count("WollMuxFormularbeschreibung"), 1);
    }

    #[test]
    fn exact_multiple_has_no_trailing_note() {
        assert_eq!(chunk(&"y".repeat(NOTE_CHUNK_LEN)).len(), 1);
        assert_eq!(chunk(&"ä".repeat(NOTE_CHUNK_LEN + 1)).len(), 2);
    }

    #[test]
    fn remove_deletes_every_chunk() {
        let (doc, mut store) = store();
        store
            .set(MetadataKey::MailMerge, &"z".repeat(NOTE_CHUNK_LEN + 5))
            .expect("set");
        store.remove(MetadataKey::MailMerge).expect("remove");
        assert_eq!(doc.note_count("WollMuxSeriendruck"), 0);
        assert_eq!(store.get(MetadataKey::MailMerge).expect("get"), None);
    }
}
