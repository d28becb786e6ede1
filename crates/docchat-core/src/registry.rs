//! In-memory document registry
//!
//! Holds the authoritative copy of every ingested document for the process
//! lifetime. Durable metadata storage is intentionally out of scope; the
//! registry exists so the chat pipeline has a stable `list_names` signal
//! for the relevance classifier and so deletion can hand back the
//! index identity that must be purged from the vector index.

use crate::{ChatError, DocumentKind, DocumentRecord, Result};
use std::collections::HashMap;
use std::sync::RwLock;
use uuid::Uuid;

/// Thread-safe registry of ingested documents, keyed by storage id
pub struct DocumentRegistry {
    docs: RwLock<HashMap<Uuid, DocumentRecord>>,
}

impl DocumentRegistry {
    pub fn new() -> Self {
        Self {
            docs: RwLock::new(HashMap::new()),
        }
    }

    /// Register a newly ingested document
    pub fn create(
        &self,
        name: impl Into<String>,
        kind: DocumentKind,
        content: impl Into<String>,
    ) -> DocumentRecord {
        let record = DocumentRecord::new(name, kind, content);
        let mut docs = self.docs.write().unwrap_or_else(|e| e.into_inner());
        docs.insert(record.id, record.clone());
        record
    }

    /// Look up a document by storage id
    pub fn get(&self, id: Uuid) -> Result<DocumentRecord> {
        let docs = self.docs.read().unwrap_or_else(|e| e.into_inner());
        docs.get(&id)
            .cloned()
            .ok_or_else(|| ChatError::NotFound(format!("document {id}")))
    }

    /// Remove a document, returning the record so the caller can purge the
    /// vector index by its `index_id`
    pub fn delete(&self, id: Uuid) -> Result<DocumentRecord> {
        let mut docs = self.docs.write().unwrap_or_else(|e| e.into_inner());
        docs.remove(&id)
            .ok_or_else(|| ChatError::NotFound(format!("document {id}")))
    }

    /// All documents, newest first
    pub fn list(&self) -> Vec<DocumentRecord> {
        let docs = self.docs.read().unwrap_or_else(|e| e.into_inner());
        let mut records: Vec<_> = docs.values().cloned().collect();
        records.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        records
    }

    /// Display names of all known documents (classifier signal)
    pub fn list_names(&self) -> Vec<String> {
        let docs = self.docs.read().unwrap_or_else(|e| e.into_inner());
        docs.values().map(|d| d.name.clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.docs.read().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for DocumentRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_get_delete() {
        let registry = DocumentRegistry::new();
        let record = registry.create("manual.pdf", DocumentKind::Pdf, "content");

        let fetched = registry.get(record.id).unwrap();
        assert_eq!(fetched.name, "manual.pdf");
        assert_eq!(fetched.index_id, record.index_id);

        let deleted = registry.delete(record.id).unwrap();
        assert_eq!(deleted.id, record.id);
        assert!(registry.get(record.id).is_err());
    }

    #[test]
    fn test_delete_missing_is_not_found() {
        let registry = DocumentRegistry::new();
        assert!(matches!(
            registry.delete(Uuid::new_v4()),
            Err(ChatError::NotFound(_))
        ));
    }

    #[test]
    fn test_list_names() {
        let registry = DocumentRegistry::new();
        registry.create("alpha-manual", DocumentKind::PlainText, "a");
        registry.create("beta-notes.md", DocumentKind::Markdown, "b");

        let mut names = registry.list_names();
        names.sort();
        assert_eq!(names, vec!["alpha-manual", "beta-notes.md"]);
    }
}
