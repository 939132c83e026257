//! In-memory document store.
//!
//! Behaves like the SQLite backend (insertion order, duplicate detection,
//! filter and sort semantics) without touching the filesystem. Clones share
//! the same data.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use super::{document_id, Collection, Document, DocumentStore, Filter, Query, Result, StoreError};

#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    collections: Arc<Mutex<HashMap<Collection, Vec<Document>>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of documents currently held in a collection.
    pub fn count(&self, collection: Collection) -> usize {
        self.lock().get(&collection).map_or(0, Vec::len)
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<Collection, Vec<Document>>> {
        self.collections
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl DocumentStore for MemoryStore {
    async fn insert(&self, collection: Collection, document: Document) -> Result<()> {
        let id = document_id(&document)?.to_string();
        let mut collections = self.lock();
        let documents = collections.entry(collection).or_default();

        if documents
            .iter()
            .any(|existing| document_id(existing).is_ok_and(|existing| existing == id))
        {
            return Err(StoreError::DuplicateIdentity(id));
        }

        documents.push(document);
        Ok(())
    }

    async fn find_one(&self, collection: Collection, filter: &Filter) -> Result<Option<Document>> {
        Ok(self
            .lock()
            .get(&collection)
            .and_then(|documents| documents.iter().find(|d| filter.matches(d)).cloned()))
    }

    async fn find(&self, collection: Collection, query: &Query) -> Result<Vec<Document>> {
        let mut found: Vec<Document> = self
            .lock()
            .get(&collection)
            .map(|documents| {
                documents
                    .iter()
                    .filter(|d| query.filter.matches(d))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();

        if let Some(sort) = query.sort {
            found.sort_by(|a, b| sort.compare(a, b));
        }
        if let Some(limit) = query.limit {
            found.truncate(limit);
        }

        Ok(found)
    }

    async fn delete_many(&self, collection: Collection, filter: &Filter) -> Result<u64> {
        let mut collections = self.lock();
        let Some(documents) = collections.get_mut(&collection) else {
            return Ok(0);
        };

        let before = documents.len();
        documents.retain(|d| !filter.matches(d));
        Ok((before - documents.len()) as u64)
    }

    async fn delete_one(&self, collection: Collection, filter: &Filter) -> Result<u64> {
        let mut collections = self.lock();
        let Some(documents) = collections.get_mut(&collection) else {
            return Ok(0);
        };

        match documents.iter().position(|d| filter.matches(d)) {
            Some(index) => {
                documents.remove(index);
                Ok(1)
            }
            None => Ok(0),
        }
    }
}
