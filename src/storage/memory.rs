// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use dashmap::DashMap;
use parking_lot::RwLock;

use crate::document::PersonDocument;
use super::schema::{check_compatibility, CorpusSchema, SchemaCompatibility, SetSchemaOutcome};
use super::traits::{BatchOutcome, DocumentStore, IndexedFingerprint, StatusCode, StorageError};

/// In-memory document store.
///
/// An optional capacity makes inserts of new ids fail with
/// [`StatusCode::OutOfSpace`] once full; replacing an existing id always
/// succeeds.
pub struct InMemoryDocumentStore {
    data: DashMap<String, PersonDocument>,
    schema: RwLock<Option<CorpusSchema>>,
    capacity: Option<usize>,
    put_calls: AtomicUsize,
    remove_calls: AtomicUsize,
}

impl InMemoryDocumentStore {
    #[must_use]
    pub fn new() -> Self {
        Self {
            data: DashMap::new(),
            schema: RwLock::new(None),
            capacity: None,
            put_calls: AtomicUsize::new(0),
            remove_calls: AtomicUsize::new(0),
        }
    }

    /// Store that holds at most `capacity` documents.
    #[must_use]
    pub fn with_capacity_limit(capacity: usize) -> Self {
        Self { capacity: Some(capacity), ..Self::new() }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    #[must_use]
    pub fn get(&self, id: &str) -> Option<PersonDocument> {
        self.data.get(id).map(|r| r.value().clone())
    }

    /// Sorted ids of all stored documents
    #[must_use]
    pub fn ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.data.iter().map(|r| r.key().clone()).collect();
        ids.sort();
        ids
    }

    /// Number of `put_documents` calls, including failed ones.
    #[must_use]
    pub fn put_call_count(&self) -> usize {
        self.put_calls.load(Ordering::SeqCst)
    }

    #[must_use]
    pub fn remove_call_count(&self) -> usize {
        self.remove_calls.load(Ordering::SeqCst)
    }

    /// Install a schema directly, bypassing compatibility checks.
    pub fn install_schema(&self, schema: CorpusSchema) {
        *self.schema.write() = Some(schema);
    }
}

impl Default for InMemoryDocumentStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DocumentStore for InMemoryDocumentStore {
    async fn put_documents(&self, documents: Vec<PersonDocument>) -> Result<BatchOutcome, StorageError> {
        self.put_calls.fetch_add(1, Ordering::SeqCst);
        let mut outcome = BatchOutcome::new();
        for doc in documents {
            let is_new = !self.data.contains_key(&doc.id);
            if is_new && self.capacity.is_some_and(|cap| self.data.len() >= cap) {
                outcome.record(doc.id, StatusCode::OutOfSpace);
                continue;
            }
            outcome.record(doc.id.clone(), StatusCode::Ok);
            self.data.insert(doc.id.clone(), doc);
        }
        Ok(outcome)
    }

    async fn remove_by_ids(&self, ids: &[String]) -> Result<BatchOutcome, StorageError> {
        self.remove_calls.fetch_add(1, Ordering::SeqCst);
        let mut outcome = BatchOutcome::new();
        for id in ids {
            let status = if self.data.remove(id).is_some() {
                StatusCode::Ok
            } else {
                StatusCode::NotFound
            };
            outcome.record(id.clone(), status);
        }
        Ok(outcome)
    }

    async fn get_documents_with_fingerprint(
        &self,
        ids: &[String],
    ) -> Result<Vec<Option<IndexedFingerprint>>, StorageError> {
        Ok(ids
            .iter()
            .map(|id| {
                self.data.get(id).map(|doc| IndexedFingerprint {
                    id: doc.id.clone(),
                    fingerprint: doc.fingerprint,
                    creation_timestamp_millis: doc.creation_timestamp_millis,
                })
            })
            .collect())
    }

    async fn get_all_ids(&self) -> Result<Vec<String>, StorageError> {
        Ok(self.data.iter().map(|r| r.key().clone()).collect())
    }

    async fn set_schema(&self, schema: &CorpusSchema, force: bool) -> Result<SetSchemaOutcome, StorageError> {
        let mut installed = self.schema.write();
        let outcome = match check_compatibility(installed.as_ref(), schema) {
            SchemaCompatibility::Incompatible(types) if !force => {
                return Err(StorageError::IncompatibleSchema(types));
            }
            SchemaCompatibility::Incompatible(types) => {
                // Contact points only live nested in persons, so every
                // stored document is affected.
                self.data.clear();
                SetSchemaOutcome { incompatible_types: types }
            }
            _ => SetSchemaOutcome::default(),
        };
        *installed = Some(schema.clone());
        Ok(outcome)
    }

    async fn get_schema(&self) -> Result<Option<CorpusSchema>, StorageError> {
        Ok(self.schema.read().clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::ContactRecord;
    use crate::storage::schema::SchemaType;

    fn doc(id: &str, name: &str) -> PersonDocument {
        PersonDocument::from_contact(&ContactRecord::new(id, name), 1)
    }

    #[tokio::test]
    async fn test_new_store_is_empty() {
        let store = InMemoryDocumentStore::new();
        assert!(store.is_empty());
        assert!(store.get_all_ids().await.unwrap().is_empty());
        assert!(store.get_schema().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_put_overwrites() {
        let store = InMemoryDocumentStore::new();
        store.put_documents(vec![doc("1", "Ada")]).await.unwrap();
        let outcome = store.put_documents(vec![doc("1", "Ada Lovelace")]).await.unwrap();

        assert!(outcome.is_success());
        assert_eq!(store.len(), 1);
        assert_eq!(store.get("1").unwrap().name, "Ada Lovelace");
        assert_eq!(store.put_call_count(), 2);
    }

    #[tokio::test]
    async fn test_remove_reports_not_found() {
        let store = InMemoryDocumentStore::new();
        store.put_documents(vec![doc("1", "Ada")]).await.unwrap();

        let outcome = store.remove_by_ids(&["1".into(), "2".into()]).await.unwrap();
        assert_eq!(outcome.count(StatusCode::Ok), 1);
        assert_eq!(outcome.count(StatusCode::NotFound), 1);
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn test_fingerprints_are_positional() {
        let store = InMemoryDocumentStore::new();
        let ada = doc("1", "Ada");
        store.put_documents(vec![ada.clone()]).await.unwrap();

        let found = store
            .get_documents_with_fingerprint(&["2".into(), "1".into()])
            .await
            .unwrap();
        assert!(found[0].is_none());
        let stored = found[1].as_ref().unwrap();
        assert_eq!(stored.fingerprint, ada.fingerprint);
        assert_eq!(stored.creation_timestamp_millis, 1);
    }

    #[tokio::test]
    async fn test_capacity_limit_rejects_new_ids_only() {
        let store = InMemoryDocumentStore::with_capacity_limit(2);
        let outcome = store
            .put_documents(vec![doc("1", "A"), doc("2", "B"), doc("3", "C")])
            .await
            .unwrap();
        assert_eq!(outcome.count(StatusCode::Ok), 2);
        assert_eq!(outcome.count(StatusCode::OutOfSpace), 1);

        // Replacing an existing document still fits
        let outcome = store.put_documents(vec![doc("1", "A2")]).await.unwrap();
        assert!(outcome.is_success());
        assert_eq!(store.len(), 2);
    }

    #[tokio::test]
    async fn test_set_schema_incompatible_requires_force() {
        let store = InMemoryDocumentStore::new();
        let mut old = CorpusSchema::person_corpus();
        old.types.push(SchemaType { name: "builtin:Legacy".into(), properties: Vec::new() });
        store.install_schema(old);
        store.put_documents(vec![doc("1", "Ada")]).await.unwrap();

        let new = CorpusSchema::person_corpus();
        let err = store.set_schema(&new, false).await.unwrap_err();
        assert!(matches!(err, StorageError::IncompatibleSchema(_)));
        assert_eq!(store.len(), 1);

        let outcome = store.set_schema(&new, true).await.unwrap();
        assert!(outcome.documents_dropped());
        assert!(store.is_empty());
        assert_eq!(store.get_schema().await.unwrap(), Some(new));
    }

    #[tokio::test]
    async fn test_concurrent_puts() {
        use std::sync::Arc;

        let store = Arc::new(InMemoryDocumentStore::new());
        let mut handles = vec![];
        for batch in 0..10 {
            let store = store.clone();
            handles.push(tokio::spawn(async move {
                let docs = (0..10).map(|i| doc(&format!("{batch}-{i}"), "X")).collect();
                store.put_documents(docs).await.unwrap();
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }
        assert_eq!(store.len(), 100);
    }
}
