// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use parking_lot::RwLock;

use super::provider::{ChangeRow, ContactsProvider, ProviderError, UpdateLimit};
use super::record::ContactRecord;

#[derive(Default)]
struct ProviderState {
    contacts: BTreeMap<String, ContactRecord>,
    deleted: Vec<ChangeRow>,
    last_timestamp: i64,
}

impl ProviderState {
    /// Strictly increasing change timestamps, close to wall time.
    fn tick(&mut self) -> i64 {
        let now = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap_or_default()
            .as_millis() as i64;
        self.last_timestamp = now.max(self.last_timestamp + 1);
        self.last_timestamp
    }
}

/// In-memory contacts provider with a deletion log.
///
/// Every mutation stamps a strictly increasing timestamp, so change listings
/// behave like the real provider's `last updated` / `deleted` columns.
pub struct InMemoryContactsProvider {
    state: RwLock<ProviderState>,
    cursor_available: AtomicBool,
    updated_queries: AtomicUsize,
    deleted_queries: AtomicUsize,
    contact_queries: AtomicUsize,
}

impl InMemoryContactsProvider {
    #[must_use]
    pub fn new() -> Self {
        Self {
            state: RwLock::new(ProviderState::default()),
            cursor_available: AtomicBool::new(true),
            updated_queries: AtomicUsize::new(0),
            deleted_queries: AtomicUsize::new(0),
            contact_queries: AtomicUsize::new(0),
        }
    }

    /// Insert or replace a contact. Returns the change timestamp.
    pub fn upsert(&self, mut record: ContactRecord) -> i64 {
        let mut state = self.state.write();
        let timestamp = state.tick();
        record.last_updated_millis = timestamp;
        state.contacts.insert(record.id.clone(), record);
        timestamp
    }

    /// Edit an existing contact in place. Returns `None` if it does not exist.
    pub fn update(&self, id: &str, edit: impl FnOnce(&mut ContactRecord)) -> Option<i64> {
        let mut state = self.state.write();
        let timestamp = state.tick();
        let record = state.contacts.get_mut(id)?;
        edit(record);
        record.last_updated_millis = timestamp;
        Some(timestamp)
    }

    /// Delete a contact and log the deletion. Returns `None` if absent.
    pub fn delete(&self, id: &str) -> Option<i64> {
        let mut state = self.state.write();
        state.contacts.remove(id)?;
        let timestamp = state.tick();
        state.deleted.push(ChangeRow::new(id, timestamp));
        Some(timestamp)
    }

    /// Simulate the provider failing to produce cursors.
    pub fn set_cursor_available(&self, available: bool) {
        self.cursor_available.store(available, Ordering::SeqCst);
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.state.read().contacts.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.state.read().contacts.is_empty()
    }

    #[must_use]
    pub fn get(&self, id: &str) -> Option<ContactRecord> {
        self.state.read().contacts.get(id).cloned()
    }

    /// Number of `query_updated` calls served so far.
    #[must_use]
    pub fn updated_query_count(&self) -> usize {
        self.updated_queries.load(Ordering::SeqCst)
    }

    #[must_use]
    pub fn deleted_query_count(&self) -> usize {
        self.deleted_queries.load(Ordering::SeqCst)
    }

    #[must_use]
    pub fn contact_query_count(&self) -> usize {
        self.contact_queries.load(Ordering::SeqCst)
    }

    fn cursor_available(&self) -> bool {
        self.cursor_available.load(Ordering::SeqCst)
    }
}

impl Default for InMemoryContactsProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ContactsProvider for InMemoryContactsProvider {
    async fn query_updated(
        &self,
        since_millis: i64,
        limit: UpdateLimit,
    ) -> Result<Option<Vec<ChangeRow>>, ProviderError> {
        self.updated_queries.fetch_add(1, Ordering::SeqCst);
        if !self.cursor_available() {
            return Ok(None);
        }
        let state = self.state.read();
        let mut rows: Vec<ChangeRow> = state
            .contacts
            .values()
            .filter(|c| c.last_updated_millis > since_millis)
            .map(|c| ChangeRow::new(c.id.clone(), c.last_updated_millis))
            .collect();
        rows.sort_by(|a, b| b.timestamp_millis.cmp(&a.timestamp_millis));
        if let UpdateLimit::AtMost(max) = limit {
            rows.truncate(max);
        }
        Ok(Some(rows))
    }

    async fn query_deleted(&self, since_millis: i64) -> Result<Option<Vec<ChangeRow>>, ProviderError> {
        self.deleted_queries.fetch_add(1, Ordering::SeqCst);
        if !self.cursor_available() {
            return Ok(None);
        }
        let state = self.state.read();
        let rows = state
            .deleted
            .iter()
            .filter(|row| row.timestamp_millis > since_millis)
            .cloned()
            .collect();
        Ok(Some(rows))
    }

    async fn query_contacts(&self, ids: &[String]) -> Result<Option<Vec<ContactRecord>>, ProviderError> {
        self.contact_queries.fetch_add(1, Ordering::SeqCst);
        if !self.cursor_available() {
            return Ok(None);
        }
        let state = self.state.read();
        Ok(Some(ids.iter().filter_map(|id| state.contacts.get(id).cloned()).collect()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timestamps_strictly_increase() {
        let provider = InMemoryContactsProvider::new();
        let t1 = provider.upsert(ContactRecord::new("1", "A"));
        let t2 = provider.upsert(ContactRecord::new("2", "B"));
        let t3 = provider.update("1", |c| c.display_name = "A2".into()).unwrap();
        assert!(t1 < t2 && t2 < t3);
        assert_eq!(provider.get("1").unwrap().last_updated_millis, t3);
    }

    #[test]
    fn test_update_and_delete_missing_contact() {
        let provider = InMemoryContactsProvider::new();
        assert!(provider.update("nope", |_| {}).is_none());
        assert!(provider.delete("nope").is_none());
    }

    #[tokio::test]
    async fn test_query_updated_respects_since_and_limit() {
        let provider = InMemoryContactsProvider::new();
        let t1 = provider.upsert(ContactRecord::new("1", "A"));
        provider.upsert(ContactRecord::new("2", "B"));
        provider.upsert(ContactRecord::new("3", "C"));

        let rows = provider.query_updated(t1, UpdateLimit::None).await.unwrap().unwrap();
        let ids: Vec<_> = rows.iter().map(|r| r.contact_id.as_str()).collect();
        assert_eq!(ids, vec!["3", "2"]);

        let rows = provider.query_updated(0, UpdateLimit::AtMost(1)).await.unwrap().unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].contact_id, "3");
        assert_eq!(provider.updated_query_count(), 2);
    }

    #[tokio::test]
    async fn test_deletion_log() {
        let provider = InMemoryContactsProvider::new();
        provider.upsert(ContactRecord::new("1", "A"));
        provider.upsert(ContactRecord::new("2", "B"));
        let deleted_at = provider.delete("1").unwrap();

        let rows = provider.query_deleted(0).await.unwrap().unwrap();
        assert_eq!(rows, vec![ChangeRow::new("1", deleted_at)]);
        assert!(provider.query_deleted(deleted_at).await.unwrap().unwrap().is_empty());
        assert_eq!(provider.len(), 1);
    }

    #[tokio::test]
    async fn test_unavailable_cursor() {
        let provider = InMemoryContactsProvider::new();
        provider.set_cursor_available(false);
        assert!(provider.query_updated(0, UpdateLimit::None).await.unwrap().is_none());
        assert!(provider.query_deleted(0).await.unwrap().is_none());
        assert!(provider.query_contacts(&["1".into()]).await.unwrap().is_none());
    }
}
