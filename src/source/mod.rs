// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Source adapter over the contacts provider.
//!
//! [`ContactsSourceAdapter`] turns raw provider change rows into ordered id
//! lists plus the watermark to resume from. Listing is read-only.
//!
//! # Ordering
//!
//! Ids come back most recently changed first, ties broken by id, each id at
//! most once. Rows are compared with a strict "greater than" against the
//! watermark, so the row that produced the watermark is never listed twice.
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use contacts_indexer::{ContactRecord, ContactsSourceAdapter, InMemoryContactsProvider, UpdateLimit};
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let provider = Arc::new(InMemoryContactsProvider::new());
//! provider.upsert(ContactRecord::new("1", "Ada"));
//! provider.upsert(ContactRecord::new("2", "Grace"));
//!
//! let adapter = ContactsSourceAdapter::new(provider);
//! let changed = adapter.list_updated_ids(0, UpdateLimit::None).await.unwrap();
//! assert_eq!(changed.ids, vec!["2".to_string(), "1".to_string()]);
//!
//! let again = adapter
//!     .list_updated_ids(changed.most_recent_change_millis, UpdateLimit::None)
//!     .await
//!     .unwrap();
//! assert!(again.ids.is_empty());
//! # }
//! ```

mod provider;
mod record;
pub mod memory;

pub use memory::InMemoryContactsProvider;
pub use provider::{ChangeRow, ContactsProvider, ProviderError, UpdateLimit};
pub use record::{ContactRecord, LabeledValue};

use std::collections::HashSet;
use std::sync::Arc;

use thiserror::Error;
use tracing::{debug, warn};

#[derive(Error, Debug, Clone)]
pub enum SourceError {
    /// The provider returned no cursor; the set of changes is unknown.
    #[error("Contacts provider returned no cursor for {query} query")]
    NoCursor { query: &'static str },
    #[error(transparent)]
    Provider(#[from] ProviderError),
}

/// Result of a change listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangedIds {
    /// Contact ids, most recently changed first.
    pub ids: Vec<String>,
    /// `max(since, newest listed timestamp)`: the watermark to resume from.
    pub most_recent_change_millis: i64,
}

impl ChangedIds {
    fn unchanged(since_millis: i64) -> Self {
        Self { ids: Vec::new(), most_recent_change_millis: since_millis }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.ids.len()
    }
}

/// Lists changed and deleted contacts since a watermark.
#[derive(Clone)]
pub struct ContactsSourceAdapter {
    provider: Arc<dyn ContactsProvider>,
}

impl ContactsSourceAdapter {
    pub fn new(provider: Arc<dyn ContactsProvider>) -> Self {
        Self { provider }
    }

    /// Ids of contacts updated after `since_millis`, bounded by `limit`.
    #[tracing::instrument(skip(self), level = "debug")]
    pub async fn list_updated_ids(
        &self,
        since_millis: i64,
        limit: UpdateLimit,
    ) -> Result<ChangedIds, SourceError> {
        let Some(rows) = self.provider.query_updated(since_millis, limit).await? else {
            warn!(since_millis, "Failed to get contacts updated since watermark: no cursor");
            crate::metrics::record_source_failure("updated");
            return Err(SourceError::NoCursor { query: "updated" });
        };
        let changed = order_change_rows(since_millis, rows, limit);
        debug!(count = changed.len(), watermark = changed.most_recent_change_millis, "Listed updated contacts");
        Ok(changed)
    }

    /// Ids of contacts deleted after `since_millis`.
    #[tracing::instrument(skip(self), level = "debug")]
    pub async fn list_deleted_ids(&self, since_millis: i64) -> Result<ChangedIds, SourceError> {
        let Some(rows) = self.provider.query_deleted(since_millis).await? else {
            warn!(since_millis, "Failed to get contacts deleted since watermark: no cursor");
            crate::metrics::record_source_failure("deleted");
            return Err(SourceError::NoCursor { query: "deleted" });
        };
        let changed = order_change_rows(since_millis, rows, UpdateLimit::None);
        debug!(count = changed.len(), watermark = changed.most_recent_change_millis, "Listed deleted contacts");
        Ok(changed)
    }

    /// Full rows for `ids`. Contacts deleted since listing are simply absent.
    pub async fn get_contacts(&self, ids: &[String]) -> Result<Vec<ContactRecord>, SourceError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        match self.provider.query_contacts(ids).await? {
            Some(records) => Ok(records),
            None => {
                warn!(requested = ids.len(), "Failed to read contact rows: no cursor");
                crate::metrics::record_source_failure("contacts");
                Err(SourceError::NoCursor { query: "contacts" })
            }
        }
    }
}

/// Filter, order, de-duplicate and bound raw rows; compute the new watermark.
fn order_change_rows(since_millis: i64, mut rows: Vec<ChangeRow>, limit: UpdateLimit) -> ChangedIds {
    rows.retain(|row| row.timestamp_millis > since_millis);
    if rows.is_empty() {
        return ChangedIds::unchanged(since_millis);
    }
    rows.sort_by(|a, b| {
        b.timestamp_millis
            .cmp(&a.timestamp_millis)
            .then_with(|| a.contact_id.cmp(&b.contact_id))
    });

    let mut seen = HashSet::with_capacity(rows.len());
    let mut ids = Vec::with_capacity(rows.len());
    let mut most_recent = since_millis;
    for row in rows {
        if limit.is_reached_by(ids.len()) {
            break;
        }
        if seen.insert(row.contact_id.clone()) {
            most_recent = most_recent.max(row.timestamp_millis);
            ids.push(row.contact_id);
        }
    }

    ChangedIds { ids, most_recent_change_millis: most_recent }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;

    /// Provider returning canned rows, or no cursor.
    struct CannedProvider {
        rows: Option<Vec<ChangeRow>>,
    }

    #[async_trait]
    impl ContactsProvider for CannedProvider {
        async fn query_updated(&self, _since: i64, _limit: UpdateLimit) -> Result<Option<Vec<ChangeRow>>, ProviderError> {
            Ok(self.rows.clone())
        }
        async fn query_deleted(&self, _since: i64) -> Result<Option<Vec<ChangeRow>>, ProviderError> {
            Ok(self.rows.clone())
        }
        async fn query_contacts(&self, _ids: &[String]) -> Result<Option<Vec<ContactRecord>>, ProviderError> {
            Ok(self.rows.as_ref().map(|_| Vec::new()))
        }
    }

    fn adapter(rows: Option<Vec<ChangeRow>>) -> ContactsSourceAdapter {
        ContactsSourceAdapter::new(Arc::new(CannedProvider { rows }))
    }

    #[test]
    fn test_order_is_newest_first_with_id_tiebreak() {
        let rows = vec![
            ChangeRow::new("b", 20),
            ChangeRow::new("a", 10),
            ChangeRow::new("c", 20),
            ChangeRow::new("d", 30),
        ];
        let changed = order_change_rows(0, rows, UpdateLimit::None);
        assert_eq!(changed.ids, vec!["d", "b", "c", "a"]);
        assert_eq!(changed.most_recent_change_millis, 30);
    }

    #[test]
    fn test_rows_at_watermark_are_excluded() {
        let rows = vec![ChangeRow::new("a", 10), ChangeRow::new("b", 11)];
        let changed = order_change_rows(10, rows, UpdateLimit::None);
        assert_eq!(changed.ids, vec!["b"]);
        assert_eq!(changed.most_recent_change_millis, 11);
    }

    #[test]
    fn test_empty_keeps_watermark() {
        let changed = order_change_rows(99, vec![ChangeRow::new("a", 5)], UpdateLimit::None);
        assert!(changed.is_empty());
        assert_eq!(changed.most_recent_change_millis, 99);
    }

    #[test]
    fn test_duplicates_collapse_to_newest() {
        let rows = vec![ChangeRow::new("a", 5), ChangeRow::new("a", 9), ChangeRow::new("b", 7)];
        let changed = order_change_rows(0, rows, UpdateLimit::None);
        assert_eq!(changed.ids, vec!["a", "b"]);
        assert_eq!(changed.most_recent_change_millis, 9);
    }

    #[test]
    fn test_limit_keeps_most_recent() {
        let rows = (1..=10).map(|i| ChangeRow::new(i.to_string(), i)).collect();
        let changed = order_change_rows(0, rows, UpdateLimit::AtMost(3));
        assert_eq!(changed.ids, vec!["10", "9", "8"]);
        assert_eq!(changed.most_recent_change_millis, 10);
    }

    #[tokio::test]
    async fn test_no_cursor_is_an_error_not_empty() {
        let adapter = adapter(None);
        let updated = adapter.list_updated_ids(0, UpdateLimit::None).await;
        assert!(matches!(updated, Err(SourceError::NoCursor { query: "updated" })));

        let deleted = adapter.list_deleted_ids(0).await;
        assert!(matches!(deleted, Err(SourceError::NoCursor { query: "deleted" })));

        let contacts = adapter.get_contacts(&["1".to_string()]).await;
        assert!(matches!(contacts, Err(SourceError::NoCursor { query: "contacts" })));
    }

    #[tokio::test]
    async fn test_empty_cursor_is_nothing_changed() {
        let adapter = adapter(Some(Vec::new()));
        let updated = adapter.list_updated_ids(42, UpdateLimit::None).await.unwrap();
        assert!(updated.is_empty());
        assert_eq!(updated.most_recent_change_millis, 42);
    }

    #[tokio::test]
    async fn test_get_contacts_skips_provider_for_empty_ids() {
        // No cursor would be an error; empty input never reaches the provider.
        let adapter = adapter(None);
        assert!(adapter.get_contacts(&[]).await.unwrap().is_empty());
    }
}
