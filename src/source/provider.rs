// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

use async_trait::async_trait;
use thiserror::Error;

use super::record::ContactRecord;

/// Row count bound for change listings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateLimit {
    /// Explicit "no limit" sentinel, used by full scans.
    None,
    /// At most this many rows.
    AtMost(usize),
}

impl UpdateLimit {
    /// Whether `count` rows fill this limit.
    #[must_use]
    pub fn is_reached_by(&self, count: usize) -> bool {
        match self {
            Self::None => false,
            Self::AtMost(max) => count >= *max,
        }
    }
}

impl From<Option<usize>> for UpdateLimit {
    fn from(limit: Option<usize>) -> Self {
        limit.map_or(Self::None, Self::AtMost)
    }
}

/// A change or deletion entry: which contact, and when.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeRow {
    pub contact_id: String,
    pub timestamp_millis: i64,
}

impl ChangeRow {
    pub fn new(contact_id: impl Into<String>, timestamp_millis: i64) -> Self {
        Self { contact_id: contact_id.into(), timestamp_millis }
    }
}

#[derive(Error, Debug, Clone)]
pub enum ProviderError {
    #[error("Contacts provider query failed: {0}")]
    Query(String),
}

/// Raw access to the contacts provider.
///
/// Every query may return `Ok(None)` when the provider could not produce a
/// cursor (e.g. it is restarting). Callers must not read that as "no rows".
#[async_trait]
pub trait ContactsProvider: Send + Sync {
    /// Contacts whose last-updated timestamp is strictly greater than
    /// `since_millis`, most recent first.
    async fn query_updated(
        &self,
        since_millis: i64,
        limit: UpdateLimit,
    ) -> Result<Option<Vec<ChangeRow>>, ProviderError>;

    /// Deletion log entries strictly newer than `since_millis`.
    async fn query_deleted(&self, since_millis: i64) -> Result<Option<Vec<ChangeRow>>, ProviderError>;

    /// Full contact rows for `ids`. Ids that no longer exist are omitted.
    async fn query_contacts(&self, ids: &[String]) -> Result<Option<Vec<ContactRecord>>, ProviderError>;
}
