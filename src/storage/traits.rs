// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

use async_trait::async_trait;
use thiserror::Error;

use crate::document::PersonDocument;
use crate::fingerprint::Fingerprint;
use super::schema::{CorpusSchema, SetSchemaOutcome};

/// Per-document result code reported by the document store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum StatusCode {
    Ok,
    NotFound,
    OutOfSpace,
    InternalError,
    IoError,
    InvalidArgument,
    Unavailable,
}

impl StatusCode {
    #[must_use]
    pub fn is_ok(self) -> bool {
        self == Self::Ok
    }

    /// Label used for metrics and logs.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Ok => "ok",
            Self::NotFound => "not_found",
            Self::OutOfSpace => "out_of_space",
            Self::InternalError => "internal_error",
            Self::IoError => "io_error",
            Self::InvalidArgument => "invalid_argument",
            Self::Unavailable => "unavailable",
        }
    }
}

#[derive(Error, Debug, Clone)]
pub enum StorageError {
    #[error("Document store unavailable: {0}")]
    Unavailable(String),
    #[error("Document store is out of space")]
    OutOfSpace,
    #[error("Schema change is incompatible for types {0:?}")]
    IncompatibleSchema(Vec<String>),
    #[error("Document store backend error: {0}")]
    Backend(String),
}

impl StorageError {
    /// Status code attributed to every id touched by a failed call.
    #[must_use]
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::Unavailable(_) => StatusCode::Unavailable,
            Self::OutOfSpace => StatusCode::OutOfSpace,
            Self::IncompatibleSchema(_) => StatusCode::InvalidArgument,
            Self::Backend(_) => StatusCode::InternalError,
        }
    }
}

/// Per-id results of one batch call, in request order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchOutcome {
    pub statuses: Vec<(String, StatusCode)>,
}

impl BatchOutcome {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, id: impl Into<String>, status: StatusCode) {
        self.statuses.push((id.into(), status));
    }

    /// Attribute a whole-call failure to every id.
    #[must_use]
    pub fn from_error<'a>(ids: impl IntoIterator<Item = &'a str>, error: &StorageError) -> Self {
        let status = error.status_code();
        Self {
            statuses: ids.into_iter().map(|id| (id.to_string(), status)).collect(),
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, StatusCode)> {
        self.statuses.iter().map(|(id, status)| (id.as_str(), *status))
    }

    #[must_use]
    pub fn count(&self, status: StatusCode) -> usize {
        self.statuses.iter().filter(|(_, s)| *s == status).count()
    }

    #[must_use]
    pub fn is_success(&self) -> bool {
        self.statuses.iter().all(|(_, s)| s.is_ok())
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.statuses.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.statuses.is_empty()
    }
}

/// What the store remembers about an indexed document for diffing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexedFingerprint {
    pub id: String,
    pub fingerprint: Fingerprint,
    pub creation_timestamp_millis: i64,
}

/// The search index, as seen by the indexer.
///
/// Batch calls report per-id status in the returned [`BatchOutcome`]; an
/// `Err` means the whole call failed and nothing can be said per id.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Insert or replace documents by id.
    async fn put_documents(&self, documents: Vec<PersonDocument>) -> Result<BatchOutcome, StorageError>;

    /// Remove documents by id. Missing ids report [`StatusCode::NotFound`].
    async fn remove_by_ids(&self, ids: &[String]) -> Result<BatchOutcome, StorageError>;

    /// Stored fingerprints for `ids`, positionally; `None` for unknown ids.
    async fn get_documents_with_fingerprint(
        &self,
        ids: &[String],
    ) -> Result<Vec<Option<IndexedFingerprint>>, StorageError>;

    /// Every indexed document id.
    async fn get_all_ids(&self) -> Result<Vec<String>, StorageError>;

    /// Install a schema. Incompatible changes fail unless `force` is set, in
    /// which case documents of the affected types are dropped.
    async fn set_schema(&self, schema: &CorpusSchema, force: bool) -> Result<SetSchemaOutcome, StorageError>;

    /// Currently installed schema, if any.
    async fn get_schema(&self) -> Result<Option<CorpusSchema>, StorageError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_error_attributes_every_id() {
        let outcome = BatchOutcome::from_error(["a", "b"], &StorageError::OutOfSpace);
        assert_eq!(outcome.len(), 2);
        assert_eq!(outcome.count(StatusCode::OutOfSpace), 2);
        assert!(!outcome.is_success());
    }

    #[test]
    fn test_error_status_codes() {
        assert_eq!(StorageError::Unavailable("x".into()).status_code(), StatusCode::Unavailable);
        assert_eq!(StorageError::Backend("x".into()).status_code(), StatusCode::InternalError);
    }

    #[test]
    fn test_empty_outcome_is_success() {
        assert!(BatchOutcome::new().is_success());
    }
}
