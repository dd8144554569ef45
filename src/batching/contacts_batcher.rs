// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

use std::collections::HashSet;
use std::sync::Arc;

use tracing::{debug, warn};

use crate::document::PersonDocument;
use crate::error::UpdateError;
use crate::fingerprint::{DiffDecision, DiffedDocument};
use crate::stats::UpdateStats;
use crate::storage::{BatchOutcome, DocumentStore};
use super::{Batch, BatchConfig, FlushReason};

/// One unit of work for the batcher.
#[derive(Debug, Clone)]
pub enum BatchEntry {
    Index(DiffedDocument),
    Delete(String),
}

/// Accumulates writes and deletions for one update cycle.
///
/// `add` flushes as soon as either pending set reaches its threshold, so a
/// cycle that feeds exactly `max_updates_per_flush` documents makes exactly
/// one put call. Call [`ContactsBatcher::flush`] at the end of the cycle for
/// the remainder.
pub struct ContactsBatcher {
    store: Arc<dyn DocumentStore>,
    config: BatchConfig,
    keep_updating_on_error: bool,
    updates: Batch<PersonDocument>,
    deletes: Batch<String>,
    /// Pending ids that are not indexed yet
    new_ids: HashSet<String>,
    flushes: usize,
}

impl ContactsBatcher {
    pub fn new(store: Arc<dyn DocumentStore>, config: BatchConfig, keep_updating_on_error: bool) -> Self {
        Self {
            store,
            config,
            keep_updating_on_error,
            updates: Batch::new(),
            deletes: Batch::new(),
            new_ids: HashSet::new(),
            flushes: 0,
        }
    }

    /// Queue an entry, flushing if a threshold is reached.
    ///
    /// Unchanged documents are counted as skipped and never queued.
    pub async fn add(
        &mut self,
        entry: BatchEntry,
        stats: &mut UpdateStats,
    ) -> Result<Option<FlushReason>, UpdateError> {
        match entry {
            BatchEntry::Index(diffed) => {
                let is_new = diffed.decision == DiffDecision::New;
                let Some(doc) = diffed.into_indexable() else {
                    stats.contacts_update_skipped += 1;
                    return Ok(None);
                };
                if is_new {
                    self.new_ids.insert(doc.id.clone());
                }
                self.updates.push(doc);
                if self.updates.is_full(self.config.max_updates_per_flush) {
                    return self.flush_with_reason(FlushReason::UpdateCount, stats).await;
                }
            }
            BatchEntry::Delete(id) => {
                self.deletes.push(id);
                if self.deletes.is_full(self.config.max_deletes_per_flush) {
                    return self.flush_with_reason(FlushReason::DeleteCount, stats).await;
                }
            }
        }
        Ok(None)
    }

    /// Flush everything pending at the end of a cycle.
    pub async fn flush(&mut self, stats: &mut UpdateStats) -> Result<Option<FlushReason>, UpdateError> {
        self.flush_with_reason(FlushReason::EndOfCycle, stats).await
    }

    /// One remove call, then one put call. Per-id results go to `stats`; a
    /// failed call is attributed to every id it carried.
    ///
    /// Returns `Ok(None)` when nothing was pending.
    pub async fn flush_with_reason(
        &mut self,
        reason: FlushReason,
        stats: &mut UpdateStats,
    ) -> Result<Option<FlushReason>, UpdateError> {
        if self.updates.is_empty() && self.deletes.is_empty() {
            return Ok(None);
        }
        let age = self.updates.age().max(self.deletes.age());
        let docs = self.updates.take();
        let delete_ids = self.deletes.take();
        let update_ids: Vec<String> = docs.iter().map(|d| d.id.clone()).collect();
        let (update_count, delete_count) = (docs.len(), delete_ids.len());

        // Removes land before puts so a contact deleted and re-added in the
        // same cycle ends up indexed.
        let remove_result = if delete_ids.is_empty() {
            Ok(BatchOutcome::new())
        } else {
            self.store.remove_by_ids(&delete_ids).await
        };
        let put_result = if docs.is_empty() {
            Ok(BatchOutcome::new())
        } else {
            self.store.put_documents(docs).await
        };

        let put_outcome = put_result.unwrap_or_else(|e| {
            warn!(error = %e, count = update_count, "put_documents failed");
            BatchOutcome::from_error(update_ids.iter().map(String::as_str), &e)
        });
        let remove_outcome = remove_result.unwrap_or_else(|e| {
            warn!(error = %e, count = delete_count, "remove_by_ids failed");
            BatchOutcome::from_error(delete_ids.iter().map(String::as_str), &e)
        });

        let failed_before = stats.failed_count();
        for (id, status) in put_outcome.iter() {
            stats.record_update_status(status);
            if status.is_ok() && self.new_ids.contains(id) {
                stats.new_contacts_inserted += 1;
            }
        }
        for (_, status) in remove_outcome.iter() {
            stats.record_delete_status(status);
        }
        self.new_ids.clear();
        self.flushes += 1;

        let failed = stats.failed_count() - failed_before;
        crate::metrics::record_flush(reason, update_count, delete_count, failed);
        debug!(
            reason = reason.as_str(),
            updates = update_count,
            deletes = delete_count,
            failed,
            age_ms = age.as_millis() as u64,
            "Flushed batch"
        );

        if failed > 0 && !self.keep_updating_on_error {
            warn!(failed = stats.failed_count(), "Stopping update after failed batch");
            return Err(UpdateError::Aborted { failed: stats.failed_count() });
        }
        Ok(Some(reason))
    }

    #[must_use]
    pub fn pending_update_count(&self) -> usize {
        self.updates.len()
    }

    #[must_use]
    pub fn pending_delete_count(&self) -> usize {
        self.deletes.len()
    }

    /// Flushes that reached the store so far.
    #[must_use]
    pub fn flush_count(&self) -> usize {
        self.flushes
    }
}
