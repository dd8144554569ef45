// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! The corpus update pipeline shared by delta and full updates.
//!
//! ```text
//! unwanted ids ──────────────────────────────► Delete ─┐
//! wanted ids ─► chunk ─► read rows ─► build doc ─► diff ─► ContactsBatcher ─► store
//!                 ▲                                  │
//!                 └── cancellation checked per batch ┘
//! ```

use std::collections::HashSet;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::batching::{BatchConfig, BatchEntry, ContactsBatcher, FlushReason};
use crate::document::PersonDocument;
use crate::error::UpdateError;
use crate::fingerprint::diff;
use crate::source::ContactsSourceAdapter;
use crate::stats::{now_millis, UpdateStats};
use crate::storage::DocumentStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MutationKind {
    Updated,
    Deleted,
}

/// A contact id and what happened to it, for one cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    pub contact_id: String,
    pub kind: MutationKind,
}

impl Candidate {
    pub fn updated(contact_id: impl Into<String>) -> Self {
        Self { contact_id: contact_id.into(), kind: MutationKind::Updated }
    }

    pub fn deleted(contact_id: impl Into<String>) -> Self {
        Self { contact_id: contact_id.into(), kind: MutationKind::Deleted }
    }
}

/// How a cycle that did not fail ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleCompletion {
    Completed,
    /// Stopped between chunks; what was accumulated has been flushed
    Cancelled,
}

/// Applies a set of wanted and unwanted ids to the document store.
#[derive(Clone)]
pub struct CorpusUpdater {
    source: ContactsSourceAdapter,
    store: Arc<dyn DocumentStore>,
    config: BatchConfig,
    keep_updating_on_error: bool,
}

impl CorpusUpdater {
    pub fn new(
        source: ContactsSourceAdapter,
        store: Arc<dyn DocumentStore>,
        config: BatchConfig,
        keep_updating_on_error: bool,
    ) -> Self {
        Self { source, store, config, keep_updating_on_error }
    }

    /// Delete `unwanted_ids`, then index `wanted_ids` in chunks.
    ///
    /// Deletions go first so that a full update never holds more documents
    /// than it is about to keep.
    pub async fn update_corpus(
        &self,
        wanted_ids: Vec<String>,
        unwanted_ids: Vec<String>,
        stats: &mut UpdateStats,
        cancel: &CancellationToken,
    ) -> Result<CycleCompletion, UpdateError> {
        let candidates: Vec<Candidate> = unwanted_ids
            .into_iter()
            .map(Candidate::deleted)
            .chain(wanted_ids.into_iter().map(Candidate::updated))
            .collect();
        self.apply(candidates, stats, cancel).await
    }

    /// Process candidates in order. Consecutive updated ids are read from
    /// the source one chunk at a time.
    ///
    /// An id listed both as deleted and updated was re-added: its delete is
    /// applied first and it is indexed again from scratch.
    pub async fn apply(
        &self,
        candidates: Vec<Candidate>,
        stats: &mut UpdateStats,
        cancel: &CancellationToken,
    ) -> Result<CycleCompletion, UpdateError> {
        let mut batcher = ContactsBatcher::new(self.store.clone(), self.config, self.keep_updating_on_error);
        let chunk_size = self.config.max_updates_per_flush.max(1);
        let mut chunk: Vec<String> = Vec::with_capacity(chunk_size);
        let deleted: HashSet<String> = candidates
            .iter()
            .filter(|c| c.kind == MutationKind::Deleted)
            .map(|c| c.contact_id.clone())
            .collect();

        for candidate in candidates {
            if cancel.is_cancelled() {
                return self.stop_cancelled(&mut batcher, stats).await;
            }
            match candidate.kind {
                MutationKind::Deleted => {
                    stats.contacts_to_delete += 1;
                    batcher.add(BatchEntry::Delete(candidate.contact_id), stats).await?;
                }
                MutationKind::Updated => {
                    stats.contacts_to_update += 1;
                    chunk.push(candidate.contact_id);
                    if chunk.len() < chunk_size {
                        continue;
                    }
                    let ids = std::mem::replace(&mut chunk, Vec::with_capacity(chunk_size));
                    self.index_chunk(&ids, &deleted, &mut batcher, stats).await?;
                }
            }
        }

        if cancel.is_cancelled() {
            return self.stop_cancelled(&mut batcher, stats).await;
        }
        if !chunk.is_empty() {
            self.index_chunk(&chunk, &deleted, &mut batcher, stats).await?;
        }
        batcher.flush(stats).await?;
        Ok(CycleCompletion::Completed)
    }

    async fn stop_cancelled(
        &self,
        batcher: &mut ContactsBatcher,
        stats: &mut UpdateStats,
    ) -> Result<CycleCompletion, UpdateError> {
        info!(
            kind = %stats.kind,
            pending_updates = batcher.pending_update_count(),
            pending_deletes = batcher.pending_delete_count(),
            "Update cancelled, flushing accumulated batch"
        );
        batcher.flush_with_reason(FlushReason::Cancelled, stats).await?;
        Ok(CycleCompletion::Cancelled)
    }

    async fn index_chunk(
        &self,
        ids: &[String],
        deleted: &HashSet<String>,
        batcher: &mut ContactsBatcher,
        stats: &mut UpdateStats,
    ) -> Result<(), UpdateError> {
        let contacts = self.source.get_contacts(ids).await?;
        let missing = ids.len().saturating_sub(contacts.len());
        if missing > 0 {
            debug!(missing, "Contacts vanished between listing and reading");
            stats.contacts_missing_from_source += missing;
        }
        if contacts.is_empty() {
            return Ok(());
        }

        let found_ids: Vec<String> = contacts.iter().map(|c| c.id.clone()).collect();
        let stored = match self.store.get_documents_with_fingerprint(&found_ids).await {
            Ok(stored) => stored,
            Err(e) => {
                warn!(error = %e, count = found_ids.len(), "Failed to read stored fingerprints");
                for _ in &found_ids {
                    stats.record_update_status(e.status_code());
                }
                if !self.keep_updating_on_error {
                    return Err(UpdateError::Aborted { failed: stats.failed_count() });
                }
                return Ok(());
            }
        };

        let now = now_millis();
        for (index, contact) in contacts.iter().enumerate() {
            let candidate = PersonDocument::from_contact(contact, now);
            let existing = if deleted.contains(&contact.id) {
                None
            } else {
                stored.get(index).and_then(Option::as_ref)
            };
            batcher.add(BatchEntry::Index(diff(candidate, existing)), stats).await?;
        }
        Ok(())
    }
}
