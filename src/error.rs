// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Errors surfaced by update cycles and the public instance API.

use thiserror::Error;

use crate::scheduler::SchedulerError;
use crate::settings::SettingsError;
use crate::source::SourceError;
use crate::storage::StorageError;
use crate::user::UserId;

/// Why an update cycle stopped without completing.
#[derive(Error, Debug)]
pub enum UpdateError {
    /// Could not determine what changed; watermarks stay put.
    #[error("Failed to read contacts source: {0}")]
    Source(#[from] SourceError),
    /// A whole-cycle document store call failed (e.g. listing indexed ids).
    #[error("Document store error: {0}")]
    Storage(#[from] StorageError),
    /// Failures were recorded and the cycle is configured not to continue.
    #[error("Update aborted after {failed} failed document operations")]
    Aborted { failed: usize },
}

/// Errors from the [`crate::UserInstance`] and [`crate::ContactsIndexerManager`] APIs.
#[derive(Error, Debug)]
pub enum IndexerError {
    #[error("Contacts indexer for user {0} is shut down")]
    ShutDown(UserId),
    #[error("No contacts indexer running for user {0}")]
    UnknownUser(UserId),
    #[error("Settings error: {0}")]
    Settings(#[from] SettingsError),
    #[error("Document store error: {0}")]
    Storage(#[from] StorageError),
    #[error("Job scheduler error: {0}")]
    Scheduler(#[from] SchedulerError),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
