// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! # Contacts Indexer
//!
//! Incremental synchronization of a contacts provider into a search index.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                 User Instance Coordinator                   │
//! │  • One executor task per user, serializes all mutations    │
//! │  • Delta updates on change notifications (coalesced)       │
//! │  • Full updates from the periodic job / forced resync      │
//! │  • Persists watermarks after successful cycles             │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      Source Adapter                         │
//! │  • Changed / deleted ids since a watermark                 │
//! │  • Distinguishes "nothing changed" from "no cursor"        │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!                    (Fingerprint diff per chunk)
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                         Batcher                             │
//! │  • Pending updates / deletions with separate thresholds    │
//! │  • put + remove flushed together, results into stats       │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//!                       Document Store
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use contacts_indexer::{
//!     Collaborators, ContactRecord, ContactsIndexerConfig, InMemoryContactsProvider,
//!     InMemoryDocumentStore, InMemoryJobScheduler, UserId, UserInstance,
//! };
//! use tokio::sync::watch;
//!
//! # #[tokio::main]
//! # async fn main() {
//! let provider = Arc::new(InMemoryContactsProvider::new());
//! provider.upsert(ContactRecord::new("1", "Ada Lovelace"));
//!
//! let store = Arc::new(InMemoryDocumentStore::new());
//! let collaborators = Collaborators {
//!     store: store.clone(),
//!     provider: provider.clone(),
//!     scheduler: Arc::new(InMemoryJobScheduler::new()),
//! };
//!
//! let config = ContactsIndexerConfig::default();
//! let (_tx, rx) = watch::channel(config);
//! let instance = UserInstance::start(UserId(0), "./contacts_indexer/0", collaborators, rx)
//!     .await
//!     .expect("start failed");
//!
//! instance.wait_until_idle().await.expect("instance stopped");
//! assert_eq!(store.len(), 1);
//! instance.shutdown().await;
//! # }
//! ```
//!
//! ## Modules
//!
//! - [`coordinator`]: the per-user [`UserInstance`] state machine
//! - [`source`]: contacts provider seam and the change-listing adapter
//! - [`fingerprint`]: content fingerprints and new/changed/unchanged diffing
//! - [`batching`]: the [`ContactsBatcher`]
//! - [`indexer`]: the corpus update pipeline shared by delta and full updates
//! - [`settings`]: persisted watermarks and their binary codec
//! - [`storage`]: document store seam, schema compatibility, in-memory store
//! - [`scheduler`]: job scheduler seam for periodic full updates
//! - [`manager`]: multi-user registry

pub mod config;
pub mod error;
pub mod user;
pub mod document;
pub mod fingerprint;
pub mod source;
pub mod storage;
pub mod scheduler;
pub mod settings;
pub mod stats;
pub mod batching;
pub mod indexer;
pub mod coordinator;
pub mod manager;
pub mod metrics;

pub use config::ContactsIndexerConfig;
pub use error::{IndexerError, UpdateError};
pub use user::UserId;
pub use document::{ContactPoint, PersonDocument};
pub use fingerprint::{DiffDecision, DiffedDocument, Fingerprint};
pub use source::{
    ChangedIds, ContactRecord, ContactsProvider, ContactsSourceAdapter, InMemoryContactsProvider,
    LabeledValue, SourceError, UpdateLimit,
};
pub use storage::{
    BatchOutcome, CorpusSchema, DocumentStore, InMemoryDocumentStore, IndexedFingerprint,
    StatusCode, StorageError,
};
pub use scheduler::{InMemoryJobScheduler, JobScheduler, JobSpec, SchedulerError};
pub use settings::{IndexerSettings, SettingsFile};
pub use stats::{UpdateKind, UpdateStats};
pub use batching::{BatchConfig, BatchEntry, ContactsBatcher, FlushReason};
pub use indexer::{Candidate, CorpusUpdater, CycleCompletion, MutationKind};
pub use coordinator::{
    Collaborators, DeltaPhase, FullUpdateJobResult, IndexerState, Lifecycle, StateSnapshot, UserInstance,
};
pub use manager::ContactsIndexerManager;
pub use metrics::LatencyTimer;
