// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! User instance coordinator.
//!
//! A [`UserInstance`] owns one user's sync lifecycle. All of its state lives
//! on a single executor task that drains a command channel; delta and full
//! update cycles are futures polled on that same task, so they interleave
//! only at await points and need no locks.
//!
//! # States
//!
//! ```text
//!                 change                         change
//!   Idle ─────────────────► DeltaUpdateRunning ─────────► DeltaUpdatePendingRerun
//!    ▲                          │       ▲                        │   (further changes
//!    └──────── done ────────────┘       └──────── done ──────────┘    collapse here)
//!
//!   job / forced resync ─► FullUpdateRunning (may overlap with a delta update)
//! ```
//!
//! Delta updates are authoritative for the contact watermarks and the
//! last-delta timestamp; full updates only write the last-full timestamp.
//! Watermarks are persisted after a cycle completes, never after a failure
//! or cancellation.
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use contacts_indexer::{
//!     Collaborators, ContactsIndexerConfig, InMemoryContactsProvider, InMemoryDocumentStore,
//!     InMemoryJobScheduler, UserId, UserInstance,
//! };
//! use tokio::sync::watch;
//!
//! # #[tokio::main]
//! # async fn main() {
//! let collaborators = Collaborators {
//!     store: Arc::new(InMemoryDocumentStore::new()),
//!     provider: Arc::new(InMemoryContactsProvider::new()),
//!     scheduler: Arc::new(InMemoryJobScheduler::new()),
//! };
//! let (_tx, rx) = watch::channel(ContactsIndexerConfig::default());
//! let instance = UserInstance::start(UserId(0), "/tmp/contacts_indexer/0", collaborators, rx)
//!     .await
//!     .expect("start failed");
//!
//! instance.on_contacts_changed().expect("instance stopped");
//! let snapshot = instance.wait_until_idle().await.expect("instance stopped");
//! println!("delta updates so far: {}", snapshot.completed_delta_updates);
//! instance.shutdown().await;
//! # }
//! ```

mod types;
mod worker;
mod lifecycle;
mod delta;
mod full;

pub use types::{DeltaPhase, FullUpdateJobResult, IndexerState, Lifecycle, StateSnapshot};

use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::warn;

use crate::config::ContactsIndexerConfig;
use crate::error::IndexerError;
use crate::scheduler::JobScheduler;
use crate::settings::IndexerSettings;
use crate::source::{ContactsProvider, ContactsSourceAdapter};
use crate::storage::DocumentStore;
use crate::user::UserId;

/// External systems a user instance talks to.
#[derive(Clone)]
pub struct Collaborators {
    pub store: Arc<dyn DocumentStore>,
    pub provider: Arc<dyn ContactsProvider>,
    pub scheduler: Arc<dyn JobScheduler>,
}

pub(crate) enum Command {
    ContactsChanged,
    RunFullUpdate {
        cancel: CancellationToken,
        reply: Option<oneshot::Sender<FullUpdateJobResult>>,
    },
    /// Answered once every earlier command has been handled
    Ping(oneshot::Sender<()>),
    Shutdown(oneshot::Sender<()>),
}

/// Inputs of one update cycle, owned by its future.
pub(crate) struct CycleContext {
    pub user: UserId,
    pub source: ContactsSourceAdapter,
    pub store: Arc<dyn DocumentStore>,
    pub scheduler: Arc<dyn JobScheduler>,
    pub config: ContactsIndexerConfig,
    /// Watermarks when the cycle started
    pub settings: IndexerSettings,
    pub cancel: CancellationToken,
}

/// Handle to one user's running indexer.
///
/// Cheap to share behind an `Arc`; every method only sends a command or
/// reads the published [`StateSnapshot`].
pub struct UserInstance {
    user: UserId,
    commands: mpsc::UnboundedSender<Command>,
    state_rx: watch::Receiver<StateSnapshot>,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl UserInstance {
    #[must_use]
    pub fn user(&self) -> UserId {
        self.user
    }

    /// The contacts provider reported a change. Starts a delta update, or
    /// queues one rerun if a delta update is already running.
    pub fn on_contacts_changed(&self) -> Result<(), IndexerError> {
        self.send(Command::ContactsChanged)
    }

    /// Entry point for the scheduled full-update job. Resolves when the full
    /// update ends. Cancelling `cancel` stops it between batches.
    ///
    /// A job that arrives while a full update is already running waits for
    /// that one instead of starting another.
    pub async fn run_full_update_job(&self, cancel: CancellationToken) -> FullUpdateJobResult {
        let (reply, rx) = oneshot::channel();
        if self.send(Command::RunFullUpdate { cancel, reply: Some(reply) }).is_err() {
            return FullUpdateJobResult::Cancelled;
        }
        rx.await.unwrap_or(FullUpdateJobResult::Cancelled)
    }

    /// Start a full update without waiting for it.
    pub fn request_full_update(&self) -> Result<(), IndexerError> {
        self.send(Command::RunFullUpdate { cancel: CancellationToken::new(), reply: None })
    }

    #[must_use]
    pub fn state(&self) -> IndexerState {
        self.state_rx.borrow().state()
    }

    #[must_use]
    pub fn snapshot(&self) -> StateSnapshot {
        self.state_rx.borrow().clone()
    }

    /// Get a receiver to watch state changes.
    #[must_use]
    pub fn state_receiver(&self) -> watch::Receiver<StateSnapshot> {
        self.state_rx.clone()
    }

    /// Watermarks as last persisted.
    #[must_use]
    pub fn settings(&self) -> IndexerSettings {
        self.state_rx.borrow().settings
    }

    /// Wait until every command sent so far has been handled and no update
    /// is running.
    pub async fn wait_until_idle(&self) -> Result<StateSnapshot, IndexerError> {
        let (tx, rx) = oneshot::channel();
        self.send(Command::Ping(tx))?;
        rx.await.map_err(|_| IndexerError::ShutDown(self.user))?;

        let mut state_rx = self.state_rx.clone();
        let snapshot = state_rx
            .wait_for(|s| s.is_idle() || s.lifecycle == Lifecycle::ShutDown)
            .await
            .map_err(|_| IndexerError::ShutDown(self.user))?
            .clone();
        if snapshot.lifecycle == Lifecycle::ShutDown {
            return Err(IndexerError::ShutDown(self.user));
        }
        Ok(snapshot)
    }

    /// Cancel in-flight updates, let them stop between batches and stop the
    /// executor task. Idempotent.
    pub async fn shutdown(&self) {
        let (tx, rx) = oneshot::channel();
        if self.commands.send(Command::Shutdown(tx)).is_ok() {
            let _ = rx.await;
        }
        let task = self.task.lock().take();
        if let Some(task) = task {
            if let Err(e) = task.await {
                warn!(user = %self.user, error = %e, "Contacts indexer task ended abnormally");
            }
        }
    }

    fn send(&self, command: Command) -> Result<(), IndexerError> {
        self.commands.send(command).map_err(|_| IndexerError::ShutDown(self.user))
    }
}
