// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! The per-user executor task.
//!
//! Owns every piece of mutable state of a user instance. Commands, cycle
//! completions and config changes are handled one at a time by a single
//! `select!` loop.

use futures::future::BoxFuture;
use futures::FutureExt;
use tokio::sync::{mpsc, oneshot, watch};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::ContactsIndexerConfig;
use crate::indexer::CycleCompletion;
use crate::settings::{IndexerSettings, SettingsFile};
use crate::source::ContactsSourceAdapter;
use crate::stats::UpdateStats;
use crate::user::UserId;

use super::delta::{run_delta_update, DeltaOutcome};
use super::full::{run_full_update, FullOutcome};
use super::types::{DeltaPhase, FullUpdateJobResult, Lifecycle, StateSnapshot};
use super::{Collaborators, Command, CycleContext};

/// First cycle started once the executor runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum InitialCycle {
    Delta,
    /// The index was reset; rebuild it from scratch
    Full,
}

pub(super) struct Worker {
    pub(super) user: UserId,
    pub(super) collaborators: Collaborators,
    source: ContactsSourceAdapter,
    pub(super) settings_file: SettingsFile,
    pub(super) settings: IndexerSettings,
    pub(super) config: ContactsIndexerConfig,
    pub(super) config_rx: watch::Receiver<ContactsIndexerConfig>,
    config_open: bool,
    commands: mpsc::UnboundedReceiver<Command>,
    state_tx: watch::Sender<StateSnapshot>,
    /// Parent of every cycle's cancellation token
    pub(super) shutdown: CancellationToken,

    delta: Option<BoxFuture<'static, DeltaOutcome>>,
    delta_rerun: bool,
    full: Option<BoxFuture<'static, FullOutcome>>,
    full_waiters: Vec<oneshot::Sender<FullUpdateJobResult>>,

    lifecycle: Lifecycle,
    completed_delta_updates: u64,
    completed_full_updates: u64,
    last_delta_stats: Option<UpdateStats>,
    last_full_stats: Option<UpdateStats>,
}

/// Await the future in `slot`, or never resolve if there is none.
async fn poll_slot<T>(slot: &mut Option<BoxFuture<'static, T>>) -> T {
    match slot.as_mut() {
        Some(future) => future.await,
        None => std::future::pending().await,
    }
}

impl Worker {
    #[allow(clippy::too_many_arguments)]
    pub(super) fn new(
        user: UserId,
        collaborators: Collaborators,
        settings_file: SettingsFile,
        settings: IndexerSettings,
        config: ContactsIndexerConfig,
        config_rx: watch::Receiver<ContactsIndexerConfig>,
        commands: mpsc::UnboundedReceiver<Command>,
        state_tx: watch::Sender<StateSnapshot>,
    ) -> Self {
        let source = ContactsSourceAdapter::new(collaborators.provider.clone());
        Self {
            user,
            collaborators,
            source,
            settings_file,
            settings,
            config,
            config_rx,
            config_open: true,
            commands,
            state_tx,
            shutdown: CancellationToken::new(),
            delta: None,
            delta_rerun: false,
            full: None,
            full_waiters: Vec::new(),
            lifecycle: Lifecycle::Starting,
            completed_delta_updates: 0,
            completed_full_updates: 0,
            last_delta_stats: None,
            last_full_stats: None,
        }
    }

    pub(super) async fn run(mut self, initial: InitialCycle) {
        self.lifecycle = Lifecycle::Running;
        if self.config.enabled {
            self.ensure_periodic_job(false).await;
            match initial {
                InitialCycle::Delta => self.start_delta(),
                InitialCycle::Full => self.start_full(CancellationToken::new()),
            }
        } else {
            info!(user = %self.user, "Contacts indexing disabled");
            self.cancel_job().await;
        }
        self.publish();

        loop {
            tokio::select! {
                command = self.commands.recv() => match command {
                    Some(Command::Shutdown(reply)) => {
                        self.drain().await;
                        let _ = reply.send(());
                        break;
                    }
                    Some(command) => self.handle_command(command),
                    None => {
                        debug!(user = %self.user, "All handles dropped");
                        self.drain().await;
                        break;
                    }
                },

                outcome = poll_slot(&mut self.delta), if self.delta.is_some() => {
                    self.delta = None;
                    self.on_delta_done(outcome).await;
                }

                outcome = poll_slot(&mut self.full), if self.full.is_some() => {
                    self.full = None;
                    self.on_full_done(outcome).await;
                }

                changed = self.config_rx.changed(), if self.config_open => match changed {
                    Ok(()) => self.on_config_changed().await,
                    Err(_) => {
                        debug!(user = %self.user, "Config channel closed, keeping last config");
                        self.config_open = false;
                    }
                },
            }
        }
        info!(user = %self.user, "Contacts indexer stopped");
    }

    fn handle_command(&mut self, command: Command) {
        match command {
            Command::ContactsChanged => {
                if !self.config.enabled {
                    debug!(user = %self.user, "Ignoring change notification, indexing disabled");
                    return;
                }
                self.trigger_delta();
            }
            Command::RunFullUpdate { cancel, reply } => {
                if !self.config.enabled {
                    info!(user = %self.user, "Skipping full update job, indexing disabled");
                    if let Some(reply) = reply {
                        let _ = reply.send(FullUpdateJobResult::Succeeded);
                    }
                    return;
                }
                self.full_waiters.extend(reply);
                if self.full.is_some() {
                    debug!(user = %self.user, "Full update already running, attaching");
                } else {
                    self.start_full(cancel);
                }
            }
            Command::Ping(reply) => {
                let _ = reply.send(());
                return;
            }
            // Handled by the run loop
            Command::Shutdown(_) => return,
        }
        self.publish();
    }

    /// Start a delta update, or queue one rerun behind the running one.
    pub(super) fn trigger_delta(&mut self) {
        if self.delta.is_some() {
            crate::metrics::record_notification(true);
            if !self.delta_rerun {
                debug!(user = %self.user, "Delta update running, queueing rerun");
            }
            self.delta_rerun = true;
        } else {
            crate::metrics::record_notification(false);
            self.start_delta();
        }
    }

    fn cycle_context(&self, cancel: CancellationToken) -> CycleContext {
        CycleContext {
            user: self.user,
            source: self.source.clone(),
            store: self.collaborators.store.clone(),
            scheduler: self.collaborators.scheduler.clone(),
            config: self.config.clone(),
            settings: self.settings,
            cancel,
        }
    }

    fn start_delta(&mut self) {
        let ctx = self.cycle_context(self.shutdown.clone());
        self.delta = Some(run_delta_update(ctx).boxed());
    }

    /// Start a full update that stops when either `job_cancel` or the
    /// instance shutdown fires.
    fn start_full(&mut self, job_cancel: CancellationToken) {
        let cycle = self.shutdown.child_token();
        if job_cancel.is_cancelled() {
            cycle.cancel();
        }
        let linked = cycle.clone();
        tokio::spawn(async move {
            tokio::select! {
                _ = job_cancel.cancelled() => linked.cancel(),
                _ = linked.cancelled() => {}
            }
        });
        let ctx = self.cycle_context(cycle);
        self.full = Some(run_full_update(ctx).boxed());
    }

    async fn on_delta_done(&mut self, outcome: DeltaOutcome) {
        let DeltaOutcome { result, stats } = outcome;
        let label = match &result {
            Ok(progress) if progress.completion == CycleCompletion::Completed => {
                self.settings.advance_last_contact_update_timestamp_millis(progress.last_contact_update_millis);
                self.settings.advance_last_contact_delete_timestamp_millis(progress.last_contact_delete_millis);
                self.settings.set_last_delta_update_timestamp_millis(stats.end_timestamp_millis);
                self.persist_settings().await;
                self.completed_delta_updates += 1;
                "completed"
            }
            Ok(_) => "cancelled",
            Err(_) => "failed",
        };
        info!(
            user = %self.user,
            outcome = label,
            updated = stats.contacts_update_succeeded,
            inserted = stats.new_contacts_inserted,
            skipped = stats.contacts_update_skipped,
            deleted = stats.contacts_delete_succeeded,
            failed = stats.failed_count(),
            duration_ms = stats.duration_millis(),
            "Delta update finished"
        );
        crate::metrics::record_update_cycle(&stats, label);
        self.last_delta_stats = Some(stats);

        if self.delta_rerun && !self.shutdown.is_cancelled() && self.config.enabled {
            self.delta_rerun = false;
            debug!(user = %self.user, "Running queued delta update");
            self.start_delta();
        } else {
            self.delta_rerun = false;
        }
        self.publish();
    }

    async fn on_full_done(&mut self, outcome: FullOutcome) {
        let FullOutcome { result, mut stats } = outcome;
        if self.settings.last_contact_update_timestamp_millis() != stats.previous_last_contact_update_timestamp_millis {
            stats.overlapped_delta_update = true;
            debug!(user = %self.user, "A delta update advanced the watermarks during the full update");
        }

        let job_result = FullUpdateJobResult::from(&result);
        let label = match job_result {
            FullUpdateJobResult::Succeeded => {
                self.settings.set_last_full_update_timestamp_millis(stats.end_timestamp_millis);
                self.persist_settings().await;
                self.completed_full_updates += 1;
                "completed"
            }
            FullUpdateJobResult::Cancelled => "cancelled",
            FullUpdateJobResult::Failed => "failed",
        };
        info!(
            user = %self.user,
            outcome = label,
            updated = stats.contacts_update_succeeded,
            inserted = stats.new_contacts_inserted,
            skipped = stats.contacts_update_skipped,
            deleted = stats.contacts_delete_succeeded,
            failed = stats.failed_count(),
            duration_ms = stats.duration_millis(),
            "Full update finished"
        );
        crate::metrics::record_update_cycle(&stats, label);
        self.last_full_stats = Some(stats);

        for waiter in self.full_waiters.drain(..) {
            let _ = waiter.send(job_result);
        }
        if job_result != FullUpdateJobResult::Cancelled && !self.shutdown.is_cancelled() && self.config.enabled {
            self.ensure_periodic_job(true).await;
        }
        self.publish();
    }

    async fn persist_settings(&mut self) {
        if let Err(e) = self.settings_file.persist(&self.settings).await {
            warn!(user = %self.user, error = %e, "Failed to persist indexer settings");
        }
    }

    /// Cancel in-flight cycles and wait for them to stop between batches.
    async fn drain(&mut self) {
        info!(user = %self.user, "Shutting down contacts indexer");
        self.shutdown.cancel();
        self.delta_rerun = false;

        if let Some(delta) = self.delta.take() {
            let outcome = delta.await;
            self.on_delta_done(outcome).await;
        }
        if let Some(full) = self.full.take() {
            let outcome = full.await;
            self.on_full_done(outcome).await;
        }
        for waiter in self.full_waiters.drain(..) {
            let _ = waiter.send(FullUpdateJobResult::Cancelled);
        }

        self.lifecycle = Lifecycle::ShutDown;
        self.publish();
    }

    pub(super) fn publish(&self) {
        let delta = match (self.delta.is_some(), self.delta_rerun) {
            (false, _) => DeltaPhase::Idle,
            (true, false) => DeltaPhase::Running,
            (true, true) => DeltaPhase::PendingRerun,
        };
        let snapshot = StateSnapshot {
            lifecycle: self.lifecycle,
            delta,
            full_update_running: self.full.is_some(),
            completed_delta_updates: self.completed_delta_updates,
            completed_full_updates: self.completed_full_updates,
            last_delta_stats: self.last_delta_stats.clone(),
            last_full_stats: self.last_full_stats.clone(),
            settings: self.settings,
        };
        crate::metrics::set_indexer_state(self.user, snapshot.state().code());
        self.state_tx.send_replace(snapshot);
    }
}
