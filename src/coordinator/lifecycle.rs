// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! User instance lifecycle: startup, job upkeep and config changes.

use std::path::Path;

use parking_lot::Mutex;
use tokio::sync::{mpsc, watch};
use tracing::{debug, info, warn};

use crate::config::ContactsIndexerConfig;
use crate::error::IndexerError;
use crate::scheduler::JobSpec;
use crate::settings::SettingsFile;
use crate::storage::{check_compatibility, CorpusSchema, DocumentStore, SchemaCompatibility};
use crate::user::UserId;

use super::types::StateSnapshot;
use super::worker::{InitialCycle, Worker};
use super::{Collaborators, UserInstance};

impl UserInstance {
    /// Start the indexer for `user`.
    ///
    /// Startup flow:
    /// 1. Create `settings_dir` and load the persisted watermarks
    /// 2. Install the person corpus schema, forcing it if the installed one
    ///    is incompatible (which drops the index and resets the watermarks)
    /// 3. Spawn the executor, which makes sure the periodic full-update job
    ///    is scheduled and runs a first delta update, or a full update after
    ///    a reset
    #[tracing::instrument(skip_all, fields(user = %user))]
    pub async fn start(
        user: UserId,
        settings_dir: impl AsRef<Path>,
        collaborators: Collaborators,
        mut config_rx: watch::Receiver<ContactsIndexerConfig>,
    ) -> Result<Self, IndexerError> {
        let dir = settings_dir.as_ref();
        tokio::fs::create_dir_all(dir).await?;
        let settings_file = SettingsFile::new(dir);
        let mut settings = settings_file.load().await;

        let initial = if reconcile_schema(collaborators.store.as_ref()).await? {
            settings.reset_contact_watermarks();
            settings_file.persist(&settings).await?;
            InitialCycle::Full
        } else {
            InitialCycle::Delta
        };

        let config = config_rx.borrow_and_update().clone();
        let (commands_tx, commands_rx) = mpsc::unbounded_channel();
        let (state_tx, state_rx) = watch::channel(StateSnapshot::starting(settings));
        let worker = Worker::new(
            user,
            collaborators,
            settings_file,
            settings,
            config,
            config_rx,
            commands_rx,
            state_tx,
        );
        let task = tokio::spawn(worker.run(initial));

        info!(
            dir = %dir.display(),
            first_run = settings.is_first_run(),
            ?initial,
            "Contacts indexer started"
        );
        Ok(Self { user, commands: commands_tx, state_rx, task: Mutex::new(Some(task)) })
    }
}

/// Bring the store's schema up to date. Returns `true` when the installed
/// schema was incompatible and the index was dropped.
async fn reconcile_schema(store: &dyn DocumentStore) -> Result<bool, IndexerError> {
    let desired = CorpusSchema::person_corpus();
    let installed = store.get_schema().await?;
    match check_compatibility(installed.as_ref(), &desired) {
        SchemaCompatibility::Fresh => {
            debug!(version = desired.version, "Installing person corpus schema");
            store.set_schema(&desired, false).await?;
            crate::metrics::record_schema_check("fresh");
            Ok(false)
        }
        SchemaCompatibility::Unchanged => {
            crate::metrics::record_schema_check("unchanged");
            Ok(false)
        }
        SchemaCompatibility::Compatible => {
            info!(version = desired.version, "Upgrading person corpus schema");
            store.set_schema(&desired, false).await?;
            crate::metrics::record_schema_check("compatible");
            Ok(false)
        }
        SchemaCompatibility::Incompatible(types) => {
            warn!(?types, "Installed schema is incompatible, dropping index and resyncing");
            let outcome = store.set_schema(&desired, true).await?;
            crate::metrics::record_schema_check("incompatible");
            debug!(dropped = outcome.documents_dropped(), "Forced person corpus schema");
            Ok(true)
        }
    }
}

impl Worker {
    /// Make sure a periodic full-update job with the configured interval is
    /// pending. A pending one-off job is left alone unless `replace_one_off`.
    pub(super) async fn ensure_periodic_job(&mut self, replace_one_off: bool) {
        let interval = self.config.full_update_interval_millis;
        let scheduler = &self.collaborators.scheduler;
        match scheduler.get_pending_job(self.user).await {
            Ok(Some(job)) if job.is_periodic_with_interval(interval) => return,
            Ok(Some(job)) if !job.periodic && !replace_one_off => {
                debug!(user = %self.user, "One-off full update pending, periodic job deferred");
                return;
            }
            Ok(_) => {}
            Err(e) => warn!(user = %self.user, error = %e, "Failed to read pending full update job"),
        }
        match scheduler.schedule(self.user, JobSpec::periodic_full_update(interval)).await {
            Ok(()) => {
                info!(user = %self.user, interval_millis = interval, "Scheduled periodic full update");
                crate::metrics::record_job("periodic");
            }
            Err(e) => warn!(user = %self.user, error = %e, "Failed to schedule periodic full update"),
        }
    }

    pub(super) async fn cancel_job(&mut self) {
        match self.collaborators.scheduler.cancel_if_scheduled(self.user).await {
            Ok(true) => {
                info!(user = %self.user, "Cancelled full update job");
                crate::metrics::record_job("cancel");
            }
            Ok(false) => {}
            Err(e) => warn!(user = %self.user, error = %e, "Failed to cancel full update job"),
        }
    }

    pub(super) async fn on_config_changed(&mut self) {
        let next = self.config_rx.borrow_and_update().clone();
        let previous = std::mem::replace(&mut self.config, next);
        match (previous.enabled, self.config.enabled) {
            (true, false) => {
                info!(user = %self.user, "Contacts indexing disabled");
                self.cancel_job().await;
            }
            (false, true) => {
                info!(user = %self.user, "Contacts indexing enabled");
                self.ensure_periodic_job(false).await;
                self.trigger_delta();
            }
            (true, true) if previous.full_update_interval_millis != self.config.full_update_interval_millis => {
                self.ensure_periodic_job(false).await;
            }
            _ => {}
        }
        self.publish();
    }
}
