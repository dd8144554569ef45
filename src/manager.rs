// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Registry of running user instances.
//!
//! Routes change notifications and full-update jobs to the right
//! [`UserInstance`]. Each user's settings live under
//! `<base_dir>/<user id>/`.

use std::path::PathBuf;
use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::{watch, OnceCell};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::config::ContactsIndexerConfig;
use crate::coordinator::{Collaborators, FullUpdateJobResult, UserInstance};
use crate::error::IndexerError;
use crate::user::UserId;

/// Slot reserved for a user before its instance starts.
type InstanceSlot = Arc<OnceCell<Arc<UserInstance>>>;

pub struct ContactsIndexerManager {
    instances: DashMap<UserId, InstanceSlot>,
    config_rx: watch::Receiver<ContactsIndexerConfig>,
    base_dir: PathBuf,
}

impl ContactsIndexerManager {
    /// Settings go under the `base_dir` of the config current at creation.
    pub fn new(config_rx: watch::Receiver<ContactsIndexerConfig>) -> Self {
        let base_dir = config_rx.borrow().base_dir.clone();
        Self { instances: DashMap::new(), config_rx, base_dir }
    }

    /// Start the instance for `user`. Starting a user that is already
    /// running returns the existing instance.
    ///
    /// Concurrent starts for one user share a single slot, so only one of
    /// them touches the settings file and the store.
    pub async fn start_user(
        &self,
        user: UserId,
        collaborators: Collaborators,
    ) -> Result<Arc<UserInstance>, IndexerError> {
        let slot = self.instances.entry(user).or_default().value().clone();
        let started = slot
            .get_or_try_init(|| async move {
                let dir = user.settings_dir(&self.base_dir);
                UserInstance::start(user, dir, collaborators, self.config_rx.clone()).await.map(Arc::new)
            })
            .await;
        let instance = match started {
            Ok(instance) => instance.clone(),
            Err(e) => {
                self.instances.remove_if(&user, |_, s| Arc::ptr_eq(s, &slot) && !s.initialized());
                return Err(e);
            }
        };
        crate::metrics::set_active_users(self.user_count());
        Ok(instance)
    }

    /// Shut down and forget the instance for `user`.
    pub async fn stop_user(&self, user: UserId) -> Result<(), IndexerError> {
        let (_, slot) = self
            .instances
            .remove_if(&user, |_, s| s.initialized())
            .ok_or(IndexerError::UnknownUser(user))?;
        crate::metrics::set_active_users(self.user_count());
        if let Some(instance) = slot.get() {
            instance.shutdown().await;
        }
        info!(%user, "Stopped contacts indexer");
        Ok(())
    }

    #[must_use]
    pub fn instance(&self, user: UserId) -> Option<Arc<UserInstance>> {
        self.instances.get(&user).and_then(|entry| entry.value().get().cloned())
    }

    /// Forward a contacts provider change notification.
    pub fn on_contacts_changed(&self, user: UserId) -> Result<(), IndexerError> {
        self.require(user)?.on_contacts_changed()
    }

    /// Run the scheduled full-update job for `user` to completion.
    pub async fn on_full_update_job(
        &self,
        user: UserId,
        cancel: CancellationToken,
    ) -> Result<FullUpdateJobResult, IndexerError> {
        let instance = self.require(user)?;
        Ok(instance.run_full_update_job(cancel).await)
    }

    pub fn request_full_update(&self, user: UserId) -> Result<(), IndexerError> {
        self.require(user)?.request_full_update()
    }

    /// Stop every instance, waiting for in-flight cycles to wind down.
    pub async fn shutdown_all(&self) {
        let users: Vec<UserId> = self.instances.iter().map(|entry| *entry.key()).collect();
        for user in users {
            if let Err(e) = self.stop_user(user).await {
                warn!(%user, error = %e, "Failed to stop contacts indexer");
            }
        }
    }

    #[must_use]
    pub fn user_count(&self) -> usize {
        self.instances.iter().filter(|entry| entry.value().initialized()).count()
    }

    fn require(&self, user: UserId) -> Result<Arc<UserInstance>, IndexerError> {
        self.instance(user).ok_or(IndexerError::UnknownUser(user))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scheduler::InMemoryJobScheduler;
    use crate::source::{ContactRecord, InMemoryContactsProvider};
    use crate::storage::InMemoryDocumentStore;

    fn manager(dir: &std::path::Path) -> (watch::Sender<ContactsIndexerConfig>, ContactsIndexerManager) {
        let config = ContactsIndexerConfig { base_dir: dir.to_path_buf(), ..Default::default() };
        let (tx, rx) = watch::channel(config);
        (tx, ContactsIndexerManager::new(rx))
    }

    fn collaborators(store: Arc<InMemoryDocumentStore>, provider: Arc<InMemoryContactsProvider>) -> Collaborators {
        Collaborators { store, provider, scheduler: Arc::new(InMemoryJobScheduler::new()) }
    }

    #[tokio::test]
    async fn test_users_are_independent() {
        let dir = tempfile::tempdir().unwrap();
        let (_tx, manager) = manager(dir.path());

        let provider_a = Arc::new(InMemoryContactsProvider::new());
        provider_a.upsert(ContactRecord::new("1", "Ada"));
        let store_a = Arc::new(InMemoryDocumentStore::new());
        let store_b = Arc::new(InMemoryDocumentStore::new());

        let a = manager.start_user(UserId(0), collaborators(store_a.clone(), provider_a)).await.unwrap();
        let b = manager
            .start_user(UserId(10), collaborators(store_b.clone(), Arc::new(InMemoryContactsProvider::new())))
            .await
            .unwrap();
        a.wait_until_idle().await.unwrap();
        b.wait_until_idle().await.unwrap();

        assert_eq!(manager.user_count(), 2);
        assert_eq!(store_a.len(), 1);
        assert!(store_b.is_empty());
        assert!(dir.path().join("0").join(crate::settings::SETTINGS_FILE_NAME).exists());
        assert!(dir.path().join("10").join(crate::settings::SETTINGS_FILE_NAME).exists());

        manager.shutdown_all().await;
        assert_eq!(manager.user_count(), 0);
    }

    #[tokio::test]
    async fn test_unknown_user() {
        let dir = tempfile::tempdir().unwrap();
        let (_tx, manager) = manager(dir.path());
        assert!(matches!(manager.on_contacts_changed(UserId(3)), Err(IndexerError::UnknownUser(UserId(3)))));
        assert!(matches!(
            manager.on_full_update_job(UserId(3), CancellationToken::new()).await,
            Err(IndexerError::UnknownUser(_))
        ));
        assert!(matches!(manager.stop_user(UserId(3)).await, Err(IndexerError::UnknownUser(_))));
    }

    #[tokio::test]
    async fn test_start_twice_returns_same_instance() {
        let dir = tempfile::tempdir().unwrap();
        let (_tx, manager) = manager(dir.path());
        let collab = collaborators(Arc::new(InMemoryDocumentStore::new()), Arc::new(InMemoryContactsProvider::new()));

        let first = manager.start_user(UserId(1), collab.clone()).await.unwrap();
        let second = manager.start_user(UserId(1), collab).await.unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        manager.shutdown_all().await;
    }

    #[tokio::test]
    async fn test_concurrent_starts_run_one_instance() {
        let dir = tempfile::tempdir().unwrap();
        let (_tx, manager) = manager(dir.path());
        let provider = Arc::new(InMemoryContactsProvider::new());
        provider.upsert(ContactRecord::new("1", "Ada"));
        let store = Arc::new(InMemoryDocumentStore::new());
        let collab = collaborators(store.clone(), provider.clone());

        let (first, second) = tokio::join!(
            manager.start_user(UserId(2), collab.clone()),
            manager.start_user(UserId(2), collab),
        );
        let (first, second) = (first.unwrap(), second.unwrap());
        assert!(Arc::ptr_eq(&first, &second));
        first.wait_until_idle().await.unwrap();

        // A single instance ran a single initial delta update
        assert_eq!(provider.updated_query_count(), 1);
        assert_eq!(store.put_call_count(), 1);
        assert_eq!(manager.user_count(), 1);
        manager.shutdown_all().await;
    }
}
