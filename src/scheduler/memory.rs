// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

use async_trait::async_trait;
use dashmap::DashMap;
use parking_lot::Mutex;

use super::{JobScheduler, JobSpec, SchedulerError};
use crate::user::UserId;

/// In-memory job scheduler that records every call.
///
/// Jobs never fire on their own; tests drive them through
/// [`crate::UserInstance::run_full_update_job`].
#[derive(Default)]
pub struct InMemoryJobScheduler {
    pending: DashMap<UserId, JobSpec>,
    history: Mutex<Vec<(UserId, JobSpec)>>,
    cancellations: Mutex<Vec<UserId>>,
}

impl InMemoryJobScheduler {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Every `schedule` call so far, in order.
    #[must_use]
    pub fn history(&self) -> Vec<(UserId, JobSpec)> {
        self.history.lock().clone()
    }

    #[must_use]
    pub fn schedule_count(&self) -> usize {
        self.history.lock().len()
    }

    /// Number of `cancel_if_scheduled` calls that removed a job.
    #[must_use]
    pub fn cancel_count(&self) -> usize {
        self.cancellations.lock().len()
    }

    #[must_use]
    pub fn pending(&self, user: UserId) -> Option<JobSpec> {
        self.pending.get(&user).map(|r| r.value().clone())
    }
}

#[async_trait]
impl JobScheduler for InMemoryJobScheduler {
    async fn schedule(&self, user: UserId, spec: JobSpec) -> Result<(), SchedulerError> {
        self.history.lock().push((user, spec.clone()));
        self.pending.insert(user, spec);
        Ok(())
    }

    async fn cancel_if_scheduled(&self, user: UserId) -> Result<bool, SchedulerError> {
        let removed = self.pending.remove(&user).is_some();
        if removed {
            self.cancellations.lock().push(user);
        }
        Ok(removed)
    }

    async fn get_pending_job(&self, user: UserId) -> Result<Option<JobSpec>, SchedulerError> {
        Ok(self.pending(user))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_schedule_replaces_pending() {
        let scheduler = InMemoryJobScheduler::new();
        let user = UserId(3);
        scheduler.schedule(user, JobSpec::one_off_full_update()).await.unwrap();
        scheduler.schedule(user, JobSpec::periodic_full_update(10)).await.unwrap();

        assert_eq!(scheduler.schedule_count(), 2);
        assert_eq!(
            scheduler.get_pending_job(user).await.unwrap(),
            Some(JobSpec::periodic_full_update(10))
        );
    }

    #[tokio::test]
    async fn test_cancel_if_scheduled() {
        let scheduler = InMemoryJobScheduler::new();
        let user = UserId(0);
        assert!(!scheduler.cancel_if_scheduled(user).await.unwrap());

        scheduler.schedule(user, JobSpec::periodic_full_update(10)).await.unwrap();
        assert!(scheduler.cancel_if_scheduled(user).await.unwrap());
        assert!(scheduler.get_pending_job(user).await.unwrap().is_none());
        assert_eq!(scheduler.cancel_count(), 1);
    }

    #[tokio::test]
    async fn test_users_are_independent() {
        let scheduler = InMemoryJobScheduler::new();
        scheduler.schedule(UserId(1), JobSpec::periodic_full_update(10)).await.unwrap();
        assert!(scheduler.pending(UserId(2)).is_none());
    }
}
