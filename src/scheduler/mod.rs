// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Job scheduler seam for full updates.
//!
//! Each user has at most one pending full-update job. The periodic job is
//! persisted across restarts and only runs when the battery is not low and
//! the device is idle. One-off jobs are used to catch up after an
//! out-of-space error or a truncated delta listing.

pub mod memory;

pub use memory::InMemoryJobScheduler;

use async_trait::async_trait;
use thiserror::Error;

use crate::user::UserId;

#[derive(Error, Debug, Clone)]
pub enum SchedulerError {
    #[error("Job scheduler rejected job for user {user}: {reason}")]
    Rejected { user: UserId, reason: String },
    #[error("Job scheduler unavailable: {0}")]
    Unavailable(String),
}

/// Parameters of a full-update job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobSpec {
    pub periodic: bool,
    /// Period for periodic jobs, ignored otherwise
    pub interval_millis: u64,
    pub requires_battery_not_low: bool,
    pub requires_device_idle: bool,
    /// Survives reboots
    pub persisted: bool,
}

impl JobSpec {
    #[must_use]
    pub fn periodic_full_update(interval_millis: u64) -> Self {
        Self {
            periodic: true,
            interval_millis,
            requires_battery_not_low: true,
            requires_device_idle: true,
            persisted: true,
        }
    }

    /// Run once, as soon as constraints allow.
    #[must_use]
    pub fn one_off_full_update() -> Self {
        Self {
            periodic: false,
            interval_millis: 0,
            requires_battery_not_low: true,
            requires_device_idle: false,
            persisted: false,
        }
    }

    /// Whether `self` already satisfies a request for a periodic job with
    /// this interval.
    #[must_use]
    pub fn is_periodic_with_interval(&self, interval_millis: u64) -> bool {
        self.periodic && self.interval_millis == interval_millis
    }
}

#[async_trait]
pub trait JobScheduler: Send + Sync {
    /// Schedule `spec` for `user`, replacing any pending job.
    async fn schedule(&self, user: UserId, spec: JobSpec) -> Result<(), SchedulerError>;

    /// Cancel the pending job. Returns whether one existed.
    async fn cancel_if_scheduled(&self, user: UserId) -> Result<bool, SchedulerError>;

    async fn get_pending_job(&self, user: UserId) -> Result<Option<JobSpec>, SchedulerError>;
}
