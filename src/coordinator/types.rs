// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Public types for the user instance coordinator.

use crate::error::UpdateError;
use crate::indexer::CycleCompletion;
use crate::settings::IndexerSettings;
use crate::stats::UpdateStats;

/// Combined state of a user instance.
///
/// Delta and full updates may overlap; a running delta update takes
/// precedence in this view. Use [`StateSnapshot`] for the full picture.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexerState {
    /// Instance created, executor not running yet
    Starting,
    /// No update running
    Idle,
    DeltaUpdateRunning,
    /// A delta update is running and another is queued behind it
    DeltaUpdatePendingRerun,
    FullUpdateRunning,
    ShutDown,
}

impl IndexerState {
    /// Gauge value used for metrics
    #[must_use]
    pub fn code(self) -> u8 {
        match self {
            Self::Starting | Self::Idle => 0,
            Self::DeltaUpdateRunning => 1,
            Self::DeltaUpdatePendingRerun => 2,
            Self::FullUpdateRunning => 3,
            Self::ShutDown => 4,
        }
    }
}

impl std::fmt::Display for IndexerState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Starting => write!(f, "Starting"),
            Self::Idle => write!(f, "Idle"),
            Self::DeltaUpdateRunning => write!(f, "DeltaUpdateRunning"),
            Self::DeltaUpdatePendingRerun => write!(f, "DeltaUpdatePendingRerun"),
            Self::FullUpdateRunning => write!(f, "FullUpdateRunning"),
            Self::ShutDown => write!(f, "ShutDown"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lifecycle {
    Starting,
    Running,
    ShutDown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeltaPhase {
    Idle,
    Running,
    /// Running, with one more run queued
    PendingRerun,
}

/// Everything an observer can see about a user instance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StateSnapshot {
    pub lifecycle: Lifecycle,
    pub delta: DeltaPhase,
    pub full_update_running: bool,
    /// Delta updates that ran to completion and persisted watermarks
    pub completed_delta_updates: u64,
    pub completed_full_updates: u64,
    /// Stats of the most recent delta update, whatever its outcome
    pub last_delta_stats: Option<UpdateStats>,
    pub last_full_stats: Option<UpdateStats>,
    /// Watermarks as last persisted
    pub settings: IndexerSettings,
}

impl StateSnapshot {
    pub(super) fn starting(settings: IndexerSettings) -> Self {
        Self {
            lifecycle: Lifecycle::Starting,
            delta: DeltaPhase::Idle,
            full_update_running: false,
            completed_delta_updates: 0,
            completed_full_updates: 0,
            last_delta_stats: None,
            last_full_stats: None,
            settings,
        }
    }

    #[must_use]
    pub fn state(&self) -> IndexerState {
        match (self.lifecycle, self.delta) {
            (Lifecycle::ShutDown, _) => IndexerState::ShutDown,
            (Lifecycle::Starting, _) => IndexerState::Starting,
            (_, DeltaPhase::PendingRerun) => IndexerState::DeltaUpdatePendingRerun,
            (_, DeltaPhase::Running) => IndexerState::DeltaUpdateRunning,
            _ if self.full_update_running => IndexerState::FullUpdateRunning,
            _ => IndexerState::Idle,
        }
    }

    /// Running with nothing in flight.
    #[must_use]
    pub fn is_idle(&self) -> bool {
        self.state() == IndexerState::Idle
    }
}

/// Result handed back to the job scheduler for a full-update job.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FullUpdateJobResult {
    Succeeded,
    Failed,
    /// Stopped early; the job should run again
    Cancelled,
}

impl FullUpdateJobResult {
    #[must_use]
    pub fn needs_reschedule(self) -> bool {
        self == Self::Cancelled
    }
}

impl From<&Result<CycleCompletion, UpdateError>> for FullUpdateJobResult {
    fn from(result: &Result<CycleCompletion, UpdateError>) -> Self {
        match result {
            Ok(CycleCompletion::Completed) => Self::Succeeded,
            Ok(CycleCompletion::Cancelled) => Self::Cancelled,
            Err(_) => Self::Failed,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::StorageError;

    fn snapshot(lifecycle: Lifecycle, delta: DeltaPhase, full: bool) -> StateSnapshot {
        StateSnapshot {
            lifecycle,
            delta,
            full_update_running: full,
            ..StateSnapshot::starting(IndexerSettings::default())
        }
    }

    #[test]
    fn test_combined_state() {
        assert_eq!(snapshot(Lifecycle::Starting, DeltaPhase::Idle, false).state(), IndexerState::Starting);
        assert_eq!(snapshot(Lifecycle::Running, DeltaPhase::Idle, false).state(), IndexerState::Idle);
        assert_eq!(
            snapshot(Lifecycle::Running, DeltaPhase::Running, true).state(),
            IndexerState::DeltaUpdateRunning
        );
        assert_eq!(
            snapshot(Lifecycle::Running, DeltaPhase::PendingRerun, false).state(),
            IndexerState::DeltaUpdatePendingRerun
        );
        assert_eq!(
            snapshot(Lifecycle::Running, DeltaPhase::Idle, true).state(),
            IndexerState::FullUpdateRunning
        );
        assert_eq!(snapshot(Lifecycle::ShutDown, DeltaPhase::Running, true).state(), IndexerState::ShutDown);
    }

    #[test]
    fn test_job_result_mapping() {
        assert_eq!(FullUpdateJobResult::from(&Ok(CycleCompletion::Completed)), FullUpdateJobResult::Succeeded);
        assert_eq!(FullUpdateJobResult::from(&Ok(CycleCompletion::Cancelled)), FullUpdateJobResult::Cancelled);
        let failed: Result<CycleCompletion, UpdateError> = Err(StorageError::OutOfSpace.into());
        assert_eq!(FullUpdateJobResult::from(&failed), FullUpdateJobResult::Failed);

        assert!(FullUpdateJobResult::Cancelled.needs_reschedule());
        assert!(!FullUpdateJobResult::Failed.needs_reschedule());
    }

    #[test]
    fn test_state_display() {
        assert_eq!(IndexerState::DeltaUpdatePendingRerun.to_string(), "DeltaUpdatePendingRerun");
        assert_eq!(IndexerState::ShutDown.code(), 4);
    }
}
