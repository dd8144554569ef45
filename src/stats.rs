// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Per-cycle update statistics.

use std::collections::BTreeSet;
use std::fmt;

use crate::storage::StatusCode;

/// Wall clock in milliseconds since the Unix epoch.
pub(crate) fn now_millis() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as i64
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UpdateKind {
    Delta,
    Full,
}

impl UpdateKind {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Delta => "delta",
            Self::Full => "full",
        }
    }
}

impl fmt::Display for UpdateKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Counters for one update cycle. Logged and exported as metrics, never
/// persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdateStats {
    pub kind: UpdateKind,
    pub start_timestamp_millis: i64,
    pub end_timestamp_millis: i64,

    /// Distinct status codes seen on put calls
    pub update_statuses: BTreeSet<StatusCode>,
    /// Distinct status codes seen on remove calls
    pub delete_statuses: BTreeSet<StatusCode>,

    pub contacts_to_update: usize,
    /// Documents written for the first time
    pub new_contacts_inserted: usize,
    pub contacts_update_succeeded: usize,
    /// Unchanged fingerprint, write skipped
    pub contacts_update_skipped: usize,
    pub contacts_update_failed: usize,
    /// Listed as changed but gone by the time rows were read
    pub contacts_missing_from_source: usize,

    pub contacts_to_delete: usize,
    pub contacts_delete_succeeded: usize,
    pub contacts_delete_not_found: usize,
    pub contacts_delete_failed: usize,

    pub previous_last_contact_update_timestamp_millis: i64,
    pub previous_last_contact_delete_timestamp_millis: i64,
    pub new_last_contact_update_timestamp_millis: i64,
    pub new_last_contact_delete_timestamp_millis: i64,

    /// The listing hit its limit, so older changes were left for a full update
    pub listing_truncated: bool,
    /// A delta update moved the contact watermark while this full update ran
    pub overlapped_delta_update: bool,
}

impl UpdateStats {
    #[must_use]
    pub fn new(kind: UpdateKind) -> Self {
        Self {
            kind,
            start_timestamp_millis: now_millis(),
            end_timestamp_millis: 0,
            update_statuses: BTreeSet::new(),
            delete_statuses: BTreeSet::new(),
            contacts_to_update: 0,
            new_contacts_inserted: 0,
            contacts_update_succeeded: 0,
            contacts_update_skipped: 0,
            contacts_update_failed: 0,
            contacts_missing_from_source: 0,
            contacts_to_delete: 0,
            contacts_delete_succeeded: 0,
            contacts_delete_not_found: 0,
            contacts_delete_failed: 0,
            previous_last_contact_update_timestamp_millis: 0,
            previous_last_contact_delete_timestamp_millis: 0,
            new_last_contact_update_timestamp_millis: 0,
            new_last_contact_delete_timestamp_millis: 0,
            listing_truncated: false,
            overlapped_delta_update: false,
        }
    }

    /// Tally one per-document put result.
    pub fn record_update_status(&mut self, status: StatusCode) {
        self.update_statuses.insert(status);
        if status.is_ok() {
            self.contacts_update_succeeded += 1;
        } else {
            self.contacts_update_failed += 1;
        }
    }

    /// Tally one per-id remove result. `NotFound` is not a failure.
    pub fn record_delete_status(&mut self, status: StatusCode) {
        self.delete_statuses.insert(status);
        match status {
            StatusCode::Ok => self.contacts_delete_succeeded += 1,
            StatusCode::NotFound => self.contacts_delete_not_found += 1,
            _ => self.contacts_delete_failed += 1,
        }
    }

    #[must_use]
    pub fn failed_count(&self) -> usize {
        self.contacts_update_failed + self.contacts_delete_failed
    }

    #[must_use]
    pub fn has_out_of_space(&self) -> bool {
        self.update_statuses.contains(&StatusCode::OutOfSpace)
            || self.delete_statuses.contains(&StatusCode::OutOfSpace)
    }

    pub fn finish(&mut self) {
        self.end_timestamp_millis = now_millis();
    }

    #[must_use]
    pub fn duration_millis(&self) -> i64 {
        (self.end_timestamp_millis - self.start_timestamp_millis).max(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_delete_not_found_is_not_failure() {
        let mut stats = UpdateStats::new(UpdateKind::Delta);
        stats.record_delete_status(StatusCode::Ok);
        stats.record_delete_status(StatusCode::NotFound);
        stats.record_delete_status(StatusCode::IoError);
        assert_eq!(stats.contacts_delete_succeeded, 1);
        assert_eq!(stats.contacts_delete_not_found, 1);
        assert_eq!(stats.contacts_delete_failed, 1);
        assert_eq!(stats.failed_count(), 1);
        assert_eq!(stats.delete_statuses.len(), 3);
    }

    #[test]
    fn test_out_of_space_detected() {
        let mut stats = UpdateStats::new(UpdateKind::Full);
        stats.record_update_status(StatusCode::Ok);
        assert!(!stats.has_out_of_space());
        stats.record_update_status(StatusCode::OutOfSpace);
        assert!(stats.has_out_of_space());
        assert_eq!(stats.contacts_update_failed, 1);
    }

    #[test]
    fn test_finish_sets_duration() {
        let mut stats = UpdateStats::new(UpdateKind::Delta);
        stats.finish();
        assert!(stats.end_timestamp_millis >= stats.start_timestamp_millis);
        assert!(stats.duration_millis() >= 0);
    }
}
