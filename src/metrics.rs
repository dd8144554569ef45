// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Metrics instrumentation for the contacts indexer.
//!
//! Uses the `metrics` crate for backend-agnostic metrics collection.
//! The embedding service is responsible for choosing the exporter.
//!
//! # Metric Naming Convention
//! - `contacts_indexer_` prefix for all metrics
//! - `_total` suffix for counters
//! - `_seconds` suffix for duration histograms
//!
//! # Labels
//! - `kind`: delta, full
//! - `outcome`: completed, cancelled, failed
//! - `reason`: flush trigger (update_count, delete_count, end_of_cycle, cancelled)

use metrics::{counter, gauge, histogram};
use std::time::{Duration, Instant};

use crate::batching::FlushReason;
use crate::stats::UpdateStats;
use crate::user::UserId;

/// Record the end of an update cycle and its document counts
pub fn record_update_cycle(stats: &UpdateStats, outcome: &str) {
    let kind = stats.kind.as_str();
    counter!(
        "contacts_indexer_updates_total",
        "kind" => kind,
        "outcome" => outcome.to_string()
    )
    .increment(1);

    let docs = [
        ("inserted", stats.new_contacts_inserted),
        ("updated", stats.contacts_update_succeeded),
        ("skipped", stats.contacts_update_skipped),
        ("update_failed", stats.contacts_update_failed),
        ("deleted", stats.contacts_delete_succeeded),
        ("delete_not_found", stats.contacts_delete_not_found),
        ("delete_failed", stats.contacts_delete_failed),
    ];
    for (result, count) in docs {
        if count > 0 {
            counter!(
                "contacts_indexer_documents_total",
                "kind" => kind,
                "result" => result
            )
            .increment(count as u64);
        }
    }

    histogram!("contacts_indexer_update_seconds", "kind" => kind)
        .record(stats.duration_millis() as f64 / 1000.0);
}

/// Record one batcher flush
pub fn record_flush(reason: FlushReason, updates: usize, deletes: usize, failed: usize) {
    counter!("contacts_indexer_flushes_total", "reason" => reason.as_str()).increment(1);
    histogram!("contacts_indexer_flush_size", "op" => "put").record(updates as f64);
    histogram!("contacts_indexer_flush_size", "op" => "remove").record(deletes as f64);
    if failed > 0 {
        counter!("contacts_indexer_flush_failures_total").increment(failed as u64);
    }
}

/// Record a provider query that returned no cursor
pub fn record_source_failure(query: &str) {
    counter!(
        "contacts_indexer_source_failures_total",
        "query" => query.to_string()
    )
    .increment(1);
}

/// Record the startup schema check result (fresh, unchanged, compatible, incompatible)
pub fn record_schema_check(result: &str) {
    counter!(
        "contacts_indexer_schema_checks_total",
        "result" => result.to_string()
    )
    .increment(1);
}

/// Record a full-update job being scheduled (periodic, one_off) or cancelled
pub fn record_job(action: &str) {
    counter!(
        "contacts_indexer_jobs_total",
        "action" => action.to_string()
    )
    .increment(1);
}

/// Record a change notification; `coalesced` when it only queued a rerun or
/// was absorbed by one already queued
pub fn record_notification(coalesced: bool) {
    counter!(
        "contacts_indexer_notifications_total",
        "coalesced" => if coalesced { "true" } else { "false" }
    )
    .increment(1);
}

/// Set the number of running user instances
pub fn set_active_users(count: usize) {
    gauge!("contacts_indexer_active_users").set(count as f64);
}

/// Set the current state of a user's instance (0 = idle, 1 = delta, 2 = delta + rerun,
/// 3 = full, 4 = shut down)
pub fn set_indexer_state(user: UserId, state: u8) {
    gauge!(
        "contacts_indexer_state",
        "user" => user.to_string()
    )
    .set(state as f64);
}

/// Record operation latency
pub fn record_latency(component: &str, operation: &str, duration: Duration) {
    histogram!(
        "contacts_indexer_operation_seconds",
        "component" => component.to_string(),
        "operation" => operation.to_string()
    )
    .record(duration.as_secs_f64());
}

/// A timing guard that records latency on drop
pub struct LatencyTimer {
    component: &'static str,
    operation: &'static str,
    start: Instant,
}

impl LatencyTimer {
    /// Start a new latency timer
    pub fn new(component: &'static str, operation: &'static str) -> Self {
        Self {
            component,
            operation,
            start: Instant::now(),
        }
    }
}

impl Drop for LatencyTimer {
    fn drop(&mut self) {
        record_latency(self.component, self.operation, self.start.elapsed());
    }
}
