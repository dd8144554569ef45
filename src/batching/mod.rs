// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Write batching for update cycles.
//!
//! A [`ContactsBatcher`] collects document writes and deletions and flushes
//! them to the document store when either pending set reaches its threshold.
//! Each update cycle owns its own batcher.

pub mod contacts_batcher;

pub use contacts_batcher::{BatchEntry, ContactsBatcher};

use std::time::{Duration, Instant};

/// Batch flush trigger reason
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlushReason {
    /// Pending updates reached `max_updates_per_flush`
    UpdateCount,
    /// Pending deletions reached `max_deletes_per_flush`
    DeleteCount,
    /// Remainder flushed at the end of a cycle
    EndOfCycle,
    /// Remainder flushed because the cycle was cancelled
    Cancelled,
}

impl FlushReason {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::UpdateCount => "update_count",
            Self::DeleteCount => "delete_count",
            Self::EndOfCycle => "end_of_cycle",
            Self::Cancelled => "cancelled",
        }
    }
}

/// Flush thresholds. Zero behaves like one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchConfig {
    pub max_updates_per_flush: usize,
    pub max_deletes_per_flush: usize,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            max_updates_per_flush: 50,
            max_deletes_per_flush: 500,
        }
    }
}

/// Items pending flush
#[derive(Debug)]
pub struct Batch<T> {
    pub items: Vec<T>,
    pub created_at: Instant,
}

impl<T> Batch<T> {
    pub fn new() -> Self {
        Self {
            items: Vec::new(),
            created_at: Instant::now(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn age(&self) -> Duration {
        self.created_at.elapsed()
    }

    pub fn push(&mut self, item: T) {
        self.items.push(item);
    }

    /// Whether this batch holds at least `threshold` items.
    pub fn is_full(&self, threshold: usize) -> bool {
        self.items.len() >= threshold.max(1)
    }

    pub fn take(&mut self) -> Vec<T> {
        self.created_at = Instant::now();
        std::mem::take(&mut self.items)
    }
}

impl<T> Default for Batch<T> {
    fn default() -> Self {
        Self::new()
    }
}
