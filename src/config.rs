// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Configuration for the contacts indexer.
//!
//! # Example
//!
//! ```
//! use contacts_indexer::ContactsIndexerConfig;
//!
//! // Minimal config (uses defaults)
//! let config = ContactsIndexerConfig::default();
//! assert_eq!(config.update_batch_size, 50);
//!
//! // Index everything on every delta update
//! let config = ContactsIndexerConfig {
//!     delta_update_limit: None,
//!     first_run_indexing_limit: None,
//!     ..Default::default()
//! };
//! assert!(config.delta_update_limit.is_none());
//! ```

use std::path::PathBuf;

use serde::Deserialize;

use crate::batching::BatchConfig;
use crate::source::UpdateLimit;

/// Configuration for the contacts indexer.
///
/// Passed to each [`crate::UserInstance`] through a `tokio::sync::watch`
/// channel so that flags can be flipped at runtime.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ContactsIndexerConfig {
    /// Master switch. When off, pending full-update jobs are cancelled and
    /// change notifications are ignored.
    #[serde(default = "default_enabled")]
    pub enabled: bool,

    /// Max contacts listed by the first delta update after install
    /// (`None` = no limit)
    #[serde(default = "default_first_run_indexing_limit")]
    pub first_run_indexing_limit: Option<usize>,

    /// Max contacts listed per delta update (`None` = no limit)
    #[serde(default = "default_delta_update_limit")]
    pub delta_update_limit: Option<usize>,

    /// Max contacts kept by a full update; older ones are pruned
    /// (`None` = no limit)
    #[serde(default = "default_full_update_limit")]
    pub full_update_limit: Option<usize>,

    /// Period of the full-update job
    #[serde(default = "default_full_update_interval_millis")]
    pub full_update_interval_millis: u64,

    /// Max documents per put call
    #[serde(default = "default_update_batch_size")]
    pub update_batch_size: usize,

    /// Max ids per remove call
    #[serde(default = "default_delete_batch_size")]
    pub delete_batch_size: usize,

    /// Whether a delta update continues past failed batches
    #[serde(default = "default_keep_updating_on_error")]
    pub keep_updating_on_error: bool,

    /// Root directory for per-user settings files
    #[serde(default = "default_base_dir")]
    pub base_dir: PathBuf,
}

fn default_enabled() -> bool { true }
fn default_first_run_indexing_limit() -> Option<usize> { Some(1000) }
fn default_delta_update_limit() -> Option<usize> { Some(1000) }
fn default_full_update_limit() -> Option<usize> { Some(10_000) }
fn default_full_update_interval_millis() -> u64 { 30 * 24 * 60 * 60 * 1000 } // 30 days
fn default_update_batch_size() -> usize { 50 }
fn default_delete_batch_size() -> usize { 500 }
fn default_keep_updating_on_error() -> bool { true }
fn default_base_dir() -> PathBuf { PathBuf::from("./contacts_indexer") }

impl Default for ContactsIndexerConfig {
    fn default() -> Self {
        Self {
            enabled: default_enabled(),
            first_run_indexing_limit: default_first_run_indexing_limit(),
            delta_update_limit: default_delta_update_limit(),
            full_update_limit: default_full_update_limit(),
            full_update_interval_millis: default_full_update_interval_millis(),
            update_batch_size: default_update_batch_size(),
            delete_batch_size: default_delete_batch_size(),
            keep_updating_on_error: default_keep_updating_on_error(),
            base_dir: default_base_dir(),
        }
    }
}

impl ContactsIndexerConfig {
    /// Batcher thresholds derived from this config.
    #[must_use]
    pub fn batch_config(&self) -> BatchConfig {
        BatchConfig {
            max_updates_per_flush: self.update_batch_size,
            max_deletes_per_flush: self.delete_batch_size,
        }
    }

    /// Listing limit for a delta update.
    #[must_use]
    pub fn delta_limit(&self, first_run: bool) -> UpdateLimit {
        if first_run {
            UpdateLimit::from(self.first_run_indexing_limit)
        } else {
            UpdateLimit::from(self.delta_update_limit)
        }
    }

    /// Listing limit for a full update.
    #[must_use]
    pub fn full_limit(&self) -> UpdateLimit {
        UpdateLimit::from(self.full_update_limit)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ContactsIndexerConfig::default();
        assert!(config.enabled);
        assert_eq!(config.first_run_indexing_limit, Some(1000));
        assert_eq!(config.delta_update_limit, Some(1000));
        assert_eq!(config.full_update_limit, Some(10_000));
        assert_eq!(config.full_update_interval_millis, 2_592_000_000);
        assert_eq!(config.delete_batch_size, 500);
        assert!(config.keep_updating_on_error);
    }

    #[test]
    fn test_deserialize_empty_uses_defaults() {
        let config: ContactsIndexerConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config, ContactsIndexerConfig::default());
    }

    #[test]
    fn test_deserialize_null_limit_means_unbounded() {
        let config: ContactsIndexerConfig =
            serde_json::from_str(r#"{"delta_update_limit": null, "update_batch_size": 10}"#).unwrap();
        assert_eq!(config.delta_update_limit, None);
        assert_eq!(config.delta_limit(false), UpdateLimit::None);
        assert_eq!(config.update_batch_size, 10);
        assert_eq!(config.batch_config().max_updates_per_flush, 10);
    }

    #[test]
    fn test_first_run_limit_selected() {
        let config = ContactsIndexerConfig {
            first_run_indexing_limit: Some(7),
            delta_update_limit: Some(3),
            ..Default::default()
        };
        assert_eq!(config.delta_limit(true), UpdateLimit::AtMost(7));
        assert_eq!(config.delta_limit(false), UpdateLimit::AtMost(3));
        assert_eq!(config.full_limit(), UpdateLimit::AtMost(10_000));
    }
}
