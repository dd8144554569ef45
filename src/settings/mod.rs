// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Persisted watermarks.
//!
//! One file per user at `<base_dir>/<user>/contacts_indexer_settings.pb`,
//! written atomically (temp file in the same directory, then rename). A
//! missing file means "never indexed". An unreadable file is logged and also
//! treated as "never indexed", which forces a full initial scan.
//!
//! The contact update and delete watermarks only move forward through the
//! `advance_*` setters. [`IndexerSettings::reset_contact_watermarks`] is the
//! single way back to zero.

pub mod codec;

use std::io::Write;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::{debug, warn};

pub const SETTINGS_FILE_NAME: &str = "contacts_indexer_settings.pb";

#[derive(Error, Debug)]
pub enum SettingsError {
    #[error("Settings I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Settings file truncated: needed {needed} bytes, {available} available")]
    Truncated { needed: usize, available: usize },
    #[error("Settings file has bad magic {0:?}")]
    BadMagic([u8; 4]),
    #[error("Unsupported settings format version {0}")]
    UnsupportedVersion(u16),
    #[error("Settings field {tag} has invalid length {len}")]
    BadFieldLength { tag: u16, len: usize },
}

/// The four watermarks of one user's index.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IndexerSettings {
    last_full_update_timestamp_millis: i64,
    last_delta_update_timestamp_millis: i64,
    last_contact_update_timestamp_millis: i64,
    last_contact_delete_timestamp_millis: i64,
}

impl IndexerSettings {
    /// Wall time of the last completed full update
    #[must_use]
    pub fn last_full_update_timestamp_millis(&self) -> i64 {
        self.last_full_update_timestamp_millis
    }

    /// Wall time of the last completed delta update
    #[must_use]
    pub fn last_delta_update_timestamp_millis(&self) -> i64 {
        self.last_delta_update_timestamp_millis
    }

    /// Newest provider update timestamp already indexed
    #[must_use]
    pub fn last_contact_update_timestamp_millis(&self) -> i64 {
        self.last_contact_update_timestamp_millis
    }

    /// Newest provider deletion timestamp already applied
    #[must_use]
    pub fn last_contact_delete_timestamp_millis(&self) -> i64 {
        self.last_contact_delete_timestamp_millis
    }

    /// No update of either kind has ever completed.
    #[must_use]
    pub fn is_first_run(&self) -> bool {
        self.last_full_update_timestamp_millis == 0 && self.last_delta_update_timestamp_millis == 0
    }

    pub fn set_last_full_update_timestamp_millis(&mut self, millis: i64) {
        self.last_full_update_timestamp_millis = millis;
    }

    pub fn set_last_delta_update_timestamp_millis(&mut self, millis: i64) {
        self.last_delta_update_timestamp_millis = millis;
    }

    /// Move the update watermark forward; older values are ignored.
    pub fn advance_last_contact_update_timestamp_millis(&mut self, millis: i64) {
        self.last_contact_update_timestamp_millis = self.last_contact_update_timestamp_millis.max(millis);
    }

    /// Move the delete watermark forward; older values are ignored.
    pub fn advance_last_contact_delete_timestamp_millis(&mut self, millis: i64) {
        self.last_contact_delete_timestamp_millis = self.last_contact_delete_timestamp_millis.max(millis);
    }

    /// Forget which contacts were indexed. Only for forced resyncs.
    pub fn reset_contact_watermarks(&mut self) {
        self.last_contact_update_timestamp_millis = 0;
        self.last_contact_delete_timestamp_millis = 0;
    }
}

/// Location of one user's settings file.
#[derive(Debug, Clone)]
pub struct SettingsFile {
    path: PathBuf,
}

impl SettingsFile {
    /// Settings file inside `dir`.
    pub fn new(dir: impl AsRef<Path>) -> Self {
        Self { path: dir.as_ref().join(SETTINGS_FILE_NAME) }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// `Ok(None)` if the file does not exist.
    pub async fn try_load(&self) -> Result<Option<IndexerSettings>, SettingsError> {
        match tokio::fs::read(&self.path).await {
            Ok(bytes) => codec::decode(&bytes).map(Some),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Load, falling back to all-zero watermarks on a missing or bad file.
    pub async fn load(&self) -> IndexerSettings {
        match self.try_load().await {
            Ok(Some(settings)) => {
                debug!(path = %self.path.display(), ?settings, "Loaded indexer settings");
                settings
            }
            Ok(None) => {
                debug!(path = %self.path.display(), "No indexer settings yet");
                IndexerSettings::default()
            }
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "Failed to read indexer settings, starting from scratch");
                IndexerSettings::default()
            }
        }
    }

    /// Atomically replace the file with `settings`.
    pub async fn persist(&self, settings: &IndexerSettings) -> Result<(), SettingsError> {
        let bytes = codec::encode(settings);
        let path = self.path.clone();
        tokio::task::spawn_blocking(move || write_atomically(&path, &bytes))
            .await
            .map_err(|e| std::io::Error::other(format!("settings writer panicked: {e}")))??;
        debug!(path = %self.path.display(), ?settings, "Persisted indexer settings");
        Ok(())
    }
}

fn write_atomically(path: &Path, bytes: &[u8]) -> Result<(), SettingsError> {
    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    std::fs::create_dir_all(dir)?;
    let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
    tmp.write_all(bytes)?;
    tmp.as_file().sync_all()?;
    tmp.persist(path).map_err(|e| e.error)?;
    Ok(())
}
