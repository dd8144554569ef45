// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Device user identity.

use std::fmt;
use std::path::{Path, PathBuf};

/// Identifier of a device user. Every user has an independent index,
/// settings file and executor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct UserId(pub u32);

impl UserId {
    /// Per-user directory under `base_dir`.
    #[must_use]
    pub fn settings_dir(&self, base_dir: &Path) -> PathBuf {
        base_dir.join(self.0.to_string())
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_settings_dir_is_per_user() {
        let base = Path::new("/data/indexer");
        assert_eq!(UserId(0).settings_dir(base), PathBuf::from("/data/indexer/0"));
        assert_eq!(UserId(10).settings_dir(base), PathBuf::from("/data/indexer/10"));
        assert_eq!(format!("{}", UserId(10)), "10");
    }
}
