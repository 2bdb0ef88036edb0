// SPDX-License-Identifier: MIT
//! Session configuration.
//!
//! Everything has a built-in default; a `todosync.toml` in the data
//! directory may override any subset of fields. Priority: explicit
//! setter > TOML > built-in default.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::error;

use crate::projection::PagePolicy;

const DEFAULT_PAGE_SIZE: u32 = 20;
const DEFAULT_REFRESH_LIMIT: u32 = 500;
const DEFAULT_TOAST_DURATION_MS: u64 = 3000;

/// Store-wide configuration, decided once at session construction.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SyncConfig {
    /// Items per projected page (default: 20).
    pub page_size: u32,
    /// Page size used when refetching the full set on invalidate
    /// (default: 500 — the canonical cache holds the whole collection
    /// at the target scale).
    pub refresh_limit: u32,
    /// How long a toast stays visible before auto-dismiss (default: 3000 ms).
    pub toast_duration_ms: u64,
    /// What to do when a requested page exceeds the available pages
    /// (default: clamp to the last non-empty page).
    pub page_policy: PagePolicy,
    /// Blob path for the local fallback gateway. None = caller supplies
    /// its own gateway.
    pub data_path: Option<PathBuf>,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            page_size: DEFAULT_PAGE_SIZE,
            refresh_limit: DEFAULT_REFRESH_LIMIT,
            toast_duration_ms: DEFAULT_TOAST_DURATION_MS,
            page_policy: PagePolicy::Clamp,
            data_path: None,
        }
    }
}

impl SyncConfig {
    /// Load config from `{dir}/todosync.toml`, falling back to defaults
    /// for absent files or fields. A malformed file is logged and ignored
    /// rather than failing session construction.
    pub fn load(dir: &Path) -> Self {
        let path = dir.join("todosync.toml");
        let Ok(contents) = std::fs::read_to_string(&path) else {
            return Self::default();
        };
        match toml::from_str::<SyncConfig>(&contents) {
            Ok(cfg) => cfg,
            Err(e) => {
                error!(path = %path.display(), err = %e, "failed to parse todosync.toml — using defaults");
                Self::default()
            }
        }
    }

    pub fn toast_duration(&self) -> Duration {
        Duration::from_millis(self.toast_duration_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_sane() {
        let cfg = SyncConfig::default();
        assert_eq!(cfg.page_size, 20);
        assert_eq!(cfg.refresh_limit, 500);
        assert_eq!(cfg.toast_duration(), Duration::from_millis(3000));
        assert_eq!(cfg.page_policy, PagePolicy::Clamp);
        assert!(cfg.data_path.is_none());
    }

    #[test]
    fn partial_toml_overrides_only_named_fields() {
        let cfg: SyncConfig = toml::from_str("page_size = 5\npage_policy = \"strict\"").unwrap();
        assert_eq!(cfg.page_size, 5);
        assert_eq!(cfg.page_policy, PagePolicy::Strict);
        assert_eq!(cfg.refresh_limit, 500);
    }

    #[test]
    fn missing_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = SyncConfig::load(dir.path());
        assert_eq!(cfg.page_size, SyncConfig::default().page_size);
    }

    #[test]
    fn malformed_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("todosync.toml"), "page_size = \"not a number\"").unwrap();
        let cfg = SyncConfig::load(dir.path());
        assert_eq!(cfg.page_size, SyncConfig::default().page_size);
    }
}
