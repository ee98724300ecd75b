//! Process-wide UFS configuration.

use std::path::PathBuf;
use std::time::Duration;

#[cfg(feature = "config")]
use clap::Args;
use serde::{Deserialize, Serialize};

use crate::record::FileId;

// Default values
const DEFAULT_TMP_DIR_NAME: &str = "ufs";
const DEFAULT_TOKEN_TTL_SECS: u64 = 3600;
const DEFAULT_STORES_PATH: &str = "ufs";

/// Configuration shared by the registry and every store.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "config", derive(Args))]
pub struct UfsConfig {
    /// Staging directory for uploads in progress
    #[cfg_attr(feature = "config", arg(long = "ufs-tmp-dir", env = "UFS_TMP_DIR"))]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tmp_dir: Option<PathBuf>,

    /// Default lifetime of access tokens in seconds
    #[cfg_attr(
        feature = "config",
        arg(long = "ufs-token-ttl", env = "UFS_TOKEN_TTL_SECS")
    )]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_ttl_secs: Option<u64>,

    /// Public base URL files are served from (e.g. `https://chat.example.com`)
    #[cfg_attr(feature = "config", arg(long = "ufs-base-url", env = "UFS_BASE_URL"))]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,

    /// Path segment under which stores are served
    #[cfg_attr(
        feature = "config",
        arg(long = "ufs-stores-path", env = "UFS_STORES_PATH")
    )]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stores_path: Option<String>,
}

impl UfsConfig {
    /// Creates a configuration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the staging directory, defaulting to `$TMPDIR/ufs`.
    pub fn tmp_dir(&self) -> PathBuf {
        self.tmp_dir
            .clone()
            .unwrap_or_else(|| std::env::temp_dir().join(DEFAULT_TMP_DIR_NAME))
    }

    /// Returns the staging directory of one store.
    ///
    /// Names made of ASCII letters, digits, `-` and `_` are used as is;
    /// anything else is hex encoded behind a `~` so no name can escape the
    /// staging directory or collide with another.
    pub fn store_tmp_dir(&self, store: &str) -> PathBuf {
        let plain = !store.is_empty()
            && store
                .bytes()
                .all(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b'_');

        if plain {
            self.tmp_dir().join(store)
        } else {
            self.tmp_dir().join(format!("~{}", hex::encode(store)))
        }
    }

    /// Returns the staging path of a file.
    pub fn temp_path(&self, file_id: &FileId) -> PathBuf {
        self.tmp_dir().join(file_id.as_str())
    }

    /// Returns the staging path of a file of `store`:
    /// `{tmp_dir}/{store}/{id}`. Ids are only unique within a store.
    pub fn store_temp_path(&self, store: &str, file_id: &FileId) -> PathBuf {
        self.store_tmp_dir(store).join(file_id.as_str())
    }

    /// Returns the default token lifetime.
    #[inline]
    pub fn token_ttl(&self) -> Duration {
        Duration::from_secs(self.token_ttl_secs.unwrap_or(DEFAULT_TOKEN_TTL_SECS))
    }

    /// Returns the store path segment without surrounding slashes.
    pub fn stores_path(&self) -> &str {
        self.stores_path
            .as_deref()
            .map(|p| p.trim_matches('/'))
            .unwrap_or(DEFAULT_STORES_PATH)
    }

    /// Returns the base URL without a trailing slash, if configured.
    pub fn base_url(&self) -> Option<&str> {
        self.base_url.as_deref().map(|u| u.trim_end_matches('/'))
    }

    /// Set the staging directory.
    #[must_use]
    pub fn with_tmp_dir(mut self, tmp_dir: impl Into<PathBuf>) -> Self {
        self.tmp_dir = Some(tmp_dir.into());
        self
    }

    /// Set the default token lifetime.
    #[must_use]
    pub fn with_token_ttl(mut self, ttl: Duration) -> Self {
        self.token_ttl_secs = Some(ttl.as_secs());
        self
    }

    /// Set the public base URL.
    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    /// Set the store path segment.
    #[must_use]
    pub fn with_stores_path(mut self, stores_path: impl Into<String>) -> Self {
        self.stores_path = Some(stores_path.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = UfsConfig::default();
        assert_eq!(config.tmp_dir(), std::env::temp_dir().join("ufs"));
        assert_eq!(config.token_ttl(), Duration::from_secs(3600));
        assert_eq!(config.stores_path(), "ufs");
        assert_eq!(config.base_url(), None);
    }

    #[test]
    fn temp_path_lives_under_tmp_dir() {
        let config = UfsConfig::new().with_tmp_dir("/var/tmp/uploads");
        let id = FileId::new("abc").unwrap();
        assert_eq!(config.temp_path(&id), PathBuf::from("/var/tmp/uploads/abc"));
        assert_eq!(
            config.store_temp_path("avatars", &id),
            PathBuf::from("/var/tmp/uploads/avatars/abc")
        );
    }

    #[test]
    fn staging_is_namespaced_by_store() {
        let config = UfsConfig::new().with_tmp_dir("/var/tmp/uploads");
        let id = FileId::new("abc").unwrap();

        assert_ne!(
            config.store_temp_path("drafts", &id),
            config.store_temp_path("published", &id)
        );
        assert_eq!(
            config.store_temp_path("../etc", &id),
            PathBuf::from("/var/tmp/uploads/~2e2e2f657463/abc")
        );
        assert_eq!(config.store_tmp_dir(""), PathBuf::from("/var/tmp/uploads/~"));
    }

    #[test]
    fn trims_slashes() {
        let config = UfsConfig::new()
            .with_base_url("https://example.com/")
            .with_stores_path("/files/");
        assert_eq!(config.base_url(), Some("https://example.com"));
        assert_eq!(config.stores_path(), "files");
    }
}
