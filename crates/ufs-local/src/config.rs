//! Local backend configuration.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

// Default values
const DEFAULT_ROOT: &str = "uploads";

/// Configuration of a local filesystem backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocalConfig {
    /// Directory completed files are stored in.
    pub root: PathBuf,
}

impl LocalConfig {
    /// Creates a configuration rooted at `root`.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Returns the storage root.
    #[inline]
    pub fn root(&self) -> &Path {
        &self.root
    }
}

impl Default for LocalConfig {
    fn default() -> Self {
        Self::new(DEFAULT_ROOT)
    }
}
