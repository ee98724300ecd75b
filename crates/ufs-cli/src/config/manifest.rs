//! JSON manifest of named stores.
//!
//! ```json
//! {
//!   "stores": [
//!     {
//!       "name": "avatars",
//!       "backend": { "adapter": "local", "config": { "root": "/srv/ufs/avatars" } },
//!       "allow_content_types": ["image/*"],
//!       "max_size": 1048576
//!     },
//!     {
//!       "name": "uploads",
//!       "backend": {
//!         "adapter": "object",
//!         "config": { "type": "s3", "bucket": "chat", "region": "eu-west-1", "prefix": "uploads" }
//!       }
//!     }
//!   ]
//! }
//! ```

use std::path::Path;

use anyhow::{Context, bail};
use serde::{Deserialize, Serialize};
use ufs_blob::{BlobBackend, BlobConfig, BlobStore};
use ufs_core::{Filter, Registry, RegistryBuilder, UfsConfig};
use ufs_local::{LocalBackend, LocalConfig, LocalStore};
use ufs_opendal::{ObjectStoreConfig, OpendalBackend, OpendalStore};

use crate::TRACING_TARGET_CONFIG;

/// Adapter a store is built on, with its configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "adapter", content = "config", rename_all = "snake_case")]
pub enum BackendConfig {
    /// Files on the local disk.
    Local(LocalConfig),
    /// Objects in an OpenDAL service.
    Object(ObjectStoreConfig),
    /// Chunk sequences in a key-value collection.
    Blob(BlobConfig),
}

impl BackendConfig {
    fn adapter(&self) -> &'static str {
        match self {
            Self::Local(_) => "local",
            Self::Object(_) => "object",
            Self::Blob(_) => "blob",
        }
    }
}

/// Upload validation rules of a store.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterConfig {
    /// Accepted content types (`image/*` style wildcards allowed).
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub allow_content_types: Vec<String>,
    /// Rejected content types.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub deny_content_types: Vec<String>,
    /// Accepted extensions.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub allow_extensions: Vec<String>,
    /// Rejected extensions.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub deny_extensions: Vec<String>,
    /// Smallest accepted declared size in bytes.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_size: Option<u64>,
    /// Largest accepted size in bytes.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_size: Option<u64>,
}

impl FilterConfig {
    /// Builds the filter, rejecting lists that both allow and deny the
    /// same attribute.
    pub fn to_filter(&self) -> anyhow::Result<Filter> {
        if !self.allow_content_types.is_empty() && !self.deny_content_types.is_empty() {
            bail!("allow_content_types and deny_content_types are mutually exclusive");
        }
        if !self.allow_extensions.is_empty() && !self.deny_extensions.is_empty() {
            bail!("allow_extensions and deny_extensions are mutually exclusive");
        }
        if let (Some(min), Some(max)) = (self.min_size, self.max_size)
            && min > max
        {
            bail!("min_size ({min}) exceeds max_size ({max})");
        }

        let mut filter = Filter::new();
        if !self.allow_content_types.is_empty() {
            filter = filter.allow_content_types(self.allow_content_types.iter().cloned());
        }
        if !self.deny_content_types.is_empty() {
            filter = filter.deny_content_types(self.deny_content_types.iter().cloned());
        }
        if !self.allow_extensions.is_empty() {
            filter = filter.allow_extensions(self.allow_extensions.iter().cloned());
        }
        if !self.deny_extensions.is_empty() {
            filter = filter.deny_extensions(self.deny_extensions.iter().cloned());
        }
        if let Some(min) = self.min_size {
            filter = filter.with_min_size(min);
        }
        if let Some(max) = self.max_size {
            filter = filter.with_max_size(max);
        }

        Ok(filter)
    }
}

/// One named store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreEntry {
    /// Registered store name.
    pub name: String,
    /// Adapter and its configuration.
    pub backend: BackendConfig,
    /// Validation rules.
    #[serde(flatten)]
    pub filter: FilterConfig,
}

/// Every store the CLI works with.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StoresManifest {
    /// Stores in registration order.
    pub stores: Vec<StoreEntry>,
}

impl StoresManifest {
    /// Reads and parses a manifest file.
    pub async fn load(path: &Path) -> anyhow::Result<Self> {
        let content = tokio::fs::read(path)
            .await
            .with_context(|| format!("failed to read store manifest {}", path.display()))?;

        let manifest: Self = serde_json::from_slice(&content)
            .with_context(|| format!("invalid store manifest {}", path.display()))?;

        tracing::debug!(
            target: TRACING_TARGET_CONFIG,
            path = %path.display(),
            stores = manifest.stores.len(),
            "Store manifest loaded"
        );

        Ok(manifest)
    }

    /// Initializes every backend and registers the stores.
    pub async fn build_registry(&self, config: UfsConfig) -> anyhow::Result<Registry> {
        if self.stores.is_empty() {
            bail!("store manifest does not define any store");
        }

        let mut builder = RegistryBuilder::new(config.clone());
        for entry in &self.stores {
            builder = Self::register(builder, entry, &config)
                .await
                .with_context(|| format!("failed to initialize store `{}`", entry.name))?;

            tracing::debug!(
                target: TRACING_TARGET_CONFIG,
                store = %entry.name,
                adapter = entry.backend.adapter(),
                "Store backend initialized"
            );
        }

        Ok(builder.build())
    }

    async fn register(
        builder: RegistryBuilder,
        entry: &StoreEntry,
        config: &UfsConfig,
    ) -> anyhow::Result<RegistryBuilder> {
        let filter = entry.filter.to_filter()?;

        let builder = match &entry.backend {
            BackendConfig::Local(local) => {
                let backend = LocalBackend::new(local, config).await?;
                builder.register_store(LocalStore::new(&entry.name, backend).with_filter(filter))?
            }
            BackendConfig::Object(object) => {
                let backend = OpendalBackend::from_config(object)?;
                builder.register_store(OpendalStore::new(&entry.name, backend).with_filter(filter))?
            }
            BackendConfig::Blob(blob) => {
                let backend = BlobBackend::from_config(blob).await?;
                builder.register_store(BlobStore::new(&entry.name, backend).with_filter(filter))?
            }
        };

        Ok(builder)
    }
}
