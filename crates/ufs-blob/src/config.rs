//! Blob backend configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::backend::DEFAULT_CHUNK_SIZE;

// Default values
const DEFAULT_BUCKET: &str = "ufs_chunks";
const DEFAULT_CLIENT_NAME: &str = "ufs-blob";
const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 10;

/// Configuration of a chunked blob backend.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlobConfig {
    /// Chunk size in bytes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chunk_size: Option<usize>,
    /// Where chunks are kept.
    #[serde(default)]
    pub collection: CollectionConfig,
}

impl BlobConfig {
    /// Returns the chunk size, using the default if not set.
    #[inline]
    pub fn chunk_size(&self) -> usize {
        self.chunk_size.unwrap_or(DEFAULT_CHUNK_SIZE)
    }
}

/// Chunk collection selection.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
#[non_exhaustive]
pub enum CollectionConfig {
    /// In-process collection.
    #[default]
    Memory,
    /// NATS JetStream key-value bucket.
    Nats(NatsBlobConfig),
}

/// NATS connection and bucket settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NatsBlobConfig {
    /// NATS server URL (comma-separated for clustering).
    pub nats_url: String,
    /// Authentication token.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nats_token: Option<String>,
    /// Key-value bucket holding the chunks.
    #[serde(default = "default_bucket")]
    pub bucket: String,
    /// Connection timeout in seconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub connect_timeout_secs: Option<u64>,
}

fn default_bucket() -> String {
    DEFAULT_BUCKET.to_owned()
}

impl NatsBlobConfig {
    /// Creates a configuration for `nats_url` using the default bucket.
    pub fn new(nats_url: impl Into<String>) -> Self {
        Self {
            nats_url: nats_url.into(),
            nats_token: None,
            bucket: default_bucket(),
            connect_timeout_secs: None,
        }
    }

    /// Sets the authentication token.
    #[must_use]
    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.nats_token = Some(token.into());
        self
    }

    /// Sets the bucket name.
    #[must_use]
    pub fn with_bucket(mut self, bucket: impl Into<String>) -> Self {
        self.bucket = bucket.into();
        self
    }

    /// Returns the client name reported to the server.
    #[inline]
    pub fn client_name(&self) -> &'static str {
        DEFAULT_CLIENT_NAME
    }

    /// Returns the connection timeout.
    #[inline]
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(
            self.connect_timeout_secs
                .unwrap_or(DEFAULT_CONNECT_TIMEOUT_SECS),
        )
    }
}
