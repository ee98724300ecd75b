//! NATS JetStream key-value chunk collection.

use std::time::Duration;

use async_nats::jetstream::{self, kv};
use async_nats::ConnectOptions;
use async_trait::async_trait;
use bytes::Bytes;

use super::ChunkCollection;
use crate::TRACING_TARGET_COLLECTION;
use crate::config::NatsBlobConfig;
use crate::error::{BlobError, BlobResult};
use crate::manifest::ChunkManifest;

/// Stores chunks as `{key}.{index}` and manifests as `{key}.manifest` in a
/// key-value bucket. Sealing uses a create-if-absent write, so it succeeds
/// at most once.
#[derive(Clone)]
pub struct NatsChunkCollection {
    store: kv::Store,
    bucket: String,
}

impl NatsChunkCollection {
    /// Connects to NATS and opens (or creates) the configured bucket.
    #[tracing::instrument(skip(config), target = TRACING_TARGET_COLLECTION)]
    pub async fn connect(config: &NatsBlobConfig) -> BlobResult<Self> {
        let mut options = ConnectOptions::new().name(config.client_name());
        if let Some(token) = &config.nats_token {
            options = options.token(token.clone());
        }

        let timeout = config.connect_timeout();
        let client = tokio::time::timeout(
            timeout,
            async_nats::connect_with_options(&config.nats_url, options),
        )
        .await
        .map_err(|_| {
            BlobError::operation(
                "connect",
                format!("timed out after {}s", timeout.as_secs()),
            )
        })?
        .map_err(|e| BlobError::operation("connect", e.to_string()))?;

        Self::open(jetstream::new(client), &config.bucket).await
    }

    /// Opens (or creates) `bucket` on an existing JetStream context.
    pub async fn open(jetstream: jetstream::Context, bucket: &str) -> BlobResult<Self> {
        let store = match jetstream.get_key_value(bucket).await {
            Ok(store) => {
                tracing::debug!(
                    target: TRACING_TARGET_COLLECTION,
                    bucket = %bucket,
                    "Using existing KV bucket"
                );
                store
            }
            Err(_) => {
                tracing::debug!(
                    target: TRACING_TARGET_COLLECTION,
                    bucket = %bucket,
                    "Creating new KV bucket"
                );
                jetstream
                    .create_key_value(kv::Config {
                        bucket: bucket.to_owned(),
                        description: "UFS chunk sequences".to_owned(),
                        history: 1,
                        max_age: Duration::ZERO,
                        ..Default::default()
                    })
                    .await
                    .map_err(|e| BlobError::operation("kv_create", e.to_string()))?
            }
        };

        tracing::info!(
            target: TRACING_TARGET_COLLECTION,
            bucket = %bucket,
            "NATS chunk collection ready"
        );

        Ok(Self {
            store,
            bucket: bucket.to_owned(),
        })
    }

    /// Returns the bucket name.
    #[inline]
    pub fn bucket(&self) -> &str {
        &self.bucket
    }
}

fn chunk_key(key: &str, index: u64) -> String {
    format!("{key}.{index}")
}

fn manifest_key(key: &str) -> String {
    format!("{key}.manifest")
}

#[async_trait]
impl ChunkCollection for NatsChunkCollection {
    fn name(&self) -> &'static str {
        "nats"
    }

    async fn write_chunk(&self, key: &str, index: u64, data: Bytes) -> BlobResult<()> {
        let size = data.len();
        let revision = self
            .store
            .put(chunk_key(key, index), data)
            .await
            .map_err(|e| BlobError::operation("kv_put", e.to_string()))?;

        tracing::trace!(
            target: TRACING_TARGET_COLLECTION,
            key = %key,
            index,
            revision,
            size,
            "Chunk staged"
        );
        Ok(())
    }

    async fn seal(&self, key: &str, manifest: &ChunkManifest) -> BlobResult<()> {
        let json = serde_json::to_vec(manifest).map_err(|e| BlobError::CorruptManifest {
            key: key.to_owned(),
            source: e,
        })?;

        match self.store.create(manifest_key(key), json.into()).await {
            Ok(_) => {
                tracing::debug!(
                    target: TRACING_TARGET_COLLECTION,
                    key = %key,
                    chunks = manifest.chunk_count,
                    length = manifest.length,
                    "Sequence sealed"
                );
                Ok(())
            }
            Err(e) if e.kind() == kv::CreateErrorKind::AlreadyExists => {
                Err(BlobError::AlreadySealed {
                    key: key.to_owned(),
                })
            }
            Err(e) => Err(BlobError::operation("kv_create", e.to_string())),
        }
    }

    async fn manifest(&self, key: &str) -> BlobResult<Option<ChunkManifest>> {
        let Some(value) = self
            .store
            .get(manifest_key(key))
            .await
            .map_err(|e| BlobError::operation("kv_get", e.to_string()))?
        else {
            return Ok(None);
        };

        serde_json::from_slice(&value)
            .map(Some)
            .map_err(|e| BlobError::CorruptManifest {
                key: key.to_owned(),
                source: e,
            })
    }

    async fn read_chunk(&self, key: &str, index: u64) -> BlobResult<Bytes> {
        self.store
            .get(chunk_key(key, index))
            .await
            .map_err(|e| BlobError::operation("kv_get", e.to_string()))?
            .ok_or_else(|| BlobError::MissingChunk {
                key: key.to_owned(),
                index,
            })
    }

    async fn purge(&self, key: &str, chunk_count: u64) -> BlobResult<()> {
        self.store
            .purge(manifest_key(key))
            .await
            .map_err(|e| BlobError::operation("kv_purge", e.to_string()))?;

        for index in 0..chunk_count {
            self.store
                .purge(chunk_key(key, index))
                .await
                .map_err(|e| BlobError::operation("kv_purge", e.to_string()))?;
        }

        tracing::debug!(
            target: TRACING_TARGET_COLLECTION,
            key = %key,
            chunks = chunk_count,
            "Sequence purged"
        );
        Ok(())
    }
}

impl std::fmt::Debug for NatsChunkCollection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NatsChunkCollection")
            .field("bucket", &self.bucket)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_layout() {
        assert_eq!(chunk_key("abc", 0), "abc.0");
        assert_eq!(chunk_key("abc", 12), "abc.12");
        assert_eq!(manifest_key("abc"), "abc.manifest");
    }
}
