//! In-process chunk collection.

use std::collections::HashMap;

use async_trait::async_trait;
use bytes::Bytes;
use tokio::sync::RwLock;

use super::ChunkCollection;
use crate::TRACING_TARGET_COLLECTION;
use crate::error::{BlobError, BlobResult};
use crate::manifest::ChunkManifest;

#[derive(Debug, Default)]
struct Sequence {
    chunks: HashMap<u64, Bytes>,
    manifest: Option<ChunkManifest>,
}

/// Keeps chunk sequences in memory.
#[derive(Debug, Default)]
pub struct MemoryChunkCollection {
    sequences: RwLock<HashMap<String, Sequence>>,
}

impl MemoryChunkCollection {
    /// Creates an empty collection.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of chunks stored for `key`, sealed or not.
    pub async fn chunk_count(&self, key: &str) -> usize {
        self.sequences
            .read()
            .await
            .get(key)
            .map_or(0, |s| s.chunks.len())
    }

    /// Returns the number of keys with any stored data.
    pub async fn len(&self) -> usize {
        self.sequences.read().await.len()
    }

    /// Returns whether the collection holds no data.
    pub async fn is_empty(&self) -> bool {
        self.sequences.read().await.is_empty()
    }
}

#[async_trait]
impl ChunkCollection for MemoryChunkCollection {
    fn name(&self) -> &'static str {
        "memory"
    }

    async fn write_chunk(&self, key: &str, index: u64, data: Bytes) -> BlobResult<()> {
        let mut sequences = self.sequences.write().await;
        let sequence = sequences.entry(key.to_owned()).or_default();
        if sequence.manifest.is_some() {
            return Err(BlobError::AlreadySealed {
                key: key.to_owned(),
            });
        }
        sequence.chunks.insert(index, data);
        Ok(())
    }

    async fn seal(&self, key: &str, manifest: &ChunkManifest) -> BlobResult<()> {
        let mut sequences = self.sequences.write().await;
        let sequence = sequences.entry(key.to_owned()).or_default();
        if sequence.manifest.is_some() {
            return Err(BlobError::AlreadySealed {
                key: key.to_owned(),
            });
        }

        for index in 0..manifest.chunk_count {
            let Some(chunk) = sequence.chunks.get(&index) else {
                return Err(BlobError::MissingChunk {
                    key: key.to_owned(),
                    index,
                });
            };
            if chunk.len() as u64 != manifest.chunk_len(index) {
                return Err(BlobError::ChunkLength {
                    key: key.to_owned(),
                    index,
                    length: chunk.len(),
                });
            }
        }

        sequence.manifest = Some(manifest.clone());
        tracing::debug!(
            target: TRACING_TARGET_COLLECTION,
            key = %key,
            chunks = manifest.chunk_count,
            length = manifest.length,
            "Sequence sealed"
        );
        Ok(())
    }

    async fn manifest(&self, key: &str) -> BlobResult<Option<ChunkManifest>> {
        Ok(self
            .sequences
            .read()
            .await
            .get(key)
            .and_then(|s| s.manifest.clone()))
    }

    async fn read_chunk(&self, key: &str, index: u64) -> BlobResult<Bytes> {
        self.sequences
            .read()
            .await
            .get(key)
            .and_then(|s| s.chunks.get(&index).cloned())
            .ok_or_else(|| BlobError::MissingChunk {
                key: key.to_owned(),
                index,
            })
    }

    async fn purge(&self, key: &str, _chunk_count: u64) -> BlobResult<()> {
        self.sequences.write().await.remove(key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn manifest(chunk_count: u64, length: u64) -> ChunkManifest {
        ChunkManifest {
            chunk_size: 4,
            chunk_count,
            length,
            sha256: String::new(),
        }
    }

    #[tokio::test]
    async fn seal_requires_every_chunk() {
        let collection = MemoryChunkCollection::new();
        collection
            .write_chunk("k", 0, Bytes::from_static(b"abcd"))
            .await
            .unwrap();

        let err = collection.seal("k", &manifest(2, 6)).await.unwrap_err();
        assert!(matches!(err, BlobError::MissingChunk { index: 1, .. }));
        assert_eq!(collection.manifest("k").await.unwrap(), None);

        collection
            .write_chunk("k", 1, Bytes::from_static(b"ef"))
            .await
            .unwrap();
        collection.seal("k", &manifest(2, 6)).await.unwrap();
        assert_eq!(collection.manifest("k").await.unwrap(), Some(manifest(2, 6)));
    }

    #[tokio::test]
    async fn seal_happens_once() {
        let collection = MemoryChunkCollection::new();
        collection
            .write_chunk("k", 0, Bytes::from_static(b"ab"))
            .await
            .unwrap();
        collection.seal("k", &manifest(1, 2)).await.unwrap();

        let err = collection.seal("k", &manifest(1, 2)).await.unwrap_err();
        assert!(matches!(err, BlobError::AlreadySealed { .. }));
        let err = collection
            .write_chunk("k", 0, Bytes::from_static(b"zz"))
            .await
            .unwrap_err();
        assert!(matches!(err, BlobError::AlreadySealed { .. }));
    }

    #[tokio::test]
    async fn purge_removes_everything() {
        let collection = MemoryChunkCollection::new();
        collection
            .write_chunk("k", 0, Bytes::from_static(b"ab"))
            .await
            .unwrap();
        collection.purge("k", 1).await.unwrap();
        collection.purge("k", 1).await.unwrap();

        assert!(collection.is_empty().await);
        assert!(collection.read_chunk("k", 0).await.is_err());
    }
}
