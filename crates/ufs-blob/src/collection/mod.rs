//! Chunk collections.

mod memory;
#[cfg(feature = "nats")]
mod nats;

use async_trait::async_trait;
use bytes::Bytes;
pub use memory::MemoryChunkCollection;
#[cfg(feature = "nats")]
pub use nats::NatsChunkCollection;

use crate::error::BlobResult;
use crate::manifest::ChunkManifest;

/// Keyed storage of chunk sequences.
///
/// Chunks are staged with [`write_chunk`] and become readable once the
/// sequence is sealed with a manifest. Sealing is atomic and happens at
/// most once per key.
///
/// [`write_chunk`]: ChunkCollection::write_chunk
#[async_trait]
pub trait ChunkCollection: Send + Sync + 'static {
    /// Collection name used in logs.
    fn name(&self) -> &'static str;

    /// Stages chunk `index` of `key`, replacing any previous value.
    async fn write_chunk(&self, key: &str, index: u64, data: Bytes) -> BlobResult<()>;

    /// Publishes `manifest` for `key`.
    ///
    /// Fails with [`BlobError::AlreadySealed`] if a manifest exists.
    ///
    /// [`BlobError::AlreadySealed`]: crate::BlobError::AlreadySealed
    async fn seal(&self, key: &str, manifest: &ChunkManifest) -> BlobResult<()>;

    /// Returns the manifest of a sealed sequence.
    async fn manifest(&self, key: &str) -> BlobResult<Option<ChunkManifest>>;

    /// Reads chunk `index` of `key`.
    async fn read_chunk(&self, key: &str, index: u64) -> BlobResult<Bytes>;

    /// Removes the manifest and chunks `0..chunk_count` of `key`. Absent
    /// entries are ignored.
    async fn purge(&self, key: &str, chunk_count: u64) -> BlobResult<()>;
}
