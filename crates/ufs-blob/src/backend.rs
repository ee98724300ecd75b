//! Chunked blob backend.

use std::sync::Arc;

use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use futures::StreamExt;
use ufs_core::record::{ByteRange, FileRecord};
use ufs_core::store::UploadStore;
use ufs_core::stream::{ByteStream, Fingerprint};
use ufs_core::{Backend, BackendWriter, Error, Result};

use crate::TRACING_TARGET_BACKEND;
use crate::collection::{ChunkCollection, MemoryChunkCollection};
use crate::config::{BlobConfig, CollectionConfig};
use crate::error::BlobError;
use crate::manifest::ChunkManifest;

/// Default chunk size (255 KiB).
pub const DEFAULT_CHUNK_SIZE: usize = 255 * 1024;

/// A store backed by a chunk collection.
pub type BlobStore = UploadStore<BlobBackend>;

/// Splits objects into chunks kept in a [`ChunkCollection`].
#[derive(Clone)]
pub struct BlobBackend {
    collection: Arc<dyn ChunkCollection>,
    chunk_size: usize,
}

impl BlobBackend {
    /// Creates a backend over `collection` with the default chunk size.
    pub fn new(collection: impl ChunkCollection) -> Self {
        Self::from_shared(Arc::new(collection))
    }

    /// Creates a backend over an already shared collection.
    pub fn from_shared(collection: Arc<dyn ChunkCollection>) -> Self {
        Self {
            collection,
            chunk_size: DEFAULT_CHUNK_SIZE,
        }
    }

    /// Creates a backend from configuration, connecting to the collection.
    pub async fn from_config(config: &BlobConfig) -> Result<Self> {
        let collection: Arc<dyn ChunkCollection> = match &config.collection {
            CollectionConfig::Memory => Arc::new(MemoryChunkCollection::new()),
            #[cfg(feature = "nats")]
            CollectionConfig::Nats(nats) => {
                Arc::new(crate::collection::NatsChunkCollection::connect(nats).await?)
            }
            #[cfg(not(feature = "nats"))]
            CollectionConfig::Nats(_) => {
                return Err(Error::backend()
                    .with_retryable(false)
                    .with_message("nats support is not enabled, rebuild with the `nats` feature"));
            }
        };

        let backend = Self::from_shared(collection).with_chunk_size(config.chunk_size());

        tracing::info!(
            target: TRACING_TARGET_BACKEND,
            collection = backend.collection.name(),
            chunk_size = backend.chunk_size,
            "Blob backend initialized"
        );

        Ok(backend)
    }

    /// Sets the chunk size. Zero is raised to one byte.
    #[must_use]
    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size.max(1);
        self
    }

    /// Returns the chunk size.
    #[inline]
    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    /// Returns the chunk collection.
    pub fn collection(&self) -> &Arc<dyn ChunkCollection> {
        &self.collection
    }

    async fn sealed(&self, key: &str) -> Result<ChunkManifest> {
        self.collection.manifest(key).await?.ok_or_else(|| {
            Error::not_found().with_message("chunk sequence is not sealed")
        })
    }
}

#[async_trait]
impl Backend for BlobBackend {
    fn kind(&self) -> &'static str {
        "blob"
    }

    fn locate(&self, record: &FileRecord) -> String {
        record.id.to_string()
    }

    fn supports_range(&self) -> bool {
        true
    }

    async fn open_writer(&self, record: &FileRecord) -> Result<Box<dyn BackendWriter>> {
        Ok(Box::new(BlobWriter {
            collection: Arc::clone(&self.collection),
            key: record.locator.clone(),
            chunk_size: self.chunk_size,
            buffer: BytesMut::with_capacity(self.chunk_size),
            next_index: 0,
            fingerprint: Fingerprint::new(),
        }))
    }

    #[tracing::instrument(skip_all, target = TRACING_TARGET_BACKEND, fields(file_id = %record.id))]
    async fn open_reader(
        &self,
        record: &FileRecord,
        range: Option<ByteRange>,
    ) -> Result<ByteStream> {
        let manifest = self.sealed(&record.locator).await?;
        if manifest.length == 0 {
            return Ok(futures::stream::empty().boxed());
        }

        let (start, end) = match range {
            Some(range) => (range.start(), range.end().min(manifest.length - 1)),
            None => (0, manifest.length - 1),
        };
        let (chunks, skip, keep) = manifest.span(start, end);
        let first = *chunks.start();
        let last = *chunks.end();

        tracing::debug!(
            target: TRACING_TARGET_BACKEND,
            key = %record.locator,
            first_chunk = first,
            last_chunk = last,
            "Reading chunks"
        );

        let collection = Arc::clone(&self.collection);
        let key = record.locator.clone();

        let stream = async_stream::stream! {
            for index in chunks {
                let chunk = match collection.read_chunk(&key, index).await {
                    Ok(chunk) => chunk,
                    Err(err) => {
                        yield Err(Error::from(err));
                        return;
                    }
                };

                if chunk.len() as u64 != manifest.chunk_len(index) {
                    yield Err(Error::from(BlobError::ChunkLength {
                        key: key.clone(),
                        index,
                        length: chunk.len(),
                    }));
                    return;
                }

                let lo = if index == first { skip as usize } else { 0 };
                let hi = if index == last { keep as usize } else { chunk.len() };
                yield Ok(chunk.slice(lo..hi));
            }
        };

        Ok(stream.boxed())
    }

    #[tracing::instrument(skip_all, target = TRACING_TARGET_BACKEND, fields(file_id = %record.id))]
    async fn remove(&self, record: &FileRecord) -> Result<()> {
        let chunk_count = self
            .collection
            .manifest(&record.locator)
            .await?
            .map_or(0, |m| m.chunk_count);

        self.collection.purge(&record.locator, chunk_count).await?;

        tracing::debug!(
            target: TRACING_TARGET_BACKEND,
            key = %record.locator,
            chunks = chunk_count,
            "Chunk sequence removed"
        );
        Ok(())
    }
}

impl std::fmt::Debug for BlobBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BlobBackend")
            .field("collection", &self.collection.name())
            .field("chunk_size", &self.chunk_size)
            .finish()
    }
}

/// Buffers bytes into fixed-size chunks and seals them on commit.
struct BlobWriter {
    collection: Arc<dyn ChunkCollection>,
    key: String,
    chunk_size: usize,
    buffer: BytesMut,
    next_index: u64,
    fingerprint: Fingerprint,
}

impl BlobWriter {
    async fn flush_chunk(&mut self, chunk: Bytes) -> Result<()> {
        self.collection
            .write_chunk(&self.key, self.next_index, chunk)
            .await?;
        self.next_index += 1;
        Ok(())
    }

    async fn purge(&self) {
        if let Err(err) = self.collection.purge(&self.key, self.next_index).await {
            tracing::warn!(
                target: TRACING_TARGET_BACKEND,
                key = %self.key,
                error = %err,
                "Failed to purge staged chunks"
            );
        }
    }
}

#[async_trait]
impl BackendWriter for BlobWriter {
    async fn write(&mut self, chunk: Bytes) -> Result<()> {
        self.fingerprint.update(&chunk);
        self.buffer.extend_from_slice(&chunk);

        while self.buffer.len() >= self.chunk_size {
            let full = self.buffer.split_to(self.chunk_size).freeze();
            self.flush_chunk(full).await?;
        }
        Ok(())
    }

    async fn commit(mut self: Box<Self>) -> Result<()> {
        if !self.buffer.is_empty() {
            let rest = self.buffer.split().freeze();
            if let Err(err) = self.flush_chunk(rest).await {
                self.purge().await;
                return Err(err);
            }
        }

        let fingerprint = std::mem::take(&mut self.fingerprint);
        let manifest = ChunkManifest {
            chunk_size: self.chunk_size as u64,
            chunk_count: self.next_index,
            length: fingerprint.length(),
            sha256: fingerprint.finalize_hex(),
        };

        if let Err(err) = self.collection.seal(&self.key, &manifest).await {
            self.purge().await;
            return Err(err.into());
        }

        tracing::debug!(
            target: TRACING_TARGET_BACKEND,
            key = %self.key,
            chunks = manifest.chunk_count,
            length = manifest.length,
            "Chunk sequence committed"
        );
        Ok(())
    }

    async fn abort(self: Box<Self>) -> Result<()> {
        self.collection
            .purge(&self.key, self.next_index)
            .await
            .map_err(Error::from)
    }
}

#[cfg(test)]
mod tests {
    use ufs_core::record::{FileId, NewFile};

    use super::*;

    fn record(backend: &BlobBackend) -> FileRecord {
        let file = NewFile::new("data.bin", "application/octet-stream", 0);
        let mut record = FileRecord::pending(FileId::generate(), &file, "blobs", None);
        record.locator = backend.locate(&record);
        record
    }

    async fn collect(stream: ByteStream) -> Vec<u8> {
        let chunks: Vec<_> = stream.collect().await;
        chunks.into_iter().flat_map(|c| c.unwrap().to_vec()).collect()
    }

    async fn store(backend: &BlobBackend, record: &FileRecord, data: &[u8]) {
        let mut writer = backend.open_writer(record).await.unwrap();
        for piece in data.chunks(3) {
            writer.write(Bytes::copy_from_slice(piece)).await.unwrap();
        }
        writer.commit().await.unwrap();
    }

    #[tokio::test]
    async fn splits_into_chunks() {
        let collection = Arc::new(MemoryChunkCollection::new());
        let backend = BlobBackend::from_shared(collection.clone()).with_chunk_size(4);
        let record = record(&backend);

        store(&backend, &record, b"0123456789").await;

        assert_eq!(collection.chunk_count(&record.locator).await, 3);
        let manifest = collection.manifest(&record.locator).await.unwrap().unwrap();
        assert_eq!(manifest.chunk_count, 3);
        assert_eq!(manifest.length, 10);
        assert_eq!(manifest.sha256.len(), 64);
    }

    #[tokio::test]
    async fn unsealed_chunks_are_invisible() {
        let backend = BlobBackend::new(MemoryChunkCollection::new()).with_chunk_size(4);
        let record = record(&backend);

        let mut writer = backend.open_writer(&record).await.unwrap();
        writer.write(Bytes::from_static(b"01234567")).await.unwrap();

        let err = backend.open_reader(&record, None).await.err().unwrap();
        assert!(err.is_not_found());
        writer.abort().await.unwrap();
    }

    #[tokio::test]
    async fn abort_purges_chunks() {
        let collection = Arc::new(MemoryChunkCollection::new());
        let backend = BlobBackend::from_shared(collection.clone()).with_chunk_size(4);
        let record = record(&backend);

        let mut writer = backend.open_writer(&record).await.unwrap();
        writer.write(Bytes::from_static(b"0123456789")).await.unwrap();
        assert_eq!(collection.chunk_count(&record.locator).await, 2);
        writer.abort().await.unwrap();

        assert!(collection.is_empty().await);
    }

    #[tokio::test]
    async fn ranges_use_chunk_arithmetic() {
        let backend = BlobBackend::new(MemoryChunkCollection::new()).with_chunk_size(4);
        let record = record(&backend);
        let data = b"abcdefghijklmnopq";
        store(&backend, &record, data).await;

        assert_eq!(collect(backend.open_reader(&record, None).await.unwrap()).await, data);

        for (start, end) in [(0, 0), (3, 4), (4, 7), (5, 14), (15, 16), (2, 40)] {
            let range = ByteRange::new(start, end).unwrap();
            let bytes = collect(backend.open_reader(&record, Some(range)).await.unwrap()).await;
            let end = (end as usize).min(data.len() - 1);
            assert_eq!(bytes, &data[start as usize..=end], "range {start}-{end}");
        }
    }

    #[tokio::test]
    async fn empty_objects() {
        let backend = BlobBackend::new(MemoryChunkCollection::new());
        let record = record(&backend);
        store(&backend, &record, b"").await;

        assert!(collect(backend.open_reader(&record, None).await.unwrap()).await.is_empty());
        backend.remove(&record).await.unwrap();
    }

    #[tokio::test]
    async fn remove_is_tolerant() {
        let collection = Arc::new(MemoryChunkCollection::new());
        let backend = BlobBackend::from_shared(collection.clone()).with_chunk_size(4);
        let record = record(&backend);
        store(&backend, &record, b"0123456789").await;

        backend.remove(&record).await.unwrap();
        backend.remove(&record).await.unwrap();
        assert!(collection.is_empty().await);
    }
}
