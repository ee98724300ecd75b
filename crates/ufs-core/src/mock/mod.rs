//! In-memory backend for tests.
//!
//! [`MemoryBackend`] keeps committed objects in a map and can be configured
//! to refuse ranges, fail commits, produce redirect URLs, or pause readers
//! after their first chunk so races can be reproduced deterministically.
//! With live reads a reader notices its object being removed and fails,
//! like backends that fetch chunks lazily.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use futures::StreamExt;
use tokio::sync::{Mutex, Notify};
use url::Url;

use crate::backend::{Backend, BackendWriter};
use crate::record::{ByteRange, FileRecord};
use crate::stream::ByteStream;
use crate::{Error, Result};

const DEFAULT_CHUNK_SIZE: usize = 4;

/// Pauses readers after their first chunk until released.
#[derive(Debug, Clone, Default)]
pub struct ReadGate {
    started: Arc<Notify>,
    release: Arc<Notify>,
}

impl ReadGate {
    /// Creates a closed gate.
    pub fn new() -> Self {
        Self::default()
    }

    /// Waits until a reader yielded its first chunk and is paused.
    pub async fn started(&self) {
        self.started.notified().await;
    }

    /// Lets the paused reader continue.
    pub fn release(&self) {
        self.release.notify_one();
    }
}

type Objects = Arc<Mutex<HashMap<String, Bytes>>>;

/// Backend storing objects in memory.
#[derive(Debug, Clone)]
pub struct MemoryBackend {
    objects: Objects,
    chunk_size: usize,
    supports_range: bool,
    fail_commit: bool,
    redirect_base: Option<Url>,
    gate: Option<ReadGate>,
    live_reads: bool,
}

impl Default for MemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryBackend {
    /// Creates an empty backend with range support.
    pub fn new() -> Self {
        Self {
            objects: Arc::default(),
            chunk_size: DEFAULT_CHUNK_SIZE,
            supports_range: true,
            fail_commit: false,
            redirect_base: None,
            gate: None,
            live_reads: false,
        }
    }

    /// Disables range reads.
    #[must_use]
    pub fn without_range(mut self) -> Self {
        self.supports_range = false;
        self
    }

    /// Makes every commit fail.
    #[must_use]
    pub fn failing_commit(mut self) -> Self {
        self.fail_commit = true;
        self
    }

    /// Sets the size of the chunks readers yield.
    #[must_use]
    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size.max(1);
        self
    }

    /// Produces redirect URLs under `base`.
    #[must_use]
    pub fn with_redirect_base(mut self, base: Url) -> Self {
        self.redirect_base = Some(base);
        self
    }

    /// Pauses readers on `gate`.
    #[must_use]
    pub fn with_read_gate(mut self, gate: ReadGate) -> Self {
        self.gate = Some(gate);
        self
    }

    /// Makes readers fail with a backend error once their object is
    /// removed.
    #[must_use]
    pub fn with_live_reads(mut self) -> Self {
        self.live_reads = true;
        self
    }

    /// Returns whether an object exists at `locator`.
    pub async fn contains(&self, locator: &str) -> bool {
        self.objects.lock().await.contains_key(locator)
    }

    /// Returns the number of committed objects.
    pub async fn object_count(&self) -> usize {
        self.objects.lock().await.len()
    }
}

#[async_trait]
impl Backend for MemoryBackend {
    fn kind(&self) -> &'static str {
        "memory"
    }

    fn locate(&self, record: &FileRecord) -> String {
        record.file_name()
    }

    fn supports_range(&self) -> bool {
        self.supports_range
    }

    async fn open_writer(&self, record: &FileRecord) -> Result<Box<dyn BackendWriter>> {
        Ok(Box::new(MemoryWriter {
            objects: Arc::clone(&self.objects),
            locator: record.locator.clone(),
            buffer: BytesMut::new(),
            fail_commit: self.fail_commit,
        }))
    }

    async fn open_reader(
        &self,
        record: &FileRecord,
        range: Option<ByteRange>,
    ) -> Result<ByteStream> {
        let data = self
            .objects
            .lock()
            .await
            .get(&record.locator)
            .cloned()
            .ok_or_else(|| Error::not_found().with_message("object is missing"))?;

        let data = match range {
            Some(range) => data.slice(range.start() as usize..=range.end() as usize),
            None => data,
        };

        let chunk_size = self.chunk_size;
        let gate = self.gate.clone();
        let live = self.live_reads.then(|| (Arc::clone(&self.objects), record.locator.clone()));

        let stream = async_stream::stream! {
            let mut offset = 0;
            let mut gate = gate;
            while offset < data.len() {
                let end = (offset + chunk_size).min(data.len());
                yield Ok::<_, Error>(data.slice(offset..end));
                offset = end;

                if let Some(gate) = gate.take() {
                    gate.started.notify_one();
                    gate.release.notified().await;
                }

                if let Some((objects, locator)) = &live
                    && !objects.lock().await.contains_key(locator)
                {
                    yield Err(Error::backend().with_message("object vanished during read"));
                    break;
                }
            }
        };

        Ok(stream.boxed())
    }

    async fn remove(&self, record: &FileRecord) -> Result<()> {
        self.objects.lock().await.remove(&record.locator);
        Ok(())
    }

    async fn redirect_url(&self, record: &FileRecord, force_download: bool) -> Result<Option<Url>> {
        let Some(base) = &self.redirect_base else {
            return Ok(None);
        };

        let mut url = base
            .join(&record.locator)
            .map_err(|e| Error::backend().with_source(e))?;
        let disposition = if force_download { "attachment" } else { "inline" };
        url.query_pairs_mut().append_pair("disposition", disposition);
        Ok(Some(url))
    }
}

struct MemoryWriter {
    objects: Objects,
    locator: String,
    buffer: BytesMut,
    fail_commit: bool,
}

#[async_trait]
impl BackendWriter for MemoryWriter {
    async fn write(&mut self, chunk: Bytes) -> Result<()> {
        self.buffer.extend_from_slice(&chunk);
        Ok(())
    }

    async fn commit(self: Box<Self>) -> Result<()> {
        let Self {
            objects,
            locator,
            buffer,
            fail_commit,
        } = *self;

        if fail_commit {
            return Err(Error::backend().with_message("commit refused"));
        }
        objects.lock().await.insert(locator, buffer.freeze());
        Ok(())
    }

    async fn abort(self: Box<Self>) -> Result<()> {
        Ok(())
    }
}
