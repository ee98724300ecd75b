//! Readable handle over a stored file.

use std::pin::Pin;
use std::task::{Context, Poll};

use bytes::{Bytes, BytesMut};
use futures::stream::BoxStream;
use futures::{Stream, StreamExt, TryStreamExt};
use tokio::io::AsyncRead;
use tokio_util::io::StreamReader;

use crate::Result;
use crate::record::{ByteRange, FileRecord};

/// Stream of file chunks produced by a backend.
pub type ByteStream = BoxStream<'static, Result<Bytes>>;

/// Chunks of one completed file, optionally restricted to a byte range.
pub struct ReadStream {
    record: FileRecord,
    range: Option<ByteRange>,
    inner: ByteStream,
}

impl ReadStream {
    /// Wraps a backend stream.
    pub fn new(record: FileRecord, range: Option<ByteRange>, inner: ByteStream) -> Self {
        Self {
            record,
            range,
            inner,
        }
    }

    /// Returns the record being read.
    pub fn record(&self) -> &FileRecord {
        &self.record
    }

    /// Returns the served range, if partial.
    pub fn range(&self) -> Option<ByteRange> {
        self.range
    }

    /// Number of bytes this stream yields.
    pub fn content_length(&self) -> u64 {
        self.range.map_or(self.record.size, |r| r.length())
    }

    /// Returns the underlying chunk stream.
    pub fn into_inner(self) -> ByteStream {
        self.inner
    }

    /// Adapts the stream into an [`AsyncRead`].
    pub fn into_async_read(self) -> impl AsyncRead + Send + Unpin {
        StreamReader::new(self.inner.map_err(std::io::Error::other))
    }

    /// Collects the whole stream into memory.
    pub async fn read_to_end(mut self) -> Result<Bytes> {
        let capacity = usize::try_from(self.content_length()).unwrap_or(0);
        let mut buf = BytesMut::with_capacity(capacity);
        while let Some(chunk) = self.inner.next().await {
            buf.extend_from_slice(&chunk?);
        }
        Ok(buf.freeze())
    }
}

impl Stream for ReadStream {
    type Item = Result<Bytes>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.inner.poll_next_unpin(cx)
    }
}

impl std::fmt::Debug for ReadStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReadStream")
            .field("file_id", &self.record.id)
            .field("range", &self.range)
            .finish_non_exhaustive()
    }
}
