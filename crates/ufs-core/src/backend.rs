//! Raw I/O seam implemented by each storage adapter.

use async_trait::async_trait;
use bytes::Bytes;
use url::Url;

use crate::Result;
use crate::record::{ByteRange, FileRecord};
use crate::stream::ByteStream;

/// Storage primitives an adapter maps onto its backend.
///
/// The upload lifecycle (validation, permissions, single writer, visibility
/// of incomplete files, rollback) lives in [`UploadStore`]; a backend only
/// moves bytes. All backend-native failures must be translated into
/// [`Error`] before they leave the adapter.
///
/// [`UploadStore`]: crate::store::UploadStore
/// [`Error`]: crate::Error
#[async_trait]
pub trait Backend: Send + Sync + 'static {
    /// Short backend name used in logs (`local`, `opendal`, `blob`, ...).
    fn kind(&self) -> &'static str;

    /// Computes the backend locator of a new record.
    fn locate(&self, record: &FileRecord) -> String;

    /// Whether [`Backend::open_reader`] honors byte ranges.
    fn supports_range(&self) -> bool;

    /// Opens a sink for the bytes of `record`.
    ///
    /// Nothing written becomes visible at the locator until the writer is
    /// committed.
    async fn open_writer(&self, record: &FileRecord) -> Result<Box<dyn BackendWriter>>;

    /// Streams the committed bytes of `record`.
    ///
    /// `range` has already been clamped to the record size.
    async fn open_reader(&self, record: &FileRecord, range: Option<ByteRange>)
    -> Result<ByteStream>;

    /// Removes the committed object of `record`. An object that is already
    /// gone is not an error.
    async fn remove(&self, record: &FileRecord) -> Result<()>;

    /// Returns a short-lived URL serving `record` directly, if the backend
    /// can produce one.
    async fn redirect_url(&self, record: &FileRecord, force_download: bool) -> Result<Option<Url>> {
        let _ = (record, force_download);
        Ok(None)
    }
}

/// Sink for the bytes of one upload.
///
/// Exactly one of [`commit`] or [`abort`] is called. Both clean up any
/// partial state the writer created when they fail.
///
/// Writers are `Sync` so that upload futures holding one stay `Send` and
/// can run on spawned tasks.
///
/// [`commit`]: BackendWriter::commit
/// [`abort`]: BackendWriter::abort
#[async_trait]
pub trait BackendWriter: Send + Sync + 'static {
    /// Appends a chunk.
    async fn write(&mut self, chunk: Bytes) -> Result<()>;

    /// Makes the written bytes durable at the record locator. Returns only
    /// after the backend acknowledged the object.
    async fn commit(self: Box<Self>) -> Result<()>;

    /// Discards everything written so far.
    async fn abort(self: Box<Self>) -> Result<()>;
}
