//! Writable handle over an upload in progress.

use std::sync::Arc;

use bytes::Bytes;
use futures::StreamExt;
use jiff::Timestamp;
use strum::AsRefStr;
use tokio::io::AsyncRead;
use tokio::runtime::Handle;
use tokio::sync::watch;
use tokio_util::io::ReaderStream;

use super::Fingerprint;
use crate::backend::{Backend, BackendWriter};
use crate::catalog::Catalog;
use crate::record::{FileId, FileRecord};
use crate::{Error, Result, TRACING_TARGET_STREAM};

/// Buffer size used when copying from an [`AsyncRead`].
const COPY_BUFFER_SIZE: usize = 64 * 1024;

/// Lifecycle of an upload.
///
/// `Consumed` means the caller finished writing; `Committed` means the
/// backend acknowledged the object. Only the latter makes the file
/// readable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, AsRefStr)]
#[strum(serialize_all = "snake_case")]
pub enum UploadPhase {
    /// Bytes are still arriving.
    Receiving,
    /// All bytes were handed to the backend; commit is pending.
    Consumed,
    /// The backend acknowledged the object and the record is complete.
    Committed,
    /// The upload was rolled back.
    Aborted,
}

impl UploadPhase {
    /// Returns whether no further transition can happen.
    #[inline]
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Committed | Self::Aborted)
    }
}

/// Observer of an upload's phase, obtained from [`WriteStream::completion`].
#[derive(Debug, Clone)]
pub struct Completion {
    rx: watch::Receiver<UploadPhase>,
}

impl Completion {
    /// Returns the current phase.
    pub fn phase(&self) -> UploadPhase {
        *self.rx.borrow()
    }

    /// Waits until the caller finished writing or the upload ended.
    pub async fn consumed(&mut self) -> UploadPhase {
        self.rx
            .wait_for(|phase| *phase != UploadPhase::Receiving)
            .await
            .map_or(UploadPhase::Aborted, |phase| *phase)
    }

    /// Waits for the upload to end. Returns `true` only if the backend
    /// committed the object.
    pub async fn committed(mut self) -> bool {
        let committed = self
            .rx
            .wait_for(|phase| phase.is_terminal())
            .await
            .is_ok_and(|phase| *phase == UploadPhase::Committed);
        committed
    }
}

/// Byte sink for one upload.
///
/// Dropping the stream without calling [`finalize`] or [`abort`] rolls the
/// upload back on the current runtime.
///
/// [`finalize`]: WriteStream::finalize
/// [`abort`]: WriteStream::abort
pub struct WriteStream {
    record: FileRecord,
    writer: Option<Box<dyn BackendWriter>>,
    backend: Arc<dyn Backend>,
    catalog: Arc<dyn Catalog>,
    fingerprint: Fingerprint,
    max_size: Option<u64>,
    phase: watch::Sender<UploadPhase>,
}

impl WriteStream {
    pub(crate) fn new(
        record: FileRecord,
        writer: Box<dyn BackendWriter>,
        backend: Arc<dyn Backend>,
        catalog: Arc<dyn Catalog>,
        max_size: Option<u64>,
    ) -> Self {
        let (phase, _) = watch::channel(UploadPhase::Receiving);
        Self {
            record,
            writer: Some(writer),
            backend,
            catalog,
            fingerprint: Fingerprint::new(),
            max_size,
            phase,
        }
    }

    /// Returns the record as it was when the stream was opened.
    pub fn record(&self) -> &FileRecord {
        &self.record
    }

    /// Returns the id of the file being written.
    pub fn id(&self) -> &FileId {
        &self.record.id
    }

    /// Number of bytes accepted so far.
    #[inline]
    pub fn written(&self) -> u64 {
        self.fingerprint.length()
    }

    /// Returns a handle observing this upload's phase.
    pub fn completion(&self) -> Completion {
        Completion {
            rx: self.phase.subscribe(),
        }
    }

    /// Appends a chunk.
    ///
    /// Exceeding the store's maximum size, a backend failure or the record
    /// disappearing rolls the upload back before the error is returned.
    pub async fn write(&mut self, chunk: impl Into<Bytes>) -> Result<()> {
        let chunk = chunk.into();

        if self.writer.is_none() {
            return Err(self.closed("write"));
        }

        if let Some(max) = self.max_size
            && self.written() + chunk.len() as u64 > max
        {
            self.rollback_quietly().await;
            return Err(self.error(
                Error::validation().with_message(format!("upload exceeds the maximum of {max} bytes")),
                "write",
            ));
        }

        let Some(writer) = self.writer.as_mut() else {
            return Err(self.closed("write"));
        };

        if chunk.is_empty() {
            return Ok(());
        }

        if let Err(err) = writer.write(chunk.clone()).await {
            self.rollback_quietly().await;
            return Err(self.error(err, "write"));
        }

        self.fingerprint.update(&chunk);
        let progress = self.fingerprint.length();

        let updated = self
            .catalog
            .update(&self.record.id, &mut |record| {
                record.progress = progress;
                Ok(())
            })
            .await;

        match updated {
            Ok(Some(_)) => Ok(()),
            Ok(None) => {
                self.rollback_quietly().await;
                Err(self.error(
                    Error::not_found().with_message("file was deleted during upload"),
                    "write",
                ))
            }
            Err(err) => {
                self.rollback_quietly().await;
                Err(self.error(err, "write"))
            }
        }
    }

    /// Writes everything `reader` yields. Returns the number of bytes copied.
    pub async fn copy_from<R>(&mut self, reader: R) -> Result<u64>
    where
        R: AsyncRead + Send + Unpin,
    {
        let start = self.written();
        let mut chunks = ReaderStream::with_capacity(reader, COPY_BUFFER_SIZE);

        while let Some(chunk) = chunks.next().await {
            match chunk {
                Ok(chunk) => self.write(chunk).await?,
                Err(err) => {
                    self.rollback_quietly().await;
                    return Err(self.error(
                        Error::backend()
                            .with_message("failed to read upload source")
                            .with_source(err),
                        "write",
                    ));
                }
            }
        }

        Ok(self.written() - start)
    }

    /// Commits the upload and marks the record complete.
    ///
    /// Returns once the backend acknowledged the object. If the record was
    /// deleted while uploading, the committed object is removed again and
    /// a not found error is returned.
    pub async fn finalize(mut self) -> Result<FileRecord> {
        let Some(writer) = self.writer.take() else {
            return Err(self.closed("finalize"));
        };
        self.phase.send_replace(UploadPhase::Consumed);

        tracing::debug!(
            target: TRACING_TARGET_STREAM,
            store = %self.record.store,
            file_id = %self.record.id,
            size = self.written(),
            "Committing upload"
        );

        if let Err(err) = writer.commit().await {
            self.forget_record().await;
            return Err(self.error(err, "finalize"));
        }

        let fingerprint = std::mem::take(&mut self.fingerprint);
        let size = fingerprint.length();
        let etag = fingerprint.finalize_hex();

        let completed = self
            .catalog
            .update(&self.record.id, &mut |record| {
                record.size = size;
                record.progress = size;
                record.etag = Some(etag.clone());
                record.complete = true;
                record.uploading = false;
                record.completed_at = Some(Timestamp::now());
                Ok(())
            })
            .await;

        match completed {
            Ok(Some(record)) => {
                self.phase.send_replace(UploadPhase::Committed);
                tracing::info!(
                    target: TRACING_TARGET_STREAM,
                    store = %record.store,
                    file_id = %record.id,
                    size = record.size,
                    etag = record.etag.as_deref().unwrap_or_default(),
                    "Upload completed"
                );
                Ok(record)
            }
            Ok(None) => {
                self.remove_object().await;
                self.phase.send_replace(UploadPhase::Aborted);
                Err(self.error(
                    Error::not_found().with_message("file was deleted during upload"),
                    "finalize",
                ))
            }
            Err(err) => {
                self.remove_object().await;
                self.forget_record().await;
                Err(self.error(err, "finalize"))
            }
        }
    }

    /// Discards the upload and removes its record.
    pub async fn abort(mut self) -> Result<()> {
        let writer = self.writer.take();
        rollback(writer, self.catalog.as_ref(), &self.record, &self.phase).await
    }

    async fn rollback_quietly(&mut self) {
        let writer = self.writer.take();
        // Failures are already logged; the triggering error is what callers see.
        let _ = rollback(writer, self.catalog.as_ref(), &self.record, &self.phase).await;
    }

    async fn remove_object(&self) {
        if let Err(err) = self.backend.remove(&self.record).await {
            tracing::warn!(
                target: TRACING_TARGET_STREAM,
                store = %self.record.store,
                file_id = %self.record.id,
                error = %err,
                "Failed to remove orphaned object"
            );
        }
    }

    async fn forget_record(&self) {
        if let Err(err) = self.catalog.remove(&self.record.id).await {
            tracing::warn!(
                target: TRACING_TARGET_STREAM,
                store = %self.record.store,
                file_id = %self.record.id,
                error = %err,
                "Failed to remove record of failed upload"
            );
        }
        self.phase.send_replace(UploadPhase::Aborted);
    }

    fn closed(&self, operation: &'static str) -> Error {
        self.error(
            Error::conflict().with_message("write stream is closed"),
            operation,
        )
    }

    fn error(&self, err: Error, operation: &'static str) -> Error {
        err.with_context(operation, &self.record.store, &self.record.id)
    }
}

impl Drop for WriteStream {
    fn drop(&mut self) {
        let Some(writer) = self.writer.take() else {
            return;
        };

        tracing::warn!(
            target: TRACING_TARGET_STREAM,
            store = %self.record.store,
            file_id = %self.record.id,
            written = self.written(),
            "Write stream dropped before finalize, aborting upload"
        );

        let (replacement, _) = watch::channel(UploadPhase::Aborted);
        let phase = std::mem::replace(&mut self.phase, replacement);
        let catalog = Arc::clone(&self.catalog);
        let record = self.record.clone();

        match Handle::try_current() {
            Ok(handle) => {
                handle.spawn(async move {
                    let _ = rollback(Some(writer), catalog.as_ref(), &record, &phase).await;
                });
            }
            Err(_) => {
                tracing::error!(
                    target: TRACING_TARGET_STREAM,
                    store = %record.store,
                    file_id = %record.id,
                    "No async runtime available to abort upload"
                );
                phase.send_replace(UploadPhase::Aborted);
            }
        }
    }
}

impl std::fmt::Debug for WriteStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WriteStream")
            .field("store", &self.record.store)
            .field("file_id", &self.record.id)
            .field("written", &self.written())
            .field("max_size", &self.max_size)
            .field("phase", &*self.phase.borrow())
            .finish_non_exhaustive()
    }
}

/// Aborts the backend writer and removes the record.
async fn rollback(
    writer: Option<Box<dyn BackendWriter>>,
    catalog: &dyn Catalog,
    record: &FileRecord,
    phase: &watch::Sender<UploadPhase>,
) -> Result<()> {
    let mut first_error = None;

    if let Some(writer) = writer
        && let Err(err) = writer.abort().await
    {
        tracing::warn!(
            target: TRACING_TARGET_STREAM,
            store = %record.store,
            file_id = %record.id,
            error = %err,
            "Failed to abort backend writer"
        );
        first_error = Some(err);
    }

    if let Err(err) = catalog.remove(&record.id).await {
        tracing::warn!(
            target: TRACING_TARGET_STREAM,
            store = %record.store,
            file_id = %record.id,
            error = %err,
            "Failed to remove record of aborted upload"
        );
        first_error.get_or_insert(err);
    }

    phase.send_replace(UploadPhase::Aborted);

    tracing::debug!(
        target: TRACING_TARGET_STREAM,
        store = %record.store,
        file_id = %record.id,
        "Upload aborted"
    );

    match first_error {
        Some(err) => Err(err.with_context("abort", &record.store, &record.id)),
        None => Ok(()),
    }
}
