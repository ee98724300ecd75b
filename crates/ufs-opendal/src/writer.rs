//! Pass-through upload writer.
//!
//! Chunks are handed over a bounded channel to a task that streams them
//! into an OpenDAL writer, so a slow service applies backpressure to the
//! caller instead of buffering the whole object.

use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use opendal::Operator;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use ufs_core::{BackendWriter, Error, Result};

use crate::TRACING_TARGET_BACKEND;
use crate::error::from_opendal;

/// Number of chunks buffered between the caller and the upload task.
const CHANNEL_CAPACITY: usize = 8;

/// Service side of an upload.
#[async_trait]
pub(crate) trait ObjectSink: Send + 'static {
    async fn write(&mut self, chunk: Bytes) -> opendal::Result<()>;

    /// Completes the object. Returns once the service acknowledged it.
    async fn close(&mut self) -> opendal::Result<()>;

    /// Discards everything written, including pending multipart state.
    async fn abort(&mut self) -> opendal::Result<()>;
}

#[async_trait]
impl ObjectSink for opendal::Writer {
    async fn write(&mut self, chunk: Bytes) -> opendal::Result<()> {
        opendal::Writer::write(self, chunk).await
    }

    async fn close(&mut self) -> opendal::Result<()> {
        opendal::Writer::close(self).await.map(|_| ())
    }

    async fn abort(&mut self) -> opendal::Result<()> {
        opendal::Writer::abort(self).await
    }
}

/// How the upload task ended without a service error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum UploadEnd {
    /// The service acknowledged the object.
    Closed,
    /// The upload was cancelled and the service writer aborted.
    Aborted,
}

pub(crate) struct OpendalWriter {
    operator: Operator,
    path: String,
    tx: Option<mpsc::Sender<Bytes>>,
    task: Option<JoinHandle<opendal::Result<UploadEnd>>>,
    cancel: CancellationToken,
    ack_timeout: Duration,
}

impl OpendalWriter {
    /// Opens the service writer and spawns the upload task.
    pub(crate) async fn start(
        operator: Operator,
        path: String,
        content_type: &str,
        ack_timeout: Duration,
    ) -> Result<Self> {
        let writer = operator
            .writer_with(&path)
            .content_type(content_type)
            .await
            .map_err(from_opendal)?;

        Ok(Self::spawn(operator, path, writer, ack_timeout))
    }

    /// Spawns the upload task over an opened sink.
    pub(crate) fn spawn(
        operator: Operator,
        path: String,
        sink: impl ObjectSink,
        ack_timeout: Duration,
    ) -> Self {
        let (tx, rx) = mpsc::channel(CHANNEL_CAPACITY);
        let cancel = CancellationToken::new();
        let task = tokio::spawn(upload(sink, rx, cancel.clone()));

        Self {
            operator,
            path,
            tx: Some(tx),
            task: Some(task),
            cancel,
            ack_timeout,
        }
    }

    /// Waits for the task after it stopped accepting chunks and returns
    /// its failure.
    async fn task_error(&mut self) -> Error {
        let Some(task) = self.task.take() else {
            return Error::backend().with_message("upload task already finished");
        };

        match task.await {
            Ok(Err(err)) => from_opendal(err),
            Ok(Ok(_)) => Error::backend().with_message("upload task stopped unexpectedly"),
            Err(err) => Error::backend()
                .with_message("upload task panicked")
                .with_source(err),
        }
    }

    /// Cancels the task so it aborts the service writer, then waits for it
    /// for at most one more acknowledgement period.
    async fn cancel_task(&self, mut task: JoinHandle<opendal::Result<UploadEnd>>) {
        self.cancel.cancel();

        match tokio::time::timeout(self.ack_timeout, &mut task).await {
            Ok(Ok(Ok(_))) => {}
            Ok(Ok(Err(err))) => {
                tracing::warn!(
                    target: TRACING_TARGET_BACKEND,
                    path = %self.path,
                    error = %err,
                    "Failed to abort service writer"
                );
            }
            Ok(Err(err)) => {
                tracing::warn!(
                    target: TRACING_TARGET_BACKEND,
                    path = %self.path,
                    error = %err,
                    "Upload task panicked while aborting"
                );
            }
            Err(_) => {
                tracing::warn!(
                    target: TRACING_TARGET_BACKEND,
                    path = %self.path,
                    "Upload task did not stop after cancellation"
                );
                task.abort();
            }
        }
    }

    async fn remove_partial(&self) {
        if let Err(err) = self.operator.delete(&self.path).await {
            tracing::warn!(
                target: TRACING_TARGET_BACKEND,
                path = %self.path,
                error = %err,
                "Failed to remove partial object"
            );
        }
    }
}

#[async_trait]
impl BackendWriter for OpendalWriter {
    async fn write(&mut self, chunk: Bytes) -> Result<()> {
        let Some(tx) = &self.tx else {
            return Err(Error::conflict().with_message("upload channel is closed"));
        };

        if tx.send(chunk).await.is_err() {
            self.tx = None;
            return Err(self.task_error().await);
        }
        Ok(())
    }

    async fn commit(mut self: Box<Self>) -> Result<()> {
        // Closing the channel tells the task to complete the object.
        self.tx = None;
        let Some(mut task) = self.task.take() else {
            return Err(Error::backend().with_message("upload task already finished"));
        };

        let outcome = tokio::time::timeout(self.ack_timeout, &mut task).await;
        let error = match outcome {
            Ok(Ok(Ok(UploadEnd::Closed))) => {
                tracing::debug!(
                    target: TRACING_TARGET_BACKEND,
                    path = %self.path,
                    "Upload acknowledged"
                );
                return Ok(());
            }
            Ok(Ok(Ok(UploadEnd::Aborted))) => {
                Error::backend().with_message("upload was cancelled before commit")
            }
            Ok(Ok(Err(err))) => from_opendal(err),
            Ok(Err(err)) => Error::backend()
                .with_message("upload task panicked")
                .with_source(err),
            Err(_) => {
                self.cancel_task(task).await;
                Error::backend().with_message(format!(
                    "upload was not acknowledged within {}ms",
                    self.ack_timeout.as_millis()
                ))
            }
        };

        tracing::warn!(
            target: TRACING_TARGET_BACKEND,
            path = %self.path,
            error = %error,
            "Upload failed"
        );
        self.remove_partial().await;
        Err(error)
    }

    async fn abort(mut self: Box<Self>) -> Result<()> {
        self.cancel.cancel();
        self.tx = None;
        let Some(task) = self.task.take() else {
            return Ok(());
        };

        // The task aborts the service writer before returning.
        match task.await {
            Ok(Ok(_)) => Ok(()),
            Ok(Err(err)) => Err(from_opendal(err)),
            Err(err) => Err(Error::backend()
                .with_message("upload task panicked")
                .with_source(err)),
        }
    }
}

impl Drop for OpendalWriter {
    fn drop(&mut self) {
        if self.task.is_some() {
            self.cancel.cancel();
        }
    }
}

/// Streams chunks into `sink` until the channel closes, then completes the
/// object. Cancellation at any point aborts the sink, including while the
/// service is still acknowledging.
async fn upload<S: ObjectSink>(
    mut sink: S,
    mut rx: mpsc::Receiver<Bytes>,
    cancel: CancellationToken,
) -> opendal::Result<UploadEnd> {
    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                sink.abort().await?;
                return Ok(UploadEnd::Aborted);
            }
            chunk = rx.recv() => match chunk {
                Some(chunk) => {
                    if let Err(err) = sink.write(chunk).await {
                        if let Err(abort) = sink.abort().await {
                            tracing::warn!(
                                target: TRACING_TARGET_BACKEND,
                                error = %abort,
                                "Failed to abort service writer"
                            );
                        }
                        return Err(err);
                    }
                }
                None => break,
            },
        }
    }

    let closed = tokio::select! {
        _ = cancel.cancelled() => None,
        closed = sink.close() => Some(closed),
    };

    match closed {
        Some(closed) => closed.map(|()| UploadEnd::Closed),
        None => {
            sink.abort().await?;
            Ok(UploadEnd::Aborted)
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicBool, Ordering};

    use opendal::services;
    use ufs_core::record::{ByteRange, FileRecord, NewFile};
    use ufs_core::store::{Store, UploadStore};
    use ufs_core::stream::ByteStream;
    use ufs_core::{Backend, CallerContext, ErrorKind};

    use super::*;
    use crate::OpendalBackend;

    /// Accepts chunks but never acknowledges the object.
    struct StalledSink {
        aborted: Arc<AtomicBool>,
    }

    #[async_trait]
    impl ObjectSink for StalledSink {
        async fn write(&mut self, _chunk: Bytes) -> opendal::Result<()> {
            Ok(())
        }

        async fn close(&mut self) -> opendal::Result<()> {
            std::future::pending().await
        }

        async fn abort(&mut self) -> opendal::Result<()> {
            self.aborted.store(true, Ordering::SeqCst);
            Ok(())
        }
    }

    /// Object backend whose service stalls on acknowledgement.
    struct StalledBackend {
        inner: OpendalBackend,
        aborted: Arc<AtomicBool>,
    }

    #[async_trait]
    impl Backend for StalledBackend {
        fn kind(&self) -> &'static str {
            "stalled"
        }

        fn locate(&self, record: &FileRecord) -> String {
            self.inner.locate(record)
        }

        fn supports_range(&self) -> bool {
            self.inner.supports_range()
        }

        async fn open_writer(&self, record: &FileRecord) -> Result<Box<dyn BackendWriter>> {
            let sink = StalledSink {
                aborted: Arc::clone(&self.aborted),
            };
            Ok(Box::new(OpendalWriter::spawn(
                self.inner.operator().clone(),
                record.locator.clone(),
                sink,
                Duration::from_millis(50),
            )))
        }

        async fn open_reader(
            &self,
            record: &FileRecord,
            range: Option<ByteRange>,
        ) -> Result<ByteStream> {
            self.inner.open_reader(record, range).await
        }

        async fn remove(&self, record: &FileRecord) -> Result<()> {
            self.inner.remove(record).await
        }
    }

    fn memory_operator() -> Operator {
        Operator::new(services::Memory::default()).unwrap().finish()
    }

    #[tokio::test]
    async fn unacknowledged_upload_is_aborted() {
        let aborted = Arc::new(AtomicBool::new(false));
        let operator = memory_operator();
        let store = UploadStore::new("stalled", StalledBackend {
            inner: OpendalBackend::new(operator.clone()),
            aborted: Arc::clone(&aborted),
        });
        let caller = CallerContext::user("u1");

        let record = store
            .create(&caller, NewFile::new("slow.bin", "application/octet-stream", 5))
            .await
            .unwrap();
        let mut writer = store.get_write_stream(&caller, &record.id).await.unwrap();
        writer.write(&b"hello"[..]).await.unwrap();

        let err = writer.finalize().await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Backend);
        assert!(err.to_string().contains("not acknowledged"));

        assert!(aborted.load(Ordering::SeqCst));
        assert!(store.find(&record.id).await.unwrap().is_none());
        assert!(!operator.exists(&record.locator).await.unwrap());
    }

    #[tokio::test]
    async fn abort_reaches_the_sink() {
        let aborted = Arc::new(AtomicBool::new(false));
        let sink = StalledSink {
            aborted: Arc::clone(&aborted),
        };
        let mut writer =
            OpendalWriter::spawn(memory_operator(), "x".to_owned(), sink, Duration::from_secs(1));

        BackendWriter::write(&mut writer, Bytes::from_static(b"partial"))
            .await
            .unwrap();
        Box::new(writer).abort().await.unwrap();
        assert!(aborted.load(Ordering::SeqCst));
    }
}
