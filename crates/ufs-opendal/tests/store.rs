//! Upload lifecycle against OpenDAL's in-memory service.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;
use tokio::sync::Notify;
use ufs_core::prelude::*;
use ufs_core::store::copy_file;
use ufs_core::stream::ByteStream;
use ufs_opendal::prelude::*;

fn backend(name: &str) -> OpendalBackend {
    OpendalBackend::from_config(&ObjectStoreConfig::Memory {
        prefix: Some(name.to_owned()),
    })
    .unwrap()
    .with_ack_timeout(Duration::from_secs(5))
}

fn store(name: &str) -> OpendalStore {
    OpendalStore::new(name, backend(name))
}

/// Reads the first byte, pauses, then fetches the rest with a second
/// ranged request the way chunked downloads do.
struct PausingBackend {
    inner: OpendalBackend,
    paused: Arc<Notify>,
    resume: Arc<Notify>,
}

#[async_trait]
impl Backend for PausingBackend {
    fn kind(&self) -> &'static str {
        self.inner.kind()
    }

    fn locate(&self, record: &FileRecord) -> String {
        self.inner.locate(record)
    }

    fn supports_range(&self) -> bool {
        true
    }

    async fn open_writer(&self, record: &FileRecord) -> Result<Box<dyn BackendWriter>> {
        self.inner.open_writer(record).await
    }

    async fn open_reader(
        &self,
        record: &FileRecord,
        _range: Option<ByteRange>,
    ) -> Result<ByteStream> {
        let mut head = self
            .inner
            .open_reader(record, Some(ByteRange::new(0, 0)?))
            .await?;
        let rest = ByteRange::new(1, record.size - 1)?;

        let inner = self.inner.clone();
        let record = record.clone();
        let paused = Arc::clone(&self.paused);
        let resume = Arc::clone(&self.resume);

        let stream = async_stream::stream! {
            while let Some(chunk) = head.next().await {
                yield chunk;
            }

            paused.notify_one();
            resume.notified().await;

            match inner.open_reader(&record, Some(rest)).await {
                Ok(mut tail) => {
                    while let Some(chunk) = tail.next().await {
                        yield chunk;
                    }
                }
                Err(err) => yield Err(err),
            }
        };

        Ok(stream.boxed())
    }

    async fn remove(&self, record: &FileRecord) -> Result<()> {
        self.inner.remove(record).await
    }
}

async fn upload(
    store: &OpendalStore,
    caller: &CallerContext,
    name: &str,
    chunks: &[&[u8]],
) -> FileRecord {
    let size = chunks.iter().map(|c| c.len() as u64).sum();
    let record = store
        .create(caller, NewFile::new(name, "application/octet-stream", size))
        .await
        .unwrap();

    let mut writer = store.get_write_stream(caller, &record.id).await.unwrap();
    for chunk in chunks {
        writer.write(chunk.to_vec()).await.unwrap();
    }
    writer.finalize().await.unwrap()
}

#[tokio::test]
async fn upload_is_acknowledged_before_completion() {
    let store = store("attachments");
    let caller = CallerContext::user("u1");

    let chunks: [&[u8]; 3] = [b"alpha ", b"beta ", b"gamma"];
    let record = upload(&store, &caller, "report.bin", &chunks).await;
    assert!(record.complete);
    assert_eq!(record.size, 16);
    assert_eq!(record.locator, format!("attachments/{}", record.id));

    let stored = store.backend().operator().read(&record.locator).await.unwrap();
    assert_eq!(stored.to_vec(), b"alpha beta gamma");

    let bytes = store
        .get_read_stream(&caller, &record.id, None)
        .await
        .unwrap()
        .read_to_end()
        .await
        .unwrap();
    assert_eq!(&bytes[..], b"alpha beta gamma");
}

#[tokio::test]
async fn ranged_reads() {
    let store = store("attachments");
    let caller = CallerContext::user("u1");
    let record = upload(&store, &caller, "digits.bin", &[&b"0123456789"[..]]).await;

    let part = store
        .get_read_stream(&caller, &record.id, Some(ByteRange::new(3, 6).unwrap()))
        .await
        .unwrap();
    assert_eq!(part.content_length(), 4);
    assert_eq!(&part.read_to_end().await.unwrap()[..], b"3456");

    let tail = store
        .get_read_stream(&caller, &record.id, Some(ByteRange::new(8, 99).unwrap()))
        .await
        .unwrap()
        .read_to_end()
        .await
        .unwrap();
    assert_eq!(&tail[..], b"89");
}

#[tokio::test]
async fn abort_leaves_no_object() {
    let store = store("attachments");
    let caller = CallerContext::user("u1");
    let record = store
        .create(&caller, NewFile::new("a.bin", "application/octet-stream", 4))
        .await
        .unwrap();

    let mut writer = store.get_write_stream(&caller, &record.id).await.unwrap();
    writer.write(&b"data"[..]).await.unwrap();
    writer.abort().await.unwrap();

    assert!(store.find(&record.id).await.unwrap().is_none());
    assert!(!store.backend().operator().exists(&record.locator).await.unwrap());
}

#[tokio::test]
async fn delete_tolerates_missing_object() {
    let store = store("attachments");
    let caller = CallerContext::user("u1");
    let record = upload(&store, &caller, "a.bin", &[&b"data"[..]]).await;

    store.backend().operator().delete(&record.locator).await.unwrap();
    store.delete(&caller, &record.id).await.unwrap();
    store.delete(&caller, &record.id).await.unwrap();
    assert!(store.find(&record.id).await.unwrap().is_none());
}

#[tokio::test]
async fn redirect_falls_back_to_streaming() {
    let store = store("attachments");
    let caller = CallerContext::user("u1");
    let record = upload(&store, &caller, "a.bin", &[&b"data"[..]]).await;

    let url = store.get_redirect_url(&caller, &record.id, true).await.unwrap();
    assert_eq!(url, None);
}

#[tokio::test]
async fn copy_between_prefixes() {
    let config = UfsConfig::new();
    let registry = RegistryBuilder::new(config)
        .register_store(store("drafts"))
        .unwrap()
        .register_store(store("published"))
        .unwrap()
        .build();
    let caller = CallerContext::user("u1");

    let drafts = registry.store("drafts").unwrap();
    let record = drafts
        .create(&caller, NewFile::new("post.txt", "text/plain", 5))
        .await
        .unwrap();
    let mut writer = drafts.get_write_stream(&caller, &record.id).await.unwrap();
    writer.write(&b"# hi\n"[..]).await.unwrap();
    let record = writer.finalize().await.unwrap();

    let copy = registry
        .copy(&caller, "drafts", &record.id, "published")
        .await
        .unwrap();
    assert!(copy.locator.starts_with("published/"));
    assert_eq!(copy.etag, record.etag);
}

#[tokio::test]
async fn copy_fails_when_source_is_deleted() {
    let paused = Arc::new(Notify::new());
    let resume = Arc::new(Notify::new());
    let source = UploadStore::new("drafts", PausingBackend {
        inner: backend("drafts"),
        paused: Arc::clone(&paused),
        resume: Arc::clone(&resume),
    });
    let destination = store("published");
    let caller = CallerContext::user("u1");

    let record = source
        .create(&caller, NewFile::new("post.txt", "text/plain", 11))
        .await
        .unwrap();
    let mut writer = source.get_write_stream(&caller, &record.id).await.unwrap();
    writer.write(&b"hello world"[..]).await.unwrap();
    let record = writer.finalize().await.unwrap();

    let copy = copy_file(&caller, &source, &record.id, &destination);
    let delete = async {
        paused.notified().await;
        source.delete(&caller, &record.id).await.unwrap();
        resume.notify_one();
    };
    let (copied, ()) = tokio::join!(copy, delete);

    let err = copied.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
    assert_eq!(err.operation(), Some("copy"));
    assert!(destination.list().await.unwrap().is_empty());
    assert!(!source.backend().inner.operator().exists(&record.locator).await.unwrap());
}
