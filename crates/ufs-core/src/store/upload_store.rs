//! Generic upload lifecycle over a [`Backend`].

use std::sync::Arc;

use async_trait::async_trait;
use url::Url;

use super::Store;
use crate::backend::Backend;
use crate::catalog::{Catalog, MemoryCatalog};
use crate::filter::Filter;
use crate::permissions::{CallerContext, Operation, StorePermissions};
use crate::record::{ByteRange, FileId, FileRecord, NewFile};
use crate::stream::{ReadStream, WriteStream};
use crate::{Error, Result, TRACING_TARGET_STORE};

/// A named store combining a backend with a catalog, filter and
/// permissions.
///
/// Owns the lifecycle every adapter shares: validation before create,
/// permission checks, the single-writer claim, visibility of completed
/// files only, and removal of object plus record on delete.
pub struct UploadStore<B: Backend> {
    name: String,
    backend: Arc<B>,
    catalog: Arc<dyn Catalog>,
    filter: Filter,
    permissions: StorePermissions,
}

impl<B: Backend> UploadStore<B> {
    /// Creates a store with an in-memory catalog, no filter rules and
    /// permissive defaults.
    pub fn new(name: impl Into<String>, backend: B) -> Self {
        Self {
            name: name.into(),
            backend: Arc::new(backend),
            catalog: Arc::new(MemoryCatalog::new()),
            filter: Filter::default(),
            permissions: StorePermissions::default(),
        }
    }

    /// Sets the filter.
    #[must_use]
    pub fn with_filter(mut self, filter: Filter) -> Self {
        self.filter = filter;
        self
    }

    /// Sets the permissions.
    #[must_use]
    pub fn with_permissions(mut self, permissions: StorePermissions) -> Self {
        self.permissions = permissions;
        self
    }

    /// Sets the catalog records are persisted in.
    #[must_use]
    pub fn with_catalog(mut self, catalog: impl Catalog) -> Self {
        self.catalog = Arc::new(catalog);
        self
    }

    /// Returns the backend.
    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Returns the catalog.
    pub fn catalog(&self) -> &Arc<dyn Catalog> {
        &self.catalog
    }

    async fn insert_record(
        &self,
        caller: &CallerContext,
        file: NewFile,
        source: Option<&FileRecord>,
    ) -> Result<FileRecord> {
        if let Err(rejection) = self.filter.validate(&file) {
            tracing::debug!(
                target: TRACING_TARGET_STORE,
                store = %self.name,
                name = %file.name,
                content_type = %file.content_type,
                size = file.size,
                reason = %rejection,
                "File rejected by filter"
            );
            return Err(Error::validation()
                .with_message(rejection.to_string())
                .with_source(rejection)
                .with_operation("create")
                .with_store(&self.name));
        }

        self.permissions
            .ensure(Operation::Insert, caller, None)
            .await
            .map_err(|e| e.with_store(&self.name))?;

        let id = file.id.clone().unwrap_or_else(FileId::generate);
        let mut record = FileRecord::pending(id, &file, &self.name, caller.user_id.clone());
        if let Some(source) = source {
            record.original_id = Some(source.id.clone());
            record.original_store = Some(source.store.clone());
        }
        record.locator = self.backend.locate(&record);

        self.catalog
            .insert(record.clone())
            .await
            .map_err(|e| e.with_context("create", &self.name, &record.id))?;

        tracing::info!(
            target: TRACING_TARGET_STORE,
            store = %self.name,
            file_id = %record.id,
            name = %record.name,
            size = record.size,
            "File created"
        );

        Ok(record)
    }

    async fn completed(&self, id: &FileId, operation: &'static str) -> Result<FileRecord> {
        let record = self
            .catalog
            .get(id)
            .await
            .map_err(|e| e.with_context(operation, &self.name, id))?;

        match record {
            Some(record) if record.complete => Ok(record),
            Some(_) => Err(Error::not_found()
                .with_message("file is not completed")
                .with_context(operation, &self.name, id)),
            None => Err(Error::not_found()
                .with_message("file not found")
                .with_context(operation, &self.name, id)),
        }
    }

    async fn remove_record(&self, record: &FileRecord, operation: &'static str) -> Result<()> {
        self.backend
            .remove(record)
            .await
            .map_err(|e| e.with_context(operation, &self.name, &record.id))?;

        self.catalog
            .remove(&record.id)
            .await
            .map_err(|e| e.with_context(operation, &self.name, &record.id))?;

        tracing::info!(
            target: TRACING_TARGET_STORE,
            store = %self.name,
            file_id = %record.id,
            "File deleted"
        );

        Ok(())
    }

    async fn release_claim(&self, id: &FileId) {
        let released = self
            .catalog
            .update(id, &mut |record| {
                record.uploading = false;
                Ok(())
            })
            .await;

        if let Err(err) = released {
            tracing::warn!(
                target: TRACING_TARGET_STORE,
                store = %self.name,
                file_id = %id,
                error = %err,
                "Failed to release writer claim"
            );
        }
    }
}

#[async_trait]
impl<B: Backend> Store for UploadStore<B> {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> &'static str {
        self.backend.kind()
    }

    fn filter(&self) -> &Filter {
        &self.filter
    }

    fn permissions(&self) -> &StorePermissions {
        &self.permissions
    }

    fn supports_range(&self) -> bool {
        self.backend.supports_range()
    }

    async fn create(&self, caller: &CallerContext, file: NewFile) -> Result<FileRecord> {
        self.insert_record(caller, file, None).await
    }

    async fn create_copy(&self, caller: &CallerContext, source: &FileRecord) -> Result<FileRecord> {
        self.insert_record(caller, source.to_new_file(), Some(source))
            .await
    }

    async fn get_write_stream(&self, caller: &CallerContext, id: &FileId) -> Result<WriteStream> {
        let record = self
            .find(id)
            .await?
            .ok_or_else(|| {
                Error::not_found()
                    .with_message("file not found")
                    .with_context("write", &self.name, id)
            })?;

        self.permissions
            .ensure(Operation::Write, caller, Some(&record))
            .await
            .map_err(|e| e.with_context("write", &self.name, id))?;

        let claimed = self
            .catalog
            .update(id, &mut |record| {
                if record.complete {
                    return Err(Error::conflict().with_message("file is already completed"));
                }
                if record.uploading {
                    return Err(Error::conflict().with_message("file already has an active writer"));
                }
                record.uploading = true;
                Ok(())
            })
            .await
            .map_err(|e| e.with_context("write", &self.name, id))?
            .ok_or_else(|| {
                Error::not_found()
                    .with_message("file not found")
                    .with_context("write", &self.name, id)
            })?;

        let writer = match self.backend.open_writer(&claimed).await {
            Ok(writer) => writer,
            Err(err) => {
                self.release_claim(id).await;
                return Err(err.with_context("write", &self.name, id));
            }
        };

        tracing::debug!(
            target: TRACING_TARGET_STORE,
            store = %self.name,
            file_id = %id,
            "Write stream opened"
        );

        let backend: Arc<dyn Backend> = self.backend.clone();
        Ok(WriteStream::new(
            claimed,
            writer,
            backend,
            Arc::clone(&self.catalog),
            self.filter.max_size(),
        ))
    }

    async fn get_read_stream(
        &self,
        caller: &CallerContext,
        id: &FileId,
        range: Option<ByteRange>,
    ) -> Result<ReadStream> {
        let record = self.completed(id, "read").await?;

        self.permissions
            .ensure(Operation::Read, caller, Some(&record))
            .await
            .map_err(|e| e.with_context("read", &self.name, id))?;

        let range = match range {
            Some(_) if !self.backend.supports_range() => {
                return Err(Error::range_not_supported()
                    .with_message(format!("{} backend cannot serve byte ranges", self.backend.kind()))
                    .with_context("read", &self.name, id));
            }
            Some(range) => Some(
                range
                    .clamp(record.size)
                    .map_err(|e| e.with_context("read", &self.name, id))?,
            ),
            None => None,
        };

        let inner = self
            .backend
            .open_reader(&record, range)
            .await
            .map_err(|e| e.with_context("read", &self.name, id))?;

        tracing::debug!(
            target: TRACING_TARGET_STORE,
            store = %self.name,
            file_id = %id,
            range = ?range,
            "Read stream opened"
        );

        Ok(ReadStream::new(record, range, inner))
    }

    async fn delete(&self, caller: &CallerContext, id: &FileId) -> Result<()> {
        let Some(record) = self.find(id).await? else {
            tracing::debug!(
                target: TRACING_TARGET_STORE,
                store = %self.name,
                file_id = %id,
                "Delete of absent file"
            );
            return Ok(());
        };

        self.permissions
            .ensure(Operation::Delete, caller, Some(&record))
            .await
            .map_err(|e| e.with_context("delete", &self.name, id))?;

        self.remove_record(&record, "delete").await
    }

    async fn get_redirect_url(
        &self,
        caller: &CallerContext,
        id: &FileId,
        force_download: bool,
    ) -> Result<Option<Url>> {
        let record = self.completed(id, "redirect").await?;

        self.permissions
            .ensure(Operation::Read, caller, Some(&record))
            .await
            .map_err(|e| e.with_context("redirect", &self.name, id))?;

        self.backend
            .redirect_url(&record, force_download)
            .await
            .map_err(|e| e.with_context("redirect", &self.name, id))
    }

    async fn get_file(&self, id: &FileId) -> Result<FileRecord> {
        self.completed(id, "get_file").await
    }

    async fn find(&self, id: &FileId) -> Result<Option<FileRecord>> {
        self.catalog
            .get(id)
            .await
            .map_err(|e| e.with_context("find", &self.name, id))
    }

    async fn list(&self) -> Result<Vec<FileRecord>> {
        self.catalog
            .list()
            .await
            .map_err(|e| e.with_operation("list").with_store(&self.name))
    }

    async fn discard(&self, id: &FileId) -> Result<()> {
        match self.find(id).await? {
            Some(record) => self.remove_record(&record, "discard").await,
            None => Ok(()),
        }
    }
}

impl<B: Backend> std::fmt::Debug for UploadStore<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UploadStore")
            .field("name", &self.name)
            .field("backend", &self.backend.kind())
            .field("filter", &self.filter)
            .field("permissions", &self.permissions)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use bytes::Bytes;

    use super::*;
    use crate::ErrorKind;
    use crate::mock::MemoryBackend;
    use crate::permissions::{deny_all, owner_only};
    use crate::stream::UploadPhase;

    const DATA: &[u8] = b"the quick brown fox jumps over the lazy dog";

    fn caller() -> CallerContext {
        CallerContext::user("alice")
    }

    fn image_store() -> UploadStore<MemoryBackend> {
        UploadStore::new("images", MemoryBackend::new()).with_filter(
            Filter::new()
                .allow_content_types(["image/png", "image/jpeg"])
                .with_max_size(2048),
        )
    }

    async fn upload(store: &impl Store, name: &str, data: &[u8]) -> FileRecord {
        let file = NewFile::new(name, "application/octet-stream", data.len() as u64);
        let record = store.create(&caller(), file).await.unwrap();
        let mut writer = store.get_write_stream(&caller(), &record.id).await.unwrap();
        writer.write(Bytes::copy_from_slice(data)).await.unwrap();
        writer.finalize().await.unwrap()
    }

    #[tokio::test]
    async fn read_before_finalize_is_not_found() {
        let store = UploadStore::new("files", MemoryBackend::new());
        let record = store
            .create(&caller(), NewFile::new("a.txt", "text/plain", 3))
            .await
            .unwrap();

        let err = store.get_read_stream(&caller(), &record.id, None).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
        assert_eq!(err.store(), Some("files"));

        let mut writer = store.get_write_stream(&caller(), &record.id).await.unwrap();
        writer.write(&b"abc"[..]).await.unwrap();
        let err = store.get_read_stream(&caller(), &record.id, None).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);

        let in_progress = store.find(&record.id).await.unwrap().unwrap();
        assert_eq!(in_progress.progress, 3);
        assert!(in_progress.uploading);

        writer.finalize().await.unwrap();
        let bytes = store
            .get_read_stream(&caller(), &record.id, None)
            .await
            .unwrap()
            .read_to_end()
            .await
            .unwrap();
        assert_eq!(&bytes[..], b"abc");
    }

    #[tokio::test]
    async fn round_trip_assigns_etag() {
        let store = UploadStore::new("files", MemoryBackend::new());
        let record = upload(&store, "fox.bin", DATA).await;

        assert!(record.complete);
        assert!(!record.uploading);
        assert_eq!(record.size, DATA.len() as u64);
        assert_eq!(record.etag.as_deref().map(str::len), Some(64));
        assert!(record.completed_at.is_some());
        assert_eq!(record.user_id.as_deref(), Some("alice"));

        let bytes = store
            .get_read_stream(&caller(), &record.id, None)
            .await
            .unwrap()
            .read_to_end()
            .await
            .unwrap();
        assert_eq!(&bytes[..], DATA);
    }

    #[tokio::test]
    async fn range_reads_are_inclusive() {
        let store = UploadStore::new("files", MemoryBackend::new());
        let record = upload(&store, "fox.bin", DATA).await;

        for (start, end) in [(0, 0), (4, 8), (10, 42), (40, 100)] {
            let range = ByteRange::new(start, end).unwrap();
            let stream = store
                .get_read_stream(&caller(), &record.id, Some(range))
                .await
                .unwrap();
            let expected_end = (end as usize).min(DATA.len() - 1);
            assert_eq!(stream.content_length(), (expected_end - start as usize + 1) as u64);
            let bytes = stream.read_to_end().await.unwrap();
            assert_eq!(&bytes[..], &DATA[start as usize..=expected_end]);
        }

        let beyond = ByteRange::new(DATA.len() as u64, DATA.len() as u64 + 5).unwrap();
        let err = store
            .get_read_stream(&caller(), &record.id, Some(beyond))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
    }

    #[tokio::test]
    async fn deserialized_ranges_are_validated() {
        let store = UploadStore::new("files", MemoryBackend::new());
        let record = upload(&store, "fox.bin", DATA).await;

        assert!(serde_json::from_str::<ByteRange>(r#"{"start":5,"end":2}"#).is_err());

        let range: ByteRange = serde_json::from_str(r#"{"start":4,"end":8}"#).unwrap();
        let bytes = store
            .get_read_stream(&caller(), &record.id, Some(range))
            .await
            .unwrap()
            .read_to_end()
            .await
            .unwrap();
        assert_eq!(&bytes[..], &DATA[4..=8]);
    }

    #[tokio::test]
    async fn range_without_backend_support() {
        let store = UploadStore::new("files", MemoryBackend::new().without_range());
        let record = upload(&store, "fox.bin", DATA).await;

        let err = store
            .get_read_stream(&caller(), &record.id, Some(ByteRange::new(0, 3).unwrap()))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::RangeNotSupported);
        assert!(store.get_read_stream(&caller(), &record.id, None).await.is_ok());
    }

    #[tokio::test]
    async fn second_writer_conflicts() {
        let store = UploadStore::new("files", MemoryBackend::new());
        let record = store
            .create(&caller(), NewFile::new("a.txt", "text/plain", 3))
            .await
            .unwrap();

        let (caller_a, caller_b) = (caller(), caller());
        let (first, second) = tokio::join!(
            store.get_write_stream(&caller_a, &record.id),
            store.get_write_stream(&caller_b, &record.id),
        );
        let (winner, loser) = match (first, second) {
            (Ok(w), Err(e)) | (Err(e), Ok(w)) => (w, e),
            _ => panic!("exactly one writer must win"),
        };
        assert_eq!(loser.kind(), ErrorKind::Conflict);

        winner.finalize().await.unwrap();
        let err = store.get_write_stream(&caller(), &record.id).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Conflict);
    }

    #[tokio::test]
    async fn delete_is_idempotent() {
        let store = UploadStore::new("files", MemoryBackend::new());
        let record = upload(&store, "fox.bin", DATA).await;
        assert!(store.backend().contains(&record.locator).await);

        store.delete(&caller(), &record.id).await.unwrap();
        store.delete(&caller(), &record.id).await.unwrap();

        assert!(!store.backend().contains(&record.locator).await);
        assert_eq!(
            store.get_file(&record.id).await.unwrap_err().kind(),
            ErrorKind::NotFound
        );
        assert!(store.find(&record.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn accepts_png_and_completes() {
        let store = image_store();
        let record = store
            .create(&caller(), NewFile::new("a.png", "image/png", 1024))
            .await
            .unwrap();
        assert!(!record.complete);
        assert_eq!(record.locator, format!("{}.png", record.id));

        let mut writer = store.get_write_stream(&caller(), &record.id).await.unwrap();
        writer.write(vec![7u8; 1024]).await.unwrap();
        let record = writer.finalize().await.unwrap();
        assert!(record.complete);
        assert!(record.etag.is_some());
    }

    #[tokio::test]
    async fn rejects_exe_without_state() {
        let store = image_store();
        let err = store
            .create(&caller(), NewFile::new("a.exe", "application/x-msdownload", 100))
            .await
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::Validation);
        assert_eq!(err.operation(), Some("create"));
        assert!(store.list().await.unwrap().is_empty());
        assert_eq!(store.backend().object_count().await, 0);
    }

    #[tokio::test]
    async fn insert_denied_is_permission_error() {
        let store = UploadStore::new("files", MemoryBackend::new())
            .with_permissions(StorePermissions::new().with_insert(deny_all()));

        let err = store
            .create(&caller(), NewFile::new("a.txt", "text/plain", 1))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Permission);
        assert!(!err.is_retryable());
        assert!(store.list().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn delete_checks_ownership() {
        let store = UploadStore::new("files", MemoryBackend::new())
            .with_permissions(StorePermissions::new().with_delete(owner_only()));
        let record = upload(&store, "fox.bin", DATA).await;

        let err = store
            .delete(&CallerContext::user("mallory"), &record.id)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Permission);
        assert!(store.get_file(&record.id).await.is_ok());

        store.delete(&caller(), &record.id).await.unwrap();
    }

    #[tokio::test]
    async fn exceeding_max_size_rolls_back() {
        let store = UploadStore::new("files", MemoryBackend::new())
            .with_filter(Filter::new().with_max_size(8));
        let record = store
            .create(&caller(), NewFile::new("a.bin", "application/octet-stream", 8))
            .await
            .unwrap();

        let mut writer = store.get_write_stream(&caller(), &record.id).await.unwrap();
        let completion = writer.completion();
        writer.write(&b"12345"[..]).await.unwrap();
        let err = writer.write(&b"6789"[..]).await.unwrap_err();

        assert_eq!(err.kind(), ErrorKind::Validation);
        assert_eq!(completion.phase(), UploadPhase::Aborted);
        assert!(store.find(&record.id).await.unwrap().is_none());
        assert_eq!(
            writer.write(&b"1"[..]).await.unwrap_err().kind(),
            ErrorKind::Conflict
        );
    }

    #[tokio::test]
    async fn explicit_abort_removes_record() {
        let store = UploadStore::new("files", MemoryBackend::new());
        let record = store
            .create(&caller(), NewFile::new("a.txt", "text/plain", 3))
            .await
            .unwrap();

        let mut writer = store.get_write_stream(&caller(), &record.id).await.unwrap();
        writer.write(&b"abc"[..]).await.unwrap();
        writer.abort().await.unwrap();

        assert!(store.find(&record.id).await.unwrap().is_none());
        assert_eq!(store.backend().object_count().await, 0);
    }

    #[tokio::test]
    async fn dropped_writer_is_aborted() {
        let store = UploadStore::new("files", MemoryBackend::new());
        let record = store
            .create(&caller(), NewFile::new("a.txt", "text/plain", 3))
            .await
            .unwrap();

        let mut writer = store.get_write_stream(&caller(), &record.id).await.unwrap();
        writer.write(&b"ab"[..]).await.unwrap();
        let completion = writer.completion();
        drop(writer);

        assert!(!completion.committed().await);
        assert!(store.find(&record.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn completion_reports_commit() {
        let store = UploadStore::new("files", MemoryBackend::new());
        let record = store
            .create(&caller(), NewFile::new("a.txt", "text/plain", 3))
            .await
            .unwrap();

        let mut writer = store.get_write_stream(&caller(), &record.id).await.unwrap();
        let mut completion = writer.completion();
        assert_eq!(completion.phase(), UploadPhase::Receiving);
        writer.write(&b"abc"[..]).await.unwrap();

        let waiter = tokio::spawn(async move {
            let consumed = completion.consumed().await;
            (consumed, completion.committed().await)
        });
        writer.finalize().await.unwrap();

        let (consumed, committed) = waiter.await.unwrap();
        assert_ne!(consumed, UploadPhase::Receiving);
        assert!(committed);
    }

    #[tokio::test]
    async fn failed_commit_rolls_back() {
        let store = UploadStore::new("files", MemoryBackend::new().failing_commit());
        let record = store
            .create(&caller(), NewFile::new("a.txt", "text/plain", 3))
            .await
            .unwrap();

        let mut writer = store.get_write_stream(&caller(), &record.id).await.unwrap();
        writer.write(&b"abc"[..]).await.unwrap();
        let err = writer.finalize().await.unwrap_err();

        assert_eq!(err.kind(), ErrorKind::Backend);
        assert!(err.is_retryable());
        assert_eq!(err.operation(), Some("finalize"));
        assert!(store.find(&record.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn delete_during_upload_fails_finalize() {
        let store = UploadStore::new("files", MemoryBackend::new());
        let record = store
            .create(&caller(), NewFile::new("a.txt", "text/plain", 3))
            .await
            .unwrap();

        let mut writer = store.get_write_stream(&caller(), &record.id).await.unwrap();
        writer.write(&b"abc"[..]).await.unwrap();
        store.delete(&caller(), &record.id).await.unwrap();

        let err = writer.finalize().await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
        assert_eq!(store.backend().object_count().await, 0);
    }

    #[tokio::test]
    async fn redirect_urls() {
        let store = UploadStore::new("files", MemoryBackend::new());
        let record = upload(&store, "fox.bin", DATA).await;
        assert_eq!(
            store.get_redirect_url(&caller(), &record.id, false).await.unwrap(),
            None
        );

        let base = Url::parse("https://cdn.example.com/files/").unwrap();
        let store = UploadStore::new("files", MemoryBackend::new().with_redirect_base(base));
        let record = upload(&store, "fox.bin", DATA).await;
        let url = store
            .get_redirect_url(&caller(), &record.id, true)
            .await
            .unwrap()
            .unwrap();
        assert!(url.path().ends_with(&record.locator));
        assert_eq!(url.query(), Some("disposition=attachment"));

        let err = store
            .get_redirect_url(&caller(), &FileId::generate(), false)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[tokio::test]
    async fn uploads_run_on_spawned_tasks() {
        let store = Arc::new(UploadStore::new("files", MemoryBackend::new()));
        let file = NewFile::new("fox.bin", "application/octet-stream", DATA.len() as u64);
        let record = store.create(&caller(), file).await.unwrap();

        let upload = tokio::spawn({
            let store = Arc::clone(&store);
            let id = record.id.clone();
            async move {
                let mut writer = store.get_write_stream(&caller(), &id).await?;
                writer.write(Bytes::from_static(DATA)).await?;
                writer.finalize().await
            }
        });

        let completed = upload.await.unwrap().unwrap();
        assert!(completed.complete);
        assert_eq!(completed.size, DATA.len() as u64);
    }

    #[tokio::test]
    async fn caller_chosen_id_must_be_unique() {
        let store = UploadStore::new("files", MemoryBackend::new());
        let id = FileId::new("fixed-id").unwrap();
        let file = NewFile::new("a.txt", "text/plain", 1).with_id(id.clone());

        let record = store.create(&caller(), file.clone()).await.unwrap();
        assert_eq!(record.id, id);
        let err = store.create(&caller(), file).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Conflict);
    }
}
