//! Local filesystem backend.

use std::io::{self, SeekFrom};
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use bytes::Bytes;
use futures::StreamExt;
use tokio::fs::{self, File};
use tokio::io::{AsyncReadExt, AsyncSeekExt, AsyncWriteExt, BufWriter};
use tokio_util::io::ReaderStream;
use ufs_core::record::{ByteRange, FileRecord};
use ufs_core::store::UploadStore;
use ufs_core::stream::ByteStream;
use ufs_core::{Backend, BackendWriter, Result, UfsConfig};

use crate::TRACING_TARGET_BACKEND;
use crate::config::LocalConfig;
use crate::error::from_io;

/// Read buffer size for file streams.
const READ_BUFFER_SIZE: usize = 64 * 1024;

/// A store backed by the local filesystem.
pub type LocalStore = UploadStore<LocalBackend>;

/// Stores files as `{root}/{id}.{ext}`.
#[derive(Debug, Clone)]
pub struct LocalBackend {
    root: PathBuf,
    staging: UfsConfig,
}

impl LocalBackend {
    /// Creates the backend, making sure the root and staging directories
    /// exist.
    pub async fn new(config: &LocalConfig, ufs: &UfsConfig) -> Result<Self> {
        let root = config.root().to_path_buf();
        fs::create_dir_all(&root)
            .await
            .map_err(|e| from_io(e, "failed to create storage root"))?;
        fs::create_dir_all(ufs.tmp_dir())
            .await
            .map_err(|e| from_io(e, "failed to create staging directory"))?;

        tracing::info!(
            target: TRACING_TARGET_BACKEND,
            root = %root.display(),
            tmp_dir = %ufs.tmp_dir().display(),
            "Local backend initialized"
        );

        Ok(Self {
            root,
            staging: ufs.clone(),
        })
    }

    /// Returns the storage root.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Returns the absolute path of a record's file.
    pub fn path_of(&self, record: &FileRecord) -> PathBuf {
        self.root.join(&record.locator)
    }
}

#[async_trait]
impl Backend for LocalBackend {
    fn kind(&self) -> &'static str {
        "local"
    }

    fn locate(&self, record: &FileRecord) -> String {
        record.file_name()
    }

    fn supports_range(&self) -> bool {
        true
    }

    async fn open_writer(&self, record: &FileRecord) -> Result<Box<dyn BackendWriter>> {
        let staged = self.staging.store_temp_path(&record.store, &record.id);
        if let Some(parent) = staged.parent() {
            fs::create_dir_all(parent)
                .await
                .map_err(|e| from_io(e, "failed to create staging directory"))?;
        }

        let file = File::create(&staged)
            .await
            .map_err(|e| from_io(e, "failed to create staging file"))?;

        tracing::debug!(
            target: TRACING_TARGET_BACKEND,
            file_id = %record.id,
            staged = %staged.display(),
            "Staging upload"
        );

        Ok(Box::new(LocalWriter {
            file: BufWriter::new(file),
            staged,
            target: self.path_of(record),
        }))
    }

    #[tracing::instrument(skip_all, target = TRACING_TARGET_BACKEND, fields(file_id = %record.id))]
    async fn open_reader(
        &self,
        record: &FileRecord,
        range: Option<ByteRange>,
    ) -> Result<ByteStream> {
        let path = self.path_of(record);
        let mut file = File::open(&path)
            .await
            .map_err(|e| from_io(e, "failed to open file"))?;

        let stream = match range {
            Some(range) => {
                file.seek(SeekFrom::Start(range.start()))
                    .await
                    .map_err(|e| from_io(e, "failed to seek file"))?;
                let reader = file.take(range.length());
                ReaderStream::with_capacity(reader, READ_BUFFER_SIZE)
                    .map(|chunk| chunk.map_err(|e| from_io(e, "failed to read file")))
                    .boxed()
            }
            None => ReaderStream::with_capacity(file, READ_BUFFER_SIZE)
                .map(|chunk| chunk.map_err(|e| from_io(e, "failed to read file")))
                .boxed(),
        };

        Ok(stream)
    }

    #[tracing::instrument(skip_all, target = TRACING_TARGET_BACKEND, fields(file_id = %record.id))]
    async fn remove(&self, record: &FileRecord) -> Result<()> {
        let path = self.path_of(record);
        match fs::remove_file(&path).await {
            Ok(()) => {
                tracing::debug!(
                    target: TRACING_TARGET_BACKEND,
                    path = %path.display(),
                    "File removed"
                );
                Ok(())
            }
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(from_io(err, "failed to remove file")),
        }
    }
}

/// Writes into a staging file and moves it into place on commit.
struct LocalWriter {
    file: BufWriter<File>,
    staged: PathBuf,
    target: PathBuf,
}

impl LocalWriter {
    async fn publish(staged: &Path, target: &Path) -> io::Result<()> {
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent).await?;
        }

        match fs::rename(staged, target).await {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == io::ErrorKind::CrossesDevices => {
                tracing::debug!(
                    target: TRACING_TARGET_BACKEND,
                    staged = %staged.display(),
                    target = %target.display(),
                    "Staging directory is on another device, copying"
                );
                fs::copy(staged, target).await?;
                fs::remove_file(staged).await
            }
            Err(err) => Err(err),
        }
    }
}

async fn remove_staged(staged: &Path) {
    if let Err(err) = fs::remove_file(staged).await
        && err.kind() != io::ErrorKind::NotFound
    {
        tracing::warn!(
            target: TRACING_TARGET_BACKEND,
            staged = %staged.display(),
            error = %err,
            "Failed to remove staging file"
        );
    }
}

#[async_trait]
impl BackendWriter for LocalWriter {
    async fn write(&mut self, chunk: Bytes) -> Result<()> {
        self.file
            .write_all(&chunk)
            .await
            .map_err(|e| from_io(e, "failed to write staging file"))
    }

    async fn commit(self: Box<Self>) -> Result<()> {
        let Self {
            mut file,
            staged,
            target,
        } = *self;

        let flushed = async {
            file.flush().await?;
            file.get_ref().sync_all().await
        }
        .await;
        drop(file);

        if let Err(err) = flushed {
            remove_staged(&staged).await;
            return Err(from_io(err, "failed to flush staging file"));
        }

        if let Err(err) = Self::publish(&staged, &target).await {
            remove_staged(&staged).await;
            return Err(from_io(err, "failed to move file into place"));
        }

        tracing::debug!(
            target: TRACING_TARGET_BACKEND,
            path = %target.display(),
            "File committed"
        );

        Ok(())
    }

    async fn abort(self: Box<Self>) -> Result<()> {
        let Self { file, staged, .. } = *self;
        drop(file);
        remove_staged(&staged).await;
        Ok(())
    }
}
