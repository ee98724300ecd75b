//! Object storage backend implementation.

use std::time::Duration;

use async_trait::async_trait;
use futures::{StreamExt, TryStreamExt};
use opendal::{Operator, services};
use ufs_core::record::{ByteRange, FileRecord};
use ufs_core::store::UploadStore;
use ufs_core::stream::ByteStream;
use ufs_core::{Backend, BackendWriter, Error, Result};
use url::Url;

use crate::TRACING_TARGET_BACKEND;
use crate::config::ObjectStoreConfig;
use crate::error::{from_opendal, from_read_stream};
use crate::writer::OpendalWriter;

// Default values
const DEFAULT_URL_EXPIRY_SECS: u64 = 120;
const DEFAULT_ACK_TIMEOUT_SECS: u64 = 6;

/// A store backed by an OpenDAL service.
pub type OpendalStore = UploadStore<OpendalBackend>;

/// Stores files as objects under `{prefix}{id}`.
#[derive(Clone)]
pub struct OpendalBackend {
    operator: Operator,
    prefix: String,
    url_expiry: Duration,
    ack_timeout: Duration,
}

impl OpendalBackend {
    /// Wraps an existing operator.
    pub fn new(operator: Operator) -> Self {
        Self {
            operator,
            prefix: String::new(),
            url_expiry: Duration::from_secs(DEFAULT_URL_EXPIRY_SECS),
            ack_timeout: Duration::from_secs(DEFAULT_ACK_TIMEOUT_SECS),
        }
    }

    /// Creates a backend from configuration.
    pub fn from_config(config: &ObjectStoreConfig) -> Result<Self> {
        let backend = match config {
            ObjectStoreConfig::Memory { prefix } => {
                let operator = Operator::new(services::Memory::default())
                    .map(|op| op.finish())
                    .map_err(from_opendal)?;
                let backend = Self::new(operator);
                match prefix {
                    Some(prefix) => backend.with_prefix(prefix),
                    None => backend,
                }
            }
            ObjectStoreConfig::S3(s3) => {
                let backend = Self::new(Self::create_s3_operator(s3)?)
                    .with_url_expiry(s3.url_expiry())
                    .with_ack_timeout(s3.ack_timeout());
                match &s3.prefix {
                    Some(prefix) => backend.with_prefix(prefix),
                    None => backend,
                }
            }
        };

        tracing::info!(
            target: TRACING_TARGET_BACKEND,
            service = config.service_name(),
            prefix = %backend.prefix,
            "Object storage backend initialized"
        );

        Ok(backend)
    }

    /// Sets the key prefix. A trailing `/` is added to non-empty prefixes.
    #[must_use]
    pub fn with_prefix(mut self, prefix: impl AsRef<str>) -> Self {
        let prefix = prefix.as_ref().trim_matches('/');
        self.prefix = if prefix.is_empty() {
            String::new()
        } else {
            format!("{prefix}/")
        };
        self
    }

    /// Sets the lifetime of presigned URLs.
    #[must_use]
    pub fn with_url_expiry(mut self, expiry: Duration) -> Self {
        self.url_expiry = expiry;
        self
    }

    /// Sets how long finalize waits for the service to acknowledge an
    /// upload.
    #[must_use]
    pub fn with_ack_timeout(mut self, timeout: Duration) -> Self {
        self.ack_timeout = timeout;
        self
    }

    /// Returns the underlying operator.
    pub fn operator(&self) -> &Operator {
        &self.operator
    }

    #[cfg(feature = "s3")]
    fn create_s3_operator(config: &crate::S3Config) -> Result<Operator> {
        let mut builder = services::S3::default()
            .bucket(&config.bucket)
            .region(&config.region);

        if let Some(ref endpoint) = config.endpoint {
            builder = builder.endpoint(endpoint);
        }

        if let Some(ref access_key_id) = config.access_key_id {
            builder = builder.access_key_id(access_key_id);
        }

        if let Some(ref secret_access_key) = config.secret_access_key {
            builder = builder.secret_access_key(secret_access_key);
        }

        Operator::new(builder)
            .map(|op| op.finish())
            .map_err(from_opendal)
    }

    #[cfg(not(feature = "s3"))]
    fn create_s3_operator(_config: &crate::S3Config) -> Result<Operator> {
        Err(Error::backend()
            .with_retryable(false)
            .with_message("s3 support is not enabled, rebuild with the `s3` feature"))
    }

    fn content_disposition(record: &FileRecord, force_download: bool) -> String {
        let disposition = if force_download { "attachment" } else { "inline" };
        format!(
            "{disposition}; filename=\"{}\"",
            urlencoding::encode(&record.name)
        )
    }
}

#[async_trait]
impl Backend for OpendalBackend {
    fn kind(&self) -> &'static str {
        "opendal"
    }

    fn locate(&self, record: &FileRecord) -> String {
        format!("{}{}", self.prefix, record.id)
    }

    fn supports_range(&self) -> bool {
        true
    }

    async fn open_writer(&self, record: &FileRecord) -> Result<Box<dyn BackendWriter>> {
        tracing::debug!(
            target: TRACING_TARGET_BACKEND,
            path = %record.locator,
            content_type = %record.content_type,
            "Starting upload"
        );

        let writer = OpendalWriter::start(
            self.operator.clone(),
            record.locator.clone(),
            &record.content_type,
            self.ack_timeout,
        )
        .await?;

        Ok(Box::new(writer))
    }

    #[tracing::instrument(skip_all, target = TRACING_TARGET_BACKEND, fields(file_id = %record.id))]
    async fn open_reader(
        &self,
        record: &FileRecord,
        range: Option<ByteRange>,
    ) -> Result<ByteStream> {
        let reader = self
            .operator
            .reader_with(&record.locator)
            .await
            .map_err(from_opendal)?;

        let stream = match range {
            Some(range) => reader.into_bytes_stream(range.as_std()).await,
            None => reader.into_bytes_stream(..).await,
        }
        .map_err(from_opendal)?;

        Ok(stream.map_err(from_read_stream).boxed())
    }

    #[tracing::instrument(skip_all, target = TRACING_TARGET_BACKEND, fields(file_id = %record.id))]
    async fn remove(&self, record: &FileRecord) -> Result<()> {
        match self.operator.delete(&record.locator).await {
            Ok(()) => {
                tracing::debug!(
                    target: TRACING_TARGET_BACKEND,
                    path = %record.locator,
                    "Object deleted"
                );
                Ok(())
            }
            Err(err) if err.kind() == opendal::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(from_opendal(err)),
        }
    }

    async fn redirect_url(&self, record: &FileRecord, force_download: bool) -> Result<Option<Url>> {
        if !self.operator.info().full_capability().presign_read {
            return Ok(None);
        }

        let request = self
            .operator
            .presign_read_with(&record.locator, self.url_expiry)
            .override_content_disposition(&Self::content_disposition(record, force_download))
            .await
            .map_err(from_opendal)?;

        let url = Url::parse(&request.uri().to_string()).map_err(|e| {
            Error::backend()
                .with_message("service returned an invalid presigned url")
                .with_source(e)
        })?;

        Ok(Some(url))
    }
}

impl std::fmt::Debug for OpendalBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpendalBackend")
            .field("scheme", &self.operator.info().scheme())
            .field("prefix", &self.prefix)
            .field("url_expiry", &self.url_expiry)
            .field("ack_timeout", &self.ack_timeout)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use ufs_core::record::{FileId, NewFile};

    use super::*;

    fn memory() -> OpendalBackend {
        OpendalBackend::from_config(&ObjectStoreConfig::Memory { prefix: None }).unwrap()
    }

    #[test]
    fn locator_uses_prefix() {
        let backend = memory().with_prefix("/avatars/");
        let file = NewFile::new("me.png", "image/png", 1);
        let record = FileRecord::pending(FileId::new("abc").unwrap(), &file, "avatars", None);
        assert_eq!(backend.locate(&record), "avatars/abc");
        assert_eq!(memory().locate(&record), "abc");
    }

    #[test]
    fn disposition_encodes_name() {
        let file = NewFile::new("résumé final.pdf", "application/pdf", 1);
        let record = FileRecord::pending(FileId::generate(), &file, "docs", None);
        assert_eq!(
            OpendalBackend::content_disposition(&record, true),
            "attachment; filename=\"r%C3%A9sum%C3%A9%20final.pdf\""
        );
        assert!(OpendalBackend::content_disposition(&record, false).starts_with("inline;"));
    }

    #[tokio::test]
    async fn memory_cannot_presign() {
        let backend = memory();
        let file = NewFile::new("a.txt", "text/plain", 1);
        let mut record = FileRecord::pending(FileId::generate(), &file, "docs", None);
        record.locator = backend.locate(&record);
        assert_eq!(backend.redirect_url(&record, false).await.unwrap(), None);
    }
}
